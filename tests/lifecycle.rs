use std::sync::{Mutex, MutexGuard, PoisonError};

use rstest::rstest;
use strbuilder::{free_all, live_count, StrBuilder};

// free_all drains the process-wide registry, so every test here serializes on
// one gate and leaves the registry empty behind it.
static REGISTRY_GATE: Mutex<()> = Mutex::new(());

fn gate() -> MutexGuard<'static, ()> {
    REGISTRY_GATE.lock().unwrap_or_else(PoisonError::into_inner)
}

#[rstest]
fn construction_tracks_and_destroy_untracks() {
    let _gate = gate();
    assert_eq!(live_count(), 0);

    let builders: Vec<StrBuilder> = (0..3).map(|_| StrBuilder::new().unwrap()).collect();
    assert_eq!(live_count(), 3);

    for builder in builders {
        builder.destroy();
    }
    assert_eq!(live_count(), 0);
}

#[rstest]
fn free_all_reclaims_exactly_the_remaining() {
    let _gate = gate();
    let mut builders: Vec<StrBuilder> = (0..5).map(|_| StrBuilder::new().unwrap()).collect();

    builders.pop().unwrap().destroy();
    builders.pop().unwrap().destroy();
    assert_eq!(live_count(), 3);

    free_all();
    assert_eq!(live_count(), 0);
}

#[rstest]
fn free_all_on_empty_registry_is_noop() {
    let _gate = gate();
    free_all();
    free_all();
    assert_eq!(live_count(), 0);
}

#[rstest]
fn dropped_handles_stay_tracked_until_free_all() {
    let _gate = gate();
    let builder = StrBuilder::new().unwrap();
    drop(builder);

    // A lost handle is not a destroyed handle; only the bulk path reclaims it.
    assert_eq!(live_count(), 1);
    free_all();
    assert_eq!(live_count(), 0);
}

#[rstest]
fn registry_restarts_after_free_all() {
    let _gate = gate();
    let first = StrBuilder::new().unwrap();
    drop(first);
    free_all();

    let mut fresh = StrBuilder::new().unwrap();
    fresh.append_string("still works").unwrap();
    assert_eq!(fresh.to_cstring().unwrap().as_bytes(), b"still works");
    assert_eq!(live_count(), 1);
    fresh.destroy();
    assert_eq!(live_count(), 0);
}

#[rstest]
#[should_panic(expected = "reclaimed by free_all")]
fn append_after_free_all_panics() {
    let _gate = gate();
    let mut builder = StrBuilder::new().unwrap();
    free_all();

    let _ = builder.append_char(b'x');
}

#[rstest]
#[should_panic(expected = "no longer tracks")]
fn destroy_after_free_all_panics() {
    let _gate = gate();
    let builder = StrBuilder::new().unwrap();
    free_all();

    builder.destroy();
}
