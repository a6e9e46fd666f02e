use std::ffi::CString;
use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use memchr::memchr;

use crate::error::Error;
use crate::registry::{self, SharedCore};
use crate::Result;

/// Capacity reserved at construction, before the first growth.
pub const INITIAL_CAPACITY: usize = 128;

/// Backing region of one builder: written content in `buf[..len]`, reserved
/// room up to `buf.capacity()`. Capacity never shrinks.
pub(crate) struct Core {
    buf: Vec<u8>,
}

impl Core {
    fn with_capacity(capacity: usize) -> Result<Self> {
        let mut buf = Vec::new();
        buf.try_reserve_exact(capacity)
            .map_err(|source| Error::allocation(capacity, source))?;
        Ok(Self { buf })
    }

    /// Makes room for `extra` more bytes, reallocating to at least double the
    /// current capacity when the reserve runs out. A failed reservation
    /// leaves content and capacity untouched.
    fn ensure_room(&mut self, extra: usize) -> Result<()> {
        let required = self.buf.len().saturating_add(extra);
        if required <= self.buf.capacity() {
            return Ok(());
        }
        let target = required.max(self.buf.capacity().saturating_mul(2));
        self.buf
            .try_reserve_exact(target - self.buf.len())
            .map_err(|source| Error::allocation(target, source))?;
        Ok(())
    }

    fn push_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        self.ensure_room(bytes.len())?;
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    fn capacity(&self) -> usize {
        self.buf.capacity()
    }
}

/// Growable byte-string accumulator. Fragments appended through any of the
/// `append_*` operations land back to back in one contiguous region; growth
/// is amortized by at-least-doubling, so assembling a string from many small
/// pieces stays linear overall.
///
/// Every builder is tracked in a process-wide registry until either
/// [`destroy`](StrBuilder::destroy) releases it individually or
/// [`free_all`](crate::free_all) reclaims everything still tracked. A handle
/// that outlives `free_all` panics on its next use; that is a caller bug, not
/// a recoverable condition.
pub struct StrBuilder {
    core: SharedCore,
    id: u64,
}

impl StrBuilder {
    /// Allocates an empty builder with [`INITIAL_CAPACITY`] bytes of room and
    /// registers it for bulk teardown.
    pub fn new() -> Result<Self> {
        Self::with_capacity(INITIAL_CAPACITY)
    }

    /// Same as [`new`](StrBuilder::new) with an explicit starting capacity.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        let core = Core::with_capacity(capacity)?;
        let core = Arc::new(Mutex::new(Some(core)));
        let id = registry::track(Arc::clone(&core));
        Ok(Self { core, id })
    }

    fn storage(&self) -> MutexGuard<'_, Option<Core>> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_storage<T>(&self, apply: impl FnOnce(&mut Core) -> Result<T>) -> Result<T> {
        let mut guard = self.storage();
        let core = guard
            .as_mut()
            .expect("builder storage was reclaimed by free_all");
        apply(core)
    }

    /// Appends `bytes` verbatim. Embedded nul bytes are content like any
    /// other; nothing is scanned or skipped.
    pub fn append_buffer(&mut self, bytes: &[u8]) -> Result<&mut Self> {
        self.with_storage(|core| core.push_bytes(bytes))?;
        Ok(self)
    }

    /// Appends a single byte.
    pub fn append_char(&mut self, byte: u8) -> Result<&mut Self> {
        self.with_storage(|core| core.push_bytes(&[byte]))?;
        Ok(self)
    }

    /// Appends `s` up to (not including) its first nul byte; input without a
    /// nul is appended whole. The raw path for nul-bearing content is
    /// [`append_buffer`](StrBuilder::append_buffer).
    pub fn append_string(&mut self, s: &str) -> Result<&mut Self> {
        let bytes = s.as_bytes();
        let end = memchr(0, bytes).unwrap_or(bytes.len());
        self.with_storage(|core| core.push_bytes(&bytes[..end]))?;
        Ok(self)
    }

    /// Appends `value` as base-10 ASCII digits, with a leading `-` for
    /// negative values and no padding. Digits are produced in a stack buffer;
    /// only builder growth can allocate.
    pub fn append_int(&mut self, value: i32) -> Result<&mut Self> {
        let mut digits = itoa::Buffer::new();
        let formatted = digits.format(value);
        self.with_storage(|core| core.push_bytes(formatted.as_bytes()))?;
        Ok(self)
    }

    /// Borrowed view of the accumulated bytes and their length. Not
    /// nul-terminated. The view holds the builder's storage for its lifetime:
    /// the borrow checker rules out mutation or destruction while it is
    /// alive, and a concurrent [`free_all`](crate::free_all) blocks until it
    /// is dropped.
    pub fn get_buffer(&self) -> BufferView<'_> {
        BufferView {
            guard: self.storage(),
        }
    }

    /// Newly allocated, nul-terminated copy of the content, independent of
    /// the builder's own region. Fails with [`Error::InteriorNul`] when the
    /// content itself holds a nul byte.
    pub fn to_cstring(&self) -> Result<CString> {
        let guard = self.storage();
        let core = guard
            .as_ref()
            .expect("builder storage was reclaimed by free_all");
        let bytes = core.as_slice();
        if let Some(offset) = memchr(0, bytes) {
            return Err(Error::InteriorNul { offset });
        }
        let mut owned = Vec::new();
        owned
            .try_reserve_exact(bytes.len() + 1)
            .map_err(|source| Error::allocation(bytes.len() + 1, source))?;
        owned.extend_from_slice(bytes);
        owned.push(0);
        Ok(CString::from_vec_with_nul(owned).expect("interior nul bytes were ruled out above"))
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> usize {
        self.storage()
            .as_ref()
            .expect("builder storage was reclaimed by free_all")
            .as_slice()
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Currently reserved region size; grows, never shrinks.
    pub fn capacity(&self) -> usize {
        self.storage()
            .as_ref()
            .expect("builder storage was reclaimed by free_all")
            .capacity()
    }

    /// Releases this builder's region and removes it from the registry.
    /// Consumes the handle, so a second destroy of the same builder does not
    /// compile. Panics if the registry no longer tracks the builder, i.e.
    /// when [`free_all`](crate::free_all) already reclaimed it.
    pub fn destroy(self) {
        let tracked = registry::untrack(self.id);
        assert!(
            tracked,
            "destroy on a builder the registry no longer tracks"
        );
        self.storage().take();
    }
}

impl fmt::Write for StrBuilder {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.append_buffer(s.as_bytes())
            .map(drop)
            .map_err(|_| fmt::Error)
    }
}

/// Borrowed extraction handle returned by
/// [`get_buffer`](StrBuilder::get_buffer); derefs to the accumulated bytes.
pub struct BufferView<'a> {
    guard: MutexGuard<'a, Option<Core>>,
}

impl BufferView<'_> {
    fn bytes(&self) -> &[u8] {
        self.guard
            .as_ref()
            .expect("builder storage was reclaimed by free_all")
            .as_slice()
    }

    /// Logical content length, the cursor offset of the owning builder.
    pub fn len(&self) -> usize {
        self.bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes().is_empty()
    }
}

impl Deref for BufferView<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.bytes()
    }
}
