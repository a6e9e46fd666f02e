use std::collections::TryReserveError;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Growth or a fresh allocation could not obtain memory. The builder that
    /// reported it is left exactly as it was before the failed call.
    #[error("failed to reserve {requested} bytes")]
    Allocation {
        requested: usize,
        #[source]
        source: TryReserveError,
    },

    /// The accumulated content holds a nul byte and cannot be carried in a
    /// nul-terminated string. Raw extraction through `get_buffer` still works.
    #[error("interior nul byte at offset {offset}")]
    InteriorNul { offset: usize },
}

impl Error {
    pub(crate) fn allocation(requested: usize, source: TryReserveError) -> Self {
        Error::Allocation { requested, source }
    }
}
