pub mod builder;
pub mod error;
pub mod registry;

pub use crate::builder::{BufferView, StrBuilder, INITIAL_CAPACITY};
pub use crate::error::Error;
pub use crate::registry::{free_all, live_count};

pub type Result<T> = std::result::Result<T, Error>;
