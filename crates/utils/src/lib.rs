pub mod error;

pub use error::FileIOError;
