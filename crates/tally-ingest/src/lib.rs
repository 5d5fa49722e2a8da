//! File boundary for Tally: upload staging, spreadsheet readers, and export
//! writers.
//!
//! Everything here is synchronous `std::fs` I/O; async callers should run it
//! on a blocking thread.

pub mod error;
pub mod read;
pub mod staging;
pub mod write;

pub use error::{Error, Result};
pub use staging::{StagedFile, UploadDir};
