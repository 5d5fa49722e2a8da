//! Error type for `tally-ingest`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("csv error: {0}")]
  Csv(#[from] csv::Error),

  #[error("workbook error: {0}")]
  Workbook(#[from] calamine::Error),

  #[error("xlsx write error: {0}")]
  Xlsx(#[from] rust_xlsxwriter::XlsxError),

  #[error("unsupported file format: {0:?}")]
  UnsupportedFormat(String),

  #[error("invalid name: {0:?}")]
  InvalidName(String),

  #[error("workbook {0:?} has no worksheets")]
  EmptyWorkbook(String),

  /// A staged upload could not be decoded.
  #[error("cannot read {file}: {source}")]
  File {
    file:   String,
    #[source]
    source: Box<Error>,
  },
}

impl Error {
  /// Whether the failure is caused by the content of an uploaded file
  /// rather than by the server's own I/O.
  pub fn is_bad_input(&self) -> bool {
    match self {
      Self::Csv(_) | Self::Workbook(_) | Self::UnsupportedFormat(_) | Self::EmptyWorkbook(_) => true,
      Self::InvalidName(_) => true,
      Self::File { source, .. } => source.is_bad_input(),
      Self::Io(_) | Self::Xlsx(_) => false,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
