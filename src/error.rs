use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("pdf error: {0}")]
    Pdf(String),
    #[error("unsupported document type: {0}")]
    Unsupported(String),
    #[error("document contains no text")]
    Empty,
}

#[derive(Error, Debug, PartialEq)]
pub enum ParseError {
    #[error("missing mandatory header field: {0}")]
    MissingField(&'static str),
    #[error("no course records found")]
    NoCourses,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("corrupt row: {0}")]
    Corrupt(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Failures of the load pipeline. Only `Setup` aborts a batch.
#[derive(Error, Debug)]
pub enum EtlError {
    #[error("extraction failed for {path}: {source}")]
    Extraction {
        path: PathBuf,
        #[source]
        source: ExtractError,
    },
    #[error("parse failed: {0}")]
    Parse(#[from] ParseError),
    #[error("unknown grade letter '{0}'")]
    UnknownGrade(String),
    #[error("store failure: {0}")]
    Store(#[from] StoreError),
    #[error("setup failure: {0}")]
    Setup(String),
}
