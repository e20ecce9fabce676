use thiserror::Error;

/// Errors raised while turning a CSV file into a normalized table.
///
/// Schema problems are fatal for the affected view only: the caller prints
/// the message and returns to the menu, it never tears down the session.
/// Empty query results are not errors and are represented by empty tables.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("missing required columns: {}", .0.join(", "))]
    Schema(Vec<String>),

    #[error("unrecognized dataset layout (headers: {0})")]
    UnknownLayout(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
