use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EdfError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid template: {0}")]
    InvalidTemplate(String),

    #[error("Failed to open {path} for reading: {source}")]
    InputAccess {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to read input: {0}")]
    InputRead(#[source] io::Error),

    #[error("File does not contain enough lines")]
    NotEnoughLines,

    #[error("Number of columns in line {line} is wrong: found {found}, expected {expected}")]
    ColumnMismatch {
        line: usize,
        found: usize,
        expected: usize,
    },

    #[error("Line {line} is too long")]
    LineTooLong { line: usize },

    #[error("Can not open file {path} for writing: {source}")]
    OutputAccess {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("A write error occurred: {0}")]
    Write(#[source] io::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid file format: {0}")]
    InvalidFormat(String),

    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("Invalid header size")]
    InvalidHeader,

    #[error("Invalid number of signals: {0}")]
    InvalidSignalCount(i32),

    #[error("Signal index {0} out of range")]
    InvalidSignalIndex(usize),
}

pub type Result<T> = std::result::Result<T, EdfError>;
