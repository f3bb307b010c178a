//! # ascii2edf
//!
//! Converts delimited text samples (CSV/TSV) into EDF (16-bit) or BDF
//! (24-bit) recordings. An EDFbrowser ascii2edf template decides which
//! columns become channels, with their labels, units and calibration.
//!
//! ## Quick Start
//!
//! ### Converting with a template
//!
//! ```rust
//! use ascii2edf::{convert_file, Configuration, EdfReader, RecordingInfo, Result};
//! # use std::fs;
//!
//! fn main() -> Result<()> {
//!     # // Create the input files first
//!     # ascii2edf::doctest_utils::create_template_file("quickstart.xml")?;
//!     # ascii2edf::doctest_utils::create_sample_csv("quickstart.txt")?;
//!     let config = Configuration::from_template_file("quickstart.xml")?;
//!     let info = RecordingInfo::new("Subject 7", "Night 2", 24, 3, 1, 22, 15, 0)?;
//!
//!     let summary = convert_file(&config, "quickstart.txt", "quickstart.edf", &info)?;
//!     println!("{} records in {} channels", summary.datarecords, summary.channels);
//!
//!     // Read the result back
//!     let mut reader = EdfReader::open("quickstart.edf")?;
//!     assert_eq!(reader.header().signals[0].label, "Heart");
//!     let heart = reader.read_physical_samples(0, 8)?;
//!     assert_eq!(heart.len(), 8);
//!
//!     # // Cleanup
//!     # drop(reader);
//!     # for f in ["quickstart.xml", "quickstart.txt", "quickstart.edf"] { fs::remove_file(f).ok(); }
//!     Ok(())
//! }
//! ```
//!
//! ### Building a configuration in code
//!
//! Every column is enabled and auto-ranged by default. Manual ranges need a
//! physical maximum per column.
//!
//! ```rust
//! use std::io::Cursor;
//! use ascii2edf::{convert, ColumnSpec, Configuration, EdfReader, FileFormat, RecordingInfo};
//!
//! let mut flow = ColumnSpec::new("Flow", "l/m");
//! flow.physical_maximum = 100.0;
//!
//! let mut config = Configuration::new(b',', 10.0, FileFormat::Bdf, vec![flow]);
//! config.auto_physical_maximum = false;
//!
//! let info = RecordingInfo::new("", "", 0, 1, 1, 0, 0, 0)?;
//! let (output, summary) = convert(&config, Cursor::new(b"50\n-25\n".to_vec()), Cursor::new(Vec::new()), &info)?;
//! assert_eq!(summary.datarecords, 2);
//!
//! let mut reader = EdfReader::from_reader(output)?;
//! assert_eq!(reader.header().format, FileFormat::Bdf);
//! let values = reader.read_physical_samples(0, 2)?;
//! assert!((values[0] - 50.0).abs() < 0.001);
//! # Ok::<(), ascii2edf::EdfError>(())
//! ```
//!
//! ## Calibration
//!
//! Each channel stores `trunc(value × sensitivity)`, clamped to the format's
//! digital range. With auto-ranging the physical maximum is the largest
//! absolute value seen in the channel times its multiplier, capped at
//! 9999999. Sensitivity is `digital_max / physical_maximum × multiplier`.
//!
//! ## Record layout
//!
//! | Sample frequency         | Record duration | Samples per record |
//! |--------------------------|-----------------|--------------------|
//! | below 1 Hz               | `1/frequency`   | 1                  |
//! | integer part not ×10     | 1 s             | `(int)frequency`   |
//! | integer part a ×10       | 0.1 s           | `(int)frequency/10`|
//!
//! Lines that do not fill a complete record at the end of the input are
//! dropped.

pub mod error;
pub mod types;
pub mod utils;
pub mod field;
pub mod config;
pub mod tokenizer;
pub mod calibrate;
pub mod writer;
pub mod reader;
pub mod converter;

#[doc(hidden)]
pub mod doctest_utils; // For internal doctest support

// Re-export main types for convenience
pub use error::{EdfError, Result};
pub use types::{Channel, EdfHeader, FileFormat, RecordLayout, RecordingInfo, SignalParam};
pub use config::{ColumnSpec, Configuration};
pub use tokenizer::{LineSink, Tokenizer};
pub use reader::EdfReader;
pub use writer::EdfWriter;
pub use converter::{convert, convert_file, ConversionSummary};

// Important constants
pub const EDFLIB_TIME_DIMENSION: i64 = 10_000_000; // 100 nanoseconds unit
pub const EDF_MAX_CHANNELS: usize = 128;
/// Longest accepted input line, excluding `\r` and `\n`
pub const MAX_LINE_LEN: usize = 2046;
/// Largest physical maximum that still fits the 8-byte header field
pub const MAX_PHYSICAL_VALUE: f64 = 9_999_999.0;
/// Byte offset of the data record count in the header
pub const RECORD_COUNT_OFFSET: u64 = 236;

/// Library version
///
/// # Examples
///
/// ```rust
/// let version = ascii2edf::version();
/// assert!(version.contains('.'));
/// ```
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
