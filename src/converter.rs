//! Conversion pipeline.
//!
//! Order of work: header-line skip, preflight of the first data line,
//! calibration (one extra pass when auto-ranging), header, streaming encode
//! pass, record count patch. The output is created only after the input has
//! passed preflight and calibration.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Seek, Write};
use std::path::Path;

use tracing::info;

use crate::calibrate::calibrate;
use crate::config::Configuration;
use crate::error::{EdfError, Result};
use crate::tokenizer::Tokenizer;
use crate::types::{Channel, FileFormat, RecordingInfo};
use crate::writer::EdfWriter;

/// What a finished conversion produced
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionSummary {
    pub format: FileFormat,
    pub channels: usize,
    /// Complete data records written
    pub datarecords: u64,
    /// Data lines read by the encode pass
    pub lines: u64,
}

/// Converts an in-memory or already opened stream
///
/// Returns the output sink so the caller can inspect or sync it.
///
/// # Examples
///
/// ```rust
/// use std::io::Cursor;
/// use ascii2edf::{convert, ColumnSpec, Configuration, FileFormat, RecordingInfo};
///
/// let specs = vec![ColumnSpec::new("Heart", "bpm"), ColumnSpec::new("Flow", "l/m")];
/// let config = Configuration::new(b'\t', 1.0, FileFormat::Edf, specs);
/// let info = RecordingInfo::new("Subject", "Ward 4", 13, 4, 22, 9, 30, 0)?;
///
/// let input = Cursor::new(b"1.0\t-2.0\n3.0\t-4.0\n".to_vec());
/// let (output, summary) = convert(&config, input, Cursor::new(Vec::new()), &info)?;
///
/// assert_eq!(summary.datarecords, 2);
/// assert_eq!(output.into_inner().len(), 768 + 2 * 2 * 2);
/// # Ok::<(), ascii2edf::EdfError>(())
/// ```
pub fn convert<R, W>(
    config: &Configuration,
    input: R,
    output: W,
    info: &RecordingInfo,
) -> Result<(W, ConversionSummary)>
where
    R: BufRead + Seek,
    W: Write + Seek,
{
    config.validate()?;
    let mut tokenizer = Tokenizer::new(input, config)?;
    tokenizer.verify_first_line()?;
    let channels = calibrate(config, &mut tokenizer)?;

    encode(config, &mut tokenizer, channels, output, info)
}

/// Converts `input_path` into `output_path`, creating or truncating it
///
/// The output is synced to disk before returning.
///
/// # Errors
///
/// * `EdfError::InputAccess` - the input can not be opened
/// * `EdfError::NotEnoughLines`, `EdfError::ColumnMismatch`,
///   `EdfError::LineTooLong` - the input text is malformed
/// * `EdfError::OutputAccess` - the output can not be created or synced
/// * `EdfError::Write` - a write failed mid-conversion
pub fn convert_file<P, Q>(
    config: &Configuration,
    input_path: P,
    output_path: Q,
    info: &RecordingInfo,
) -> Result<ConversionSummary>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let input_path = input_path.as_ref();
    let output_path = output_path.as_ref();
    info!(input = %input_path.display(), output = %output_path.display(), "starting conversion");

    config.validate()?;
    let input = File::open(input_path).map_err(|source| EdfError::InputAccess {
        path: input_path.display().to_string(),
        source,
    })?;

    let mut tokenizer = Tokenizer::new(BufReader::new(input), config)?;
    tokenizer.verify_first_line()?;
    let channels = calibrate(config, &mut tokenizer)?;

    let output_access = |source: io::Error| EdfError::OutputAccess {
        path: output_path.display().to_string(),
        source,
    };
    let output = File::create(output_path).map_err(output_access)?;
    let (output, summary) = encode(config, &mut tokenizer, channels, BufWriter::new(output), info)?;

    // 刷新并同步到磁盘，关闭失败同样报告
    let file = output
        .into_inner()
        .map_err(|e| EdfError::Write(e.into_error()))?;
    file.sync_all().map_err(output_access)?;

    Ok(summary)
}

fn encode<R, W>(
    config: &Configuration,
    tokenizer: &mut Tokenizer<'_, R>,
    channels: Vec<Channel>,
    output: W,
    info: &RecordingInfo,
) -> Result<(W, ConversionSummary)>
where
    R: BufRead + Seek,
    W: Write + Seek,
{
    let channel_count = channels.len();
    let mut writer = EdfWriter::new(output, config.format, channels, config.record_layout());
    writer.write_header(info)?;

    let lines = tokenizer.drive(&mut writer)?;
    let (output, datarecords) = writer.finalize()?;

    info!(
        format = config.format.name(),
        channels = channel_count,
        lines,
        datarecords,
        "conversion complete"
    );

    Ok((
        output,
        ConversionSummary {
            format: config.format,
            channels: channel_count,
            datarecords,
            lines,
        },
    ))
}
