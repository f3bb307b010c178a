//! Byte-at-a-time scanner for delimited sample text.
//!
//! The tokenizer never builds a field list. It keeps one reusable line
//! buffer and the parsed values of the enabled columns, and hands those to
//! a [`LineSink`] once per line. Both the calibration pass and the encoding
//! pass go through [`Tokenizer::drive`], so the line policies below apply
//! identically to each:
//!
//! - `\r` is dropped, and `,` becomes `.` unless `,` is the separator
//! - empty fields count as columns and parse as 0.0
//! - a line longer than [`MAX_LINE_LEN`] characters is fatal
//! - a line with the wrong column count is fatal, unless end of input
//!   follows within 10 bytes, in which case it is dropped as a truncated
//!   trailing row

use std::io::{self, BufRead, Seek, SeekFrom};

use tracing::{debug, warn};

use crate::config::Configuration;
use crate::error::{EdfError, Result};
use crate::utils::parse_leading_f64;
use crate::MAX_LINE_LEN;

/// Bytes probed after a short line before it is treated as corrupt
const TRAILING_PROBE_BYTES: usize = 10;

/// Consumer of tokenized lines
pub trait LineSink {
    /// Receives the values of the enabled columns, in column order
    fn consume(&mut self, values: &[f64]) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Trailing {
    Recover,
    Strict,
}

pub struct Tokenizer<'a, R> {
    reader: R,
    config: &'a Configuration,
    /// 数据区起始位置（跳过头部行之后）
    data_offset: u64,
    line: Vec<u8>,
    values: Vec<f64>,
    line_nr: usize,
}

impl<'a, R: BufRead + Seek> Tokenizer<'a, R> {
    /// Skips the `startline - 1` header lines and remembers where data begins
    ///
    /// # Errors
    ///
    /// * `EdfError::NotEnoughLines` - input ends inside the header region
    /// * `EdfError::InputRead` - the reader failed
    pub fn new(mut reader: R, config: &'a Configuration) -> Result<Self> {
        reader.seek(SeekFrom::Start(0)).map_err(EdfError::InputRead)?;

        let mut data_offset = 0u64;
        let mut skipped = 0;
        while skipped + 1 < config.startline {
            match next_byte(&mut reader)? {
                None => return Err(EdfError::NotEnoughLines),
                Some(b'\n') => skipped += 1,
                Some(_) => {}
            }
            data_offset += 1;
        }
        debug!(data_offset, startline = config.startline, "skipped header lines");

        Ok(Tokenizer {
            reader,
            config,
            data_offset,
            line: Vec::with_capacity(MAX_LINE_LEN + 1),
            values: Vec::with_capacity(config.channel_count()),
            line_nr: config.startline,
        })
    }

    /// Byte offset of the first data line
    pub fn data_offset(&self) -> u64 {
        self.data_offset
    }

    /// Number the next data line will be reported under
    pub fn line_nr(&self) -> usize {
        self.line_nr
    }

    /// Moves the cursor back to the first data line
    pub fn rewind(&mut self) -> Result<()> {
        self.reader
            .seek(SeekFrom::Start(self.data_offset))
            .map_err(EdfError::InputRead)?;
        self.line_nr = self.config.startline;
        self.line.clear();
        self.values.clear();
        Ok(())
    }

    /// Checks that the first data line exists and has the declared columns
    ///
    /// No trailing-line leniency applies here. The cursor is rewound
    /// afterwards.
    pub fn verify_first_line(&mut self) -> Result<()> {
        self.rewind()?;
        let found = self.read_line(Trailing::Strict)?;
        self.rewind()?;
        if found {
            Ok(())
        } else {
            Err(EdfError::NotEnoughLines)
        }
    }

    /// Reads the next complete data line
    pub fn next_line(&mut self) -> Result<Option<&[f64]>> {
        if self.read_line(Trailing::Recover)? {
            Ok(Some(&self.values))
        } else {
            Ok(None)
        }
    }

    /// Feeds every data line to `sink`, starting from the first data line
    ///
    /// Returns the number of lines consumed.
    pub fn drive<S: LineSink + ?Sized>(&mut self, sink: &mut S) -> Result<u64> {
        self.rewind()?;
        let mut lines = 0u64;
        while self.read_line(Trailing::Recover)? {
            sink.consume(&self.values)?;
            lines += 1;
        }
        Ok(lines)
    }

    fn read_line(&mut self, trailing: Trailing) -> Result<bool> {
        self.line.clear();
        self.values.clear();

        let separator = self.config.separator;
        let mut column = 0usize;
        let mut field_start = 0usize;

        loop {
            let Some(mut byte) = next_byte(&mut self.reader)? else {
                if !self.line.is_empty() {
                    debug!(line = self.line_nr, "dropping final line without newline");
                }
                return Ok(false);
            };

            if byte == b'\r' {
                continue;
            }
            // 小数点逗号
            if separator != b',' && byte == b',' {
                byte = b'.';
            }

            if byte == b'\n' {
                if !self.line.is_empty() {
                    self.end_field(column, field_start);
                    column += 1;
                }
                if column != self.config.columns {
                    return self.column_mismatch(column, trailing);
                }
                self.line_nr += 1;
                return Ok(true);
            }

            if byte == separator {
                self.end_field(column, field_start);
                column += 1;
                self.line.push(byte);
                field_start = self.line.len();
            } else {
                self.line.push(byte);
            }

            if self.line.len() > MAX_LINE_LEN {
                return Err(EdfError::LineTooLong { line: self.line_nr });
            }
        }
    }

    fn end_field(&mut self, column: usize, field_start: usize) {
        if self.config.is_enabled(column) {
            self.values.push(parse_leading_f64(&self.line[field_start..]));
        }
    }

    fn column_mismatch(&mut self, found: usize, trailing: Trailing) -> Result<bool> {
        if trailing == Trailing::Recover {
            for _ in 0..TRAILING_PROBE_BYTES {
                if next_byte(&mut self.reader)?.is_none() {
                    warn!(
                        line = self.line_nr,
                        found,
                        expected = self.config.columns,
                        "ignoring truncated line at end of file"
                    );
                    return Ok(false);
                }
            }
        }

        Err(EdfError::ColumnMismatch {
            line: self.line_nr,
            found,
            expected: self.config.columns,
        })
    }
}

fn next_byte<R: BufRead>(reader: &mut R) -> Result<Option<u8>> {
    loop {
        let byte = match reader.fill_buf() {
            Ok(buf) => buf.first().copied(),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(EdfError::InputRead(e)),
        };
        if byte.is_some() {
            reader.consume(1);
        }
        return Ok(byte);
    }
}
