use std::fs::File;
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use chrono::{Datelike, Timelike};
use tracing::debug;

use crate::error::{EdfError, Result};
use crate::field;
use crate::tokenizer::LineSink;
use crate::types::{Channel, FileFormat, RecordLayout, RecordingInfo};
use crate::utils::latin1_to_ascii;
use crate::RECORD_COUNT_OFFSET;

/// Streaming EDF/BDF encoder
///
/// The writer receives one value per channel for every input line. It
/// quantizes the values into a record buffer that is allocated once, and
/// writes each full data record with a single `write_all`. The record count
/// is unknown until the input ends, so the header carries `-1` until
/// [`finalize`](EdfWriter::finalize) patches the real count in place.
///
/// # File Creation Workflow
///
/// 1. Create the writer with calibrated channels and a record layout
/// 2. Write the header with `write_header()`
/// 3. Feed every data line with `write_samples()`
/// 4. Patch the record count with `finalize()`
///
/// # Examples
///
/// ```rust
/// use std::io::Cursor;
/// use ascii2edf::{Channel, EdfWriter, FileFormat, RecordLayout, RecordingInfo};
///
/// let mut channel = Channel {
///     label: "Flow".to_string(),
///     physical_dimension: "l/m".to_string(),
///     physical_maximum: 0.0,
///     multiplier: 1.0,
///     sensitivity: 0.0,
/// };
/// channel.calibrate(100.0, FileFormat::Edf);
///
/// let layout = RecordLayout::for_frequency(2.0);
/// let mut writer = EdfWriter::new(Cursor::new(Vec::new()), FileFormat::Edf, vec![channel], layout);
///
/// let info = RecordingInfo::new("Subject", "Bench test", 24, 1, 15, 8, 0, 0)?;
/// writer.write_header(&info)?;
/// for value in [10.0, -10.0, 50.0, 99.0, 1.0] {
///     writer.write_samples(&[value])?;
/// }
///
/// // the fifth sample only half fills a record and is dropped
/// let (cursor, records) = writer.finalize()?;
/// assert_eq!(records, 2);
///
/// let bytes = cursor.into_inner();
/// assert_eq!(bytes.len(), 512 + 2 * 2 * 2);
/// assert_eq!(&bytes[236..244], b"2       ");
/// # Ok::<(), ascii2edf::EdfError>(())
/// ```
pub struct EdfWriter<W: Write + Seek> {
    file: W,
    format: FileFormat,
    channels: Vec<Channel>,
    layout: RecordLayout,
    /// 单个数据记录的缓冲区，按通道顺序排列
    record: Vec<u8>,
    sample_in_record: usize,
    datarecords: u64,
    header_written: bool,
}

impl EdfWriter<BufWriter<File>> {
    /// Creates (or truncates) the output file
    ///
    /// # Errors
    ///
    /// * `EdfError::OutputAccess` - the file can not be created
    pub fn create<P: AsRef<Path>>(
        path: P,
        format: FileFormat,
        channels: Vec<Channel>,
        layout: RecordLayout,
    ) -> Result<Self> {
        let file = File::create(&path).map_err(|source| EdfError::OutputAccess {
            path: path.as_ref().display().to_string(),
            source,
        })?;

        Ok(Self::new(BufWriter::new(file), format, channels, layout))
    }
}

impl<W: Write + Seek> EdfWriter<W> {
    pub fn new(file: W, format: FileFormat, channels: Vec<Channel>, layout: RecordLayout) -> Self {
        let record_size = layout.samples_per_record * channels.len() * format.bytes_per_sample();

        EdfWriter {
            file,
            format,
            channels,
            layout,
            record: vec![0u8; record_size],
            sample_in_record: 0,
            datarecords: 0,
            header_written: false,
        }
    }

    /// Header length declared in the header itself
    pub fn header_size(&self) -> usize {
        256 + 256 * self.channels.len()
    }

    /// Bytes in one data record
    pub fn record_size(&self) -> usize {
        self.record.len()
    }

    /// Complete data records written so far
    pub fn datarecords(&self) -> u64 {
        self.datarecords
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// Writes the fixed-layout header with a `-1` record count
    ///
    /// # Errors
    ///
    /// * `EdfError::InvalidFormat` - the header was already written
    /// * `EdfError::Write` - the output rejected the bytes
    pub fn write_header(&mut self, info: &RecordingInfo) -> Result<()> {
        if self.header_written {
            return Err(EdfError::InvalidFormat("Header already written".to_string()));
        }

        let header = self.encode_header(info).map_err(EdfError::Write)?;
        self.file.write_all(&header).map_err(EdfError::Write)?;
        self.header_written = true;

        debug!(
            bytes = header.len(),
            channels = self.channels.len(),
            samples_per_record = self.layout.samples_per_record,
            "header written"
        );
        Ok(())
    }

    fn encode_header(&self, info: &RecordingInfo) -> io::Result<Vec<u8>> {
        let n = self.channels.len();
        let mut h = Vec::with_capacity(self.header_size());

        // 主头部 (256字节)
        h.extend_from_slice(self.format.version_tag());
        field::write_text(&mut h, &latin1_to_ascii(&info.patient), 80)?;
        field::write_text(&mut h, &latin1_to_ascii(&info.recording), 80)?;

        let date = format!(
            "{:02}.{:02}.{:02}",
            info.start_date.day(),
            info.start_date.month(),
            info.start_date.year() % 100
        );
        field::write_text(&mut h, &date, 8)?;
        let time = format!(
            "{:02}.{:02}.{:02}",
            info.start_time.hour(),
            info.start_time.minute(),
            info.start_time.second()
        );
        field::write_text(&mut h, &time, 8)?;

        field::write_number(&mut h, self.header_size(), 8)?;
        field::write_blank(&mut h, 44)?;
        // 数据记录数，finalize时回填
        field::write_text(&mut h, "-1", 8)?;
        field::write_text(&mut h, &self.layout.duration_text, 8)?;
        field::write_number(&mut h, n, 4)?;

        // 信号头部，每个字段按通道依次排列
        for ch in &self.channels {
            field::write_text(&mut h, &latin1_to_ascii(&ch.label), 16)?;
        }
        field::write_blank(&mut h, 80 * n)?;
        for ch in &self.channels {
            field::write_text(&mut h, &latin1_to_ascii(&ch.physical_dimension), 8)?;
        }
        for ch in &self.channels {
            field::write_text(&mut h, &field::physical_text(-ch.physical_maximum), 8)?;
        }
        for ch in &self.channels {
            field::write_text(&mut h, &field::physical_text(ch.physical_maximum), 8)?;
        }
        for _ in 0..n {
            field::write_number(&mut h, self.format.digital_min(), 8)?;
        }
        for _ in 0..n {
            field::write_number(&mut h, self.format.digital_max(), 8)?;
        }
        field::write_blank(&mut h, 80 * n)?;
        for _ in 0..n {
            field::write_number(&mut h, self.layout.samples_per_record, 8)?;
        }
        field::write_blank(&mut h, 32 * n)?;

        Ok(h)
    }

    /// Quantizes one input line, one value per channel
    ///
    /// Flushes the record buffer once every channel holds
    /// `samples_per_record` samples.
    ///
    /// # Errors
    ///
    /// * `EdfError::InvalidFormat` - header not written yet, or the value
    ///   count does not match the channel count
    /// * `EdfError::Write` - the record could not be written
    pub fn write_samples(&mut self, values: &[f64]) -> Result<()> {
        if !self.header_written {
            return Err(EdfError::InvalidFormat("Header must be written before samples".to_string()));
        }
        if values.len() != self.channels.len() {
            return Err(EdfError::InvalidFormat(format!(
                "Expected {} values per line, got {}",
                self.channels.len(),
                values.len()
            )));
        }

        let spr = self.layout.samples_per_record;
        for (j, (channel, &value)) in self.channels.iter().zip(values).enumerate() {
            let digital = channel.quantize(value, self.format);
            field::put_sample(&mut self.record, self.sample_in_record + j * spr, digital, self.format);
        }
        self.sample_in_record += 1;

        if self.sample_in_record >= spr {
            self.file.write_all(&self.record).map_err(EdfError::Write)?;
            self.datarecords += 1;
            self.sample_in_record = 0;
        }
        Ok(())
    }

    /// Patches the record count at byte 236 and flushes
    ///
    /// Samples of an incomplete final record are discarded. Returns the
    /// underlying sink and the number of records written.
    pub fn finalize(mut self) -> Result<(W, u64)> {
        if self.sample_in_record > 0 {
            debug!(samples = self.sample_in_record, "discarding incomplete final record");
        }

        self.file.flush().map_err(EdfError::Write)?;
        self.file
            .seek(SeekFrom::Start(RECORD_COUNT_OFFSET))
            .map_err(EdfError::Write)?;
        field::write_number(&mut self.file, self.datarecords, 8).map_err(EdfError::Write)?;
        self.file.flush().map_err(EdfError::Write)?;

        Ok((self.file, self.datarecords))
    }
}

impl<W: Write + Seek> LineSink for EdfWriter<W> {
    fn consume(&mut self, values: &[f64]) -> Result<()> {
        self.write_samples(values)
    }
}
