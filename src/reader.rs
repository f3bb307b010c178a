use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use chrono::{NaiveDate, NaiveTime};
use tracing::debug;

use crate::error::{EdfError, Result};
use crate::field;
use crate::types::{EdfHeader, FileFormat, SignalParam};
use crate::utils::{atof_nonlocalized, atoi_nonlocalized, parse_record_duration};
use crate::EDF_MAX_CHANNELS;

/// EDF/BDF file reader
///
/// Decodes the fixed-layout header and gives per-signal sequential access to
/// the samples. The sample width (2 or 3 bytes) follows the version field.
///
/// # Examples
///
/// ```rust
/// use ascii2edf::{EdfReader, FileFormat};
///
/// # // Generate test file (hidden from docs)
/// # ascii2edf::doctest_utils::create_converted_file("reader_intro.edf")?;
/// #
/// let mut reader = EdfReader::open("reader_intro.edf")?;
///
/// let header = reader.header();
/// assert_eq!(header.format, FileFormat::Edf);
/// println!("Records: {}", header.datarecords_in_file);
///
/// for i in 0..header.signals.len() {
///     let label = reader.header().signals[i].label.clone();
///     let values = reader.read_physical_samples(i, 4)?;
///     println!("{}: {:?}", label, values);
/// }
///
/// # // Cleanup (hidden from docs)
/// # std::fs::remove_file("reader_intro.edf").ok();
/// # Ok::<(), ascii2edf::EdfError>(())
/// ```
pub struct EdfReader<R: Read + Seek = BufReader<File>> {
    file: R,
    header: EdfHeader,
    /// 每个信号在数据记录中的字节偏移
    buffer_offsets: Vec<usize>,
    /// 当前每个信号的样本位置指针
    sample_positions: Vec<i64>,
    /// 每个数据记录的大小（字节）
    record_size: usize,
}

impl EdfReader<BufReader<File>> {
    /// Opens an EDF or BDF file for reading
    ///
    /// # Errors
    ///
    /// * `EdfError::InputAccess` - the file can not be opened
    /// * `EdfError::UnsupportedFileType` - neither an EDF nor a BDF version field
    /// * `EdfError::InvalidHeader` - the declared header size is wrong
    /// * `EdfError::InvalidSignalCount` - channel count outside 1-128
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(&path).map_err(|source| EdfError::InputAccess {
            path: path.as_ref().display().to_string(),
            source,
        })?;

        Self::from_reader(BufReader::new(file))
    }
}

impl<R: Read + Seek> EdfReader<R> {
    pub fn from_reader(mut file: R) -> Result<Self> {
        let (header, buffer_offsets, record_size) = Self::parse_header(&mut file)?;
        let sample_positions = vec![0i64; header.signals.len()];

        debug!(
            format = header.format.name(),
            signals = header.signals.len(),
            records = header.datarecords_in_file,
            "header parsed"
        );

        Ok(EdfReader {
            file,
            header,
            buffer_offsets,
            sample_positions,
            record_size,
        })
    }

    pub fn header(&self) -> &EdfHeader {
        &self.header
    }

    /// Hands back the underlying stream
    pub fn into_inner(self) -> R {
        self.file
    }

    /// Reads up to `count` samples of `signal` converted to physical units
    ///
    /// The conversion is linear between the (digital, physical) extremes
    /// declared in the header.
    pub fn read_physical_samples(&mut self, signal: usize, count: usize) -> Result<Vec<f64>> {
        let digital_samples = self.read_digital_samples(signal, count)?;

        let signal_param = &self.header.signals[signal];
        Ok(digital_samples
            .into_iter()
            .map(|d| signal_param.to_physical(d))
            .collect())
    }

    /// Reads up to `count` raw samples of `signal`
    ///
    /// Reading stops at the end of the last complete record, so the result may
    /// be shorter than `count`.
    ///
    /// # Errors
    ///
    /// * `EdfError::InvalidSignalIndex` - signal index is out of bounds
    /// * `EdfError::Io` - the stream ended inside a declared record
    pub fn read_digital_samples(&mut self, signal: usize, count: usize) -> Result<Vec<i32>> {
        if signal >= self.header.signals.len() {
            return Err(EdfError::InvalidSignalIndex(signal));
        }

        let format = self.header.format;
        let width = format.bytes_per_sample();
        let signal_param = &self.header.signals[signal];
        let spr = signal_param.samples_per_record as i64;

        // 计算可读取的最大样本数
        let available = (signal_param.samples_in_file - self.sample_positions[signal]).max(0) as usize;
        let actual_count = count.min(available);

        let mut samples = Vec::with_capacity(actual_count);
        let mut chunk = Vec::new();

        while samples.len() < actual_count {
            let current_pos = self.sample_positions[signal];
            let record_index = current_pos / spr;
            let sample_in_record = current_pos % spr;

            let file_offset = self.header.header_size as u64
                + record_index as u64 * self.record_size as u64
                + self.buffer_offsets[signal] as u64
                + sample_in_record as u64 * width as u64;
            self.file.seek(SeekFrom::Start(file_offset))?;

            // 一次读取当前记录内的连续样本
            let to_read = (actual_count - samples.len()).min((spr - sample_in_record) as usize);
            chunk.resize(to_read * width, 0);
            self.file.read_exact(&mut chunk)?;

            for slot in 0..to_read {
                let value = field::get_sample(&chunk, slot, format);
                samples.push(value.clamp(signal_param.digital_min, signal_param.digital_max));
            }

            self.sample_positions[signal] = current_pos + to_read as i64;
        }

        Ok(samples)
    }

    /// 设置指定信号的样本位置
    pub fn seek(&mut self, signal: usize, position: i64) -> Result<i64> {
        if signal >= self.header.signals.len() {
            return Err(EdfError::InvalidSignalIndex(signal));
        }

        let max_position = self.header.signals[signal].samples_in_file;
        let new_position = position.clamp(0, max_position);
        self.sample_positions[signal] = new_position;

        Ok(new_position)
    }

    /// 获取指定信号的当前样本位置
    pub fn tell(&self, signal: usize) -> Result<i64> {
        self.sample_positions
            .get(signal)
            .copied()
            .ok_or(EdfError::InvalidSignalIndex(signal))
    }

    /// 将指定信号的位置重置到开头
    pub fn rewind(&mut self, signal: usize) -> Result<()> {
        self.seek(signal, 0)?;
        Ok(())
    }

    fn parse_header(reader: &mut R) -> Result<(EdfHeader, Vec<usize>, usize)> {
        // 读取主头部（256字节）
        reader.seek(SeekFrom::Start(0))?;
        let mut main_header = [0u8; 256];
        reader.read_exact(&mut main_header)?;

        let format = if &main_header[0..8] == FileFormat::Bdf.version_tag() {
            FileFormat::Bdf
        } else if &main_header[0..8] == FileFormat::Edf.version_tag() {
            FileFormat::Edf
        } else {
            return Err(EdfError::UnsupportedFileType(format!(
                "Not an EDF or BDF file: {:?}",
                String::from_utf8_lossy(&main_header[0..8])
            )));
        };

        // 解析信号数量
        let signal_count = atoi_nonlocalized(&String::from_utf8_lossy(&main_header[252..256]));
        if signal_count < 1 || signal_count > EDF_MAX_CHANNELS as i64 {
            return Err(EdfError::InvalidSignalCount(signal_count as i32));
        }
        let n = signal_count as usize;

        // 验证头部大小
        let header_size = atoi_nonlocalized(&String::from_utf8_lossy(&main_header[184..192]));
        if header_size != 256 * (signal_count + 1) {
            return Err(EdfError::InvalidHeader);
        }
        let header_size = header_size as usize;

        let patient = String::from_utf8_lossy(&main_header[8..88]).trim_end().to_string();
        let recording = String::from_utf8_lossy(&main_header[88..168]).trim_end().to_string();
        let (start_date, start_time) = Self::parse_datetime(
            &String::from_utf8_lossy(&main_header[168..176]),
            &String::from_utf8_lossy(&main_header[176..184]),
        )?;

        let declared_records = atoi_nonlocalized(&String::from_utf8_lossy(&main_header[236..244]));
        let datarecord_duration = parse_record_duration(&String::from_utf8_lossy(&main_header[244..252]))?;

        // 读取信号头部信息
        let mut signal_header = vec![0u8; n * 256];
        reader.read_exact(&mut signal_header)?;
        let (mut signals, buffer_offsets, record_size) = Self::parse_signals(&signal_header, n, format)?;

        // 未完成的转换仍保留 -1，按文件长度推算
        let datarecords = if declared_records >= 0 {
            declared_records
        } else {
            let file_len = reader.seek(SeekFrom::End(0))?;
            let data_len = file_len.saturating_sub(header_size as u64);
            (data_len / record_size.max(1) as u64) as i64
        };
        for signal in signals.iter_mut() {
            signal.samples_in_file = signal.samples_per_record as i64 * datarecords;
        }

        let header = EdfHeader {
            format,
            patient,
            recording,
            start_date,
            start_time,
            header_size,
            signals,
            datarecords_in_file: datarecords,
            datarecord_duration,
            file_duration: datarecord_duration * datarecords,
        };

        Ok((header, buffer_offsets, record_size))
    }

    /// 解析日期 "dd.mm.yy" 和时间 "hh.mm.ss"
    fn parse_datetime(date_str: &str, time_str: &str) -> Result<(NaiveDate, NaiveTime)> {
        let date_parts: Vec<i64> = date_str.split('.').map(atoi_nonlocalized).collect();
        let time_parts: Vec<i64> = time_str.split('.').map(atoi_nonlocalized).collect();
        if date_parts.len() != 3 || time_parts.len() != 3 {
            return Err(EdfError::InvalidFormat(format!(
                "Bad start date/time: {} {}",
                date_str, time_str
            )));
        }

        let yy = date_parts[2];
        let year = if yy > 84 { 1900 + yy } else { 2000 + yy };

        let start_date = NaiveDate::from_ymd_opt(year as i32, date_parts[1] as u32, date_parts[0] as u32)
            .ok_or_else(|| EdfError::InvalidFormat(format!("Bad start date: {}", date_str)))?;
        let start_time = NaiveTime::from_hms_opt(time_parts[0] as u32, time_parts[1] as u32, time_parts[2] as u32)
            .ok_or_else(|| EdfError::InvalidFormat(format!("Bad start time: {}", time_str)))?;

        Ok((start_date, start_time))
    }

    /// 解析信号参数，字段按通道依次排列
    fn parse_signals(
        signal_header: &[u8],
        n: usize,
        format: FileFormat,
    ) -> Result<(Vec<SignalParam>, Vec<usize>, usize)> {
        let text = |base: usize, width: usize, i: usize| -> String {
            let start = n * base + i * width;
            String::from_utf8_lossy(&signal_header[start..start + width])
                .trim_end()
                .to_string()
        };

        let mut signals = Vec::with_capacity(n);
        let mut buffer_offsets = Vec::with_capacity(n);
        let mut buffer_offset = 0;

        for i in 0..n {
            let physical_min = atof_nonlocalized(&text(104, 8, i));
            let physical_max = atof_nonlocalized(&text(112, 8, i));
            let digital_min = atoi_nonlocalized(&text(120, 8, i)) as i32;
            let digital_max = atoi_nonlocalized(&text(128, 8, i)) as i32;
            let samples_per_record = atoi_nonlocalized(&text(216, 8, i)) as i32;

            if physical_min == physical_max {
                return Err(EdfError::InvalidFormat(format!("Signal {}: physical minimum equals maximum", i)));
            }
            if digital_min >= digital_max {
                return Err(EdfError::InvalidFormat(format!("Signal {}: bad digital range", i)));
            }
            if samples_per_record < 1 {
                return Err(EdfError::InvalidFormat(format!("Signal {}: bad samples per record", i)));
            }

            signals.push(SignalParam {
                label: text(0, 16, i),
                samples_in_file: 0,
                physical_max,
                physical_min,
                digital_max,
                digital_min,
                samples_per_record,
                physical_dimension: text(96, 8, i),
                prefilter: text(136, 80, i),
                transducer: text(16, 80, i),
            });

            buffer_offsets.push(buffer_offset);
            buffer_offset += samples_per_record as usize * format.bytes_per_sample();
        }

        Ok((signals, buffer_offsets, buffer_offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Channel, RecordLayout, RecordingInfo};
    use crate::writer::EdfWriter;
    use std::io::Cursor;

    fn written(format: FileFormat, lines: &[[f64; 2]], finalize: bool) -> Vec<u8> {
        let channels = ["Heart", "Flow"]
            .iter()
            .map(|label| {
                let mut ch = Channel {
                    label: label.to_string(),
                    physical_dimension: "mV".to_string(),
                    physical_maximum: 0.0,
                    multiplier: 1.0,
                    sensitivity: 0.0,
                };
                ch.calibrate(100.0, format);
                ch
            })
            .collect();

        let mut writer = EdfWriter::new(Cursor::new(Vec::new()), format, channels, RecordLayout::for_frequency(20.0));
        let info = RecordingInfo::new("Patient X", "Lab 3", 98, 7, 14, 23, 1, 2).unwrap();
        writer.write_header(&info).unwrap();
        for line in lines {
            writer.write_samples(line).unwrap();
        }

        let mut bytes = writer.finalize().unwrap().0.into_inner();
        if !finalize {
            // 模拟中断的转换：记录数仍为 -1
            bytes[236..244].copy_from_slice(b"-1      ");
        }
        bytes
    }

    #[test]
    fn test_parse_edf_header() {
        let bytes = written(FileFormat::Edf, &[[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]], true);
        let reader = EdfReader::from_reader(Cursor::new(bytes)).unwrap();
        let header = reader.header();

        assert_eq!(header.format, FileFormat::Edf);
        assert_eq!(header.patient, "Patient X");
        assert_eq!(header.recording, "Lab 3");
        assert_eq!(header.start_date, NaiveDate::from_ymd_opt(1998, 7, 14).unwrap());
        assert_eq!(header.start_time, NaiveTime::from_hms_opt(23, 1, 2).unwrap());
        assert_eq!(header.header_size, 768);
        assert_eq!(header.datarecords_in_file, 1);
        assert_eq!(header.datarecord_duration, 1_000_000);
        assert_eq!(header.signals.len(), 2);
        assert_eq!(header.signals[1].label, "Flow");
        assert_eq!(header.signals[1].physical_dimension, "mV");
        assert_eq!(header.signals[1].physical_min, -100.0);
        assert_eq!(header.signals[1].samples_per_record, 2);
        assert_eq!(header.signals[1].samples_in_file, 2);
    }

    #[test]
    fn test_read_digital_per_signal() {
        let bytes = written(FileFormat::Bdf, &[[1.0, -1.0], [2.0, -2.0], [3.0, -3.0], [4.0, -4.0]], true);
        let mut reader = EdfReader::from_reader(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.header().format, FileFormat::Bdf);

        let sens = 8_388_607.0 / 100.0;
        let expected: Vec<i32> = [1.0f64, 2.0, 3.0, 4.0].iter().map(|v| (v * sens).trunc() as i32).collect();
        assert_eq!(reader.read_digital_samples(0, 10).unwrap(), expected);
        assert_eq!(reader.tell(0).unwrap(), 4);
        assert_eq!(reader.tell(1).unwrap(), 0);

        let flow = reader.read_digital_samples(1, 3).unwrap();
        assert_eq!(flow, vec![-expected[0], -expected[1], -expected[2]]);

        reader.rewind(0).unwrap();
        assert_eq!(reader.seek(0, 100).unwrap(), 4);
        assert!(reader.read_digital_samples(0, 1).unwrap().is_empty());
        assert!(reader.read_digital_samples(2, 1).is_err());
    }

    #[test]
    fn test_physical_values_round_trip() {
        let bytes = written(FileFormat::Edf, &[[50.0, -25.0], [99.0, 0.0]], true);
        let mut reader = EdfReader::from_reader(Cursor::new(bytes)).unwrap();

        let values = reader.read_physical_samples(0, 2).unwrap();
        let step = 200.0 / 65535.0;
        assert!((values[0] - 50.0).abs() < 2.0 * step);
        assert!((values[1] - 99.0).abs() < 2.0 * step);
    }

    #[test]
    fn test_unpatched_record_count_uses_file_length() {
        let bytes = written(FileFormat::Edf, &[[1.0, 1.0], [2.0, 2.0], [3.0, 3.0], [4.0, 4.0]], false);
        let reader = EdfReader::from_reader(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.header().datarecords_in_file, 2);
    }

    #[test]
    fn test_rejects_foreign_files() {
        let mut bytes = written(FileFormat::Edf, &[[1.0, 1.0], [1.0, 1.0]], true);
        bytes[0] = b'X';
        assert!(matches!(
            EdfReader::from_reader(Cursor::new(bytes)),
            Err(EdfError::UnsupportedFileType(_))
        ));

        let mut bytes = written(FileFormat::Edf, &[[1.0, 1.0], [1.0, 1.0]], true);
        bytes[184..192].copy_from_slice(b"512     ");
        assert!(matches!(
            EdfReader::from_reader(Cursor::new(bytes)),
            Err(EdfError::InvalidHeader)
        ));
    }
}
