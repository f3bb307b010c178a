use chrono::{NaiveDate, NaiveTime};

use crate::error::{EdfError, Result};

/// Container variant produced by the converter.
///
/// `Edf` stores 16-bit samples, `Bdf` (BioSemi) stores 24-bit samples. Both
/// share the same header layout apart from the version field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Edf,
    Bdf,
}

impl FileFormat {
    /// The 8-byte version field that opens the header
    pub fn version_tag(self) -> &'static [u8; 8] {
        match self {
            FileFormat::Edf => b"0       ",
            FileFormat::Bdf => b"\xffBIOSEMI",
        }
    }

    pub fn digital_min(self) -> i32 {
        match self {
            FileFormat::Edf => -32768,
            FileFormat::Bdf => -8_388_608,
        }
    }

    pub fn digital_max(self) -> i32 {
        match self {
            FileFormat::Edf => 32767,
            FileFormat::Bdf => 8_388_607,
        }
    }

    /// Digital counts that map onto the physical maximum
    pub fn full_scale(self) -> f64 {
        self.digital_max() as f64
    }

    pub fn bytes_per_sample(self) -> usize {
        match self {
            FileFormat::Edf => 2,
            FileFormat::Bdf => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            FileFormat::Edf => "EDF",
            FileFormat::Bdf => "BDF",
        }
    }
}

/// One recorded channel, derived from an enabled template column
#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    pub label: String,
    pub physical_dimension: String,
    /// Symmetric range: the header's physical minimum is the negation
    pub physical_maximum: f64,
    pub multiplier: f64,
    /// Digital counts per raw input unit
    pub sensitivity: f64,
}

impl Channel {
    /// 设置物理最大值并计算灵敏度
    ///
    /// The multiplier is applied here even when it was already folded into
    /// `physical_maximum` by the auto-ranging pass. Output stays bit-for-bit
    /// compatible with EDFbrowser's ascii2edf.
    pub fn calibrate(&mut self, physical_maximum: f64, format: FileFormat) {
        self.physical_maximum = physical_maximum;
        self.sensitivity = format.full_scale() / physical_maximum * self.multiplier;
    }

    /// Quantizes a raw value, truncating toward zero and clamping to the
    /// format's digital range
    pub fn quantize(&self, value: f64, format: FileFormat) -> i32 {
        let raw = (value * self.sensitivity).trunc();
        raw.clamp(format.digital_min() as f64, format.digital_max() as f64) as i32
    }
}

/// Data record geometry shared by every channel
#[derive(Debug, Clone, PartialEq)]
pub struct RecordLayout {
    /// Record duration exactly as written into the header (at most 8 bytes)
    pub duration_text: String,
    pub samples_per_record: usize,
}

impl RecordLayout {
    /// Derives the record duration from the sample frequency
    ///
    /// Rates below 1 Hz get one sample per record lasting `1/frequency`
    /// seconds. Integer rates that are a multiple of 10 use 0.1 s records,
    /// everything else uses 1 s records.
    pub fn for_frequency(sample_frequency: f64) -> Self {
        if sample_frequency < 1.0 {
            let mut duration_text = format!("{:.8}", 1.0 / sample_frequency);
            duration_text.truncate(8);
            return RecordLayout {
                duration_text,
                samples_per_record: 1,
            };
        }

        let rate = sample_frequency as usize;
        if rate % 10 != 0 {
            RecordLayout {
                duration_text: "1".to_string(),
                samples_per_record: rate,
            }
        } else {
            RecordLayout {
                duration_text: "0.1".to_string(),
                samples_per_record: rate / 10,
            }
        }
    }
}

/// Free-text identification and start timestamp written into the header
#[derive(Debug, Clone)]
pub struct RecordingInfo {
    pub patient: String,
    pub recording: String,
    pub start_date: NaiveDate,
    pub start_time: NaiveTime,
}

impl RecordingInfo {
    /// Builds the identification from the two-digit-year date/time fields
    /// accepted on the command line
    ///
    /// Years 85-99 map to 1985-1999 and 00-84 to 2000-2084, the EDF
    /// clipping convention.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use ascii2edf::RecordingInfo;
    ///
    /// let info = RecordingInfo::new("Subject 1", "Sleep lab", 13, 4, 22, 9, 30, 0)?;
    /// assert_eq!(info.start_date.to_string(), "2013-04-22");
    ///
    /// assert!(RecordingInfo::new("S", "R", 13, 2, 31, 0, 0, 0).is_err());
    /// # Ok::<(), ascii2edf::EdfError>(())
    /// ```
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        patient: &str,
        recording: &str,
        year: u32,
        month: u32,
        day: u32,
        hour: u32,
        minute: u32,
        second: u32,
    ) -> Result<Self> {
        if year > 99
            || !(1..=12).contains(&month)
            || !(1..=31).contains(&day)
            || hour > 23
            || minute > 59
            || second > 59
        {
            return Err(EdfError::InvalidArgument(
                "Invalid date/time specified. All date/time fields must be 2 digits".to_string(),
            ));
        }

        let full_year = if year > 84 { 1900 + year } else { 2000 + year };
        let start_date = NaiveDate::from_ymd_opt(full_year as i32, month, day).ok_or_else(|| {
            EdfError::InvalidArgument(format!("{:02}.{:02}.{:02} is not a calendar date", day, month, year))
        })?;
        let start_time = NaiveTime::from_hms_opt(hour, minute, second)
            .ok_or_else(|| EdfError::InvalidArgument("Invalid start time".to_string()))?;

        Ok(RecordingInfo {
            patient: patient.to_string(),
            recording: recording.to_string(),
            start_date,
            start_time,
        })
    }
}

/// Signal parameters as decoded from an existing EDF/BDF header
#[derive(Debug, Clone)]
pub struct SignalParam {
    pub label: String,
    pub samples_in_file: i64,
    pub physical_max: f64,
    pub physical_min: f64,
    pub digital_max: i32,
    pub digital_min: i32,
    pub samples_per_record: i32,
    pub physical_dimension: String,
    pub prefilter: String,
    pub transducer: String,
}

impl SignalParam {
    /// 计算物理值转换参数
    pub fn bit_value(&self) -> f64 {
        (self.physical_max - self.physical_min) /
        (self.digital_max - self.digital_min) as f64
    }

    /// 计算偏移量
    pub fn offset(&self) -> f64 {
        self.physical_max / self.bit_value() - self.digital_max as f64
    }

    /// 将数字值转换为物理值
    pub fn to_physical(&self, digital_value: i32) -> f64 {
        self.bit_value() * (self.offset() + digital_value as f64)
    }
}

#[derive(Debug)]
pub struct EdfHeader {
    pub format: FileFormat,
    pub patient: String,
    pub recording: String,
    pub start_date: NaiveDate,
    pub start_time: NaiveTime,
    pub header_size: usize,
    pub signals: Vec<SignalParam>,
    pub datarecords_in_file: i64,
    pub datarecord_duration: i64,     // 数据记录持续时间（100纳秒为单位）
    pub file_duration: i64,           // 文件持续时间（100纳秒为单位）
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel(multiplier: f64) -> Channel {
        Channel {
            label: "Flow".to_string(),
            physical_dimension: "l/m".to_string(),
            physical_maximum: 0.0,
            multiplier,
            sensitivity: 0.0,
        }
    }

    #[test]
    fn test_record_layout_rules() {
        let layout = RecordLayout::for_frequency(256.0);
        assert_eq!(layout.duration_text, "1");
        assert_eq!(layout.samples_per_record, 256);

        let layout = RecordLayout::for_frequency(20.0);
        assert_eq!(layout.duration_text, "0.1");
        assert_eq!(layout.samples_per_record, 2);

        let layout = RecordLayout::for_frequency(0.5);
        assert_eq!(layout.duration_text, "2.000000");
        assert_eq!(layout.samples_per_record, 1);

        let layout = RecordLayout::for_frequency(0.3);
        assert_eq!(layout.duration_text, "3.333333");
    }

    #[test]
    fn test_calibrate_applies_multiplier() {
        let mut ch = channel(2.0);
        ch.calibrate(10.0, FileFormat::Edf);
        assert_eq!(ch.physical_maximum, 10.0);
        assert_eq!(ch.sensitivity, 32767.0 / 10.0 * 2.0);
        assert_eq!(ch.quantize(5.0, FileFormat::Edf), 32767);
        assert_eq!(ch.quantize(-2.5, FileFormat::Edf), -16383);
    }

    #[test]
    fn test_quantize_clamps_instead_of_wrapping() {
        let mut ch = channel(1.0);
        ch.calibrate(100.0, FileFormat::Edf);
        assert_eq!(ch.quantize(50.0, FileFormat::Edf), 16383);
        assert_eq!(ch.quantize(150.0, FileFormat::Edf), 32767);
        assert_eq!(ch.quantize(-150.0, FileFormat::Edf), -32768);

        ch.calibrate(100.0, FileFormat::Bdf);
        assert_eq!(ch.quantize(1.0e6, FileFormat::Bdf), 8_388_607);
        assert_eq!(ch.quantize(-1.0e6, FileFormat::Bdf), -8_388_608);
    }

    #[test]
    fn test_recording_info_ranges() {
        assert!(RecordingInfo::new("P", "R", 100, 1, 1, 0, 0, 0).is_err());
        assert!(RecordingInfo::new("P", "R", 10, 13, 1, 0, 0, 0).is_err());
        assert!(RecordingInfo::new("P", "R", 10, 1, 0, 0, 0, 0).is_err());
        assert!(RecordingInfo::new("P", "R", 10, 1, 1, 24, 0, 0).is_err());
        assert!(RecordingInfo::new("P", "R", 10, 1, 1, 0, 60, 0).is_err());
        assert!(RecordingInfo::new("P", "R", 10, 1, 1, 0, 0, 60).is_err());

        let info = RecordingInfo::new("P", "R", 99, 12, 31, 23, 59, 59).unwrap();
        assert_eq!(info.start_date, NaiveDate::from_ymd_opt(1999, 12, 31).unwrap());
    }
}
