use ascii2edf::{convert_file, Configuration, EdfError, EdfReader, FileFormat, RecordingInfo};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// 生成模板XML的辅助函数
fn template_xml(
    separator: &str,
    startline: usize,
    frequency: f64,
    auto: bool,
    format: FileFormat,
    columns: &[(bool, &str, &str, f64, f64)],
) -> String {
    let mut xml = String::from("<?xml version=\"1.0\"?>\n<EDFbrowser_ascii2edf_template>\n");
    xml.push_str(&format!("  <separator>{}</separator>\n", separator));
    xml.push_str(&format!("  <columns>{}</columns>\n", columns.len()));
    xml.push_str(&format!("  <startline>{}</startline>\n", startline));
    xml.push_str(&format!("  <samplefrequency>{:.10}</samplefrequency>\n", frequency));
    xml.push_str(&format!("  <autophysicalmaximum>{}</autophysicalmaximum>\n", auto as u8));
    xml.push_str(&format!("  <edf_format>{}</edf_format>\n", (format == FileFormat::Edf) as u8));
    for (checked, label, dim, physmax, multiplier) in columns {
        xml.push_str("  <signalparams>\n");
        xml.push_str(&format!("    <checked>{}</checked>\n", *checked as u8));
        xml.push_str(&format!("    <label>{}</label>\n", label));
        xml.push_str(&format!("    <physical_maximum>{:.8}</physical_maximum>\n", physmax));
        xml.push_str(&format!("    <physical_dimension>{}</physical_dimension>\n", dim));
        xml.push_str(&format!("    <multiplier>{:.10}</multiplier>\n", multiplier));
        xml.push_str("  </signalparams>\n");
    }
    xml.push_str("</EDFbrowser_ascii2edf_template>\n");
    xml
}

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        Workspace {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.path(name);
        fs::write(&path, contents).unwrap();
        path
    }

    /// 写入模板并加载，再执行转换
    fn convert(&self, template: &str, data: &str, output: &str) -> Result<(PathBuf, u64), EdfError> {
        let template_path = self.write("template.xml", template);
        let input = self.write("input.txt", data);
        let output = self.path(output);

        let config = Configuration::from_template_file(&template_path)?;
        let summary = convert_file(&config, &input, &output, &recording_info())?;
        Ok((output, summary.datarecords))
    }
}

fn recording_info() -> RecordingInfo {
    RecordingInfo::new("Test Subject", "Integration run", 13, 4, 22, 9, 30, 0).unwrap()
}

fn tsv_template(format: FileFormat) -> String {
    template_xml(
        "tab",
        2,
        1.0,
        true,
        format,
        &[(true, "Heart", "bpm", 0.0, 1.0), (true, "Flow", "l/m", 0.0, 1.0)],
    )
}

fn data_section(path: &Path) -> Vec<u8> {
    let bytes = fs::read(path).unwrap();
    let header_size: usize = String::from_utf8_lossy(&bytes[184..192]).trim().parse().unwrap();
    bytes[header_size..].to_vec()
}

#[test]
fn test_tsv_auto_range_edf() {
    let ws = Workspace::new();
    let (output, records) = ws
        .convert(&tsv_template(FileFormat::Edf), "heart\tflow\n1\t-2\n3\t-4\n", "out.edf")
        .unwrap();
    assert_eq!(records, 2);

    let bytes = fs::read(&output).unwrap();
    assert_eq!(bytes.len(), 768 + 2 * 4);
    assert_eq!(&bytes[0..8], b"0       ");
    assert_eq!(&bytes[168..184], b"22.04.1309.30.00");
    assert_eq!(&bytes[236..244], b"2       ");
    assert_eq!(&bytes[244..252], b"1       ");

    // 10922, -16383 | 32767, -32767
    assert_eq!(
        data_section(&output),
        [0xAA, 0x2A, 0x01, 0xC0, 0xFF, 0x7F, 0x01, 0x80]
    );

    let reader = EdfReader::open(&output).unwrap();
    let header = reader.header();
    assert_eq!(header.signals[0].physical_max, 3.0);
    assert_eq!(header.signals[0].physical_min, -3.0);
    assert_eq!(header.signals[1].physical_max, 4.0);
    assert_eq!(header.signals[1].digital_min, -32768);
}

#[test]
fn test_bdf_three_byte_samples() {
    let ws = Workspace::new();
    let (output, records) = ws
        .convert(&tsv_template(FileFormat::Bdf), "heart\tflow\n1\t-2\n3\t-4\n", "out.bdf")
        .unwrap();
    assert_eq!(records, 2);

    let bytes = fs::read(&output).unwrap();
    assert_eq!(&bytes[0..8], b"\xffBIOSEMI");
    // 2796202, -4194303 | 8388607, -8388607
    assert_eq!(
        data_section(&output),
        [0xAA, 0xAA, 0x2A, 0x01, 0x00, 0xC0, 0xFF, 0xFF, 0x7F, 0x01, 0x00, 0x80]
    );

    let mut reader = EdfReader::open(&output).unwrap();
    assert_eq!(reader.header().format, FileFormat::Bdf);
    assert_eq!(reader.read_digital_samples(0, 2).unwrap(), [2_796_202, 8_388_607]);
}

#[test]
fn test_round_trip_header_fields() {
    let ws = Workspace::new();
    let template = template_xml(
        ";",
        1,
        256.0,
        true,
        FileFormat::Edf,
        &[
            (false, "Time", "s", 0.0, 1.0),
            (true, "EEG Fp1", "uV", 0.0, 1.0),
            (true, "EEG Fp2-Ref long", "uV", 0.0, 1.0),
            (true, "Resp", "mV", 0.0, 1.0),
        ],
    );

    let mut data = String::new();
    for i in 0..512 {
        data.push_str(&format!("{};{};{};{}\n", i, i % 7, -(i % 5), i % 3));
    }
    let (output, records) = ws.convert(&template, &data, "rt.edf").unwrap();
    assert_eq!(records, 2);

    let reader = EdfReader::open(&output).unwrap();
    let header = reader.header();
    assert_eq!(header.signals.len(), 3);
    let labels: Vec<&str> = header.signals.iter().map(|s| s.label.as_str()).collect();
    assert_eq!(labels, ["EEG Fp1", "EEG Fp2-Ref long", "Resp"]);
    let dims: Vec<&str> = header.signals.iter().map(|s| s.physical_dimension.as_str()).collect();
    assert_eq!(dims, ["uV", "uV", "mV"]);
    assert!(header.signals.iter().all(|s| s.samples_per_record == 256));
    assert_eq!(header.datarecords_in_file, 2);
    assert_eq!(header.datarecord_duration, 10_000_000);
    assert_eq!(header.patient, "Test Subject");
    assert_eq!(header.recording, "Integration run");
}

#[test]
fn test_incomplete_record_is_dropped() {
    let ws = Workspace::new();
    let template = template_xml("tab", 1, 20.0, true, FileFormat::Edf, &[(true, "A", "uV", 0.0, 1.0)]);
    let (output, records) = ws.convert(&template, "1\n2\n3\n4\n5\n", "odd.edf").unwrap();

    // 20 Hz: 0.1 s records of 2 samples
    assert_eq!(records, 2);
    let bytes = fs::read(&output).unwrap();
    assert_eq!(&bytes[244..252], b"0.1     ");
    assert_eq!(bytes.len(), 512 + 2 * 2 * 2);
}

#[test]
fn test_trailing_short_line_is_ignored() {
    let ws = Workspace::new();
    let (output, records) = ws
        .convert(&tsv_template(FileFormat::Edf), "heart\tflow\n1\t-2\n3\t-4\n5\n", "trail.edf")
        .unwrap();
    assert_eq!(records, 2);

    // 截断行不影响自动量程
    let reader = EdfReader::open(&output).unwrap();
    assert_eq!(reader.header().signals[0].physical_max, 3.0);
}

#[test]
fn test_short_line_followed_by_data_is_fatal() {
    let ws = Workspace::new();
    let data = "heart\tflow\n1\t-2\n5\n3\t-4\n3\t-4\n3\t-4\n";
    let result = ws.convert(&tsv_template(FileFormat::Edf), data, "bad.edf");

    assert!(matches!(
        result,
        Err(EdfError::ColumnMismatch { line: 3, found: 1, expected: 2 })
    ));
    // 输出文件在校准通过之前不会创建
    assert!(!ws.path("bad.edf").exists());
}

#[test]
fn test_overlong_line_is_fatal() {
    let ws = Workspace::new();
    let long_field = "1".repeat(3000);
    let data = format!("heart\tflow\n1\t2\n{}\t2\n", long_field);
    let result = ws.convert(&tsv_template(FileFormat::Edf), &data, "long.edf");
    assert!(matches!(result, Err(EdfError::LineTooLong { line: 3 })));
}

#[test]
fn test_wrong_first_line_is_rejected_strictly() {
    let ws = Workspace::new();
    let result = ws.convert(&tsv_template(FileFormat::Edf), "heart\tflow\n1\n", "first.edf");
    assert!(matches!(
        result,
        Err(EdfError::ColumnMismatch { line: 2, found: 1, expected: 2 })
    ));

    let result = ws.convert(&tsv_template(FileFormat::Edf), "heart\tflow\n", "empty.edf");
    assert!(matches!(result, Err(EdfError::NotEnoughLines)));
}

#[test]
fn test_decimal_comma_and_multiplier() {
    let ws = Workspace::new();
    let template = template_xml(";", 1, 1.0, true, FileFormat::Edf, &[(true, "Temp", "degC", 0.0, 2.0)]);
    let (output, _) = ws.convert(&template, "5\n-2,5\n1,25\n", "comma.edf").unwrap();

    let mut reader = EdfReader::open(&output).unwrap();
    assert_eq!(reader.header().signals[0].physical_max, 10.0);
    assert_eq!(reader.read_digital_samples(0, 3).unwrap(), [32767, -16383, 8191]);
}

#[test]
fn test_manual_range_clamps() {
    let ws = Workspace::new();
    let template = template_xml(",", 1, 1.0, false, FileFormat::Edf, &[(true, "P", "mmHg", 100.0, 1.0)]);
    let (output, _) = ws.convert(&template, "50\n150\n-150\n", "manual.edf").unwrap();

    let mut reader = EdfReader::open(&output).unwrap();
    assert_eq!(reader.header().signals[0].physical_max, 100.0);
    assert_eq!(reader.read_digital_samples(0, 3).unwrap(), [16383, 32767, -32768]);
}

#[test]
fn test_patient_text_is_folded_to_ascii() {
    let ws = Workspace::new();
    let template_path = ws.write("t.xml", &tsv_template(FileFormat::Edf));
    let input = ws.write("in.txt", "h\tf\n1\t1\n");
    let output = ws.path("latin.edf");

    let config = Configuration::from_template_file(&template_path).unwrap();
    let info = RecordingInfo::new("Ren\u{e9}e M\u{fc}ller", "", 99, 12, 31, 23, 59, 59).unwrap();
    convert_file(&config, &input, &output, &info).unwrap();

    let bytes = fs::read(&output).unwrap();
    assert_eq!(&bytes[8..21], b"Renee Muller ");
    assert_eq!(&bytes[168..176], b"31.12.99");
}

#[test]
fn test_access_errors() {
    let ws = Workspace::new();
    let template_path = ws.write("t.xml", &tsv_template(FileFormat::Edf));
    let config = Configuration::from_template_file(&template_path).unwrap();

    let result = convert_file(&config, ws.path("missing.txt"), ws.path("out.edf"), &recording_info());
    assert!(matches!(result, Err(EdfError::InputAccess { .. })));

    let input = ws.write("in.txt", "h\tf\n1\t1\n");
    let result = convert_file(&config, &input, ws.path("no/such/dir/out.edf"), &recording_info());
    assert!(matches!(result, Err(EdfError::OutputAccess { .. })));

    assert!(matches!(
        Configuration::from_template_file(ws.path("missing.xml")),
        Err(EdfError::InvalidTemplate(_))
    ));
}
