// Internal utilities for documentation tests
// This file contains helper functions to generate input files for doctests

use std::fs;
use std::path::Path;

use crate::{convert_file, Configuration, RecordingInfo, Result};

/// Two checked columns out of three, tab separated, one header line
pub const SAMPLE_TEMPLATE: &str = r#"<?xml version="1.0"?>
<EDFbrowser_ascii2edf_template>
  <separator>tab</separator>
  <columns>3</columns>
  <startline>2</startline>
  <samplefrequency>2.0000000000</samplefrequency>
  <autophysicalmaximum>1</autophysicalmaximum>
  <edf_format>1</edf_format>
  <signalparams>
    <checked>0</checked>
    <label>Time</label>
    <physical_maximum>0.00000000</physical_maximum>
    <physical_dimension>s</physical_dimension>
    <multiplier>1.0000000000</multiplier>
  </signalparams>
  <signalparams>
    <checked>1</checked>
    <label>Heart</label>
    <physical_maximum>0.00000000</physical_maximum>
    <physical_dimension>bpm</physical_dimension>
    <multiplier>1.0000000000</multiplier>
  </signalparams>
  <signalparams>
    <checked>1</checked>
    <label>Flow</label>
    <physical_maximum>0.00000000</physical_maximum>
    <physical_dimension>l/m</physical_dimension>
    <multiplier>1.0000000000</multiplier>
  </signalparams>
</EDFbrowser_ascii2edf_template>
"#;

/// Creates a tab separated sample file matching [`SAMPLE_TEMPLATE`]
pub fn create_sample_csv<P: AsRef<Path>>(path: P) -> Result<()> {
    let mut text = String::from("time\theart\tflow\n");
    for i in 0..8 {
        let t = i as f64 * 0.5;
        let heart = 60.0 + 10.0 * (t * std::f64::consts::PI).sin();
        // 小数点逗号，解析时转换为点
        let flow = format!("{:.2}", -2.0 + i as f64 * 0.5).replace('.', ",");
        text.push_str(&format!("{:.1}\t{:.3}\t{}\n", t, heart, flow));
    }
    fs::write(path, text)?;
    Ok(())
}

pub fn create_template_file<P: AsRef<Path>>(path: P) -> Result<()> {
    fs::write(path, SAMPLE_TEMPLATE)?;
    Ok(())
}

/// Converts the sample data into an EDF file at `path`
pub fn create_converted_file<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    let csv = path.with_extension("doctest.txt");
    create_sample_csv(&csv)?;

    let config = Configuration::from_template_str(SAMPLE_TEMPLATE)?;
    let info = RecordingInfo::new("Doc Patient", "Doc Recording", 24, 3, 1, 12, 0, 0)?;
    let result = convert_file(&config, &csv, path, &info);

    fs::remove_file(&csv).ok();
    result.map(|_| ())
}
