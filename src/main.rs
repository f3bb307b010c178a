//! ascii2edf command line converter
//!
//! ## Usage
//!
//! ```bash
//! # input template subject recording yy mm dd hh mm ss output
//! ascii2edf data.csv template.xml "Subject 1" "Sleep lab" 13 04 22 09 30 00 out.edf
//!
//! # Show calibration and pass details
//! ascii2edf --log-level debug data.csv template.xml "" "" 24 1 1 0 0 0 out.bdf
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use ascii2edf::{convert_file, Configuration, ConversionSummary, RecordingInfo};

#[derive(Parser, Debug)]
#[command(name = "ascii2edf")]
#[command(version)]
#[command(about = "Convert CSV/TSV samples into an EDF or BDF file", long_about = None)]
struct Args {
    /// Delimited text file with one sample per line
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// EDFbrowser ascii2edf template (XML)
    #[arg(value_name = "TEMPLATE")]
    template: PathBuf,

    /// Subject name written into the header
    subject: String,

    /// Recording name written into the header
    recording: String,

    /// Start year, two digits (85-99 → 19xx, 00-84 → 20xx)
    #[arg(value_parser = clap::value_parser!(u32).range(0..=99))]
    year: u32,

    #[arg(value_parser = clap::value_parser!(u32).range(1..=12))]
    month: u32,

    #[arg(value_parser = clap::value_parser!(u32).range(1..=31))]
    day: u32,

    #[arg(value_parser = clap::value_parser!(u32).range(0..=23))]
    hour: u32,

    #[arg(value_parser = clap::value_parser!(u32).range(0..=59))]
    minute: u32,

    #[arg(value_parser = clap::value_parser!(u32).range(0..=59))]
    second: u32,

    /// Output EDF/BDF file, created or truncated
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn run(args: &Args) -> ascii2edf::Result<ConversionSummary> {
    // 参数错误先于任何文件访问
    let info = RecordingInfo::new(
        &args.subject,
        &args.recording,
        args.year,
        args.month,
        args.day,
        args.hour,
        args.minute,
        args.second,
    )?;
    let config = Configuration::from_template_file(&args.template)?;

    convert_file(&config, &args.input, &args.output, &info)
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        // --help / --version
        Err(e) if !e.use_stderr() => e.exit(),
        Err(e) => {
            e.print().ok();
            return ExitCode::FAILURE;
        }
    };

    // Initialize logging
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    match run(&args) {
        Ok(summary) => {
            println!(
                "Done. {} file is located at {}",
                summary.format.name(),
                args.output.display()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ascii2edf::EdfError;

    fn args(template: &str, month: &str, day: &str) -> Args {
        Args::try_parse_from([
            "ascii2edf", "in.csv", template, "Subject", "Lab", "13", month, day, "9", "30", "0", "out.edf",
        ])
        .unwrap()
    }

    #[test]
    fn test_out_of_range_fields_are_usage_errors() {
        let base = ["ascii2edf", "in.csv", "t.xml", "S", "R", "13", "4", "22", "9", "30", "0", "out.edf"];
        assert!(Args::try_parse_from(base).is_ok());

        for (index, value) in [(5, "100"), (6, "13"), (7, "0"), (8, "24"), (9, "60"), (10, "60")] {
            let mut argv = base;
            argv[index] = value;
            assert!(Args::try_parse_from(argv).is_err(), "argument {} = {}", index, value);
        }
        assert!(Args::try_parse_from(base[..11].iter().copied()).is_err());
    }

    #[test]
    fn test_bad_date_is_reported_before_template_is_read() {
        let result = run(&args("/nonexistent/template.xml", "2", "31"));
        assert!(matches!(result, Err(EdfError::InvalidArgument(_))));
    }

    #[test]
    fn test_missing_template_is_reported() {
        let result = run(&args("/nonexistent/template.xml", "2", "28"));
        assert!(matches!(result, Err(EdfError::InvalidTemplate(_))));
    }
}
