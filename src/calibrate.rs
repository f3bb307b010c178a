use std::io::{BufRead, Seek};

use tracing::debug;

use crate::config::Configuration;
use crate::error::Result;
use crate::tokenizer::{LineSink, Tokenizer};
use crate::types::{Channel, FileFormat};
use crate::MAX_PHYSICAL_VALUE;

/// Starting peak, keeps the sensitivity division finite on all-zero input
pub const PEAK_EPSILON: f64 = 0.00001;

/// Tracks the largest absolute value seen per channel
#[derive(Debug, Clone)]
pub struct PeakTracker {
    peaks: Vec<f64>,
}

impl PeakTracker {
    pub fn new(channels: usize) -> Self {
        PeakTracker {
            peaks: vec![PEAK_EPSILON; channels],
        }
    }

    pub fn peaks(&self) -> &[f64] {
        &self.peaks
    }

    /// Derives physical maxima and sensitivities from the observed peaks
    ///
    /// `physical_maximum = min(peak × multiplier, 9999999)`, and
    /// `sensitivity = full_scale / physical_maximum × multiplier`.
    pub fn apply(&self, channels: &mut [Channel], format: FileFormat) {
        for (channel, &peak) in channels.iter_mut().zip(&self.peaks) {
            let physical_maximum = (peak * channel.multiplier).min(MAX_PHYSICAL_VALUE);
            channel.calibrate(physical_maximum, format);
        }
    }
}

impl LineSink for PeakTracker {
    fn consume(&mut self, values: &[f64]) -> Result<()> {
        for (peak, value) in self.peaks.iter_mut().zip(values) {
            *peak = peak.max(value.abs());
        }
        Ok(())
    }
}

/// Builds the calibrated channel table
///
/// With auto-ranging this drives one full pass over the data. Otherwise the
/// template's physical maxima are used as-is.
pub fn calibrate<R: BufRead + Seek>(config: &Configuration, tokenizer: &mut Tokenizer<'_, R>) -> Result<Vec<Channel>> {
    let mut channels = config.channels();

    if config.auto_physical_maximum {
        let mut tracker = PeakTracker::new(channels.len());
        let lines = tokenizer.drive(&mut tracker)?;
        tracker.apply(&mut channels, config.format);
        debug!(lines, "auto physical maximum pass complete");
    } else {
        for channel in channels.iter_mut() {
            let physical_maximum = channel.physical_maximum;
            channel.calibrate(physical_maximum, config.format);
        }
    }

    for channel in &channels {
        debug!(
            label = %channel.label,
            physical_maximum = channel.physical_maximum,
            sensitivity = channel.sensitivity,
            "calibrated channel"
        );
    }

    Ok(channels)
}
