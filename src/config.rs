use std::fs;
use std::path::Path;

use roxmltree::{Document, Node};
use tracing::debug;

use crate::error::{EdfError, Result};
use crate::types::{Channel, FileFormat, RecordLayout};
use crate::utils::{atof_nonlocalized, atoi_nonlocalized};
use crate::{EDF_MAX_CHANNELS, MAX_PHYSICAL_VALUE};

/// Root element of an EDFbrowser ASCII-to-EDF template
pub const TEMPLATE_ROOT: &str = "EDFbrowser_ascii2edf_template";

/// Template entry for one text column
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSpec {
    /// Only enabled columns become channels
    pub enabled: bool,
    pub label: String,
    pub physical_dimension: String,
    /// Used when auto-ranging is off
    pub physical_maximum: f64,
    pub multiplier: f64,
}

impl ColumnSpec {
    pub fn new(label: &str, physical_dimension: &str) -> Self {
        ColumnSpec {
            enabled: true,
            label: label.to_string(),
            physical_dimension: physical_dimension.to_string(),
            physical_maximum: 0.0,
            multiplier: 1.0,
        }
    }
}

/// Validated conversion settings
///
/// Loaded once and shared read-only with every stage of the conversion.
///
/// # Examples
///
/// ```rust
/// use ascii2edf::{Configuration, FileFormat};
///
/// let template = r#"
/// <EDFbrowser_ascii2edf_template>
///   <separator>tab</separator>
///   <columns>2</columns>
///   <startline>2</startline>
///   <samplefrequency>256.0</samplefrequency>
///   <autophysicalmaximum>1</autophysicalmaximum>
///   <edf_format>1</edf_format>
///   <signalparams>
///     <checked>0</checked>
///     <label>Time</label>
///     <physical_maximum></physical_maximum>
///     <physical_dimension>s</physical_dimension>
///     <multiplier>1.000000</multiplier>
///   </signalparams>
///   <signalparams>
///     <checked>1</checked>
///     <label>Flow</label>
///     <physical_maximum></physical_maximum>
///     <physical_dimension>l/m</physical_dimension>
///     <multiplier>1.000000</multiplier>
///   </signalparams>
/// </EDFbrowser_ascii2edf_template>"#;
///
/// let config = Configuration::from_template_str(template)?;
/// assert_eq!(config.separator, b'\t');
/// assert_eq!(config.format, FileFormat::Edf);
/// assert_eq!(config.channel_count(), 1);
/// # Ok::<(), ascii2edf::EdfError>(())
/// ```
#[derive(Debug, Clone)]
pub struct Configuration {
    pub separator: u8,
    pub columns: usize,
    /// 1-indexed first data line; earlier lines are skipped
    pub startline: usize,
    pub sample_frequency: f64,
    pub auto_physical_maximum: bool,
    pub format: FileFormat,
    pub column_specs: Vec<ColumnSpec>,
}

impl Configuration {
    /// Builds a configuration where every column is enabled
    pub fn new(separator: u8, sample_frequency: f64, format: FileFormat, column_specs: Vec<ColumnSpec>) -> Self {
        Configuration {
            separator,
            columns: column_specs.len(),
            startline: 1,
            sample_frequency,
            auto_physical_maximum: true,
            format,
            column_specs,
        }
    }

    /// Loads and validates a template file
    pub fn from_template_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(&path).map_err(|e| {
            EdfError::InvalidTemplate(format!("Can not open {} for reading: {}", path.as_ref().display(), e))
        })?;
        Self::from_template_str(&text)
    }

    /// Parses and validates template XML
    pub fn from_template_str(text: &str) -> Result<Self> {
        let doc = Document::parse(text).map_err(|e| EdfError::InvalidTemplate(e.to_string()))?;
        let root = doc.root_element();
        if !root.has_tag_name(TEMPLATE_ROOT) {
            return Err(EdfError::InvalidTemplate(format!(
                "root element is <{}>, expected <{}>",
                root.tag_name().name(),
                TEMPLATE_ROOT
            )));
        }

        let separator = match required_text(root, "separator")? {
            "tab" => b'\t',
            s if s.len() == 1 && (32..=126).contains(&s.as_bytes()[0]) => s.as_bytes()[0],
            s => return Err(EdfError::InvalidTemplate(format!("invalid separator {:?}", s))),
        };

        let columns = atoi_nonlocalized(required_text(root, "columns")?);
        if !(1..=256).contains(&columns) {
            return Err(EdfError::InvalidTemplate(format!("columns must be 1-256, got {}", columns)));
        }

        let startline = atoi_nonlocalized(required_text(root, "startline")?);
        if !(1..=100).contains(&startline) {
            return Err(EdfError::InvalidTemplate(format!("startline must be 1-100, got {}", startline)));
        }

        let sample_frequency = atof_nonlocalized(required_text(root, "samplefrequency")?);

        // 可选字段：超出范围时使用默认值
        let auto_physical_maximum = match optional_text(root, "autophysicalmaximum").map(atoi_nonlocalized) {
            Some(0) => false,
            _ => true,
        };
        let format = match optional_text(root, "edf_format").map(atoi_nonlocalized) {
            Some(1) => FileFormat::Edf,
            _ => FileFormat::Bdf,
        };

        let params: Vec<Node> = root
            .children()
            .filter(|n| n.is_element() && n.has_tag_name("signalparams"))
            .collect();
        if params.len() < columns as usize {
            return Err(EdfError::InvalidTemplate(format!(
                "{} columns declared but only {} signalparams blocks found",
                columns,
                params.len()
            )));
        }

        let mut column_specs = Vec::with_capacity(columns as usize);
        for node in params.iter().take(columns as usize) {
            let multiplier = match optional_text(*node, "multiplier").map(str::trim) {
                Some(s) if !s.is_empty() => atof_nonlocalized(s),
                _ => 1.0,
            };
            column_specs.push(ColumnSpec {
                enabled: required_text(*node, "checked")? != "0",
                label: required_text(*node, "label")?.to_string(),
                physical_maximum: atof_nonlocalized(required_text(*node, "physical_maximum")?),
                physical_dimension: required_text(*node, "physical_dimension")?.to_string(),
                multiplier,
            });
        }

        let config = Configuration {
            separator,
            columns: columns as usize,
            startline: startline as usize,
            sample_frequency,
            auto_physical_maximum,
            format,
            column_specs,
        };
        config.validate()?;

        debug!(
            columns = config.columns,
            channels = config.channel_count(),
            format = config.format.name(),
            "loaded template"
        );
        Ok(config)
    }

    /// Checks ranges and per-channel constraints
    pub fn validate(&self) -> Result<()> {
        if self.separator == b'\n' || self.separator == b'\r' {
            return Err(EdfError::InvalidTemplate("separator can not be a line break".to_string()));
        }
        if !(1..=256).contains(&self.columns) {
            return Err(EdfError::InvalidTemplate(format!("columns must be 1-256, got {}", self.columns)));
        }
        if self.column_specs.len() != self.columns {
            return Err(EdfError::InvalidTemplate(format!(
                "{} columns declared but {} column specs given",
                self.columns,
                self.column_specs.len()
            )));
        }
        if !(1..=100).contains(&self.startline) {
            return Err(EdfError::InvalidTemplate(format!("startline must be 1-100, got {}", self.startline)));
        }
        if !(0.0000001..=1_000_000.0).contains(&self.sample_frequency) {
            return Err(EdfError::InvalidTemplate(format!(
                "samplefrequency must be 0.0000001-1000000, got {}",
                self.sample_frequency
            )));
        }

        let enabled = self.channel_count();
        if enabled == 0 || enabled > EDF_MAX_CHANNELS {
            return Err(EdfError::InvalidTemplate(format!(
                "between 1 and {} columns must be checked, got {}",
                EDF_MAX_CHANNELS, enabled
            )));
        }

        for spec in self.column_specs.iter().filter(|s| s.enabled) {
            if spec.label.chars().count() > 16 || !spec.label.chars().all(|c| (' '..='~').contains(&c)) {
                return Err(EdfError::InvalidTemplate(format!(
                    "label {:?} must be at most 16 printable ASCII characters",
                    spec.label
                )));
            }
            if spec.physical_dimension.chars().count() > 8 {
                return Err(EdfError::InvalidTemplate(format!(
                    "physical dimension {:?} is longer than 8 characters",
                    spec.physical_dimension
                )));
            }
            if !spec.multiplier.is_finite() || spec.multiplier == 0.0 {
                return Err(EdfError::InvalidTemplate(format!(
                    "multiplier of {:?} must be a non-zero number",
                    spec.label
                )));
            }
            if !self.auto_physical_maximum
                && !(spec.physical_maximum > 0.0 && spec.physical_maximum <= MAX_PHYSICAL_VALUE)
            {
                return Err(EdfError::InvalidTemplate(format!(
                    "physical maximum of {:?} must be in (0, {}]",
                    spec.label, MAX_PHYSICAL_VALUE
                )));
            }
        }

        Ok(())
    }

    /// Number of enabled columns
    pub fn channel_count(&self) -> usize {
        self.column_specs.iter().filter(|s| s.enabled).count()
    }

    /// Uncalibrated channels for the enabled columns, in column order
    pub fn channels(&self) -> Vec<Channel> {
        self.column_specs
            .iter()
            .filter(|s| s.enabled)
            .map(|s| Channel {
                label: s.label.clone(),
                physical_dimension: s.physical_dimension.clone(),
                physical_maximum: s.physical_maximum,
                multiplier: s.multiplier,
                sensitivity: 0.0,
            })
            .collect()
    }

    pub fn record_layout(&self) -> RecordLayout {
        RecordLayout::for_frequency(self.sample_frequency)
    }

    pub fn is_enabled(&self, column: usize) -> bool {
        self.column_specs.get(column).map_or(false, |s| s.enabled)
    }
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|n| n.is_element() && n.has_tag_name(name))
}

fn optional_text<'a>(node: Node<'a, '_>, name: &str) -> Option<&'a str> {
    child(node, name).map(|n| n.text().unwrap_or(""))
}

fn required_text<'a>(node: Node<'a, '_>, name: &str) -> Result<&'a str> {
    optional_text(node, name)
        .ok_or_else(|| EdfError::InvalidTemplate(format!("missing <{}> element", name)))
}
