//! Shared grid rendering specification models.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::Deserialize;

use crate::conf::{C_ISO_8601, C_LIST_SEP_DEFAULT};
use crate::util::{flatten_field_tree, validate_unique_column_keys};
use crate::value::EnumRecordValue;

////////////////////////////////////////////////////////////////////////////////
// #region CellStyleSpecification

/// Font attributes.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct SpecFont {
    /// Font family name.
    pub name: Option<String>,
    /// Font size in points.
    pub size: Option<f64>,
    /// Bold style.
    pub bold: Option<bool>,
    /// Italic style.
    pub italic: Option<bool>,
    /// Font color (`RRGGBB` or `AARRGGBB`).
    pub color: Option<String>,
}

/// Background fill attributes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct SpecFill {
    /// Pattern type, e.g. `solid`.
    pub fill_type: Option<String>,
    /// Foreground color of the pattern (`RRGGBB` or `AARRGGBB`).
    pub start_color: Option<String>,
}

impl SpecFill {
    /// Solid fill with `color`.
    pub fn solid(color: impl Into<String>) -> Self {
        Self {
            fill_type: Some("solid".to_string()),
            start_color: Some(color.into()),
        }
    }
}

/// Alignment attributes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct SpecAlignment {
    /// Horizontal alignment (`left`, `center`, ...).
    pub horizontal: Option<String>,
    /// Vertical alignment (`top`, `center`, ...).
    pub vertical: Option<String>,
    /// Wrap text.
    #[serde(alias = "wrapText")]
    pub wrap_text: Option<bool>,
    /// Shrink text to fit the cell.
    #[serde(alias = "shrinkToFit")]
    pub shrink_to_fit: Option<bool>,
    /// Text rotation in degrees.
    #[serde(alias = "textRotation")]
    pub text_rotation: Option<i16>,
}

/// One border side, applied to all four edges.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct SpecBorderSide {
    /// Border style name (`thin`, `medium`, `dashed`, ...).
    pub border_style: Option<String>,
    /// Border color (`RRGGBB` or `AARRGGBB`).
    pub color: Option<String>,
}

/// Sparse cell style; every attribute is optional.
///
/// Deserializes from the host style dictionary shape:
/// `{"font": {..}, "fill": {..}, "alignment": {..}, "border_side": {..}, "format": ".."}`.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct SpecCellStyle {
    /// Font attributes.
    pub font: Option<SpecFont>,
    /// Fill attributes.
    pub fill: Option<SpecFill>,
    /// Alignment attributes.
    pub alignment: Option<SpecAlignment>,
    /// Border applied to all edges.
    #[serde(rename = "border_side")]
    pub border: Option<SpecBorderSide>,
    /// Number format code.
    #[serde(rename = "format")]
    pub num_format: Option<String>,
}

impl SpecCellStyle {
    /// Merge two styles with right-side present-attribute overwrite semantics.
    ///
    /// An empty `num_format` on the right counts as absent.
    pub fn merge(&self, other: &SpecCellStyle) -> SpecCellStyle {
        SpecCellStyle {
            font: other.font.clone().or_else(|| self.font.clone()),
            fill: other.fill.clone().or_else(|| self.fill.clone()),
            alignment: other.alignment.clone().or_else(|| self.alignment.clone()),
            border: other.border.clone().or_else(|| self.border.clone()),
            num_format: other
                .num_format
                .clone()
                .filter(|fmt| !fmt.is_empty())
                .or_else(|| self.num_format.clone()),
        }
    }

    /// Whether no attribute is set.
    pub fn is_empty(&self) -> bool {
        self == &SpecCellStyle::default()
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ColumnSchemaSpecification

/// Declared value category of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnumKind {
    /// Plain text.
    Text,
    /// Whole number.
    Integer,
    /// Binary floating point number.
    FloatNumber,
    /// Exact decimal number.
    Decimal,
    /// Two-valued boolean.
    Boolean,
    /// Naive date-time.
    DateTime,
    /// Calendar date.
    Date,
    /// Time of day.
    Time,
    /// Sequence of values.
    List,
    /// Undeclared kind.
    #[default]
    Unknown,
}

/// One flat column of the render schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecColumn {
    /// Dotted key path into the flattened record.
    pub key: String,
    /// Human label.
    pub label: String,
    /// Declared value kind.
    pub kind: EnumKind,
    /// Skip this column when rendering.
    pub ignored: bool,
    /// Explicit date/time parse format for this field.
    pub parse_format: Option<String>,
}

impl SpecColumn {
    /// Column labelled by its own key.
    pub fn new(key: impl Into<String>, kind: EnumKind) -> Self {
        let key = key.into();
        Self {
            label: key.clone(),
            key,
            kind,
            ignored: false,
            parse_format: None,
        }
    }

    /// Replace the label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Set the explicit parse format.
    pub fn with_parse_format(mut self, parse_format: impl Into<String>) -> Self {
        self.parse_format = Some(parse_format.into());
        self
    }

    /// Mark the column as ignored.
    pub fn with_ignored(mut self, ignored: bool) -> Self {
        self.ignored = ignored;
        self
    }
}

/// Nested field description the flat schema is derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecFieldNode {
    /// Terminal field.
    Leaf {
        /// Field key (one segment).
        key: String,
        /// Declared kind.
        kind: EnumKind,
        /// Optional human label.
        label: Option<String>,
        /// Optional explicit date/time parse format.
        parse_format: Option<String>,
    },
    /// Nested group of fields.
    Nested {
        /// Group key (one segment).
        key: String,
        /// Optional human label.
        label: Option<String>,
        /// Child fields in order.
        children: Vec<SpecFieldNode>,
    },
}

impl SpecFieldNode {
    /// Unlabelled leaf.
    pub fn leaf(key: impl Into<String>, kind: EnumKind) -> Self {
        Self::Leaf {
            key: key.into(),
            kind,
            label: None,
            parse_format: None,
        }
    }

    /// Unlabelled nested group.
    pub fn nested(key: impl Into<String>, children: Vec<SpecFieldNode>) -> Self {
        Self::Nested {
            key: key.into(),
            label: None,
            children,
        }
    }

    /// Attach a label.
    pub fn with_label(mut self, value: impl Into<String>) -> Self {
        match &mut self {
            Self::Leaf { label, .. } | Self::Nested { label, .. } => *label = Some(value.into()),
        }
        self
    }

    /// Attach an explicit parse format (leaves only).
    pub fn with_parse_format(mut self, value: impl Into<String>) -> Self {
        if let Self::Leaf { parse_format, .. } = &mut self {
            *parse_format = Some(value.into());
        }
        self
    }
}

/// Extra column appended after the derived ones.
#[derive(Debug, Clone)]
pub struct SpecCustomColumn {
    /// Column key.
    pub key: String,
    /// Optional label; defaults to the key.
    pub label: Option<String>,
    /// Optional value mapping for the column.
    pub formatter: Option<EnumCustomMapping>,
}

/// Options for deriving a schema from a field tree.
#[derive(Debug, Clone)]
pub struct SpecSchemaOptions {
    /// Dotted keys dropped together with their subtree.
    pub ignore_keys: Vec<String>,
    /// Use field labels instead of dotted keys.
    pub use_labels: bool,
    /// Separator between nested label segments.
    pub label_sep: String,
    /// Columns appended after the derived ones.
    pub custom_columns: Vec<SpecCustomColumn>,
}

impl Default for SpecSchemaOptions {
    fn default() -> Self {
        Self {
            ignore_keys: vec![],
            use_labels: false,
            label_sep: crate::conf::C_LABEL_SEP.to_string(),
            custom_columns: vec![],
        }
    }
}

/// Ordered, duplicate-free column schema.
#[derive(Debug, Clone, Default)]
pub struct SpecColumnSchema {
    columns: Vec<SpecColumn>,
    custom_formatters: BTreeMap<String, EnumCustomMapping>,
}

impl SpecColumnSchema {
    /// Build a schema from flat columns, rejecting duplicate keys.
    pub fn new(columns: Vec<SpecColumn>) -> Result<Self, GridRenderError> {
        let l_keys: Vec<String> = columns.iter().map(|col| col.key.clone()).collect();
        validate_unique_column_keys(&l_keys)?;
        Ok(Self {
            columns,
            custom_formatters: BTreeMap::new(),
        })
    }

    /// Derive a flat schema from a nested field description.
    pub fn from_field_tree(
        nodes: &[SpecFieldNode],
        options: &SpecSchemaOptions,
    ) -> Result<Self, GridRenderError> {
        let mut l_columns = flatten_field_tree(nodes, options);
        let mut dict_formatters = BTreeMap::new();
        for col_custom in &options.custom_columns {
            l_columns.push(SpecColumn {
                key: col_custom.key.clone(),
                label: col_custom
                    .label
                    .clone()
                    .unwrap_or_else(|| col_custom.key.clone()),
                kind: EnumKind::Unknown,
                ignored: false,
                parse_format: None,
            });
            if let Some(formatter) = &col_custom.formatter {
                dict_formatters.insert(col_custom.key.clone(), formatter.clone());
            }
        }

        let mut schema = Self::new(l_columns)?;
        schema.custom_formatters = dict_formatters;
        Ok(schema)
    }

    /// Columns in schema order (ignored ones included).
    pub fn columns(&self) -> &[SpecColumn] {
        &self.columns
    }

    /// Mapping registered by a custom column for `key`.
    pub fn custom_formatter(&self, key: &str) -> Option<&EnumCustomMapping> {
        self.custom_formatters.get(key)
    }

    /// Number of columns (ignored ones included).
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether the schema has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region BehaviorSpecification

/// Projection applied by a custom mapping.
pub type FnValueProjection = Arc<dyn Fn(&EnumRecordValue) -> EnumRecordValue + Send + Sync>;

/// Per-column override of normal value production.
#[derive(Clone)]
pub enum EnumCustomMapping {
    /// Select a sub-field by name from a mapping-typed value.
    SubKey(String),
    /// Call a projection with the raw value.
    Projection(FnValueProjection),
}

impl EnumCustomMapping {
    /// Sub-key selector.
    pub fn sub_key(key: impl Into<String>) -> Self {
        Self::SubKey(key.into())
    }

    /// Projection from a closure.
    pub fn projection<F>(func: F) -> Self
    where
        F: Fn(&EnumRecordValue) -> EnumRecordValue + Send + Sync + 'static,
    {
        Self::Projection(Arc::new(func))
    }
}

impl fmt::Debug for EnumCustomMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SubKey(key) => f.debug_tuple("SubKey").field(key).finish(),
            Self::Projection(_) => f.write_str("Projection(..)"),
        }
    }
}

/// Display labels for boolean cells.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct SpecBooleanDisplay {
    /// Label for `true`.
    #[serde(rename = "true")]
    pub label_true: Option<String>,
    /// Label for `false`.
    #[serde(rename = "false")]
    pub label_false: Option<String>,
}

impl SpecBooleanDisplay {
    /// Labels for both values.
    pub fn new(label_true: impl Into<String>, label_false: impl Into<String>) -> Self {
        Self {
            label_true: Some(label_true.into()),
            label_false: Some(label_false.into()),
        }
    }

    /// Configured label for `value`.
    pub fn label(&self, value: bool) -> Option<&str> {
        if value {
            self.label_true.as_deref()
        } else {
            self.label_false.as_deref()
        }
    }
}

fn derive_iso_8601() -> String {
    C_ISO_8601.to_string()
}

/// Process-wide defaults consulted when a call or column sets nothing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SpecRenderSettings {
    /// Number format for integer cells.
    pub integer_format: Option<String>,
    /// Number format for float/decimal cells.
    pub decimal_format: Option<String>,
    /// Number format for date-time cells.
    pub datetime_format: Option<String>,
    /// Number format for date cells.
    pub date_format: Option<String>,
    /// Number format for time cells.
    pub time_format: Option<String>,
    /// Parse format for date-time text.
    #[serde(default = "derive_iso_8601")]
    pub datetime_parse_format: String,
    /// Parse format for date text.
    #[serde(default = "derive_iso_8601")]
    pub date_parse_format: String,
    /// Parse format for time text.
    #[serde(default = "derive_iso_8601")]
    pub time_parse_format: String,
    /// Boolean labels used when a call supplies none.
    pub boolean_display: Option<SpecBooleanDisplay>,
}

impl Default for SpecRenderSettings {
    fn default() -> Self {
        Self {
            integer_format: None,
            decimal_format: None,
            datetime_format: None,
            date_format: None,
            time_format: None,
            datetime_parse_format: derive_iso_8601(),
            date_parse_format: derive_iso_8601(),
            time_parse_format: derive_iso_8601(),
            boolean_display: None,
        }
    }
}

impl SpecRenderSettings {
    /// Load settings from a JSON document; absent keys keep their defaults.
    pub fn from_json_str(text: &str) -> Result<Self, GridRenderError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Configured number format for `kind`.
    pub fn num_format_for(&self, kind: EnumKind) -> Option<&str> {
        match kind {
            EnumKind::Integer => self.integer_format.as_deref(),
            EnumKind::FloatNumber | EnumKind::Decimal => self.decimal_format.as_deref(),
            EnumKind::DateTime => self.datetime_format.as_deref(),
            EnumKind::Date => self.date_format.as_deref(),
            EnumKind::Time => self.time_format.as_deref(),
            _ => None,
        }
        .filter(|fmt| !fmt.is_empty())
    }

    /// Default parse format for `kind`.
    pub fn parse_format_for(&self, kind: EnumKind) -> &str {
        match kind {
            EnumKind::Date => &self.date_parse_format,
            EnumKind::Time => &self.time_parse_format,
            _ => &self.datetime_parse_format,
        }
    }
}

/// Style tables supplied by the host.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct SpecStyleConfig {
    /// Base style of every body cell.
    pub body: Option<SpecCellStyle>,
    /// Per-key column style overrides.
    pub column_data_styles: BTreeMap<String, SpecCellStyle>,
    /// Column-label header style (reference sink only).
    pub header: Option<SpecCellStyle>,
}

impl SpecStyleConfig {
    /// Load style tables from a JSON document.
    pub fn from_json_str(text: &str) -> Result<Self, GridRenderError> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Per-call behavioral configuration.
#[derive(Debug, Clone)]
pub struct SpecRenderOptions {
    /// Boolean labels; falls back to [`SpecRenderSettings::boolean_display`].
    pub boolean_display: Option<SpecBooleanDisplay>,
    /// Separator for flat list items.
    pub list_sep: String,
    /// Per-key custom mappings.
    pub custom_mappings: BTreeMap<String, EnumCustomMapping>,
    /// Per-key configured number formats.
    pub num_formats_by_key: BTreeMap<String, String>,
    /// Style tables.
    pub styles: SpecStyleConfig,
}

impl Default for SpecRenderOptions {
    fn default() -> Self {
        Self {
            boolean_display: None,
            list_sep: C_LIST_SEP_DEFAULT.to_string(),
            custom_mappings: BTreeMap::new(),
            num_formats_by_key: BTreeMap::new(),
            styles: SpecStyleConfig::default(),
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region OutputSpecification

/// One finished cell handed to the output sink.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecFinishedCell {
    /// One-based row index.
    pub row: usize,
    /// One-based column index.
    pub column: usize,
    /// Dotted key of the column.
    pub key: String,
    /// Final display value.
    pub value: EnumRecordValue,
    /// Resolved number format.
    pub num_format: String,
    /// Final composed style.
    pub style: SpecCellStyle,
}

/// Rendered row plus its optional uniform fill.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecRenderedRow {
    /// One-based row index.
    pub row: usize,
    /// Cells in schema order.
    pub cells: Vec<SpecFinishedCell>,
    /// Fill the sink applies across every cell of the row.
    pub row_fill: Option<SpecFill>,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Errors

/// Errors surfaced by schema construction, configuration loading and the sinks.
#[derive(Debug, thiserror::Error)]
pub enum GridRenderError {
    /// Schema contains the same key more than once.
    #[error("{0}")]
    DuplicateColumnKeys(String),
    /// Settings/style document could not be parsed.
    #[error("invalid render configuration: {0}")]
    InvalidConfig(#[from] serde_json::Error),
    /// DataFrame input could not be read.
    #[error("{0}")]
    DataFrame(String),
    /// Row/column index does not fit the sink grid.
    #[error("{0}")]
    IndexOverflow(String),
    /// Workbook write failed.
    #[error("xlsx write error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_prefers_present_override_attributes() {
        let base = SpecCellStyle {
            font: Some(SpecFont {
                name: Some("Arial".to_string()),
                ..Default::default()
            }),
            fill: Some(SpecFill::solid("FFEEEEEE")),
            num_format: Some("0.0".to_string()),
            ..Default::default()
        };
        let patch = SpecCellStyle {
            fill: Some(SpecFill::solid("FFCCFFCC")),
            num_format: Some(String::new()),
            ..Default::default()
        };

        let merged = base.merge(&patch);
        assert_eq!(merged.font, base.font);
        assert_eq!(merged.fill, Some(SpecFill::solid("FFCCFFCC")));
        assert_eq!(merged.num_format.as_deref(), Some("0.0"));
    }

    #[test]
    fn test_style_deserializes_from_host_dictionary() {
        let style: SpecCellStyle = serde_json::from_str(
            r#"{
                "fill": {"fill_type": "solid", "start_color": "FFCCFFCC"},
                "alignment": {"horizontal": "center", "wrapText": true, "text_rotation": 20},
                "border_side": {"border_style": "thin", "color": "FF000000"},
                "font": {"name": "Arial", "size": 14, "bold": true},
                "format": "0.00E+00"
            }"#,
        )
        .expect("style json");

        assert_eq!(style.fill, Some(SpecFill::solid("FFCCFFCC")));
        let alignment = style.alignment.expect("alignment");
        assert_eq!(alignment.horizontal.as_deref(), Some("center"));
        assert_eq!(alignment.wrap_text, Some(true));
        assert_eq!(alignment.text_rotation, Some(20));
        assert_eq!(
            style.border.and_then(|side| side.border_style).as_deref(),
            Some("thin")
        );
        let font = style.font.expect("font");
        assert_eq!(font.size, Some(14.0));
        assert_eq!(font.bold, Some(true));
        assert_eq!(style.num_format.as_deref(), Some("0.00E+00"));
    }

    #[test]
    fn test_empty_style_dictionary() {
        let style: SpecCellStyle = serde_json::from_str("{}").expect("style json");
        assert!(style.is_empty());
    }

    #[test]
    fn test_settings_defaults_and_json_loading() {
        let settings = SpecRenderSettings::default();
        assert_eq!(settings.parse_format_for(EnumKind::Date), C_ISO_8601);
        assert_eq!(settings.num_format_for(EnumKind::Integer), None);

        let settings = SpecRenderSettings::from_json_str(
            r##"{"integer_format": "#,##0", "date_parse_format": "%d/%m/%Y",
                "boolean_display": {"true": "Yes", "false": "No"}}"##,
        )
        .expect("settings json");
        assert_eq!(settings.num_format_for(EnumKind::Integer), Some("#,##0"));
        assert_eq!(settings.parse_format_for(EnumKind::Date), "%d/%m/%Y");
        assert_eq!(settings.parse_format_for(EnumKind::Time), C_ISO_8601);
        assert_eq!(
            settings.boolean_display,
            Some(SpecBooleanDisplay::new("Yes", "No"))
        );
    }

    #[test]
    fn test_invalid_settings_json_is_config_error() {
        let err = SpecRenderSettings::from_json_str("{not json").expect_err("must fail");
        assert!(matches!(err, GridRenderError::InvalidConfig(_)));
    }

    #[test]
    fn test_schema_rejects_duplicate_keys() {
        let err = SpecColumnSchema::new(vec![
            SpecColumn::new("title", EnumKind::Text),
            SpecColumn::new("age", EnumKind::Integer),
            SpecColumn::new("title", EnumKind::Text),
        ])
        .expect_err("duplicates");
        assert!(err.to_string().contains("\"title\" x2 at indices [0, 2]"));
    }
}
