//! Per-kind cell formatters and the single-cell formatting entry point.
//!
//! Every [`EnumKind`] maps to exactly one [`CellFormatter`] through
//! [`derive_cell_formatter`]; the render context resolves that table once per
//! schema so no per-cell type inspection happens.

use std::fmt;

use crate::conf::{C_NUM_FORMAT_GENERAL, derive_kind_default_num_format};
use crate::spec::{
    EnumCustomMapping, EnumKind, SpecBooleanDisplay, SpecCellStyle, SpecRenderSettings,
};
use crate::util::{coerce_value, sanitize_value};
use crate::value::EnumRecordValue;

////////////////////////////////////////////////////////////////////////////////
// #region FormatterContract

/// Inputs shared by every formatter for one cell.
#[derive(Debug, Clone, Copy)]
pub struct SpecCellRequest<'a> {
    /// Dotted key of the column.
    pub key: &'a str,
    /// Declared kind of the column.
    pub kind: EnumKind,
    /// Explicit date/time parse format of the field.
    pub parse_format: Option<&'a str>,
    /// Row/body-level style.
    pub base_style: Option<&'a SpecCellStyle>,
    /// Column-specific style override.
    pub override_style: Option<&'a SpecCellStyle>,
    /// Custom mapping registered for the key.
    pub custom_mapping: Option<&'a EnumCustomMapping>,
    /// Column-specific configured number format.
    pub configured_num_format: Option<&'a str>,
    /// Boolean display labels.
    pub bool_display: Option<&'a SpecBooleanDisplay>,
    /// Separator for flat list items.
    pub list_sep: &'a str,
    /// Process-wide defaults.
    pub settings: &'a SpecRenderSettings,
}

/// Display value plus the kind-derived number format, before style composition.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecFormattedValue {
    /// Final display value.
    pub value: EnumRecordValue,
    /// Number format the kind asks for, if any.
    pub num_format: Option<String>,
}

impl SpecFormattedValue {
    fn plain(value: EnumRecordValue) -> Self {
        Self {
            value,
            num_format: None,
        }
    }
}

/// Fully formatted cell content without grid coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecCellOutput {
    /// Final display value.
    pub value: EnumRecordValue,
    /// Resolved number format.
    pub num_format: String,
    /// Composed style.
    pub style: SpecCellStyle,
}

/// Kind-specific value production.
pub trait CellFormatter: fmt::Debug + Send + Sync {
    /// Turn a raw (flattened, unmapped) value into its display value.
    fn format_value(
        &self,
        raw: &EnumRecordValue,
        request: &SpecCellRequest<'_>,
    ) -> SpecFormattedValue;
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Formatters

/// Text and undeclared columns: sanitized display text.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextCellFormatter;

impl CellFormatter for TextCellFormatter {
    fn format_value(
        &self,
        raw: &EnumRecordValue,
        request: &SpecCellRequest<'_>,
    ) -> SpecFormattedValue {
        let value = raw.forced();
        if matches!(value.as_ref(), EnumRecordValue::List(_)) {
            return ListCellFormatter.format_value(&value, request);
        }
        SpecFormattedValue::plain(sanitize_value(&value))
    }
}

/// Integer, float and decimal columns.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumberCellFormatter;

impl CellFormatter for NumberCellFormatter {
    fn format_value(
        &self,
        raw: &EnumRecordValue,
        request: &SpecCellRequest<'_>,
    ) -> SpecFormattedValue {
        SpecFormattedValue {
            value: coerce_value(raw, request.kind, None, request.settings),
            num_format: derive_kind_num_format(request),
        }
    }
}

/// Date-time, date and time columns.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemporalCellFormatter;

impl CellFormatter for TemporalCellFormatter {
    fn format_value(
        &self,
        raw: &EnumRecordValue,
        request: &SpecCellRequest<'_>,
    ) -> SpecFormattedValue {
        SpecFormattedValue {
            value: coerce_value(raw, request.kind, request.parse_format, request.settings),
            num_format: derive_kind_num_format(request),
        }
    }
}

/// Boolean columns; labels replace the value only when configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct BooleanCellFormatter;

impl CellFormatter for BooleanCellFormatter {
    fn format_value(
        &self,
        raw: &EnumRecordValue,
        request: &SpecCellRequest<'_>,
    ) -> SpecFormattedValue {
        let value = raw.forced().into_owned();
        let (EnumRecordValue::Bool(b_value), Some(display)) = (&value, request.bool_display) else {
            return SpecFormattedValue::plain(value);
        };

        let c_label = display
            .label(*b_value)
            .map(str::to_string)
            .unwrap_or_else(|| value.to_display_text());
        SpecFormattedValue::plain(EnumRecordValue::Text(c_label))
    }
}

/// List columns: structured items as JSON, flat items joined.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListCellFormatter;

impl CellFormatter for ListCellFormatter {
    fn format_value(
        &self,
        raw: &EnumRecordValue,
        request: &SpecCellRequest<'_>,
    ) -> SpecFormattedValue {
        let value = raw.forced();
        let EnumRecordValue::List(items) = value.as_ref() else {
            return SpecFormattedValue::plain(sanitize_value(&value));
        };

        let c_text = match items.first() {
            None => String::new(),
            Some(first) if first.is_structured() => value.to_json_value().to_string(),
            Some(_) => items
                .iter()
                .map(EnumRecordValue::to_display_text)
                .collect::<Vec<_>>()
                .join(request.list_sep),
        };
        SpecFormattedValue::plain(sanitize_value(&EnumRecordValue::Text(c_text)))
    }
}

static FORMATTER_TEXT: TextCellFormatter = TextCellFormatter;
static FORMATTER_NUMBER: NumberCellFormatter = NumberCellFormatter;
static FORMATTER_TEMPORAL: TemporalCellFormatter = TemporalCellFormatter;
static FORMATTER_BOOLEAN: BooleanCellFormatter = BooleanCellFormatter;
static FORMATTER_LIST: ListCellFormatter = ListCellFormatter;

/// Dispatch table: the formatter responsible for `kind`.
pub fn derive_cell_formatter(kind: EnumKind) -> &'static dyn CellFormatter {
    match kind {
        EnumKind::Integer | EnumKind::FloatNumber | EnumKind::Decimal => &FORMATTER_NUMBER,
        EnumKind::DateTime | EnumKind::Date | EnumKind::Time => &FORMATTER_TEMPORAL,
        EnumKind::Boolean => &FORMATTER_BOOLEAN,
        EnumKind::List => &FORMATTER_LIST,
        EnumKind::Text | EnumKind::Unknown => &FORMATTER_TEXT,
    }
}

/// Column format > settings format for the kind > kind default.
fn derive_kind_num_format(request: &SpecCellRequest<'_>) -> Option<String> {
    request
        .configured_num_format
        .filter(|fmt| !fmt.is_empty())
        .or_else(|| request.settings.num_format_for(request.kind))
        .or_else(|| derive_kind_default_num_format(request.kind))
        .map(str::to_string)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region CellFormatting

/// Apply a custom mapping to the raw, pre-coercion value.
///
/// A sub-key that cannot be resolved yields the raw value unchanged.
pub fn apply_custom_mapping(
    key: &str,
    mapping: &EnumCustomMapping,
    raw: &EnumRecordValue,
) -> EnumRecordValue {
    let raw = raw.forced();
    match mapping {
        EnumCustomMapping::SubKey(c_sub_key) => match raw.as_ref() {
            EnumRecordValue::Map(record) => match record.get(c_sub_key) {
                Some(value) => value.clone().force(),
                None => {
                    log::debug!("custom mapping for {key:?}: sub-key {c_sub_key:?} not found");
                    raw.into_owned()
                }
            },
            _ => {
                log::debug!("custom mapping for {key:?}: value is not a mapping");
                raw.into_owned()
            }
        },
        EnumCustomMapping::Projection(func) => func(raw.as_ref()).force(),
    }
}

/// Format one cell with `formatter`.
///
/// The composed style is `base`, then the kind number format, then the column
/// override; an override without a number format keeps the kind one.
pub fn format_cell(
    formatter: &dyn CellFormatter,
    raw: &EnumRecordValue,
    request: &SpecCellRequest<'_>,
) -> SpecCellOutput {
    let formatted = match request.custom_mapping {
        Some(mapping) => {
            let value = match apply_custom_mapping(request.key, mapping, raw) {
                value @ EnumRecordValue::Text(_) => sanitize_value(&value),
                value => value,
            };
            SpecFormattedValue::plain(value)
        }
        None => formatter.format_value(raw, request),
    };

    let mut style = request.base_style.cloned().unwrap_or_default();
    if let Some(c_num_format) = formatted.num_format {
        style.num_format = Some(c_num_format);
    }
    if let Some(override_style) = request.override_style {
        style = style.merge(override_style);
    }

    SpecCellOutput {
        value: formatted.value,
        num_format: style
            .num_format
            .clone()
            .filter(|fmt| !fmt.is_empty())
            .unwrap_or_else(|| C_NUM_FORMAT_GENERAL.to_string()),
        style,
    }
}

/// Format one cell with the formatter registered for `request.kind`.
pub fn format_cell_by_kind(raw: &EnumRecordValue, request: &SpecCellRequest<'_>) -> SpecCellOutput {
    format_cell(derive_cell_formatter(request.kind), raw, request)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
