//! Grid rendering constants and default preset factories.

use crate::spec::{EnumKind, SpecCellStyle, SpecFont, SpecRenderOptions, SpecRenderSettings};

/// Excel sheet name maximum length.
pub const N_LEN_EXCEL_SHEET_NAME_MAX: usize = 31;
/// Characters not allowed in sheet names.
pub const TUP_EXCEL_ILLEGAL: [&str; 7] = ["*", ":", "?", "/", "\\", "[", "]"];

/// Leading characters that make a spreadsheet treat text as a formula.
pub const TUP_FORMULA_ESCAPE_CHARS: [char; 7] = ['=', '-', '+', '@', '\t', '\r', '\n'];
/// Prefix that neutralizes a formula-looking text cell.
pub const C_FORMULA_ESCAPE_PREFIX: char = '\'';

/// Reserved record key carrying a whole-row background color.
pub const C_ROW_COLOR_KEY: &str = "row_color";
/// Separator between dotted key segments.
pub const C_KEY_SEP: &str = ".";
/// Separator between nested label segments.
pub const C_LABEL_SEP: &str = " > ";
/// Default separator used to join flat list items.
pub const C_LIST_SEP_DEFAULT: &str = ", ";

/// Parse-format sentinel selecting the strict ISO-8601 parsers.
pub const C_ISO_8601: &str = "iso-8601";
/// Number format used when a cell carries no explicit format.
pub const C_NUM_FORMAT_GENERAL: &str = "General";

/// Kind default number format for integers.
pub const C_NUM_FORMAT_INTEGER: &str = "0";
/// Kind default number format for floats and decimals.
pub const C_NUM_FORMAT_DECIMAL: &str = "0.00";
/// Kind default number format for date-times.
pub const C_NUM_FORMAT_DATETIME: &str = "yyyy-mm-dd h:mm:ss";
/// Kind default number format for dates.
pub const C_NUM_FORMAT_DATE: &str = "yyyy-mm-dd";
/// Kind default number format for times.
pub const C_NUM_FORMAT_TIME: &str = "h:mm:ss";

/// Return the built-in number format for `kind`, if the kind has one.
pub fn derive_kind_default_num_format(kind: EnumKind) -> Option<&'static str> {
    match kind {
        EnumKind::Integer => Some(C_NUM_FORMAT_INTEGER),
        EnumKind::FloatNumber | EnumKind::Decimal => Some(C_NUM_FORMAT_DECIMAL),
        EnumKind::DateTime => Some(C_NUM_FORMAT_DATETIME),
        EnumKind::Date => Some(C_NUM_FORMAT_DATE),
        EnumKind::Time => Some(C_NUM_FORMAT_TIME),
        EnumKind::Text | EnumKind::Boolean | EnumKind::List | EnumKind::Unknown => None,
    }
}

/// Build the default column-label header style used by the reference sink.
pub fn derive_default_header_style() -> SpecCellStyle {
    SpecCellStyle {
        font: Some(SpecFont {
            bold: Some(true),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Build default process-wide render settings.
pub fn derive_default_render_settings() -> SpecRenderSettings {
    SpecRenderSettings::default()
}

/// Build default per-call render options.
pub fn derive_default_render_options() -> SpecRenderOptions {
    SpecRenderOptions::default()
}
