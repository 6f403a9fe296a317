//! `axiomkit_io_grid` v1:
//! Record-to-spreadsheet-cell rendering kernel.
//!
//! Architecture:
//! - `conf`     : constants and default presets
//! - `spec`     : specs/models/options and the error type
//! - `value`    : record value model
//! - `util`     : pure helpers (sanitize, flatten, coerce)
//! - `field`    : per-kind cell formatters and dispatch
//! - `renderer` : render context and row rendering
//! - `source`   : Polars DataFrame record source
//! - `writer`   : XLSX output sink
pub mod conf;
pub mod field;
pub mod renderer;
pub mod source;
pub mod spec;
pub mod util;
pub mod value;
pub mod writer;

pub use conf::{
    C_ISO_8601, C_LIST_SEP_DEFAULT, C_ROW_COLOR_KEY, derive_default_header_style,
    derive_default_render_options, derive_default_render_settings,
    derive_kind_default_num_format,
};
pub use field::{
    BooleanCellFormatter, CellFormatter, ListCellFormatter, NumberCellFormatter,
    SpecCellOutput, SpecCellRequest, SpecFormattedValue, TemporalCellFormatter,
    TextCellFormatter, apply_custom_mapping, derive_cell_formatter, format_cell,
    format_cell_by_kind,
};
pub use renderer::{SpecRenderContext, render_row, render_rows, render_rows_parallel};
pub use source::{derive_records_from_dataframe, derive_records_from_ipc_bytes};
pub use spec::{
    EnumCustomMapping, EnumKind, FnValueProjection, GridRenderError, SpecAlignment,
    SpecBooleanDisplay, SpecBorderSide, SpecCellStyle, SpecColumn, SpecColumnSchema,
    SpecCustomColumn, SpecFieldNode, SpecFill, SpecFinishedCell, SpecFont, SpecRenderOptions,
    SpecRenderSettings, SpecRenderedRow, SpecSchemaOptions, SpecStyleConfig,
};
pub use util::{coerce_value, flatten_record, sanitize_sheet_name, sanitize_text, sanitize_value};
pub use value::{EnumRecordValue, LazyValue, Record, derive_record_from_json};
pub use writer::GridXlsxWriter;
