//! Reference output sink that writes rendered rows into an XLSX workbook.

use std::collections::BTreeSet;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::prelude::ToPrimitive;
use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, FormatPattern, Workbook, Worksheet};

use crate::conf::{N_LEN_EXCEL_SHEET_NAME_MAX, derive_default_header_style};
use crate::renderer::SpecRenderContext;
use crate::spec::{GridRenderError, SpecCellStyle, SpecFill, SpecFinishedCell, SpecRenderedRow};
use crate::util::sanitize_sheet_name;
use crate::value::EnumRecordValue;

/// Stateful workbook writer; the workbook stays in memory until saved.
pub struct GridXlsxWriter {
    workbook: Workbook,
    set_sheet_names_existing: BTreeSet<String>,
}

impl Default for GridXlsxWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl GridXlsxWriter {
    /// Create a writer around an empty in-memory workbook.
    pub fn new() -> Self {
        Self {
            workbook: Workbook::new(),
            set_sheet_names_existing: BTreeSet::new(),
        }
    }

    /// Write rendered rows into a new worksheet and return its final name.
    ///
    /// With `if_write_header`, row 1 holds the column labels and body rows
    /// must start at row 2 or later; otherwise rows land at their own index.
    pub fn write_sheet(
        &mut self,
        sheet_name: &str,
        ctx: &SpecRenderContext,
        rows: &[SpecRenderedRow],
        if_write_header: bool,
    ) -> Result<String, GridRenderError> {
        let n_row_min = if if_write_header { 2 } else { 1 };
        validate_body_positions(rows, n_row_min)?;

        let c_sheet_name = self.derive_unique_sheet_name(&sanitize_sheet_name(sheet_name, "_"));
        let worksheet = self.workbook.add_worksheet();
        worksheet.set_name(&c_sheet_name)?;

        if if_write_header {
            let fmt_header = derive_header_format(ctx);
            for (n_idx_col, col) in ctx.rendered_columns().enumerate() {
                worksheet.write_string_with_format(0, cast_col_num(n_idx_col)?, &col.label, &fmt_header)?;
            }
        }

        let mut n_cells = 0usize;
        for row in rows {
            for cell in &row.cells {
                let format = derive_cell_format(cell, row.row_fill.as_ref());
                write_cell_with_format(worksheet, cell.row - 1, cell.column - 1, &cell.value, &format)?;
                n_cells += 1;
            }
        }

        log::debug!(
            "sheet {c_sheet_name:?}: wrote {} rows ({n_cells} cells), header={if_write_header}",
            rows.len()
        );
        Ok(c_sheet_name)
    }

    /// Serialize the workbook into XLSX bytes.
    pub fn save_to_buffer(&mut self) -> Result<Vec<u8>, GridRenderError> {
        Ok(self.workbook.save_to_buffer()?)
    }

    /// Save the workbook to `path`.
    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> Result<(), GridRenderError> {
        Ok(self.workbook.save(path.as_ref())?)
    }

    fn derive_unique_sheet_name(&mut self, name: &str) -> String {
        if !self.set_sheet_names_existing.contains(name) {
            self.set_sheet_names_existing.insert(name.to_string());
            return name.to_string();
        }

        let base_name: String = name
            .chars()
            .take(usize::max(1, N_LEN_EXCEL_SHEET_NAME_MAX - 3))
            .collect();

        let mut n_idx = 2usize;
        loop {
            let candidate: String = format!("{base_name}__{n_idx}")
                .chars()
                .take(N_LEN_EXCEL_SHEET_NAME_MAX)
                .collect();
            if !self.set_sheet_names_existing.contains(&candidate) {
                self.set_sheet_names_existing.insert(candidate.clone());
                return candidate;
            }
            n_idx += 1;
        }
    }
}

/// Every row and cell must sit at or below `n_row_min` and in column 1 or later.
fn validate_body_positions(
    rows: &[SpecRenderedRow],
    n_row_min: usize,
) -> Result<(), GridRenderError> {
    for row in rows {
        if row.row < n_row_min {
            return Err(GridRenderError::IndexOverflow(format!(
                "row index {} is below first body row {n_row_min}",
                row.row
            )));
        }
        if let Some(cell) = row
            .cells
            .iter()
            .find(|cell| cell.row < n_row_min || cell.column == 0)
        {
            return Err(GridRenderError::IndexOverflow(format!(
                "cell ({}, {}) of key {:?} is outside the body grid starting at row {n_row_min}",
                cell.row, cell.column, cell.key
            )));
        }
    }
    Ok(())
}

fn derive_header_format(ctx: &SpecRenderContext) -> Format {
    let style_header = ctx
        .options()
        .styles
        .header
        .clone()
        .unwrap_or_else(derive_default_header_style);
    derive_rust_xlsx_format(&style_header)
}

/// The row fill, when present, replaces the fill of the cell's own style.
fn derive_cell_format(cell: &SpecFinishedCell, row_fill: Option<&SpecFill>) -> Format {
    match row_fill {
        Some(fill) => derive_rust_xlsx_format(&SpecCellStyle {
            fill: Some(fill.clone()),
            ..cell.style.clone()
        }),
        None => derive_rust_xlsx_format(&cell.style),
    }
}

/// Native worksheet cell type a value is written as.
#[derive(Debug, Clone, PartialEq)]
enum EnumCellWrite {
    Blank,
    Boolean(bool),
    Number(f64),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Time(NaiveTime),
    Text(String),
}

fn derive_cell_write(value: &EnumRecordValue) -> EnumCellWrite {
    match value {
        EnumRecordValue::Null => EnumCellWrite::Blank,
        EnumRecordValue::Bool(val) => EnumCellWrite::Boolean(*val),
        EnumRecordValue::Integer(val) => EnumCellWrite::Number(*val as f64),
        EnumRecordValue::Float(val) if val.is_finite() => EnumCellWrite::Number(*val),
        EnumRecordValue::Decimal(val) => match val.to_f64() {
            Some(n_value) => EnumCellWrite::Number(n_value),
            None => EnumCellWrite::Text(val.to_string()),
        },
        EnumRecordValue::Date(val) => EnumCellWrite::Date(*val),
        EnumRecordValue::DateTime(val) => EnumCellWrite::DateTime(*val),
        EnumRecordValue::DateTimeTz(val) => EnumCellWrite::DateTime(val.naive_local()),
        EnumRecordValue::Time(val) => EnumCellWrite::Time(*val),
        EnumRecordValue::Lazy(lazy) => derive_cell_write(&lazy.evaluate()),
        other => EnumCellWrite::Text(other.to_display_text()),
    }
}

fn write_cell_with_format(
    worksheet: &mut Worksheet,
    row_idx: usize,
    col_idx: usize,
    value: &EnumRecordValue,
    format: &Format,
) -> Result<(), GridRenderError> {
    let n_row = cast_row_num(row_idx)?;
    let n_col = cast_col_num(col_idx)?;

    match derive_cell_write(value) {
        EnumCellWrite::Blank => {
            worksheet.write_blank(n_row, n_col, format)?;
        }
        EnumCellWrite::Boolean(val) => {
            worksheet.write_boolean_with_format(n_row, n_col, val, format)?;
        }
        EnumCellWrite::Number(val) => {
            worksheet.write_number_with_format(n_row, n_col, val, format)?;
        }
        EnumCellWrite::Date(val) => {
            worksheet.write_datetime_with_format(n_row, n_col, &val, format)?;
        }
        EnumCellWrite::DateTime(val) => {
            worksheet.write_datetime_with_format(n_row, n_col, &val, format)?;
        }
        EnumCellWrite::Time(val) => {
            worksheet.write_datetime_with_format(n_row, n_col, &val, format)?;
        }
        EnumCellWrite::Text(val) => {
            worksheet.write_string_with_format(n_row, n_col, val, format)?;
        }
    }
    Ok(())
}

fn derive_rust_xlsx_format(spec: &SpecCellStyle) -> Format {
    let mut format = Format::new();

    if let Some(font) = &spec.font {
        if let Some(val) = &font.name {
            format = format.set_font_name(val);
        }
        if let Some(val) = font.size {
            format = format.set_font_size(val);
        }
        if font.bold.unwrap_or(false) {
            format = format.set_bold();
        }
        if font.italic.unwrap_or(false) {
            format = format.set_italic();
        }
        if let Some(color) = font.color.as_deref().and_then(derive_color) {
            format = format.set_font_color(color);
        }
    }

    if let Some(fill) = &spec.fill
        && let Some(color) = fill.start_color.as_deref().and_then(derive_color)
    {
        format = format
            .set_pattern(derive_format_pattern(fill.fill_type.as_deref()))
            .set_background_color(color);
    }

    if let Some(alignment) = &spec.alignment {
        if let Some(align) = alignment.horizontal.as_deref().and_then(derive_format_align) {
            format = format.set_align(align);
        }
        if let Some(align) = alignment.vertical.as_deref().and_then(derive_format_valign) {
            format = format.set_align(align);
        }
        if alignment.wrap_text.unwrap_or(false) {
            format = format.set_text_wrap();
        }
        if alignment.shrink_to_fit.unwrap_or(false) {
            format = format.set_shrink();
        }
        if let Some(val) = alignment.text_rotation {
            format = format.set_rotation(val);
        }
    }

    if let Some(border) = &spec.border {
        if let Some(val) = border.border_style.as_deref() {
            format = format.set_border(derive_format_border(val));
        }
        if let Some(color) = border.color.as_deref().and_then(derive_color) {
            format = format.set_border_color(color);
        }
    }

    if let Some(val) = spec.num_format.as_deref().filter(|fmt| !fmt.is_empty()) {
        format = format.set_num_format(val);
    }

    format
}

/// `RRGGBB` or `AARRGGBB` (optionally `#`-prefixed); alpha is dropped.
///
/// Anything that is not ASCII hex yields `None`, so record-supplied colors
/// never abort a sheet.
fn derive_color(value: &str) -> Option<Color> {
    let c_hex = value.trim().trim_start_matches('#');
    if !c_hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let c_rgb = match c_hex.len() {
        6 => c_hex,
        8 => c_hex.get(2..)?,
        _ => return None,
    };
    u32::from_str_radix(c_rgb, 16).ok().map(Color::RGB)
}

fn derive_format_pattern(fill_type: Option<&str>) -> FormatPattern {
    match fill_type.map(|val| val.trim().to_ascii_lowercase()).as_deref() {
        Some("darkgray") => FormatPattern::DarkGray,
        Some("mediumgray") => FormatPattern::MediumGray,
        Some("lightgray") => FormatPattern::LightGray,
        Some("gray125") => FormatPattern::Gray125,
        Some("gray0625") => FormatPattern::Gray0625,
        _ => FormatPattern::Solid,
    }
}

fn derive_format_border(border_style: &str) -> FormatBorder {
    let value = border_style.trim().replace('_', "").to_ascii_lowercase();
    match value.as_str() {
        "thin" => FormatBorder::Thin,
        "medium" => FormatBorder::Medium,
        "dashed" => FormatBorder::Dashed,
        "dotted" => FormatBorder::Dotted,
        "thick" => FormatBorder::Thick,
        "double" => FormatBorder::Double,
        "hair" => FormatBorder::Hair,
        "mediumdashed" => FormatBorder::MediumDashed,
        "dashdot" => FormatBorder::DashDot,
        "mediumdashdot" => FormatBorder::MediumDashDot,
        "dashdotdot" => FormatBorder::DashDotDot,
        "mediumdashdotdot" => FormatBorder::MediumDashDotDot,
        "slantdashdot" => FormatBorder::SlantDashDot,
        _ => FormatBorder::None,
    }
}

fn derive_format_align(align: &str) -> Option<FormatAlign> {
    let value = align.trim().to_ascii_lowercase();
    match value.as_str() {
        "general" => Some(FormatAlign::General),
        "left" => Some(FormatAlign::Left),
        "center" => Some(FormatAlign::Center),
        "right" => Some(FormatAlign::Right),
        "fill" => Some(FormatAlign::Fill),
        "justify" => Some(FormatAlign::Justify),
        "centercontinuous" | "center_across" => Some(FormatAlign::CenterAcross),
        "distributed" => Some(FormatAlign::Distributed),
        _ => None,
    }
}

fn derive_format_valign(align: &str) -> Option<FormatAlign> {
    let value = align.trim().to_ascii_lowercase();
    match value.as_str() {
        "top" => Some(FormatAlign::Top),
        "bottom" => Some(FormatAlign::Bottom),
        "center" | "vcenter" => Some(FormatAlign::VerticalCenter),
        "justify" => Some(FormatAlign::VerticalJustify),
        "distributed" => Some(FormatAlign::VerticalDistributed),
        _ => None,
    }
}

fn cast_row_num(value: usize) -> Result<u32, GridRenderError> {
    u32::try_from(value)
        .map_err(|_| GridRenderError::IndexOverflow(format!("row index overflow: {value}")))
}

fn cast_col_num(value: usize) -> Result<u16, GridRenderError> {
    u16::try_from(value)
        .map_err(|_| GridRenderError::IndexOverflow(format!("column index overflow: {value}")))
}
