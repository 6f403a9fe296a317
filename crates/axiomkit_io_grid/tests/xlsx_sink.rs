use axiomkit_io_grid::{
    EnumKind, GridRenderError, GridXlsxWriter, Record, SpecColumn, SpecColumnSchema,
    SpecRenderContext, SpecRenderOptions, SpecRenderSettings, derive_record_from_json,
    derive_records_from_ipc_bytes, render_rows, render_rows_parallel,
};
use polars::prelude::{DataFrame, IpcWriter, NamedFrom, SerWriter, Series};
use serde_json::json;

fn context() -> SpecRenderContext {
    let schema = SpecColumnSchema::new(vec![
        SpecColumn::new("title", EnumKind::Text).with_label("Title"),
        SpecColumn::new("age", EnumKind::Integer).with_label("Age"),
        SpecColumn::new("born", EnumKind::Date).with_label("Born"),
        SpecColumn::new("ok", EnumKind::Boolean).with_label("OK"),
        SpecColumn::new("tags", EnumKind::List).with_label("Tags"),
    ])
    .expect("schema");
    SpecRenderContext::new(schema, SpecRenderOptions::default(), SpecRenderSettings::default())
}

fn records() -> Vec<Record> {
    vec![
        derive_record_from_json(json!({
            "title": "Hello", "age": 36, "born": "1988-02-29", "ok": true,
            "tags": ["x", "y"], "row_color": "FFCCFFCC"
        }))
        .expect("object"),
        derive_record_from_json(json!({"title": "=cmd", "age": "n/a", "tags": [{"k": 1}]}))
            .expect("object"),
    ]
}

#[test]
fn test_workbook_bytes_with_header() {
    let ctx = context();
    let l_rows = render_rows(&records(), &ctx, 2);

    let mut writer = GridXlsxWriter::new();
    let c_name = writer.write_sheet("Report: 2024/Q1", &ctx, &l_rows, true).expect("sheet");
    assert_eq!(c_name, "Report_ 2024_Q1");

    let v_bytes = writer.save_to_buffer().expect("bytes");
    assert!(v_bytes.starts_with(b"PK"));
}

#[test]
fn test_workbook_without_header_and_duplicate_sheet_names() {
    let ctx = context();
    let l_rows = render_rows_parallel(&records(), &ctx, 1, 2);

    let mut writer = GridXlsxWriter::new();
    assert_eq!(writer.write_sheet("Data", &ctx, &l_rows, false).expect("sheet"), "Data");
    assert_eq!(writer.write_sheet("Data", &ctx, &l_rows[..1], false).expect("sheet"), "Data__2");
    assert!(writer.save_to_buffer().expect("bytes").starts_with(b"PK"));
}

#[test]
fn test_header_requires_body_from_row_two() {
    let ctx = context();
    let l_rows = render_rows(&records(), &ctx, 1);

    let mut writer = GridXlsxWriter::new();
    let err = writer.write_sheet("Data", &ctx, &l_rows, true).expect_err("row 1 taken by header");
    assert!(matches!(err, GridRenderError::IndexOverflow(_)));
}

#[test]
fn test_dataframe_ipc_to_workbook() {
    let mut df = DataFrame::new(vec![
        Series::new("title".into(), &["A", "B"]).into(),
        Series::new("age".into(), &[1i64, 2]).into(),
    ])
    .expect("dataframe");
    let mut v_ipc: Vec<u8> = Vec::new();
    IpcWriter::new(&mut v_ipc).finish(&mut df).expect("ipc");

    let ctx = context();
    let l_records = derive_records_from_ipc_bytes(&v_ipc).expect("records");
    let l_rows = render_rows(&l_records, &ctx, 2);
    assert_eq!(l_rows[1].cells[1].value, 2.into());
    assert_eq!(l_rows[1].cells[2].value, axiomkit_io_grid::EnumRecordValue::Null);

    let mut writer = GridXlsxWriter::new();
    writer.write_sheet("Frame", &ctx, &l_rows, true).expect("sheet");
    assert!(writer.save_to_buffer().expect("bytes").starts_with(b"PK"));
}

#[test]
fn test_malformed_row_color_does_not_abort_sheet() {
    let ctx = context();
    let l_records = vec![
        derive_record_from_json(json!({"title": "x", "row_color": "aé12345"})).expect("object"),
        derive_record_from_json(json!({"title": "y", "row_color": "FFCCFFCC"})).expect("object"),
    ];
    let l_rows = render_rows(&l_records, &ctx, 2);

    let mut writer = GridXlsxWriter::new();
    assert_eq!(writer.write_sheet("Data", &ctx, &l_rows, true).expect("sheet"), "Data");
    assert!(writer.save_to_buffer().expect("bytes").starts_with(b"PK"));
}

#[test]
fn test_hand_built_cell_at_row_zero_is_rejected() {
    let ctx = context();
    let mut l_rows = render_rows(&records(), &ctx, 1);
    l_rows[0].cells[0].row = 0;

    let mut writer = GridXlsxWriter::new();
    let err = writer.write_sheet("Data", &ctx, &l_rows, false).expect_err("row 0");
    assert!(matches!(err, GridRenderError::IndexOverflow(_)));
}
