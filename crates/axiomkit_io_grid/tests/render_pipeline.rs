use std::collections::BTreeMap;

use axiomkit_io_grid::{
    EnumCustomMapping, EnumKind, EnumRecordValue, Record, SpecBooleanDisplay, SpecCellStyle,
    SpecColumn, SpecColumnSchema, SpecCustomColumn, SpecFieldNode, SpecFill, SpecRenderContext,
    SpecRenderOptions, SpecRenderSettings, SpecSchemaOptions, SpecStyleConfig,
    derive_record_from_json, render_row, render_rows,
};
use chrono::NaiveDate;
use serde_json::json;

fn record(value: serde_json::Value) -> Record {
    derive_record_from_json(value).expect("json object")
}

fn values(cells: &[axiomkit_io_grid::SpecFinishedCell]) -> Vec<EnumRecordValue> {
    cells.iter().map(|cell| cell.value.clone()).collect()
}

#[test]
fn test_title_age_tags_scenario() {
    let schema = SpecColumnSchema::new(vec![
        SpecColumn::new("title", EnumKind::Text),
        SpecColumn::new("age", EnumKind::Integer),
        SpecColumn::new("tags", EnumKind::List),
    ])
    .expect("schema");
    let ctx = SpecRenderContext::new(schema, SpecRenderOptions::default(), SpecRenderSettings::default());

    let row = render_row(
        &record(json!({"title": "Hello", "age": 36, "tags": ["x", "y"]})),
        &ctx,
        1,
    );
    assert_eq!(
        values(&row.cells),
        vec!["Hello".into(), EnumRecordValue::Integer(36), "x, y".into()]
    );
    assert_eq!(row.cells[1].num_format, "0");
}

#[test]
fn test_date_default_format_scenario() {
    let schema = SpecColumnSchema::new(vec![SpecColumn::new("published", EnumKind::Date)]).expect("schema");
    let ctx = SpecRenderContext::new(schema, SpecRenderOptions::default(), SpecRenderSettings::default());

    let row = render_row(&record(json!({"published": "2020-01-01"})), &ctx, 1);
    assert_eq!(
        row.cells[0].value,
        EnumRecordValue::Date(NaiveDate::from_ymd_opt(2020, 1, 1).expect("date"))
    );
    assert_eq!(row.cells[0].num_format, "yyyy-mm-dd");
}

#[test]
fn test_nested_schema_with_labels_styles_and_row_fill() {
    let nodes = vec![
        SpecFieldNode::leaf("title", EnumKind::Text).with_label("Title"),
        SpecFieldNode::nested(
            "author",
            vec![
                SpecFieldNode::leaf("name", EnumKind::Text).with_label("Name"),
                SpecFieldNode::leaf("birth", EnumKind::Date)
                    .with_label("Birth")
                    .with_parse_format("%d.%m.%Y"),
                SpecFieldNode::leaf("email", EnumKind::Text),
            ],
        )
        .with_label("Author"),
        SpecFieldNode::leaf("price", EnumKind::Decimal).with_label("Price"),
        SpecFieldNode::leaf("available", EnumKind::Boolean).with_label("Available"),
    ];
    let schema_options = SpecSchemaOptions {
        ignore_keys: vec!["author.email".to_string()],
        use_labels: true,
        custom_columns: vec![SpecCustomColumn {
            key: "status".to_string(),
            label: Some("Status".to_string()),
            formatter: Some(EnumCustomMapping::sub_key("display")),
        }],
        ..Default::default()
    };
    let schema = SpecColumnSchema::from_field_tree(&nodes, &schema_options).expect("schema");

    let styles = SpecStyleConfig::from_json_str(
        r##"{
            "body": {"font": {"name": "Arial", "size": 11}, "alignment": {"vertical": "center"}},
            "column_data_styles": {
                "price": {"format": "#,##0.00 [$EUR]", "fill": {"fill_type": "solid", "start_color": "FFEEEEEE"}}
            }
        }"##,
    )
    .expect("styles");
    let options = SpecRenderOptions {
        boolean_display: Some(SpecBooleanDisplay::new("Yes", "No")),
        styles,
        ..Default::default()
    };
    let ctx = SpecRenderContext::new(schema, options, SpecRenderSettings::default());

    let l_labels: Vec<&str> = ctx.rendered_columns().map(|col| col.label.as_str()).collect();
    assert_eq!(
        l_labels,
        vec!["Title", "Author > Name", "Author > Birth", "Price", "Available", "Status"]
    );

    let row = render_row(
        &record(json!({
            "title": "+Injected",
            "author": {"name": "Ann", "birth": "24.12.1990", "email": "ann@example.org"},
            "price": "19.90",
            "available": false,
            "status": {"value": 1, "display": "Published"},
            "row_color": "FFFFCCCC"
        })),
        &ctx,
        2,
    );

    assert_eq!(row.cells.len(), 6);
    assert_eq!(row.cells[0].value, "'+Injected".into());
    assert_eq!(row.cells[1].value, "Ann".into());
    assert_eq!(
        row.cells[2].value,
        EnumRecordValue::Date(NaiveDate::from_ymd_opt(1990, 12, 24).expect("date"))
    );
    assert_eq!(row.cells[3].num_format, "#,##0.00 [$EUR]");
    assert_eq!(row.cells[3].style.fill, Some(SpecFill::solid("FFEEEEEE")));
    assert_eq!(
        row.cells[3].style.font.as_ref().and_then(|font| font.name.as_deref()),
        Some("Arial")
    );
    assert_eq!(row.cells[4].value, "No".into());
    assert_eq!(row.cells[5].value, "Published".into());
    assert_eq!(row.row_fill, Some(SpecFill::solid("FFFFCCCC")));
    assert!(row.cells.iter().all(|cell| cell.row == 2));
}

#[test]
fn test_render_rows_rows_are_independent() {
    let schema = SpecColumnSchema::new(vec![
        SpecColumn::new("n", EnumKind::Integer),
        SpecColumn::new("when", EnumKind::DateTime),
    ])
    .expect("schema");
    let ctx = SpecRenderContext::new(schema, SpecRenderOptions::default(), SpecRenderSettings::default());

    let records = vec![
        record(json!({"n": "oops", "when": "not a date"})),
        record(json!({"n": 7, "when": "2021-03-04T05:06:07Z"})),
        record(json!({})),
    ];
    let l_rows = render_rows(&records, &ctx, 2);

    assert_eq!(l_rows.iter().map(|row| row.row).collect::<Vec<_>>(), vec![2, 3, 4]);
    assert_eq!(values(&l_rows[0].cells), vec!["oops".into(), "not a date".into()]);
    assert_eq!(
        values(&l_rows[1].cells),
        vec![
            EnumRecordValue::Integer(7),
            EnumRecordValue::DateTime(
                NaiveDate::from_ymd_opt(2021, 3, 4)
                    .and_then(|d| d.and_hms_opt(5, 6, 7))
                    .expect("datetime")
            ),
        ]
    );
    assert_eq!(values(&l_rows[2].cells), vec![EnumRecordValue::Null, EnumRecordValue::Null]);
    assert_eq!(l_rows[2].cells[1].num_format, "yyyy-mm-dd h:mm:ss");
}

#[test]
fn test_settings_loaded_from_json_drive_formats_and_parsing() {
    let settings = SpecRenderSettings::from_json_str(
        r##"{"integer_format": "#,##0", "datetime_parse_format": "%Y/%m/%d %H:%M"}"##,
    )
    .expect("settings");
    let schema = SpecColumnSchema::new(vec![
        SpecColumn::new("n", EnumKind::Integer),
        SpecColumn::new("at", EnumKind::DateTime),
    ])
    .expect("schema");
    let mut num_formats_by_key = BTreeMap::new();
    num_formats_by_key.insert("at".to_string(), "dd/mm/yyyy hh:mm".to_string());
    let options = SpecRenderOptions {
        num_formats_by_key,
        ..Default::default()
    };
    let ctx = SpecRenderContext::new(schema, options, settings);

    let row = render_row(&record(json!({"n": 1200, "at": "2022/05/06 07:08"})), &ctx, 1);
    assert_eq!(row.cells[0].num_format, "#,##0");
    assert_eq!(row.cells[1].num_format, "dd/mm/yyyy hh:mm");
    assert_eq!(
        row.cells[1].value,
        EnumRecordValue::DateTime(
            NaiveDate::from_ymd_opt(2022, 5, 6)
                .and_then(|d| d.and_hms_opt(7, 8, 0))
                .expect("datetime")
        )
    );
}

#[test]
fn test_projection_mapping_and_column_override_format() {
    let schema = SpecColumnSchema::new(vec![SpecColumn::new("score", EnumKind::FloatNumber)]).expect("schema");
    let mut custom_mappings = BTreeMap::new();
    custom_mappings.insert(
        "score".to_string(),
        EnumCustomMapping::projection(|value| match value {
            EnumRecordValue::Float(x) => EnumRecordValue::Text(format!("{:.0}%", x * 100.0)),
            other => other.clone(),
        }),
    );
    let mut column_data_styles = BTreeMap::new();
    column_data_styles.insert(
        "score".to_string(),
        SpecCellStyle {
            num_format: Some("@".to_string()),
            ..Default::default()
        },
    );
    let options = SpecRenderOptions {
        custom_mappings,
        styles: SpecStyleConfig {
            column_data_styles,
            ..Default::default()
        },
        ..Default::default()
    };
    let ctx = SpecRenderContext::new(schema, options, SpecRenderSettings::default());

    let row = render_row(&record(json!({"score": 0.25})), &ctx, 1);
    assert_eq!(row.cells[0].value, "25%".into());
    assert_eq!(row.cells[0].num_format, "@");
}

#[test]
fn test_duplicate_schema_keys_rejected_before_render() {
    let err = SpecColumnSchema::from_field_tree(
        &[SpecFieldNode::leaf("a", EnumKind::Text)],
        &SpecSchemaOptions {
            custom_columns: vec![SpecCustomColumn {
                key: "a".to_string(),
                label: None,
                formatter: None,
            }],
            ..Default::default()
        },
    )
    .expect_err("duplicate keys");
    assert!(err.to_string().contains("\"a\" x2 at indices [0, 1]"));
}
