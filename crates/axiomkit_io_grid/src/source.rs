//! Record source backed by Polars DataFrames.

use std::io::Cursor;

use polars::prelude::{AnyValue, DataFrame, IpcReader, SerReader};

use crate::spec::GridRenderError;
use crate::value::{EnumRecordValue, Record};

/// Build one record per DataFrame row, keyed by column name in column order.
pub fn derive_records_from_dataframe(df: &DataFrame) -> Result<Vec<Record>, GridRenderError> {
    let l_cols = df.get_columns();
    let l_names: Vec<String> = l_cols.iter().map(|col| col.name().to_string()).collect();

    let mut l_records = Vec::with_capacity(df.height());
    for n_idx_row in 0..df.height() {
        let mut record = Record::with_capacity(l_cols.len());
        for (col, c_name) in l_cols.iter().zip(&l_names) {
            let value = col.get(n_idx_row).map_err(|err| {
                GridRenderError::DataFrame(format!(
                    "Failed to access cell value at row {n_idx_row}, column {c_name:?}: {err}"
                ))
            })?;
            record.insert(c_name.clone(), derive_record_value_from_any_value(value));
        }
        l_records.push(record);
    }

    log::debug!("loaded {} records x {} columns from DataFrame", l_records.len(), l_names.len());
    Ok(l_records)
}

/// Same as [`derive_records_from_dataframe`], from Arrow IPC payload bytes.
pub fn derive_records_from_ipc_bytes(v_ipc_df: &[u8]) -> Result<Vec<Record>, GridRenderError> {
    let df = derive_dataframe_from_ipc_bytes(v_ipc_df)?;
    derive_records_from_dataframe(&df)
}

fn derive_dataframe_from_ipc_bytes(v_ipc_df: &[u8]) -> Result<DataFrame, GridRenderError> {
    IpcReader::new(Cursor::new(v_ipc_df))
        .finish()
        .map_err(|err| GridRenderError::DataFrame(format!("Failed to read IPC DataFrame bytes: {err}")))
}

fn derive_record_value_from_any_value(value: AnyValue<'_>) -> EnumRecordValue {
    match value {
        AnyValue::Null => EnumRecordValue::Null,
        AnyValue::String(val) => EnumRecordValue::Text(val.to_string()),
        AnyValue::StringOwned(val) => EnumRecordValue::Text(val.to_string()),
        AnyValue::Boolean(val) => EnumRecordValue::Bool(val),
        AnyValue::UInt8(val) => EnumRecordValue::Integer(i64::from(val)),
        AnyValue::UInt16(val) => EnumRecordValue::Integer(i64::from(val)),
        AnyValue::UInt32(val) => EnumRecordValue::Integer(i64::from(val)),
        AnyValue::UInt64(val) => match i64::try_from(val) {
            Ok(n) => EnumRecordValue::Integer(n),
            Err(_) => EnumRecordValue::Float(val as f64),
        },
        AnyValue::Int8(val) => EnumRecordValue::Integer(i64::from(val)),
        AnyValue::Int16(val) => EnumRecordValue::Integer(i64::from(val)),
        AnyValue::Int32(val) => EnumRecordValue::Integer(i64::from(val)),
        AnyValue::Int64(val) => EnumRecordValue::Integer(val),
        AnyValue::Int128(val) => match i64::try_from(val) {
            Ok(n) => EnumRecordValue::Integer(n),
            Err(_) => EnumRecordValue::Float(val as f64),
        },
        AnyValue::Float32(val) => EnumRecordValue::Float(f64::from(val)),
        AnyValue::Float64(val) => EnumRecordValue::Float(val),
        _ => EnumRecordValue::Text(value.to_string()),
    }
}
