//! Stateless helper utilities used by the grid rendering pipeline.

use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};

use crate::conf::{
    C_FORMULA_ESCAPE_PREFIX, C_ISO_8601, C_KEY_SEP, N_LEN_EXCEL_SHEET_NAME_MAX,
    TUP_EXCEL_ILLEGAL, TUP_FORMULA_ESCAPE_CHARS,
};
use crate::spec::{
    EnumKind, GridRenderError, SpecColumn, SpecFieldNode, SpecRenderSettings, SpecSchemaOptions,
};
use crate::value::{EnumRecordValue, Record};

////////////////////////////////////////////////////////////////////////////////
// #region Sanitization

/// Whether `chr` is a control character the XLSX XML grammar rejects.
///
/// Tab, line feed and carriage return stay legal.
pub fn is_illegal_xml_char(chr: char) -> bool {
    matches!(chr, '\u{00}'..='\u{08}' | '\u{0B}'..='\u{0C}' | '\u{0E}'..='\u{1F}')
}

/// Strip illegal control characters and neutralize formula-looking text.
pub fn sanitize_text(text: &str) -> String {
    let c_text: String = text.chars().filter(|chr| !is_illegal_xml_char(*chr)).collect();
    if c_text.starts_with(|chr: char| TUP_FORMULA_ESCAPE_CHARS.contains(&chr)) {
        format!("{C_FORMULA_ESCAPE_PREFIX}{c_text}")
    } else {
        c_text
    }
}

/// Make a value injection-safe for a text cell.
///
/// Falsy values (`Null`, `0`, `false`, empty text) come back unchanged rather
/// than stringified; everything else becomes sanitized text.
pub fn sanitize_value(value: &EnumRecordValue) -> EnumRecordValue {
    let value = value.forced();
    if value.is_falsy() {
        return value.into_owned();
    }
    EnumRecordValue::Text(sanitize_text(&value.to_display_text()))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region RecordFlattening

/// Flatten a nested record into dotted keys, in first-seen leaf order.
///
/// Only mapping values recurse; sequences and scalars end the path. Keys listed
/// in `ignore_keys` are dropped together with their subtree.
pub fn flatten_record(record: &Record, ignore_keys: &[String]) -> Record {
    let set_ignore: BTreeSet<&str> = ignore_keys.iter().map(String::as_str).collect();
    let mut dict_flat = Record::with_capacity(record.len());
    flatten_record_into(record, "", &set_ignore, &mut dict_flat);
    dict_flat
}

fn flatten_record_into(
    record: &Record,
    parent_key: &str,
    set_ignore: &BTreeSet<&str>,
    dict_flat: &mut Record,
) {
    for (key, value) in record {
        let c_key_new = derive_dotted_key(parent_key, key);
        if set_ignore.contains(c_key_new.as_str()) {
            continue;
        }

        match value.clone().force() {
            EnumRecordValue::Map(nested) => {
                flatten_record_into(&nested, &c_key_new, set_ignore, dict_flat)
            }
            leaf => {
                dict_flat.insert(c_key_new, leaf);
            }
        }
    }
}

/// Fetch the unflattened value at a dotted path, walking nested mappings.
///
/// A literal top-level key equal to `path` wins over the nested walk.
pub fn lookup_dotted_path(record: &Record, path: &str) -> Option<EnumRecordValue> {
    if let Some(value) = record.get(path) {
        return Some(value.clone().force());
    }

    let mut iter_segments = path.split(C_KEY_SEP);
    let mut value = record.get(iter_segments.next()?)?.clone().force();
    for c_segment in iter_segments {
        let EnumRecordValue::Map(nested) = value else {
            return None;
        };
        value = nested.get(c_segment)?.clone().force();
    }
    Some(value)
}

fn derive_dotted_key(parent_key: &str, key: &str) -> String {
    if parent_key.is_empty() {
        key.to_string()
    } else {
        format!("{parent_key}{C_KEY_SEP}{key}")
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region SchemaUtils

/// Validate that `keys` has no duplicated entries.
pub fn validate_unique_column_keys(keys: &[String]) -> Result<(), GridRenderError> {
    if keys.len() == keys.iter().collect::<BTreeSet<_>>().len() {
        return Ok(());
    }

    let mut dict_pos: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (n_idx, c_key) in keys.iter().enumerate() {
        dict_pos.entry(c_key.as_str()).or_default().push(n_idx);
    }

    let c_msg = dict_pos
        .iter()
        .filter(|(_, l_pos)| l_pos.len() > 1)
        .map(|(c_key, l_pos)| format!("{c_key:?} x{} at indices {:?}", l_pos.len(), l_pos))
        .collect::<Vec<_>>()
        .join("; ");

    Err(GridRenderError::DuplicateColumnKeys(format!(
        "Duplicate column keys detected: {c_msg}"
    )))
}

/// Flatten a nested field description into schema columns.
pub fn flatten_field_tree(nodes: &[SpecFieldNode], options: &SpecSchemaOptions) -> Vec<SpecColumn> {
    let set_ignore: BTreeSet<&str> = options.ignore_keys.iter().map(String::as_str).collect();
    let mut l_columns = Vec::new();
    flatten_field_tree_into(nodes, "", None, &set_ignore, options, &mut l_columns);
    l_columns
}

fn flatten_field_tree_into(
    nodes: &[SpecFieldNode],
    parent_key: &str,
    parent_label: Option<&str>,
    set_ignore: &BTreeSet<&str>,
    options: &SpecSchemaOptions,
    l_columns: &mut Vec<SpecColumn>,
) {
    for node in nodes {
        match node {
            SpecFieldNode::Leaf {
                key,
                kind,
                label,
                parse_format,
            } => {
                let c_key_new = derive_dotted_key(parent_key, key);
                if set_ignore.contains(c_key_new.as_str()) {
                    continue;
                }
                let c_label = match label {
                    Some(label) if options.use_labels => {
                        derive_nested_label(parent_label, label, &options.label_sep)
                    }
                    _ => c_key_new.clone(),
                };
                l_columns.push(SpecColumn {
                    key: c_key_new,
                    label: c_label,
                    kind: *kind,
                    ignored: false,
                    parse_format: parse_format.clone(),
                });
            }
            SpecFieldNode::Nested {
                key,
                label,
                children,
            } => {
                let c_key_new = derive_dotted_key(parent_key, key);
                if set_ignore.contains(c_key_new.as_str()) {
                    continue;
                }
                let c_label_nested = match label {
                    Some(label) if options.use_labels => {
                        Some(derive_nested_label(parent_label, label, &options.label_sep))
                    }
                    _ => None,
                };
                flatten_field_tree_into(
                    children,
                    &c_key_new,
                    c_label_nested.as_deref(),
                    set_ignore,
                    options,
                    l_columns,
                );
            }
        }
    }
}

fn derive_nested_label(parent_label: Option<&str>, label: &str, label_sep: &str) -> String {
    match parent_label {
        Some(parent) if !parent.is_empty() => format!("{parent}{label_sep}{label}"),
        _ => label.to_string(),
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ValueCoercion

/// Convert `value` into the canonical representation of `kind`.
///
/// Never fails: when conversion or parsing is impossible the raw value comes
/// back unchanged. `parse_format` is the per-field date/time parse format and
/// takes priority over the process-wide one in `settings`.
pub fn coerce_value(
    value: &EnumRecordValue,
    kind: EnumKind,
    parse_format: Option<&str>,
    settings: &SpecRenderSettings,
) -> EnumRecordValue {
    let value = value.forced();
    let res_coerced = match kind {
        EnumKind::Integer => convert_to_integer(&value),
        EnumKind::FloatNumber => convert_to_float(&value),
        EnumKind::Decimal => convert_to_decimal(&value),
        EnumKind::DateTime | EnumKind::Date | EnumKind::Time => {
            let c_parse_format = parse_format
                .filter(|fmt| !fmt.is_empty())
                .unwrap_or_else(|| settings.parse_format_for(kind));
            convert_to_temporal(&value, kind, c_parse_format)
        }
        EnumKind::Text | EnumKind::Boolean | EnumKind::List | EnumKind::Unknown => {
            return value.into_owned();
        }
    };

    match res_coerced {
        Ok(coerced) => coerced,
        Err(reason) => {
            log::debug!("coercion to {kind:?} fell back to raw value: {reason}");
            value.into_owned()
        }
    }
}

fn convert_to_integer(value: &EnumRecordValue) -> Result<EnumRecordValue, String> {
    match value {
        EnumRecordValue::Integer(n) => Ok(EnumRecordValue::Integer(*n)),
        EnumRecordValue::Bool(b) => Ok(EnumRecordValue::Integer(i64::from(*b))),
        EnumRecordValue::Float(x) => {
            let x_trunc = x.trunc();
            if x_trunc.is_finite() && x_trunc >= i64::MIN as f64 && x_trunc < i64::MAX as f64 {
                Ok(EnumRecordValue::Integer(x_trunc as i64))
            } else {
                Err(format!("float {x} has no integer form"))
            }
        }
        EnumRecordValue::Decimal(d) => d
            .trunc()
            .to_i64()
            .map(EnumRecordValue::Integer)
            .ok_or_else(|| format!("decimal {d} overflows i64")),
        EnumRecordValue::Text(s) => s
            .trim()
            .parse::<i64>()
            .map(EnumRecordValue::Integer)
            .map_err(|err| format!("text {s:?} is not an integer: {err}")),
        other => Err(format!("incompatible value {other:?}")),
    }
}

fn convert_to_float(value: &EnumRecordValue) -> Result<EnumRecordValue, String> {
    match value {
        EnumRecordValue::Float(x) => Ok(EnumRecordValue::Float(*x)),
        EnumRecordValue::Integer(n) => Ok(EnumRecordValue::Float(*n as f64)),
        EnumRecordValue::Bool(b) => Ok(EnumRecordValue::Float(if *b { 1.0 } else { 0.0 })),
        EnumRecordValue::Decimal(d) => d
            .to_f64()
            .map(EnumRecordValue::Float)
            .ok_or_else(|| format!("decimal {d} has no float form")),
        EnumRecordValue::Text(s) => s
            .trim()
            .parse::<f64>()
            .map(EnumRecordValue::Float)
            .map_err(|err| format!("text {s:?} is not a float: {err}")),
        other => Err(format!("incompatible value {other:?}")),
    }
}

fn convert_to_decimal(value: &EnumRecordValue) -> Result<EnumRecordValue, String> {
    match value {
        EnumRecordValue::Decimal(d) => Ok(EnumRecordValue::Decimal(*d)),
        EnumRecordValue::Integer(n) => Ok(EnumRecordValue::Decimal(Decimal::from(*n))),
        EnumRecordValue::Bool(b) => Ok(EnumRecordValue::Decimal(Decimal::from(i64::from(*b)))),
        EnumRecordValue::Float(x) => Decimal::from_f64(*x)
            .map(EnumRecordValue::Decimal)
            .ok_or_else(|| format!("float {x} has no decimal form")),
        EnumRecordValue::Text(s) => {
            let c_text = s.trim();
            Decimal::from_str(c_text)
                .or_else(|_| Decimal::from_scientific(c_text))
                .map(EnumRecordValue::Decimal)
                .map_err(|err| format!("text {s:?} is not a decimal: {err}"))
        }
        other => Err(format!("incompatible value {other:?}")),
    }
}

fn convert_to_temporal(
    value: &EnumRecordValue,
    kind: EnumKind,
    parse_format: &str,
) -> Result<EnumRecordValue, String> {
    match (kind, value) {
        (EnumKind::DateTime, EnumRecordValue::DateTime(v)) => Ok(EnumRecordValue::DateTime(*v)),
        (EnumKind::DateTime, EnumRecordValue::DateTimeTz(v)) => {
            Ok(EnumRecordValue::DateTime(v.naive_local()))
        }
        (EnumKind::Date, EnumRecordValue::Date(v)) => Ok(EnumRecordValue::Date(*v)),
        (EnumKind::Time, EnumRecordValue::Time(v)) => Ok(EnumRecordValue::Time(*v)),
        (_, EnumRecordValue::Text(s)) => parse_temporal_text(s.trim(), kind, parse_format),
        (_, other) => Err(format!("cannot parse {other:?} as {kind:?}")),
    }
}

/// Parse date/time text for `kind` using `parse_format`.
///
/// The [`C_ISO_8601`] sentinel (case-insensitive) selects the ISO parsers;
/// any other value is a `strftime`-style pattern.
pub fn parse_temporal_text(
    text: &str,
    kind: EnumKind,
    parse_format: &str,
) -> Result<EnumRecordValue, String> {
    if parse_format.eq_ignore_ascii_case(C_ISO_8601) {
        return match kind {
            EnumKind::Date => parse_iso_date(text).map(EnumRecordValue::Date),
            EnumKind::Time => parse_iso_time(text).map(EnumRecordValue::Time),
            _ => parse_iso_datetime(text).map(EnumRecordValue::DateTime),
        }
        .ok_or_else(|| format!("{text:?} is not ISO-8601 {kind:?}"));
    }

    let err_text = || format!("{text:?} does not match format {parse_format:?}");
    match kind {
        EnumKind::Date => NaiveDateTime::parse_from_str(text, parse_format)
            .map(|dt| dt.date())
            .or_else(|_| NaiveDate::parse_from_str(text, parse_format))
            .map(EnumRecordValue::Date)
            .map_err(|_| err_text()),
        EnumKind::Time => NaiveDateTime::parse_from_str(text, parse_format)
            .map(|dt| dt.time())
            .or_else(|_| NaiveTime::parse_from_str(text, parse_format))
            .map(EnumRecordValue::Time)
            .map_err(|_| err_text()),
        _ => NaiveDateTime::parse_from_str(text, parse_format)
            .or_else(|_| DateTime::parse_from_str(text, parse_format).map(|dt| dt.naive_local()))
            .or_else(|_| {
                NaiveDate::parse_from_str(text, parse_format).map(|d| d.and_time(NaiveTime::MIN))
            })
            .map(EnumRecordValue::DateTime)
            .map_err(|_| err_text()),
    }
}

const TUP_ISO_DATETIME_TZ_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M%:z",
    "%Y-%m-%d %H:%M%:z",
];
const TUP_ISO_DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parse an ISO-8601 date-time; any offset is dropped, keeping wall-clock time.
///
/// A bare date parses as midnight.
pub fn parse_iso_datetime(text: &str) -> Option<NaiveDateTime> {
    let c_text = normalize_utc_suffix(text.trim());
    for c_fmt in TUP_ISO_DATETIME_TZ_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(&c_text, c_fmt) {
            return Some(dt.naive_local());
        }
    }
    for c_fmt in TUP_ISO_DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(&c_text, c_fmt) {
            return Some(dt);
        }
    }
    parse_iso_date(&c_text).map(|d| d.and_time(NaiveTime::MIN))
}

/// Parse an ISO-8601 calendar date (`YYYY-MM-DD`).
pub fn parse_iso_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d").ok()
}

/// Parse an ISO-8601 time of day; any offset is dropped.
pub fn parse_iso_time(text: &str) -> Option<NaiveTime> {
    let c_text = strip_time_offset(text.trim());
    NaiveTime::parse_from_str(c_text, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(c_text, "%H:%M"))
        .ok()
}

fn normalize_utc_suffix(text: &str) -> String {
    match text.strip_suffix(['Z', 'z']) {
        Some(head) => format!("{head}+00:00"),
        None => text.to_string(),
    }
}

fn strip_time_offset(text: &str) -> &str {
    if let Some(head) = text.strip_suffix(['Z', 'z']) {
        return head;
    }
    // "HH:MM" is the shortest valid prefix, so an offset sign can only follow it.
    match text.get(5..).and_then(|tail| tail.find(['+', '-'])) {
        Some(n_pos) => &text[..5 + n_pos],
        None => text,
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region SheetNormalization

/// Replace invalid chars and trim to valid Excel sheet name.
pub fn sanitize_sheet_name(name: &str, replace_to: &str) -> String {
    let mut c_name = name.to_string();
    for c_illegal in TUP_EXCEL_ILLEGAL {
        c_name = c_name.replace(c_illegal, replace_to);
    }
    c_name = c_name.trim().to_string();
    if c_name.is_empty() {
        c_name = "Sheet".to_string();
    }

    c_name.chars().take(N_LEN_EXCEL_SHEET_NAME_MAX).collect()
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
