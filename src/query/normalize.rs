//! Per-shape normalization of driver rows.

use std::collections::{BTreeMap, HashMap};

use crate::config::BigNumberPolicy;
use crate::types::{
    ColumnDescription, IndexDescription, IndexField, IndexOrder, OutFormat, OutRow, Row, SqlValue,
};

/// Applies the precision policy to every wide integer of `rows`.
pub fn apply_big_number_policy(rows: &mut [Row], policy: BigNumberPolicy) {
    if policy == BigNumberPolicy::Preserve {
        return;
    }
    for value in rows.iter_mut().flat_map(|row| row.values_mut().iter_mut()) {
        if let SqlValue::BigInt(wide) = *value {
            *value = match policy {
                BigNumberPolicy::Narrow => match i64::try_from(wide) {
                    Ok(narrow) => SqlValue::Int64(narrow),
                    Err(_) => continue,
                },
                BigNumberPolicy::Strings => SqlValue::Text(wide.to_string()),
                BigNumberPolicy::Preserve => continue,
            };
        }
    }
}

pub fn project(rows: Vec<Row>, format: OutFormat) -> Vec<OutRow> {
    rows.into_iter()
        .map(|row| OutRow::project(row, format))
        .collect()
}

fn text(row: &Row, column: &str) -> Option<String> {
    row.value(column).and_then(SqlValue::to_text)
}

/// Folds `DESCRIBE` rows into column descriptions keyed by column name.
pub fn describe(rows: &[Row]) -> BTreeMap<String, ColumnDescription> {
    rows.iter()
        .filter_map(|row| {
            let field = text(row, "Field")?;
            let raw_type = text(row, "Type").unwrap_or_default();
            let type_name = match raw_type.get(..4) {
                Some(prefix) if prefix.eq_ignore_ascii_case("enum") => {
                    format!("ENUM{}", &raw_type[4..])
                }
                _ => raw_type.to_uppercase(),
            };
            let description = ColumnDescription {
                type_name,
                allow_null: text(row, "Null")
                    .is_some_and(|flag| flag.eq_ignore_ascii_case("YES") || flag.eq_ignore_ascii_case("Y")),
                default_value: row.value("Default").filter(|v| !v.is_null()).cloned(),
                primary_key: text(row, "Key").as_deref() == Some("PRI"),
                auto_increment: text(row, "Extra")
                    .is_some_and(|extra| extra.eq_ignore_ascii_case("auto_increment")),
                comment: text(row, "Comment").filter(|comment| !comment.is_empty()),
            };
            Some((field, description))
        })
        .collect()
}

/// Groups `SHOW INDEX` rows by index, in order of first appearance.
pub fn show_indexes(rows: &[Row]) -> Vec<IndexDescription> {
    let mut indexes: Vec<IndexDescription> = Vec::new();
    let mut positions: Vec<BTreeMap<i64, IndexField>> = Vec::new();
    let mut by_name: HashMap<String, usize> = HashMap::new();

    for row in rows {
        let Some(name) = text(row, "Key_name") else {
            continue;
        };
        let slot = *by_name.entry(name.clone()).or_insert_with(|| {
            indexes.push(IndexDescription {
                primary: name == "PRIMARY",
                unique: row.value("Non_unique").and_then(SqlValue::as_i64) != Some(1),
                table_name: text(row, "Table"),
                index_type: text(row, "Index_type"),
                fields: Vec::new(),
                name: name.clone(),
            });
            positions.push(BTreeMap::new());
            indexes.len() - 1
        });
        let seq = row
            .value("Seq_in_index")
            .and_then(SqlValue::as_i64)
            .unwrap_or(1);
        positions[slot].insert(
            seq - 1,
            IndexField {
                attribute: text(row, "Column_name").unwrap_or_default(),
                length: row
                    .value("Sub_part")
                    .and_then(SqlValue::as_i64)
                    .filter(|length| *length > 0),
                order: (text(row, "Collation").as_deref() == Some("A")).then_some(IndexOrder::Asc),
            },
        );
    }

    for (index, fields) in indexes.iter_mut().zip(positions) {
        index.fields = fields.into_values().collect();
    }
    indexes
}

/// Every value of every row, as table names.
pub fn show_tables(rows: &[Row]) -> Vec<String> {
    rows.iter()
        .flat_map(|row| row.values().iter().filter_map(SqlValue::to_text))
        .collect()
}

/// Product version from the banner of a version probe.
pub fn version(rows: &[Row]) -> Option<String> {
    let banner = rows.first().and_then(|row| text(row, "BANNER"))?;
    banner.find('V').map(|start| banner[start..].to_string())
}

/// Flattens `SHOW WARNINGS` rows into messages.
pub fn warning_messages(rows: &[Row]) -> Vec<String> {
    let mut messages = Vec::new();
    for row in rows {
        match row.value("Message") {
            Some(message) => messages.push(message.to_text().unwrap_or_default()),
            None => messages.extend(
                row.iter()
                    .map(|(key, value)| format!("{key}: {value}")),
            ),
        }
    }
    messages
}
