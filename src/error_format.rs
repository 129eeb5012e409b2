//! Classification of raw driver errors into [`DmRsError`].

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{DmRsError, DriverError, RelationRole, ValidationErrorItem};
use crate::types::{Instance, ModelDefinition};

pub const ER_ACCESS_DENIED: u32 = 1045;
pub const ER_DUP_ENTRY: u32 = 1062;
pub const ER_DEADLOCK: u32 = 1213;
pub const ER_ROW_IS_REFERENCED: u32 = 1451;
pub const ER_NO_REFERENCED_ROW: u32 = 1452;

/// Maps an error raised while opening a session.
pub fn format_connect_error(error: DriverError) -> DmRsError {
    if error.errno == Some(ER_ACCESS_DENIED) {
        return DmRsError::AccessDenied(error);
    }
    match error.code_str() {
        Some("ECONNREFUSED") => DmRsError::ConnectionRefused(error),
        Some("ER_ACCESS_DENIED_ERROR") => DmRsError::AccessDenied(error),
        Some("ENOTFOUND") => DmRsError::HostNotFound(error),
        Some("EHOSTUNREACH") => DmRsError::HostUnreachable(error),
        Some("EINVAL") => DmRsError::InvalidConnectionConfig(error),
        _ => DmRsError::ConnectionFailed(error),
    }
}

/// Maps an error raised by a statement.
///
/// `model` supplies declared unique keys, `instance` the offending value of
/// a foreign key violation.
pub fn format_error(
    error: DriverError,
    model: Option<&ModelDefinition>,
    instance: Option<&Instance>,
) -> DmRsError {
    match error.errno {
        Some(ER_DUP_ENTRY) => unique_constraint(error, model),
        Some(ER_ROW_IS_REFERENCED) | Some(ER_NO_REFERENCED_ROW) => {
            foreign_key_constraint(error, instance)
        }
        _ => DmRsError::query_failed(error),
    }
}

fn duplicate_entry_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?s)Duplicate entry '(.*)' for key '?(.*?)'?$").ok())
        .as_ref()
}

/// One pattern per identifier quote the server may use.
fn foreign_key_patterns() -> &'static [(char, Regex)] {
    static PATTERNS: OnceLock<Vec<(char, Regex)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        ['`', '"']
            .into_iter()
            .filter_map(|q| {
                let pattern = format!(
                    r"CONSTRAINT {q}(.*){q} FOREIGN KEY \({q}(.*){q}\) REFERENCES {q}(.*){q} \({q}(.*){q}\)"
                );
                Regex::new(&pattern).ok().map(|re| (q, re))
            })
            .collect()
    })
}

fn unique_constraint(error: DriverError, model: Option<&ModelDefinition>) -> DmRsError {
    let parsed = duplicate_entry_pattern()
        .and_then(|re| re.captures(&error.message))
        .map(|captures| {
            let key = &captures[2];
            let key = key.rsplit_once('.').map_or(key, |(_, name)| name);
            (captures[1].to_string(), key.to_string())
        });

    let mut message = "Validation error".to_string();
    let mut ordered = Vec::new();
    if let Some((value, key)) = &parsed {
        match model.and_then(|m| m.unique_keys.get(key)) {
            Some(unique) => {
                if let Some(msg) = &unique.msg {
                    message = msg.clone();
                }
                ordered.extend(
                    unique
                        .fields
                        .iter()
                        .cloned()
                        .zip(value.split('-').map(str::to_string)),
                );
            }
            None => ordered.push((key.clone(), value.clone())),
        }
    }

    let errors = ordered
        .iter()
        .map(|(field, value)| ValidationErrorItem::not_unique(field, value))
        .collect();
    DmRsError::UniqueConstraint {
        message,
        key: parsed.map(|(_, key)| key),
        fields: ordered.into_iter().collect::<BTreeMap<_, _>>(),
        errors,
        source: error,
    }
}

fn foreign_key_constraint(error: DriverError, instance: Option<&Instance>) -> DmRsError {
    let role = if error.errno == Some(ER_ROW_IS_REFERENCED) {
        RelationRole::Parent
    } else {
        RelationRole::Child
    };
    let split = |list: &str, q: char| -> Vec<String> {
        list.split(',')
            .map(|column| column.trim().trim_matches(q).to_string())
            .collect()
    };
    let parsed = foreign_key_patterns().iter().find_map(|(q, re)| {
        re.captures(&error.message).map(|c| {
            (
                c[1].to_string(),
                split(&c[2], *q),
                c[3].to_string(),
                split(&c[4], *q),
            )
        })
    });

    let (index, fields, table, referenced_fields) = match parsed {
        Some((index, fields, table, referenced)) => {
            (Some(index), Some(fields), Some(table), Some(referenced))
        }
        None => (None, None, None, None),
    };
    let value = fields
        .as_ref()
        .and_then(|fields| fields.first())
        .zip(instance)
        .and_then(|(field, instance)| instance.get(field))
        .filter(|value| !value.is_null())
        .cloned();

    DmRsError::ForeignKeyConstraint {
        role,
        table,
        fields,
        referenced_fields,
        value,
        index,
        source: error,
    }
}
