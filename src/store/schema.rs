//! Schema synthesis for relational backends.
//!
//! A relational store needs columns for an arbitrary serializable profile
//! type. These helpers derive a `Field` descriptor list once per store
//! instance by serializing a sample profile and introspecting the resulting
//! JSON object, then bind and extract values through the small [`SqlValue`]
//! tagged union instead of dynamic casts. Fields are sorted by name so the
//! synthesized column order is deterministic.

use serde::Serialize;
use serde_json::Value;

use crate::error::AuthError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub kind: FieldKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Integer,
    Float,
    Boolean,
}

/// Column type for a semantic field kind, in portable SQL spelling.
pub fn column_type(kind: FieldKind) -> &'static str {
    match kind {
        FieldKind::Text => "VARCHAR(256)",
        FieldKind::Integer => "BIGINT",
        FieldKind::Float => "DOUBLE PRECISION",
        FieldKind::Boolean => "BOOLEAN",
    }
}

/// A bound value for one profile column.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Null,
}

fn kind_of(value: &Value) -> Option<FieldKind> {
    match value {
        Value::String(_) => Some(FieldKind::Text),
        Value::Number(n) if n.is_f64() => Some(FieldKind::Float),
        Value::Number(_) => Some(FieldKind::Integer),
        Value::Bool(_) => Some(FieldKind::Boolean),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Derive the field descriptors for a profile type from a sample value.
///
/// # Errors
///
/// Returns `Unsupported` when the profile is not a flat object or contains a
/// field whose type has no relational mapping (null, array, nested object).
pub fn explain_properties<P: Serialize>(sample: &P) -> Result<Vec<Field>, AuthError> {
    let value =
        serde_json::to_value(sample).map_err(|err| AuthError::Unsupported(err.to_string()))?;
    let Value::Object(map) = value else {
        return Err(AuthError::Unsupported(
            "profile must serialize to a flat object".to_string(),
        ));
    };

    let mut fields = Vec::with_capacity(map.len());
    for (name, value) in &map {
        let kind = kind_of(value).ok_or_else(|| {
            AuthError::Unsupported(format!("field '{name}' has no relational mapping"))
        })?;
        fields.push(Field {
            name: name.clone(),
            kind,
        });
    }
    fields.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(fields)
}

/// Bind a profile's values in field order for a parameterized statement.
///
/// # Errors
///
/// Returns `Unsupported` when the profile does not match the descriptor
/// list (missing field or incompatible type).
pub fn bind_values<P: Serialize>(profile: &P, fields: &[Field]) -> Result<Vec<SqlValue>, AuthError> {
    let value =
        serde_json::to_value(profile).map_err(|err| AuthError::Unsupported(err.to_string()))?;
    let Value::Object(map) = value else {
        return Err(AuthError::Unsupported(
            "profile must serialize to a flat object".to_string(),
        ));
    };

    let mut bound = Vec::with_capacity(fields.len());
    for field in fields {
        let value = map.get(&field.name).ok_or_else(|| {
            AuthError::Unsupported(format!("profile is missing field '{}'", field.name))
        })?;
        let sql = match (field.kind, value) {
            (_, Value::Null) => SqlValue::Null,
            (FieldKind::Text, Value::String(s)) => SqlValue::Text(s.clone()),
            (FieldKind::Integer, Value::Number(n)) if n.as_i64().is_some() => {
                SqlValue::Integer(n.as_i64().unwrap_or_default())
            }
            (FieldKind::Float, Value::Number(n)) if n.as_f64().is_some() => {
                SqlValue::Float(n.as_f64().unwrap_or_default())
            }
            (FieldKind::Boolean, Value::Bool(b)) => SqlValue::Boolean(*b),
            _ => {
                return Err(AuthError::Unsupported(format!(
                    "field '{}' does not match its declared kind",
                    field.name
                )))
            }
        };
        bound.push(sql);
    }
    Ok(bound)
}

/// Rebuild a profile JSON object from extracted column values, in the same
/// field order used by [`bind_values`].
///
/// # Errors
///
/// Returns `Unsupported` when the value count does not match the descriptor
/// list.
pub fn rebuild_profile(fields: &[Field], values: &[SqlValue]) -> Result<Value, AuthError> {
    if fields.len() != values.len() {
        return Err(AuthError::Unsupported(format!(
            "expected {} values, got {}",
            fields.len(),
            values.len()
        )));
    }
    let mut map = serde_json::Map::with_capacity(fields.len());
    for (field, value) in fields.iter().zip(values) {
        let json = match value {
            SqlValue::Text(s) => Value::from(s.clone()),
            SqlValue::Integer(i) => Value::from(*i),
            SqlValue::Float(f) => Value::from(*f),
            SqlValue::Boolean(b) => Value::from(*b),
            SqlValue::Null => Value::Null,
        };
        map.insert(field.name.clone(), json);
    }
    Ok(Value::Object(map))
}
