//! Render [`Predicate`] trees and sort keys as SQLite over the `tickets`
//! table.
//!
//! Literals are never inlined: every value becomes a positional `?`
//! parameter pushed onto the caller's parameter list, in rendering order.
//! Column expressions come from the closed [`Field`] set.

use std::fmt::Write as _;

use rusqlite::types::Value as SqlValue;

use crate::access::{CmpOp, Field, FieldType, Predicate, Value};
use crate::query::SortKey;

const TRUE_SQL: &str = "1 = 1";
const FALSE_SQL: &str = "0 = 1";

/// SQL expression reading `field` from a ticket row.
#[must_use]
pub fn column(field: Field) -> String {
    match field {
        Field::Id => "ticket_id".into(),
        Field::Tenant => "tenant".into(),
        Field::Number => "number".into(),
        Field::CreatedTime => "created_ms".into(),
        other => format!("json_extract(doc, '{}')", other.json_path()),
    }
}

fn bind(value: &Value) -> SqlValue {
    match value {
        Value::Text(text) => SqlValue::Text(text.clone()),
        Value::Int(n) => SqlValue::Integer(*n),
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
    }
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

fn member_of(field: Field, condition: &str) -> String {
    format!(
        "EXISTS (SELECT 1 FROM json_each(doc, '{}') WHERE {condition})",
        field.json_path()
    )
}

/// Render `predicate` as a WHERE fragment, appending its parameters.
#[must_use]
pub fn render(predicate: &Predicate, params: &mut Vec<SqlValue>) -> String {
    match predicate {
        Predicate::Any => TRUE_SQL.into(),
        Predicate::Nothing => FALSE_SQL.into(),
        Predicate::Eq(field, value) => {
            params.push(bind(value));
            if field.field_type() == FieldType::List {
                member_of(*field, "value = ?")
            } else {
                format!("{} = ?", column(*field))
            }
        }
        Predicate::In(field, values) => {
            if values.is_empty() {
                return FALSE_SQL.into();
            }
            params.extend(values.iter().map(bind));
            let list = placeholders(values.len());
            if field.field_type() == FieldType::List {
                member_of(*field, &format!("value IN ({list})"))
            } else {
                format!("{} IN ({list})", column(*field))
            }
        }
        Predicate::Cmp(field, op, value) => {
            if field.field_type() == FieldType::List {
                // Only `!=` is meaningful for a set: non-empty and not containing the value.
                if *op != CmpOp::Ne {
                    return FALSE_SQL.into();
                }
                params.push(bind(value));
                return format!(
                    "(json_array_length(doc, '{}') > 0 AND NOT {})",
                    field.json_path(),
                    member_of(*field, "value = ?")
                );
            }
            params.push(bind(value));
            let col = column(*field);
            if *op == CmpOp::Ne {
                format!("({col} IS NOT NULL AND {col} <> ?)")
            } else {
                format!("{col} {} ?", op.symbol())
            }
        }
        Predicate::Contains(field, needle) => {
            params.push(SqlValue::Text(format!("%{}%", escape_like(needle))));
            format!("{} LIKE ? ESCAPE '\\'", column(*field))
        }
        Predicate::And(children) => join(children, " AND ", TRUE_SQL, params),
        Predicate::Or(children) => join(children, " OR ", FALSE_SQL, params),
    }
}

fn join(children: &[Predicate], sep: &str, empty: &str, params: &mut Vec<SqlValue>) -> String {
    if children.is_empty() {
        return empty.into();
    }
    let parts: Vec<String> = children.iter().map(|c| render(c, params)).collect();
    format!("({})", parts.join(sep))
}

/// Escape `%`, `_` and the escape character itself for a LIKE pattern.
fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// ORDER BY clause for `keys`. Text keys sort case-insensitively.
#[must_use]
pub fn order_by(keys: &[SortKey]) -> String {
    let mut sql = String::new();
    for (i, key) in keys.iter().enumerate() {
        sql.push_str(if i == 0 { " ORDER BY " } else { ", " });
        let _ = write!(sql, "{}", column(key.field));
        if key.field.field_type() == FieldType::Text {
            sql.push_str(" COLLATE NOCASE");
        }
        let _ = write!(sql, " {}", key.direction.sql());
    }
    sql
}
