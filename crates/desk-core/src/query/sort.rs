use std::fmt;

use serde::{Deserialize, Serialize};

use crate::access::{Field, FieldType};
use crate::error::{DeskError, ErrorCode, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    #[must_use]
    pub const fn sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub field: Field,
    pub direction: Direction,
}

impl SortKey {
    #[must_use]
    pub const fn new(field: Field, direction: Direction) -> Self {
        Self { field, direction }
    }

    /// Newest ticket first. Always appended so paging is deterministic.
    #[must_use]
    pub const fn tiebreak() -> Self {
        Self::new(Field::Number, Direction::Desc)
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dir = match self.direction {
            Direction::Asc => "asc",
            Direction::Desc => "desc",
        };
        write!(f, "{}:{dir}", self.field)
    }
}

/// Parse `field[:asc|:desc]` or `-field`, comma separated.
///
/// # Errors
///
/// Returns a `sort` validation error for unknown fields, unknown
/// directions, or fields that cannot be ordered.
pub fn parse_sort(input: &str) -> Result<Vec<SortKey>> {
    let mut keys = Vec::new();
    for part in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (name, direction) = if let Some(rest) = part.strip_prefix('-') {
            (rest, Direction::Desc)
        } else if let Some((name, dir)) = part.split_once(':') {
            let direction = match dir.trim().to_ascii_lowercase().as_str() {
                "asc" => Direction::Asc,
                "desc" => Direction::Desc,
                other => return Err(invalid(format!("unknown sort direction '{other}'"))),
            };
            (name, direction)
        } else {
            (part, Direction::Asc)
        };

        let field: Field = name.parse().map_err(invalid)?;
        if field.field_type() == FieldType::List {
            return Err(invalid(format!("cannot sort by {field}")));
        }
        if !keys.iter().any(|k: &SortKey| k.field == field) {
            keys.push(SortKey::new(field, direction));
        }
    }
    Ok(keys)
}

fn invalid(reason: String) -> DeskError {
    DeskError::invalid("sort", ErrorCode::InvalidSort, reason)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_both_syntaxes() {
        let keys = parse_sort("priority:desc, -created_time, name").unwrap();
        assert_eq!(
            keys,
            vec![
                SortKey::new(Field::PriorityId, Direction::Desc),
                SortKey::new(Field::CreatedTime, Direction::Desc),
                SortKey::new(Field::Name, Direction::Asc),
            ]
        );
    }

    #[test]
    fn duplicate_fields_keep_first() {
        let keys = parse_sort("number:asc,-number").unwrap();
        assert_eq!(keys, vec![SortKey::new(Field::Number, Direction::Asc)]);
    }

    #[test]
    fn rejects_bad_input() {
        for input in ["bogus", "name:sideways", "incidents"] {
            let err = parse_sort(input).unwrap_err();
            assert!(
                matches!(err, DeskError::Validation { field: "sort", .. }),
                "{input}: {err:?}"
            );
        }
    }

    #[test]
    fn empty_input_yields_no_keys() {
        assert!(parse_sort("  , ").unwrap().is_empty());
    }
}
