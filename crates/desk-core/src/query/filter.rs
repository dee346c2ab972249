//! Coarse listing filters: structured fields a UI sends next to the query
//! string.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::access::{CmpOp, Field, Predicate, Value};
use crate::error::{DeskError, ErrorCode, Result};

/// Inclusive time window. Either end may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<DateTime<Utc>>,
}

impl DateRange {
    #[must_use]
    pub const fn new(from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Self {
        Self { from, to }
    }

    fn predicate(self, field: Field, param: &'static str) -> Result<Option<Predicate>> {
        if let (Some(from), Some(to)) = (self.from, self.to) {
            if from > to {
                return Err(DeskError::invalid(
                    param,
                    ErrorCode::InvalidDateRange,
                    format!("from ({from}) is after to ({to})"),
                ));
            }
        }

        let mut bounds = Vec::new();
        if let Some(from) = self.from {
            bounds.push(Predicate::Cmp(field, CmpOp::Gte, Value::Int(from.timestamp_millis())));
        }
        if let Some(to) = self.to {
            bounds.push(Predicate::Cmp(field, CmpOp::Lte, Value::Int(to.timestamp_millis())));
        }
        Ok(match bounds.len() {
            0 => None,
            1 => bounds.pop(),
            _ => Some(Predicate::And(bounds)),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TicketFilter {
    pub created_time: Option<DateRange>,
    pub overdue_time: Option<DateRange>,
    pub department: Vec<String>,
    pub service: Vec<String>,
    #[serde(rename = "type")]
    pub ticket_type: Vec<String>,
    pub priority: Vec<String>,
    pub group: Vec<String>,
    pub technician: Vec<String>,
    pub status: Vec<String>,
    pub response_overdue: Option<bool>,
    pub resolve_overdue: Option<bool>,
    /// Case-insensitive substring over name and description.
    pub search: Option<String>,
}

impl TicketFilter {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Every populated filter as one conjunction. Empty id lists are
    /// "no filter", not "match nothing".
    ///
    /// # Errors
    ///
    /// Returns a validation error naming `created_time` or `overdue_time`
    /// when a range has `from` after `to`.
    pub fn to_predicate(&self) -> Result<Predicate> {
        let mut clauses = Vec::new();

        if let Some(range) = self.created_time {
            clauses.extend(range.predicate(Field::CreatedTime, "created_time")?);
        }
        if let Some(range) = self.overdue_time {
            clauses.extend(range.predicate(Field::OverdueTime, "overdue_time")?);
        }

        for (field, ids) in [
            (Field::DepartmentId, &self.department),
            (Field::ServiceId, &self.service),
            (Field::TypeId, &self.ticket_type),
            (Field::PriorityId, &self.priority),
            (Field::GroupId, &self.group),
            (Field::TechnicianId, &self.technician),
            (Field::StatusId, &self.status),
        ] {
            if !ids.is_empty() {
                clauses.push(Predicate::any_of(field, ids));
            }
        }

        if let Some(flag) = self.response_overdue {
            clauses.push(Predicate::Eq(Field::ResponseOverdue, Value::Bool(flag)));
        }
        if let Some(flag) = self.resolve_overdue {
            clauses.push(Predicate::Eq(Field::ResolveOverdue, Value::Bool(flag)));
        }

        if let Some(needle) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            clauses.push(Predicate::Or(vec![
                Predicate::Contains(Field::Name, needle.to_string()),
                Predicate::Contains(Field::Description, needle.to_string()),
            ]));
        }

        Ok(Predicate::And(clauses).simplify())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::access::predicate::fixtures::ticket;
    use crate::model::EntityRef;

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).single().unwrap()
    }

    #[test]
    fn empty_filter_matches_everything() {
        let filter = TicketFilter::default();
        assert!(filter.is_empty());
        assert_eq!(filter.to_predicate().unwrap(), Predicate::Any);
    }

    #[test]
    fn inverted_range_names_the_field() {
        let filter = TicketFilter {
            overdue_time: Some(DateRange::new(Some(at(2_000)), Some(at(1_000)))),
            ..TicketFilter::default()
        };
        let err = filter.to_predicate().unwrap_err();
        assert!(matches!(
            err,
            DeskError::Validation {
                field: "overdue_time",
                code: ErrorCode::InvalidDateRange,
                ..
            }
        ));
    }

    #[test]
    fn created_range_is_inclusive() {
        let t = ticket(5, "u-1");
        let created = t.created_time;
        let exact = TicketFilter {
            created_time: Some(DateRange::new(Some(created), Some(created))),
            ..TicketFilter::default()
        };
        assert!(exact.to_predicate().unwrap().matches(&t));

        let later = TicketFilter {
            created_time: Some(DateRange::new(Some(at(created.timestamp_millis() + 1)), None)),
            ..TicketFilter::default()
        };
        assert!(!later.to_predicate().unwrap().matches(&t));
    }

    #[test]
    fn id_sets_and_search_combine() {
        let mut t = ticket(1, "u-1");
        t.priority = Some(EntityRef::new("p1"));
        t.description = Some("The VPN keeps dropping".into());

        let filter = TicketFilter {
            priority: vec!["p1".into(), "p2".into()],
            search: Some("vpn".into()),
            ..TicketFilter::default()
        };
        assert!(filter.to_predicate().unwrap().matches(&t));

        let miss = TicketFilter {
            priority: vec!["p3".into()],
            ..filter
        };
        assert!(!miss.to_predicate().unwrap().matches(&t));
    }

    #[test]
    fn overdue_flags_filter_exactly() {
        let mut t = ticket(1, "u-1");
        t.resolve_overdue = true;
        let overdue = TicketFilter {
            resolve_overdue: Some(true),
            ..TicketFilter::default()
        };
        let on_time = TicketFilter {
            resolve_overdue: Some(false),
            ..TicketFilter::default()
        };
        assert!(overdue.to_predicate().unwrap().matches(&t));
        assert!(!on_time.to_predicate().unwrap().matches(&t));
    }
}
