//! Store-agnostic boolean predicates over ticket fields.
//!
//! A [`Predicate`] is a tagged tree: leaves compare one [`Field`] with
//! literal [`Value`]s, inner nodes combine children with AND/OR. The same
//! tree is evaluated in memory ([`Predicate::matches`]) and rendered to SQL
//! by the store, so visibility rules can be unit-tested without a database.
//!
//! [`Predicate::Nothing`] is an explicit always-false clause. An empty
//! restriction must never be represented by leaving a clause out.

use std::fmt;
use std::str::FromStr;

use crate::model::Ticket;

/// How a field is stored inside the ticket document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Text,
    Int,
    Bool,
    /// Epoch milliseconds.
    Time,
    /// Array of text ids; equality means membership.
    List,
}

/// Queryable ticket fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Id,
    Tenant,
    Number,
    Name,
    Description,
    StatusId,
    StatusName,
    CreatorId,
    RequesterId,
    TechnicianId,
    GroupId,
    DepartmentId,
    ServiceId,
    TypeId,
    PriorityId,
    ResponseOverdue,
    ResolveOverdue,
    CreatedTime,
    OverdueTime,
    Requests,
    Incidents,
}

impl Field {
    /// Fields a caller may name in a query or sort string.
    pub const QUERYABLE: [Self; 19] = [
        Self::Id,
        Self::Number,
        Self::Name,
        Self::Description,
        Self::StatusId,
        Self::StatusName,
        Self::CreatorId,
        Self::RequesterId,
        Self::TechnicianId,
        Self::GroupId,
        Self::DepartmentId,
        Self::ServiceId,
        Self::TypeId,
        Self::PriorityId,
        Self::ResponseOverdue,
        Self::ResolveOverdue,
        Self::CreatedTime,
        Self::OverdueTime,
        Self::Incidents,
    ];

    /// Canonical dotted name, used in query strings and diagnostics.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Tenant => "tenant",
            Self::Number => "number",
            Self::Name => "name",
            Self::Description => "description",
            Self::StatusId => "status.id",
            Self::StatusName => "status.name",
            Self::CreatorId => "creator.id",
            Self::RequesterId => "requester.id",
            Self::TechnicianId => "technician.id",
            Self::GroupId => "group.id",
            Self::DepartmentId => "department.id",
            Self::ServiceId => "service.id",
            Self::TypeId => "type.id",
            Self::PriorityId => "priority.id",
            Self::ResponseOverdue => "response_overdue",
            Self::ResolveOverdue => "resolve_overdue",
            Self::CreatedTime => "created_time",
            Self::OverdueTime => "overdue_time",
            Self::Requests => "connect.requests",
            Self::Incidents => "connect.incidents",
        }
    }

    /// JSON path of the field inside the stored document.
    #[must_use]
    pub const fn json_path(self) -> &'static str {
        match self {
            Self::Id => "$.id",
            Self::Tenant => "$.tenant",
            Self::Number => "$.number",
            Self::Name => "$.name",
            Self::Description => "$.description",
            Self::StatusId => "$.status.id",
            Self::StatusName => "$.status.name",
            Self::CreatorId => "$.creator.id",
            Self::RequesterId => "$.requester.id",
            Self::TechnicianId => "$.technician.id",
            Self::GroupId => "$.group.id",
            Self::DepartmentId => "$.department.id",
            Self::ServiceId => "$.service.id",
            Self::TypeId => "$.type.id",
            Self::PriorityId => "$.priority.id",
            Self::ResponseOverdue => "$.response_overdue",
            Self::ResolveOverdue => "$.resolve_overdue",
            Self::CreatedTime => "$.created_time",
            Self::OverdueTime => "$.overdue_time",
            Self::Requests => "$.connect.requests",
            Self::Incidents => "$.connect.incidents",
        }
    }

    #[must_use]
    pub const fn field_type(self) -> FieldType {
        match self {
            Self::Number => FieldType::Int,
            Self::ResponseOverdue | Self::ResolveOverdue => FieldType::Bool,
            Self::CreatedTime | Self::OverdueTime => FieldType::Time,
            Self::Requests | Self::Incidents => FieldType::List,
            _ => FieldType::Text,
        }
    }

    /// Current values of this field on `ticket`. Empty when unset.
    #[must_use]
    pub fn values(self, ticket: &Ticket) -> Vec<Value> {
        fn text(value: Option<&String>) -> Vec<Value> {
            value.map(|v| Value::Text(v.clone())).into_iter().collect()
        }

        match self {
            Self::Id => text(Some(&ticket.id)),
            Self::Tenant => text(Some(&ticket.tenant)),
            Self::Number => vec![Value::Int(i64::try_from(ticket.number).unwrap_or(i64::MAX))],
            Self::Name => text(Some(&ticket.name)),
            Self::Description => text(ticket.description.as_ref()),
            Self::StatusId => text(ticket.status.as_ref().map(|s| &s.id)),
            Self::StatusName => text(ticket.status.as_ref().map(|s| &s.name)),
            Self::CreatorId => text(Some(&ticket.creator.id)),
            Self::RequesterId => text(Some(&ticket.requester.id)),
            Self::TechnicianId => text(ticket.technician.as_ref().map(|u| &u.id)),
            Self::GroupId => text(ticket.group.as_ref().map(|e| &e.id)),
            Self::DepartmentId => text(ticket.department.as_ref().map(|e| &e.id)),
            Self::ServiceId => text(ticket.service.as_ref().map(|e| &e.id)),
            Self::TypeId => text(ticket.ticket_type.as_ref().map(|e| &e.id)),
            Self::PriorityId => text(ticket.priority.as_ref().map(|e| &e.id)),
            Self::ResponseOverdue => vec![Value::Bool(ticket.response_overdue)],
            Self::ResolveOverdue => vec![Value::Bool(ticket.resolve_overdue)],
            Self::CreatedTime => vec![Value::Int(ticket.created_time.timestamp_millis())],
            Self::OverdueTime => ticket
                .overdue_time
                .map(|t| Value::Int(t.timestamp_millis()))
                .into_iter()
                .collect(),
            Self::Requests => ticket.connect.requests.iter().cloned().map(Value::Text).collect(),
            Self::Incidents => ticket.connect.incidents.iter().cloned().map(Value::Text).collect(),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Field {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        let field = match normalized.as_str() {
            "status" => Self::StatusId,
            "creator" => Self::CreatorId,
            "requester" => Self::RequesterId,
            "technician" => Self::TechnicianId,
            "group" => Self::GroupId,
            "department" => Self::DepartmentId,
            "service" => Self::ServiceId,
            "type" => Self::TypeId,
            "priority" => Self::PriorityId,
            "incidents" => Self::Incidents,
            other => Self::QUERYABLE
                .into_iter()
                .find(|field| field.name() == other)
                .ok_or_else(|| format!("unknown field '{}'", s.trim()))?,
        };
        Ok(field)
    }
}

/// A literal compared against a field.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Value {
    Text(String),
    Int(i64),
    Bool(bool),
}

impl Value {
    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => write!(f, "{text:?}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// Ordered comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CmpOp {
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
        }
    }

    fn holds(self, left: &Value, right: &Value) -> bool {
        let same_type = std::mem::discriminant(left) == std::mem::discriminant(right);
        if !same_type {
            return false;
        }
        match self {
            Self::Ne => left != right,
            Self::Gt => left > right,
            Self::Gte => left >= right,
            Self::Lt => left < right,
            Self::Lte => left <= right,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// Matches every ticket.
    Any,
    /// Matches no ticket.
    Nothing,
    Eq(Field, Value),
    In(Field, Vec<Value>),
    Cmp(Field, CmpOp, Value),
    /// Case-insensitive substring match on a text field.
    Contains(Field, String),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

impl Predicate {
    #[must_use]
    pub fn eq(field: Field, value: impl Into<String>) -> Self {
        Self::Eq(field, Value::Text(value.into()))
    }

    /// `field ∈ ids`. An empty id set is [`Predicate::Nothing`].
    #[must_use]
    pub fn any_of(field: Field, ids: &[String]) -> Self {
        if ids.is_empty() {
            return Self::Nothing;
        }
        Self::In(field, ids.iter().cloned().map(Value::Text).collect())
    }

    /// Evaluate against an in-memory ticket.
    ///
    /// Unset fields never satisfy a comparison, mirroring SQL NULL handling.
    #[must_use]
    pub fn matches(&self, ticket: &Ticket) -> bool {
        match self {
            Self::Any => true,
            Self::Nothing => false,
            Self::Eq(field, value) => field.values(ticket).contains(value),
            Self::In(field, values) => field.values(ticket).iter().any(|v| values.contains(v)),
            Self::Cmp(field, op, value) => {
                let current = field.values(ticket);
                match op {
                    CmpOp::Ne => {
                        !current.is_empty() && current.iter().all(|v| op.holds(v, value))
                    }
                    _ => current.iter().any(|v| op.holds(v, value)),
                }
            }
            Self::Contains(field, needle) => {
                let needle = needle.to_lowercase();
                field.values(ticket).iter().any(|v| match v {
                    Value::Text(text) => text.to_lowercase().contains(&needle),
                    Value::Int(_) | Value::Bool(_) => false,
                })
            }
            Self::And(children) => children.iter().all(|c| c.matches(ticket)),
            Self::Or(children) => children.iter().any(|c| c.matches(ticket)),
        }
    }

    /// Flatten nested combinators and fold constants.
    ///
    /// The result matches exactly the same tickets as `self`.
    #[must_use]
    pub fn simplify(self) -> Self {
        match self {
            Self::And(children) => {
                let mut flat = Vec::new();
                for child in children.into_iter().map(Self::simplify) {
                    match child {
                        Self::Any => {}
                        Self::Nothing => return Self::Nothing,
                        Self::And(inner) => flat.extend(inner),
                        other => flat.push(other),
                    }
                }
                match flat.len() {
                    0 => Self::Any,
                    1 => flat.remove(0),
                    _ => Self::And(flat),
                }
            }
            Self::Or(children) => {
                let mut flat = Vec::new();
                for child in children.into_iter().map(Self::simplify) {
                    match child {
                        Self::Nothing => {}
                        Self::Any => return Self::Any,
                        Self::Or(inner) => flat.extend(inner),
                        other => flat.push(other),
                    }
                }
                match flat.len() {
                    0 => Self::Nothing,
                    1 => flat.remove(0),
                    _ => Self::Or(flat),
                }
            }
            Self::In(_, ref values) if values.is_empty() => Self::Nothing,
            other => other,
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join(f: &mut fmt::Formatter<'_>, children: &[Predicate], sep: &str) -> fmt::Result {
            f.write_str("(")?;
            for (i, child) in children.iter().enumerate() {
                if i > 0 {
                    write!(f, " {sep} ")?;
                }
                write!(f, "{child}")?;
            }
            f.write_str(")")
        }

        match self {
            Self::Any => f.write_str("TRUE"),
            Self::Nothing => f.write_str("FALSE"),
            Self::Eq(field, value) => write!(f, "{field} = {value}"),
            Self::In(field, values) => {
                write!(f, "{field} IN [")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{value}")?;
                }
                f.write_str("]")
            }
            Self::Cmp(field, op, value) => write!(f, "{field} {} {value}", op.symbol()),
            Self::Contains(field, needle) => write!(f, "{field} ~ {needle:?}"),
            Self::And(children) => join(f, children, "AND"),
            Self::Or(children) => join(f, children, "OR"),
        }
    }
}
