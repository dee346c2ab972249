use std::fmt;

/// Machine-readable error codes for callers that branch on failure kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigParseError,
    InvalidQuery,
    InvalidSort,
    InvalidDateRange,
    InvalidPaging,
    InvalidWorkflow,
    MissingDefaultStatus,
    InvalidStatusTransition,
    ValidationFailed,
    TicketNotFound,
    WorkflowNotFound,
    TemplateNotFound,
    IncidentNotFound,
    PermissionDenied,
    UpstreamUnavailable,
    StoreFailure,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigParseError => "E1001",
            Self::InvalidQuery => "E2001",
            Self::InvalidSort => "E2002",
            Self::InvalidDateRange => "E2003",
            Self::InvalidPaging => "E2004",
            Self::InvalidWorkflow => "E2005",
            Self::MissingDefaultStatus => "E2006",
            Self::InvalidStatusTransition => "E2007",
            Self::ValidationFailed => "E2099",
            Self::TicketNotFound => "E3001",
            Self::WorkflowNotFound => "E3002",
            Self::TemplateNotFound => "E3003",
            Self::IncidentNotFound => "E3004",
            Self::PermissionDenied => "E4001",
            Self::UpstreamUnavailable => "E5001",
            Self::StoreFailure => "E6001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigParseError => "Config file parse error",
            Self::InvalidQuery => "Malformed query string",
            Self::InvalidSort => "Malformed sort specification",
            Self::InvalidDateRange => "Malformed date range",
            Self::InvalidPaging => "Invalid page or size",
            Self::InvalidWorkflow => "Workflow graph is inconsistent",
            Self::MissingDefaultStatus => "Workflow has no default status",
            Self::InvalidStatusTransition => "Status transition not allowed by workflow",
            Self::ValidationFailed => "Request validation failed",
            Self::TicketNotFound => "Ticket not found",
            Self::WorkflowNotFound => "Workflow not found",
            Self::TemplateNotFound => "Template not found",
            Self::IncidentNotFound => "Incident not found",
            Self::PermissionDenied => "Permission denied",
            Self::UpstreamUnavailable => "Upstream service unavailable",
            Self::StoreFailure => "Ticket store failure",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigParseError => Some("Fix syntax in .desk/config.toml and retry."),
            Self::InvalidQuery => {
                Some("Use `field op value` terms joined by AND/OR, e.g. `status = open AND number > 10`.")
            }
            Self::InvalidSort => Some("Use `field[:asc|:desc]`, comma-separated."),
            Self::InvalidDateRange => Some("Make sure the range start is not after its end."),
            Self::InvalidPaging => Some("Pages start at 1; size must be positive."),
            Self::InvalidWorkflow => {
                Some("A workflow needs exactly one START node and edges between known nodes.")
            }
            Self::MissingDefaultStatus => Some(
                "Connect the START node to a node carrying a status in the template's workflow.",
            ),
            Self::InvalidStatusTransition => {
                Some("List the ticket's possible statuses and pick one of those.")
            }
            Self::PermissionDenied => Some("Ask a tenant admin (TA) to perform this action."),
            Self::UpstreamUnavailable => Some("Retry once the upstream service is reachable."),
            Self::StoreFailure => Some("Retry once. If persistent, report a bug with logs."),
            Self::ValidationFailed
            | Self::TicketNotFound
            | Self::WorkflowNotFound
            | Self::TemplateNotFound
            | Self::IncidentNotFound => None,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Entity kinds that can be reported missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Ticket,
    Workflow,
    Template,
    Incident,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ticket => "ticket",
            Self::Workflow => "workflow",
            Self::Template => "template",
            Self::Incident => "incident",
        })
    }
}

/// Errors surfaced by the ticket lifecycle core.
#[derive(Debug, thiserror::Error)]
pub enum DeskError {
    /// Malformed caller input. `field` names the offending parameter.
    #[error("invalid {field}: {reason}")]
    Validation {
        field: &'static str,
        code: ErrorCode,
        reason: String,
    },

    #[error("{entity} not found: {id}")]
    NotFound { entity: Entity, id: String },

    #[error("permission denied: {action}")]
    PermissionDenied { action: &'static str },

    #[error("upstream {service} failed: {reason}")]
    Upstream {
        service: &'static str,
        reason: String,
    },

    #[error("store error: {0}")]
    Store(#[from] anyhow::Error),
}

impl DeskError {
    /// Build a validation error with the generic validation code.
    #[must_use]
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            code: ErrorCode::ValidationFailed,
            reason: reason.into(),
        }
    }

    /// Build a validation error carrying a specific code.
    #[must_use]
    pub fn invalid(field: &'static str, code: ErrorCode, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            code,
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn not_found(entity: Entity, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    #[must_use]
    pub fn upstream(service: &'static str, reason: impl fmt::Display) -> Self {
        Self::Upstream {
            service,
            reason: reason.to_string(),
        }
    }

    /// The stable code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Validation { code, .. } => *code,
            Self::NotFound { entity, .. } => match entity {
                Entity::Ticket => ErrorCode::TicketNotFound,
                Entity::Workflow => ErrorCode::WorkflowNotFound,
                Entity::Template => ErrorCode::TemplateNotFound,
                Entity::Incident => ErrorCode::IncidentNotFound,
            },
            Self::PermissionDenied { .. } => ErrorCode::PermissionDenied,
            Self::Upstream { .. } => ErrorCode::UpstreamUnavailable,
            Self::Store(_) => ErrorCode::StoreFailure,
        }
    }
}

impl From<rusqlite::Error> for DeskError {
    fn from(error: rusqlite::Error) -> Self {
        Self::Store(error.into())
    }
}

impl From<serde_json::Error> for DeskError {
    fn from(error: serde_json::Error) -> Self {
        Self::Store(error.into())
    }
}

pub type Result<T> = std::result::Result<T, DeskError>;

#[cfg(test)]
mod tests {
    use super::{DeskError, Entity, ErrorCode};
    use std::collections::HashSet;

    #[test]
    fn all_codes_are_unique() {
        let all = [
            ErrorCode::ConfigParseError,
            ErrorCode::InvalidQuery,
            ErrorCode::InvalidSort,
            ErrorCode::InvalidDateRange,
            ErrorCode::InvalidPaging,
            ErrorCode::InvalidWorkflow,
            ErrorCode::MissingDefaultStatus,
            ErrorCode::InvalidStatusTransition,
            ErrorCode::ValidationFailed,
            ErrorCode::TicketNotFound,
            ErrorCode::WorkflowNotFound,
            ErrorCode::TemplateNotFound,
            ErrorCode::IncidentNotFound,
            ErrorCode::PermissionDenied,
            ErrorCode::UpstreamUnavailable,
            ErrorCode::StoreFailure,
        ];

        let mut seen = HashSet::new();
        for code in all {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        let code = ErrorCode::InvalidStatusTransition.code();
        assert_eq!(code.len(), 5);
        assert!(code.starts_with('E'));
        assert!(code.chars().skip(1).all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn validation_message_names_field() {
        let err = DeskError::invalid("query", ErrorCode::InvalidQuery, "unexpected token ')'");
        assert_eq!(err.to_string(), "invalid query: unexpected token ')'");
        assert_eq!(err.code(), ErrorCode::InvalidQuery);
    }

    #[test]
    fn permission_and_validation_are_distinct_kinds() {
        let denied = DeskError::PermissionDenied {
            action: "delete connect link",
        };
        let invalid = DeskError::validation("status", "unknown");
        assert_ne!(denied.code(), invalid.code());
        assert_eq!(
            DeskError::not_found(Entity::Template, "tpl-1").code(),
            ErrorCode::TemplateNotFound
        );
    }
}
