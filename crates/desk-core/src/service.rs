//! Request-scoped ticket operations.
//!
//! Every operation resolves the caller first, then reads through the same
//! visibility predicate. Single-ticket reads that fail visibility report
//! `NotFound`, so callers cannot probe for tickets they may not see.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument};

use crate::collab::{TemplateCatalog, TicketNumberIssuer};
use crate::context::{AccessResolver, RequestContext};
use crate::error::{DeskError, Entity, ErrorCode, Result};
use crate::model::ticket::ticket_id;
use crate::model::{
    Activity, ActivityAction, Caller, Connect, NewTicket, Resolution, TemplateRef, Ticket, UserRef,
};
use crate::query::{DEFAULT_MAX_PAGE_SIZE, ListRequest, Page, QueryPurpose, TicketQueryBuilder};
use crate::store::{Facets, TicketStore, WorkflowStore};
use crate::workflow::{Status, Workflow, can_transition, default_status, possible_statuses};

/// Collaborators a [`TicketService`] is wired with.
#[derive(Clone)]
pub struct ServiceDeps {
    pub tickets: Arc<dyn TicketStore>,
    pub workflows: Arc<dyn WorkflowStore>,
    pub templates: Arc<dyn TemplateCatalog>,
    pub numbers: Arc<dyn TicketNumberIssuer>,
    pub resolver: AccessResolver,
}

pub struct TicketService {
    deps: ServiceDeps,
    max_page_size: i64,
}

impl std::fmt::Debug for TicketService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TicketService")
            .field("max_page_size", &self.max_page_size)
            .finish_non_exhaustive()
    }
}

impl TicketService {
    #[must_use]
    pub const fn new(deps: ServiceDeps) -> Self {
        Self {
            deps,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
        }
    }

    #[must_use]
    pub const fn with_max_page_size(mut self, max: i64) -> Self {
        self.max_page_size = max;
        self
    }

    /// Resolve `caller` into a request context.
    ///
    /// # Errors
    ///
    /// Propagates directory failures.
    pub async fn context(&self, caller: &Caller) -> Result<RequestContext> {
        self.deps.resolver.resolve(caller).await
    }

    async fn template_workflow(&self, tenant: &str, template_id: &str) -> Result<(TemplateRef, Workflow)> {
        let template = self
            .deps
            .templates
            .template(tenant, template_id)
            .await?
            .ok_or_else(|| DeskError::not_found(Entity::Template, template_id))?;
        let workflow = self
            .deps
            .workflows
            .get(tenant, &template.workflow_id)
            .await?
            .ok_or_else(|| DeskError::not_found(Entity::Workflow, &template.workflow_id))?;
        let template_ref = TemplateRef {
            id: template.id,
            name: template.name,
        };
        Ok((template_ref, workflow))
    }

    /// Create a ticket in the default status of its template's workflow.
    ///
    /// # Errors
    ///
    /// - `PermissionDenied` when no role grants `request_permission.add`
    /// - `Validation { field: "name" }` for a blank name
    /// - `NotFound` for an unknown template or workflow
    /// - `Validation { field: "template" }` when the workflow has no
    ///   default status
    #[instrument(skip_all, fields(tenant = %caller.tenant, user = %caller.user_id))]
    pub async fn create_ticket(&self, caller: &Caller, new: NewTicket) -> Result<Ticket> {
        let ctx = self.context(caller).await?;
        if !ctx.summary().can_add {
            return Err(DeskError::PermissionDenied {
                action: "create ticket",
            });
        }
        let name = new.name.trim();
        if name.is_empty() {
            return Err(DeskError::validation("name", "ticket name must not be empty"));
        }

        let (template, workflow) = self.template_workflow(ctx.tenant(), &new.template_id).await?;
        let Some(status) = default_status(&workflow) else {
            return Err(DeskError::invalid(
                "template",
                ErrorCode::MissingDefaultStatus,
                format!(
                    "template {} uses workflow {} which has no default status",
                    template.id, workflow.id
                ),
            ));
        };

        let number = self.deps.numbers.issue_next(ctx.tenant()).await?;
        let creator = UserRef::new(ctx.user_id());
        let ticket = Ticket {
            id: ticket_id(ctx.tenant(), number),
            tenant: ctx.tenant().to_string(),
            number,
            name: name.to_string(),
            description: new.description,
            status: Some(status.clone()),
            workflow,
            template,
            requester: new.requester.unwrap_or_else(|| creator.clone()),
            creator,
            technician: new.technician,
            group: new.group,
            department: new.department,
            service: new.service,
            ticket_type: new.ticket_type,
            priority: new.priority,
            response_overdue: false,
            resolve_overdue: false,
            overdue_time: None,
            resolution: None,
            connect: Connect::default(),
            activities: vec![Activity::new(
                ActivityAction::Created {
                    status: Some(status),
                },
                ctx.user_id(),
            )],
            created_time: Utc::now(),
        };

        self.deps.tickets.insert(&ticket).await?;
        info!(id = %ticket.id, number, "created ticket");
        Ok(ticket)
    }

    /// Load a ticket the context may see.
    ///
    /// # Errors
    ///
    /// `NotFound` when the ticket is missing or invisible.
    pub async fn visible_ticket(&self, ctx: &RequestContext, id: &str) -> Result<Ticket> {
        match self.deps.tickets.get(ctx.tenant(), id).await? {
            Some(ticket) if ctx.can_see(&ticket) => Ok(ticket),
            _ => Err(DeskError::not_found(Entity::Ticket, id)),
        }
    }

    /// # Errors
    ///
    /// `NotFound` when the ticket is missing or invisible to the caller.
    pub async fn get_ticket(&self, caller: &Caller, id: &str) -> Result<Ticket> {
        let ctx = self.context(caller).await?;
        self.visible_ticket(&ctx, id).await
    }

    /// Statuses the ticket may move to, current status first.
    ///
    /// # Errors
    ///
    /// `NotFound` when the ticket is missing or invisible to the caller.
    pub async fn possible_statuses(&self, caller: &Caller, id: &str) -> Result<Vec<Status>> {
        let ticket = self.get_ticket(caller, id).await?;
        let current = ticket.status.as_ref().map(|s| s.id.as_str());
        Ok(possible_statuses(&ticket.workflow, current))
    }

    /// Every status a ticket created from `template_id` could hold.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown template or workflow.
    pub async fn template_statuses(&self, caller: &Caller, template_id: &str) -> Result<Vec<Status>> {
        let ctx = self.context(caller).await?;
        let (_, workflow) = self.template_workflow(ctx.tenant(), template_id).await?;
        Ok(possible_statuses(&workflow, None))
    }

    /// Move a ticket to `status_id`. Re-applying the current status is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// - `NotFound` when the ticket is missing or invisible
    /// - `Validation { field: "status" }` when the workflow does not allow
    ///   the transition
    #[instrument(skip_all, fields(tenant = %caller.tenant, id = %id, to = %status_id))]
    pub async fn update_status(&self, caller: &Caller, id: &str, status_id: &str) -> Result<Ticket> {
        let ctx = self.context(caller).await?;
        let mut ticket = self.visible_ticket(&ctx, id).await?;

        let current = ticket.status.clone();
        if current.as_ref().is_some_and(|s| s.id == status_id) {
            return Ok(ticket);
        }
        let from = current.as_ref().map(|s| s.id.as_str());
        if !can_transition(&ticket.workflow, from, status_id) {
            return Err(DeskError::invalid(
                "status",
                ErrorCode::InvalidStatusTransition,
                format!(
                    "cannot move ticket {} from {} to {status_id}",
                    ticket.number,
                    from.unwrap_or("<none>")
                ),
            ));
        }
        let Some(target) = ticket
            .workflow
            .node_with_status(status_id)
            .and_then(|node| node.status.as_ref())
            .map(Status::to_ref)
        else {
            return Err(DeskError::validation("status", format!("unknown status {status_id}")));
        };

        ticket.status = Some(target.clone());
        ticket.activities.push(Activity::new(
            ActivityAction::StatusChanged {
                from: current,
                to: target,
            },
            ctx.user_id(),
        ));
        self.deps.tickets.replace(&ticket).await?;
        info!("status updated");
        Ok(ticket)
    }

    /// Record or overwrite the resolution note.
    ///
    /// # Errors
    ///
    /// - `NotFound` when the ticket is missing or invisible
    /// - `Validation { field: "resolution" }` for a blank description
    pub async fn update_resolution(&self, caller: &Caller, id: &str, description: &str) -> Result<Ticket> {
        let ctx = self.context(caller).await?;
        let description = description.trim();
        if description.is_empty() {
            return Err(DeskError::validation("resolution", "resolution must not be empty"));
        }
        let mut ticket = self.visible_ticket(&ctx, id).await?;
        ticket.resolution = Some(Resolution {
            description: description.to_string(),
            resolved_by: ctx.user_id().to_string(),
            resolved_time: Utc::now(),
        });
        ticket
            .activities
            .push(Activity::new(ActivityAction::ResolutionUpdated, ctx.user_id()));
        self.deps.tickets.replace(&ticket).await?;
        info!(id = %ticket.id, "resolution updated");
        Ok(ticket)
    }

    async fn run(&self, caller: &Caller, request: &ListRequest, purpose: QueryPurpose) -> Result<Page<Ticket>> {
        let ctx = self.context(caller).await?;
        let query = TicketQueryBuilder::new(ctx.tenant(), ctx.access.clone())
            .request(request, purpose, self.max_page_size)?
            .build();
        self.deps.tickets.query(&query).await
    }

    /// Caller-facing listing. Paging is mandatory.
    ///
    /// # Errors
    ///
    /// Validation errors from the query pipeline, or store failures.
    pub async fn list(&self, caller: &Caller, request: &ListRequest) -> Result<Page<Ticket>> {
        self.run(caller, request, QueryPurpose::Listing).await
    }

    /// Listing driven by the advanced filter panel. Same pipeline and
    /// bounds as [`Self::list`].
    ///
    /// # Errors
    ///
    /// Validation errors from the query pipeline, or store failures.
    pub async fn advanced_filter(&self, caller: &Caller, request: &ListRequest) -> Result<Page<Ticket>> {
        self.run(caller, request, QueryPurpose::AdvancedFilter).await
    }

    /// Every matching ticket, unpaged.
    ///
    /// # Errors
    ///
    /// Validation errors from the query pipeline, or store failures.
    pub async fn export(&self, caller: &Caller, request: &ListRequest) -> Result<Vec<Ticket>> {
        Ok(self.run(caller, request, QueryPurpose::Export).await?.items)
    }

    /// Status and overdue counters over every matching ticket.
    ///
    /// # Errors
    ///
    /// Validation errors from the query pipeline, or store failures.
    pub async fn statistics(&self, caller: &Caller, request: &ListRequest) -> Result<Facets> {
        let ctx = self.context(caller).await?;
        let query = TicketQueryBuilder::new(ctx.tenant(), ctx.access.clone())
            .request(request, QueryPurpose::Statistics, self.max_page_size)?
            .build();
        self.deps.tickets.facets(&query.predicate).await
    }
}
