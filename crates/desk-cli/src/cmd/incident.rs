//! `desk incident`: incident service notifications and lookups.

use anyhow::Result;
use clap::{Args, Subcommand};
use desk_core::query::Paging;
use std::io::Write as _;

use crate::app::{App, Identity};
use crate::output::{OutputMode, render};

#[derive(Subcommand, Debug)]
pub enum IncidentCommand {
    /// Incidents were deleted upstream: drop them from every ticket in the tenant.
    Deleted(DeletedArgs),
    /// Tickets connected to any of the given incidents, one page at a time.
    Tickets(TicketsArgs),
}

#[derive(Args, Debug)]
pub struct DeletedArgs {
    #[arg(required = true)]
    pub incidents: Vec<String>,
}

#[derive(Args, Debug)]
pub struct TicketsArgs {
    #[arg(required = true)]
    pub incidents: Vec<String>,

    #[arg(short, long, allow_hyphen_values = true)]
    pub sort: Option<String>,

    #[arg(long, default_value_t = 1)]
    pub page: i64,

    /// Page size; defaults to `[paging] default_size`.
    #[arg(long)]
    pub size: Option<i64>,
}

pub async fn run(command: &IncidentCommand, app: &App, who: &Identity, output: OutputMode) -> Result<()> {
    match command {
        IncidentCommand::Deleted(args) => {
            let touched = app.links.on_incident_deleted(&who.tenant, &args.incidents).await?;
            let report = serde_json::json!({ "tickets": touched });
            render(output, &report, |_, w| {
                writeln!(w, "✓ Removed from {} ticket(s)", touched.len())?;
                for id in &touched {
                    writeln!(w, "  {id}")?;
                }
                Ok(())
            })
        }
        IncidentCommand::Tickets(args) => {
            let size = args.size.unwrap_or(app.config.paging.default_size);
            let page = app
                .links
                .list_incident_tickets(
                    &who.caller(),
                    &args.incidents,
                    Paging::new(args.page, size),
                    args.sort.as_deref(),
                )
                .await?;
            render(output, &page, |p, w| {
                for ticket in &p.items {
                    let status = ticket.status.as_ref().map_or("-", |s| s.id.as_str());
                    writeln!(w, "#{:<5} {:<14} {:<12} {}", ticket.number, ticket.id, status, ticket.name)?;
                }
                writeln!(w, "page {}/{} ({} total)", p.page, p.total_page.max(1), p.total)
            })
        }
    }
}
