//! `desk link`: request and incident connections.

use anyhow::Result;
use clap::{Args, Subcommand};
use desk_core::LinkReport;
use serde::Serialize;
use std::io::Write as _;

use crate::app::{App, Identity};
use crate::output::{OutputMode, pretty_section, render};

#[derive(Subcommand, Debug)]
pub enum LinkCommand {
    /// Link ticket A with one or more other tickets.
    Add(AddArgs),
    /// Remove the link between two tickets (admins only).
    Remove(RemoveArgs),
    /// Attach incidents to a ticket.
    Incidents(IncidentArgs),
    /// Drop links from a ticket (admins only).
    Clear(ClearArgs),
    /// Show a ticket's linked requests and incidents.
    List(ListArgs),
}

#[derive(Args, Debug)]
pub struct AddArgs {
    pub id: String,
    #[arg(required = true)]
    pub others: Vec<String>,
}

#[derive(Args, Debug)]
pub struct RemoveArgs {
    pub id: String,
    pub other: String,
}

#[derive(Args, Debug)]
pub struct IncidentArgs {
    pub id: String,
    #[arg(required = true)]
    pub incidents: Vec<String>,
}

#[derive(Args, Debug)]
pub struct ClearArgs {
    pub id: String,

    /// Only drop incident links; keep request links.
    #[arg(long)]
    pub incidents_only: bool,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    pub id: String,
}

#[derive(Serialize)]
struct Connections {
    requests: Vec<desk_core::model::TicketSummary>,
    incidents: Vec<String>,
}

fn render_report(output: OutputMode, report: &LinkReport) -> Result<()> {
    render(output, report, |r, w| writeln!(w, "✓ {}", r.message))
}

pub async fn run(command: &LinkCommand, app: &App, who: &Identity, output: OutputMode) -> Result<()> {
    let caller = who.caller();
    match command {
        LinkCommand::Add(args) => {
            let report = app.links.link_requests(&caller, &args.id, &args.others).await?;
            render_report(output, &report)
        }
        LinkCommand::Remove(args) => {
            let report = app.links.unlink_request(&caller, &args.id, &args.other).await?;
            render_report(output, &report)
        }
        LinkCommand::Incidents(args) => {
            let report = app.links.link_incidents(&caller, &args.id, &args.incidents).await?;
            render_report(output, &report)
        }
        LinkCommand::Clear(args) => {
            let report = if args.incidents_only {
                app.links.unlink_incidents(&caller, &args.id).await?
            } else {
                app.links.remove_all_connections(&caller, &args.id).await?
            };
            render_report(output, &report)
        }
        LinkCommand::List(args) => {
            let requests = app.links.list_request_links(&caller, &args.id).await?;
            let incidents = app.links.list_incident_links(&caller, &args.id).await?;
            let connections = Connections { requests, incidents };
            render(output, &connections, |c, w| {
                pretty_section(w, "Requests")?;
                for ticket in &c.requests {
                    let status = ticket.status.as_ref().map_or("-", |s| s.id.as_str());
                    writeln!(w, "#{:<5} {:<14} {:<12} {}", ticket.number, ticket.id, status, ticket.name)?;
                }
                writeln!(w)?;
                pretty_section(w, "Incidents")?;
                for incident in &c.incidents {
                    writeln!(w, "{incident}")?;
                }
                Ok(())
            })
        }
    }
}
