//! `desk ticket`: create, list, and move tickets.

use anyhow::{Context as _, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Subcommand};
use desk_core::model::{EntityRef, NewTicket, Ticket, UserRef};
use desk_core::query::{DateRange, ListRequest, Paging, TicketFilter};
use std::io::{self, Write as _};

use crate::app::{App, Identity};
use crate::cmd::workflow::render_statuses;
use crate::output::{OutputMode, pretty_kv, pretty_section, render};

#[derive(Subcommand, Debug)]
pub enum TicketCommand {
    /// Create a ticket from a template.
    Create(CreateArgs),
    /// List visible tickets, one page at a time.
    List(ListArgs),
    /// Show one ticket.
    Show(ShowArgs),
    /// Show possible next statuses, or move the ticket to one.
    Status(StatusArgs),
    /// Record the resolution note.
    Resolve(ResolveArgs),
    /// Status and overdue counters over every matching ticket.
    Stats(SelectArgs),
    /// Every matching ticket as JSON lines, unpaged.
    Export(ExportArgs),
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    #[arg(short, long)]
    pub name: String,

    #[arg(long, default_value = "default")]
    pub template: String,

    #[arg(short, long)]
    pub description: Option<String>,

    /// Requester user id; defaults to the caller.
    #[arg(long)]
    pub requester: Option<String>,

    #[arg(long)]
    pub technician: Option<String>,

    #[arg(long)]
    pub group: Option<String>,

    #[arg(long)]
    pub priority: Option<String>,
}

/// Query, filter, and sort flags shared by list, stats, and export.
#[derive(Args, Debug, Default)]
pub struct SelectArgs {
    /// Query expression, e.g. `status = open AND name ~ printer`.
    #[arg(short, long)]
    pub query: Option<String>,

    /// Restrict to these status ids (repeatable).
    #[arg(long)]
    pub status: Vec<String>,

    #[arg(long)]
    pub group: Vec<String>,

    #[arg(long)]
    pub technician: Vec<String>,

    /// Case-insensitive match on name or description.
    #[arg(long)]
    pub search: Option<String>,

    /// Created on or after this date (YYYY-MM-DD or RFC 3339).
    #[arg(long)]
    pub created_from: Option<String>,

    /// Created on or before this date (YYYY-MM-DD or RFC 3339).
    #[arg(long)]
    pub created_to: Option<String>,

    #[arg(long)]
    pub response_overdue: Option<bool>,

    #[arg(long)]
    pub resolve_overdue: Option<bool>,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    #[command(flatten)]
    pub select: SelectArgs,

    /// Sort keys, e.g. `priority.id:asc,-created_time`.
    #[arg(short, long, allow_hyphen_values = true)]
    pub sort: Option<String>,

    #[arg(long, default_value_t = 1)]
    pub page: i64,

    /// Page size; defaults to `[paging] default_size`.
    #[arg(long)]
    pub size: Option<i64>,
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    #[command(flatten)]
    pub select: SelectArgs,

    #[arg(short, long, allow_hyphen_values = true)]
    pub sort: Option<String>,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    pub id: String,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    pub id: String,

    /// Target status id. Omit to list the allowed statuses.
    pub status: Option<String>,
}

#[derive(Args, Debug)]
pub struct ResolveArgs {
    pub id: String,

    /// Resolution text.
    pub description: String,
}

/// Parse a bound given as a date (start of day, UTC) or an RFC 3339 instant.
fn parse_bound(raw: &str, end_of_day: bool) -> Result<DateTime<Utc>> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Ok(instant.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .with_context(|| format!("invalid date '{raw}', expected YYYY-MM-DD or RFC 3339"))?;
    let time = if end_of_day {
        date.and_hms_milli_opt(23, 59, 59, 999)
    } else {
        date.and_hms_opt(0, 0, 0)
    };
    time.map(|t| t.and_utc())
        .with_context(|| format!("invalid date '{raw}'"))
}

impl SelectArgs {
    fn filter(&self) -> Result<TicketFilter> {
        let created_time = if self.created_from.is_none() && self.created_to.is_none() {
            None
        } else {
            Some(DateRange::new(
                self.created_from.as_deref().map(|raw| parse_bound(raw, false)).transpose()?,
                self.created_to.as_deref().map(|raw| parse_bound(raw, true)).transpose()?,
            ))
        };
        Ok(TicketFilter {
            created_time,
            group: self.group.clone(),
            technician: self.technician.clone(),
            status: self.status.clone(),
            response_overdue: self.response_overdue,
            resolve_overdue: self.resolve_overdue,
            search: self.search.clone(),
            ..TicketFilter::default()
        })
    }

    fn request(&self, sort: Option<&String>, paging: Paging) -> Result<ListRequest> {
        Ok(ListRequest {
            query: self.query.clone(),
            sort: sort.cloned(),
            filter: self.filter()?,
            paging,
        })
    }
}

pub async fn run(command: &TicketCommand, app: &App, who: &Identity, output: OutputMode) -> Result<()> {
    let caller = who.caller();
    match command {
        TicketCommand::Create(args) => {
            let new = NewTicket {
                template_id: args.template.clone(),
                name: args.name.clone(),
                description: args.description.clone(),
                requester: args.requester.as_deref().map(UserRef::new),
                technician: args.technician.as_deref().map(UserRef::new),
                group: args.group.as_deref().map(EntityRef::new),
                priority: args.priority.as_deref().map(EntityRef::new),
                ..NewTicket::default()
            };
            let ticket = app.tickets.create_ticket(&caller, new).await?;
            render(output, &ticket, |t, w| {
                writeln!(w, "✓ Created #{} {} ({})", t.number, t.name, t.id)
            })
        }
        TicketCommand::List(args) => {
            let size = args.size.unwrap_or(app.config.paging.default_size);
            let request = args.select.request(args.sort.as_ref(), Paging::new(args.page, size))?;
            let page = app.tickets.list(&caller, &request).await?;
            render(output, &page, |p, w| {
                for ticket in &p.items {
                    write_row(w, ticket)?;
                }
                writeln!(w, "page {}/{} ({} total)", p.page, p.total_page.max(1), p.total)
            })
        }
        TicketCommand::Show(args) => {
            let ticket = app.tickets.get_ticket(&caller, &args.id).await?;
            render(output, &ticket, |t, w| write_ticket(w, t))
        }
        TicketCommand::Status(args) => match &args.status {
            None => {
                let statuses = app.tickets.possible_statuses(&caller, &args.id).await?;
                render_statuses(output, &statuses)
            }
            Some(status) => {
                let ticket = app.tickets.update_status(&caller, &args.id, status).await?;
                render(output, &ticket, |t, w| {
                    let current = t.status.as_ref().map_or("-", |s| s.name.as_str());
                    writeln!(w, "✓ #{} is now {current}", t.number)
                })
            }
        },
        TicketCommand::Resolve(args) => {
            let ticket = app
                .tickets
                .update_resolution(&caller, &args.id, &args.description)
                .await?;
            render(output, &ticket, |t, w| writeln!(w, "✓ Resolved #{}", t.number))
        }
        TicketCommand::Stats(args) => {
            let request = args.request(None, Paging::default())?;
            let facets = app.tickets.statistics(&caller, &request).await?;
            render(output, &facets, |f, w| {
                pretty_section(w, "Tickets")?;
                pretty_kv(w, "Total", f.total.to_string())?;
                for (status, count) in &f.by_status {
                    let label = if status.is_empty() { "(none)" } else { status.as_str() };
                    pretty_kv(w, label, count.to_string())?;
                }
                pretty_kv(w, "Resp. late", f.response_overdue.to_string())?;
                pretty_kv(w, "Res. late", f.resolve_overdue.to_string())
            })
        }
        TicketCommand::Export(args) => {
            let request = args.select.request(args.sort.as_ref(), Paging::default())?;
            let tickets = app.tickets.export(&caller, &request).await?;
            let stdout = io::stdout();
            let mut out = stdout.lock();
            for ticket in &tickets {
                serde_json::to_writer(&mut out, ticket)?;
                writeln!(out)?;
            }
            Ok(())
        }
    }
}

fn write_row(w: &mut dyn io::Write, ticket: &Ticket) -> io::Result<()> {
    let status = ticket.status.as_ref().map_or("-", |s| s.id.as_str());
    writeln!(w, "#{:<5} {:<14} {:<12} {}", ticket.number, ticket.id, status, ticket.name)
}

fn write_ticket(w: &mut dyn io::Write, ticket: &Ticket) -> io::Result<()> {
    pretty_section(w, &format!("#{} {}", ticket.number, ticket.name))?;
    pretty_kv(w, "ID", &ticket.id)?;
    pretty_kv(
        w,
        "Status",
        ticket.status.as_ref().map_or("-", |s| s.name.as_str()),
    )?;
    pretty_kv(w, "Template", &ticket.template.name)?;
    pretty_kv(w, "Creator", &ticket.creator.id)?;
    pretty_kv(w, "Requester", &ticket.requester.id)?;
    if let Some(technician) = &ticket.technician {
        pretty_kv(w, "Technician", &technician.id)?;
    }
    if let Some(group) = &ticket.group {
        pretty_kv(w, "Group", &group.id)?;
    }
    pretty_kv(w, "Created", ticket.created_time.to_rfc3339())?;
    if let Some(description) = &ticket.description {
        writeln!(w)?;
        writeln!(w, "{description}")?;
    }
    if let Some(resolution) = &ticket.resolution {
        writeln!(w)?;
        pretty_kv(w, "Resolution", &resolution.description)?;
    }
    if !ticket.connect.requests.is_empty() {
        pretty_kv(w, "Linked", ticket.connect.requests.join(", "))?;
    }
    if !ticket.connect.incidents.is_empty() {
        pretty_kv(w, "Incidents", ticket.connect.incidents.join(", "))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn date_bounds_cover_the_whole_day() {
        let from = parse_bound("2024-03-01", false).unwrap();
        let to = parse_bound("2024-03-01", true).unwrap();
        assert_eq!((from.day(), from.hour()), (1, 0));
        assert_eq!((to.hour(), to.minute(), to.second()), (23, 59, 59));
    }

    #[test]
    fn rfc3339_bounds_are_taken_as_is() {
        let at = parse_bound("2024-03-01T10:30:00+02:00", false).unwrap();
        assert_eq!(at.hour(), 8);
    }

    #[test]
    fn bad_dates_are_rejected() {
        assert!(parse_bound("03/01/2024", false).is_err());
    }

    #[test]
    fn select_args_build_a_filter() {
        let args = SelectArgs {
            status: vec!["open".into()],
            created_from: Some("2024-01-01".into()),
            ..SelectArgs::default()
        };
        let filter = args.filter().unwrap();
        assert_eq!(filter.status, vec!["open"]);
        let range = filter.created_time.unwrap();
        assert!(range.from.is_some());
        assert!(range.to.is_none());
    }
}
