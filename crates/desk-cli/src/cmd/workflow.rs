//! `desk workflow`: import workflows and inspect their statuses.

use anyhow::{Context as _, Result};
use clap::{Args, Subcommand};
use desk_core::error::{DeskError, Entity, ErrorCode};
use desk_core::store::WorkflowStore;
use desk_core::workflow::{Status, Workflow, default_status};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::app::{App, Identity};
use crate::output::{OutputMode, render};

#[derive(Subcommand, Debug)]
pub enum WorkflowCommand {
    /// Import a workflow graph from a JSON file.
    Import(ImportArgs),
    /// List the statuses a ticket from a template can hold.
    Statuses(StatusesArgs),
    /// Show the status new tickets start in.
    Default(DefaultArgs),
}

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Path to the workflow JSON document.
    pub file: PathBuf,

    /// Store the workflow for the current tenant only instead of sharing it.
    #[arg(long)]
    pub tenant_only: bool,
}

#[derive(Args, Debug)]
pub struct StatusesArgs {
    /// Template id.
    #[arg(long, default_value = "default")]
    pub template: String,
}

#[derive(Args, Debug)]
pub struct DefaultArgs {
    /// Workflow id.
    #[arg(default_value = "default")]
    pub id: String,
}

pub async fn run(command: &WorkflowCommand, app: &App, who: &Identity, output: OutputMode) -> Result<()> {
    match command {
        WorkflowCommand::Import(args) => import(args, app, who, output).await,
        WorkflowCommand::Statuses(args) => {
            let statuses = app.tickets.template_statuses(&who.caller(), &args.template).await?;
            render_statuses(output, &statuses)
        }
        WorkflowCommand::Default(args) => show_default(args, app, who, output).await,
    }
}

fn read_workflow(path: &Path) -> Result<Workflow> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let workflow: Workflow =
        serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))?;
    workflow.validate()?;
    Ok(workflow)
}

async fn import(args: &ImportArgs, app: &App, who: &Identity, output: OutputMode) -> Result<()> {
    let mut workflow = read_workflow(&args.file)?;
    workflow.tenant = args.tenant_only.then(|| who.tenant.clone());

    let default = default_status(&workflow);
    if default.is_none() {
        warn!(id = %workflow.id, "imported workflow has no default status");
    }
    app.store.save(&workflow).await?;
    info!(id = %workflow.id, tenant = ?workflow.tenant, "imported workflow");

    let report = serde_json::json!({
        "id": workflow.id,
        "tenant": workflow.tenant,
        "nodes": workflow.nodes.len(),
        "edges": workflow.edges.len(),
        "default_status": default,
    });
    render(output, &report, |_, w| {
        writeln!(
            w,
            "✓ Imported workflow {} ({} nodes, {} edges)",
            workflow.id,
            workflow.nodes.len(),
            workflow.edges.len()
        )?;
        match &default {
            Some(status) => writeln!(w, "  default status: {} ({})", status.name, status.id),
            None => writeln!(w, "  warning: no default status; tickets cannot be created from it"),
        }
    })
}

async fn show_default(args: &DefaultArgs, app: &App, who: &Identity, output: OutputMode) -> Result<()> {
    let workflow = WorkflowStore::get(&app.store, &who.tenant, &args.id)
        .await?
        .ok_or_else(|| DeskError::not_found(Entity::Workflow, &args.id))?;
    let status = default_status(&workflow).ok_or_else(|| {
        DeskError::invalid(
            "workflow",
            ErrorCode::MissingDefaultStatus,
            format!("workflow {} has no default status", workflow.id),
        )
    })?;
    render(output, &status, |s, w| writeln!(w, "{} ({})", s.name, s.id))
}

pub(crate) fn render_statuses(output: OutputMode, statuses: &[Status]) -> Result<()> {
    render(output, &statuses, |list, w| {
        for status in *list {
            match &status.description {
                Some(description) => writeln!(w, "{:<16} {:<20} {description}", status.id, status.name)?,
                None => writeln!(w, "{:<16} {}", status.id, status.name)?,
            }
        }
        Ok(())
    })
}
