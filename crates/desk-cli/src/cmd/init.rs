use anyhow::{Context as _, Result};
use clap::Args;
use desk_core::config::CONFIG_RELATIVE_PATH;
use desk_core::db::SqliteStore;
use desk_core::store::WorkflowStore;
use desk_core::workflow::Workflow;
use std::io::Write as _;
use std::path::Path;

use crate::output::{OutputMode, render};

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Re-initialize even if `.desk/` already exists.
    #[arg(long)]
    pub force: bool,
}

const CONFIG_TOML: &str = "[store]\n\
    path = \".desk/desk.sqlite3\"\n\
    \n\
    [paging]\n\
    default_size = 20\n\
    max_size = 200\n\
    \n\
    [incidents]\n\
    # base_url = \"http://localhost:8080\"\n\
    timeout_ms = 5000\n";

const GITIGNORE: &str = "desk.sqlite3\ndesk.sqlite3-wal\ndesk.sqlite3-shm\n";

/// Shared workflow installed by `desk init`.
pub const DEFAULT_WORKFLOW_JSON: &str = include_str!("default_workflow.json");

/// Parse the bundled default workflow.
pub fn default_workflow() -> Result<Workflow> {
    let workflow: Workflow =
        serde_json::from_str(DEFAULT_WORKFLOW_JSON).context("bundled default workflow is invalid")?;
    workflow.validate()?;
    Ok(workflow)
}

/// Execute `desk init`:
///
/// ```text
/// .desk/
///   config.toml     (default config template)
///   .gitignore      (database files)
///   desk.sqlite3    (store, migrated, with the shared default workflow)
/// ```
///
/// # Errors
///
/// Returns an error if `.desk/` exists and `--force` is not set, or if any
/// filesystem or store operation fails.
pub async fn run_init(args: &InitArgs, output: OutputMode, root: &Path) -> Result<()> {
    let desk_dir = root.join(".desk");
    if desk_dir.exists() && !args.force {
        anyhow::bail!(".desk/ already exists. Use `desk init --force` to reinitialize.");
    }
    std::fs::create_dir_all(&desk_dir)
        .with_context(|| format!("Failed to create {}", desk_dir.display()))?;

    let config_path = root.join(CONFIG_RELATIVE_PATH);
    std::fs::write(&config_path, CONFIG_TOML)
        .with_context(|| format!("Failed to write config: {}", config_path.display()))?;
    let gitignore_path = desk_dir.join(".gitignore");
    std::fs::write(&gitignore_path, GITIGNORE)
        .with_context(|| format!("Failed to write .gitignore: {}", gitignore_path.display()))?;

    let config = desk_core::config::load_config_file(&config_path)?;
    let db_path = config.store_path(root);
    let store = SqliteStore::open(&db_path)?;
    let workflow = default_workflow()?;
    store.save(&workflow).await?;

    let report = serde_json::json!({
        "ok": true,
        "root": desk_dir.display().to_string(),
        "store": db_path.display().to_string(),
        "workflow": workflow.id,
    });
    render(output, &report, |_, w| {
        writeln!(w, "✓ Initialized .desk/ in {}", root.display())?;
        writeln!(w)?;
        writeln!(w, "  Config:   {CONFIG_RELATIVE_PATH}")?;
        writeln!(w, "  Store:    {}", db_path.display())?;
        writeln!(w, "  Workflow: {} (shared)", workflow.id)?;
        writeln!(w)?;
        writeln!(w, "Next steps:")?;
        writeln!(w, "  desk ticket create --name \"Printer on fire\"")?;
        writeln!(w, "  desk ticket list")
    })
}
