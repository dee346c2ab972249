#![forbid(unsafe_code)]

mod app;
mod cmd;
mod output;

use app::{App, Identity};
use clap::{Parser, Subcommand};
use output::OutputMode;
use std::env;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "desk: help-desk ticket lifecycle",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Tenant to act in (falls back to DESK_TENANT, then "default").
    #[arg(long, global = true)]
    tenant: Option<String>,

    /// User to act as (falls back to DESK_USER, then "operator").
    #[arg(long, global = true)]
    user: Option<String>,

    /// Role ids held by the user (repeatable; defaults to TA).
    #[arg(long = "role", global = true)]
    roles: Vec<String>,

    /// Config file; overrides DESK_CONFIG and .desk/config.toml.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    const fn output_mode(&self) -> OutputMode {
        if self.json {
            OutputMode::Json
        } else {
            OutputMode::Human
        }
    }

    fn identity(&self) -> Identity {
        let roles = if self.roles.is_empty() {
            vec!["TA".to_string()]
        } else {
            self.roles.clone()
        };
        Identity {
            tenant: flag_or_env(self.tenant.as_deref(), "DESK_TENANT", "default"),
            user: flag_or_env(self.user.as_deref(), "DESK_USER", "operator"),
            roles,
        }
    }
}

fn flag_or_env(flag: Option<&str>, var: &str, fallback: &str) -> String {
    flag.map(str::to_string)
        .or_else(|| env::var(var).ok().filter(|v| !v.trim().is_empty()))
        .unwrap_or_else(|| fallback.to_string())
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Setup",
        about = "Initialize a desk store",
        long_about = "Create .desk/ with a config template and a migrated store holding the shared default workflow.",
        after_help = "EXAMPLES:\n    # Initialize in the current directory\n    desk init\n\n    # Start over\n    desk init --force"
    )]
    Init(cmd::init::InitArgs),

    #[command(
        next_help_heading = "Workflows",
        about = "Import and inspect workflows",
        after_help = "EXAMPLES:\n    # Import a tenant-specific workflow\n    desk --tenant acme workflow import flow.json --tenant-only\n\n    # Statuses a new ticket may hold\n    desk workflow statuses --template default"
    )]
    Workflow {
        #[command(subcommand)]
        command: cmd::workflow::WorkflowCommand,
    },

    #[command(
        next_help_heading = "Tickets",
        about = "Create, list, and move tickets",
        after_help = "EXAMPLES:\n    # Create as an end user\n    desk --user u-1 --role EU ticket create --name \"VPN down\"\n\n    # Page through open tickets, newest first\n    desk ticket list --status open --sort -created_time\n\n    # Move a ticket\n    desk ticket status tk-1a2b3c4d5e6f in_progress"
    )]
    Ticket {
        #[command(subcommand)]
        command: cmd::ticket::TicketCommand,
    },

    #[command(
        next_help_heading = "Links",
        about = "Connect tickets to tickets and incidents",
        after_help = "EXAMPLES:\n    # Link two tickets\n    desk link add tk-a tk-b\n\n    # Drop every link of a ticket\n    desk link clear tk-a"
    )]
    Link {
        #[command(subcommand)]
        command: cmd::link::LinkCommand,
    },

    #[command(
        next_help_heading = "Links",
        about = "Handle incident service notifications",
        after_help = "EXAMPLES:\n    # An incident was deleted upstream\n    desk incident deleted inc-1\n\n    # Tickets tied to an incident\n    desk incident tickets inc-1 --sort -created_time"
    )]
    Incident {
        #[command(subcommand)]
        command: cmd::incident::IncidentCommand,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("DESK_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "desk=debug,desk_core=debug,info"
        } else {
            "desk=info,desk_core=info,warn"
        })
    });

    let format = env::var("DESK_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry.with(fmt::layer().compact().with_writer(std::io::stderr)).init();
        }
    }
}

async fn dispatch(cli: &Cli, root: &std::path::Path) -> anyhow::Result<()> {
    let output = cli.output_mode();
    if let Commands::Init(args) = &cli.command {
        return cmd::init::run_init(args, output, root).await;
    }

    let app = App::open(root, cli.config.as_ref())?;
    let who = cli.identity();
    info!(tenant = %who.tenant, user = %who.user, "running command");
    match &cli.command {
        Commands::Init(_) => Ok(()),
        Commands::Workflow { command } => cmd::workflow::run(command, &app, &who, output).await,
        Commands::Ticket { command } => cmd::ticket::run(command, &app, &who, output).await,
        Commands::Link { command } => cmd::link::run(command, &app, &who, output).await,
        Commands::Incident { command } => cmd::incident::run(command, &app, &who, output).await,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let root = std::env::current_dir()?;
    if let Err(err) = dispatch(&cli, &root).await {
        output::render_error(cli.output_mode(), &output::cli_error(&err))?;
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_flag_after_subcommand() {
        let cli = Cli::parse_from(["desk", "ticket", "list", "--json"]);
        assert!(cli.output_mode().is_json());
    }

    #[test]
    fn default_output_is_human() {
        let cli = Cli::parse_from(["desk", "ticket", "list"]);
        assert!(!cli.output_mode().is_json());
    }

    #[test]
    fn identity_flags_are_global() {
        let cli = Cli::parse_from([
            "desk", "ticket", "list", "--tenant", "acme", "--user", "u-1", "--role", "EU", "--role",
            "L1",
        ]);
        let who = cli.identity();
        assert_eq!(who.tenant, "acme");
        assert_eq!(who.user, "u-1");
        assert_eq!(who.roles, vec!["EU", "L1"]);
    }

    #[test]
    fn roles_default_to_tenant_admin() {
        let cli = Cli::parse_from(["desk", "--tenant", "acme", "--user", "u-1", "ticket", "list"]);
        assert_eq!(cli.identity().roles, vec!["TA"]);
    }

    #[test]
    fn all_subcommands_parse() {
        let subcommands: [&[&str]; 19] = [
            &["desk", "init"],
            &["desk", "workflow", "import", "flow.json", "--tenant-only"],
            &["desk", "workflow", "statuses", "--template", "default"],
            &["desk", "workflow", "default"],
            &["desk", "ticket", "create", "--name", "x"],
            &["desk", "ticket", "list", "--status", "open", "--page", "2", "--size", "5"],
            &["desk", "ticket", "show", "tk-1"],
            &["desk", "ticket", "status", "tk-1"],
            &["desk", "ticket", "status", "tk-1", "closed"],
            &["desk", "ticket", "resolve", "tk-1", "done"],
            &["desk", "ticket", "stats", "--query", "status = open"],
            &["desk", "ticket", "export", "--sort", "number"],
            &["desk", "link", "add", "tk-1", "tk-2", "tk-3"],
            &["desk", "link", "remove", "tk-1", "tk-2"],
            &["desk", "link", "incidents", "tk-1", "inc-1"],
            &["desk", "link", "clear", "tk-1", "--incidents-only"],
            &["desk", "link", "list", "tk-1"],
            &["desk", "incident", "deleted", "inc-1", "inc-2"],
            &["desk", "incident", "tickets", "inc-1", "--page", "2", "--sort", "-number"],
        ];
        for args in subcommands {
            let result = Cli::try_parse_from(args.iter());
            assert!(result.is_ok(), "failed to parse {args:?}: {:?}", result.err());
        }
    }

    #[test]
    fn link_add_requires_targets() {
        assert!(Cli::try_parse_from(["desk", "link", "add", "tk-1"]).is_err());
    }
}
