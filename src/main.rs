//! # Cadence
//!
//! Command-line front end for the recurring task engine.
//!
//! ## Usage
//!
//! ```bash
//! export CADENCE_OWNER=me
//!
//! # Set up recurring tasks
//! cadence template add "Weekly review" --rule weekly-friday
//! cadence template add "Invoice clients" --rule monthly-last --category client --priority urgent
//!
//! # Generate the instances due within the next two weeks
//! cadence run
//!
//! # See what is planned
//! cadence list --bucket today
//!
//! # Check how a rule behaves
//! cadence preview monthly-31 --from 2024-04-01 --count 4
//! ```
//!
//! ## Configuration
//!
//! Data lives in `~/.local/share/cadence` (override with `CADENCE_DATA_DIR`).
//! An optional `config.json` there and the `CADENCE_OWNER`,
//! `CADENCE_HORIZON_DAYS`, `CADENCE_MONTHLY_FALLBACK` and
//! `CADENCE_DELETE_POLICY` environment variables tune the engine. Logging is
//! controlled with `RUST_LOG`.

use std::io;

use cadence::commands::*;
use cadence::models::{Bucket, Category, Priority};
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cadence")]
#[command(about = "Recurring task planner", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate due instances of all active recurring tasks
    Run {
        /// Skip the run if it already happened today
        #[arg(long)]
        if_stale: bool,
    },
    /// Add a one-off task
    Add {
        /// Task title (quoted if it has spaces)
        title: String,
        /// Due date in YYYY-MM-DD
        #[arg(short, long)]
        due: String,
        /// Bucket (defaults to one derived from the due date)
        #[arg(short, long)]
        bucket: Option<Bucket>,
    },
    /// List tasks sorted by due date
    List {
        /// Show completed tasks
        #[arg(short, long)]
        all: bool,
        /// Only show one bucket (today, tomorrow, this_week, ...)
        #[arg(short, long)]
        bucket: Option<Bucket>,
    },
    /// Mark a task as complete
    Complete {
        id: u64,
    },
    /// Remove a task
    Remove {
        id: u64,
    },
    /// Manage recurring tasks
    Template {
        #[command(subcommand)]
        command: TemplateCommands,
    },
    /// Describe a recurrence rule and list its next due dates
    Preview {
        /// Rule such as daily, weekly-monday, monthly-15, monthly-last
        rule: String,
        /// Reference date in YYYY-MM-DD (defaults to today)
        #[arg(short, long)]
        from: Option<String>,
        /// How many due dates to show
        #[arg(short, long, default_value_t = 5)]
        count: usize,
    },
    /// Reset the database (delete all tasks and recurring tasks)
    Reset {
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for (bash, zsh, fish, powershell, elvish)
        shell: String,
    },
}

#[derive(Args)]
struct TemplateFields {
    /// Longer description
    #[arg(short = 'D', long)]
    description: Option<String>,
    /// Category (client, personal, idea)
    #[arg(short, long)]
    category: Option<Category>,
    /// Client reference
    #[arg(long)]
    client: Option<String>,
    /// Priority (normal, urgent)
    #[arg(short, long)]
    priority: Option<Priority>,
    /// Bucket recorded on the template
    #[arg(short, long)]
    bucket: Option<Bucket>,
    /// Time block start, YYYY-MM-DD HH:MM
    #[arg(long)]
    start: Option<String>,
    /// Time block end, YYYY-MM-DD HH:MM
    #[arg(long)]
    end: Option<String>,
}

impl From<TemplateFields> for TemplateOptions {
    fn from(f: TemplateFields) -> Self {
        TemplateOptions {
            description: f.description,
            category: f.category,
            client: f.client,
            priority: f.priority,
            bucket: f.bucket,
            start: f.start,
            end: f.end,
        }
    }
}

#[derive(Subcommand)]
enum TemplateCommands {
    /// Add a recurring task
    Add {
        /// Title
        title: String,
        /// Recurrence rule (daily, weekly-<weekday>, monthly-<1..31>, monthly-last)
        #[arg(short, long)]
        rule: String,
        #[command(flatten)]
        fields: TemplateFields,
    },
    /// List recurring tasks
    List,
    /// Edit a recurring task
    Edit {
        id: u64,
        /// New title
        #[arg(short, long)]
        title: Option<String>,
        /// New recurrence rule
        #[arg(short, long)]
        rule: Option<String>,
        #[command(flatten)]
        fields: TemplateFields,
    },
    /// Stop generating instances
    Pause {
        id: u64,
    },
    /// Resume generating instances
    Resume {
        id: u64,
    },
    /// Remove a recurring task
    Remove {
        id: u64,
        /// Also remove the tasks it generated
        #[arg(long)]
        cascade: bool,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run { if_stale } => {
            cmd_run(if_stale, false);
        }
        Commands::Add { title, due, bucket } => cmd_add(title, due, bucket, false),
        Commands::List { all, bucket } => cmd_list(all, bucket),
        Commands::Complete { id } => cmd_complete(id, false),
        Commands::Remove { id } => cmd_remove(id, false),
        Commands::Template { command } => match command {
            TemplateCommands::Add { title, rule, fields } => cmd_template_add(title, rule, fields.into(), false),
            TemplateCommands::List => cmd_template_list(),
            TemplateCommands::Edit { id, title, rule, fields } => cmd_template_edit(id, title, rule, fields.into(), false),
            TemplateCommands::Pause { id } => cmd_template_pause(id, true, false),
            TemplateCommands::Resume { id } => cmd_template_pause(id, false, false),
            TemplateCommands::Remove { id, cascade } => cmd_template_remove(id, cascade, false),
        },
        Commands::Preview { rule, from, count } => cmd_preview(rule, from, count),
        Commands::Reset { force } => cmd_reset(force),
        Commands::Completions { shell } => {
            let shell_enum = match shell.as_str() {
                "bash" => Shell::Bash,
                "zsh" => Shell::Zsh,
                "fish" => Shell::Fish,
                "powershell" => Shell::PowerShell,
                "elvish" => Shell::Elvish,
                _ => {
                    eprintln!("Unsupported shell: {}", shell);
                    return;
                }
            };
            let mut cmd = Cli::command();
            generate(shell_enum, &mut cmd, "cadence", &mut io::stdout());
        }
    }
}
