//! agentchain CLI: run linear agent chains and manage their documents.
//!
//! Reuses the same core domain logic (agentchain-core) and server bootstrap
//! (agentchain-server) that back the HTTP trigger.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

use agentchain_cli::commands;
use agentchain_core::EngineConfig;

/// agentchain: linear agent chain runner
#[derive(Parser)]
#[command(name = "agentchain", version, about = "agentchain: run linear agent chains")]
pub struct Cli {
    /// Path to the SQLite database file
    #[arg(long, env = "AGENTCHAIN_DB_PATH", default_value = "agentchain.db", global = true)]
    db: String,

    /// Per-step timeout in seconds
    #[arg(long, env = "AGENTCHAIN_STEP_TIMEOUT_SECS", global = true)]
    step_timeout_secs: Option<u64>,

    /// Maximum number of steps a single run may visit
    #[arg(long, env = "AGENTCHAIN_MAX_STEPS", global = true)]
    max_steps: Option<usize>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP trigger server
    Server {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        /// Port to listen on
        #[arg(long, default_value_t = 3220)]
        port: u16,
        /// Also append every step output as JSONL under this directory
        #[arg(long, env = "AGENTCHAIN_OUTPUT_LOG_DIR")]
        output_log_dir: Option<PathBuf>,
    },

    /// Run a chain in-process, starting at one step
    Run {
        /// Step to start from
        #[arg(long)]
        start_step: String,
        /// Owner whose workflows and configurations are used
        #[arg(long)]
        owner: String,
        /// Print the run record as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage workflow documents
    Workflow {
        #[command(subcommand)]
        action: WorkflowAction,
    },

    /// Manage step configurations
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Manage bearer keys for the HTTP server
    Key {
        #[command(subcommand)]
        action: KeyAction,
    },

    /// Show recorded outputs of a step
    Outputs {
        /// Step ID
        step_id: String,
        #[arg(long)]
        owner: String,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

#[derive(Subcommand)]
enum WorkflowAction {
    /// Import a JSON or YAML workflow document
    Import {
        /// Path to the document (.json, otherwise YAML)
        file: String,
        #[arg(long)]
        owner: String,
        /// Override the document's id
        #[arg(long)]
        id: Option<String>,
    },
    /// List an owner's workflows
    List {
        #[arg(long)]
        owner: String,
    },
    /// Show one workflow document
    Show {
        /// Workflow ID
        id: String,
        #[arg(long)]
        owner: String,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Save a step's settings
    Set {
        /// Step ID
        step_id: String,
        /// Step kind, e.g. text-generation
        kind: String,
        #[arg(long)]
        owner: String,
        /// Read settings from a JSON file
        #[arg(long)]
        file: Option<String>,
        /// Inline settings JSON object
        #[arg(long)]
        json: Option<String>,
    },
    /// Show a step's saved settings
    Show {
        step_id: String,
        kind: String,
        #[arg(long)]
        owner: String,
    },
}

#[derive(Subcommand)]
enum KeyAction {
    /// Issue a new key for an owner
    Create {
        #[arg(long)]
        owner: String,
    },
    /// Revoke a key
    Revoke {
        key: String,
    },
}

fn load_dotenv() {
    for file in [".env", ".env.local"] {
        if let Err(err) = dotenvy::from_filename(file) {
            if !err.not_found() {
                eprintln!("Warning: failed to load {}: {}", file, err);
            }
        }
    }
}

fn engine_config(cli: &Cli) -> EngineConfig {
    let mut config = EngineConfig::from_env();
    if let Some(secs) = cli.step_timeout_secs {
        config = config.with_step_timeout(Duration::from_secs(secs));
    }
    if let Some(max_steps) = cli.max_steps {
        config = config.with_max_steps(max_steps);
    }
    config
}

#[tokio::main]
async fn main() {
    // Before parsing, so clap's `env` fallbacks see values from .env files.
    load_dotenv();
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agentchain=info,tower_http=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let engine = engine_config(&cli);

    let result = match cli.command {
        Some(Commands::Server {
            host,
            port,
            output_log_dir,
        }) => commands::server::run(host, port, cli.db, engine, output_log_dir).await,

        Some(Commands::Run {
            start_step,
            owner,
            json,
        }) => match commands::init_state(&cli.db, engine) {
            Ok(state) => commands::run::run(&state, &start_step, &owner, json).await,
            Err(e) => Err(e),
        },

        Some(Commands::Workflow { action }) => match commands::init_state(&cli.db, engine) {
            Ok(state) => match action {
                WorkflowAction::Import { file, owner, id } => {
                    commands::workflow::import(&state, &file, &owner, id.as_deref())
                        .await
                        .map(|_| ())
                }
                WorkflowAction::List { owner } => commands::workflow::list(&state, &owner).await,
                WorkflowAction::Show { id, owner } => {
                    commands::workflow::show(&state, &id, &owner).await
                }
            },
            Err(e) => Err(e),
        },

        Some(Commands::Config { action }) => match commands::init_state(&cli.db, engine) {
            Ok(state) => match action {
                ConfigAction::Set {
                    step_id,
                    kind,
                    owner,
                    file,
                    json,
                } => match commands::config::load_settings(file.as_deref(), json.as_deref()) {
                    Ok(settings) => {
                        commands::config::set(&state, &step_id, &kind, &owner, settings).await
                    }
                    Err(e) => Err(e),
                },
                ConfigAction::Show {
                    step_id,
                    kind,
                    owner,
                } => commands::config::show(&state, &step_id, &kind, &owner).await,
            },
            Err(e) => Err(e),
        },

        Some(Commands::Key { action }) => match commands::init_state(&cli.db, engine) {
            Ok(state) => match action {
                KeyAction::Create { owner } => {
                    commands::key::create(&state, &owner).await.map(|_| ())
                }
                KeyAction::Revoke { key } => commands::key::revoke(&state, &key).await,
            },
            Err(e) => Err(e),
        },

        Some(Commands::Outputs {
            step_id,
            owner,
            limit,
        }) => match commands::init_state(&cli.db, engine) {
            Ok(state) => commands::outputs::list(&state, &step_id, &owner, limit).await,
            Err(e) => Err(e),
        },

        None => {
            use clap::CommandFactory;
            Cli::command().print_help().ok();
            println!();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
