use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "fbr")]
#[command(about = "Food bank distribution reconciliation CLI", long_about = None)]
struct Cli {
    /// Layered config paths in merge order (base -> site overrides)
    #[arg(long = "config", global = true)]
    config_paths: Vec<String>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database commands
    Db {
        #[command(subcommand)]
        cmd: DbCmd,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Bind a recipe's ingredients to current inventory and report shortages
    Resolve {
        #[arg(long = "food-bank")]
        food_bank: String,

        /// Recipe JSON file as produced by the recipe generator
        #[arg(long)]
        recipe: String,
    },

    /// Distribution session lifecycle
    Session {
        #[command(subcommand)]
        cmd: SessionCmd,
    },

    /// Distribution log utilities
    Audit {
        #[command(subcommand)]
        cmd: AuditCmd,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    Status,

    /// Apply SQL migrations.
    Migrate,
}

#[derive(Subcommand)]
pub(crate) enum SessionCmd {
    /// Suggest an initial meal count from current stock
    Suggest {
        #[arg(long = "food-bank")]
        food_bank: String,

        #[arg(long)]
        recipe: String,
    },

    /// Resolve the recipe and open an active session
    Start {
        #[arg(long = "food-bank")]
        food_bank: String,

        #[arg(long)]
        recipe: String,

        /// Overrides the recipe file's "id"
        #[arg(long = "recipe-id")]
        recipe_id: Option<String>,

        /// Meals on hand at the start of distribution
        #[arg(long = "initial", allow_negative_numbers = true)]
        initial_meal_count: i64,
    },

    /// Record leftover meals and reconcile inventory (active -> completed)
    Complete {
        #[arg(long = "session-id")]
        session_id: String,

        /// Meals left over at the end of distribution
        #[arg(long = "final", allow_negative_numbers = true)]
        final_meal_count: i64,
    },

    /// Abandon an active session without touching inventory
    Cancel {
        #[arg(long = "session-id")]
        session_id: String,
    },

    /// Print one session
    Show {
        #[arg(long = "session-id")]
        session_id: String,
    },

    /// List sessions for a food bank, oldest first
    List {
        #[arg(long = "food-bank")]
        food_bank: String,

        /// active | completed | cancelled
        #[arg(long)]
        status: Option<String>,
    },

    /// Active sessions older than sessions.stale_after_hours
    Stale {
        #[arg(long = "food-bank")]
        food_bank: String,
    },
}

#[derive(Subcommand)]
enum AuditCmd {
    /// Verify the hash chain of a JSONL distribution log
    Verify {
        /// Defaults to audit.path from config
        #[arg(long)]
        path: Option<String>,
    },
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Dev convenience: pick up FBR_DATABASE_URL etc. from .env.local if present.
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Db { cmd } => {
            let pool = fbr_db::connect_from_env().await?;
            match cmd {
                DbCmd::Status => {
                    let s = fbr_db::status(&pool).await?;
                    println!("db_ok={} has_sessions_table={}", s.ok, s.has_sessions_table);
                }
                DbCmd::Migrate => {
                    fbr_db::migrate(&pool).await?;
                    println!("migrations_applied=true");
                }
            }
        }

        Commands::ConfigHash { paths } => {
            let loaded = fbr_config::load_layered_yaml(&paths)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Resolve { food_bank, recipe } => {
            let cfg = commands::load_engine_config(&cli.config_paths)?;
            commands::session::resolve(&cfg, &food_bank, &recipe).await?;
        }

        Commands::Session { cmd } => {
            let cfg = commands::load_engine_config(&cli.config_paths)?;
            commands::session::dispatch(&cfg, cmd).await?;
        }

        Commands::Audit { cmd } => match cmd {
            AuditCmd::Verify { path } => {
                let path = match path {
                    Some(p) => p,
                    None => commands::load_engine_config(&cli.config_paths)?.audit.path,
                };
                commands::audit_verify(&path)?;
            }
        },
    }

    Ok(())
}
