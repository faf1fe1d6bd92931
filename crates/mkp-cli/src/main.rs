use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "mkp")]
#[command(about = "Marketplace procurement reconciler CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> env overlays)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Reconcile one raw message body, exactly as the daemon would
    Replay {
        /// Layered config paths in merge order
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        /// Message body (JSON text)
        #[arg(long, conflicts_with = "payload_file")]
        payload: Option<String>,

        /// Path to a file holding the message body
        #[arg(long = "payload-file", conflicts_with = "payload")]
        payload_file: Option<String>,
    },

    /// Inspect stored Customer records
    Customers {
        #[command(subcommand)]
        cmd: CustomersCmd,
    },

    /// Usage reporting
    Usage {
        #[command(subcommand)]
        cmd: UsageCmd,
    },

    /// Procurement account maintenance
    Account {
        #[command(subcommand)]
        cmd: AccountCmd,
    },

    /// Database commands (postgres store only)
    Db {
        #[command(subcommand)]
        cmd: DbCmd,
    },
}

#[derive(Subcommand)]
enum CustomersCmd {
    /// One line per Customer
    List {
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,
    },

    /// Print one Customer record as JSON
    Show {
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        /// Procurement account id
        #[arg(long)]
        account_id: String,
    },
}

#[derive(Subcommand)]
enum UsageCmd {
    /// Report one usage window for every usage-reporting product
    Report {
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,
    },
}

#[derive(Subcommand)]
enum AccountCmd {
    /// Reset an account so its signup can be re-run (test accounts only)
    Reset {
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        #[arg(long)]
        account_id: String,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    /// Apply SQL migrations for the postgres record store
    Migrate {
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env.local if present (dev convenience).
    let _ = dotenvy::from_filename(".env.local");
    commands::init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = mkp_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Replay {
            config_paths,
            payload,
            payload_file,
        } => commands::replay::replay(config_paths, payload, payload_file).await?,

        Commands::Customers { cmd } => match cmd {
            CustomersCmd::List { config_paths } => {
                commands::customers::customers_list(config_paths).await?
            }
            CustomersCmd::Show {
                config_paths,
                account_id,
            } => commands::customers::customers_show(config_paths, &account_id).await?,
        },

        Commands::Usage { cmd } => match cmd {
            UsageCmd::Report { config_paths } => commands::usage::usage_report(config_paths).await?,
        },

        Commands::Account { cmd } => match cmd {
            AccountCmd::Reset {
                config_paths,
                account_id,
            } => commands::account::account_reset(config_paths, &account_id).await?,
        },

        Commands::Db { cmd } => match cmd {
            DbCmd::Migrate { config_paths } => commands::db::db_migrate(config_paths).await?,
        },
    }

    Ok(())
}
