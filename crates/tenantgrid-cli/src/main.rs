use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "tgctl",
    about = "TenantGrid: tenant tier composition for shared clusters",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Log output format: text or json
    #[arg(long, global = true, default_value = "text")]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compose the roster into a deployment graph (JSON).
    Compose {
        /// Path to tenantgrid.toml (or a .json config)
        #[arg(short, long, default_value = "tenantgrid.toml")]
        config: String,
        /// Compose only these tenant ids or pools (e.g. basic-pool). Repeatable.
        #[arg(short, long)]
        tenant: Vec<String>,
        /// Write the graph here instead of stdout
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Show the apply order, wave by wave, without applying anything.
    Plan {
        #[arg(short, long, default_value = "tenantgrid.toml")]
        config: String,
        #[arg(short, long)]
        tenant: Vec<String>,
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// Compare a previously composed graph with the current roster.
    Diff {
        #[arg(short, long, default_value = "tenantgrid.toml")]
        config: String,
        /// Graph JSON from an earlier `tgctl compose`
        #[arg(short, long)]
        previous: String,
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// Check that every roster entry composes.
    Validate {
        #[arg(short, long, default_value = "tenantgrid.toml")]
        config: String,
    },
    /// Generate a tenantgrid.toml scaffold with one pooled and two siloed tenants
    Init {
        #[arg(short, long, default_value = ".")]
        path: String,
        /// Overwrite an existing tenantgrid.toml
        #[arg(long)]
        force: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive("tenantgrid=info".parse()?);
    match cli.log_format.as_str() {
        "json" => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
        _ => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
    }

    match cli.command {
        Commands::Compose {
            config,
            tenant,
            output,
        } => commands::compose::compose(&config, &tenant, output.as_deref()),
        Commands::Plan {
            config,
            tenant,
            format,
        } => commands::plan::plan(&config, &tenant, &format),
        Commands::Diff {
            config,
            previous,
            format,
        } => commands::diff::diff(&config, &previous, &format),
        Commands::Validate { config } => commands::validate::validate(&config),
        Commands::Init { path, force } => commands::init::init(&path, force),
    }
}
