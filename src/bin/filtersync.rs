use clap::{Parser, Subcommand};
use filtersync::cli as prog_cli;
use filtersync::config::load_config;
use filtersync::translate::OutputMode;
use filtersync::utils::logger;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "filtersync", version, about = "Filter tree translation CLI", long_about = None)]
struct Cli {
    #[arg(long, help = "Path to a config file (TOML). If omitted, the usual locations are searched.")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Translate a tree JSON file into the persisted value for a mode")]
    Translate {
        #[arg(long, help = "Schema JSON file")]
        schema: PathBuf,
        #[arg(long, help = "Output mode: search | logic")]
        mode: OutputMode,
        #[arg(long, help = "Tree JSON file")]
        tree: PathBuf,
    },
    #[command(about = "Rebuild a tree from a persisted value")]
    Load {
        #[arg(long, help = "Schema JSON file")]
        schema: PathBuf,
        #[arg(long, help = "Output mode the value was produced in: search | logic")]
        mode: OutputMode,
        #[arg(long, help = "Persisted value (JSON string)")]
        value: String,
    },
    #[command(about = "Print the deep link for a tree JSON file")]
    Link {
        #[arg(long, help = "Tree JSON file")]
        tree: PathBuf,
    },
    #[command(about = "Check a tree against a schema")]
    Validate {
        #[arg(long, help = "Schema JSON file")]
        schema: PathBuf,
        #[arg(long, help = "Tree JSON file")]
        tree: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    let cfg = match load_config(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = logger::configure_from_settings(&cfg.log) {
        eprintln!("warning: logging disabled: {e}");
    }

    let cmd = match cli.command {
        Commands::Translate { schema, mode, tree } => prog_cli::Command::Translate { schema, mode, tree },
        Commands::Load { schema, mode, value } => prog_cli::Command::Load { schema, mode, value },
        Commands::Link { tree } => prog_cli::Command::Link { tree },
        Commands::Validate { schema, tree } => prog_cli::Command::Validate { schema, tree },
    };
    match prog_cli::run(&cfg, cmd) {
        Ok(out) => println!("{out}"),
        Err(e) => {
            log::error!("{e}");
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}
