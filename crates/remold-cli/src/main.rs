mod cli;
mod commands;
mod prompt;

use clap::Parser;
use cli::{Cli, Commands};

fn main() -> miette::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Migrate {
            config,
            templates,
            auto,
            dry_run,
            report,
            set_var,
            set_block,
            map,
        } => commands::migrate::run(commands::migrate::MigrateArgs {
            config,
            templates,
            auto,
            dry_run,
            report,
            set_var,
            set_block,
            map,
            verbose: cli.verbose,
        }),
        Commands::Analyze { config, templates } => commands::analyze::run(config, templates),
        Commands::Init { path, force } => commands::init::run(path, force),
    }
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
