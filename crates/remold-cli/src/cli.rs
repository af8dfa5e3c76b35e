use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "remold",
    about = "Migrate Jinja-style template trees to a new naming and layout scheme",
    version
)]
pub struct Cli {
    /// Show debug logging and, with --dry-run, a diff per template
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Rewrite templates from the source tree into the target tree
    Migrate {
        /// Path to the migration config (file or directory)
        #[arg(short, long, default_value = "remold.toml")]
        config: PathBuf,

        /// Only migrate these templates, relative to the source directory (repeatable)
        #[arg(short, long = "template", value_name = "PATH")]
        templates: Vec<String>,

        /// Use heuristics and suggested paths without prompting
        #[arg(short, long)]
        auto: bool,

        /// Show planned changes without writing anything
        #[arg(short, long)]
        dry_run: bool,

        /// Write a markdown report after migrating
        #[arg(
            short,
            long,
            value_name = "FILE",
            num_args = 0..=1,
            default_missing_value = "migration_report.md"
        )]
        report: Option<PathBuf>,

        /// Rename a variable (repeatable: --set-var old=new)
        #[arg(long = "set-var", value_name = "OLD=NEW")]
        set_var: Vec<String>,

        /// Rename a block (repeatable: --set-block old=new)
        #[arg(long = "set-block", value_name = "OLD=NEW")]
        set_block: Vec<String>,

        /// Relocate a template (repeatable: --map old.html=pages/new.html; empty skips it)
        #[arg(long = "map", value_name = "PATH=NEW")]
        map: Vec<String>,
    },

    /// Print the variables, blocks and inheritance edges of each template
    Analyze {
        /// Path to the migration config (file or directory)
        #[arg(short, long, default_value = "remold.toml")]
        config: PathBuf,

        /// Only analyze these templates (repeatable)
        #[arg(short, long = "template", value_name = "PATH")]
        templates: Vec<String>,
    },

    /// Write a sample remold.toml
    Init {
        /// Directory to write the config into
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Overwrite an existing remold.toml
        #[arg(long)]
        force: bool,
    },
}
