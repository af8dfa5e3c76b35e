pub mod config;
pub mod error;
pub mod mapping;
pub mod migrate;
pub mod parser;
pub mod report;
pub mod rewrite;

pub use config::{load_config, MigrationConfig};
pub use error::{RemoldError, Result};
pub use mapping::{MappingKind, MappingStore, RenameTable};
pub use migrate::{Migrator, MigrationPlan, MigrationSummary, Overrides};
pub use parser::{parse, TemplateFact};
pub use rewrite::{rewrite, rewrite_layout, RewriteError};
