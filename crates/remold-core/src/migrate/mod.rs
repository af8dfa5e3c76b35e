pub mod discover;

use std::collections::{BTreeMap, BTreeSet};
use std::error::Error as _;
use std::path::{Component, Path};

use regex_lite::Regex;
use serde::Serialize;

use crate::config::MigrationConfig;
use crate::error::{RemoldError, Result};
use crate::mapping::{suggest_target_path, MappingKind, MappingStore};
use crate::parser::{parse, TemplateFact};
use crate::rewrite::{rewrite, rewrite_layout};

pub use discover::{discover_templates, is_binary_file, is_excluded, normalize_path};

/// Union of every analysed template's variables and blocks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Discovered {
    pub variables: BTreeSet<String>,
    pub blocks: BTreeSet<String>,
}

impl Discovered {
    pub fn record(&mut self, fact: &TemplateFact) {
        self.variables.extend(fact.variables.iter().cloned());
        self.blocks.extend(fact.blocks.iter().cloned());
    }
}

/// Where a template ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateState {
    /// Matched an exclude pattern; never parsed.
    Excluded,
    /// Operator mapped the template to an empty path.
    Skipped,
    Failed { reason: String },
    Rewritten { target: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateOutcome {
    pub path: String,
    pub state: TemplateState,
}

impl TemplateOutcome {
    fn new(path: &str, state: TemplateState) -> Self {
        Self {
            path: path.to_string(),
            state,
        }
    }

    fn failed(path: &str, err: &RemoldError) -> Self {
        Self::new(
            path,
            TemplateState::Failed {
                reason: describe(err),
            },
        )
    }
}

/// Result of parsing a batch of templates.
#[derive(Debug, Default)]
pub struct Analysis {
    /// Parsed templates in batch order.
    pub facts: Vec<TemplateFact>,
    pub discovered: Discovered,
    /// Excluded and failed templates.
    pub outcomes: Vec<TemplateOutcome>,
}

/// Manual `(old, new)` renames supplied by the operator.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub templates: Vec<(String, String)>,
    pub variables: Vec<(String, String)>,
    pub blocks: Vec<(String, String)>,
}

impl Overrides {
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty() && self.variables.is_empty() && self.blocks.is_empty()
    }

    pub fn push(&mut self, kind: MappingKind, old: impl Into<String>, new: impl Into<String>) {
        let pair = (old.into(), new.into());
        match kind {
            MappingKind::Template => self.templates.push(pair),
            MappingKind::Variable => self.variables.push(pair),
            MappingKind::Block => self.blocks.push(pair),
        }
    }

    pub fn apply_to(&self, store: &mut MappingStore) {
        store.apply_overrides(MappingKind::Template, self.templates.iter().cloned());
        store.apply_overrides(MappingKind::Variable, self.variables.iter().cloned());
        store.apply_overrides(MappingKind::Block, self.blocks.iter().cloned());
    }
}

/// A rewritten template held in memory, not yet written.
#[derive(Debug, Clone)]
pub struct PlannedTemplate {
    pub source_path: String,
    pub target_path: String,
    pub original: String,
    pub content: String,
    pub variables: Vec<String>,
    pub blocks: Vec<String>,
}

/// A migration plan that can be previewed (dry-run) or executed.
#[derive(Debug)]
pub struct MigrationPlan {
    /// The frozen mapping every template in the batch was rewritten with.
    pub mapping: MappingStore,
    pub templates: Vec<PlannedTemplate>,
    /// Templates that already reached a terminal state while planning.
    pub outcomes: Vec<TemplateOutcome>,
}

/// One successfully written template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationLogEntry {
    pub source_path: String,
    pub target_path: String,
    pub variables: Vec<String>,
    pub blocks: Vec<String>,
}

#[derive(Debug)]
pub struct MigrationSummary {
    pub mapping: MappingStore,
    pub outcomes: Vec<TemplateOutcome>,
    pub log: Vec<MigrationLogEntry>,
}

impl MigrationSummary {
    fn count(&self, pred: impl Fn(&TemplateState) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.state)).count()
    }

    pub fn success_count(&self) -> usize {
        self.count(|s| matches!(s, TemplateState::Rewritten { .. }))
    }

    pub fn failure_count(&self) -> usize {
        self.count(|s| matches!(s, TemplateState::Failed { .. }))
    }

    pub fn excluded_count(&self) -> usize {
        self.count(|s| matches!(s, TemplateState::Excluded))
    }

    pub fn skipped_count(&self) -> usize {
        self.count(|s| matches!(s, TemplateState::Skipped))
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &str)> {
        self.outcomes.iter().filter_map(|o| match &o.state {
            TemplateState::Failed { reason } => Some((o.path.as_str(), reason.as_str())),
            _ => None,
        })
    }
}

/// Drives one migration run: discovery, analysis, mapping resolution, rewriting.
pub struct Migrator {
    config: MigrationConfig,
    excludes: Vec<Regex>,
}

impl Migrator {
    pub fn new(config: MigrationConfig) -> Result<Self> {
        config.validate()?;
        let excludes = config.compiled_excludes()?;
        Ok(Self { config, excludes })
    }

    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    pub fn discover(&self) -> Result<Vec<String>> {
        discover_templates(&self.config)
    }

    pub fn is_excluded(&self, path: &str) -> bool {
        is_excluded(path, &self.excludes)
    }

    /// The batch to process: `selection` when given, otherwise every discovered template.
    pub fn select(&self, selection: &[String]) -> Result<Vec<String>> {
        if selection.is_empty() {
            return self.discover();
        }
        let mut seen = BTreeSet::new();
        Ok(selection
            .iter()
            .map(|p| normalize_path(p))
            .filter(|p| seen.insert(p.clone()))
            .collect())
    }

    /// Parse every non-excluded template in `batch`.
    ///
    /// Excluded templates never reach the discovered sets. Unreadable or
    /// malformed templates are recorded as failed and analysis moves on.
    pub fn analyze(&self, batch: &[String]) -> Analysis {
        let mut analysis = Analysis::default();

        for path in batch {
            if self.is_excluded(path) {
                tracing::debug!(path = %path, "excluded");
                analysis
                    .outcomes
                    .push(TemplateOutcome::new(path, TemplateState::Excluded));
                continue;
            }

            match self.analyze_one(path) {
                Ok(fact) => {
                    tracing::debug!(
                        path = %path,
                        variables = fact.variables.len(),
                        blocks = fact.blocks.len(),
                        "analyzed"
                    );
                    analysis.discovered.record(&fact);
                    analysis.facts.push(fact);
                }
                Err(e) => {
                    tracing::warn!(path = %path, error = %e, "failed to analyze template");
                    analysis.outcomes.push(TemplateOutcome::failed(path, &e));
                }
            }
        }

        analysis
    }

    fn analyze_one(&self, path: &str) -> Result<TemplateFact> {
        let full_path = self.config.source_dir.join(path);
        let source = std::fs::read_to_string(&full_path).map_err(|e| RemoldError::Io {
            context: format!("reading {}", full_path.display()),
            source: e,
        })?;
        parse(path, &source)
    }

    /// Heuristics (when enabled), then configured mappings, then `overrides`.
    pub fn resolve_mapping(&self, discovered: &Discovered, overrides: &Overrides) -> MappingStore {
        let mut mapping = self.proposed_mapping(discovered);
        overrides.apply_to(&mut mapping);
        mapping
    }

    /// The mapping before any operator overrides; what prompts start from.
    pub fn proposed_mapping(&self, discovered: &Discovered) -> MappingStore {
        let mut mapping = MappingStore::new();
        self.config.mappings.apply_to(&mut mapping);

        let heuristics = &self.config.heuristics;
        if self.config.auto_map_variables {
            heuristics.apply_variables(&mut mapping.variables, &discovered.variables);
        }
        if self.config.auto_preserve_blocks {
            heuristics.apply_blocks(&mut mapping.blocks, &discovered.blocks);
        }
        mapping
    }

    /// Target for `path`: the explicit template mapping, else the suggested path.
    /// `None` means the template is skipped.
    pub fn target_path(&self, mapping: &MappingStore, path: &str) -> Option<String> {
        let target = match mapping.templates.lookup(path) {
            Some(explicit) => normalize_path(explicit.trim()),
            None => suggest_target_path(path, &self.config.base_template),
        };
        (!target.is_empty()).then_some(target)
    }

    /// Rewrite every analysed template in memory.
    pub fn plan(&self, analysis: &Analysis, mapping: MappingStore) -> MigrationPlan {
        let mut templates = Vec::new();
        let mut outcomes = analysis.outcomes.clone();
        let mut claimed: BTreeMap<String, String> = BTreeMap::new();

        for fact in &analysis.facts {
            let path = fact.path.as_str();
            let Some(target) = self.target_path(&mapping, path) else {
                tracing::debug!(path = %path, "skipped by template mapping");
                outcomes.push(TemplateOutcome::new(path, TemplateState::Skipped));
                continue;
            };

            if let Err(reason) = check_target(&target, &claimed) {
                tracing::warn!(path = %path, target = %target, "{reason}");
                outcomes.push(TemplateOutcome::new(path, TemplateState::Failed { reason }));
                continue;
            }

            // The base layout keeps its full markup and never extends itself.
            let rewritten = if target == self.config.base_template {
                rewrite_layout(fact, &mapping)
            } else {
                rewrite(fact, &mapping, &self.config.base_template)
            };

            match rewritten {
                Ok(content) => {
                    claimed.insert(target.clone(), path.to_string());
                    templates.push(PlannedTemplate {
                        source_path: path.to_string(),
                        target_path: target,
                        original: fact.raw_source.clone(),
                        content,
                        variables: fact.variables.iter().cloned().collect(),
                        blocks: fact.blocks.clone(),
                    });
                }
                Err(source) => {
                    let err = RemoldError::Rewrite {
                        path: path.to_string(),
                        source,
                    };
                    tracing::warn!(path = %path, error = %err, "failed to rewrite template");
                    outcomes.push(TemplateOutcome::failed(path, &err));
                }
            }
        }

        MigrationPlan {
            mapping,
            templates,
            outcomes,
        }
    }

    /// Write a plan under the target root. Per-template write failures are recorded, not raised.
    pub fn execute_plan(&self, plan: MigrationPlan) -> MigrationSummary {
        let MigrationPlan {
            mapping,
            templates,
            mut outcomes,
        } = plan;
        let mut log = Vec::new();

        for planned in templates {
            match self.write_template(&planned) {
                Ok(()) => {
                    tracing::debug!(
                        source = %planned.source_path,
                        target = %planned.target_path,
                        "written"
                    );
                    outcomes.push(TemplateOutcome::new(
                        &planned.source_path,
                        TemplateState::Rewritten {
                            target: planned.target_path.clone(),
                        },
                    ));
                    log.push(MigrationLogEntry {
                        source_path: planned.source_path,
                        target_path: planned.target_path,
                        variables: planned.variables,
                        blocks: planned.blocks,
                    });
                }
                Err(e) => {
                    tracing::warn!(path = %planned.source_path, error = %e, "failed to write template");
                    outcomes.push(TemplateOutcome::failed(&planned.source_path, &e));
                }
            }
        }

        MigrationSummary {
            mapping,
            outcomes,
            log,
        }
    }

    fn write_template(&self, planned: &PlannedTemplate) -> Result<()> {
        let dest = self.config.target_dir.join(&planned.target_path);
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|e| RemoldError::Io {
                context: format!("creating directory {}", parent.display()),
                source: e,
            })?;
        }
        std::fs::write(&dest, &planned.content).map_err(|e| RemoldError::Io {
            context: format!("writing {}", dest.display()),
            source: e,
        })
    }

    /// Full non-interactive run over `selection` (or everything discovered).
    pub fn run(&self, selection: &[String], overrides: &Overrides) -> Result<MigrationSummary> {
        let batch = self.select(selection)?;
        let analysis = self.analyze(&batch);
        let mapping = self.resolve_mapping(&analysis.discovered, overrides);
        let plan = self.plan(&analysis, mapping);
        Ok(self.execute_plan(plan))
    }
}

/// Reject targets that escape the target root or collide with an earlier template.
fn check_target(
    target: &str,
    claimed: &BTreeMap<String, String>,
) -> std::result::Result<(), String> {
    let escapes = Path::new(target)
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(format!("target path '{target}' is outside the target directory"));
    }
    if let Some(owner) = claimed.get(target) {
        return Err(format!("target path '{target}' is already used by {owner}"));
    }
    Ok(())
}

/// Error message with its source chain, for per-template failure records.
fn describe(err: &RemoldError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
