pub mod extract;
pub mod substitute;

use std::collections::HashSet;

use miette::Diagnostic;
use thiserror::Error;

use crate::mapping::MappingStore;
use crate::parser::lexer::{tokenize_spanned, Segment};
use crate::parser::TemplateFact;

pub use extract::{extract_blocks, ExtractedBlock};
pub use substitute::{apply_edits, variable_edits, Edit};

/// Marker written on the first provenance line of every rewritten template.
pub const PROVENANCE_MARKER: &str = "{# remold: migrated template #}";

#[derive(Debug, Error, Diagnostic)]
pub enum RewriteError {
    #[error("block '{block}' has no matching endblock")]
    UnmatchedBlock { block: String },

    #[error("endblock without a matching block")]
    UnexpectedEndblock,

    #[error("'endblock {found}' closes block '{block}'")]
    MismatchedEndblock { block: String, found: String },

    #[error("block directive without a name")]
    UnnamedBlock,

    #[error("{message}")]
    Syntax { message: String },
}

/// Produce the migrated source for one template.
///
/// Top-level blocks are re-emitted in first-seen order under their mapped
/// names, wrapped in an `extends` of `base_template` (skipped when empty),
/// followed by provenance comments. Text outside blocks is not carried over;
/// a template that extends nothing and loses such text gets a warning.
pub fn rewrite(
    fact: &TemplateFact,
    mapping: &MappingStore,
    base_template: &str,
) -> Result<String, RewriteError> {
    let mut lines: Vec<String> = Vec::new();

    if !base_template.is_empty() {
        lines.push(format!(
            "{{% extends \"{}\" %}}",
            base_template.replace('"', "\\\"")
        ));
        lines.push(String::new());
    }

    let source = fact.raw_source.as_str();
    let extracted = extract_blocks(source)?;
    let edits = rename_edits(fact, mapping, &extracted);
    let mut emitted: HashSet<&str> = HashSet::new();
    let top_level: Vec<&ExtractedBlock> = extracted.iter().filter(|b| b.depth == 0).collect();

    if fact.parent.is_none() && has_loose_text(source, &top_level)? {
        tracing::warn!(
            path = %fact.path,
            "text outside blocks is not carried into the migrated template"
        );
    }

    for block in top_level {
        if !fact.blocks.contains(&block.name) || !emitted.insert(block.name.as_str()) {
            continue;
        }

        let name = mapping.blocks.get(&block.name);
        let content = apply_edits(source, block.content.clone(), &edits);
        let content = content.trim();

        lines.push(format!("{{% block {name} %}}"));
        if !content.is_empty() {
            lines.push(content.to_string());
        }
        lines.push("{% endblock %}".to_string());
        lines.push(String::new());
    }

    lines.extend(provenance(fact, mapping));
    lines.push(String::new());

    Ok(lines.join("\n"))
}

/// Produce the migrated source for the base layout.
///
/// The whole template is kept, markup and text outside blocks included;
/// block names and free variables are renamed in place and the provenance
/// comments are appended.
pub fn rewrite_layout(
    fact: &TemplateFact,
    mapping: &MappingStore,
) -> Result<String, RewriteError> {
    let source = fact.raw_source.as_str();
    let extracted = extract_blocks(source)?;
    let edits = rename_edits(fact, mapping, &extracted);

    let mut output = apply_edits(source, 0..source.len(), &edits);
    if !output.is_empty() && !output.ends_with('\n') {
        output.push('\n');
    }
    output.push('\n');
    output.push_str(&provenance(fact, mapping).join("\n"));
    output.push('\n');
    Ok(output)
}

/// Block-name and variable edits over the whole source.
fn rename_edits(
    fact: &TemplateFact,
    mapping: &MappingStore,
    extracted: &[ExtractedBlock],
) -> Vec<Edit> {
    let mut edits = variable_edits(&fact.references, &mapping.variables);
    for block in extracted {
        let new = mapping.blocks.get(&block.name);
        if new == block.name {
            continue;
        }
        edits.extend(block.name_spans.iter().map(|span| Edit {
            range: span.clone(),
            text: new.to_string(),
        }));
    }
    edits
}

/// Whether non-whitespace text sits outside every top-level block.
fn has_loose_text(source: &str, top_level: &[&ExtractedBlock]) -> Result<bool, RewriteError> {
    let segments = tokenize_spanned(source).map_err(|e| RewriteError::Syntax {
        message: e.to_string(),
    })?;
    Ok(segments.iter().any(|(segment, span)| {
        matches!(segment, Segment::Text(text) if !text.trim().is_empty())
            && !top_level
                .iter()
                .any(|b| b.content.start <= span.start && span.end <= b.content.end)
    }))
}

fn provenance(fact: &TemplateFact, mapping: &MappingStore) -> Vec<String> {
    let variables: Vec<&str> = fact.variables.iter().map(String::as_str).collect();
    let mut lines = vec![
        PROVENANCE_MARKER.to_string(),
        comment(&format!("original: {}", fact.path)),
        comment(&format!("variables: {}", variables.join(", "))),
    ];

    let applied: serde_json::Map<String, serde_json::Value> = mapping
        .variables
        .renames()
        .map(|(old, new)| (old.to_string(), serde_json::Value::String(new.to_string())))
        .collect();
    if !applied.is_empty() {
        let table = serde_json::Value::Object(applied);
        lines.push(comment(&format!("variable mappings: {table}")));
    }

    lines
}

fn comment(text: &str) -> String {
    format!("{{# {} #}}", text.replace("#}", "# }"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    const SOURCE: &str = r#"{% extends "old_base.html" %}
{% block page_title %}{{ page_title }}{% endblock %}
{% block content %}
  <p>Hello {{ user_name }}, role: {{ role }}</p>
  {% block sidebar %}{{ user_name_full }}{% endblock %}
{% endblock %}
"#;

    #[test]
    fn test_rewrite_with_mapping() {
        let fact = parse("home.html", SOURCE).unwrap();
        let mut mapping = MappingStore::new();
        mapping.variables.set("user_name", "username");
        mapping.blocks.set("content", "main_content");
        mapping.blocks.set("sidebar", "aside_content");

        let output = rewrite(&fact, &mapping, "base.html").unwrap();
        let expected = r#"{% extends "base.html" %}

{% block page_title %}
{{ page_title }}
{% endblock %}

{% block main_content %}
<p>Hello {{ username }}, role: {{ role }}</p>
  {% block aside_content %}{{ user_name_full }}{% endblock %}
{% endblock %}

{# remold: migrated template #}
{# original: home.html #}
{# variables: page_title, role, user_name, user_name_full #}
{# variable mappings: {"user_name":"username"} #}
"#;
        assert_eq!(output, expected);
    }

    #[test]
    fn test_identity_mapping_preserves_block_names() {
        let fact = parse("home.html", SOURCE).unwrap();
        let output = rewrite(&fact, &MappingStore::new(), "").unwrap();
        assert!(!output.contains("extends"));
        assert!(!output.contains("variable mappings"));

        let reparsed = parse("home.html", &output).unwrap();
        assert_eq!(reparsed.blocks, fact.blocks);
    }

    #[test]
    fn test_rewritten_output_reparses_with_mapped_names() {
        let fact = parse("home.html", SOURCE).unwrap();
        let mut mapping = MappingStore::new();
        mapping.blocks.set("content", "main_content");

        let output = rewrite(&fact, &mapping, "base.html").unwrap();
        let reparsed = parse("home.html", &output).unwrap();
        assert_eq!(reparsed.parent.as_deref(), Some("base.html"));
        assert_eq!(reparsed.blocks, vec!["page_title", "main_content", "sidebar"]);
    }

    #[test]
    fn test_template_without_blocks_keeps_provenance_only() {
        let fact = parse("partials/nav.html", "<nav>{{ nav_items }}</nav>").unwrap();
        let output = rewrite(&fact, &MappingStore::new(), "base.html").unwrap();
        assert!(output.starts_with("{% extends \"base.html\" %}\n\n{# remold"));
        assert!(output.contains("{# variables: nav_items #}"));
    }

    #[test]
    fn test_unmatched_block_is_a_rewrite_error() {
        let fact = TemplateFact {
            path: "corrupt.html".into(),
            variables: Default::default(),
            blocks: vec!["content".into()],
            parent: None,
            includes: Vec::new(),
            raw_source: "{% block content %}never closed".into(),
            references: Vec::new(),
        };
        let err = rewrite(&fact, &MappingStore::new(), "base.html").unwrap_err();
        assert!(matches!(err, RewriteError::UnmatchedBlock { ref block } if block == "content"));
    }

    #[test]
    fn test_commented_and_raw_markers_do_not_break_rewrite() {
        let source = "{# {% block old_ad %} #}\n\
                      {% block content %}{% raw %}{% endblock %}{% endraw %}{{ user_name }}{% endblock %}";
        let fact = parse("ad.html", source).unwrap();
        let mut mapping = MappingStore::new();
        mapping.variables.set("user_name", "username");

        let output = rewrite(&fact, &mapping, "base.html").unwrap();
        assert!(output.contains(
            "{% block content %}\n{% raw %}{% endblock %}{% endraw %}{{ username }}\n{% endblock %}"
        ));
        assert!(!output.contains("old_ad"));
    }

    #[test]
    fn test_layout_keeps_markup_outside_blocks() {
        let source = "<html>\n<title>{% block title %}{{ site_name }}{% endblock title %}</title>\n\
                      {% include \"nav.html\" %}\n{% block content %}{% endblock %}\n</html>\n";
        let fact = parse("base.html", source).unwrap();
        let mut mapping = MappingStore::new();
        mapping.blocks.set("title", "page_title");
        mapping.variables.set("site_name", "site");

        let output = rewrite_layout(&fact, &mapping).unwrap();
        assert!(output.starts_with(
            "<html>\n<title>{% block page_title %}{{ site }}{% endblock page_title %}</title>\n\
             {% include \"nav.html\" %}\n{% block content %}{% endblock %}\n</html>\n\n"
        ));
        assert!(output.contains("{# original: base.html #}"));

        let reparsed = parse("base.html", &output).unwrap();
        assert_eq!(reparsed.blocks, vec!["page_title", "content"]);
        assert_eq!(reparsed.includes, vec!["nav.html"]);
    }

    #[test]
    fn test_loose_text_detection() {
        let source = "<div>{% block a %}x{% endblock %}</div>";
        let blocks = extract_blocks(source).unwrap();
        let top: Vec<_> = blocks.iter().collect();
        assert!(has_loose_text(source, &top).unwrap());

        let source = "\n{% block a %}x{% endblock %}\n";
        let blocks = extract_blocks(source).unwrap();
        let top: Vec<_> = blocks.iter().collect();
        assert!(!has_loose_text(source, &top).unwrap());
    }
}
