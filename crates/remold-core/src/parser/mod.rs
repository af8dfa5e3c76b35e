pub mod ast;
pub mod expr;
pub mod lexer;
pub mod scope;
pub mod tree;

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use crate::error::{RemoldError, Result};
use ast::{walk, Expr, Node};

/// Syntax error raised while building the tree, before the template path is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub line: usize,
    pub message: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

/// Structural facts extracted from one template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateFact {
    pub path: String,
    /// Free variables (referenced but never bound inside the template).
    pub variables: BTreeSet<String>,
    /// Declared block names in first-seen order, duplicates collapsed.
    pub blocks: Vec<String>,
    pub parent: Option<String>,
    pub includes: Vec<String>,
    #[serde(skip)]
    pub raw_source: String,
    /// Where each free variable is referenced in `raw_source`, in source order.
    #[serde(skip)]
    pub references: Vec<scope::Reference>,
}

/// Parse template source into its fact set.
pub fn parse(path: &str, source: &str) -> Result<TemplateFact> {
    let nodes = tree::build_tree(source).map_err(|e| RemoldError::Parse {
        path: path.to_string(),
        message: e.to_string(),
    })?;

    let mut blocks: Vec<String> = Vec::new();
    let mut parent = None;
    let mut includes = Vec::new();

    walk(&nodes, &mut |node| match node {
        Node::Block { name, .. } => {
            if !blocks.contains(name) {
                blocks.push(name.clone());
            }
        }
        Node::Extends(Expr::Str(name)) => parent = Some(name.clone()),
        Node::Include(template) => collect_template_names(template, &mut includes),
        _ => {}
    });

    let references = scope::free_references(&nodes);

    Ok(TemplateFact {
        path: path.to_string(),
        variables: references.iter().map(|r| r.name.clone()).collect(),
        blocks,
        parent,
        includes,
        raw_source: source.to_string(),
        references,
    })
}

/// Literal template names referenced by an `include` target.
fn collect_template_names(expr: &Expr, out: &mut Vec<String>) {
    match expr {
        Expr::Str(name) => out.push(name.clone()),
        Expr::List(items) | Expr::Tuple(items) => {
            for item in items {
                collect_template_names(item, out);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"{% extends "layout.html" %}
{% block title %}{{ page_title }}{% endblock %}
{% block content %}
  <h1>Hello {{ user_name }}</h1>
  {% include "partials/nav.html" %}
  {% for item in nav_items %}
    <a href="{{ item.url }}">{{ item.label }}</a>
  {% endfor %}
  {% block inner %}{{ current_user.email }}{% endblock %}
{% endblock content %}
{% block title %}duplicate{% endblock %}
"#;

    #[test]
    fn test_parse_collects_facts() {
        let fact = parse("pages/home.html", PAGE).unwrap();
        assert_eq!(fact.path, "pages/home.html");
        assert_eq!(fact.parent.as_deref(), Some("layout.html"));
        assert_eq!(fact.includes, vec!["partials/nav.html"]);
        assert_eq!(fact.blocks, vec!["title", "content", "inner"]);
        assert_eq!(
            fact.variables.into_iter().collect::<Vec<_>>(),
            vec!["current_user", "nav_items", "page_title", "user_name"]
        );
        assert_eq!(fact.raw_source, PAGE);
        assert!(fact
            .references
            .iter()
            .all(|r| PAGE[r.offset..].starts_with(r.name.as_str())));
    }

    #[test]
    fn test_dynamic_extends_contributes_variables_not_parent() {
        let fact = parse("x.html", "{% extends layout_name %}").unwrap();
        assert_eq!(fact.parent, None);
        assert!(fact.variables.contains("layout_name"));
    }

    #[test]
    fn test_include_list_records_each_literal() {
        let fact = parse("x.html", "{% include ['a.html', 'b.html'] %}").unwrap();
        assert_eq!(fact.includes, vec!["a.html", "b.html"]);
    }

    #[test]
    fn test_parse_error_carries_path_and_line() {
        let err = parse("broken.html", "ok\n{% if x %}never closed").unwrap_err();
        match err {
            RemoldError::Parse { path, message } => {
                assert_eq!(path, "broken.html");
                assert!(message.starts_with("line 2:"), "{message}");
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }
}
