use std::collections::{BTreeSet, HashSet};

use super::ast::{Expr, FilterCall, MacroParam, Node, Target};
use super::tree::target_names;

/// A free variable and the byte offset of one place it is referenced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub name: String,
    pub offset: usize,
}

/// Collect identifiers referenced by the template but never bound inside it.
///
/// Binding constructs push a frame; a name is free when no visible frame
/// binds it at the point of reference. `set`, `import` and `from ... import`
/// bind for the remainder of the enclosing frame, so a reference that precedes
/// the assignment is still reported. A block body starts from an isolated
/// frame and sees none of the template's bindings unless it is `scoped`.
/// Assignments inside an `if` survive the `if` only when every branch,
/// including a non-empty `else`, makes them.
pub fn free_variables(nodes: &[Node]) -> BTreeSet<String> {
    analyze(nodes).into_iter().map(|r| r.name).collect()
}

/// Every free reference, ordered by offset.
pub fn free_references(nodes: &[Node]) -> Vec<Reference> {
    let mut references = analyze(nodes);
    references.sort_by_key(|r| r.offset);
    references
}

fn analyze(nodes: &[Node]) -> Vec<Reference> {
    let mut tracker = ScopeTracker {
        frames: vec![Frame::default()],
        references: Vec::new(),
    };
    tracker.visit_nodes(nodes);
    tracker.references
}

#[derive(Default)]
struct Frame {
    names: HashSet<String>,
    /// Lookups stop here instead of continuing to enclosing frames.
    isolated: bool,
}

struct ScopeTracker {
    frames: Vec<Frame>,
    references: Vec<Reference>,
}

impl ScopeTracker {
    fn is_bound(&self, name: &str) -> bool {
        for frame in self.frames.iter().rev() {
            if frame.names.contains(name) {
                return true;
            }
            if frame.isolated {
                break;
            }
        }
        false
    }

    fn reference(&mut self, name: &str, offset: usize) {
        if !self.is_bound(name) {
            self.references.push(Reference {
                name: name.to_string(),
                offset,
            });
        }
    }

    fn bind(&mut self, name: impl Into<String>) {
        if let Some(frame) = self.frames.last_mut() {
            frame.names.insert(name.into());
        }
    }

    fn bind_target(&mut self, target: &Target) {
        let mut names = Vec::new();
        target_names(target, &mut names);
        for name in names {
            self.bind(name);
        }
    }

    fn reference_target(&mut self, target: &Target) {
        match target {
            Target::Attr(name, _, offset) => self.reference(name, *offset),
            Target::Tuple(items) => items.iter().for_each(|t| self.reference_target(t)),
            Target::Name(_) => {}
        }
    }

    /// Run `f` in a new frame seeded with `bindings`; returns the frame's names.
    fn scoped<F>(&mut self, bindings: &[String], f: F) -> HashSet<String>
    where
        F: FnOnce(&mut Self),
    {
        self.enter(bindings, false, f)
    }

    fn enter<F>(&mut self, bindings: &[String], isolated: bool, f: F) -> HashSet<String>
    where
        F: FnOnce(&mut Self),
    {
        self.frames.push(Frame {
            names: bindings.iter().cloned().collect(),
            isolated,
        });
        f(self);
        self.frames.pop().map(|frame| frame.names).unwrap_or_default()
    }

    fn visit_nodes(&mut self, nodes: &[Node]) {
        for node in nodes {
            self.visit_node(node);
        }
    }

    fn visit_params(&mut self, params: &[MacroParam]) -> Vec<String> {
        for param in params {
            if let Some(default) = &param.default {
                self.visit_expr(default);
            }
        }
        params.iter().map(|p| p.name.clone()).collect()
    }

    fn visit_node(&mut self, node: &Node) {
        match node {
            Node::Text(_) => {}
            Node::Output(expr) | Node::Extends(expr) | Node::Include(expr) => {
                self.visit_expr(expr)
            }
            Node::Block { scoped, body, .. } => {
                self.enter(&[], !scoped, |s| s.visit_nodes(body));
            }
            Node::Import { template, alias } => {
                self.visit_expr(template);
                self.bind(alias.clone());
            }
            Node::FromImport { template, names } => {
                self.visit_expr(template);
                for (name, alias) in names {
                    self.bind(alias.clone().unwrap_or_else(|| name.clone()));
                }
            }
            Node::For {
                target,
                iter,
                filter,
                body,
                else_body,
            } => {
                self.visit_expr(iter);
                let mut bound = vec!["loop".to_string()];
                target_names(target, &mut bound);
                self.scoped(&bound, |s| {
                    if let Some(filter) = filter {
                        s.visit_expr(filter);
                    }
                    s.visit_nodes(body);
                });
                self.scoped(&[], |s| s.visit_nodes(else_body));
            }
            Node::If {
                branches,
                else_body,
            } => {
                let mut assigned: Option<HashSet<String>> = None;
                for (test, body) in branches {
                    self.visit_expr(test);
                    let bound = self.scoped(&[], |s| s.visit_nodes(body));
                    assigned = Some(match assigned {
                        Some(prev) => prev.intersection(&bound).cloned().collect(),
                        None => bound,
                    });
                }
                let bound = self.scoped(&[], |s| s.visit_nodes(else_body));
                let assigned = match assigned {
                    Some(prev) => prev.intersection(&bound).cloned().collect(),
                    None => bound,
                };
                for name in assigned {
                    self.bind(name);
                }
            }
            Node::Macro { name, params, body } => {
                self.bind(name.clone());
                let mut bound = self.visit_params(params);
                bound.extend(["varargs", "kwargs", "caller"].map(String::from));
                self.scoped(&bound, |s| s.visit_nodes(body));
            }
            Node::CallBlock { params, call, body } => {
                self.visit_expr(call);
                let bound = self.visit_params(params);
                self.scoped(&bound, |s| s.visit_nodes(body));
            }
            Node::Set { target, value } => {
                self.visit_expr(value);
                self.reference_target(target);
                self.bind_target(target);
            }
            Node::SetBlock {
                target,
                filters,
                body,
            } => {
                self.scoped(&[], |s| s.visit_nodes(body));
                self.visit_filters(filters);
                self.reference_target(target);
                self.bind_target(target);
            }
            Node::With { assignments, body } => {
                let mut bound = Vec::new();
                for (target, value) in assignments {
                    self.visit_expr(value);
                    target_names(target, &mut bound);
                }
                self.scoped(&bound, |s| s.visit_nodes(body));
            }
            Node::FilterBlock { filters, body } => {
                self.visit_filters(filters);
                self.scoped(&[], |s| s.visit_nodes(body));
            }
            Node::Autoescape { value, body } => {
                self.visit_expr(value);
                self.scoped(&[], |s| s.visit_nodes(body));
            }
        }
    }

    fn visit_filters(&mut self, filters: &[FilterCall]) {
        for filter in filters {
            self.visit_filter(filter);
        }
    }

    fn visit_filter(&mut self, filter: &FilterCall) {
        self.visit_exprs(&filter.args);
        for (_, value) in &filter.kwargs {
            self.visit_expr(value);
        }
    }

    fn visit_exprs(&mut self, exprs: &[Expr]) {
        for expr in exprs {
            self.visit_expr(expr);
        }
    }

    fn visit_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Name(name, offset) => self.reference(name, *offset),
            Expr::Str(_) | Expr::Literal(_) => {}
            Expr::Attr(target, _) => self.visit_expr(target),
            Expr::Item(target, parts) => {
                self.visit_expr(target);
                self.visit_exprs(parts);
            }
            Expr::Call { func, args, kwargs } => {
                self.visit_expr(func);
                self.visit_exprs(args);
                for (_, value) in kwargs {
                    self.visit_expr(value);
                }
            }
            Expr::Filter(target, filter) => {
                self.visit_expr(target);
                self.visit_filter(filter);
            }
            Expr::Test { target, args, .. } => {
                self.visit_expr(target);
                self.visit_exprs(args);
            }
            Expr::Unary(_, operand) => self.visit_expr(operand),
            Expr::Binary(_, left, right) => {
                self.visit_expr(left);
                self.visit_expr(right);
            }
            Expr::Cond { body, test, orelse } => {
                self.visit_expr(test);
                self.visit_expr(body);
                if let Some(orelse) = orelse {
                    self.visit_expr(orelse);
                }
            }
            Expr::List(items) | Expr::Tuple(items) => self.visit_exprs(items),
            Expr::Dict(pairs) => {
                for (key, value) in pairs {
                    self.visit_expr(key);
                    self.visit_expr(value);
                }
            }
        }
    }
}
