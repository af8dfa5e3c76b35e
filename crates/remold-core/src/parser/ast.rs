//! Syntax tree for the template subset understood by the migrator.

/// An expression inside `{{ ... }}` or a directive.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A variable reference and its byte offset in the template source.
    Name(String, usize),
    Str(String),
    /// Numbers, booleans and `none`.
    Literal(String),
    Attr(Box<Expr>, String),
    /// Subscript; slices keep every present part.
    Item(Box<Expr>, Vec<Expr>),
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
        kwargs: Vec<(String, Expr)>,
    },
    Filter(Box<Expr>, FilterCall),
    Test {
        target: Box<Expr>,
        name: String,
        args: Vec<Expr>,
    },
    Unary(&'static str, Box<Expr>),
    Binary(&'static str, Box<Expr>, Box<Expr>),
    Cond {
        body: Box<Expr>,
        test: Box<Expr>,
        orelse: Option<Box<Expr>>,
    },
    List(Vec<Expr>),
    Tuple(Vec<Expr>),
    Dict(Vec<(Expr, Expr)>),
}

/// A filter application such as `|join(", ")`.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCall {
    pub name: String,
    pub args: Vec<Expr>,
    pub kwargs: Vec<(String, Expr)>,
}

/// Left-hand side of `for`, `set` and `with`.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Name(String),
    Tuple(Vec<Target>),
    /// `ns.attr` assignment; refers to `ns` (at the given offset) rather than binding it.
    Attr(String, String, usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MacroParam {
    pub name: String,
    pub default: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(String),
    Output(Expr),
    Block {
        name: String,
        scoped: bool,
        body: Vec<Node>,
    },
    Extends(Expr),
    Include(Expr),
    Import {
        template: Expr,
        alias: String,
    },
    FromImport {
        template: Expr,
        names: Vec<(String, Option<String>)>,
    },
    For {
        target: Target,
        iter: Expr,
        filter: Option<Expr>,
        body: Vec<Node>,
        else_body: Vec<Node>,
    },
    If {
        branches: Vec<(Expr, Vec<Node>)>,
        else_body: Vec<Node>,
    },
    Macro {
        name: String,
        params: Vec<MacroParam>,
        body: Vec<Node>,
    },
    CallBlock {
        params: Vec<MacroParam>,
        call: Expr,
        body: Vec<Node>,
    },
    Set {
        target: Target,
        value: Expr,
    },
    SetBlock {
        target: Target,
        filters: Vec<FilterCall>,
        body: Vec<Node>,
    },
    With {
        assignments: Vec<(Target, Expr)>,
        body: Vec<Node>,
    },
    FilterBlock {
        filters: Vec<FilterCall>,
        body: Vec<Node>,
    },
    Autoescape {
        value: Expr,
        body: Vec<Node>,
    },
}

impl Node {
    /// Direct child bodies in source order.
    pub fn children(&self) -> Vec<&[Node]> {
        match self {
            Node::Block { body, .. }
            | Node::Macro { body, .. }
            | Node::CallBlock { body, .. }
            | Node::SetBlock { body, .. }
            | Node::With { body, .. }
            | Node::FilterBlock { body, .. }
            | Node::Autoescape { body, .. } => vec![body.as_slice()],
            Node::For {
                body, else_body, ..
            } => vec![body.as_slice(), else_body.as_slice()],
            Node::If {
                branches,
                else_body,
            } => {
                let mut out: Vec<&[Node]> = branches.iter().map(|(_, b)| b.as_slice()).collect();
                out.push(else_body.as_slice());
                out
            }
            _ => Vec::new(),
        }
    }
}

/// Pre-order walk over every node in `nodes`.
pub fn walk<'a>(nodes: &'a [Node], visit: &mut impl FnMut(&'a Node)) {
    for node in nodes {
        visit(node);
        for child in node.children() {
            walk(child, visit);
        }
    }
}
