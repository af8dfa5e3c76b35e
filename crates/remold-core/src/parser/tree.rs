use super::ast::{Node, Target};
use super::expr::ExprParser;
use super::lexer::{tokenize, Segment};
use super::ParseError;

/// Parse template source into a syntax tree.
pub fn build_tree(source: &str) -> Result<Vec<Node>, ParseError> {
    let mut builder = TreeBuilder {
        segments: tokenize(source)?,
        pos: 0,
        directives_seen: 0,
        extends_seen: false,
    };
    let (nodes, _) = builder.parse_body(&[])?;
    Ok(nodes)
}

struct TreeBuilder<'a> {
    segments: Vec<Segment<'a>>,
    pos: usize,
    directives_seen: usize,
    extends_seen: bool,
}

/// The directive that closed a body, with its remaining tokens unparsed.
struct EndTag {
    keyword: String,
    parser: ExprParser,
}

fn is_end_keyword(keyword: &str) -> bool {
    keyword.starts_with("end") || keyword == "else" || keyword == "elif"
}

impl<'a> TreeBuilder<'a> {
    fn parse_body(&mut self, ends: &[&str]) -> Result<(Vec<Node>, Option<EndTag>), ParseError> {
        let mut nodes = Vec::new();

        while let Some(segment) = self.segments.get(self.pos).cloned() {
            self.pos += 1;
            match segment {
                Segment::Text(text) => nodes.push(Node::Text(text.to_string())),
                Segment::Comment => {}
                Segment::Output { body, line, offset } => {
                    self.directives_seen += 1;
                    let mut parser = ExprParser::new(body, line, offset)?;
                    let expr = parser.parse_tuple(true)?;
                    parser.expect_end()?;
                    nodes.push(Node::Output(expr));
                }
                Segment::Tag { body, line, offset } => {
                    let mut parser = ExprParser::new(body, line, offset)?;
                    let keyword = parser.expect_name().map_err(|_| ParseError {
                        line,
                        message: format!("invalid directive '{{% {body} %}}'"),
                    })?;

                    if ends.contains(&keyword.as_str()) {
                        return Ok((nodes, Some(EndTag { keyword, parser })));
                    }
                    if is_end_keyword(&keyword) {
                        return Err(ParseError {
                            line,
                            message: format!("unexpected '{keyword}'"),
                        });
                    }

                    let first = self.directives_seen == 0;
                    self.directives_seen += 1;
                    nodes.push(self.parse_directive(&keyword, parser, line, first)?);
                }
            }
        }

        Ok((nodes, None))
    }

    fn parse_until(
        &mut self,
        ends: &[&str],
        opener: &str,
        line: usize,
    ) -> Result<(Vec<Node>, EndTag), ParseError> {
        match self.parse_body(ends)? {
            (nodes, Some(end)) => Ok((nodes, end)),
            (_, None) => Err(ParseError {
                line,
                message: format!(
                    "unclosed '{opener}' (expected '{}')",
                    ends.last().copied().unwrap_or("end")
                ),
            }),
        }
    }

    fn parse_directive(
        &mut self,
        keyword: &str,
        mut p: ExprParser,
        line: usize,
        first: bool,
    ) -> Result<Node, ParseError> {
        let node = match keyword {
            "extends" => {
                if self.extends_seen {
                    return Err(p.error("template has more than one 'extends' directive"));
                }
                if !first {
                    return Err(p.error("'extends' must be the first directive in the template"));
                }
                self.extends_seen = true;
                let parent = p.parse_expression()?;
                p.expect_end()?;
                Node::Extends(parent)
            }
            "include" => {
                let template = p.parse_expression()?;
                if p.skip_name("ignore") {
                    p.expect_keyword("missing")?;
                }
                skip_context_modifier(&mut p)?;
                p.expect_end()?;
                Node::Include(template)
            }
            "import" => {
                let template = p.parse_expression()?;
                p.expect_keyword("as")?;
                let alias = p.expect_name()?;
                skip_context_modifier(&mut p)?;
                p.expect_end()?;
                Node::Import { template, alias }
            }
            "from" => {
                let template = p.parse_expression()?;
                p.expect_keyword("import")?;
                let mut names = Vec::new();
                loop {
                    let name = p.expect_name()?;
                    let alias = if p.skip_name("as") {
                        Some(p.expect_name()?)
                    } else {
                        None
                    };
                    names.push((name, alias));
                    if !p.skip_op(",") {
                        break;
                    }
                }
                skip_context_modifier(&mut p)?;
                p.expect_end()?;
                Node::FromImport { template, names }
            }
            "block" => {
                let name = p.expect_name()?;
                let scoped = p.skip_name("scoped");
                p.skip_name("required");
                p.expect_end()?;
                let (body, mut end) = self.parse_until(&["endblock"], "block", line)?;
                if !end.parser.at_end() {
                    let closing = end.parser.expect_name()?;
                    if closing != name {
                        return Err(end.parser.error(format!(
                            "mismatched 'endblock {closing}' for block '{name}'"
                        )));
                    }
                }
                end.parser.expect_end()?;
                Node::Block { name, scoped, body }
            }
            "for" => {
                let target = p.parse_target()?;
                p.expect_keyword("in")?;
                let iter = p.parse_tuple(false)?;
                let filter = if p.skip_name("if") {
                    Some(p.parse_expression()?)
                } else {
                    None
                };
                p.skip_name("recursive");
                p.expect_end()?;

                let (body, end) = self.parse_until(&["else", "endfor"], "for", line)?;
                end.parser.expect_end()?;
                let else_body = if end.keyword == "else" {
                    let (else_body, end) = self.parse_until(&["endfor"], "for", line)?;
                    end.parser.expect_end()?;
                    else_body
                } else {
                    Vec::new()
                };
                Node::For {
                    target,
                    iter,
                    filter,
                    body,
                    else_body,
                }
            }
            "if" => {
                let mut test = p.parse_tuple(false)?;
                p.expect_end()?;
                let mut branches = Vec::new();
                let mut else_body = Vec::new();
                loop {
                    let (body, mut end) =
                        self.parse_until(&["elif", "else", "endif"], "if", line)?;
                    branches.push((test, body));
                    match end.keyword.as_str() {
                        "elif" => {
                            test = end.parser.parse_tuple(false)?;
                            end.parser.expect_end()?;
                        }
                        "else" => {
                            end.parser.expect_end()?;
                            let (body, end) = self.parse_until(&["endif"], "if", line)?;
                            end.parser.expect_end()?;
                            else_body = body;
                            break;
                        }
                        _ => {
                            end.parser.expect_end()?;
                            break;
                        }
                    }
                }
                Node::If {
                    branches,
                    else_body,
                }
            }
            "macro" => {
                let name = p.expect_name()?;
                let params = p.parse_params()?;
                p.expect_end()?;
                let (body, mut end) = self.parse_until(&["endmacro"], "macro", line)?;
                if !end.parser.at_end() {
                    end.parser.expect_name()?;
                }
                end.parser.expect_end()?;
                Node::Macro { name, params, body }
            }
            "call" => {
                let params = if p.check_op("(") {
                    p.parse_params()?
                } else {
                    Vec::new()
                };
                let call = p.parse_expression()?;
                p.expect_end()?;
                let (body, end) = self.parse_until(&["endcall"], "call", line)?;
                end.parser.expect_end()?;
                Node::CallBlock { params, call, body }
            }
            "set" => {
                let target = p.parse_target()?;
                if p.skip_op("=") {
                    let value = p.parse_tuple(true)?;
                    p.expect_end()?;
                    Node::Set { target, value }
                } else {
                    let filters = if p.skip_op("|") {
                        p.parse_filter_chain()?
                    } else {
                        Vec::new()
                    };
                    p.expect_end()?;
                    let (body, end) = self.parse_until(&["endset"], "set", line)?;
                    end.parser.expect_end()?;
                    Node::SetBlock {
                        target,
                        filters,
                        body,
                    }
                }
            }
            "with" => {
                let mut assignments = Vec::new();
                while !p.at_end() {
                    let target = p.parse_target()?;
                    p.expect_op("=")?;
                    let value = p.parse_expression()?;
                    assignments.push((target, value));
                    if !p.skip_op(",") {
                        break;
                    }
                }
                p.expect_end()?;
                let (body, end) = self.parse_until(&["endwith"], "with", line)?;
                end.parser.expect_end()?;
                Node::With { assignments, body }
            }
            "filter" => {
                let filters = p.parse_filter_chain()?;
                p.expect_end()?;
                let (body, end) = self.parse_until(&["endfilter"], "filter", line)?;
                end.parser.expect_end()?;
                Node::FilterBlock { filters, body }
            }
            "autoescape" => {
                let value = p.parse_expression()?;
                p.expect_end()?;
                let (body, end) = self.parse_until(&["endautoescape"], "autoescape", line)?;
                end.parser.expect_end()?;
                Node::Autoescape { value, body }
            }
            other => {
                return Err(ParseError {
                    line,
                    message: format!("unknown directive '{other}'"),
                })
            }
        };
        Ok(node)
    }
}

fn skip_context_modifier(p: &mut ExprParser) -> Result<(), ParseError> {
    if p.skip_name("with") || p.skip_name("without") {
        p.expect_keyword("context")?;
    }
    Ok(())
}

/// Names bound by an assignment target.
pub fn target_names(target: &Target, out: &mut Vec<String>) {
    match target {
        Target::Name(name) => out.push(name.clone()),
        Target::Tuple(items) => items.iter().for_each(|t| target_names(t, out)),
        Target::Attr(..) => {}
    }
}
