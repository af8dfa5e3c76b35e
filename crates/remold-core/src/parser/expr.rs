use super::ast::{Expr, FilterCall, MacroParam, Target};
use super::ParseError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Name(String),
    Str(String),
    Number(String),
    Op(&'static str),
}

/// Operators, longest first so that `**` wins over `*`.
const OPERATORS: &[&str] = &[
    "**", "//", "==", "!=", "<=", ">=", "+", "-", "*", "/", "%", "~", "|", ".", ",", ":", "(",
    ")", "[", "]", "{", "}", "<", ">", "=",
];

/// Words that end an unparenthesised test argument.
const STOP_WORDS: &[&str] = &["and", "or", "not", "if", "else", "in", "is", "recursive"];

/// Tokens of `input`, each with its byte offset in `input`.
pub fn lex(input: &str, line: usize) -> Result<Vec<(Token, usize)>, ParseError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c == '_' || c.is_alphabetic() {
            let mut end = start;
            while let Some(&(i, c)) = chars.peek() {
                if c == '_' || c.is_alphanumeric() {
                    end = i + c.len_utf8();
                    chars.next();
                } else {
                    break;
                }
            }
            tokens.push((Token::Name(input[start..end].to_string()), start));
        } else if c.is_ascii_digit() {
            let mut end = start;
            let mut seen_dot = false;
            while let Some(&(i, c)) = chars.peek() {
                let decimal_point = c == '.'
                    && !seen_dot
                    && input[i + 1..].starts_with(|d: char| d.is_ascii_digit());
                if c.is_ascii_digit() || c == '_' || decimal_point {
                    seen_dot |= c == '.';
                    end = i + 1;
                    chars.next();
                } else {
                    break;
                }
            }
            tokens.push((Token::Number(input[start..end].to_string()), start));
        } else if c == '"' || c == '\'' {
            chars.next();
            let mut value = String::new();
            let mut closed = false;
            while let Some((_, ch)) = chars.next() {
                if ch == '\\' {
                    if let Some((_, escaped)) = chars.next() {
                        value.push(escaped);
                    }
                } else if ch == c {
                    closed = true;
                    break;
                } else {
                    value.push(ch);
                }
            }
            if !closed {
                return Err(ParseError {
                    line,
                    message: "unterminated string literal".into(),
                });
            }
            tokens.push((Token::Str(value), start));
        } else {
            let rest = &input[start..];
            let op = OPERATORS
                .iter()
                .find(|op| rest.starts_with(**op))
                .ok_or_else(|| ParseError {
                    line,
                    message: format!("unexpected character '{c}'"),
                })?;
            for _ in 0..op.len() {
                chars.next();
            }
            tokens.push((Token::Op(*op), start));
        }
    }

    Ok(tokens)
}

/// Recursive-descent parser over the tokens of one interpolation or directive.
pub struct ExprParser {
    tokens: Vec<Token>,
    offsets: Vec<usize>,
    /// Byte offset of the parsed input within the template source.
    base: usize,
    pos: usize,
    line: usize,
}

impl ExprParser {
    pub fn new(input: &str, line: usize, base: usize) -> Result<Self, ParseError> {
        let (tokens, offsets): (Vec<Token>, Vec<usize>) =
            lex(input, line)?.into_iter().unzip();
        Ok(Self {
            tokens,
            offsets,
            base,
            pos: 0,
            line,
        })
    }

    pub fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            line: self.line,
            message: message.into(),
        }
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    pub fn peek_name(&self) -> Option<&str> {
        match self.tokens.get(self.pos) {
            Some(Token::Name(n)) => Some(n.as_str()),
            _ => None,
        }
    }

    /// Source offset of the next token.
    fn current_offset(&self) -> usize {
        self.base + self.offsets.get(self.pos).copied().unwrap_or_default()
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    pub fn check_op(&self, op: &str) -> bool {
        matches!(self.tokens.get(self.pos), Some(Token::Op(o)) if *o == op)
    }

    pub fn skip_op(&mut self, op: &str) -> bool {
        if self.check_op(op) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub fn skip_name(&mut self, word: &str) -> bool {
        if self.peek_name() == Some(word) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub fn expect_op(&mut self, op: &str) -> Result<(), ParseError> {
        if self.skip_op(op) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{op}', found {}", self.describe_next())))
        }
    }

    pub fn expect_name(&mut self) -> Result<String, ParseError> {
        match self.tokens.get(self.pos) {
            Some(Token::Name(n)) => {
                let n = n.clone();
                self.pos += 1;
                Ok(n)
            }
            _ => Err(self.error(format!(
                "expected a name, found {}",
                self.describe_next()
            ))),
        }
    }

    pub fn expect_keyword(&mut self, word: &str) -> Result<(), ParseError> {
        if self.skip_name(word) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{word}', found {}", self.describe_next())))
        }
    }

    pub fn expect_end(&self) -> Result<(), ParseError> {
        if self.at_end() {
            Ok(())
        } else {
            Err(self.error(format!("unexpected {}", self.describe_next())))
        }
    }

    fn describe_next(&self) -> String {
        match self.tokens.get(self.pos) {
            None => "end of directive".to_string(),
            Some(Token::Name(n)) => format!("'{n}'"),
            Some(Token::Str(s)) => format!("string \"{s}\""),
            Some(Token::Number(n)) => format!("number {n}"),
            Some(Token::Op(o)) => format!("'{o}'"),
        }
    }

    pub fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        self.parse_condexpr(true)
    }

    /// Comma-separated expressions; a single item without a trailing comma stays unwrapped.
    pub fn parse_tuple(&mut self, with_condexpr: bool) -> Result<Expr, ParseError> {
        let mut items = vec![self.parse_condexpr(with_condexpr)?];
        let mut trailing_comma = false;
        while self.skip_op(",") {
            trailing_comma = true;
            if self.at_end() || self.check_op(")") || self.check_op("]") {
                break;
            }
            items.push(self.parse_condexpr(with_condexpr)?);
            trailing_comma = false;
        }
        if items.len() == 1 && !trailing_comma {
            Ok(items.remove(0))
        } else {
            Ok(Expr::Tuple(items))
        }
    }

    fn parse_condexpr(&mut self, with_condexpr: bool) -> Result<Expr, ParseError> {
        let body = self.parse_or()?;
        if !with_condexpr || !self.skip_name("if") {
            return Ok(body);
        }
        let test = self.parse_or()?;
        let orelse = if self.skip_name("else") {
            Some(Box::new(self.parse_condexpr(true)?))
        } else {
            None
        };
        Ok(Expr::Cond {
            body: Box::new(body),
            test: Box::new(test),
            orelse,
        })
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and()?;
        while self.skip_name("or") {
            let right = self.parse_and()?;
            left = Expr::Binary("or", Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_not()?;
        while self.skip_name("and") {
            let right = self.parse_not()?;
            left = Expr::Binary("and", Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, ParseError> {
        if self.skip_name("not") {
            return Ok(Expr::Unary("not", Box::new(self.parse_not()?)));
        }
        self.parse_compare()
    }

    fn parse_compare(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_math1()?;
        loop {
            let op = if let Some(op) = ["==", "!=", "<=", ">=", "<", ">"]
                .into_iter()
                .find(|op| self.check_op(op))
            {
                self.pos += 1;
                op
            } else if self.skip_name("in") {
                "in"
            } else if self.peek_name() == Some("not")
                && matches!(self.peek_at(1), Some(Token::Name(n)) if n == "in")
            {
                self.pos += 2;
                "not in"
            } else {
                break;
            };
            let right = self.parse_math1()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_math1(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_concat()?;
        while let Some(op) = ["+", "-"].into_iter().find(|op| self.check_op(op)) {
            self.pos += 1;
            let right = self.parse_concat()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_concat(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_math2()?;
        while self.skip_op("~") {
            let right = self.parse_math2()?;
            left = Expr::Binary("~", Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_math2(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_pow()?;
        while let Some(op) = ["*", "/", "//", "%"]
            .into_iter()
            .find(|op| self.check_op(op))
        {
            self.pos += 1;
            let right = self.parse_pow()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_pow(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;
        while self.skip_op("**") {
            let right = self.parse_unary()?;
            left = Expr::Binary("**", Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if self.skip_op("-") {
            return Ok(Expr::Unary("-", Box::new(self.parse_unary()?)));
        }
        if self.skip_op("+") {
            return Ok(Expr::Unary("+", Box::new(self.parse_unary()?)));
        }
        let primary = self.parse_primary()?;
        self.parse_postfix(primary)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let Some(token) = self.tokens.get(self.pos).cloned() else {
            return Err(self.error("unexpected end of expression"));
        };
        let offset = self.current_offset();
        self.pos += 1;

        match token {
            Token::Name(name) => Ok(match name.as_str() {
                "true" | "false" | "none" | "True" | "False" | "None" => Expr::Literal(name),
                _ => Expr::Name(name, offset),
            }),
            Token::Str(mut value) => {
                while let Some(Token::Str(next)) = self.tokens.get(self.pos) {
                    value.push_str(next);
                    self.pos += 1;
                }
                Ok(Expr::Str(value))
            }
            Token::Number(n) => Ok(Expr::Literal(n)),
            Token::Op("(") => {
                if self.skip_op(")") {
                    return Ok(Expr::Tuple(Vec::new()));
                }
                let inner = self.parse_tuple(true)?;
                self.expect_op(")")?;
                Ok(inner)
            }
            Token::Op("[") => {
                let mut items = Vec::new();
                while !self.skip_op("]") {
                    if !items.is_empty() {
                        self.expect_op(",")?;
                        if self.skip_op("]") {
                            break;
                        }
                    }
                    items.push(self.parse_expression()?);
                }
                Ok(Expr::List(items))
            }
            Token::Op("{") => {
                let mut pairs = Vec::new();
                while !self.skip_op("}") {
                    if !pairs.is_empty() {
                        self.expect_op(",")?;
                        if self.skip_op("}") {
                            break;
                        }
                    }
                    let key = self.parse_expression()?;
                    self.expect_op(":")?;
                    let value = self.parse_expression()?;
                    pairs.push((key, value));
                }
                Ok(Expr::Dict(pairs))
            }
            Token::Op(op) => Err(self.error(format!("unexpected '{op}'"))),
        }
    }

    fn parse_postfix(&mut self, mut expr: Expr) -> Result<Expr, ParseError> {
        loop {
            if self.skip_op(".") {
                let attr = match self.tokens.get(self.pos).cloned() {
                    Some(Token::Name(n)) | Some(Token::Number(n)) => n,
                    _ => return Err(self.error("expected attribute name after '.'")),
                };
                self.pos += 1;
                expr = Expr::Attr(Box::new(expr), attr);
            } else if self.skip_op("[") {
                let mut parts = Vec::new();
                while !self.skip_op("]") {
                    if self.skip_op(":") || self.skip_op(",") {
                        continue;
                    }
                    parts.push(self.parse_expression()?);
                }
                expr = Expr::Item(Box::new(expr), parts);
            } else if self.skip_op("(") {
                let (args, kwargs) = self.parse_call_args()?;
                expr = Expr::Call {
                    func: Box::new(expr),
                    args,
                    kwargs,
                };
            } else if self.skip_op("|") {
                let filter = self.parse_filter_call()?;
                expr = Expr::Filter(Box::new(expr), filter);
            } else if self.skip_name("is") {
                let negated = self.skip_name("not");
                let name = self.expect_name()?;
                let args = self.parse_test_args()?;
                expr = Expr::Test {
                    target: Box::new(expr),
                    name,
                    args,
                };
                if negated {
                    expr = Expr::Unary("not", Box::new(expr));
                }
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_test_args(&mut self) -> Result<Vec<Expr>, ParseError> {
        if self.skip_op("(") {
            let (mut args, kwargs) = self.parse_call_args()?;
            args.extend(kwargs.into_iter().map(|(_, v)| v));
            return Ok(args);
        }
        let takes_bare_arg = match self.tokens.get(self.pos) {
            Some(Token::Str(_)) | Some(Token::Number(_)) => true,
            Some(Token::Name(n)) => !STOP_WORDS.contains(&n.as_str()),
            _ => false,
        };
        if takes_bare_arg {
            let primary = self.parse_primary()?;
            Ok(vec![primary])
        } else {
            Ok(Vec::new())
        }
    }

    /// Arguments of a call; the opening `(` has already been consumed.
    pub fn parse_call_args(&mut self) -> Result<(Vec<Expr>, Vec<(String, Expr)>), ParseError> {
        let mut args = Vec::new();
        let mut kwargs = Vec::new();
        let mut first = true;

        while !self.skip_op(")") {
            if !first {
                self.expect_op(",")?;
                if self.skip_op(")") {
                    break;
                }
            }
            first = false;

            if self.skip_op("**") || self.skip_op("*") {
                args.push(self.parse_expression()?);
                continue;
            }
            if let (Some(Token::Name(name)), Some(Token::Op("="))) =
                (self.tokens.get(self.pos), self.peek_at(1))
            {
                let name = name.clone();
                self.pos += 2;
                kwargs.push((name, self.parse_expression()?));
                continue;
            }
            args.push(self.parse_expression()?);
        }

        Ok((args, kwargs))
    }

    /// A filter name and optional arguments; the leading `|` has already been consumed.
    pub fn parse_filter_call(&mut self) -> Result<FilterCall, ParseError> {
        let mut name = self.expect_name()?;
        while self.skip_op(".") {
            name.push('.');
            name.push_str(&self.expect_name()?);
        }
        let (args, kwargs) = if self.skip_op("(") {
            self.parse_call_args()?
        } else {
            (Vec::new(), Vec::new())
        };
        Ok(FilterCall { name, args, kwargs })
    }

    /// `name | f1 | f2(x)` chain used by `{% filter %}` and `{% set x | f %}`.
    pub fn parse_filter_chain(&mut self) -> Result<Vec<FilterCall>, ParseError> {
        let mut filters = vec![self.parse_filter_call()?];
        while self.skip_op("|") {
            filters.push(self.parse_filter_call()?);
        }
        Ok(filters)
    }

    pub fn parse_target(&mut self) -> Result<Target, ParseError> {
        let first = self.parse_target_atom()?;
        if !self.check_op(",") {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.skip_op(",") {
            if self.at_end()
                || self.check_op(")")
                || self.check_op("=")
                || self.peek_name() == Some("in")
            {
                break;
            }
            items.push(self.parse_target_atom()?);
        }
        Ok(Target::Tuple(items))
    }

    fn parse_target_atom(&mut self) -> Result<Target, ParseError> {
        if self.skip_op("(") {
            let inner = self.parse_target()?;
            self.expect_op(")")?;
            return Ok(inner);
        }
        let offset = self.current_offset();
        let name = self.expect_name()?;
        if self.skip_op(".") {
            let attr = self.expect_name()?;
            return Ok(Target::Attr(name, attr, offset));
        }
        Ok(Target::Name(name))
    }

    /// Parameter list `(a, b=1)` of a macro or call block.
    pub fn parse_params(&mut self) -> Result<Vec<MacroParam>, ParseError> {
        self.expect_op("(")?;
        let mut params = Vec::new();
        while !self.skip_op(")") {
            if !params.is_empty() {
                self.expect_op(",")?;
                if self.skip_op(")") {
                    break;
                }
            }
            let name = self.expect_name()?;
            let default = if self.skip_op("=") {
                Some(self.parse_expression()?)
            } else {
                None
            };
            params.push(MacroParam { name, default });
        }
        Ok(params)
    }
}
