use std::ops::Range;

use super::RewriteError;
use crate::parser::lexer::{tokenize_spanned, Segment};

/// A block located in raw template text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedBlock {
    pub name: String,
    /// Byte range of the text between the open and close markers.
    pub content: Range<usize>,
    /// Number of enclosing blocks.
    pub depth: usize,
    /// Byte ranges of the block name in its open marker and, when the
    /// close marker repeats it, in the close marker.
    pub name_spans: Vec<Range<usize>>,
}

/// Locate every block by pairing `block`/`endblock` directives on a stack.
///
/// Works on lexer segments, so markers inside comments and `raw` regions are
/// plain text. Blocks come back in order of their opening marker.
pub fn extract_blocks(source: &str) -> Result<Vec<ExtractedBlock>, RewriteError> {
    let segments = tokenize_spanned(source).map_err(|e| RewriteError::Syntax {
        message: e.to_string(),
    })?;
    let mut open: Vec<(String, usize, Range<usize>)> = Vec::new();
    let mut blocks = Vec::new();

    for (segment, span) in segments {
        let Segment::Tag { body, offset, .. } = segment else {
            continue;
        };
        let Some((_, keyword)) = leading_ident(body) else {
            continue;
        };
        let rest = &body[keyword.len()..];
        let name = leading_ident(rest).map(|(at, name)| {
            let start = offset + keyword.len() + at;
            (name.to_string(), start..start + name.len())
        });

        match keyword {
            "block" => {
                let (name, name_span) = name.ok_or(RewriteError::UnnamedBlock)?;
                open.push((name, span.end, name_span));
            }
            "endblock" => {
                let (block, start, open_span) =
                    open.pop().ok_or(RewriteError::UnexpectedEndblock)?;
                let mut name_spans = vec![open_span];
                if let Some((found, close_span)) = name {
                    if found != block {
                        return Err(RewriteError::MismatchedEndblock { block, found });
                    }
                    name_spans.push(close_span);
                }
                blocks.push(ExtractedBlock {
                    content: start..span.start,
                    depth: open.len(),
                    name: block,
                    name_spans,
                });
            }
            _ => {}
        }
    }

    if let Some((block, _, _)) = open.pop() {
        return Err(RewriteError::UnmatchedBlock { block });
    }

    blocks.sort_by_key(|b| b.content.start);
    Ok(blocks)
}

/// Leading identifier of `text` after whitespace, with its byte offset.
fn leading_ident(text: &str) -> Option<(usize, &str)> {
    let at = text.len() - text.trim_start().len();
    let rest = &text[at..];
    let len = rest
        .find(|c: char| !(c == '_' || c.is_alphanumeric()))
        .unwrap_or(rest.len());
    (len > 0).then(|| (at, &rest[..len]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content<'a>(source: &'a str, block: &ExtractedBlock) -> &'a str {
        &source[block.content.clone()]
    }

    #[test]
    fn test_extract_flat_blocks_in_order() {
        let source = "{% block b %}two{% endblock %}\n{% block a %}one{% endblock a %}";
        let blocks = extract_blocks(source).unwrap();
        let names: Vec<_> = blocks.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(content(source, &blocks[0]), "two");
        assert_eq!(content(source, &blocks[1]), "one");
        let spans: Vec<_> = blocks[1].name_spans.iter().map(|s| &source[s.clone()]).collect();
        assert_eq!(spans, vec!["a", "a"]);
    }

    #[test]
    fn test_extract_nested_keeps_inner_markup_verbatim() {
        let source = "{%- block outer -%}A{% block inner %}B{% endblock %}C{% endblock %}";
        let blocks = extract_blocks(source).unwrap();
        assert_eq!(blocks[0].name, "outer");
        assert_eq!(blocks[0].depth, 0);
        assert_eq!(content(source, &blocks[0]), "A{% block inner %}B{% endblock %}C");
        assert_eq!(blocks[1].name, "inner");
        assert_eq!(blocks[1].depth, 1);
    }

    #[test]
    fn test_block_marker_in_comment_is_ignored() {
        let source = "{# {% block old_ad %} #}\n{% block content %}hi{% endblock %}";
        let blocks = extract_blocks(source).unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].name, "content");
        assert_eq!(content(source, &blocks[0]), "hi");
    }

    #[test]
    fn test_block_marker_in_raw_region_is_ignored() {
        let source = "{% block content %}{% raw %}{% endblock %}{% endraw %}real{% endblock %}";
        let blocks = extract_blocks(source).unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(
            content(source, &blocks[0]),
            "{% raw %}{% endblock %}{% endraw %}real"
        );
    }

    #[test]
    fn test_unmatched_open_names_the_block() {
        let err = extract_blocks("{% block content %}no end").unwrap_err();
        assert!(matches!(err, RewriteError::UnmatchedBlock { ref block } if block == "content"));
    }

    #[test]
    fn test_stray_endblock() {
        let err = extract_blocks("{% endblock %}").unwrap_err();
        assert!(matches!(err, RewriteError::UnexpectedEndblock));
    }

    #[test]
    fn test_blocklike_directive_names_are_not_blocks() {
        let blocks = extract_blocks("{% blocks %}{% block a %}{% endblock %}").unwrap();
        assert_eq!(blocks.len(), 1);
    }
}
