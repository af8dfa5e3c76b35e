use std::ops::Range;

use super::ParseError;

/// A top-level piece of template source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    Text(&'a str),
    /// Body of a `{{ ... }}` interpolation, whitespace-control markers removed.
    /// `offset` is the byte position of `body` in the source.
    Output {
        body: &'a str,
        line: usize,
        offset: usize,
    },
    /// Body of a `{% ... %}` directive, whitespace-control markers removed.
    Tag {
        body: &'a str,
        line: usize,
        offset: usize,
    },
    Comment,
}

/// Split template source into text, interpolation, directive and comment segments.
///
/// `{% raw %}...{% endraw %}` regions are returned as a single `Text` segment.
pub fn tokenize(source: &str) -> Result<Vec<Segment<'_>>, ParseError> {
    Ok(tokenize_spanned(source)?
        .into_iter()
        .map(|(segment, _)| segment)
        .collect())
}

/// Like [`tokenize`], pairing each segment with the byte range it covers,
/// delimiters included. A raw region's range covers only its inner text.
pub fn tokenize_spanned(source: &str) -> Result<Vec<(Segment<'_>, Range<usize>)>, ParseError> {
    let mut segments = Vec::new();
    let mut pos = 0;

    while pos < source.len() {
        let Some(open) = find_open(source, pos) else {
            segments.push((Segment::Text(&source[pos..]), pos..source.len()));
            break;
        };

        if open > pos {
            segments.push((Segment::Text(&source[pos..open]), pos..open));
        }

        let line = line_at(source, open);
        let kind = &source[open..open + 2];
        let inner_start = open + 2;

        match kind {
            "{#" => {
                let close = source[inner_start..].find("#}").ok_or_else(|| ParseError {
                    line,
                    message: "unclosed comment".into(),
                })?;
                pos = inner_start + close + 2;
                segments.push((Segment::Comment, open..pos));
            }
            "{{" => {
                let close = find_close(source, inner_start, "}}").ok_or_else(|| ParseError {
                    line,
                    message: "unclosed '{{'".into(),
                })?;
                let (body, offset) = strip_markers(source, inner_start, close);
                pos = close + 2;
                segments.push((Segment::Output { body, line, offset }, open..pos));
            }
            _ => {
                let close = find_close(source, inner_start, "%}").ok_or_else(|| ParseError {
                    line,
                    message: "unclosed '{%'".into(),
                })?;
                let (body, offset) = strip_markers(source, inner_start, close);
                pos = close + 2;

                if body == "raw" {
                    let (raw_end, after) = find_endraw(source, pos).ok_or_else(|| ParseError {
                        line,
                        message: "missing '{% endraw %}'".into(),
                    })?;
                    segments.push((Segment::Text(&source[pos..raw_end]), pos..raw_end));
                    pos = after;
                } else {
                    segments.push((Segment::Tag { body, line, offset }, open..pos));
                }
            }
        }
    }

    Ok(segments)
}

/// 1-based line number of a byte offset.
pub fn line_at(source: &str, offset: usize) -> usize {
    source[..offset].bytes().filter(|b| *b == b'\n').count() + 1
}

fn find_open(source: &str, from: usize) -> Option<usize> {
    let bytes = source.as_bytes();
    let mut i = from;
    while i + 1 < bytes.len() {
        if bytes[i] == b'{' && matches!(bytes[i + 1], b'{' | b'%' | b'#') {
            return Some(i);
        }
        i += 1;
    }
    None
}

/// Find the closing delimiter, skipping over quoted string literals.
fn find_close(source: &str, from: usize, close: &str) -> Option<usize> {
    let bytes = source.as_bytes();
    let close = close.as_bytes();
    let mut quote: Option<u8> = None;
    let mut i = from;

    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) => {
                if b == b'\\' {
                    i += 1;
                } else if b == q {
                    quote = None;
                }
            }
            None => {
                if b == b'"' || b == b'\'' {
                    quote = Some(b);
                } else if bytes[i..].starts_with(close) {
                    return Some(i);
                }
            }
        }
        i += 1;
    }
    None
}

/// Locate `{% endraw %}` starting at `from`; returns (start of tag, end of tag).
fn find_endraw(source: &str, from: usize) -> Option<(usize, usize)> {
    let mut search = from;
    while let Some(rel) = source[search..].find("{%") {
        let open = search + rel;
        let close = source[open + 2..].find("%}")? + open + 2;
        if strip_markers(source, open + 2, close).0 == "endraw" {
            return Some((open, close + 2));
        }
        search = close + 2;
    }
    None
}

/// Trim whitespace-control markers and padding from `source[start..end]`,
/// returning the body and its byte offset.
fn strip_markers(source: &str, start: usize, end: usize) -> (&str, usize) {
    let inner = &source[start..end];
    let body = inner
        .strip_prefix('-')
        .or_else(|| inner.strip_prefix('+'))
        .unwrap_or(inner);
    let skipped = inner.len() - body.len();
    let body = body
        .strip_suffix('-')
        .or_else(|| body.strip_suffix('+'))
        .unwrap_or(body);
    let trimmed = body.trim_start();
    let offset = start + skipped + (body.len() - trimmed.len());
    (trimmed.trim_end(), offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_mixed_segments() {
        let segments = tokenize("<p>{{ name }}</p>{% if x %}{# note #}{% endif %}").unwrap();
        assert_eq!(
            segments,
            vec![
                Segment::Text("<p>"),
                Segment::Output {
                    body: "name",
                    line: 1,
                    offset: 6
                },
                Segment::Text("</p>"),
                Segment::Tag {
                    body: "if x",
                    line: 1,
                    offset: 20
                },
                Segment::Comment,
                Segment::Tag {
                    body: "endif",
                    line: 1,
                    offset: 40
                },
            ]
        );
    }

    #[test]
    fn test_whitespace_control_markers_stripped() {
        let segments = tokenize("{%- block a -%}{{- b -}}{%+ endblock +%}").unwrap();
        assert_eq!(
            segments[0],
            Segment::Tag {
                body: "block a",
                line: 1,
                offset: 4
            }
        );
        assert_eq!(
            segments[1],
            Segment::Output {
                body: "b",
                line: 1,
                offset: 19
            }
        );
        assert_eq!(
            segments[2],
            Segment::Tag {
                body: "endblock",
                line: 1,
                offset: 28
            }
        );
    }

    #[test]
    fn test_close_delimiter_inside_string_is_skipped() {
        let segments = tokenize("{{ \"}}\" ~ name }}").unwrap();
        assert_eq!(
            segments,
            vec![Segment::Output {
                body: "\"}}\" ~ name",
                line: 1,
                offset: 3
            }]
        );
    }

    #[test]
    fn test_raw_region_is_text() {
        let segments = tokenize("{% raw %}{{ not_a_var }}{% endraw %}").unwrap();
        assert_eq!(segments, vec![Segment::Text("{{ not_a_var }}")]);
    }

    #[test]
    fn test_spans_cover_delimiters() {
        let source = "a{# c #}{% raw %}{% x %}{% endraw %}{%- if y -%}";
        let spans: Vec<_> = tokenize_spanned(source)
            .unwrap()
            .into_iter()
            .map(|(_, span)| &source[span])
            .collect();
        assert_eq!(spans, vec!["a", "{# c #}", "{% x %}", "{%- if y -%}"]);
    }

    #[test]
    fn test_unclosed_tag_reports_line() {
        let err = tokenize("line one\n{% block a").unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.message.contains("unclosed"));
    }
}
