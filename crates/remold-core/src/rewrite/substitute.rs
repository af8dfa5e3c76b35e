use std::ops::Range;

use crate::mapping::RenameTable;
use crate::parser::scope::Reference;

/// Replacement text for one byte range of the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub range: Range<usize>,
    pub text: String,
}

/// Edits renaming free variable references.
///
/// Only references the scope analysis reported as free are touched, so loop
/// targets, macro and call parameters, and names assigned earlier in the same
/// scope keep their spelling everywhere. Raw regions, comments, string
/// literals, attribute and filter names, and keyword argument names never
/// appear among the references. All renames apply at once: `a -> b` together
/// with `b -> c` never turns `a` into `c`.
pub fn variable_edits(references: &[Reference], renames: &RenameTable) -> Vec<Edit> {
    references
        .iter()
        .filter_map(|r| {
            renames
                .lookup(&r.name)
                .filter(|new| *new != r.name)
                .map(|new| Edit {
                    range: r.offset..r.offset + r.name.len(),
                    text: new.to_string(),
                })
        })
        .collect()
}

/// Copy `source[range]`, applying the edits that fall inside it.
///
/// Edits must not overlap; they may come in any order.
pub fn apply_edits(source: &str, range: Range<usize>, edits: &[Edit]) -> String {
    let mut inside: Vec<&Edit> = edits
        .iter()
        .filter(|e| e.range.start >= range.start && e.range.end <= range.end)
        .collect();
    inside.sort_by_key(|e| e.range.start);

    let mut out = String::with_capacity(range.len());
    let mut pos = range.start;
    for edit in inside {
        out.push_str(&source[pos..edit.range.start]);
        out.push_str(&edit.text);
        pos = edit.range.end;
    }
    out.push_str(&source[pos..range.end]);
    out
}
