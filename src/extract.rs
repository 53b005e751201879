//! Target and link extraction.
//!
//! A target is an explicit hyperlink target line (`.. _`id`:`), a link is a
//! substitution reference (`|id|`). For every target a display label is
//! derived from the lines that follow it, looking at no more than six lines
//! starting two lines below the anchor. The first match wins:
//!
//! 1. a section underline: the label is the title text above it
//! 2. a definition item (`:term: text` or `term: text`): the label is the term
//! 3. a `:name:` field: its value, or when empty a numbered label such as
//!    `Figure 2` for the directive above the field
//!
//! Without a match the label is the target id.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;
use std::fmt;

lazy_static! {
    static ref TARGET_REGEX: Regex = Regex::new(r"^\.\. _`?(\w[^:`]*)`?:\s*$").unwrap();
    static ref LINK_REGEX: Regex = Regex::new(r"\|(\w+)\|").unwrap();
    static ref ITEM_REGEX: Regex = Regex::new(r"^:?(\w[^:]*):(?:\s.*)?$").unwrap();
    static ref NAME_REGEX: Regex = Regex::new(r"^\s*:name:\s*(\w.*)?$").unwrap();
}

/// Trailing characters dropped from an anchor id, as in `.. _`x.`:`
const ID_DECORATION: &str = " ._:`";

/// First line inspected for a label, relative to the anchor line
const LABEL_WINDOW_START: usize = 2;
/// Number of lines inspected for a label
const LABEL_WINDOW_LEN: usize = 6;

/// A reference target declared in a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Zero-based line index of the anchor
    pub line: usize,
    pub id: String,
    /// Text shown where the target is referenced
    pub label: String,
}

/// A `|id|` substitution reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRef {
    /// Zero-based line index
    pub line: usize,
    pub id: String,
}

/// Directive kinds that get numbered labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    Figure,
    Math,
    Table,
    Code,
}

impl BlockKind {
    /// Kind of the directive starting `line`, e.g. `.. list-table:: x` is a table.
    /// The directive must start in the first column.
    pub fn from_directive_line(line: &str) -> Option<Self> {
        let head = line.split("::").next().unwrap_or("");
        match head {
            ".. figure" => Some(BlockKind::Figure),
            ".. math" => Some(BlockKind::Math),
            ".. table" | ".. list-table" => Some(BlockKind::Table),
            ".. code" | ".. code-block" => Some(BlockKind::Code),
            _ => None,
        }
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockKind::Figure => write!(f, "Figure"),
            BlockKind::Math => write!(f, "Math"),
            BlockKind::Table => write!(f, "Table"),
            BlockKind::Code => write!(f, "Code"),
        }
    }
}

/// Running numbers for unnamed figures, tables, math and code blocks
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Counters {
    next: HashMap<BlockKind, usize>,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current number for `kind`, then advance it. Numbering starts at 1.
    pub fn take(&mut self, kind: BlockKind) -> usize {
        let slot = self.next.entry(kind).or_insert(1);
        let current = *slot;
        *slot += 1;
        current
    }

    /// Number the next `take` will hand out
    pub fn peek(&self, kind: BlockKind) -> usize {
        self.next.get(&kind).copied().unwrap_or(1)
    }
}

/// One [`Counters`] per document group. A group is created on first use and
/// keeps counting for as long as the scan session lives.
#[derive(Debug, Default)]
pub struct GroupCounters {
    groups: HashMap<usize, Counters>,
}

impl GroupCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn group(&mut self, group: usize) -> &mut Counters {
        self.groups.entry(group).or_default()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn clear(&mut self) {
        self.groups.clear();
    }
}

/// All `|id|` references, top to bottom and left to right
pub fn find_links<S: AsRef<str>>(lines: &[S]) -> Vec<LinkRef> {
    lines
        .iter()
        .enumerate()
        .flat_map(|(line, text)| {
            LINK_REGEX
                .captures_iter(text.as_ref())
                .map(move |captures| LinkRef {
                    line,
                    id: captures[1].to_string(),
                })
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Id declared by an anchor line, if the line is one
pub fn target_id(line: &str) -> Option<String> {
    TARGET_REGEX
        .captures(line)
        .map(|captures| {
            captures[1]
                .trim_end_matches(|c: char| ID_DECORATION.contains(c))
                .trim()
                .to_string()
        })
}

/// All targets with their labels. Numbered labels advance `counters`.
pub fn find_targets<S: AsRef<str>>(lines: &[S], counters: &mut Counters) -> Vec<Target> {
    let mut targets = Vec::new();
    for (index, line) in lines.iter().enumerate() {
        let Some(id) = target_id(line.as_ref()) else {
            continue;
        };
        let label = derive_label(lines, index, &id, counters);
        targets.push(Target {
            line: index,
            id,
            label,
        });
    }
    targets
}

/// Label for the target declared at `index`, see the module documentation
pub fn derive_label<S: AsRef<str>>(
    lines: &[S],
    index: usize,
    id: &str,
    counters: &mut Counters,
) -> String {
    let start = index + LABEL_WINDOW_START;
    for j in start..start + LABEL_WINDOW_LEN {
        let Some(line) = lines.get(j).map(|l| l.as_ref()) else {
            break;
        };

        if is_underline(line) {
            return lines[j - 1].as_ref().trim().to_string();
        }

        if let Some(captures) = ITEM_REGEX.captures(line) {
            return captures[1].to_string();
        }

        if let Some(captures) = NAME_REGEX.captures(line) {
            if let Some(name) = captures.get(1) {
                return name.as_str().trim().to_string();
            }
            if let Some(kind) = BlockKind::from_directive_line(lines[j - 1].as_ref()) {
                return format!("{} {}", kind, counters.take(kind));
            }
        }
    }
    id.to_string()
}

/// A line made of one punctuation character repeated, as under a title
pub fn is_underline(line: &str) -> bool {
    let mut chars = line.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !first.is_ascii_punctuation() {
        return false;
    }
    let mut count = 1;
    for c in chars {
        if c != first {
            return false;
        }
        count += 1;
    }
    count >= 2
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(str::to_string).collect()
    }

    fn first_target(text: &str) -> (String, String) {
        let mut counters = Counters::new();
        let target = find_targets(&lines(text), &mut counters)
            .into_iter()
            .next()
            .unwrap();
        (target.id, target.label)
    }

    #[test]
    fn test_definition_item_label() {
        let text = "\n.. _`id`:\n\n:idname: **key words** and some more text.\nAnd some more text.\n";
        assert_eq!(first_target(text), ("id".into(), "idname".into()));
    }

    #[test]
    fn test_definition_item_without_text() {
        let text = "\n.. _`id`:\n\n:idname:\n\n**key words** and some more text.\n";
        assert_eq!(first_target(text), ("id".into(), "idname".into()));
    }

    #[test]
    fn test_heading_label() {
        let text = "\n.. _`sy7`:\n\nA Requirement Group\n-------------------\nss";
        assert_eq!(first_target(text), ("sy7".into(), "A Requirement Group".into()));
    }

    #[test]
    fn test_figure_label() {
        let text = "\n.. _`dz3`:\n\n.. figure:: _images/exampletikz.png\n  :name:";
        assert_eq!(first_target(text), ("dz3".into(), "Figure 1".into()));
    }

    #[test]
    fn test_table_labels() {
        let table = "\n.. _`dua`:\n\n|dua|: Table legend\n\n.. table::\n  :name:";
        assert_eq!(first_target(table), ("dua".into(), "Table 1".into()));

        let list_table = "\n.. _`dta`:\n\n|dta|: Table legend\n\n.. list-table::\n  :name:";
        assert_eq!(first_target(list_table), ("dta".into(), "Table 1".into()));
    }

    #[test]
    fn test_code_labels() {
        let block = "\n.. _`dyi`:\n\n|dyi|: Listing.\n\n.. code-block:: cpp\n   :name:";
        assert_eq!(first_target(block), ("dyi".into(), "Code 1".into()));

        let code = "\n.. _`dyi`:\n\n|dyi|: Listing.\n\n.. code:: cpp\n   :name:";
        assert_eq!(first_target(code), ("dyi".into(), "Code 1".into()));
    }

    #[test]
    fn test_math_label() {
        let text = "\n.. _`d9x`:\n\n.. math:: \n   :name:\n";
        assert_eq!(first_target(text), ("d9x".into(), "Math 1".into()));
    }

    #[test]
    fn test_explicit_name_wins_over_counter() {
        let text = ".. _`fig`:\n\n.. figure:: a.png\n   :name: Overview diagram \n";
        let mut counters = Counters::new();
        let targets = find_targets(&lines(text), &mut counters);
        assert_eq!(targets[0].label, "Overview diagram");
        assert_eq!(counters.peek(BlockKind::Figure), 1);
    }

    #[test]
    fn test_figures_are_numbered_within_a_group() {
        let text = ".. _`f1`:\n\n.. figure:: a.png\n   :name:\n\n\
                    .. _`t1`:\n\n.. table::\n   :name:\n\n\
                    .. _`f2`:\n\n.. figure:: b.png\n   :name:\n";
        let mut counters = Counters::new();
        let labels: Vec<String> = find_targets(&lines(text), &mut counters)
            .into_iter()
            .map(|t| t.label)
            .collect();
        assert_eq!(labels, vec!["Figure 1", "Table 1", "Figure 2"]);

        // a later document of the same group continues the numbering
        let more = find_targets(
            &lines(".. _`f3`:\n\n.. figure:: c.png\n   :name:\n"),
            &mut counters,
        );
        assert_eq!(more[0].label, "Figure 3");
    }

    #[test]
    fn test_anchor_without_following_content() {
        let text = "text\n.. _`lonely`:\n";
        assert_eq!(first_target(text), ("lonely".into(), "lonely".into()));
    }

    #[test]
    fn test_window_is_six_lines() {
        let mut text = String::from(".. _`far`:\n");
        for _ in 0..7 {
            text.push_str("plain text\n");
        }
        text.push_str("Title\n=====\n");
        assert_eq!(first_target(&text), ("far".into(), "far".into()));

        let near = ".. _`near`:\n\nplain\nplain\nplain\nplain\nTitle\n=====\n";
        assert_eq!(first_target(near), ("near".into(), "Title".into()));
    }

    #[test]
    fn test_empty_name_under_unknown_directive_keeps_looking() {
        let text = ".. _`x`:\n\n.. image:: a.png\n   :name:\nSection\n-------\n";
        assert_eq!(first_target(text), ("x".into(), "Section".into()));
    }

    #[test]
    fn test_anchor_forms() {
        assert_eq!(target_id(".. _`dcx`:"), Some("dcx".to_string()));
        assert_eq!(target_id(".. _plain:"), Some("plain".to_string()));
        assert_eq!(target_id(".. _`_t11`:  "), Some("_t11".to_string()));
        assert_eq!(target_id("  .. _`indented`:"), None);
        assert_eq!(target_id(".. .. _`commented`:"), None);
        assert_eq!(target_id(".. _`x`: http://example.com"), None);
    }

    #[test]
    fn test_anchor_trailing_decoration_is_dropped() {
        assert_eq!(target_id(".. _`x.`:"), Some("x".to_string()));
        assert_eq!(target_id(".. _x_:"), Some("x".to_string()));
        assert_eq!(target_id(".. _`spaced .`:"), Some("spaced".to_string()));
        assert_eq!(first_target(".. _`x.`:\n\nT\n==\n"), ("x".into(), "T".into()));
    }

    #[test]
    fn test_find_links() {
        let text = lines("|xx| A `|lnk|` here |gos11|\n  | |xeps1| | |xeps|  |\n     |dd_figure|: Caption here.");
        let found: Vec<(usize, String)> = find_links(&text)
            .into_iter()
            .map(|l| (l.line, l.id))
            .collect();
        assert_eq!(
            found,
            vec![
                (0, "xx".to_string()),
                (0, "lnk".to_string()),
                (0, "gos11".to_string()),
                (1, "xeps1".to_string()),
                (1, "xeps".to_string()),
                (2, "dd_figure".to_string()),
            ]
        );
    }

    #[test]
    fn test_is_underline() {
        assert!(is_underline("====="));
        assert!(is_underline("^^"));
        assert!(!is_underline("-"));
        assert!(!is_underline("=-=-"));
        assert!(!is_underline("aaaa"));
        assert!(!is_underline("===== "));
        assert!(!is_underline(""));
    }

    #[test]
    fn test_label_is_deterministic_with_fresh_counters() {
        let text = lines(".. _`f`:\n\n.. figure:: a.png\n   :name:\n");
        let first = derive_label(&text, 0, "f", &mut Counters::new());
        let second = derive_label(&text, 0, "f", &mut Counters::new());
        assert_eq!(first, second);
    }

    proptest! {
        #[test]
        fn prop_find_links_is_total_and_ordered(
            rows in proptest::collection::vec(
                proptest::collection::vec("[a-z][a-z0-9_]{0,6}", 0..4),
                0..6,
            )
        ) {
            let text: Vec<String> = rows
                .iter()
                .map(|ids| ids.iter().map(|id| format!("see |{}| and", id)).collect::<Vec<_>>().join(" "))
                .collect();
            let expected: Vec<(usize, String)> = rows
                .iter()
                .enumerate()
                .flat_map(|(line, ids)| ids.iter().map(move |id| (line, id.clone())))
                .collect();
            let found: Vec<(usize, String)> = find_links(&text)
                .into_iter()
                .map(|l| (l.line, l.id))
                .collect();
            prop_assert_eq!(found, expected);
        }

        #[test]
        fn prop_counters_count_each_kind_independently(kinds in proptest::collection::vec(0usize..4, 0..40)) {
            let all = [BlockKind::Figure, BlockKind::Math, BlockKind::Table, BlockKind::Code];
            let mut counters = Counters::new();
            let mut seen: HashMap<BlockKind, usize> = HashMap::new();
            for k in kinds {
                let kind = all[k];
                let expected = seen.entry(kind).or_insert(0);
                *expected += 1;
                prop_assert_eq!(counters.take(kind), *expected);
            }
        }
    }
}
