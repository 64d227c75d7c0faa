//! Line partition validation
//!
//! Validation criteria:
//! 1. Consistency: random inserts and removals on a multi-line document keep text, line ranges
//!    and `line_at` identical to a `ropey::Rope` reference.
//! 2. Partition: line lengths sum to the document length and adjacent lines share boundaries,
//!    also checked as a `proptest` property over arbitrary edit sequences.

mod common;

use common::ParityScanner;
use editor_buffer::{Document, Element};
use proptest::prelude::*;
use rand::Rng;
use ropey::Rope;

fn generate_text(lines: usize) -> String {
    let sample = ["fn main() {", "    let x = 1;", "", "    // 你好 👋", "}"];
    (0..lines)
        .map(|i| sample[i % sample.len()])
        .collect::<Vec<_>>()
        .join("\n")
}

fn assert_partition(doc: &Document<ParityScanner>) {
    let count = doc.line_count();
    let mut expected_start = 0;
    for i in 0..count {
        let (start, end) = doc.line_range(i).unwrap();
        assert_eq!(start, expected_start, "line {i} does not start where line {} ends", i.wrapping_sub(1));
        assert!(start < end || i == count - 1, "line {i} is empty but not last");
        expected_start = end;
    }
    assert_eq!(expected_start, doc.len());
}

fn assert_matches_rope(doc: &Document<ParityScanner>, rope: &Rope) {
    assert_eq!(doc.text(), rope.to_string());
    assert_eq!(doc.line_count(), rope.len_lines());
    for i in 0..rope.len_lines() {
        assert_eq!(doc.line_text(i), Some(rope.line(i).to_string()), "line {i}");
    }
}

#[test]
fn test_consistency_with_rope() {
    let size = 200;
    let operation_count = 400;

    let original = generate_text(size);
    let doc = Document::new(&original, ParityScanner::default());
    let mut reference = Rope::from_str(&original);
    let mut rng = rand::thread_rng();

    for i in 0..operation_count {
        let len = doc.len();
        if rng.gen_bool(0.55) || len < 20 {
            let text = match rng.gen_range(0..5) {
                0 => "X",
                1 => "你好",
                2 => "\n",
                3 => "\n\n",
                _ => "test\nline",
            };
            let offset = match rng.gen_range(0..4) {
                0 => 0,
                1 => len,
                2 => len / 2,
                _ => rng.gen_range(0..=len),
            };
            doc.insert(offset, text).unwrap();
            reference.insert(offset, text);
        } else {
            let offset = rng.gen_range(0..len - 10);
            let remove_len = rng.gen_range(1..=10);
            let removed = doc.remove(offset, remove_len).unwrap();
            assert_eq!(removed, reference.slice(offset..offset + remove_len).to_string());
            reference.remove(offset..offset + remove_len);
        }

        assert_partition(&doc);
        if i % 25 == 0 {
            assert_matches_rope(&doc, &reference);
            for _ in 0..20 {
                let offset = rng.gen_range(0..=doc.len());
                assert_eq!(doc.line_at(offset).unwrap(), reference.char_to_line(offset));
            }
        }
    }

    assert_matches_rope(&doc, &reference);
}

/// Lines of `text` the way the document splits them: each keeps its newline, and a trailing
/// newline (or an empty text) leaves an empty last line.
fn model_lines(text: &str) -> Vec<String> {
    let mut lines: Vec<String> = text.split_inclusive('\n').map(str::to_string).collect();
    if text.is_empty() || text.ends_with('\n') {
        lines.push(String::new());
    }
    lines
}

proptest! {
    #[test]
    fn prop_lines_partition_the_document(
        initial in "[ab\n]{0,30}",
        ops in prop::collection::vec((any::<bool>(), 0.0..=1.0f64, "[xy\n]{1,4}", 1usize..6), 1..30),
    ) {
        let doc = Document::new(&initial, ParityScanner::default());
        let mut model = initial.clone();

        for (insert, at, text, len) in ops {
            let pos = ((doc.len() as f64) * at).floor() as usize;
            if insert {
                doc.insert(pos, &text).unwrap();
                let byte = model.char_indices().nth(pos).map_or(model.len(), |(b, _)| b);
                model.insert_str(byte, &text);
            } else {
                let len = len.min(doc.len() - pos);
                doc.remove(pos, len).unwrap();
                model = model.chars().take(pos).chain(model.chars().skip(pos + len)).collect();
            }

            let expected = model_lines(&model);
            prop_assert_eq!(doc.line_count(), expected.len());
            let mut start = 0;
            for (i, line) in expected.iter().enumerate() {
                let end = start + line.chars().count();
                prop_assert_eq!(doc.line_range(i), Some((start, end)));
                start = end;
            }
            prop_assert_eq!(start, doc.len());
        }
        prop_assert_eq!(doc.text(), model);
    }
}

#[test]
fn test_scenario_split_line() {
    let doc = Document::new("ab\ncd\nef", ParityScanner::default());
    doc.insert(1, "\n").unwrap();
    let lines: Vec<String> = (0..doc.line_count()).filter_map(|i| doc.line_text(i)).collect();
    assert_eq!(lines, ["a\n", "b\n", "cd\n", "ef"]);
}

#[test]
fn test_empty_document_and_trailing_newline() {
    let doc = Document::new("", ParityScanner::default());
    assert_eq!(doc.line_count(), 1);
    assert_eq!(doc.line_range(0), Some((0, 0)));
    assert_eq!(doc.line_at(0), Ok(0));

    doc.insert(0, "x\n").unwrap();
    assert_eq!(doc.line_count(), 2);
    assert_eq!(doc.line_range(1), Some((2, 2)));
    assert_eq!(doc.line_at(2), Ok(1));

    doc.remove(1, 1).unwrap();
    assert_eq!(doc.line_count(), 1);
    assert_partition(&doc);
}

#[test]
fn test_attributes_follow_their_line() {
    let doc = Document::new("one\ntwo\nthree", ParityScanner::default());
    assert!(doc.set_line_attribute(1, "breakpoint", "true"));

    doc.insert(0, "zero\n").unwrap();
    assert!(doc.line_attributes(1).is_none());
    let attrs = doc.line_attributes(2).unwrap();
    assert_eq!(attrs.get("breakpoint").map(String::as_str), Some("true"));

    // Merging line 2 into line 1 keeps the attribute on the surviving line.
    let (start, _) = doc.line_range(2).unwrap();
    doc.remove(start - 1, 1).unwrap();
    assert_eq!(doc.line_text(1).as_deref(), Some("onetwo\n"));
    assert!(doc.line_attributes(1).is_some());
}

#[test]
fn test_element_tree_walk() {
    let doc = Document::new("a\nbb\nccc", ParityScanner::default());
    doc.with(|store, lines| {
        let root = lines.root(store);
        assert!(!root.is_leaf());
        let spans: Vec<(usize, usize)> = (0..root.element_count())
            .filter_map(|i| root.element(i))
            .map(|e| (e.start_offset(), e.end_offset()))
            .collect();
        assert_eq!(spans, [(0, 2), (2, 5), (5, 8)]);

        let idx = root.element_index(3).unwrap();
        let Some(Element::Line(line)) = root.element(idx) else {
            panic!("line element expected");
        };
        assert_eq!(line.index(), 1);
        assert_eq!(store.offset_of(line.start_mark()), Ok(2));
        assert_eq!(store.offset_of(line.end_mark()), Ok(5));
    });
}
