//! Edit list applied over the original source text.
//!
//! Every rewrite is recorded as a `(start, end, replacement)` triple against the
//! original byte offsets, the same way the renamer passes collect their
//! replacements. Nothing outside a recorded range is ever re-printed, so
//! untouched regions come out byte-for-byte identical.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Placement {
    /// Emitted ahead of any other edit at the same offset.
    Hoisted,
    Inline,
}

#[derive(Debug, Clone)]
struct Edit {
    start: u32,
    end: u32,
    text: String,
    placement: Placement,
}

#[derive(Debug, Clone)]
pub struct EditBuffer<'s> {
    source: &'s str,
    edits: Vec<Edit>,
}

impl<'s> EditBuffer<'s> {
    pub fn new(source: &'s str) -> Self {
        EditBuffer {
            source,
            edits: Vec::new(),
        }
    }

    pub fn source(&self) -> &'s str {
        self.source
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    pub fn len(&self) -> usize {
        self.edits.len()
    }

    /// Replace `start..end` with `text`.
    pub fn overwrite(&mut self, start: u32, end: u32, text: impl Into<String>) {
        self.push(start, end, text.into(), Placement::Inline);
    }

    /// Drop `start..end`, keeping its line breaks so later lines do not move.
    pub fn remove(&mut self, start: u32, end: u32) {
        let removed = &self.source[start as usize..end as usize];
        let breaks: String = removed
            .chars()
            .filter(|c| *c == '\n' || *c == '\r')
            .collect();
        self.push(start, end, breaks, Placement::Inline);
    }

    /// Insert `text` at `pos`. Insertions at the same offset keep their call order.
    pub fn insert(&mut self, pos: u32, text: impl Into<String>) {
        self.push(pos, pos, text.into(), Placement::Inline);
    }

    /// Insert `text` at `pos`, ahead of every other edit recorded at `pos`.
    pub fn prepend(&mut self, pos: u32, text: impl Into<String>) {
        self.push(pos, pos, text.into(), Placement::Hoisted);
    }

    fn push(&mut self, start: u32, end: u32, text: String, placement: Placement) {
        debug_assert!(start <= end && end as usize <= self.source.len());
        self.edits.push(Edit {
            start,
            end,
            text,
            placement,
        });
    }
}

impl fmt::Display for EditBuffer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ordered: Vec<&Edit> = self.edits.iter().collect();
        // Stable: equal keys keep recording order.
        ordered.sort_by_key(|edit| (edit.start, edit.end, edit.placement));

        let mut cursor = 0usize;
        for edit in ordered {
            let start = edit.start as usize;
            if start < cursor {
                tracing::warn!(
                    start = edit.start,
                    end = edit.end,
                    "dropping edit that overlaps an earlier edit"
                );
                continue;
            }
            f.write_str(&self.source[cursor..start])?;
            f.write_str(&edit.text)?;
            cursor = edit.end as usize;
        }
        f.write_str(&self.source[cursor..])
    }
}

#[cfg(test)]
mod tests {
    use super::EditBuffer;

    #[test]
    fn test_untouched_source_round_trips() {
        let buffer = EditBuffer::new("let a = 1;\n");
        assert!(buffer.is_empty());
        assert_eq!(buffer.to_string(), "let a = 1;\n");
    }

    #[test]
    fn test_overwrite_and_insert() {
        let mut buffer = EditBuffer::new("export default a + b;");
        buffer.overwrite(0, 15, "m.exportDefault(");
        buffer.insert(20, ")");
        assert_eq!(buffer.to_string(), "m.exportDefault(a + b);");
    }

    #[test]
    fn test_remove_keeps_line_breaks() {
        let mut buffer = EditBuffer::new("import {\n  a\n} from 'a';\nfoo();");
        buffer.remove(0, 24);
        assert_eq!(buffer.to_string(), "\n\n\nfoo();");
    }

    #[test]
    fn test_prepend_wins_over_other_edits_at_same_offset() {
        let mut buffer = EditBuffer::new("x++;");
        buffer.insert(0, "m.runSetters(");
        buffer.insert(3, ")");
        buffer.prepend(0, "m.export({x:()=>x});");
        assert_eq!(buffer.to_string(), "m.export({x:()=>x});m.runSetters(x++);");
    }

    #[test]
    fn test_insertion_precedes_overwrite_starting_at_same_offset() {
        let mut buffer = EditBuffer::new("abc");
        buffer.overwrite(0, 1, "A");
        buffer.insert(0, "<");
        assert_eq!(buffer.to_string(), "<Abc");
    }

    #[test]
    fn test_overlapping_edit_is_dropped() {
        let mut buffer = EditBuffer::new("abcdef");
        buffer.overwrite(0, 4, "X");
        buffer.overwrite(2, 5, "Y");
        assert_eq!(buffer.to_string(), "Xef");
    }
}
