use std::collections::HashSet;

use docrag_core::types::{Context, ScoredEntry};

/// Merge ranked hits into one block of evidence with citation labels.
///
/// Texts keep rank order and are separated by a blank line. Each distinct
/// `(source, sequence_index)` is cited once, at its first (best-ranked) position.
pub fn assemble(results: &[ScoredEntry]) -> Context {
    let text = results.iter().map(|r| r.entry.text.as_str()).collect::<Vec<_>>().join("\n\n");

    let mut seen = HashSet::new();
    let sources = results
        .iter()
        .map(|r| &r.entry.metadata)
        .filter(|m| seen.insert((m.source.as_str(), m.sequence_index)))
        .map(|m| m.label())
        .collect();

    Context { text, sources }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docrag_core::types::{ChunkMetadata, IndexEntry};

    fn hit(id: &str, source: &str, seq: usize, text: &str, score: f32) -> ScoredEntry {
        ScoredEntry {
            entry: IndexEntry {
                id: id.into(),
                embedding: vec![],
                metadata: ChunkMetadata { source: source.into(), sequence_index: seq },
                text: text.into(),
            },
            score,
        }
    }

    #[test]
    fn empty_results_give_empty_context() {
        let ctx = assemble(&[]);
        assert_eq!(ctx, Context { text: String::new(), sources: vec![] });
        assert!(ctx.is_empty());
    }

    #[test]
    fn duplicate_citations_collapse_to_first_position() {
        let ctx = assemble(&[
            hit("a", "src1", 0, "chunk A", 0.9),
            hit("b", "src1", 0, "chunk B", 0.8),
            hit("c", "src2", 1, "chunk C", 0.7),
        ]);
        assert_eq!(ctx.sources, vec!["src1 (chunk 0)", "src2 (chunk 1)"]);
        assert_eq!(ctx.text, "chunk A\n\nchunk B\n\nchunk C");
    }

    #[test]
    fn rank_order_wins_over_document_order() {
        let ctx = assemble(&[hit("x", "doc.txt", 3, "later part", 0.9), hit("y", "doc.txt", 1, "earlier part", 0.5)]);
        assert_eq!(ctx.text, "later part\n\nearlier part");
        assert_eq!(ctx.sources, vec!["doc.txt (chunk 3)", "doc.txt (chunk 1)"]);
    }
}
