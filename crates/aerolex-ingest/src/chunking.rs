//! Chunking of regulatory units under a token budget
//!
//! Units small enough pass through as a single chunk. Oversize units
//! are split on paragraph seams (blank lines), greedily packed up to
//! `max_tokens`, with a verbatim overlap window of the previous chunk's
//! last `overlap` tokens seeding each continuation chunk. A paragraph
//! that alone exceeds the budget falls back to sentence splitting; a
//! single oversized sentence is emitted whole, never truncated, since
//! a cut sentence corrupts legal citations.
//!
//! Token counts are whitespace-delimited word counts; the embedder's
//! tokenizer is not assumed available here.

use tracing::warn;

use aerolex_common::types::{token_estimate, Chunk, RegulatoryUnit};

/// Chunker configuration. Pure; holds no state between units.
#[derive(Debug, Clone)]
pub struct Chunker {
    max_tokens: usize,
    overlap: usize,
}

impl Chunker {
    /// `overlap` is clamped below `max_tokens`; a window as large as
    /// the budget would never make progress.
    pub fn new(max_tokens: usize, overlap: usize) -> Self {
        Self {
            max_tokens: max_tokens.max(1),
            overlap: overlap.min(max_tokens.saturating_sub(1)),
        }
    }

    /// Split one unit into chunks. Every chunk inherits the unit's
    /// context, dates and status; ids are deterministic in
    /// (document, unit path, index).
    pub fn chunk_unit(&self, unit: &RegulatoryUnit) -> Vec<Chunk> {
        let text = unit.text.trim_end();
        if token_estimate(text) <= self.max_tokens {
            return vec![Chunk::from_unit(unit, text.to_string(), 0)];
        }

        let segments = self.segments(text);
        let packed = self.pack(&segments);

        packed
            .into_iter()
            .enumerate()
            .map(|(index, piece)| {
                let mut chunk = Chunk::from_unit(unit, piece.text.trim_end().to_string(), index);
                if piece.oversized {
                    warn!(
                        regulation_id = %chunk.regulation_id,
                        tokens = chunk.token_estimate,
                        "Chunk carries a sentence larger than the token budget"
                    );
                    chunk
                        .metadata
                        .insert("oversized".into(), serde_json::Value::Bool(true));
                }
                chunk
            })
            .collect()
    }

    /// Paragraphs within budget stay whole; oversize paragraphs are
    /// broken into sentences.
    fn segments<'a>(&self, text: &'a str) -> Vec<&'a str> {
        let mut segments = Vec::new();
        for paragraph in text.split("\n\n") {
            let paragraph = paragraph.trim();
            if paragraph.is_empty() {
                continue;
            }
            if token_estimate(paragraph) <= self.max_tokens {
                segments.push(paragraph);
            } else {
                segments.extend(split_sentences(paragraph));
            }
        }
        segments
    }

    /// Greedy packing with an overlap seed on every continuation chunk.
    ///
    /// The seed counts against the budget: a chunk only exceeds
    /// `max_tokens` when a single segment does. When the segment
    /// opening a continuation chunk is large, the seed is shortened to
    /// whatever budget remains (it stays a suffix of the predecessor).
    fn pack(&self, segments: &[&str]) -> Vec<Packed> {
        let mut chunks: Vec<Packed> = Vec::new();
        let mut seed = String::new();
        let mut seed_tokens = 0usize;
        let mut fresh: Vec<&str> = Vec::new();
        let mut fresh_tokens = 0usize;
        let mut oversized = false;

        for segment in segments {
            let segment_tokens = token_estimate(segment);
            if fresh_tokens > 0
                && seed_tokens + fresh_tokens + segment_tokens > self.max_tokens
            {
                let text = compose(&seed, &fresh);
                let mut window = self.overlap;
                if segment_tokens <= self.max_tokens {
                    window = window.min(self.max_tokens - segment_tokens);
                }
                seed = last_tokens(&text, window);
                seed_tokens = token_estimate(&seed);
                chunks.push(Packed { text, oversized });

                fresh.clear();
                fresh_tokens = 0;
                oversized = false;
            }
            fresh.push(segment);
            fresh_tokens += segment_tokens;
            if segment_tokens > self.max_tokens {
                oversized = true;
            }
        }

        if fresh_tokens > 0 {
            chunks.push(Packed {
                text: compose(&seed, &fresh),
                oversized,
            });
        }

        chunks
    }
}

/// Join the overlap seed and the fresh segments into a chunk text.
fn compose(seed: &str, fresh: &[&str]) -> String {
    if seed.is_empty() {
        fresh.join("\n\n")
    } else {
        format!("{seed}\n\n{}", fresh.join("\n\n"))
    }
}

/// The last `n` whitespace tokens of `text`, verbatim, rejoined with
/// single spaces.
fn last_tokens(text: &str, n: usize) -> String {
    if n == 0 {
        return String::new();
    }
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let start = tokens.len().saturating_sub(n);
    tokens[start..].join(" ")
}

struct Packed {
    text: String,
    oversized: bool,
}

/// Split a paragraph into sentences. Boundaries are runs of `.`, `!`,
/// `?` followed by whitespace (or end of text), and newlines followed
/// by an uppercase letter.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut sentences = Vec::new();
    let mut start = 0usize;
    let mut i = 0usize;

    while i < chars.len() {
        let (_, ch) = chars[i];
        if matches!(ch, '.' | '!' | '?') {
            let mut j = i + 1;
            while j < chars.len() && matches!(chars[j].1, '.' | '!' | '?') {
                j += 1;
            }
            let at_end = j >= chars.len();
            if at_end || chars[j].1.is_whitespace() {
                let end = if at_end { text.len() } else { chars[j].0 };
                push_trimmed(text, start, end, &mut sentences);
                let mut k = j;
                while k < chars.len() && chars[k].1.is_whitespace() {
                    k += 1;
                }
                start = if k < chars.len() { chars[k].0 } else { text.len() };
                i = k;
                continue;
            }
            i = j;
            continue;
        }
        if ch == '\n' {
            let mut j = i + 1;
            while j < chars.len() && matches!(chars[j].1, ' ' | '\t') {
                j += 1;
            }
            if j < chars.len() && chars[j].1.is_uppercase() {
                push_trimmed(text, start, chars[i].0, &mut sentences);
                start = chars[j].0;
                i = j;
                continue;
            }
        }
        i += 1;
    }

    if start < text.len() {
        push_trimmed(text, start, text.len(), &mut sentences);
    }

    sentences
}

fn push_trimmed<'a>(text: &'a str, from: usize, to: usize, out: &mut Vec<&'a str>) {
    let slice = text[from..to].trim();
    if !slice.is_empty() {
        out.push(slice);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use aerolex_common::types::{DocumentMeta, TemporalInfo};
    use proptest::prelude::*;

    fn unit_with_text(text: &str) -> RegulatoryUnit {
        RegulatoryUnit {
            regulation_id: "ICA 100-12-sec-2.1".to_string(),
            label: "2.1 FINALIDADE".to_string(),
            title: "FINALIDADE".to_string(),
            context: vec!["2 DISPOSIÇÕES".to_string()],
            text: text.to_string(),
            temporal: TemporalInfo::default(),
            document: DocumentMeta {
                number: "ICA 100-12".to_string(),
                source: "ica.pdf".to_string(),
                ..DocumentMeta::default()
            },
        }
    }

    fn tokens(text: &str) -> Vec<&str> {
        text.split_whitespace().collect()
    }

    /// `count` tokens arranged in sentences of `sentence_len` tokens,
    /// three sentences per paragraph.
    fn synthetic_body(count: usize, sentence_len: usize) -> String {
        let mut out = String::new();
        for i in 0..count {
            out.push_str(&format!("tok{i}"));
            let boundary = (i + 1) % sentence_len == 0;
            if boundary {
                out.push('.');
                if (i + 1) % (sentence_len * 3) == 0 {
                    out.push_str("\n\n");
                } else {
                    out.push(' ');
                }
            } else {
                out.push(' ');
            }
        }
        out
    }

    #[test]
    fn test_small_unit_single_chunk() {
        let unit = unit_with_text("2.1 FINALIDADE\n\nEsta instrução tem por finalidade.");
        let chunks = Chunker::new(512, 50).chunk_unit(&unit);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, unit.text);
        assert_eq!(chunks[0].regulation_id, "ICA 100-12-sec-2.1-chunk-0");
        assert_eq!(
            chunks[0].context,
            vec!["2 DISPOSIÇÕES", "2.1 FINALIDADE"]
        );
    }

    #[test]
    fn test_large_section_produces_overlapping_chunks() {
        // An ICA section of 1,800 whitespace tokens, budget 512, overlap 50.
        let body = synthetic_body(1800, 60);
        let unit = unit_with_text(&format!("2.1 FINALIDADE\n\n{body}"));
        let chunker = Chunker::new(512, 50);
        let chunks = chunker.chunk_unit(&unit);

        assert!(chunks.len() >= 4, "got {} chunks", chunks.len());
        for pair in chunks.windows(2) {
            let prev = tokens(&pair[0].text);
            let next = tokens(&pair[1].text);
            assert_eq!(&next[..50], &prev[prev.len() - 50..]);
        }
        for chunk in &chunks {
            assert_eq!(chunk.context, vec!["2 DISPOSIÇÕES", "2.1 FINALIDADE"]);
            assert!(chunk.token_estimate <= 512);
        }
    }

    #[test]
    fn test_chunk_indices_and_ids() {
        let body = synthetic_body(1200, 40);
        let unit = unit_with_text(&format!("2.1 FINALIDADE\n\n{body}"));
        let chunks = Chunker::new(256, 20).chunk_unit(&unit);

        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index, i);
            assert_eq!(chunk.regulation_id, format!("ICA 100-12-sec-2.1-chunk-{i}"));
        }
        // Re-running yields the same ids.
        let again = Chunker::new(256, 20).chunk_unit(&unit);
        let ids: Vec<_> = chunks.iter().map(|c| c.id).collect();
        let ids_again: Vec<_> = again.iter().map(|c| c.id).collect();
        assert_eq!(ids, ids_again);
    }

    #[test]
    fn test_oversized_sentence_is_never_truncated() {
        let giant: String = (0..100).map(|i| format!("palavra{i} ")).collect();
        let text = format!("Cabeçalho.\n\n{giant}\n\nFinal curto.");
        let unit = unit_with_text(&text);
        let chunks = Chunker::new(20, 5).chunk_unit(&unit);

        let oversized: Vec<_> = chunks
            .iter()
            .filter(|c| c.metadata.get("oversized") == Some(&serde_json::Value::Bool(true)))
            .collect();
        assert_eq!(oversized.len(), 1);
        assert!(oversized[0].token_estimate >= 100);
        // All hundred words survive in one chunk.
        assert!(oversized[0].text.contains("palavra0"));
        assert!(oversized[0].text.contains("palavra99"));
    }

    #[test]
    fn test_split_sentences_terminators() {
        let sentences = split_sentences("Primeira frase. Segunda frase! Terceira? Quarta");
        assert_eq!(
            sentences,
            vec!["Primeira frase.", "Segunda frase!", "Terceira?", "Quarta"]
        );
    }

    #[test]
    fn test_split_sentences_newline_uppercase() {
        let sentences = split_sentences("primeira linha\nSegunda linha\ncontinuação");
        assert_eq!(sentences, vec!["primeira linha", "Segunda linha\ncontinuação"]);
    }

    #[test]
    fn test_split_sentences_abbreviation_like_runs() {
        // An ellipsis is one boundary, not three.
        let sentences = split_sentences("Espera... Fim.");
        assert_eq!(sentences, vec!["Espera...", "Fim."]);
    }

    #[test]
    fn test_last_tokens_shorter_text() {
        assert_eq!(last_tokens("um dois três", 50), "um dois três");
        assert_eq!(last_tokens("um dois três", 2), "dois três");
        assert_eq!(last_tokens("um dois três", 0), "");
    }

    /// Strip each chunk's overlap seed by longest-suffix matching
    /// against its predecessor. Synthetic token streams are
    /// duplicate-free, so the match is unambiguous.
    fn strip_overlap<'a>(chunks: &'a [Chunk], overlap: usize) -> Vec<&'a str> {
        let mut all: Vec<&str> = Vec::new();
        let mut prev: Vec<&str> = Vec::new();
        for (i, chunk) in chunks.iter().enumerate() {
            let toks = tokens(&chunk.text);
            let mut skip = 0;
            if i > 0 {
                let max_k = overlap.min(prev.len()).min(toks.len());
                for k in (1..=max_k).rev() {
                    if toks[..k] == prev[prev.len() - k..] {
                        skip = k;
                        break;
                    }
                }
            }
            all.extend(toks[skip..].iter().copied());
            prev = toks;
        }
        all
    }

    proptest! {
        /// Concatenating chunk texts, stripped of the repeated overlap
        /// windows, reproduces the unit text modulo whitespace.
        #[test]
        fn prop_chunks_reconstruct_unit(
            n_tokens in 1usize..600,
            sentence_len in 3usize..20,
            max_tokens in 24usize..120,
            overlap in 0usize..20,
        ) {
            let body = synthetic_body(n_tokens, sentence_len);
            let unit = unit_with_text(&format!("2.1 FINALIDADE\n\n{body}"));
            let chunks = Chunker::new(max_tokens, overlap).chunk_unit(&unit);

            prop_assert!(!chunks.is_empty());
            let reconstructed = strip_overlap(&chunks, overlap.min(max_tokens.saturating_sub(1)));
            let original = tokens(&unit.text);
            prop_assert_eq!(reconstructed, original);
        }

        /// Chunks without an oversized sentence respect the budget
        /// strictly. (Sentence lengths here never exceed the budget,
        /// so no chunk may overshoot at all.)
        #[test]
        fn prop_chunk_budget_bounded(
            n_tokens in 1usize..600,
            sentence_len in 3usize..20,
            max_tokens in 24usize..120,
            overlap in 0usize..20,
        ) {
            let body = synthetic_body(n_tokens, sentence_len);
            let unit = unit_with_text(&format!("2.1 FINALIDADE\n\n{body}"));
            let chunks = Chunker::new(max_tokens, overlap).chunk_unit(&unit);

            for chunk in &chunks {
                prop_assert!(chunk.token_estimate <= max_tokens);
            }
        }

        /// Dates are inherited untouched.
        #[test]
        fn prop_dates_ordered(n_tokens in 1usize..300) {
            let body = synthetic_body(n_tokens, 7);
            let unit = unit_with_text(&body);
            for chunk in Chunker::new(64, 10).chunk_unit(&unit) {
                prop_assert!(chunk.dates_ordered());
            }
        }
    }
}
