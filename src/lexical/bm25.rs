use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Okapi BM25 free parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Bm25Params {
    pub k1: f64,
    pub b: f64,
    /// Negative IDFs (terms present in more than half the chunks) are
    /// replaced by `epsilon * average_idf`.
    pub epsilon: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self {
            k1: 1.5,
            b: 0.75,
            epsilon: 0.25,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoredChunk {
    pub chunk_index: usize,
    pub score: f64,
}

/// Immutable BM25 index over one collection's chunks.
///
/// Term statistics are computed once from the complete token lists passed to
/// [`Bm25Index::build`]; there is no way to add or remove chunks afterwards.
#[derive(Debug, Clone)]
pub struct Bm25Index {
    params: Bm25Params,
    term_freqs: Vec<HashMap<String, u32>>,
    doc_lens: Vec<usize>,
    avg_doc_len: f64,
    idf: HashMap<String, f64>,
}

impl Bm25Index {
    pub fn build<S: AsRef<str>>(token_lists: &[Vec<S>]) -> Self {
        Self::build_with_params(token_lists, Bm25Params::default())
    }

    pub fn build_with_params<S: AsRef<str>>(token_lists: &[Vec<S>], params: Bm25Params) -> Self {
        let mut term_freqs = Vec::with_capacity(token_lists.len());
        let mut doc_lens = Vec::with_capacity(token_lists.len());
        let mut doc_freq: HashMap<String, usize> = HashMap::new();

        for tokens in token_lists {
            let mut tf: HashMap<String, u32> = HashMap::new();
            for token in tokens {
                *tf.entry(token.as_ref().to_string()).or_insert(0) += 1;
            }
            for term in tf.keys() {
                *doc_freq.entry(term.clone()).or_insert(0) += 1;
            }
            doc_lens.push(tokens.len());
            term_freqs.push(tf);
        }

        let n = token_lists.len() as f64;
        let total_len: usize = doc_lens.iter().sum();
        let avg_doc_len = if token_lists.is_empty() {
            0.0
        } else {
            total_len as f64 / n
        };

        let mut idf: HashMap<String, f64> = HashMap::with_capacity(doc_freq.len());
        let mut idf_sum = 0.0;
        let mut negative = Vec::new();
        for (term, df) in doc_freq {
            let df = df as f64;
            let value = (n - df + 0.5).ln() - (df + 0.5).ln();
            idf_sum += value;
            if value < 0.0 {
                negative.push(term.clone());
            }
            idf.insert(term, value);
        }

        if !idf.is_empty() {
            let floor = params.epsilon * (idf_sum / idf.len() as f64);
            for term in negative {
                idf.insert(term, floor);
            }
        }

        Self {
            params,
            term_freqs,
            doc_lens,
            avg_doc_len,
            idf,
        }
    }

    /// Number of indexed chunks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.doc_lens.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.doc_lens.is_empty()
    }

    /// IDF of a term, or `None` if it occurs in no chunk.
    #[must_use]
    pub fn idf(&self, term: &str) -> Option<f64> {
        self.idf.get(term).copied()
    }

    /// Score every chunk against the query, in chunk order.
    ///
    /// Repeated query tokens contribute once per occurrence.
    pub fn score<S: AsRef<str>>(&self, query_tokens: &[S]) -> Vec<f64> {
        let Bm25Params { k1, b, .. } = self.params;
        let mut scores = vec![0.0; self.len()];

        for token in query_tokens {
            let Some(&idf) = self.idf.get(token.as_ref()) else {
                continue;
            };
            for (i, tf) in self.term_freqs.iter().enumerate() {
                let Some(&freq) = tf.get(token.as_ref()) else {
                    continue;
                };
                let freq = f64::from(freq);
                let len_ratio = if self.avg_doc_len > 0.0 {
                    self.doc_lens[i] as f64 / self.avg_doc_len
                } else {
                    0.0
                };
                scores[i] += idf * (freq * (k1 + 1.0)) / (freq + k1 * (1.0 - b + b * len_ratio));
            }
        }

        scores
    }

    /// The `k` best chunks by descending score; equal scores keep chunk order.
    pub fn top_k<S: AsRef<str>>(&self, query_tokens: &[S], k: usize) -> Vec<ScoredChunk> {
        let mut ranked: Vec<ScoredChunk> = self
            .score(query_tokens)
            .into_iter()
            .enumerate()
            .map(|(chunk_index, score)| ScoredChunk { chunk_index, score })
            .collect();

        // sort_by is stable, so ties stay in insertion order
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        ranked.truncate(k);
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Vec<Vec<&'static str>> {
        vec![
            vec!["preservação", "digital", "de", "acervos"],
            vec!["doença", "cardíaca", "e", "exercício"],
            vec!["repositórios", "digital", "e", "preservação", "preservação"],
            vec!["metadados", "de", "teses"],
            vec!["acervo", "histórico"],
        ]
    }

    #[test]
    fn test_score_returns_one_value_per_chunk() {
        let index = Bm25Index::build(&corpus());
        let scores = index.score(&["preservação"]);
        assert_eq!(scores.len(), 5);
        assert!(scores[2] > scores[0], "higher tf should score higher");
        assert!(scores[0] > 0.0);
        assert_eq!(scores[1], 0.0);
        assert_eq!(scores[3], 0.0);
    }

    #[test]
    fn test_known_idf_value() {
        let index = Bm25Index::build(&corpus());
        // N = 5, df("teses") = 1: ln(4.5) - ln(1.5)
        let expected = 4.5f64.ln() - 1.5f64.ln();
        assert!((index.idf("teses").unwrap() - expected).abs() < 1e-12);
        assert!(index.idf("inexistente").is_none());
    }

    #[test]
    fn test_negative_idf_is_floored_by_epsilon() {
        let docs = vec![
            vec!["a", "x"],
            vec!["a", "y"],
            vec!["a", "z"],
            vec!["b"],
            vec!["c"],
        ];
        let index = Bm25Index::build(&docs);
        let idf_a = index.idf("a").unwrap();
        assert!(idf_a > 0.0, "common term idf should be floored positive, got {idf_a}");
        assert!(idf_a < index.idf("x").unwrap());
    }

    #[test]
    fn test_b_controls_length_normalization() {
        let docs = vec![
            vec!["t", "a"],
            vec!["t", "t", "b", "c", "d", "e", "f", "g"],
            vec!["x"],
            vec!["y"],
            vec!["z"],
        ];
        let normalized = Bm25Index::build(&docs);
        assert_eq!(normalized.top_k(&["t"], 1)[0].chunk_index, 0);

        let raw_tf = Bm25Index::build_with_params(
            &docs,
            Bm25Params {
                b: 0.0,
                ..Bm25Params::default()
            },
        );
        assert_eq!(raw_tf.top_k(&["t"], 1)[0].chunk_index, 1);
    }

    #[test]
    fn test_empty_index() {
        let docs: Vec<Vec<String>> = Vec::new();
        let index = Bm25Index::build(&docs);
        assert!(index.is_empty());
        assert!(index.score(&["anything"]).is_empty());
        assert!(index.top_k(&["anything"], 10).is_empty());
    }

    #[test]
    fn test_top_k_sorted_and_truncated() {
        let index = Bm25Index::build(&corpus());
        let top = index.top_k(&["preservação", "digital"], 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].chunk_index, 2);
        assert_eq!(top[1].chunk_index, 0);
        assert!(top[0].score >= top[1].score);
    }

    #[test]
    fn test_top_k_larger_than_corpus_returns_all() {
        let index = Bm25Index::build(&corpus());
        assert_eq!(index.top_k(&["teses"], 100).len(), 5);
    }

    #[test]
    fn test_ties_broken_by_chunk_order() {
        let docs = vec![vec!["x"], vec!["y"], vec!["x"], vec!["z"], vec!["x"]];
        let index = Bm25Index::build(&docs);
        let top = index.top_k(&["nothing"], 5);
        assert_eq!(
            top.iter().map(|s| s.chunk_index).collect::<Vec<_>>(),
            vec![0, 1, 2, 3, 4]
        );

        let top = index.top_k(&["y", "z"], 5);
        assert_eq!(top[0].chunk_index, 1);
        assert_eq!(top[1].chunk_index, 3);
        assert_eq!(
            top[2..].iter().map(|s| s.chunk_index).collect::<Vec<_>>(),
            vec![0, 2, 4]
        );
    }

    #[test]
    fn test_top_k_is_deterministic() {
        let index = Bm25Index::build(&corpus());
        let q = ["de", "digital", "e"];
        let first = index.top_k(&q, 3);
        for _ in 0..10 {
            assert_eq!(index.top_k(&q, 3), first);
        }
        for pair in first.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn test_top_k_zero() {
        let index = Bm25Index::build(&corpus());
        assert!(index.top_k(&["digital"], 0).is_empty());
    }

    #[test]
    fn test_all_empty_chunks_do_not_produce_nan() {
        let docs: Vec<Vec<&str>> = vec![vec![], vec![]];
        let index = Bm25Index::build(&docs);
        let scores = index.score(&["a"]);
        assert!(scores.iter().all(|s| *s == 0.0));
    }
}
