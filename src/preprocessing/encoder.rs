//! One-hot encoding against a fixed vocabulary

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Sorted set of categories observed during fit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OneHotVocabulary {
    categories: Vec<String>,
}

impl OneHotVocabulary {
    /// Build the vocabulary from observed (already imputed) values
    pub fn fit<'a, I>(values: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let set: BTreeSet<&str> = values.into_iter().collect();
        Self {
            categories: set.into_iter().map(str::to_string).collect(),
        }
    }

    /// Number of indicator columns
    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// Position of a category, `None` if it was never seen during fit
    pub fn index_of(&self, value: &str) -> Option<usize> {
        self.categories
            .binary_search_by(|c| c.as_str().cmp(value))
            .ok()
    }

    /// Write the indicator block for `value` into `out`.
    /// Unseen categories leave the block all zeros.
    pub fn encode_into(&self, value: &str, out: &mut [f64]) {
        debug_assert_eq!(out.len(), self.categories.len());
        out.iter_mut().for_each(|v| *v = 0.0);
        if let Some(idx) = self.index_of(value) {
            out[idx] = 1.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vocabulary_sorted_and_deduped() {
        let vocab = OneHotVocabulary::fit(["standard", "free/reduced", "standard"]);
        assert_eq!(vocab.categories(), &["free/reduced".to_string(), "standard".to_string()]);
        assert_eq!(vocab.index_of("standard"), Some(1));
    }

    #[test]
    fn test_unseen_is_all_zero() {
        let vocab = OneHotVocabulary::fit(["a", "b", "c"]);
        let mut block = [9.0; 3];
        vocab.encode_into("zzz", &mut block);
        assert_eq!(block, [0.0, 0.0, 0.0]);

        vocab.encode_into("b", &mut block);
        assert_eq!(block, [0.0, 1.0, 0.0]);
    }
}
