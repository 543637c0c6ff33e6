//! Word pairs for the Imposter mode.
//!
//! Every crewmate sees `word`; the imposter only gets `hint`, a related but
//! different word.

use anyhow::{Context, Result};
use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordPair {
    pub word: String,
    pub hint: String,
}

impl WordPair {
    pub fn new(word: impl Into<String>, hint: impl Into<String>) -> Self {
        Self {
            word: word.into(),
            hint: hint.into(),
        }
    }
}

const BUILTIN_PAIRS: &[(&str, &str)] = &[
    ("apple", "pear"),
    ("train", "bus"),
    ("car", "bicycle"),
    ("kitchen", "living room"),
    ("book", "magazine"),
    ("airport", "station"),
    ("beach", "lake"),
    ("lamp", "candle"),
    ("watch", "alarm clock"),
    ("window", "door"),
    ("dog", "cat"),
    ("garden", "park"),
    ("school", "university"),
    ("glasses", "contact lens"),
    ("coffee", "tea"),
    ("bridge", "tunnel"),
    ("chocolate", "candy"),
    ("mountain", "hill"),
    ("elephant", "rhino"),
    ("ship", "boat"),
    ("cinema", "theatre"),
    ("guitar", "piano"),
    ("rain", "snow"),
    ("sun", "moon"),
    ("bakery", "supermarket"),
    ("police", "fire brigade"),
    ("scissors", "knife"),
    ("wine", "beer"),
    ("bed", "sofa"),
    ("stairs", "elevator"),
    ("newspaper", "newsletter"),
    ("cake", "pie"),
];

/// A non-empty collection of word pairs with uniform random selection.
#[derive(Debug, Clone)]
pub struct WordList {
    pairs: Vec<WordPair>,
}

impl WordList {
    /// Returns `None` for an empty collection.
    pub fn new(pairs: Vec<WordPair>) -> Option<Self> {
        if pairs.is_empty() {
            None
        } else {
            Some(Self { pairs })
        }
    }

    pub fn builtin() -> Self {
        Self {
            pairs: BUILTIN_PAIRS
                .iter()
                .map(|(word, hint)| WordPair::new(*word, *hint))
                .collect(),
        }
    }

    /// Load a JSON array of `{"word": ..., "hint": ...}` objects.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read word list: {}", path.display()))?;
        let pairs: Vec<WordPair> = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse word list: {}", path.display()))?;
        Self::new(pairs).with_context(|| format!("Word list is empty: {}", path.display()))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn choose<R: Rng + ?Sized>(&self, rng: &mut R) -> &WordPair {
        // `pairs` is never empty, see `new`
        self.pairs.choose(rng).unwrap_or(&self.pairs[0])
    }
}
