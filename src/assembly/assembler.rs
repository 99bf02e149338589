//! Ordered text assembly.

use serde::Deserialize;

use crate::fragment::Fragment;

/// Fragment count above which assembly joins in chunks.
pub const DEFAULT_CHUNK_THRESHOLD: usize = 100;

/// Fragments per chunk on the chunked path.
pub const DEFAULT_CHUNK_SIZE: usize = 50;

/// Separator between fragment texts.
const SEPARATOR: &str = " ";

/// Assembly settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AssemblyConfig {
    /// Fragment count above which the chunked path is taken.
    pub chunk_threshold: usize,
    /// Fragments per chunk.
    pub chunk_size: usize,
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            chunk_threshold: DEFAULT_CHUNK_THRESHOLD,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// Orders fragments by position and joins their texts with single spaces.
///
/// The chunked path only changes how intermediate strings are built; its
/// output is byte-identical to the single-join path.
#[derive(Debug, Clone)]
pub struct Assembler {
    chunk_threshold: usize,
    chunk_size: usize,
}

impl Default for Assembler {
    fn default() -> Self {
        Self::new(&AssemblyConfig::default())
    }
}

impl Assembler {
    /// Creates an assembler. A zero chunk size is treated as 1.
    #[must_use]
    pub fn new(config: &AssemblyConfig) -> Self {
        Self {
            chunk_threshold: config.chunk_threshold,
            chunk_size: config.chunk_size.max(1),
        }
    }

    /// Configured chunk threshold.
    #[must_use]
    pub fn chunk_threshold(&self) -> usize {
        self.chunk_threshold
    }

    /// Assembles `fragments` into text, sorted by position.
    ///
    /// `chunk_threshold` overrides the configured threshold for this call.
    #[must_use]
    pub fn assemble(&self, fragments: &[Fragment], chunk_threshold: Option<usize>) -> String {
        let mut ordered: Vec<&Fragment> = fragments.iter().collect();
        ordered.sort_by_key(|fragment| fragment.position);

        let threshold = chunk_threshold.unwrap_or(self.chunk_threshold);
        if ordered.len() <= threshold {
            return join_texts(&ordered);
        }

        ordered
            .chunks(self.chunk_size)
            .map(join_texts)
            .collect::<Vec<_>>()
            .join(SEPARATOR)
    }
}

fn join_texts(fragments: &[&Fragment]) -> String {
    fragments
        .iter()
        .map(|fragment| fragment.text.as_str())
        .collect::<Vec<_>>()
        .join(SEPARATOR)
}
