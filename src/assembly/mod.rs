//! Puzzle assembly and the top-level solve operation.

mod assembler;
mod result;
mod solver;

pub use assembler::{Assembler, AssemblyConfig, DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_THRESHOLD};
pub use result::{MISSING_SAMPLE_SIZE, PuzzleResult, PuzzleStats};
pub use solver::{EMPTY_RESULT_MESSAGE, PuzzleSolver};
