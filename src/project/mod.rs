//! Live set assembly: the generation pipeline, its statistics and the output writer.

pub mod assembler;
pub mod output;
pub mod stats;

pub use assembler::{GenerationRequest, ProjectAssembler};
pub use stats::{GenerationStats, Stage};
