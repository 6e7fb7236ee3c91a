//! # Liveset Generator
//!
//! Turn a folder of tagged field recordings into an Ableton Live set.
//!
//! Every WAV file in the input directory becomes a clip. The comma-separated
//! tags in a recording's RIFF comment decide which category tracks it lands on;
//! the tracks are cloned from an audio track in a template set, and the result
//! is written as a gzip-compressed `.als` document.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use liveset_generator::{Config, GenerationRequest, ProjectAssembler};
//!
//! # fn main() -> liveset_generator::Result<()> {
//! let mut assembler = ProjectAssembler::new("Template.als", Config::default())?;
//! let request = GenerationRequest::new("recordings/").with_project_name("Dawn walk");
//!
//! let report = |current: usize, total: usize, message: &str| {
//!     println!("[{}/{}] {}", current, total, message);
//! };
//!
//! if assembler.generate(&request, Some(&report)) {
//!     println!("Written to {:?}", assembler.stats().output_path);
//! } else {
//!     eprintln!("Failed: {:?}", assembler.stats().failure_reason);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`audio`] - Validation, header probing, RIFF comments and metadata extraction
//! - [`template`] - Owned XML tree, ID scanning and allocation, clip fragments
//! - [`project`] - The generation pipeline and the output writer
//! - [`config`] - Configuration management

pub mod audio;
pub mod config;
pub mod error;
pub mod progress;
pub mod project;
pub mod template;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types for convenience
pub use crate::{
    config::Config,
    error::{GeneratorError, Result},
    progress::ProgressCallback,
    project::{GenerationRequest, GenerationStats, ProjectAssembler, Stage},
};
