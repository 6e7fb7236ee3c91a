//! # Audio Module
//!
//! Everything the generator learns about the recordings themselves: cheap
//! structural validation, header probing, the RIFF `INFO` comment, and the
//! parallel metadata extraction that turns comments into categories.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use liveset_generator::audio::{CategoryDictionary, MetadataExtractor};
//! use liveset_generator::config::Config;
//! use std::path::PathBuf;
//!
//! let config = Config::default();
//! let pool = rayon::ThreadPoolBuilder::new().num_threads(4).build().unwrap();
//! let mut extractor = MetadataExtractor::new(CategoryDictionary::new(&config.categories), 1000);
//!
//! let metadata = extractor.extract_batch(&[PathBuf::from("dawn.wav")], &pool, None);
//! for record in metadata.values() {
//!     println!("{}: {:?}", record.path().display(), record.categories());
//! }
//! ```

pub mod categories;
pub mod loader;
pub mod metadata;
pub mod riff;
pub mod types;
pub mod validator;

pub use categories::{display_label, CategoryDictionary};
pub use loader::AudioLoader;
pub use metadata::MetadataExtractor;
pub use types::{AudioProperties, FileMetadata};
pub use validator::FileValidator;
