use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the Live set generator
#[derive(Error, Debug)]
pub enum GeneratorError {
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    #[error("Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error("Assembly error: {0}")]
    Assembly(#[from] AssemblyError),

    #[error("Output error: {0}")]
    Output(#[from] OutputError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Template loading and structural validation errors
#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Template not found: {path}")]
    NotFound { path: String },

    #[error("Failed to read template {path}: {reason}")]
    ReadFailed { path: String, reason: String },

    #[error("Failed to parse template XML: {reason}")]
    ParseFailed { reason: String },

    #[error("Template missing required elements: {}", join_names(.missing))]
    MissingElements { missing: Vec<String> },

    #[error("Template root element is '{found}', expected '{expected}'")]
    WrongRoot { found: String, expected: String },
}

/// Input discovery errors
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Invalid input directory: {path}")]
    InvalidDirectory { path: String },

    #[error("No WAV files found in: {path}")]
    NoFilesFound { path: String },

    #[error("No valid WAV files in {path} ({rejected} rejected)")]
    NoValidFiles { path: String, rejected: usize },

    #[error("Worker pool could not be started: {reason}")]
    WorkerPool { reason: String },
}

/// Track and clip assembly errors
#[derive(Error, Debug)]
pub enum AssemblyError {
    #[error("No valid clips could be created")]
    NoClips,

    #[error("No category track could be built")]
    NoTracks,

    #[error("Template has no {element} element")]
    MissingElement { element: String },

    #[error("Track for category '{category}' failed: {reason}")]
    TrackFailed { category: String, reason: String },

    #[error("Ran out of IDs above the template's largest ID after {allocated} allocations")]
    IdSpaceExhausted { allocated: usize },
}

/// Output path resolution and serialization errors
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("No free output name for {path} after {attempts} attempts")]
    NameExhausted { path: String, attempts: u32 },

    #[error("Failed to write Live set {path}: {reason}")]
    WriteFailed { path: String, reason: String },
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration file: {path}")]
    ParseFailed { path: String },

    #[error("Invalid configuration value: {key} = {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required configuration: {key}")]
    MissingKey { key: String },

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },
}

/// Reasons a candidate file is turned away before metadata extraction
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("File does not exist")]
    Missing,

    #[error("Not a regular file")]
    NotAFile,

    #[error("File not readable: {0}")]
    Unreadable(String),

    #[error("File too small ({size} bytes)")]
    TooSmall { size: u64 },

    #[error("File too large ({:.1}MB)", megabytes(.size))]
    TooLarge { size: u64 },

    #[error("Unsupported extension: {0}")]
    UnsupportedExtension(String),

    #[error("Invalid WAV file format")]
    BadMagic,
}

/// Per-file metadata extraction errors, always absorbed into a fallback record
#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("Cannot stat {path}: {source}")]
    Stat {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unreadable audio container {path}: {reason}")]
    UnreadableContainer { path: PathBuf, reason: String },

    #[error("Invalid audio parameters in {path}: {details}")]
    InvalidParameters { path: PathBuf, details: String },
}

fn join_names(names: &[String]) -> String {
    names.join(", ")
}

fn megabytes(size: &u64) -> f64 {
    *size as f64 / 1024.0 / 1024.0
}

/// Convenience type alias for Results using GeneratorError
pub type Result<T> = std::result::Result<T, GeneratorError>;

impl GeneratorError {
    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Template(TemplateError::NotFound { path }) => {
                format!("Template '{}' not found. Choose an existing .als template.", path)
            }
            Self::Template(TemplateError::MissingElements { missing }) => {
                format!(
                    "The template is not a usable Live set (missing {}).",
                    missing.join(", ")
                )
            }
            Self::Discovery(DiscoveryError::NoFilesFound { path }) => {
                format!("No files found: '{}' contains no WAV recordings.", path)
            }
            Self::Discovery(DiscoveryError::NoValidFiles { path, rejected }) => {
                format!(
                    "No files found: all {} WAV files in '{}' were rejected.",
                    rejected, path
                )
            }
            Self::Output(OutputError::NameExhausted { path, .. }) => {
                format!("Could not find a free file name next to '{}'.", path)
            }
            Self::Config(ConfigError::FileNotFound { path }) => {
                format!("Configuration file '{}' not found.", path)
            }
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_mentions_no_files_found() {
        let err: GeneratorError = DiscoveryError::NoFilesFound {
            path: "/tmp/empty".to_string(),
        }
        .into();
        assert!(err.user_message().to_lowercase().contains("no files found"));
    }

    #[test]
    fn test_missing_elements_display() {
        let err = TemplateError::MissingElements {
            missing: vec!["Scenes".to_string(), "Tracks".to_string()],
        };
        assert_eq!(err.to_string(), "Template missing required elements: Scenes, Tracks");
        assert!(matches!(GeneratorError::from(err), GeneratorError::Template(_)));
    }

    #[test]
    fn test_too_large_is_reported_in_megabytes() {
        let rejection = Rejection::TooLarge { size: 600 * 1024 * 1024 };
        assert_eq!(rejection.to_string(), "File too large (600.0MB)");
    }
}
