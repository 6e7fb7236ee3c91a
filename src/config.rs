use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Main configuration for the Live set generator
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Worker pool and batching settings
    pub generator: GeneratorConfig,

    /// Candidate file checks
    pub validation: ValidationConfig,

    /// Output naming and placement
    pub output: OutputConfig,

    /// Tag dictionary used to group recordings into tracks
    pub categories: CategoryConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound { path: path.display().to_string() })?;

        let config: Config = toml::from_str(&content)
            .map_err(|_| ConfigError::ParseFailed { path: path.display().to_string() })?;
        config.validate()?;
        Ok(config)
    }

    /// Render the configuration as pretty TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| {
            ConfigError::InvalidValue {
                key: "config".to_string(),
                value: e.to_string(),
            }
            .into()
        })
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = self.to_toml_string()?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.generator.validate()?;
        self.validation.validate()?;
        self.output.validate()?;
        self.categories.validate()?;
        Ok(())
    }
}

/// Worker pool and batching configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Worker threads for validation and metadata extraction (0 = automatic)
    pub workers: usize,

    /// Files handled per grouping batch
    pub batch_size: usize,

    /// Metadata records kept before the cache is flushed
    pub cache_capacity: usize,

    /// Reclaim scratch memory every this many batches
    pub reclaim_every_batches: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            batch_size: 100,
            cache_capacity: 1000,
            reclaim_every_batches: 10,
        }
    }
}

impl GeneratorConfig {
    /// Worker count actually used: the configured one, or `min(32, cpus + 4)`
    /// since the pooled work is I/O bound.
    pub fn effective_workers(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            (num_cpus::get() + 4).min(32)
        }
    }

    fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "generator.batch_size".to_string(),
                value: self.batch_size.to_string(),
            }
            .into());
        }

        if self.cache_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                key: "generator.cache_capacity".to_string(),
                value: self.cache_capacity.to_string(),
            }
            .into());
        }

        if self.reclaim_every_batches == 0 {
            return Err(ConfigError::InvalidValue {
                key: "generator.reclaim_every_batches".to_string(),
                value: self.reclaim_every_batches.to_string(),
            }
            .into());
        }

        Ok(())
    }
}

/// Candidate file validation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Smallest accepted file in bytes
    pub min_file_size: u64,

    /// Largest accepted file in bytes
    pub max_file_size: u64,

    /// Accepted extensions, compared case-insensitively
    pub extensions: Vec<String>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_file_size: 1024,
            max_file_size: 500 * 1024 * 1024,
            extensions: vec!["wav".to_string(), "wave".to_string()],
        }
    }
}

impl ValidationConfig {
    fn validate(&self) -> Result<()> {
        if self.min_file_size >= self.max_file_size {
            return Err(ConfigError::InvalidValue {
                key: "validation.file_size_range".to_string(),
                value: format!("{}-{}", self.min_file_size, self.max_file_size),
            }
            .into());
        }

        if self.extensions.iter().all(|ext| ext.trim().is_empty()) {
            return Err(ConfigError::MissingKey {
                key: "validation.extensions".to_string(),
            }
            .into());
        }

        Ok(())
    }
}

/// Output naming configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory created next to the recordings when no output path is given
    pub subdirectory: String,

    /// Prefix of the timestamped project name used when none is given
    pub default_name_prefix: String,

    /// Live set extension, without the dot
    pub extension: String,

    /// Longest sanitized file name
    pub max_name_length: usize,

    /// Highest numeric suffix tried when the target name is taken
    pub max_collision_attempts: u32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            subdirectory: "Ableton".to_string(),
            default_name_prefix: "FieldRecording".to_string(),
            extension: "als".to_string(),
            max_name_length: 200,
            max_collision_attempts: 999,
        }
    }
}

impl OutputConfig {
    fn validate(&self) -> Result<()> {
        if self.extension.trim().is_empty() {
            return Err(ConfigError::MissingKey {
                key: "output.extension".to_string(),
            }
            .into());
        }

        if self.max_name_length <= self.extension.len() + 1 {
            return Err(ConfigError::InvalidValue {
                key: "output.max_name_length".to_string(),
                value: self.max_name_length.to_string(),
            }
            .into());
        }

        if self.max_collision_attempts == 0 || self.max_collision_attempts > 999 {
            return Err(ConfigError::InvalidValue {
                key: "output.max_collision_attempts".to_string(),
                value: self.max_collision_attempts.to_string(),
            }
            .into());
        }

        Ok(())
    }
}

/// Category dictionary configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryConfig {
    /// Label for recordings whose comment matches nothing
    pub fallback: String,

    /// Category label to the tag terms that select it
    pub terms: BTreeMap<String, Vec<String>>,
}

impl Default for CategoryConfig {
    fn default() -> Self {
        Self {
            fallback: "🔁 Uncategorized".to_string(),
            terms: default_tag_terms(),
        }
    }
}

impl CategoryConfig {
    fn validate(&self) -> Result<()> {
        if self.fallback.trim().is_empty() {
            return Err(ConfigError::MissingKey {
                key: "categories.fallback".to_string(),
            }
            .into());
        }

        if let Some(label) = self.terms.keys().find(|label| label.trim().is_empty()) {
            return Err(ConfigError::InvalidValue {
                key: "categories.terms".to_string(),
                value: format!("{:?}", label),
            }
            .into());
        }

        Ok(())
    }
}

/// Built-in field recording taxonomy
fn default_tag_terms() -> BTreeMap<String, Vec<String>> {
    let table: [(&str, &[&str]); 8] = [
        (
            "🌿 Nature",
            &[
                "stream", "mountain", "forest", "dune", "cave", "heath", "lake", "marsh",
                "nature reserve", "river", "beach", "valley", "field", "pond", "waterfall",
                "meadow", "sea",
            ],
        ),
        (
            "🏙️ Urban / Human",
            &[
                "construction site", "park", "square", "school", "playground", "station",
                "street", "traffic", "store",
            ],
        ),
        (
            "🐦 Animals (wild & domestic)",
            &[
                "hedgehog", "duck", "goat", "dog", "cat", "cow", "frog", "rabbit", "mouse",
                "horse", "sheep", "woodpecker", "owl", "pig", "bat", "bird", "fox", "swan",
            ],
        ),
        (
            "🦗 Insects & Small animals",
            &[
                "bee", "bumblebee", "cricket", "mosquito", "caterpillar", "snail",
                "grasshopper", "butterfly", "fly", "worm", "wasp",
            ],
        ),
        (
            "🌧️ Weather & Elements",
            &["dew", "ice", "fog", "thunderstorm", "rain", "snow", "storm", "wind", "sun"],
        ),
        (
            "⏰ Time of day",
            &["evening", "afternoon", "night", "morning", "sunset", "sunrise"],
        ),
        (
            "🛠️ Sound type / Activity",
            &[
                "construction noise", "nearby", "crowd", "machines", "voices", "silence",
                "distant", "traffic", "footsteps",
            ],
        ),
        (
            "🎧 Recording quality",
            &["ambient", "close", "clear", "mono", "noise", "stereo", "distant", "distortion"],
        ),
    ];

    table
        .iter()
        .map(|(label, terms)| {
            (
                label.to_string(),
                terms.iter().map(|term| term.to_string()).collect(),
            )
        })
        .collect()
}
