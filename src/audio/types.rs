use std::path::{Path, PathBuf};

/// Sample rate assumed when a recording cannot be read
pub const FALLBACK_SAMPLE_RATE: u32 = 44_100;

/// Frame count assumed when a recording cannot be read (ten seconds)
pub const FALLBACK_FRAMES: u64 = 441_000;

/// Channel count assumed when a recording cannot be read
pub const FALLBACK_CHANNELS: u16 = 2;

/// Audio properties read from a container header
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioProperties {
    /// Sample rate in Hz
    pub sample_rate: u32,

    /// Frames per channel
    pub frames: u64,

    /// Number of channels (1 = mono, 2 = stereo)
    pub channels: u16,
}

impl AudioProperties {
    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames as f64 / self.sample_rate as f64
    }

    /// Defaults used for recordings whose header cannot be read
    pub fn fallback() -> Self {
        Self {
            sample_rate: FALLBACK_SAMPLE_RATE,
            frames: FALLBACK_FRAMES,
            channels: FALLBACK_CHANNELS,
        }
    }
}

/// Everything the generator knows about one recording
///
/// Built once by the metadata extractor and never mutated afterwards. The
/// category list is sorted, de-duplicated and never empty.
#[derive(Debug, Clone)]
pub struct FileMetadata {
    path: PathBuf,
    size: u64,
    modified: i64,
    integrity_tag: u32,
    properties: AudioProperties,
    comment: String,
    categories: Box<[String]>,
    fallback: bool,
}

impl FileMetadata {
    /// Create a metadata record; `fallback_category` is used if `categories` is empty
    pub fn new(
        path: PathBuf,
        size: u64,
        modified: i64,
        integrity_tag: u32,
        properties: AudioProperties,
        comment: String,
        categories: Vec<String>,
        fallback_category: &str,
    ) -> Self {
        Self {
            path,
            size,
            modified,
            integrity_tag,
            properties,
            comment,
            categories: normalize_categories(categories, fallback_category),
            fallback: false,
        }
    }

    /// Synthetic record for a recording whose metadata could not be extracted
    pub fn fallback(path: PathBuf, size: u64, modified: i64, fallback_category: &str) -> Self {
        Self {
            path,
            size,
            modified,
            integrity_tag: 0,
            properties: AudioProperties::fallback(),
            comment: String::new(),
            categories: normalize_categories(Vec::new(), fallback_category),
            fallback: true,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File size in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Modification time in seconds since the Unix epoch
    pub fn modified(&self) -> i64 {
        self.modified
    }

    /// Content fingerprint written as the clip's original CRC
    pub fn integrity_tag(&self) -> u32 {
        self.integrity_tag
    }

    pub fn sample_rate(&self) -> u32 {
        self.properties.sample_rate
    }

    pub fn frames(&self) -> u64 {
        self.properties.frames
    }

    pub fn channels(&self) -> u16 {
        self.properties.channels
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        self.properties.duration()
    }

    /// Free-text comment (the RIFF `ICMT` field), trimmed
    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// Whether this record was synthesized after an extraction failure
    pub fn is_fallback(&self) -> bool {
        self.fallback
    }
}

fn normalize_categories(mut categories: Vec<String>, fallback_category: &str) -> Box<[String]> {
    categories.retain(|category| !category.trim().is_empty());
    categories.sort();
    categories.dedup();
    if categories.is_empty() {
        categories.push(fallback_category.to_string());
    }
    categories.into_boxed_slice()
}
