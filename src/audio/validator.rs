use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use rayon::ThreadPool;
use tracing::debug;

use crate::config::ValidationConfig;
use crate::error::Rejection;

/// Length of the RIFF/WAVE preamble checked by [`FileValidator`]
const HEADER_LEN: usize = 12;

/// Cheap structural checks run on every candidate before metadata extraction
///
/// Checks run in a fixed order and stop at the first failure: existence,
/// regular file, readability, minimum size, maximum size, extension, and
/// finally the `RIFF....WAVE` preamble.
#[derive(Debug, Clone)]
pub struct FileValidator {
    min_size: u64,
    max_size: u64,
    extensions: Vec<String>,
}

impl FileValidator {
    pub fn new(config: &ValidationConfig) -> Self {
        Self {
            min_size: config.min_file_size,
            max_size: config.max_file_size,
            extensions: config
                .extensions
                .iter()
                .map(|ext| ext.trim().trim_start_matches('.').to_lowercase())
                .filter(|ext| !ext.is_empty())
                .collect(),
        }
    }

    /// Whether the path carries one of the accepted extensions
    pub fn has_supported_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.extensions.iter().any(|accepted| accepted.eq_ignore_ascii_case(ext)))
            .unwrap_or(false)
    }

    /// Validate a single candidate file
    pub fn validate(&self, path: &Path) -> Result<(), Rejection> {
        if !path.exists() {
            return Err(Rejection::Missing);
        }

        if !path.is_file() {
            return Err(Rejection::NotAFile);
        }

        let mut file = File::open(path).map_err(|e| Rejection::Unreadable(e.to_string()))?;

        let size = file
            .metadata()
            .map_err(|e| Rejection::Unreadable(e.to_string()))?
            .len();
        if size < self.min_size {
            return Err(Rejection::TooSmall { size });
        }
        if size > self.max_size {
            return Err(Rejection::TooLarge { size });
        }

        if !self.has_supported_extension(path) {
            let suffix = path
                .extension()
                .map(|ext| format!(".{}", ext.to_string_lossy()))
                .unwrap_or_default();
            return Err(Rejection::UnsupportedExtension(suffix));
        }

        let mut header = [0u8; HEADER_LEN];
        if file.read_exact(&mut header).is_err() || !is_wave_preamble(&header) {
            return Err(Rejection::BadMagic);
        }

        Ok(())
    }

    /// Validate candidates on the worker pool, returning the accepted paths
    /// and the rejections in input order
    pub fn validate_all(
        &self,
        paths: &[PathBuf],
        pool: &ThreadPool,
    ) -> (Vec<PathBuf>, Vec<(PathBuf, Rejection)>) {
        let outcomes: Vec<(PathBuf, Result<(), Rejection>)> = pool.install(|| {
            paths
                .par_iter()
                .map(|path| (path.clone(), self.validate(path)))
                .collect()
        });

        let mut accepted = Vec::with_capacity(outcomes.len());
        let mut rejected = Vec::new();
        for (path, outcome) in outcomes {
            match outcome {
                Ok(()) => accepted.push(path),
                Err(reason) => {
                    debug!("Rejected {}: {}", path.display(), reason);
                    rejected.push((path, reason));
                }
            }
        }

        (accepted, rejected)
    }
}

fn is_wave_preamble(header: &[u8; HEADER_LEN]) -> bool {
    &header[0..4] == b"RIFF" && &header[8..12] == b"WAVE"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{write_tagged_wav, write_bytes};
    use tempfile::tempdir;

    fn validator() -> FileValidator {
        FileValidator::new(&ValidationConfig::default())
    }

    #[test]
    fn test_valid_wav_passes() {
        let dir = tempdir().unwrap();
        let path = write_tagged_wav(dir.path(), "ok.wav", Some("rain"));
        assert_eq!(validator().validate(&path), Ok(()));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempdir().unwrap();
        let result = validator().validate(&dir.path().join("nope.wav"));
        assert_eq!(result, Err(Rejection::Missing));
    }

    #[test]
    fn test_directory_is_not_a_file() {
        let dir = tempdir().unwrap();
        let sub = dir.path().join("folder.wav");
        std::fs::create_dir(&sub).unwrap();
        assert_eq!(validator().validate(&sub), Err(Rejection::NotAFile));
    }

    #[test]
    fn test_size_bounds() {
        let dir = tempdir().unwrap();
        let tiny = write_bytes(dir.path(), "tiny.wav", b"RIFF\0\0\0\0WAVE");
        assert_eq!(validator().validate(&tiny), Err(Rejection::TooSmall { size: 12 }));

        let config = ValidationConfig {
            min_file_size: 1,
            max_file_size: 8,
            ..ValidationConfig::default()
        };
        let strict = FileValidator::new(&config);
        assert_eq!(strict.validate(&tiny), Err(Rejection::TooLarge { size: 12 }));
    }

    #[test]
    fn test_extension_check_is_case_insensitive() {
        let v = validator();
        assert!(v.has_supported_extension(Path::new("a.WAV")));
        assert!(v.has_supported_extension(Path::new("a.Wave")));
        assert!(!v.has_supported_extension(Path::new("a.mp3")));
        assert!(!v.has_supported_extension(Path::new("wav")));
    }

    #[test]
    fn test_wrong_extension_rejected_before_magic() {
        let dir = tempdir().unwrap();
        let path = write_bytes(dir.path(), "notes.txt", &vec![b'x'; 2048]);
        assert_eq!(
            validator().validate(&path),
            Err(Rejection::UnsupportedExtension(".txt".to_string()))
        );
    }

    #[test]
    fn test_bad_magic() {
        let dir = tempdir().unwrap();
        let path = write_bytes(dir.path(), "fake.wav", &vec![0u8; 4096]);
        assert_eq!(validator().validate(&path), Err(Rejection::BadMagic));
    }

    #[test]
    fn test_validate_all_splits_results() {
        let dir = tempdir().unwrap();
        let good = write_tagged_wav(dir.path(), "good.wav", None);
        let bad = write_bytes(dir.path(), "bad.wav", &vec![0u8; 4096]);
        let pool = rayon::ThreadPoolBuilder::new().num_threads(2).build().unwrap();

        let (accepted, rejected) = validator().validate_all(&[good.clone(), bad.clone()], &pool);
        assert_eq!(accepted, vec![good]);
        assert_eq!(rejected, vec![(bad, Rejection::BadMagic)]);
    }
}
