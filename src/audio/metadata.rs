use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use rayon::ThreadPool;
use tracing::{debug, info, warn};

use crate::audio::categories::CategoryDictionary;
use crate::audio::loader::AudioLoader;
use crate::audio::riff;
use crate::audio::types::FileMetadata;
use crate::error::MetadataError;
use crate::progress::{self, ProgressCallback};

/// Bytes hashed for the integrity tag
const FINGERPRINT_LEN: u64 = 64 * 1024;

/// Parallel metadata extraction with a bounded per-run cache
///
/// Every file is handled independently on the worker pool. A file that fails
/// at any step gets a fallback record instead of aborting the batch. Results
/// are cached by path; the cache is flushed when it reaches its capacity and
/// whenever the owner calls [`MetadataExtractor::clear_cache`].
pub struct MetadataExtractor {
    dictionary: CategoryDictionary,
    cache: HashMap<PathBuf, Arc<FileMetadata>>,
    capacity: usize,
    cache_hits: usize,
}

impl MetadataExtractor {
    pub fn new(dictionary: CategoryDictionary, capacity: usize) -> Self {
        Self {
            dictionary,
            cache: HashMap::new(),
            capacity: capacity.max(1),
            cache_hits: 0,
        }
    }

    pub fn dictionary(&self) -> &CategoryDictionary {
        &self.dictionary
    }

    /// Extract metadata for every path on the given pool
    pub fn extract_batch(
        &mut self,
        paths: &[PathBuf],
        pool: &ThreadPool,
        progress: Option<ProgressCallback<'_>>,
    ) -> HashMap<PathBuf, Arc<FileMetadata>> {
        let total = paths.len();
        let mut results: HashMap<PathBuf, Arc<FileMetadata>> = HashMap::with_capacity(total);

        let mut pending = Vec::new();
        for path in paths {
            match self.cache.get(path) {
                Some(metadata) => {
                    self.cache_hits += 1;
                    results.insert(path.clone(), Arc::clone(metadata));
                }
                None => pending.push(path.clone()),
            }
        }

        let done = AtomicUsize::new(results.len());
        let dictionary = &self.dictionary;
        let extracted: Vec<(PathBuf, FileMetadata)> = pool.install(|| {
            pending
                .into_par_iter()
                .map(|path| {
                    let metadata = match extract_single(&path, dictionary) {
                        Ok(metadata) => metadata,
                        Err(e) => {
                            warn!("Metadata extraction failed for {}: {}", path.display(), e);
                            fallback_metadata(&path, dictionary)
                        }
                    };

                    let current = done.fetch_add(1, Ordering::Relaxed) + 1;
                    let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
                    progress::report(progress, current, total, &format!("Processing {}", name));

                    (path, metadata)
                })
                .collect()
        });

        for (path, metadata) in extracted {
            let metadata = Arc::new(metadata);
            if self.cache.len() >= self.capacity {
                debug!("Metadata cache full ({} entries), flushing", self.cache.len());
                self.cache.clear();
            }
            self.cache.insert(path.clone(), Arc::clone(&metadata));
            results.insert(path, metadata);
        }

        let fallbacks = results.values().filter(|m| m.is_fallback()).count();
        info!("   Metadata ready for {} files ({} fallback records)", results.len(), fallbacks);

        results
    }

    /// Number of lookups answered from the cache so far
    pub fn cache_hits(&self) -> usize {
        self.cache_hits
    }

    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    /// Drop every cached record
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }
}

/// Extract everything for one file
pub fn extract_single(path: &Path, dictionary: &CategoryDictionary) -> Result<FileMetadata, MetadataError> {
    let stat = std::fs::metadata(path).map_err(|source| MetadataError::Stat {
        path: path.to_path_buf(),
        source,
    })?;

    let modified = stat
        .modified()
        .map(|time| DateTime::<Utc>::from(time).timestamp())
        .unwrap_or_else(|_| Utc::now().timestamp());

    let integrity_tag = fingerprint(path).map_err(|e| MetadataError::UnreadableContainer {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let properties = AudioLoader::probe(path)?;

    let comment = match riff::read_comment(path) {
        Ok(comment) => comment.unwrap_or_default(),
        Err(e) => {
            debug!("No INFO comment for {}: {}", path.display(), e);
            String::new()
        }
    };

    let categories = dictionary.categorize(&comment);

    Ok(FileMetadata::new(
        path.to_path_buf(),
        stat.len(),
        modified,
        integrity_tag,
        properties,
        comment,
        categories,
        dictionary.fallback(),
    ))
}

/// Fallback record, keeping whatever the filesystem can still tell us
pub fn fallback_metadata(path: &Path, dictionary: &CategoryDictionary) -> FileMetadata {
    let stat = std::fs::metadata(path).ok();
    let size = stat.as_ref().map(|s| s.len()).unwrap_or(0);
    let modified = stat
        .and_then(|s| s.modified().ok())
        .map(|time| DateTime::<Utc>::from(time).timestamp())
        .unwrap_or_else(|| Utc::now().timestamp());

    FileMetadata::fallback(path.to_path_buf(), size, modified, dictionary.fallback())
}

/// CRC-32 of the first 64 KiB
fn fingerprint(path: &Path) -> std::io::Result<u32> {
    let mut buffer = Vec::with_capacity(FINGERPRINT_LEN as usize);
    File::open(path)?.take(FINGERPRINT_LEN).read_to_end(&mut buffer)?;

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&buffer);
    Ok(hasher.finalize())
}
