use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use rayon::ThreadPool;
use tracing::{debug, error, info, warn};

use crate::{
    audio::{
        categories::display_label,
        metadata::fallback_metadata,
        CategoryDictionary, FileMetadata, FileValidator, MetadataExtractor,
    },
    config::Config,
    error::{AssemblyError, ConfigError, DiscoveryError, Result},
    progress::{self, ProgressCallback},
    project::{
        output::{resolve_output_path, write_live_set},
        stats::{GenerationStats, Stage},
    },
    template::{load_template, scan_ids, Element, FragmentTemplateEngine, Node, SequentialIdAllocator},
};

/// Scenes every generated set has at least
pub const MIN_SCENES: usize = 8;

/// Category label → slot position → rendered clip slot fragment
pub type CategoryClipMap = BTreeMap<String, BTreeMap<usize, String>>;

/// What to generate: input directory plus optional output placement
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    input_dir: PathBuf,
    output: Option<PathBuf>,
    project_name: Option<String>,
    batch_size: Option<usize>,
}

impl GenerationRequest {
    pub fn new<P: Into<PathBuf>>(input_dir: P) -> Self {
        Self {
            input_dir: input_dir.into(),
            output: None,
            project_name: None,
            batch_size: None,
        }
    }

    /// Output file (ending in `.als`) or directory
    pub fn with_output<P: Into<PathBuf>>(mut self, output: P) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn with_project_name<S: Into<String>>(mut self, name: S) -> Self {
        self.project_name = Some(name.into());
        self
    }

    /// Files per grouping batch; overrides the configured value
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    pub fn input_dir(&self) -> &Path {
        &self.input_dir
    }
}

/// Builds a Live set from a directory of recordings by cloning a template
///
/// The pipeline runs these stages in order, stopping at the first fatal error:
/// 1. Load Template - decode and structurally check the template
/// 2. Discover - list WAV candidates in the input directory
/// 3. Validate - structural checks on the worker pool
/// 4. Extract Metadata - audio properties, comment and categories per file
/// 5. Allocate and Group - render one clip per (file, category) pair
/// 6. Assemble Tracks - one cloned audio track per category, scenes rebuilt
/// 7. Finalize IDs - write the next free identifier
/// 8. Serialize - gzip the document next to (or at) the requested output
pub struct ProjectAssembler {
    template_path: PathBuf,
    config: Config,
    stats: GenerationStats,
}

impl ProjectAssembler {
    /// Create an assembler for the given template and configuration
    ///
    /// Configuration problems are reported here, before any file is touched.
    pub fn new<P: Into<PathBuf>>(template_path: P, config: Config) -> Result<Self> {
        let template_path = template_path.into();
        if template_path.as_os_str().is_empty() {
            return Err(ConfigError::MissingKey {
                key: "template".to_string(),
            }
            .into());
        }
        config.validate()?;

        Ok(Self {
            template_path,
            config,
            stats: GenerationStats::default(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn template_path(&self) -> &Path {
        &self.template_path
    }

    /// Statistics of the most recent run
    pub fn stats(&self) -> &GenerationStats {
        &self.stats
    }

    /// Run the whole pipeline; `false` means the run failed and
    /// [`GenerationStats::failure_reason`] says why
    pub fn generate(&mut self, request: &GenerationRequest, progress: Option<ProgressCallback<'_>>) -> bool {
        self.try_generate(request, progress).is_ok()
    }

    /// Run the whole pipeline, returning the written file
    pub fn try_generate(
        &mut self,
        request: &GenerationRequest,
        progress: Option<ProgressCallback<'_>>,
    ) -> Result<PathBuf> {
        self.stats = GenerationStats::default();
        let started = Instant::now();

        info!("🎛️ Starting Live set generation");
        info!("   Input: {}", request.input_dir.display());
        info!("   Template: {}", self.template_path.display());

        let result = self.run(request, progress);
        self.stats.elapsed = started.elapsed();

        match &result {
            Ok(path) => {
                self.stats.stage = Stage::Done;
                info!("🎉 Live set creation completed!");
                info!("📊 Statistics:");
                info!("   ⏱️ Total time: {:.2}s", self.stats.elapsed.as_secs_f64());
                info!("   🎵 Files processed: {}", self.stats.files_processed);
                info!("   ⚡ Avg per file: {:.3}s", self.stats.seconds_per_file());
                info!("   🎚️ Tracks: {}, scenes: {}", self.stats.tracks_created, self.stats.scene_count);
                info!("   💾 Output: {}", path.display());
            }
            Err(e) => {
                let stage = self.stats.stage;
                self.stats.failed_stage = Some(stage);
                self.stats.stage = Stage::Failed;
                self.stats.failure_reason = Some(e.user_message());
                error!("❌ Generation failed during {}: {}", stage, e);
            }
        }

        result
    }

    fn enter(&mut self, stage: Stage) {
        debug!("Entering stage: {}", stage);
        self.stats.stage = stage;
    }

    fn run(&mut self, request: &GenerationRequest, progress: Option<ProgressCallback<'_>>) -> Result<PathBuf> {
        // Pipeline Step 1: Template
        self.enter(Stage::LoadTemplate);
        let mut document = load_template(&self.template_path)?;

        // Pipeline Step 2: Discovery
        self.enter(Stage::Discover);
        let validator = FileValidator::new(&self.config.validation);
        let input_dir = self.resolve_input_dir(&request.input_dir)?;
        let candidates = self.discover(&input_dir, &validator)?;

        // Pipeline Step 3: Validation
        self.enter(Stage::Validate);
        let pool = self.build_pool()?;
        let valid = self.validate(&input_dir, &candidates, &validator, &pool)?;

        // Pipeline Step 4: Metadata
        self.enter(Stage::ExtractMetadata);
        let dictionary = CategoryDictionary::new(&self.config.categories);
        let mut extractor = MetadataExtractor::new(dictionary, self.config.generator.cache_capacity);
        let mut metadata = self.extract_metadata(&valid, &mut extractor, &pool, progress);

        // Pipeline Step 5: IDs and clip fragments
        self.enter(Stage::AllocateAndGroup);
        let template_ids = scan_ids(&document);
        self.stats.template_id_count = template_ids.len();
        let mut allocator = SequentialIdAllocator::new(&template_ids);
        let engine = FragmentTemplateEngine::new();
        if let Err(e) = engine.prepare() {
            warn!("Clip templates could not be compiled, slots will be empty: {}", e);
        }

        let batch_size = request.batch_size.unwrap_or(self.config.generator.batch_size).max(1);
        let clips = self.group_clips(
            &valid,
            &mut metadata,
            extractor.dictionary(),
            &mut allocator,
            &engine,
            batch_size,
            progress,
        )?;
        extractor.clear_cache();
        drop(metadata);

        // Pipeline Step 6: Tracks and scenes
        self.enter(Stage::AssembleTracks);
        let scene_count = scene_count(&clips);
        rebuild_scenes(&mut document, scene_count)?;
        self.stats.scene_count = scene_count;
        self.assemble_tracks(&mut document, &clips, scene_count, &mut allocator, &engine)?;

        // Pipeline Step 7: Next pointer
        self.enter(Stage::FinalizeIds);
        let next_pointer = allocator.next_pointer_value();
        document
            .find_mut("NextPointeeId")
            .ok_or_else(|| AssemblyError::MissingElement {
                element: "NextPointeeId".to_string(),
            })?
            .set_attr("Value", next_pointer.to_string());
        self.stats.next_pointer = next_pointer;
        self.stats.ids_allocated = allocator.allocated_count();
        info!("🔢 NextPointeeId set to {} ({} IDs allocated)", next_pointer, allocator.allocated_count());

        // Pipeline Step 8: Output
        self.enter(Stage::Serialize);
        let output_path = resolve_output_path(
            &input_dir,
            request.output.as_deref(),
            request.project_name.as_deref(),
            &self.config.output,
        )?;
        self.stats.output_path = Some(output_path.clone());
        self.stats.output_size = write_live_set(&document, &output_path)?;

        Ok(output_path)
    }

    // ==========================================
    // DISCOVERY & VALIDATION
    // ==========================================

    fn resolve_input_dir(&self, input_dir: &Path) -> Result<PathBuf> {
        if !input_dir.is_dir() {
            return Err(DiscoveryError::InvalidDirectory {
                path: input_dir.display().to_string(),
            }
            .into());
        }
        Ok(input_dir.canonicalize().unwrap_or_else(|_| input_dir.to_path_buf()))
    }

    /// Non-recursive listing of WAV candidates, de-duplicated by canonical path
    fn discover(&mut self, input_dir: &Path, validator: &FileValidator) -> Result<Vec<PathBuf>> {
        info!("🔍 Discovering WAV files...");

        let mut found = BTreeSet::new();
        for entry in std::fs::read_dir(input_dir)? {
            let path = match entry {
                Ok(entry) => entry.path(),
                Err(e) => {
                    warn!("Skipping unreadable directory entry in {}: {}", input_dir.display(), e);
                    continue;
                }
            };
            if validator.has_supported_extension(&path) {
                found.insert(path.canonicalize().unwrap_or(path));
            }
        }

        self.stats.files_discovered = found.len();
        if found.is_empty() {
            return Err(DiscoveryError::NoFilesFound {
                path: input_dir.display().to_string(),
            }
            .into());
        }

        debug!("Discovered {} candidates", found.len());
        Ok(found.into_iter().collect())
    }

    fn build_pool(&self) -> Result<ThreadPool> {
        let workers = self.config.generator.effective_workers();
        debug!("Starting worker pool with {} threads", workers);

        rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|index| format!("als-worker-{}", index))
            .build()
            .map_err(|e| {
                DiscoveryError::WorkerPool {
                    reason: e.to_string(),
                }
                .into()
            })
    }

    /// Keep the valid candidates, sorted by directory then file name, case-insensitively
    fn validate(
        &mut self,
        input_dir: &Path,
        candidates: &[PathBuf],
        validator: &FileValidator,
        pool: &ThreadPool,
    ) -> Result<Vec<PathBuf>> {
        let (mut valid, rejected) = validator.validate_all(candidates, pool);

        for (path, reason) in &rejected {
            warn!("⚠️ Skipping {}: {}", path.display(), reason);
        }
        self.stats.files_valid = valid.len();
        self.stats.files_rejected = rejected.len();

        if valid.is_empty() {
            return Err(DiscoveryError::NoValidFiles {
                path: input_dir.display().to_string(),
                rejected: rejected.len(),
            }
            .into());
        }

        valid.sort_by_cached_key(|path| sort_key(path));
        info!("✅ Found {} valid WAV files ({} rejected)", valid.len(), rejected.len());
        Ok(valid)
    }

    // ==========================================
    // METADATA & GROUPING
    // ==========================================

    fn extract_metadata(
        &mut self,
        valid: &[PathBuf],
        extractor: &mut MetadataExtractor,
        pool: &ThreadPool,
        progress: Option<ProgressCallback<'_>>,
    ) -> HashMap<PathBuf, Arc<FileMetadata>> {
        info!("🏷️ Extracting metadata in parallel...");

        let metadata = extractor.extract_batch(valid, pool, progress);
        self.stats.metadata_fallbacks = metadata.values().filter(|record| record.is_fallback()).count();
        self.stats.cache_hits = extractor.cache_hits();
        metadata
    }

    /// Render one clip per (file, category) pair in sorted file order
    ///
    /// Metadata records are released as they are consumed; the map's storage is
    /// reclaimed every `reclaim_every_batches` batches.
    #[allow(clippy::too_many_arguments)]
    fn group_clips(
        &mut self,
        valid: &[PathBuf],
        metadata: &mut HashMap<PathBuf, Arc<FileMetadata>>,
        dictionary: &CategoryDictionary,
        allocator: &mut SequentialIdAllocator,
        engine: &FragmentTemplateEngine,
        batch_size: usize,
        progress: Option<ProgressCallback<'_>>,
    ) -> Result<CategoryClipMap> {
        info!("🧩 Building clips in batches of {}...", batch_size);

        let total = valid.len();
        let reclaim_every = self.config.generator.reclaim_every_batches.max(1);
        let mut clips = CategoryClipMap::new();
        let mut processed = 0usize;

        for (batch_index, batch) in valid.chunks(batch_size).enumerate() {
            for (offset, path) in batch.iter().enumerate() {
                let position = batch_index * batch_size + offset;
                let record = metadata.remove(path).unwrap_or_else(|| {
                    warn!("No metadata for {}, using fallback", path.display());
                    Arc::new(fallback_metadata(path, dictionary))
                });

                let slot_id = allocator.allocate_local_slot_id(position);
                for category in record.categories() {
                    let clip_id = allocator.allocate_global_id()?;
                    let fragment = engine.render_filled(&record, clip_id, slot_id);
                    clips.entry(category.clone()).or_default().insert(slot_id, fragment);
                    self.stats.clips_created += 1;
                }

                processed += 1;
                let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
                progress::report(progress, processed, total, &format!("Creating clips for {}", name));
            }

            if (batch_index + 1) % reclaim_every == 0 {
                metadata.shrink_to_fit();
                debug!("♻️ Reclaimed metadata storage after batch {}", batch_index + 1);
            }
        }

        self.stats.files_processed = processed;
        if clips.is_empty() {
            return Err(AssemblyError::NoClips.into());
        }

        info!("   {} clips across {} categories", self.stats.clips_created, clips.len());
        Ok(clips)
    }

    // ==========================================
    // TRACK ASSEMBLY
    // ==========================================

    /// Replace every non-return track with one generated track per category
    fn assemble_tracks(
        &mut self,
        document: &mut Element,
        clips: &CategoryClipMap,
        scene_count: usize,
        allocator: &mut SequentialIdAllocator,
        engine: &FragmentTemplateEngine,
    ) -> Result<()> {
        info!("🏗️ Building category tracks...");

        let tracks = document.find_mut("Tracks").ok_or_else(|| AssemblyError::MissingElement {
            element: "Tracks".to_string(),
        })?;

        let reference = tracks
            .find("AudioTrack")
            .cloned()
            .ok_or_else(|| AssemblyError::MissingElement {
                element: "AudioTrack".to_string(),
            })?;

        let mut generated = Vec::with_capacity(clips.len());
        for (category, slots) in clips {
            match build_track(&reference, category, slots, scene_count, allocator, engine) {
                Ok(track) => {
                    debug!("Built track '{}' with {} clips", category, slots.len());
                    generated.push(track);
                }
                Err(e @ AssemblyError::IdSpaceExhausted { .. }) => return Err(e.into()),
                Err(e) => warn!("⚠️ {}", e),
            }
        }

        if generated.is_empty() {
            return Err(AssemblyError::NoTracks.into());
        }

        tracks.retain_elements(|track| track.name == "ReturnTrack");
        let insert_at = tracks.position_of("ReturnTrack").unwrap_or(tracks.children.len());
        self.stats.tracks_created = generated.len();
        for (offset, track) in generated.into_iter().enumerate() {
            tracks.children.insert(insert_at + offset, Node::Element(track));
        }

        info!("   {} tracks, {} scenes", self.stats.tracks_created, scene_count);
        Ok(())
    }
}

/// Clone the reference track for one category and fill its clip slots
pub fn build_track(
    reference: &Element,
    category: &str,
    slots: &BTreeMap<usize, String>,
    scene_count: usize,
    allocator: &mut SequentialIdAllocator,
    engine: &FragmentTemplateEngine,
) -> std::result::Result<Element, AssemblyError> {
    let failed = |reason: &str| AssemblyError::TrackFailed {
        category: category.to_string(),
        reason: reason.to_string(),
    };

    let mut track = reference.clone();
    track.set_attr("Id", allocator.allocate_global_id()?.to_string());

    let label = display_label(category);
    for field in ["EffectiveName", "UserName"] {
        if let Some(name) = track.find_mut(field) {
            name.set_attr("Value", label);
        }
    }

    remap_nested_ids(&mut track, allocator)?;

    let main_sequencer = track
        .find_mut("MainSequencer")
        .ok_or_else(|| failed("track has no MainSequencer"))?;
    main_sequencer.replace_child("ClipSlotList", slot_list(scene_count, |index| {
        slots.get(&index).cloned().unwrap_or_else(|| engine.render_empty(index))
    }));

    if let Some(freeze_sequencer) = track.find_mut("FreezeSequencer") {
        freeze_sequencer.replace_child("ClipSlotList", slot_list(scene_count, |index| engine.render_empty(index)));
    }

    Ok(track)
}

/// Give every positive `Id` below the track root a fresh global identifier
fn remap_nested_ids(
    track: &mut Element,
    allocator: &mut SequentialIdAllocator,
) -> std::result::Result<(), AssemblyError> {
    let mut exhausted = None;
    let mut remap = |element: &mut Element| {
        let positive = element
            .attr("Id")
            .and_then(|id| id.trim().parse::<i64>().ok())
            .map(|id| id > 0)
            .unwrap_or(false);
        if positive && exhausted.is_none() {
            match allocator.allocate_global_id() {
                Ok(id) => element.set_attr("Id", id.to_string()),
                Err(e) => exhausted = Some(e),
            }
        }
    };

    for child in track.elements_mut() {
        child.visit_mut(&mut remap);
    }

    match exhausted {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// A `ClipSlotList` with `count` slots rendered by `fragment`
fn slot_list<F: FnMut(usize) -> String>(count: usize, mut fragment: F) -> Element {
    let mut list = Element::new("ClipSlotList");
    for index in 0..count {
        let xml = fragment(index);
        let slot = Element::parse(&xml).unwrap_or_else(|e| {
            warn!("Clip slot {} could not be parsed ({}), leaving it empty", index, e);
            Element::new("ClipSlot").with_attr("Id", index.to_string())
        });
        list.push(slot);
    }
    list
}

/// `max(8, 1 + highest occupied slot)`
pub fn scene_count(clips: &CategoryClipMap) -> usize {
    clips
        .values()
        .filter_map(|slots| slots.keys().next_back())
        .map(|highest| highest + 1)
        .max()
        .unwrap_or(0)
        .max(MIN_SCENES)
}

/// Replace the scene list with `count` minimal scenes
pub fn rebuild_scenes(document: &mut Element, count: usize) -> std::result::Result<(), AssemblyError> {
    let scenes = document.find_mut("Scenes").ok_or_else(|| AssemblyError::MissingElement {
        element: "Scenes".to_string(),
    })?;

    scenes.clear_children();
    for index in 0..count {
        scenes.push(
            Element::new("Scene")
                .with_attr("Id", index.to_string())
                .with_child(Element::new("LomId").with_attr("Value", "0"))
                .with_child(Element::new("Name").with_attr("Value", ""))
                .with_child(Element::new("ClipSlotsListWrapper").with_attr("LomId", "0")),
        );
    }
    Ok(())
}

fn sort_key(path: &Path) -> (String, String) {
    let parent = path
        .parent()
        .map(|parent| parent.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    (parent, name)
}
