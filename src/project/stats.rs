use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Pipeline stage of a generation run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Stage {
    #[default]
    Idle,
    LoadTemplate,
    Discover,
    Validate,
    ExtractMetadata,
    AllocateAndGroup,
    AssembleTracks,
    FinalizeIds,
    Serialize,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::LoadTemplate => "load template",
            Self::Discover => "discover",
            Self::Validate => "validate",
            Self::ExtractMetadata => "extract metadata",
            Self::AllocateAndGroup => "allocate and group",
            Self::AssembleTracks => "assemble tracks",
            Self::FinalizeIds => "finalize ids",
            Self::Serialize => "serialize",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Counters and outcome of the most recent generation run
#[derive(Debug, Clone, Default)]
pub struct GenerationStats {
    pub files_discovered: usize,
    pub files_valid: usize,
    pub files_rejected: usize,
    pub files_processed: usize,
    pub metadata_fallbacks: usize,
    pub cache_hits: usize,
    pub clips_created: usize,
    pub tracks_created: usize,
    pub scene_count: usize,
    pub template_id_count: usize,
    pub ids_allocated: usize,
    pub next_pointer: i64,
    pub elapsed: Duration,
    pub output_path: Option<PathBuf>,
    pub output_size: u64,

    /// Last stage entered; `Failed` when the run stopped early
    pub stage: Stage,

    /// Stage that was running when the run failed
    pub failed_stage: Option<Stage>,
    pub failure_reason: Option<String>,
}

impl GenerationStats {
    pub fn succeeded(&self) -> bool {
        self.stage == Stage::Done
    }

    /// Average processing time per file in seconds
    pub fn seconds_per_file(&self) -> f64 {
        if self.files_processed == 0 {
            return 0.0;
        }
        self.elapsed.as_secs_f64() / self.files_processed as f64
    }
}
