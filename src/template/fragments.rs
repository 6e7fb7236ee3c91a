//! Clip slot fragments rendered from placeholder templates.
//!
//! Both templates are compiled once per engine on first use into a list of
//! literal segments and typed fields, so rendering a slot is a single pass of
//! string pushes with no parsing.

use std::fmt::Write as _;
use std::sync::OnceLock;

use thiserror::Error;
use tracing::warn;

use crate::audio::types::FileMetadata;
use crate::project::output::replace_unsafe_chars;
use crate::template::tree::escape;

/// Display name used when a recording's name is empty after cleaning
pub const PLACEHOLDER_CLIP_NAME: &str = "Unknown_Clip";

const FILLED_SLOT_TEMPLATE: &str = r#"<ClipSlot Id="{slot_id}">
	<LomId Value="0" />
	<ClipSlot>
		<Value>
			<AudioClip Id="{clip_id}" Time="0">
				<LomId Value="0" />
				<CurrentStart Value="0" />
				<CurrentEnd Value="{duration_beats}" />
				<Loop>
					<LoopStart Value="0" />
					<LoopEnd Value="{duration_beats}" />
					<StartRelative Value="0" />
					<LoopOn Value="true" />
					<OutMarker Value="{duration_beats}" />
					<HiddenLoopStart Value="0" />
					<HiddenLoopEnd Value="{duration_beats}" />
				</Loop>
				<Name Value="{clip_name}" />
				<Annotation Value="{annotation}" />
				<Color Value="16" />
				<LaunchMode Value="0" />
				<LaunchQuantisation Value="0" />
				<TimeSignature>
					<TimeSignatures>
						<RemoteableTimeSignature Id="0">
							<Numerator Value="4" />
							<Denominator Value="4" />
							<Time Value="0" />
						</RemoteableTimeSignature>
					</TimeSignatures>
				</TimeSignature>
				<Envelopes>
					<Envelopes />
				</Envelopes>
				<ScrollerTimePreserver>
					<LeftTime Value="0" />
					<RightTime Value="0" />
				</ScrollerTimePreserver>
				<TimeSelection>
					<AnchorTime Value="0" />
					<OtherTime Value="0" />
				</TimeSelection>
				<Legato Value="false" />
				<Ram Value="false" />
				<GrooveSettings>
					<GrooveId Value="-1" />
				</GrooveSettings>
				<Disabled Value="false" />
				<VelocityAmount Value="0" />
				<FollowAction>
					<FollowTime Value="4" />
					<IsLinked Value="true" />
					<LoopIterations Value="1" />
					<FollowActionA Value="4" />
					<FollowActionB Value="0" />
					<FollowChanceA Value="100" />
					<FollowChanceB Value="0" />
					<JumpIndexA Value="1" />
					<JumpIndexB Value="1" />
					<FollowActionEnabled Value="false" />
				</FollowAction>
				<Grid>
					<FixedNumerator Value="1" />
					<FixedDenominator Value="16" />
					<GridIntervalPixel Value="20" />
					<Ntoles Value="2" />
					<SnapToGrid Value="true" />
					<Fixed Value="false" />
				</Grid>
				<FreezeStart Value="0" />
				<FreezeEnd Value="0" />
				<IsWarped Value="true" />
				<TakeId Value="-1" />
				<IsInKey Value="true" />
				<ScaleInformation>
					<Root Value="0" />
					<Name Value="0" />
				</ScaleInformation>
				<SampleRef>
					<FileRef>
						<RelativePathType Value="1" />
						<RelativePath Value="{rel_path}" />
						<Path Value="{abs_path}" />
						<Type Value="2" />
						<LivePackName Value="" />
						<LivePackId Value="" />
						<OriginalFileSize Value="{file_size}" />
						<OriginalCrc Value="{file_crc}" />
					</FileRef>
					<LastModDate Value="{mod_time}" />
					<SourceContext>
						<SourceContext Id="0">
							<OriginalFileRef>
								<FileRef Id="0">
									<RelativePathType Value="1" />
									<RelativePath Value="{rel_path}" />
									<Path Value="{abs_path}" />
									<Type Value="2" />
									<LivePackName Value="" />
									<LivePackId Value="" />
									<OriginalFileSize Value="{file_size}" />
									<OriginalCrc Value="{file_crc}" />
								</FileRef>
							</OriginalFileRef>
							<BrowserContentPath Value="{browser_path}" />
							<LocalFiltersJson Value="" />
						</SourceContext>
					</SourceContext>
					<SampleUsageHint Value="0" />
					<DefaultDuration Value="{frames}" />
					<DefaultSampleRate Value="{sample_rate}" />
					<SamplesToAutoWarp Value="1" />
				</SampleRef>
				<Onsets>
					<UserOnsets />
					<HasUserOnsets Value="false" />
				</Onsets>
				<WarpMode Value="0" />
				<GranularityTones Value="30" />
				<GranularityTexture Value="65" />
				<FluctuationTexture Value="25" />
				<TransientResolution Value="6" />
				<TransientLoopMode Value="2" />
				<TransientEnvelope Value="100" />
				<ComplexProFormants Value="100" />
				<ComplexProEnvelope Value="128" />
				<Sync Value="true" />
				<HiQ Value="true" />
				<Fade Value="true" />
				<Fades>
					<FadeInLength Value="0" />
					<FadeOutLength Value="0" />
					<ClipFadesAreInitialized Value="true" />
					<CrossfadeInState Value="0" />
					<FadeInCurveSkew Value="0" />
					<FadeInCurveSlope Value="0" />
					<FadeOutCurveSkew Value="0" />
					<FadeOutCurveSlope Value="0" />
					<IsDefaultFadeIn Value="true" />
					<IsDefaultFadeOut Value="true" />
				</Fades>
				<PitchCoarse Value="0" />
				<PitchFine Value="0" />
				<SampleVolume Value="1" />
				<WarpMarkers>
					<WarpMarker Id="0" SecTime="0" BeatTime="0" />
					<WarpMarker Id="1" SecTime="{duration_seconds}" BeatTime="{duration_beats}" />
				</WarpMarkers>
				<SavedWarpMarkersForStretched />
				<MarkersGenerated Value="true" />
				<IsSongTempoLeader Value="false" />
			</AudioClip>
		</Value>
	</ClipSlot>
	<HasStop Value="true" />
	<NeedRefreeze Value="true" />
</ClipSlot>"#;

const EMPTY_SLOT_TEMPLATE: &str = r#"<ClipSlot Id="{slot_id}">
	<LomId Value="0" />
	<ClipSlot>
		<Value />
	</ClipSlot>
	<HasStop Value="true" />
	<NeedRefreeze Value="true" />
</ClipSlot>"#;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FragmentError {
    #[error("Unknown placeholder '{{{0}}}' in fragment template")]
    UnknownPlaceholder(String),

    #[error("Unterminated placeholder in fragment template")]
    Unterminated,

    #[error("Recording path has no file name: {0}")]
    NoFileName(String),
}

/// Values substituted into a fragment template
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    SlotId,
    ClipId,
    DurationBeats,
    DurationSeconds,
    ClipName,
    Annotation,
    RelPath,
    AbsPath,
    BrowserPath,
    FileSize,
    FileCrc,
    ModTime,
    Frames,
    SampleRate,
}

impl Field {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "slot_id" => Self::SlotId,
            "clip_id" => Self::ClipId,
            "duration_beats" => Self::DurationBeats,
            "duration_seconds" => Self::DurationSeconds,
            "clip_name" => Self::ClipName,
            "annotation" => Self::Annotation,
            "rel_path" => Self::RelPath,
            "abs_path" => Self::AbsPath,
            "browser_path" => Self::BrowserPath,
            "file_size" => Self::FileSize,
            "file_crc" => Self::FileCrc,
            "mod_time" => Self::ModTime,
            "frames" => Self::Frames,
            "sample_rate" => Self::SampleRate,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone)]
enum Segment {
    Literal(&'static str),
    Field(Field),
}

/// A template split into literal text and placeholders
#[derive(Debug, Clone)]
struct CompiledTemplate {
    segments: Vec<Segment>,
    literal_len: usize,
}

impl CompiledTemplate {
    fn compile(source: &'static str) -> Result<Self, FragmentError> {
        let mut segments = Vec::new();
        let mut rest = source;

        while let Some(open) = rest.find('{') {
            if open > 0 {
                segments.push(Segment::Literal(&rest[..open]));
            }
            let after = &rest[open + 1..];
            let close = after.find('}').ok_or(FragmentError::Unterminated)?;
            let name = &after[..close];
            let field = Field::from_name(name).ok_or_else(|| FragmentError::UnknownPlaceholder(name.to_string()))?;
            segments.push(Segment::Field(field));
            rest = &after[close + 1..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest));
        }

        let literal_len = segments
            .iter()
            .map(|segment| match segment {
                Segment::Literal(text) => text.len(),
                Segment::Field(_) => 0,
            })
            .sum();

        Ok(Self { segments, literal_len })
    }

    fn render(&self, values: &SlotValues) -> String {
        let mut out = String::with_capacity(self.literal_len + 512);
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field(field) => values.write(*field, &mut out),
            }
        }
        out
    }
}

/// Escaped, ready-to-insert values for one slot
#[derive(Debug, Default)]
struct SlotValues {
    slot_id: usize,
    clip_id: i64,
    duration: f64,
    clip_name: String,
    annotation: String,
    rel_path: String,
    abs_path: String,
    browser_path: String,
    file_size: u64,
    file_crc: u32,
    mod_time: i64,
    frames: u64,
    sample_rate: u32,
}

impl SlotValues {
    fn write(&self, field: Field, out: &mut String) {
        // Writing into a String cannot fail
        let _ = match field {
            Field::ClipName => return out.push_str(&self.clip_name),
            Field::Annotation => return out.push_str(&self.annotation),
            Field::RelPath => return out.push_str(&self.rel_path),
            Field::AbsPath => return out.push_str(&self.abs_path),
            Field::BrowserPath => return out.push_str(&self.browser_path),
            Field::SlotId => write!(out, "{}", self.slot_id),
            Field::ClipId => write!(out, "{}", self.clip_id),
            Field::DurationBeats | Field::DurationSeconds => write!(out, "{}", self.duration),
            Field::FileSize => write!(out, "{}", self.file_size),
            Field::FileCrc => write!(out, "{}", self.file_crc),
            Field::ModTime => write!(out, "{}", self.mod_time),
            Field::Frames => write!(out, "{}", self.frames),
            Field::SampleRate => write!(out, "{}", self.sample_rate),
        };
    }
}

/// Renders filled and empty clip slots for one generation run
#[derive(Debug, Default)]
pub struct FragmentTemplateEngine {
    filled: OnceLock<Result<CompiledTemplate, FragmentError>>,
    empty: OnceLock<Result<CompiledTemplate, FragmentError>>,
}

impl FragmentTemplateEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile both templates now instead of on first render
    pub fn prepare(&self) -> Result<(), FragmentError> {
        self.filled_template()?;
        self.empty_template()?;
        Ok(())
    }

    /// A slot holding an audio clip for `metadata`
    ///
    /// Falls back to an empty slot with the same id if the fragment cannot be built.
    pub fn render_filled(&self, metadata: &FileMetadata, clip_id: i64, slot_id: usize) -> String {
        match self.try_render_filled(metadata, clip_id, slot_id) {
            Ok(fragment) => fragment,
            Err(e) => {
                warn!("Failed to create clip for {}: {}", metadata.path().display(), e);
                self.render_empty(slot_id)
            }
        }
    }

    pub fn try_render_filled(
        &self,
        metadata: &FileMetadata,
        clip_id: i64,
        slot_id: usize,
    ) -> Result<String, FragmentError> {
        let template = self.filled_template()?;

        let path = metadata.path();
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| FragmentError::NoFileName(path.display().to_string()))?;
        let stem = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();

        let values = SlotValues {
            slot_id,
            clip_id,
            duration: metadata.duration(),
            clip_name: escape(&clip_name(&stem, metadata.comment())),
            annotation: escape(metadata.comment().trim()),
            rel_path: xml_safe_path(&format!("../{}", file_name)),
            abs_path: xml_safe_path(&path.to_string_lossy()),
            browser_path: xml_safe_path(&format!("userfolder:{}#{}", path.to_string_lossy(), file_name)),
            file_size: metadata.size(),
            file_crc: metadata.integrity_tag(),
            mod_time: metadata.modified(),
            frames: metadata.frames(),
            sample_rate: metadata.sample_rate(),
        };

        Ok(template.render(&values))
    }

    /// An empty slot shell
    pub fn render_empty(&self, slot_id: usize) -> String {
        match self.empty_template() {
            Ok(template) => template.render(&SlotValues {
                slot_id,
                ..SlotValues::default()
            }),
            Err(_) => format!("<ClipSlot Id=\"{}\" />", slot_id),
        }
    }

    fn filled_template(&self) -> Result<&CompiledTemplate, FragmentError> {
        self.filled
            .get_or_init(|| CompiledTemplate::compile(FILLED_SLOT_TEMPLATE))
            .as_ref()
            .map_err(Clone::clone)
    }

    fn empty_template(&self) -> Result<&CompiledTemplate, FragmentError> {
        self.empty
            .get_or_init(|| CompiledTemplate::compile(EMPTY_SLOT_TEMPLATE))
            .as_ref()
            .map_err(Clone::clone)
    }
}

/// `"<stem> [<comment>]"`, or just the stem when there is no comment
///
/// Whitespace runs in the comment, line breaks included, become single spaces.
fn clip_name(stem: &str, comment: &str) -> String {
    let base = replace_unsafe_chars(stem);
    let base = base.trim();
    let comment = comment.split_whitespace().collect::<Vec<_>>().join(" ");

    let name = if comment.is_empty() {
        base.to_string()
    } else {
        format!("{} [{}]", base, comment).trim().to_string()
    };

    if name.is_empty() {
        PLACEHOLDER_CLIP_NAME.to_string()
    } else {
        name
    }
}

/// Forward slashes, then markup escaping
pub fn xml_safe_path(path: &str) -> String {
    escape(&path.replace('\\', "/"))
}
