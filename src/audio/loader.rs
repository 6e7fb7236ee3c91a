use std::fs::File;
use std::path::Path;

use symphonia::core::codecs::CODEC_TYPE_NULL;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::debug;

use crate::audio::types::AudioProperties;
use crate::error::MetadataError;

/// Reads audio properties from a container header without decoding samples
pub struct AudioLoader;

impl AudioLoader {
    /// Probe a recording's sample rate, frame count and channel count
    ///
    /// hound is tried first since it is the most reliable WAV reader; symphonia
    /// takes over for headers hound refuses (unusual WAVE_FORMAT_EXTENSIBLE
    /// layouts, for instance).
    pub fn probe<P: AsRef<Path>>(path: P) -> Result<AudioProperties, MetadataError> {
        let path = path.as_ref();

        let properties = match Self::probe_wav(path) {
            Ok(properties) => properties,
            Err(hound_error) => {
                debug!("hound could not read {}: {}, trying symphonia", path.display(), hound_error);
                Self::probe_with_symphonia(path).map_err(|reason| MetadataError::UnreadableContainer {
                    path: path.to_path_buf(),
                    reason: format!("{}; {}", hound_error, reason),
                })?
            }
        };

        Self::check(path, properties)
    }

    /// Read the WAV header with hound
    fn probe_wav(path: &Path) -> Result<AudioProperties, String> {
        let reader = hound::WavReader::open(path).map_err(|e| format!("hound: {}", e))?;
        let spec = reader.spec();

        Ok(AudioProperties {
            sample_rate: spec.sample_rate,
            frames: reader.duration() as u64,
            channels: spec.channels,
        })
    }

    /// Read codec parameters with symphonia's format probe
    fn probe_with_symphonia(path: &Path) -> Result<AudioProperties, String> {
        let file = File::open(path).map_err(|e| format!("symphonia: {}", e))?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
            hint.with_extension(extension);
        }

        let meta_opts: MetadataOptions = Default::default();
        let fmt_opts: FormatOptions = Default::default();

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &fmt_opts, &meta_opts)
            .map_err(|e| format!("symphonia: {}", e))?;

        let track = probed
            .format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| "symphonia: no decodable track".to_string())?;

        let params = &track.codec_params;
        let sample_rate = params
            .sample_rate
            .ok_or_else(|| "symphonia: no sample rate found".to_string())?;
        let channels = params
            .channels
            .map(|channels| channels.count() as u16)
            .ok_or_else(|| "symphonia: no channel information found".to_string())?;
        let frames = params
            .n_frames
            .ok_or_else(|| "symphonia: unknown frame count".to_string())?;

        Ok(AudioProperties {
            sample_rate,
            frames,
            channels,
        })
    }

    fn check(path: &Path, properties: AudioProperties) -> Result<AudioProperties, MetadataError> {
        if properties.sample_rate == 0 || properties.channels == 0 {
            return Err(MetadataError::InvalidParameters {
                path: path.to_path_buf(),
                details: format!(
                    "{} Hz, {} channels",
                    properties.sample_rate, properties.channels
                ),
            });
        }
        Ok(properties)
    }
}
