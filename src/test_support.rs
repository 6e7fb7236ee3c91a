//! Fixtures shared by the unit tests: synthetic WAV files and a small Live set template.

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;

/// Frames in every synthesized recording
pub const FIXTURE_FRAMES: u32 = 2_000;

/// Highest `Id` attribute in [`template_xml`]
pub const TEMPLATE_MAX_ID: i64 = 31;

/// `NextPointeeId` value in [`template_xml`]
pub const TEMPLATE_NEXT_POINTEE: i64 = 40;

/// A 44.1 kHz mono 16-bit WAV file held in memory
pub fn wav_bytes(frames: u32) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 44_100,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for i in 0..frames {
            let sample = ((i as f32 * 0.05).sin() * 8_000.0) as i16;
            writer.write_sample(sample).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

/// A 64-bit IEEE float WAV file, which hound refuses but symphonia reads
pub fn float64_wav_bytes(frames: u32, sample_rate: u32, channels: u16) -> Vec<u8> {
    let block_align = channels * 8;
    let data_len = frames * block_align as u32;

    let mut bytes = b"RIFF".to_vec();
    bytes.extend_from_slice(&(4 + 24 + 8 + data_len).to_le_bytes());
    bytes.extend_from_slice(b"WAVEfmt ");
    bytes.extend_from_slice(&16u32.to_le_bytes());
    bytes.extend_from_slice(&3u16.to_le_bytes());
    bytes.extend_from_slice(&channels.to_le_bytes());
    bytes.extend_from_slice(&sample_rate.to_le_bytes());
    bytes.extend_from_slice(&(sample_rate * block_align as u32).to_le_bytes());
    bytes.extend_from_slice(&block_align.to_le_bytes());
    bytes.extend_from_slice(&64u16.to_le_bytes());
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&data_len.to_le_bytes());
    for i in 0..frames * channels as u32 {
        bytes.extend_from_slice(&((i as f64 * 0.01).sin() * 0.25).to_le_bytes());
    }
    bytes
}

/// Append a complete chunk to a RIFF stream and patch the RIFF size
pub fn append_chunk(riff: &mut Vec<u8>, chunk: &[u8]) {
    riff.extend_from_slice(chunk);
    let riff_size = (riff.len() - 8) as u32;
    riff[4..8].copy_from_slice(&riff_size.to_le_bytes());
}

/// A `LIST/INFO` chunk with the given fields, NUL-terminated and padded
pub fn info_chunk(fields: &[(&[u8; 4], &str)]) -> Vec<u8> {
    let mut body = b"INFO".to_vec();
    for (id, value) in fields {
        let mut data = value.as_bytes().to_vec();
        data.push(0);
        body.extend_from_slice(*id);
        body.extend_from_slice(&(data.len() as u32).to_le_bytes());
        body.extend_from_slice(&data);
        if data.len() % 2 == 1 {
            body.push(0);
        }
    }

    let mut chunk = b"LIST".to_vec();
    chunk.extend_from_slice(&(body.len() as u32).to_le_bytes());
    chunk.extend_from_slice(&body);
    chunk
}

pub fn write_bytes(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

/// Write a WAV recording, with an `ICMT` comment when `comment` is given
pub fn write_tagged_wav(dir: &Path, name: &str, comment: Option<&str>) -> PathBuf {
    let mut bytes = wav_bytes(FIXTURE_FRAMES);
    if let Some(comment) = comment {
        append_chunk(&mut bytes, &info_chunk(&[(b"ICMT", comment)]));
    }
    write_bytes(dir, name, &bytes)
}

/// A file that passes validation but that no prober can read
pub fn write_corrupt_wav(dir: &Path, name: &str) -> PathBuf {
    let mut bytes = b"RIFF\xff\x0f\x00\x00WAVE".to_vec();
    bytes.extend(std::iter::repeat(0xAB).take(4096));
    write_bytes(dir, name, &bytes)
}

/// Minimal Live set: two audio tracks, a MIDI track, one return track and two scenes
pub fn template_xml(with_scenes: bool) -> String {
    let scenes = if with_scenes {
        r#"
		<Scenes>
			<Scene Id="28">
				<LomId Value="0" />
				<Name Value="Intro" />
			</Scene>
			<Scene Id="29">
				<LomId Value="0" />
				<Name Value="" />
			</Scene>
		</Scenes>"#
    } else {
        ""
    };

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<Ableton MajorVersion="5" MinorVersion="11.0_433" Creator="Ableton Live 11.3.4" Revision="">
	<LiveSet>
		<NextPointeeId Value="{next}" />
		<OverwriteProtectionNumber Value="2816" />
		<LomId Value="0" />
		<Tracks>
			<AudioTrack Id="8">
				<LomId Value="0" />
				<TrackGroupId Value="-1" />
				<Name>
					<EffectiveName Value="1-Audio" />
					<UserName Value="" />
					<Annotation Value="" />
				</Name>
				<DeviceChain>
					<AutomationLanes>
						<AutomationLane Id="0">
							<LaneHeight Value="68" />
						</AutomationLane>
					</AutomationLanes>
					<Mixer>
						<Volume>
							<AutomationTarget Id="12">
								<LockEnvelope Value="0" />
							</AutomationTarget>
							<ModulationTarget Id="13">
								<LockEnvelope Value="0" />
							</ModulationTarget>
						</Volume>
						<Pan>
							<AutomationTarget Id="14" />
						</Pan>
					</Mixer>
					<MainSequencer>
						<LomId Value="0" />
						<ClipSlotList>
							<ClipSlot Id="0">
								<LomId Value="0" />
								<ClipSlot>
									<Value />
								</ClipSlot>
							</ClipSlot>
						</ClipSlotList>
						<MonitoringEnum Value="1" />
						<PitchViewId Value="15" />
					</MainSequencer>
					<FreezeSequencer>
						<ClipSlotList>
							<ClipSlot Id="0" />
						</ClipSlotList>
						<Pointee Id="16" />
					</FreezeSequencer>
				</DeviceChain>
			</AudioTrack>
			<AudioTrack Id="9">
				<LomId Value="0" />
				<Name>
					<EffectiveName Value="2-Audio" />
					<UserName Value="" />
				</Name>
				<DeviceChain>
					<MainSequencer>
						<ClipSlotList />
					</MainSequencer>
					<Pointee Id="20" />
				</DeviceChain>
			</AudioTrack>
			<MidiTrack Id="10">
				<Name>
					<EffectiveName Value="3-MIDI" />
				</Name>
				<Pointee Id="21" />
			</MidiTrack>
			<ReturnTrack Id="11">
				<Name>
					<EffectiveName Value="A-Reverb" />
				</Name>
				<Pointee Id="22" />
			</ReturnTrack>
		</Tracks>
		<MasterTrack>
			<Pointee Id="30" />
			<AutomationTarget Id="{max}" />
		</MasterTrack>{scenes}
	</LiveSet>
</Ableton>
"#,
        next = TEMPLATE_NEXT_POINTEE,
        max = TEMPLATE_MAX_ID,
        scenes = scenes,
    )
}

/// Write [`template_xml`] as a plain XML file
pub fn write_template(dir: &Path, name: &str, with_scenes: bool) -> PathBuf {
    write_bytes(dir, name, template_xml(with_scenes).as_bytes())
}

/// Write [`template_xml`] gzip-compressed, the way Live stores `.als` files
pub fn write_gzip_template(dir: &Path, name: &str) -> PathBuf {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(template_xml(true).as_bytes()).unwrap();
    write_bytes(dir, name, &encoder.finish().unwrap())
}
