//! Minimal RIFF/WAVE chunk walker for the `LIST/INFO` metadata block.
//!
//! Only the chunk headers are read while walking; sample data is skipped by
//! seeking so large recordings cost a handful of small reads.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

/// INFO sub-chunk holding the free-text comment
pub const COMMENT_ID: &[u8; 4] = b"ICMT";

/// INFO lists larger than this are skipped rather than buffered
const MAX_INFO_LEN: u64 = 1024 * 1024;

/// Read the `ICMT` comment of a WAV file, if it has one
pub fn read_comment<P: AsRef<Path>>(path: P) -> io::Result<Option<String>> {
    let file = File::open(path)?;
    read_info_field(BufReader::new(file), COMMENT_ID)
}

/// Walk the chunks of a RIFF/WAVE stream and return one INFO field
pub fn read_info_field<R: Read + Seek>(mut reader: R, field: &[u8; 4]) -> io::Result<Option<String>> {
    let mut riff = [0u8; 12];
    reader.read_exact(&mut riff)?;
    if &riff[0..4] != b"RIFF" || &riff[8..12] != b"WAVE" {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "not a RIFF/WAVE stream"));
    }

    let mut found = None;
    loop {
        let mut header = [0u8; 8];
        match reader.read_exact(&mut header) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e),
        }

        let id = [header[0], header[1], header[2], header[3]];
        let size = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as u64;
        let padded = size + (size & 1);

        if &id == b"LIST" && size >= 4 {
            let mut list_type = [0u8; 4];
            reader.read_exact(&mut list_type)?;
            if &list_type == b"INFO" && size <= MAX_INFO_LEN {
                let mut body = vec![0u8; (size - 4) as usize];
                if reader.read_exact(&mut body).is_err() {
                    break;
                }
                if let Some(value) = parse_info_body(&body, field) {
                    found = Some(value);
                }
                reader.seek(SeekFrom::Current((padded - size) as i64))?;
            } else {
                reader.seek(SeekFrom::Current((padded - 4) as i64))?;
            }
        } else {
            reader.seek(SeekFrom::Current(padded as i64))?;
        }
    }

    Ok(found.filter(|value: &String| !value.is_empty()))
}

/// Find `field` among the sub-chunks of an INFO list body (after the `INFO` tag)
fn parse_info_body(body: &[u8], field: &[u8; 4]) -> Option<String> {
    let mut pos = 0usize;
    let mut found = None;

    while pos + 8 <= body.len() {
        let id = &body[pos..pos + 4];
        let size = u32::from_le_bytes([body[pos + 4], body[pos + 5], body[pos + 6], body[pos + 7]]) as usize;
        let start = pos + 8;
        let end = start.saturating_add(size).min(body.len());

        if id == field {
            let text = String::from_utf8_lossy(&body[start..end]);
            found = Some(text.trim_matches(char::from(0)).trim().to_string());
        }

        pos = start.saturating_add(size).saturating_add(size & 1);
    }

    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{info_chunk, wav_bytes};
    use std::io::Cursor;

    #[test]
    fn test_reads_comment_after_data_chunk() {
        let mut bytes = wav_bytes(2_000);
        crate::test_support::append_chunk(&mut bytes, &info_chunk(&[(b"INAM", "Dawn"), (b"ICMT", "forest, bird")]));

        let comment = read_info_field(Cursor::new(bytes), COMMENT_ID).unwrap();
        assert_eq!(comment.as_deref(), Some("forest, bird"));
    }

    #[test]
    fn test_odd_sized_fields_are_padded() {
        let mut bytes = wav_bytes(100);
        crate::test_support::append_chunk(&mut bytes, &info_chunk(&[(b"IART", "abc"), (b"ICMT", "rain")]));

        let comment = read_info_field(Cursor::new(bytes), COMMENT_ID).unwrap();
        assert_eq!(comment.as_deref(), Some("rain"));
    }

    #[test]
    fn test_missing_comment_is_none() {
        let bytes = wav_bytes(100);
        assert_eq!(read_info_field(Cursor::new(bytes), COMMENT_ID).unwrap(), None);
    }

    #[test]
    fn test_blank_comment_is_none() {
        let mut bytes = wav_bytes(100);
        crate::test_support::append_chunk(&mut bytes, &info_chunk(&[(b"ICMT", "   ")]));
        assert_eq!(read_info_field(Cursor::new(bytes), COMMENT_ID).unwrap(), None);
    }

    #[test]
    fn test_non_wave_stream_is_an_error() {
        let result = read_info_field(Cursor::new(b"OggS0000000000000000".to_vec()), COMMENT_ID);
        assert!(result.is_err());
    }
}
