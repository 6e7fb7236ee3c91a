use std::io::Read;
use std::path::Path;

use flate2::read::GzDecoder;
use tracing::{debug, info};

use crate::error::TemplateError;
use crate::template::tree::Element;

/// Root element of every Live set
pub const ROOT_ELEMENT: &str = "Ableton";

/// Elements a template must contain to be usable
pub const REQUIRED_ELEMENTS: [&str; 4] = ["Tracks", "Scenes", "AudioTrack", "NextPointeeId"];

/// Load, decode and structurally validate a Live set template
///
/// Templates are normally gzip-compressed `.als` files, but plain XML is
/// accepted as well.
pub fn load_template<P: AsRef<Path>>(path: P) -> Result<Element, TemplateError> {
    let path = path.as_ref();
    info!("📋 Loading template: {}", path.display());

    if !path.is_file() {
        return Err(TemplateError::NotFound {
            path: path.display().to_string(),
        });
    }

    let bytes = std::fs::read(path).map_err(|e| TemplateError::ReadFailed {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    let text = decode(&bytes).ok_or_else(|| TemplateError::ReadFailed {
        path: path.display().to_string(),
        reason: "neither gzip-compressed nor UTF-8 XML".to_string(),
    })?;

    let root = Element::parse(&text).map_err(|e| TemplateError::ParseFailed {
        reason: e.to_string(),
    })?;

    validate_structure(&root)?;
    debug!("Template root has {} top-level elements", root.elements().count());

    Ok(root)
}

/// Gzip first, plain text second
fn decode(bytes: &[u8]) -> Option<String> {
    let mut text = String::new();
    match GzDecoder::new(bytes).read_to_string(&mut text) {
        Ok(_) => {
            debug!("Template is gzip-compressed");
            Some(text)
        }
        Err(e) => {
            debug!("Template is not gzip ({}), reading as plain XML", e);
            String::from_utf8(bytes.to_vec()).ok()
        }
    }
}

/// Check the root tag and the presence of every required element
pub fn validate_structure(root: &Element) -> Result<(), TemplateError> {
    if root.name != ROOT_ELEMENT {
        return Err(TemplateError::WrongRoot {
            found: root.name.clone(),
            expected: ROOT_ELEMENT.to_string(),
        });
    }

    let missing: Vec<String> = REQUIRED_ELEMENTS
        .iter()
        .filter(|name| root.find(name).is_none())
        .map(|name| name.to_string())
        .collect();

    if !missing.is_empty() {
        return Err(TemplateError::MissingElements { missing });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{write_bytes, write_gzip_template, write_template};
    use tempfile::tempdir;

    #[test]
    fn test_loads_plain_and_gzip_templates() {
        let dir = tempdir().unwrap();
        let plain = load_template(write_template(dir.path(), "plain.als", true)).unwrap();
        let gzip = load_template(write_gzip_template(dir.path(), "packed.als")).unwrap();

        assert_eq!(plain, gzip);
        assert_eq!(plain.name, "Ableton");
    }

    #[test]
    fn test_missing_file() {
        let dir = tempdir().unwrap();
        let result = load_template(dir.path().join("absent.als"));
        assert!(matches!(result, Err(TemplateError::NotFound { .. })));
    }

    #[test]
    fn test_missing_scenes_is_reported() {
        let dir = tempdir().unwrap();
        let result = load_template(write_template(dir.path(), "noscenes.als", false));
        match result {
            Err(TemplateError::MissingElements { missing }) => assert_eq!(missing, vec!["Scenes".to_string()]),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_wrong_root() {
        let dir = tempdir().unwrap();
        let path = write_bytes(dir.path(), "other.xml", b"<Project><Tracks /></Project>");
        assert!(matches!(load_template(path), Err(TemplateError::WrongRoot { .. })));
    }

    #[test]
    fn test_garbage_is_a_parse_error() {
        let dir = tempdir().unwrap();
        let path = write_bytes(dir.path(), "bad.als", b"<Ableton><Tracks></Ableton>");
        assert!(matches!(load_template(path), Err(TemplateError::ParseFailed { .. })));
    }
}
