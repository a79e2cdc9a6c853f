//! Reversible remote identifiers for local resources.
//!
//! A resource identifier is `BASE32(absolute_path) + "-" + file_name`. The
//! padded RFC 4648 base-32 alphabet is `A-Z`, `2-7` and `=`, so the first
//! `-` in an identifier always separates the encoded path from the name, and
//! the name itself may contain further `-` characters.

use data_encoding::BASE32;
use std::path::{Path, PathBuf};

use crate::error::{Result, SavezoneError};

/// Separates the encoded path from the file name.
pub const DELIMITER: char = '-';

/// Encode an absolute local path into a remote-safe identifier.
pub fn encode(absolute_path: &Path) -> Result<String> {
    if !absolute_path.is_absolute() {
        return Err(SavezoneError::Validation(format!(
            "{} is not an absolute path",
            absolute_path.display()
        )));
    }
    let path = absolute_path.to_str().ok_or_else(|| {
        SavezoneError::Validation(format!(
            "{} is not valid UTF-8",
            absolute_path.display()
        ))
    })?;
    let name = file_name(absolute_path)?;
    Ok(format!(
        "{}{DELIMITER}{name}",
        BASE32.encode(path.as_bytes())
    ))
}

/// Decode an identifier back into `(absolute_path, file_name)`.
pub fn decode(token: &str) -> Result<(PathBuf, String)> {
    let (encoded, name) = token
        .split_once(DELIMITER)
        .ok_or_else(|| SavezoneError::Format(format!("no '{DELIMITER}' in {token:?}")))?;
    if encoded.is_empty() || name.is_empty() {
        return Err(SavezoneError::Format(format!(
            "empty path or name in {token:?}"
        )));
    }

    let bytes = BASE32
        .decode(encoded.as_bytes())
        .map_err(|e| SavezoneError::Format(format!("{token:?}: {e}")))?;
    let path = String::from_utf8(bytes)
        .map(PathBuf::from)
        .map_err(|_| SavezoneError::Format(format!("{token:?}: path is not UTF-8")))?;

    // The name half must agree with the encoded path, otherwise the split
    // point was wrong.
    if file_name(&path).ok().as_deref() != Some(name) {
        return Err(SavezoneError::Format(format!(
            "{token:?}: name {name:?} does not match {}",
            path.display()
        )));
    }

    Ok((path, name.to_string()))
}

fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| {
            SavezoneError::Validation(format!("{} has no file name", path.display()))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(path: &str) {
        let token = encode(Path::new(path)).unwrap();
        let (decoded, name) = decode(&token).unwrap();
        assert_eq!(decoded, PathBuf::from(path));
        assert_eq!(name, Path::new(path).file_name().unwrap().to_str().unwrap());
    }

    #[test]
    fn known_encoding() {
        let token = encode(Path::new("/tmp/report.pdf")).unwrap();
        assert_eq!(token, "F52G24BPOJSXA33SOQXHAZDG-report.pdf");
    }

    #[test]
    fn roundtrips() {
        roundtrip("/tmp/report.pdf");
        roundtrip("/home/user/My Documents/notes 2024.txt");
        roundtrip("/home/пользователь/отчёт.docx");
        roundtrip("/srv/data/my-file-with-dashes.tar");
        roundtrip("/var/backups");
    }

    #[test]
    fn token_uses_no_delimiter_before_name() {
        let token = encode(Path::new("/a-b/c-d")).unwrap();
        let (encoded, name) = token.split_once(DELIMITER).unwrap();
        assert!(!encoded.contains(DELIMITER));
        assert_eq!(name, "c-d");
    }

    #[test]
    fn relative_path_is_rejected() {
        assert!(matches!(
            encode(Path::new("relative/file.txt")),
            Err(SavezoneError::Validation(_))
        ));
    }

    #[test]
    fn missing_delimiter_is_format_error() {
        assert!(matches!(
            decode("F52G24BPOJSXA33SOQXHAZDG"),
            Err(SavezoneError::Format(_))
        ));
    }

    #[test]
    fn invalid_base32_is_format_error() {
        assert!(matches!(
            decode("not_base32!-report.pdf"),
            Err(SavezoneError::Format(_))
        ));
    }

    #[test]
    fn mismatched_name_is_format_error() {
        assert!(matches!(
            decode("F52G24BPOJSXA33SOQXHAZDG-other.pdf"),
            Err(SavezoneError::Format(_))
        ));
    }

    #[test]
    fn empty_halves_are_format_errors() {
        assert!(decode("-report.pdf").is_err());
        assert!(decode("F52G24BPOJSXA33SOQXHAZDG-").is_err());
    }
}
