//! Format classification of staged audio/video objects.

use std::path::Path;

use dp_core::{Error, PackageFormat, Result};

const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav"];
const VIDEO_EXTENSIONS: &[&str] = &["mkv", "mov", "mp4"];

pub(crate) fn has_extension(name: &str, wanted: &[&str]) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| wanted.iter().any(|w| ext.eq_ignore_ascii_case(w)))
}

/// Derive the package format from the staged file names.
///
/// # Errors
///
/// [`Error::UnrecognizedFormat`] if no file is audio or video, and
/// [`Error::AmbiguousFormat`] if both kinds are present.
pub fn classify(files: &[String]) -> Result<PackageFormat> {
    let audio = files.iter().any(|f| has_extension(f, AUDIO_EXTENSIONS));
    let video = files.iter().any(|f| has_extension(f, VIDEO_EXTENSIONS));

    match (audio, video) {
        (true, false) => Ok(PackageFormat::Audio),
        (false, true) => Ok(PackageFormat::Video),
        (true, true) => Err(Error::AmbiguousFormat {
            files: files.to_vec(),
        }),
        (false, false) => Err(Error::UnrecognizedFormat {
            files: files.to_vec(),
        }),
    }
}

/// Sorted names of the regular files directly inside `dir`.
pub fn list_staged_files(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|e| Error::file(dir, e))? {
        let entry = entry.map_err(|e| Error::file(dir, e))?;
        if entry.file_type().map_err(|e| Error::file(entry.path(), e))?.is_file() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn audio() {
        assert_eq!(
            classify(&names(&["abc.mp3", "abc.wav"])).unwrap(),
            PackageFormat::Audio
        );
    }

    #[test]
    fn video() {
        assert_eq!(
            classify(&names(&["abc.mkv", "abc.mov", "abc.mp4"])).unwrap(),
            PackageFormat::Video
        );
    }

    #[test]
    fn extensions_are_case_insensitive() {
        assert_eq!(classify(&names(&["ABC.MP4"])).unwrap(), PackageFormat::Video);
        assert_eq!(classify(&names(&["abc.Wav"])).unwrap(), PackageFormat::Audio);
    }

    #[test]
    fn unrecognized() {
        let err = classify(&names(&["abc.txt", "abc.pdf"])).unwrap_err();
        assert_matches!(err, Error::UnrecognizedFormat { ref files } if files.len() == 2);
        assert!(err.to_string().contains("abc.txt"));
        assert_matches!(classify(&[]), Err(Error::UnrecognizedFormat { .. }));
    }

    #[test]
    fn mixed_signals_are_ambiguous() {
        assert_matches!(
            classify(&names(&["abc.mp3", "abc.mp4"])),
            Err(Error::AmbiguousFormat { .. })
        );
    }

    #[test]
    fn lists_only_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.mp3"), b"x").unwrap();
        std::fs::write(dir.path().join("a.wav"), b"x").unwrap();
        std::fs::create_dir(dir.path().join("c.mp4")).unwrap();
        assert_eq!(list_staged_files(dir.path()).unwrap(), vec!["a.wav", "b.mp3"]);
    }
}
