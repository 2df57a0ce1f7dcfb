//! Poster frame extraction with ffmpeg's `thumbnail` filter.
//!
//! The filter scores batches of frames and keeps the one closest to the
//! batch's average histogram, which skips black leaders and flash frames
//! that a fixed timestamp would land on.

use std::path::{Path, PathBuf};

use crate::command::ToolCommand;
use crate::tools::ToolRegistry;

/// File name of the generated poster inside the staged directory.
pub const POSTER_FILE_NAME: &str = "poster.png";

/// Master video extensions in order of preference.
const MASTER_EXTENSIONS: &[&str] = &["mov", "mkv", "mp4"];

/// Pick the master video to extract the poster from.
///
/// Returns the first file matching the preferred extensions (`mov`, then
/// `mkv`, then `mp4`); ties within an extension go to the lexically smallest
/// name so the choice is stable.
///
/// # Errors
///
/// Returns [`dp_core::Error::Precondition`] if the directory holds no video.
pub fn find_poster_source(staged_dir: &Path) -> dp_core::Result<PathBuf> {
    let mut candidates: Vec<PathBuf> = std::fs::read_dir(staged_dir)
        .map_err(|e| dp_core::Error::file(staged_dir, e))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .collect();
    candidates.sort();

    for wanted in MASTER_EXTENSIONS {
        let found = candidates.iter().find(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(wanted))
        });
        if let Some(path) = found {
            return Ok(path.clone());
        }
    }

    Err(dp_core::Error::Precondition(format!(
        "no video master found in {}",
        staged_dir.display()
    )))
}

/// Extract a representative frame from the staged master video and write it
/// to `<staged_dir>/poster.png`.
///
/// # Errors
///
/// Fails if ffmpeg is unavailable, cannot decode the source, or produces no
/// output file.
pub async fn generate_poster(tools: &ToolRegistry, staged_dir: &Path) -> dp_core::Result<PathBuf> {
    let ffmpeg = tools.require("ffmpeg")?;
    let source = find_poster_source(staged_dir)?;
    let poster = staged_dir.join(POSTER_FILE_NAME);

    tracing::info!("Poster: {:?} -> {:?}", source, poster);

    let mut cmd = ToolCommand::new(ffmpeg.path.clone());
    cmd.args(["-y", "-hide_banner", "-loglevel", "error", "-i"]);
    cmd.path_arg(&source);
    cmd.args(["-vf", "thumbnail", "-frames:v", "1", "-update", "1"]);
    cmd.path_arg(&poster);
    cmd.execute().await?;

    let written = std::fs::metadata(&poster)
        .map(|m| m.len() > 0)
        .unwrap_or(false);
    if !written {
        return Err(dp_core::Error::tool(
            "ffmpeg",
            format!("no poster frame written for {}", source.display()),
        ));
    }

    Ok(poster)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn prefers_mov_master() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["abc.mp4", "abc.mkv", "abc.mov", "notes.txt"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        let source = find_poster_source(dir.path()).unwrap();
        assert_eq!(source.file_name().unwrap(), "abc.mov");
    }

    #[test]
    fn falls_back_to_mkv_then_mp4() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("abc.mp4"), b"x").unwrap();
        assert_eq!(
            find_poster_source(dir.path()).unwrap().file_name().unwrap(),
            "abc.mp4"
        );
        fs::write(dir.path().join("abc.MKV"), b"x").unwrap();
        assert_eq!(
            find_poster_source(dir.path()).unwrap().file_name().unwrap(),
            "abc.MKV"
        );
    }

    #[test]
    fn no_video_is_precondition_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("abc.mp3"), b"x").unwrap();
        let err = find_poster_source(dir.path()).unwrap_err();
        assert_eq!(err.kind(), dp_core::ErrorKind::Precondition);
    }

    #[tokio::test]
    async fn missing_ffmpeg_fails() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("abc.mov"), b"x").unwrap();
        let err = generate_poster(&ToolRegistry::default(), dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, dp_core::Error::Tool { .. }));
        assert!(!dir.path().join(POSTER_FILE_NAME).exists());
    }

    #[tokio::test]
    async fn corrupt_master_fails() {
        let tools = ToolRegistry::discover(&dp_core::config::ToolsConfig::default());
        if tools.require("ffmpeg").is_err() {
            // ffmpeg is not installed here; covered by `missing_ffmpeg_fails`.
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("abc.mov"), b"definitely not a video").unwrap();
        let result = generate_poster(&tools, dir.path()).await;
        assert!(result.is_err());
    }
}
