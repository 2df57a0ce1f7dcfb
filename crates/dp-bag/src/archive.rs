//! Gzip-compressed tar archives of bag directories.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use dp_core::{Error, Result, ARCHIVE_EXTENSION};

/// Archive path for a bag directory: `<dir>.tar.gz` next to it.
pub fn archive_path_for(bag_dir: &Path) -> Result<PathBuf> {
    let name = dir_name(bag_dir)?;
    let parent = bag_dir.parent().unwrap_or_else(|| Path::new(""));
    Ok(parent.join(format!("{name}.{ARCHIVE_EXTENSION}")))
}

fn dir_name(dir: &Path) -> Result<String> {
    dir.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| Error::Bag(format!("{} has no usable directory name", dir.display())))
}

/// Compress `bag_dir` into `<bag_dir>.tar.gz` and remove the directory.
///
/// Entries are rooted at the directory's own name, so extracting the archive
/// recreates `<name>/...`. The directory is only removed once the archive is
/// fully written and flushed.
pub fn compress(bag_dir: &Path) -> Result<PathBuf> {
    if !bag_dir.is_dir() {
        return Err(Error::Bag(format!(
            "cannot compress {}: not a directory",
            bag_dir.display()
        )));
    }
    let name = dir_name(bag_dir)?;
    let archive = archive_path_for(bag_dir)?;

    tracing::debug!("Compressing {} -> {}", bag_dir.display(), archive.display());

    let file = File::create(&archive).map_err(|e| Error::file(&archive, e))?;
    let encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.follow_symlinks(false);
    builder
        .append_dir_all(&name, bag_dir)
        .map_err(|e| Error::file(bag_dir, e))?;

    let encoder = builder.into_inner().map_err(|e| Error::file(&archive, e))?;
    let writer = encoder.finish().map_err(|e| Error::file(&archive, e))?;
    writer
        .into_inner()
        .map_err(|e| Error::file(&archive, e.into_error()))?
        .sync_all()
        .map_err(|e| Error::file(&archive, e))?;

    fs::remove_dir_all(bag_dir).map_err(|e| Error::file(bag_dir, e))?;
    Ok(archive)
}

/// Unpack an archive produced by [`compress`] into `into`.
///
/// Returns the path of the extracted top-level directory.
pub fn extract(archive: &Path, into: &Path) -> Result<PathBuf> {
    let file = File::open(archive).map_err(|e| Error::file(archive, e))?;
    let mut tar = tar::Archive::new(GzDecoder::new(BufReader::new(file)));
    fs::create_dir_all(into).map_err(|e| Error::file(into, e))?;
    tar.unpack(into).map_err(|e| Error::file(archive, e))?;

    let name = archive
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.strip_suffix(&format!(".{ARCHIVE_EXTENSION}")))
        .ok_or_else(|| {
            Error::Bag(format!(
                "{} is not a .{ARCHIVE_EXTENSION} archive",
                archive.display()
            ))
        })?;
    Ok(into.join(name))
}
