//! BagIt bags written in place over a staged directory.
//!
//! [`make_bag`] moves the directory's contents under `data/`, then writes the
//! bag declaration, SHA-256 and SHA-512 payload manifests, `bag-info.txt`, and
//! the tag manifests. Running it again over an existing bag recomputes every
//! manifest from the current `data/` contents, so stale entries never
//! survive. [`validate_bag`] checks a bag against its manifests and the
//! required metadata fields.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256, Sha512};
use walkdir::WalkDir;

use dp_core::{Error, Result};

const BAGIT_VERSION: &str = "0.97";
const PAYLOAD_DIR: &str = "data";
const STAGING_DIR: &str = ".dp-payload";
const BAG_DECLARATION: &str = "bagit.txt";
const BAG_INFO: &str = "bag-info.txt";

/// Bag-info key for the registry URI of the archival object.
pub const KEY_URI: &str = "ArchivesSpace-URI";
/// Bag-info key for the normalized start date.
pub const KEY_START_DATE: &str = "Start-Date";
/// Bag-info key for the normalized end date.
pub const KEY_END_DATE: &str = "End-Date";
/// Bag-info key for the provenance origin.
pub const KEY_ORIGIN: &str = "Origin";
/// Bag-info key for rights identifiers (one line per identifier).
pub const KEY_RIGHTS: &str = "Rights-ID";
/// Bag-info key for the BagIt profile identifier.
pub const KEY_PROFILE: &str = "BagIt-Profile-Identifier";

/// Keys every bag produced by the pipeline must carry with non-empty values.
pub const REQUIRED_KEYS: &[&str] = &[
    KEY_URI,
    KEY_START_DATE,
    KEY_END_DATE,
    KEY_ORIGIN,
    KEY_RIGHTS,
    KEY_PROFILE,
];

#[derive(Debug, Clone, Copy)]
enum Algorithm {
    Sha256,
    Sha512,
}

const ALGORITHMS: &[Algorithm] = &[Algorithm::Sha256, Algorithm::Sha512];

impl Algorithm {
    fn name(self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
        }
    }

    fn manifest(self) -> String {
        format!("manifest-{}.txt", self.name())
    }

    fn tag_manifest(self) -> String {
        format!("tagmanifest-{}.txt", self.name())
    }
}

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

/// Provenance metadata written to `bag-info.txt`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BagInfo {
    pub archivesspace_uri: String,
    pub start_date: String,
    pub end_date: String,
    pub origin: String,
    pub rights_ids: Vec<String>,
    pub profile_identifier: String,
}

impl BagInfo {
    /// Ordered `(key, value)` pairs; rights identifiers repeat the key.
    fn entries(&self) -> Vec<(&'static str, String)> {
        let mut entries = vec![
            (KEY_URI, self.archivesspace_uri.clone()),
            (KEY_START_DATE, self.start_date.clone()),
            (KEY_END_DATE, self.end_date.clone()),
            (KEY_ORIGIN, self.origin.clone()),
        ];
        entries.extend(self.rights_ids.iter().map(|r| (KEY_RIGHTS, r.clone())));
        entries.push((KEY_PROFILE, self.profile_identifier.clone()));
        entries
    }

    fn check(&self) -> Result<()> {
        if self.rights_ids.is_empty() {
            return Err(Error::Bag(format!("{KEY_RIGHTS} must not be empty")));
        }
        for (key, value) in self.entries() {
            if value.trim().is_empty() {
                return Err(Error::Bag(format!("{key} must not be empty")));
            }
            if value.contains(&['\n', '\r'][..]) {
                return Err(Error::Bag(format!("{key} must be a single line")));
            }
        }
        Ok(())
    }
}

/// Summary of a written or validated bag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BagReport {
    /// Number of payload files.
    pub payload_files: u64,
    /// Total payload size in bytes.
    pub payload_bytes: u64,
    /// Parsed `bag-info.txt`, multi-valued keys keep every value in order.
    pub info: BTreeMap<String, Vec<String>>,
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// Turn `dir` into a bag carrying `info`, in place.
///
/// # Errors
///
/// Returns [`Error::Bag`] for invalid metadata and I/O errors for filesystem
/// failures. A failure can leave the directory half-converted; callers are
/// expected to discard it.
pub fn make_bag(dir: &Path, info: &BagInfo) -> Result<BagReport> {
    info.check()?;
    if !dir.is_dir() {
        return Err(Error::Bag(format!("{} is not a directory", dir.display())));
    }

    if is_bag(dir) {
        tracing::debug!("Rebuilding manifests for existing bag {}", dir.display());
        remove_tag_files(dir)?;
    } else {
        move_into_payload(dir)?;
    }

    let payload = hash_payload(dir)?;
    let payload_bytes: u64 = payload.iter().map(|f| f.size).sum();
    let payload_files = payload.len() as u64;

    write_file(
        &dir.join(BAG_DECLARATION),
        &format!("BagIt-Version: {BAGIT_VERSION}\nTag-File-Character-Encoding: UTF-8\n"),
    )?;

    for (i, alg) in ALGORITHMS.iter().enumerate() {
        let body: String = payload
            .iter()
            .map(|f| format!("{}  {}\n", f.digests[i], f.bag_path))
            .collect();
        write_file(&dir.join(alg.manifest()), &body)?;
    }

    let mut info_lines: Vec<(String, String)> = info
        .entries()
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
    info_lines.push((
        "Bagging-Date".into(),
        chrono::Local::now().date_naive().format("%Y-%m-%d").to_string(),
    ));
    info_lines.push((
        "Payload-Oxum".into(),
        format!("{payload_bytes}.{payload_files}"),
    ));
    // Stable sort keeps repeated keys in their given order.
    info_lines.sort_by(|a, b| a.0.cmp(&b.0));
    let info_body: String = info_lines
        .iter()
        .map(|(k, v)| format!("{k}: {v}\n"))
        .collect();
    write_file(&dir.join(BAG_INFO), &info_body)?;

    write_tag_manifests(dir)?;

    tracing::debug!(
        "Bag written at {} ({} files, {} bytes)",
        dir.display(),
        payload_files,
        payload_bytes
    );

    Ok(BagReport {
        payload_files,
        payload_bytes,
        info: read_bag_info(dir)?,
    })
}

fn is_bag(dir: &Path) -> bool {
    dir.join(BAG_DECLARATION).is_file() && dir.join(PAYLOAD_DIR).is_dir()
}

/// Delete every tag file the writer produces so nothing stale survives.
fn remove_tag_files(dir: &Path) -> Result<()> {
    for entry in fs::read_dir(dir).map_err(|e| Error::file(dir, e))? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let generated = name == BAG_DECLARATION
            || name == BAG_INFO
            || (name.ends_with(".txt")
                && (name.starts_with("manifest-") || name.starts_with("tagmanifest-")));
        if generated && path.is_file() {
            fs::remove_file(&path).map_err(|e| Error::file(&path, e))?;
        }
    }
    Ok(())
}

/// Move the directory's current contents under `data/`.
///
/// Contents first go to a staging directory so a payload entry that is itself
/// named `data` does not collide with the payload directory.
fn move_into_payload(dir: &Path) -> Result<()> {
    let staging = dir.join(STAGING_DIR);
    fs::create_dir(&staging).map_err(|e| Error::file(&staging, e))?;

    for entry in fs::read_dir(dir).map_err(|e| Error::file(dir, e))? {
        let path = entry?.path();
        if path == staging {
            continue;
        }
        let Some(name) = path.file_name() else {
            continue;
        };
        let target = staging.join(name);
        fs::rename(&path, &target).map_err(|e| Error::file(&path, e))?;
    }

    let payload = dir.join(PAYLOAD_DIR);
    fs::rename(&staging, &payload).map_err(|e| Error::file(&staging, e))?;
    Ok(())
}

struct PayloadFile {
    bag_path: String,
    size: u64,
    /// One hex digest per entry of [`ALGORITHMS`].
    digests: Vec<String>,
}

fn hash_payload(dir: &Path) -> Result<Vec<PayloadFile>> {
    list_files(&dir.join(PAYLOAD_DIR))?
        .into_iter()
        .map(|path| {
            let bag_path = bag_relative(dir, &path)?;
            let (size, digests) = hash_file(&path)?;
            Ok(PayloadFile {
                bag_path,
                size,
                digests,
            })
        })
        .collect()
}

/// All regular files below `root`, sorted.
fn list_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| Error::Bag(format!("cannot walk {}: {e}", root.display())))?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Path of `file` relative to the bag root, with `/` separators.
fn bag_relative(bag_dir: &Path, file: &Path) -> Result<String> {
    let rel = file
        .strip_prefix(bag_dir)
        .map_err(|_| Error::Internal(format!("{} is outside the bag", file.display())))?;
    Ok(rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/"))
}

/// Stream a file once through every manifest algorithm.
fn hash_file(path: &Path) -> Result<(u64, Vec<String>)> {
    let file = fs::File::open(path).map_err(|e| Error::file(path, e))?;
    let mut reader = BufReader::new(file);
    let mut sha256 = Sha256::new();
    let mut sha512 = Sha512::new();
    let mut buf = vec![0u8; 64 * 1024];
    let mut size = 0u64;

    loop {
        let n = reader.read(&mut buf).map_err(|e| Error::file(path, e))?;
        if n == 0 {
            break;
        }
        sha256.update(&buf[..n]);
        sha512.update(&buf[..n]);
        size += n as u64;
    }

    Ok((
        size,
        vec![hex::encode(sha256.finalize()), hex::encode(sha512.finalize())],
    ))
}

fn tag_files() -> Vec<String> {
    let mut names = vec![BAG_DECLARATION.to_string(), BAG_INFO.to_string()];
    names.extend(ALGORITHMS.iter().map(|a| a.manifest()));
    names
}

fn write_tag_manifests(dir: &Path) -> Result<()> {
    let names = tag_files();
    let mut digests = Vec::with_capacity(names.len());
    for name in &names {
        let (_, d) = hash_file(&dir.join(name))?;
        digests.push(d);
    }
    for (i, alg) in ALGORITHMS.iter().enumerate() {
        let body: String = names
            .iter()
            .zip(&digests)
            .map(|(name, d)| format!("{}  {}\n", d[i], name))
            .collect();
        write_file(&dir.join(alg.tag_manifest()), &body)?;
    }
    Ok(())
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    let mut file = fs::File::create(path).map_err(|e| Error::file(path, e))?;
    file.write_all(contents.as_bytes())
        .map_err(|e| Error::file(path, e))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Reading and validation
// ---------------------------------------------------------------------------

/// Parse `bag-info.txt`, joining indented continuation lines.
pub fn read_bag_info(dir: &Path) -> Result<BTreeMap<String, Vec<String>>> {
    let path = dir.join(BAG_INFO);
    let file = fs::File::open(&path).map_err(|e| Error::file(&path, e))?;
    let mut info: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut last_key: Option<String> = None;

    for line in BufReader::new(file).lines() {
        let line = line.map_err(|e| Error::file(&path, e))?;
        if line.trim().is_empty() {
            continue;
        }
        if line.starts_with(&[' ', '\t'][..]) {
            let key = last_key
                .as_ref()
                .ok_or_else(|| Error::Bag(format!("{BAG_INFO}: continuation without a key")))?;
            if let Some(value) = info.get_mut(key).and_then(|v| v.last_mut()) {
                value.push(' ');
                value.push_str(line.trim());
            }
            continue;
        }
        let (key, value) = line
            .split_once(':')
            .ok_or_else(|| Error::Bag(format!("{BAG_INFO}: malformed line {line:?}")))?;
        let key = key.trim().to_string();
        info.entry(key.clone())
            .or_default()
            .push(value.trim().to_string());
        last_key = Some(key);
    }

    Ok(info)
}

fn read_manifest(path: &Path) -> Result<BTreeMap<String, String>> {
    let file = fs::File::open(path).map_err(|e| Error::file(path, e))?;
    let mut entries = BTreeMap::new();
    for line in BufReader::new(file).lines() {
        let line = line.map_err(|e| Error::file(path, e))?;
        if line.trim().is_empty() {
            continue;
        }
        let (digest, name) = line
            .split_once(char::is_whitespace)
            .ok_or_else(|| Error::Bag(format!("malformed manifest line {line:?}")))?;
        entries.insert(name.trim().to_string(), digest.to_ascii_lowercase());
    }
    Ok(entries)
}

/// Validate a bag written by [`make_bag`].
///
/// Checks the bag declaration, that payload manifests and `data/` list the
/// same files with matching checksums, the tag manifests, `Payload-Oxum`, and
/// that every [required key](REQUIRED_KEYS) is present and non-empty.
///
/// # Errors
///
/// Returns [`Error::Bag`] listing every problem found.
pub fn validate_bag(dir: &Path) -> Result<BagReport> {
    if !dir.join(BAG_DECLARATION).is_file() {
        return Err(Error::Bag(format!(
            "{} has no {BAG_DECLARATION}",
            dir.display()
        )));
    }

    let mut problems = Vec::new();

    let payload = list_files(&dir.join(PAYLOAD_DIR))?;
    let mut actual: BTreeMap<String, (u64, Vec<String>)> = BTreeMap::new();
    for path in &payload {
        actual.insert(bag_relative(dir, path)?, hash_file(path)?);
    }

    let mut manifests_found = 0;
    for (i, alg) in ALGORITHMS.iter().enumerate() {
        let manifest_path = dir.join(alg.manifest());
        if !manifest_path.is_file() {
            continue;
        }
        manifests_found += 1;
        let listed = read_manifest(&manifest_path)?;
        let listed_names: BTreeSet<&String> = listed.keys().collect();
        let actual_names: BTreeSet<&String> = actual.keys().collect();

        for missing in listed_names.difference(&actual_names) {
            problems.push(format!("{missing} listed in {} but missing", alg.manifest()));
        }
        for extra in actual_names.difference(&listed_names) {
            problems.push(format!("{extra} not listed in {}", alg.manifest()));
        }
        for (name, digest) in &listed {
            if let Some((_, digests)) = actual.get(name) {
                if &digests[i] != digest {
                    problems.push(format!("{name} {} checksum mismatch", alg.name()));
                }
            }
        }
    }
    if manifests_found == 0 {
        problems.push("no payload manifest found".into());
    }

    for (index, alg) in ALGORITHMS.iter().enumerate() {
        let tag_path = dir.join(alg.tag_manifest());
        if !tag_path.is_file() {
            continue;
        }
        for (name, digest) in read_manifest(&tag_path)? {
            let path = dir.join(&name);
            if !path.is_file() {
                problems.push(format!("tag file {name} missing"));
                continue;
            }
            let (_, digests) = hash_file(&path)?;
            if digests[index] != digest {
                problems.push(format!("tag file {name} {} checksum mismatch", alg.name()));
            }
        }
    }

    let info = match read_bag_info(dir) {
        Ok(info) => info,
        Err(e) => {
            problems.push(e.to_string());
            BTreeMap::new()
        }
    };
    for key in REQUIRED_KEYS {
        let present = info
            .get(*key)
            .is_some_and(|values| !values.is_empty() && values.iter().all(|v| !v.is_empty()));
        if !present {
            problems.push(format!("{key} is missing or empty"));
        }
    }

    let payload_bytes: u64 = actual.values().map(|(size, _)| size).sum();
    let payload_files = actual.len() as u64;
    if let Some(oxum) = info.get("Payload-Oxum").and_then(|v| v.first()) {
        let expected = format!("{payload_bytes}.{payload_files}");
        if *oxum != expected {
            problems.push(format!("Payload-Oxum {oxum} does not match {expected}"));
        }
    }

    if !problems.is_empty() {
        return Err(Error::Bag(problems.join("; ")));
    }

    Ok(BagReport {
        payload_files,
        payload_bytes,
        info,
    })
}
