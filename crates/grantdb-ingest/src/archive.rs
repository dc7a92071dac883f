//! Recursive unpacking of `.tar`, `.tar.gz`/`.tgz` and `.zip` archives.
//!
//! An archive is unpacked into `<dest>/<stem>`. Archives written by that unpack
//! are then unpacked next to themselves and deleted, level by level, until none
//! remain or the nesting limit is hit. Each nested archive has exactly one
//! owner: the unpack that wrote it, and only the first one to claim its path.
//! Entry names are sanitized before anything is written; symlinks and other
//! special entries are skipped.
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;

use flate2::read::GzDecoder;
use tracing::debug;
use crate::error::ArchiveError;

pub const MAX_NESTING_DEPTH: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Tar,
    TarGz,
    Zip,
}

impl ArchiveFormat {
    const SUFFIXES: [(&'static str, ArchiveFormat); 4] =
        [(".tar.gz", Self::TarGz), (".tgz", Self::TarGz), (".tar", Self::Tar), (".zip", Self::Zip)];

    pub fn detect(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_string_lossy().to_lowercase();
        Self::SUFFIXES.iter().find(|(suffix, _)| name.ends_with(suffix)).map(|(_, format)| *format)
    }
}

/// File name with its archive suffix removed: `ipg240102.tar.gz` -> `ipg240102`.
pub fn archive_stem(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_string_lossy().into_owned();
    let lower = name.to_lowercase();
    let (suffix, _) = ArchiveFormat::SUFFIXES.iter().find(|(suffix, _)| lower.ends_with(suffix))?;
    let stem = &name[..name.len() - suffix.len()];
    Some(if stem.is_empty() { "archive".to_string() } else { stem.to_string() })
}

#[derive(Debug, Clone)]
pub struct Extractor {
    max_depth: usize,
    parallelism: usize,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new(MAX_NESTING_DEPTH)
    }
}

impl Extractor {
    pub fn new(max_depth: usize) -> Self {
        let parallelism = std::thread::available_parallelism().map_or(4, std::num::NonZeroUsize::get);
        Self { max_depth, parallelism }
    }

    /// Cap on sibling archives unpacked at once.
    #[must_use]
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    /// Unpack `archive` into `dest_root/<stem>` and every nested archive in
    /// place. Returns the top-level output directory. On error, whatever was
    /// already written stays on disk.
    pub fn extract_recursively(&self, archive: &Path, dest_root: &Path) -> Result<PathBuf, ArchiveError> {
        let claimed = Mutex::new(HashSet::new());
        self.extract_at(archive, dest_root, 0, &claimed)
    }

    fn extract_at(
        &self,
        archive: &Path,
        dest_root: &Path,
        depth: usize,
        claimed: &Mutex<HashSet<PathBuf>>,
    ) -> Result<PathBuf, ArchiveError> {
        if depth > self.max_depth {
            return Err(ArchiveError::TooDeep { path: archive.to_path_buf(), max: self.max_depth });
        }
        let format = ArchiveFormat::detect(archive).ok_or_else(|| ArchiveError::UnsupportedFormat(archive.to_path_buf()))?;
        let stem = archive_stem(archive).ok_or_else(|| ArchiveError::UnsupportedFormat(archive.to_path_buf()))?;
        let out_dir = dest_root.join(stem);
        fs::create_dir_all(&out_dir).map_err(ArchiveError::io(&out_dir))?;

        let mut written = Vec::new();
        match format {
            ArchiveFormat::Tar => unpack_tar(open(archive)?, archive, &out_dir, &mut written)?,
            ArchiveFormat::TarGz => unpack_tar(GzDecoder::new(open(archive)?), archive, &out_dir, &mut written)?,
            ArchiveFormat::Zip => unpack_zip(archive, &out_dir, &mut written)?,
        }
        debug!(archive = %archive.display(), out = %out_dir.display(), depth, files = written.len(), "archive unpacked");

        let nested = claim_nested(written, claimed)?;
        for batch in nested.chunks(self.parallelism) {
            std::thread::scope(|scope| {
                let handles: Vec<_> = batch
                    .iter()
                    .map(|child| scope.spawn(move || self.extract_nested(child, depth + 1, claimed)))
                    .collect();
                handles
                    .into_iter()
                    .map(|h| h.join().unwrap_or(Err(ArchiveError::Panicked)))
                    .collect::<Result<Vec<()>, ArchiveError>>()
            })?;
        }
        Ok(out_dir)
    }

    fn extract_nested(&self, child: &Path, depth: usize, claimed: &Mutex<HashSet<PathBuf>>) -> Result<(), ArchiveError> {
        let parent = child.parent().unwrap_or_else(|| Path::new("."));
        self.extract_at(child, parent, depth, claimed)?;
        fs::remove_file(child).map_err(ArchiveError::io(child))
    }
}

fn open(path: &Path) -> Result<File, ArchiveError> {
    File::open(path).map_err(ArchiveError::io(path))
}

/// Archives among the files an unpack wrote that no other unpack has claimed.
fn claim_nested(mut written: Vec<PathBuf>, claimed: &Mutex<HashSet<PathBuf>>) -> Result<Vec<PathBuf>, ArchiveError> {
    written.retain(|path| ArchiveFormat::detect(path).is_some());
    written.sort();
    written.dedup();
    let mut claimed = claimed.lock().map_err(|_| ArchiveError::Panicked)?;
    written.retain(|path| claimed.insert(path.clone()));
    Ok(written)
}

/// Join an archive entry name onto `dest`, rejecting anything that could
/// land outside it. `None` means the name is empty after normalization.
fn safe_join(dest: &Path, entry: &Path) -> Result<Option<PathBuf>, ArchiveError> {
    let mut clean = PathBuf::new();
    for component in entry.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(ArchiveError::PathTraversal { entry: entry.display().to_string() });
            }
        }
    }
    if clean.as_os_str().is_empty() {
        return Ok(None);
    }
    Ok(Some(dest.join(clean)))
}

fn write_file(target: &Path, reader: &mut impl Read) -> Result<(), ArchiveError> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(ArchiveError::io(parent))?;
    }
    let mut out = File::create(target).map_err(ArchiveError::io(target))?;
    io::copy(reader, &mut out).map_err(ArchiveError::io(target))?;
    Ok(())
}

fn unpack_tar<R: Read>(reader: R, archive_path: &Path, out_dir: &Path, written: &mut Vec<PathBuf>) -> Result<(), ArchiveError> {
    let mut archive = tar::Archive::new(reader);
    for entry in archive.entries().map_err(ArchiveError::io(archive_path))? {
        let mut entry = entry.map_err(ArchiveError::io(archive_path))?;
        let name = entry.path().map_err(ArchiveError::io(archive_path))?.into_owned();
        let Some(target) = safe_join(out_dir, &name)? else { continue };
        let kind = entry.header().entry_type();
        if kind.is_dir() {
            fs::create_dir_all(&target).map_err(ArchiveError::io(&target))?;
        } else if kind.is_file() {
            write_file(&target, &mut entry)?;
            written.push(target);
        } else {
            debug!(entry = %name.display(), "skipping special tar entry");
        }
    }
    Ok(())
}

fn unpack_zip(archive_path: &Path, out_dir: &Path, written: &mut Vec<PathBuf>) -> Result<(), ArchiveError> {
    let zip_err = |source| ArchiveError::Zip { path: archive_path.to_path_buf(), source };
    let mut archive = zip::ZipArchive::new(open(archive_path)?).map_err(zip_err)?;
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(zip_err)?;
        let name = PathBuf::from(entry.name());
        let Some(target) = safe_join(out_dir, &name)? else { continue };
        if entry.is_dir() {
            fs::create_dir_all(&target).map_err(ArchiveError::io(&target))?;
        } else if entry.is_file() {
            write_file(&target, &mut entry)?;
            written.push(target);
        } else {
            debug!(entry = %name.display(), "skipping special zip entry");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_formats_case_insensitively() {
        assert_eq!(ArchiveFormat::detect(Path::new("a/IPG.TAR.GZ")), Some(ArchiveFormat::TarGz));
        assert_eq!(ArchiveFormat::detect(Path::new("x.tgz")), Some(ArchiveFormat::TarGz));
        assert_eq!(ArchiveFormat::detect(Path::new("x.tar")), Some(ArchiveFormat::Tar));
        assert_eq!(ArchiveFormat::detect(Path::new("x.Zip")), Some(ArchiveFormat::Zip));
        assert_eq!(ArchiveFormat::detect(Path::new("x.rar")), None);
        assert_eq!(ArchiveFormat::detect(Path::new("x.xml")), None);
    }

    #[test]
    fn stem_strips_compound_suffix() {
        assert_eq!(archive_stem(Path::new("/d/ipg240102.tar.gz")).as_deref(), Some("ipg240102"));
        assert_eq!(archive_stem(Path::new("/d/US0001.ZIP")).as_deref(), Some("US0001"));
        assert_eq!(archive_stem(Path::new("/d/.zip")).as_deref(), Some("archive"));
        assert_eq!(archive_stem(Path::new("/d/notes.txt")), None);
    }

    #[test]
    fn safe_join_rejects_escapes() {
        let dest = Path::new("/out");
        assert_eq!(safe_join(dest, Path::new("./a/b.xml")).ok().flatten(), Some(PathBuf::from("/out/a/b.xml")));
        assert!(matches!(safe_join(dest, Path::new("./")), Ok(None)));
        assert!(matches!(safe_join(dest, Path::new("../etc/passwd")), Err(ArchiveError::PathTraversal { .. })));
        assert!(matches!(safe_join(dest, Path::new("a/../../x")), Err(ArchiveError::PathTraversal { .. })));
        assert!(matches!(safe_join(dest, Path::new("/etc/passwd")), Err(ArchiveError::PathTraversal { .. })));
    }
}
