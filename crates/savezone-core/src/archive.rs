//! Whole-resource zip archives.
//!
//! An archive always holds exactly one logical item: the archived file, or
//! the archived directory with its tree nested under the directory's name.

use std::fs::File;
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{Result, SavezoneError};

/// Archive `source` (file or directory) into a zip at `dest`.
/// Returns the size of the written archive.
pub fn pack(source: &Path, dest: &Path) -> Result<u64> {
    let root = source.parent().unwrap_or(Path::new(""));
    if source.file_name().is_none() {
        return Err(SavezoneError::Validation(format!(
            "{} has no name to archive under",
            source.display()
        )));
    }

    let dest_abs = std::path::absolute(dest)?;
    let mut archive = ZipWriter::new(File::create(dest)?);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    // A file source walks as a single entry. The archive being written is
    // never an entry of itself.
    let walker = WalkDir::new(source)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            std::path::absolute(e.path()).ok().as_deref() != Some(dest_abs.as_path())
        });
    for entry in walker {
        let entry = entry?;
        let name = entry_name(entry.path(), root)?;
        if entry.file_type().is_dir() {
            archive.add_directory(format!("{name}/"), options)?;
        } else if entry.file_type().is_file() {
            archive.start_file(name, options)?;
            let mut file = File::open(entry.path())?;
            std::io::copy(&mut file, &mut archive)?;
        }
    }

    archive.finish()?;
    let size = dest.metadata()?.len();
    debug!(source = %source.display(), size, "archive written");
    Ok(size)
}

/// Extract the archive at `archive` into the `target` directory.
///
/// A `target` created here is removed again when extraction fails.
pub fn unpack(archive: &Path, target: &Path) -> Result<()> {
    let mut zip = ZipArchive::new(File::open(archive)?)?;
    let created = !target.exists();
    std::fs::create_dir_all(target)?;
    if let Err(e) = zip.extract(target) {
        if created {
            let _ = std::fs::remove_dir_all(target);
        }
        return Err(e.into());
    }
    debug!(target = %target.display(), entries = zip.len(), "archive extracted");
    Ok(())
}

/// `/`-joined path of `path` relative to `root`.
fn entry_name(path: &Path, root: &Path) -> Result<String> {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let parts = relative
        .components()
        .map(|c| {
            c.as_os_str().to_str().map(str::to_string).ok_or_else(|| {
                SavezoneError::Archive(format!("{} is not valid UTF-8", path.display()))
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(parts.join("/"))
}
