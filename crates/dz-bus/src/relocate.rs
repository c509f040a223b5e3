//! Reliable relocation of processed files into terminal directories.
//!
//! Moves are copy-then-delete so they work across volumes, and never
//! overwrite: the destination name is reserved with an exclusive create
//! before any byte is copied, and taken names get a ` (n)` suffix. Two
//! concurrent moves of different `order.json` files into the same directory
//! therefore end up as `order.json` and `order (1).json`.

use std::fs::{self, File, OpenOptions};
use std::io;

use camino::{Utf8Path, Utf8PathBuf};

use crate::error::RelocateError;

/// Moves `file` into `target_dir`, creating the directory if needed.
///
/// The source is removed only after the copy has been flushed to disk and its
/// length matches. Returns the final destination path.
///
/// # Errors
///
/// - [`RelocateError::SourceNotFound`] if `file` does not exist when called
///   or vanishes during the copy; nothing is left behind in `target_dir`
/// - [`RelocateError::Incomplete`] if the copy came up short
/// - [`RelocateError::Io`] for any other failure; a partial destination is
///   removed and the source is left untouched
///
/// # Examples
///
/// ```no_run
/// use camino::Utf8Path;
///
/// let moved = dz_bus::move_to_directory(
///     Utf8Path::new("/srv/drop/Output/order.json"),
///     Utf8Path::new("/srv/drop/Output/done"),
/// )?;
/// println!("moved to {moved}");
/// # Ok::<(), dz_bus::RelocateError>(())
/// ```
pub fn move_to_directory(file: &Utf8Path, target_dir: &Utf8Path) -> Result<Utf8PathBuf, RelocateError> {
    let mut source = match File::open(file) {
        Ok(source) => source,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(RelocateError::SourceNotFound(file.to_owned()));
        }
        Err(e) => return Err(RelocateError::io(file, e)),
    };
    let expected = source
        .metadata()
        .map_err(|e| RelocateError::io(file, e))?
        .len();
    let name = file
        .file_name()
        .ok_or_else(|| RelocateError::NoFileName(file.to_owned()))?;

    fs::create_dir_all(target_dir).map_err(|e| RelocateError::io(target_dir, e))?;
    let (mut destination, destination_path) = reserve(target_dir, name)?;

    let copied = io::copy(&mut source, &mut destination).and_then(|written| {
        destination.sync_all()?;
        Ok(written)
    });
    drop(destination);
    drop(source);

    let written = match copied {
        Ok(written) => written,
        Err(e) => {
            discard(&destination_path);
            if !file.exists() {
                return Err(RelocateError::SourceNotFound(file.to_owned()));
            }
            return Err(RelocateError::io(&destination_path, e));
        }
    };
    if written != expected {
        discard(&destination_path);
        return Err(RelocateError::Incomplete {
            path: destination_path,
            expected,
            written,
        });
    }

    if let Err(e) = fs::remove_file(file) {
        // Keep exactly one copy: the source stays, the duplicate goes.
        discard(&destination_path);
        return Err(if e.kind() == io::ErrorKind::NotFound {
            RelocateError::SourceNotFound(file.to_owned())
        } else {
            RelocateError::io(file, e)
        });
    }

    tracing::debug!(from = %file, to = %destination_path, bytes = written, "Relocated file");
    Ok(destination_path)
}

/// Exclusively creates the first free name of `name`, `name (1)`, `name (2)`, …
fn reserve(dir: &Utf8Path, name: &str) -> Result<(File, Utf8PathBuf), RelocateError> {
    for attempt in 0..=u32::MAX {
        let candidate = dir.join(candidate_name(name, attempt));
        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(file) => return Ok((file, candidate)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
            Err(e) => return Err(RelocateError::io(candidate, e)),
        }
    }
    Err(RelocateError::io(
        dir,
        io::Error::other("no free destination name"),
    ))
}

/// `order.json` with attempt 2 becomes `order (2).json`.
fn candidate_name(name: &str, attempt: u32) -> String {
    if attempt == 0 {
        return name.to_owned();
    }
    let path = Utf8Path::new(name);
    match (path.file_stem(), path.extension()) {
        (Some(stem), Some(ext)) => format!("{stem} ({attempt}).{ext}"),
        _ => format!("{name} ({attempt})"),
    }
}

fn discard(path: &Utf8Path) {
    if let Err(e) = fs::remove_file(path) {
        tracing::warn!(path = %path, error = %e, "Could not remove partial copy");
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn root(dir: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap()
    }

    #[test]
    fn test_candidate_names() {
        assert_eq!(candidate_name("order.json", 0), "order.json");
        assert_eq!(candidate_name("order.json", 1), "order (1).json");
        assert_eq!(candidate_name("archive.tar.gz", 2), "archive.tar (2).gz");
        assert_eq!(candidate_name("README", 3), "README (3)");
        assert_eq!(candidate_name(".hidden", 1), ".hidden (1)");
    }

    #[test]
    fn test_moves_and_creates_directory() {
        let dir = TempDir::new().unwrap();
        let root = root(&dir);
        let source = root.join("order.json");
        fs::write(&source, "payload").unwrap();

        let moved = move_to_directory(&source, &root.join("done")).unwrap();

        assert_eq!(moved, root.join("done/order.json"));
        assert!(!source.exists());
        assert_eq!(fs::read_to_string(moved).unwrap(), "payload");
    }

    #[test]
    fn test_collision_gets_suffix() {
        let dir = TempDir::new().unwrap();
        let root = root(&dir);
        let done = root.join("done");
        fs::create_dir(&done).unwrap();
        fs::write(done.join("order.json"), "first").unwrap();
        let source = root.join("order.json");
        fs::write(&source, "second").unwrap();

        let moved = move_to_directory(&source, &done).unwrap();

        assert_eq!(moved, done.join("order (1).json"));
        assert_eq!(fs::read_to_string(done.join("order.json")).unwrap(), "first");
        assert_eq!(fs::read_to_string(moved).unwrap(), "second");
    }

    #[test]
    fn test_missing_source() {
        let dir = TempDir::new().unwrap();
        let root = root(&dir);
        let result = move_to_directory(&root.join("gone.json"), &root.join("done"));
        assert!(matches!(result, Err(RelocateError::SourceNotFound(_))));
    }

    #[test]
    fn test_empty_file() {
        let dir = TempDir::new().unwrap();
        let root = root(&dir);
        let source = root.join("empty.json");
        fs::write(&source, "").unwrap();

        let moved = move_to_directory(&source, &root.join("error")).unwrap();
        assert_eq!(fs::metadata(moved).unwrap().len(), 0);
    }
}
