//! Existing-file enumeration for cold-start backlog pickup.

use std::time::SystemTime;

use camino::{Utf8Path, Utf8PathBuf};
use ignore::WalkBuilder;

use crate::filter::FileFilter;

/// Lists the files under `root` that pass `filter`.
///
/// Only the top level is listed unless `recursive` is set. With
/// `oldest_first` the result is ordered by last write time ascending (ties
/// broken by path); otherwise by path. Unreadable entries are logged and
/// skipped so one bad file never hides the rest of the backlog.
pub fn existing_files(
    root: &Utf8Path,
    recursive: bool,
    oldest_first: bool,
    filter: &dyn FileFilter,
) -> Vec<Utf8PathBuf> {
    let walker = WalkBuilder::new(root)
        // Drop zones are not repositories; list hidden and ignored files too
        .standard_filters(false)
        .max_depth(if recursive { None } else { Some(1) })
        .threads(1)
        .build();

    let mut found: Vec<(Option<SystemTime>, Utf8PathBuf)> = Vec::new();

    for result in walker {
        let entry = match result {
            Ok(entry) => entry,
            Err(error) => {
                tracing::warn!(path = %root, error = %error, "Skipping unreadable entry during replay");
                continue;
            }
        };

        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }

        let Some(path) = Utf8Path::from_path(entry.path()) else {
            tracing::warn!(path = %entry.path().display(), "Skipping non-UTF-8 path during replay");
            continue;
        };

        if !filter.should_process(path) {
            continue;
        }

        let modified = if oldest_first {
            entry.metadata().ok().and_then(|m| m.modified().ok())
        } else {
            None
        };
        found.push((modified, path.to_owned()));
    }

    if oldest_first {
        found.sort();
    } else {
        found.sort_by(|a, b| a.1.cmp(&b.1));
    }

    found.into_iter().map(|(_, path)| path).collect()
}
