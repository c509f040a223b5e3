//! [`ChangeSource`] backed by the platform watcher from `notify`.
//!
//! The notify callback runs on notify's own thread. It translates raw events
//! and pushes them straight into the bounded queue; nothing here blocks.

use camino::{Utf8Path, Utf8PathBuf};
use notify::event::{CreateKind, ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use smallvec::{SmallVec, smallvec};

use crate::error::WatchError;
use crate::events::ChangeEvent;
use crate::queue::EventSink;
use crate::source::ChangeSource;

/// Change source using inotify, `FSEvents`, kqueue or `ReadDirectoryChangesW`
/// depending on the platform.
#[derive(Default)]
pub struct NotifySource {
    watcher: Option<RecommendedWatcher>,
    root: Option<Utf8PathBuf>,
}

impl std::fmt::Debug for NotifySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifySource")
            .field("root", &self.root)
            .field("is_running", &self.watcher.is_some())
            .finish()
    }
}

impl NotifySource {
    /// Creates an idle source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChangeSource for NotifySource {
    fn start(&mut self, root: &Utf8Path, recursive: bool, sink: EventSink) -> Result<(), WatchError> {
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => forward(&sink, event),
            Err(error) => sink.report(&WatchError::Notify(error)),
        })?;

        let mode = if recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        watcher.watch(root.as_std_path(), mode)?;

        tracing::info!(path = %root, recursive, "Change source started");
        self.watcher = Some(watcher);
        self.root = Some(root.to_owned());
        Ok(())
    }

    fn stop(&mut self) {
        // Dropping the watcher unregisters every watch and joins its thread.
        if self.watcher.take().is_some()
            && let Some(root) = &self.root
        {
            tracing::info!(path = %root, "Change source stopped");
        }
    }
}

fn forward(sink: &EventSink, event: Event) {
    if event.need_rescan() {
        sink.report(&WatchError::SourceOverflow(sink.root().to_owned()));
    }

    for change in translate(event) {
        match change {
            Ok(change) => match sink.push(change) {
                Ok(()) | Err(WatchError::Overflow { .. }) => {}
                Err(WatchError::ChannelClosed) => {
                    tracing::trace!("Event queue closed, dropping notification");
                }
                Err(error) => sink.report(&error),
            },
            Err(error) => sink.report(&error),
        }
    }
}

/// Maps one notify event onto zero or more [`ChangeEvent`]s.
///
/// | notify kind                       | change kind                      |
/// |-----------------------------------|----------------------------------|
/// | `Create(Folder)`                  | ignored                          |
/// | `Create(_)`                       | `Created`                        |
/// | `Modify(Name(Both))` with 2 paths | `Renamed`                        |
/// | `Modify(Name(To))`                | `Created`                        |
/// | `Modify(Name(From))`              | `Deleted`                        |
/// | `Modify(Name(_))`                 | `Created` if the path exists, else `Deleted` |
/// | `Modify(_)`                       | `Changed`                        |
/// | `Remove(_)`                       | `Deleted`                        |
/// | `Access`, `Any`, `Other`          | ignored                          |
pub(crate) fn translate(event: Event) -> SmallVec<[Result<ChangeEvent, WatchError>; 2]> {
    let Event { kind, paths, .. } = event;

    match kind {
        EventKind::Create(CreateKind::Folder)
        | EventKind::Access(_)
        | EventKind::Any
        | EventKind::Other => SmallVec::new(),
        EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            paths.into_iter().map(|p| utf8(p).map(ChangeEvent::created)).collect()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if paths.len() == 2 => {
            let mut paths = paths.into_iter();
            let (Some(from), Some(to)) = (paths.next(), paths.next()) else {
                return SmallVec::new();
            };
            let renamed = utf8(from).and_then(|from| utf8(to).map(|to| ChangeEvent::renamed(from, to)));
            smallvec![renamed]
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) | EventKind::Remove(_) => {
            paths.into_iter().map(|p| utf8(p).map(ChangeEvent::deleted)).collect()
        }
        EventKind::Modify(ModifyKind::Name(_)) => paths
            .into_iter()
            .map(|p| {
                utf8(p).map(|path| {
                    if path.exists() {
                        ChangeEvent::created(path)
                    } else {
                        ChangeEvent::deleted(path)
                    }
                })
            })
            .collect(),
        EventKind::Modify(_) => paths.into_iter().map(|p| utf8(p).map(ChangeEvent::changed)).collect(),
    }
}

fn utf8(path: std::path::PathBuf) -> Result<Utf8PathBuf, WatchError> {
    Utf8PathBuf::try_from(path).map_err(|e| WatchError::NonUtf8Path(e.into_path_buf()))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use notify::event::{DataChange, RemoveKind};

    use super::*;
    use crate::events::ChangeKind;

    fn event(kind: EventKind, paths: &[&str]) -> Event {
        paths
            .iter()
            .fold(Event::new(kind), |e, p| e.add_path(PathBuf::from(p)))
    }

    fn kinds(event: Event) -> Vec<ChangeKind> {
        translate(event).into_iter().map(|r| r.unwrap().kind).collect()
    }

    #[test]
    fn test_create_file() {
        let out = kinds(event(EventKind::Create(CreateKind::File), &["/d/a.json"]));
        assert_eq!(out, vec![ChangeKind::Created]);
    }

    #[test]
    fn test_create_folder_ignored() {
        assert!(kinds(event(EventKind::Create(CreateKind::Folder), &["/d/sub"])).is_empty());
    }

    #[test]
    fn test_rename_to_is_arrival() {
        let out = kinds(event(
            EventKind::Modify(ModifyKind::Name(RenameMode::To)),
            &["/d/a.json"],
        ));
        assert_eq!(out, vec![ChangeKind::Created]);
    }

    #[test]
    fn test_rename_both_carries_old_path() {
        let mut out = translate(event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &["/d/a.tmp", "/d/a.json"],
        ));
        let renamed = out.remove(0).unwrap();
        assert_eq!(renamed.kind, ChangeKind::Renamed);
        assert_eq!(renamed.path, "/d/a.json");
        assert_eq!(renamed.old_path.unwrap(), "/d/a.tmp");
    }

    #[test]
    fn test_rename_from_and_remove_are_deletes() {
        let from = kinds(event(
            EventKind::Modify(ModifyKind::Name(RenameMode::From)),
            &["/d/a.json"],
        ));
        let removed = kinds(event(EventKind::Remove(RemoveKind::File), &["/d/b.json"]));
        assert_eq!(from, vec![ChangeKind::Deleted]);
        assert_eq!(removed, vec![ChangeKind::Deleted]);
    }

    #[test]
    fn test_ambiguous_rename_checks_existence() {
        let out = kinds(event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Any)),
            &["/definitely/not/here.json"],
        ));
        assert_eq!(out, vec![ChangeKind::Deleted]);
    }

    #[test]
    fn test_data_change() {
        let out = kinds(event(
            EventKind::Modify(ModifyKind::Data(DataChange::Content)),
            &["/d/a.json"],
        ));
        assert_eq!(out, vec![ChangeKind::Changed]);
    }

    #[test]
    fn test_access_ignored() {
        assert!(kinds(event(EventKind::Access(notify::event::AccessKind::Any), &["/d/a"])).is_empty());
        assert!(kinds(event(EventKind::Any, &["/d/a"])).is_empty());
    }
}
