//! Watch events and their normalization from backend notifications.

use std::path::{Path, PathBuf};

use framereel_common::error::ReelError;
use notify::event::{AccessKind, AccessMode, ModifyKind, RenameMode};
use notify::EventKind;

/// A change observed in the watched directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    Created(PathBuf),
    Modified(PathBuf),
    Deleted(PathBuf),
    /// Events were dropped; the consumer must rescan the directory.
    Overflow,
    /// The watch is dead (directory removed, permission lost, backend error).
    Failure(String),
}

impl WatchEvent {
    /// Path the event refers to, if any.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Created(p) | Self::Modified(p) | Self::Deleted(p) => Some(p),
            Self::Overflow | Self::Failure(_) => None,
        }
    }

    /// The watch condition this event signals for `directory`, if any.
    ///
    /// Overflow maps to a recoverable [`ReelError::WatchOverflow`]; a
    /// failure to a terminal [`ReelError::WatchFailure`].
    pub fn condition(&self, directory: &Path) -> Option<ReelError> {
        match self {
            Self::Overflow => Some(ReelError::WatchOverflow {
                directory: directory.to_path_buf(),
            }),
            Self::Failure(message) => Some(ReelError::watch_failure(directory, message.clone())),
            Self::Created(_) | Self::Modified(_) | Self::Deleted(_) => None,
        }
    }
}

/// Translate one backend notification into watch events for `directory`.
///
/// Only direct children of `directory` are reported. Renames become a
/// delete of the old name followed by a create of the new one. Removal of
/// the directory itself is a failure.
pub fn normalize(event: &notify::Event, directory: &Path) -> Vec<WatchEvent> {
    let mut out = Vec::new();
    if event.need_rescan() {
        out.push(WatchEvent::Overflow);
    }

    let children = || {
        event
            .paths
            .iter()
            .filter(|p| is_direct_child(p, directory))
            .cloned()
    };

    match &event.kind {
        EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            out.extend(children().map(WatchEvent::Created));
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            out.extend(children().map(WatchEvent::Deleted));
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let mut paths = event.paths.iter();
            if let Some(from) = paths.next().filter(|p| is_direct_child(p, directory)) {
                out.push(WatchEvent::Deleted(from.clone()));
            }
            if let Some(to) = paths.next().filter(|p| is_direct_child(p, directory)) {
                out.push(WatchEvent::Created(to.clone()));
            }
        }
        EventKind::Modify(ModifyKind::Name(_)) | EventKind::Any | EventKind::Other => {
            // Direction unknown; let the filesystem decide.
            out.extend(children().map(|p| {
                if p.exists() {
                    WatchEvent::Modified(p)
                } else {
                    WatchEvent::Deleted(p)
                }
            }));
        }
        EventKind::Modify(_) | EventKind::Access(AccessKind::Close(AccessMode::Write)) => {
            out.extend(children().map(WatchEvent::Modified));
        }
        EventKind::Remove(_) => {
            for path in &event.paths {
                if path == directory {
                    out.push(WatchEvent::Failure(format!(
                        "watched directory removed: {}",
                        directory.display()
                    )));
                } else if is_direct_child(path, directory) {
                    out.push(WatchEvent::Deleted(path.clone()));
                }
            }
        }
        EventKind::Access(_) => {}
    }
    out
}

fn is_direct_child(path: &Path, directory: &Path) -> bool {
    path.parent() == Some(directory)
}
