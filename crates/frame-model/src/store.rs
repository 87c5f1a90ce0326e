//! The path-sorted frame collection for one directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use framereel_common::error::{ReelError, ReelResult};

use crate::frame::{is_image_path, FrameFile};

/// Immutable view of the store at one point in time.
///
/// Frames in a snapshot share their raster caches with the store, so cache
/// invalidation is visible through older snapshots as well.
pub type FrameSnapshot = Arc<[FrameFile]>;

/// Outcome of [`FrameStore::upsert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    /// A new frame was inserted at this index.
    Inserted(usize),
    /// The frame at this index already existed; its caches were dropped.
    Invalidated(usize),
    /// The path vanished from disk; the frame formerly at this index is gone.
    Removed(usize),
    /// Not an image in this directory; nothing changed.
    Ignored,
}

impl Upsert {
    /// Whether the frame set changed shape (count or order).
    pub fn changed_shape(&self) -> bool {
        matches!(self, Self::Inserted(_) | Self::Removed(_))
    }
}

/// Ordered, deduplicated set of frames in a directory.
///
/// Frames are kept sorted by path. Every mutation preserves that order and
/// path uniqueness. The store is owned by the control thread; other threads
/// receive [`FrameSnapshot`]s.
#[derive(Debug, Clone)]
pub struct FrameStore {
    directory: PathBuf,
    frames: Vec<FrameFile>,
}

impl FrameStore {
    /// List `directory` and build a store from its image files.
    ///
    /// The directory path is canonicalized so paths reported by the watcher
    /// compare equal to stored paths.
    pub fn load(directory: impl AsRef<Path>) -> ReelResult<Self> {
        let requested = directory.as_ref();
        let directory =
            std::fs::canonicalize(requested).map_err(|e| ReelError::DirectoryUnreadable {
                path: requested.to_path_buf(),
                source: e,
            })?;

        let frames = list_frames(&directory)?;
        tracing::info!(
            directory = %directory.display(),
            frames = frames.len(),
            "Loaded frame directory"
        );
        Ok(Self { directory, frames })
    }

    /// Re-list the directory after events may have been lost.
    ///
    /// Frames whose path still exists keep their delay override. All caches
    /// are invalidated because modifications may have been missed. Returns
    /// whether the set of paths changed.
    pub fn rescan(&mut self) -> ReelResult<bool> {
        let fresh = list_frames(&self.directory)?;
        let old = std::mem::take(&mut self.frames);

        let changed = old.len() != fresh.len()
            || old.iter().zip(fresh.iter()).any(|(a, b)| a.path() != b.path());

        let mut kept = old.into_iter().peekable();
        let mut merged = Vec::with_capacity(fresh.len());
        for candidate in fresh {
            while kept
                .peek()
                .map(|f| f.path() < candidate.path())
                .unwrap_or(false)
            {
                kept.next();
            }
            match kept.peek() {
                Some(existing) if existing.path() == candidate.path() => {
                    let existing = kept.next().unwrap_or(candidate);
                    existing.invalidate();
                    merged.push(existing);
                }
                _ => merged.push(candidate),
            }
        }
        self.frames = merged;

        tracing::info!(
            directory = %self.directory.display(),
            frames = self.frames.len(),
            changed,
            "Rescanned frame directory"
        );
        Ok(changed)
    }

    /// Apply a created/modified notification for `path`.
    pub fn upsert(&mut self, path: &Path) -> Upsert {
        if !self.accepts(path) {
            return Upsert::Ignored;
        }

        if !path.is_file() {
            // Gone again before we looked.
            return match self.remove(path) {
                Some(index) => Upsert::Removed(index),
                None => Upsert::Ignored,
            };
        }

        match self.search(path) {
            Ok(index) => {
                self.frames[index].invalidate();
                Upsert::Invalidated(index)
            }
            Err(index) => {
                tracing::debug!(path = %path.display(), index, "Frame added");
                self.frames.insert(index, FrameFile::new(path));
                Upsert::Inserted(index)
            }
        }
    }

    /// Remove the frame at `path`, returning its former index.
    pub fn remove(&mut self, path: &Path) -> Option<usize> {
        let index = self.search(path).ok()?;
        tracing::debug!(path = %path.display(), index, "Frame removed");
        self.frames.remove(index);
        Some(index)
    }

    /// Current frames as an immutable snapshot.
    pub fn get_all(&self) -> FrameSnapshot {
        self.frames.iter().cloned().collect()
    }

    /// Set a frame's delay override; `ms <= 0` restores the default.
    ///
    /// Returns `false` if no frame has this path.
    pub fn set_delay(&mut self, path: &Path, ms: i64) -> bool {
        match self.search(path) {
            Ok(index) => {
                self.frames[index].set_delay_override(ms);
                true
            }
            Err(_) => false,
        }
    }

    /// Clear every delay override. Returns how many frames had one.
    pub fn reset_delays(&mut self) -> usize {
        let mut cleared = 0;
        for frame in &mut self.frames {
            if frame.delay_override().is_some() {
                frame.set_delay_override(0);
                cleared += 1;
            }
        }
        cleared
    }

    pub fn index_of(&self, path: &Path) -> Option<usize> {
        self.search(path).ok()
    }

    pub fn get(&self, index: usize) -> Option<&FrameFile> {
        self.frames.get(index)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Canonical path of the directory this store mirrors.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn iter(&self) -> impl Iterator<Item = &FrameFile> {
        self.frames.iter()
    }

    fn search(&self, path: &Path) -> Result<usize, usize> {
        self.frames.binary_search_by(|f| f.path().cmp(path))
    }

    fn accepts(&self, path: &Path) -> bool {
        path.parent() == Some(self.directory.as_path()) && is_image_path(path)
    }
}

fn list_frames(directory: &Path) -> ReelResult<Vec<FrameFile>> {
    let entries = std::fs::read_dir(directory).map_err(|e| ReelError::DirectoryUnreadable {
        path: directory.to_path_buf(),
        source: e,
    })?;

    let mut frames = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(directory = %directory.display(), error = %e, "Skipping unreadable entry");
                continue;
            }
        };
        let path = entry.path();
        if !is_image_path(&path) {
            continue;
        }
        // Follow symlinks so linked images count as frames.
        match std::fs::metadata(&path) {
            Ok(meta) if meta.is_file() => frames.push(FrameFile::new(path)),
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Cannot stat entry, skipping");
            }
        }
    }

    frames.sort();
    frames.dedup();
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, b"x").unwrap();
        path
    }

    fn names(store: &FrameStore) -> Vec<String> {
        store
            .iter()
            .filter_map(|f| f.file_name().map(str::to_string))
            .collect()
    }

    #[test]
    fn test_load_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "c.jpg");
        touch(dir.path(), "a.png");
        touch(dir.path(), "B.JPEG");
        touch(dir.path(), "notes.txt");
        touch(dir.path(), "framereel.json");
        std::fs::create_dir(dir.path().join("sub.png")).unwrap();

        let store = FrameStore::load(dir.path()).unwrap();
        assert_eq!(names(&store), vec!["B.JPEG", "a.png", "c.jpg"]);
    }

    #[test]
    fn test_load_missing_directory_fails() {
        let err = FrameStore::load("/definitely/not/here").unwrap_err();
        assert!(matches!(err, ReelError::DirectoryUnreadable { .. }));
    }

    #[test]
    fn test_upsert_inserts_in_order_and_invalidates_existing() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a.png");
        touch(dir.path(), "c.png");
        let mut store = FrameStore::load(dir.path()).unwrap();
        let root = store.directory().to_path_buf();

        let b = touch(&root, "b.png");
        assert_eq!(store.upsert(&b), Upsert::Inserted(1));
        assert_eq!(store.upsert(&b), Upsert::Invalidated(1));
        assert_eq!(names(&store), vec!["a.png", "b.png", "c.png"]);
    }

    #[test]
    fn test_upsert_keeps_delay_override() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a.png");
        let mut store = FrameStore::load(dir.path()).unwrap();
        let a = store.directory().join("a.png");

        assert!(store.set_delay(&a, 40));
        store.upsert(&a);
        assert_eq!(store.get(0).unwrap().delay_override(), Some(40));
    }

    #[test]
    fn test_upsert_ignores_foreign_paths() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FrameStore::load(dir.path()).unwrap();
        let root = store.directory().to_path_buf();

        let txt = touch(&root, "readme.txt");
        assert_eq!(store.upsert(&txt), Upsert::Ignored);

        std::fs::create_dir(root.join("nested")).unwrap();
        let nested = touch(&root.join("nested"), "x.png");
        assert_eq!(store.upsert(&nested), Upsert::Ignored);

        assert!(store.is_empty());
    }

    #[test]
    fn test_upsert_of_vanished_path_is_delete() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a.png");
        let mut store = FrameStore::load(dir.path()).unwrap();
        let a = store.directory().join("a.png");

        std::fs::remove_file(&a).unwrap();
        assert_eq!(store.upsert(&a), Upsert::Removed(0));
        assert_eq!(store.upsert(&a), Upsert::Ignored);
    }

    #[test]
    fn test_remove() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a.png");
        touch(dir.path(), "b.png");
        let mut store = FrameStore::load(dir.path()).unwrap();
        let b = store.directory().join("b.png");

        assert_eq!(store.remove(&b), Some(1));
        assert_eq!(store.remove(&b), None);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_mutation() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a.png");
        let mut store = FrameStore::load(dir.path()).unwrap();
        let snapshot = store.get_all();

        let b = touch(store.directory(), "b.png");
        store.upsert(&b);
        assert_eq!(snapshot.len(), 1);
        assert_eq!(store.get_all().len(), 2);
    }

    #[test]
    fn test_reset_delays() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a.png");
        touch(dir.path(), "b.png");
        let mut store = FrameStore::load(dir.path()).unwrap();
        let a = store.directory().join("a.png");

        store.set_delay(&a, 10);
        assert_eq!(store.reset_delays(), 1);
        assert!(store.iter().all(|f| f.delay_override().is_none()));
    }

    #[test]
    fn test_rescan_keeps_overrides_for_surviving_paths() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a.png");
        touch(dir.path(), "b.png");
        let mut store = FrameStore::load(dir.path()).unwrap();
        let root = store.directory().to_path_buf();
        store.set_delay(&root.join("b.png"), 250);

        std::fs::remove_file(root.join("a.png")).unwrap();
        touch(&root, "c.png");

        assert!(store.rescan().unwrap());
        assert_eq!(names(&store), vec!["b.png", "c.png"]);
        assert_eq!(store.get(0).unwrap().delay_override(), Some(250));

        assert!(!store.rescan().unwrap());
    }
}
