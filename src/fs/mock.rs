// src/fs/mock.rs

use super::FileSystem;
use anyhow::{anyhow, bail, Result};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone)]
pub enum MockEntry {
    File(Vec<u8>),
    Dir(Vec<String>), // List of child names
    Symlink(PathBuf),
}

/// Operations that can be made to fail for a given path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockFault {
    Read,
    Write,
    Remove,
}

#[derive(Debug, Default)]
struct MockState {
    files: HashMap<PathBuf, MockEntry>,
    faults: HashSet<(PathBuf, MockFault)>,
}

/// In-memory filesystem for tests.
///
/// Paths are stored verbatim, so tests should use one consistent style
/// (absolute `/x/y` paths are simplest).
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    state: Arc<Mutex<MockState>>,
}

fn parent_key(path: &Path) -> Option<PathBuf> {
    let parent = path.parent()?;
    if parent.as_os_str().is_empty() {
        Some(PathBuf::from("."))
    } else {
        Some(parent.to_path_buf())
    }
}

fn child_name(path: &Path) -> Option<String> {
    path.file_name().and_then(|n| n.to_str()).map(|s| s.to_string())
}

impl MockFileSystem {
    pub fn new() -> Self {
        let mut state = MockState::default();
        // Ensure root exists
        state
            .files
            .insert(PathBuf::from("."), MockEntry::Dir(Vec::new()));

        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let path = path.as_ref().to_path_buf();
        let mut state = self.lock();
        state.files.insert(path.clone(), MockEntry::File(content.into()));
        Self::link_to_parent(&mut state.files, &path);
    }

    /// Add a symbolic link at `path` pointing to `target`.
    pub fn add_symlink(&self, path: impl AsRef<Path>, target: impl AsRef<Path>) {
        let path = path.as_ref().to_path_buf();
        let mut state = self.lock();
        state
            .files
            .insert(path.clone(), MockEntry::Symlink(target.as_ref().to_path_buf()));
        Self::link_to_parent(&mut state.files, &path);
    }

    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let mut state = self.lock();
        Self::ensure_dir_entry(&mut state.files, path.as_ref());
    }

    /// Make `op` fail for exactly `path` from now on.
    pub fn inject_fault(&self, path: impl AsRef<Path>, op: MockFault) {
        self.lock()
            .faults
            .insert((path.as_ref().to_path_buf(), op));
    }

    pub fn clear_fault(&self, path: impl AsRef<Path>, op: MockFault) {
        self.lock()
            .faults
            .remove(&(path.as_ref().to_path_buf(), op));
    }

    /// Raw bytes of a file, if present.
    pub fn contents(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        match self.lock().files.get(path.as_ref()) {
            Some(MockEntry::File(content)) => Some(content.clone()),
            _ => None,
        }
    }

    fn link_to_parent(files: &mut HashMap<PathBuf, MockEntry>, path: &Path) {
        let Some(parent) = parent_key(path) else {
            return;
        };
        if parent == path {
            return;
        }
        Self::ensure_dir_entry(files, &parent);
        if let (Some(MockEntry::Dir(children)), Some(name)) =
            (files.get_mut(&parent), child_name(path))
        {
            if !children.contains(&name) {
                children.push(name);
            }
        }
    }

    fn unlink_from_parent(files: &mut HashMap<PathBuf, MockEntry>, path: &Path) {
        if let (Some(parent), Some(name)) = (parent_key(path), child_name(path)) {
            if let Some(MockEntry::Dir(children)) = files.get_mut(&parent) {
                children.retain(|c| c != &name);
            }
        }
    }

    fn ensure_dir_entry(files: &mut HashMap<PathBuf, MockEntry>, path: &Path) {
        if !files.contains_key(path) {
            files.insert(path.to_path_buf(), MockEntry::Dir(Vec::new()));
            Self::link_to_parent(files, path);
        }
    }

    /// Follow at most one link, like the single-level links tests create.
    fn resolve<'a>(files: &'a HashMap<PathBuf, MockEntry>, path: &Path) -> Option<&'a MockEntry> {
        match files.get(path)? {
            MockEntry::Symlink(target) => files.get(target),
            entry => Some(entry),
        }
    }

    fn check_fault(state: &MockState, path: &Path, op: MockFault) -> Result<()> {
        if state.faults.contains(&(path.to_path_buf(), op)) {
            bail!("permission denied (injected {:?} fault): {:?}", op, path);
        }
        Ok(())
    }
}

impl FileSystem for MockFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        let state = self.lock();
        Self::check_fault(&state, path, MockFault::Read)?;
        match Self::resolve(&state.files, path) {
            Some(MockEntry::File(content)) => {
                String::from_utf8(content.clone()).map_err(|e| anyhow!("Invalid UTF-8: {}", e))
            }
            Some(MockEntry::Dir(_)) => Err(anyhow!("Is a directory: {:?}", path)),
            Some(MockEntry::Symlink(_)) | None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        {
            let state = self.lock();
            Self::check_fault(&state, path, MockFault::Write)?;
        }
        self.add_file(path, contents);
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let mut state = self.lock();
        Self::check_fault(&state, to, MockFault::Write)?;
        match state.files.remove(from) {
            Some(entry @ (MockEntry::File(_) | MockEntry::Symlink(_))) => {
                Self::unlink_from_parent(&mut state.files, from);
                state.files.insert(to.to_path_buf(), entry);
                Self::link_to_parent(&mut state.files, to);
                Ok(())
            }
            Some(dir @ MockEntry::Dir(_)) => {
                state.files.insert(from.to_path_buf(), dir);
                Err(anyhow!("renaming directories is not supported: {:?}", from))
            }
            None => Err(anyhow!("File not found: {:?}", from)),
        }
    }

    fn exists(&self, path: &Path) -> bool {
        self.lock().files.contains_key(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        matches!(Self::resolve(&self.lock().files, path), Some(MockEntry::File(_)))
    }

    fn is_dir(&self, path: &Path) -> bool {
        matches!(Self::resolve(&self.lock().files, path), Some(MockEntry::Dir(_)))
    }

    fn is_symlink(&self, path: &Path) -> bool {
        matches!(self.lock().files.get(path), Some(MockEntry::Symlink(_)))
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        self.add_dir(path);
        Ok(())
    }

    fn file_len(&self, path: &Path) -> Result<u64> {
        match Self::resolve(&self.lock().files, path) {
            Some(MockEntry::File(content)) => Ok(content.len() as u64),
            Some(MockEntry::Dir(_)) => Err(anyhow!("Is a directory: {:?}", path)),
            Some(MockEntry::Symlink(_)) | None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn clear_readonly(&self, path: &Path) -> Result<()> {
        if self.exists(path) {
            Ok(())
        } else {
            Err(anyhow!("File not found: {:?}", path))
        }
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        let mut state = self.lock();
        Self::check_fault(&state, path, MockFault::Remove)?;
        match state.files.get(path) {
            Some(MockEntry::File(_) | MockEntry::Symlink(_)) => {}
            Some(MockEntry::Dir(_)) => return Err(anyhow!("Is a directory: {:?}", path)),
            None => return Err(anyhow!("File not found: {:?}", path)),
        }
        state.files.remove(path);
        Self::unlink_from_parent(&mut state.files, path);
        Ok(())
    }

    fn remove_dir(&self, path: &Path) -> Result<()> {
        let mut state = self.lock();
        Self::check_fault(&state, path, MockFault::Remove)?;
        let empty = match state.files.get(path) {
            Some(MockEntry::Dir(children)) => children.is_empty(),
            Some(MockEntry::File(_) | MockEntry::Symlink(_)) => {
                return Err(anyhow!("Not a directory: {:?}", path));
            }
            None => return Err(anyhow!("Directory not found: {:?}", path)),
        };
        if !empty {
            return Err(anyhow!("Directory not empty: {:?}", path));
        }
        state.files.remove(path);
        Self::unlink_from_parent(&mut state.files, path);
        Ok(())
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        let mut state = self.lock();
        if !matches!(state.files.get(path), Some(MockEntry::Dir(_))) {
            return Err(anyhow!("Directory not found: {:?}", path));
        }

        let doomed: Vec<PathBuf> = state
            .files
            .keys()
            .filter(|k| k.starts_with(path))
            .cloned()
            .collect();
        for p in &doomed {
            Self::check_fault(&state, p, MockFault::Remove)?;
        }

        for p in &doomed {
            state.files.remove(p);
        }
        Self::unlink_from_parent(&mut state.files, path);
        Ok(())
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let state = self.lock();
        match state.files.get(path) {
            Some(MockEntry::Dir(children)) => {
                Ok(children.iter().map(|name| path.join(name)).collect())
            }
            _ => Err(anyhow!("Not a directory or not found: {:?}", path)),
        }
    }
}
