//! A filesystem view anchored to a single working-directory root: no
//! operation, however it is spelled by the caller, can resolve to a path
//! outside that root.

use std::collections::BTreeMap;
use std::io::Read as _;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
    Symlink,
}

#[derive(Debug, Clone)]
pub struct Metadata {
    pub kind: EntryKind,
    pub len: u64,
}

/// Resolves `p` against `root`, clamping any `..` components so the result
/// can never ascend above `root`. A caller-supplied absolute path is treated
/// as if it were relative to `root`, not to the real filesystem root.
pub fn abs(root: &Path, p: &Path) -> PathBuf {
    let relative: PathBuf = if let Ok(stripped) = p.strip_prefix(root) {
        stripped.to_path_buf()
    } else if p.is_absolute() {
        p.components()
            .filter(|c| !matches!(c, Component::RootDir | Component::Prefix(_)))
            .collect()
    } else {
        p.to_path_buf()
    };

    let mut clamped = Vec::new();
    for component in relative.components() {
        match component {
            Component::ParentDir => {
                clamped.pop();
            }
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
            Component::Normal(seg) => clamped.push(seg),
        }
    }

    let mut out = root.to_path_buf();
    out.extend(clamped);
    out
}

/// A filesystem view confined to a single root. Implemented by
/// [`DiskConfinedFs`] (the default) and [`MemoryConfinedFs`] (used heavily by
/// tests, since it needs no real filesystem and makes fault injection
/// trivial).
pub trait ConfinedFs: Send + Sync {
    fn root(&self) -> &Path;
    fn join(&self, p: &Path) -> PathBuf {
        abs(self.root(), p)
    }

    fn create(&self, p: &Path, data: &[u8]) -> Result<()>;
    fn open(&self, p: &Path) -> Result<Vec<u8>>;
    fn stat(&self, p: &Path) -> Result<Metadata>;
    fn lstat(&self, p: &Path) -> Result<Metadata>;
    fn readlink(&self, p: &Path) -> Result<PathBuf>;
    fn readdir(&self, p: &Path) -> Result<Vec<String>>;
    fn mkdir_all(&self, p: &Path) -> Result<()>;
    fn remove(&self, p: &Path) -> Result<()>;
    fn remove_all(&self, p: &Path) -> Result<()>;
    fn rename(&self, from: &Path, to: &Path) -> Result<()>;
    fn symlink(&self, target: &Path, link: &Path) -> Result<()>;
    fn temp_file(&self, dir: &Path, prefix: &str) -> Result<PathBuf>;
}

// ---------------------------------------------------------------------------
// Disk implementation
// ---------------------------------------------------------------------------

pub struct DiskConfinedFs {
    root: PathBuf,
}

impl DiskConfinedFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Verifies that `resolved`'s parent directory, after symlink
    /// evaluation, still lies within the root. `lstat`/`readlink` use this
    /// instead of full canonicalization so the final path component itself
    /// is allowed to be a symlink (possibly dangling).
    fn check_parent_confined(&self, resolved: &Path) -> Result<()> {
        let parent = resolved.parent().unwrap_or(&self.root);
        if !parent.exists() {
            return Ok(());
        }
        let canon_parent = parent
            .canonicalize()
            .map_err(|e| Error::io(parent, e))?;
        let canon_root = self
            .root
            .canonicalize()
            .map_err(|e| Error::io(&self.root, e))?;
        if !canon_parent.starts_with(&canon_root) {
            return Err(Error::path_escape(resolved.display().to_string()));
        }
        Ok(())
    }

    /// Verifies that `resolved`, after following every symlink including its
    /// own final component, still lies within the root. Unlike
    /// `check_parent_confined`, this is what `open`/`stat`/`create` need: a
    /// symlink planted by `symlink()` (which stores its target verbatim,
    /// possibly outside the root) must not let the real syscall dereference
    /// straight out of the confined view. Any prefix of `resolved` that
    /// doesn't exist yet (the usual case for `create`) is taken literally,
    /// since a path component that doesn't exist cannot be a symlink.
    fn check_fully_confined(&self, resolved: &Path) -> Result<()> {
        let canon_root = self
            .root
            .canonicalize()
            .map_err(|e| Error::io(&self.root, e))?;

        // `symlink_metadata` (lstat), not `exists`, decides presence here:
        // `exists` follows symlinks and reports a dangling symlink as
        // absent, which would let its own name slip into `tail` below and
        // skip the canonicalize-and-check step entirely.
        let mut existing = resolved.to_path_buf();
        let mut tail: Vec<std::ffi::OsString> = Vec::new();
        while existing.symlink_metadata().is_err() {
            match existing.file_name() {
                Some(name) => tail.push(name.to_os_string()),
                None => break,
            }
            if !existing.pop() {
                break;
            }
        }

        let mut full = existing.canonicalize().map_err(|e| Error::io(&existing, e))?;
        for part in tail.into_iter().rev() {
            full.push(part);
        }

        if !full.starts_with(&canon_root) {
            return Err(Error::path_escape(resolved.display().to_string()));
        }
        Ok(())
    }
}

impl ConfinedFs for DiskConfinedFs {
    fn root(&self) -> &Path {
        &self.root
    }

    fn create(&self, p: &Path, data: &[u8]) -> Result<()> {
        let resolved = self.join(p);
        if let Some(parent) = resolved.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        self.check_fully_confined(&resolved)?;
        std::fs::write(&resolved, data).map_err(|e| Error::io(&resolved, e))
    }

    fn open(&self, p: &Path) -> Result<Vec<u8>> {
        let resolved = self.join(p);
        self.check_fully_confined(&resolved)?;
        let mut buf = Vec::new();
        std::fs::File::open(&resolved)
            .map_err(|e| Error::io(&resolved, e))?
            .read_to_end(&mut buf)
            .map_err(|e| Error::io(&resolved, e))?;
        Ok(buf)
    }

    fn stat(&self, p: &Path) -> Result<Metadata> {
        let resolved = self.join(p);
        self.check_fully_confined(&resolved)?;
        let meta = std::fs::metadata(&resolved).map_err(|e| Error::io(&resolved, e))?;
        Ok(Metadata {
            kind: if meta.is_dir() { EntryKind::Dir } else { EntryKind::File },
            len: meta.len(),
        })
    }

    fn lstat(&self, p: &Path) -> Result<Metadata> {
        let resolved = self.join(p);
        self.check_parent_confined(&resolved)?;
        let meta = std::fs::symlink_metadata(&resolved).map_err(|e| Error::io(&resolved, e))?;
        let kind = if meta.is_symlink() {
            EntryKind::Symlink
        } else if meta.is_dir() {
            EntryKind::Dir
        } else {
            EntryKind::File
        };
        Ok(Metadata { kind, len: meta.len() })
    }

    fn readlink(&self, p: &Path) -> Result<PathBuf> {
        let resolved = self.join(p);
        self.check_parent_confined(&resolved)?;
        std::fs::read_link(&resolved).map_err(|e| Error::io(&resolved, e))
    }

    fn readdir(&self, p: &Path) -> Result<Vec<String>> {
        let resolved = self.join(p);
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&resolved).map_err(|e| Error::io(&resolved, e))? {
            let entry = entry.map_err(|e| Error::io(&resolved, e))?;
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    fn mkdir_all(&self, p: &Path) -> Result<()> {
        let resolved = self.join(p);
        std::fs::create_dir_all(&resolved).map_err(|e| Error::io(&resolved, e))
    }

    fn remove(&self, p: &Path) -> Result<()> {
        let resolved = self.join(p);
        let meta = std::fs::symlink_metadata(&resolved).map_err(|e| Error::io(&resolved, e))?;
        if meta.is_dir() {
            std::fs::remove_dir(&resolved).map_err(|e| Error::io(&resolved, e))
        } else {
            std::fs::remove_file(&resolved).map_err(|e| Error::io(&resolved, e))
        }
    }

    fn remove_all(&self, p: &Path) -> Result<()> {
        let resolved = self.join(p);
        std::fs::remove_dir_all(&resolved).or_else(|_| std::fs::remove_file(&resolved)).map_err(|e| Error::io(&resolved, e))
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let src = self.join(from);
        let dst = self.join(to);
        if let Some(parent) = dst.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        std::fs::rename(&src, &dst).map_err(|e| Error::io(&src, e))
    }

    fn symlink(&self, target: &Path, link: &Path) -> Result<()> {
        let resolved_link = self.join(link);
        if let Some(parent) = resolved_link.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        #[cfg(unix)]
        {
            std::os::unix::fs::symlink(target, &resolved_link).map_err(|e| Error::io(&resolved_link, e))
        }
        #[cfg(not(unix))]
        {
            let _ = target;
            Err(Error::permission("symlinks unsupported on this platform"))
        }
    }

    fn temp_file(&self, dir: &Path, prefix: &str) -> Result<PathBuf> {
        if dir.as_os_str().is_empty() {
            return Ok(std::env::temp_dir().join(format!("{prefix}{}", std::process::id())));
        }
        let resolved_dir = self.join(dir);
        std::fs::create_dir_all(&resolved_dir).map_err(|e| Error::io(&resolved_dir, e))?;
        Ok(resolved_dir.join(format!("{prefix}{}", std::process::id())))
    }
}

/// `chroot` has no analogue in a path-clamped confined view; callers asking
/// for it get a typed error rather than silent best-effort behavior.
pub fn chroot_unsupported() -> Error {
    Error::ChrootUnsupported
}

// ---------------------------------------------------------------------------
// In-memory implementation (tests only, but not `#[cfg(test)]` — useful for
// any caller that wants a fault-free, disk-free confined view)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum MemEntry {
    File(Vec<u8>),
    Dir,
    Symlink(PathBuf),
}

pub struct MemoryConfinedFs {
    root: PathBuf,
    entries: Mutex<BTreeMap<PathBuf, MemEntry>>,
}

impl MemoryConfinedFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let mut entries = BTreeMap::new();
        entries.insert(root.clone(), MemEntry::Dir);
        Self { root, entries: Mutex::new(entries) }
    }
}

impl ConfinedFs for MemoryConfinedFs {
    fn root(&self) -> &Path {
        &self.root
    }

    fn create(&self, p: &Path, data: &[u8]) -> Result<()> {
        let resolved = self.join(p);
        let mut entries = self.entries.lock().map_err(|e| Error::git_msg(e.to_string()))?;
        if let Some(parent) = resolved.parent() {
            entries.entry(parent.to_path_buf()).or_insert(MemEntry::Dir);
        }
        entries.insert(resolved, MemEntry::File(data.to_vec()));
        Ok(())
    }

    fn open(&self, p: &Path) -> Result<Vec<u8>> {
        let resolved = self.join(p);
        match self.entries.lock().map_err(|e| Error::git_msg(e.to_string()))?.get(&resolved) {
            Some(MemEntry::File(data)) => Ok(data.clone()),
            Some(MemEntry::Symlink(target)) => self.open(target),
            _ => Err(Error::not_found(resolved.display().to_string())),
        }
    }

    fn stat(&self, p: &Path) -> Result<Metadata> {
        let resolved = self.join(p);
        match self.entries.lock().map_err(|e| Error::git_msg(e.to_string()))?.get(&resolved) {
            Some(MemEntry::File(data)) => Ok(Metadata { kind: EntryKind::File, len: data.len() as u64 }),
            Some(MemEntry::Dir) => Ok(Metadata { kind: EntryKind::Dir, len: 0 }),
            Some(MemEntry::Symlink(target)) => self.stat(target),
            None => Err(Error::not_found(resolved.display().to_string())),
        }
    }

    fn lstat(&self, p: &Path) -> Result<Metadata> {
        let resolved = self.join(p);
        match self.entries.lock().map_err(|e| Error::git_msg(e.to_string()))?.get(&resolved) {
            Some(MemEntry::File(data)) => Ok(Metadata { kind: EntryKind::File, len: data.len() as u64 }),
            Some(MemEntry::Dir) => Ok(Metadata { kind: EntryKind::Dir, len: 0 }),
            Some(MemEntry::Symlink(_)) => Ok(Metadata { kind: EntryKind::Symlink, len: 0 }),
            None => Err(Error::not_found(resolved.display().to_string())),
        }
    }

    fn readlink(&self, p: &Path) -> Result<PathBuf> {
        let resolved = self.join(p);
        match self.entries.lock().map_err(|e| Error::git_msg(e.to_string()))?.get(&resolved) {
            Some(MemEntry::Symlink(target)) => Ok(target.clone()),
            Some(_) => Err(Error::invalid_path("not a symlink")),
            None => Err(Error::not_found(resolved.display().to_string())),
        }
    }

    fn readdir(&self, p: &Path) -> Result<Vec<String>> {
        let resolved = self.join(p);
        let entries = self.entries.lock().map_err(|e| Error::git_msg(e.to_string()))?;
        let mut names: Vec<String> = entries
            .keys()
            .filter_map(|k| {
                if k.parent() == Some(resolved.as_path()) {
                    k.file_name().map(|n| n.to_string_lossy().into_owned())
                } else {
                    None
                }
            })
            .collect();
        names.sort();
        Ok(names)
    }

    fn mkdir_all(&self, p: &Path) -> Result<()> {
        let resolved = self.join(p);
        let mut entries = self.entries.lock().map_err(|e| Error::git_msg(e.to_string()))?;
        let mut current = self.root.clone();
        if let Ok(rel) = resolved.strip_prefix(&self.root) {
            for component in rel.components() {
                current.push(component);
                entries.entry(current.clone()).or_insert(MemEntry::Dir);
            }
        }
        Ok(())
    }

    fn remove(&self, p: &Path) -> Result<()> {
        let resolved = self.join(p);
        self.entries
            .lock()
            .map_err(|e| Error::git_msg(e.to_string()))?
            .remove(&resolved)
            .map(|_| ())
            .ok_or_else(|| Error::not_found(resolved.display().to_string()))
    }

    fn remove_all(&self, p: &Path) -> Result<()> {
        let resolved = self.join(p);
        let mut entries = self.entries.lock().map_err(|e| Error::git_msg(e.to_string()))?;
        entries.retain(|k, _| k != &resolved && !k.starts_with(&resolved));
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let src = self.join(from);
        let dst = self.join(to);
        let mut entries = self.entries.lock().map_err(|e| Error::git_msg(e.to_string()))?;
        let value = entries
            .remove(&src)
            .ok_or_else(|| Error::not_found(src.display().to_string()))?;
        entries.insert(dst, value);
        Ok(())
    }

    fn symlink(&self, target: &Path, link: &Path) -> Result<()> {
        let resolved_link = self.join(link);
        self.entries
            .lock()
            .map_err(|e| Error::git_msg(e.to_string()))?
            .insert(resolved_link, MemEntry::Symlink(target.to_path_buf()));
        Ok(())
    }

    fn temp_file(&self, dir: &Path, prefix: &str) -> Result<PathBuf> {
        let resolved_dir = if dir.as_os_str().is_empty() { self.root.clone() } else { self.join(dir) };
        Ok(resolved_dir.join(format!("{prefix}tmp")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abs_strips_existing_prefix() {
        let root = Path::new("/tmp/wd");
        assert_eq!(abs(root, Path::new("/tmp/wd/a/b")), PathBuf::from("/tmp/wd/a/b"));
    }

    #[test]
    fn abs_treats_foreign_absolute_path_as_relative_to_root() {
        let root = Path::new("/tmp/wd");
        assert_eq!(abs(root, Path::new("/etc/passwd")), PathBuf::from("/tmp/wd/etc/passwd"));
    }

    #[test]
    fn abs_clamps_parent_dir_escape() {
        let root = Path::new("/tmp/wd");
        assert_eq!(abs(root, Path::new("../../../etc/passwd")), PathBuf::from("/tmp/wd/etc/passwd"));
    }

    #[test]
    fn abs_clamp_never_ascends_above_root_even_with_many_dotdots() {
        let root = Path::new("/tmp/wd");
        let resolved = abs(root, Path::new("a/../../../../b"));
        assert!(resolved.starts_with(root));
    }

    #[test]
    fn memory_fs_roundtrips_a_file() {
        let fs = MemoryConfinedFs::new("/root");
        fs.create(Path::new("hello.txt"), b"hi").unwrap();
        assert_eq!(fs.open(Path::new("hello.txt")).unwrap(), b"hi");
    }

    #[test]
    fn memory_fs_symlink_readlink_returns_raw_target() {
        let fs = MemoryConfinedFs::new("/root");
        fs.symlink(Path::new("/etc/passwd"), Path::new("link")).unwrap();
        assert_eq!(fs.readlink(Path::new("link")).unwrap(), PathBuf::from("/etc/passwd"));
    }

    #[test]
    fn memory_fs_remove_all_clears_subtree() {
        let fs = MemoryConfinedFs::new("/root");
        fs.create(Path::new("dir/a.txt"), b"a").unwrap();
        fs.create(Path::new("dir/b.txt"), b"b").unwrap();
        fs.remove_all(Path::new("dir")).unwrap();
        assert!(fs.open(Path::new("dir/a.txt")).is_err());
    }

    #[test]
    fn disk_fs_stat_through_absolute_symlink_does_not_escape_root() {
        let outside = tempfile::tempdir().unwrap();
        std::fs::write(outside.path().join("secret.txt"), b"outside").unwrap();

        let root = tempfile::tempdir().unwrap();
        let fs = DiskConfinedFs::new(root.path());
        fs.symlink(&outside.path().join("secret.txt"), Path::new("link")).unwrap();

        // `readlink` reports the raw (unconfined) target...
        assert_eq!(fs.readlink(Path::new("link")).unwrap(), outside.path().join("secret.txt"));
        // ...but `stat`/`open` through the same filesystem must not follow it outside the root.
        assert!(fs.stat(Path::new("link")).is_err());
        assert!(fs.open(Path::new("link")).is_err());
    }

    #[test]
    fn disk_fs_create_through_symlinked_directory_does_not_escape_root() {
        let outside = tempfile::tempdir().unwrap();

        let root = tempfile::tempdir().unwrap();
        let fs = DiskConfinedFs::new(root.path());
        fs.symlink(outside.path(), Path::new("escape")).unwrap();

        assert!(fs.create(Path::new("escape/pwned.txt"), b"pwned").is_err());
        assert!(!outside.path().join("pwned.txt").exists());
    }

    #[test]
    fn disk_fs_stat_and_open_work_normally_without_symlinks() {
        let root = tempfile::tempdir().unwrap();
        let fs = DiskConfinedFs::new(root.path());
        fs.create(Path::new("a.txt"), b"hi").unwrap();
        assert_eq!(fs.open(Path::new("a.txt")).unwrap(), b"hi");
        assert_eq!(fs.stat(Path::new("a.txt")).unwrap().kind, EntryKind::File);
    }
}
