//! The filesystem adapter: translates path-based upcalls into overlay
//! lookups, cache operations and host filesystem calls.

use std::collections::HashMap;
use std::ffi::CString;
use std::fs::{File, Metadata};
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::{FileExt, MetadataExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;

use crate::cache::{CacheConfig, TrackCache};
use crate::error::FsError;
use crate::overlay;
use crate::probe::MediaProbe;
use crate::split;
use crate::transcode::{TrackMeta, Transcoder};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    File,
    Directory,
    Symlink,
}

#[derive(Debug, Clone)]
pub struct FileAttributes {
    pub size: u64,
    pub kind: FileKind,
    pub perm: u16,
    pub nlink: u32,
    pub uid: u32,
    pub gid: u32,
    pub atime: SystemTime,
    pub mtime: SystemTime,
    pub ctime: SystemTime,
}

#[derive(Debug, Clone)]
pub struct DirEntry {
    pub name: String,
    pub kind: FileKind,
}

#[derive(Debug, Clone, Copy)]
pub struct FsStats {
    pub blocks: u64,
    pub bfree: u64,
    pub bavail: u64,
    pub files: u64,
    pub ffree: u64,
    pub bsize: u64,
    pub frsize: u64,
    pub namemax: u64,
}

enum Handle {
    /// Real file served straight from the host filesystem.
    Passthrough(File),
    /// Virtual track served from the decode cache.
    Cached { raw: PathBuf },
}

/// Read-only overlay over `root` that serves each cue track as its own
/// WAV file.
pub struct FlacCueFs {
    root: PathBuf,
    cache: TrackCache,
    probe: Arc<dyn MediaProbe>,
    handles: RwLock<HashMap<u64, Handle>>,
}

impl FlacCueFs {
    pub fn new(
        root: PathBuf,
        transcoder: Arc<dyn Transcoder>,
        probe: Arc<dyn MediaProbe>,
        config: CacheConfig,
    ) -> Self {
        Self {
            root,
            cache: TrackCache::new(transcoder, config),
            probe,
            handles: RwLock::new(HashMap::new()),
        }
    }

    fn full_path(&self, path: &Path) -> PathBuf {
        let relative = path.strip_prefix("/").unwrap_or(path);
        self.root.join(relative)
    }

    /// Paths that exist pass through; anything else is looked up in the
    /// cue overlay of its parent directory.
    fn resolve(&self, full: &Path) -> (PathBuf, Option<TrackMeta>) {
        if full.symlink_metadata().is_ok() {
            return (full.to_path_buf(), None);
        }
        match overlay::find_virtual(full) {
            Some(track) => (track.source, Some(track.meta)),
            None => (full.to_path_buf(), None),
        }
    }

    pub fn getattr(&self, path: &Path) -> Result<FileAttributes, FsError> {
        let full = self.full_path(path);
        let (resolved, _meta) = self.resolve(&full);
        match split::decode(&resolved) {
            Some(window) => {
                let metadata = stat(&window.real)?;
                let properties = self.probe.probe(&window.real)?;
                let end = if window.ends_at_eof() {
                    properties.duration
                } else {
                    window.end
                };
                let mut attributes = attributes_from(&metadata);
                attributes.size = properties.window_bytes(window.start, end);
                Ok(attributes)
            }
            None => Ok(attributes_from(&stat(&resolved)?)),
        }
    }

    pub fn readdir(&self, path: &Path) -> Result<Vec<DirEntry>, FsError> {
        let dir = split::clean(&self.full_path(path));
        let overlay = overlay::expand_directory(&dir).map_err(host_error)?;

        let mut entries = vec![
            DirEntry {
                name: ".".to_string(),
                kind: FileKind::Directory,
            },
            DirEntry {
                name: "..".to_string(),
                kind: FileKind::Directory,
            },
        ];
        for entry in std::fs::read_dir(&dir).map_err(host_error)? {
            let entry = entry.map_err(host_error)?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if overlay.hidden.contains(&name) {
                continue;
            }
            let kind = entry
                .file_type()
                .map(|file_type| {
                    if file_type.is_dir() {
                        FileKind::Directory
                    } else if file_type.is_symlink() {
                        FileKind::Symlink
                    } else {
                        FileKind::File
                    }
                })
                .unwrap_or(FileKind::File);
            entries.push(DirEntry { name, kind });
        }
        for name in overlay.tracks.into_keys() {
            entries.push(DirEntry {
                name,
                kind: FileKind::File,
            });
        }
        Ok(entries)
    }

    pub fn open(&self, path: &Path, flags: i32) -> Result<u64, FsError> {
        if flags & libc::O_ACCMODE != libc::O_RDONLY {
            return Err(FsError::PermissionDenied);
        }
        let full = self.full_path(path);
        let (resolved, meta) = self.resolve(&full);
        match split::decode(&resolved) {
            Some(window) => {
                let meta = meta.unwrap_or_default();
                let handle = self.cache.open_entry(
                    &resolved,
                    &window.real,
                    window.start,
                    window.end,
                    &meta,
                )?;
                self.handles
                    .write()
                    .insert(handle, Handle::Cached { raw: resolved });
                Ok(handle)
            }
            None => {
                let file = File::open(&resolved).map_err(host_error)?;
                let handle = self.cache.next_handle();
                self.handles.write().insert(handle, Handle::Passthrough(file));
                Ok(handle)
            }
        }
    }

    pub fn read(&self, _path: &Path, handle: u64, offset: u64, size: u32) -> Result<Vec<u8>, FsError> {
        let handles = self.handles.read();
        match handles.get(&handle) {
            Some(Handle::Cached { raw }) => self
                .cache
                .read_entry(raw, handle, offset, size)
                .ok_or_else(|| FsError::BufferGone(raw.clone())),
            Some(Handle::Passthrough(file)) => {
                let mut buffer = vec![0u8; size as usize];
                let filled = file.read_at(&mut buffer, offset).map_err(host_error)?;
                buffer.truncate(filled);
                Ok(buffer)
            }
            None => Err(FsError::BadHandle(handle)),
        }
    }

    pub fn release(&self, _path: &Path, handle: u64) -> Result<(), FsError> {
        match self.handles.write().remove(&handle) {
            Some(Handle::Cached { raw }) => {
                self.cache.release_entry(&raw, handle);
                Ok(())
            }
            Some(Handle::Passthrough(_)) => Ok(()),
            None => Err(FsError::BadHandle(handle)),
        }
    }

    pub fn readlink(&self, path: &Path) -> Result<PathBuf, FsError> {
        let full = self.full_path(path);
        let (resolved, _meta) = self.resolve(&full);
        std::fs::read_link(split::clean(&resolved)).map_err(host_error)
    }

    pub fn statfs(&self, path: &Path) -> Result<FsStats, FsError> {
        let full = self.full_path(path);
        let (resolved, _meta) = self.resolve(&full);
        statvfs(&split::clean(&resolved))
    }
}

fn stat(path: &Path) -> Result<Metadata, FsError> {
    path.symlink_metadata().map_err(host_error)
}

fn host_error(error: io::Error) -> FsError {
    if error.kind() == io::ErrorKind::NotFound {
        FsError::NotFound
    } else {
        FsError::IOError(error)
    }
}

fn attributes_from(metadata: &Metadata) -> FileAttributes {
    let file_type = metadata.file_type();
    let kind = if file_type.is_dir() {
        FileKind::Directory
    } else if file_type.is_symlink() {
        FileKind::Symlink
    } else {
        FileKind::File
    };
    FileAttributes {
        size: metadata.len(),
        kind,
        perm: (metadata.mode() & 0o7777) as u16,
        nlink: metadata.nlink() as u32,
        uid: metadata.uid(),
        gid: metadata.gid(),
        atime: timestamp(metadata.atime(), metadata.atime_nsec()),
        mtime: timestamp(metadata.mtime(), metadata.mtime_nsec()),
        ctime: timestamp(metadata.ctime(), metadata.ctime_nsec()),
    }
}

fn timestamp(seconds: i64, nanos: i64) -> SystemTime {
    if seconds >= 0 {
        UNIX_EPOCH + Duration::new(seconds as u64, nanos as u32)
    } else {
        UNIX_EPOCH - Duration::from_secs(seconds.unsigned_abs())
    }
}

fn statvfs(path: &Path) -> Result<FsStats, FsError> {
    let c_path = CString::new(path.as_os_str().as_bytes()).map_err(|_| FsError::NotFound)?;
    let mut stats: libc::statvfs = unsafe { std::mem::zeroed() };
    if unsafe { libc::statvfs(c_path.as_ptr(), &mut stats) } != 0 {
        return Err(host_error(io::Error::last_os_error()));
    }
    Ok(FsStats {
        blocks: stats.f_blocks as u64,
        bfree: stats.f_bfree as u64,
        bavail: stats.f_bavail as u64,
        files: stats.f_files as u64,
        ffree: stats.f_ffree as u64,
        bsize: stats.f_bsize as u64,
        frsize: stats.f_frsize as u64,
        namemax: stats.f_namemax as u64,
    })
}
