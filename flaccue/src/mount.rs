//! Bridge between the `fuse_mt` upcall surface and the overlay adapter.

use std::ffi::OsString;
use std::os::unix::ffi::OsStringExt;
use std::path::Path;
use std::time::{Duration, SystemTime};

use fuse_mt::{
    CallbackResult, DirectoryEntry, FileAttr, FileType, FilesystemMT, RequestInfo, ResultData,
    ResultEmpty, ResultEntry, ResultOpen, ResultReaddir, ResultSlice, ResultStatfs, Statfs,
};

use flaccue_fs::fs::{FileAttributes, FileKind, FlacCueFs, FsStats};

const TTL: Duration = Duration::from_secs(1);

pub struct FlacCueMount {
    fs: FlacCueFs,
}

impl FlacCueMount {
    pub fn new(fs: FlacCueFs) -> Self {
        Self { fs }
    }
}

impl FilesystemMT for FlacCueMount {
    fn getattr(&self, _req: RequestInfo, path: &Path, _fh: Option<u64>) -> ResultEntry {
        self.fs
            .getattr(path)
            .map(|attributes| (TTL, file_attr(attributes)))
            .map_err(|error| error.errno())
    }

    fn readlink(&self, _req: RequestInfo, path: &Path) -> ResultData {
        self.fs
            .readlink(path)
            .map(|target| target.into_os_string().into_vec())
            .map_err(|error| error.errno())
    }

    fn open(&self, _req: RequestInfo, path: &Path, flags: u32) -> ResultOpen {
        self.fs
            .open(path, flags as i32)
            .map(|handle| (handle, 0))
            .map_err(|error| error.errno())
    }

    fn read(
        &self,
        _req: RequestInfo,
        path: &Path,
        fh: u64,
        offset: u64,
        size: u32,
        callback: impl FnOnce(ResultSlice<'_>) -> CallbackResult,
    ) -> CallbackResult {
        match self.fs.read(path, fh, offset, size) {
            Ok(data) => callback(Ok(&data)),
            Err(error) => callback(Err(error.errno())),
        }
    }

    fn release(
        &self,
        _req: RequestInfo,
        path: &Path,
        fh: u64,
        _flags: u32,
        _lock_owner: u64,
        _flush: bool,
    ) -> ResultEmpty {
        self.fs.release(path, fh).map_err(|error| error.errno())
    }

    fn opendir(&self, _req: RequestInfo, _path: &Path, _flags: u32) -> ResultOpen {
        Ok((0, 0))
    }

    fn readdir(&self, _req: RequestInfo, path: &Path, _fh: u64) -> ResultReaddir {
        self.fs
            .readdir(path)
            .map(|entries| {
                entries
                    .into_iter()
                    .map(|entry| DirectoryEntry {
                        name: OsString::from(entry.name),
                        kind: file_type(entry.kind),
                    })
                    .collect()
            })
            .map_err(|error| error.errno())
    }

    fn releasedir(&self, _req: RequestInfo, _path: &Path, _fh: u64, _flags: u32) -> ResultEmpty {
        Ok(())
    }

    fn statfs(&self, _req: RequestInfo, path: &Path) -> ResultStatfs {
        self.fs
            .statfs(path)
            .map(statfs_reply)
            .map_err(|error| error.errno())
    }
}

fn file_type(kind: FileKind) -> FileType {
    match kind {
        FileKind::File => FileType::RegularFile,
        FileKind::Directory => FileType::Directory,
        FileKind::Symlink => FileType::Symlink,
    }
}

fn file_attr(attributes: FileAttributes) -> FileAttr {
    FileAttr {
        size: attributes.size,
        blocks: attributes.size.div_ceil(512),
        atime: attributes.atime,
        mtime: attributes.mtime,
        ctime: attributes.ctime,
        crtime: SystemTime::UNIX_EPOCH,
        kind: file_type(attributes.kind),
        perm: attributes.perm,
        nlink: attributes.nlink,
        uid: attributes.uid,
        gid: attributes.gid,
        rdev: 0,
        flags: 0,
    }
}

fn statfs_reply(stats: FsStats) -> Statfs {
    Statfs {
        blocks: stats.blocks,
        bfree: stats.bfree,
        bavail: stats.bavail,
        files: stats.files,
        ffree: stats.ffree,
        bsize: stats.bsize as u32,
        namelen: stats.namemax as u32,
        frsize: stats.frsize as u32,
    }
}
