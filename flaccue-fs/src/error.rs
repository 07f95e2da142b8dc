use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::cache::CacheError;
use crate::probe::ProbeError;

#[derive(Debug, Error)]
pub enum FsError {
    #[error("no such file, real or virtual")]
    NotFound,

    #[error("overlay is read-only")]
    PermissionDenied,

    #[error("unknown file handle {0}")]
    BadHandle(u64),

    #[error("buffer for {0} is gone")]
    BufferGone(PathBuf),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Probe(#[from] ProbeError),

    #[error(transparent)]
    IOError(#[from] io::Error),
}

impl FsError {
    /// Host error code surfaced through the FUSE bridge.
    pub fn errno(&self) -> libc::c_int {
        match self {
            FsError::NotFound => libc::ENOENT,
            FsError::PermissionDenied => libc::EACCES,
            FsError::BadHandle(_) => libc::EBADF,
            FsError::BufferGone(_) => libc::EIO,
            FsError::Cache(_) | FsError::Probe(_) => libc::EIO,
            FsError::IOError(error) => error.raw_os_error().unwrap_or(libc::EIO),
        }
    }
}
