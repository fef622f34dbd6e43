//! Named shared-memory objects backing `SHARED` arenas.
//!
//! An object is a file in the platform's shared-memory directory (`/dev/shm`
//! on Linux, the temp directory elsewhere) mapped with `memmap2`. The first
//! [`HEADER_SIZE`] bytes hold a cross-process reference count; arena data
//! starts right after it.

use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicI64, Ordering};

use inac_log::{debug, trace, warn};
use memmap2::{MmapMut, MmapOptions};

use crate::arena::ALIGN;
use crate::error::{Error, Result};
use crate::flags::PoolFlags;

/// Bytes reserved in front of the data region for the reference count.
pub const HEADER_SIZE: usize = ALIGN;

/// Longest object name the platform accepts.
pub const MAX_LABEL_LEN: usize = 255;

/// Resolves `label` to the path of its shared-memory object.
///
/// A single leading `/` (POSIX `shm_open` style) is accepted and stripped.
///
/// # Errors
///
/// - [`Error::InvalidArgument`] if the label is empty or contains `/` or NUL
///   after the leading slash.
/// - [`Error::BufferTooSmall`] if the name exceeds [`MAX_LABEL_LEN`].
pub fn shared_memory_path(label: &str) -> Result<PathBuf> {
    let name = label.strip_prefix('/').unwrap_or(label);
    if name.is_empty() {
        return Err(Error::InvalidArgument {
            reason: "shared-memory label is empty",
        });
    }
    if name.contains(['/', '\0']) {
        return Err(Error::InvalidArgument {
            reason: "shared-memory label contains '/' or NUL",
        });
    }
    if name.len() > MAX_LABEL_LEN {
        return Err(Error::BufferTooSmall {
            required: name.len(),
            available: MAX_LABEL_LEN,
        });
    }
    Ok(shared_memory_dir().join(name))
}

fn shared_memory_dir() -> PathBuf {
    let dev_shm = Path::new("/dev/shm");
    if cfg!(target_os = "linux") && dev_shm.is_dir() {
        dev_shm.to_path_buf()
    } else {
        std::env::temp_dir()
    }
}

/// A mapped shared-memory object holding one arena chunk.
pub(crate) struct SharedMapping {
    map: MmapMut,
    base: NonNull<u8>,
    path: PathBuf,
    exclusive: bool,
}

impl SharedMapping {
    /// Opens (or creates, per `flags`) the object named `label` with room for
    /// `data_len` bytes after the header, and registers this handle in the
    /// reference count.
    pub(crate) fn open(label: &str, data_len: usize, flags: PoolFlags) -> Result<Self> {
        let path = shared_memory_path(label)?;
        let exclusive = flags.contains(PoolFlags::SHARED_EXCL);
        let total = data_len
            .checked_add(HEADER_SIZE)
            .ok_or(Error::InvalidArgument {
                reason: "shared-memory size overflows",
            })?;

        let file = Self::open_file(&path, flags)?;
        let mut map = Self::map(&file, &path, total).map_err(|err| {
            if exclusive {
                let _ = fs::remove_file(&path);
            }
            err
        })?;

        let base = NonNull::new(map.as_mut_ptr()).ok_or(Error::OutOfMemory)?;
        let shared = SharedMapping {
            map,
            base,
            path,
            exclusive,
        };

        let count = shared.refcount().fetch_add(1, Ordering::SeqCst) + 1;
        debug!(
            "attached shared memory {} ({} bytes, refcount {})",
            shared.path.display(),
            total,
            count
        );

        if flags.contains(PoolFlags::SHARED_OWNER) && !flags.contains(PoolFlags::NO_ZERO_FILL) {
            // SAFETY: the data region spans `data_len` bytes after the header.
            unsafe {
                shared.data().as_ptr().write_bytes(0, data_len);
            }
        }

        Ok(shared)
    }

    fn open_file(path: &Path, flags: PoolFlags) -> Result<File> {
        let mut options = OpenOptions::new();
        options.read(true).write(true);
        if flags.contains(PoolFlags::SHARED_CREATE) {
            if flags.contains(PoolFlags::SHARED_EXCL) {
                options.create_new(true);
            } else {
                options.create(true);
            }
        }
        options.open(path).map_err(|err| Error::os("shm_open", &err))
    }

    fn map(file: &File, path: &Path, total: usize) -> Result<MmapMut> {
        let current = file
            .metadata()
            .map_err(|err| Error::os("fstat", &err))?
            .len();
        if current < total as u64 {
            trace!("sizing {} to {} bytes", path.display(), total);
            file.set_len(total as u64)
                .map_err(|err| Error::os("ftruncate", &err))?;
        }

        // SAFETY: the mapping is shared by design; every handle to the object
        // goes through this type, and the arena never hands out references
        // that outlive it.
        unsafe { MmapOptions::new().len(total).map_mut(file) }
            .map_err(|err| Error::os("mmap", &err))
    }

    fn refcount(&self) -> &AtomicI64 {
        debug_assert!(self.map.len() >= HEADER_SIZE);
        // SAFETY: the mapping is page aligned and at least HEADER_SIZE long.
        unsafe { &*self.base.as_ptr().cast::<AtomicI64>() }
    }

    /// Current number of attached handles across all processes.
    pub(crate) fn attached(&self) -> i64 {
        self.refcount().load(Ordering::SeqCst)
    }

    /// Start of the data region.
    pub(crate) fn data(&self) -> NonNull<u8> {
        // SAFETY: the mapping is longer than the header.
        unsafe { self.base.add(HEADER_SIZE) }
    }
}

impl Drop for SharedMapping {
    fn drop(&mut self) {
        let remaining = self.refcount().fetch_sub(1, Ordering::SeqCst) - 1;
        trace!(
            "detached shared memory {} (refcount {})",
            self.path.display(),
            remaining
        );

        if remaining <= 0 || self.exclusive {
            match fs::remove_file(&self.path) {
                Ok(()) => debug!("unlinked shared memory {}", self.path.display()),
                Err(err) if err.kind() == ErrorKind::NotFound => {
                    warn!("shared memory {} was already unlinked", self.path.display());
                }
                Err(err) => warn!("failed to unlink {}: {}", self.path.display(), err),
            }
        }
    }
}
