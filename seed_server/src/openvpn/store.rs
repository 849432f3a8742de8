//! Storage for generated artifacts.

use std::fs::{DirBuilder, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

#[cfg(unix)]
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt};

/// Minimal filesystem interface used by the artifact writer.
pub trait FileStore {
    /// Create or overwrite `path` with `contents`.
    fn write(&self, path: &Path, contents: &[u8], mode: u32) -> io::Result<()>;

    /// Create the directory `path`. An existing directory is not an error.
    fn mkdir(&self, path: &Path, mode: u32) -> io::Result<()>;
}

impl<T: FileStore + ?Sized> FileStore for &T {
    fn write(&self, path: &Path, contents: &[u8], mode: u32) -> io::Result<()> {
        (**self).write(path, contents, mode)
    }

    fn mkdir(&self, path: &Path, mode: u32) -> io::Result<()> {
        (**self).mkdir(path, mode)
    }
}

/// [`FileStore`] writing to the local filesystem.
///
/// Modes are applied on Unix when a file or directory is created.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFileStore;

impl FileStore for LocalFileStore {
    fn write(&self, path: &Path, contents: &[u8], mode: u32) -> io::Result<()> {
        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(mode);
        #[cfg(not(unix))]
        let _ = mode;

        let mut file = options.open(path)?;
        file.write_all(contents)?;
        file.flush()
    }

    fn mkdir(&self, path: &Path, mode: u32) -> io::Result<()> {
        let mut builder = DirBuilder::new();
        #[cfg(unix)]
        builder.mode(mode);
        #[cfg(not(unix))]
        let _ = mode;

        match builder.create(path) {
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => Ok(()),
            result => result,
        }
    }
}
