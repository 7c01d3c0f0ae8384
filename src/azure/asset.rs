//! Local content uploaded as blobs.

use std::fs::File;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{Error, Result};

/// Source of a blob's content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetOrArchive {
    /// A single file uploaded as-is
    FileAsset(PathBuf),
    /// A directory zipped on upload, or an existing `.zip` file
    FileArchive(PathBuf),
}

impl AssetOrArchive {
    /// A single file.
    pub fn file_asset(path: impl Into<PathBuf>) -> Self {
        Self::FileAsset(path.into())
    }

    /// A directory or `.zip` archive.
    pub fn file_archive(path: impl Into<PathBuf>) -> Self {
        Self::FileArchive(path.into())
    }

    /// The local path.
    pub fn path(&self) -> &Path {
        match self {
            Self::FileAsset(path) | Self::FileArchive(path) => path,
        }
    }

    /// Fails with [`Error::FileNotFound`] if the path does not exist.
    pub fn ensure_exists(&self) -> Result<()> {
        if self.path().exists() {
            Ok(())
        } else {
            Err(Error::FileNotFound(self.path().to_path_buf()))
        }
    }

    /// Reads the bytes to upload.
    pub fn read(&self) -> Result<Vec<u8>> {
        self.ensure_exists()?;

        match self {
            Self::FileAsset(path) => Ok(std::fs::read(path)?),
            Self::FileArchive(path) if path.is_dir() => zip_directory(path),
            Self::FileArchive(path) => {
                let is_zip = path
                    .extension()
                    .map_or(false, |ext| ext.eq_ignore_ascii_case("zip"));
                if !is_zip {
                    return Err(Error::archive(path, "expected a directory or a .zip file"));
                }
                Ok(std::fs::read(path)?)
            }
        }
    }
}

/// Zips a directory tree in memory. Entry names are relative to `dir` and use
/// `/` separators.
pub fn zip_directory(dir: &Path) -> Result<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644);

    let mut files = 0usize;
    for entry in WalkDir::new(dir).sort_by_file_name().min_depth(1) {
        let entry = entry.map_err(|e| Error::archive(dir, e.to_string()))?;
        let relative = entry
            .path()
            .strip_prefix(dir)
            .map_err(|e| Error::archive(dir, e.to_string()))?;
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if entry.file_type().is_dir() {
            writer.add_directory(format!("{}/", name), options)?;
        } else if entry.file_type().is_file() {
            let mut content = Vec::new();
            File::open(entry.path())?.read_to_end(&mut content)?;
            writer.start_file(name, options)?;
            writer.write_all(&content)?;
            files += 1;
        }
    }

    let bytes = writer.finish()?.into_inner();
    debug!(path = %dir.display(), files, bytes = bytes.len(), "Packaged archive");
    Ok(bytes)
}
