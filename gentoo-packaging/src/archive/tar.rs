// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Extraction of tar archives. */

use {
    crate::{
        archive::Extractor,
        error::{GentooError, Result},
        io::Compression,
    },
    log::trace,
    std::{
        io::Read,
        path::{Component, Path, PathBuf},
    },
    tar::EntryType,
};

/// Extensions of tar archives, optionally compressed.
const TAR_EXTENSIONS: &[&str] = &["tar", "tgz", "tar.gz", "tar.xz", "txz", "tar.bz2"];

/// Extracts tar archives, optionally compressed with gzip, bzip2 or xz.
///
/// Only directories and regular files are supported. Any other entry type
/// (symlinks, hard links, devices, FIFOs) fails extraction. Ownership is not
/// preserved. Permission bits and access/modification times are.
#[derive(Clone, Copy, Debug, Default)]
pub struct TarExtractor {}

impl Extractor for TarExtractor {
    fn extensions(&self) -> &'static [&'static str] {
        TAR_EXTENSIONS
    }

    fn extract(&self, reader: &mut dyn Read, extension: &str, destination: &Path) -> Result<()> {
        let compression = Compression::from_tar_extension(extension)
            .ok_or_else(|| GentooError::UnsupportedArchiveExtension(extension.to_string()))?;

        let reader = compression.decompress(reader)?;
        unpack(reader, destination)
    }
}

/// Attributes applied to a filesystem entry after its content is written.
struct EntryAttributes {
    mode: u32,
    atime: u64,
    mtime: u64,
}

impl EntryAttributes {
    fn from_header(header: &tar::Header, name: &str) -> Result<Self> {
        let mode = header
            .mode()
            .map_err(|e| GentooError::IoPath(format!("reading mode of {}", name), e))?;
        let mtime = header
            .mtime()
            .map_err(|e| GentooError::IoPath(format!("reading mtime of {}", name), e))?;
        // Only GNU headers record an access time.
        let atime = header
            .as_gnu()
            .and_then(|gnu| gnu.atime().ok())
            .filter(|atime| *atime != 0)
            .unwrap_or(mtime);

        Ok(Self { mode, atime, mtime })
    }

    fn apply(&self, path: &Path) -> Result<()> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            std::fs::set_permissions(path, std::fs::Permissions::from_mode(self.mode & 0o7777))
                .map_err(|e| {
                    GentooError::IoPath(format!("setting permissions of {}", path.display()), e)
                })?;
        }

        filetime::set_file_times(
            path,
            filetime::FileTime::from_unix_time(self.atime as i64, 0),
            filetime::FileTime::from_unix_time(self.mtime as i64, 0),
        )
        .map_err(|e| GentooError::IoPath(format!("setting times of {}", path.display()), e))
    }
}

/// Resolve the path of an archive entry relative to the extraction destination.
///
/// `.` components are dropped. Entries that would escape the destination are rejected.
fn entry_relative_path(path: &Path) -> Result<PathBuf> {
    let mut relative = PathBuf::new();

    for component in path.components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(GentooError::ArchiveEntryPathEscape(
                    path.display().to_string(),
                ));
            }
        }
    }

    Ok(relative)
}

fn unpack(reader: impl Read, destination: &Path) -> Result<()> {
    std::fs::create_dir_all(destination).map_err(|e| {
        GentooError::IoPath(format!("creating directory {}", destination.display()), e)
    })?;

    let mut archive = tar::Archive::new(reader);

    // Directory attributes are applied once all entries are written. Otherwise
    // writing children would clobber mtimes and read-only modes would block writes.
    let mut directories = vec![];

    let entries = archive
        .entries()
        .map_err(|e| GentooError::IoPath("reading tar archive".to_string(), e))?;

    for entry in entries {
        let mut entry =
            entry.map_err(|e| GentooError::IoPath("reading tar entry".to_string(), e))?;

        let entry_path = entry
            .path()
            .map_err(|e| GentooError::IoPath("reading tar entry path".to_string(), e))?
            .into_owned();
        let name = entry_path.display().to_string();
        let entry_type = entry.header().entry_type();

        if entry_type == EntryType::XGlobalHeader {
            continue;
        }

        let relative = entry_relative_path(&entry_path)?;
        let dest_path = destination.join(&relative);
        let attributes = EntryAttributes::from_header(entry.header(), &name)?;

        match entry_type {
            EntryType::Directory => {
                trace!("creating directory {}", dest_path.display());
                std::fs::create_dir_all(&dest_path).map_err(|e| {
                    GentooError::IoPath(format!("creating directory {}", dest_path.display()), e)
                })?;

                directories.push((dest_path, attributes));
            }
            EntryType::Regular | EntryType::Continuous => {
                if relative.as_os_str().is_empty() {
                    return Err(GentooError::ArchiveEntryPathEscape(name));
                }

                if let Some(parent) = dest_path.parent() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        GentooError::IoPath(format!("creating directory {}", parent.display()), e)
                    })?;
                }

                trace!("writing file {}", dest_path.display());
                let mut fh = std::fs::File::create(&dest_path).map_err(|e| {
                    GentooError::IoPath(format!("creating file {}", dest_path.display()), e)
                })?;
                std::io::copy(&mut entry, &mut fh).map_err(|e| {
                    GentooError::IoPath(format!("writing file {}", dest_path.display()), e)
                })?;
                drop(fh);

                attributes.apply(&dest_path)?;
            }
            other => {
                return Err(GentooError::UnsupportedArchiveEntry {
                    path: name,
                    entry_type: format!("{:?}", other),
                });
            }
        }
    }

    for (path, attributes) in directories.iter().rev() {
        attributes.apply(path)?;
    }

    Ok(())
}
