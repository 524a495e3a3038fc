// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Reading gpkg binary packages.

A gpkg is a plain tar archive, usually with a single top-level directory named
after the package, holding:

* `gpkg-1`, an empty marker identifying the format.
* `Manifest`, digests of the other members.
* `metadata.tar.{gz,bz2,xz}`, one file per build variable (see [Metadata]).
* `image.tar.{gz,bz2,xz}`, the files installed by the package.

[GpkgReader] unpacks all of this into a private scratch directory and exposes
the result as a [PackageBundle]. The scratch directory lives until
[PackageBundle::delete()] is called.
*/

use {
    crate::{
        archive::{ExtractRequest, ExtractorRegistry},
        binhost_index::IndexPackage,
        error::{GentooError, Result},
        io::{Compression, ContentDigest, ContentDigests, DigestingReader},
        metadata::Metadata,
        record::ColonRecord,
    },
    log::{debug, warn},
    serde::{Deserialize, Serialize},
    std::{
        ffi::OsStr,
        io::Read,
        path::{Path, PathBuf},
    },
};

/// Filename of the gpkg format marker.
pub const GPKG_MARKER_FILENAME: &str = "gpkg-1";

/// Filename of the gpkg manifest.
pub const MANIFEST_FILENAME: &str = "Manifest";

/// Base name of the sub-archive holding installed files.
pub const IMAGE_ARCHIVE_NAME: &str = "image";

/// Base name of the sub-archive holding build metadata.
pub const METADATA_ARCHIVE_NAME: &str = "metadata";

const DEFAULT_SCRATCH_PREFIX: &str = "gpkg-";

/// Split a `PF` value into its package name and version.
///
/// The split happens on the final `-`. Versions that contain a `-` themselves are
/// therefore misattributed to the name: `foo-1.0-r1` yields `("foo-1.0", "r1")`.
pub fn split_pf(pf: &str) -> Result<(&str, &str)> {
    match pf.rsplit_once('-') {
        Some((name, version)) if !name.is_empty() && !version.is_empty() => Ok((name, version)),
        _ => Err(GentooError::GpkgInvalidPf(pf.to_string())),
    }
}

/// Configuration for a [GpkgReader].
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GpkgReaderConfig {
    /// Directory in which scratch directories are created.
    ///
    /// Defaults to the system temporary directory. Created if missing.
    #[serde(default)]
    pub scratch_dir: Option<PathBuf>,

    /// Prefix of scratch directory names.
    ///
    /// Defaults to `gpkg-`.
    #[serde(default)]
    pub scratch_prefix: Option<String>,
}

impl GpkgReaderConfig {
    fn create_scratch_dir(&self) -> Result<PathBuf> {
        let parent = self.scratch_dir.clone().unwrap_or_else(std::env::temp_dir);

        std::fs::create_dir_all(&parent).map_err(|e| {
            GentooError::IoPath(format!("creating directory {}", parent.display()), e)
        })?;

        let dir = tempfile::Builder::new()
            .prefix(
                self.scratch_prefix
                    .as_deref()
                    .unwrap_or(DEFAULT_SCRATCH_PREFIX),
            )
            .tempdir_in(&parent)
            .map_err(|e| {
                GentooError::IoPath(
                    format!("creating scratch directory in {}", parent.display()),
                    e,
                )
            })?;

        Ok(dir.into_path())
    }
}

fn read_dir_entries(path: &Path) -> Result<Vec<std::fs::DirEntry>> {
    let context = || format!("reading directory {}", path.display());

    std::fs::read_dir(path)
        .map_err(|e| GentooError::IoPath(context(), e))?
        .map(|entry| entry.map_err(|e| GentooError::IoPath(context(), e)))
        .collect()
}

/// Move the children of `root/name` into `root` and remove the emptied directory.
///
/// Fails before moving any child if one would replace an existing entry of `root`.
fn hoist_directory(root: &Path, name: &OsStr) -> Result<()> {
    let source = root.join(name);
    // The directory may hold a child of its own name.
    let staging = root.join(format!(".{}.hoist", name.to_string_lossy()));

    debug!("hoisting {} into {}", source.display(), root.display());

    std::fs::rename(&source, &staging).map_err(|e| {
        GentooError::IoPath(format!("renaming {}", source.display()), e)
    })?;

    let entries = read_dir_entries(&staging)?;

    if let Some(entry) = entries
        .iter()
        .find(|entry| std::fs::symlink_metadata(root.join(entry.file_name())).is_ok())
    {
        return Err(GentooError::GpkgLayoutCollision(
            entry.file_name().to_string_lossy().to_string(),
        ));
    }

    for entry in entries {
        let dest = root.join(entry.file_name());

        std::fs::rename(entry.path(), &dest).map_err(|e| {
            GentooError::IoPath(format!("moving {}", dest.display()), e)
        })?;
    }

    std::fs::remove_dir(&staging)
        .map_err(|e| GentooError::IoPath(format!("removing {}", staging.display()), e))
}

/// Reduce the extracted outer archive to a flat layout.
///
/// Fails if there are multiple top-level directories to choose from.
fn normalize_layout(root: &Path) -> Result<()> {
    let mut directories = vec![];

    for entry in read_dir_entries(root)? {
        let file_type = entry.file_type().map_err(|e| {
            GentooError::IoPath(format!("reading type of {}", entry.path().display()), e)
        })?;

        if file_type.is_dir() {
            directories.push(entry.file_name());
        }
    }

    match directories.as_slice() {
        [] => Ok(()),
        [name] => hoist_directory(root, name),
        _ => {
            let mut names = directories
                .iter()
                .map(|name| name.to_string_lossy().to_string())
                .collect::<Vec<_>>();
            names.sort();

            Err(GentooError::GpkgAmbiguousLayout(names))
        }
    }
}

/// Collapse `dir/name/` into `dir/` when it is the sole entry of `dir`.
fn collapse_nested_directory(dir: &Path, name: &str) -> Result<()> {
    let entries = read_dir_entries(dir)?;

    if let [entry] = entries.as_slice() {
        if entry.file_name() == name && entry.path().is_dir() {
            hoist_directory(dir, entry.file_name().as_os_str())?;
        }
    }

    Ok(())
}

/// Reads gpkg packages into [PackageBundle] instances.
pub struct GpkgReader<'a> {
    registry: &'a ExtractorRegistry,
    config: GpkgReaderConfig,
}

impl<'a> GpkgReader<'a> {
    /// Construct an instance with default configuration.
    pub fn new(registry: &'a ExtractorRegistry) -> Self {
        Self::with_config(registry, GpkgReaderConfig::default())
    }

    /// Construct an instance with explicit configuration.
    pub fn with_config(registry: &'a ExtractorRegistry, config: GpkgReaderConfig) -> Self {
        Self { registry, config }
    }

    /// The configuration of this instance.
    pub fn config(&self) -> &GpkgReaderConfig {
        &self.config
    }

    /// Read a gpkg from a stream.
    ///
    /// The stream is read to its end. On error, the scratch directory is removed.
    pub fn read(&self, reader: impl Read) -> Result<PackageBundle> {
        let root = self.config.create_scratch_dir()?;

        match self.assemble(reader, &root) {
            Ok(bundle) => Ok(bundle),
            Err(e) => {
                if let Err(cleanup) = std::fs::remove_dir_all(&root) {
                    warn!(
                        "failed to remove scratch directory {}: {}",
                        root.display(),
                        cleanup
                    );
                }

                Err(e)
            }
        }
    }

    /// Read a gpkg from a filesystem path.
    pub fn read_path(&self, path: impl AsRef<Path>) -> Result<PackageBundle> {
        let path = path.as_ref();

        let fh = std::fs::File::open(path)
            .map_err(|e| GentooError::IoPath(format!("opening {}", path.display()), e))?;

        self.read(std::io::BufReader::new(fh))
    }

    fn assemble(&self, reader: impl Read, root: &Path) -> Result<PackageBundle> {
        debug!("unpacking gpkg into {}", root.display());

        let mut reader = DigestingReader::new(reader);
        self.registry
            .extract(ExtractRequest::from_reader(&mut reader, "tar", root))?;
        reader
            .drain()
            .map_err(|e| GentooError::IoPath("reading gpkg stream".to_string(), e))?;
        let digests = reader.finish();

        normalize_layout(root)?;

        for required in [MANIFEST_FILENAME, GPKG_MARKER_FILENAME] {
            if !root.join(required).is_file() {
                return Err(GentooError::GpkgMissingFile(required));
            }
        }

        self.extract_sub_archive(root, IMAGE_ARCHIVE_NAME)?;
        let metadata_dir = self.extract_sub_archive(root, METADATA_ARCHIVE_NAME)?;

        let metadata = Metadata::from_directory(&metadata_dir)?;
        let (name, version) = split_pf(&metadata.pf)?;
        let (name, version) = (name.to_string(), version.to_string());

        debug!("read gpkg {}", metadata.cpv());

        Ok(PackageBundle {
            root: root.to_path_buf(),
            metadata,
            name,
            version,
            digests,
        })
    }

    /// Extract the first `{name}.tar.*` candidate found into `{name}/`.
    fn extract_sub_archive(&self, root: &Path, name: &'static str) -> Result<PathBuf> {
        let archive = Compression::gpkg_preferred_order()
            .map(|compression| root.join(format!("{}.tar{}", name, compression.extension())))
            .find(|path| path.is_file())
            .ok_or(GentooError::GpkgMissingArchive(name))?;

        let destination = root.join(name);
        debug!("extracting {}", archive.display());

        self.registry
            .extract(ExtractRequest::from_path(&archive, &destination))?;
        collapse_nested_directory(&destination, name)?;

        Ok(destination)
    }
}

/// An unpacked gpkg and its decoded metadata.
///
/// Dropping an instance leaves its files on disk. Call [Self::delete()] to remove them.
#[derive(Debug)]
pub struct PackageBundle {
    root: PathBuf,
    metadata: Metadata,
    name: String,
    version: String,
    digests: ContentDigests,
}

impl PackageBundle {
    /// The scratch directory holding the unpacked package.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the files installed by the package.
    pub fn image_dir(&self) -> PathBuf {
        self.root.join(IMAGE_ARCHIVE_NAME)
    }

    /// Directory holding the raw build metadata files.
    pub fn metadata_dir(&self) -> PathBuf {
        self.root.join(METADATA_ARCHIVE_NAME)
    }

    /// Decoded build metadata.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// The package name, derived from `PF`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The package version, derived from `PF`.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// The package category.
    pub fn category(&self) -> &str {
        &self.metadata.category
    }

    /// The name of the repository the package was built from.
    pub fn repository(&self) -> &str {
        &self.metadata.repository
    }

    /// The `CATEGORY/PF` identifier of the package.
    pub fn cpv(&self) -> String {
        self.metadata.cpv()
    }

    /// Size in bytes of the gpkg stream.
    pub fn size(&self) -> u64 {
        self.digests.size
    }

    /// MD5 of the gpkg stream.
    pub fn md5(&self) -> &ContentDigest {
        &self.digests.md5
    }

    /// SHA-1 of the gpkg stream.
    pub fn sha1(&self) -> &ContentDigest {
        &self.digests.sha1
    }

    /// Build a `Packages` index entry describing this package.
    ///
    /// `PATH` and `MTIME` depend on where the package is published and are left unset.
    pub fn to_index_package(&self) -> IndexPackage {
        let metadata = &self.metadata;

        IndexPackage {
            build_id: metadata.build_id,
            build_time: metadata.build_time,
            cpv: metadata.cpv(),
            defined_phases: metadata.defined_phases.clone(),
            description: metadata.description.clone(),
            eapi: metadata.eapi,
            iuse: metadata.iuse.clone(),
            keywords: metadata.keywords.clone(),
            license: metadata.license.clone(),
            md5: self.digests.md5.digest_hex(),
            sha1: self.digests.sha1.digest_hex(),
            size: self.digests.size,
            slot: metadata.slot.clone(),
            use_flags: metadata.use_flags.clone(),
            repo: metadata.repository.clone(),
            ..Default::default()
        }
    }

    /// Remove the scratch directory.
    pub fn delete(self) -> Result<()> {
        debug!("removing {}", self.root.display());

        std::fs::remove_dir_all(&self.root)
            .map_err(|e| GentooError::IoPath(format!("removing {}", self.root.display()), e))
    }
}
