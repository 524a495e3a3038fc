// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Extraction of archives to the filesystem.

Extraction is dispatched on a file extension. Each [Extractor] declares the
extensions it handles and an [ExtractorRegistry] maps every declared extension
to its extractor. Registries are constructed once and then only read, so a
single instance can be shared across threads.

Callers describe what to extract with an [ExtractRequest]: either a reader or
a filesystem path, an optional extension override and a destination directory.
*/

use {
    crate::error::{GentooError, Result},
    log::debug,
    std::{
        collections::HashMap,
        io::Read,
        path::{Path, PathBuf},
    },
};

pub mod tar;

pub use self::tar::TarExtractor;

/// An archive format that can be unpacked to a directory.
pub trait Extractor: Send + Sync {
    /// Normalized extensions (lower-case, no leading dot) handled by this extractor.
    fn extensions(&self) -> &'static [&'static str];

    /// Extract all entries from `reader` into `destination`.
    ///
    /// `extension` is one of the values returned by [Self::extensions()].
    fn extract(&self, reader: &mut dyn Read, extension: &str, destination: &Path) -> Result<()>;
}

/// Describes an archive to extract and where to put it.
///
/// Exactly one of a reader or a path must be provided. An extension is required
/// when a reader is provided, as there is no filename to infer it from.
pub struct ExtractRequest<'a> {
    reader: Option<&'a mut dyn Read>,
    path: Option<PathBuf>,
    extension: Option<String>,
    destination: PathBuf,
}

impl<'a> ExtractRequest<'a> {
    /// Construct an empty request extracting into `destination`.
    pub fn new(destination: impl AsRef<Path>) -> Self {
        Self {
            reader: None,
            path: None,
            extension: None,
            destination: destination.as_ref().to_path_buf(),
        }
    }

    /// Construct a request reading from a stream of a known extension.
    pub fn from_reader(
        reader: &'a mut dyn Read,
        extension: impl ToString,
        destination: impl AsRef<Path>,
    ) -> Self {
        Self::new(destination)
            .reader(reader)
            .extension(extension)
    }

    /// Construct a request reading from a file, inferring the extension from its name.
    pub fn from_path(path: impl AsRef<Path>, destination: impl AsRef<Path>) -> Self {
        Self::new(destination).path(path)
    }

    /// Set the reader to extract from.
    #[must_use]
    pub fn reader(mut self, reader: &'a mut dyn Read) -> Self {
        self.reader = Some(reader);
        self
    }

    /// Set the filesystem path of the archive to extract.
    #[must_use]
    pub fn path(mut self, path: impl AsRef<Path>) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set an explicit archive extension, overriding any inferred from the path.
    #[must_use]
    pub fn extension(mut self, extension: impl ToString) -> Self {
        self.extension = Some(extension.to_string());
        self
    }

    /// The directory content will be extracted to.
    pub fn destination(&self) -> &Path {
        &self.destination
    }
}

/// Normalize an extension string to the form used for registry lookups.
///
/// The result is lower-case and has a leading `.` removed.
pub fn normalize_extension(extension: &str) -> String {
    let extension = extension.to_ascii_lowercase();

    match extension.strip_prefix('.') {
        Some(stripped) => stripped.to_string(),
        None => extension,
    }
}

/// An immutable mapping of archive extensions to [Extractor] instances.
pub struct ExtractorRegistry {
    extractors: Vec<Box<dyn Extractor>>,
    extensions: HashMap<&'static str, usize>,
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::new(vec![Box::new(TarExtractor::default())])
    }
}

impl ExtractorRegistry {
    /// Construct an instance from a fixed set of extractors.
    ///
    /// If multiple extractors declare the same extension, the last one wins.
    pub fn new(extractors: Vec<Box<dyn Extractor>>) -> Self {
        let mut extensions = HashMap::new();

        for (index, extractor) in extractors.iter().enumerate() {
            for extension in extractor.extensions() {
                extensions.insert(*extension, index);
            }
        }

        Self {
            extractors,
            extensions,
        }
    }

    /// Obtain the extractor registered for a normalized extension.
    pub fn extractor(&self, extension: &str) -> Option<&dyn Extractor> {
        self.extensions
            .get(extension)
            .map(|index| self.extractors[*index].as_ref())
    }

    /// Iterate over all registered extensions, in no particular order.
    pub fn iter_extensions(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.extensions.keys().copied()
    }

    /// Infer the normalized extension of an archive from its path.
    ///
    /// The longest registered extension the filename ends with wins, so multi-part
    /// extensions like `tar.gz` are recognized. If no registered extension matches,
    /// the final dot-delimited suffix is returned (which won't be registered).
    pub fn infer_extension(&self, path: &Path) -> String {
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();

        self.extensions
            .keys()
            .filter(|extension| filename.ends_with(&format!(".{}", extension)))
            .max_by_key(|extension| extension.len())
            .map(|extension| extension.to_string())
            .unwrap_or_else(|| {
                path.extension()
                    .map(|ext| normalize_extension(&ext.to_string_lossy()))
                    .unwrap_or_default()
            })
    }

    /// Extract an archive as described by a request.
    ///
    /// The destination is not touched unless an extractor is found for the archive.
    /// Entries written before a failure are left in place; cleaning up the destination
    /// is the caller's responsibility.
    pub fn extract(&self, request: ExtractRequest<'_>) -> Result<()> {
        let ExtractRequest {
            reader,
            path,
            extension,
            destination,
        } = request;

        let extension = match (&reader, &path, extension) {
            (None, None, _) => {
                return Err(GentooError::ExtractArgument(
                    "either a reader or a path must be provided",
                ));
            }
            (Some(_), Some(_), _) => {
                return Err(GentooError::ExtractArgument(
                    "only one of a reader or a path can be provided",
                ));
            }
            (Some(_), None, None) => {
                return Err(GentooError::ExtractArgument(
                    "an extension must be provided when extracting from a reader",
                ));
            }
            (_, _, Some(extension)) => normalize_extension(&extension),
            (None, Some(path), None) => self.infer_extension(path),
        };

        let extractor = self
            .extractor(&extension)
            .ok_or_else(|| GentooError::UnsupportedArchiveExtension(extension.clone()))?;

        debug!(
            "extracting {} archive to {}",
            extension,
            destination.display()
        );

        match (reader, path) {
            (Some(reader), _) => extractor.extract(reader, &extension, &destination),
            (None, Some(path)) => {
                let mut fh = std::fs::File::open(&path)
                    .map_err(|e| GentooError::IoPath(format!("{}", path.display()), e))?;

                extractor.extract(&mut fh, &extension, &destination)
            }
            (None, None) => Err(GentooError::ExtractArgument(
                "either a reader or a path must be provided",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use {super::*, std::io::Cursor};

    #[test]
    fn normalize() {
        assert_eq!(normalize_extension("tar"), "tar");
        assert_eq!(normalize_extension(".TAR.GZ"), "tar.gz");
        assert_eq!(normalize_extension("..txz"), ".txz");
    }

    #[test]
    fn registry_extensions() {
        let registry = ExtractorRegistry::default();

        let mut extensions = registry.iter_extensions().collect::<Vec<_>>();
        extensions.sort_unstable();
        assert_eq!(
            extensions,
            vec!["tar", "tar.bz2", "tar.gz", "tar.xz", "tgz", "txz"]
        );

        assert!(registry.extractor("tar.gz").is_some());
        assert!(registry.extractor("gz").is_none());
        assert!(registry.extractor("zip").is_none());
    }

    #[test]
    fn infer_extension() {
        let registry = ExtractorRegistry::default();

        assert_eq!(
            registry.infer_extension(Path::new("/tmp/image.tar.gz")),
            "tar.gz"
        );
        assert_eq!(
            registry.infer_extension(Path::new("foo-1.0.gpkg.tar")),
            "tar"
        );
        assert_eq!(registry.infer_extension(Path::new("Foo.TXZ")), "txz");
        assert_eq!(
            registry.infer_extension(Path::new("metadata.tar.bz2")),
            "tar.bz2"
        );
        assert_eq!(registry.infer_extension(Path::new("archive.zip")), "zip");
        assert_eq!(registry.infer_extension(Path::new("noext")), "");
    }

    #[test]
    fn request_validation() -> Result<()> {
        let registry = ExtractorRegistry::default();
        let td = tempfile::tempdir()?;

        assert!(matches!(
            registry.extract(ExtractRequest::new(td.path())),
            Err(GentooError::ExtractArgument(_))
        ));

        let mut reader = Cursor::new(vec![]);
        assert!(matches!(
            registry.extract(
                ExtractRequest::new(td.path())
                    .reader(&mut reader)
                    .path("foo.tar")
            ),
            Err(GentooError::ExtractArgument(_))
        ));

        let mut reader = Cursor::new(vec![]);
        assert!(matches!(
            registry.extract(ExtractRequest::new(td.path()).reader(&mut reader)),
            Err(GentooError::ExtractArgument(_))
        ));

        Ok(())
    }

    #[test]
    fn unsupported_extension_leaves_destination_alone() -> Result<()> {
        let registry = ExtractorRegistry::default();
        let td = tempfile::tempdir()?;
        let destination = td.path().join("dest");

        let mut reader = Cursor::new(b"PK\x03\x04".to_vec());
        let res = registry.extract(ExtractRequest::from_reader(&mut reader, ".zip", &destination));
        assert!(
            matches!(res, Err(GentooError::UnsupportedArchiveExtension(ref ext)) if ext == "zip")
        );

        let archive = td.path().join("archive.zip");
        std::fs::write(&archive, b"PK\x03\x04")?;
        let res = registry.extract(ExtractRequest::from_path(&archive, &destination));
        assert!(
            matches!(res, Err(GentooError::UnsupportedArchiveExtension(ref ext)) if ext == "zip")
        );

        assert!(!destination.exists());

        Ok(())
    }

    #[test]
    fn missing_path() -> Result<()> {
        let registry = ExtractorRegistry::default();
        let td = tempfile::tempdir()?;

        let res = registry.extract(ExtractRequest::from_path(
            td.path().join("missing.tar"),
            td.path().join("dest"),
        ));
        assert!(matches!(res, Err(GentooError::IoPath(_, _))));

        Ok(())
    }
}
