// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Binhost `Packages` index files.

A binhost publishes a `Packages` file describing every binary package it serves.
The first document is a header of repository-wide settings. Each following
document describes one package.

```text
ARCH: arm64
PACKAGES: 1
TIMESTAMP: 1700000000

CPV: x11-terms/alacritty-0.12.3
PATH: x11-terms/alacritty/alacritty-0.12.3-1.gpkg.tar
SLOT: 0
```
*/

use {
    crate::{
        colon::ColonDocumentReader,
        error::Result,
        record::{record_field, ColonRecord, RecordField},
    },
    std::io::{BufRead, Write},
};

/// The header document of a `Packages` index.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct IndexHeader {
    /// `ACCEPT_KEYWORDS`
    pub accept_keywords: Vec<String>,
    /// `ACCEPT_LICENSE`, license groups and names in Portage syntax.
    pub accept_license: String,
    /// `ACCEPT_PROPERTIES`
    pub accept_properties: String,
    /// `ACCEPT_RESTRICT`
    pub accept_restrict: String,
    /// `ARCH`, e.g. `amd64`.
    pub arch: String,
    /// `CBUILD`
    pub cbuild: String,
    /// `CHOST`
    pub chost: String,
    /// `CONFIG_PROTECT`
    pub config_protect: Vec<String>,
    /// `CONFIG_PROTECT_MASK`
    pub config_protect_mask: Vec<String>,
    /// `ELIBC`
    pub elibc: String,
    /// `FEATURES`
    pub features: Vec<String>,
    /// `GENTOO_MIRRORS`
    pub gentoo_mirrors: Vec<String>,
    /// `INSTALL_MASK`
    pub install_mask: Vec<String>,
    /// `IUSE_IMPLICIT`
    pub iuse_implicit: Vec<String>,
    /// `KERNEL`
    pub kernel: String,
    /// `PACKAGES`, the number of package documents following the header.
    pub packages: u64,
    /// `PROFILE`, the profile packages were built with.
    pub profile: String,
    /// `TIMESTAMP`, when the index was generated. Seconds since the UNIX epoch.
    pub timestamp: u64,
    /// `URI`, the base URI packages are fetched relative to.
    pub uri: String,
    /// `USE`
    pub use_flags: Vec<String>,
    /// `USE_EXPAND`
    pub use_expand: Vec<String>,
    /// `USE_EXPAND_HIDDEN`
    pub use_expand_hidden: Vec<String>,
    /// `USE_EXPAND_IMPLICIT`
    pub use_expand_implicit: Vec<String>,
    /// `USE_EXPAND_UNPREFIXED`
    pub use_expand_unprefixed: Vec<String>,
    /// `USE_EXPAND_VALUES_ARCH`
    pub use_expand_values_arch: Vec<String>,
    /// `USE_EXPAND_VALUES_ELIBC`
    pub use_expand_values_elibc: Vec<String>,
    /// `USE_EXPAND_VALUES_KERNEL`
    pub use_expand_values_kernel: Vec<String>,
    /// `USE_EXPAND_VALUES_USERLAND`
    pub use_expand_values_userland: Vec<String>,
    /// `VERSION`, the version of the index format.
    pub version: u64,
}

impl ColonRecord for IndexHeader {
    const FIELDS: &'static [RecordField<Self>] = &[
        record_field!(IndexHeader, "ACCEPT_KEYWORDS", accept_keywords: StringList),
        record_field!(IndexHeader, "ACCEPT_LICENSE", accept_license: String),
        record_field!(IndexHeader, "ACCEPT_PROPERTIES", accept_properties: String),
        record_field!(IndexHeader, "ACCEPT_RESTRICT", accept_restrict: String),
        record_field!(IndexHeader, "ARCH", arch: String),
        record_field!(IndexHeader, "CBUILD", cbuild: String),
        record_field!(IndexHeader, "CHOST", chost: String),
        record_field!(IndexHeader, "CONFIG_PROTECT", config_protect: StringList),
        record_field!(IndexHeader, "CONFIG_PROTECT_MASK", config_protect_mask: StringList),
        record_field!(IndexHeader, "ELIBC", elibc: String),
        record_field!(IndexHeader, "FEATURES", features: StringList),
        record_field!(IndexHeader, "GENTOO_MIRRORS", gentoo_mirrors: StringList),
        record_field!(IndexHeader, "INSTALL_MASK", install_mask: StringList),
        record_field!(IndexHeader, "IUSE_IMPLICIT", iuse_implicit: StringList),
        record_field!(IndexHeader, "KERNEL", kernel: String),
        record_field!(IndexHeader, "PACKAGES", packages: Integer),
        record_field!(IndexHeader, "PROFILE", profile: String),
        record_field!(IndexHeader, "TIMESTAMP", timestamp: Integer),
        record_field!(IndexHeader, "URI", uri: String),
        record_field!(IndexHeader, "USE", use_flags: StringList),
        record_field!(IndexHeader, "USE_EXPAND", use_expand: StringList),
        record_field!(IndexHeader, "USE_EXPAND_HIDDEN", use_expand_hidden: StringList),
        record_field!(IndexHeader, "USE_EXPAND_IMPLICIT", use_expand_implicit: StringList),
        record_field!(IndexHeader, "USE_EXPAND_UNPREFIXED", use_expand_unprefixed: StringList),
        record_field!(IndexHeader, "USE_EXPAND_VALUES_ARCH", use_expand_values_arch: StringList),
        record_field!(IndexHeader, "USE_EXPAND_VALUES_ELIBC", use_expand_values_elibc: StringList),
        record_field!(IndexHeader, "USE_EXPAND_VALUES_KERNEL", use_expand_values_kernel: StringList),
        record_field!(IndexHeader, "USE_EXPAND_VALUES_USERLAND", use_expand_values_userland: StringList),
        record_field!(IndexHeader, "VERSION", version: Integer),
    ];
}

/// A package document in a `Packages` index.
///
/// Dependency fields hold dependency specifications verbatim.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct IndexPackage {
    /// `BDEPEND`
    pub bdepend: String,
    /// `BUILD_ID`
    pub build_id: u64,
    /// `BUILD_TIME`, seconds since the UNIX epoch.
    pub build_time: u64,
    /// `CPV`, the `CATEGORY/PF` identifier of the package.
    pub cpv: String,
    /// `DEFINED_PHASES`
    pub defined_phases: Vec<String>,
    /// `DEPEND`
    pub depend: String,
    /// `DESCRIPTION`
    pub description: String,
    /// `EAPI`
    pub eapi: u64,
    /// `IDEPEND`
    pub idepend: String,
    /// `IUSE`
    pub iuse: Vec<String>,
    /// `KEYWORDS`
    pub keywords: Vec<String>,
    /// `LICENSE`
    pub license: Vec<String>,
    /// `MD5`, hex encoded MD5 of the package file.
    pub md5: String,
    /// `PATH`, path of the package file relative to the index.
    pub path: String,
    /// `PDEPEND`
    pub pdepend: String,
    /// `PROPERTIES`
    pub properties: String,
    /// `PROVIDES`, sonames provided by the package.
    pub provides: String,
    /// `RDEPEND`
    pub rdepend: String,
    /// `REQUIRES`, sonames required by the package.
    pub requires: String,
    /// `RESTRICT`
    pub restrict: String,
    /// `SHA1`, hex encoded SHA-1 of the package file.
    pub sha1: String,
    /// `SIZE`, size in bytes of the package file.
    pub size: u64,
    /// `SLOT`
    pub slot: String,
    /// `USE`
    pub use_flags: Vec<String>,
    /// `MTIME`, modification time of the package file. Seconds since the UNIX epoch.
    pub mtime: u64,
    /// `REPO`, name of the repository the package was built from.
    pub repo: String,
}

impl ColonRecord for IndexPackage {
    const FIELDS: &'static [RecordField<Self>] = &[
        record_field!(IndexPackage, "BDEPEND", bdepend: String),
        record_field!(IndexPackage, "BUILD_ID", build_id: Integer),
        record_field!(IndexPackage, "BUILD_TIME", build_time: Integer),
        record_field!(IndexPackage, "CPV", cpv: String),
        record_field!(IndexPackage, "DEFINED_PHASES", defined_phases: StringList),
        record_field!(IndexPackage, "DEPEND", depend: String),
        record_field!(IndexPackage, "DESCRIPTION", description: String),
        record_field!(IndexPackage, "EAPI", eapi: Integer),
        record_field!(IndexPackage, "IDEPEND", idepend: String),
        record_field!(IndexPackage, "IUSE", iuse: StringList),
        record_field!(IndexPackage, "KEYWORDS", keywords: StringList),
        record_field!(IndexPackage, "LICENSE", license: StringList),
        record_field!(IndexPackage, "MD5", md5: String),
        record_field!(IndexPackage, "PATH", path: String),
        record_field!(IndexPackage, "PDEPEND", pdepend: String),
        record_field!(IndexPackage, "PROPERTIES", properties: String),
        record_field!(IndexPackage, "PROVIDES", provides: String),
        record_field!(IndexPackage, "RDEPEND", rdepend: String),
        record_field!(IndexPackage, "REQUIRES", requires: String),
        record_field!(IndexPackage, "RESTRICT", restrict: String),
        record_field!(IndexPackage, "SHA1", sha1: String),
        record_field!(IndexPackage, "SIZE", size: Integer),
        record_field!(IndexPackage, "SLOT", slot: String),
        record_field!(IndexPackage, "USE", use_flags: StringList),
        record_field!(IndexPackage, "MTIME", mtime: Integer),
        record_field!(IndexPackage, "REPO", repo: String),
    ];
}

/// A parsed `Packages` index.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct BinhostIndex {
    /// Repository-wide settings.
    pub header: IndexHeader,
    /// Packages, in file order.
    pub packages: Vec<IndexPackage>,
}

impl BinhostIndex {
    /// Construct an instance with a header and no packages.
    pub fn new(header: IndexHeader) -> Self {
        Self {
            header,
            packages: vec![],
        }
    }

    /// Parse an index from a reader.
    ///
    /// Returns [None] if the input holds no documents. A blank first line is an
    /// empty header, which is how a header with no set fields is written.
    pub fn parse_reader<R: BufRead>(reader: R) -> Result<Option<Self>> {
        let mut documents = ColonDocumentReader::new(reader).with_leading_empty_document();

        let header = match documents.next() {
            Some(document) => IndexHeader::from_document(&document?)?,
            None => return Ok(None),
        };

        let packages = documents
            .map(|document| IndexPackage::from_document(&document?))
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(Self { header, packages }))
    }

    /// Parse an index from a string.
    pub fn parse_str(s: &str) -> Result<Option<Self>> {
        Self::parse_reader(s.as_bytes())
    }

    /// Serialize the index to a writer.
    ///
    /// The header is written first, then every package in order.
    pub fn write<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        self.header.write_colon(writer)?;

        for package in &self.packages {
            package.write_colon(writer)?;
        }

        Ok(())
    }

    /// Append a package, updating the header's package count.
    pub fn push_package(&mut self, package: IndexPackage) {
        self.packages.push(package);
        self.header.packages = self.packages.len() as u64;
    }

    /// Find a package by its `CPV`.
    pub fn find_cpv(&self, cpv: &str) -> Option<&IndexPackage> {
        self.packages.iter().find(|package| package.cpv == cpv)
    }
}

impl std::fmt::Display for BinhostIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.header.to_document())?;

        for package in &self.packages {
            write!(f, "{}", package.to_document())?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use {super::*, crate::error::GentooError, indoc::indoc};

    const INDEX: &str = indoc! {"
        ACCEPT_KEYWORDS: arm64 ~arm64
        ARCH: arm64
        CBUILD: aarch64-unknown-linux-gnu
        CHOST: aarch64-unknown-linux-gnu
        PACKAGES: 2
        PROFILE: default/linux/arm64/23.0
        TIMESTAMP: 1700000000
        VERSION: 0

        BUILD_TIME: 1699999000
        CPV: x11-terms/alacritty-0.12.3
        DEFINED_PHASES: compile install
        EAPI: 8
        KEYWORDS: amd64 arm64
        LICENSE: Apache-2.0 MIT
        MD5: 0123456789abcdef0123456789abcdef
        PATH: x11-terms/alacritty/alacritty-0.12.3-1.gpkg.tar
        RDEPEND: media-libs/fontconfig x11-libs/libxcb
        SHA1: 0123456789abcdef0123456789abcdef01234567
        SIZE: 2048000
        SLOT: 0
        USE: X wayland
        MTIME: 1700000000
        REPO: gentoo

        CPV: app-misc/onepassword-cli-0-1
        SLOT: 0
    "};

    #[test]
    fn encode_minimal_package() {
        let package = IndexPackage {
            cpv: "x11-terms/alacritty-0.12.3".into(),
            ..Default::default()
        };

        assert_eq!(package.to_colon_string(), "CPV: x11-terms/alacritty-0.12.3\n\n");
    }

    #[test]
    fn parse_minimal() -> Result<()> {
        let index = BinhostIndex::parse_str("ARCH: arm64\n\nCPV: x11-terms/alacritty-0.12.3\n")?
            .expect("index should be present");

        assert_eq!(index.header.arch, "arm64");
        assert_eq!(index.packages.len(), 1);
        assert_eq!(index.packages[0].cpv, "x11-terms/alacritty-0.12.3");

        Ok(())
    }

    #[test]
    fn parse_empty() -> Result<()> {
        assert!(BinhostIndex::parse_str("")?.is_none());

        let index = BinhostIndex::parse_str("ARCH: amd64\n")?.expect("index should be present");
        assert!(index.packages.is_empty());

        Ok(())
    }

    #[test]
    fn parse_full() -> Result<()> {
        let index = BinhostIndex::parse_str(INDEX)?.expect("index should be present");

        assert_eq!(index.header.accept_keywords, vec!["arm64", "~arm64"]);
        assert_eq!(index.header.packages, 2);
        assert_eq!(index.header.timestamp, 1_700_000_000);
        assert_eq!(index.header.version, 0);

        let alacritty = index
            .find_cpv("x11-terms/alacritty-0.12.3")
            .expect("package should be present");
        assert_eq!(alacritty.eapi, 8);
        assert_eq!(alacritty.size, 2_048_000);
        assert_eq!(alacritty.license, vec!["Apache-2.0", "MIT"]);
        assert_eq!(alacritty.rdepend, "media-libs/fontconfig x11-libs/libxcb");
        assert_eq!(alacritty.use_flags, vec!["X", "wayland"]);
        assert_eq!(alacritty.repo, "gentoo");

        assert_eq!(index.packages[1].cpv, "app-misc/onepassword-cli-0-1");
        assert!(index.find_cpv("app-misc/missing-1").is_none());

        Ok(())
    }

    #[test]
    fn round_trip() -> Result<()> {
        let index = BinhostIndex::parse_str(INDEX)?.expect("index should be present");

        // VERSION: 0 is a default and isn't written back. Every document is terminated.
        let expected = format!("{}\n", INDEX.replace("VERSION: 0\n", ""));

        let mut buf = vec![];
        index.write(&mut buf)?;
        assert_eq!(String::from_utf8_lossy(&buf), expected);
        assert_eq!(index.to_string(), expected);

        assert_eq!(BinhostIndex::parse_str(&expected)?, Some(index));

        Ok(())
    }

    #[test]
    fn round_trip_empty_header() -> Result<()> {
        let index = BinhostIndex {
            header: IndexHeader::default(),
            packages: vec![
                IndexPackage {
                    cpv: "a/b-1".into(),
                    ..Default::default()
                },
                IndexPackage {
                    cpv: "a/c-2".into(),
                    slot: "0".into(),
                    ..Default::default()
                },
            ],
        };

        let encoded = index.to_string();
        assert_eq!(encoded, "\nCPV: a/b-1\n\nCPV: a/c-2\nSLOT: 0\n\n");
        assert_eq!(BinhostIndex::parse_str(&encoded)?, Some(index));

        let empty = BinhostIndex::default();
        assert_eq!(empty.to_string(), "\n");
        assert_eq!(BinhostIndex::parse_str("\n")?, Some(empty.clone()));
        assert_eq!(BinhostIndex::parse_str("\n\n\n")?, Some(empty));

        Ok(())
    }

    #[test]
    fn non_utf8_description() {
        let data = b"ARCH: amd64\n\nCPV: a/b-1\nDESCRIPTION: caf\xe9\n";
        let res = BinhostIndex::parse_reader(&data[..]);

        match res {
            Err(e) => {
                assert!(e.is_validation_error());
                assert!(matches!(e, GentooError::ColonInvalidUtf8 { line_number: 4 }));
            }
            Ok(index) => panic!("unexpected index: {:?}", index),
        }
    }

    #[test]
    fn unknown_package_field() {
        let res = BinhostIndex::parse_str("ARCH: amd64\n\nCPV: a/b-1\nBOGUS: x\n");

        assert!(matches!(res, Err(GentooError::UnknownField(ref key)) if key == "BOGUS"));
    }

    #[test]
    fn unknown_header_field() {
        // Package keys aren't valid in the header.
        let res = BinhostIndex::parse_str("CPV: a/b-1\n");

        assert!(matches!(res, Err(GentooError::UnknownField(ref key)) if key == "CPV"));
    }

    #[test]
    fn push_package() -> Result<()> {
        let mut index = BinhostIndex::new(IndexHeader {
            arch: "amd64".into(),
            ..Default::default()
        });

        for cpv in ["app-misc/b-1", "app-misc/a-1"] {
            index.push_package(IndexPackage {
                cpv: cpv.into(),
                ..Default::default()
            });
        }

        assert_eq!(
            index.to_string(),
            "ARCH: amd64\nPACKAGES: 2\n\nCPV: app-misc/b-1\n\nCPV: app-misc/a-1\n\n"
        );

        Ok(())
    }
}
