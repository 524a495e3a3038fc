// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Build metadata of a binary package.

A gpkg's `metadata.tar.*` archive holds one file per variable recorded by
Portage when the package was built, e.g. `metadata/PF` or `metadata/USE`.
[Metadata] holds the subset of those variables this crate understands.
*/

use crate::record::{record_field, ColonRecord, RecordField};

/// Build metadata recorded in a gpkg `metadata` archive.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Metadata {
    /// `BUILD_ID`
    pub build_id: u64,
    /// `BUILD_TIME`, seconds since the UNIX epoch.
    pub build_time: u64,
    /// `CATEGORY`, e.g. `app-misc`.
    pub category: String,
    /// `CBUILD`
    pub cbuild: String,
    /// `CFLAGS`
    pub cflags: String,
    /// `CHOST`
    pub chost: String,
    /// `CXXFLAGS`
    pub cxxflags: String,
    /// `DEFINED_PHASES`
    pub defined_phases: Vec<String>,
    /// `DESCRIPTION`
    pub description: String,
    /// `EAPI`
    pub eapi: u64,
    /// `FEATURES`
    pub features: Vec<String>,
    /// `INHERITED`, the eclasses inherited by the ebuild.
    pub inherited: Vec<String>,
    /// `IUSE`
    pub iuse: Vec<String>,
    /// `IUSE_EFFECTIVE`
    pub iuse_effective: Vec<String>,
    /// `KEYWORDS`
    pub keywords: Vec<String>,
    /// `LDFLAGS`
    pub ldflags: String,
    /// `LICENSE`
    pub license: Vec<String>,
    /// `PF`, the package name and version without category. e.g. `foo-1.0-r1`.
    pub pf: String,
    /// `repository`, the name of the repository the ebuild came from.
    pub repository: String,
    /// `SIZE`
    pub size: u64,
    /// `SLOT`
    pub slot: String,
    /// `USE`
    pub use_flags: Vec<String>,
}

impl ColonRecord for Metadata {
    const FIELDS: &'static [RecordField<Self>] = &[
        record_field!(Metadata, "BUILD_ID", build_id: Integer),
        record_field!(Metadata, "BUILD_TIME", build_time: Integer),
        record_field!(Metadata, "CATEGORY", category: String),
        record_field!(Metadata, "CBUILD", cbuild: String),
        record_field!(Metadata, "CFLAGS", cflags: String),
        record_field!(Metadata, "CHOST", chost: String),
        record_field!(Metadata, "CXXFLAGS", cxxflags: String),
        record_field!(Metadata, "DEFINED_PHASES", defined_phases: StringList),
        record_field!(Metadata, "DESCRIPTION", description: String),
        record_field!(Metadata, "EAPI", eapi: Integer),
        record_field!(Metadata, "FEATURES", features: StringList),
        record_field!(Metadata, "INHERITED", inherited: StringList),
        record_field!(Metadata, "IUSE", iuse: StringList),
        record_field!(Metadata, "IUSE_EFFECTIVE", iuse_effective: StringList),
        record_field!(Metadata, "KEYWORDS", keywords: StringList),
        record_field!(Metadata, "LDFLAGS", ldflags: String),
        record_field!(Metadata, "LICENSE", license: StringList),
        record_field!(Metadata, "PF", pf: String),
        record_field!(Metadata, "repository", repository: String),
        record_field!(Metadata, "SIZE", size: Integer),
        record_field!(Metadata, "SLOT", slot: String),
        record_field!(Metadata, "USE", use_flags: StringList),
    ];
}

impl Metadata {
    /// The `CATEGORY/PF` identifier of the package.
    pub fn cpv(&self) -> String {
        format!("{}/{}", self.category, self.pf)
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{colon::parse_documents_str, error::Result},
    };

    #[test]
    fn from_directory() -> Result<()> {
        let td = tempfile::tempdir()?;

        for (name, value) in [
            ("BUILD_TIME", "1700000000\n"),
            ("CATEGORY", "app-misc\n"),
            ("DESCRIPTION", "1Password CLI\n"),
            ("EAPI", "8\n"),
            ("IUSE", "\n"),
            ("KEYWORDS", "~amd64 ~arm64\n"),
            ("PF", "onepassword-cli-0-1\n"),
            ("repository", "rgx\n"),
            ("SLOT", "0\n"),
            ("environment.bz2", "ignored"),
            ("onepassword-cli-0-1.ebuild", "ignored"),
        ] {
            std::fs::write(td.path().join(name), value)?;
        }

        let metadata = Metadata::from_directory(td.path())?;

        assert_eq!(metadata.build_time, 1_700_000_000);
        assert_eq!(metadata.category, "app-misc");
        assert_eq!(metadata.description, "1Password CLI");
        assert_eq!(metadata.eapi, 8);
        assert!(metadata.iuse.is_empty());
        assert_eq!(metadata.keywords, vec!["~amd64", "~arm64"]);
        assert_eq!(metadata.pf, "onepassword-cli-0-1");
        assert_eq!(metadata.repository, "rgx");
        assert_eq!(metadata.slot, "0");
        assert_eq!(metadata.cpv(), "app-misc/onepassword-cli-0-1");
        assert_eq!(metadata.size, 0);

        Ok(())
    }

    #[test]
    fn round_trip() -> Result<()> {
        let metadata = Metadata {
            build_id: 3,
            build_time: 1_700_000_000,
            category: "x11-terms".into(),
            cflags: "-O2 -pipe".into(),
            defined_phases: vec!["compile".into(), "install".into()],
            eapi: 8,
            license: vec!["Apache-2.0".into(), "MIT".into()],
            pf: "alacritty-0.12.3".into(),
            repository: "gentoo".into(),
            size: 12345,
            use_flags: vec!["X".into(), "wayland".into()],
            ..Default::default()
        };

        let encoded = metadata.to_colon_string();
        assert!(encoded.starts_with("BUILD_ID: 3\nBUILD_TIME: 1700000000\nCATEGORY: x11-terms\n"));

        let docs = parse_documents_str(&encoded)?;
        assert_eq!(Metadata::from_document(&docs[0])?, metadata);

        Ok(())
    }
}
