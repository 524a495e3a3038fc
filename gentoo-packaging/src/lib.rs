// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Gentoo binary packaging primitives.

This crate defines pure Rust implementations of the formats used to distribute
prebuilt Gentoo packages: *gpkg* binary packages and the *binhost* `Packages`
index describing a collection of them.

# Goals

## Strictness

Readers reject input they don't fully understand. Unknown fields in a `Packages`
index, tar entries other than files and directories, and ambiguous gpkg layouts
are errors rather than something to silently skip. This surfaces drift between
producers and this crate early.

## No Global State

Nothing is registered implicitly. Archive extractors live in an
[archive::ExtractorRegistry] constructed by the caller and passed by reference,
so independent callers can't interfere with each other.

# A Tour of Functionality

Archives are unpacked by the [archive] module. [archive::ExtractorRegistry] maps
file extensions like `tar.gz` to an [archive::Extractor] and
[archive::ExtractRequest] describes what to extract and where. The only built-in
extractor is [archive::TarExtractor], which handles plain, gzip, bzip2 and xz
compressed tar archives.

Metadata in Portage's binhost world is expressed as *colon documents*: blocks of
`KEY: value` lines separated by blank lines. The [colon] module defines the
low-level primitives: [colon::ColonDocument], [colon::ColonField] and the
streaming [colon::ColonDocumentReader].

The [record] module maps colon documents to typed structs. A type implementing
[record::ColonRecord] declares an ordered schema of [record::RecordField] and
gains decoding, encoding and decoding from a directory of one file per field.

[metadata::Metadata] is the build metadata carried in a gpkg. [gpkg::GpkgReader]
unpacks and validates a gpkg, producing a [gpkg::PackageBundle].

[binhost_index::BinhostIndex] represents a `Packages` index: an
[binhost_index::IndexHeader] followed by [binhost_index::IndexPackage] entries.

Errors are represented by [error::GentooError].
*/

pub mod archive;
pub mod binhost_index;
pub mod colon;
pub mod error;
pub mod gpkg;
pub mod io;
pub mod metadata;
pub mod record;
#[cfg(test)]
mod testutil;
