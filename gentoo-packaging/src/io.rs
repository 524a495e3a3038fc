// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! I/O helpers. */

use {
    crate::error::{GentooError, Result},
    digest::Digest,
    std::{fmt::Formatter, io::Read},
};

/// Represents a content digest.
#[derive(Clone, Eq, PartialEq, PartialOrd)]
pub enum ContentDigest {
    /// An MD5 digest.
    Md5(Vec<u8>),
    /// A SHA-1 digest.
    Sha1(Vec<u8>),
}

impl std::fmt::Debug for ContentDigest {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Md5(data) => write!(f, "Md5({})", hex::encode(data)),
            Self::Sha1(data) => write!(f, "Sha1({})", hex::encode(data)),
        }
    }
}

impl ContentDigest {
    /// Obtain the digest bytes for this content digest.
    pub fn digest_bytes(&self) -> &[u8] {
        match self {
            Self::Md5(x) => x,
            Self::Sha1(x) => x,
        }
    }

    /// Obtain the hex encoded content digest.
    pub fn digest_hex(&self) -> String {
        hex::encode(self.digest_bytes())
    }

    /// Obtain the name of the field in `Packages` index entries that holds this digest type.
    pub fn field_name(&self) -> &'static str {
        match self {
            Self::Md5(_) => "MD5",
            Self::Sha1(_) => "SHA1",
        }
    }
}

/// Compression format applied to tar archives.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Compression {
    /// No compression (no extension).
    None,

    /// Gzip compression (.gz extension).
    Gzip,

    /// Bzip2 compression (.bz2 extension).
    Bzip2,

    /// XZ compression (.xz extension).
    Xz,
}

impl Compression {
    /// Filename extension for files compressed in this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::None => "",
            Self::Gzip => ".gz",
            Self::Bzip2 => ".bz2",
            Self::Xz => ".xz",
        }
    }

    /// Resolve the compression of a tar flavored archive extension.
    ///
    /// The extension must already be normalized (lower-case, no leading dot).
    pub fn from_tar_extension(extension: &str) -> Option<Self> {
        match extension {
            "tar" => Some(Self::None),
            "tgz" | "tar.gz" => Some(Self::Gzip),
            "tar.bz2" => Some(Self::Bzip2),
            "tar.xz" | "txz" => Some(Self::Xz),
            _ => None,
        }
    }

    /// The order in which compressed sub-archives of a gpkg are probed.
    pub fn gpkg_preferred_order() -> impl Iterator<Item = Compression> {
        [Self::Gzip, Self::Bzip2, Self::Xz].into_iter()
    }

    /// Wrap a reader with transparent decompression.
    pub fn decompress<'a>(&self, reader: impl Read + 'a) -> Result<Box<dyn Read + 'a>> {
        Ok(match self {
            Self::None => Box::new(reader),
            Self::Gzip => Box::new(
                libflate::gzip::Decoder::new(reader)
                    .map_err(|e| GentooError::IoPath("reading gzip header".to_string(), e))?,
            ),
            Self::Bzip2 => Box::new(bzip2::read::BzDecoder::new(reader)),
            Self::Xz => Box::new(xz2::read::XzDecoder::new(reader)),
        })
    }
}

/// Digests and size of a fully consumed stream.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ContentDigests {
    /// Number of bytes read.
    pub size: u64,
    /// MD5 of the content.
    pub md5: ContentDigest,
    /// SHA-1 of the content.
    pub sha1: ContentDigest,
}

/// A [Read] adapter that computes the size and digests of content as it is read.
pub struct DigestingReader<R> {
    inner: R,
    size: u64,
    md5: md5::Md5,
    sha1: sha1::Sha1,
}

impl<R: Read> DigestingReader<R> {
    /// Create a new instance wrapping a reader.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            size: 0,
            md5: md5::Md5::new(),
            sha1: sha1::Sha1::new(),
        }
    }

    /// Read and discard the remainder of the inner reader.
    ///
    /// Consumers like tar readers stop at the end-of-archive marker and may leave
    /// trailing padding unread. Draining ensures digests cover the whole stream.
    pub fn drain(&mut self) -> std::io::Result<u64> {
        std::io::copy(self, &mut std::io::sink())
    }

    /// Consume self, returning the digests of everything read so far.
    pub fn finish(self) -> ContentDigests {
        ContentDigests {
            size: self.size,
            md5: ContentDigest::Md5(self.md5.finalize().to_vec()),
            sha1: ContentDigest::Sha1(self.sha1.finalize().to_vec()),
        }
    }
}

impl<R: Read> Read for DigestingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let count = self.inner.read(buf)?;

        self.md5.update(&buf[0..count]);
        self.sha1.update(&buf[0..count]);
        self.size += count as u64;

        Ok(count)
    }
}
