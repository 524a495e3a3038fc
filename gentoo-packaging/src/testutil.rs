// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Helpers for constructing archives in tests.

use {
    crate::{error::Result, io::Compression},
    std::io::Write,
};

/// Builds an in-memory tar archive.
pub struct TarBuilder {
    builder: tar::Builder<Vec<u8>>,
}

impl Default for TarBuilder {
    fn default() -> Self {
        Self {
            builder: tar::Builder::new(vec![]),
        }
    }
}

impl TarBuilder {
    fn header(entry_type: tar::EntryType, size: u64, mode: u32, mtime: u64) -> tar::Header {
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(entry_type);
        header.set_size(size);
        header.set_mode(mode);
        header.set_mtime(mtime);
        header.set_uid(0);
        header.set_gid(0);

        header
    }

    pub fn directory(mut self, path: &str, mode: u32, mtime: u64) -> Result<Self> {
        let mut header = Self::header(tar::EntryType::Directory, 0, mode, mtime);
        self.builder
            .append_data(&mut header, format!("{}/", path), std::io::empty())?;

        Ok(self)
    }

    pub fn file(mut self, path: &str, data: &[u8], mode: u32, mtime: u64) -> Result<Self> {
        let mut header = Self::header(tar::EntryType::Regular, data.len() as u64, mode, mtime);
        self.builder.append_data(&mut header, path, data)?;

        Ok(self)
    }

    pub fn symlink(mut self, path: &str, target: &str) -> Result<Self> {
        let mut header = Self::header(tar::EntryType::Symlink, 0, 0o777, 1_600_000_000);
        self.builder.append_link(&mut header, path, target)?;

        Ok(self)
    }

    pub fn finish(self) -> Result<Vec<u8>> {
        Ok(self.builder.into_inner()?)
    }
}

/// Compress data with the given compression format.
pub fn compress(compression: Compression, data: &[u8]) -> Result<Vec<u8>> {
    Ok(match compression {
        Compression::None => data.to_vec(),
        Compression::Gzip => {
            let mut encoder = libflate::gzip::Encoder::new(vec![])?;
            encoder.write_all(data)?;
            encoder.finish().into_result()?
        }
        Compression::Bzip2 => {
            let mut encoder = bzip2::write::BzEncoder::new(vec![], bzip2::Compression::default());
            encoder.write_all(data)?;
            encoder.finish()?
        }
        Compression::Xz => {
            let mut encoder = xz2::write::XzEncoder::new(vec![], 6);
            encoder.write_all(data)?;
            encoder.finish()?
        }
    })
}
