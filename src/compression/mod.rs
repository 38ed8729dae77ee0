// src/compression/mod.rs
//! Compression formats for bundle archives
//!
//! Published bundles are xz-compressed tarballs. Archives fetched from older
//! or hand-built remotes may be gzip-compressed instead, so readers sniff the
//! format from the stream's magic bytes rather than trusting a file name.

use std::io::{self, BufRead, Read, Write};
use thiserror::Error;

/// xz preset used when packing bundles
pub const XZ_PRESET: u32 = 6;

/// Compression-related errors
#[derive(Error, Debug)]
pub enum CompressionError {
    #[error("Failed to read {format} stream header: {source}")]
    Sniff {
        format: &'static str,
        source: io::Error,
    },

    #[error("Unsupported compression format: {0}")]
    UnsupportedFormat(String),
}

impl From<CompressionError> for crate::error::Error {
    fn from(err: CompressionError) -> Self {
        crate::error::Error::ParseError(err.to_string())
    }
}

/// Archive compression formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionFormat {
    /// Plain tar
    None,
    /// Gzip (.gz, .tgz)
    Gzip,
    /// XZ/LZMA (.xz)
    Xz,
}

impl CompressionFormat {
    /// Detect the format from leading bytes
    ///
    /// Gzip starts with `1f 8b`, XZ with `fd 37 7a 58 5a 00`.
    ///
    /// ```
    /// use rdfbundle::compression::CompressionFormat;
    ///
    /// assert_eq!(CompressionFormat::from_magic_bytes(&[0x1f, 0x8b, 0x08]), CompressionFormat::Gzip);
    /// assert_eq!(CompressionFormat::from_magic_bytes(b"ustar"), CompressionFormat::None);
    /// ```
    pub fn from_magic_bytes(data: &[u8]) -> Self {
        if data.starts_with(&[0x1f, 0x8b]) {
            Self::Gzip
        } else if data.starts_with(&[0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00]) {
            Self::Xz
        } else {
            Self::None
        }
    }

    /// Detect the format of a buffered stream without consuming it
    pub fn sniff<R: BufRead>(reader: &mut R) -> Result<Self, CompressionError> {
        let head = reader.fill_buf().map_err(|e| CompressionError::Sniff {
            format: "archive",
            source: e,
        })?;
        Ok(Self::from_magic_bytes(head))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Gzip => "gzip",
            Self::Xz => "xz",
        }
    }
}

impl std::fmt::Display for CompressionFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Wrap `reader` in a decoder for `format`
pub fn create_decoder<'a, R: Read + 'a>(reader: R, format: CompressionFormat) -> Box<dyn Read + 'a> {
    match format {
        CompressionFormat::None => Box::new(reader),
        CompressionFormat::Gzip => Box::new(flate2::read::GzDecoder::new(reader)),
        CompressionFormat::Xz => Box::new(xz2::read::XzDecoder::new(reader)),
    }
}

/// Sniff the format of `reader` and wrap it in the matching decoder
pub fn decoder_auto<'a, R: BufRead + 'a>(
    mut reader: R,
) -> Result<(CompressionFormat, Box<dyn Read + 'a>), CompressionError> {
    let format = CompressionFormat::sniff(&mut reader)?;
    Ok((format, create_decoder(reader, format)))
}

/// An xz encoder writing into `writer`
pub fn xz_encoder<W: Write>(writer: W) -> xz2::write::XzEncoder<W> {
    xz2::write::XzEncoder::new(writer, XZ_PRESET)
}
