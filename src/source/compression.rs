//! Transparent decompression of input files.
//!
//! ## Built-in Codecs
//!
//! When enabled via feature flags, the following codecs are available:
//! - **Gzip** (`.gz`) - via `flate2` (feature: `compression-gzip`)
//! - **Zstd** (`.zst`) - via `zstd` (feature: `compression-zstd`)
//! - **Bzip2** (`.bz2`) - via `bzip2` (feature: `compression-bzip2`)
//!
//! With [`Compression::Auto`] the codec is picked from the file extension
//! first. A file without a codec extension is sniffed by magic bytes, and the
//! codec is only used when its decoder accepts the stream; otherwise the file
//! is plain text. Row keys are arbitrary bytes, so a plain file may well start
//! with something like `BZh`.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;
use tracing::debug;

/// Reader handed to the line splitter.
pub type InputReader = Box<dyn BufRead + Send>;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    /// Detect from extension, then from magic bytes confirmed by a trial decode.
    #[default]
    Auto,
    Uncompressed,
    Gzip,
    Zstd,
    Bzip2,
}

impl Compression {
    fn extensions(self) -> &'static [&'static str] {
        match self {
            Self::Gzip => &[".gz", ".gzip"],
            Self::Zstd => &[".zst", ".zstd"],
            Self::Bzip2 => &[".bz2", ".bzip2"],
            Self::Auto | Self::Uncompressed => &[],
        }
    }

    fn magic_bytes(self) -> &'static [u8] {
        match self {
            Self::Gzip => &[0x1f, 0x8b],
            Self::Zstd => &[0x28, 0xb5, 0x2f, 0xfd],
            Self::Bzip2 => b"BZh",
            Self::Auto | Self::Uncompressed => &[],
        }
    }

    const CODECS: [Self; 3] = [Self::Gzip, Self::Zstd, Self::Bzip2];

    /// Codec implied by a file name, if any.
    #[must_use]
    pub fn from_extension(path: &Path) -> Option<Self> {
        let name = path.to_string_lossy().to_lowercase();
        Self::CODECS
            .into_iter()
            .find(|c| c.extensions().iter().any(|ext| name.ends_with(ext)))
    }

    fn from_magic(head: &[u8]) -> Option<Self> {
        Self::CODECS
            .into_iter()
            .find(|c| head.starts_with(c.magic_bytes()))
    }

    /// Open `path` and wrap it with the matching decompressor.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened, or if it needs a codec
    /// whose feature is not enabled (`ErrorKind::Unsupported`).
    pub fn open(self, path: &Path) -> io::Result<InputReader> {
        let mut reader = BufReader::new(File::open(path)?);
        let codec = match self {
            Self::Auto => match Self::from_extension(path) {
                Some(codec) => codec,
                None => match Self::from_magic(reader.fill_buf()?) {
                    Some(codec) => codec.confirm(path),
                    None => Self::Uncompressed,
                },
            },
            explicit => explicit,
        };
        codec.wrap(reader)
    }

    /// `self` if its decoder yields data from the start of `path`, else
    /// `Uncompressed`.
    fn confirm(self, path: &Path) -> Self {
        let decoded = File::open(path)
            .and_then(|file| self.wrap(BufReader::new(file)))
            .and_then(|mut decoder| decoder.read(&mut [0u8; 1]));
        match decoded {
            Ok(_) => self,
            Err(err) => {
                debug!(
                    file = %path.display(),
                    codec = ?self,
                    error = %err,
                    "magic bytes matched but the stream does not decode; reading as plain text"
                );
                Self::Uncompressed
            }
        }
    }

    fn wrap(self, reader: BufReader<File>) -> io::Result<InputReader> {
        match self {
            Self::Auto | Self::Uncompressed => Ok(Box::new(reader)),
            #[cfg(feature = "compression-gzip")]
            Self::Gzip => Ok(Box::new(BufReader::new(flate2::read::MultiGzDecoder::new(
                reader,
            )))),
            #[cfg(feature = "compression-zstd")]
            Self::Zstd => Ok(Box::new(BufReader::new(zstd::stream::read::Decoder::with_buffer(
                reader,
            )?))),
            #[cfg(feature = "compression-bzip2")]
            Self::Bzip2 => Ok(Box::new(BufReader::new(bzip2::read::MultiBzDecoder::new(
                reader,
            )))),
            #[allow(unreachable_patterns)]
            unsupported => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("{unsupported:?} input support is not compiled in"),
            )),
        }
    }
}
