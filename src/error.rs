use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort a HEIC → JPEG conversion.
///
/// Every variant names the stage that failed, and the file it failed on
/// where one is involved. EXIF extraction problems are not listed: they are
/// logged and the conversion continues without metadata.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("open HEIC file {path:?}")]
    OpenSource {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("decode HEIC file {path:?}")]
    Decode {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("create output file {path:?}")]
    CreateOutput {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("add EXIF data to image writer")]
    WriteHeader {
        #[source]
        source: io::Error,
    },

    #[error("EXIF payload of {len} bytes does not fit in one APP1 segment (max 65533)")]
    ExifTooLarge { len: usize },

    #[error("encode JPG file {path:?}")]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("flush JPG file {path:?}")]
    Flush {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ConvertError>;
