//! # heic2jpg
//!
//! Convert HEIC/HEIF images to JPEG, carrying the source EXIF metadata across.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::path::Path;
//!
//! fn main() -> Result<(), heic2jpg::ConvertError> {
//!     heic2jpg::convert(Path::new("IMG_0001.heic"), Path::new("IMG_0001.jpg"))?;
//!     Ok(())
//! }
//! ```
//!
//! ## How EXIF gets into the JPEG
//!
//! The JPEG encoder has no way to embed metadata, and always starts its
//! output with its own SOI marker. The output goes through an
//! [`ExifWriter`](exif::ExifWriter), which writes `SOI` + an `APP1` EXIF
//! segment up front, drops the encoder's SOI, and forwards everything else
//! unchanged. The EXIF bytes are copied verbatim; nothing is re-encoded.
//!
//! | Output bytes | Source |
//! |--------------|--------|
//! | `FF D8` | written by `ExifWriter` |
//! | `FF E1 <len> Exif\0\0 <TIFF>` | written by `ExifWriter`, only if the HEIC has EXIF |
//! | rest of the stream | the JPEG encoder, from its third byte on |
//!
//! ## Modules
//!
//! - [`pipeline`] — The conversion orchestrator and the [`Converter`] trait
//! - [`decoder`] — HEIC decoder trait and the libheif implementation
//! - [`exif`] — EXIF payload extraction and the splicing output adapter
//! - [`error`] — Stage-tagged conversion errors

pub mod decoder;
pub mod error;
pub mod exif;
pub mod pipeline;

pub use error::ConvertError;
pub use pipeline::{Converter, HeicConverter, convert};
