use std::io::Cursor;
use std::sync::Once;

use anyhow::{Context, Result};
use image::{DynamicImage, ImageReader};
use libheif_rs::{HeifContext, ItemId};

use crate::exif;

/// Trait for HEIC decoding backends.
///
/// The conversion pipeline only needs two things from a decoder: the EXIF
/// payload of the primary image, and its pixels. The library ships with
/// [`LibHeifDecoder`]; tests substitute their own implementation.
pub trait HeicDecoder {
    /// Extract the primary image's EXIF as an APP1-ready payload
    /// (starting with `Exif\0\0`).
    ///
    /// Returns `Ok(None)` when the image carries no EXIF item.
    fn extract_exif(&self, data: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Decode the primary image.
    fn decode(&self, data: &[u8]) -> Result<DynamicImage>;
}

static REGISTER_HOOKS: Once = Once::new();

/// [`HeicDecoder`] backed by libheif.
///
/// Pixels go through the `image` crate with libheif's decoding hooks
/// registered, so alpha and high bit depth images come back as the matching
/// [`DynamicImage`] variant. libheif's own context API is only used to read
/// the `Exif` item, which the image hooks do not expose.
pub struct LibHeifDecoder {
    _hooks: (),
}

impl LibHeifDecoder {
    pub fn new() -> Self {
        REGISTER_HOOKS.call_once(|| {
            libheif_rs::integration::image::register_all_decoding_hooks();
        });
        Self { _hooks: () }
    }
}

impl Default for LibHeifDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl HeicDecoder for LibHeifDecoder {
    fn extract_exif(&self, data: &[u8]) -> Result<Option<Vec<u8>>> {
        let ctx = HeifContext::read_from_bytes(data).context("Failed to parse HEIF container")?;
        let handle = ctx
            .primary_image_handle()
            .context("Failed to get primary image")?;

        let mut ids: Vec<ItemId> = vec![0; 1];
        let count = handle.metadata_block_ids(&mut ids, b"Exif");
        if count == 0 {
            log::debug!("No Exif item on primary image");
            return Ok(None);
        }

        // With several Exif items the first one wins.
        let item = handle.metadata(ids[0]).context("Failed to read Exif item")?;
        let payload = exif::app1_payload(&item)?;
        Ok(Some(payload))
    }

    fn decode(&self, data: &[u8]) -> Result<DynamicImage> {
        let reader = ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .context("Failed to create image reader")?;

        let img = reader.decode().context("Failed to decode HEIC image")?;
        log::debug!(
            "Decoded {}x{} HEIC image ({:?})",
            img.width(),
            img.height(),
            img.color()
        );
        Ok(img)
    }
}
