use anyhow::{Result, bail};

/// Identifier that opens every JPEG APP1 EXIF payload.
pub const EXIF_PREFIX: &[u8] = b"Exif\0\0";

// HEIF Exif items lead with a u32 offset to the TIFF header
const TIFF_OFFSET_LEN: usize = 4;

/// Turn a raw HEIF `Exif` item into a JPEG APP1 payload.
///
/// The item is `[u32 BE offset][bytes...]` where the offset points at the
/// TIFF header inside `bytes`. Cameras usually store `Exif\0\0` in front of
/// the TIFF header (offset 6); some store bare TIFF (offset 0). The APP1
/// payload must start with `Exif\0\0`, so the identifier is added when the
/// item lacks it. The TIFF data itself is copied untouched.
pub fn app1_payload(item: &[u8]) -> Result<Vec<u8>> {
    if item.len() < TIFF_OFFSET_LEN {
        bail!("Exif item too short ({} bytes)", item.len());
    }

    let (header, body) = item.split_at(TIFF_OFFSET_LEN);
    let offset = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;

    if offset >= body.len() {
        bail!(
            "Exif TIFF header offset {offset} is past the end of the item ({} bytes)",
            body.len()
        );
    }

    let tiff = &body[offset..];
    let mut payload = Vec::with_capacity(EXIF_PREFIX.len() + tiff.len());
    payload.extend_from_slice(EXIF_PREFIX);
    payload.extend_from_slice(tiff);
    Ok(payload)
}
