//! EXIF handling for the HEIC → JPEG path.
//!
//! - [`app1_payload`] — Turn the raw HEIF `Exif` item into an APP1 payload
//! - [`ExifWriter`] — Output adapter that splices the APP1 segment into the
//!   JPEG encoder's stream right after SOI
//!
//! EXIF content is relocated, never parsed or rewritten.

mod reader;
mod writer;

pub use reader::{EXIF_PREFIX, app1_payload};
pub use writer::ExifWriter;
