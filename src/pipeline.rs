use std::borrow::Cow;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, DynamicImage};

use crate::decoder::{HeicDecoder, LibHeifDecoder};
use crate::error::{ConvertError, Result};
use crate::exif::ExifWriter;

/// Converts a HEIC image on disk to a JPEG image on disk.
///
/// Implement this to swap the whole conversion out, e.g. with a stub in
/// tests of code that drives conversions.
pub trait Converter {
    /// Convert the HEIC image at `src` to JPEG and write it to `dst`.
    fn heic_to_jpeg(&self, src: &Path, dst: &Path) -> Result<()>;
}

/// The standard [`Converter`]: decode with a [`HeicDecoder`], encode with
/// the `image` crate's JPEG encoder, and splice the source EXIF in between.
///
/// Stages run open → EXIF extract → decode → create output → encode. A
/// missing or unreadable EXIF item only produces a warning and the JPEG is
/// written without an APP1 segment. Every other failure aborts the
/// conversion; if the output file was already created by then, it is
/// removed so no truncated JPEG is left behind.
///
/// # Example
///
/// ```rust,no_run
/// use heic2jpg::pipeline::{Converter, HeicConverter};
/// use std::path::Path;
///
/// let converter: HeicConverter = HeicConverter::default();
/// converter.heic_to_jpeg(Path::new("IMG_0001.heic"), Path::new("IMG_0001.jpg"))?;
/// # Ok::<(), heic2jpg::ConvertError>(())
/// ```
#[derive(Default)]
pub struct HeicConverter<D = LibHeifDecoder> {
    decoder: D,
}

impl<D: HeicDecoder> HeicConverter<D> {
    pub fn new(decoder: D) -> Self {
        Self { decoder }
    }
}

impl<D: HeicDecoder> Converter for HeicConverter<D> {
    fn heic_to_jpeg(&self, src: &Path, dst: &Path) -> Result<()> {
        let data = read_source(src)?;
        log::debug!("Read {} bytes from {}", data.len(), src.display());

        let exif = match self.decoder.extract_exif(&data) {
            Ok(exif) => exif,
            Err(e) => {
                log::warn!("No EXIF from HEIC file {}: {e:#}", src.display());
                None
            }
        };
        match &exif {
            Some(e) => log::debug!("EXIF payload: {} bytes", e.len()),
            None => log::debug!("No EXIF payload, writing plain JPEG"),
        }

        let img = self
            .decoder
            .decode(&data)
            .map_err(|source| ConvertError::Decode {
                path: src.to_path_buf(),
                source,
            })?;
        drop(data);

        let file = File::create(dst).map_err(|source| ConvertError::CreateOutput {
            path: dst.to_path_buf(),
            source,
        })?;

        if let Err(e) = write_jpeg(file, &img, exif.as_deref(), dst) {
            remove_partial_output(dst);
            return Err(e);
        }

        log::info!(
            "Wrote {}x{} JPEG to {}{}",
            img.width(),
            img.height(),
            dst.display(),
            if exif.is_some() { " (with EXIF)" } else { "" }
        );
        Ok(())
    }
}

/// Convert the HEIC image at `src` to a JPEG at `dst` using libheif.
///
/// This is the crate's main entry point; see [`HeicConverter`] for the
/// stage-by-stage behavior.
pub fn convert(src: &Path, dst: &Path) -> Result<()> {
    HeicConverter::<LibHeifDecoder>::default().heic_to_jpeg(src, dst)
}

/// Read the whole source file.
fn read_source(src: &Path) -> Result<Vec<u8>> {
    let open_err = |source| ConvertError::OpenSource {
        path: src.to_path_buf(),
        source,
    };

    let mut file = File::open(src).map_err(open_err)?;
    let mut data = Vec::new();
    file.read_to_end(&mut data).map_err(open_err)?;
    Ok(data)
}

/// Encode `img` into `file`, with `exif` spliced in after SOI.
fn write_jpeg(file: File, img: &DynamicImage, exif: Option<&[u8]>, dst: &Path) -> Result<()> {
    let mut out = ExifWriter::new(BufWriter::new(file), exif)?;

    // The JPEG encoder only takes gray or RGB samples.
    let img = match img.color() {
        ColorType::L8 | ColorType::Rgb8 => Cow::Borrowed(img),
        _ => Cow::Owned(DynamicImage::ImageRgb8(img.to_rgb8())),
    };

    img.write_with_encoder(JpegEncoder::new(&mut out))
        .map_err(|source| ConvertError::Encode {
            path: dst.to_path_buf(),
            source,
        })?;

    out.flush().map_err(|source| ConvertError::Flush {
        path: dst.to_path_buf(),
        source,
    })
}

fn remove_partial_output(dst: &Path) {
    match std::fs::remove_file(dst) {
        Ok(()) => log::debug!("Removed partial output {}", dst.display()),
        Err(e) => log::warn!("Failed to remove partial output {}: {e}", dst.display()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exif::EXIF_PREFIX;
    use anyhow::anyhow;
    use image::RgbImage;
    use img_parts::{Bytes, ImageEXIF};
    use img_parts::jpeg::Jpeg;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    /// What the fake decoder reports for the EXIF item.
    enum FakeExif {
        Present(Vec<u8>),
        Absent,
        Corrupt,
    }

    struct FakeDecoder {
        exif: FakeExif,
        decodes: bool,
    }

    impl FakeDecoder {
        fn with_exif(exif: FakeExif) -> Self {
            Self {
                exif,
                decodes: true,
            }
        }
    }

    impl HeicDecoder for FakeDecoder {
        fn extract_exif(&self, _data: &[u8]) -> anyhow::Result<Option<Vec<u8>>> {
            match &self.exif {
                FakeExif::Present(e) => Ok(Some(e.clone())),
                FakeExif::Absent => Ok(None),
                FakeExif::Corrupt => Err(anyhow!("Exif item too short (2 bytes)")),
            }
        }

        fn decode(&self, _data: &[u8]) -> anyhow::Result<DynamicImage> {
            if !self.decodes {
                return Err(anyhow!("unsupported HEVC profile"));
            }
            let img = RgbImage::from_fn(16, 12, |x, y| image::Rgb([(x * 16) as u8, (y * 20) as u8, 128]));
            Ok(DynamicImage::ImageRgb8(img))
        }
    }

    /// 128-byte APP1 payload: `Exif\0\0` + a big-endian TIFF header + filler.
    fn exif_payload() -> Vec<u8> {
        let mut v = EXIF_PREFIX.to_vec();
        v.extend_from_slice(b"MM\0\x2a\0\0\0\x08");
        while v.len() < 128 {
            v.push(v.len() as u8);
        }
        v
    }

    fn fixture(dir: &TempDir) -> (PathBuf, PathBuf) {
        let src = dir.path().join("in.heic");
        fs::write(&src, b"not really heic, the fake decoder ignores it").unwrap();
        (src, dir.path().join("out.jpg"))
    }

    // ── EXIF splicing end to end ─────────────────────────────────────

    #[test]
    fn convert_with_exif() {
        let dir = TempDir::new().unwrap();
        let (src, dst) = fixture(&dir);
        let exif = exif_payload();

        HeicConverter::new(FakeDecoder::with_exif(FakeExif::Present(exif.clone())))
            .heic_to_jpeg(&src, &dst)
            .unwrap();

        let out = fs::read(&dst).unwrap();
        assert_eq!(&out[..4], &[0xFF, 0xD8, 0xFF, 0xE1]);
        assert_eq!(u16::from_be_bytes([out[4], out[5]]), 130);
        assert_eq!(&out[6..6 + 128], exif.as_slice());
        assert_eq!(&out[out.len() - 2..], &[0xFF, 0xD9]);
    }

    #[test]
    fn convert_with_exif_is_well_formed() {
        let dir = TempDir::new().unwrap();
        let (src, dst) = fixture(&dir);
        let exif = exif_payload();

        HeicConverter::new(FakeDecoder::with_exif(FakeExif::Present(exif.clone())))
            .heic_to_jpeg(&src, &dst)
            .unwrap();

        let out = fs::read(&dst).unwrap();
        let jpeg = Jpeg::from_bytes(Bytes::from(out.clone())).unwrap();
        assert_eq!(jpeg.segments()[0].marker(), 0xE1);
        assert_eq!(
            jpeg.segments().iter().filter(|s| s.marker() == 0xE1).count(),
            1,
            "exactly one APP1 segment"
        );
        assert_eq!(
            jpeg.exif().unwrap().as_ref(),
            &exif[EXIF_PREFIX.len()..],
        );

        // The SOI the encoder wrote must not appear twice.
        assert_ne!(&out[2..4], &[0xFF, 0xD8]);

        let decoded = image::load_from_memory(&out).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (16, 12));
    }

    #[test]
    fn convert_without_exif() {
        let dir = TempDir::new().unwrap();
        let (src, dst) = fixture(&dir);

        HeicConverter::new(FakeDecoder::with_exif(FakeExif::Absent))
            .heic_to_jpeg(&src, &dst)
            .unwrap();

        let out = fs::read(&dst).unwrap();
        assert_eq!(&out[..2], &[0xFF, 0xD8]);
        assert_ne!(&out[2..4], &[0xFF, 0xE1]);
        assert_ne!(&out[2..4], &[0xFF, 0xD8]);
        assert!(image::load_from_memory(&out).is_ok());
    }

    #[test]
    fn corrupt_exif_is_not_fatal() {
        let dir = TempDir::new().unwrap();
        let (src, dst) = fixture(&dir);

        let result = HeicConverter::new(FakeDecoder::with_exif(FakeExif::Corrupt))
            .heic_to_jpeg(&src, &dst);
        assert!(result.is_ok());

        let out = fs::read(&dst).unwrap();
        assert_eq!(&out[..2], &[0xFF, 0xD8]);
        assert_ne!(&out[2..4], &[0xFF, 0xE1]);
        assert!(image::load_from_memory(&out).is_ok());
    }

    #[test]
    fn overwrites_existing_output() {
        let dir = TempDir::new().unwrap();
        let (src, dst) = fixture(&dir);
        fs::write(&dst, vec![0xAB; 1 << 20]).unwrap();

        HeicConverter::new(FakeDecoder::with_exif(FakeExif::Absent))
            .heic_to_jpeg(&src, &dst)
            .unwrap();

        let out = fs::read(&dst).unwrap();
        assert!(out.len() < 1 << 20, "stale bytes must be truncated");
        assert_eq!(&out[out.len() - 2..], &[0xFF, 0xD9]);
    }

    // ── fatal stages ─────────────────────────────────────────────────

    #[test]
    fn missing_source_fails() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("missing.heic");
        let dst = dir.path().join("out.jpg");

        let err = HeicConverter::new(FakeDecoder::with_exif(FakeExif::Absent))
            .heic_to_jpeg(&src, &dst)
            .unwrap_err();

        assert!(matches!(err, ConvertError::OpenSource { ref path, .. } if path == &src));
        assert!(err.to_string().contains("missing.heic"));
        assert!(!dst.exists());
    }

    #[test]
    fn decode_failure_fails_before_output() {
        let dir = TempDir::new().unwrap();
        let (src, dst) = fixture(&dir);
        let decoder = FakeDecoder {
            exif: FakeExif::Present(exif_payload()),
            decodes: false,
        };

        let err = HeicConverter::new(decoder).heic_to_jpeg(&src, &dst).unwrap_err();

        assert!(matches!(err, ConvertError::Decode { .. }));
        assert!(err.to_string().contains("in.heic"));
        assert!(!dst.exists());
    }

    #[test]
    fn uncreatable_output_fails() {
        let dir = TempDir::new().unwrap();
        let (src, _) = fixture(&dir);
        let dst = dir.path().join("no/such/dir/out.jpg");

        let err = HeicConverter::new(FakeDecoder::with_exif(FakeExif::Absent))
            .heic_to_jpeg(&src, &dst)
            .unwrap_err();

        assert!(matches!(err, ConvertError::CreateOutput { ref path, .. } if path == &dst));
    }

    #[test]
    fn oversized_exif_removes_partial_output() {
        let dir = TempDir::new().unwrap();
        let (src, dst) = fixture(&dir);
        let mut exif = EXIF_PREFIX.to_vec();
        exif.resize(70_000, 0);

        let err = HeicConverter::new(FakeDecoder::with_exif(FakeExif::Present(exif)))
            .heic_to_jpeg(&src, &dst)
            .unwrap_err();

        assert!(matches!(err, ConvertError::ExifTooLarge { len: 70_000 }));
        assert!(!dst.exists(), "partial output must be cleaned up");
    }

    // ── Converter trait ──────────────────────────────────────────────

    #[test]
    fn converter_is_object_safe() {
        let dir = TempDir::new().unwrap();
        let (src, dst) = fixture(&dir);

        let converter: Box<dyn Converter> =
            Box::new(HeicConverter::new(FakeDecoder::with_exif(FakeExif::Absent)));
        converter.heic_to_jpeg(&src, &dst).unwrap();
        assert!(dst.exists());
    }
}
