use std::io::{self, Write};

use crate::error::ConvertError;

// JPEG markers
const SOI: [u8; 2] = [0xFF, 0xD8];
const APP1: [u8; 2] = [0xFF, 0xE1];

/// Largest value the 16-bit segment length field can hold.
const MAX_SEGMENT_LEN: usize = u16::MAX as usize;

/// Output adapter that splices an EXIF APP1 segment into a JPEG stream.
///
/// JPEG encoders always open their output with their own SOI marker and
/// offer no way to place metadata behind it. `ExifWriter` writes
/// `SOI [APP1 <len> <exif>]` to the sink up front, then swallows the first
/// two bytes the encoder writes (its duplicate SOI) and forwards the rest
/// untouched. The rewrite happens inline, so the encoder's output is never
/// buffered.
///
/// The sink is borrowed for the lifetime of one conversion. Opening and
/// closing it stays with the caller.
///
/// # Example
///
/// ```rust
/// use heic2jpg::exif::ExifWriter;
/// use std::io::Write;
///
/// let exif = b"Exif\0\0MM\0\x2a";
/// let mut out = ExifWriter::new(Vec::new(), Some(&exif[..])).unwrap();
/// out.write_all(&[0xFF, 0xD8, 0xFF, 0xDB]).unwrap();
///
/// let bytes = out.into_inner();
/// assert_eq!(&bytes[..4], &[0xFF, 0xD8, 0xFF, 0xE1]);
/// assert_eq!(&bytes[bytes.len() - 2..], &[0xFF, 0xDB]);
/// ```
#[derive(Debug)]
pub struct ExifWriter<W: Write> {
    inner: W,
    /// Bytes of the encoder's stream still to discard. Starts at the SOI length.
    skip: usize,
}

impl<W: Write> ExifWriter<W> {
    /// Write the JPEG prologue to `inner` and return a writer ready for the
    /// encoder's stream.
    ///
    /// `None` and an empty blob both mean "no EXIF": only SOI is written.
    /// The blob is copied verbatim and never validated.
    ///
    /// Fails with [`ConvertError::ExifTooLarge`] before touching the sink if
    /// the blob cannot fit a single APP1 segment, and with
    /// [`ConvertError::WriteHeader`] if the sink rejects the prologue.
    pub fn new(mut inner: W, exif: Option<&[u8]>) -> Result<Self, ConvertError> {
        let exif = exif.filter(|e| !e.is_empty());

        let segment_len = match exif {
            Some(e) => {
                let len = e.len() + 2;
                if len > MAX_SEGMENT_LEN {
                    return Err(ConvertError::ExifTooLarge { len: e.len() });
                }
                Some(len as u16)
            }
            None => None,
        };

        inner
            .write_all(&SOI)
            .map_err(|source| ConvertError::WriteHeader { source })?;

        if let (Some(e), Some(len)) = (exif, segment_len) {
            let [hi, lo] = len.to_be_bytes();
            let header = [APP1[0], APP1[1], hi, lo];
            inner
                .write_all(&header)
                .and_then(|_| inner.write_all(e))
                .map_err(|source| ConvertError::WriteHeader { source })?;
            log::debug!("Wrote APP1 EXIF segment ({} payload bytes)", e.len());
        }

        Ok(Self {
            inner,
            skip: SOI.len(),
        })
    }

    /// Number of incoming bytes that will still be discarded.
    pub fn remaining_skip(&self) -> usize {
        self.skip
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Give the sink back to its owner.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for ExifWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.skip == 0 {
            return self.inner.write(buf);
        }

        let skipped = self.skip.min(buf.len());
        let rest = &buf[skipped..];
        if rest.is_empty() {
            self.skip -= skipped;
            return Ok(skipped);
        }

        // The skip is only committed once the sink takes the suffix, so a
        // retried chunk is skipped again instead of leaking a second SOI.
        let written = self.inner.write(rest)?;
        self.skip -= skipped;

        // Skipped bytes count as accepted so the encoder's accounting holds.
        Ok(skipped + written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
