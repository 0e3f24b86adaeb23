//! VMJ: LZMA compressed payload behind an ini-style metadata header.
//!
//! ```text
//! u16 magic id (19030)
//! u32 metadata length M
//! M bytes of UTF-8 metadata text
//! u32 decompressed size
//! LZMA stream up to the end of the file
//! ```

use crate::error::read_field;
use crate::metadata::MetadataBlock;
use crate::source::RawBuffer;
use crate::{Error, Format, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use std::fmt;
use std::io::Cursor;

pub const VMJ_MAGIC: u16 = 19030;

/// VMJ file header
#[derive(Clone, Debug, PartialEq)]
pub struct VmjHeader {
    pub magic_id: u16,
    /// Encoded byte length of the metadata text
    pub metadata_length: u32,
    pub metadata: MetadataBlock,
    /// Size of the payload after decompression, as declared by the file
    pub decompressed_size: u32,
    /// Offset of the compressed payload
    pub data_offset: usize,
}

impl VmjHeader {
    /// Reads the header, including the metadata block, from the start of `buffer`.
    ///
    /// The cursor always skips exactly `metadata_length` bytes of text,
    /// whatever the parser makes of them.
    pub fn read_from(buffer: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(buffer);
        let magic_id = read_field(&mut cursor, 2, |c| c.read_u16::<LittleEndian>())?;
        if magic_id != VMJ_MAGIC {
            return Err(Error::CorruptHeader {
                format: Format::Vmj,
                expected: VMJ_MAGIC,
                found: magic_id,
            });
        }
        let metadata_length = read_field(&mut cursor, 4, |c| c.read_u32::<LittleEndian>())?;

        let text_start = cursor.position() as usize;
        let text_end = text_start
            .checked_add(metadata_length as usize)
            .filter(|end| *end <= buffer.len())
            .ok_or(Error::truncated(
                text_start as u64,
                metadata_length as usize,
                buffer.len(),
            ))?;
        let metadata = MetadataBlock::parse(&String::from_utf8_lossy(&buffer[text_start..text_end]));
        cursor.set_position(text_end as u64);

        let decompressed_size = read_field(&mut cursor, 4, |c| c.read_u32::<LittleEndian>())?;
        Ok(VmjHeader {
            magic_id,
            metadata_length,
            metadata,
            decompressed_size,
            data_offset: cursor.position() as usize,
        })
    }

    /// Total of the `POINTS` attributes of all metadata sections
    pub fn point_count(&self) -> u64 {
        self.metadata.point_count()
    }
}

/// Decompressed payload
#[derive(Clone, Debug, PartialEq)]
pub struct VmjBody {
    pub text: String,
}

/// Decompresses a complete LZMA stream.
pub fn decompress_slice(payload: &[u8]) -> Result<Vec<u8>> {
    let mut input = payload;
    let mut output = Vec::new();
    lzma_rs::lzma_decompress(&mut input, &mut output)
        .map_err(|e| Error::DecompressionError(e.to_string()))?;
    Ok(output)
}

/// Decompresses `buffer[offset..]` on the blocking pool.
pub async fn decompress(buffer: RawBuffer, offset: usize) -> Result<Vec<u8>> {
    tokio::task::spawn_blocking(move || {
        let payload = buffer.get(offset..).unwrap_or_default();
        decompress_slice(payload)
    })
    .await
    .map_err(|e| Error::DecompressionError(e.to_string()))?
}

/// Recovers the decompressed payload as text.
pub fn parse_body(bytes: Vec<u8>) -> VmjBody {
    let text = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    };
    VmjBody { text }
}

/// Steps of the VMJ decode pipeline.
///
/// Each [advance](Stage::advance) performs one step, so a failure is
/// attributable to the step that produced it.
#[derive(Clone, Debug, PartialEq)]
pub enum Stage {
    /// Nothing parsed yet
    Header,
    /// Header parsed, payload still compressed
    Decompress(VmjHeader),
    /// Payload decompressed, not yet parsed
    Body(VmjHeader, Vec<u8>),
    Done(VmjHeader, VmjBody),
}

impl Stage {
    pub async fn advance(self, buffer: &RawBuffer) -> Result<Stage> {
        match self {
            Stage::Header => Ok(Stage::Decompress(VmjHeader::read_from(buffer)?)),
            Stage::Decompress(header) => {
                let bytes = decompress(buffer.clone(), header.data_offset).await?;
                if bytes.len() != header.decompressed_size as usize {
                    log::warn!(
                        "VMJ header declares {} decompressed bytes, got {}",
                        header.decompressed_size,
                        bytes.len()
                    );
                }
                Ok(Stage::Body(header, bytes))
            }
            Stage::Body(header, bytes) => Ok(Stage::Done(header, parse_body(bytes))),
            done @ Stage::Done(..) => Ok(done),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Header => f.write_str("header"),
            Stage::Decompress(_) => f.write_str("decompress"),
            Stage::Body(..) => f.write_str("body"),
            Stage::Done(..) => f.write_str("done"),
        }
    }
}

/// Runs all stages over `buffer`.
pub async fn decode(buffer: RawBuffer) -> Result<(VmjHeader, VmjBody)> {
    let mut stage = Stage::Header;
    loop {
        stage = match stage {
            Stage::Done(header, body) => return Ok((header, body)),
            stage => {
                log::debug!("VMJ {stage} stage");
                stage.advance(&buffer).await?
            }
        };
    }
}
