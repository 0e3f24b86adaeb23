//! VBF: layered raw point slices.
//!
//! ```text
//! u16 magic id (16982)
//! u8  version
//! u32 point count
//! u32 layer count
//! layer count times:
//!     u32 layer point count
//!     f32 z
//!     f32 x, f32 y per point
//! ```
//!
//! All values little-endian.

use crate::error::read_field;
use crate::{Error, Format, Result};
use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use std::io::Cursor;

pub const VBF_MAGIC: u16 = 16982;
/// Size of the fixed file header in bytes
pub const VBF_HEADER_SIZE: usize = 11;
/// Size of the per-layer header in bytes
pub const LAYER_HEADER_SIZE: usize = 8;

/// VBF file header
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VbfHeader {
    pub magic_id: u16,
    /// Always 1 in known files, not validated
    pub version: u8,
    /// Declared total of points over all layers
    pub point_count: u32,
    pub layer_count: u32,
    /// Offset of the first layer
    pub data_offset: u32,
}

impl VbfHeader {
    /// Reads the fixed header from the start of `buffer`.
    pub fn read_from(buffer: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(buffer);
        let magic_id = read_field(&mut cursor, 2, |c| c.read_u16::<LittleEndian>())?;
        if magic_id != VBF_MAGIC {
            return Err(Error::CorruptHeader {
                format: Format::Vbf,
                expected: VBF_MAGIC,
                found: magic_id,
            });
        }
        let version = read_field(&mut cursor, 1, |c| c.read_u8())?;
        let point_count = read_field(&mut cursor, 4, |c| c.read_u32::<LittleEndian>())?;
        let layer_count = read_field(&mut cursor, 4, |c| c.read_u32::<LittleEndian>())?;
        Ok(VbfHeader {
            magic_id,
            version,
            point_count,
            layer_count,
            data_offset: cursor.position() as u32,
        })
    }
}

/// Location and shape of one layer inside the buffer
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayerRecord {
    pub point_count: u32,
    pub z: f32,
    /// Offset of the first x,y pair
    pub data_start: usize,
    /// Offset just past the last x,y pair, where the next layer starts
    pub data_end: usize,
}

/// A decoded layer: its record and the interleaved x,y floats
#[derive(Clone, Debug, PartialEq)]
pub struct Layer {
    pub record: LayerRecord,
    pub xy: Vec<f32>,
}

impl Layer {
    /// (x, y) pairs in file order
    pub fn points(&self) -> impl Iterator<Item = (f32, f32)> + '_ {
        self.xy.chunks_exact(2).map(|pair| (pair[0], pair[1]))
    }
}

/// Walks the layers of a VBF buffer in file order.
///
/// Each layer starts where the previous one ended, so layers can only be
/// decoded in sequence. The walker stops after the first error.
pub struct LayerWalker<'a> {
    buffer: &'a [u8],
    offset: usize,
    remaining: u32,
}

impl<'a> LayerWalker<'a> {
    pub fn new(buffer: &'a [u8], header: &VbfHeader) -> Self {
        LayerWalker {
            buffer,
            offset: header.data_offset as usize,
            remaining: header.layer_count,
        }
    }

    /// Offset of the next layer header
    pub fn offset(&self) -> usize {
        self.offset
    }

    fn read_layer(&mut self) -> Result<Layer> {
        let len = self.buffer.len();
        let data_start = self.offset + LAYER_HEADER_SIZE;
        if data_start > len {
            return Err(Error::truncated(self.offset as u64, LAYER_HEADER_SIZE, len));
        }
        let point_count = LittleEndian::read_u32(&self.buffer[self.offset..]);
        let z = LittleEndian::read_f32(&self.buffer[self.offset + 4..]);

        let needed = (point_count as usize).saturating_mul(2 * std::mem::size_of::<f32>());
        let data_end = match data_start.checked_add(needed) {
            Some(end) if end <= len => end,
            _ => return Err(Error::truncated(data_start as u64, needed, len)),
        };

        let mut xy = vec![0f32; point_count as usize * 2];
        LittleEndian::read_f32_into(&self.buffer[data_start..data_end], &mut xy);

        self.offset = data_end;
        Ok(Layer {
            record: LayerRecord {
                point_count,
                z,
                data_start,
                data_end,
            },
            xy,
        })
    }
}

impl Iterator for LayerWalker<'_> {
    type Item = Result<Layer>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let layer = self.read_layer();
        if layer.is_err() {
            self.remaining = 0;
        }
        Some(layer)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining as usize))
    }
}

/// Header plus all layers of a VBF file
#[derive(Clone, Debug, PartialEq)]
pub struct VbfFile {
    pub header: VbfHeader,
    pub layers: Vec<Layer>,
}

/// Decodes the header and every layer, failing as a whole on the first error.
pub fn decode(buffer: &[u8]) -> Result<VbfFile> {
    let header = VbfHeader::read_from(buffer)?;
    log::debug!(
        "VBF v{}: {} points in {} layers",
        header.version,
        header.point_count,
        header.layer_count
    );

    // layer_count comes from the file, bound the allocation by what the buffer can hold
    let max_layers = buffer.len().saturating_sub(header.data_offset as usize) / LAYER_HEADER_SIZE;
    let mut layers = Vec::with_capacity((header.layer_count as usize).min(max_layers));
    for layer in LayerWalker::new(buffer, &header) {
        layers.push(layer?);
    }

    let walked: u64 = layers.iter().map(|l| l.record.point_count as u64).sum();
    if walked != header.point_count as u64 {
        log::warn!(
            "VBF header declares {} points, layers hold {}",
            header.point_count,
            walked
        );
    }
    Ok(VbfFile { header, layers })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use byteorder::WriteBytesExt;

    /// Builds a VBF buffer from (z, points) layers.
    pub(crate) fn vbf_bytes(layers: &[(f32, Vec<(f32, f32)>)]) -> Vec<u8> {
        let total: usize = layers.iter().map(|(_, points)| points.len()).sum();
        let mut out = Vec::new();
        out.write_u16::<LittleEndian>(VBF_MAGIC).unwrap();
        out.write_u8(1).unwrap();
        out.write_u32::<LittleEndian>(total as u32).unwrap();
        out.write_u32::<LittleEndian>(layers.len() as u32).unwrap();
        for (z, points) in layers {
            out.write_u32::<LittleEndian>(points.len() as u32).unwrap();
            out.write_f32::<LittleEndian>(*z).unwrap();
            for (x, y) in points {
                out.write_f32::<LittleEndian>(*x).unwrap();
                out.write_f32::<LittleEndian>(*y).unwrap();
            }
        }
        out
    }

    #[test]
    fn header_fields() {
        let bytes = vbf_bytes(&[(1.0, vec![(0.0, 0.0)])]);
        let header = VbfHeader::read_from(&bytes).unwrap();
        assert_eq!(
            header,
            VbfHeader {
                magic_id: VBF_MAGIC,
                version: 1,
                point_count: 1,
                layer_count: 1,
                data_offset: VBF_HEADER_SIZE as u32,
            }
        );
    }

    #[test]
    fn wrong_magic_is_corrupt() {
        let mut bytes = vbf_bytes(&[(1.0, vec![(0.0, 0.0)])]);
        bytes[0..2].copy_from_slice(&19030u16.to_le_bytes());
        assert!(matches!(
            decode(&bytes),
            Err(Error::CorruptHeader {
                format: Format::Vbf,
                expected: VBF_MAGIC,
                found: 19030
            })
        ));
    }

    #[test]
    fn short_header_is_truncated() {
        let bytes = vbf_bytes(&[]);
        assert!(matches!(
            VbfHeader::read_from(&bytes[..6]),
            Err(Error::TruncatedBuffer { offset: 3, needed: 4, len: 6 })
        ));
        assert!(matches!(
            VbfHeader::read_from(&bytes[..1]),
            Err(Error::TruncatedBuffer { offset: 0, .. })
        ));
    }

    #[test]
    fn walker_tracks_offsets() {
        let bytes = vbf_bytes(&[
            (0.5, vec![(1.0, 2.0), (3.0, 4.0)]),
            (1.5, vec![]),
            (2.5, vec![(5.0, 6.0)]),
        ]);
        let header = VbfHeader::read_from(&bytes).unwrap();
        let layers: Vec<Layer> = LayerWalker::new(&bytes, &header)
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(layers.len(), 3);

        assert_eq!(layers[0].record.data_start, 19);
        assert_eq!(layers[0].record.data_end, 35);
        assert_eq!(layers[0].points().collect::<Vec<_>>(), [(1.0f32, 2.0f32), (3.0, 4.0)]);

        // empty layer only consumes its own header
        assert_eq!(layers[1].record.point_count, 0);
        assert_eq!(layers[1].record.data_start, 43);
        assert_eq!(layers[1].record.data_end, 43);
        assert!(layers[1].xy.is_empty());

        assert_eq!(layers[2].record.z, 2.5);
        assert_eq!(layers[2].record.data_end, bytes.len());
    }

    #[test]
    fn walker_stops_after_truncation() {
        let mut bytes = vbf_bytes(&[(0.0, vec![(1.0, 1.0)]), (1.0, vec![(2.0, 2.0)])]);
        // claim more points in the first layer than the file holds
        bytes[VBF_HEADER_SIZE..VBF_HEADER_SIZE + 4].copy_from_slice(&100u32.to_le_bytes());
        let header = VbfHeader::read_from(&bytes).unwrap();
        let mut walker = LayerWalker::new(&bytes, &header);
        assert!(matches!(
            walker.next(),
            Some(Err(Error::TruncatedBuffer { offset: 19, needed: 800, .. }))
        ));
        assert!(walker.next().is_none());
    }

    #[test]
    fn missing_layers_are_truncated() {
        let mut bytes = vbf_bytes(&[(0.0, vec![(1.0, 1.0)])]);
        bytes[7..11].copy_from_slice(&2u32.to_le_bytes());
        let len = bytes.len();
        match decode(&bytes) {
            Err(Error::TruncatedBuffer { offset, needed, .. }) => {
                assert_eq!(offset, len);
                assert_eq!(needed, LAYER_HEADER_SIZE);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn huge_point_count_does_not_overflow() {
        let mut bytes = vbf_bytes(&[(0.0, vec![])]);
        bytes[VBF_HEADER_SIZE..VBF_HEADER_SIZE + 4].copy_from_slice(&u32::MAX.to_le_bytes());
        assert!(matches!(decode(&bytes), Err(Error::TruncatedBuffer { .. })));
    }
}
