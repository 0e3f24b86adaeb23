//! Flat xyz vertex data for renderers.

use crate::vbf::Layer;
use std::sync::Arc;

/// Flat `f32` sequence, one `x, y, z` triple per point.
///
/// Cloning is cheap, the floats are shared.
#[derive(Clone, Debug, PartialEq)]
pub struct VertexBuffer(Arc<[f32]>);

impl VertexBuffer {
    pub fn empty() -> Self {
        VertexBuffer(Arc::from(Vec::new()))
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    /// Number of floats, always a multiple of 3
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn point_count(&self) -> usize {
        self.0.len() / 3
    }

    pub fn points(&self) -> impl Iterator<Item = [f32; 3]> + '_ {
        self.0.chunks_exact(3).map(|p| [p[0], p[1], p[2]])
    }
}

impl AsRef<[f32]> for VertexBuffer {
    fn as_ref(&self) -> &[f32] {
        self.as_slice()
    }
}

/// Broadcasts each layer's z over its (x, y) pairs, keeping layer and point order.
pub fn assemble(layers: &[Layer]) -> VertexBuffer {
    let point_count: usize = layers.iter().map(|layer| layer.xy.len() / 2).sum();
    let mut vertices = Vec::with_capacity(point_count * 3);
    for layer in layers {
        let z = layer.record.z;
        for (x, y) in layer.points() {
            vertices.extend_from_slice(&[x, y, z]);
        }
    }
    VertexBuffer(Arc::from(vertices))
}
