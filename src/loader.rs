//! Decoded models and the memoizing loader that publishes them.

use crate::source::{ByteSource, Source};
use crate::vbf::{LayerRecord, VbfFile, VbfHeader};
use crate::vertices::{assemble, VertexBuffer};
use crate::vmj::{VmjBody, VmjHeader};
use crate::{Format, Result};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Format specific file header
#[derive(Clone, Debug, PartialEq)]
pub enum FileHeader {
    Vbf(VbfHeader),
    Vmj(VmjHeader),
}

impl FileHeader {
    pub fn format(&self) -> Format {
        match self {
            FileHeader::Vbf(_) => Format::Vbf,
            FileHeader::Vmj(_) => Format::Vmj,
        }
    }

    pub fn magic_id(&self) -> u16 {
        match self {
            FileHeader::Vbf(header) => header.magic_id,
            FileHeader::Vmj(header) => header.magic_id,
        }
    }

    /// Declared point count: the header field for VBF, the metadata total for VMJ
    pub fn point_count(&self) -> u64 {
        match self {
            FileHeader::Vbf(header) => header.point_count as u64,
            FileHeader::Vmj(header) => header.point_count(),
        }
    }

    pub fn layer_count(&self) -> Option<u32> {
        match self {
            FileHeader::Vbf(header) => Some(header.layer_count),
            FileHeader::Vmj(_) => None,
        }
    }
}

/// Result of a complete decode, handed to renderers.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedModel {
    pub header: FileHeader,
    /// Empty for VMJ, whose payload carries no decoded geometry
    pub vertices: VertexBuffer,
    /// VBF layers in file order
    pub layers: Vec<LayerRecord>,
    /// VMJ decompressed payload
    pub body: Option<VmjBody>,
    /// Size of the source in bytes
    pub source_size: usize,
}

impl DecodedModel {
    pub(crate) fn from_vbf(file: VbfFile, source_size: usize) -> Self {
        let vertices = assemble(&file.layers);
        DecodedModel {
            header: FileHeader::Vbf(file.header),
            vertices,
            layers: file.layers.iter().map(|layer| layer.record).collect(),
            body: None,
            source_size,
        }
    }

    pub(crate) fn from_vmj(header: VmjHeader, body: VmjBody, source_size: usize) -> Self {
        DecodedModel {
            header: FileHeader::Vmj(header),
            vertices: VertexBuffer::empty(),
            layers: Vec::new(),
            body: Some(body),
            source_size,
        }
    }

    /// Label/value pairs for a metadata display, in display order.
    pub fn data_labels(&self) -> Vec<(&'static str, String)> {
        let mut labels = vec![
            (
                "Filesize",
                format!("{:.2} MB", self.source_size as f64 / 1000f64.powi(2)),
            ),
            ("Points", self.header.point_count().to_string()),
        ];
        if let Some(layer_count) = self.header.layer_count() {
            labels.push(("Layers", layer_count.to_string()));
        }
        labels
    }
}

/// Loader configuration
#[derive(Clone, Copy, Debug)]
pub struct LoaderOptions {
    /// Reuse fetched bytes and the published model when the same source is loaded again
    pub cache: bool,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        LoaderOptions { cache: true }
    }
}

#[derive(Debug, Default)]
struct State {
    /// Bumped whenever the requested source changes or the loader is reset
    generation: u64,
    current: Option<Arc<ByteSource>>,
    model: Option<Arc<DecodedModel>>,
}

impl State {
    fn invalidate(&mut self) {
        self.generation += 1;
        self.current = None;
        self.model = None;
    }
}

/// Loads sources and publishes the model of the most recently requested one.
///
/// Loads may overlap. A load whose source was superseded by a later
/// [load](Loader::load) or by [reset](Loader::reset) before it finished
/// does not publish its model.
#[derive(Debug, Default)]
pub struct Loader {
    options: LoaderOptions,
    state: Mutex<State>,
}

impl Loader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: LoaderOptions) -> Self {
        Loader {
            options,
            state: Mutex::default(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fetches and decodes `source`.
    ///
    /// Returns `Ok(None)` if the result went stale while decoding: another
    /// source was requested or the loader was reset in the meantime.
    /// Errors are always returned, stale or not.
    pub async fn load(&self, source: Source) -> Result<Option<Arc<DecodedModel>>> {
        let format = Format::for_source(&source)?;

        let (token, byte_source) = {
            let mut state = self.lock();
            let reusable = state
                .current
                .as_ref()
                .filter(|current| self.options.cache && *current.source() == source)
                .cloned();
            match reusable {
                Some(current) => {
                    if let Some(model) = &state.model {
                        log::debug!("Reusing decoded model of {:?}", source);
                        return Ok(Some(model.clone()));
                    }
                    (state.generation, current)
                }
                None => {
                    state.invalidate();
                    let byte_source = Arc::new(ByteSource::new(source));
                    state.current = Some(byte_source.clone());
                    (state.generation, byte_source)
                }
            }
        };

        let buffer = byte_source.load().await?;
        let model = format.decode(buffer).await?;

        let mut state = self.lock();
        if state.generation != token {
            log::debug!("Discarding stale {format} model of {:?}", byte_source.source());
            return Ok(None);
        }
        let model = Arc::new(model);
        state.model = Some(model.clone());
        Ok(Some(model))
    }

    /// Drops fetched bytes and the published model.
    pub fn reset(&self) {
        self.lock().invalidate();
    }

    /// The most recently requested source
    pub fn current_source(&self) -> Option<Source> {
        self.lock()
            .current
            .as_ref()
            .map(|current| current.source().clone())
    }

    pub fn model(&self) -> Option<Arc<DecodedModel>> {
        self.lock().model.clone()
    }

    /// Header of the published model
    pub fn header(&self) -> Option<FileHeader> {
        self.lock().model.as_ref().map(|model| model.header.clone())
    }

    /// Vertices of the published model
    pub fn vertices(&self) -> Option<VertexBuffer> {
        self.lock().model.as_ref().map(|model| model.vertices.clone())
    }
}
