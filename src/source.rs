//! Raw byte access for point cloud sources.

use crate::{Error, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Immutable bytes of one source, shared between decode stages.
pub type RawBuffer = Arc<[u8]>;

/// Input handle: a file on disk or an in-memory blob with a name.
///
/// The name is only used to pick a [crate::Format] by extension.
#[derive(Clone)]
pub enum Source {
    Path(PathBuf),
    Blob { name: String, bytes: RawBuffer },
}

impl Source {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        Source::Path(path.as_ref().to_path_buf())
    }

    pub fn from_bytes<N: Into<String>, B: Into<RawBuffer>>(name: N, bytes: B) -> Self {
        Source::Blob {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// File name used for extension matching
    pub fn name(&self) -> String {
        match self {
            Source::Path(path) => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            Source::Blob { name, .. } => name.clone(),
        }
    }

    /// Fetches the complete contents of the source.
    pub async fn fetch(&self) -> Result<RawBuffer> {
        match self {
            Source::Path(path) => {
                let bytes = tokio::fs::read(path)
                    .await
                    .map_err(|source| Error::SourceUnavailable {
                        name: path.display().to_string(),
                        source,
                    })?;
                Ok(RawBuffer::from(bytes))
            }
            Source::Blob { bytes, .. } => Ok(bytes.clone()),
        }
    }
}

/// Two blobs are the same handle only if they share the same allocation.
impl PartialEq for Source {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Source::Path(a), Source::Path(b)) => a == b,
            (
                Source::Blob { name: a, bytes: x },
                Source::Blob { name: b, bytes: y },
            ) => a == b && Arc::ptr_eq(x, y),
            _ => false,
        }
    }
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Source::Blob { name, bytes } => f
                .debug_struct("Blob")
                .field("name", name)
                .field("bytes", &format_args!("[u8; {}]", bytes.len()))
                .finish(),
        }
    }
}

/// Memoizing fetcher for one [Source].
///
/// The first successful [load](ByteSource::load) is kept until [reset](ByteSource::reset);
/// failed fetches are not cached.
#[derive(Debug)]
pub struct ByteSource {
    source: Source,
    buffer: OnceCell<RawBuffer>,
}

impl ByteSource {
    pub fn new(source: Source) -> Self {
        ByteSource {
            source,
            buffer: OnceCell::new(),
        }
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    /// Returns the buffer, fetching it on first use.
    pub async fn load(&self) -> Result<RawBuffer> {
        let buffer = self
            .buffer
            .get_or_try_init(|| async {
                let buffer = self.source.fetch().await?;
                log::debug!("Fetched {} bytes from {:?}", buffer.len(), self.source);
                Ok::<_, Error>(buffer)
            })
            .await?;
        Ok(buffer.clone())
    }

    /// The buffer, if already fetched
    pub fn cached(&self) -> Option<RawBuffer> {
        self.buffer.get().cloned()
    }

    pub fn reset(&mut self) {
        self.buffer.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_name_is_file_name() {
        let source = Source::from_path("some/dir/scan.VBF");
        assert_eq!(source.name(), "scan.VBF");
    }

    #[test]
    fn blobs_compare_by_allocation() {
        let bytes: RawBuffer = Arc::from(vec![1u8, 2, 3]);
        let a = Source::from_bytes("a.vbf", bytes.clone());
        let b = Source::from_bytes("a.vbf", bytes);
        let c = Source::from_bytes("a.vbf", vec![1u8, 2, 3]);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, Source::from_path("a.vbf"));
    }

    #[tokio::test]
    async fn load_is_memoized() {
        let path = std::env::temp_dir().join(format!("byte-source-{}.vbf", std::process::id()));
        tokio::fs::write(&path, [7u8; 16]).await.unwrap();

        let mut byte_source = ByteSource::new(Source::from_path(&path));
        assert!(byte_source.cached().is_none());
        let first = byte_source.load().await.unwrap();

        tokio::fs::remove_file(&path).await.unwrap();
        let second = byte_source.load().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        byte_source.reset();
        assert!(matches!(
            byte_source.load().await,
            Err(Error::SourceUnavailable { .. })
        ));
    }
}
