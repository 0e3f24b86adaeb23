//! Extension based format registry.

use crate::loader::DecodedModel;
use crate::source::{RawBuffer, Source};
use crate::{vbf, vmj, Error, Result};
use std::fmt;
use std::path::Path;

/// Supported point cloud formats
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Format {
    /// Layered raw slices
    Vbf,
    /// LZMA compressed with ini-style metadata
    Vmj,
}

/// Lowercase extensions claimed by each format, in lookup order.
pub const REGISTRY: &[(Format, &[&str])] = &[(Format::Vbf, &["vbf"]), (Format::Vmj, &["vmj"])];

impl Format {
    pub fn extensions(self) -> &'static [&'static str] {
        REGISTRY
            .iter()
            .find(|(format, _)| *format == self)
            .map(|(_, extensions)| *extensions)
            .unwrap_or(&[])
    }

    /// Leading little-endian u16 every file of this format starts with
    pub fn magic_id(self) -> u16 {
        match self {
            Format::Vbf => vbf::VBF_MAGIC,
            Format::Vmj => vmj::VMJ_MAGIC,
        }
    }

    /// Selects the first registered format claiming the extension of `name`.
    pub fn from_name(name: &str) -> Result<Format> {
        let extension = Path::new(name)
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .ok_or_else(|| Error::UnsupportedFormat(name.to_string()))?;
        REGISTRY
            .iter()
            .find(|(_, extensions)| extensions.contains(&extension.as_str()))
            .map(|(format, _)| *format)
            .ok_or_else(|| Error::UnsupportedFormat(name.to_string()))
    }

    pub fn for_source(source: &Source) -> Result<Format> {
        Format::from_name(&source.name())
    }

    /// Runs the complete decode pipeline of this format over `buffer`.
    pub async fn decode(self, buffer: RawBuffer) -> Result<DecodedModel> {
        match self {
            Format::Vbf => {
                let file = vbf::decode(&buffer)?;
                Ok(DecodedModel::from_vbf(file, buffer.len()))
            }
            Format::Vmj => {
                let size = buffer.len();
                let (header, body) = vmj::decode(buffer).await?;
                Ok(DecodedModel::from_vmj(header, body, size))
            }
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::Vbf => f.write_str("VBF"),
            Format::Vmj => f.write_str("VMJ"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_lookup() {
        assert_eq!(Format::from_name("scan.vbf").unwrap(), Format::Vbf);
        assert_eq!(Format::from_name("3DL-12447.VMJ").unwrap(), Format::Vmj);
        assert_eq!(Format::from_name("archive.tar.vbf").unwrap(), Format::Vbf);
    }

    #[test]
    fn unknown_extensions_are_rejected() {
        for name in ["scan.laz", "vbf", "scan.vbf.bak", ""] {
            assert!(
                matches!(Format::from_name(name), Err(Error::UnsupportedFormat(n)) if n == name),
                "{name}"
            );
        }
    }

    #[test]
    fn registry_is_consistent() {
        assert_eq!(Format::Vbf.extensions(), &["vbf"]);
        assert_eq!(Format::Vmj.magic_id(), 19030);
        assert_eq!(Format::Vbf.to_string(), "VBF");
    }
}
