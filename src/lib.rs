//! Library for decoding VBF and VMJ point cloud files into flat vertex data.
//!
//! ```no_run
//! use vbf_vmj_rs::{Loader, Source};
//!
//! # async fn run() -> vbf_vmj_rs::Result<()> {
//! let loader = Loader::new();
//! if let Some(model) = loader.load(Source::from_path("scan.vbf")).await? {
//!     for [x, y, z] in model.vertices.points() {
//!         println!("{x} {y} {z}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod error;
mod format;
mod loader;
pub mod metadata;
mod source;
pub mod vbf;
mod vertices;
pub mod vmj;

pub use error::*;
pub use format::*;
pub use loader::*;
pub use metadata::{MetadataBlock, Section, Value};
pub use source::*;
pub use vbf::{Layer, LayerRecord, LayerWalker, VbfHeader};
pub use vertices::*;
pub use vmj::{Stage, VmjBody, VmjHeader};
