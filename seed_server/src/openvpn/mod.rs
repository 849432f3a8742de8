//! OpenVPN server configuration artifacts.

pub mod error;
pub mod store;
pub mod templates;
pub mod values;
pub mod writer;

pub use error::{GenerateError, GenerateResult};
pub use store::{FileStore, LocalFileStore};
pub use templates::{RenderError, TemplateRenderer, TeraRenderer, Templates};
pub use values::SeedServerValues;
pub use writer::{
    ArtifactKind, ArtifactWriter, GenerationReport, OutputLayout, RenderedArtifact, layout_in,
};
