//! Error types for the generation pass.

use shared_utils::network::AllocationError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::openvpn::templates::RenderError;
use crate::openvpn::values::SeedServerValues;
use crate::openvpn::writer::ArtifactKind;

/// Result type for generation passes.
pub type GenerateResult<T> = Result<T, GenerateError>;

/// Failure of one stage of the generation pass.
///
/// Every variant carries the values the pass was started with.
#[derive(Debug, Error)]
pub enum GenerateError {
    /// An artifact could not be rendered
    #[error("could not generate {artifact}")]
    Render {
        artifact: ArtifactKind,
        values: Box<SeedServerValues>,
        #[source]
        source: RenderError,
    },

    /// No address could be assigned to an HA shoot client
    #[error("could not assign an address to HA shoot client {index}")]
    AllocationOverflow {
        index: usize,
        values: Box<SeedServerValues>,
        #[source]
        source: AllocationError,
    },

    /// An artifact or its directory could not be written
    #[error("could not write {artifact} to {}", path.display())]
    Storage {
        artifact: ArtifactKind,
        path: PathBuf,
        values: Box<SeedServerValues>,
        #[source]
        source: io::Error,
    },
}

impl GenerateError {
    /// The artifact whose stage failed.
    pub fn artifact(&self) -> ArtifactKind {
        match self {
            GenerateError::Render { artifact, .. } | GenerateError::Storage { artifact, .. } => {
                *artifact
            }
            GenerateError::AllocationOverflow { index, .. } => ArtifactKind::HaClientConfig(*index),
        }
    }

    /// The values the failing pass was started with.
    pub fn values(&self) -> &SeedServerValues {
        match self {
            GenerateError::Render { values, .. }
            | GenerateError::AllocationOverflow { values, .. }
            | GenerateError::Storage { values, .. } => values,
        }
    }
}
