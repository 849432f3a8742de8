//! Generation pass: render every tunnel artifact and store it.
//!
//! The pass runs four stages in order and stops at the first failure:
//!
//! 1. server configuration
//! 2. configuration for the non-HA shoot client (creates the client config directory)
//! 3. done unless HA is enabled
//! 4. one configuration per HA shoot client, `<prefix>-0` to `<prefix>-<n-1>`
//!
//! Files written before a failure are left in place.

use shared_utils::config::OutputConfig;
use std::fmt;
use std::path::{Path, PathBuf};
use tera::Context;
use tracing::{debug, info};

use crate::openvpn::error::{GenerateError, GenerateResult};
use crate::openvpn::store::{FileStore, LocalFileStore};
use crate::openvpn::templates::{
    CLIENT_TEMPLATE, HA_CLIENT_TEMPLATE, RenderError, SERVER_TEMPLATE, TemplateRenderer,
    TeraRenderer, Templates,
};
use crate::openvpn::values::{SeedServerValues, client_context, ha_client_context, server_context};

/// Mode of generated configuration files.
pub const CONFIG_FILE_MODE: u32 = 0o644;
/// Mode of the client configuration directory.
pub const CLIENT_CONFIG_DIR_MODE: u32 = 0o750;

/// The artifacts produced by a generation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    ServerConfig,
    ClientConfig,
    HaClientConfig(usize),
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::ServerConfig => write!(f, "openvpn server config"),
            ArtifactKind::ClientConfig => write!(f, "shoot client config"),
            ArtifactKind::HaClientConfig(index) => write!(f, "HA shoot client config {index}"),
        }
    }
}

/// A rendered artifact and its destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedArtifact {
    pub kind: ArtifactKind,
    pub path: PathBuf,
    pub content: Vec<u8>,
}

impl RenderedArtifact {
    pub fn text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.content)
    }
}

/// Where the artifacts of a pass are stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    pub server_config: PathBuf,
    pub client_config_dir: PathBuf,
    pub client_config_prefix: String,
}

impl OutputLayout {
    /// Destination of the non-HA shoot client configuration.
    pub fn client_config_path(&self) -> PathBuf {
        self.client_config_dir.join(&self.client_config_prefix)
    }

    /// Destination of the configuration of HA shoot client `index`.
    pub fn ha_client_config_path(&self, index: usize) -> PathBuf {
        self.client_config_dir
            .join(format!("{}-{}", self.client_config_prefix, index))
    }

    pub fn path_of(&self, kind: ArtifactKind) -> PathBuf {
        match kind {
            ArtifactKind::ServerConfig => self.server_config.clone(),
            ArtifactKind::ClientConfig => self.client_config_path(),
            ArtifactKind::HaClientConfig(index) => self.ha_client_config_path(index),
        }
    }
}

impl Default for OutputLayout {
    fn default() -> Self {
        OutputLayout::from(&OutputConfig::default())
    }
}

impl From<&OutputConfig> for OutputLayout {
    fn from(output: &OutputConfig) -> Self {
        OutputLayout {
            server_config: output.server_config.clone(),
            client_config_dir: output.client_config_dir.clone(),
            client_config_prefix: output.client_config_prefix.clone(),
        }
    }
}

/// Outcome of a successful pass, in write order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationReport {
    pub written: Vec<(ArtifactKind, PathBuf)>,
}

/// Renders the tunnel artifacts and hands them to a [`FileStore`].
#[derive(Debug, Clone)]
pub struct ArtifactWriter<R = TeraRenderer, S = LocalFileStore> {
    templates: Templates,
    renderer: R,
    store: S,
    layout: OutputLayout,
}

impl ArtifactWriter {
    /// Writer using the embedded templates, Tera and the local filesystem.
    pub fn new(layout: OutputLayout) -> Self {
        ArtifactWriter::with_parts(Templates::embedded(), TeraRenderer, LocalFileStore, layout)
    }
}

impl<R: TemplateRenderer, S: FileStore> ArtifactWriter<R, S> {
    pub fn with_parts(templates: Templates, renderer: R, store: S, layout: OutputLayout) -> Self {
        ArtifactWriter {
            templates,
            renderer,
            store,
            layout,
        }
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    /// Run the generation pass and store every artifact.
    pub fn write_server_config_files(
        &self,
        values: &SeedServerValues,
    ) -> GenerateResult<GenerationReport> {
        let mut report = GenerationReport::default();

        self.generate(values, |artifact| {
            if artifact.kind == ArtifactKind::ClientConfig {
                self.store
                    .mkdir(&self.layout.client_config_dir, CLIENT_CONFIG_DIR_MODE)
                    .map_err(|source| GenerateError::Storage {
                        artifact: artifact.kind,
                        path: self.layout.client_config_dir.clone(),
                        values: Box::new(values.clone()),
                        source,
                    })?;
            }

            self.store
                .write(&artifact.path, &artifact.content, CONFIG_FILE_MODE)
                .map_err(|source| GenerateError::Storage {
                    artifact: artifact.kind,
                    path: artifact.path.clone(),
                    values: Box::new(values.clone()),
                    source,
                })?;

            debug!(artifact = %artifact.kind, path = %artifact.path.display(), "wrote artifact");
            report.written.push((artifact.kind, artifact.path));
            Ok(())
        })?;

        info!(
            artifacts = report.written.len(),
            ha = values.is_ha,
            "generated tunnel configuration"
        );
        Ok(report)
    }

    /// Run the generation pass without storing anything.
    pub fn render_all(&self, values: &SeedServerValues) -> GenerateResult<Vec<RenderedArtifact>> {
        let mut artifacts = Vec::new();
        self.generate(values, |artifact| {
            artifacts.push(artifact);
            Ok(())
        })?;
        Ok(artifacts)
    }

    fn generate<F>(&self, values: &SeedServerValues, mut emit: F) -> GenerateResult<()>
    where
        F: FnMut(RenderedArtifact) -> GenerateResult<()>,
    {
        let ccd = self.layout.client_config_dir.as_path();

        let server = self.render(
            ArtifactKind::ServerConfig,
            SERVER_TEMPLATE,
            &self.templates.server,
            server_context(values, ccd),
            values,
        )?;
        emit(server)?;

        let client = self.render(
            ArtifactKind::ClientConfig,
            CLIENT_TEMPLATE,
            &self.templates.client,
            client_context(values, ccd),
            values,
        )?;
        emit(client)?;

        if !values.is_ha {
            return Ok(());
        }

        for (index, start_ip) in values.ha_client_addresses() {
            let start_ip = start_ip.map_err(|source| GenerateError::AllocationOverflow {
                index,
                values: Box::new(values.clone()),
                source,
            })?;
            debug!(index, %start_ip, "assigned HA shoot client address");

            let ha_client = self.render(
                ArtifactKind::HaClientConfig(index),
                HA_CLIENT_TEMPLATE,
                &self.templates.ha_client,
                ha_client_context(values, start_ip),
                values,
            )?;
            emit(ha_client)?;
        }

        Ok(())
    }

    fn render(
        &self,
        kind: ArtifactKind,
        name: &str,
        source: &str,
        context: Result<Context, tera::Error>,
        values: &SeedServerValues,
    ) -> GenerateResult<RenderedArtifact> {
        let render_error = |source: RenderError| GenerateError::Render {
            artifact: kind,
            values: Box::new(values.clone()),
            source,
        };

        let context = context.map_err(|err| render_error(RenderError::Values(err)))?;
        let mut content = Vec::new();
        self.renderer
            .render(name, source, &context, &mut content)
            .map_err(render_error)?;

        Ok(RenderedArtifact {
            kind,
            path: self.layout.path_of(kind),
            content,
        })
    }
}

/// Helper for callers holding only a directory: the default file names below `dir`.
pub fn layout_in(dir: &Path) -> OutputLayout {
    let defaults = OutputConfig::default();
    OutputLayout {
        server_config: dir.join("openvpn.config"),
        client_config_dir: dir.join("client-config-dir"),
        client_config_prefix: defaults.client_config_prefix,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_paths() {
        let layout = OutputLayout::default();
        assert_eq!(layout.path_of(ArtifactKind::ServerConfig), PathBuf::from("/openvpn.config"));
        assert_eq!(
            layout.path_of(ArtifactKind::ClientConfig),
            PathBuf::from("/client-config-dir/vpn-shoot-client")
        );
        assert_eq!(
            layout.path_of(ArtifactKind::HaClientConfig(2)),
            PathBuf::from("/client-config-dir/vpn-shoot-client-2")
        );
    }

    #[test]
    fn test_artifact_kind_display() {
        assert_eq!(ArtifactKind::ServerConfig.to_string(), "openvpn server config");
        assert_eq!(
            ArtifactKind::HaClientConfig(1).to_string(),
            "HA shoot client config 1"
        );
    }
}
