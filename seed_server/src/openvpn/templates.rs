//! Template texts and the renderer that fills them in.

use std::borrow::Cow;
use std::io::Write;
use tera::{Context, Tera};
use thiserror::Error;

/// Template name of the server configuration.
pub const SERVER_TEMPLATE: &str = "openvpn.cfg";
/// Template name of the non-HA shoot client configuration.
pub const CLIENT_TEMPLATE: &str = "vpn-shoot-client";
/// Template name of the HA shoot client configuration.
pub const HA_CLIENT_TEMPLATE: &str = "vpn-shoot-client-ha";

/// Errors produced while rendering a template.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The template could not be parsed or rendered
    #[error("template `{name}` failed to render")]
    Template {
        name: String,
        #[source]
        source: tera::Error,
    },

    /// The values could not be converted into a template context
    #[error("invalid template values")]
    Values(#[source] tera::Error),
}

/// The template texts used for one generation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Templates {
    pub server: Cow<'static, str>,
    pub client: Cow<'static, str>,
    pub ha_client: Cow<'static, str>,
}

impl Templates {
    /// Templates compiled into the binary.
    pub fn embedded() -> Self {
        Templates {
            server: Cow::Borrowed(include_str!("assets/server-config.tera")),
            client: Cow::Borrowed(include_str!("assets/server-for-client-config.tera")),
            ha_client: Cow::Borrowed(include_str!("assets/server-for-client-ha-config.tera")),
        }
    }
}

impl Default for Templates {
    fn default() -> Self {
        Self::embedded()
    }
}

/// Renders a named template with a set of values into `out`.
pub trait TemplateRenderer {
    fn render(
        &self,
        name: &str,
        source: &str,
        values: &Context,
        out: &mut dyn Write,
    ) -> Result<(), RenderError>;
}

impl<T: TemplateRenderer + ?Sized> TemplateRenderer for &T {
    fn render(
        &self,
        name: &str,
        source: &str,
        values: &Context,
        out: &mut dyn Write,
    ) -> Result<(), RenderError> {
        (**self).render(name, source, values, out)
    }
}

/// [`TemplateRenderer`] backed by Tera.
#[derive(Debug, Default, Clone, Copy)]
pub struct TeraRenderer;

impl TemplateRenderer for TeraRenderer {
    fn render(
        &self,
        name: &str,
        source: &str,
        values: &Context,
        out: &mut dyn Write,
    ) -> Result<(), RenderError> {
        let template_error = |source| RenderError::Template {
            name: name.to_string(),
            source,
        };

        let mut tera = Tera::default();
        // Config files, never HTML
        tera.autoescape_on(Vec::new());
        tera.add_raw_template(name, source).map_err(template_error)?;
        tera.render_to(name, values, out).map_err(template_error)
    }
}
