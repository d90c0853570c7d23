//! Handout Pipeline - Single Entry Point
//!
//! Validator -> Escaper -> Barcode -> Profile -> Template -> Builder.
//! Validation always runs first: nothing is encoded, rendered or written for
//! a configuration that fails it.

use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, trace};

use crate::barcode::{self, EncodingError};
use crate::build::{BuildError, BuildReport, DocumentBuilder};
use crate::config::{ConfigError, WifiConfig};
use crate::profile::Substitutions;
use crate::templates::{Template, TemplateError};
use crate::validation::InvalidConfiguration;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    InvalidConfiguration(#[from] InvalidConfiguration),

    #[error("Encoding failure: {0}")]
    Encoding(#[from] EncodingError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("Build failed: {0}")]
    Build(#[from] BuildError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl PipelineError {
    /// True when the failure came from the typesetting step.
    pub fn is_build_failure(&self) -> bool {
        matches!(self, PipelineError::Build(_))
    }
}

/// Outcome of a successful run, serializable for machine-readable output.
#[derive(Debug, Clone, Serialize)]
pub struct CompiledHandout {
    pub output: PathBuf,
    pub sha256: String,
    pub duration_ms: u128,
    #[serde(skip)]
    pub engine_output: String,
}

impl From<BuildReport> for CompiledHandout {
    fn from(report: BuildReport) -> Self {
        Self {
            output: report.output,
            sha256: report.sha256,
            duration_ms: report.duration.as_millis(),
            engine_output: report.engine_output,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct HandoutPipeline {
    builder: DocumentBuilder,
}

impl HandoutPipeline {
    pub fn new(builder: DocumentBuilder) -> Self {
        Self { builder }
    }

    pub fn builder(&self) -> &DocumentBuilder {
        &self.builder
    }

    /// Validate, escape, encode and fill the template.
    ///
    /// The template is parsed before the barcode is encoded, so a malformed
    /// template fails without doing that work.
    pub fn render(&self, config: &WifiConfig, template: &str) -> Result<String, PipelineError> {
        let credentials = config.credentials()?;
        let template = Template::parse(template)?;

        let substitutions = Substitutions::build(&credentials, config.pass_through())?;
        let rendered = template.render(&substitutions)?;

        debug!(bytes = rendered.len(), "template rendered");
        trace!(source = %rendered, "rendered source");
        Ok(rendered)
    }

    /// Render and typeset into `output`.
    ///
    /// Rendering errors surface before the engine is started.
    pub fn compile(
        &self,
        config: &WifiConfig,
        template: &str,
        output: &Path,
    ) -> Result<CompiledHandout, PipelineError> {
        let rendered = self.render(config, template)?;
        let report = self.builder.build(&rendered, output)?;
        Ok(report.into())
    }

    /// PNG bytes of the barcode for `config`, after validation.
    pub fn barcode_png(&self, config: &WifiConfig) -> Result<Vec<u8>, PipelineError> {
        let credentials = config.credentials()?;
        Ok(barcode::encode_png(&credentials.wire_string())?)
    }
}
