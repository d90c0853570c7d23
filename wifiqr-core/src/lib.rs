//! WifiQR Core - Wi-Fi credential handouts
//!
//! Turns a network name and password into a printable document carrying a
//! scannable QR code, by filling a LaTeX template and typesetting it.
//!
//! # Guarantees
//! 1. Enumerated fields are validated before anything else runs
//! 2. Template text is escaped, the QR payload never is
//! 3. A run either writes the document or writes nothing
//! 4. Build workspaces never outlive the build

pub mod barcode;
pub mod build;
pub mod config;
pub mod escape;
pub mod hashing;
pub mod pipeline;
pub mod profile;
pub mod templates;
pub mod validation;

pub use build::{BuildError, BuildReport, DocumentBuilder, Engine};
pub use config::{ConfigError, WifiConfig};
pub use escape::escape_latex;
pub use pipeline::{CompiledHandout, HandoutPipeline, PipelineError};
pub use profile::Substitutions;
pub use templates::{Template, TemplateError};
pub use validation::{Credentials, InvalidConfiguration, SecurityStandard};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
