//! Profile Builder - credentials to template substitutions.
//!
//! `ssid` and `password` are LaTeX-escaped for the document. The barcode is
//! fed the raw wire string: a scanner reads the literal credentials, so
//! escaping there would corrupt them.

use std::collections::BTreeMap;

use crate::barcode::{self, EncodingError};
use crate::escape::escape_latex;
use crate::templates::Context;
use crate::validation::Credentials;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitutions {
    pub ssid: String,
    pub password: String,
    pub qrcode: String,
    /// Pass-through fields, already escaped.
    pub extra: BTreeMap<String, String>,
}

impl Substitutions {
    /// Build from validated credentials. `extra` values are escaped here.
    pub fn build(
        credentials: &Credentials,
        extra: impl IntoIterator<Item = (String, String)>,
    ) -> Result<Self, EncodingError> {
        let qrcode = barcode::encode_base64(&credentials.wire_string())?;

        let mut fields: BTreeMap<String, String> = extra
            .into_iter()
            .map(|(name, value)| (name, escape_latex(&value)))
            .collect();
        fields.insert(
            "security_standard".to_string(),
            credentials.security_standard().as_str().to_string(),
        );
        fields.insert("hidden".to_string(), credentials.hidden_str().to_string());

        Ok(Self {
            ssid: escape_latex(credentials.ssid()),
            password: escape_latex(credentials.password()),
            qrcode,
            extra: fields,
        })
    }
}

impl Context for Substitutions {
    fn get(&self, name: &str) -> Option<&str> {
        match name {
            "ssid" => Some(self.ssid.as_str()),
            "password" => Some(self.password.as_str()),
            "qrcode" => Some(self.qrcode.as_str()),
            other => self.extra.get(other).map(String::as_str),
        }
    }
}
