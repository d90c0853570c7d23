//! Template System - Placeholder Contracts
//!
//! Templates use brace placeholders: `{name}` is substituted, `{{` and `}}`
//! produce literal braces. This keeps LaTeX sources readable while leaving
//! every group brace explicit.
//!
//! A template is parsed completely before rendering, so a malformed template
//! never produces partial output.

use std::collections::BTreeSet;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("Template references unknown placeholder: {0}")]
    MissingPlaceholder(String),

    #[error("Malformed template at byte {offset}: {reason}")]
    MalformedTemplate { offset: usize, reason: String },
}

impl TemplateError {
    fn malformed(offset: usize, reason: impl Into<String>) -> Self {
        TemplateError::MalformedTemplate {
            offset,
            reason: reason.into(),
        }
    }
}

/// Source of placeholder values.
pub trait Context {
    fn get(&self, name: &str) -> Option<&str>;
}

impl Context for std::collections::HashMap<String, String> {
    fn get(&self, name: &str) -> Option<&str> {
        std::collections::HashMap::get(self, name).map(String::as_str)
    }
}

impl Context for std::collections::BTreeMap<String, String> {
    fn get(&self, name: &str) -> Option<&str> {
        std::collections::BTreeMap::get(self, name).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut segments = vec![];
        let mut literal = String::new();
        let mut chars = source.char_indices().peekable();

        while let Some((offset, c)) = chars.next() {
            match c {
                '{' => {
                    if matches!(chars.peek(), Some((_, '{'))) {
                        chars.next();
                        literal.push('{');
                        continue;
                    }

                    let mut name = String::new();
                    let mut closed = false;
                    for (_, n) in chars.by_ref() {
                        if n == '}' {
                            closed = true;
                            break;
                        }
                        name.push(n);
                    }
                    if !closed {
                        return Err(TemplateError::malformed(offset, "unterminated placeholder"));
                    }
                    if !is_valid_name(&name) {
                        return Err(TemplateError::malformed(
                            offset,
                            format!("invalid placeholder name {:?}", name),
                        ));
                    }

                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Placeholder(name));
                }
                '}' => {
                    if matches!(chars.peek(), Some((_, '}'))) {
                        chars.next();
                        literal.push('}');
                    } else {
                        return Err(TemplateError::malformed(offset, "single '}' is not allowed"));
                    }
                }
                _ => literal.push(c),
            }
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self { segments })
    }

    /// Names referenced by the template, sorted and deduplicated.
    pub fn placeholders(&self) -> BTreeSet<&str> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Placeholder(name) => Some(name.as_str()),
                Segment::Literal(_) => None,
            })
            .collect()
    }

    /// Substitute every placeholder. Values are inserted verbatim.
    pub fn render(&self, context: &impl Context) -> Result<String, TemplateError> {
        if let Some(missing) = self
            .placeholders()
            .into_iter()
            .find(|name| context.get(name).is_none())
        {
            return Err(TemplateError::MissingPlaceholder(missing.to_string()));
        }

        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(name) => {
                    let value = context
                        .get(name)
                        .ok_or_else(|| TemplateError::MissingPlaceholder(name.clone()))?;
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }
}

/// Parse and render in one step.
pub fn render_str(source: &str, context: &impl Context) -> Result<String, TemplateError> {
    Template::parse(source)?.render(context)
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
