//! Minimal `{name}` prompt templates.

use thiserror::Error;

/// Errors raised while rendering a prompt template.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PromptError {
    /// Template referenced a variable that was not supplied.
    #[error("missing template variable '{0}'")]
    MissingVariable(String),
    /// Template contained an unterminated `{` placeholder.
    #[error("unterminated placeholder starting at byte {0}")]
    Unterminated(usize),
}

/// Prompt with `{name}` placeholders; `{{` and `}}` render literal braces.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    /// Wrap a template string.
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// Substitute every placeholder with the matching value from `variables`.
    pub fn format(&self, variables: &[(&str, &str)]) -> Result<String, PromptError> {
        let mut rendered = String::with_capacity(self.template.len());
        let mut chars = self.template.char_indices().peekable();

        while let Some((offset, ch)) = chars.next() {
            match ch {
                '{' if matches!(chars.peek(), Some((_, '{'))) => {
                    chars.next();
                    rendered.push('{');
                }
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for (_, inner) in chars.by_ref() {
                        if inner == '}' {
                            closed = true;
                            break;
                        }
                        name.push(inner);
                    }
                    if !closed {
                        return Err(PromptError::Unterminated(offset));
                    }
                    let value = variables
                        .iter()
                        .find(|(key, _)| *key == name.trim())
                        .map(|(_, value)| *value)
                        .ok_or_else(|| PromptError::MissingVariable(name.trim().to_string()))?;
                    rendered.push_str(value);
                }
                '}' if matches!(chars.peek(), Some((_, '}'))) => {
                    chars.next();
                    rendered.push('}');
                }
                other => rendered.push(other),
            }
        }

        Ok(rendered)
    }
}
