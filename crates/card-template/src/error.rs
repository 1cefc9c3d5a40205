//! Template error types

use thiserror::Error;

pub type TemplateResult<T> = Result<T, TemplateError>;

/// Why a condition template produced no value
///
/// Undefined variables render as empty under the default undefined behavior,
/// so anything that is not a parse failure surfaces as [`TemplateError::Render`].
#[derive(Debug, Error)]
pub enum TemplateError {
    /// The template did not parse
    #[error("template syntax error{}: {message}", line_suffix(.line))]
    Syntax { line: Option<usize>, message: String },

    /// Rendering a parsed template failed
    #[error("failed to render template: {message}")]
    Render { message: String },
}

fn line_suffix(line: &Option<usize>) -> String {
    line.map(|l| format!(" on line {l}")).unwrap_or_default()
}

impl From<minijinja::Error> for TemplateError {
    fn from(err: minijinja::Error) -> Self {
        let message = err
            .detail()
            .map(str::to_string)
            .unwrap_or_else(|| err.kind().to_string());
        match err.kind() {
            minijinja::ErrorKind::SyntaxError => TemplateError::Syntax {
                line: err.line(),
                message,
            },
            _ => TemplateError::Render { message },
        }
    }
}
