use std::fmt;

pub type Result<T> = std::result::Result<T, RenderError>;

/// Longest diagram excerpt (in chars) carried by an error.
pub const DIAGRAM_EXCERPT_CHARS: usize = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The source failed validation or the engine rejected its syntax.
    Parse,
    /// The engine accepted the syntax but failed while producing markup.
    Render,
    /// Infrastructure failure (engine load/initialize, unresolved dependency).
    Unknown,
    ThemeNotFound,
    DuplicateTheme,
    InvalidTheme,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Parse => "Parse",
            Self::Render => "Render",
            Self::Unknown => "Unknown",
            Self::ThemeNotFound => "ThemeNotFound",
            Self::DuplicateTheme => "DuplicateTheme",
            Self::InvalidTheme => "InvalidTheme",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tagged failure shared by the registry and every render backend.
///
/// Construct through the named factories (`RenderError::parse`, `RenderError::unknown`, ...)
/// so the `kind` always matches the failure site.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} error: {message}")]
pub struct RenderError {
    pub kind: ErrorKind,
    pub message: String,
    /// Truncated diagram source, for diagnostics only.
    pub diagram: Option<String>,
}

impl RenderError {
    fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            diagram: None,
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Parse, message)
    }

    pub fn render(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Render, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unknown, message)
    }

    pub fn theme_not_found(name: &str) -> Self {
        Self::new(ErrorKind::ThemeNotFound, format!("theme `{name}` is not registered"))
    }

    pub fn duplicate_theme(name: &str) -> Self {
        Self::new(
            ErrorKind::DuplicateTheme,
            format!("theme `{name}` already exists"),
        )
    }

    pub fn invalid_theme(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidTheme, message)
    }

    /// Attaches a truncated excerpt of `source`.
    pub fn with_diagram(mut self, source: &str) -> Self {
        self.diagram = Some(diagram_excerpt(source));
        self
    }

    /// Only infrastructure failures are worth retrying; the others are deterministic.
    pub fn is_retryable(&self) -> bool {
        self.kind == ErrorKind::Unknown
    }

    /// Message suitable for end users.
    ///
    /// `Parse`/`Render` describe the user's diagram and are shown verbatim. `Unknown` hides the
    /// infrastructure detail, which stays available in `message` for logs.
    pub fn user_message(&self) -> String {
        match self.kind {
            ErrorKind::Unknown => {
                "The diagram renderer is unavailable right now. Please try again.".to_string()
            }
            _ => self.message.clone(),
        }
    }
}

/// Truncates `source` to [`DIAGRAM_EXCERPT_CHARS`] chars, appending `…` when cut.
pub fn diagram_excerpt(source: &str) -> String {
    match source.char_indices().nth(DIAGRAM_EXCERPT_CHARS) {
        Some((idx, _)) => format!("{}…", &source[..idx]),
        None => source.to_string(),
    }
}
