//! Error taxonomy and warning collection for a build.
//!
//! Fatal problems are [`BuildError`]s. Recoverable problems are recorded as
//! [`BuildWarning`]s in a shared [`Diagnostics`] sink, which the builder reads
//! back into its [`crate::BuildStats`].

use parking_lot::Mutex;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// Malformed settings or content metadata. Aborts the build before any output is written.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A single render job failed. The job keeps its partial output.
    #[error("[{content}] {message}")]
    ContentRender { content: String, message: String },

    /// A content file was found on disk but never made it into the site context.
    #[error("[{0}] no content context exists for this file")]
    UnregisteredContent(String),

    #[error("cannot read |{path}|: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl BuildError {
    pub fn configuration(message: impl Into<String>) -> Self {
        BuildError::Configuration(message.into())
    }

    pub fn render(content: impl Into<String>, message: impl Into<String>) -> Self {
        BuildError::ContentRender {
            content: content.into(),
            message: message.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BuildError::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error must stop the whole build.
    pub fn is_fatal(&self) -> bool {
        matches!(self, BuildError::Configuration(_) | BuildError::Io { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    /// Unresolved path or title lookup
    Reference,
    /// Missing translation
    Translation,
    /// Template evaluation failure
    Render,
    /// Anything else tied to a content file
    Content,
}

impl fmt::Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WarningKind::Reference => write!(f, "reference"),
            WarningKind::Translation => write!(f, "translation"),
            WarningKind::Render => write!(f, "render"),
            WarningKind::Content => write!(f, "content"),
        }
    }
}

/// A recoverable problem, reported on the console and in the build stats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildWarning {
    pub kind: WarningKind,
    /// Subsystem that raised it, e.g. `content` or `i18n`
    pub scope: String,
    /// Content id or path the warning is about
    pub subject: String,
    pub message: String,
}

impl BuildWarning {
    pub fn new(
        kind: WarningKind,
        scope: impl Into<String>,
        subject: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            scope: scope.into(),
            subject: subject.into(),
            message: message.into(),
        }
    }

    pub fn unresolved_path(path: &str, lang: &str) -> Self {
        Self::new(
            WarningKind::Reference,
            "content",
            path,
            format!("Could not find path for lang=|{}|", lang),
        )
    }

    pub fn missing_title(path: &str) -> Self {
        Self::new(WarningKind::Reference, "content", path, "No title defined.")
    }

    pub fn render_failure(error: &BuildError) -> Self {
        let subject = match error {
            BuildError::ContentRender { content, .. } => content.clone(),
            BuildError::UnregisteredContent(path) => path.clone(),
            BuildError::Io { path, .. } => path.display().to_string(),
            BuildError::Configuration(_) => String::new(),
        };
        Self::new(WarningKind::Render, "content", subject, error.to_string())
    }
}

impl fmt::Display for BuildWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] [{}] {}", self.scope, self.subject, self.message)
    }
}

/// Shared sink for warnings raised anywhere in a build, including from template helpers.
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Mutex<Vec<BuildWarning>>,
    fatal: Mutex<Option<BuildError>>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a warning and log it immediately.
    pub fn warn(&self, warning: BuildWarning) {
        log::warn!("{}", warning);
        self.warnings.lock().push(warning);
    }

    /// Record a build-fatal error raised where it cannot be returned directly.
    /// Only the first one is kept.
    pub fn set_fatal(&self, error: BuildError) {
        let mut fatal = self.fatal.lock();
        if fatal.is_none() {
            log::error!("{}", error);
            *fatal = Some(error);
        }
    }

    pub fn take_fatal(&self) -> Option<BuildError> {
        self.fatal.lock().take()
    }

    pub fn warnings(&self) -> Vec<BuildWarning> {
        self.warnings.lock().clone()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings.lock().len()
    }

    /// Start a fresh build with the same sink.
    pub fn clear(&self) {
        self.warnings.lock().clear();
        self.fatal.lock().take();
    }
}
