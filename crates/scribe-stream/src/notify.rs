//! User-facing notifications raised during a fold.

use tracing::warn;

use crate::error::FrameError;
use crate::frame::Origin;

/// A message for the user, e.g. rendered as a toast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub title: String,
    pub description: String,
}

impl Notice {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
        }
    }

    /// Describe a precondition failure for the user.
    pub fn from_frame_error(origin: Option<Origin>, err: &FrameError) -> Self {
        let title = match err {
            FrameError::NoArtifact => "No artifact found",
            FrameError::NoHighlight | FrameError::NoCodeRange => "No highlighted content",
            FrameError::WrongVariant { .. } => "Unsupported artifact type",
            FrameError::MissingLanguage => "Missing language",
            _ => "Unable to apply update",
        };
        let description = match origin {
            Some(origin) => format!("{err} ({origin})"),
            None => err.to_string(),
        };
        Self::new(title, description)
    }
}

/// Receives notices. Implementations must not block.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: &Notice);
}

/// Default notifier: logs each notice at warn level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notice: &Notice) {
        warn!(title = %notice.title, "{}", notice.description);
    }
}
