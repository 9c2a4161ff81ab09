use thiserror::Error;

use super::audio_models::ElementId;

/// Errors that can occur while building or driving the capture graph.
///
/// Every variant is surfaced to the immediate caller; none are swallowed
/// inside the graph.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// The platform requires a user activation before audio may start.
    #[error("audio context blocked: user activation required")]
    ContextBlocked,

    /// The element is already captured by another audio graph context.
    #[error("media element {element} is already bound to another audio context")]
    AlreadyBoundElsewhere { element: ElementId },

    /// Discovery found nothing to capture. Only produced on request, see
    /// `CaptureReport::require_sources`.
    #[error("no media elements found")]
    NoElementsFound,

    #[error("audio context is closed")]
    ContextClosed,

    #[error("captured stream is no longer valid")]
    StreamInvalidated,

    /// A binding created by a different context was handed to this one.
    #[error("source binding belongs to a different audio context")]
    ForeignBinding,

    /// The binding was released and can no longer be routed.
    #[error("source binding has been released")]
    BindingReleased,

    /// A source delivered audio in a format the graph cannot convert.
    #[error("invalid source format: {0}")]
    InvalidSourceFormat(String),

    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),

    #[error("platform error: {0}")]
    Backend(String),
}

impl CaptureError {
    /// Whether retrying the same operation later can succeed without the
    /// caller changing anything else (e.g. after a user gesture).
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::ContextBlocked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn already_bound_names_the_element() {
        let err = CaptureError::AlreadyBoundElsewhere {
            element: ElementId(7),
        };
        assert_eq!(
            err.to_string(),
            "media element #7 is already bound to another audio context"
        );
    }

    #[test]
    fn only_blocked_context_is_recoverable() {
        assert!(CaptureError::ContextBlocked.is_recoverable());
        assert!(!CaptureError::ContextClosed.is_recoverable());
        assert!(!CaptureError::AlreadyBoundElsewhere {
            element: ElementId(1)
        }
        .is_recoverable());
    }
}
