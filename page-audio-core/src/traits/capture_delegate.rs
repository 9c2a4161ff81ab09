use crate::models::error::CaptureError;
use crate::models::events::CaptureStarted;
use crate::models::state::SessionState;

/// Event delegate for capture session notifications.
///
/// `on_capture_started` fires on the control thread, once per successful
/// publish. Implementations forward to whatever logging or transport they own.
pub trait CaptureDelegate: Send + Sync {
    /// Called when the session state changes.
    fn on_state_changed(&self, state: &SessionState);

    /// Called once per successful publish.
    fn on_capture_started(&self, event: &CaptureStarted);

    /// Called when a session operation fails.
    fn on_error(&self, error: &CaptureError);
}
