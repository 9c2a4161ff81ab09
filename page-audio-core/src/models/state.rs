/// Lifecycle of an audio graph context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Running,
    Suspended,
    Closed,
}

impl ContextState {
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

/// Capture session state machine.
///
/// State transitions:
/// ```text
/// uninitialized → running → closed
///       ↓            ↑
///    blocked ────────┘   (retry after user activation)
/// ```
/// `Closed` is terminal; a new session needs a fresh `CaptureSession`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Blocked,
    Running,
    Closed,
}

impl SessionState {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Blocked => "blocked",
            Self::Running => "running",
            Self::Closed => "closed",
        }
    }
}
