use crate::shared::frame_size::FrameSize;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Inactive,
    Starting,
    Active,
    Stopping,
}

/// Lifecycle and counters of the current (or last) capture.
#[derive(Clone, Debug, Default)]
pub struct CaptureSession {
    state: SessionState,
    size: Option<FrameSize>,
    frames_accepted: usize,
    frames_dropped: usize,
}

impl CaptureSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }

    /// Fixed capture size, set for the duration of a session.
    pub fn size(&self) -> Option<FrameSize> {
        self.size
    }

    pub fn frames_accepted(&self) -> usize {
        self.frames_accepted
    }

    pub fn frames_dropped(&self) -> usize {
        self.frames_dropped
    }

    /// Enters `Starting` for `size` and clears the previous session's counters.
    pub fn begin(&mut self, size: FrameSize) {
        self.state = SessionState::Starting;
        self.size = Some(size);
        self.frames_accepted = 0;
        self.frames_dropped = 0;
    }

    pub fn activate(&mut self) {
        self.state = SessionState::Active;
    }

    pub fn stopping(&mut self) {
        self.state = SessionState::Stopping;
    }

    /// Back to `Inactive`. Counters stay readable until the next `begin`.
    pub fn reset(&mut self) {
        self.state = SessionState::Inactive;
        self.size = None;
    }

    pub fn record_accepted(&mut self) {
        self.frames_accepted += 1;
    }

    pub fn record_dropped(&mut self) {
        self.frames_dropped += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_inactive() {
        let session = CaptureSession::new();
        assert_eq!(session.state(), SessionState::Inactive);
        assert!(!session.is_active());
        assert_eq!(session.size(), None);
    }

    #[test]
    fn test_lifecycle() {
        let mut session = CaptureSession::new();
        session.begin(FrameSize::new(64, 64));
        assert_eq!(session.state(), SessionState::Starting);
        assert!(!session.is_active());

        session.activate();
        assert!(session.is_active());
        assert_eq!(session.size(), Some(FrameSize::new(64, 64)));

        session.stopping();
        assert_eq!(session.state(), SessionState::Stopping);

        session.reset();
        assert_eq!(session.state(), SessionState::Inactive);
        assert_eq!(session.size(), None);
    }

    #[test]
    fn test_counters_survive_reset_and_clear_on_begin() {
        let mut session = CaptureSession::new();
        session.begin(FrameSize::new(64, 64));
        session.activate();
        session.record_accepted();
        session.record_accepted();
        session.record_dropped();
        session.reset();

        assert_eq!(session.frames_accepted(), 2);
        assert_eq!(session.frames_dropped(), 1);

        session.begin(FrameSize::new(32, 32));
        assert_eq!(session.frames_accepted(), 0);
        assert_eq!(session.frames_dropped(), 0);
    }
}
