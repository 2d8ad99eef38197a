//! Session lifecycle state.

use std::fmt;

/// Lifecycle state of a transport session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No stream is open and none is being opened.
    #[default]
    Disconnected,
    /// A stream is being opened (initial connect or reconnect).
    Connecting,
    /// A stream is open and usable.
    Connected,
    /// Teardown requested; the read loop is stopping.
    Disconnecting,
}

impl SessionState {
    /// Whether a stream is open and usable.
    pub fn is_connected(self) -> bool {
        self == Self::Connected
    }

    /// Whether the transition `self -> next` is part of the lifecycle.
    ///
    /// ```text
    /// Disconnected -> Connecting -> Connected -> Disconnecting -> Disconnected
    ///                    |  ^            |
    ///                    |  +------------+   (stream lost, reconnecting)
    ///                    +--> Disconnected   (open failed / gave up)
    /// ```
    pub fn can_transition_to(self, next: Self) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Disconnected, Connecting)
                | (Connecting, Connected)
                | (Connecting, Disconnected)
                | (Connecting, Disconnecting)
                | (Connected, Connecting)
                | (Connected, Disconnected)
                | (Connected, Disconnecting)
                | (Disconnecting, Disconnected)
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnecting => "disconnecting",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_disconnected() {
        assert_eq!(SessionState::default(), SessionState::Disconnected);
        assert!(!SessionState::default().is_connected());
    }

    #[test]
    fn test_lifecycle_transitions() {
        use SessionState::*;

        assert!(Disconnected.can_transition_to(Connecting));
        assert!(Connecting.can_transition_to(Connected));
        assert!(Connected.can_transition_to(Connecting));
        assert!(Connected.can_transition_to(Disconnecting));
        assert!(Disconnecting.can_transition_to(Disconnected));

        assert!(!Disconnected.can_transition_to(Connected));
        assert!(!Disconnecting.can_transition_to(Connected));
        assert!(!Connected.can_transition_to(Connected));
    }

    #[test]
    fn test_display() {
        assert_eq!(SessionState::Connecting.to_string(), "connecting");
    }
}
