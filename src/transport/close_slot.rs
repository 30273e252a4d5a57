//! Exactly-once storage for the close callback.
//!
//! Registration and firing can race (a caller registers while the read path
//! observes the socket closing). Whichever side arrives second receives the
//! handler and runs it, so it runs exactly once.

// ============================================================================
// CloseSlot
// ============================================================================

/// Holds the close callback until the connection closes.
#[derive(Debug)]
pub(crate) enum CloseSlot<H> {
    /// Not closed yet. Holds the registered handler, if any.
    Pending(Option<H>),
    /// Closed. Any handler present at that point has been handed out.
    Fired,
}

impl<H> Default for CloseSlot<H> {
    fn default() -> Self {
        Self::Pending(None)
    }
}

impl<H> CloseSlot<H> {
    /// Stores `handler`, replacing an earlier registration.
    ///
    /// Returns the handler back if the slot already fired; the caller must
    /// invoke it.
    pub(crate) fn register(&mut self, handler: H) -> Option<H> {
        match self {
            Self::Pending(slot) => {
                *slot = Some(handler);
                None
            }
            Self::Fired => Some(handler),
        }
    }

    /// Marks the slot fired and returns the handler to invoke.
    ///
    /// Returns `None` on every call after the first.
    pub(crate) fn fire(&mut self) -> Option<H> {
        match std::mem::replace(self, Self::Fired) {
            Self::Pending(handler) => handler,
            Self::Fired => None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_then_fire() {
        let mut slot = CloseSlot::default();
        assert_eq!(slot.register(1), None);
        assert_eq!(slot.fire(), Some(1));
        assert_eq!(slot.fire(), None);
        assert!(matches!(slot, CloseSlot::Fired));
    }

    #[test]
    fn test_fire_then_register_hands_back() {
        let mut slot = CloseSlot::default();
        assert_eq!(slot.fire(), None);
        assert_eq!(slot.register(7), Some(7));
        assert_eq!(slot.fire(), None);
    }

    #[test]
    fn test_reregistration_replaces() {
        let mut slot = CloseSlot::default();
        slot.register("first");
        slot.register("second");
        assert_eq!(slot.fire(), Some("second"));
    }
}
