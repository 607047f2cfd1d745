//! Pick request state machine
//!
//! Two flags drive it: `pending` is set by input and cleared when a pick
//! starts, `active` is set when the pick pass is encoded and cleared when the
//! caller completes the pick. A request arriving while active only sets
//! `pending` again, so it runs once the active pick is done.

/// Observable phase of the picker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickPhase {
    /// Nothing requested, nothing in flight
    Idle,
    /// A request waits for the next frame
    RequestPending,
    /// The pick pass is being recorded this frame
    PickActive,
    /// Submitted; waiting for the readback
    Resolving,
}

/// Pending/active flag pair plus the latest cursor position
#[derive(Debug, Clone, Default)]
pub struct PickState {
    pending: bool,
    active: bool,
    submitted: bool,
    cursor: (i32, i32),
}

impl PickState {
    /// Idle state
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a request; later requests overwrite the coordinates
    pub fn request(&mut self, x: i32, y: i32) {
        self.pending = true;
        self.cursor = (x, y);
    }

    /// Pending and nothing in flight
    pub fn should_run_picking(&self) -> bool {
        self.pending && !self.active
    }

    /// Enter `PickActive`, returning the coordinates to pick at
    pub fn begin(&mut self) -> Option<(i32, i32)> {
        if !self.should_run_picking() {
            return None;
        }
        self.pending = false;
        self.active = true;
        self.submitted = false;
        Some(self.cursor)
    }

    /// Move from `PickActive` to `Resolving`
    pub fn mark_submitted(&mut self) {
        if self.active {
            self.submitted = true;
        }
    }

    /// Leave the active pick; a request that arrived meanwhile stays pending
    pub fn finish(&mut self) {
        self.active = false;
        self.submitted = false;
    }

    /// Whether a request is waiting
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Whether a pick is in flight
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Most recent requested coordinates
    pub fn cursor(&self) -> (i32, i32) {
        self.cursor
    }

    /// Current phase
    pub fn phase(&self) -> PickPhase {
        match (self.active, self.submitted, self.pending) {
            (true, true, _) => PickPhase::Resolving,
            (true, false, _) => PickPhase::PickActive,
            (false, _, true) => PickPhase::RequestPending,
            (false, _, false) => PickPhase::Idle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_cycle() {
        let mut state = PickState::new();
        assert_eq!(state.phase(), PickPhase::Idle);
        state.request(10, 20);
        assert_eq!(state.phase(), PickPhase::RequestPending);
        assert_eq!(state.begin(), Some((10, 20)));
        assert_eq!(state.phase(), PickPhase::PickActive);
        state.mark_submitted();
        assert_eq!(state.phase(), PickPhase::Resolving);
        state.finish();
        assert_eq!(state.phase(), PickPhase::Idle);
    }

    #[test]
    fn test_request_while_active_is_deferred() {
        let mut state = PickState::new();
        state.request(1, 1);
        state.begin();
        state.request(5, 6);
        state.request(7, 8);
        assert!(!state.should_run_picking());
        assert_eq!(state.begin(), None);
        assert_eq!(state.phase(), PickPhase::PickActive);

        state.finish();
        assert_eq!(state.phase(), PickPhase::RequestPending);
        assert_eq!(state.begin(), Some((7, 8)));
        state.finish();
        assert_eq!(state.begin(), None);
    }

    #[test]
    fn test_submit_without_begin_is_ignored() {
        let mut state = PickState::new();
        state.mark_submitted();
        assert_eq!(state.phase(), PickPhase::Idle);
    }
}
