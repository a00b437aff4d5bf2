use parking_lot::Mutex;
use tracing::debug;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum GateState {
    /// Not accepting input.
    Disarmed,
    /// Accepting input.
    Armed,
    /// Armed, but the current holder has not finished yet.
    Paused,
}

#[derive(Debug)]
struct Inner {
    state: GateState,
    generation: u64,
}

/// Pausable input gate with a session generation.
///
/// State and generation change under one lock, so a claim always carries the
/// generation it was made under. `disarm` starts a new generation; `arm` and
/// `resume` only take effect for the generation they name, so a stale holder
/// can never re-open a gate that a later session owns.
#[derive(Debug)]
pub struct ClickGate {
    inner: Mutex<Inner>,
}

impl Default for ClickGate {
    fn default() -> Self {
        Self::new()
    }
}

impl ClickGate {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: GateState::Disarmed,
                generation: 0,
            }),
        }
    }

    pub fn state(&self) -> GateState {
        self.inner.lock().state
    }

    pub fn generation(&self) -> u64 {
        self.inner.lock().generation
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.inner.lock().generation == generation
    }

    /// Closes the gate and starts a new generation, which is returned.
    pub fn disarm(&self) -> u64 {
        let mut inner = self.inner.lock();
        inner.state = GateState::Disarmed;
        inner.generation += 1;
        inner.generation
    }

    /// Opens the gate if `generation` is still current.
    pub fn arm(&self, generation: u64) -> bool {
        let mut inner = self.inner.lock();
        if inner.generation != generation {
            return false;
        }
        inner.state = GateState::Armed;
        true
    }

    /// Claims the gate, returning the generation it was claimed under.
    /// `None` when disarmed or already paused.
    pub fn try_pause(&self) -> Option<u64> {
        let mut inner = self.inner.lock();
        if inner.state != GateState::Armed {
            debug!(state = ?inner.state, "gate closed; input ignored");
            return None;
        }
        inner.state = GateState::Paused;
        Some(inner.generation)
    }

    /// Re-opens a gate paused under `generation`. Returns `false` if the gate
    /// was not paused or a newer generation has started.
    pub fn resume(&self, generation: u64) -> bool {
        let mut inner = self.inner.lock();
        if inner.state != GateState::Paused || inner.generation != generation {
            return false;
        }
        inner.state = GateState::Armed;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::{ClickGate, GateState};

    fn armed() -> (ClickGate, u64) {
        let gate = ClickGate::new();
        let generation = gate.disarm();
        assert!(gate.arm(generation));
        (gate, generation)
    }

    #[test]
    fn starts_disarmed_and_rejects_input() {
        let gate = ClickGate::new();
        assert_eq!(gate.state(), GateState::Disarmed);
        assert_eq!(gate.try_pause(), None);
    }

    #[test]
    fn only_one_holder_at_a_time() {
        let (gate, generation) = armed();
        assert_eq!(gate.try_pause(), Some(generation));
        assert_eq!(gate.try_pause(), None);
        assert!(gate.resume(generation));
        assert_eq!(gate.try_pause(), Some(generation));
    }

    #[test]
    fn resume_does_not_undo_disarm() {
        let (gate, generation) = armed();
        assert_eq!(gate.try_pause(), Some(generation));
        gate.disarm();
        assert!(!gate.resume(generation));
        assert_eq!(gate.state(), GateState::Disarmed);
    }

    #[test]
    fn claim_made_before_a_disarm_keeps_the_old_generation() {
        let (gate, generation) = armed();
        let claimed = gate.try_pause().unwrap();
        let next = gate.disarm();

        assert_eq!(claimed, generation);
        assert_ne!(claimed, next);
        assert!(!gate.is_current(claimed));
        assert!(gate.is_current(next));
    }

    #[test]
    fn stale_holder_cannot_reopen_a_newer_session() {
        let (gate, old) = armed();
        assert_eq!(gate.try_pause(), Some(old));

        let new = gate.disarm();
        assert!(gate.arm(new));
        assert_eq!(gate.try_pause(), Some(new));

        assert!(!gate.resume(old));
        assert_eq!(gate.state(), GateState::Paused);
        assert!(gate.resume(new));
        assert_eq!(gate.state(), GateState::Armed);
    }

    #[test]
    fn arm_for_a_superseded_generation_is_refused() {
        let gate = ClickGate::new();
        let first = gate.disarm();
        let second = gate.disarm();
        assert!(!gate.arm(first));
        assert_eq!(gate.state(), GateState::Disarmed);
        assert!(gate.arm(second));
    }
}
