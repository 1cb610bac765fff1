//! Element lifecycle state machine.
//!
//! States form a line `Null <-> Ready <-> Paused <-> Running`, plus a side
//! `Error` state reachable only by the element itself (never requested by a
//! caller). `compute_state_changes` decomposes an arbitrary (current, target)
//! pair into the ordered sequence of adjacent transitions that gets there.

/// Lifecycle state of an element or pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum State {
    Null = 0,
    Ready = 1,
    Paused = 2,
    Running = 3,
    Error = 11,
}

/// One adjacent transition, named both by direction and by the conventional
/// lifecycle-phase alias used in logs and in `Element` handler names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateChange {
    NullToReady,
    ReadyToPaused,
    PausedToRunning,
    RunningToPaused,
    PausedToReady,
    ReadyToNull,
}

impl StateChange {
    pub const INITIALIZE: StateChange = StateChange::NullToReady;
    pub const PREPARE: StateChange = StateChange::ReadyToPaused;
    pub const RUN: StateChange = StateChange::PausedToRunning;
    pub const PAUSE: StateChange = StateChange::RunningToPaused;
    pub const STOP: StateChange = StateChange::PausedToReady;
    pub const TEARDOWN: StateChange = StateChange::ReadyToNull;

    /// The state this transition leads to.
    pub fn target(self) -> State {
        match self {
            StateChange::NullToReady => State::Ready,
            StateChange::ReadyToPaused => State::Paused,
            StateChange::PausedToRunning => State::Running,
            StateChange::RunningToPaused => State::Paused,
            StateChange::PausedToReady => State::Ready,
            StateChange::ReadyToNull => State::Null,
        }
    }

    /// The state this transition leads from.
    pub fn previous(self) -> State {
        match self {
            StateChange::NullToReady => State::Null,
            StateChange::ReadyToPaused => State::Ready,
            StateChange::PausedToRunning => State::Paused,
            StateChange::RunningToPaused => State::Running,
            StateChange::PausedToReady => State::Paused,
            StateChange::ReadyToNull => State::Ready,
        }
    }

    /// The adjacent transition between two states, if they are in fact adjacent.
    pub fn between(previous: State, target: State) -> Option<StateChange> {
        use State::*;
        match (previous, target) {
            (Null, Ready) => Some(StateChange::NullToReady),
            (Ready, Paused) => Some(StateChange::ReadyToPaused),
            (Paused, Running) => Some(StateChange::PausedToRunning),
            (Running, Paused) => Some(StateChange::RunningToPaused),
            (Paused, Ready) => Some(StateChange::PausedToReady),
            (Ready, Null) => Some(StateChange::ReadyToNull),
            _ => None,
        }
    }
}

/// Decompose a (possibly non-adjacent) state move into the ordered sequence
/// of adjacent transitions that performs it. Empty on `current == target`,
/// and empty if either side is `Error` (no decomposition exists across the
/// error state — callers must go through a teardown/recreate cycle instead).
pub fn compute_state_changes(current: State, target: State) -> Vec<StateChange> {
    if current == State::Error || target == State::Error {
        return Vec::new();
    }

    let mut changes = Vec::new();
    let cur = current as i32;
    let tgt = target as i32;

    if tgt > cur {
        let mut s = cur;
        while s < tgt {
            let next = s + 1;
            changes.push(StateChange::between(state_of(s), state_of(next)).expect("adjacent"));
            s = next;
        }
    } else {
        let mut s = cur;
        while s > tgt {
            let next = s - 1;
            changes.push(StateChange::between(state_of(s), state_of(next)).expect("adjacent"));
            s = next;
        }
    }

    changes
}

fn state_of(v: i32) -> State {
    match v {
        0 => State::Null,
        1 => State::Ready,
        2 => State::Paused,
        3 => State::Running,
        _ => State::Error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_full_path() {
        assert_eq!(
            compute_state_changes(State::Null, State::Running),
            vec![
                StateChange::NullToReady,
                StateChange::ReadyToPaused,
                StateChange::PausedToRunning,
            ]
        );
    }

    #[test]
    fn backward_full_path() {
        assert_eq!(
            compute_state_changes(State::Running, State::Null),
            vec![
                StateChange::RunningToPaused,
                StateChange::PausedToReady,
                StateChange::ReadyToNull,
            ]
        );
    }

    #[test]
    fn same_state_is_empty() {
        assert!(compute_state_changes(State::Ready, State::Ready).is_empty());
    }

    #[test]
    fn error_state_has_no_path() {
        assert!(compute_state_changes(State::Error, State::Running).is_empty());
        assert!(compute_state_changes(State::Null, State::Error).is_empty());
    }

    #[test]
    fn single_step() {
        assert_eq!(
            compute_state_changes(State::Paused, State::Running),
            vec![StateChange::PausedToRunning]
        );
    }
}
