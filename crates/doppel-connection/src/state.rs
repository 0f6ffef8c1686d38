// SPDX-FileCopyrightText: 2026 Doppel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Online / Degraded / Offline machine, free of I/O.

use chrono::{DateTime, Utc};

use doppel_core::ConnectionState;

/// One state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: ConnectionState,
    pub to: ConnectionState,
}

/// Connectivity of a single channel.
///
/// Starts `Offline` at epoch 0. A success from `Offline` or `Degraded`
/// goes `Online` and opens a new epoch. A failure while `Online` goes
/// `Degraded`; `failure_threshold` further consecutive failures while
/// `Degraded` go `Offline`. Every other input leaves the state alone.
#[derive(Debug, Clone)]
pub struct ConnectionMachine {
    state: ConnectionState,
    failure_threshold: u32,
    degraded_failures: u32,
    epoch: u64,
    last_transition_at: Option<DateTime<Utc>>,
}

impl ConnectionMachine {
    pub fn new(failure_threshold: u32) -> Self {
        Self {
            state: ConnectionState::Offline,
            failure_threshold: failure_threshold.max(1),
            degraded_failures: 0,
            epoch: 0,
            last_transition_at: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn last_transition_at(&self) -> Option<DateTime<Utc>> {
        self.last_transition_at
    }

    /// Applies a successful probe (or a reachable signal).
    pub fn on_success(&mut self) -> Option<Transition> {
        self.degraded_failures = 0;
        match self.state {
            ConnectionState::Online => None,
            ConnectionState::Degraded | ConnectionState::Offline => {
                self.epoch += 1;
                Some(self.move_to(ConnectionState::Online))
            }
        }
    }

    /// Applies a failed, timed-out or degraded probe.
    pub fn on_failure(&mut self) -> Option<Transition> {
        match self.state {
            ConnectionState::Online => {
                self.degraded_failures = 0;
                Some(self.move_to(ConnectionState::Degraded))
            }
            ConnectionState::Degraded => {
                self.degraded_failures += 1;
                if self.degraded_failures >= self.failure_threshold {
                    self.degraded_failures = 0;
                    Some(self.move_to(ConnectionState::Offline))
                } else {
                    None
                }
            }
            ConnectionState::Offline => None,
        }
    }

    /// Drives the machine straight to `Offline`, passing through `Degraded`.
    pub fn force_offline(&mut self) -> Vec<Transition> {
        self.degraded_failures = 0;
        let mut transitions = Vec::with_capacity(2);
        if self.state == ConnectionState::Online {
            transitions.push(self.move_to(ConnectionState::Degraded));
        }
        if self.state == ConnectionState::Degraded {
            transitions.push(self.move_to(ConnectionState::Offline));
        }
        transitions
    }

    fn move_to(&mut self, to: ConnectionState) -> Transition {
        let from = self.state;
        self.state = to;
        self.last_transition_at = Some(Utc::now());
        Transition { from, to }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ConnectionState::*;

    fn t(from: ConnectionState, to: ConnectionState) -> Option<Transition> {
        Some(Transition { from, to })
    }

    #[test]
    fn starts_offline_at_epoch_zero() {
        let m = ConnectionMachine::new(3);
        assert_eq!(m.state(), Offline);
        assert_eq!(m.epoch(), 0);
        assert!(m.last_transition_at().is_none());
    }

    #[test]
    fn success_from_offline_opens_epoch() {
        let mut m = ConnectionMachine::new(3);
        assert_eq!(m.on_success(), t(Offline, Online));
        assert_eq!(m.epoch(), 1);
        assert_eq!(m.on_success(), None);
        assert_eq!(m.epoch(), 1);
    }

    #[test]
    fn failure_while_offline_is_ignored() {
        let mut m = ConnectionMachine::new(3);
        assert_eq!(m.on_failure(), None);
        assert_eq!(m.state(), Offline);
    }

    #[test]
    fn threshold_counts_failures_after_degrading() {
        let mut m = ConnectionMachine::new(3);
        m.on_success();
        assert_eq!(m.on_failure(), t(Online, Degraded));
        assert_eq!(m.on_failure(), None);
        assert_eq!(m.on_failure(), None);
        assert_eq!(m.on_failure(), t(Degraded, Offline));
    }

    #[test]
    fn recovery_while_degraded_resets_the_count() {
        let mut m = ConnectionMachine::new(2);
        m.on_success();
        m.on_failure();
        m.on_failure();
        assert_eq!(m.on_success(), t(Degraded, Online));
        assert_eq!(m.epoch(), 2);

        assert_eq!(m.on_failure(), t(Online, Degraded));
        assert_eq!(m.on_failure(), None);
        assert_eq!(m.on_failure(), t(Degraded, Offline));
    }

    #[test]
    fn forced_disconnect_passes_through_degraded() {
        let mut m = ConnectionMachine::new(3);
        m.on_success();
        assert_eq!(
            m.force_offline(),
            vec![
                Transition { from: Online, to: Degraded },
                Transition { from: Degraded, to: Offline },
            ]
        );
        assert!(m.force_offline().is_empty());
    }
}
