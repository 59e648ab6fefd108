//! Failover policy: generation penalties and model rotation driven by the
//! transcript's error history.

use tracing::warn;

use wtf_config::FailoverConfig;

use crate::transcript::Transcript;

/// Fixed two-model set with one active entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRoster {
    models: [String; 2],
    active: usize,
}

impl ModelRoster {
    pub fn new(models: [String; 2]) -> Self {
        Self { models, active: 0 }
    }

    pub fn active(&self) -> &str {
        &self.models[self.active]
    }

    pub fn models(&self) -> &[String; 2] {
        &self.models
    }

    /// Switch to the other model
    fn rotate(&mut self) -> &str {
        self.active = 1 - self.active;
        &self.models[self.active]
    }
}

/// Sampling penalties for one request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Penalties {
    pub frequency: f32,
    pub presence: f32,
}

/// What to do before the next model call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    pub penalties: Penalties,
    /// Switch to the other model
    pub rotate: bool,
    /// Trailing turns to drop
    pub pop: usize,
}

/// Decides penalties, rotation and tail pops.
///
/// The roster is only ever mutated here.
#[derive(Debug, Clone)]
pub struct FailoverPolicy {
    base: Penalties,
    escalated: Penalties,
}

impl Default for FailoverPolicy {
    fn default() -> Self {
        Self::from_config(&FailoverConfig::default())
    }
}

impl FailoverPolicy {
    pub fn from_config(config: &FailoverConfig) -> Self {
        Self {
            base: Penalties {
                frequency: config.base_frequency_penalty,
                presence: 0.0,
            },
            escalated: Penalties {
                frequency: config.escalated_frequency_penalty,
                presence: config.escalated_presence_penalty,
            },
        }
    }

    /// Decision for a transcript holding `errors` errored turns
    pub fn decide(&self, errors: usize) -> Decision {
        match errors {
            0 => Decision {
                penalties: self.base,
                rotate: false,
                pop: 0,
            },
            1 => Decision {
                penalties: self.escalated,
                rotate: false,
                pop: 0,
            },
            n => Decision {
                penalties: self.base,
                rotate: true,
                pop: n,
            },
        }
    }

    /// Apply the decision for the current transcript and return the penalties
    /// to use for the next call
    pub fn apply(&self, transcript: &mut Transcript, roster: &mut ModelRoster) -> Penalties {
        let decision = self.decide(transcript.error_count());

        if decision.rotate {
            let previous = roster.active().to_string();
            let popped = transcript.pop_tail(decision.pop);
            let next = roster.rotate();
            warn!(
                "◆ FAILOVER: {} -> {} ({} turns dropped)",
                previous,
                next,
                popped.len()
            );
        }

        decision.penalties
    }

    /// Throttled by the provider: move to the other model
    pub fn on_rate_limited(&self, roster: &mut ModelRoster) {
        let previous = roster.active().to_string();
        let next = roster.rotate();
        warn!("◆ RATE LIMITED ON {}: switching to {}", previous, next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster() -> ModelRoster {
        ModelRoster::new(["primary".to_string(), "backup".to_string()])
    }

    #[test]
    fn test_decide_baseline() {
        let decision = FailoverPolicy::default().decide(0);
        assert_eq!(decision.penalties.frequency, 0.5);
        assert_eq!(decision.penalties.presence, 0.0);
        assert!(!decision.rotate);
        assert_eq!(decision.pop, 0);
    }

    #[test]
    fn test_decide_single_error_escalates() {
        let decision = FailoverPolicy::default().decide(1);
        assert_eq!(decision.penalties.frequency, 1.8);
        assert_eq!(decision.penalties.presence, 0.6);
        assert!(!decision.rotate);
    }

    #[test]
    fn test_decide_repeated_errors_rotate_and_pop() {
        let decision = FailoverPolicy::default().decide(3);
        assert!(decision.rotate);
        assert_eq!(decision.pop, 3);
        assert_eq!(decision.penalties.frequency, 0.5);
    }

    #[test]
    fn test_roster_rotation_alternates() {
        let mut roster = roster();
        assert_eq!(roster.active(), "primary");
        FailoverPolicy::default().on_rate_limited(&mut roster);
        assert_eq!(roster.active(), "backup");
        FailoverPolicy::default().on_rate_limited(&mut roster);
        assert_eq!(roster.active(), "primary");
    }

    #[test]
    fn test_apply_without_errors_leaves_state() {
        let mut transcript = Transcript::seeded();
        let mut roster = roster();
        let penalties = FailoverPolicy::default().apply(&mut transcript, &mut roster);
        assert_eq!(penalties.frequency, 0.5);
        assert_eq!(transcript.len(), 1);
        assert_eq!(roster.active(), "primary");
    }
}
