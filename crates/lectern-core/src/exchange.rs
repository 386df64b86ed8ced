use std::fmt;
use std::time::Instant;

use uuid::Uuid;

/// Lifecycle of a single question/answer exchange.
///
/// ```text
/// Received -> Validated -> Streaming -> Completed
///                 |            |
///                 +--> Failed <+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangePhase {
    Received,
    Validated,
    Streaming,
    Completed,
    Failed,
}

impl ExchangePhase {
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Received, Self::Validated)
                | (Self::Validated, Self::Streaming | Self::Failed)
                | (Self::Streaming, Self::Completed | Self::Failed)
        )
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Validated => "validated",
            Self::Streaming => "streaming",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ExchangePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExchangeError {
    #[error("illegal exchange transition: {from} -> {to}")]
    IllegalTransition {
        from: ExchangePhase,
        to: ExchangePhase,
    },
}

/// Tracks one exchange through its phases and logs each transition.
#[derive(Debug)]
pub struct Exchange {
    id: Uuid,
    phase: ExchangePhase,
    fragments: usize,
    started: Instant,
}

impl Default for Exchange {
    fn default() -> Self {
        Self::new()
    }
}

impl Exchange {
    #[must_use]
    pub fn new() -> Self {
        let exchange = Self {
            id: Uuid::new_v4(),
            phase: ExchangePhase::Received,
            fragments: 0,
            started: Instant::now(),
        };
        tracing::debug!(exchange = %exchange.id, phase = %exchange.phase, "exchange started");
        exchange
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn phase(&self) -> ExchangePhase {
        self.phase
    }

    #[must_use]
    pub fn fragments(&self) -> usize {
        self.fragments
    }

    /// Move to `next`, rejecting any transition not in the lifecycle.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::IllegalTransition`] and leaves the phase
    /// unchanged if `next` is not reachable from the current phase.
    pub fn advance(&mut self, next: ExchangePhase) -> Result<(), ExchangeError> {
        if !self.phase.can_transition_to(next) {
            return Err(ExchangeError::IllegalTransition {
                from: self.phase,
                to: next,
            });
        }
        let from = self.phase;
        self.phase = next;

        if next.is_terminal() {
            #[allow(clippy::cast_possible_truncation)]
            let elapsed_ms = self.started.elapsed().as_millis() as u64;
            tracing::info!(
                exchange = %self.id,
                %from,
                to = %next,
                fragments = self.fragments,
                elapsed_ms,
                "exchange finished"
            );
        } else {
            tracing::debug!(exchange = %self.id, %from, to = %next, "exchange transition");
        }
        Ok(())
    }

    pub(crate) fn record_fragment(&mut self) {
        self.fragments += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use ExchangePhase::{Completed, Failed, Received, Streaming, Validated};

    const ALL: [ExchangePhase; 5] = [Received, Validated, Streaming, Completed, Failed];

    #[test]
    fn happy_path() {
        let mut ex = Exchange::new();
        ex.advance(Validated).unwrap();
        ex.advance(Streaming).unwrap();
        ex.advance(Completed).unwrap();
        assert_eq!(ex.phase(), Completed);
    }

    #[test]
    fn failure_from_validated_and_streaming() {
        let mut ex = Exchange::new();
        ex.advance(Validated).unwrap();
        ex.advance(Failed).unwrap();
        assert!(ex.phase().is_terminal());

        let mut ex = Exchange::new();
        ex.advance(Validated).unwrap();
        ex.advance(Streaming).unwrap();
        ex.advance(Failed).unwrap();
        assert_eq!(ex.phase(), Failed);
    }

    #[test]
    fn exactly_five_legal_transitions() {
        let legal: Vec<_> = ALL
            .iter()
            .flat_map(|&a| ALL.iter().map(move |&b| (a, b)))
            .filter(|&(a, b)| a.can_transition_to(b))
            .collect();
        assert_eq!(
            legal,
            vec![
                (Received, Validated),
                (Validated, Streaming),
                (Validated, Failed),
                (Streaming, Completed),
                (Streaming, Failed),
            ]
        );
    }

    #[test]
    fn illegal_transition_rejected_and_phase_kept() {
        let mut ex = Exchange::new();
        let err = ex.advance(Streaming).unwrap_err();
        assert_eq!(
            err,
            ExchangeError::IllegalTransition {
                from: Received,
                to: Streaming
            }
        );
        assert_eq!(ex.phase(), Received);
        assert_eq!(
            err.to_string(),
            "illegal exchange transition: received -> streaming"
        );
    }

    #[test]
    fn received_cannot_fail_directly() {
        let mut ex = Exchange::new();
        assert!(ex.advance(Failed).is_err());
    }

    #[test]
    fn terminal_phases_are_final() {
        for terminal in [Completed, Failed] {
            for next in ALL {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn fragment_counter() {
        let mut ex = Exchange::new();
        ex.record_fragment();
        ex.record_fragment();
        assert_eq!(ex.fragments(), 2);
    }
}
