use std::fmt::Debug;
use std::time::Duration;

/// What happened to the game that was just handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Scraped { links: usize },
    Failed,
}

/// Decides how long the worker waits before taking the next game.
pub trait DelayPolicy: Debug + Send + Sync {
    fn delay_after(&self, outcome: Outcome) -> Duration;
}

/// Waits the same amount after every game, whatever the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstantDelay(pub Duration);

impl DelayPolicy for ConstantDelay {
    fn delay_after(&self, _outcome: Outcome) -> Duration {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_delay_ignores_outcome() {
        let policy = ConstantDelay(Duration::from_millis(1500));
        assert_eq!(
            policy.delay_after(Outcome::Scraped { links: 3 }),
            Duration::from_millis(1500)
        );
        assert_eq!(policy.delay_after(Outcome::Failed), Duration::from_millis(1500));
    }
}
