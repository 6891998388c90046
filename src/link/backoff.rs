use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct BackoffSettings {
    pub initial: Duration,
    pub max: Duration,
    pub multiplier: f64,
}

impl Default for BackoffSettings {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(30),
            max: Duration::from_secs(30),
            multiplier: 1.0,
        }
    }
}

/// Reconnect delay state. Grows by `multiplier` per failure, up to `max`,
/// and starts over after [`Backoff::reset`].
#[derive(Debug, Clone)]
pub struct Backoff {
    settings: BackoffSettings,
    next: Duration,
}

impl Backoff {
    pub fn new(settings: BackoffSettings) -> Self {
        let next = settings.initial.min(settings.max);
        Self { settings, next }
    }

    pub fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        let grown = delay.as_secs_f64() * self.settings.multiplier.max(1.0);
        self.next = Duration::try_from_secs_f64(grown)
            .unwrap_or(self.settings.max)
            .min(self.settings.max);
        delay
    }

    pub fn reset(&mut self) {
        self.next = self.settings.initial.min(self.settings.max);
    }
}
