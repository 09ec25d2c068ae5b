//! Bounded retry state for one unit of work.

/// What to do after a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Credentials expired and budget remains: refresh, then try again.
    RefreshAndRetry,
    /// Stop and mark the unit failed.
    GiveUp,
}

/// Attempts per unit: the first try plus one retry after a credential refresh.
pub const MAX_ATTEMPTS: u32 = 2;

/// Whether a fetch diagnostic means the credential material has expired.
pub fn is_authorization_expired(diagnostic: &str) -> bool {
    diagnostic.contains("403") || diagnostic.contains("Forbidden")
}

/// `pending -> attempt -> {completed | retrying | failed}` for one unit.
#[derive(Debug, Clone)]
pub struct RetryState {
    attempts: u32,
    max_attempts: u32,
    last_error: Option<String>,
}

impl Default for RetryState {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryState {
    pub fn new() -> Self {
        Self {
            attempts: 0,
            max_attempts: MAX_ATTEMPTS,
            last_error: None,
        }
    }

    /// Claims the next attempt. Returns false once the budget is spent.
    pub fn begin_attempt(&mut self) -> bool {
        if self.attempts >= self.max_attempts {
            return false;
        }
        self.attempts += 1;
        true
    }

    /// Records a failed attempt and decides whether to retry.
    pub fn record_failure(&mut self, diagnostic: impl Into<String>) -> RetryDecision {
        let diagnostic = diagnostic.into();
        let decision = if is_authorization_expired(&diagnostic) && !self.exhausted() {
            RetryDecision::RefreshAndRetry
        } else {
            RetryDecision::GiveUp
        };
        self.last_error = Some(diagnostic);
        decision
    }

    pub fn exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}
