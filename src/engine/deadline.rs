//! Bounded waits that accept any timeout

use std::time::{Duration, Instant};

/// Longest single wait when the timeout is too large to have a deadline
const WAIT_SLICE: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy)]
pub(crate) struct Deadline(Option<Instant>);

impl Deadline {
    /// `timeout` from now; a timeout past the end of `Instant` never expires
    pub(crate) fn after(timeout: Duration) -> Self {
        Self(Instant::now().checked_add(timeout))
    }

    /// How long to wait before checking again, `None` once expired
    pub(crate) fn next_wait(&self) -> Option<Duration> {
        match self.0 {
            Some(at) => at.checked_duration_since(Instant::now()).filter(|d| !d.is_zero()),
            None => Some(WAIT_SLICE),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_timeout_is_expired() {
        assert_eq!(Deadline::after(Duration::ZERO).next_wait(), None);
    }

    #[test]
    fn test_huge_timeout_waits_in_slices() {
        let deadline = Deadline::after(Duration::MAX);
        assert_eq!(deadline.next_wait(), Some(WAIT_SLICE));
    }

    #[test]
    fn test_wait_never_exceeds_timeout() {
        let wait = Deadline::after(Duration::from_secs(5)).next_wait().unwrap();
        assert!(wait <= Duration::from_secs(5));
        assert!(wait > Duration::ZERO);
    }
}
