//! Config surface consumed by the core (spec.md §6).

use std::time::Duration;

/// `N`/`F` and the timeout providers the client/peer state registries
/// read when arming timers, modeled on `context/tokio::Config` (the
/// teacher's per-deployment config struct).
#[derive(Debug, Clone)]
pub struct ReplicaConfig {
    pub n: usize,
    pub f: usize,
    pub request_timeout: Duration,
    pub prepare_timeout: Duration,
}

impl ReplicaConfig {
    pub fn new(n: usize, f: usize, request_timeout: Duration, prepare_timeout: Duration) -> Self {
        let config = Self {
            n,
            f,
            request_timeout,
            prepare_timeout,
        };
        config.validate();
        config
    }

    /// `N >= 2F+1`, and strictly `N > 2F` for MinBFT (spec.md §6).
    fn validate(&self) {
        assert!(
            self.n > 2 * self.f,
            "N={} must be strictly greater than 2F={}",
            self.n,
            2 * self.f
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_minimal_bft_deployment() {
        ReplicaConfig::new(4, 1, Duration::from_millis(100), Duration::from_millis(50));
    }

    #[test]
    #[should_panic]
    fn rejects_insufficient_replicas() {
        ReplicaConfig::new(2, 1, Duration::from_millis(100), Duration::from_millis(50));
    }
}
