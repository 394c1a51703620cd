use dashmap::DashMap;
use std::time::{Duration, Instant};

use crate::config::AdmissionConfig;

#[derive(Clone)]
struct Window {
    count: u32,
    started_at: Instant,
}

/// Fixed-window per-client admission counters.
///
/// Shared across all concurrently handled requests; DashMap shards keep
/// contention local to a client key. When disabled, everything is admitted.
pub struct AdmissionGate {
    windows: DashMap<String, Window>,
    max_requests: u32,
    window: Duration,
    enabled: bool,
}

impl AdmissionGate {
    pub fn new(config: &AdmissionConfig) -> Self {
        Self {
            windows: DashMap::new(),
            max_requests: config.max_requests,
            window: Duration::from_secs(config.window_secs),
            enabled: config.enabled,
        }
    }

    /// Count this request against the client's current window. Returns
    /// false once the window budget is spent.
    pub fn admit(&self, client_key: &str) -> bool {
        if !self.enabled {
            return true;
        }

        let now = Instant::now();
        let mut entry = self
            .windows
            .entry(client_key.to_string())
            .or_insert(Window {
                count: 0,
                started_at: now,
            });

        if now.duration_since(entry.started_at) > self.window {
            entry.count = 0;
            entry.started_at = now;
        }

        entry.count += 1;
        entry.count <= self.max_requests
    }

    /// Drop windows that have been idle for more than twice the window
    /// duration. Hosts call this periodically to bound memory.
    pub fn prune(&self) {
        let now = Instant::now();
        self.windows
            .retain(|_, window| now.duration_since(window.started_at) <= self.window * 2);
    }

    pub fn tracked_clients(&self) -> usize {
        self.windows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max_requests: u32, window_secs: u64) -> AdmissionConfig {
        AdmissionConfig {
            enabled: true,
            max_requests,
            window_secs,
        }
    }

    #[test]
    fn test_admits_up_to_the_limit() {
        let gate = AdmissionGate::new(&config(3, 60));
        assert!(gate.admit("10.0.0.1"));
        assert!(gate.admit("10.0.0.1"));
        assert!(gate.admit("10.0.0.1"));
        assert!(!gate.admit("10.0.0.1"));
    }

    #[test]
    fn test_clients_are_counted_independently() {
        let gate = AdmissionGate::new(&config(1, 60));
        assert!(gate.admit("10.0.0.1"));
        assert!(gate.admit("10.0.0.2"));
        assert!(!gate.admit("10.0.0.1"));
    }

    #[test]
    fn test_window_resets() {
        let gate = AdmissionGate {
            windows: DashMap::new(),
            max_requests: 1,
            window: Duration::from_millis(30),
            enabled: true,
        };
        assert!(gate.admit("10.0.0.1"));
        assert!(!gate.admit("10.0.0.1"));
        std::thread::sleep(Duration::from_millis(40));
        assert!(gate.admit("10.0.0.1"));
    }

    #[test]
    fn test_disabled_gate_admits_everything() {
        let gate = AdmissionGate::new(&AdmissionConfig {
            enabled: false,
            max_requests: 1,
            window_secs: 60,
        });
        for _ in 0..10 {
            assert!(gate.admit("10.0.0.1"));
        }
    }

    #[test]
    fn test_prune_drops_stale_windows() {
        let gate = AdmissionGate {
            windows: DashMap::new(),
            max_requests: 10,
            window: Duration::from_millis(10),
            enabled: true,
        };
        gate.admit("10.0.0.1");
        assert_eq!(gate.tracked_clients(), 1);
        std::thread::sleep(Duration::from_millis(30));
        gate.prune();
        assert_eq!(gate.tracked_clients(), 0);
    }
}
