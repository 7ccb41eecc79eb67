//! # Clock-Sync Check
//!
//! Before the scheduler commits to a timeline built entirely out of wall-clock
//! waits (stage gates, the tier 2 window, reconciliation), it needs assurance
//! that the local clock it is gating on actually agrees with real time. A
//! drifted local clock would silently shift every phase of the weekend plan.
//!
//! Queries a short, ordered list of NTP servers and keeps the first one that
//! answers inside `timeout`. Unlike the other checks in this crate this one
//! performs network I/O, so it is async and lives behind [`RiskCheck`]'s
//! ordinary `check` contract via [`ClockSyncCheck::verify`] instead.

use derive_more::{Constructor, Display};
use rsntp::AsyncSntpClient;
use std::time::Duration;
use thiserror::Error;

/// Priority order mirrors the original verifier: NIST's primary clock first,
/// a secondary NIST host, then the public pool as a last resort.
pub const NTP_SERVERS: &[&str] = &["time.nist.gov", "time-a-g.nist.gov", "pool.ntp.org"];

#[derive(Debug, Clone, Copy, PartialEq, Display, Error)]
pub enum ClockSyncError {
    /// Every configured server was unreachable or timed out. Treated as a
    /// verification failure, not an "assume synced" fallback — an execution
    /// run must not proceed without a confirmed answer from at least one
    /// server.
    #[display("all {tried} NTP servers failed to respond")]
    AllServersFailed { tried: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Constructor)]
pub struct ClockSyncResult {
    pub is_synced: bool,
    pub drift_ms: f64,
    pub threshold_ms: f64,
    /// Index into [`NTP_SERVERS`] of the server that answered.
    pub server_index: usize,
}

#[derive(Debug, Clone, Copy, Constructor)]
pub struct ClockSyncCheck {
    pub threshold_ms: f64,
    pub query_timeout: Duration,
}

impl Default for ClockSyncCheck {
    fn default() -> Self {
        Self {
            threshold_ms: 50.0,
            query_timeout: Duration::from_secs(5),
        }
    }
}

impl ClockSyncCheck {
    /// Tries each server in [`NTP_SERVERS`] in order, returning the first
    /// successful measurement. Fails only if none of them respond within
    /// `query_timeout`.
    pub async fn verify(&self) -> Result<ClockSyncResult, ClockSyncError> {
        let client = AsyncSntpClient::new();

        for (index, server) in NTP_SERVERS.iter().enumerate() {
            let attempt = tokio::time::timeout(self.query_timeout, client.synchronize(*server)).await;
            let Ok(Ok(result)) = attempt else {
                tracing::warn!(server = *server, "NTP query failed or timed out");
                continue;
            };

            let drift_ms = (result.clock_offset().as_secs_f64() * 1000.0).abs();
            let is_synced = drift_ms <= self.threshold_ms;
            if !is_synced {
                tracing::warn!(server = *server, drift_ms, threshold_ms = self.threshold_ms, "clock drift exceeds threshold");
            }
            return Ok(ClockSyncResult {
                is_synced,
                drift_ms,
                threshold_ms: self.threshold_ms,
                server_index: index,
            });
        }

        Err(ClockSyncError::AllServersFailed { tried: NTP_SERVERS.len() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_threshold_matches_documented_value() {
        let check = ClockSyncCheck::default();
        assert_eq!(check.threshold_ms, 50.0);
    }

    #[test]
    fn ntp_server_priority_order_is_nist_first() {
        assert_eq!(NTP_SERVERS[0], "time.nist.gov");
        assert_eq!(NTP_SERVERS.last(), Some(&"pool.ntp.org"));
    }

    #[test]
    fn result_carries_drift_against_threshold() {
        let result = ClockSyncResult::new(false, 120.0, 50.0, 1);
        assert!(!result.is_synced);
        assert_eq!(result.server_index, 1);
    }
}
