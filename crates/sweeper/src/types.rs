//! Common types shared across the engine: targets, configuration and the
//! outcome structures surfaced to callers.

use crate::errors::AutomationError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// One addressable resource the automation will act upon.
///
/// Identity is the trailing path segment of the canonical address; the
/// address itself is normalized (fragment and query stripped, exactly one
/// trailing slash). Immutable for the lifetime of an automation attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub id: String,
    pub canonical_url: Url,
}

impl Target {
    /// Parse and normalize a raw address into a [`Target`].
    pub fn parse(raw: &str) -> Result<Self, AutomationError> {
        let mut url = Url::parse(raw.trim())
            .map_err(|e| AutomationError::InvalidTarget(format!("{raw:?}: {e}")))?;

        if url.host_str().is_none() {
            return Err(AutomationError::InvalidTarget(format!(
                "{raw:?} has no host"
            )));
        }

        url.set_fragment(None);
        url.set_query(None);

        let id = url
            .path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
            .map(str::to_string)
            .ok_or_else(|| {
                AutomationError::InvalidTarget(format!("{raw:?} has no resource segment"))
            })?;

        if !url.path().ends_with('/') {
            let normalized = format!("{}/", url.path());
            url.set_path(&normalized);
        }

        Ok(Self {
            id,
            canonical_url: url,
        })
    }

    /// Host of the canonical address. Always present after [`Target::parse`].
    pub fn host(&self) -> &str {
        self.canonical_url.host_str().unwrap_or_default()
    }

    /// Whether `location` still addresses this target (fragment and query
    /// are ignored, trailing slashes are insignificant).
    pub fn matches_location(&self, location: &str) -> bool {
        let canonical = self.canonical_url.as_str().trim_end_matches('/');
        let location = location
            .split(['#', '?'])
            .next()
            .unwrap_or(location)
            .trim_end_matches('/');
        location == canonical
    }
}

/// Engine configuration, supplied once per batch and never mutated mid-run.
///
/// All waits in the engine derive from these values; nothing is hard-coded,
/// so tests can run with near-zero intervals.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Deadline for each locate/verify operation, in milliseconds.
    pub step_timeout_ms: u64,
    /// Poll interval used by locate/verify loops, in milliseconds.
    pub poll_interval_ms: u64,
    /// Additional attempts per retryable step.
    pub max_retries: u32,
    /// Fixed delay between attempts of the same step, in milliseconds.
    pub retry_delay_ms: u64,
    /// Base pause between targets, in milliseconds.
    pub inter_target_delay_ms: u64,
    /// Uniform random jitter added to the inter-target pause: `[min, max]` ms.
    pub jitter_range_ms: (u64, u64),
    /// Perform discovery but withhold every mutating activation.
    pub dry_run: bool,
    /// Cap on destructive actions per rolling minute, consulted before each
    /// target. `None` disables the gate.
    pub rate_limit_per_minute: Option<u32>,
    /// Shortened lookup deadline used while in dry-run, in milliseconds.
    /// No asynchronous re-render is awaited there, so long waits only slow
    /// the simulation down.
    pub skip_probe_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            step_timeout_ms: 8_000,
            poll_interval_ms: 100,
            max_retries: 2,
            retry_delay_ms: 350,
            inter_target_delay_ms: 1_200,
            jitter_range_ms: (0, 800),
            dry_run: false,
            rate_limit_per_minute: None,
            skip_probe_timeout_ms: 300,
        }
    }
}

impl EngineConfig {
    pub fn step_timeout(&self) -> Duration {
        Duration::from_millis(self.step_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn inter_target_delay(&self) -> Duration {
        Duration::from_millis(self.inter_target_delay_ms)
    }

    pub fn skip_probe_timeout(&self) -> Duration {
        Duration::from_millis(self.skip_probe_timeout_ms)
    }

    /// Lookup deadline for the given step mode.
    pub fn lookup_timeout(&self, skip: bool) -> Duration {
        if skip {
            self.skip_probe_timeout().min(self.step_timeout())
        } else {
            self.step_timeout()
        }
    }
}

/// Result of one logical step within a target's pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    pub name: String,
    pub ok: bool,
    /// 1-based number of the attempt that produced this outcome.
    pub attempt: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason_code: Option<String>,
}

/// Terminal result of the per-target state machine. Immutable once produced.
#[derive(Debug, Clone, Serialize)]
pub struct TargetOutcome {
    /// The raw address exactly as the caller supplied it.
    pub input: String,
    /// Parsed form; absent when the address was unparseable (in which case
    /// the state machine was never invoked).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<Target>,
    pub ok: bool,
    /// Step the run ended on: the failing step, or `verify` on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason_code: Option<String>,
    pub attempt: u32,
    /// Every step attempted, in order, with its evidence.
    pub evidence: Vec<StepOutcome>,
}

/// Result of a whole batch. `results` preserves input target order.
#[derive(Debug, Clone, Serialize)]
pub struct BatchOutcome {
    pub attempted: usize,
    pub succeeded: usize,
    pub cancelled: bool,
    pub results: Vec<TargetOutcome>,
}

/// Lightweight non-mutating discovery check for a single target.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ProbeReport {
    pub header_found: bool,
    pub destructive_control_found: bool,
    pub confirmation_found: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_strips_query_and_fragment() {
        let target = Target::parse("https://chat.example.com/c/abc123?src=sidebar#top").unwrap();
        assert_eq!(target.id, "abc123");
        assert_eq!(
            target.canonical_url.as_str(),
            "https://chat.example.com/c/abc123/"
        );
    }

    #[test]
    fn parse_normalizes_trailing_slash() {
        let a = Target::parse("https://chat.example.com/c/abc123").unwrap();
        let b = Target::parse("https://chat.example.com/c/abc123/").unwrap();
        assert_eq!(a.canonical_url, b.canonical_url);
    }

    #[test]
    fn parse_rejects_garbage_and_hostless() {
        assert!(Target::parse("not a url").is_err());
        assert!(Target::parse("data:text/plain,hello").is_err());
        assert!(Target::parse("https://chat.example.com/").is_err());
    }

    #[test]
    fn location_match_ignores_query_and_slash() {
        let target = Target::parse("https://chat.example.com/c/abc123/").unwrap();
        assert!(target.matches_location("https://chat.example.com/c/abc123"));
        assert!(target.matches_location("https://chat.example.com/c/abc123/?view=full"));
        assert!(!target.matches_location("https://chat.example.com/c/other"));
        assert!(!target.matches_location("https://chat.example.com/"));
    }

    #[test]
    fn skip_mode_shortens_lookup_deadline() {
        let config = EngineConfig {
            step_timeout_ms: 8_000,
            skip_probe_timeout_ms: 300,
            ..Default::default()
        };
        assert_eq!(config.lookup_timeout(false), Duration::from_millis(8_000));
        assert_eq!(config.lookup_timeout(true), Duration::from_millis(300));
    }
}
