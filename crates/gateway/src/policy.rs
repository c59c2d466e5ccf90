//! Policy & rate limiter (§4.7, §5 "Rate limiting").

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use regex::RegexSet;
use uag_domain::config::PolicyConfig;
use uag_protocol::ErrorCode;

#[derive(Debug, thiserror::Error)]
#[error("{code}: {message}")]
pub struct PolicyError {
    pub code: ErrorCode,
    pub message: String,
}

impl PolicyError {
    fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Validates a session's `brainUrl` against scheme and allow-list rules.
pub struct BrainUrlPolicy {
    allow_insecure_ws: bool,
    allow_list: Option<RegexSet>,
}

impl BrainUrlPolicy {
    pub fn new(config: &PolicyConfig) -> Result<Self, regex::Error> {
        let allow_list = if config.brain_url_allowlist.is_empty() {
            None
        } else {
            Some(RegexSet::new(&config.brain_url_allowlist)?)
        };
        Ok(Self {
            allow_insecure_ws: config.allow_insecure_ws,
            allow_list,
        })
    }

    pub fn validate(&self, url: &str) -> Result<(), PolicyError> {
        let scheme_ok = if url.starts_with("wss://") {
            true
        } else if url.starts_with("ws://") {
            self.allow_insecure_ws
        } else {
            false
        };
        if !scheme_ok {
            return Err(PolicyError::new(
                ErrorCode::InvalidArgument,
                format!("unsupported or disallowed scheme in brain url: {url}"),
            ));
        }

        if let Some(allow_list) = &self.allow_list {
            if !allow_list.is_match(url) {
                return Err(PolicyError::new(
                    ErrorCode::PolicyDenied,
                    "brain url does not match the configured allow-list",
                ));
            }
        }
        Ok(())
    }
}

/// Enforces the configured payload size cap (§4.7).
pub fn check_payload_size(raw: &str, cap_bytes: usize) -> Result<(), PolicyError> {
    if raw.len() > cap_bytes {
        return Err(PolicyError::new(
            ErrorCode::InvalidArgument,
            format!("payload of {} bytes exceeds cap of {cap_bytes}", raw.len()),
        ));
    }
    Ok(())
}

/// Validates a `can_use_tool` decision before it's echoed back (§4.7).
pub fn validate_tool_decision(behavior: &str, updated_input: Option<&serde_json::Value>) -> Result<(), PolicyError> {
    if behavior != "allow" && behavior != "deny" {
        return Err(PolicyError::new(
            ErrorCode::InvalidArgument,
            format!("can_use_tool.behavior must be \"allow\" or \"deny\", got {behavior:?}"),
        ));
    }
    if let Some(input) = updated_input {
        if !input.is_null() && !input.is_object() {
            return Err(PolicyError::new(
                ErrorCode::InvalidArgument,
                "can_use_tool.updatedInput must be an object",
            ));
        }
    }
    Ok(())
}

/// Per-session sliding-window request quota (§5 "Rate limiting"). Limiter
/// state for a session is evicted lazily when the session is removed from
/// the registry — this type has no background sweeper of its own.
pub struct RateLimiter {
    window: Duration,
    limit: u32,
    sessions: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            window,
            limit,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Record one admission attempt for `session_id`. Returns `Ok(())` if
    /// under quota, `Err` if the sliding window is full.
    pub fn check(&self, session_id: &str) -> Result<(), PolicyError> {
        let now = Instant::now();
        let mut sessions = self.sessions.lock();
        let window = self.window;
        let entry = sessions.entry(session_id.to_owned()).or_default();
        while let Some(front) = entry.front() {
            if now.duration_since(*front) > window {
                entry.pop_front();
            } else {
                break;
            }
        }
        if entry.len() as u32 >= self.limit {
            return Err(PolicyError::new(
                ErrorCode::RateLimited,
                format!("rate limit of {} requests per {:?} exceeded", self.limit, self.window),
            ));
        }
        entry.push_back(now);
        Ok(())
    }

    pub fn evict(&self, session_id: &str) {
        self.sessions.lock().remove(session_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wss_is_always_accepted() {
        let policy = BrainUrlPolicy::new(&PolicyConfig::default()).unwrap();
        assert!(policy.validate("wss://example.com/relay").is_ok());
    }

    #[test]
    fn ws_requires_opt_in() {
        let mut config = PolicyConfig::default();
        config.allow_insecure_ws = false;
        let policy = BrainUrlPolicy::new(&config).unwrap();
        assert!(policy.validate("ws://example.com/relay").is_err());

        config.allow_insecure_ws = true;
        let policy = BrainUrlPolicy::new(&config).unwrap();
        assert!(policy.validate("ws://example.com/relay").is_ok());
    }

    #[test]
    fn other_schemes_are_rejected() {
        let policy = BrainUrlPolicy::new(&PolicyConfig::default()).unwrap();
        let err = policy.validate("http://example.com").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidArgument);
    }

    #[test]
    fn allow_list_must_match() {
        let mut config = PolicyConfig::default();
        config.brain_url_allowlist = vec!["^wss://trusted\\.example\\.com/.*$".into()];
        let policy = BrainUrlPolicy::new(&config).unwrap();
        assert!(policy.validate("wss://trusted.example.com/relay").is_ok());
        let err = policy.validate("wss://untrusted.example.com/relay").unwrap_err();
        assert_eq!(err.code, ErrorCode::PolicyDenied);
    }

    #[test]
    fn tool_decision_requires_allow_or_deny() {
        assert!(validate_tool_decision("allow", None).is_ok());
        assert!(validate_tool_decision("maybe", None).is_err());
    }

    #[test]
    fn tool_decision_updated_input_must_be_object() {
        assert!(validate_tool_decision("allow", Some(&serde_json::json!({"a":1}))).is_ok());
        assert!(validate_tool_decision("allow", Some(&serde_json::json!([1, 2]))).is_err());
    }

    #[test]
    fn payload_cap_is_enforced() {
        assert!(check_payload_size("short", 100).is_ok());
        assert!(check_payload_size(&"x".repeat(200), 100).is_err());
    }

    #[test]
    fn rate_limiter_admits_at_most_n_per_window() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        assert!(limiter.check("s1").is_ok());
        assert!(limiter.check("s1").is_ok());
        assert!(limiter.check("s1").is_ok());
        assert!(limiter.check("s1").is_err());
        // A different session has its own independent window.
        assert!(limiter.check("s2").is_ok());
    }
}
