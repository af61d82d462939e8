//! Correlation ID generation and the thread-local "current correlation"
//! that `ResolutionEngine` attaches to every event it emits within a scope.

use std::cell::RefCell;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::Utc;
use rand::Rng;
use sha2::{Digest, Sha256};

thread_local! {
    static CURRENT_CORRELATION: RefCell<Option<String>> = RefCell::new(None);
}

const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

pub fn random(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

pub fn time_based() -> String {
    let ms = Utc::now().timestamp_millis();
    format!("{ms}_{}", random(8))
}

/// Deterministic for a given context regardless of key order.
pub fn deterministic(context: &[(&str, &str)]) -> String {
    let mut sorted: Vec<&(&str, &str)> = context.iter().collect();
    sorted.sort_by_key(|(k, _)| *k);
    let mut hasher = Sha256::new();
    for (key, value) in sorted {
        hasher.update(key.as_bytes());
        hasher.update(b"=");
        hasher.update(value.as_bytes());
        hasher.update(b";");
    }
    let digest = hasher.finalize();
    URL_SAFE_NO_PAD.encode(digest).chars().take(16).collect()
}

pub fn set_current(correlation_id: impl Into<String>) {
    CURRENT_CORRELATION.with(|cell| *cell.borrow_mut() = Some(correlation_id.into()));
}

pub fn current() -> Option<String> {
    CURRENT_CORRELATION.with(|cell| cell.borrow().clone())
}

pub fn clear_current() {
    CURRENT_CORRELATION.with(|cell| *cell.borrow_mut() = None);
}

/// RAII guard clearing the thread-local correlation on scope exit, so a
/// forgotten `clear_current()` can't leak one request's correlation into
/// the next on the same worker thread.
#[must_use]
pub struct CorrelationScope;

impl CorrelationScope {
    pub fn enter(correlation_id: impl Into<String>) -> Self {
        set_current(correlation_id);
        Self
    }
}

impl Drop for CorrelationScope {
    fn drop(&mut self) {
        clear_current();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_ignores_key_order() {
        let a = deterministic(&[("selector", "home_team_name"), ("context", "production")]);
        let b = deterministic(&[("context", "production"), ("selector", "home_team_name")]);
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn scope_clears_on_drop() {
        {
            let _scope = CorrelationScope::enter("corr-123");
            assert_eq!(current().as_deref(), Some("corr-123"));
        }
        assert_eq!(current(), None);
    }
}
