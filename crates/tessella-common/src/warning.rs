//! Renderer warnings routed through `tracing`.
//!
//! Provides deduplication to avoid spamming the same warning once per object.
//! Used by the stylesheet compiler and the cascade to report unsupported
//! attributes and values that could not be converted.

use std::collections::HashSet;

use parking_lot::Mutex;

/// Global set of warnings we've already emitted (to deduplicate)
static WARNED: Mutex<Option<HashSet<String>>> = Mutex::new(None);

/// Warn about an unsupported feature (emits once per unique message)
///
/// Returns `true` when the warning was emitted, `false` when it was a duplicate.
///
/// # Example
/// ```ignore
/// warn_once("MapCSS", "unsupported attribute 'dashes'");
/// ```
pub fn warn_once(component: &str, message: &str) -> bool {
    let key = format!("[{component}] {message}");
    let should_emit = WARNED.lock().get_or_insert_with(HashSet::new).insert(key);

    if should_emit {
        tracing::warn!(component, "{message}");
    }
    should_emit
}

/// Clear all recorded warnings (call after a stylesheet reload)
pub fn clear_warnings() {
    if let Some(set) = WARNED.lock().as_mut() {
        set.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warn_once_deduplicates() {
        let message = "test_warn_once_deduplicates unique message";
        assert!(warn_once("Test", message));
        assert!(!warn_once("Test", message));
        assert!(warn_once("Other", message));
    }
}
