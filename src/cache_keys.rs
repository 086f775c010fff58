//! Cache key namespace for metric summaries.
//!
//! All keys follow `metrics_<account>_<window>` where `<account>` is a
//! numeric tracking-account id or `all`, and `<window>` is a month count
//! from [`WINDOWS`] or `all`. Key construction and parsing live here so the
//! cache layer, the prewarm planner and the admin sweep cannot drift apart.

/// Namespace prefix shared by every stored summary key.
pub const METRICS_PREFIX: &str = "metrics_";

/// Valid window selectors, in months ("all" = unbounded).
pub const WINDOWS: &[&str] = &["1", "3", "6", "12", "all"];

/// Window used when a request carries an unknown selector.
pub const DEFAULT_WINDOW: &str = "12";

const ALL_ACCOUNTS: &str = "all";

/// Normalize a window selector. Anything outside [`WINDOWS`] falls back to
/// [`DEFAULT_WINDOW`].
pub fn sanitize_window(window: &str) -> &str {
    if WINDOWS.contains(&window) {
        window
    } else {
        DEFAULT_WINDOW
    }
}

/// Normalize an account selector. Only non-empty all-digit strings address a
/// single account; everything else means "all accounts".
pub fn sanitize_account(account: Option<&str>) -> Option<String> {
    match account {
        Some(id)
            if !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()) =>
        {
            Some(id.to_owned())
        },
        _ => None,
    }
}

/// Build the storage key for a sanitized `(account, window)` pair.
pub fn build_metrics_cache_key(
    account: Option<&str>,
    window: &str,
) -> String {
    format!(
        "{}{}_{}",
        METRICS_PREFIX,
        account.unwrap_or(ALL_ACCOUNTS),
        window
    )
}

/// Decode a storage key back into its `(account, window)` pair. Returns
/// `None` for keys outside the metrics namespace or with selectors that
/// could never have been produced by [`build_metrics_cache_key`].
pub fn parse_metrics_cache_key(
    key: &str,
) -> Option<(Option<String>, String)> {
    let rest = key.strip_prefix(METRICS_PREFIX)?;
    let (account_part, window_part) = rest.rsplit_once('_')?;

    if !WINDOWS.contains(&window_part) {
        return None;
    }

    let account = if account_part == ALL_ACCOUNTS {
        None
    } else if !account_part.is_empty()
        && account_part.chars().all(|c| c.is_ascii_digit())
    {
        Some(account_part.to_owned())
    } else {
        return None;
    };

    Some((account, window_part.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_sanitization_falls_back_to_default() {
        assert_eq!(sanitize_window("3"), "3");
        assert_eq!(sanitize_window("all"), "all");
        assert_eq!(sanitize_window("999"), "12");
        assert_eq!(sanitize_window(""), "12");
    }

    #[test]
    fn account_sanitization_requires_digits() {
        assert_eq!(sanitize_account(Some("4821")), Some("4821".to_owned()));
        assert_eq!(sanitize_account(Some("not-a-number")), None);
        assert_eq!(sanitize_account(Some("")), None);
        assert_eq!(sanitize_account(None), None);
    }

    #[test]
    fn keys_differ_per_selector_pair() {
        assert_eq!(build_metrics_cache_key(None, "3"), "metrics_all_3");
        assert_eq!(build_metrics_cache_key(None, "12"), "metrics_all_12");
        assert_eq!(
            build_metrics_cache_key(Some("4821"), "all"),
            "metrics_4821_all"
        );
    }

    #[test]
    fn parse_inverts_build() {
        let key = build_metrics_cache_key(Some("77"), "6");
        assert_eq!(
            parse_metrics_cache_key(&key),
            Some((Some("77".to_owned()), "6".to_owned()))
        );
        assert_eq!(
            parse_metrics_cache_key("metrics_all_12"),
            Some((None, "12".to_owned()))
        );
    }

    #[test]
    fn parse_rejects_foreign_or_malformed_keys() {
        assert_eq!(parse_metrics_cache_key("other_all_12"), None);
        assert_eq!(parse_metrics_cache_key("metrics_all_99"), None);
        assert_eq!(parse_metrics_cache_key("metrics_abc_12"), None);
        assert_eq!(parse_metrics_cache_key("metrics_"), None);
    }
}
