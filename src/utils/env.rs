/// Get environment variable with FAKTURO_ prefix, falling back to the
/// unprefixed version.
///
/// Checks `FAKTURO_{key}` first, then `{key}`, so deployment-specific
/// overrides can coexist with conventional names (`PORT`, `REDIS_URL`, ...).
pub fn get_env_with_prefix(key: &str) -> Option<String> {
    std::env::var(format!("FAKTURO_{}", key))
        .or_else(|_| std::env::var(key))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixed_wins_over_plain() {
        std::env::set_var("FAKTURO_SAMPLE_VAR", "prefixed");
        std::env::set_var("SAMPLE_VAR", "plain");
        assert_eq!(get_env_with_prefix("SAMPLE_VAR"), Some("prefixed".to_string()));
        std::env::remove_var("FAKTURO_SAMPLE_VAR");
        std::env::remove_var("SAMPLE_VAR");
    }

    #[test]
    fn test_plain_fallback() {
        std::env::set_var("FALLBACK_SAMPLE", "plain");
        assert_eq!(get_env_with_prefix("FALLBACK_SAMPLE"), Some("plain".to_string()));
        std::env::remove_var("FALLBACK_SAMPLE");
    }

    #[test]
    fn test_missing_variable() {
        assert_eq!(get_env_with_prefix("DOES_NOT_EXIST_EVER"), None);
    }
}
