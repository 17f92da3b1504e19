//! Secret resolution for the explorer
//!
//! Provides the chat API token with ENV → TOML priority.

use lear_common::config::TomlConfig;
use lear_common::{Error, Result};
use tracing::{info, warn};

/// Primary environment variable for the chat API token
pub const API_TOKEN_ENV: &str = "LEAR_AI_API_TOKEN";

/// Legacy variable name, still honoured
pub const LEGACY_API_TOKEN_ENV: &str = "AI_API_TOKEN";

/// Resolve the upstream chat API token
///
/// **Priority:** `LEAR_AI_API_TOKEN` → `AI_API_TOKEN` → TOML `[chat] api_token`
pub fn resolve_chat_api_token(toml_config: &TomlConfig) -> Result<String> {
    let candidates = [
        (
            "environment variable LEAR_AI_API_TOKEN",
            std::env::var(API_TOKEN_ENV).ok(),
        ),
        (
            "environment variable AI_API_TOKEN",
            std::env::var(LEGACY_API_TOKEN_ENV).ok(),
        ),
        ("TOML config", toml_config.chat.api_token.clone()),
    ];

    let mut found = candidates
        .into_iter()
        .filter_map(|(source, token)| token.filter(|t| is_valid_token(t)).map(|t| (source, t)));

    let Some((source, token)) = found.next() else {
        return Err(Error::Config(
            "Chat API token not configured. Please configure using one of:\n\
             1. Environment: LEAR_AI_API_TOKEN=your-token-here\n\
             2. TOML config: ~/.config/lear/lear.toml ([chat] api_token = \"your-token\")"
                .to_string(),
        ));
    };

    let shadowed: Vec<&str> = found.map(|(source, _)| source).collect();
    if !shadowed.is_empty() {
        warn!(
            "Chat API token also set in: {}. Using {} (highest priority).",
            shadowed.join(", "),
            source
        );
    }

    info!("Chat API token loaded from {}", source);
    Ok(token.trim().to_string())
}

/// Non-empty, non-whitespace
pub fn is_valid_token(token: &str) -> bool {
    !token.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        std::env::remove_var(API_TOKEN_ENV);
        std::env::remove_var(LEGACY_API_TOKEN_ENV);
    }

    fn toml_with_token(token: Option<&str>) -> TomlConfig {
        let mut config = TomlConfig::default();
        config.chat.api_token = token.map(str::to_string);
        config
    }

    #[test]
    fn test_is_valid_token() {
        assert!(is_valid_token("abc"));
        assert!(!is_valid_token(""));
        assert!(!is_valid_token("   "));
    }

    #[test]
    #[serial]
    fn test_env_takes_priority_over_toml() {
        clear_env();
        std::env::set_var(API_TOKEN_ENV, "from-env");

        let token = resolve_chat_api_token(&toml_with_token(Some("from-toml"))).unwrap();
        assert_eq!(token, "from-env");

        clear_env();
    }

    #[test]
    #[serial]
    fn test_legacy_env_is_honoured() {
        clear_env();
        std::env::set_var(LEGACY_API_TOKEN_ENV, "legacy");

        let token = resolve_chat_api_token(&toml_with_token(Some("from-toml"))).unwrap();
        assert_eq!(token, "legacy");

        clear_env();
    }

    #[test]
    #[serial]
    fn test_toml_fallback_and_blank_env_ignored() {
        clear_env();
        std::env::set_var(API_TOKEN_ENV, "  ");

        let token = resolve_chat_api_token(&toml_with_token(Some("from-toml"))).unwrap();
        assert_eq!(token, "from-toml");

        clear_env();
    }

    #[test]
    #[serial]
    fn test_missing_token_is_config_error() {
        clear_env();
        assert!(matches!(
            resolve_chat_api_token(&toml_with_token(None)),
            Err(Error::Config(_))
        ));
    }
}
