//! Environment overrides live in their own test binary so they cannot leak
//! into tests that read the defaults.

use std::env;
use std::io::Write;
use std::time::Duration;

use keystash_cache::CacheBackendKind;
use keystash_cli::config::loader::load_config;

#[test]
fn test_environment_overrides_file() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    file.write_all(
        br#"
[auth]
secret_key = "file-provided-application-secret"

[auth.oauth]
access_token_lifetime = "30m"
"#,
    )
    .unwrap();

    // SAFETY: this is the only test in this binary.
    unsafe {
        env::set_var("KEYSTASH__CACHE__BACKEND", "redis");
        env::set_var("KEYSTASH__AUTH__SECRET_KEY", "environment-application-secret");
        env::set_var("KEYSTASH__AUTH__OAUTH__ACCESS_TOKEN_LIFETIME", "2h");
        env::set_var("KEYSTASH__AUTH__OAUTH__REFRESH_TOKENS_ENABLED", "false");
    }

    let cfg = load_config(file.path().to_str()).unwrap();

    unsafe {
        env::remove_var("KEYSTASH__CACHE__BACKEND");
        env::remove_var("KEYSTASH__AUTH__SECRET_KEY");
        env::remove_var("KEYSTASH__AUTH__OAUTH__ACCESS_TOKEN_LIFETIME");
        env::remove_var("KEYSTASH__AUTH__OAUTH__REFRESH_TOKENS_ENABLED");
    }

    assert_eq!(cfg.cache.backend, CacheBackendKind::Redis);
    assert_eq!(cfg.auth.secret_key, "environment-application-secret");
    assert_eq!(cfg.auth.oauth.access_token_lifetime, Duration::from_secs(7200));
    assert!(!cfg.auth.oauth.refresh_tokens_enabled);
}
