use cybershield_api::config::Config;
use serial_test::serial;
use std::env;

const OVERRIDES: &[(&str, &str)] = &[
    ("SKIP_ROOT_ENV", "1"),
    ("APP_ENV", "test"),
    ("APP__GENERATOR__BATCH_SIZE", "10"),
    ("APP__QUIZ__TICK_MS", "250"),
    ("APP__HISTORY__HISTORY_CAP", "20"),
    ("GEMINI_API_KEY", "test-key"),
    ("OPPONENT_SEED", "99"),
    ("BIND_ADDR", "127.0.0.1:9000"),
    ("SESSION_DURATION_SECONDS", "900"),
];

fn clear() {
    for (key, _) in OVERRIDES {
        env::remove_var(key);
    }
}

#[test]
#[serial]
fn test_env_overrides_are_applied() {
    for (key, value) in OVERRIDES {
        env::set_var(key, value);
    }

    let config = Config::load().unwrap();
    clear();

    assert_eq!(config.generator.batch_size, 10);
    assert_eq!(config.generator.api_key, "test-key");
    assert_eq!(config.quiz.tick_ms, 250);
    assert_eq!(config.history.history_cap, 20);
    assert_eq!(config.opponent_seed, Some(99));
    assert_eq!(config.bind_addr, "127.0.0.1:9000");
    assert_eq!(config.sessions.idle_ttl_secs, 900);
}

#[test]
#[serial]
fn test_defaults_without_overrides() {
    clear();
    env::set_var("SKIP_ROOT_ENV", "1");
    env::set_var("APP_ENV", "test");

    let config = Config::load().unwrap();
    clear();

    assert_eq!(config.generator.batch_size, 15);
    assert_eq!(config.generator.model, "gemini-3-flash-preview");
    assert_eq!(config.quiz.answer_reveal_ms, 2500);
    assert_eq!(config.quiz.guest_auto_start_ms, 5000);
    assert_eq!(config.history.audit_cap, 100);
    assert_eq!(config.bind_addr, "0.0.0.0:8081");
    assert_eq!(config.sessions.idle_ttl_secs, 3600);
    assert_eq!(config.sessions.finished_grace_secs, 300);
}
