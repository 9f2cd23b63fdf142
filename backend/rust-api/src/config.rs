use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub redis_uri: String,
    pub bind_addr: String,
    pub generator: GeneratorConfig,
    pub quiz: QuizTiming,
    pub history: HistoryConfig,
    pub sessions: SessionLifetime,
    /// Fixed seed for simulated opponents and room codes. Random when unset.
    pub opponent_seed: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneratorConfig {
    pub api_url: String,
    pub api_key: String,
    pub model: String,
    pub batch_size: u32,
    pub request_timeout_secs: u64,
    pub max_attempts: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            api_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            api_key: String::new(),
            model: "gemini-3-flash-preview".to_string(),
            batch_size: 15,
            request_timeout_secs: 60,
            max_attempts: 3,
        }
    }
}

/// Delays driving a running quiz, in milliseconds.
#[derive(Debug, Clone, Deserialize)]
pub struct QuizTiming {
    pub tick_ms: u64,
    pub answer_reveal_ms: u64,
    pub timeout_reveal_ms: u64,
    pub gain_display_ms: u64,
    pub host_join_ms: u64,
    pub guest_auto_start_ms: u64,
}

impl Default for QuizTiming {
    fn default() -> Self {
        Self {
            tick_ms: 1000,
            answer_reveal_ms: 2500,
            timeout_reveal_ms: 2000,
            gain_display_ms: 1500,
            host_join_ms: 1000,
            guest_auto_start_ms: 5000,
        }
    }
}

impl QuizTiming {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn answer_reveal(&self) -> Duration {
        Duration::from_millis(self.answer_reveal_ms)
    }

    pub fn timeout_reveal(&self) -> Duration {
        Duration::from_millis(self.timeout_reveal_ms)
    }

    pub fn gain_display(&self) -> Duration {
        Duration::from_millis(self.gain_display_ms)
    }

    pub fn host_join(&self) -> Duration {
        Duration::from_millis(self.host_join_ms)
    }

    pub fn guest_auto_start(&self) -> Duration {
        Duration::from_millis(self.guest_auto_start_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryConfig {
    pub history_cap: usize,
    pub audit_cap: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            history_cap: 50,
            audit_cap: 100,
        }
    }
}

/// How long live sessions stay reachable over HTTP, in seconds.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionLifetime {
    pub sweep_interval_secs: u64,
    /// A session in results (or closed) is dropped this long after its last request.
    pub finished_grace_secs: u64,
    /// Any session untouched for this long is dropped, whatever its phase.
    pub idle_ttl_secs: u64,
}

impl Default for SessionLifetime {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 60,
            finished_grace_secs: 300,
            idle_ttl_secs: 3600,
        }
    }
}

impl SessionLifetime {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    pub fn finished_grace(&self) -> Duration {
        Duration::from_secs(self.finished_grace_secs)
    }

    pub fn idle_ttl(&self) -> Duration {
        Duration::from_secs(self.idle_ttl_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            redis_uri: "redis://127.0.0.1:6379/0".to_string(),
            bind_addr: "0.0.0.0:8081".to_string(),
            generator: GeneratorConfig::default(),
            quiz: QuizTiming::default(),
            history: HistoryConfig::default(),
            sessions: SessionLifetime::default(),
            opponent_seed: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        // Root .env first, then the local one
        let skip_root_env = env::var("SKIP_ROOT_ENV").is_ok();
        if skip_root_env {
            dotenvy::dotenv().ok();
        } else if dotenvy::from_path("../../.env").is_err() {
            dotenvy::dotenv().ok();
        }

        let env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // config/*.toml, then APP_ overrides
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", env)).required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let defaults = Config::default();

        let redis_uri = settings
            .get_string("redis.uri")
            .or_else(|_| env::var("REDIS_URI"))
            .unwrap_or_else(|_| {
                let host = env::var("REDIS_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
                let port = env::var("REDIS_PORT").unwrap_or_else(|_| "6379".to_string());
                match env::var("REDIS_PASSWORD") {
                    Ok(password) => format!("redis://:{}@{}:{}/0", password, host, port),
                    Err(_) => {
                        eprintln!("WARNING: REDIS_PASSWORD not set, connecting without auth");
                        format!("redis://{}:{}/0", host, port)
                    }
                }
            });

        let bind_addr = settings
            .get_string("server.bind_addr")
            .or_else(|_| env::var("BIND_ADDR"))
            .unwrap_or(defaults.bind_addr);

        let api_key = settings
            .get_string("generator.api_key")
            .or_else(|_| env::var("GEMINI_API_KEY"))
            .unwrap_or_else(|_| {
                if env == "prod" {
                    panic!("FATAL: GEMINI_API_KEY must be set in production!");
                }
                eprintln!("WARNING: GEMINI_API_KEY not set, question generation will fail");
                String::new()
            });

        let generator = GeneratorConfig {
            api_url: settings
                .get_string("generator.api_url")
                .or_else(|_| env::var("GEMINI_API_URL"))
                .unwrap_or(defaults.generator.api_url),
            api_key,
            model: settings
                .get_string("generator.model")
                .or_else(|_| env::var("GEMINI_MODEL"))
                .unwrap_or(defaults.generator.model),
            batch_size: read_int(&settings, "generator.batch_size")
                .unwrap_or(defaults.generator.batch_size),
            request_timeout_secs: read_int(&settings, "generator.request_timeout_secs")
                .unwrap_or(defaults.generator.request_timeout_secs),
            max_attempts: read_int(&settings, "generator.max_attempts")
                .unwrap_or(defaults.generator.max_attempts),
        };

        let quiz = QuizTiming {
            tick_ms: read_int(&settings, "quiz.tick_ms").unwrap_or(defaults.quiz.tick_ms),
            answer_reveal_ms: read_int(&settings, "quiz.answer_reveal_ms")
                .unwrap_or(defaults.quiz.answer_reveal_ms),
            timeout_reveal_ms: read_int(&settings, "quiz.timeout_reveal_ms")
                .unwrap_or(defaults.quiz.timeout_reveal_ms),
            gain_display_ms: read_int(&settings, "quiz.gain_display_ms")
                .unwrap_or(defaults.quiz.gain_display_ms),
            host_join_ms: read_int(&settings, "quiz.host_join_ms")
                .unwrap_or(defaults.quiz.host_join_ms),
            guest_auto_start_ms: read_int(&settings, "quiz.guest_auto_start_ms")
                .unwrap_or(defaults.quiz.guest_auto_start_ms),
        };

        let history = HistoryConfig {
            history_cap: read_int(&settings, "history.history_cap")
                .unwrap_or(defaults.history.history_cap),
            audit_cap: read_int(&settings, "history.audit_cap")
                .unwrap_or(defaults.history.audit_cap),
        };

        let sessions = SessionLifetime {
            sweep_interval_secs: read_int(&settings, "sessions.sweep_interval_secs")
                .unwrap_or(defaults.sessions.sweep_interval_secs),
            finished_grace_secs: read_int(&settings, "sessions.finished_grace_secs")
                .unwrap_or(defaults.sessions.finished_grace_secs),
            idle_ttl_secs: read_int(&settings, "sessions.idle_ttl_secs")
                .or_else(|| {
                    env::var("SESSION_DURATION_SECONDS")
                        .ok()
                        .and_then(|value| value.parse().ok())
                        .filter(|value| *value > 0)
                })
                .unwrap_or(defaults.sessions.idle_ttl_secs),
        };

        let opponent_seed = read_int(&settings, "quiz.opponent_seed").or_else(|| {
            env::var("OPPONENT_SEED")
                .ok()
                .and_then(|value| value.parse().ok())
        });

        Ok(Config {
            redis_uri,
            bind_addr,
            generator,
            quiz,
            history,
            sessions,
            opponent_seed,
        })
    }
}

/// Non-negative integer setting, `None` when missing or out of range.
fn read_int<T: TryFrom<i64>>(settings: &config::Config, key: &str) -> Option<T> {
    settings
        .get_int(key)
        .ok()
        .and_then(|value| T::try_from(value).ok())
}
