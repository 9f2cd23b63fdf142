use crate::config::Config;
use redis::aio::ConnectionManager;
use std::sync::Arc;

use history_service::HistoryService;
use question_generator::{GeminiQuestionGenerator, QuestionGenerator};
use session_registry::SessionRegistry;
use session_service::{Navigator, QuizCollaborators, QuizSessionController};
use store::{RedisStore, ResultStore};

pub struct AppState {
    pub config: Config,
    pub redis: Option<ConnectionManager>,
    pub history: HistoryService,
    pub sessions: SessionRegistry,
    pub controller: QuizSessionController,
}

/// Over HTTP the host application is the client; leaving a quiz only needs
/// to be noted here.
struct HostNavigator;

impl Navigator for HostNavigator {
    fn exit_quiz(&self) {
        tracing::info!("Quiz exited, control returned to host application");
    }
}

impl AppState {
    pub async fn new(config: Config, redis_client: redis::Client) -> anyhow::Result<Self> {
        tracing::info!("Attempting to connect to Redis...");

        let redis = tokio::time::timeout(
            std::time::Duration::from_secs(30),
            ConnectionManager::new(redis_client),
        )
        .await
        .map_err(|_| anyhow::anyhow!("Redis connection timeout after 30s"))??;

        tracing::info!("Redis ConnectionManager created, testing with PING...");

        let mut conn = redis.clone();
        tokio::time::timeout(
            std::time::Duration::from_secs(5),
            redis::cmd("PING").query_async::<String>(&mut conn),
        )
        .await
        .map_err(|_| anyhow::anyhow!("Redis PING timeout after 5s"))??;

        tracing::info!("Redis connection established successfully");

        let generator = Arc::new(GeminiQuestionGenerator::new(&config.generator));
        let store = Arc::new(RedisStore::new(redis.clone()));
        let mut state = Self::with_collaborators(config, generator, store);
        state.redis = Some(redis);
        Ok(state)
    }

    /// State over arbitrary collaborators, without a Redis connection.
    /// Must be called inside a tokio runtime: it starts the session sweeper.
    pub fn with_collaborators(
        config: Config,
        generator: Arc<dyn QuestionGenerator>,
        store: Arc<dyn ResultStore>,
    ) -> Self {
        let history = HistoryService::new(store, &config.history);
        let controller = QuizSessionController::new(
            QuizCollaborators {
                generator,
                history: history.clone(),
                navigator: Arc::new(HostNavigator),
            },
            config.quiz.clone(),
            config.generator.batch_size,
            config.opponent_seed,
        );

        let sessions = SessionRegistry::new();
        sessions.spawn_sweeper(&config.sessions);

        Self {
            config,
            redis: None,
            history,
            sessions,
            controller,
        }
    }
}

pub mod history_service;
pub mod leaderboard;
pub mod opponent_engine;
pub mod question_generator;
pub mod scoring;
pub mod session_registry;
pub mod session_service;
pub mod store;
pub mod timer;
pub mod turn_machine;
