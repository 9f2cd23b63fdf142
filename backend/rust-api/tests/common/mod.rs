#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use cybershield_api::{
    config::{Config, HistoryConfig, QuizTiming},
    create_router,
    error::QuizError,
    models::{Difficulty, Question},
    services::{
        history_service::HistoryService,
        question_generator::QuestionGenerator,
        session_service::{QuizCollaborators, QuizSessionController},
        store::InMemoryStore,
        AppState,
    },
};
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower::ServiceExt;

pub const SEED: u64 = 42;

/// Returns the same questions whatever count is asked for.
pub struct ScriptedGenerator {
    pub questions: Vec<Question>,
    pub calls: AtomicUsize,
}

impl ScriptedGenerator {
    pub fn new(count: usize) -> Arc<Self> {
        Arc::new(Self {
            questions: (0..count).map(|i| question(&format!("q{}", i), 1)).collect(),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl QuestionGenerator for ScriptedGenerator {
    async fn generate(&self, _: u32, _: Difficulty) -> Result<Vec<Question>, QuizError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.questions.clone())
    }
}

pub fn question(id: &str, correct_answer: usize) -> Question {
    Question {
        id: id.to_string(),
        category: "Phishing".to_string(),
        difficulty: Difficulty::Medium,
        text: "Which sender address is spoofed?".to_string(),
        options: vec![
            "security@bank.com".to_string(),
            "security@bank-verify.co".to_string(),
            "noreply@bank.com".to_string(),
            "alerts@bank.com".to_string(),
        ],
        correct_answer,
        explanation: "Look-alike domains are a classic phishing trick.".to_string(),
    }
}

pub fn test_config() -> Config {
    Config {
        opponent_seed: Some(SEED),
        ..Config::default()
    }
}

pub struct TestController {
    pub controller: QuizSessionController,
    pub history: HistoryService,
    pub exits: Arc<AtomicUsize>,
}

pub fn create_controller(generator: Arc<dyn QuestionGenerator>, timing: QuizTiming) -> TestController {
    let history = HistoryService::new(Arc::new(InMemoryStore::new()), &HistoryConfig::default());
    let exits = Arc::new(AtomicUsize::new(0));
    let counter = exits.clone();

    let controller = QuizSessionController::new(
        QuizCollaborators {
            generator,
            history: history.clone(),
            navigator: Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        },
        timing,
        15,
        Some(SEED),
    );

    TestController {
        controller,
        history,
        exits,
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
}

pub fn create_test_app(generator: Arc<dyn QuestionGenerator>) -> TestApp {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    let state = Arc::new(AppState::with_collaborators(
        test_config(),
        generator,
        Arc::new(InMemoryStore::new()),
    ));

    TestApp {
        router: create_router(state.clone()),
        state,
    }
}

/// Sends one request and returns the status with the decoded JSON body
/// (`Value::Null` for empty bodies).
pub async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).to_string()))
    };
    (status, json)
}
