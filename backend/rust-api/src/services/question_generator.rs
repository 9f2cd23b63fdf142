use async_trait::async_trait;
use futures::future::try_join_all;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use uuid::Uuid;

use crate::config::GeneratorConfig;
use crate::error::QuizError;
use crate::metrics::QUESTION_BATCHES_TOTAL;
use crate::models::{Difficulty, Question};
use crate::utils::retry::RetryPolicy;

/// Produces quiz questions. The production implementation asks a generative
/// AI backend; tests plug in canned generators.
#[async_trait]
pub trait QuestionGenerator: Send + Sync {
    async fn generate(&self, count: u32, difficulty: Difficulty)
        -> Result<Vec<Question>, QuizError>;
}

/// Sizes of the sub-requests needed for `total` questions.
pub fn plan_batches(total: u32, batch_size: u32) -> Vec<u32> {
    let batch_size = batch_size.max(1);
    (0..total.div_ceil(batch_size))
        .map(|i| batch_size.min(total - i * batch_size))
        .collect()
}

/// Issues every batch concurrently and concatenates the answers in batch
/// order, whatever order they complete in. The first failing or empty batch
/// fails the whole request and the other batches are dropped.
pub async fn generate_in_batches(
    generator: &dyn QuestionGenerator,
    total: u32,
    difficulty: Difficulty,
    batch_size: u32,
) -> Result<Vec<Question>, QuizError> {
    let batches = plan_batches(total, batch_size);
    tracing::info!(
        "Generating {} {} questions in {} batches",
        total,
        difficulty,
        batches.len()
    );

    let requests = batches.iter().enumerate().map(|(index, &count)| async move {
        let result = match generator.generate(count, difficulty).await {
            Ok(questions) if questions.is_empty() => {
                Err(QuizError::EmptyBatch { requested: count })
            }
            other => other,
        };

        match &result {
            Ok(questions) => {
                QUESTION_BATCHES_TOTAL.with_label_values(&["success"]).inc();
                tracing::debug!(batch = index, received = questions.len(), "Batch ready");
            }
            Err(err) => {
                QUESTION_BATCHES_TOTAL.with_label_values(&["error"]).inc();
                tracing::warn!(batch = index, error = %err, "Batch failed");
            }
        }
        result
    });

    let questions: Vec<Question> = try_join_all(requests).await?.into_iter().flatten().collect();

    if questions.is_empty() {
        return Err(QuizError::EmptyQuestionSet);
    }
    Ok(questions)
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeneratedQuestion {
    id: Option<String>,
    #[serde(default)]
    category: String,
    text: String,
    options: Vec<String>,
    correct_answer: i64,
    #[serde(default)]
    explanation: String,
}

/// Parses the JSON array the model returns, dropping malformed entries.
pub fn parse_questions(text: &str, difficulty: Difficulty) -> Result<Vec<Question>, QuizError> {
    let raw: Vec<GeneratedQuestion> = serde_json::from_str(text)
        .map_err(|e| QuizError::Generation(format!("Invalid question JSON: {}", e)))?;
    let received = raw.len();

    let questions: Vec<Question> = raw
        .into_iter()
        .filter_map(|q| {
            let correct_answer = usize::try_from(q.correct_answer).ok()?;
            let question = Question {
                id: q
                    .id
                    .filter(|id| !id.is_empty())
                    .unwrap_or_else(|| Uuid::new_v4().to_string()),
                category: q.category,
                difficulty,
                text: q.text,
                options: q.options,
                correct_answer,
                explanation: q.explanation,
            };
            question.is_well_formed().then_some(question)
        })
        .collect();

    if questions.len() < received {
        tracing::warn!(
            "Discarded {} malformed generated questions",
            received - questions.len()
        );
    }
    Ok(questions)
}

/// Gemini `generateContent` client constrained to a JSON response schema.
pub struct GeminiQuestionGenerator {
    http_client: Client,
    api_url: String,
    api_key: String,
    model: String,
    request_timeout: Duration,
    retry: RetryPolicy,
}

impl GeminiQuestionGenerator {
    pub fn new(config: &GeneratorConfig) -> Self {
        Self {
            http_client: Client::new(),
            api_url: config.api_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            retry: RetryPolicy::default().with_attempts(config.max_attempts),
        }
    }

    fn request_body(count: u32, difficulty: Difficulty) -> serde_json::Value {
        json!({
            "contents": [{
                "role": "user",
                "parts": [{
                    "text": format!(
                        "Generate {} multiple-choice cybersecurity questions ({} difficulty). \
                         Each question has exactly four options.",
                        count, difficulty
                    )
                }]
            }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "temperature": 0.9,
                "responseSchema": {
                    "type": "ARRAY",
                    "items": {
                        "type": "OBJECT",
                        "properties": {
                            "id": { "type": "STRING" },
                            "category": { "type": "STRING" },
                            "difficulty": { "type": "STRING" },
                            "text": { "type": "STRING" },
                            "options": {
                                "type": "ARRAY",
                                "items": { "type": "STRING" },
                                "minItems": 4,
                                "maxItems": 4
                            },
                            "correctAnswer": { "type": "INTEGER" },
                            "explanation": { "type": "STRING" }
                        },
                        "required": ["id", "category", "difficulty", "text", "options", "correctAnswer", "explanation"]
                    }
                }
            }
        })
    }

    async fn request_once(
        &self,
        count: u32,
        difficulty: Difficulty,
    ) -> Result<Vec<Question>, QuizError> {
        let url = format!("{}/models/{}:generateContent", self.api_url, self.model);

        tracing::debug!(
            "Calling question generator: {} with count={}, difficulty={}",
            url,
            count,
            difficulty
        );

        let response = self
            .http_client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&Self::request_body(count, difficulty))
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| QuizError::Generation(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(QuizError::Generation(format!(
                "Generator returned error {}: {}",
                status, error_text
            )));
        }

        let body: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| QuizError::Generation(format!("Unreadable response: {}", e)))?;

        let text: String = body
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect()
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        parse_questions(&text, difficulty)
    }
}

#[async_trait]
impl QuestionGenerator for GeminiQuestionGenerator {
    async fn generate(
        &self,
        count: u32,
        difficulty: Difficulty,
    ) -> Result<Vec<Question>, QuizError> {
        let questions = self
            .retry
            .run("generate_questions", || self.request_once(count, difficulty))
            .await?;
        tracing::info!("Generated {} {} questions", questions.len(), difficulty);
        Ok(questions)
    }
}
