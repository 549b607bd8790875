#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use concierge::config::ConciergeConfig;
use concierge::conversation::ConversationStore;
use concierge::db;
use concierge::embedding::EmbeddingProvider;
use concierge::events::{index, EventRecord, EventRetriever};
use concierge::game::GameRegistry;
use concierge::inference::{GenerationParams, InferenceError, InferenceProvider};
use concierge::server::{build_router, AppState};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Open a fresh in-memory database with schema and migrations applied.
pub fn test_db() -> Connection {
    db::open_in_memory().unwrap()
}

pub fn shared_db() -> Arc<Mutex<Connection>> {
    Arc::new(Mutex::new(test_db()))
}

/// Generate a deterministic 384-dim embedding with a spike at position `seed`.
/// Each seed produces a distinct, orthogonal vector.
pub fn test_embedding(seed: u8) -> Vec<f32> {
    let mut v = vec![0.0f32; 384];
    v[seed as usize % 384] = 1.0;
    v
}

/// Embeds text by keyword: the first keyword found in the lowercased text picks the
/// spike position. Text with no keyword gets spike 200.
pub struct KeywordEmbedding {
    pub keywords: Vec<(&'static str, u8)>,
}

impl KeywordEmbedding {
    pub fn new(keywords: &[(&'static str, u8)]) -> Self {
        Self {
            keywords: keywords.to_vec(),
        }
    }
}

impl EmbeddingProvider for KeywordEmbedding {
    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let lower = text.to_lowercase();
        let seed = self
            .keywords
            .iter()
            .find(|(word, _)| lower.contains(word))
            .map_or(200, |(_, seed)| *seed);
        Ok(test_embedding(seed))
    }
}

/// Always fails, standing in for a missing or broken model.
pub struct FailingEmbedding;

impl EmbeddingProvider for FailingEmbedding {
    fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
        anyhow::bail!("embedding model unavailable")
    }
}

/// Records every prompt and answers with a fixed reply, or fails when `reply` is `None`.
pub struct StubInference {
    pub reply: Option<String>,
    pub prompts: Mutex<Vec<String>>,
}

impl StubInference {
    pub fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Some(reply.to_string()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            reply: None,
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl InferenceProvider for StubInference {
    async fn generate(
        &self,
        prompt: &str,
        _params: &GenerationParams,
    ) -> Result<String, InferenceError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.reply.clone().ok_or(InferenceError::Timeout(120))
    }

    fn model(&self) -> &str {
        "stub"
    }
}

pub fn sample_event(id: &str, name: &str, date: &str) -> EventRecord {
    EventRecord {
        id: id.into(),
        name: name.into(),
        description: format!("{name} for residents"),
        date: date.into(),
        start_time: "10:00:00".into(),
        end_time: Some("11:00:00".into()),
        location: "Community Hall".into(),
        organizer: "Activities Team".into(),
        resident_participants: String::new(),
        created_at: None,
        updated_at: None,
    }
}

/// Insert an event with the spike embedding for `seed`.
pub fn insert_event(conn: &mut Connection, event: &EventRecord, seed: u8) {
    index::upsert_event(conn, event, &test_embedding(seed)).unwrap();
}

/// Handles a test needs after building the router.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub db: Arc<Mutex<Connection>>,
}

/// Build the router over an isolated in-memory database.
pub fn test_app(
    inference: Arc<StubInference>,
    embedding: Arc<dyn EmbeddingProvider>,
) -> TestApp {
    let config = ConciergeConfig::default();
    let db = shared_db();
    let state = AppState {
        conversations: ConversationStore::new(Arc::clone(&db), Duration::from_secs(3600)),
        events: EventRetriever::new(Arc::clone(&db), embedding),
        games: GameRegistry::new(config.game.min_year, config.game.max_year).unwrap(),
        inference,
        config: Arc::new(config),
    };
    TestApp {
        router: build_router(state.clone()),
        state,
        db,
    }
}
