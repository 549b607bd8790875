//! Guess-the-year game state.
//!
//! Sessions live in process memory only and are lost on restart. Each visitor
//! id maps to one session; starting again replaces it.

use anyhow::Result;
use rand::Rng;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone)]
pub struct GameSession {
    pub hidden_year: i32,
    pub questions: Vec<String>,
    pub guesses: Vec<i64>,
}

/// Result of evaluating one guess.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuessOutcome {
    pub correct: bool,
    pub hidden_year: i32,
    pub questions_asked: usize,
    pub total_guesses: usize,
}

impl GuessOutcome {
    pub fn message(&self) -> String {
        if self.correct {
            format!("Correct! The year was {}", self.hidden_year)
        } else {
            format!("Incorrect! The year was {}", self.hidden_year)
        }
    }
}

/// Shared handle over all active game sessions.
#[derive(Clone)]
pub struct GameRegistry {
    sessions: Arc<Mutex<HashMap<String, GameSession>>>,
    min_year: i32,
    max_year: i32,
}

impl GameRegistry {
    pub fn new(min_year: i32, max_year: i32) -> Result<Self> {
        anyhow::ensure!(
            min_year <= max_year,
            "invalid year range {min_year}..={max_year}"
        );
        Ok(Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            min_year,
            max_year,
        })
    }

    // A panic while holding the lock cannot leave a session half-written, so
    // the map is still usable after poisoning.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, GameSession>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start or reset the session for `visitor_id`. Returns the new hidden year.
    pub fn start(&self, visitor_id: &str) -> i32 {
        let hidden_year = rand::rng().random_range(self.min_year..=self.max_year);
        self.lock().insert(
            visitor_id.to_string(),
            GameSession {
                hidden_year,
                questions: Vec::new(),
                guesses: Vec::new(),
            },
        );
        tracing::info!(visitor_id, "game session started");
        hidden_year
    }

    /// Log a question and return the hidden year to answer from, or `None`
    /// when the visitor has no session.
    pub fn record_question(&self, visitor_id: &str, question: &str) -> Option<i32> {
        let mut sessions = self.lock();
        let session = sessions.get_mut(visitor_id)?;
        session.questions.push(question.to_string());
        Some(session.hidden_year)
    }

    /// Log a guess and evaluate it. The session stays active either way.
    pub fn guess(&self, visitor_id: &str, value: i64) -> Option<GuessOutcome> {
        let mut sessions = self.lock();
        let session = sessions.get_mut(visitor_id)?;
        session.guesses.push(value);
        Some(GuessOutcome {
            correct: value == i64::from(session.hidden_year),
            hidden_year: session.hidden_year,
            questions_asked: session.questions.len(),
            total_guesses: session.guesses.len(),
        })
    }

    pub fn session(&self, visitor_id: &str) -> Option<GameSession> {
        self.lock().get(visitor_id).cloned()
    }
}
