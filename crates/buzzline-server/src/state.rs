use std::sync::Arc;

use crate::config::ServerConfig;
use crate::questions::{LocalQuestionBank, QuestionSource, TriviaApiClient};
use crate::registry::RoomRegistry;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<RoomRegistry>,
    pub questions: Arc<dyn QuestionSource>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        let questions: Arc<dyn QuestionSource> = if config.trivia.enabled {
            match TriviaApiClient::new(&config.trivia) {
                Ok(client) => Arc::new(client),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to build trivia client, using embedded bank");
                    Arc::new(LocalQuestionBank::new())
                },
            }
        } else {
            Arc::new(LocalQuestionBank::new())
        };
        Self::with_question_source(config, questions)
    }

    /// Used by tests to inject a scripted question source.
    pub fn with_question_source(config: ServerConfig, questions: Arc<dyn QuestionSource>) -> Self {
        Self {
            registry: Arc::new(RoomRegistry::new()),
            questions,
            config: Arc::new(config),
        }
    }
}
