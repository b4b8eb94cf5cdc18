use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use rand::seq::SliceRandom;
use serde::Deserialize;

use buzzline_core::error::RoomError;
use buzzline_core::question::{Question, slugify};

use crate::config::TriviaConfig;

/// Provider attempts per fetch before falling back.
const FETCH_ATTEMPTS: usize = 3;

/// Filters for a single question fetch.
#[derive(Debug, Clone, Default)]
pub struct QuestionQuery {
    pub category: Option<String>,
    pub difficulty: Option<String>,
    /// Question ids already used in the room; a provider hit on one of these
    /// counts as a failed attempt.
    pub exclude_ids: HashSet<String>,
}

/// The room core's only view of the trivia upstream.
#[async_trait]
pub trait QuestionSource: Send + Sync {
    /// Category groups mapped to their sub-slugs, slugified.
    async fn fetch_categories(&self) -> Result<BTreeMap<String, Vec<String>>, RoomError>;

    /// Fetch one question honoring the query's filters and exclusions.
    async fn fetch_question(&self, query: &QuestionQuery) -> Result<Question, RoomError>;
}

// ---------------------------------------------------------------------------
// HTTP provider
// ---------------------------------------------------------------------------

/// Wire shape of a provider question (Trivia API v2).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiQuestion {
    id: String,
    category: String,
    difficulty: String,
    question: ApiQuestionText,
    correct_answer: String,
    incorrect_answers: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ApiQuestionText {
    text: String,
}

impl From<ApiQuestion> for Question {
    fn from(api: ApiQuestion) -> Self {
        Question {
            id: api.id,
            category: slugify(&api.category),
            difficulty: api.difficulty.to_lowercase(),
            text: api.question.text,
            correct_answer: api.correct_answer,
            incorrect_answers: api.incorrect_answers,
        }
    }
}

/// Client for a Trivia-API-compatible upstream, with the embedded bank as
/// the fallback tier.
pub struct TriviaApiClient {
    client: reqwest::Client,
    base_url: String,
    fallback: Option<LocalQuestionBank>,
}

impl TriviaApiClient {
    pub fn new(config: &TriviaConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            fallback: config.fallback_to_local.then(LocalQuestionBank::new),
        })
    }

    async fn provider_question(&self, query: &QuestionQuery) -> Result<Question, RoomError> {
        let mut params: Vec<(&str, String)> = vec![("limit", "1".to_string())];
        if let Some(category) = &query.category {
            params.push(("categories", category.clone()));
        }
        if let Some(difficulty) = &query.difficulty {
            params.push(("difficulties", difficulty.clone()));
        }

        let questions: Vec<ApiQuestion> = self
            .client
            .get(format!("{}/questions", self.base_url))
            .query(&params)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Trivia provider request failed");
                RoomError::QuestionProviderUnavailable
            })?
            .error_for_status()
            .map_err(|e| {
                tracing::warn!(error = %e, "Trivia provider returned an error status");
                RoomError::QuestionProviderUnavailable
            })?
            .json()
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Trivia provider returned an unreadable body");
                RoomError::QuestionProviderUnavailable
            })?;

        questions
            .into_iter()
            .next()
            .map(Question::from)
            .ok_or(RoomError::UniqueQuestionUnavailable)
    }
}

#[async_trait]
impl QuestionSource for TriviaApiClient {
    async fn fetch_categories(&self) -> Result<BTreeMap<String, Vec<String>>, RoomError> {
        let raw: BTreeMap<String, Vec<String>> = self
            .client
            .get(format!("{}/categories", self.base_url))
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Category fetch failed");
                RoomError::QuestionProviderUnavailable
            })?
            .error_for_status()
            .map_err(|_| RoomError::QuestionProviderUnavailable)?
            .json()
            .await
            .map_err(|_| RoomError::QuestionProviderUnavailable)?;

        Ok(raw
            .into_iter()
            .map(|(group, subs)| {
                (
                    slugify(&group),
                    subs.iter().map(|s| slugify(s)).collect(),
                )
            })
            .collect())
    }

    async fn fetch_question(&self, query: &QuestionQuery) -> Result<Question, RoomError> {
        let mut last_err = RoomError::UniqueQuestionUnavailable;
        for attempt in 1..=FETCH_ATTEMPTS {
            match self.provider_question(query).await {
                Ok(question) if !query.exclude_ids.contains(&question.id) => {
                    return Ok(question);
                },
                Ok(question) => {
                    tracing::debug!(
                        attempt,
                        question_id = %question.id,
                        "Provider repeated a used question"
                    );
                    last_err = RoomError::UniqueQuestionUnavailable;
                },
                Err(e) => {
                    tracing::debug!(attempt, error = %e, "Provider attempt failed");
                    last_err = e;
                },
            }
        }

        match &self.fallback {
            Some(bank) => bank
                .pick(query)
                .ok_or(RoomError::UniqueQuestionUnavailable),
            None => Err(last_err),
        }
    }
}

// ---------------------------------------------------------------------------
// Embedded bank
// ---------------------------------------------------------------------------

/// id, category, difficulty, text, correct, three wrong answers.
type BankRow = (&'static str, &'static str, &'static str, &'static str, &'static str, [&'static str; 3]);

const EMBEDDED_QUESTIONS: &[BankRow] = &[
    ("local-sci-e1", "science", "easy", "What planet is known as the Red Planet?", "Mars", ["Venus", "Jupiter", "Mercury"]),
    ("local-sci-m1", "science", "medium", "What is the chemical symbol for potassium?", "K", ["P", "Po", "Pt"]),
    ("local-sci-h1", "science", "hard", "What particle is exchanged in the electromagnetic force?", "Photon", ["Gluon", "W boson", "Graviton"]),
    ("local-his-e1", "history", "easy", "In which year did the Second World War end?", "1945", ["1939", "1918", "1950"]),
    ("local-his-m1", "history", "medium", "Who was the first emperor of Rome?", "Augustus", ["Julius Caesar", "Nero", "Trajan"]),
    ("local-his-h1", "history", "hard", "Which treaty ended the Thirty Years' War?", "Peace of Westphalia", ["Treaty of Utrecht", "Treaty of Tordesillas", "Peace of Augsburg"]),
    ("local-geo-e1", "geography", "easy", "What is the capital of Japan?", "Tokyo", ["Kyoto", "Osaka", "Seoul"]),
    ("local-geo-m1", "geography", "medium", "Which river is the longest in the world?", "The Nile", ["The Amazon", "The Yangtze", "The Mississippi"]),
    ("local-mus-e1", "music", "easy", "How many strings does a standard guitar have?", "Six", ["Four", "Five", "Seven"]),
    ("local-mus-m1", "music", "medium", "Which composer wrote the Ninth Symphony while deaf?", "Beethoven", ["Mozart", "Haydn", "Brahms"]),
    ("local-fil-e1", "film_and_tv", "easy", "Who directed the film Jaws?", "Steven Spielberg", ["George Lucas", "Martin Scorsese", "Ridley Scott"]),
    ("local-fil-h1", "film_and_tv", "hard", "Which film won the first Academy Award for Best Picture?", "Wings", ["Sunrise", "The Jazz Singer", "Metropolis"]),
];

/// The embedded question set: the fallback tier, and the sole source when
/// the provider is disabled.
pub struct LocalQuestionBank {
    questions: Vec<Question>,
}

impl Default for LocalQuestionBank {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalQuestionBank {
    pub fn new() -> Self {
        let questions = EMBEDDED_QUESTIONS
            .iter()
            .map(|(id, category, difficulty, text, correct, wrong)| Question {
                id: (*id).to_string(),
                category: (*category).to_string(),
                difficulty: (*difficulty).to_string(),
                text: (*text).to_string(),
                correct_answer: (*correct).to_string(),
                incorrect_answers: wrong.iter().map(|w| (*w).to_string()).collect(),
            })
            .collect();
        Self { questions }
    }

    /// Random non-excluded question matching the query. The difficulty
    /// filter is strict; the category filter is dropped when nothing in the
    /// bank matches it, so a fallback never fails on an unknown category.
    pub fn pick(&self, query: &QuestionQuery) -> Option<Question> {
        let matches = |q: &&Question, with_category: bool| {
            !query.exclude_ids.contains(&q.id)
                && query
                    .difficulty
                    .as_deref()
                    .is_none_or(|d| q.difficulty == d)
                && (!with_category
                    || query.category.as_deref().is_none_or(|c| q.category == c))
        };

        let mut candidates: Vec<&Question> =
            self.questions.iter().filter(|q| matches(q, true)).collect();
        if candidates.is_empty() {
            candidates = self.questions.iter().filter(|q| matches(q, false)).collect();
        }
        candidates
            .choose(&mut rand::thread_rng())
            .map(|q| (*q).clone())
    }
}

#[async_trait]
impl QuestionSource for LocalQuestionBank {
    async fn fetch_categories(&self) -> Result<BTreeMap<String, Vec<String>>, RoomError> {
        let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for question in &self.questions {
            groups.entry(question.category.clone()).or_default();
        }
        Ok(groups)
    }

    async fn fetch_question(&self, query: &QuestionQuery) -> Result<Question, RoomError> {
        self.pick(query).ok_or(RoomError::UniqueQuestionUnavailable)
    }
}
