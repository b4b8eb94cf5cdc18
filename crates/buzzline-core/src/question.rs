use std::collections::HashSet;

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

/// Points awarded per difficulty. Unknown difficulties fall back to 200.
pub fn points_for_difficulty(difficulty: &str) -> u32 {
    match difficulty {
        "easy" => 150,
        "medium" => 250,
        "hard" => 400,
        _ => 200,
    }
}

/// The three difficulties a host may request.
pub const KNOWN_DIFFICULTIES: &[&str] = &["easy", "medium", "hard"];

/// Slug form used for category keys: lowercase, `&` becomes `and`,
/// non-alphanumeric runs collapse to a single `_`, edges trimmed.
pub fn slugify(raw: &str) -> String {
    let mut slug = String::with_capacity(raw.len());
    for c in raw.to_lowercase().replace('&', " and ").chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
        } else if !slug.ends_with('_') {
            slug.push('_');
        }
    }
    slug.trim_matches('_').to_string()
}

/// The composite key consumed by question activation.
pub fn slot_key(category: &str, difficulty: &str) -> String {
    format!("{category}|{difficulty}")
}

/// A question as delivered by a `QuestionSource`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub category: String,
    pub difficulty: String,
    pub text: String,
    pub correct_answer: String,
    pub incorrect_answers: Vec<String>,
}

/// Phase of the question currently in play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QuestionStage {
    /// The host is judging one player's answer; buzzers are closed.
    AwaitingHostDecision,
    /// Any player who has not yet attempted may buzz.
    OpenForBuzz,
}

/// The single question in play in a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveQuestion {
    pub id: String,
    pub stage: QuestionStage,
    /// Player whose turn triggered activation, until they leave.
    pub assigned_to: Option<String>,
    /// Player the host is currently judging. Null exactly while buzzers are open.
    pub answering_player_id: Option<String>,
    /// Everyone who has had a shot at this question.
    pub attempted_player_ids: HashSet<String>,
    /// Turn index captured at activation; finish advances from here.
    pub turn_index: Option<usize>,
    /// Slot category: the requested category, not the provider's sub-category.
    pub category: String,
    pub difficulty: String,
    pub text: String,
    pub correct_answer: String,
    pub incorrect_answers: Vec<String>,
    /// Shuffled union of correct and incorrect answers.
    pub choices: Vec<String>,
    pub points: u32,
}

impl ActiveQuestion {
    /// Build the in-play record from a fetched question. The slot category is
    /// the host's requested category when one was given; the provider's
    /// category otherwise.
    pub fn new(
        question: Question,
        slot_category: String,
        assigned_to: String,
        turn_index: Option<usize>,
    ) -> Self {
        let mut choices: Vec<String> = question.incorrect_answers.clone();
        choices.push(question.correct_answer.clone());
        choices.shuffle(&mut rand::thread_rng());

        let points = points_for_difficulty(&question.difficulty);
        Self {
            id: question.id,
            stage: QuestionStage::AwaitingHostDecision,
            assigned_to: Some(assigned_to.clone()),
            answering_player_id: Some(assigned_to.clone()),
            attempted_player_ids: HashSet::from([assigned_to]),
            turn_index,
            category: slot_category,
            difficulty: question.difficulty,
            text: question.text,
            correct_answer: question.correct_answer,
            incorrect_answers: question.incorrect_answers,
            choices,
            points,
        }
    }

    pub fn slot_key(&self) -> String {
        slot_key(&self.category, &self.difficulty)
    }
}

/// Projection of a finished question, kept until the next activation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionResult {
    pub question_id: String,
    pub text: String,
    pub category: String,
    pub difficulty: String,
    pub correct_answer: String,
    pub answered_correctly: bool,
    pub answered_by: Option<String>,
    pub points_awarded: u32,
}
