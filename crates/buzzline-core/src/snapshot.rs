use serde::{Deserialize, Serialize};

use crate::question::QuestionStage;
use crate::room::Room;

/// Who a snapshot is for. Hosts see the correct answer, the choices, and the
/// share-code digits; players never do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotRole {
    Host,
    Player,
}

/// Resolved cross-reference. A player who has left serializes as null,
/// never as a dangling id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRef {
    pub player_id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub player_id: String,
    pub name: String,
    pub score: u32,
    pub joined_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buzzed_at: Option<u64>,
    pub is_turn: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveQuestionSnapshot {
    pub id: String,
    pub stage: QuestionStage,
    pub category: String,
    pub difficulty: String,
    pub question: String,
    pub points: u32,
    pub assigned_to: Option<PlayerRef>,
    pub answering_player: Option<PlayerRef>,
    pub attempted_player_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSnapshot {
    pub question_id: String,
    pub question: String,
    pub category: String,
    pub difficulty: String,
    /// Revealed to every role; the question is over.
    pub correct_answer: String,
    pub answered_correctly: bool,
    pub answered_by: Option<PlayerRef>,
    pub points_awarded: u32,
}

/// Role-aware projection of room state, sent to every connection after each
/// transition and served over HTTP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub code: String,
    pub created_at: u64,
    pub players: Vec<PlayerSnapshot>,
    pub current_turn: Option<PlayerRef>,
    pub question_active: bool,
    pub buzzed_by: Option<PlayerRef>,
    pub active_question: Option<ActiveQuestionSnapshot>,
    pub last_result: Option<ResultSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share_code_issued_at: Option<u64>,
    /// Present for every role while a share is live, so players can tell a
    /// share is active without learning the digits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share_code_expires_at: Option<u64>,
}

fn player_ref(room: &Room, id: Option<&str>) -> Option<PlayerRef> {
    let id = id?;
    room.players.get(id).map(|p| PlayerRef {
        player_id: p.id.clone(),
        name: p.name.clone(),
    })
}

/// Build the projection for one role. Share expiry is lazy: callers run
/// `Room::clear_expired_share` before projecting.
pub fn build_snapshot(room: &Room, role: SnapshotRole) -> RoomSnapshot {
    let is_host = role == SnapshotRole::Host;

    // Join order (the turn order is append-only on join) keeps the player
    // list stable across snapshots.
    let players = room
        .turn_order
        .iter()
        .filter_map(|id| room.players.get(id))
        .map(|p| PlayerSnapshot {
            player_id: p.id.clone(),
            name: p.name.clone(),
            score: p.score,
            joined_at: p.joined_at,
            buzzed_at: p.buzzed_at,
            is_turn: room.current_turn_id.as_deref() == Some(p.id.as_str()),
        })
        .collect();

    let active_question = room.active_question.as_ref().map(|active| {
        let mut attempted: Vec<String> = active.attempted_player_ids.iter().cloned().collect();
        attempted.sort();
        ActiveQuestionSnapshot {
            id: active.id.clone(),
            stage: active.stage,
            category: active.category.clone(),
            difficulty: active.difficulty.clone(),
            question: active.text.clone(),
            points: active.points,
            assigned_to: player_ref(room, active.assigned_to.as_deref()),
            answering_player: player_ref(room, active.answering_player_id.as_deref()),
            attempted_player_ids: attempted,
            choices: is_host.then(|| active.choices.clone()),
            correct_answer: is_host.then(|| active.correct_answer.clone()),
        }
    });

    let last_result = room.last_result.as_ref().map(|result| ResultSnapshot {
        question_id: result.question_id.clone(),
        question: result.text.clone(),
        category: result.category.clone(),
        difficulty: result.difficulty.clone(),
        correct_answer: result.correct_answer.clone(),
        answered_correctly: result.answered_correctly,
        answered_by: player_ref(room, result.answered_by.as_deref()),
        points_awarded: result.points_awarded,
    });

    RoomSnapshot {
        code: room.code.clone(),
        created_at: room.created_at,
        players,
        current_turn: player_ref(room, room.current_turn_id.as_deref()),
        question_active: room.question_active,
        buzzed_by: player_ref(room, room.buzzed_by.as_deref()),
        active_question,
        last_result,
        share_code: if is_host { room.share_code.clone() } else { None },
        share_code_issued_at: if is_host { room.share_code_issued_at } else { None },
        share_code_expires_at: room.share_code_expires_at,
    }
}
