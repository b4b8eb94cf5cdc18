use buzzline_core::error::RoomError;
use buzzline_core::question::KNOWN_DIFFICULTIES;
use buzzline_core::room::Room;
use buzzline_core::snapshot::{RoomSnapshot, SnapshotRole, build_snapshot};
use buzzline_core::time::now_ms;

use crate::questions::QuestionQuery;
use crate::registry::{RoomEntry, ShareClaim};
use crate::state::AppState;
use crate::ws;

/// The host's verdict on an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkResult {
    Correct,
    Incorrect,
}

// Every mutating operation funnels through this module: resolve the room,
// authenticate, run the transition under the room lock, broadcast after the
// transition commits. Connection writes never happen under the room lock.

pub async fn create_room(state: &AppState) -> (String, String) {
    // Best-effort category preload; a provider hiccup must not fail creation.
    let categories = match state.questions.fetch_categories().await {
        Ok(groups) => Some(groups),
        Err(e) => {
            tracing::warn!(error = %e, "Category preload failed, room starts without groups");
            None
        },
    };
    state.registry.create(categories).await
}

pub async fn join_room(state: &AppState, room_code: &str, name: &str) -> Result<String, RoomError> {
    let entry = state.registry.get(room_code).await?;
    let player_id = {
        let mut room = entry.room.lock().await;
        room.join(name, now_ms())?
    };
    broadcast_room(&entry).await;
    tracing::info!(room = %room_code, player_id = %player_id, "Player joined");
    Ok(player_id)
}

/// Explicit leave: the player is removed, their connections are dropped, and
/// the room itself goes away when nothing is left in it.
pub async fn leave_room(
    state: &AppState,
    room_code: &str,
    player_id: &str,
) -> Result<(), RoomError> {
    let entry = state.registry.get(room_code).await?;
    entry.room.lock().await.remove_player(player_id)?;
    entry
        .connections
        .lock()
        .await
        .close_player_connections(player_id);

    if !state.registry.remove_if_empty(room_code).await {
        broadcast_room(&entry).await;
    }
    tracing::info!(room = %room_code, player_id = %player_id, "Player left");
    Ok(())
}

pub async fn set_turn(
    state: &AppState,
    room_code: &str,
    host_secret: &str,
    player_id: &str,
) -> Result<(), RoomError> {
    host_transition(state, room_code, host_secret, |room| {
        room.set_turn(player_id)
    })
    .await
}

/// Activation is the one transition that waits on I/O. The room lock is
/// released across the provider fetch; `commit_activation` re-checks the
/// plan's preconditions once the lock is re-acquired.
pub async fn activate_question(
    state: &AppState,
    room_code: &str,
    host_secret: &str,
    category: Option<String>,
    difficulty: Option<String>,
) -> Result<(), RoomError> {
    if let Some(d) = difficulty.as_deref()
        && !KNOWN_DIFFICULTIES.contains(&d)
    {
        return Err(RoomError::Validation(
            "difficulty must be easy, medium or hard".into(),
        ));
    }

    let entry = state.registry.get(room_code).await?;
    let plan = {
        let room = entry.room.lock().await;
        room.verify_host_secret(host_secret)?;
        room.begin_activation(category.as_deref())?
    };

    let query = QuestionQuery {
        category: plan.provider_category.clone(),
        difficulty,
        exclude_ids: plan.exclude_ids.clone(),
    };
    let question = state.questions.fetch_question(&query).await?;

    {
        let mut room = entry.room.lock().await;
        room.commit_activation(&plan, question)?;
    }
    broadcast_room(&entry).await;
    tracing::info!(room = %room_code, "Question activated");
    Ok(())
}

pub async fn open_buzzers(
    state: &AppState,
    room_code: &str,
    host_secret: &str,
) -> Result<(), RoomError> {
    host_transition(state, room_code, host_secret, Room::open_buzzers).await
}

pub async fn mark_question(
    state: &AppState,
    room_code: &str,
    host_secret: &str,
    result: MarkResult,
    player_id: Option<String>,
    reopen_buzzers: bool,
) -> Result<(), RoomError> {
    host_transition(state, room_code, host_secret, |room| match result {
        MarkResult::Correct => room.mark_correct(player_id.as_deref()),
        MarkResult::Incorrect => room.mark_incorrect(reopen_buzzers),
    })
    .await
}

pub async fn cancel_question(
    state: &AppState,
    room_code: &str,
    host_secret: &str,
) -> Result<(), RoomError> {
    host_transition(state, room_code, host_secret, |room| {
        room.cancel();
        Ok(())
    })
    .await
}

/// Tear the room down: every live connection gets one final error frame,
/// then its channel closes.
pub async fn destroy_room(
    state: &AppState,
    room_code: &str,
    host_secret: &str,
) -> Result<(), RoomError> {
    let entry = state.registry.get(room_code).await?;
    entry.room.lock().await.verify_host_secret(host_secret)?;

    state.registry.remove(room_code).await;
    entry
        .connections
        .lock()
        .await
        .close_all_with(&ws::error_frame("Session closed by host"));
    tracing::info!(room = %room_code, "Room destroyed by host");
    Ok(())
}

pub async fn buzz(state: &AppState, room_code: &str, player_id: &str) -> Result<(), RoomError> {
    let entry = state.registry.get(room_code).await?;
    entry.room.lock().await.buzz(player_id, now_ms())?;
    broadcast_room(&entry).await;
    tracing::debug!(room = %room_code, player_id = %player_id, "Buzz won");
    Ok(())
}

pub async fn issue_share(
    state: &AppState,
    room_code: &str,
    host_secret: &str,
) -> Result<(String, u64), RoomError> {
    let entry = state.registry.get(room_code).await?;
    // Verify under the room lock, then release it: share issuance takes the
    // registry lock and must come first in the lock order.
    entry.room.lock().await.verify_host_secret(host_secret)?;

    let issued = state.registry.issue_share(room_code, now_ms()).await?;
    broadcast_room(&entry).await;
    Ok(issued)
}

pub async fn claim_share(state: &AppState, input: &str) -> Result<ShareClaim, RoomError> {
    state.registry.claim_share(input, now_ms()).await
}

/// Role-independent read used by plain HTTP. Projected as the player role so
/// spectators never see answers or share digits.
pub async fn room_snapshot(state: &AppState, room_code: &str) -> Result<RoomSnapshot, RoomError> {
    let entry = state.registry.get(room_code).await?;
    let mut room = entry.room.lock().await;
    room.clear_expired_share(now_ms());
    Ok(build_snapshot(&room, SnapshotRole::Player))
}

async fn host_transition<F>(
    state: &AppState,
    room_code: &str,
    host_secret: &str,
    transition: F,
) -> Result<(), RoomError>
where
    F: FnOnce(&mut Room) -> Result<(), RoomError>,
{
    let entry = state.registry.get(room_code).await?;
    {
        let mut room = entry.room.lock().await;
        room.verify_host_secret(host_secret)?;
        transition(&mut room)?;
    }
    broadcast_room(&entry).await;
    Ok(())
}

/// Collect role-aware frames under the room lock, then deliver with the lock
/// released; `try_send` keeps slow or dead sinks from stalling the room.
pub(crate) async fn broadcast_room(entry: &RoomEntry) {
    let frames = {
        let mut room = entry.room.lock().await;
        room.clear_expired_share(now_ms());
        ws::state_frames(&room)
    };
    if let Some((host_frame, player_frame)) = frames {
        entry
            .connections
            .lock()
            .await
            .broadcast(&host_frame, &player_frame);
    }
}
