use std::collections::{BTreeMap, HashMap, HashSet};

use rand::seq::SliceRandom;

use crate::code;
use crate::error::RoomError;
use crate::player::{Player, validate_player_name};
use crate::question::{ActiveQuestion, Question, QuestionResult, QuestionStage, slot_key};

/// Share codes live for five minutes from issuance.
pub const SHARE_CODE_TTL_MS: u64 = 5 * 60 * 1000;

/// Inputs gathered under the room lock before the question fetch. The fetch
/// happens without the lock; `commit_activation` re-checks everything here.
#[derive(Debug, Clone)]
pub struct ActivationPlan {
    /// Category as requested by the host (becomes the slot category).
    pub requested_category: Option<String>,
    /// Category to send to the provider: a random sub-slug when the request
    /// named a known group, the request verbatim otherwise.
    pub provider_category: Option<String>,
    pub turn_id: String,
    pub exclude_ids: HashSet<String>,
}

/// One game room: the authoritative state machine. All methods are pure state
/// transitions; the caller owns locking and broadcast.
#[derive(Debug, Clone)]
pub struct Room {
    pub code: String,
    pub host_secret: String,
    pub created_at: u64,
    pub players: HashMap<String, Player>,
    /// Buzz-in rotation. Contains exactly the ids in `players`, no duplicates.
    pub turn_order: Vec<String>,
    pub current_turn_index: Option<usize>,
    pub current_turn_id: Option<String>,
    pub active_question: Option<ActiveQuestion>,
    /// The buzzers-live flag exposed to players.
    pub question_active: bool,
    pub buzzed_by: Option<String>,
    pub last_result: Option<QuestionResult>,
    /// Ids of questions that reached a terminal result. Cancelled questions
    /// are not recorded here.
    pub used_questions: HashSet<String>,
    /// `category|difficulty` keys, consumed at activation and never released.
    pub used_category_slots: HashSet<String>,
    /// Provider category groups, preloaded best-effort at creation.
    pub categories: Option<BTreeMap<String, Vec<String>>>,
    pub share_code: Option<String>,
    pub share_code_issued_at: Option<u64>,
    pub share_code_expires_at: Option<u64>,
}

impl Room {
    pub fn new(code: String, host_secret: String, created_at: u64) -> Self {
        Self {
            code,
            host_secret,
            created_at,
            players: HashMap::new(),
            turn_order: Vec::new(),
            current_turn_index: None,
            current_turn_id: None,
            active_question: None,
            question_active: false,
            buzzed_by: None,
            last_result: None,
            used_questions: HashSet::new(),
            used_category_slots: HashSet::new(),
            categories: None,
            share_code: None,
            share_code_issued_at: None,
            share_code_expires_at: None,
        }
    }

    /// Constant-time host authentication.
    pub fn verify_host_secret(&self, provided: &str) -> Result<(), RoomError> {
        if code::secrets_match(provided, &self.host_secret) {
            Ok(())
        } else {
            Err(RoomError::Forbidden)
        }
    }

    /// Add a player and return their id. The first player to join takes
    /// the turn.
    pub fn join(&mut self, raw_name: &str, now: u64) -> Result<String, RoomError> {
        let name = validate_player_name(raw_name)?;
        let id = code::generate_token();
        self.players
            .insert(id.clone(), Player::new(id.clone(), name, now));
        self.turn_order.push(id.clone());
        if self.current_turn_index.is_none() {
            self.current_turn_index = Some(0);
            self.current_turn_id = Some(id.clone());
        }
        Ok(id)
    }

    /// Pure lookup used to authenticate a returning player.
    pub fn player(&self, player_id: &str) -> Result<&Player, RoomError> {
        self.players.get(player_id).ok_or(RoomError::PlayerNotFound)
    }

    pub fn set_turn(&mut self, player_id: &str) -> Result<(), RoomError> {
        let pos = self
            .turn_order
            .iter()
            .position(|id| id == player_id)
            .ok_or(RoomError::PlayerNotFound)?;
        self.current_turn_index = Some(pos);
        self.current_turn_id = Some(player_id.to_string());
        Ok(())
    }

    /// First half of activation: precondition checks and input gathering,
    /// done under the lock. The question fetch itself must happen with the
    /// lock released.
    pub fn begin_activation(
        &self,
        requested_category: Option<&str>,
    ) -> Result<ActivationPlan, RoomError> {
        if self.active_question.is_some() {
            return Err(RoomError::QuestionAlreadyInPlay);
        }
        let turn_id = self
            .current_turn_id
            .clone()
            .ok_or(RoomError::TurnRequired)?;

        // A request naming a known category group resolves to one of its
        // sub-slugs at random; anything else passes through to the provider.
        let provider_category = requested_category.map(|cat| {
            self.categories
                .as_ref()
                .and_then(|groups| groups.get(cat))
                .filter(|subs| !subs.is_empty())
                .and_then(|subs| subs.choose(&mut rand::thread_rng()).cloned())
                .unwrap_or_else(|| cat.to_string())
        });

        Ok(ActivationPlan {
            requested_category: requested_category.map(str::to_string),
            provider_category,
            turn_id,
            exclude_ids: self.used_questions.clone(),
        })
    }

    /// Second half of activation: re-checks the plan's preconditions (state
    /// may have moved while the fetch was in flight), consumes the slot, and
    /// installs the question. Fails without side effects.
    pub fn commit_activation(
        &mut self,
        plan: &ActivationPlan,
        question: Question,
    ) -> Result<(), RoomError> {
        if self.active_question.is_some() {
            return Err(RoomError::QuestionAlreadyInPlay);
        }
        if self.current_turn_id.as_deref() != Some(plan.turn_id.as_str()) {
            return Err(RoomError::QuestionAlreadyInPlay);
        }
        let slot_category = plan
            .requested_category
            .clone()
            .unwrap_or_else(|| question.category.clone());
        let key = slot_key(&slot_category, &question.difficulty);
        if self.used_category_slots.contains(&key) {
            return Err(RoomError::SlotAlreadyUsed);
        }
        self.used_category_slots.insert(key);

        self.active_question = Some(ActiveQuestion::new(
            question,
            slot_category,
            plan.turn_id.clone(),
            self.current_turn_index,
        ));
        self.last_result = None;
        self.question_active = false;
        self.clear_buzzes();
        Ok(())
    }

    /// Open the floor: the current answerer (if any) is recorded as having
    /// attempted, and every player who has not attempted may buzz.
    pub fn open_buzzers(&mut self) -> Result<(), RoomError> {
        match self.active_question.as_ref() {
            None => return Err(RoomError::NoActiveQuestion),
            Some(active) if active.stage == QuestionStage::OpenForBuzz => {
                return Err(RoomError::BuzzersAlreadyOpen);
            },
            Some(_) => {},
        }
        self.reopen();
        Ok(())
    }

    /// First serialized buzz wins; everyone else gets a clean rejection.
    pub fn buzz(&mut self, player_id: &str, now: u64) -> Result<(), RoomError> {
        if !self.players.contains_key(player_id) {
            return Err(RoomError::PlayerNotFound);
        }
        let Some(active) = self.active_question.as_mut() else {
            return Err(RoomError::BuzzNotAvailable);
        };
        if active.stage != QuestionStage::OpenForBuzz {
            return Err(RoomError::BuzzNotAvailable);
        }
        if active.attempted_player_ids.contains(player_id) {
            return Err(RoomError::AlreadyAttempted);
        }
        active.answering_player_id = Some(player_id.to_string());
        active.attempted_player_ids.insert(player_id.to_string());
        active.stage = QuestionStage::AwaitingHostDecision;
        self.question_active = false;
        self.buzzed_by = Some(player_id.to_string());
        if let Some(player) = self.players.get_mut(player_id) {
            player.buzzed_at = Some(now);
        }
        Ok(())
    }

    /// Award the active question to a player (the current answerer unless the
    /// host names one explicitly) and rotate the turn.
    pub fn mark_correct(&mut self, explicit_player: Option<&str>) -> Result<(), RoomError> {
        let Some(active) = self.active_question.as_ref() else {
            return Err(RoomError::NoActiveQuestion);
        };
        let player_id = explicit_player
            .map(str::to_string)
            .or_else(|| active.answering_player_id.clone())
            .ok_or(RoomError::NoAnsweringPlayer)?;
        if !self.players.contains_key(&player_id) {
            return Err(RoomError::PlayerNotFound);
        }

        let points = active.points;
        self.record_result(true, Some(player_id.clone()), points);
        if let Some(player) = self.players.get_mut(&player_id) {
            player.score += points;
        }
        self.finish();
        Ok(())
    }

    /// Judge the current answer wrong. With `reopen` the question goes back
    /// to the floor (even when nobody was answering — the host's escape
    /// hatch); otherwise the question closes with zero points awarded.
    pub fn mark_incorrect(&mut self, reopen: bool) -> Result<(), RoomError> {
        let Some(active) = self.active_question.as_mut() else {
            return Err(RoomError::NoActiveQuestion);
        };
        let judged = active.answering_player_id.clone();
        if let Some(id) = judged.clone() {
            active.attempted_player_ids.insert(id);
        }
        if reopen {
            self.reopen();
        } else {
            self.record_result(false, judged, 0);
            self.finish();
        }
        Ok(())
    }

    /// Abandon the active question. The slot stays consumed; the question id
    /// is not marked used. No-op when nothing is active.
    pub fn cancel(&mut self) {
        if self.active_question.is_none() {
            return;
        }
        self.active_question = None;
        self.question_active = false;
        self.clear_buzzes();
    }

    /// Remove a player, splicing the turn order and scrubbing every
    /// reference the active question may hold. The question itself survives;
    /// the host resolves or cancels it.
    pub fn remove_player(&mut self, player_id: &str) -> Result<(), RoomError> {
        if self.players.remove(player_id).is_none() {
            return Err(RoomError::PlayerNotFound);
        }
        if let Some(pos) = self.turn_order.iter().position(|id| id == player_id) {
            self.turn_order.remove(pos);
            if self.turn_order.is_empty() {
                self.current_turn_index = None;
                self.current_turn_id = None;
            } else if let Some(cur) = self.current_turn_index {
                let new = if pos < cur {
                    cur - 1
                } else if cur >= self.turn_order.len() {
                    0
                } else {
                    cur
                };
                self.current_turn_index = Some(new);
                self.current_turn_id = Some(self.turn_order[new].clone());
            }
        }
        if self.buzzed_by.as_deref() == Some(player_id) {
            self.buzzed_by = None;
        }
        if let Some(active) = self.active_question.as_mut() {
            active.attempted_player_ids.remove(player_id);
            if active.assigned_to.as_deref() == Some(player_id) {
                active.assigned_to = None;
            }
            if active.answering_player_id.as_deref() == Some(player_id) {
                active.answering_player_id = None;
                self.question_active = false;
                self.buzzed_by = None;
            }
        }
        Ok(())
    }

    pub fn has_players(&self) -> bool {
        !self.players.is_empty()
    }

    // --- share code -------------------------------------------------------

    pub fn set_share_code(&mut self, share_code: String, now: u64) {
        self.share_code = Some(share_code);
        self.share_code_issued_at = Some(now);
        self.share_code_expires_at = Some(now + SHARE_CODE_TTL_MS);
    }

    pub fn share_active(&self, now: u64) -> bool {
        self.share_code.is_some() && self.share_code_expires_at.is_some_and(|exp| exp > now)
    }

    /// Lazy expiry, called before any share-touching read or broadcast.
    pub fn clear_expired_share(&mut self, now: u64) {
        if let Some(expires_at) = self.share_code_expires_at
            && expires_at <= now
        {
            self.share_code = None;
            self.share_code_issued_at = None;
            self.share_code_expires_at = None;
        }
    }

    // --- internals --------------------------------------------------------

    fn clear_buzzes(&mut self) {
        self.buzzed_by = None;
        for player in self.players.values_mut() {
            player.buzzed_at = None;
        }
    }

    /// Put the active question back on the floor. Whoever was answering is
    /// recorded as having attempted.
    fn reopen(&mut self) {
        if let Some(active) = self.active_question.as_mut() {
            if let Some(answering) = active.answering_player_id.take() {
                active.attempted_player_ids.insert(answering);
            }
            active.stage = QuestionStage::OpenForBuzz;
        }
        self.question_active = true;
        self.clear_buzzes();
    }

    fn record_result(&mut self, answered_correctly: bool, answered_by: Option<String>, points: u32) {
        let Some(active) = self.active_question.as_ref() else {
            return;
        };
        self.used_questions.insert(active.id.clone());
        self.last_result = Some(QuestionResult {
            question_id: active.id.clone(),
            text: active.text.clone(),
            category: active.category.clone(),
            difficulty: active.difficulty.clone(),
            correct_answer: active.correct_answer.clone(),
            answered_correctly,
            answered_by,
            points_awarded: points,
        });
    }

    /// Tear down the active question and rotate the turn, starting from the
    /// turn index captured at activation so that mid-question `setTurn` calls
    /// do not perturb the rotation.
    fn finish(&mut self) {
        let captured = self
            .active_question
            .as_ref()
            .and_then(|active| active.turn_index)
            .or(self.current_turn_index);
        self.active_question = None;
        self.question_active = false;
        self.clear_buzzes();
        self.advance_turn_from(captured);
    }

    fn advance_turn_from(&mut self, captured: Option<usize>) {
        if self.turn_order.is_empty() {
            self.current_turn_index = None;
            self.current_turn_id = None;
            return;
        }
        // turn_order only holds present players, so the next slot is valid;
        // captured may be stale after removals and gets clamped.
        let len = self.turn_order.len();
        let start = captured.unwrap_or(0).min(len - 1);
        let next = (start + 1) % len;
        self.current_turn_index = Some(next);
        self.current_turn_id = Some(self.turn_order[next].clone());
    }
}
