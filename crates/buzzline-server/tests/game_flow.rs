//! End-to-end game scenarios exercising the full question lifecycle.

#[allow(dead_code)]
mod common;

use serde_json::json;

use buzzline_core::error::RoomError;
use buzzline_server::commands;
use common::{TestServer, make_question, read_until_type, register_player, ws_connect, ws_send};

/// Happy path: one question, answered correctly on the assignee's turn.
#[tokio::test]
async fn s1_correct_answer_scores_and_rotates_turn() {
    let server = TestServer::new().await;
    let (code, host_secret) = server.create_room().await;
    let alice = server.join(&code, "Alice").await;
    let bob = server.join(&code, "Bob").await;

    let resp = server
        .post(
            &format!("/api/session/{code}/turn"),
            &json!({ "hostSecret": host_secret, "playerId": alice }),
        )
        .await;
    assert_eq!(resp.status(), 200);

    server
        .source
        .push(make_question("Q1", "physics", "medium", "42"));
    let resp = server
        .post(
            &format!("/api/session/{code}/question/activate"),
            &json!({ "hostSecret": host_secret, "category": "science", "difficulty": "medium" }),
        )
        .await;
    assert_eq!(resp.status(), 200);

    let resp = server
        .post(
            &format!("/api/session/{code}/question/mark"),
            &json!({ "hostSecret": host_secret, "result": "correct", "playerId": alice }),
        )
        .await;
    assert_eq!(resp.status(), 200);

    let snapshot = server.snapshot(&code).await;
    let players = snapshot["players"].as_array().unwrap();
    let score_of = |id: &str| {
        players
            .iter()
            .find(|p| p["playerId"] == id)
            .unwrap()["score"]
            .as_u64()
            .unwrap()
    };
    assert_eq!(score_of(&alice), 250);
    assert_eq!(score_of(&bob), 0);
    assert_eq!(snapshot["currentTurn"]["playerId"], bob.as_str());
    assert_eq!(snapshot["lastResult"]["answeredCorrectly"], true);
    assert_eq!(snapshot["lastResult"]["correctAnswer"], "42");
    assert_eq!(snapshot["lastResult"]["pointsAwarded"], 250);

    let entry = server.state.registry.get(&code).await.unwrap();
    let room = entry.room.lock().await;
    assert!(room.used_questions.contains("Q1"));
    // The slot records the requested group, not the provider sub-category.
    assert!(room.used_category_slots.contains("science|medium"));
}

/// Buzz race: one winner, clean rejection for the loser, reopen, second
/// attempt, incorrect-final. Alice holds the turn (and so is already burned
/// on this question); Bob and Carol race for the floor.
#[tokio::test]
async fn s2_buzz_race_and_reopen() {
    let server = TestServer::new().await;
    let (code, host_secret) = server.create_room().await;
    let _alice = server.join(&code, "Alice").await;
    let bob = server.join(&code, "Bob").await;
    let carol = server.join(&code, "Carol").await;

    server
        .source
        .push(make_question("Q2", "history", "hard", "1945"));
    server
        .post(
            &format!("/api/session/{code}/question/activate"),
            &json!({ "hostSecret": host_secret, "category": "history", "difficulty": "hard" }),
        )
        .await;
    server
        .post(
            &format!("/api/session/{code}/question/open"),
            &json!({ "hostSecret": host_secret }),
        )
        .await;

    // Both buzz; lock order decides, exactly one wins.
    let (first, second) = tokio::join!(
        commands::buzz(&server.state, &code, &bob),
        commands::buzz(&server.state, &code, &carol),
    );
    assert!(
        first.is_ok() != second.is_ok(),
        "exactly one buzz must win: {first:?} / {second:?}"
    );
    let (winner, loser) = if first.is_ok() {
        (bob.clone(), carol.clone())
    } else {
        (carol.clone(), bob.clone())
    };
    assert!(matches!(
        if first.is_ok() { &second } else { &first },
        Err(RoomError::BuzzNotAvailable)
    ));

    // Wrong answer, buzzers reopen; the winner is burned for this question.
    server
        .post(
            &format!("/api/session/{code}/question/mark"),
            &json!({ "hostSecret": host_secret, "result": "incorrect", "openBuzzers": true }),
        )
        .await;
    let snapshot = server.snapshot(&code).await;
    assert_eq!(snapshot["questionActive"], true);
    let attempted = snapshot["activeQuestion"]["attemptedPlayerIds"]
        .as_array()
        .unwrap();
    assert!(attempted.iter().any(|id| id == winner.as_str()));

    assert!(matches!(
        commands::buzz(&server.state, &code, &winner).await,
        Err(RoomError::AlreadyAttempted)
    ));
    commands::buzz(&server.state, &code, &loser).await.unwrap();

    // Second miss closes the question with nothing awarded.
    server
        .post(
            &format!("/api/session/{code}/question/mark"),
            &json!({ "hostSecret": host_secret, "result": "incorrect", "openBuzzers": false }),
        )
        .await;
    let snapshot = server.snapshot(&code).await;
    assert_eq!(snapshot["lastResult"]["answeredCorrectly"], false);
    assert_eq!(snapshot["lastResult"]["pointsAwarded"], 0);
    assert!(snapshot["activeQuestion"].is_null());

    let entry = server.state.registry.get(&code).await.unwrap();
    let room = entry.room.lock().await;
    assert!(room.used_questions.contains("Q2"));
    assert!(room.used_category_slots.contains("history|hard"));
    let active_was = room.last_result.as_ref().unwrap();
    assert!(active_was.answered_by.is_some());
}

/// Slot collision: concurrent activations of the same slot admit one winner,
/// and the slot stays burned afterwards.
#[tokio::test]
async fn s3_concurrent_activation_consumes_slot_once() {
    let server = TestServer::new().await;
    let (code, host_secret) = server.create_room().await;
    server.join(&code, "Alice").await;

    server
        .source
        .push(make_question("qa", "music", "easy", "Six"));
    server
        .source
        .push(make_question("qb", "music", "easy", "Six"));

    let (first, second) = tokio::join!(
        commands::activate_question(
            &server.state,
            &code,
            &host_secret,
            Some("music".into()),
            Some("easy".into()),
        ),
        commands::activate_question(
            &server.state,
            &code,
            &host_secret,
            Some("music".into()),
            Some("easy".into()),
        ),
    );
    assert!(
        first.is_ok() != second.is_ok(),
        "exactly one activation must commit: {first:?} / {second:?}"
    );
    let failure = if first.is_ok() { second } else { first };
    assert!(matches!(
        failure,
        Err(RoomError::QuestionAlreadyInPlay) | Err(RoomError::SlotAlreadyUsed)
    ));

    // Clear the live question; the slot must still refuse to reissue.
    server
        .post(
            &format!("/api/session/{code}/question/cancel"),
            &json!({ "hostSecret": host_secret }),
        )
        .await;
    server
        .source
        .push(make_question("qc", "music", "easy", "Six"));
    let resp = server
        .post(
            &format!("/api/session/{code}/question/activate"),
            &json!({ "hostSecret": host_secret, "category": "music", "difficulty": "easy" }),
        )
        .await;
    assert_eq!(resp.status(), 409);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(
        body["message"],
        "That category and difficulty was already played"
    );
}

/// A player leaving mid-question scrubs every reference to them but leaves
/// the question for the host to resolve.
#[tokio::test]
async fn s4_answering_player_leaves_mid_question() {
    let server = TestServer::new().await;
    let (code, host_secret) = server.create_room().await;
    let alice = server.join(&code, "Alice").await;
    let bob = server.join(&code, "Bob").await;
    let _carol = server.join(&code, "Carol").await;

    server
        .source
        .push(make_question("Q4", "geography", "medium", "Tokyo"));
    server
        .post(
            &format!("/api/session/{code}/question/activate"),
            &json!({ "hostSecret": host_secret }),
        )
        .await;
    server
        .post(
            &format!("/api/session/{code}/question/open"),
            &json!({ "hostSecret": host_secret }),
        )
        .await;
    commands::buzz(&server.state, &code, &bob).await.unwrap();

    let resp = server
        .post(
            &format!("/api/session/{code}/leave"),
            &json!({ "playerId": bob }),
        )
        .await;
    assert_eq!(resp.status(), 204);

    let snapshot = server.snapshot(&code).await;
    let active = &snapshot["activeQuestion"];
    assert!(!active.is_null());
    assert!(active["answeringPlayer"].is_null());
    assert_eq!(snapshot["questionActive"], false);
    assert!(snapshot["buzzedBy"].is_null());
    let attempted = active["attemptedPlayerIds"].as_array().unwrap();
    assert!(!attempted.iter().any(|id| id == bob.as_str()));
    assert_eq!(snapshot["currentTurn"]["playerId"], alice.as_str());

    // The host's escape hatch still works.
    let resp = server
        .post(
            &format!("/api/session/{code}/question/mark"),
            &json!({ "hostSecret": host_secret, "result": "incorrect", "openBuzzers": true }),
        )
        .await;
    assert_eq!(resp.status(), 200);
    let snapshot = server.snapshot(&code).await;
    assert_eq!(snapshot["questionActive"], true);
}

/// A buzz loser watching over WebSocket sees the winner's state, and a late
/// buzz from them is rejected with prose.
#[tokio::test]
async fn buzz_loser_gets_clean_rejection_over_ws() {
    let server = TestServer::new().await;
    let (code, host_secret) = server.create_room().await;
    let alice = server.join(&code, "Alice").await;
    let bob = server.join(&code, "Bob").await;

    let mut alice_ws = ws_connect(&server.ws_url(&code)).await;
    register_player(&mut alice_ws, &alice).await;
    let mut bob_ws = ws_connect(&server.ws_url(&code)).await;
    register_player(&mut bob_ws, &bob).await;

    server
        .source
        .push(make_question("Q5", "science", "easy", "Mars"));
    server
        .post(
            &format!("/api/session/{code}/question/activate"),
            &json!({ "hostSecret": host_secret }),
        )
        .await;
    server
        .post(
            &format!("/api/session/{code}/question/open"),
            &json!({ "hostSecret": host_secret }),
        )
        .await;

    // Bob wins the floor (Alice, on turn, is already burned).
    loop {
        let state = read_until_type(&mut bob_ws, "state").await;
        if state["payload"]["questionActive"] == true {
            break;
        }
    }
    ws_send(&mut bob_ws, &json!({ "type": "buzz" })).await;
    let state = read_until_type(&mut bob_ws, "state").await;
    assert_eq!(state["payload"]["buzzedBy"]["playerId"], bob.as_str());

    // Alice's late buzz fails with a human-readable error.
    ws_send(&mut alice_ws, &json!({ "type": "buzz" })).await;
    let err = read_until_type(&mut alice_ws, "error").await;
    assert_eq!(err["message"], "Buzzing is not available right now");
}
