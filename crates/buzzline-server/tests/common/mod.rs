use std::collections::{BTreeMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use buzzline_core::error::RoomError;
use buzzline_core::question::Question;
use buzzline_server::build_app_with_source;
use buzzline_server::config::ServerConfig;
use buzzline_server::questions::{QuestionQuery, QuestionSource};
use buzzline_server::state::AppState;

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Deterministic question source: hands out queued questions in order.
/// Empty queue behaves like an unreachable provider.
pub struct ScriptedQuestionSource {
    queue: Mutex<VecDeque<Question>>,
    categories: BTreeMap<String, Vec<String>>,
}

impl ScriptedQuestionSource {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            categories: BTreeMap::from([(
                "science".to_string(),
                vec!["physics".to_string(), "chemistry".to_string()],
            )]),
        }
    }

    pub fn push(&self, question: Question) {
        self.queue.lock().unwrap().push_back(question);
    }
}

#[async_trait]
impl QuestionSource for ScriptedQuestionSource {
    async fn fetch_categories(&self) -> Result<BTreeMap<String, Vec<String>>, RoomError> {
        Ok(self.categories.clone())
    }

    async fn fetch_question(&self, _query: &QuestionQuery) -> Result<Question, RoomError> {
        self.queue
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(RoomError::QuestionProviderUnavailable)
    }
}

pub fn make_question(id: &str, category: &str, difficulty: &str, correct: &str) -> Question {
    Question {
        id: id.to_string(),
        category: category.to_string(),
        difficulty: difficulty.to_string(),
        text: format!("Question {id}?"),
        correct_answer: correct.to_string(),
        incorrect_answers: vec!["7".to_string(), "12".to_string(), "99".to_string()],
    }
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub state: AppState,
    pub source: Arc<ScriptedQuestionSource>,
    _server: tokio::task::JoinHandle<()>,
}

impl TestServer {
    pub async fn new() -> Self {
        let source = Arc::new(ScriptedQuestionSource::new());
        let (app, state) = build_app_with_source(ServerConfig::default(), source.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Give the server a moment to start accepting
        tokio::time::sleep(Duration::from_millis(20)).await;

        Self {
            addr,
            state,
            source,
            _server: handle,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn ws_url(&self, room_code: &str) -> String {
        format!("ws://{}/ws/{room_code}", self.addr)
    }

    /// POST /api/session, returning (code, hostSecret).
    pub async fn create_room(&self) -> (String, String) {
        let resp = reqwest::Client::new()
            .post(format!("{}/api/session", self.base_url()))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 201);
        let body: Value = resp.json().await.unwrap();
        (
            body["code"].as_str().unwrap().to_string(),
            body["hostSecret"].as_str().unwrap().to_string(),
        )
    }

    /// POST /api/session/{code}/join, returning the player id.
    pub async fn join(&self, room_code: &str, name: &str) -> String {
        let resp = self
            .post(
                &format!("/api/session/{room_code}/join"),
                &json!({ "name": name }),
            )
            .await;
        assert_eq!(resp.status(), 201);
        let body: Value = resp.json().await.unwrap();
        body["playerId"].as_str().unwrap().to_string()
    }

    pub async fn post(&self, path: &str, body: &Value) -> reqwest::Response {
        reqwest::Client::new()
            .post(format!("{}{path}", self.base_url()))
            .json(body)
            .send()
            .await
            .unwrap()
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        reqwest::get(format!("{}{path}", self.base_url()))
            .await
            .unwrap()
    }

    /// GET /api/session/{code} parsed as JSON, asserting 200.
    pub async fn snapshot(&self, room_code: &str) -> Value {
        let resp = self.get(&format!("/api/session/{room_code}")).await;
        assert_eq!(resp.status(), 200);
        resp.json().await.unwrap()
    }
}

pub async fn ws_connect(url: &str) -> WsStream {
    let (stream, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    stream
}

pub async fn ws_send(stream: &mut WsStream, frame: &Value) {
    stream
        .send(Message::Text(frame.to_string().into()))
        .await
        .unwrap();
}

/// Read the next text frame as JSON (5s timeout). Panics on close.
pub async fn read_frame(stream: &mut WsStream) -> Value {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    return serde_json::from_str(text.as_str()).unwrap();
                },
                Some(Ok(Message::Close(_))) => panic!("WebSocket closed unexpectedly"),
                Some(Ok(_)) => continue,
                Some(Err(e)) => panic!("WebSocket error: {e}"),
                None => panic!("WebSocket stream ended"),
            }
        }
    })
    .await
    .expect("Timed out waiting for WebSocket frame")
}

/// Read frames until one has the given `type`, skipping the rest.
pub async fn read_until_type(stream: &mut WsStream, frame_type: &str) -> Value {
    for _ in 0..20 {
        let frame = read_frame(stream).await;
        if frame["type"] == frame_type {
            return frame;
        }
    }
    panic!("No {frame_type} frame within 20 messages");
}

/// Try to read a frame, returning None on timeout.
pub async fn try_read_frame(stream: &mut WsStream, timeout_ms: u64) -> Option<Value> {
    tokio::time::timeout(Duration::from_millis(timeout_ms), async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    return serde_json::from_str(text.as_str()).ok();
                },
                Some(Ok(Message::Close(_))) | None => return None,
                Some(Ok(_)) => continue,
                Some(Err(_)) => return None,
            }
        }
    })
    .await
    .ok()
    .flatten()
}

/// Register as the host and consume the `registered` + initial `state` frames.
pub async fn register_host(stream: &mut WsStream, host_secret: &str) -> Value {
    ws_send(
        stream,
        &json!({ "type": "register", "role": "host", "hostSecret": host_secret }),
    )
    .await;
    let registered = read_frame(stream).await;
    assert_eq!(registered["type"], "registered", "got: {registered}");
    assert_eq!(registered["role"], "host");
    read_until_type(stream, "state").await
}

/// Register as a player and consume the `registered` + initial `state` frames.
pub async fn register_player(stream: &mut WsStream, player_id: &str) -> Value {
    ws_send(
        stream,
        &json!({ "type": "register", "role": "player", "playerId": player_id }),
    )
    .await;
    let registered = read_frame(stream).await;
    assert_eq!(registered["type"], "registered", "got: {registered}");
    assert_eq!(registered["role"], "player");
    assert_eq!(registered["playerId"], player_id);
    read_until_type(stream, "state").await
}

/// Wait until the stream closes (or errors), draining anything pending.
pub async fn expect_close(stream: &mut WsStream) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(Ok(msg)) = stream.next().await {
            if matches!(msg, Message::Close(_)) {
                break;
            }
        }
    })
    .await
    .expect("Timed out waiting for close");
}
