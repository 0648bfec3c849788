//! HTTP link (§4.1.3): one session per `beeblink-sender-id` header, a whole
//! packet per request body, no framing or sync of its own since HTTP gives
//! the body length for free.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::dispatcher::Dispatcher;
use crate::proto::Packet;
use crate::session::Session;

const SENDER_ID_HEADER: &str = "beeblink-sender-id";

struct AppState {
    dispatcher: Arc<Dispatcher>,
    sessions: DashMap<String, Arc<Mutex<Session>>>,
    rom: Option<Vec<u8>>,
}

/// Runs the HTTP link until the process is killed; each `POST /request`
/// carries exactly one encoded packet in its body and returns exactly one
/// in its response (§4.1.3).
pub async fn serve(addr: SocketAddr, dispatcher: Arc<Dispatcher>, rom: Option<Vec<u8>>) -> std::io::Result<()> {
    let state = Arc::new(AppState { dispatcher, sessions: DashMap::new(), rom });
    let app = Router::new().route("/request", post(handle_request)).route("/beeblink.rom", get(handle_rom)).with_state(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "HTTP link listening");
    axum::serve(listener, app).await
}

async fn handle_request(State(state): State<Arc<AppState>>, headers: HeaderMap, body: Bytes) -> Response {
    let sender_id = match headers.get(SENDER_ID_HEADER).and_then(|value| value.to_str().ok()) {
        Some(id) => id.to_owned(),
        None => return (StatusCode::BAD_REQUEST, format!("missing {SENDER_ID_HEADER} header")).into_response(),
    };

    let packet = match Packet::decode_from_slice(&body) {
        Ok(packet) => packet,
        Err(err) => return (StatusCode::BAD_REQUEST, err.to_string()).into_response(),
    };

    let session = state.sessions.entry(sender_id.clone()).or_insert_with(|| Arc::new(Mutex::new(Session::new()))).clone();
    let mut session = session.lock().await;
    let (opcode, payload) = state.dispatcher.dispatch(&mut session, packet.opcode, &packet.payload).await;

    Packet::new(opcode, payload).encode().into_response()
}

async fn handle_rom(State(state): State<Arc<AppState>>) -> Response {
    match &state.rom {
        Some(rom) => rom.clone().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
