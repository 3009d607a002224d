use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::agent::{ConversationDriver, Phase, TurnRequest, TurnSummary};
use crate::error::TurnError;
use crate::server::AppState;
use crate::server::protocol::{ClientRequest, Outbound, ProtocolError, ServerEvent, parse_request};
use crate::server::registry::{Session, TurnGuard};
use crate::server::relay::SessionRelay;
use crate::tools::research_tools;

pub const OPENING_BANNER: &str = "========== Starting deep research ==========\n\n";
pub const CLOSING_BANNER: &str = "\n\n========== Deep research complete ==========";
pub const BUSY_MESSAGE: &str =
    "a search is already running for this session; wait for it to finish";

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sink, mut stream) = socket.split();

    let (tx, mut rx) = mpsc::unbounded_channel::<Outbound>();
    let session = state.registry.register(tx);
    let session_id = session.id().to_string();
    tracing::info!(session = %session_id, "Client connected");

    // Single writer per socket keeps frames in the order they were queued.
    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let text = match frame.into_frame() {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(error = %e, "Dropping unserializable frame");
                    continue;
                }
            };
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    session.send(ServerEvent::Connected {
        session_id: session_id.clone(),
    });

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => on_message(&state, &session, &text),
            Ok(Message::Binary(_)) => {
                tracing::warn!(session = %session_id, error = %ProtocolError::Binary, "Ignoring client frame");
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(session = %session_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    state.registry.remove(&session_id);
    drop(session);
    writer.abort();
    tracing::info!(
        session = %session_id,
        active = state.registry.len(),
        "Client disconnected"
    );
}

fn on_message(state: &AppState, session: &Arc<Session>, text: &str) {
    let query = match parse_request(text) {
        Ok(ClientRequest::Search { query }) => query,
        Err(e) => {
            tracing::warn!(session = %session.id(), error = %e, "Ignoring client message");
            return;
        }
    };

    let Some(turn) = state.registry.try_begin_turn(session.id()) else {
        tracing::info!(session = %session.id(), "Rejecting search while a turn is running");
        session.send(ServerEvent::error(BUSY_MESSAGE));
        return;
    };

    let relay = SessionRelay::new(state.registry.clone(), session.id().to_string());
    tokio::spawn(run_search(state.clone(), relay, turn, query));
}

async fn run_search(
    state: AppState,
    mut relay: SessionRelay,
    turn: TurnGuard,
    query: String,
) {
    tracing::info!(session = %relay.session_id(), %query, "Search started");

    let result = research_turn(&state, &mut relay, &query).await;

    // Released before the final event goes out; the client may search again on receipt.
    drop(turn);

    match result {
        Ok(summary) => {
            tracing::info!(
                session = %relay.session_id(),
                rounds = summary.rounds,
                tool_calls = summary.tool_calls.len(),
                "Search complete"
            );
            relay.event(ServerEvent::SearchComplete);
        }
        Err(e) => {
            tracing::warn!(session = %relay.session_id(), error = %e, "Search failed");
            relay.event(ServerEvent::error(e.to_string()));
        }
    }
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

async fn research_turn(
    state: &AppState,
    relay: &mut SessionRelay,
    query: &str,
) -> Result<TurnSummary, TurnError> {
    let model = state.model.ready().await?;
    let delay = state.phase_delay();

    relay.text(OPENING_BANNER);
    relay.announce(Phase::Analysis);
    pause(delay).await;
    relay.announce(Phase::QueryGeneration);
    pause(delay).await;
    relay.enter(Phase::WebSearch);

    let driver = ConversationDriver::new(model, state.tools.clone())
        .with_max_iterations(state.config.max_iterations)
        .with_system_prompt(state.prompts.build_system_prompt());
    let request = TurnRequest::new(state.prompts.research_prompt(query), research_tools());
    let summary = driver.run(&request, relay).await?;

    relay.announce(Phase::SummaryGeneration);
    pause(delay).await;
    relay.text(CLOSING_BANNER);

    Ok(summary)
}
