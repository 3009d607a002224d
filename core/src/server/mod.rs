pub mod handler;
pub mod page;
pub mod protocol;
pub mod registry;
pub mod relay;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::get;
use tokio::net::TcpListener;

use crate::agent::{PromptBuilder, ToolRegistry};
use crate::config::Config;
use crate::providers::SharedModel;
use crate::tools::research_tools;

pub use protocol::{ClientRequest, Outbound, ProtocolError, ServerEvent};
pub use registry::{ConnectionRegistry, Session, SessionId, TurnGuard};
pub use relay::SessionRelay;

#[derive(Clone)]
pub struct AppState {
    pub registry: ConnectionRegistry,
    pub model: SharedModel,
    pub tools: Arc<ToolRegistry>,
    pub prompts: Arc<PromptBuilder>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(model: SharedModel, tools: Arc<ToolRegistry>, config: Config) -> Self {
        let specs = tools.specs_for(&research_tools()).unwrap_or_default();
        let prompts = PromptBuilder::new(config.language.clone()).with_tool_specs(specs);

        Self {
            registry: ConnectionRegistry::new(),
            model,
            tools,
            prompts: Arc::new(prompts),
            config: Arc::new(config),
        }
    }

    pub fn phase_delay(&self) -> Duration {
        Duration::from_millis(self.config.server.phase_delay_ms)
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(page::index))
        .route("/ws", get(handler::ws_handler))
        .with_state(state)
}

pub async fn serve(listener: TcpListener, state: AppState) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!(model = state.model.model(), "Search server listening on http://{}", addr);

    axum::serve(listener, router(state)).await?;
    Ok(())
}
