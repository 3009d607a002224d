pub mod agent;
pub mod config;
pub mod error;
pub mod providers;
pub mod server;
pub mod tools;
pub mod traits;

pub use agent::{
    ConversationDriver, Phase, PhaseTracker, PromptBuilder, ToolCallEvent, ToolOutcome,
    ToolRegistry, TurnObserver, TurnRequest, TurnSummary,
};
pub use config::{Config, get_config_path, get_delve_dir, load_config, save_config};
pub use error::{FieldViolation, ModelLoadError, ToolError, TurnError};
pub use providers::{ModelHandle, SharedModel, create_provider};
pub use server::{AppState, router, serve};
pub use tools::{build_default_registry, news_tools, research_tools};
pub use traits::*;
