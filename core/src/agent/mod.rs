pub mod context;
pub mod driver;
pub mod phase;
pub mod registry;

pub use context::PromptBuilder;
pub use driver::{
    ConversationDriver, NullObserver, ToolCallEvent, ToolOutcome, TurnObserver, TurnRequest,
    TurnState, TurnSummary,
};
pub use phase::{DriverEvent, Phase, PhaseTracker, ToolCallKind};
pub use registry::ToolRegistry;
