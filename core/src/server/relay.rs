use crate::agent::{DriverEvent, Phase, ToolCallEvent, TurnObserver};
use crate::server::protocol::{Outbound, ServerEvent};
use crate::server::registry::{ConnectionRegistry, Session, SessionId};

/// Forwards a turn's progress to one session. Everything is looked up by id on
/// each call, so output is dropped quietly once the client disconnects.
pub struct SessionRelay {
    registry: ConnectionRegistry,
    session_id: SessionId,
}

impl SessionRelay {
    pub fn new(registry: ConnectionRegistry, session_id: SessionId) -> Self {
        Self {
            registry,
            session_id,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn text(&self, text: impl Into<String>) -> bool {
        self.registry
            .deliver(&self.session_id, Outbound::Text(text.into()))
    }

    pub fn event(&self, event: ServerEvent) -> bool {
        self.registry.deliver(&self.session_id, event)
    }

    pub fn enter(&self, phase: Phase) {
        if let Some(session) = self.registry.get(&self.session_id) {
            session.set_phase(phase);
            session.send(ServerEvent::phase(phase));
        }
    }

    pub fn announce(&self, phase: Phase) {
        if let Some(session) = self.registry.get(&self.session_id) {
            session.set_phase(phase);
            Self::send_phase(&session, phase);
        }
    }

    fn send_phase(session: &Session, phase: Phase) {
        session.send(ServerEvent::phase(phase));
        if let Some(text) = phase.announcement() {
            session.send(Outbound::Text(text.to_string()));
        }
    }

    fn advance(&self, event: DriverEvent) {
        if let Some(session) = self.registry.get(&self.session_id) {
            let phase = session.on_driver_event(event);
            Self::send_phase(&session, phase);
        }
    }
}

impl TurnObserver for SessionRelay {
    fn on_message(&mut self, fragment: &str) {
        self.text(fragment);
    }

    fn on_first_token(&mut self) {
        self.advance(DriverEvent::FirstToken);
    }

    fn on_tool_call_start(&mut self, _tool: &str) {
        self.advance(DriverEvent::ToolCallStart);
    }

    fn on_tool_call_end(&mut self, event: &ToolCallEvent) {
        self.event(ServerEvent::ToolCall {
            tool: event.tool.clone(),
            success: event.outcome.is_success(),
        });
        self.advance(DriverEvent::ToolCallEnd);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::ToolOutcome;
    use tokio::sync::mpsc;

    fn drain(rx: &mut mpsc::UnboundedReceiver<Outbound>) -> Vec<Outbound> {
        std::iter::from_fn(|| rx.try_recv().ok()).collect()
    }

    #[test]
    fn tool_calls_alternate_phase_labels() {
        let registry = ConnectionRegistry::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let session = registry.register(tx);
        assert!(session.try_begin_turn());

        let mut relay = SessionRelay::new(registry.clone(), session.id().to_string());
        relay.on_tool_call_start("web_search");
        relay.on_tool_call_end(&ToolCallEvent {
            tool: "web_search".into(),
            arguments: "{}".into(),
            outcome: ToolOutcome::Success(serde_json::json!([])),
        });
        relay.on_tool_call_start("fetch_website_content");

        let phases: Vec<u8> = drain(&mut rx)
            .into_iter()
            .filter_map(|f| match f {
                Outbound::Event(ServerEvent::PhaseUpdate { phase }) => Some(phase),
                _ => None,
            })
            .collect();
        assert_eq!(phases, vec![2, 3, 4]);
    }

    #[test]
    fn fragments_keep_their_order() {
        let registry = ConnectionRegistry::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let session = registry.register(tx);
        let mut relay = SessionRelay::new(registry, session.id().to_string());

        for f in ["a", "b", "c"] {
            relay.on_message(f);
        }
        assert_eq!(
            drain(&mut rx),
            vec![
                Outbound::Text("a".into()),
                Outbound::Text("b".into()),
                Outbound::Text("c".into())
            ]
        );
    }

    #[test]
    fn output_after_disconnect_is_dropped() {
        let registry = ConnectionRegistry::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let session = registry.register(tx);
        let mut relay = SessionRelay::new(registry.clone(), session.id().to_string());

        registry.remove(session.id());
        relay.on_message("late");
        relay.on_first_token();
        relay.announce(Phase::SummaryGeneration);

        assert!(drain(&mut rx).is_empty());
        assert!(!relay.event(ServerEvent::SearchComplete));
    }

    #[test]
    fn enter_sends_only_the_event() {
        let registry = ConnectionRegistry::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let session = registry.register(tx);
        let relay = SessionRelay::new(registry, session.id().to_string());

        relay.enter(Phase::WebSearch);
        assert_eq!(drain(&mut rx), vec![Outbound::Event(ServerEvent::phase(Phase::WebSearch))]);
        assert_eq!(session.phase(), Phase::WebSearch);
    }
}
