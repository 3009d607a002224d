use std::io::Write;

use console::style;
use delve_core::agent::{DriverEvent, Phase, PhaseTracker, ToolCallEvent, TurnObserver};

/// Streams a turn to the terminal: answer text on stdout, progress on stderr.
#[derive(Default)]
pub struct ConsoleObserver {
    tracker: PhaseTracker,
}

impl ConsoleObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self, phase: Phase) {
        self.tracker.begin_turn();
        self.tracker.set(phase);
        self.print_phase(phase);
    }

    pub fn enter(&mut self, phase: Phase) {
        let previous = self.tracker.current();
        self.tracker.set(phase);
        if previous != phase {
            self.print_phase(phase);
        }
    }

    fn advance(&mut self, event: DriverEvent) {
        let previous = self.tracker.current();
        let next = self.tracker.on_event(event);
        if next != previous {
            self.print_phase(next);
        }
    }

    fn print_phase(&self, phase: Phase) {
        eprintln!(
            "{}",
            style(format!("[{}/8] {}", phase.index() + 1, phase.label())).dim()
        );
    }
}

impl TurnObserver for ConsoleObserver {
    fn on_message(&mut self, fragment: &str) {
        print!("{}", fragment);
        let _ = std::io::stdout().flush();
    }

    fn on_first_token(&mut self) {
        self.advance(DriverEvent::FirstToken);
    }

    fn on_tool_call_start(&mut self, tool: &str) {
        eprintln!("\n{} {}", style("→").cyan(), style(tool).cyan().bold());
        self.advance(DriverEvent::ToolCallStart);
    }

    fn on_tool_call_end(&mut self, event: &ToolCallEvent) {
        if event.outcome.is_success() {
            eprintln!("{} {}", style("✓").green(), event.tool);
        } else {
            eprintln!("{} {}", style("✗").red(), event.tool);
        }
        self.advance(DriverEvent::ToolCallEnd);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use delve_core::agent::ToolOutcome;

    fn finished(tool: &str) -> ToolCallEvent {
        ToolCallEvent {
            tool: tool.to_string(),
            arguments: "{}".to_string(),
            outcome: ToolOutcome::Failure("timed out".to_string()),
        }
    }

    #[test]
    fn follows_the_turn_through_its_phases() {
        let mut observer = ConsoleObserver::new();
        observer.begin(Phase::Analysis);
        observer.enter(Phase::WebSearch);
        assert_eq!(observer.tracker.current(), Phase::WebSearch);

        observer.on_first_token();
        assert_eq!(observer.tracker.current(), Phase::DataOrganization);

        observer.on_tool_call_start("web_search");
        assert_eq!(observer.tracker.current(), Phase::WebSearch);
        observer.on_tool_call_end(&finished("web_search"));
        assert_eq!(observer.tracker.current(), Phase::SourceEvaluation);

        observer.on_tool_call_start("fetch_website_content");
        assert_eq!(observer.tracker.current(), Phase::ContentGathering);
    }

    #[test]
    fn begin_resets_the_tool_alternation() {
        let mut observer = ConsoleObserver::new();
        observer.begin(Phase::Analysis);
        observer.on_tool_call_start("web_search");

        observer.begin(Phase::Analysis);
        assert_eq!(observer.tracker.current(), Phase::Analysis);
        observer.on_tool_call_start("web_search");
        assert_eq!(observer.tracker.current(), Phase::WebSearch);
    }
}
