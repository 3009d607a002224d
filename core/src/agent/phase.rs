use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Analysis,
    QueryGeneration,
    WebSearch,
    SourceEvaluation,
    ContentGathering,
    InfoExtraction,
    DataOrganization,
    SummaryGeneration,
}

impl Phase {
    pub const ALL: [Phase; 8] = [
        Phase::Analysis,
        Phase::QueryGeneration,
        Phase::WebSearch,
        Phase::SourceEvaluation,
        Phase::ContentGathering,
        Phase::InfoExtraction,
        Phase::DataOrganization,
        Phase::SummaryGeneration,
    ];

    /// Position on the wire (`phase_update.phase`).
    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(usize::from(index)).copied()
    }

    pub fn label(self) -> &'static str {
        match self {
            Phase::Analysis => "Requirement analysis",
            Phase::QueryGeneration => "Query generation",
            Phase::WebSearch => "Web search",
            Phase::SourceEvaluation => "Source evaluation",
            Phase::ContentGathering => "Content gathering",
            Phase::InfoExtraction => "Key information extraction",
            Phase::DataOrganization => "Data organization",
            Phase::SummaryGeneration => "Summary generation",
        }
    }

    pub fn announcement(self) -> Option<&'static str> {
        match self {
            Phase::Analysis => Some("Analyzing the query...\n"),
            Phase::QueryGeneration => Some("Working out the best search queries...\n"),
            Phase::WebSearch => Some("\n[Searching the web...]\n"),
            Phase::SourceEvaluation => Some("[Source evaluation complete]\n\n"),
            Phase::ContentGathering => Some("\n[Gathering page content...]\n"),
            Phase::InfoExtraction => None,
            Phase::DataOrganization => Some("\nOrganizing the collected data...\n\n"),
            Phase::SummaryGeneration => Some("\n\nWriting the final report...\n"),
        }
    }
}

/// Which kind of tool call the next `ToolCallStart` is assumed to be. The
/// tracker cannot see the tool name before the model commits to it, so it
/// alternates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToolCallKind {
    #[default]
    Search,
    Content,
}

impl ToolCallKind {
    pub fn toggled(self) -> Self {
        match self {
            ToolCallKind::Search => ToolCallKind::Content,
            ToolCallKind::Content => ToolCallKind::Search,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverEvent {
    FirstToken,
    ToolCallStart,
    ToolCallEnd,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseTracker {
    current: Phase,
    last_tool_call: ToolCallKind,
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self {
            current: Phase::Analysis,
            last_tool_call: ToolCallKind::Search,
        }
    }
}

impl PhaseTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Phase {
        self.current
    }

    pub fn last_tool_call(&self) -> ToolCallKind {
        self.last_tool_call
    }

    pub fn begin_turn(&mut self) -> Phase {
        *self = Self::default();
        self.current
    }

    pub fn set(&mut self, phase: Phase) -> Phase {
        self.current = phase;
        phase
    }

    pub fn on_event(&mut self, event: DriverEvent) -> Phase {
        self.current = match event {
            DriverEvent::FirstToken => Phase::DataOrganization,
            DriverEvent::ToolCallStart => {
                let phase = match self.last_tool_call {
                    ToolCallKind::Search => Phase::WebSearch,
                    ToolCallKind::Content => Phase::ContentGathering,
                };
                self.last_tool_call = self.last_tool_call.toggled();
                phase
            }
            DriverEvent::ToolCallEnd => Phase::SourceEvaluation,
        };
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_match_wire_order() {
        for (i, phase) in Phase::ALL.iter().enumerate() {
            assert_eq!(usize::from(phase.index()), i);
            assert_eq!(Phase::from_index(i as u8), Some(*phase));
        }
        assert_eq!(Phase::WebSearch.index(), 2);
        assert_eq!(Phase::from_index(8), None);
    }

    #[test]
    fn first_token_is_always_data_organization() {
        let mut tracker = PhaseTracker::new();
        assert_eq!(tracker.on_event(DriverEvent::FirstToken), Phase::DataOrganization);
        tracker.on_event(DriverEvent::ToolCallStart);
        assert_eq!(tracker.on_event(DriverEvent::FirstToken), Phase::DataOrganization);
    }

    #[test]
    fn tool_call_starts_alternate_from_web_search() {
        let mut tracker = PhaseTracker::new();
        let phases: Vec<_> = (0..5)
            .map(|_| {
                let start = tracker.on_event(DriverEvent::ToolCallStart);
                assert_eq!(tracker.on_event(DriverEvent::ToolCallEnd), Phase::SourceEvaluation);
                start
            })
            .collect();

        assert_eq!(
            phases,
            vec![
                Phase::WebSearch,
                Phase::ContentGathering,
                Phase::WebSearch,
                Phase::ContentGathering,
                Phase::WebSearch,
            ]
        );
    }

    #[test]
    fn begin_turn_resets_the_alternation() {
        let mut tracker = PhaseTracker::new();
        tracker.on_event(DriverEvent::ToolCallStart);
        assert_eq!(tracker.last_tool_call(), ToolCallKind::Content);

        assert_eq!(tracker.begin_turn(), Phase::Analysis);
        assert_eq!(tracker.last_tool_call(), ToolCallKind::Search);
        assert_eq!(tracker.on_event(DriverEvent::ToolCallStart), Phase::WebSearch);
    }

    #[test]
    fn scripted_phases_can_be_set() {
        let mut tracker = PhaseTracker::new();
        assert_eq!(tracker.set(Phase::SummaryGeneration), Phase::SummaryGeneration);
        assert_eq!(tracker.current(), Phase::SummaryGeneration);
    }
}
