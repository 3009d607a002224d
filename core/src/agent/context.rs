use std::fmt::Write;

use crate::traits::ToolSpec;

#[derive(Debug, Clone)]
pub struct PromptBuilder {
    language: String,
    tool_specs: Vec<ToolSpec>,
}

impl PromptBuilder {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            tool_specs: vec![],
        }
    }

    pub fn with_tool_specs(mut self, tool_specs: Vec<ToolSpec>) -> Self {
        self.tool_specs = tool_specs;
        self
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn build_system_prompt(&self) -> String {
        let mut parts = vec![
            "You are a research assistant. You answer by searching the web and reading \
             the pages you find, and you never invent sources."
                .to_string(),
        ];

        if let Some(tools) = self.get_tool_overview() {
            parts.push(tools);
        }
        parts.push(self.get_runtime_context());

        parts.join("\n\n---\n\n")
    }

    fn get_tool_overview(&self) -> Option<String> {
        if self.tool_specs.is_empty() {
            return None;
        }

        let mut overview = String::from("## Available Tools\n\n");
        for tool in &self.tool_specs {
            let _ = writeln!(overview, "- **{}**: {}", tool.name, tool.description);
        }
        Some(overview)
    }

    fn get_runtime_context(&self) -> String {
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M (%A)");

        format!(
            "## Runtime Context

### Current Time
{}

### Language
Search and answer in {} unless the user's wording calls for another language.",
            timestamp, self.language
        )
    }

    pub fn research_prompt(&self, query: &str) -> String {
        format!(
            "The user wants to research \"{query}\". Search with the queries best suited \
             to it, keeping the user's own wording where you can rather than translating it. \
             Search in {lang} by default. When a result looks detailed enough to matter, \
             fetch that page and check its content. Cite the URLs your summary is based on. \
             Output only the summary.",
            lang = self.language
        )
    }

    pub fn news_prompt(&self, topic: Option<&str>) -> String {
        match topic.map(str::trim).filter(|t| !t.is_empty()) {
            Some(topic) => format!(
                "Summarize the latest news about {topic}. Write the summary in {}.",
                self.language
            ),
            None => format!(
                "Summarize today's top news. Write the summary in {}.",
                self.language
            ),
        }
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new("English")
    }
}
