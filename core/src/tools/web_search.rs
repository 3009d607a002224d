use crate::tools::search::SearchProvider;
use crate::tools::{ParamSchema, extract_string_arg};
use crate::traits::{Tool, ToolResult};
use async_trait::async_trait;
use serde_json::Value;

pub struct WebSearchTool {
    provider: Box<dyn SearchProvider>,
    max_results: usize,
}

impl WebSearchTool {
    pub fn new(provider: Box<dyn SearchProvider>, max_results: usize) -> Self {
        Self {
            provider,
            max_results: max_results.max(1),
        }
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web. Returns a list of results with title, url and description."
    }

    fn parameters(&self) -> ParamSchema {
        ParamSchema::new().string("query", "Search query", 1..=100, true)
    }

    async fn execute(&self, args: Value) -> anyhow::Result<ToolResult> {
        let query = extract_string_arg(&args, "query")?;
        let results = self.provider.search(&query, self.max_results).await?;

        tracing::debug!(
            provider = self.provider.name(),
            %query,
            results = results.len(),
            "Web search finished"
        );

        Ok(ToolResult::success(serde_json::to_value(results)?))
    }
}
