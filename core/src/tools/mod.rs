use crate::agent::ToolRegistry;
use crate::config::Config;
use anyhow::Context;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

pub mod extract;
pub mod news;
pub mod schema;
pub mod search;
pub mod web_content;
pub mod web_search;

pub use news::{FetchNewsTool, GoogleNewsClient, NewsItem, NewsQuery};
pub use schema::{ParamField, ParamKind, ParamSchema};
pub use search::{SearchProvider, SearchResult, create_search_provider};
pub use web_content::WebContentTool;
pub use web_search::WebSearchTool;

pub const WEB_SEARCH: &str = "web_search";
pub const FETCH_WEBSITE_CONTENT: &str = "fetch_website_content";
pub const FETCH_NEWS: &str = "fetch_news";

pub fn research_tools() -> Vec<String> {
    vec![WEB_SEARCH.to_string(), FETCH_WEBSITE_CONTENT.to_string()]
}

pub fn news_tools() -> Vec<String> {
    vec![FETCH_NEWS.to_string()]
}

pub fn extract_string_arg(args: &Value, key: &str) -> anyhow::Result<String> {
    args.get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow::anyhow!("Missing '{}' parameter", key))
        .map(|s| s.to_string())
}

pub fn build_http_client(config: &Config) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.tools.http_timeout_secs))
        .user_agent(config.tools.user_agent.clone())
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()
        .context("Failed to build HTTP client for tools")
}

pub fn build_default_registry(config: &Config) -> anyhow::Result<ToolRegistry> {
    let client = build_http_client(config)?;
    let mut registry = ToolRegistry::new();

    let search = create_search_provider(&config.search, client.clone())?;
    registry.register(Arc::new(WebSearchTool::new(search, config.search.max_results)))?;
    registry.register(Arc::new(WebContentTool::new(client.clone(), &config.content)))?;
    registry.register(Arc::new(FetchNewsTool::new(GoogleNewsClient::new(
        client,
        &config.news,
    ))))?;

    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_has_the_three_tools() {
        let registry = build_default_registry(&Config::default()).unwrap();
        let mut names = registry.names();
        names.sort();
        assert_eq!(names, vec![FETCH_NEWS, FETCH_WEBSITE_CONTENT, WEB_SEARCH]);

        assert!(registry.specs_for(&research_tools()).is_ok());
        assert!(registry.specs_for(&news_tools()).is_ok());
    }

    #[test]
    fn advertised_schemas_carry_bounds() {
        let registry = build_default_registry(&Config::default()).unwrap();
        let specs = registry.specs_for(&[FETCH_NEWS.to_string()]).unwrap();
        let schema = &specs[0].parameters_schema;

        assert_eq!(schema["properties"]["country"]["minLength"], 2);
        assert_eq!(schema["properties"]["country"]["maxLength"], 2);
        assert_eq!(schema["required"], serde_json::json!(["country", "language"]));
    }

    #[test]
    fn extract_string_arg_reports_missing_keys() {
        let args = serde_json::json!({ "query": "rust" });
        assert_eq!(extract_string_arg(&args, "query").unwrap(), "rust");
        assert!(extract_string_arg(&args, "url").is_err());
    }
}
