use crate::config::ContentConfig;
use crate::tools::extract::extract_article;
use crate::tools::{ParamSchema, extract_string_arg};
use crate::traits::{Tool, ToolResult};
use async_trait::async_trait;
use serde_json::{Value, json};

pub const UNREADABLE_PAGE: &str =
    "Could not retrieve website content. Check that the URL is correct.";

pub struct WebContentTool {
    client: reqwest::Client,
    min_chars: usize,
    max_chars: usize,
}

impl WebContentTool {
    pub fn new(client: reqwest::Client, config: &ContentConfig) -> Self {
        Self {
            client,
            min_chars: config.min_chars,
            max_chars: config.max_chars,
        }
    }
}

#[async_trait]
impl Tool for WebContentTool {
    fn name(&self) -> &str {
        "fetch_website_content"
    }

    fn description(&self) -> &str {
        "Fetch a web page and return its title and main content as Markdown."
    }

    fn parameters(&self) -> ParamSchema {
        ParamSchema::new().string("url", "Absolute http(s) URL of the page", 1..=2048, true)
    }

    async fn execute(&self, args: Value) -> anyhow::Result<ToolResult> {
        let raw = extract_string_arg(&args, "url")?;

        let url = match url::Url::parse(raw.trim()) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => url,
            _ => return Ok(ToolResult::failure(UNREADABLE_PAGE)),
        };

        let response = self.client.get(url.as_str()).send().await?;
        let status = response.status();
        if !status.is_success() {
            tracing::debug!(%url, %status, "Page fetch returned an error status");
            return Ok(ToolResult::failure(UNREADABLE_PAGE));
        }

        let html = response.text().await?;
        let Some(article) = extract_article(&html, self.min_chars, self.max_chars) else {
            tracing::debug!(%url, "No readable main content");
            return Ok(ToolResult::failure(UNREADABLE_PAGE));
        };

        Ok(ToolResult::success(json!({
            "title": article.title,
            "content": article.markdown,
            "url": url.as_str(),
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::http::StatusCode;
    use axum::response::Html;
    use axum::routing::get;

    const PAGE: &str = r#"<html><head><title>Tokio tutorial</title></head><body>
        <main><h2>Spawning</h2><p>Tasks are the unit of execution managed by the scheduler.
        Spawning a task submits it to the Tokio scheduler, which then ensures that the task
        executes when it has work to do.</p></main></body></html>"#;

    async fn fixture() -> String {
        let app = Router::new()
            .route("/page", get(|| async { Html(PAGE) }))
            .route("/thin", get(|| async { Html("<html><body><p>hi</p></body></html>") }))
            .route("/gone", get(|| async { (StatusCode::NOT_FOUND, "missing") }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{addr}")
    }

    fn tool() -> WebContentTool {
        WebContentTool::new(reqwest::Client::new(), &ContentConfig::default())
    }

    #[tokio::test]
    async fn returns_title_markdown_and_url() {
        let base = fixture().await;
        let result = tool()
            .execute(json!({ "url": format!("{base}/page") }))
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.output["title"], "Tokio tutorial");
        assert_eq!(result.output["url"], format!("{base}/page"));
        let content = result.output["content"].as_str().unwrap();
        assert!(content.contains("## Spawning"));
    }

    #[tokio::test]
    async fn unreadable_pages_are_soft_failures() {
        let base = fixture().await;
        for path in ["/thin", "/gone"] {
            let result = tool()
                .execute(json!({ "url": format!("{base}{path}") }))
                .await
                .unwrap();
            assert!(!result.success, "{path}");
            assert_eq!(result.error.as_deref(), Some(UNREADABLE_PAGE));
        }
    }

    #[tokio::test]
    async fn non_http_urls_are_rejected_without_fetching() {
        for url in ["ftp://example.com/file", "not a url", "file:///etc/passwd"] {
            let result = tool().execute(json!({ "url": url })).await.unwrap();
            assert!(!result.success);
        }
    }
}
