use crate::config::SearchConfig;
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use html_scraper::{Html, Selector};
use serde::{Deserialize, Serialize};

pub const DUCKDUCKGO_HTML_ENDPOINT: &str = "https://html.duckduckgo.com/html/";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub description: String,
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>>;
}

pub struct DuckDuckGoSearch {
    client: reqwest::Client,
    endpoint: String,
}

impl DuckDuckGoSearch {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            endpoint: DUCKDUCKGO_HTML_ENDPOINT.to_string(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

fn collapse_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Result links point at a `/l/?uddg=<target>` redirect; unwrap it when present.
fn decode_result_href(href: &str) -> Option<String> {
    let base = url::Url::parse("https://duckduckgo.com/").ok()?;
    let parsed = base.join(href).ok()?;

    if parsed.path().starts_with("/l/")
        && let Some((_, target)) = parsed.query_pairs().find(|(k, _)| k == "uddg")
    {
        return Some(target.into_owned());
    }

    matches!(parsed.scheme(), "http" | "https").then(|| parsed.to_string())
}

pub(crate) fn parse_duckduckgo_html(html: &str, max_results: usize) -> Vec<SearchResult> {
    let doc = Html::parse_document(html);
    let (Some(result_sel), Some(link_sel), Some(snippet_sel)) = (
        selector("div.result"),
        selector("a.result__a"),
        selector(".result__snippet"),
    ) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for result in doc.select(&result_sel) {
        if out.len() >= max_results {
            break;
        }
        if result.value().classes().any(|c| c == "result--ad") {
            continue;
        }
        let Some(link) = result.select(&link_sel).next() else {
            continue;
        };
        let Some(url) = link.value().attr("href").and_then(decode_result_href) else {
            continue;
        };

        let title = collapse_ws(&link.text().collect::<String>());
        let description = result
            .select(&snippet_sel)
            .next()
            .map(|s| collapse_ws(&s.text().collect::<String>()))
            .unwrap_or_default();

        out.push(SearchResult {
            title,
            url,
            description,
        });
    }
    out
}

#[async_trait]
impl SearchProvider for DuckDuckGoSearch {
    fn name(&self) -> &str {
        "duckduckgo"
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>> {
        let response = self
            .client
            .post(&self.endpoint)
            .form(&[("q", query), ("kl", "wt-wt")])
            .send()
            .await
            .context("DuckDuckGo request failed")?;

        let status = response.status();
        if !status.is_success() {
            bail!("DuckDuckGo search HTTP {}", status);
        }

        let body = response.text().await?;
        Ok(parse_duckduckgo_html(&body, max_results))
    }
}

#[derive(Debug, Deserialize)]
struct SearxngResponse {
    #[serde(default)]
    results: Vec<SearxngResult>,
}

#[derive(Debug, Deserialize)]
struct SearxngResult {
    url: Option<String>,
    title: Option<String>,
    content: Option<String>,
}

pub struct SearxngSearch {
    client: reqwest::Client,
    endpoint: String,
}

impl SearxngSearch {
    pub fn new(client: reqwest::Client, endpoint: &str) -> Self {
        let mut endpoint = endpoint.trim().trim_end_matches('/').to_string();
        if !endpoint.ends_with("/search") {
            endpoint.push_str("/search");
        }
        Self { client, endpoint }
    }
}

#[async_trait]
impl SearchProvider for SearxngSearch {
    fn name(&self) -> &str {
        "searxng"
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("q", query), ("format", "json")])
            .send()
            .await
            .context("SearXNG request failed")?;

        let status = response.status();
        if !status.is_success() {
            bail!("SearXNG search HTTP {}", status);
        }

        let parsed: SearxngResponse = response
            .json()
            .await
            .context("Failed to parse SearXNG response")?;

        Ok(parsed
            .results
            .into_iter()
            .filter_map(|r| {
                Some(SearchResult {
                    url: r.url?,
                    title: r.title.unwrap_or_default(),
                    description: r.content.unwrap_or_default(),
                })
            })
            .take(max_results)
            .collect())
    }
}

pub fn create_search_provider(
    config: &SearchConfig,
    client: reqwest::Client,
) -> Result<Box<dyn SearchProvider>> {
    match config.provider.to_lowercase().as_str() {
        "duckduckgo" | "" => Ok(Box::new(DuckDuckGoSearch::new(client))),
        "searxng" => {
            let endpoint = config
                .searxng_endpoint
                .as_deref()
                .filter(|e| !e.trim().is_empty())
                .context("search.searxng_endpoint must be set for the searxng provider")?;
            Ok(Box::new(SearxngSearch::new(client, endpoint)))
        }
        other => bail!(
            "Unknown search provider: '{}'. Supported: duckduckgo, searxng",
            other
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, routing::get, routing::post};

    const DDG_FIXTURE: &str = r##"
<html><body>
  <div class="result results_links result--ad">
    <a class="result__a" href="https://ads.example/buy">Buy now</a>
    <a class="result__snippet">Sponsored</a>
  </div>
  <div class="result results_links">
    <h2 class="result__title">
      <a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fwww.rust-lang.org%2F&amp;rut=abc">
        Rust   Programming Language</a>
    </h2>
    <a class="result__snippet" href="#">A language empowering <b>everyone</b>.</a>
  </div>
  <div class="result results_links">
    <a class="result__a" href="https://tokio.rs/">Tokio</a>
  </div>
  <div class="result results_links">
    <a class="result__a" href="javascript:void(0)">Broken</a>
  </div>
</body></html>"##;

    #[test]
    fn parses_duckduckgo_results() {
        let results = parse_duckduckgo_html(DDG_FIXTURE, 10);
        assert_eq!(
            results,
            vec![
                SearchResult {
                    title: "Rust Programming Language".into(),
                    url: "https://www.rust-lang.org/".into(),
                    description: "A language empowering everyone.".into(),
                },
                SearchResult {
                    title: "Tokio".into(),
                    url: "https://tokio.rs/".into(),
                    description: String::new(),
                },
            ]
        );
    }

    #[test]
    fn respects_max_results() {
        assert_eq!(parse_duckduckgo_html(DDG_FIXTURE, 1).len(), 1);
        assert!(parse_duckduckgo_html("<html></html>", 5).is_empty());
    }

    #[test]
    fn factory_validates_config() {
        let client = reqwest::Client::new();
        let ddg = create_search_provider(&SearchConfig::default(), client.clone()).unwrap();
        assert_eq!(ddg.name(), "duckduckgo");

        let missing = SearchConfig {
            provider: "searxng".into(),
            ..SearchConfig::default()
        };
        assert!(create_search_provider(&missing, client.clone()).is_err());

        let unknown = SearchConfig {
            provider: "altavista".into(),
            ..SearchConfig::default()
        };
        assert!(create_search_provider(&unknown, client).is_err());
    }

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn duckduckgo_against_fixture_server() {
        let base = serve(Router::new().route("/html/", post(|| async { DDG_FIXTURE }))).await;
        let ddg = DuckDuckGoSearch::new(reqwest::Client::new()).with_endpoint(format!("{base}/html/"));

        let results = ddg.search("rust", 10).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[1].url, "https://tokio.rs/");
    }

    #[tokio::test]
    async fn searxng_against_fixture_server() {
        let app = Router::new().route(
            "/search",
            get(|| async {
                Json(serde_json::json!({
                    "results": [
                        {"url": "https://example.com", "title": "Example", "content": "Hello"},
                        {"title": "no url"},
                        {"url": "https://example.org", "title": "Org"}
                    ]
                }))
            }),
        );
        let base = serve(app).await;
        let searx = SearxngSearch::new(reqwest::Client::new(), &format!("{base}/"));

        let results = searx.search("anything", 5).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].description, "Hello");
        assert_eq!(results[1].description, "");
    }
}
