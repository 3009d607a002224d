use crate::config::NewsConfig;
use crate::tools::{ParamSchema, extract_string_arg};
use crate::traits::{Tool, ToolResult};
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    items: Vec<RssItem>,
}

#[derive(Debug, Deserialize)]
struct RssItem {
    title: Option<String>,
    link: Option<String>,
    description: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    source: Option<RssSource>,
}

#[derive(Debug, Deserialize)]
struct RssSource {
    #[serde(rename = "$text")]
    name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewsItem {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewsQuery {
    /// ISO 3166-1 alpha-2, e.g. `jp`.
    pub country: String,
    /// ISO 639-1, e.g. `ja`.
    pub language: String,
    pub query: Option<String>,
}

fn strip_html(fragment: &str) -> String {
    let doc = html_scraper::Html::parse_fragment(fragment);
    let text = doc.root_element().text().collect::<Vec<_>>().join(" ");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

pub(crate) fn parse_feed(xml: &str, max_items: usize) -> Result<Vec<NewsItem>> {
    let rss: Rss = quick_xml::de::from_str(xml).context("Malformed news feed")?;

    Ok(rss
        .channel
        .items
        .into_iter()
        .filter_map(|item| {
            Some(NewsItem {
                title: non_empty(item.title)?,
                description: non_empty(item.description.map(|d| strip_html(&d))),
                link: non_empty(item.link),
                source: non_empty(item.source.and_then(|s| s.name)),
                published: non_empty(item.pub_date),
            })
        })
        .take(max_items)
        .collect())
}

pub struct GoogleNewsClient {
    client: reqwest::Client,
    base_url: String,
    max_items: usize,
}

impl GoogleNewsClient {
    pub fn new(client: reqwest::Client, config: &NewsConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_items: config.max_items,
        }
    }

    pub(crate) fn feed_url(&self, q: &NewsQuery) -> Result<url::Url> {
        let language = q.language.to_lowercase();
        let country = q.country.to_uppercase();
        let query = q.query.as_deref().map(str::trim).filter(|s| !s.is_empty());

        let path = if query.is_some() { "rss/search" } else { "rss" };
        let mut url = url::Url::parse(&format!("{}/{}", self.base_url, path))
            .with_context(|| format!("Invalid news base URL '{}'", self.base_url))?;

        {
            let mut pairs = url.query_pairs_mut();
            if let Some(query) = query {
                pairs.append_pair("q", query);
            }
            pairs
                .append_pair("hl", &language)
                .append_pair("gl", &country)
                .append_pair("ceid", &format!("{country}:{language}"));
        }
        Ok(url)
    }

    pub async fn fetch(&self, q: &NewsQuery) -> Result<Vec<NewsItem>> {
        let url = self.feed_url(q)?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("News request failed")?;

        let status = response.status();
        if !status.is_success() {
            bail!("News feed HTTP {}", status);
        }

        let xml = response.text().await?;
        parse_feed(&xml, self.max_items)
    }
}

pub struct FetchNewsTool {
    news: GoogleNewsClient,
}

impl FetchNewsTool {
    pub fn new(news: GoogleNewsClient) -> Self {
        Self { news }
    }
}

#[async_trait]
impl Tool for FetchNewsTool {
    fn name(&self) -> &str {
        "fetch_news"
    }

    fn description(&self) -> &str {
        "Fetch the latest news for a country and language, optionally filtered by a keyword."
    }

    fn parameters(&self) -> ParamSchema {
        ParamSchema::new()
            .string("country", "ISO 3166-1 country code, e.g. 'jp'", 2..=2, true)
            .string("language", "ISO 639-1 language code, e.g. 'ja'", 2..=2, true)
            .string("query", "Keyword to search for", .., false)
    }

    async fn execute(&self, args: Value) -> anyhow::Result<ToolResult> {
        let query = NewsQuery {
            country: extract_string_arg(&args, "country")?,
            language: extract_string_arg(&args, "language")?,
            query: args.get("query").and_then(Value::as_str).map(str::to_string),
        };

        let items = self
            .news
            .fetch(&query)
            .await
            .context("Failed to fetch news")?;
        Ok(ToolResult::success(serde_json::to_value(items)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::extract::RawQuery;
    use axum::routing::get;
    use serde_json::json;

    const FEED: &str = r##"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<rss version="2.0" xmlns:media="http://search.yahoo.com/mrss/">
  <channel>
    <generator>NFE/5.0</generator>
    <title>Top stories - Google News</title>
    <link>https://news.google.com/?hl=ja&amp;gl=JP&amp;ceid=JP:ja</link>
    <item>
      <title>Rust 2024 edition ships</title>
      <link>https://news.google.com/rss/articles/abc</link>
      <guid isPermaLink="false">abc</guid>
      <pubDate>Thu, 20 Feb 2025 10:00:00 GMT</pubDate>
      <description>&lt;a href="https://news.google.com/rss/articles/abc"&gt;Rust 2024 edition ships&lt;/a&gt;&amp;nbsp;&amp;nbsp;&lt;font color="#6f6f6f"&gt;Rust Blog&lt;/font&gt;</description>
      <source url="https://blog.rust-lang.org">Rust Blog</source>
    </item>
    <item>
      <title>Second story</title>
      <link>https://news.google.com/rss/articles/def</link>
    </item>
    <item>
      <title>   </title>
    </item>
  </channel>
</rss>"##;

    #[test]
    fn parses_items_and_strips_description_markup() {
        let items = parse_feed(FEED, 10).unwrap();
        assert_eq!(items.len(), 2);

        let first = &items[0];
        assert_eq!(first.title, "Rust 2024 edition ships");
        assert_eq!(
            first.description.as_deref(),
            Some("Rust 2024 edition ships Rust Blog")
        );
        assert_eq!(first.source.as_deref(), Some("Rust Blog"));
        assert_eq!(first.published.as_deref(), Some("Thu, 20 Feb 2025 10:00:00 GMT"));

        let second = serde_json::to_value(&items[1]).unwrap();
        assert_eq!(
            second,
            json!({ "title": "Second story", "link": "https://news.google.com/rss/articles/def" })
        );
    }

    #[test]
    fn caps_item_count_and_rejects_garbage() {
        assert_eq!(parse_feed(FEED, 1).unwrap().len(), 1);
        assert!(parse_feed("<html>nope", 10).is_err());
    }

    #[test]
    fn builds_top_stories_and_search_urls() {
        let client = GoogleNewsClient::new(reqwest::Client::new(), &NewsConfig::default());

        let top = client
            .feed_url(&NewsQuery {
                country: "jp".into(),
                language: "JA".into(),
                query: None,
            })
            .unwrap();
        assert_eq!(
            top.as_str(),
            "https://news.google.com/rss?hl=ja&gl=JP&ceid=JP%3Aja"
        );

        let search = client
            .feed_url(&NewsQuery {
                country: "us".into(),
                language: "en".into(),
                query: Some("tokio runtime".into()),
            })
            .unwrap();
        assert_eq!(search.path(), "/rss/search");
        assert!(search.as_str().contains("q=tokio+runtime"));
    }

    #[tokio::test]
    async fn tool_fetches_from_fixture_feed() {
        let app = Router::new().route(
            "/rss/search",
            get(|RawQuery(q): RawQuery| async move {
                assert!(q.unwrap_or_default().contains("q=rust"));
                FEED
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let config = NewsConfig {
            base_url: format!("http://{addr}"),
            max_items: 10,
        };
        let tool = FetchNewsTool::new(GoogleNewsClient::new(reqwest::Client::new(), &config));

        let result = tool
            .execute(json!({ "country": "us", "language": "en", "query": "rust" }))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.output.as_array().unwrap().len(), 2);
    }

    #[test]
    fn country_and_language_must_be_two_letters() {
        let schema = FetchNewsTool::new(GoogleNewsClient::new(
            reqwest::Client::new(),
            &NewsConfig::default(),
        ))
        .parameters();

        let violations = schema
            .validate(&json!({ "country": "jpn", "language": "j" }))
            .unwrap_err();
        let fields: Vec<_> = violations.iter().map(|v| v.field.as_str()).collect();
        assert_eq!(fields, vec!["country", "language"]);
        assert!(schema.validate(&json!({ "country": "jp", "language": "ja" })).is_ok());
    }
}
