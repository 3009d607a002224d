use crate::traits::{ChatMessage, ChatRequest, Provider, ProviderEvent, ToolCall, ToolSpec};
use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio_stream::wrappers::ReceiverStream;

pub const LMSTUDIO_BASE_URL: &str = "http://localhost:1234/v1";
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Serialize)]
struct OpenAIRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAIMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<OpenAITool<'a>>>,
    temperature: f64,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct OpenAIMessage<'a> {
    role: &'a str,
    content: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OpenAIToolCallRequest<'a>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct OpenAIToolCallRequest<'a> {
    id: &'a str,
    r#type: &'a str,
    function: OpenAIFunctionRequest<'a>,
}

#[derive(Debug, Serialize)]
struct OpenAIFunctionRequest<'a> {
    name: &'a str,
    arguments: &'a str,
}

#[derive(Debug, Serialize)]
struct OpenAITool<'a> {
    r#type: &'a str,
    function: OpenAIToolFunction<'a>,
}

#[derive(Debug, Serialize)]
struct OpenAIToolFunction<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    error: Option<StreamError>,
}

#[derive(Debug, Deserialize)]
struct StreamError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning_content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<StreamToolCall>>,
}

#[derive(Debug, Deserialize)]
struct StreamToolCall {
    #[serde(default)]
    index: usize,
    id: Option<String>,
    function: Option<StreamFunction>,
}

#[derive(Debug, Deserialize)]
struct StreamFunction {
    name: Option<String>,
    arguments: Option<String>,
}

#[derive(Debug, Default)]
struct PendingCall {
    id: String,
    name: String,
    arguments: String,
}

/// Turns the `data` payloads of a chat-completion event stream into provider
/// events. Tool-call deltas are accumulated per index and released together
/// when the model finishes the message.
#[derive(Debug, Default)]
pub(crate) struct SseDecoder {
    pending: BTreeMap<usize, PendingCall>,
    finished: bool,
    failed: bool,
}

impl SseDecoder {
    pub(crate) fn push(&mut self, data: &str) -> Vec<ProviderEvent> {
        let mut events = Vec::new();
        if self.failed {
            return events;
        }

        let data = data.trim();
        if data.is_empty() {
            return events;
        }
        if data == "[DONE]" {
            self.finished = true;
            return events;
        }

        let response = match serde_json::from_str::<StreamResponse>(data) {
            Ok(r) => r,
            Err(e) => {
                self.failed = true;
                events.push(ProviderEvent::Error(format!("Malformed stream chunk: {e}")));
                return events;
            }
        };

        if let Some(err) = response.error {
            self.failed = true;
            events.push(ProviderEvent::Error(err.message));
            return events;
        }

        for choice in response.choices {
            if let Some(reasoning) = choice.delta.reasoning_content
                && !reasoning.is_empty()
            {
                events.push(ProviderEvent::Thinking(reasoning));
            }

            if let Some(content) = choice.delta.content
                && !content.is_empty()
            {
                events.push(ProviderEvent::Token(content));
            }

            for tc in choice.delta.tool_calls.unwrap_or_default() {
                let entry = self.pending.entry(tc.index).or_default();
                if let Some(id) = tc.id.filter(|id| !id.is_empty()) {
                    entry.id = id;
                }
                if let Some(func) = tc.function {
                    if let Some(name) = func.name.filter(|n| !n.is_empty()) {
                        entry.name = name;
                    }
                    if let Some(args) = func.arguments {
                        entry.arguments.push_str(&args);
                    }
                }
            }

            if choice.finish_reason.is_some() {
                events.extend(self.drain_pending());
            }
        }

        events
    }

    pub(crate) fn finish(mut self) -> Vec<ProviderEvent> {
        if self.failed {
            return Vec::new();
        }
        let mut events = self.drain_pending();
        events.push(ProviderEvent::Done);
        events
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.finished
    }

    fn drain_pending(&mut self) -> Vec<ProviderEvent> {
        std::mem::take(&mut self.pending)
            .into_values()
            .filter(|call| !call.name.is_empty())
            .map(|call| {
                let id = if call.id.is_empty() {
                    format!("call_{}", uuid::Uuid::new_v4().simple())
                } else {
                    call.id
                };
                ProviderEvent::ToolCall(ToolCall {
                    id,
                    name: call.name,
                    arguments: call.arguments,
                })
            })
            .collect()
    }
}

pub struct OpenAICompatProvider {
    client: reqwest::Client,
    name: String,
    api_key: Option<String>,
    base_url: String,
}

impl OpenAICompatProvider {
    pub fn new(name: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            client,
            name: name.into(),
            api_key: None,
            base_url: LMSTUDIO_BASE_URL.to_string(),
        }
    }

    pub fn lmstudio() -> Self {
        Self::new("lmstudio")
    }

    pub fn openai(api_key: impl Into<String>) -> Self {
        Self::new("openai")
            .with_api_key(api_key)
            .with_base_url(OPENAI_BASE_URL)
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        let key = api_key.into();
        self.api_key = (!key.is_empty()).then_some(key);
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn authorized(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => req.bearer_auth(key),
            None => req,
        }
    }

    fn convert_messages(messages: &[ChatMessage]) -> Vec<OpenAIMessage<'_>> {
        messages
            .iter()
            .map(|m| OpenAIMessage {
                role: &m.role,
                content: Some(m.content.as_str()),
                tool_calls: m.tool_calls.as_ref().map(|calls| {
                    calls
                        .iter()
                        .map(|tc| OpenAIToolCallRequest {
                            id: &tc.id,
                            r#type: "function",
                            function: OpenAIFunctionRequest {
                                name: &tc.name,
                                arguments: &tc.arguments,
                            },
                        })
                        .collect()
                }),
                tool_call_id: m.tool_call_id.as_deref(),
            })
            .collect()
    }

    fn convert_tools(tools: &[ToolSpec]) -> Vec<OpenAITool<'_>> {
        tools
            .iter()
            .map(|t| OpenAITool {
                r#type: "function",
                function: OpenAIToolFunction {
                    name: &t.name,
                    description: &t.description,
                    parameters: &t.parameters_schema,
                },
            })
            .collect()
    }
}

#[async_trait]
impl Provider for OpenAICompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn load_model(&self, model: &str) -> anyhow::Result<()> {
        let response = self
            .authorized(self.client.get(format!("{}/models", self.base_url)))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("{} API error ({}): {}", self.name, status, error_text);
        }

        let models: ModelList = response.json().await?;
        if models.data.iter().any(|m| m.id == model) {
            Ok(())
        } else {
            let available: Vec<_> = models.data.iter().map(|m| m.id.as_str()).collect();
            anyhow::bail!(
                "model '{}' is not available on {} (available: {})",
                model,
                self.base_url,
                available.join(", ")
            )
        }
    }

    async fn chat_stream(
        &self,
        request: ChatRequest<'_>,
        model: &str,
        temperature: f64,
    ) -> anyhow::Result<BoxStream<'static, ProviderEvent>> {
        let body = OpenAIRequest {
            model,
            messages: Self::convert_messages(request.messages),
            tools: request.tools.map(Self::convert_tools),
            temperature,
            stream: true,
        };

        let response = self
            .authorized(
                self.client
                    .post(format!("{}/chat/completions", self.base_url))
                    .json(&body),
            )
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("{} API error ({}): {}", self.name, status, error_text);
        }

        let (tx, rx) = tokio::sync::mpsc::channel::<ProviderEvent>(256);

        tokio::spawn(async move {
            use futures_util::StreamExt as _;
            let mut stream = response.bytes_stream().eventsource();
            let mut decoder = SseDecoder::default();

            while let Some(event) = stream.next().await {
                let events = match event {
                    Ok(event) => decoder.push(&event.data),
                    Err(e) => vec![ProviderEvent::Error(format!("Stream interrupted: {e}"))],
                };

                for event in events {
                    let is_error = matches!(event, ProviderEvent::Error(_));
                    if tx.send(event).await.is_err() || is_error {
                        return;
                    }
                }

                if decoder.is_finished() {
                    break;
                }
            }

            for event in decoder.finish() {
                if tx.send(event).await.is_err() {
                    return;
                }
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}
