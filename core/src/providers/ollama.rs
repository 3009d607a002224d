use crate::traits::{ChatMessage, ChatRequest, Provider, ProviderEvent, ToolCall, ToolSpec};
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::ReceiverStream;

pub const OLLAMA_BASE_URL: &str = "http://localhost:11434";

#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<OllamaTool<'a>>>,
    options: OllamaOptions,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct OllamaLoadRequest<'a> {
    model: &'a str,
}

#[derive(Debug, Serialize)]
struct OllamaMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OllamaToolCallRequest>>,
}

#[derive(Debug, Serialize)]
struct OllamaToolCallRequest {
    function: OllamaFunctionRequest,
}

#[derive(Debug, Serialize)]
struct OllamaFunctionRequest {
    name: String,
    arguments: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct OllamaTool<'a> {
    r#type: &'a str,
    function: OllamaToolFunction<'a>,
}

#[derive(Debug, Serialize)]
struct OllamaToolFunction<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a serde_json::Value,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f64,
}

#[derive(Debug, Deserialize)]
struct StreamResponse {
    message: Option<StreamMessage>,
    #[serde(default)]
    done: bool,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<OllamaToolCallResponse>>,
    #[serde(default)]
    thinking: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OllamaToolCallResponse {
    function: OllamaFunctionResponse,
}

#[derive(Debug, Deserialize)]
struct OllamaFunctionResponse {
    name: String,
    arguments: serde_json::Value,
}

/// Splits an NDJSON body into lines. Bytes are held until a newline arrives,
/// so a character cut between two chunks is decoded whole.
#[derive(Debug, Default)]
pub(crate) struct LineBuffer {
    buffer: Vec<u8>,
}

impl LineBuffer {
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    pub(crate) fn finish(self) -> String {
        String::from_utf8_lossy(&self.buffer).into_owned()
    }
}

pub struct OllamaProvider {
    client: reqwest::Client,
    base_url: String,
}

impl OllamaProvider {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: OLLAMA_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let url = base_url.into();
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    /// Ollama has no `tool` role with call ids, so tool results are folded
    /// into a user message that follows the assistant's tool calls.
    fn convert_messages(messages: &[ChatMessage]) -> Vec<OllamaMessage> {
        let mut result = Vec::new();
        let mut tool_results: Vec<String> = Vec::new();

        let flush = |buffer: &mut Vec<String>, out: &mut Vec<OllamaMessage>| {
            if buffer.is_empty() {
                return;
            }
            out.push(OllamaMessage {
                role: "user".to_string(),
                content: Some(format!("[Tool results]\n{}", buffer.join("\n"))),
                tool_calls: None,
            });
            buffer.clear();
        };

        for m in messages {
            if m.role == "tool" {
                let id = m.tool_call_id.as_deref().unwrap_or("unknown");
                tool_results.push(format!(
                    "<tool_result id=\"{}\">\n{}\n</tool_result>",
                    id, m.content
                ));
                continue;
            }

            flush(&mut tool_results, &mut result);

            let tool_calls = m.tool_calls.as_ref().map(|calls| {
                calls
                    .iter()
                    .map(|tc| OllamaToolCallRequest {
                        function: OllamaFunctionRequest {
                            name: tc.name.clone(),
                            arguments: serde_json::from_str(&tc.arguments)
                                .unwrap_or(serde_json::Value::Null),
                        },
                    })
                    .collect()
            });

            result.push(OllamaMessage {
                role: m.role.clone(),
                content: (!m.content.is_empty()).then(|| m.content.clone()),
                tool_calls,
            });
        }

        flush(&mut tool_results, &mut result);
        result
    }

    fn convert_tools(tools: &[ToolSpec]) -> Vec<OllamaTool<'_>> {
        tools
            .iter()
            .map(|t| OllamaTool {
                r#type: "function",
                function: OllamaToolFunction {
                    name: &t.name,
                    description: &t.description,
                    parameters: &t.parameters_schema,
                },
            })
            .collect()
    }

    pub(crate) fn parse_stream_line(line: &str) -> Vec<ProviderEvent> {
        let line = line.trim();
        if line.is_empty() {
            return Vec::new();
        }

        let response = match serde_json::from_str::<StreamResponse>(line) {
            Ok(r) => r,
            Err(e) => return vec![ProviderEvent::Error(format!("Malformed stream line: {e}"))],
        };

        if let Some(error) = response.error {
            return vec![ProviderEvent::Error(error)];
        }

        let mut events = Vec::new();

        if let Some(message) = response.message {
            if let Some(thinking) = message.thinking
                && !thinking.is_empty()
            {
                events.push(ProviderEvent::Thinking(thinking));
            }

            if let Some(content) = message.content
                && !content.is_empty()
            {
                events.push(ProviderEvent::Token(content));
            }

            for tc in message.tool_calls.unwrap_or_default() {
                events.push(ProviderEvent::ToolCall(ToolCall {
                    id: format!("ollama_{}", uuid::Uuid::new_v4()),
                    name: tc.function.name,
                    arguments: tc.function.arguments.to_string(),
                }));
            }
        }

        if response.done {
            events.push(ProviderEvent::Done);
        }

        events
    }
}

impl Default for OllamaProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn load_model(&self, model: &str) -> anyhow::Result<()> {
        // A generate request without a prompt only loads the model into memory.
        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&OllamaLoadRequest { model })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Ollama API error ({}): {}", status, error_text);
        }

        Ok(())
    }

    async fn chat_stream(
        &self,
        request: ChatRequest<'_>,
        model: &str,
        temperature: f64,
    ) -> anyhow::Result<BoxStream<'static, ProviderEvent>> {
        let body = OllamaRequest {
            model,
            messages: Self::convert_messages(request.messages),
            tools: request.tools.map(Self::convert_tools),
            options: OllamaOptions { temperature },
            stream: true,
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Ollama API error ({}): {}", status, error_text);
        }

        let (tx, rx) = tokio::sync::mpsc::channel::<ProviderEvent>(256);

        tokio::spawn(async move {
            use futures_util::StreamExt as _;
            let mut stream = response.bytes_stream();
            let mut lines = LineBuffer::default();

            while let Some(chunk) = stream.next().await {
                let bytes = match chunk {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        let _ = tx
                            .send(ProviderEvent::Error(format!("Stream interrupted: {e}")))
                            .await;
                        return;
                    }
                };

                for line in lines.push(&bytes) {
                    for event in Self::parse_stream_line(&line) {
                        let terminal =
                            matches!(event, ProviderEvent::Done | ProviderEvent::Error(_));
                        if tx.send(event).await.is_err() || terminal {
                            return;
                        }
                    }
                }
            }

            // The body ended without a `done` line; flush the tail if there is one.
            for event in Self::parse_stream_line(&lines.finish()) {
                let terminal = matches!(event, ProviderEvent::Done | ProviderEvent::Error(_));
                if tx.send(event).await.is_err() || terminal {
                    return;
                }
            }
            let _ = tx
                .send(ProviderEvent::Error(
                    "Ollama stream ended before completion".to_string(),
                ))
                .await;
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}
