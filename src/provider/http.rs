//! Streaming HTTP model provider
//!
//! Talks to an NDJSON chat endpoint (Ollama-compatible `/api/chat`) over
//! reqwest, cutting the byte stream into JSON chunks with the incremental
//! parser and mapping each chunk onto generation events. One HTTP call
//! corresponds to one model/tool interaction step: the stream ends with
//! `StepFinish` when the model requested tools, `Finish` otherwise.

use crate::errors::{EngineError, Result};
use crate::provider::parser::JsonParser;
use crate::provider::{GenerationEvent, GenerationPrompt, GenerationStream, LanguageModelProvider};
use crate::tools::ToolCall;
use crate::types::Role;
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

/// Connection establishment timeout
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Chat-protocol provider over HTTP streaming
#[derive(Debug, Clone)]
pub struct HttpModelProvider {
    client: Client,
    base_url: String,
    model: String,
}

impl HttpModelProvider {
    pub fn new(base_url: &str, model: &str) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(EngineError::Http)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl LanguageModelProvider for HttpModelProvider {
    fn model(&self) -> &str {
        &self.model
    }

    async fn stream_generate(&self, prompt: GenerationPrompt) -> Result<GenerationStream> {
        let url = format!("{}/api/chat", self.base_url);
        let request = ChatRequest::from_prompt(&self.model, &prompt);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| EngineError::ProviderApi(format!("Failed to send request: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(EngineError::ProviderApi(format!(
                "HTTP {status}: {error_text}"
            )));
        }

        let state = StreamState {
            bytes: response.bytes_stream().boxed(),
            parser: JsonParser::new(),
            pending: VecDeque::new(),
            saw_tool_call: false,
            terminated: false,
        };

        Ok(futures_util::stream::unfold(state, drive_stream).boxed())
    }
}

struct StreamState {
    bytes: BoxStream<'static, reqwest::Result<Bytes>>,
    parser: JsonParser,
    pending: VecDeque<Result<GenerationEvent>>,
    saw_tool_call: bool,
    terminated: bool,
}

async fn drive_stream(
    mut state: StreamState,
) -> Option<(Result<GenerationEvent>, StreamState)> {
    loop {
        if let Some(event) = state.pending.pop_front() {
            return Some((event, state));
        }
        if state.terminated {
            return None;
        }

        match state.bytes.next().await {
            Some(Ok(chunk)) => match state.parser.push(&chunk) {
                Ok(objects) => {
                    for object in objects {
                        decode_chunk(&object, &mut state);
                    }
                }
                Err(e) => {
                    state.terminated = true;
                    state.pending.push_back(Err(e));
                }
            },
            Some(Err(e)) => {
                state.terminated = true;
                state
                    .pending
                    .push_back(Err(EngineError::StreamGeneration(e.to_string())));
            }
            None => {
                state.terminated = true;
            }
        }
    }
}

/// Decode one wire chunk into pending generation events
fn decode_chunk(object: &str, state: &mut StreamState) {
    let chunk: ChatChunk = match serde_json::from_str(object) {
        Ok(chunk) => chunk,
        Err(e) => {
            state.terminated = true;
            state
                .pending
                .push_back(Err(EngineError::JsonParse(e.to_string())));
            return;
        }
    };

    if let Some(error) = chunk.error {
        state.terminated = true;
        state
            .pending
            .push_back(Err(EngineError::StreamGeneration(error)));
        return;
    }

    if let Some(message) = chunk.message {
        if !message.content.is_empty() {
            state
                .pending
                .push_back(Ok(GenerationEvent::TextDelta(message.content)));
        }
        for call in message.tool_calls {
            state.saw_tool_call = true;
            state.pending.push_back(Ok(GenerationEvent::ToolCall(
                ToolCall::new(call.function.name, call.function.arguments),
            )));
        }
    }

    if chunk.done {
        state.terminated = true;
        let terminal = if state.saw_tool_call {
            GenerationEvent::StepFinish
        } else {
            GenerationEvent::Finish
        };
        state.pending.push_back(Ok(terminal));
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<WireMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool>,
}

impl ChatRequest {
    fn from_prompt(model: &str, prompt: &GenerationPrompt) -> Self {
        let mut messages = Vec::with_capacity(prompt.messages.len() + 1);
        if !prompt.system.is_empty() {
            messages.push(WireMessage {
                role: "system".to_string(),
                content: prompt.system.clone(),
            });
        }
        for message in &prompt.messages {
            messages.push(WireMessage {
                role: role_name(message.role).to_string(),
                content: message.content.clone(),
            });
        }

        Self {
            model: model.to_string(),
            messages,
            stream: true,
            tools: prompt
                .tools
                .iter()
                .map(|schema| WireTool {
                    tool_type: "function".to_string(),
                    function: WireToolDef {
                        name: schema.name.clone(),
                        description: schema.description.clone(),
                        parameters: schema.parameters.clone(),
                    },
                })
                .collect(),
        }
    }
}

fn role_name(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    tool_type: String,
    function: WireToolDef,
}

#[derive(Debug, Serialize)]
struct WireToolDef {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    message: Option<ChunkMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkMessage {
    #[serde(default)]
    content: String,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    function: WireFunctionCall,
}

#[derive(Debug, Deserialize)]
struct WireFunctionCall {
    name: String,
    #[serde(default)]
    arguments: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_state() -> StreamState {
        StreamState {
            bytes: futures_util::stream::empty().boxed(),
            parser: JsonParser::new(),
            pending: VecDeque::new(),
            saw_tool_call: false,
            terminated: false,
        }
    }

    #[test]
    fn test_provider_creation() {
        let provider = HttpModelProvider::new("http://127.0.0.1:11434/", "clone-v1").unwrap();
        assert_eq!(provider.model(), "clone-v1");
        assert_eq!(provider.base_url(), "http://127.0.0.1:11434");
    }

    #[test]
    fn test_decode_text_delta() {
        let mut state = empty_state();
        decode_chunk(r#"{"message": {"content": "hello"}, "done": false}"#, &mut state);

        assert_eq!(
            state.pending.pop_front().unwrap().unwrap(),
            GenerationEvent::TextDelta("hello".to_string())
        );
        assert!(!state.terminated);
    }

    #[test]
    fn test_decode_tool_call_then_step_finish() {
        let mut state = empty_state();
        decode_chunk(
            r#"{"message": {"content": "", "tool_calls": [{"function": {"name": "web_search", "arguments": {"query": "x"}}}]}, "done": false}"#,
            &mut state,
        );
        decode_chunk(r#"{"done": true, "done_reason": "stop"}"#, &mut state);

        match state.pending.pop_front().unwrap().unwrap() {
            GenerationEvent::ToolCall(call) => assert_eq!(call.name, "web_search"),
            other => panic!("expected tool call, got {other:?}"),
        }
        assert_eq!(
            state.pending.pop_front().unwrap().unwrap(),
            GenerationEvent::StepFinish
        );
    }

    #[test]
    fn test_decode_finish_without_tools() {
        let mut state = empty_state();
        decode_chunk(r#"{"message": {"content": "bye"}, "done": true}"#, &mut state);

        assert_eq!(
            state.pending.pop_front().unwrap().unwrap(),
            GenerationEvent::TextDelta("bye".to_string())
        );
        assert_eq!(
            state.pending.pop_front().unwrap().unwrap(),
            GenerationEvent::Finish
        );
        assert!(state.terminated);
    }

    #[test]
    fn test_decode_inline_error() {
        let mut state = empty_state();
        decode_chunk(r#"{"error": "model exploded"}"#, &mut state);

        assert!(state.pending.pop_front().unwrap().is_err());
        assert!(state.terminated);
    }

    #[test]
    fn test_chat_request_includes_system_and_tools() {
        let prompt = GenerationPrompt {
            system: "You are a clone".to_string(),
            messages: vec![crate::types::Message::user("hi")],
            tools: vec![crate::tools::ToolSchema::new(
                "web_search",
                "Search the web",
                serde_json::json!({"type": "object"}),
            )],
        };

        let request = ChatRequest::from_prompt("clone-v1", &prompt);
        assert_eq!(request.messages[0].role, "system");
        assert_eq!(request.messages[1].role, "user");
        assert_eq!(request.tools.len(), 1);
        assert_eq!(request.tools[0].function.name, "web_search");
    }
}
