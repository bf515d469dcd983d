//! Client for the remote agent-invocation endpoint.
//!
//! One POST per user turn. The endpoint answers with a Server-Sent Events
//! body; each `data:` payload is one JSON agent event. The body is consumed
//! once, line-buffered, and fed through the core normalizer. Lines that do
//! not decode into a known event are logged and skipped; only transport
//! faults and non-success statuses fail the call. No retries, no timeout
//! beyond transport defaults, no cancellation.

use async_stream::try_stream;
use futures_util::Stream;
use harness_core::{normalize, AgentEvent, CoreConfig, HarnessError, NormalizedResponse, Result};
use reqwest::Client;
use serde::Serialize;

/// Outbound invocation body. Trace collection is always enabled so the UI
/// side panels have data to show.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InvokeRequestBody<'a> {
    input_text: &'a str,
    enable_trace: bool,
}

/// Stateless client for the agent-invocation API. Holds no per-session
/// state, so one instance serves concurrent independent sessions.
pub struct AgentRuntimeClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl AgentRuntimeClient {
    /// Client against the given base URL, no authentication.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into(),
            api_key: None,
        }
    }

    /// Attaches a bearer key sent on every invocation.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Client configured from the shared harness config.
    pub fn from_config(config: &CoreConfig) -> Self {
        let client = Self::new(config.runtime_endpoint.clone());
        match &config.api_key {
            Some(key) => client.with_api_key(key.clone()),
            None => client,
        }
    }

    /// Issues the invocation and returns the lazy event stream. The stream is
    /// finite and single-pass; it ends when the remote body does.
    pub async fn invoke(
        &self,
        agent_id: &str,
        agent_alias_id: &str,
        session_id: &str,
        input_text: &str,
    ) -> Result<impl Stream<Item = Result<AgentEvent>> + Send> {
        let url = format!(
            "{}/agents/{}/agentAliases/{}/sessions/{}/text",
            self.base_url.trim_end_matches('/'),
            agent_id,
            agent_alias_id,
            session_id
        );
        tracing::debug!(target: "harness::agent", %url, "invoking agent");

        let mut request = self
            .http
            .post(&url)
            .header("accept", "text/event-stream")
            .json(&InvokeRequestBody {
                input_text,
                enable_trace: true,
            });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(HarnessError::transport)?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(HarnessError::Service {
                status: status.as_u16(),
                message,
            });
        }

        Ok(event_stream(response))
    }

    /// Invokes the agent and reshapes the full streamed response into
    /// `(output_text, citations, trace)`. Fully synchronous from the
    /// caller's perspective: resolves only once the stream is exhausted.
    pub async fn invoke_agent(
        &self,
        agent_id: &str,
        agent_alias_id: &str,
        session_id: &str,
        input_text: &str,
    ) -> Result<NormalizedResponse> {
        let events = self
            .invoke(agent_id, agent_alias_id, session_id, input_text)
            .await?;
        normalize(events).await
    }
}

/// Turns the response body into a stream of agent events, buffering partial
/// lines across network chunks.
fn event_stream(mut response: reqwest::Response) -> impl Stream<Item = Result<AgentEvent>> + Send {
    try_stream! {
        let mut buffer = String::new();
        loop {
            let chunk = match response.chunk().await.map_err(HarnessError::transport)? {
                Some(chunk) => chunk,
                None => break,
            };
            buffer.push_str(&String::from_utf8_lossy(&chunk));
            while let Some(newline) = buffer.find('\n') {
                let line = buffer[..newline].trim().to_string();
                buffer.drain(..=newline);
                if let Some(event) = parse_sse_line(&line) {
                    yield event;
                }
            }
        }
        // A final data line without a trailing newline still counts.
        let tail = buffer.trim().to_string();
        if !tail.is_empty() {
            if let Some(event) = parse_sse_line(&tail) {
                yield event;
            }
        }
    }
}

/// Parses one SSE line. Comments, blank keepalives, `event:` fields, and
/// payloads with an unrecognized top-level key are skipped silently; a
/// `data:` payload that does not decode is logged and skipped too, so one
/// malformed event never fails an otherwise healthy stream.
fn parse_sse_line(line: &str) -> Option<AgentEvent> {
    let payload = line.strip_prefix("data:")?.trim();
    if payload.is_empty() || payload == "[DONE]" {
        return None;
    }
    let value: serde_json::Value = match serde_json::from_str(payload) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(target: "harness::agent", error = %e, "skipping undecodable event payload");
            return None;
        }
    };
    if value.get("chunk").is_none() && value.get("trace").is_none() {
        return None;
    }
    match serde_json::from_value(value) {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::warn!(target: "harness::agent", error = %e, "skipping undecodable event payload");
            None
        }
    }
}
