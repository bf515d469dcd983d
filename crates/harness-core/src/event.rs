//! Streamed event model for one agent invocation.
//!
//! The remote endpoint emits a finite sequence of heterogeneous events; each
//! is either a content fragment (answer text plus optional citation
//! attribution) or a trace fragment (one record for one processing phase).
//! Events are externally tagged so the wire JSON reads
//! `{"chunk": {...}}` / `{"trace": {"orchestrationTrace": {...}}}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// One event from the invocation stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AgentEvent {
    /// Content fragment: a chunk of answer text, optionally with attribution.
    #[serde(rename = "chunk")]
    Chunk(Chunk),
    /// Trace fragment: one diagnostic record tagged with its phase.
    #[serde(rename = "trace")]
    Trace(TraceFragment),
}

/// A chunk of generated answer text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Chunk {
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribution: Option<Attribution>,
}

/// Citations attached to a content fragment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Attribution {
    #[serde(default)]
    pub citations: Vec<Citation>,
}

/// Reference to a retrieved source document supporting a span of the answer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Citation {
    /// Source location, typically a URI. A citation without one is still
    /// numbered but rendered with a placeholder.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Character span of the generated text this citation supports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<TextSpan>,
    /// Any further fields the service attaches; preserved for the side panel.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Half-open character range into the generated answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextSpan {
    pub start: usize,
    pub end: usize,
}

/// Trace fragment as it appears on the wire. `guardrailTrace` carries no
/// pre/post marker of its own; the normalizer disambiguates it positionally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TraceFragment {
    #[serde(rename = "guardrailTrace")]
    Guardrail(Value),
    #[serde(rename = "preProcessingTrace")]
    PreProcessing(Value),
    #[serde(rename = "orchestrationTrace")]
    Orchestration(Value),
    #[serde(rename = "postProcessingTrace")]
    PostProcessing(Value),
}

/// Normalized processing phase a trace record is bucketed under.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum TracePhase {
    #[serde(rename = "preGuardrailTrace")]
    PreGuardrail,
    #[serde(rename = "preProcessingTrace")]
    PreProcessing,
    #[serde(rename = "orchestrationTrace")]
    Orchestration,
    #[serde(rename = "postProcessingTrace")]
    PostProcessing,
    #[serde(rename = "postGuardrailTrace")]
    PostGuardrail,
}

/// Trace for one invocation: phase -> records in arrival order.
pub type Trace = BTreeMap<TracePhase, Vec<Value>>;
