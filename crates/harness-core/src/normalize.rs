//! Response normalizer: consumes one invocation's event stream to completion
//! and produces the displayable result (answer text, citations, trace).

use crate::error::Result;
use crate::event::{AgentEvent, Citation, Trace, TraceFragment, TracePhase};
use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};

/// Placeholder rendered for a citation whose source location is missing.
const MISSING_LOCATION: &str = "[citation not available]";

/// Normalized result of one agent invocation. `output_text` may legitimately
/// be empty; `citations` and `trace` are always present, possibly empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NormalizedResponse {
    pub output_text: String,
    pub citations: Vec<Citation>,
    pub trace: Trace,
}

/// Consumes the event stream in arrival order and reshapes it.
///
/// Arrival order matters twice: text chunks concatenate in order, and the
/// first guardrail trace of a call is bucketed as pre-guardrail while every
/// later one is post-guardrail. The stream is single-pass; a failed item
/// fails the whole call with no partial result.
pub async fn normalize<S>(events: S) -> Result<NormalizedResponse>
where
    S: Stream<Item = Result<AgentEvent>>,
{
    futures_util::pin_mut!(events);

    let mut output_text = String::new();
    let mut citations: Vec<Citation> = Vec::new();
    // Inline markers number citations by emission order, before dedup. Each
    // emitted citation maps to its post-dedup ordinal; a duplicate location
    // maps to the ordinal of its first occurrence.
    let mut ordinal_map: Vec<usize> = Vec::new();
    let mut trace = Trace::new();
    let mut guardrail_seen = false;

    while let Some(event) = events.next().await {
        match event? {
            AgentEvent::Chunk(chunk) => {
                output_text.push_str(&chunk.text);
                if let Some(attribution) = chunk.attribution {
                    for citation in attribution.citations {
                        // Dedupe by location; locationless citations are kept.
                        let existing = citation.location.as_deref().and_then(|loc| {
                            citations.iter().position(|c| c.location.as_deref() == Some(loc))
                        });
                        match existing {
                            Some(index) => ordinal_map.push(index + 1),
                            None => {
                                citations.push(citation);
                                ordinal_map.push(citations.len());
                            }
                        }
                    }
                }
            }
            AgentEvent::Trace(fragment) => {
                let (phase, record) = match fragment {
                    TraceFragment::Guardrail(record) => {
                        let phase = if guardrail_seen {
                            TracePhase::PostGuardrail
                        } else {
                            TracePhase::PreGuardrail
                        };
                        guardrail_seen = true;
                        (phase, record)
                    }
                    TraceFragment::PreProcessing(record) => (TracePhase::PreProcessing, record),
                    TraceFragment::Orchestration(record) => (TracePhase::Orchestration, record),
                    TraceFragment::PostProcessing(record) => (TracePhase::PostProcessing, record),
                };
                trace.entry(phase).or_default().push(record);
            }
        }
    }

    let output_text = render_citations(output_text, &citations, &ordinal_map);
    Ok(NormalizedResponse {
        output_text,
        citations,
        trace,
    })
}

/// Rewrites inline `%[i]%` markers (1-based, numbered by emission order) to
/// their post-dedup ordinals and appends the numbered citation index after
/// the answer text.
fn render_citations(mut text: String, citations: &[Citation], ordinal_map: &[usize]) -> String {
    if citations.is_empty() {
        return text;
    }
    for (emitted, mapped) in ordinal_map.iter().enumerate() {
        text = text.replace(&format!("%[{}]%", emitted + 1), &format!("[{}]", mapped));
    }
    text.push_str("\n\nCitations:");
    for (i, citation) in citations.iter().enumerate() {
        let location = citation.location.as_deref().unwrap_or(MISSING_LOCATION);
        text.push_str(&format!("\n[{}] {}", i + 1, location));
    }
    text
}
