//! harness-core: shared library for the agent test harness (configuration,
//! session state, streamed event model, and the response normalizer).
//!
//! The gateway and the agent client both build on these types so the public
//! API stays consistent across crates.

mod error;
mod event;
mod normalize;
mod session;
mod shared;

pub use error::{HarnessError, Result};
pub use event::{AgentEvent, Attribution, Chunk, Citation, TextSpan, Trace, TraceFragment, TracePhase};
pub use normalize::{normalize, NormalizedResponse};
pub use session::{MessageTurn, Role, SessionState};
pub use shared::{CoreConfig, DEFAULT_AGENT_ALIAS_ID};
