//! Core types for Lifestream

mod conversation;
mod event;
mod matrix;
mod reason;
mod result;
mod output;
mod error;

pub use conversation::{Role, ConversationItem, ConversationLog};
pub use event::{ErrorKind, StreamEvent, ErrorPayload};
pub use matrix::{Matrix, Pattern};
pub use reason::{MissReason, BoundsWarning};
pub use result::{Settled, SimulationResult, Progress, GenerationResult};
pub use output::{TurnOutcome, TurnStatus, TurnReport};
pub use error::{TransportError, BridgeError, UpstreamError, RenderError, ApiError};
