//! Core modules for Lifestream

pub mod frame;
pub mod transport;
pub mod accumulator;
pub mod extractor;
pub mod simulator;
pub mod renderer;
pub mod bridge;
pub mod session;
pub mod upstream;
pub mod api;

pub use frame::{Frame, FrameDecoder, encode_data, encode_error};
pub use transport::StreamTransport;
pub use accumulator::{Completion, ResponseAccumulator};
pub use extractor::{Extraction, PatternExtractor};
pub use simulator::LifeSimulator;
pub use renderer::{BitmapRenderer, encode_png, upscale};
pub use bridge::{PendingGeneration, Terminator, WorkerBridge, run_pipeline};
pub use session::{ChatSession, IMAGE_ERROR_MESSAGE};
pub use upstream::{CompletionSource, CompletionStream, OpenAiSource, ScriptedSource};
pub use api::{AppConfig, create_router, run_server};
