//! Generation job streaming: frame decoding, the backend seam, and the
//! per-format consumer that mirrors a job into the report store.

pub mod backend;
pub mod consumer;
pub mod frame;

pub use backend::{
    BackendError, ByteStream, GenerationBackend, GenerationRequest, HttpBackend, ScriptedBackend,
    Step,
};
pub use consumer::{consume, ConsumerConfig, ConsumerOutcome, ConsumerState, Transition};
pub use frame::{FrameDecoder, FrameError, StreamEvent};
