//! Wire protocol for KeyTree Sync.
//!
//! A client batches many logical calls into one exchange. The request maps a
//! per-call id to `{namespace, call, payload}`; the response maps the same
//! ids to `{value}` or `{error}`.

pub mod codec;
pub mod digest;
pub mod endpoint;
pub mod error;
pub mod message;

pub use codec::BatchCodec;
pub use digest::CallDigest;
pub use endpoint::{endpoints, HealthResponse};
pub use error::{ProtocolError, ProtocolResult};
pub use message::{
    BatchId, BatchRequest, BatchResponse, CallEnvelope, CallName, CallOutcome, Payload,
    MAX_MESSAGE_SIZE, PROTOCOL_VERSION,
};
