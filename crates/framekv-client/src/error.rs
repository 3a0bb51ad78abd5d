use framekv_proto::{MessageType, ProtoError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// The server answered with an ERROR status.
    #[error("server error: {0}")]
    Api(String),

    /// Every retry failed with a transport error.
    #[error("request failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Proto(#[from] ProtoError),

    #[error("expected a response message, got type {0:?}")]
    UnexpectedMessage(MessageType),

    #[error("response carried an unexpected payload")]
    UnexpectedPayload,
}
