use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtoError {
    #[error("header must be exactly 6 bytes, got {0}")]
    InvalidHeader(usize),

    #[error("unknown message type tag {0}")]
    UnknownType(u16),

    #[error("malformed payload: {0}")]
    MalformedPayload(&'static str),

    #[error("key is not valid utf-8")]
    InvalidUtf8,
}
