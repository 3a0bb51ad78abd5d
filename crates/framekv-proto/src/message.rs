use std::fmt;

use bytes::Bytes;

use crate::header::MessageType;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GetCommand {
    pub keys: Vec<String>,
}

/// Ordered pairs; a key repeated within one batch is last-wins on the store.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SetCommand {
    pub pairs: Vec<(String, Bytes)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeleteCommand {
    pub keys: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsCommand {
    pub key_count: bool,
    pub total_store_contents_size: bool,
    pub keys_read_count: bool,
    pub keys_updated_count: bool,
    pub keys_deleted_count: bool,
}

impl MetricsCommand {
    pub fn all() -> Self {
        Self {
            key_count: true,
            total_store_contents_size: true,
            keys_read_count: true,
            keys_updated_count: true,
            keys_deleted_count: true,
        }
    }
}

/// A field is populated only when it was requested and the underlying
/// counter has been touched; `key_count` is derived from the store size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsReport {
    pub key_count: Option<i64>,
    pub total_store_contents_size: Option<i64>,
    pub keys_read_count: Option<i64>,
    pub keys_updated_count: Option<i64>,
    pub keys_deleted_count: Option<i64>,
}

#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Status {
    Ok = 0,
    Error = 1,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Ok => f.write_str("OK"),
            Status::Error => f.write_str("ERROR"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponsePayload {
    KvList(Vec<(String, Bytes)>),
    KeyList(Vec<String>),
    Metrics(MetricsReport),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: Status,
    pub message: String,
    pub payload: Option<ResponsePayload>,
}

impl Response {
    pub fn ok(payload: Option<ResponsePayload>) -> Self {
        Self {
            status: Status::Ok,
            message: "OK".to_string(),
            payload,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            message: message.into(),
            payload: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Get(GetCommand),
    Set(SetCommand),
    Delete(DeleteCommand),
    Metrics(MetricsCommand),
    Response(Response),
}

impl Message {
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::Get(_) => MessageType::Get,
            Message::Set(_) => MessageType::Set,
            Message::Delete(_) => MessageType::Delete,
            Message::Metrics(_) => MessageType::Metrics,
            Message::Response(_) => MessageType::Response,
        }
    }
}
