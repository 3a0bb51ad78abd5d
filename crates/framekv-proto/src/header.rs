use bytes::{Buf, BufMut};

use crate::error::ProtoError;

/// 2-byte message type tag followed by a 4-byte payload size, big-endian.
pub const HEADER_SIZE: usize = 6;

#[repr(u16)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MessageType {
    Get = 1,
    Set = 2,
    Delete = 3,
    Metrics = 4,
    Response = 5,
}

impl TryFrom<u16> for MessageType {
    type Error = ProtoError;

    fn try_from(tag: u16) -> Result<Self, ProtoError> {
        match tag {
            1 => Ok(MessageType::Get),
            2 => Ok(MessageType::Set),
            3 => Ok(MessageType::Delete),
            4 => Ok(MessageType::Metrics),
            5 => Ok(MessageType::Response),
            other => Err(ProtoError::UnknownType(other)),
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct MessageHeader {
    pub message_type: MessageType,
    pub message_size: u32,
}

impl MessageHeader {
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        let mut buf = &mut out[..];
        buf.put_u16(self.message_type as u16);
        buf.put_u32(self.message_size);
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ProtoError> {
        if bytes.len() != HEADER_SIZE {
            return Err(ProtoError::InvalidHeader(bytes.len()));
        }
        let mut p = bytes;
        let tag = p.get_u16();
        let message_size = p.get_u32();
        Ok(Self {
            message_type: MessageType::try_from(tag)?,
            message_size,
        })
    }
}
