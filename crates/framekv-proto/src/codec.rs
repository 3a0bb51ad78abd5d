use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::ProtoError;
use crate::header::{MessageHeader, MessageType, HEADER_SIZE};
use crate::message::{
    DeleteCommand, GetCommand, Message, MetricsCommand, MetricsReport, Response, ResponsePayload,
    SetCommand, Status,
};

const PAYLOAD_NONE: u8 = 0;
const PAYLOAD_KV_LIST: u8 = 1;
const PAYLOAD_KEY_LIST: u8 = 2;
const PAYLOAD_METRICS: u8 = 3;

const FLAG_KEY_COUNT: u8 = 1 << 0;
const FLAG_TOTAL_SIZE: u8 = 1 << 1;
const FLAG_READS: u8 = 1 << 2;
const FLAG_UPDATES: u8 = 1 << 3;
const FLAG_DELETES: u8 = 1 << 4;

/// A raw message as read off the wire, before payload decode.
#[derive(Debug, Clone)]
pub struct Frame {
    pub header: MessageHeader,
    pub payload: Bytes,
}

impl Frame {
    pub fn decode(&self) -> Result<Message, ProtoError> {
        decode_message(self.header.message_type, &self.payload)
    }
}

pub fn encode_message(msg: &Message) -> ([u8; HEADER_SIZE], BytesMut) {
    let payload = match msg {
        Message::Get(cmd) => encode_keys_payload(&cmd.keys),
        Message::Set(cmd) => encode_set_payload(cmd),
        Message::Delete(cmd) => encode_keys_payload(&cmd.keys),
        Message::Metrics(cmd) => encode_metrics_payload(cmd),
        Message::Response(resp) => encode_response_payload(resp),
    };
    let header = MessageHeader {
        message_type: msg.message_type(),
        message_size: payload.len() as u32,
    };
    (header.encode(), payload)
}

pub fn decode_message(message_type: MessageType, payload: &[u8]) -> Result<Message, ProtoError> {
    let mut p = payload;
    match message_type {
        MessageType::Get => Ok(Message::Get(GetCommand {
            keys: decode_keys_payload(&mut p)?,
        })),
        MessageType::Set => Ok(Message::Set(decode_set_payload(&mut p)?)),
        MessageType::Delete => Ok(Message::Delete(DeleteCommand {
            keys: decode_keys_payload(&mut p)?,
        })),
        MessageType::Metrics => Ok(Message::Metrics(decode_metrics_payload(&mut p)?)),
        MessageType::Response => Ok(Message::Response(decode_response_payload(&mut p)?)),
    }
}

fn put_str(out: &mut BytesMut, s: &str) {
    out.put_u16(s.len() as u16);
    out.extend_from_slice(s.as_bytes());
}

fn get_str(p: &mut &[u8]) -> Result<String, ProtoError> {
    if p.remaining() < 2 {
        return Err(ProtoError::MalformedPayload("truncated string length"));
    }
    let len = p.get_u16() as usize;
    if p.remaining() < len {
        return Err(ProtoError::MalformedPayload("truncated string"));
    }
    let s = std::str::from_utf8(&p[..len])
        .map_err(|_| ProtoError::InvalidUtf8)?
        .to_string();
    p.advance(len);
    Ok(s)
}

fn put_value(out: &mut BytesMut, value: &[u8]) {
    out.put_u32(value.len() as u32);
    out.extend_from_slice(value);
}

fn get_value(p: &mut &[u8]) -> Result<Bytes, ProtoError> {
    if p.remaining() < 4 {
        return Err(ProtoError::MalformedPayload("truncated value length"));
    }
    let len = p.get_u32() as usize;
    if p.remaining() < len {
        return Err(ProtoError::MalformedPayload("truncated value"));
    }
    let value = Bytes::copy_from_slice(&p[..len]);
    p.advance(len);
    Ok(value)
}

fn get_count(p: &mut &[u8]) -> Result<usize, ProtoError> {
    if p.remaining() < 4 {
        return Err(ProtoError::MalformedPayload("truncated element count"));
    }
    let count = p.get_u32() as usize;
    // Every element carries at least a length prefix.
    if count > p.remaining() {
        return Err(ProtoError::MalformedPayload("element count exceeds payload"));
    }
    Ok(count)
}

fn encode_keys_payload(keys: &[String]) -> BytesMut {
    let mut out = BytesMut::with_capacity(4 + keys.iter().map(|k| 2 + k.len()).sum::<usize>());
    out.put_u32(keys.len() as u32);
    for key in keys {
        put_str(&mut out, key);
    }
    out
}

fn decode_keys_payload(p: &mut &[u8]) -> Result<Vec<String>, ProtoError> {
    let count = get_count(p)?;
    let mut keys = Vec::with_capacity(count);
    for _ in 0..count {
        keys.push(get_str(p)?);
    }
    Ok(keys)
}

fn encode_set_payload(cmd: &SetCommand) -> BytesMut {
    let body: usize = cmd.pairs.iter().map(|(k, v)| 2 + k.len() + 4 + v.len()).sum();
    let mut out = BytesMut::with_capacity(4 + body);
    out.put_u32(cmd.pairs.len() as u32);
    for (key, value) in &cmd.pairs {
        put_str(&mut out, key);
        put_value(&mut out, value);
    }
    out
}

fn decode_set_payload(p: &mut &[u8]) -> Result<SetCommand, ProtoError> {
    let count = get_count(p)?;
    let mut pairs = Vec::with_capacity(count);
    for _ in 0..count {
        let key = get_str(p)?;
        let value = get_value(p)?;
        pairs.push((key, value));
    }
    Ok(SetCommand { pairs })
}

fn encode_metrics_payload(cmd: &MetricsCommand) -> BytesMut {
    let mut flags = 0u8;
    if cmd.key_count {
        flags |= FLAG_KEY_COUNT;
    }
    if cmd.total_store_contents_size {
        flags |= FLAG_TOTAL_SIZE;
    }
    if cmd.keys_read_count {
        flags |= FLAG_READS;
    }
    if cmd.keys_updated_count {
        flags |= FLAG_UPDATES;
    }
    if cmd.keys_deleted_count {
        flags |= FLAG_DELETES;
    }
    let mut out = BytesMut::with_capacity(1);
    out.put_u8(flags);
    out
}

fn decode_metrics_payload(p: &mut &[u8]) -> Result<MetricsCommand, ProtoError> {
    if p.remaining() < 1 {
        return Err(ProtoError::MalformedPayload("missing selector flags"));
    }
    let flags = p.get_u8();
    Ok(MetricsCommand {
        key_count: flags & FLAG_KEY_COUNT != 0,
        total_store_contents_size: flags & FLAG_TOTAL_SIZE != 0,
        keys_read_count: flags & FLAG_READS != 0,
        keys_updated_count: flags & FLAG_UPDATES != 0,
        keys_deleted_count: flags & FLAG_DELETES != 0,
    })
}

fn encode_report(out: &mut BytesMut, report: &MetricsReport) {
    let fields = [
        (FLAG_KEY_COUNT, report.key_count),
        (FLAG_TOTAL_SIZE, report.total_store_contents_size),
        (FLAG_READS, report.keys_read_count),
        (FLAG_UPDATES, report.keys_updated_count),
        (FLAG_DELETES, report.keys_deleted_count),
    ];
    let mut flags = 0u8;
    for (flag, value) in fields {
        if value.is_some() {
            flags |= flag;
        }
    }
    out.put_u8(flags);
    for (_, value) in fields {
        if let Some(v) = value {
            out.put_i64(v);
        }
    }
}

fn decode_report(p: &mut &[u8]) -> Result<MetricsReport, ProtoError> {
    if p.remaining() < 1 {
        return Err(ProtoError::MalformedPayload("missing report flags"));
    }
    let flags = p.get_u8();
    let mut field = |flag: u8| -> Result<Option<i64>, ProtoError> {
        if flags & flag == 0 {
            return Ok(None);
        }
        if p.remaining() < 8 {
            return Err(ProtoError::MalformedPayload("truncated report field"));
        }
        Ok(Some(p.get_i64()))
    };
    Ok(MetricsReport {
        key_count: field(FLAG_KEY_COUNT)?,
        total_store_contents_size: field(FLAG_TOTAL_SIZE)?,
        keys_read_count: field(FLAG_READS)?,
        keys_updated_count: field(FLAG_UPDATES)?,
        keys_deleted_count: field(FLAG_DELETES)?,
    })
}

fn encode_response_payload(resp: &Response) -> BytesMut {
    let mut out = BytesMut::with_capacity(1 + 2 + resp.message.len() + 1);
    out.put_u8(resp.status as u8);
    put_str(&mut out, &resp.message);
    match &resp.payload {
        None => out.put_u8(PAYLOAD_NONE),
        Some(ResponsePayload::KvList(pairs)) => {
            out.put_u8(PAYLOAD_KV_LIST);
            out.put_u32(pairs.len() as u32);
            for (key, value) in pairs {
                put_str(&mut out, key);
                put_value(&mut out, value);
            }
        }
        Some(ResponsePayload::KeyList(keys)) => {
            out.put_u8(PAYLOAD_KEY_LIST);
            out.put_u32(keys.len() as u32);
            for key in keys {
                put_str(&mut out, key);
            }
        }
        Some(ResponsePayload::Metrics(report)) => {
            out.put_u8(PAYLOAD_METRICS);
            encode_report(&mut out, report);
        }
    }
    out
}

fn decode_response_payload(p: &mut &[u8]) -> Result<Response, ProtoError> {
    if p.remaining() < 1 {
        return Err(ProtoError::MalformedPayload("missing response status"));
    }
    let status = match p.get_u8() {
        0 => Status::Ok,
        1 => Status::Error,
        _ => return Err(ProtoError::MalformedPayload("unknown response status")),
    };
    let message = get_str(p)?;
    if p.remaining() < 1 {
        return Err(ProtoError::MalformedPayload("missing payload tag"));
    }
    let payload = match p.get_u8() {
        PAYLOAD_NONE => None,
        PAYLOAD_KV_LIST => {
            let count = get_count(p)?;
            let mut pairs = Vec::with_capacity(count);
            for _ in 0..count {
                let key = get_str(p)?;
                let value = get_value(p)?;
                pairs.push((key, value));
            }
            Some(ResponsePayload::KvList(pairs))
        }
        PAYLOAD_KEY_LIST => {
            let count = get_count(p)?;
            let mut keys = Vec::with_capacity(count);
            for _ in 0..count {
                keys.push(get_str(p)?);
            }
            Some(ResponsePayload::KeyList(keys))
        }
        PAYLOAD_METRICS => Some(ResponsePayload::Metrics(decode_report(p)?)),
        _ => return Err(ProtoError::MalformedPayload("unknown payload tag")),
    };
    Ok(Response {
        status,
        message,
        payload,
    })
}
