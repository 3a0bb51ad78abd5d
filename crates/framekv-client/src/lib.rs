pub mod backoff;
mod error;

pub use error::ClientError;

use std::collections::HashMap;
use std::io;
use std::time::Duration;

use bytes::Bytes;
use framekv_proto::{
    decode_message, encode_message, DeleteCommand, GetCommand, Message, MessageHeader,
    MessageType, MetricsCommand, MetricsReport, Response, ResponsePayload, SetCommand, Status,
    HEADER_SIZE,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::sleep;

use crate::backoff::{full_jitter, DEFAULT_CAP_MS, DEFAULT_MAX_RETRIES, DEFAULT_MIN_DELAY_MS};

enum RoundtripError {
    /// Transport failure; the socket is torn down and the call retried.
    Io(io::Error),
    /// Anything retrying cannot fix.
    Fatal(ClientError),
}

impl From<io::Error> for RoundtripError {
    fn from(err: io::Error) -> Self {
        RoundtripError::Io(err)
    }
}

/// Framed request/response client over one persistent socket. Transport
/// errors tear the socket down and retry with full-jitter backoff; the
/// socket is re-established on the next attempt.
pub struct Client {
    host: String,
    port: u16,
    stream: Option<TcpStream>,
    max_retries: u32,
    min_delay_ms: u64,
    cap_ms: u64,
}

impl Client {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            stream: None,
            max_retries: DEFAULT_MAX_RETRIES,
            min_delay_ms: DEFAULT_MIN_DELAY_MS,
            cap_ms: DEFAULT_CAP_MS,
        }
    }

    pub fn with_retry_policy(mut self, max_retries: u32, min_delay_ms: u64, cap_ms: u64) -> Self {
        self.max_retries = max_retries;
        self.min_delay_ms = min_delay_ms;
        self.cap_ms = cap_ms;
        self
    }

    /// Creates the socket if absent; a no-op when already connected.
    pub async fn connect(&mut self) -> io::Result<()> {
        if self.stream.is_none() {
            let stream = TcpStream::connect((self.host.as_str(), self.port)).await?;
            self.stream = Some(stream);
        }
        Ok(())
    }

    /// Sends one command and reads its response, retrying transport
    /// failures up to the configured maximum.
    pub async fn execute_command(&mut self, msg: &Message) -> Result<Response, ClientError> {
        let mut attempt = 0u32;
        loop {
            match self.roundtrip(msg).await {
                Ok(response) => return Ok(response),
                Err(RoundtripError::Fatal(err)) => return Err(err),
                Err(RoundtripError::Io(err)) => {
                    // The socket state is unknown; rebuild it next attempt.
                    self.stream = None;
                    if attempt >= self.max_retries {
                        return Err(ClientError::RetriesExhausted {
                            attempts: attempt + 1,
                            source: err,
                        });
                    }
                    attempt += 1;
                    let delay = full_jitter(attempt, self.min_delay_ms, self.cap_ms);
                    tracing::debug!(attempt, delay_ms = delay, error = %err, "retrying after transport error");
                    sleep(Duration::from_millis(delay)).await;
                }
            }
        }
    }

    async fn roundtrip(&mut self, msg: &Message) -> Result<Response, RoundtripError> {
        self.connect().await?;
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "socket missing"))?;

        let (header_bytes, body) = encode_message(msg);
        stream.write_all(&header_bytes).await?;
        stream.write_all(&body).await?;
        stream.flush().await?;

        let mut header_bytes = [0u8; HEADER_SIZE];
        stream.read_exact(&mut header_bytes).await?;
        let header = MessageHeader::decode(&header_bytes)
            .map_err(|err| RoundtripError::Fatal(err.into()))?;
        if header.message_type != MessageType::Response {
            return Err(RoundtripError::Fatal(ClientError::UnexpectedMessage(
                header.message_type,
            )));
        }
        let mut payload = vec![0u8; header.message_size as usize];
        stream.read_exact(&mut payload).await?;

        match decode_message(MessageType::Response, &payload)
            .map_err(|err| RoundtripError::Fatal(err.into()))?
        {
            Message::Response(response) => Ok(response),
            other => Err(RoundtripError::Fatal(ClientError::UnexpectedMessage(
                other.message_type(),
            ))),
        }
    }

    /// Fetches the given keys; absent keys are simply missing from the map.
    pub async fn get(&mut self, keys: Vec<String>) -> Result<HashMap<String, Bytes>, ClientError> {
        let response = self
            .execute_command(&Message::Get(GetCommand { keys }))
            .await?;
        match into_payload(response)? {
            Some(ResponsePayload::KvList(pairs)) => Ok(pairs.into_iter().collect()),
            None => Ok(HashMap::new()),
            Some(_) => Err(ClientError::UnexpectedPayload),
        }
    }

    /// Stores the given pairs; returns the written keys in input order.
    pub async fn set(&mut self, pairs: Vec<(String, Bytes)>) -> Result<Vec<String>, ClientError> {
        let response = self
            .execute_command(&Message::Set(SetCommand { pairs }))
            .await?;
        match into_payload(response)? {
            Some(ResponsePayload::KeyList(keys)) => Ok(keys),
            None => Ok(Vec::new()),
            Some(_) => Err(ClientError::UnexpectedPayload),
        }
    }

    /// Deletes the given keys; returns the keys that were actually removed.
    pub async fn delete(&mut self, keys: Vec<String>) -> Result<Vec<String>, ClientError> {
        let response = self
            .execute_command(&Message::Delete(DeleteCommand { keys }))
            .await?;
        match into_payload(response)? {
            Some(ResponsePayload::KeyList(keys)) => Ok(keys),
            None => Ok(Vec::new()),
            Some(_) => Err(ClientError::UnexpectedPayload),
        }
    }

    /// Reads the counters selected by `cmd`.
    pub async fn metrics(&mut self, cmd: MetricsCommand) -> Result<MetricsReport, ClientError> {
        let response = self.execute_command(&Message::Metrics(cmd)).await?;
        match into_payload(response)? {
            Some(ResponsePayload::Metrics(report)) => Ok(report),
            _ => Err(ClientError::UnexpectedPayload),
        }
    }
}

fn into_payload(response: Response) -> Result<Option<ResponsePayload>, ClientError> {
    match response.status {
        Status::Ok => Ok(response.payload),
        Status::Error => Err(ClientError::Api(response.message)),
    }
}
