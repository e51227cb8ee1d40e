//! # Single Connection Client
//!
//! Purpose: Own one socket to the server and run the connect, write command,
//! read response cycle for each meta operation.
//!
//! ## Design Principles
//! 1. **Lazy Connect**: The socket opens on first use and is then reused.
//! 2. **Buffer Reuse**: Command and read buffers live on the connection.
//! 3. **Protocol Framing**: Reads accumulate until the parser sees a whole
//!    response; a short read is not an end marker.
//! 4. **Clean Slate on Failure**: A failed or interrupted exchange drops the
//!    socket so stale bytes never leak into the next response.

use std::future::Future;
use std::io;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
#[cfg(unix)]
use tokio::net::UnixStream;
use tracing::{debug, trace, warn};

use mkv_common::{
    encode_get, encode_set, make_key, parse_response, GetOptions, MetaResponse, ProtocolError,
    ReturnCode, StoreStatus,
};

use crate::config::{ClientConfig, Transport};
use crate::error::{ClientError, ClientResult};

/// Table used by `set_list`/`get_list`.
pub const LIST_TABLE: &str = "list";

enum Stream {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl Stream {
    async fn open(transport: &Transport) -> io::Result<Self> {
        match transport {
            Transport::Tcp { host, port } => {
                let stream = TcpStream::connect((host.as_str(), *port)).await?;
                // Disable Nagle to keep request latency low for small payloads.
                stream.set_nodelay(true)?;
                Ok(Stream::Tcp(stream))
            }
            #[cfg(unix)]
            Transport::Unix(path) => Ok(Stream::Unix(UnixStream::connect(path).await?)),
            #[cfg(not(unix))]
            Transport::Unix(_) => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "unix sockets are not supported on this platform",
            )),
        }
    }

    async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        match self {
            Stream::Tcp(stream) => stream.write_all(data).await,
            #[cfg(unix)]
            Stream::Unix(stream) => stream.write_all(data).await,
        }
    }

    async fn read_buf(&mut self, buf: &mut BytesMut) -> io::Result<usize> {
        match self {
            Stream::Tcp(stream) => stream.read_buf(buf).await,
            #[cfg(unix)]
            Stream::Unix(stream) => stream.read_buf(buf).await,
        }
    }
}

/// One meta protocol connection.
///
/// Not shareable between concurrent operations; wrap it in a [`crate::Pool`]
/// for that.
pub struct Connection {
    transport: Transport,
    stream: Option<Stream>,
    read_buf: BytesMut,
    write_buf: Vec<u8>,
    read_buffer_size: usize,
    connect_timeout: Option<Duration>,
    io_timeout: Option<Duration>,
    // Set while a command is written but its response not yet parsed.
    in_flight: bool,
}

impl Connection {
    /// Creates an unconnected client; fails on contradictory transport settings.
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let transport = config.transport()?;
        Ok(Connection::with_transport(transport, config))
    }

    pub(crate) fn with_transport(transport: Transport, config: &ClientConfig) -> Self {
        Connection {
            transport,
            stream: None,
            read_buf: BytesMut::with_capacity(config.read_buffer_size),
            write_buf: Vec::with_capacity(256),
            read_buffer_size: config.read_buffer_size,
            connect_timeout: config.connect_timeout(),
            io_timeout: config.io_timeout(),
            in_flight: false,
        }
    }

    /// Endpoint this connection talks to.
    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// True once a socket is open.
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Opens the socket unless it is already open.
    pub async fn connect(&mut self) -> ClientResult<()> {
        if self.stream.is_some() {
            return Ok(());
        }
        let stream = with_timeout(self.connect_timeout, Stream::open(&self.transport)).await??;
        debug!(transport = %self.transport, "connected");
        self.stream = Some(stream);
        self.read_buf.clear();
        Ok(())
    }

    /// Stores `value` under `table ++ id`.
    pub async fn set(
        &mut self,
        table: &str,
        id: &str,
        value: impl AsRef<[u8]>,
    ) -> ClientResult<StoreStatus> {
        let key = make_key(table, id);
        self.write_buf.clear();
        encode_set(key.as_bytes(), value.as_ref(), &mut self.write_buf);
        let response = self.exchange().await?;
        Ok(StoreStatus::from_code(response.code)?)
    }

    /// Fetches the value under `table ++ id`; `None` on a miss.
    pub async fn get(&mut self, table: &str, id: &str) -> ClientResult<Option<Bytes>> {
        let response = self
            .get_with_options(table, id, &GetOptions::default())
            .await?;
        Ok(response.into_value())
    }

    /// Issues `mg` with explicit flags and returns the whole response.
    ///
    /// With `noreply` set the server stays silent on a miss, so the call only
    /// returns if an I/O timeout is configured.
    pub async fn get_with_options(
        &mut self,
        table: &str,
        id: &str,
        options: &GetOptions,
    ) -> ClientResult<MetaResponse> {
        let key = make_key(table, id);
        self.write_buf.clear();
        encode_get(key.as_bytes(), options, &mut self.write_buf);
        let response = self.exchange().await?;
        match response.code {
            ReturnCode::Header | ReturnCode::Value | ReturnCode::Miss => Ok(response),
            other => Err(ProtocolError::UnexpectedReturnCode(other.as_str()).into()),
        }
    }

    /// Stores `value` as JSON.
    pub async fn set_json<T>(&mut self, table: &str, id: &str, value: &T) -> ClientResult<StoreStatus>
    where
        T: Serialize + ?Sized,
    {
        let json = serde_json::to_vec(value)?;
        self.set(table, id, json).await
    }

    /// Fetches and deserializes a JSON value; empty values count as absent.
    pub async fn get_json<T>(&mut self, table: &str, id: &str) -> ClientResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        match self.get(table, id).await? {
            Some(data) if !data.is_empty() => Ok(Some(serde_json::from_slice(&data)?)),
            _ => Ok(None),
        }
    }

    /// Stores `values` as a JSON array under the list table.
    pub async fn set_list<T>(&mut self, list_id: &str, values: &[T]) -> ClientResult<StoreStatus>
    where
        T: Serialize,
    {
        self.set_json(LIST_TABLE, list_id, values).await
    }

    /// Fetches a JSON array stored with `set_list`.
    pub async fn get_list<T>(&mut self, list_id: &str) -> ClientResult<Option<Vec<T>>>
    where
        T: DeserializeOwned,
    {
        self.get_json(LIST_TABLE, list_id).await
    }

    async fn exchange(&mut self) -> ClientResult<MetaResponse> {
        if self.in_flight {
            // A previous call was dropped mid-exchange; its reply may still arrive.
            warn!(transport = %self.transport, "discarding interrupted connection");
            self.reset();
        }
        self.connect().await?;

        self.in_flight = true;
        let result = with_timeout(self.io_timeout, self.round_trip())
            .await
            .and_then(|inner| inner);
        match result {
            Ok(response) => {
                self.in_flight = false;
                Ok(response)
            }
            Err(err) => {
                debug!(transport = %self.transport, error = %err, "exchange failed");
                self.reset();
                Err(err)
            }
        }
    }

    async fn round_trip(&mut self) -> ClientResult<MetaResponse> {
        let stream = self.stream.as_mut().ok_or(ClientError::ConnectionClosed)?;
        stream.write_all(&self.write_buf).await?;
        trace!(bytes = self.write_buf.len(), "command written");

        loop {
            if let Some(response) = parse_response(&mut self.read_buf)? {
                trace!(
                    code = response.code.as_str(),
                    value_len = response.value.as_ref().map_or(0, |value| value.len()),
                    "response decoded"
                );
                return Ok(response);
            }
            self.read_buf.reserve(self.read_buffer_size);
            if stream.read_buf(&mut self.read_buf).await? == 0 {
                return Err(ClientError::ConnectionClosed);
            }
        }
    }

    fn reset(&mut self) {
        self.stream = None;
        self.read_buf.clear();
        self.in_flight = false;
    }
}

async fn with_timeout<F>(limit: Option<Duration>, future: F) -> ClientResult<F::Output>
where
    F: Future,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, future)
            .await
            .map_err(|_| ClientError::Timeout),
        None => Ok(future.await),
    }
}
