//! ClamAV scanning engine.
//!
//! This module provides an engine client that talks to the ClamAV daemon
//! (clamd) over a single long-lived `IDSESSION` connection.
//!
//! # Requirements
//!
//! - ClamAV daemon (clamd) must be running
//! - Access to the clamd socket (Unix socket or TCP)
//!
//! # Protocol
//!
//! The session is opened with `zIDSESSION\0`. Each scan is an `INSTREAM`
//! command: 4-byte big-endian length-prefixed chunks, then a zero-length
//! chunk. Replies are NUL-terminated and prefixed with the request id:
//!
//! - `1: stream: OK`
//! - `2: stream: Eicar-Signature FOUND`
//! - `3: INSTREAM size limit exceeded. ERROR`
//!
//! The session ends with `zEND\0`.

use crate::core::{
    EngineReport, EngineStatus, HashingReader, RawVerdict, ScanEngine, ScanError, ScanResult,
    SequentialReader,
};
use crate::proxy::ProxyConfig;

use async_trait::async_trait;
use std::fmt;
use std::future::{poll_fn, Future};
use std::path::PathBuf;
use std::pin::Pin;
use std::str::FromStr;
use std::task::Poll;
use std::time::Duration;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};

const ENGINE_NAME: &str = "clamd";

/// How long to wait for a reply clamd sent before hanging up on an upload.
const PENDING_REPLY_TIMEOUT: Duration = Duration::from_millis(500);

/// Where the clamd daemon listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClamdAddress {
    /// A Unix domain socket path.
    Unix(PathBuf),
    /// A `host:port` TCP address.
    Tcp(String),
}

impl FromStr for ClamdAddress {
    type Err = ScanError;

    /// Parses `unix:///path/to/socket` or `tcp://host:port`.
    fn from_str(uri: &str) -> Result<Self, Self::Err> {
        if let Some(path) = uri.strip_prefix("unix://") {
            if path.is_empty() {
                return Err(ScanError::configuration("unix URI is missing a socket path"));
            }
            return Ok(Self::Unix(PathBuf::from(path)));
        }

        if let Some(addr) = uri.strip_prefix("tcp://") {
            let valid = addr
                .rsplit_once(':')
                .map(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok())
                .unwrap_or(false);
            if !valid {
                return Err(ScanError::configuration(format!(
                    "tcp URI must have the form tcp://host:port, got '{}'",
                    uri
                )));
            }
            return Ok(Self::Tcp(addr.to_string()));
        }

        Err(ScanError::configuration(format!(
            "unsupported clamd URI '{}': expected unix:// or tcp://",
            uri
        )))
    }
}

impl fmt::Display for ClamdAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unix(path) => write!(f, "unix://{}", path.display()),
            Self::Tcp(addr) => write!(f, "tcp://{}", addr),
        }
    }
}

/// ClamAV engine configuration.
#[derive(Debug, Clone)]
pub struct ClamdConfig {
    /// Daemon address.
    pub address: ClamdAddress,

    /// Timeout for establishing the connection.
    pub connect_timeout: Duration,

    /// Timeout for each read or write on the connection.
    pub read_timeout: Duration,

    /// Size of the INSTREAM chunks.
    pub chunk_size: usize,
}

impl Default for ClamdConfig {
    fn default() -> Self {
        Self {
            address: ClamdAddress::Unix(PathBuf::from("/var/run/clamav/clamd.ctl")),
            connect_timeout: Duration::from_secs(30),
            read_timeout: Duration::from_secs(30),
            chunk_size: 8 * 1024,
        }
    }
}

impl ClamdConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration from a `unix://` or `tcp://` URI.
    pub fn from_uri(uri: &str) -> ScanResult<Self> {
        Ok(Self {
            address: uri.parse()?,
            ..Self::default()
        })
    }

    /// Uses a Unix socket.
    pub fn with_socket(mut self, path: impl Into<PathBuf>) -> Self {
        self.address = ClamdAddress::Unix(path.into());
        self
    }

    /// Uses a TCP connection.
    pub fn with_tcp(mut self, address: impl Into<String>) -> Self {
        self.address = ClamdAddress::Tcp(address.into());
        self
    }

    /// Sets the connection timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the read timeout.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Copies the connect and read timeouts from a proxy configuration.
    pub fn with_timeouts_from(mut self, config: &ProxyConfig) -> Self {
        self.connect_timeout = config.connect_timeout;
        self.read_timeout = config.read_timeout;
        self
    }

    /// Sets the INSTREAM chunk size.
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    fn validate(&self) -> ScanResult<()> {
        if self.chunk_size == 0 {
            return Err(ScanError::configuration("chunk_size must be greater than zero"));
        }
        if u32::try_from(self.chunk_size).is_err() {
            return Err(ScanError::configuration("chunk_size must fit in a 4-byte length prefix"));
        }
        if self.connect_timeout.is_zero() || self.read_timeout.is_zero() {
            return Err(ScanError::configuration("timeouts must be greater than zero"));
        }
        Ok(())
    }
}

trait Transport: AsyncRead + AsyncWrite + Send + Sync + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Sync + Unpin> Transport for T {}

type Session = BufReader<Box<dyn Transport>>;

/// ClamAV engine client.
///
/// Holds one `IDSESSION` connection. A transport failure drops the
/// connection and the next call opens a fresh one.
///
/// # Example
///
/// ```rust,ignore
/// use scanproxy::engine::{ClamdConfig, ClamdEngine};
///
/// let config = ClamdConfig::from_uri("unix:///var/run/clamav/clamd.ctl")?;
/// let engine = ClamdEngine::new(config)?;
/// ```
pub struct ClamdEngine {
    config: ClamdConfig,
    session: Option<Session>,
    next_id: u64,
    closed: bool,
}

impl fmt::Debug for ClamdEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClamdEngine")
            .field("config", &self.config)
            .field("connected", &self.session.is_some())
            .field("closed", &self.closed)
            .finish()
    }
}

impl ClamdEngine {
    /// Creates a new client. No connection is made until the session starts.
    pub fn new(config: ClamdConfig) -> ScanResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            session: None,
            next_id: 1,
            closed: false,
        })
    }

    /// Creates a client for the given URI with default timeouts.
    pub fn from_uri(uri: &str) -> ScanResult<Self> {
        Self::new(ClamdConfig::from_uri(uri)?)
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ClamdConfig {
        &self.config
    }

    /// Returns `true` if a session connection is currently open.
    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    async fn connect(&self) -> ScanResult<Box<dyn Transport>> {
        let timeout = self.config.connect_timeout;
        match &self.config.address {
            #[cfg(unix)]
            ClamdAddress::Unix(path) => {
                let stream = io_timeout(timeout, tokio::net::UnixStream::connect(path)).await?;
                Ok(Box::new(stream))
            }
            #[cfg(not(unix))]
            ClamdAddress::Unix(_) => Err(ScanError::configuration(
                "Unix sockets not supported on this platform",
            )),
            ClamdAddress::Tcp(addr) => {
                let stream = io_timeout(timeout, tokio::net::TcpStream::connect(addr)).await?;
                Ok(Box::new(stream))
            }
        }
    }

    fn session_mut(&mut self) -> ScanResult<&mut Session> {
        self.session
            .as_mut()
            .ok_or_else(|| ScanError::protocol(ENGINE_NAME, "no open session"))
    }

    /// Sends one command and reads its reply, reconnecting if needed.
    async fn command<R>(&mut self, command: &[u8], body: Option<R>) -> ScanResult<Exchange>
    where
        R: AsyncRead + Unpin + Send,
    {
        self.start_session().await?;

        let id = self.next_id;
        self.next_id += 1;

        // A failure part-way through a command leaves the framing unknown.
        let exchange = match self.exchange(id, command, body).await {
            Ok(exchange) => exchange,
            Err(e) => {
                tracing::warn!(engine = ENGINE_NAME, error = %e, "Dropping clamd session");
                self.session = None;
                return Err(e);
            }
        };
        if exchange.reply.ends_with(" ERROR") {
            // clamd may close the connection after a command error.
            self.session = None;
        }
        Ok(exchange)
    }

    async fn exchange<R>(
        &mut self,
        id: u64,
        command: &[u8],
        body: Option<R>,
    ) -> ScanResult<Exchange>
    where
        R: AsyncRead + Unpin + Send,
    {
        let timeout = self.config.read_timeout;
        let chunk_size = self.config.chunk_size;
        let session = self.session_mut()?;

        io_timeout(timeout, session.get_mut().write_all(command)).await?;

        let mut bytes_scanned = 0;
        let mut content_hash = None;
        if let Some(body) = body {
            let mut reader = HashingReader::new(body);
            let sent = send_chunks(session, &mut reader, chunk_size, timeout).await;
            bytes_scanned = reader.bytes_read();
            content_hash = Some(reader.hash());

            if let Err(e) = sent {
                if !e.is_unavailable() {
                    return Err(e);
                }
                // clamd answers an oversized stream and hangs up mid-upload.
                let wait = timeout.min(PENDING_REPLY_TIMEOUT);
                let Ok(reply) = read_reply(session, id, wait).await else {
                    return Err(e);
                };
                tracing::debug!(
                    engine = ENGINE_NAME,
                    id,
                    error = %e,
                    "clamd replied before the upload finished"
                );
                return Ok(Exchange {
                    reply,
                    bytes_scanned,
                    content_hash,
                });
            }
        }
        io_timeout(timeout, session.get_mut().flush()).await?;

        let reply = read_reply(session, id, timeout).await?;
        Ok(Exchange {
            reply,
            bytes_scanned,
            content_hash,
        })
    }

    async fn instream<R>(&mut self, reader: R) -> ScanResult<EngineReport>
    where
        R: AsyncRead + Unpin + Send,
    {
        let exchange = self.command(b"zINSTREAM\0", Some(reader)).await?;
        let raw = parse_scan_reply(&exchange.reply);
        let content_hash = exchange
            .content_hash
            .ok_or_else(|| ScanError::protocol(ENGINE_NAME, "INSTREAM sent no body"))?;
        Ok(EngineReport::new(raw, exchange.bytes_scanned, content_hash))
    }

    fn ensure_open(&self) -> ScanResult<()> {
        if self.closed {
            return Err(ScanError::SessionClosed {
                engine: ENGINE_NAME.to_string(),
            });
        }
        Ok(())
    }
}

struct Exchange {
    reply: String,
    bytes_scanned: u64,
    content_hash: Option<crate::core::ContentHash>,
}

#[async_trait]
impl ScanEngine for ClamdEngine {
    fn name(&self) -> &str {
        ENGINE_NAME
    }

    async fn start_session(&mut self) -> ScanResult<()> {
        self.ensure_open()?;
        if let Some(session) = self.session.as_mut() {
            if is_live(session).await {
                return Ok(());
            }
            // clamd drops sessions that sit idle past its IdleTimeout.
            tracing::debug!(engine = ENGINE_NAME, "clamd session went stale, reconnecting");
            self.session = None;
        }

        let mut transport = self.connect().await?;
        io_timeout(self.config.read_timeout, transport.write_all(b"zIDSESSION\0")).await?;
        io_timeout(self.config.read_timeout, transport.flush()).await?;

        self.session = Some(BufReader::new(transport));
        self.next_id = 1;

        tracing::debug!(
            engine = ENGINE_NAME,
            address = %self.config.address,
            "clamd session started"
        );
        Ok(())
    }

    async fn scan_bytes(&mut self, data: &[u8]) -> ScanResult<EngineReport> {
        self.instream(data).await
    }

    async fn scan_stream(
        &mut self,
        stream: &mut SequentialReader,
    ) -> ScanResult<EngineReport> {
        self.instream(stream).await
    }

    async fn ping(&mut self) -> ScanResult<()> {
        let exchange = self.command(b"zPING\0", None::<&[u8]>).await?;
        if exchange.reply == "PONG" {
            Ok(())
        } else {
            Err(ScanError::protocol(
                ENGINE_NAME,
                format!("unexpected PING reply: {}", exchange.reply),
            ))
        }
    }

    async fn end_session(&mut self) -> ScanResult<()> {
        self.closed = true;
        let Some(mut session) = self.session.take() else {
            return Ok(());
        };

        let timeout = self.config.read_timeout;
        io_timeout(timeout, session.get_mut().write_all(b"zEND\0")).await?;
        io_timeout(timeout, session.get_mut().shutdown()).await?;

        tracing::debug!(engine = ENGINE_NAME, "clamd session ended");
        Ok(())
    }
}

/// Runs an I/O future under a timeout, mapping failures to engine errors.
async fn io_timeout<T, F>(timeout: Duration, fut: F) -> ScanResult<T>
where
    F: Future<Output = std::io::Result<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(ScanError::connection_failed(ENGINE_NAME, e.to_string())),
        Err(_) => Err(ScanError::timeout(ENGINE_NAME, timeout)),
    }
}

/// Streams the body as length-prefixed INSTREAM chunks, ending with the
/// zero-length terminator.
async fn send_chunks<R>(
    session: &mut Session,
    reader: &mut HashingReader<R>,
    chunk_size: usize,
    timeout: Duration,
) -> ScanResult<()>
where
    R: AsyncRead + Unpin + Send,
{
    let mut chunk = vec![0u8; chunk_size];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        let len = u32::try_from(n)
            .map_err(|_| ScanError::configuration("chunk exceeds the 4-byte length prefix"))?;
        io_timeout(timeout, session.get_mut().write_all(&len.to_be_bytes())).await?;
        io_timeout(timeout, session.get_mut().write_all(&chunk[..n])).await?;
    }
    io_timeout(timeout, session.get_mut().write_all(&0u32.to_be_bytes())).await
}

/// Reads one NUL-terminated reply and checks it belongs to request `id`.
async fn read_reply(session: &mut Session, id: u64, timeout: Duration) -> ScanResult<String> {
    let mut raw = Vec::new();
    let n = io_timeout(timeout, session.read_until(b'\0', &mut raw)).await?;
    if n == 0 {
        return Err(ScanError::connection_failed(
            ENGINE_NAME,
            "connection closed before a reply was received",
        ));
    }
    if raw.last() == Some(&0) {
        raw.pop();
    }
    let line = String::from_utf8_lossy(&raw).trim().to_string();
    tracing::debug!(engine = ENGINE_NAME, id, reply = %line, "clamd reply");

    strip_request_id(&line, id)
}

/// Checks an idle session without blocking.
///
/// Between commands clamd sends nothing, so a pending read means the
/// connection is still open. End of stream, an error or stray bytes mean
/// the session can no longer be used.
async fn is_live(session: &mut Session) -> bool {
    poll_fn(|cx| match Pin::new(&mut *session).poll_fill_buf(cx) {
        Poll::Pending => Poll::Ready(true),
        Poll::Ready(_) => Poll::Ready(false),
    })
    .await
}

/// Removes the `"<id>: "` prefix of a session reply.
fn strip_request_id(line: &str, expected: u64) -> ScanResult<String> {
    let (id, rest) = line
        .split_once(": ")
        .ok_or_else(|| ScanError::protocol(ENGINE_NAME, format!("malformed reply: {}", line)))?;

    match id.parse::<u64>() {
        Ok(id) if id == expected => Ok(rest.to_string()),
        Ok(id) => Err(ScanError::protocol(
            ENGINE_NAME,
            format!("reply for request {} while waiting for {}", id, expected),
        )),
        Err(_) => Err(ScanError::protocol(
            ENGINE_NAME,
            format!("malformed reply: {}", line),
        )),
    }
}

/// Parses the body of an INSTREAM reply.
///
/// Expected formats:
/// - "stream: OK" - content is clean
/// - "stream: <virus_name> FOUND" - signature match
/// - "<message> ERROR" - the engine could not scan
///
/// Anything else is reported as `EngineStatus::Unknown`.
fn parse_scan_reply(reply: &str) -> RawVerdict {
    let reply = reply.trim();
    let body = reply.strip_prefix("stream: ").unwrap_or(reply);

    if body == "OK" {
        return RawVerdict::ok();
    }

    if let Some(name) = body.strip_suffix(" FOUND") {
        return RawVerdict::found(name.trim());
    }

    if let Some(message) = body.strip_suffix(" ERROR") {
        return RawVerdict::error(message.trim());
    }

    RawVerdict::new(EngineStatus::Unknown(reply.to_string()), Some(reply.to_string()))
}
