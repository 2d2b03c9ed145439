//! Client Session
//!
//! Owns the byte channel to one engine process and keeps at most one request
//! in flight on it.
//!
//! Frames carry no request identifier, so a response belongs to whichever
//! request was written last. Callers are therefore queued on an async mutex
//! held across the whole write-then-read exchange. A timed out exchange leaves
//! the channel in an unknown position and it is torn down rather than reused.

use std::io;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::error::{CacheError, ProtocolError, Result};
use crate::protocol::{Command as FrameCommand, Frame, FrameReader, Request, Response};

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Grace period for the engine to exit after its stdin is closed.
const ENGINE_EXIT_GRACE: Duration = Duration::from_millis(500);

// == Exchange State ==
/// Position of the channel within one request/response exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exchange {
    Idle,
    /// A request frame is partially written
    Writing,
    /// A request was written and its response not yet consumed
    AwaitingResponse,
}

// == Channel ==
struct Channel {
    reader: FrameReader<BoxedReader>,
    writer: BoxedWriter,
    child: Option<Child>,
    exchange: Exchange,
}

impl Channel {
    fn new(reader: BoxedReader, writer: BoxedWriter, child: Option<Child>) -> Self {
        Self {
            reader: FrameReader::new(reader),
            writer,
            child,
            exchange: Exchange::Idle,
        }
    }

    /// Spawns the engine with stdin and stdout piped.
    fn spawn(config: &SessionConfig) -> Result<Self> {
        let stderr = if config.debug {
            Stdio::inherit()
        } else {
            Stdio::null()
        };

        let mut child = Command::new(&config.engine_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(stderr)
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "engine stdin not piped"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "engine stdout not piped"))?;

        Ok(Self::new(Box::new(stdout), Box::new(stdin), Some(child)))
    }

    /// Writes one request frame and reads the frame that answers it.
    async fn round_trip(&mut self, frame: &Frame) -> Result<Frame> {
        match self.exchange {
            Exchange::Idle => {}
            // Cancelled mid-write: the engine holds a partial frame
            Exchange::Writing => return Err(CacheError::Poisoned),
            // Cancelled after writing: the answer is still in the pipe
            Exchange::AwaitingResponse => {
                self.read_frame().await?;
                self.exchange = Exchange::Idle;
                debug!("discarded response to a cancelled request");
            }
        }

        self.exchange = Exchange::Writing;
        self.writer.write_all(frame).await.map_err(wire_error)?;
        self.writer.flush().await.map_err(wire_error)?;
        self.exchange = Exchange::AwaitingResponse;

        let reply = self.read_frame().await?;
        self.exchange = Exchange::Idle;
        Ok(reply)
    }

    async fn read_frame(&mut self) -> Result<Frame> {
        match self.reader.next_frame().await {
            Ok(Some(frame)) => Ok(frame),
            Ok(None) => Err(CacheError::ConnectionClosed),
            Err(CacheError::Io(err)) => Err(wire_error(err)),
            Err(err) => Err(err),
        }
    }

    /// Closes the engine's stdin, then makes sure the process is gone.
    async fn shutdown(mut self) {
        if let Err(err) = self.writer.shutdown().await {
            debug!(%err, "engine stdin already closed");
        }
        drop(self.writer);

        let Some(mut child) = self.child.take() else {
            return;
        };

        match tokio::time::timeout(ENGINE_EXIT_GRACE, child.wait()).await {
            Ok(Ok(status)) => debug!(%status, "engine exited"),
            Ok(Err(err)) => warn!(%err, "failed to reap engine"),
            Err(_) => {
                if let Err(err) = child.kill().await {
                    warn!(%err, "failed to kill engine");
                } else {
                    debug!("engine killed");
                }
            }
        }
    }
}

fn wire_error(err: io::Error) -> CacheError {
    match err.kind() {
        io::ErrorKind::BrokenPipe
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::UnexpectedEof => CacheError::ConnectionClosed,
        _ => CacheError::Io(err),
    }
}

// == Session State ==
enum Slot {
    NotStarted,
    Open(Channel),
    /// Torn down after a timeout or an interrupted write
    Poisoned,
    Closed,
}

impl Slot {
    fn name(&self) -> &'static str {
        match self {
            Slot::NotStarted => "not started",
            Slot::Open(_) => "open",
            Slot::Poisoned => "poisoned",
            Slot::Closed => "closed",
        }
    }
}

// == Cache Session ==
/// Client handle to one engine instance.
///
/// All methods take `&self`; share the session behind an `Arc` to use it from
/// several tasks. Concurrent calls are served one at a time in arrival order.
pub struct CacheSession {
    slot: Mutex<Slot>,
    closing: watch::Sender<bool>,
    config: SessionConfig,
}

impl CacheSession {
    // == Constructors ==
    /// Creates a session that has not spawned its engine yet.
    pub fn new(config: SessionConfig) -> Self {
        Self {
            slot: Mutex::new(Slot::NotStarted),
            closing: watch::channel(false).0,
            config,
        }
    }

    /// Creates a session and spawns its engine.
    pub async fn spawn(config: SessionConfig) -> Result<Self> {
        let session = Self::new(config);
        session.start().await?;
        Ok(session)
    }

    /// Creates a session over an already-open byte pipe to an engine.
    pub fn with_stream<R, W>(reader: R, writer: W, config: SessionConfig) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let channel = Channel::new(Box::new(reader), Box::new(writer), None);
        Self {
            slot: Mutex::new(Slot::Open(channel)),
            closing: watch::channel(false).0,
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    // == Lifecycle ==
    /// Spawns the engine unless a channel is already open.
    ///
    /// Also recovers a poisoned or closed session with a fresh engine; the
    /// new engine starts with an empty store.
    pub async fn start(&self) -> Result<()> {
        let mut slot = self.slot.lock().await;
        if let Slot::Open(_) = *slot {
            return Ok(());
        }

        let previous = slot.name();
        let channel = Channel::spawn(&self.config)?;
        self.closing.send_replace(false);
        *slot = Slot::Open(channel);

        info!(engine = %self.config.engine_path.display(), previous, "engine started");
        Ok(())
    }

    /// Returns true while a channel is open.
    pub async fn is_open(&self) -> bool {
        matches!(*self.slot.lock().await, Slot::Open(_))
    }

    /// Closes the channel and terminates the engine.
    ///
    /// Calls in flight or queued at this point fail with
    /// [`CacheError::ConnectionClosed`]. Closing twice is a no-op.
    pub async fn close(&self) -> Result<()> {
        self.closing.send_replace(true);

        let mut slot = self.slot.lock().await;
        match std::mem::replace(&mut *slot, Slot::Closed) {
            Slot::Open(channel) => {
                channel.shutdown().await;
                info!("session closed");
                Ok(())
            }
            Slot::NotStarted => {
                *slot = Slot::NotStarted;
                self.closing.send_replace(false);
                Err(CacheError::NotStarted)
            }
            Slot::Poisoned | Slot::Closed => Ok(()),
        }
    }

    // == Operations ==
    /// Stores `value` under `key` for `ttl_seconds`.
    pub async fn insert(&self, key: &str, value: &str, ttl_seconds: u16) -> Result<()> {
        let request = Request::insert(key, value, ttl_seconds);
        let response = self.send(&request).await?;
        expect_ack(FrameCommand::Insert, response)
    }

    /// Looks up `key`; `Ok(None)` is a miss (absent or expired).
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        match self.send(&Request::get(key)).await? {
            Response::Value(value) => Ok(Some(value)),
            Response::Miss => Ok(None),
            Response::Error(message) => Err(CacheError::Rejected(message)),
            other => Err(unexpected(FrameCommand::Get, &other)),
        }
    }

    /// Removes `key`; removing an absent key still succeeds.
    pub async fn remove(&self, key: &str) -> Result<()> {
        let response = self.send(&Request::remove(key)).await?;
        expect_ack(FrameCommand::Remove, response)
    }

    // == Send ==
    /// Sends one request and waits for its response.
    ///
    /// Encoding errors are raised before anything is written. On timeout the
    /// channel is torn down and later calls fail with
    /// [`CacheError::Poisoned`] until [`start`](Self::start) is called again.
    pub async fn send(&self, request: &Request) -> Result<Response> {
        let frame = request.encode()?;

        let mut closing = self.closing.subscribe();
        if *closing.borrow_and_update() {
            return Err(CacheError::ConnectionClosed);
        }

        let mut slot = tokio::select! {
            slot = self.slot.lock() => slot,
            _ = closing.changed() => return Err(CacheError::ConnectionClosed),
        };

        let channel = match &mut *slot {
            Slot::Open(channel) => channel,
            Slot::NotStarted => return Err(CacheError::NotStarted),
            Slot::Poisoned => return Err(CacheError::Poisoned),
            Slot::Closed => return Err(CacheError::ConnectionClosed),
        };

        if self.config.debug {
            debug!(direction = "out", command = request.command().name(), frame = ?&frame[..], "request frame");
        }

        let timeout = self.config.request_timeout;
        let outcome = tokio::select! {
            outcome = tokio::time::timeout(timeout, channel.round_trip(&frame)) => outcome,
            _ = closing.changed() => return Err(CacheError::ConnectionClosed),
        };

        match outcome {
            Ok(Ok(reply)) => {
                if self.config.debug {
                    debug!(direction = "in", frame = ?&reply[..], "response frame");
                }
                Ok(Response::decode(&reply)?)
            }
            Ok(Err(err)) => {
                let next = match err {
                    CacheError::Poisoned => Slot::Poisoned,
                    _ => Slot::Closed,
                };
                warn!(%err, state = next.name(), "channel failed");
                if let Slot::Open(channel) = std::mem::replace(&mut *slot, next) {
                    channel.shutdown().await;
                }
                Err(err)
            }
            Err(_) => {
                warn!(?timeout, "no response from engine, tearing down channel");
                if let Slot::Open(channel) = std::mem::replace(&mut *slot, Slot::Poisoned) {
                    channel.shutdown().await;
                }
                Err(CacheError::Timeout(timeout))
            }
        }
    }
}

fn expect_ack(command: FrameCommand, response: Response) -> Result<()> {
    match response {
        Response::Ack => Ok(()),
        Response::Error(message) => Err(CacheError::Rejected(message)),
        other => Err(unexpected(command, &other)),
    }
}

fn unexpected(command: FrameCommand, response: &Response) -> CacheError {
    ProtocolError::UnexpectedResponse {
        command: command.name(),
        got: response.kind(),
    }
    .into()
}
