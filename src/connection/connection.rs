use std::future::Future;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard as StdMutexGuard, PoisonError};

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::config::{Config, Resources};
use crate::connection::{ConnectionState, Role, keepalive};
use crate::error::{Error, ErrorKind, Result};
use crate::message::{CloseCode, MessageType, ReceiveResult};
use crate::pool::PooledBuffer;
use crate::protocol::frame::{MAX_CLOSE_REASON_LEN, close_payload, parse_close_payload};
use crate::protocol::{
    FrameHeader, FrameValidator, OpCode, Utf8Validator, apply_mask, apply_mask_at,
};

/// A WebSocket endpoint driving an already-upgraded byte stream.
///
/// The handshake is not part of this type: hand it a stream on which the
/// HTTP upgrade has completed and it speaks RFC 6455 frames from the first
/// byte on.
///
/// All operations take `&self`. At most one [`send`](Self::send) and one
/// [`receive`](Self::receive) may be outstanding at a time, and the two may
/// run concurrently; wrap the connection in an `Arc` to share it between a
/// reading and a writing task. A second call of the same kind fails
/// immediately with [`Error::ConcurrentSend`] or [`Error::ConcurrentReceive`].
///
/// ## Example
///
/// ```rust,no_run
/// use tokio_util::sync::CancellationToken;
/// use wsengine::{Config, MessageType, Role, WebSocket};
///
/// # async fn run(stream: tokio::net::TcpStream) -> wsengine::Result<()> {
/// let ws = WebSocket::new(stream, Role::Client, Config::client());
/// let cancel = CancellationToken::new();
///
/// ws.send(b"hello", MessageType::Text, true, &cancel).await?;
///
/// let mut buf = [0u8; 1024];
/// let result = ws.receive(&mut buf, &cancel).await?;
/// println!("{:?}: {:?}", result.message_type, &buf[..result.count]);
/// # Ok(())
/// # }
/// ```
pub struct WebSocket<S> {
    inner: Arc<Inner<S>>,
}

pub(crate) struct Inner<S> {
    role: Role,
    config: Config,
    resources: Resources,
    validator: FrameValidator,
    writer: Mutex<WriteHalf<S>>,
    send_gate: Mutex<SendState>,
    receiver: Mutex<ReceiveState<S>>,
    status: StdMutex<Status>,
    aborted: CancellationToken,
}

#[derive(Debug, Default)]
struct SendState {
    // The last send left its message unfinished.
    continuing: bool,
}

struct ReceiveState<S> {
    reader: ReadHalf<S>,
    buf: BytesMut,
    pending: Option<PendingFrame>,
    in_progress: Option<MessageType>,
    utf8: Utf8Validator,
}

/// A data frame whose header has been consumed but whose payload has not.
#[derive(Debug, Clone, Copy)]
struct PendingFrame {
    kind: MessageType,
    fin: bool,
    mask: Option<[u8; 4]>,
    remaining: u64,
    mask_offset: usize,
}

enum Incoming {
    Data(PendingFrame),
    Close(ReceiveResult),
}

#[derive(Debug, Default)]
struct Status {
    state: ConnectionState,
    sent_close: bool,
    received_close: bool,
    close_status: Option<CloseCode>,
    close_reason: Option<String>,
}

impl<S> WebSocket<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    /// Wrap an upgraded stream using the default buffer pool and OS randomness.
    ///
    /// If `config.keep_alive_interval` is set and a Tokio runtime is running,
    /// a background task starts sending Pings.
    pub fn new(stream: S, role: Role, config: Config) -> Self {
        Self::with_resources(stream, role, config, Resources::default())
    }

    /// Wrap an upgraded stream with an explicit buffer pool and mask source.
    pub fn with_resources(stream: S, role: Role, config: Config, resources: Resources) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        let read_size = config.effective_read_buffer_size();
        let validator =
            FrameValidator::new(role).with_accept_unmasked(config.accept_unmasked_frames);

        let inner = Arc::new(Inner {
            role,
            validator,
            resources,
            writer: Mutex::new(writer),
            send_gate: Mutex::new(SendState::default()),
            receiver: Mutex::new(ReceiveState {
                reader,
                buf: BytesMut::with_capacity(read_size),
                pending: None,
                in_progress: None,
                utf8: Utf8Validator::new(),
            }),
            status: StdMutex::new(Status::default()),
            aborted: CancellationToken::new(),
            config,
        });

        if let Some(interval) = inner.config.keep_alive_interval {
            keepalive::spawn(&inner, interval);
        }

        debug!(role = %role, "websocket opened");
        Self { inner }
    }

    /// Send one fragment of a Text or Binary message.
    ///
    /// The first fragment of a message carries `kind`; later fragments are
    /// sent as continuations until one is sent with `end_of_message` set.
    /// The caller's buffer is never modified, even when the frame is masked.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidMessageType` - `kind` is `Close`
    /// - `Error::InvalidState` - not in `Open` or `CloseReceived`
    /// - `Error::ConcurrentSend` - another send is still running
    /// - `Error::Cancelled` - `cancel` fired or the connection was aborted
    /// - `Error::ConnectionClosedPrematurely` - the stream failed
    pub async fn send(
        &self,
        payload: &[u8],
        kind: MessageType,
        end_of_message: bool,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.inner
            .send(payload, kind, end_of_message, cancel)
            .await
    }

    /// Receive the next piece of a message into `buf`.
    ///
    /// Control frames are handled internally: Pings are answered, Pongs are
    /// dropped, and a Close is reported as a result with
    /// `message_type == MessageType::Close`. Any protocol violation by the
    /// peer answers with a Close frame and aborts the connection.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidState` - not in `Open` or `CloseSent`
    /// - `Error::ConcurrentReceive` - another receive is still running
    /// - protocol errors (see [`ErrorKind::Protocol`])
    /// - `Error::Cancelled` - `cancel` fired or the connection was aborted
    /// - `Error::ConnectionClosedPrematurely` - the stream failed or ended
    pub async fn receive(&self, buf: &mut [u8], cancel: &CancellationToken) -> Result<ReceiveResult> {
        self.inner.receive(buf, cancel).await
    }

    /// Send a Close frame without waiting for the peer's.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidCloseCode` / `Error::CloseReasonTooLong` - bad arguments
    /// - `Error::InvalidState` - not in `Open` or `CloseReceived`
    /// - `Error::Cancelled` / `Error::ConnectionClosedPrematurely`
    pub async fn close_output(
        &self,
        code: CloseCode,
        reason: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.inner.close_output(code, reason, cancel).await
    }

    /// Run the full close handshake.
    ///
    /// Sends a Close frame unless one was already sent, then reads until the
    /// peer's Close arrives, discarding any data received in between.
    /// Returns immediately if the connection is already `Closed`.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidCloseCode` / `Error::CloseReasonTooLong` - bad arguments
    /// - `Error::InvalidState` - the connection was aborted
    /// - any error `receive` can return while draining
    pub async fn close(&self, code: CloseCode, reason: &str, cancel: &CancellationToken) -> Result<()> {
        self.inner.close(code, reason, cancel).await
    }
}

impl<S> WebSocket<S> {
    /// Tear the connection down at once.
    ///
    /// In-flight operations fail with [`Error::Cancelled`]. No Close frame is
    /// sent. Has no effect on a connection that is already `Closed`.
    pub fn abort(&self) {
        self.inner.abort();
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.state()
    }

    /// Status code from the peer's Close frame, once received.
    #[must_use]
    pub fn close_status(&self) -> Option<CloseCode> {
        self.inner.status().close_status
    }

    /// Reason text from the peer's Close frame, once received.
    #[must_use]
    pub fn close_reason(&self) -> Option<String> {
        self.inner.status().close_reason.clone()
    }

    /// Which end of the connection this is.
    #[must_use]
    pub fn role(&self) -> Role {
        self.inner.role
    }

    /// Configuration the connection was created with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }
}

impl<S> std::fmt::Debug for WebSocket<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocket")
            .field("role", &self.inner.role)
            .field("state", &self.inner.state())
            .finish_non_exhaustive()
    }
}

impl<S> Inner<S> {
    fn status(&self) -> StdMutexGuard<'_, Status> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn state(&self) -> ConnectionState {
        let state = self.status().state;
        if state != ConnectionState::Closed && self.aborted.is_cancelled() {
            ConnectionState::Aborted
        } else {
            state
        }
    }

    pub(crate) fn aborted(&self) -> &CancellationToken {
        &self.aborted
    }

    fn abort(&self) {
        self.mark_failed();
        self.aborted.cancel();
    }

    /// Move to `Aborted` without waking in-flight operations yet.
    fn mark_failed(&self) {
        let mut status = self.status();
        if status.state != ConnectionState::Closed {
            status.state = ConnectionState::Aborted;
        }
    }

    fn close_sent(&self) -> bool {
        self.status().sent_close
    }

    fn close_received(&self) -> bool {
        self.status().received_close
    }

    fn mark_close_sent(&self) {
        let mut status = self.status();
        status.sent_close = true;
        status.state = match status.state {
            ConnectionState::Open => ConnectionState::CloseSent,
            ConnectionState::CloseReceived => ConnectionState::Closed,
            other => other,
        };
    }

    fn mark_close_received(&self, code: Option<CloseCode>, reason: String) {
        let mut status = self.status();
        status.received_close = true;
        status.close_status = code;
        status.close_reason = Some(reason);
        status.state = match status.state {
            ConnectionState::Open => ConnectionState::CloseReceived,
            ConnectionState::CloseSent => ConnectionState::Closed,
            other => other,
        };
    }

    fn ensure_state(
        &self,
        operation: &'static str,
        allowed: impl Fn(&ConnectionState) -> bool,
    ) -> Result<()> {
        let state = self.state();
        if allowed(&state) {
            Ok(())
        } else {
            Err(Error::InvalidState { operation, state })
        }
    }

    /// Turn a transport failure into an aborted connection.
    fn settle(&self, err: Error) -> Error {
        match err.kind() {
            ErrorKind::Io if self.aborted.is_cancelled() => Error::Cancelled,
            ErrorKind::Io => {
                warn!(role = %self.role, error = %err, "transport failed, aborting connection");
                self.abort();
                err
            }
            _ => err,
        }
    }

    /// Race `op` against an abort.
    async fn guarded<T>(&self, op: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::select! {
            biased;
            () = self.aborted.cancelled() => Err(Error::Cancelled),
            result = op => result,
        }
    }

    /// Race `op` against an abort and the caller's token. A fired token
    /// aborts the whole connection.
    async fn run<T>(
        &self,
        cancel: &CancellationToken,
        op: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        tokio::select! {
            biased;
            () = self.aborted.cancelled() => Err(Error::Cancelled),
            () = cancel.cancelled() => {
                debug!(role = %self.role, "operation cancelled, aborting connection");
                self.abort();
                Err(Error::Cancelled)
            }
            result = op => result,
        }
    }
}

impl<S> Inner<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    async fn send(
        &self,
        payload: &[u8],
        kind: MessageType,
        end_of_message: bool,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if kind == MessageType::Close {
            return Err(Error::InvalidMessageType);
        }
        self.ensure_state("send", ConnectionState::can_send)?;
        let mut gate = self
            .send_gate
            .try_lock()
            .map_err(|_| Error::ConcurrentSend)?;

        let opcode = if gate.continuing {
            OpCode::Continuation
        } else {
            kind.opcode()
        };

        self.run(cancel, self.write_frame(opcode, end_of_message, payload))
            .await
            .map_err(|err| self.settle(err))?;
        gate.continuing = !end_of_message;
        Ok(())
    }

    pub(crate) async fn send_keep_alive(&self) -> Result<()> {
        self.guarded(self.write_frame(OpCode::Ping, true, &[]))
            .await
    }

    async fn write_frame(&self, opcode: OpCode, fin: bool, payload: &[u8]) -> Result<()> {
        let mut writer = self.writer.lock().await;
        if opcode != OpCode::Pong && self.close_sent() {
            return Err(Error::InvalidState {
                operation: "send",
                state: self.state(),
            });
        }
        self.write_locked(&mut writer, opcode, fin, payload).await
    }

    /// Encode one frame into a pooled scratch buffer and write it out.
    async fn write_locked(
        &self,
        writer: &mut WriteHalf<S>,
        opcode: OpCode,
        fin: bool,
        payload: &[u8],
    ) -> Result<()> {
        let mask = if self.role.must_mask() {
            let key = self
                .resources
                .mask_source
                .next_key()
                .map_err(|err| Error::RandomSource(err.to_string()))?;
            Some(key)
        } else {
            None
        };

        let header = FrameHeader::new(fin, opcode, payload.len() as u64, mask);
        let header_len = header.encoded_len();
        let frame_len = header_len + payload.len();

        let mut scratch = PooledBuffer::lease(self.resources.pool.as_ref(), frame_len);
        header.write(&mut scratch)?;
        let body = &mut scratch[header_len..frame_len];
        body.copy_from_slice(payload);
        if let Some(key) = mask {
            apply_mask(body, key);
        }

        // A send dropped halfway through a frame leaves the stream unusable.
        let torn_write = self.aborted.clone().drop_guard();
        let written = async {
            writer.write_all(&scratch[..frame_len]).await?;
            writer.flush().await
        }
        .await;
        torn_write.disarm();
        written?;

        trace!(role = %self.role, opcode = %opcode, fin, len = payload.len(), "frame written");
        Ok(())
    }

    /// Write a Close frame unless one was already written.
    ///
    /// Returns `true` if this call wrote it.
    async fn send_close_frame(&self, code: CloseCode, reason: &str) -> Result<bool> {
        let mut writer = self.writer.lock().await;
        if self.close_sent() {
            return Ok(false);
        }
        let payload = close_payload(code.as_u16(), reason);
        self.write_locked(&mut writer, OpCode::Close, true, &payload)
            .await?;
        self.mark_close_sent();
        debug!(role = %self.role, code = %code, "close frame sent");
        Ok(true)
    }

    async fn close_output(&self, code: CloseCode, reason: &str, cancel: &CancellationToken) -> Result<()> {
        validate_close_request(code, reason)?;
        self.ensure_state("close_output", |state| {
            matches!(state, ConnectionState::Open | ConnectionState::CloseReceived)
        })?;

        self.run(cancel, self.send_close_frame(code, reason))
            .await
            .map_err(|err| self.settle(err))?;
        Ok(())
    }

    async fn close(&self, code: CloseCode, reason: &str, cancel: &CancellationToken) -> Result<()> {
        validate_close_request(code, reason)?;
        match self.state() {
            ConnectionState::Closed => return Ok(()),
            ConnectionState::Aborted => {
                return Err(Error::InvalidState {
                    operation: "close",
                    state: ConnectionState::Aborted,
                });
            }
            _ => {}
        }

        if !self.close_sent() {
            self.run(cancel, self.send_close_frame(code, reason))
                .await
                .map_err(|err| self.settle(err))?;
        }

        if !self.close_received() {
            let mut rx = self
                .run(cancel, async { Ok(self.receiver.lock().await) })
                .await?;
            let mut scratch = PooledBuffer::lease(
                self.resources.pool.as_ref(),
                self.config.effective_read_buffer_size(),
            );
            while !self.close_received() {
                let discarded = self.receive_locked(&mut rx, &mut scratch, cancel).await?;
                if !discarded.is_close() {
                    trace!(role = %self.role, count = discarded.count, "discarding data while closing");
                }
            }
        }

        let shutdown = self
            .run(cancel, async {
                let mut writer = self.writer.lock().await;
                Ok(writer.shutdown().await)
            })
            .await?;
        if let Err(err) = shutdown {
            debug!(role = %self.role, error = %err, "shutdown after close failed");
        }
        debug!(role = %self.role, state = %self.state(), "close handshake finished");
        Ok(())
    }

    async fn receive(&self, buf: &mut [u8], cancel: &CancellationToken) -> Result<ReceiveResult> {
        self.ensure_state("receive", ConnectionState::can_receive)?;
        let mut rx = self
            .receiver
            .try_lock()
            .map_err(|_| Error::ConcurrentReceive)?;
        self.receive_locked(&mut rx, buf, cancel).await
    }

    async fn receive_locked(
        &self,
        rx: &mut ReceiveState<S>,
        buf: &mut [u8],
        cancel: &CancellationToken,
    ) -> Result<ReceiveResult> {
        match self.run(cancel, self.read_message(rx, buf)).await {
            Ok(result) => Ok(result),
            Err(err) => Err(self.fail_receive(rx, err, cancel).await),
        }
    }

    /// Fail the connection after a peer protocol error.
    ///
    /// The state is `Aborted` before the best-effort Close is attempted. That
    /// write may wait behind a blocked send, so it stays cancellable.
    async fn fail_receive(
        &self,
        rx: &mut ReceiveState<S>,
        err: Error,
        cancel: &CancellationToken,
    ) -> Error {
        let Some(code) = err.close_code() else {
            return self.settle(err);
        };

        warn!(role = %self.role, error = %err, "peer violated the protocol, failing connection");
        rx.buf.clear();
        rx.pending = None;
        self.mark_failed();

        let closed = self.run(cancel, self.send_close_frame(code, "")).await;
        self.abort();
        match closed {
            Ok(_) => err,
            Err(Error::Cancelled) => Error::Cancelled,
            Err(close_err) => {
                debug!(role = %self.role, error = %close_err, "could not send close frame");
                err
            }
        }
    }

    /// Copy as much of the current data frame as fits into `buf`.
    async fn read_message(&self, rx: &mut ReceiveState<S>, buf: &mut [u8]) -> Result<ReceiveResult> {
        let mut frame = match rx.pending.take() {
            Some(frame) => frame,
            None => match self.next_data_frame(rx).await? {
                Incoming::Data(frame) => frame,
                Incoming::Close(result) => return Ok(result),
            },
        };

        if frame.remaining > 0 && rx.buf.is_empty() && !buf.is_empty() {
            self.fill(rx, 1).await?;
        }

        let remaining = usize::try_from(frame.remaining).unwrap_or(usize::MAX);
        let count = buf.len().min(rx.buf.len()).min(remaining);
        let chunk = &mut buf[..count];
        chunk.copy_from_slice(&rx.buf[..count]);
        rx.buf.advance(count);

        if let Some(key) = frame.mask {
            frame.mask_offset = apply_mask_at(chunk, key, frame.mask_offset);
        }
        frame.remaining -= count as u64;

        let frame_done = frame.remaining == 0;
        let end_of_message = frame_done && frame.fin;
        if frame.kind == MessageType::Text {
            rx.utf8.validate(chunk, end_of_message)?;
        }

        if frame_done {
            rx.in_progress = if frame.fin { None } else { Some(frame.kind) };
        } else {
            rx.pending = Some(frame);
        }

        Ok(ReceiveResult::data(count, frame.kind, end_of_message))
    }

    /// Read headers until a data frame or a Close arrives, handling Ping and
    /// Pong along the way.
    async fn next_data_frame(&self, rx: &mut ReceiveState<S>) -> Result<Incoming> {
        loop {
            let header = self.read_header(rx).await?;
            self.validator.validate(&header, rx.in_progress)?;

            let kind = match header.opcode {
                OpCode::Ping => {
                    let payload = self.read_control_payload(rx, &header).await?;
                    self.write_frame(OpCode::Pong, true, &payload).await?;
                    debug!(role = %self.role, len = payload.len(), "answered ping");
                    continue;
                }
                OpCode::Pong => {
                    let payload = self.read_control_payload(rx, &header).await?;
                    trace!(role = %self.role, len = payload.len(), "pong received");
                    continue;
                }
                OpCode::Close => return self.handle_close(rx, &header).await.map(Incoming::Close),
                OpCode::Continuation => rx.in_progress.ok_or_else(|| {
                    Error::ProtocolViolation("continuation frame without a message in progress".into())
                })?,
                data => MessageType::from_data_opcode(data).ok_or_else(|| {
                    Error::ProtocolViolation(format!("unexpected {data} frame"))
                })?,
            };

            trace!(
                role = %self.role,
                opcode = %header.opcode,
                fin = header.fin,
                len = header.payload_len,
                "data frame received"
            );
            return Ok(Incoming::Data(PendingFrame {
                kind,
                fin: header.fin,
                mask: header.mask,
                remaining: header.payload_len,
                mask_offset: 0,
            }));
        }
    }

    async fn handle_close(&self, rx: &mut ReceiveState<S>, header: &FrameHeader) -> Result<ReceiveResult> {
        let payload = self.read_control_payload(rx, header).await?;
        let (code, reason) = parse_close_payload(&payload)?;
        debug!(role = %self.role, code = ?code.map(|c| c.as_u16()), reason = %reason, "close frame received");
        self.mark_close_received(code, reason.clone());

        if self.config.auto_close_reply {
            self.send_close_frame(CloseCode::Normal, "").await?;
        }
        Ok(ReceiveResult::close(code, reason))
    }

    async fn read_header(&self, rx: &mut ReceiveState<S>) -> Result<FrameHeader> {
        loop {
            match FrameHeader::parse(&rx.buf) {
                Ok((header, len)) => {
                    rx.buf.advance(len);
                    return Ok(header);
                }
                Err(Error::IncompleteFrame { needed }) => {
                    let target = rx.buf.len() + needed;
                    self.fill(rx, target).await?;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Take a whole (already size-checked) control payload off the buffer and unmask it.
    async fn read_control_payload(&self, rx: &mut ReceiveState<S>, header: &FrameHeader) -> Result<Vec<u8>> {
        let len = usize::try_from(header.payload_len)
            .map_err(|_| Error::ControlFrameTooLarge(header.payload_len))?;
        self.fill(rx, len).await?;

        let mut payload = rx.buf.split_to(len).to_vec();
        if let Some(key) = header.mask {
            apply_mask(&mut payload, key);
        }
        Ok(payload)
    }

    /// Read until at least `min_len` bytes are buffered.
    async fn fill(&self, rx: &mut ReceiveState<S>, min_len: usize) -> Result<()> {
        while rx.buf.len() < min_len {
            let wanted = (min_len - rx.buf.len()).max(self.config.effective_read_buffer_size());
            rx.buf.reserve(wanted);
            let n = rx.reader.read_buf(&mut rx.buf).await?;
            if n == 0 {
                return Err(Error::ConnectionClosedPrematurely(
                    "stream ended before the close handshake completed".into(),
                ));
            }
        }
        Ok(())
    }
}

fn validate_close_request(code: CloseCode, reason: &str) -> Result<()> {
    if !code.is_valid() || code.is_reserved() {
        return Err(Error::InvalidCloseCode(code.as_u16()));
    }
    if reason.len() > MAX_CLOSE_REASON_LEN {
        return Err(Error::CloseReasonTooLong(reason.len()));
    }
    Ok(())
}
