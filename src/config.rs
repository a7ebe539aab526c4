//! Configuration for WebSocket connections.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::pool::{BufferPool, SharedBufferPool};
use crate::protocol::{MAX_CONTROL_FRAME_PAYLOAD, MAX_HEADER_LEN};
use crate::random::{MaskSource, OsMaskSource};

/// Smallest receive buffer that can hold any complete control frame.
pub const MIN_READ_BUFFER_SIZE: usize = MAX_HEADER_LEN + MAX_CONTROL_FRAME_PAYLOAD;

/// WebSocket connection configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Initial capacity of the receive buffer, and the amount reserved per read.
    ///
    /// Values below [`MIN_READ_BUFFER_SIZE`] are raised to it.
    ///
    /// Default: 8 KB (8192)
    pub read_buffer_size: usize,

    /// Accept unmasked frames from clients (server only).
    ///
    /// RFC 6455 requires clients to mask all frames. Setting this to `true`
    /// violates the RFC but may be useful for testing.
    ///
    /// Default: false
    pub accept_unmasked_frames: bool,

    /// Interval between unsolicited keep-alive Pings.
    ///
    /// If `None`, no keep-alive task is started.
    /// Default: None
    pub keep_alive_interval: Option<Duration>,

    /// Answer a received Close frame immediately with Close(1000).
    ///
    /// When `false` the connection stays in `CloseReceived` after the peer's
    /// Close, so the application can finish sending before calling
    /// `close_output` or `close` itself.
    ///
    /// Default: true
    pub auto_close_reply: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            read_buffer_size: 8192,
            accept_unmasked_frames: false,
            keep_alive_interval: None,
            auto_close_reply: true,
        }
    }
}

impl Config {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set read buffer size.
    #[must_use]
    pub const fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    /// Enable periodic keep-alive Pings.
    #[must_use]
    pub const fn with_keep_alive(mut self, interval: Duration) -> Self {
        self.keep_alive_interval = Some(interval);
        self
    }

    /// Choose whether a received Close is answered automatically.
    #[must_use]
    pub const fn with_auto_close_reply(mut self, enabled: bool) -> Self {
        self.auto_close_reply = enabled;
        self
    }

    /// Accept unmasked client frames (server only, non-compliant).
    #[must_use]
    pub const fn with_accept_unmasked_frames(mut self, accept: bool) -> Self {
        self.accept_unmasked_frames = accept;
        self
    }

    /// Configuration for a server endpoint.
    ///
    /// Same as [`Config::default`]. Masking duties follow the
    /// [`Role`](crate::Role) passed to the connection, so no setting here
    /// differs by side; the preset only names intent at the call site.
    #[must_use]
    pub fn server() -> Self {
        Self::default()
    }

    /// Configuration for a client endpoint. Same as [`Config::default`].
    #[must_use]
    pub fn client() -> Self {
        Self::default()
    }

    /// Read buffer size after applying the control-frame minimum.
    #[must_use]
    pub(crate) fn effective_read_buffer_size(&self) -> usize {
        self.read_buffer_size.max(MIN_READ_BUFFER_SIZE)
    }
}

/// Services a connection borrows from its environment.
///
/// One `Resources` value may be cloned into any number of connections; the
/// pool and random source are then shared between them.
#[derive(Clone)]
pub struct Resources {
    /// Scratch buffers for outgoing frames.
    pub pool: Arc<dyn BufferPool>,
    /// Masking key generator (used by clients only).
    pub mask_source: Arc<dyn MaskSource>,
}

impl Default for Resources {
    fn default() -> Self {
        Self {
            pool: Arc::new(SharedBufferPool::default()),
            mask_source: Arc::new(OsMaskSource),
        }
    }
}

impl Resources {
    /// Create the default pool and OS random source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific buffer pool.
    #[must_use]
    pub fn with_pool(mut self, pool: Arc<dyn BufferPool>) -> Self {
        self.pool = pool;
        self
    }

    /// Use a specific masking key source.
    #[must_use]
    pub fn with_mask_source(mut self, source: Arc<dyn MaskSource>) -> Self {
        self.mask_source = source;
        self
    }
}

impl fmt::Debug for Resources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resources").finish_non_exhaustive()
    }
}
