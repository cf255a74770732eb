//! The session that owns the headset's datagram socket and the seventeen
//! channels derived from it: eight raw electrode channels, eight alpha
//! channels, and one valence channel.
//!
//! One session instance is owned by the surrounding application and polled
//! once per frame tick. Reconnecting means closing the old session and
//! binding a new one; nothing is global.

use crate::channel::{Channel, Paired};
use crate::frame_decoder::{frames, Record};

use log::{debug, warn};
use std::fmt;
use std::io;
use std::net::{SocketAddr, UdpSocket};

/// Electrodes on the headset, and therefore raw/alpha channels per session.
pub const ELECTRODES: usize = 8;

/// Socket and buffering parameters for one session.
///
/// A full bundle from the headset application is 8 raw records of 25
/// readings (104 bytes each), 8 alpha records and one valence record (12
/// bytes each), 940 bytes total, so the default 1024-byte receive buffer
/// fits one bundle with room to spare.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Local interface to bind.
    pub host: String,
    /// Local UDP port the headset application streams to.
    pub port: u16,
    /// Maximum entries retained per channel.
    pub history: usize,
    /// Receive buffer size used by [`TelemetrySession::poll`].
    pub buffer_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            host: "127.0.0.1".to_owned(),
            port: 12002,
            history: 250,
            buffer_size: 1024,
        }
    }
}

/// Outcome of one successful poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Poll {
    /// Nothing was waiting on the socket. Normal and frequent.
    NoData,
    /// A datagram was received and routed.
    Applied {
        /// Records applied to a channel.
        records: usize,
        /// Records dropped (bad channel index, or the malformed tail of
        /// the datagram). Non-fatal; also reported through `warn!`.
        skipped: usize,
    },
}

/// Failures a caller has to act on.
#[derive(Debug)]
pub enum SessionError {
    /// The waiting datagram needs more than `buffer_size` bytes. Retry the
    /// poll with a larger buffer; no channel state was touched.
    BufferTooSmall {
        /// The buffer size the failed poll was given.
        buffer_size: usize,
    },
    /// The session was closed; the socket will not be resurrected.
    Closed,
    /// The socket itself failed.
    Io(io::Error),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SessionError::BufferTooSmall { buffer_size } => {
                write!(f, "datagram needs more than {} bytes", buffer_size)
            }
            SessionError::Closed => write!(f, "session is closed"),
            SessionError::Io(e) => write!(f, "socket error: {}", e),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<io::Error> for SessionError {
    fn from(value: io::Error) -> Self {
        SessionError::Io(value)
    }
}

/// Interface to the wireless EEG headset.
///
/// The headset application streams measurement bundles over UDP; `poll`
/// drains at most one datagram per call and never blocks, so it can sit
/// directly in a rendering loop.
#[derive(Debug)]
pub struct TelemetrySession {
    socket: Option<UdpSocket>,
    history: usize,
    raw: [Channel<f64>; ELECTRODES],
    alpha: [Channel<Paired>; ELECTRODES],
    valence: Channel<Paired>,
}

impl TelemetrySession {
    /// Binds a non-blocking socket on `config.host:config.port` and creates
    /// the seventeen empty channels.
    pub fn bind(config: &SessionConfig) -> Result<Self, SessionError> {
        let socket = UdpSocket::bind((config.host.as_str(), config.port))?;
        socket.set_nonblocking(true)?;
        Ok(TelemetrySession {
            socket: Some(socket),
            history: config.history,
            raw: Default::default(),
            alpha: Default::default(),
            valence: Channel::new(),
        })
    }

    /// The address the session is listening on. Useful when binding port 0.
    pub fn local_addr(&self) -> Result<SocketAddr, SessionError> {
        let socket = self.socket.as_ref().ok_or(SessionError::Closed)?;
        Ok(socket.local_addr()?)
    }

    /// The raw electrode channels, one per electrode.
    pub fn raw(&self) -> &[Channel<f64>; ELECTRODES] {
        &self.raw
    }

    /// The alpha-wave channels, one per electrode.
    pub fn alpha(&self) -> &[Channel<Paired>; ELECTRODES] {
        &self.alpha
    }

    /// The single emotional-valence channel.
    pub fn valence(&self) -> &Channel<Paired> {
        &self.valence
    }

    /// The configured history cap.
    pub fn history(&self) -> usize {
        self.history
    }

    /// Receives at most one datagram, routes its records, and trims every
    /// channel back to the history cap.
    ///
    /// An empty socket is a normal outcome ([`Poll::NoData`]), not an
    /// error. Records with an out-of-range channel byte are skipped
    /// individually; a malformed record drops the rest of its datagram.
    /// Both are counted in [`Poll::Applied`] and logged, and the next poll
    /// proceeds normally.
    pub fn poll(&mut self, buffer_size: usize) -> Result<Poll, SessionError> {
        let socket = self.socket.as_ref().ok_or(SessionError::Closed)?;

        // One spare byte: if the kernel fills it, the datagram was larger
        // than the caller's buffer and got truncated.
        let mut buf = vec![0u8; buffer_size + 1];
        let received = match socket.recv(&mut buf) {
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(Poll::NoData),
            Err(e) => return Err(SessionError::Io(e)),
        };
        if received > buffer_size {
            return Err(SessionError::BufferTooSmall { buffer_size });
        }

        let mut records = 0;
        let mut skipped = 0;
        for item in frames(&buf[..received]) {
            match item {
                Ok(Record::Raw { channel, readings }) => {
                    match self.raw.get_mut(channel as usize) {
                        Some(ch) => {
                            for r in readings {
                                ch.push(r);
                            }
                            records += 1;
                        }
                        None => {
                            warn!("raw record for nonexistent channel {}, skipping", channel);
                            skipped += 1;
                        }
                    }
                }
                Ok(Record::Alpha {
                    channel,
                    value,
                    long_term_average,
                }) => match self.alpha.get_mut(channel as usize) {
                    Some(ch) => {
                        ch.push(Paired {
                            value,
                            long_term_average,
                        });
                        records += 1;
                    }
                    None => {
                        warn!("alpha record for nonexistent channel {}, skipping", channel);
                        skipped += 1;
                    }
                },
                Ok(Record::Valence {
                    value,
                    long_term_average,
                }) => {
                    self.valence.push(Paired {
                        value,
                        long_term_average,
                    });
                    records += 1;
                }
                Err(e) => {
                    warn!("{}, dropping the rest of the datagram", e);
                    skipped += 1;
                    break;
                }
            }
        }

        self.trim();
        debug!(
            "applied {} records ({} skipped) from a {}-byte datagram",
            records, skipped, received
        );
        Ok(Poll::Applied { records, skipped })
    }

    // The history cap is enforced once per datagram, after the whole batch
    // of records has been pushed.
    fn trim(&mut self) {
        for ch in &mut self.raw {
            while ch.len() > self.history {
                ch.evict_oldest();
            }
        }
        for ch in &mut self.alpha {
            while ch.len() > self.history {
                ch.evict_oldest();
            }
        }
        while self.valence.len() > self.history {
            self.valence.evict_oldest();
        }
    }

    /// Releases the socket. Idempotent: closing an already-closed session
    /// does nothing. The channels stay readable.
    pub fn close(&mut self) {
        if self.socket.take().is_some() {
            debug!("session closed");
        }
    }

    /// Whether [`close`](TelemetrySession::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.socket.is_none()
    }
}
