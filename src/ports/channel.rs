//! Channel port - the byte link to the game device
//!
//! The link carries one reader and one writer. The session coordinator owns
//! its channel and never sends while a previous exchange is in flight.

use std::time::Duration;

use crate::Result;

/// Byte-oriented, half-duplex link to the device.
///
/// Deliveries need not align with message boundaries: a single `recv` may
/// return part of a line or several lines.
pub trait Channel {
    /// Write all of `bytes` to the link.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ChannelClosed`] once the peer has gone away.
    fn send(&mut self, bytes: &[u8]) -> Result<()>;

    /// Wait up to `timeout` for the next delivery.
    ///
    /// `Ok(None)` means the timeout elapsed with nothing received.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ChannelClosed`] once the peer has gone away.
    fn recv(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>>;

    /// Release the link. Further sends fail.
    fn close(&mut self);
}

impl<C: Channel + ?Sized> Channel for Box<C> {
    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        (**self).send(bytes)
    }

    fn recv(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>> {
        (**self).recv(timeout)
    }

    fn close(&mut self) {
        (**self).close()
    }
}
