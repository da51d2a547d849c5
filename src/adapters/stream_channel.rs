//! Channel over any byte stream, such as a serial device node
//!
//! A reader thread forwards every delivery to the owning side through an
//! mpsc channel so `recv` can wait with a timeout on a blocking stream.

use std::{
    fs::OpenOptions,
    io::{ErrorKind, Read, Write},
    path::Path,
    sync::mpsc::{self, Receiver, RecvTimeoutError},
    thread::{self, JoinHandle},
    time::Duration,
};

use crate::{Error, Result, ports::Channel};

const READ_BUFFER: usize = 256;

pub struct StreamChannel<W: Write> {
    writer: Option<W>,
    deliveries: Receiver<Vec<u8>>,
    reader: Option<JoinHandle<()>>,
}

impl<W: Write> StreamChannel<W> {
    /// Wrap a reader and writer for the same link
    pub fn new<R>(reader: R, writer: W) -> Self
    where
        R: Read + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let handle = thread::spawn(move || pump(reader, tx));
        Self {
            writer: Some(writer),
            deliveries: rx,
            reader: Some(handle),
        }
    }
}

impl StreamChannel<std::fs::File> {
    /// Open a device node for reading and writing.
    ///
    /// Line settings (baud rate, framing) must already be configured on the
    /// device, for example with `stty`.
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|source| Error::Io {
                operation: format!("open device {path:?}"),
                source,
            })?;
        let reader = file.try_clone().map_err(|source| Error::Io {
            operation: format!("clone handle for {path:?}"),
            source,
        })?;
        log::info!("opened device {}", path.display());
        Ok(Self::new(reader, file))
    }
}

fn pump<R: Read>(mut reader: R, tx: mpsc::Sender<Vec<u8>>) {
    let mut buffer = [0u8; READ_BUFFER];
    loop {
        match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => {
                if tx.send(buffer[..n].to_vec()).is_err() {
                    break;
                }
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                log::warn!("device read failed: {e}");
                break;
            }
        }
    }
    log::debug!("device reader stopped");
}

impl<W: Write> Channel for StreamChannel<W> {
    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        let writer = self.writer.as_mut().ok_or(Error::ChannelClosed)?;
        let written = writer.write_all(bytes).and_then(|_| writer.flush());
        match written {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::BrokenPipe => Err(Error::ChannelClosed),
            Err(source) => Err(Error::Io {
                operation: "write to device".to_string(),
                source,
            }),
        }
    }

    fn recv(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>> {
        if self.writer.is_none() {
            return Err(Error::ChannelClosed);
        }
        match self.deliveries.recv_timeout(timeout) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(Error::ChannelClosed),
        }
    }

    fn close(&mut self) {
        self.writer = None;
        // The reader may be blocked in read(); it exits once the stream ends
        // or its receiver is dropped.
        self.reader.take();
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn test_delivers_then_reports_closure() {
        let mut channel = StreamChannel::new(Cursor::new(b"ACK\n".to_vec()), Vec::new());
        let first = channel.recv(Duration::from_secs(2)).unwrap();
        assert_eq!(first.as_deref(), Some(&b"ACK\n"[..]));
        assert!(matches!(
            channel.recv(Duration::from_secs(2)),
            Err(Error::ChannelClosed)
        ));
    }

    #[test]
    fn test_send_writes_bytes() {
        let mut channel = StreamChannel::new(Cursor::new(Vec::new()), Vec::new());
        channel.send(b"WIN:AI\n").unwrap();
        assert_eq!(channel.writer.as_deref(), Some(&b"WIN:AI\n"[..]));
    }

    #[test]
    fn test_closed_channel_rejects_send() {
        let mut channel = StreamChannel::new(Cursor::new(Vec::new()), Vec::new());
        channel.close();
        assert!(matches!(channel.send(b"ACK\n"), Err(Error::ChannelClosed)));
        assert!(matches!(
            channel.recv(Duration::ZERO),
            Err(Error::ChannelClosed)
        ));
    }
}
