//! Response body delivered from the transfer thread as a blocking `Read`.

use std::io::{self, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::Arc;

use crate::error::FetchError;

/// Messages from the transfer thread, in order: one `Status`, any number of
/// `Data`, then `Done` or `Failed`.
#[derive(Debug)]
pub(super) enum Event {
    Status(u32),
    Data(Vec<u8>),
    /// Already classified.
    Failed(FetchError),
    Done,
}

/// Reads body chunks off the channel. Dropping it tells the transfer thread
/// to stop.
pub(super) struct BodyReader {
    rx: Receiver<Event>,
    chunk: Vec<u8>,
    pos: usize,
    finished: bool,
    closed: Arc<AtomicBool>,
}

impl BodyReader {
    pub(super) fn new(rx: Receiver<Event>, closed: Arc<AtomicBool>) -> Self {
        Self {
            rx,
            chunk: Vec::new(),
            pos: 0,
            finished: false,
            closed,
        }
    }
}

impl Read for BodyReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            if self.pos < self.chunk.len() {
                let n = buf.len().min(self.chunk.len() - self.pos);
                buf[..n].copy_from_slice(&self.chunk[self.pos..self.pos + n]);
                self.pos += n;
                return Ok(n);
            }
            if self.finished || buf.is_empty() {
                return Ok(0);
            }
            match self.rx.recv() {
                Ok(Event::Data(data)) => {
                    self.chunk = data;
                    self.pos = 0;
                }
                Ok(Event::Done) => self.finished = true,
                Ok(Event::Failed(e)) => {
                    self.finished = true;
                    return Err(io::Error::new(io::ErrorKind::Other, e));
                }
                Ok(Event::Status(_)) => {}
                Err(_) => {
                    self.finished = true;
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "transfer ended without completing the response",
                    ));
                }
            }
        }
    }
}

impl Drop for BodyReader {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::sync_channel;

    #[test]
    fn reads_chunks_until_done() {
        let (tx, rx) = sync_channel(8);
        tx.send(Event::Data(b"hello ".to_vec())).unwrap();
        tx.send(Event::Data(b"world".to_vec())).unwrap();
        tx.send(Event::Done).unwrap();
        let mut reader = BodyReader::new(rx, Arc::new(AtomicBool::new(false)));
        let mut out = String::new();
        reader.read_to_string(&mut out).unwrap();
        assert_eq!(out, "hello world");
    }

    #[test]
    fn failure_surfaces_classified_error() {
        let (tx, rx) = sync_channel(8);
        tx.send(Event::Data(b"par".to_vec())).unwrap();
        tx.send(Event::Failed(FetchError::TransferContent {
            url: "http://m/".into(),
            reason: "recv failure".into(),
        }))
        .unwrap();
        let mut reader = BodyReader::new(rx, Arc::new(AtomicBool::new(false)));
        let mut out = Vec::new();
        let err = reader.read_to_end(&mut out).unwrap_err();
        let inner = err.into_inner().unwrap().downcast::<FetchError>().unwrap();
        assert!(matches!(*inner, FetchError::TransferContent { .. }));
    }

    #[test]
    fn sender_vanishing_is_unexpected_eof() {
        let (tx, rx) = sync_channel::<Event>(1);
        drop(tx);
        let mut reader = BodyReader::new(rx, Arc::new(AtomicBool::new(false)));
        let err = reader.read(&mut [0u8; 4]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn drop_sets_closed_flag() {
        let (_tx, rx) = sync_channel::<Event>(1);
        let closed = Arc::new(AtomicBool::new(false));
        drop(BodyReader::new(rx, Arc::clone(&closed)));
        assert!(closed.load(Ordering::Relaxed));
    }
}
