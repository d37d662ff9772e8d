//! Device event source.
//!
//! An input device node is opened once for read and write. The read half becomes an
//! [`EventReader`], a blocking decode loop owned by the dispatch thread. The write half
//! becomes an [`EventWriter`], a cloneable handle that listener threads share to send LED
//! commands back.
//!
//! This module does **not**:
//! - discover device nodes (see [`discovery`](crate::discovery))
//! - classify events (see [`gesture`](crate::gesture))

use crate::codec::EventCodec;
use crate::error::{Error, Result};
use crate::event::RawEvent;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

/// Bytes requested from the device per read call.
const READ_CHUNK: usize = 256;

/// Blocking decoder over a byte stream.
///
/// Short reads are buffered: a partial record is kept and completed by the next read.
pub struct EventReader<R> {
    inner: R,
    codec: EventCodec,
    pending: Vec<u8>,
}

impl<R: Read> EventReader<R> {
    pub fn new(inner: R, codec: EventCodec) -> Self {
        Self {
            inner,
            codec,
            pending: Vec::with_capacity(READ_CHUNK),
        }
    }

    pub fn codec(&self) -> EventCodec {
        self.codec
    }

    /// Block until one full record is available.
    ///
    /// Returns `Ok(None)` at a clean end of stream. A stream that ends in the middle of a
    /// record yields [`Error::MalformedRecord`].
    pub fn read_next(&mut self) -> Result<Option<RawEvent>> {
        let size = self.codec.record_size();
        let mut chunk = [0u8; READ_CHUNK];

        while self.pending.len() < size {
            match self.inner.read(&mut chunk) {
                Ok(0) if self.pending.is_empty() => return Ok(None),
                Ok(0) => {
                    return Err(Error::MalformedRecord {
                        expected: size,
                        actual: self.pending.len(),
                    })
                }
                Ok(n) => {
                    #[cfg(feature = "debug-log")]
                    tracing::trace!(bytes = ?&chunk[..n], "device read");
                    self.pending.extend_from_slice(&chunk[..n]);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        let event = self.codec.decode(&self.pending[..size])?;
        self.pending.drain(..size);
        Ok(Some(event))
    }

    /// Consume the reader as an iterator of events.
    pub fn events(self) -> Events<R> {
        Events {
            reader: self,
            done: false,
        }
    }
}

/// Iterator over decoded events. Ends after end of stream or the first error.
pub struct Events<R> {
    reader: EventReader<R>,
    done: bool,
}

impl<R: Read> Iterator for Events<R> {
    type Item = Result<RawEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.read_next() {
            Ok(Some(event)) => Some(Ok(event)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Shared, serialized writer of events.
///
/// Each write holds a lock for the whole record and flushes before releasing it, so
/// records from different listeners never interleave and are never held in a buffer.
pub struct EventWriter<W> {
    inner: Arc<Mutex<W>>,
    codec: EventCodec,
}

impl<W> Clone for EventWriter<W> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            codec: self.codec,
        }
    }
}

impl<W: Write> EventWriter<W> {
    pub fn new(inner: W, codec: EventCodec) -> Self {
        Self {
            inner: Arc::new(Mutex::new(inner)),
            codec,
        }
    }

    /// Encode `event`, write the full record and flush.
    pub fn write(&self, event: &RawEvent) -> Result<()> {
        let bytes = self.codec.encode(event);
        let mut out = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        out.write_all(&bytes)?;
        out.flush()?;
        tracing::trace!(kind = event.kind, code = event.code, value = event.value, "wrote event");
        Ok(())
    }
}

/// A device opened for simultaneous read and write.
pub struct EventSource<R, W> {
    reader: EventReader<R>,
    writer: EventWriter<W>,
}

impl EventSource<File, File> {
    /// Open `path` read+write and split it into reader and writer halves.
    pub fn open(path: impl AsRef<Path>, codec: EventCodec) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let write_half = file.try_clone()?;
        tracing::info!(path = %path.display(), layout = %codec.layout(), "opened input device");
        Ok(Self::new(file, write_half, codec))
    }
}

impl<R: Read, W: Write> EventSource<R, W> {
    pub fn new(reader: R, writer: W, codec: EventCodec) -> Self {
        Self {
            reader: EventReader::new(reader, codec),
            writer: EventWriter::new(writer, codec),
        }
    }

    pub fn read_next(&mut self) -> Result<Option<RawEvent>> {
        self.reader.read_next()
    }

    pub fn write(&self, event: &RawEvent) -> Result<()> {
        self.writer.write(event)
    }

    /// Cloneable write handle for listener threads.
    pub fn writer(&self) -> EventWriter<W> {
        self.writer.clone()
    }

    pub fn into_parts(self) -> (EventReader<R>, EventWriter<W>) {
        (self.reader, self.writer)
    }
}
