//! In-process pipe transport.
//!
//! Mirrors the layout a driver publishes through named shared memory: a ring
//! of packed short events addressed by a read head and a write head, and a
//! queue of long event blobs. The consumer side is handed out through
//! [`TransportConnector`], the producer side through
//! [`LocalPipeHub::producer`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use ringbuf::{HeapConsumer, HeapProducer, HeapRb};
use tracing::{debug, info};

use crate::error::TransportError;
use crate::transport::{PipeId, PipeTransport, TransportConnector};

pub const DEFAULT_CAPACITY: usize = 16_384;
pub const MIN_CAPACITY: usize = 16;
pub const MAX_CAPACITY: usize = 1 << 20;
/// Number of long events that can be queued at once.
pub const MAX_LONG_SLOTS: usize = 256;
pub const MAX_LONG_EVENT_BYTES: usize = 65_535;

type LongBlob = Box<[u8]>;

/// Short event ring. The producer owns the write head, the consumer the read
/// head. A pop leaves the read head one past the slot it read; only
/// [`ShortRing::reset_read_head_if_needed`] wraps it back to zero.
struct ShortRing {
    slots: Box<[AtomicU32]>,
    read_head: AtomicI32,
    write_head: AtomicI32,
}

impl ShortRing {
    fn new(capacity: usize) -> Self {
        let slots = (0..capacity).map(|_| AtomicU32::new(0)).collect();
        Self {
            slots,
            read_head: AtomicI32::new(0),
            write_head: AtomicI32::new(0),
        }
    }

    fn capacity(&self) -> i32 {
        self.slots.len() as i32
    }

    fn push(&self, event: u32) -> Result<(), TransportError> {
        let capacity = self.capacity();
        let write = self.write_head.load(Ordering::Relaxed);
        let next = if write + 1 >= capacity { 0 } else { write + 1 };
        let read = self.read_head.load(Ordering::Acquire);
        let read = if read >= capacity { 0 } else { read };
        if next == read {
            return Err(TransportError::Full);
        }
        self.slots[write as usize].store(event, Ordering::Relaxed);
        self.write_head.store(next, Ordering::Release);
        Ok(())
    }

    fn has_pending(&self) -> bool {
        self.read_head.load(Ordering::Acquire) != self.write_head.load(Ordering::Acquire)
    }

    fn pop(&self) -> Result<u32, TransportError> {
        let read = self.read_head.load(Ordering::Relaxed);
        if read >= self.capacity() {
            return Err(TransportError::Read(format!(
                "read head {read} is past the end of the ring"
            )));
        }
        let event = self.slots[read as usize].load(Ordering::Relaxed);
        self.read_head.store(read + 1, Ordering::Release);
        Ok(event)
    }

    fn reset_read_head_if_needed(&self) {
        if self.read_head.load(Ordering::Relaxed) >= self.capacity() {
            self.read_head.store(0, Ordering::Release);
        }
    }

    fn pending(&self) -> usize {
        let capacity = self.capacity();
        let read = self.read_head.load(Ordering::Acquire);
        let read = if read >= capacity { 0 } else { read };
        let write = self.write_head.load(Ordering::Acquire);
        ((write - read + capacity) % capacity) as usize
    }
}

struct PipeShared {
    id: PipeId,
    short: ShortRing,
    connected: AtomicBool,
}

struct HubEntry {
    shared: Arc<PipeShared>,
    long_tx: Option<HeapProducer<LongBlob>>,
}

/// Registry of in-process pipes, keyed by [`PipeId`].
#[derive(Default)]
pub struct LocalPipeHub {
    pipes: Mutex<HashMap<PipeId, HubEntry>>,
}

impl std::fmt::Debug for LocalPipeHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalPipeHub").finish_non_exhaustive()
    }
}

impl LocalPipeHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the producer end of a connected pipe.
    pub fn producer(&self, id: PipeId) -> Result<PipeProducer, TransportError> {
        let mut pipes = self.pipes.lock();
        let entry = pipes.get_mut(&id).ok_or(TransportError::Unavailable)?;
        if !entry.shared.connected.load(Ordering::Acquire) {
            return Err(TransportError::Unavailable);
        }
        let long_tx = entry.long_tx.take().ok_or(TransportError::Busy)?;
        debug!(pipe = %id, "producer attached");
        Ok(PipeProducer {
            shared: Arc::clone(&entry.shared),
            long_tx,
        })
    }

    pub fn is_connected(&self, id: PipeId) -> bool {
        self.pipes
            .lock()
            .get(&id)
            .is_some_and(|entry| entry.shared.connected.load(Ordering::Acquire))
    }
}

impl TransportConnector for LocalPipeHub {
    fn connect(
        &self,
        id: PipeId,
        capacity_hint: usize,
    ) -> Result<Box<dyn PipeTransport>, TransportError> {
        let mut pipes = self.pipes.lock();
        if let Some(entry) = pipes.get(&id) {
            if entry.shared.connected.load(Ordering::Acquire) {
                return Err(TransportError::Busy);
            }
        }

        let capacity = capacity_hint.clamp(MIN_CAPACITY, MAX_CAPACITY);
        let shared = Arc::new(PipeShared {
            id,
            short: ShortRing::new(capacity),
            connected: AtomicBool::new(true),
        });
        let (long_tx, long_rx) = HeapRb::<LongBlob>::new(MAX_LONG_SLOTS).split();
        pipes.insert(
            id,
            HubEntry {
                shared: Arc::clone(&shared),
                long_tx: Some(long_tx),
            },
        );
        info!(pipe = %id, capacity, "local pipe created");

        Ok(Box::new(LocalTransport {
            shared,
            long_rx,
            closed: false,
        }))
    }
}

/// Consumer end of a local pipe.
pub struct LocalTransport {
    shared: Arc<PipeShared>,
    long_rx: HeapConsumer<LongBlob>,
    closed: bool,
}

impl LocalTransport {
    /// Short events written but not yet popped.
    pub fn pending_short_events(&self) -> usize {
        self.shared.short.pending()
    }
}

impl PipeTransport for LocalTransport {
    fn has_pending_data(&self) -> bool {
        !self.closed && self.shared.short.has_pending()
    }

    fn fetch_short_event(&mut self) -> Result<u32, TransportError> {
        if self.closed {
            return Err(TransportError::Disconnected);
        }
        self.shared.short.pop()
    }

    fn fetch_long_event(&mut self, buffer: &mut [u8]) -> Result<usize, TransportError> {
        if self.closed {
            return Ok(0);
        }
        let Some(blob) = self.long_rx.pop() else {
            return Ok(0);
        };
        if blob.len() > buffer.len() {
            return Err(TransportError::Read(format!(
                "long event of {} bytes does not fit a {} byte buffer",
                blob.len(),
                buffer.len()
            )));
        }
        buffer[..blob.len()].copy_from_slice(&blob);
        Ok(blob.len())
    }

    fn reset_read_head_if_needed(&mut self) {
        self.shared.short.reset_read_head_if_needed();
    }

    fn read_head(&self) -> i32 {
        self.shared.short.read_head.load(Ordering::Acquire)
    }

    fn write_head(&self) -> i32 {
        self.shared.short.write_head.load(Ordering::Acquire)
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.shared.connected.store(false, Ordering::Release);
            debug!(pipe = %self.shared.id, "local pipe released");
        }
    }
}

impl Drop for LocalTransport {
    fn drop(&mut self) {
        self.close();
    }
}

/// Producer end of a local pipe, standing in for the driver.
pub struct PipeProducer {
    shared: Arc<PipeShared>,
    long_tx: HeapProducer<LongBlob>,
}

impl PipeProducer {
    pub fn id(&self) -> PipeId {
        self.shared.id
    }

    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Acquire)
    }

    /// Queues one packed short event.
    pub fn send_short(&mut self, event: u32) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::Disconnected);
        }
        self.shared.short.push(event)
    }

    /// Queues one long event. Empty blobs and blobs over
    /// [`MAX_LONG_EVENT_BYTES`] are rejected.
    pub fn send_long(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::Disconnected);
        }
        if bytes.is_empty() || bytes.len() > MAX_LONG_EVENT_BYTES {
            return Err(TransportError::InvalidLongEvent { len: bytes.len() });
        }
        self.long_tx
            .push(bytes.to_vec().into_boxed_slice())
            .map_err(|_| TransportError::Full)
    }

    pub fn write_head(&self) -> i32 {
        self.shared.short.write_head.load(Ordering::Acquire)
    }

    pub fn read_head(&self) -> i32 {
        self.shared.short.read_head.load(Ordering::Acquire)
    }

    /// Number of short event slots in the ring.
    pub fn capacity(&self) -> usize {
        self.shared.short.slots.len()
    }
}

impl std::fmt::Debug for PipeProducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipeProducer")
            .field("id", &self.shared.id)
            .finish_non_exhaustive()
    }
}
