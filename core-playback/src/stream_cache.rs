//! # Single-flight Stream Cache
//!
//! Memoizes the output of a chunk producer so that one logical request is
//! produced at most once, while still streaming data to the caller as it is
//! produced.
//!
//! ## Slot Model
//!
//! The cache holds a single slot keyed by request identity:
//!
//! ```text
//!             create_stream(k)              clean end
//!   Absent ──────────────────────> InProgress ─────────> Complete
//!     ^                               │    │                 │
//!     │        error / abandoned      │    │ reset / other k │
//!     └───────────────────────────────┘    └────────┬────────┘
//!     └─────────────────────────────────────────────┘
//! ```
//!
//! - **Flight**: one production of a key. It owns the producer stream and
//!   a buffer of every chunk produced so far.
//! - **Readers**: every caller of an absent or in-progress key gets one.
//!   A reader replays the buffer and, once caught up, polls the producer
//!   itself; chunks are passed through to it as they arrive and appended to
//!   the buffer for the others. All readers see the same chunks and outcome
//!   regardless of which of them is being drained.
//! - When every reader is dropped before the end, the flight is abandoned:
//!   the entry returns to absent and the producer is dropped with it.
//! - A **generation** counter is bumped on `reset()` and whenever a different
//!   key takes the slot; a flight only commits when its generation is still
//!   current, so discarded data can never resurface.

use crate::error::{PlaybackError, Result};
use crate::traits::ChunkStream;
use bytes::{Bytes, BytesMut};
use core_runtime::events::{CacheEvent, CoreEvent, EventBus};
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

/// Observable state of the cache for a given key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheStatus {
    Absent,
    InProgress,
    Complete { bytes: usize },
}

/// Single-slot, single-flight cache of chunk streams.
///
/// Cloning the cache shares the slot.
pub struct StreamCache<K> {
    slot: Arc<Mutex<Slot<K>>>,
    events: Option<EventBus>,
}

impl<K> Clone for StreamCache<K> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
            events: self.events.clone(),
        }
    }
}

struct Slot<K> {
    key: Option<K>,
    entry: Entry,
    generation: u64,
}

enum Entry {
    Absent,
    InProgress(Arc<Flight>),
    Complete(Bytes),
}

impl Entry {
    fn is_absent(&self) -> bool {
        matches!(self, Entry::Absent)
    }
}

impl<K> StreamCache<K>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + 'static,
{
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Mutex::new(Slot {
                key: None,
                entry: Entry::Absent,
                generation: 0,
            })),
            events: None,
        }
    }

    /// Mirrors cache activity as [`CacheEvent`]s on `bus`.
    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.events = Some(bus);
        self
    }

    /// Returns a stream for `key`, invoking `producer` only on a miss.
    ///
    /// - complete entry: the cached content as a single chunk
    /// - in progress: a reader joining the running production
    /// - absent: `producer` is called once and a new production started
    ///
    /// A key different from the current one discards whatever the slot held.
    /// `producer` runs with the slot locked and must not call back into the
    /// cache; it should only build its lazy stream.
    pub fn create_stream<F>(&self, key: K, producer: F) -> ChunkStream
    where
        F: FnOnce() -> ChunkStream,
    {
        let label = format!("{:?}", key);
        let mut slot = self.slot.lock();

        if slot.key.as_ref() != Some(&key) {
            if let (Some(old), false) = (slot.key.as_ref(), slot.entry.is_absent()) {
                let old = format!("{:?}", old);
                debug!(old = %old, key = %label, "Different request supersedes cached stream");
                emit(
                    &self.events,
                    CacheEvent::Discarded {
                        key: old,
                        reason: "superseded".to_string(),
                    },
                );
            }
            slot.generation += 1;
            slot.key = Some(key);
            slot.entry = Entry::Absent;
        }

        if let Entry::Complete(content) = &slot.entry {
            let content = content.clone();
            drop(slot);
            debug!(key = %label, bytes = content.len(), "Stream cache hit");
            emit(
                &self.events,
                CacheEvent::Hit {
                    key: label,
                    bytes: content.len() as u64,
                },
            );
            let chunk = (!content.is_empty()).then_some(Ok(content));
            return stream::iter(chunk).boxed();
        }

        let joined = match &slot.entry {
            Entry::InProgress(flight) if flight.join() => Some(Arc::clone(flight)),
            _ => None,
        };
        if let Some(flight) = joined {
            drop(slot);
            debug!(key = %label, "Joining in-progress production");
            emit(&self.events, CacheEvent::Joined { key: label });
            return read(self.reader(flight));
        }

        let flight = Arc::new(Flight::new(slot.generation, label.clone(), producer()));
        slot.entry = Entry::InProgress(Arc::clone(&flight));
        drop(slot);

        info!(key = %label, "Stream cache miss, producing");
        emit(&self.events, CacheEvent::Miss { key: label });
        read(self.reader(flight))
    }

    fn reader(&self, flight: Arc<Flight>) -> Reader<K> {
        Reader {
            slot: Arc::clone(&self.slot),
            events: self.events.clone(),
            flight,
            next_index: 0,
            done: false,
        }
    }

    /// Discards any cached or in-progress content.
    ///
    /// A running production keeps streaming to its consumers but will not
    /// commit; the next `create_stream` invokes its producer again.
    pub fn reset(&self) {
        let mut slot = self.slot.lock();
        slot.generation += 1;
        slot.entry = Entry::Absent;
        drop(slot);

        info!("Stream cache reset");
        emit(&self.events, CacheEvent::Reset);
    }

    pub fn status(&self, key: &K) -> CacheStatus {
        let slot = self.slot.lock();
        if slot.key.as_ref() != Some(key) {
            return CacheStatus::Absent;
        }
        match &slot.entry {
            Entry::Absent => CacheStatus::Absent,
            Entry::InProgress(_) => CacheStatus::InProgress,
            Entry::Complete(content) => CacheStatus::Complete {
                bytes: content.len(),
            },
        }
    }

    /// Size of the completed entry, if any.
    pub fn cached_len(&self) -> Option<usize> {
        match &self.slot.lock().entry {
            Entry::Complete(content) => Some(content.len()),
            _ => None,
        }
    }
}

impl<K> Default for StreamCache<K>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> fmt::Debug for StreamCache<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = self.slot.lock();
        let entry = match &slot.entry {
            Entry::Absent => "absent",
            Entry::InProgress(_) => "in_progress",
            Entry::Complete(_) => "complete",
        };
        f.debug_struct("StreamCache")
            .field("entry", &entry)
            .field("generation", &slot.generation)
            .finish()
    }
}

fn emit(events: &Option<EventBus>, event: CacheEvent) {
    if let Some(bus) = events {
        let _ = bus.emit(CoreEvent::Cache(event));
    }
}

// ============================================================================
// Flight
// ============================================================================

/// Shared record of one production: the producer, chunks so far and the
/// outcome.
struct Flight {
    generation: u64,
    label: String,
    state: Mutex<FlightState>,
    /// Polled by whichever reader needs the next chunk. Cleared only after
    /// the outcome is recorded.
    producer: AsyncMutex<Option<ChunkStream>>,
}

struct FlightState {
    chunks: Vec<Bytes>,
    outcome: Option<Outcome>,
    readers: usize,
}

enum Outcome {
    Completed,
    Failed(PlaybackError),
}

impl Flight {
    fn new(generation: u64, label: String, producer: ChunkStream) -> Self {
        Self {
            generation,
            label,
            state: Mutex::new(FlightState {
                chunks: Vec::new(),
                outcome: None,
                readers: 1,
            }),
            producer: AsyncMutex::new(Some(producer)),
        }
    }

    /// Registers another reader; fails once every reader has left.
    fn join(&self) -> bool {
        let mut state = self.state.lock();
        if state.readers == 0 {
            return false;
        }
        state.readers += 1;
        true
    }

    /// Unregisters a reader. Returns `true` when it was the last one and the
    /// production never finished.
    fn leave(&self) -> bool {
        let mut state = self.state.lock();
        state.readers -= 1;
        state.readers == 0 && state.outcome.is_none()
    }

    fn push(&self, chunk: Bytes) {
        self.state.lock().chunks.push(chunk);
    }

    fn finish(&self, outcome: Outcome) {
        let mut state = self.state.lock();
        if state.outcome.is_none() {
            state.outcome = Some(outcome);
        }
    }

    /// Whether a reader at `index` has something to consume.
    fn has_news(&self, index: usize) -> bool {
        let state = self.state.lock();
        index < state.chunks.len() || state.outcome.is_some()
    }

    fn concatenated(&self) -> Bytes {
        let state = self.state.lock();
        match state.chunks.as_slice() {
            [] => Bytes::new(),
            [only] => only.clone(),
            chunks => {
                let total = chunks.iter().map(Bytes::len).sum();
                let mut content = BytesMut::with_capacity(total);
                for chunk in chunks {
                    content.extend_from_slice(chunk);
                }
                content.freeze()
            }
        }
    }
}

// ============================================================================
// Reader
// ============================================================================

/// One consumer of a flight.
///
/// A reader first replays what is buffered. When it runs out it takes the
/// producer lock and polls the producer itself, so no reader ever waits on
/// another reader's pace.
struct Reader<K> {
    slot: Arc<Mutex<Slot<K>>>,
    events: Option<EventBus>,
    flight: Arc<Flight>,
    next_index: usize,
    done: bool,
}

enum Step {
    Chunk(Bytes),
    End(Option<PlaybackError>),
    Pending,
}

impl<K> Reader<K> {
    fn step(&mut self) -> Step {
        let state = self.flight.state.lock();
        if let Some(chunk) = state.chunks.get(self.next_index) {
            self.next_index += 1;
            return Step::Chunk(chunk.clone());
        }
        match &state.outcome {
            None => Step::Pending,
            Some(Outcome::Completed) => Step::End(None),
            Some(Outcome::Failed(error)) => Step::End(Some(error.replicate())),
        }
    }

    async fn next_item(&mut self) -> Option<Result<Bytes>> {
        if self.done {
            return None;
        }
        loop {
            match self.step() {
                Step::Chunk(chunk) => return Some(Ok(chunk)),
                Step::End(error) => {
                    self.done = true;
                    return error.map(Err);
                }
                Step::Pending => {}
            }

            let flight = Arc::clone(&self.flight);
            let mut producer = flight.producer.lock().await;
            if flight.has_news(self.next_index) {
                continue;
            }
            let Some(inner) = producer.as_mut() else {
                continue;
            };

            match inner.next().await {
                Some(Ok(chunk)) => {
                    flight.push(chunk.clone());
                    self.next_index += 1;
                    return Some(Ok(chunk));
                }
                Some(Err(error)) => {
                    self.fail(&error);
                    *producer = None;
                    self.done = true;
                    return Some(Err(error));
                }
                None => {
                    self.complete();
                    *producer = None;
                    self.done = true;
                    return None;
                }
            }
        }
    }

    /// Runs `f` on the slot entry if it still belongs to this flight.
    fn with_own_entry(&self, f: impl FnOnce(&mut Entry)) -> bool {
        let mut slot = self.slot.lock();
        let current = slot.generation == self.flight.generation
            && matches!(&slot.entry, Entry::InProgress(flight) if Arc::ptr_eq(flight, &self.flight));
        if current {
            f(&mut slot.entry);
        }
        current
    }

    fn complete(&self) {
        let label = &self.flight.label;
        let content = self.flight.concatenated();
        let bytes = content.len() as u64;

        if self.with_own_entry(|entry| *entry = Entry::Complete(content)) {
            info!(key = %label, bytes, "Stream cache committed");
            emit(
                &self.events,
                CacheEvent::Committed {
                    key: label.clone(),
                    bytes,
                },
            );
        } else {
            debug!(key = %label, bytes, "Stale production finished, not committed");
        }
        self.flight.finish(Outcome::Completed);
    }

    fn fail(&self, error: &PlaybackError) {
        let label = &self.flight.label;
        if self.with_own_entry(|entry| *entry = Entry::Absent) {
            warn!(key = %label, error = %error, "Production failed, discarding");
            emit(
                &self.events,
                CacheEvent::Discarded {
                    key: label.clone(),
                    reason: error.to_string(),
                },
            );
        } else {
            debug!(key = %label, error = %error, "Stale production failed");
        }
        self.flight.finish(Outcome::Failed(error.replicate()));
    }
}

impl<K> Drop for Reader<K> {
    fn drop(&mut self) {
        if !self.flight.leave() {
            return;
        }
        let label = &self.flight.label;
        debug!(key = %label, "Last consumer dropped, abandoning production");
        if self.with_own_entry(|entry| *entry = Entry::Absent) {
            emit(
                &self.events,
                CacheEvent::Discarded {
                    key: label.clone(),
                    reason: "abandoned".to_string(),
                },
            );
        }
    }
}

fn read<K: Send + 'static>(reader: Reader<K>) -> ChunkStream {
    stream::unfold(reader, |mut reader| async move {
        let item = reader.next_item().await?;
        Some((item, reader))
    })
    .boxed()
}
