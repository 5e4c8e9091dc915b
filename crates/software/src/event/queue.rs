//! Provides the [`EventQueue`], the only channel through which producers reach the synthesis engine.

use super::SongEvent;
use embassy_sync::{
    blocking_mutex::raw::CriticalSectionRawMutex,
    channel::{Channel, TrySendError},
};

/// How many events the queue holds before producers have to wait.
///
/// A live MIDI stream which fills the queue stalls its byte handling, so this is sized for hundreds of events rather
/// than for the typical handful.
pub const QUEUE_CAPACITY: usize = 512;

/// A bounded FIFO of [`SongEvent`]s shared by the producers and the synthesis engine.
///
/// Events are delivered in exactly the order they were put, without coalescing or prioritization. [`put`][Self::put]
/// waits while the queue is full and [`get`][Self::get] waits while it is empty; producers which must not wait use
/// [`try_put`][Self::try_put] and decide for themselves what to do with a rejected event.
pub struct EventQueue<const N: usize = QUEUE_CAPACITY> {
    channel: Channel<CriticalSectionRawMutex, SongEvent, N>,
}

impl<const N: usize> EventQueue<N> {
    /// Constructs an empty queue. Usable in `static` initializers.
    pub const fn new() -> Self {
        Self {
            channel: Channel::new(),
        }
    }

    /// Appends an event, waiting for space if the queue is full.
    pub async fn put(&self, event: SongEvent) {
        self.channel.send(event).await;
    }

    /// Appends an event if there is space, otherwise hands it back inside [`QueueFull`].
    pub fn try_put(&self, event: SongEvent) -> Result<(), QueueFull> {
        self.channel.try_send(event).map_err(|err| match err {
            TrySendError::Full(event) => QueueFull(event),
        })
    }

    /// Removes the oldest event, waiting for one to arrive if the queue is empty.
    pub async fn get(&self) -> SongEvent {
        self.channel.receive().await
    }

    /// Removes the oldest event if there is one.
    pub fn try_get(&self) -> Option<SongEvent> {
        self.channel.try_receive().ok()
    }

    /// Discards every event not yet taken by the consumer and returns how many were dropped.
    ///
    /// This is best-effort: an event the consumer has already taken (and may still be waiting out the delay of) is
    /// unaffected.
    pub fn flush(&self) -> usize {
        let mut dropped = 0;
        while self.channel.try_receive().is_ok() {
            dropped += 1;
        }
        dropped
    }

    /// Number of events waiting.
    pub fn len(&self) -> usize {
        self.channel.len()
    }

    /// Returns `true` if no events are waiting.
    pub fn is_empty(&self) -> bool {
        self.channel.is_empty()
    }
}

impl<const N: usize> Default for EventQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Returned by [`EventQueue::try_put`] when there is no room; contains the event which was not enqueued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct QueueFull(pub SongEvent);
