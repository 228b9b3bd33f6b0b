//! Cross-episode event statistics and the rarity-weighted intrinsic reward.

use std::sync::{Arc, RwLock};

use crate::config::EventBufferConfig;
use crate::error::{ShapingError, ShapingResult};
use crate::events::{check_width, EventVector};

/// Ring of the most recent per-episode event totals.
///
/// The per-slot reward weights only change when an episode is recorded, so
/// they are refreshed on write and read without allocation on every step.
#[derive(Debug, Clone)]
pub struct EventBuffer {
    width: usize,
    capacity: usize,
    event_clip: f64,
    cursor: usize,
    episodes: Vec<EventVector>,
    mean: Vec<f64>,
    weights: Vec<f64>,
}

impl EventBuffer {
    /// Capacity must be non-zero and `event_clip` strictly positive.
    pub fn new(width: usize, capacity: usize, event_clip: f64) -> ShapingResult<Self> {
        if capacity == 0 || !(event_clip > 0.0) {
            return Err(ShapingError::InvalidEventBuffer {
                capacity,
                event_clip,
            });
        }

        Ok(Self {
            width,
            capacity,
            event_clip,
            cursor: 0,
            episodes: Vec::with_capacity(capacity.min(1024)),
            mean: vec![0.0; width],
            weights: vec![0.0; width],
        })
    }

    pub fn from_config(width: usize, config: &EventBufferConfig) -> ShapingResult<Self> {
        Self::new(width, config.capacity, config.event_clip)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.episodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.episodes.is_empty()
    }

    /// Stores one episode's totals, overwriting the oldest entry once full.
    pub fn record_events(&mut self, events: EventVector) -> ShapingResult<()> {
        check_width(self.width, events.width())?;

        if self.episodes.len() < self.capacity {
            self.episodes.push(events);
        } else {
            self.episodes[self.cursor] = events;
            self.cursor = (self.cursor + 1) % self.capacity;
        }
        self.refresh();
        Ok(())
    }

    /// `Σ events[i] / max(mean[i], event_clip)`; zero while nothing is recorded.
    pub fn intrinsic_reward(&self, events: &EventVector) -> ShapingResult<f64> {
        check_width(self.width, events.width())?;
        if self.is_empty() {
            return Ok(0.0);
        }

        Ok(self
            .weights
            .iter()
            .zip(events.as_slice())
            .map(|(weight, count)| weight * count)
            .sum())
    }

    pub fn get_event_mean(&self) -> Vec<f64> {
        self.mean.clone()
    }

    fn refresh(&mut self) {
        let count = self.episodes.len() as f64;
        for slot in 0..self.width {
            let total: f64 = self.episodes.iter().map(|episode| episode.get(slot)).sum();
            self.mean[slot] = total / count;
            self.weights[slot] = 1.0 / self.mean[slot].max(self.event_clip);
        }
    }
}

/// Event buffer pooled across parallel workers. Episode-end writes take the
/// write lock; per-step reward reads share the read lock.
#[derive(Debug, Clone)]
pub struct SharedEventBuffer(Arc<RwLock<EventBuffer>>);

impl SharedEventBuffer {
    pub fn new(buffer: EventBuffer) -> Self {
        Self(Arc::new(RwLock::new(buffer)))
    }

    pub fn record_events(&self, events: EventVector) -> ShapingResult<()> {
        self.0
            .write()
            .expect("shared event buffer lock poisoned")
            .record_events(events)
    }

    pub fn intrinsic_reward(&self, events: &EventVector) -> ShapingResult<f64> {
        self.0
            .read()
            .expect("shared event buffer lock poisoned")
            .intrinsic_reward(events)
    }

    pub fn get_event_mean(&self) -> Vec<f64> {
        self.0
            .read()
            .expect("shared event buffer lock poisoned")
            .get_event_mean()
    }

    pub fn len(&self) -> usize {
        self.0.read().expect("shared event buffer lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn width(&self) -> usize {
        self.0.read().expect("shared event buffer lock poisoned").width()
    }

    /// Number of shapers currently holding this buffer.
    pub fn holders(&self) -> usize {
        Arc::strong_count(&self.0)
    }
}

/// Event buffer as seen by a single shaper: exclusively owned, or pooled.
#[derive(Debug, Clone)]
pub enum EventBufferHandle {
    Owned(EventBuffer),
    Shared(SharedEventBuffer),
}

impl EventBufferHandle {
    pub fn record_events(&mut self, events: EventVector) -> ShapingResult<()> {
        match self {
            EventBufferHandle::Owned(buffer) => buffer.record_events(events),
            EventBufferHandle::Shared(shared) => shared.record_events(events),
        }
    }

    pub fn intrinsic_reward(&self, events: &EventVector) -> ShapingResult<f64> {
        match self {
            EventBufferHandle::Owned(buffer) => buffer.intrinsic_reward(events),
            EventBufferHandle::Shared(shared) => shared.intrinsic_reward(events),
        }
    }

    pub fn get_event_mean(&self) -> Vec<f64> {
        match self {
            EventBufferHandle::Owned(buffer) => buffer.get_event_mean(),
            EventBufferHandle::Shared(shared) => shared.get_event_mean(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            EventBufferHandle::Owned(buffer) => buffer.len(),
            EventBufferHandle::Shared(shared) => shared.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn width(&self) -> usize {
        match self {
            EventBufferHandle::Owned(buffer) => buffer.width(),
            EventBufferHandle::Shared(shared) => shared.width(),
        }
    }

    pub fn is_shared(&self) -> bool {
        matches!(self, EventBufferHandle::Shared(_))
    }
}
