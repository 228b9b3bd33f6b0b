//! Episode-level orchestration of detection, buffering and reward.

use std::fmt;

use shaping_schema::VariableSnapshot;
use tracing::{debug, trace};

use crate::auxiliary::{self, AuxiliaryShaping};
use crate::config::{AuxiliaryPolicy, RewardMode, ShapingConfig};
use crate::error::{ShapingError, ShapingResult};
use crate::event_buffer::{EventBuffer, EventBufferHandle, SharedEventBuffer};
use crate::events::{check_width, EventDetector, EventVector};
use crate::position_buffer::{HeatMatrix, PositionBuffer};
use crate::statistics::{
    ShapingStatistics, EXTRINSIC_REWARD_KEY, INTRINSIC_REWARD_KEY, MEAN_KEY_PREFIX,
};

/// Lifecycle position of a [`RewardShaper`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaperPhase {
    Uninitialized,
    FirstStepPending,
    Active,
    EpisodeEnded,
}

impl fmt::Display for ShaperPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ShaperPhase::Uninitialized => "uninitialized",
            ShaperPhase::FirstStepPending => "awaiting the first step",
            ShaperPhase::Active => "active",
            ShaperPhase::EpisodeEnded => "between episodes",
        };
        f.write_str(label)
    }
}

/// Rarity-of-events reward shaping for one environment instance.
///
/// Per episode the caller drives `new_episode → first_step → (step,
/// get_reward)* → episode_finished`. Out-of-order calls return
/// [`ShapingError::Lifecycle`] and leave every accumulator untouched.
#[derive(Debug)]
pub struct RewardShaper {
    mode: RewardMode,
    detector: EventDetector,
    event_buffer: EventBufferHandle,
    position_buffer: PositionBuffer,
    auxiliary_policy: AuxiliaryPolicy,
    auxiliary: Option<Box<dyn AuxiliaryShaping>>,
    heat_matrix_size: (usize, usize),
    phase: ShaperPhase,
    latest: Option<VariableSnapshot>,
    events_this_step: EventVector,
    events_this_episode: EventVector,
    intrinsic_reward: f64,
    extrinsic_reward: f64,
    episodes_finished: u64,
}

impl RewardShaper {
    /// Shaper with its own event buffer. `config` is validated first.
    pub fn new(config: &ShapingConfig) -> ShapingResult<Self> {
        config.validate()?;
        let detector = EventDetector::new(&config.detector);
        let buffer = EventBuffer::from_config(detector.width(), &config.event_buffer)?;
        Ok(Self::assemble(
            config,
            detector,
            EventBufferHandle::Owned(buffer),
        ))
    }

    /// Shaper that pools episode statistics through `shared`.
    pub fn with_shared_buffer(
        config: &ShapingConfig,
        shared: SharedEventBuffer,
    ) -> ShapingResult<Self> {
        Self::with_event_buffer(config, EventBufferHandle::Shared(shared))
    }

    pub fn with_event_buffer(
        config: &ShapingConfig,
        event_buffer: EventBufferHandle,
    ) -> ShapingResult<Self> {
        config.validate()?;
        let detector = EventDetector::new(&config.detector);
        check_width(detector.width(), event_buffer.width())?;
        Ok(Self::assemble(config, detector, event_buffer))
    }

    fn assemble(
        config: &ShapingConfig,
        detector: EventDetector,
        event_buffer: EventBufferHandle,
    ) -> Self {
        let width = detector.width();
        Self {
            mode: config.reward_mode,
            detector,
            event_buffer,
            position_buffer: PositionBuffer::new(config.position_buffer.buffer_size),
            auxiliary_policy: config.auxiliary,
            auxiliary: None,
            heat_matrix_size: config.heat_matrix.size(),
            phase: ShaperPhase::Uninitialized,
            latest: None,
            events_this_step: EventVector::zeros(width),
            events_this_episode: EventVector::zeros(width),
            intrinsic_reward: 0.0,
            extrinsic_reward: 0.0,
            episodes_finished: 0,
        }
    }

    pub fn phase(&self) -> ShaperPhase {
        self.phase
    }

    pub fn mode(&self) -> RewardMode {
        self.mode
    }

    pub fn event_width(&self) -> usize {
        self.detector.width()
    }

    pub fn events_this_step(&self) -> &EventVector {
        &self.events_this_step
    }

    pub fn events_this_episode(&self) -> &EventVector {
        &self.events_this_episode
    }

    pub fn event_buffer(&self) -> &EventBufferHandle {
        &self.event_buffer
    }

    pub fn position_buffer(&self) -> &PositionBuffer {
        &self.position_buffer
    }

    pub fn episodes_finished(&self) -> u64 {
        self.episodes_finished
    }

    /// Resets every per-episode accumulator. Allowed from any phase.
    pub fn new_episode(&mut self) {
        let width = self.detector.width();
        self.events_this_step = EventVector::zeros(width);
        self.events_this_episode = EventVector::zeros(width);
        self.intrinsic_reward = 0.0;
        self.extrinsic_reward = 0.0;
        self.latest = None;
        self.detector.reset();
        self.auxiliary = auxiliary::instantiate(self.auxiliary_policy);
        self.phase = ShaperPhase::FirstStepPending;
    }

    /// Primes the previous-snapshot state; the step itself has no events.
    pub fn first_step(&mut self, snapshot: VariableSnapshot) -> ShapingResult<()> {
        self.require("first_step", &[ShaperPhase::FirstStepPending])?;

        self.events_this_step = self.detector.zero_vector();
        self.position_buffer.record_position(snapshot.position());
        self.latest = Some(snapshot);
        self.phase = ShaperPhase::Active;
        Ok(())
    }

    pub fn step(&mut self, snapshot: VariableSnapshot) -> ShapingResult<()> {
        self.require("step", &[ShaperPhase::Active])?;
        let previous = self.latest.ok_or(ShapingError::Lifecycle {
            operation: "step",
            phase: self.phase,
        })?;

        let events = self.detector.detect(&previous, &snapshot);
        self.events_this_episode.accumulate(&events)?;
        trace!(
            target: "roe_shaping::shaper",
            fired = events.total(),
            "step.events"
        );
        self.events_this_step = events;
        self.position_buffer.record_position(snapshot.position());
        self.latest = Some(snapshot);
        Ok(())
    }

    /// Routes to [`first_step`](Self::first_step) right after
    /// [`new_episode`](Self::new_episode), to [`step`](Self::step) otherwise.
    pub fn observe(&mut self, snapshot: VariableSnapshot) -> ShapingResult<()> {
        match self.phase {
            ShaperPhase::FirstStepPending => self.first_step(snapshot),
            _ => self.step(snapshot),
        }
    }

    /// [`observe`](Self::observe) for raw telemetry laid out in schema order.
    pub fn observe_values(&mut self, values: &[f64]) -> ShapingResult<()> {
        let snapshot = VariableSnapshot::from_slice(values)?;
        self.observe(snapshot)
    }

    /// [`observe`](Self::observe) for telemetry keyed by engine variable name.
    /// Every schema variable must be present.
    pub fn observe_named<'a, I>(&mut self, pairs: I) -> ShapingResult<()>
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        let snapshot = VariableSnapshot::from_named(pairs)?;
        self.observe(snapshot)
    }

    /// Effective reward for the current step: `base + intrinsic + auxiliary`.
    pub fn get_reward(&mut self, base_reward: f64) -> ShapingResult<f64> {
        self.require("get_reward", &[ShaperPhase::Active])?;

        let intrinsic = match self.mode {
            RewardMode::Rarity => self.event_buffer.intrinsic_reward(&self.events_this_step)?,
            RewardMode::PassThrough => 0.0,
        };
        let additional = match (self.auxiliary.as_mut(), self.latest.as_ref()) {
            (Some(auxiliary), Some(snapshot)) => auxiliary.reward(snapshot),
            _ => 0.0,
        };

        self.intrinsic_reward += intrinsic;
        self.extrinsic_reward += base_reward + additional;
        Ok(base_reward + intrinsic + additional)
    }

    /// Pushes this episode's event totals into the event buffer.
    pub fn episode_finished(&mut self) -> ShapingResult<()> {
        self.require(
            "episode_finished",
            &[ShaperPhase::FirstStepPending, ShaperPhase::Active],
        )?;

        self.event_buffer
            .record_events(self.events_this_episode.clone())?;
        self.episodes_finished += 1;
        self.phase = ShaperPhase::EpisodeEnded;

        debug!(
            target: "roe_shaping::shaper",
            episode = self.episodes_finished,
            intrinsic_reward = self.intrinsic_reward,
            extrinsic_reward = self.extrinsic_reward,
            events = self.events_this_episode.total(),
            buffered = self.event_buffer.len(),
            shared = self.event_buffer.is_shared(),
            "episode.finished"
        );
        Ok(())
    }

    /// Reward totals for the current (or just finished) episode, one entry per
    /// event type, and the buffered per-episode mean of each event under a
    /// `mean_` prefix.
    pub fn get_statistics(&self) -> ShapingStatistics {
        let mut stats: ShapingStatistics = self
            .detector
            .named_totals(&self.events_this_episode)
            .into_iter()
            .collect();
        let mean = EventVector::from_values(self.event_buffer.get_event_mean());
        for (name, value) in self.detector.named_totals(&mean) {
            stats.insert(format!("{MEAN_KEY_PREFIX}{name}"), value);
        }
        stats.insert(INTRINSIC_REWARD_KEY, self.intrinsic_reward);
        stats.insert(EXTRINSIC_REWARD_KEY, self.extrinsic_reward);
        stats
    }

    /// Mean per-episode event counts over the buffered window.
    pub fn event_mean(&self) -> Vec<f64> {
        self.event_buffer.get_event_mean()
    }

    pub fn get_position_heat_matrix(&self, size: (usize, usize)) -> ShapingResult<HeatMatrix> {
        self.position_buffer.get_position_heat_matrix(size)
    }

    /// Heat matrix at the configured size.
    pub fn heat_matrix(&self) -> ShapingResult<HeatMatrix> {
        self.get_position_heat_matrix(self.heat_matrix_size)
    }

    fn require(&self, operation: &'static str, allowed: &[ShaperPhase]) -> ShapingResult<()> {
        if allowed.contains(&self.phase) {
            Ok(())
        } else {
            Err(ShapingError::Lifecycle {
                operation,
                phase: self.phase,
            })
        }
    }
}

/// Shapers for a set of parallel environments. When
/// `event_buffer.shared` is set they all hold one [`SharedEventBuffer`].
#[derive(Debug)]
pub struct ShaperPool {
    shapers: Vec<RewardShaper>,
    shared: Option<SharedEventBuffer>,
}

impl ShaperPool {
    pub fn build(config: &ShapingConfig, workers: usize) -> ShapingResult<Self> {
        if !config.event_buffer.shared {
            return Ok(Self {
                shapers: (0..workers)
                    .map(|_| RewardShaper::new(config))
                    .collect::<ShapingResult<_>>()?,
                shared: None,
            });
        }

        config.validate()?;
        let width = EventDetector::new(&config.detector).width();
        let shared =
            SharedEventBuffer::new(EventBuffer::from_config(width, &config.event_buffer)?);
        let shapers = (0..workers)
            .map(|_| {
                let detector = EventDetector::new(&config.detector);
                RewardShaper::assemble(
                    config,
                    detector,
                    EventBufferHandle::Shared(shared.clone()),
                )
            })
            .collect();
        Ok(Self {
            shapers,
            shared: Some(shared),
        })
    }

    pub fn len(&self) -> usize {
        self.shapers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapers.is_empty()
    }

    pub fn shared_buffer(&self) -> Option<&SharedEventBuffer> {
        self.shared.as_ref()
    }

    pub fn shapers(&self) -> &[RewardShaper] {
        &self.shapers
    }

    pub fn shapers_mut(&mut self) -> &mut [RewardShaper] {
        &mut self.shapers
    }

    pub fn into_shapers(self) -> Vec<RewardShaper> {
        self.shapers
    }

    /// Statistics averaged key-wise across every shaper in the pool.
    pub fn average_statistics(&self) -> ShapingStatistics {
        let stats: Vec<ShapingStatistics> =
            self.shapers.iter().map(RewardShaper::get_statistics).collect();
        ShapingStatistics::average(&stats)
    }

    /// Cell-wise mean of every shaper's heat matrix; `None` for an empty pool.
    pub fn average_heat_matrix(&self, size: (usize, usize)) -> ShapingResult<Option<HeatMatrix>> {
        let matrices = self
            .shapers
            .iter()
            .map(|shaper| shaper.get_position_heat_matrix(size))
            .collect::<ShapingResult<Vec<_>>>()?;
        Ok(HeatMatrix::average(&matrices))
    }
}
