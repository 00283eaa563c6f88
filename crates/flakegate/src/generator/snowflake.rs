use core::cmp::Ordering;
use core::fmt;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{error, instrument, warn};

use crate::{GeneratorConfig, IdGenerator, IdParts, Layout, Result, SystemClock, TimeSource};

#[derive(Debug, Default)]
pub(crate) struct State {
    pub(crate) last_timestamp: i64,
    pub(crate) sequence: i64,
    pub(crate) halted: bool,
}

/// A lock-based Snowflake ID generator over a configurable bit layout.
///
/// Every call to [`generate_id`] takes one mutex, which totally orders the
/// timestamp/sequence updates and makes IDs from one instance strictly
/// increasing. Share it across threads behind an `Arc`.
///
/// ## Blocking
///
/// When the sequence space of the current tick is used up, the caller spins
/// (while holding the lock) until the clock reaches the next tick. Latency is
/// therefore bounded by one `time_unit`, and sustained overload degrades to
/// one full sequence batch per tick.
///
/// ## Fatal conditions
///
/// The generator panics, and stays halted for every later call, if:
/// - the clock reads an earlier tick than the last one used, or
/// - the elapsed tick count no longer fits in `timestamp_bits`.
///
/// Both would otherwise produce duplicate or out-of-order IDs.
///
/// [`generate_id`]: SnowflakeGenerator::generate_id
pub struct SnowflakeGenerator<T = SystemClock>
where
    T: TimeSource,
{
    pub(crate) state: Mutex<State>,
    layout: Layout,
    config: GeneratorConfig,
    epoch_millis: u64,
    unit_millis: u64,
    time: T,
}

impl SnowflakeGenerator<SystemClock> {
    /// Creates a generator that reads the system wall clock.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `config` fails validation.
    ///
    /// # Example
    /// ```
    /// use flakegate::{GeneratorConfig, SnowflakeGenerator};
    ///
    /// let generator = SnowflakeGenerator::new(GeneratorConfig::standard(7)).unwrap();
    /// let a = generator.generate_id();
    /// let b = generator.generate_id();
    /// assert!(a < b);
    /// assert_eq!(generator.decompose(b).machine_id, 7);
    /// ```
    ///
    /// [`Error::InvalidConfig`]: crate::Error::InvalidConfig
    pub fn new(config: GeneratorConfig) -> Result<Self> {
        Self::with_clock(config, SystemClock)
    }
}

impl<T> SnowflakeGenerator<T>
where
    T: TimeSource,
{
    /// Creates a generator that reads time from `time`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `config` fails validation.
    ///
    /// [`Error::InvalidConfig`]: crate::Error::InvalidConfig
    pub fn with_clock(config: GeneratorConfig, time: T) -> Result<Self> {
        let layout = config
            .validate()
            .inspect_err(|e| error!(error = %e, ?config, "rejecting generator config"))?;
        Ok(Self {
            state: Mutex::new(State::default()),
            layout,
            epoch_millis: config.epoch_millis(),
            unit_millis: config.unit_millis(),
            config,
            time,
        })
    }

    /// Mints the next identifier.
    ///
    /// # Panics
    ///
    /// Panics if the clock moved backwards, if the timestamp field is
    /// exhausted, or if an earlier call already hit one of those conditions.
    #[instrument(level = "trace", skip(self))]
    pub fn generate_id(&self) -> i64 {
        let mut state = self.state.lock();
        if state.halted {
            Self::cold_halted();
        }

        let mut now = self.current_tick();
        match now.cmp(&state.last_timestamp) {
            Ordering::Equal => {
                state.sequence = (state.sequence + 1) & self.layout.max_sequence();
                if state.sequence == 0 {
                    now = self.wait_for_next_tick(&mut state);
                }
            }
            Ordering::Greater => state.sequence = 0,
            Ordering::Less => Self::cold_clock_behind(&mut state, now),
        }

        if now > self.layout.max_timestamp() {
            self.cold_timestamp_overflow(&mut state, now);
        }

        state.last_timestamp = now;
        self.layout
            .compose(now, self.config.machine_id, state.sequence)
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn machine_id(&self) -> i64 {
        self.config.machine_id
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Splits an ID minted by this generator into its fields.
    pub fn decompose(&self, id: i64) -> IdParts {
        self.layout.decompose(id)
    }

    /// Returns the wall-clock instant encoded in `id`, as a duration since
    /// 1970-01-01 UTC, truncated to the start of its tick. Instants past
    /// `u64::MAX` milliseconds saturate.
    pub fn timestamp_of(&self, id: i64) -> Duration {
        let ticks = self.layout.decompose(id).timestamp as u64;
        Duration::from_millis(
            ticks
                .saturating_mul(self.unit_millis)
                .saturating_add(self.epoch_millis),
        )
    }

    /// Ticks elapsed since the epoch. Readings before the epoch count as tick
    /// zero.
    fn current_tick(&self) -> i64 {
        let elapsed = self.time.current_millis().saturating_sub(self.epoch_millis);
        i64::try_from(elapsed / self.unit_millis).unwrap_or(i64::MAX)
    }

    /// Spins until the clock passes `state.last_timestamp`. The sequence has
    /// already wrapped to zero.
    #[cold]
    #[inline(never)]
    fn wait_for_next_tick(&self, state: &mut State) -> i64 {
        warn!(
            max_sequence = self.layout.max_sequence(),
            tick = state.last_timestamp,
            "id generation reached the sequence limit, waiting for the next tick"
        );
        loop {
            std::thread::yield_now();
            let now = self.current_tick();
            match now.cmp(&state.last_timestamp) {
                Ordering::Greater => return now,
                Ordering::Equal => {}
                Ordering::Less => Self::cold_clock_behind(state, now),
            }
        }
    }

    #[cold]
    #[inline(never)]
    fn cold_clock_behind(state: &mut State, now: i64) -> ! {
        state.halted = true;
        error!(
            now,
            last = state.last_timestamp,
            "clock moved backwards, halting id generator"
        );
        panic!(
            "clock moved backwards: tick {now} < last tick {}",
            state.last_timestamp
        );
    }

    #[cold]
    #[inline(never)]
    fn cold_timestamp_overflow(&self, state: &mut State, now: i64) -> ! {
        state.halted = true;
        error!(
            now,
            max = self.layout.max_timestamp(),
            "timestamp field exhausted, halting id generator"
        );
        panic!(
            "timestamp overflow: tick {now} exceeds {} bits",
            self.layout.timestamp_bits()
        );
    }

    #[cold]
    #[inline(never)]
    fn cold_halted() -> ! {
        panic!("id generator halted after a fatal clock anomaly");
    }
}

impl<T> IdGenerator for SnowflakeGenerator<T>
where
    T: TimeSource,
{
    fn generate_id(&self) -> i64 {
        self.generate_id()
    }
}

impl<T> fmt::Debug for SnowflakeGenerator<T>
where
    T: TimeSource,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnowflakeGenerator")
            .field("layout", &self.layout)
            .field("machine_id", &self.config.machine_id)
            .field("start_epoch", &self.config.start_epoch)
            .field("time_unit", &self.config.time_unit)
            .finish_non_exhaustive()
    }
}
