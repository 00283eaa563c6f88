use crate::{DEFAULT_EPOCH, Error, Layout, Result};
use std::time::Duration;

/// Construction parameters for a [`SnowflakeGenerator`].
///
/// The layout is fully configurable; [`GeneratorConfig::small`] and
/// [`GeneratorConfig::standard`] cover the two common shapes.
///
/// [`SnowflakeGenerator`]: crate::SnowflakeGenerator
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeneratorConfig {
    /// Reference point for tick zero, as a duration since 1970-01-01 UTC.
    pub start_epoch: Duration,
    pub timestamp_bits: u32,
    pub machine_bits: u32,
    pub sequence_bits: u32,
    /// Must lie in `[0, 2^machine_bits - 1]`.
    pub machine_id: i64,
    /// Length of one tick, between 1ms and 1s. Only whole milliseconds are
    /// honoured.
    pub time_unit: Duration,
}

impl GeneratorConfig {
    pub const MIN_TIME_UNIT: Duration = Duration::from_millis(1);
    pub const MAX_TIME_UNIT: Duration = Duration::from_secs(1);

    /// A compact layout whose IDs fit in 52 bits, so they survive a round
    /// trip through an IEEE-754 double (JavaScript numbers).
    ///
    /// ```text
    /// | timestamp | machine | sequence |
    /// |  32 bits  | 5 bits  | 15 bits  |   1s ticks since 2024-01-01
    /// ```
    pub fn small(machine_id: i64) -> Self {
        Self {
            start_epoch: DEFAULT_EPOCH,
            timestamp_bits: 32,
            machine_bits: 5,
            sequence_bits: 15,
            machine_id,
            time_unit: Duration::from_secs(1),
        }
    }

    /// The general purpose layout.
    ///
    /// ```text
    /// | timestamp | machine | sequence |
    /// |  33 bits  | 14 bits | 16 bits  |   1s ticks since 2024-01-01
    /// ```
    pub fn standard(machine_id: i64) -> Self {
        Self {
            start_epoch: DEFAULT_EPOCH,
            timestamp_bits: 33,
            machine_bits: 14,
            sequence_bits: 16,
            machine_id,
            time_unit: Duration::from_secs(1),
        }
    }

    /// Checks every constraint and returns the resulting bit layout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] when a bit width is too narrow, the
    /// widths exceed 63 bits, the machine ID does not fit its field, the time
    /// unit is outside `[1ms, 1s]`, or the epoch overflows 64-bit milliseconds.
    pub fn validate(&self) -> Result<Layout> {
        let layout = Layout::new(self.timestamp_bits, self.machine_bits, self.sequence_bits)?;
        if !(0..=layout.max_machine_id()).contains(&self.machine_id) {
            return Err(Error::invalid_config(format!(
                "machine id {} out of range [0, {}]",
                self.machine_id,
                layout.max_machine_id()
            )));
        }
        if self.time_unit < Self::MIN_TIME_UNIT || self.time_unit > Self::MAX_TIME_UNIT {
            return Err(Error::invalid_config(format!(
                "time unit {:?} outside [{:?}, {:?}]",
                self.time_unit,
                Self::MIN_TIME_UNIT,
                Self::MAX_TIME_UNIT
            )));
        }
        if u64::try_from(self.start_epoch.as_millis()).is_err() {
            return Err(Error::invalid_config(format!(
                "start epoch {:?} does not fit in 64-bit milliseconds",
                self.start_epoch
            )));
        }
        Ok(layout)
    }

    /// Tick length in milliseconds. Only meaningful after [`validate`], which
    /// bounds it to `[1, 1000]`.
    ///
    /// [`validate`]: GeneratorConfig::validate
    pub(crate) fn unit_millis(&self) -> u64 {
        u64::try_from(self.time_unit.as_millis()).unwrap_or(u64::MAX)
    }

    pub(crate) fn epoch_millis(&self) -> u64 {
        u64::try_from(self.start_epoch.as_millis()).unwrap_or(u64::MAX)
    }
}
