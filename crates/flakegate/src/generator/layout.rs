use crate::{Error, Result};

/// The decoded fields of a packed identifier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct IdParts {
    /// Ticks elapsed since the generator's epoch.
    pub timestamp: i64,
    /// The machine segment.
    pub machine_id: i64,
    /// The per-tick sequence segment.
    pub sequence: i64,
}

/// A validated bit layout for a signed 64-bit identifier.
///
/// ```text
///  Bit Index:  63    62 .............. M+S   M+S-1 ...... S   S-1 ...... 0
///              +-----+--------------------+----------------+--------------+
///  Field:      | 0   | timestamp (T bits) | machine (M)    | sequence (S) |
///              +-----+--------------------+----------------+--------------+
/// ```
///
/// The sign bit is never set, so packed IDs are always non-negative and sort
/// by time, then machine, then sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Layout {
    timestamp_bits: u32,
    machine_bits: u32,
    sequence_bits: u32,
}

impl Layout {
    /// Total number of usable bits (bit 63 is the sign).
    pub const MAX_BITS: u32 = 63;
    pub const MIN_TIMESTAMP_BITS: u32 = 32;
    pub const MIN_MACHINE_BITS: u32 = 4;
    pub const MIN_SEQUENCE_BITS: u32 = 4;

    /// Validates the bit widths and builds a layout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if any field is narrower than its
    /// minimum or the widths add up to more than [`Layout::MAX_BITS`].
    pub fn new(timestamp_bits: u32, machine_bits: u32, sequence_bits: u32) -> Result<Self> {
        if timestamp_bits < Self::MIN_TIMESTAMP_BITS {
            return Err(Error::invalid_config(format!(
                "timestamp bits must be at least {}, got {timestamp_bits}",
                Self::MIN_TIMESTAMP_BITS
            )));
        }
        if machine_bits < Self::MIN_MACHINE_BITS {
            return Err(Error::invalid_config(format!(
                "machine bits must be at least {}, got {machine_bits}",
                Self::MIN_MACHINE_BITS
            )));
        }
        if sequence_bits < Self::MIN_SEQUENCE_BITS {
            return Err(Error::invalid_config(format!(
                "sequence bits must be at least {}, got {sequence_bits}",
                Self::MIN_SEQUENCE_BITS
            )));
        }
        let total = timestamp_bits
            .saturating_add(machine_bits)
            .saturating_add(sequence_bits);
        if total > Self::MAX_BITS {
            return Err(Error::invalid_config(format!(
                "total bits must not exceed {}, got {total}",
                Self::MAX_BITS
            )));
        }
        Ok(Self {
            timestamp_bits,
            machine_bits,
            sequence_bits,
        })
    }

    pub const fn timestamp_bits(&self) -> u32 {
        self.timestamp_bits
    }

    pub const fn machine_bits(&self) -> u32 {
        self.machine_bits
    }

    pub const fn sequence_bits(&self) -> u32 {
        self.sequence_bits
    }

    pub const fn max_timestamp(&self) -> i64 {
        (1 << self.timestamp_bits) - 1
    }

    pub const fn max_machine_id(&self) -> i64 {
        (1 << self.machine_bits) - 1
    }

    pub const fn max_sequence(&self) -> i64 {
        (1 << self.sequence_bits) - 1
    }

    const fn machine_shift(&self) -> u32 {
        self.sequence_bits
    }

    const fn timestamp_shift(&self) -> u32 {
        self.machine_bits + self.sequence_bits
    }

    /// Packs the three fields into one identifier.
    ///
    /// Each field is expected to be within its range; out-of-range bits are
    /// masked off so they can never bleed into a neighbouring field.
    pub const fn compose(&self, timestamp: i64, machine_id: i64, sequence: i64) -> i64 {
        ((timestamp & self.max_timestamp()) << self.timestamp_shift())
            | ((machine_id & self.max_machine_id()) << self.machine_shift())
            | (sequence & self.max_sequence())
    }

    /// Splits an identifier back into its fields.
    pub const fn decompose(&self, id: i64) -> IdParts {
        IdParts {
            timestamp: (id >> self.timestamp_shift()) & self.max_timestamp(),
            machine_id: (id >> self.machine_shift()) & self.max_machine_id(),
            sequence: id & self.max_sequence(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_layout_fits_in_52_bits() {
        let layout = Layout::new(32, 5, 15).unwrap();
        let id = layout.compose(
            layout.max_timestamp(),
            layout.max_machine_id(),
            layout.max_sequence(),
        );
        assert_eq!(id, (1 << 52) - 1);
    }

    #[test]
    fn fields_do_not_overlap() {
        let layout = Layout::new(33, 14, 16).unwrap();
        let id = layout.compose(0x1_2345_6789, 0x2abc, 0xbeef);
        assert_eq!(
            layout.decompose(id),
            IdParts {
                timestamp: 0x1_2345_6789,
                machine_id: 0x2abc,
                sequence: 0xbeef,
            }
        );
        assert!(id > 0);
    }

    #[test]
    fn full_width_layout_never_sets_sign_bit() {
        let layout = Layout::new(41, 10, 12).unwrap();
        let id = layout.compose(
            layout.max_timestamp(),
            layout.max_machine_id(),
            layout.max_sequence(),
        );
        assert_eq!(id, i64::MAX);
    }

    #[test]
    fn rejects_narrow_fields() {
        assert!(matches!(
            Layout::new(31, 10, 12),
            Err(Error::InvalidConfig { .. })
        ));
        assert!(Layout::new(41, 3, 12).is_err());
        assert!(Layout::new(41, 10, 3).is_err());
    }

    #[test]
    fn rejects_more_than_63_bits() {
        assert!(Layout::new(41, 10, 13).is_err());
        assert!(Layout::new(u32::MAX, 10, 12).is_err());
    }
}
