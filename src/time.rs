use std::time::Duration;

/// A duration in microseconds.
///
/// All delays and timeouts in the public API are expressed in microseconds,
/// even though the wire protocol only has one-second granularity; the
/// conversion to whole seconds happens at encoding time. This mirrors the
/// server's own internal clock, which counts microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Micros(u64);

impl Micros {
    /// No delay at all.
    pub const ZERO: Micros = Micros(0);

    /// The reserve timeout used when none is given. Not really infinite;
    /// merely large. About 126 years.
    pub const INFINITY: Micros = Micros(4_000_000_000_000_000);

    /// A duration of `n` microseconds.
    pub const fn from_micros(n: u64) -> Micros {
        Micros(n)
    }

    /// A duration of `n` whole seconds.
    pub const fn from_secs(n: u64) -> Micros {
        Micros(n * 1_000_000)
    }

    /// The number of microseconds.
    pub const fn as_micros(self) -> u64 {
        self.0
    }

    /// The number of whole milliseconds, rounded down.
    pub const fn as_millis(self) -> u64 {
        self.0 / 1_000
    }

    /// The number of whole seconds, rounded down. This is what goes on the
    /// wire.
    pub const fn as_secs(self) -> u64 {
        self.as_millis() / 1_000
    }
}

impl From<Duration> for Micros {
    fn from(d: Duration) -> Micros {
        Micros(d.as_micros() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_seconds_round_down() {
        assert_eq!(Micros::from_micros(1_999_999).as_secs(), 1);
        assert_eq!(Micros::from_micros(999_999).as_secs(), 0);
        assert_eq!(Micros::from_secs(3).as_secs(), 3);
    }

    #[test]
    fn infinity_is_the_documented_sentinel() {
        assert_eq!(Micros::INFINITY.as_micros(), 4_000_000_000_000_000);
        assert_eq!(Micros::INFINITY.as_secs(), 4_000_000_000);
    }

    #[test]
    fn from_std_duration() {
        assert_eq!(Micros::from(Duration::from_millis(2_500)).as_micros(), 2_500_000);
    }
}
