use std::num::NonZeroU8;
use std::time::Duration;

/// Allows running in fast-forward or slow-motion instead of real-time
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Speed {
    #[default]
    RealTime,
    /// Speed up the simulation by the provided multiplier (e.g. `2` gives double speed)
    FastForward(NonZeroU8),
    /// Slow down the simulation by the provided multiplier (e.g. `2` gives half speed)
    SlowMotion(NonZeroU8),
}

impl Speed {
    pub fn fast_forward(rate: u8) -> Option<Self> {
        NonZeroU8::new(rate).map(Self::FastForward)
    }

    pub fn slow_motion(rate: u8) -> Option<Self> {
        NonZeroU8::new(rate).map(Self::SlowMotion)
    }

    pub fn adjust_duration(&self, duration: Duration) -> Duration {
        match self {
            Self::RealTime => duration,
            Self::FastForward(x) => duration / x.get() as u32,
            Self::SlowMotion(x) => duration * x.get() as u32,
        }
    }

    /// `0` is real time, positive values fast-forward and negative values slow down.
    /// Returns `None` for factors that don't fit in a `u8`.
    pub fn from_factor(n: i32) -> Option<Self> {
        match n {
            0 => Some(Self::RealTime),
            n if n > 0 => u8::try_from(n).ok().and_then(Self::fast_forward),
            n => u8::try_from(n.unsigned_abs()).ok().and_then(Self::slow_motion),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_adjust_duration() {
        let second = Duration::from_secs(1);

        assert_eq!(Speed::RealTime.adjust_duration(second), second);
        assert_eq!(
            Speed::from_factor(4).map(|s| s.adjust_duration(second)),
            Some(Duration::from_millis(250))
        );
        assert_eq!(
            Speed::from_factor(-3).map(|s| s.adjust_duration(second)),
            Some(Duration::from_secs(3))
        );
    }

    #[test]
    fn test_from_factor_out_of_range() {
        assert_eq!(Speed::from_factor(256), None);
        assert_eq!(Speed::from_factor(-1000), None);
        assert_eq!(Speed::from_factor(0), Some(Speed::RealTime));
    }
}
