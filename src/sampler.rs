// BinWatch: Range Sampler
//
// Fires a burst of pings on one sonar channel and reduces them to a single
// distance. The median suppresses sporadic spikes and multi-path echoes: a
// lone outlier is outvoted by the other readings.

use std::thread;
use std::time::Duration;

use crate::config::US_ROUNDTRIP_CM;
use crate::events::Distance;

/// One raw acquisition channel.
pub trait PingChannel {
    /// Fire a single ping and return the echo round-trip time in
    /// microseconds, or `None` if no echo came back within range.
    fn ping(&mut self) -> Option<u32>;
}

pub struct RangeSampler<P> {
    channel: P,
    pings: usize,
    gap: Duration,
}

impl<P: PingChannel> RangeSampler<P> {
    pub fn new(channel: P, pings: usize, gap: Duration) -> Self {
        Self {
            channel,
            pings: pings.max(1),
            gap,
        }
    }

    /// Take `pings` readings and return their median in whole centimeters.
    ///
    /// Pings without an echo are left out of the median. `None` means no
    /// ping produced a usable echo.
    pub fn measure(&mut self) -> Option<Distance> {
        let mut echoes: Vec<u32> = Vec::with_capacity(self.pings);

        for i in 0..self.pings {
            if i > 0 && !self.gap.is_zero() {
                thread::sleep(self.gap);
            }
            match self.channel.ping() {
                Some(us) => echoes.push(us),
                None => log::debug!("Ping {}/{}: no echo", i + 1, self.pings),
            }
        }

        let median_us = median(&mut echoes)?;
        match median_us / US_ROUNDTRIP_CM {
            0 => None,
            cm => Some(Distance::from_cm(cm.min(u32::from(u16::MAX)) as u16)),
        }
    }

    #[cfg(test)]
    pub(crate) fn channel(&self) -> &P {
        &self.channel
    }
}

/// Middle element after sorting (the upper middle for even counts).
fn median(values: &mut [u32]) -> Option<u32> {
    if values.is_empty() {
        return None;
    }
    values.sort_unstable();
    Some(values[values.len() / 2])
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::VecDeque;

    use super::*;

    /// Replays a scripted list of echoes, then reports no echo.
    pub(crate) struct ScriptedChannel {
        pub echoes: VecDeque<Option<u32>>,
        pub fired: usize,
    }

    impl ScriptedChannel {
        pub fn new(echoes: impl IntoIterator<Item = Option<u32>>) -> Self {
            Self {
                echoes: echoes.into_iter().collect(),
                fired: 0,
            }
        }

        pub fn from_cm(cms: &[u32]) -> Self {
            Self::new(cms.iter().map(|cm| Some(cm * US_ROUNDTRIP_CM)))
        }
    }

    impl PingChannel for ScriptedChannel {
        fn ping(&mut self) -> Option<u32> {
            self.fired += 1;
            self.echoes.pop_front().flatten()
        }
    }

    fn sampler(channel: ScriptedChannel) -> RangeSampler<ScriptedChannel> {
        RangeSampler::new(channel, 5, Duration::ZERO)
    }

    #[test]
    fn fires_exactly_five_pings() {
        let mut s = sampler(ScriptedChannel::from_cm(&[50; 8]));
        assert_eq!(s.measure(), Some(Distance::from_cm(50)));
        assert_eq!(s.channel().fired, 5);
    }

    #[test]
    fn outlier_is_rejected_in_any_position() {
        let cluster = [61, 60, 62, 60];
        for outlier in [0u32, 3, 399, 4000] {
            for pos in 0..5 {
                let mut cms = cluster.to_vec();
                cms.insert(pos, outlier);
                let mut sorted = cms.clone();
                sorted.sort_unstable();

                let got = sampler(ScriptedChannel::from_cm(&cms)).measure();
                assert_eq!(got, Some(Distance::from_cm(sorted[2] as u16)), "{cms:?}");
                assert!((60..=62).contains(&got.map(Distance::cm).unwrap_or(0)));
            }
        }
    }

    #[test]
    fn round_trip_time_truncates_to_whole_cm() {
        let mut s = sampler(ScriptedChannel::new([Some(57 * 70 + 56); 5]));
        assert_eq!(s.measure(), Some(Distance::from_cm(70)));
    }

    #[test]
    fn missing_echoes_are_left_out() {
        let mut s = sampler(ScriptedChannel::new([
            None,
            Some(40 * US_ROUNDTRIP_CM),
            None,
            Some(42 * US_ROUNDTRIP_CM),
            Some(41 * US_ROUNDTRIP_CM),
        ]));
        assert_eq!(s.measure(), Some(Distance::from_cm(41)));
    }

    #[test]
    fn all_pings_silent_is_no_echo() {
        let mut s = sampler(ScriptedChannel::new([None; 5]));
        assert_eq!(s.measure(), None);
        assert_eq!(s.channel().fired, 5);
    }

    #[test]
    fn sub_centimeter_median_is_no_echo() {
        let mut s = sampler(ScriptedChannel::new([Some(20); 5]));
        assert_eq!(s.measure(), None);
    }
}
