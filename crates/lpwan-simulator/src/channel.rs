use lpwan_abstract::{ChannelConfig, SimTime};
use rand::Rng;

/// Fate of one over-the-air transmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transmission {
    /// Below the receiver sensitivity at this distance.
    OutOfRange { latency: SimTime },
    /// In range, dropped by random channel loss.
    Lost { latency: SimTime },
    /// Delivered after `latency`; optionally delivered again `redelivery_after` later.
    Delivered {
        latency: SimTime,
        redelivery_after: Option<SimTime>,
    },
}

/// Log-distance path loss plus random loss and redelivery.
#[derive(Debug, Clone)]
pub struct Channel {
    config: ChannelConfig,
    distance_m: f64,
}

impl Channel {
    pub fn new(config: ChannelConfig, distance_m: f64) -> Self {
        Self { config, distance_m }
    }

    pub fn path_loss_db(&self) -> f64 {
        let d = self.distance_m.max(1.0);
        self.config.reference_loss_db + 10.0 * self.config.path_loss_exponent * d.log10()
    }

    pub fn rx_power_dbm(&self) -> f64 {
        self.config.tx_power_dbm - self.path_loss_db()
    }

    pub fn in_range(&self) -> bool {
        self.rx_power_dbm() >= self.config.sensitivity_dbm
    }

    pub fn transmit<R: Rng + ?Sized>(&self, rng: &mut R) -> Transmission {
        let latency = self.latency(rng);
        if !self.in_range() {
            return Transmission::OutOfRange { latency };
        }
        if rng.random::<f64>() < self.config.loss_rate {
            return Transmission::Lost { latency };
        }
        let redelivery_after =
            (rng.random::<f64>() < self.config.duplicate_rate).then(|| self.latency(rng));
        Transmission::Delivered {
            latency,
            redelivery_after,
        }
    }

    fn latency<R: Rng + ?Sized>(&self, rng: &mut R) -> SimTime {
        rng.random_range(self.config.min_latency_ms..=self.config.max_latency_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn lossless() -> ChannelConfig {
        ChannelConfig {
            loss_rate: 0.0,
            duplicate_rate: 0.0,
            ..ChannelConfig::default()
        }
    }

    #[test]
    fn path_loss_grows_with_distance() {
        let near = Channel::new(ChannelConfig::default(), 100.0);
        let far = Channel::new(ChannelConfig::default(), 10_000.0);
        // 10 dB reference + 40 dB per decade
        assert!((near.path_loss_db() - 90.0).abs() < 1e-9);
        assert!((far.path_loss_db() - 170.0).abs() < 1e-9);
        assert!(near.in_range());
        assert!(!far.in_range());
    }

    #[test]
    fn lossless_channel_always_delivers_once() {
        let channel = Channel::new(lossless(), 1000.0);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            match channel.transmit(&mut rng) {
                Transmission::Delivered {
                    latency,
                    redelivery_after: None,
                } => assert!((10..=100).contains(&latency)),
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn certain_duplication_always_redelivers() {
        let config = ChannelConfig {
            duplicate_rate: 1.0,
            ..lossless()
        };
        let channel = Channel::new(config, 1000.0);
        let mut rng = StdRng::seed_from_u64(7);
        assert!(matches!(
            channel.transmit(&mut rng),
            Transmission::Delivered {
                redelivery_after: Some(_),
                ..
            }
        ));
    }

    #[test]
    fn certain_loss_never_delivers() {
        let config = ChannelConfig {
            loss_rate: 1.0,
            ..lossless()
        };
        let channel = Channel::new(config, 10.0);
        let mut rng = StdRng::seed_from_u64(1);
        assert!(matches!(channel.transmit(&mut rng), Transmission::Lost { .. }));
    }
}
