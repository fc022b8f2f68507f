//! Multi-trial behaviour of the driver against scripted event sequences.

use anyhow::Result;
use lpwan_abstract::{
    EventSink, ExperimentConfig, OriginatorId, PacketId, ProtocolKind, SamplerTask, SimTime,
};
use lpwan_metrics::{TrialContext, TrialDriver, TrialSimulation};

#[derive(Debug, Clone)]
enum Scripted {
    Send(u64, u32),
    Receive(u64, u32),
    Outcome(u32, u32, u32, bool),
    Energy(f64),
    Tick(SamplerTask),
}

/// Replays the same events every trial and remembers what the sink answered.
struct Script {
    events: Vec<(SimTime, Scripted)>,
    accepted: Vec<Vec<bool>>,
}

impl Script {
    fn new(events: Vec<(SimTime, Scripted)>) -> Self {
        Self {
            events,
            accepted: Vec::new(),
        }
    }
}

impl TrialSimulation for Script {
    fn run_trial(&mut self, _ctx: &TrialContext, sink: &mut dyn EventSink) -> Result<()> {
        let mut accepted = Vec::new();
        let mut last_energy = 0.0;
        for (t, event) in &self.events {
            sink.advance_clock(*t);
            match *event {
                Scripted::Send(id, dev) => sink.on_send(PacketId(id), OriginatorId(dev)),
                Scripted::Receive(id, bytes) => accepted.push(sink.on_receive(PacketId(id), bytes)),
                Scripted::Outcome(dev, seq, attempt, ok) => {
                    sink.on_outcome(OriginatorId(dev), seq, attempt, ok)
                }
                Scripted::Energy(value) => {
                    sink.on_energy_update(last_energy, value);
                    last_energy = value;
                }
                Scripted::Tick(task) => sink.on_sampler_tick(task),
            }
        }
        self.accepted.push(accepted);
        Ok(())
    }
}

fn ten_devices_eight_delivered() -> Vec<(SimTime, Scripted)> {
    let mut events = Vec::new();
    for dev in 0..10u32 {
        events.push((1_000 + u64::from(dev) * 1_000, Scripted::Send(u64::from(dev), dev)));
    }
    for id in 0..8u64 {
        events.push((12_000 + id * 10, Scripted::Receive(id, 50)));
    }
    // two of the delivered packets arrive a second time
    events.push((13_000, Scripted::Receive(2, 50)));
    events.push((13_500, Scripted::Receive(5, 50)));
    events
}

#[test]
fn concrete_ten_device_scenario() {
    let config = ExperimentConfig {
        device_count: 10,
        ..ExperimentConfig::for_protocol(ProtocolKind::LoRaWan)
    };
    let mut driver = TrialDriver::new(config).unwrap();
    let mut script = Script::new(ten_devices_eight_delivered());
    let report = driver.run(&mut script).unwrap();

    let result = &report.trials[0];
    assert_eq!(result.sent, 10);
    assert_eq!(result.received, 8);
    assert_eq!(result.duplicated, 2);
    assert!((result.pdr - 80.0).abs() < 1e-9);
    assert!((result.plr - 20.0).abs() < 1e-9);
    assert!((result.retransmission_rate - 25.0).abs() < 1e-9);
    assert_eq!(
        script.accepted[0].iter().filter(|&&accepted| !accepted).count(),
        2
    );
}

#[test]
fn every_trial_starts_from_zero() {
    let config = ExperimentConfig {
        trials: 4,
        ..ExperimentConfig::for_protocol(ProtocolKind::LoRaWan)
    };
    let mut driver = TrialDriver::new(config).unwrap();
    let mut script = Script::new(ten_devices_eight_delivered());

    let (first, _) = driver.run_trial(0, &mut script).unwrap();
    assert!(!driver.state().is_pristine());
    let (second, _) = driver.run_trial(1, &mut script).unwrap();

    // the same packet ids are accepted as new again: the registry did not survive
    assert_eq!(script.accepted[0], script.accepted[1]);
    assert_eq!(first.sent, second.sent);
    assert_eq!(first.received, second.received);
    assert_eq!(first.duplicated, second.duplicated);
    assert_eq!(first.derived(), second.derived());
    assert_eq!(second.trial_index, 1);
}

#[test]
fn replay_through_fresh_driver_is_identical() {
    let events = ten_devices_eight_delivered();
    let run = || {
        let mut driver = TrialDriver::new(ExperimentConfig::default()).unwrap();
        driver.run(&mut Script::new(events.clone())).unwrap()
    };
    let a = run();
    let b = run();
    assert_eq!(a.trials, b.trials);
}

fn sigfox_script() -> Vec<(SimTime, Scripted)> {
    use Scripted::*;
    vec![
        // excluded: first attempt during warm-up
        (5_000, Outcome(0, 0, 0, true)),
        // device 3, logical packet 7: fails twice then succeeds after the window edge
        (585_000, Outcome(3, 7, 0, false)),
        (587_000, Outcome(3, 7, 1, false)),
        (591_000, Outcome(3, 7, 2, true)),
        // device 1, logical packet 2: all attempts lost
        (120_000, Outcome(1, 2, 0, false)),
        (122_000, Outcome(1, 2, 1, false)),
        (124_000, Outcome(1, 2, 2, false)),
    ]
}

#[test]
fn outcome_classification_through_driver() {
    let mut events = sigfox_script();
    events.sort_by_key(|(t, _)| *t);
    let mut driver = TrialDriver::new(ExperimentConfig::for_protocol(ProtocolKind::Sigfox)).unwrap();
    let report = driver.run(&mut Script::new(events)).unwrap();

    let outcomes = report.trials[0].outcomes;
    assert_eq!(outcomes.successes, 1);
    assert_eq!(outcomes.failures, 1);
    assert_eq!(
        driver.state().outcomes().attempts(OriginatorId(3), 7),
        Some(&[false, false, true][..])
    );
}

#[test]
fn power_trace_energy_from_sampler() {
    use Scripted::*;
    let events = vec![
        (30_000, Energy(2.0)),
        (45_000, Energy(5.0)),
        (60_000, Tick(SamplerTask::Report)),
        (60_000, Tick(SamplerTask::Measure)),
        (120_000, Tick(SamplerTask::Report)),
        (120_000, Tick(SamplerTask::Measure)),
    ];
    let config = ExperimentConfig {
        trials: 2,
        ..ExperimentConfig::for_protocol(ProtocolKind::Sigfox)
    };
    let mut driver = TrialDriver::new(config).unwrap();
    let report = driver.run(&mut Script::new(events)).unwrap();

    for result in &report.trials {
        // 360000 - 5 - 32.2 at the second report
        assert!((result.remaining_energy_j - 359_962.8).abs() < 1e-6);
        assert!((result.energy_consumed_j - 37.2).abs() < 1e-6);
    }
    assert_eq!(report.battery_logs.len(), 2);
    let first = &report.battery_logs[0].samples;
    assert_eq!(first.len(), 2);
    assert!((first[0].remaining_j - 359_995.0).abs() < 1e-6);
    assert_eq!(report.battery_logs[1].samples, *first);
}
