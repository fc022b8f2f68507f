use crate::event::{OriginatorId, PacketId, SamplerTask, SimTime};

/// The boundary between the discrete-event simulation and the metrics engine.
/// The simulation calls these methods in non-decreasing simulated-time order;
/// every method has a total handling policy and never fails.
pub trait EventSink {
    /// Advance the engine's view of the current simulated time.
    /// Called by the scheduler before dispatching each event.
    fn advance_clock(&mut self, now: SimTime);

    /// A device handed a packet to its radio.
    fn on_send(&mut self, packet: PacketId, originator: OriginatorId);

    /// A receiver's radio delivered a packet up the stack.
    /// Returns `false` when the packet was already seen (a duplicate), which
    /// upstream logic may use to decide whether to propagate it further.
    fn on_receive(&mut self, packet: PacketId, byte_size: u32) -> bool;

    /// A gateway-side decoder reports success/failure of one transmission attempt
    /// of logical packet `logical_seq` from `originator`.
    fn on_outcome(&mut self, originator: OriginatorId, logical_seq: u32, attempt: u32, succeeded: bool);

    /// A device's power source reported a change in its energy value.
    fn on_energy_update(&mut self, _old_value: f64, _new_value: f64) {
        // Default no-op so sinks without energy accounting don't need to care.
    }

    /// One of the periodic sampler tasks fired.
    fn on_sampler_tick(&mut self, _task: SamplerTask) {}
}
