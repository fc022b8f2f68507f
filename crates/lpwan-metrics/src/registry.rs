use lpwan_abstract::PacketId;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    FirstSeen,
    Duplicate,
}

/// Packet identities already delivered during the current trial.
///
/// Grows monotonically; only [`IdentityRegistry::clear`] at trial reset shrinks it.
#[derive(Debug, Default, Clone)]
pub struct IdentityRegistry {
    seen: HashSet<PacketId>,
}

impl IdentityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, id: PacketId) -> Observation {
        if self.seen.insert(id) {
            Observation::FirstSeen
        } else {
            Observation::Duplicate
        }
    }

    pub fn contains(&self, id: PacketId) -> bool {
        self.seen.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn clear(&mut self) {
        self.seen.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_observation_is_duplicate() {
        let mut registry = IdentityRegistry::new();
        assert_eq!(registry.observe(PacketId(7)), Observation::FirstSeen);
        assert_eq!(registry.observe(PacketId(8)), Observation::FirstSeen);
        assert_eq!(registry.observe(PacketId(7)), Observation::Duplicate);
        assert_eq!(registry.observe(PacketId(7)), Observation::Duplicate);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn clear_forgets_everything() {
        let mut registry = IdentityRegistry::new();
        registry.observe(PacketId(1));
        registry.clear();
        assert!(registry.is_empty());
        assert_eq!(registry.observe(PacketId(1)), Observation::FirstSeen);
    }
}
