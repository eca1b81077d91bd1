use std::collections::BTreeMap;

use crate::location::Location;
use crate::{Error, Result};

/// Per-process map of every location announced so far.
///
/// Grows monotonically as Register events are observed. Never persisted: on
/// restart an apprentice rebuilds it through the registration handshake,
/// which avoids ever serving a stale cache.
#[derive(Debug, Default)]
pub struct LocationRegistry {
    entries: BTreeMap<u32, Location>,
}

impl LocationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a location. Re-registering identical fields is a no-op
    /// returning `false`; a different identity under the same uid is a fatal
    /// configuration error, since silent collision would misroute messages.
    pub fn register(&mut self, location: Location) -> Result<bool> {
        match self.entries.get(&location.uid()) {
            Some(existing) if *existing == location => Ok(false),
            Some(existing) => Err(Error::UidCollision {
                uid: location.uid(),
                existing: existing.uname(),
                incoming: location.uname(),
            }),
            None => {
                log::debug!("register location {} ({:08x})", location.uname(), location.uid());
                self.entries.insert(location.uid(), location);
                Ok(true)
            }
        }
    }

    pub fn get(&self, uid: u32) -> Option<&Location> {
        self.entries.get(&uid)
    }

    pub fn contains(&self, uid: u32) -> bool {
        self.entries.contains_key(&uid)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Location> {
        self.entries.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::{Category, Mode};

    fn strategy(name: &str) -> Location {
        Location::new(Mode::Live, Category::Strategy, "grp1", name).expect("location")
    }

    #[test]
    fn re_registration_is_a_no_op() {
        let mut registry = LocationRegistry::new();
        assert!(registry.register(strategy("alpha")).expect("first"));
        assert!(!registry.register(strategy("alpha")).expect("second"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn distinct_locations_accumulate() {
        let mut registry = LocationRegistry::new();
        registry.register(strategy("alpha")).expect("alpha");
        registry.register(strategy("beta")).expect("beta");
        assert_eq!(registry.len(), 2);
        assert!(registry.contains(strategy("alpha").uid()));
        assert!(registry.contains(strategy("beta").uid()));
    }

    #[test]
    fn colliding_uid_with_different_identity_fails() {
        // Fabricate a collision by inserting a location, then handing the
        // registry a different identity claiming the same uid via a map
        // poke. Real collisions come from crc32 clashes between unames.
        let mut registry = LocationRegistry::new();
        let alpha = strategy("alpha");
        let beta = strategy("beta");
        registry.entries.insert(beta.uid(), alpha);
        let err = registry.register(beta).expect_err("collision");
        assert!(matches!(err, Error::UidCollision { .. }));
    }
}
