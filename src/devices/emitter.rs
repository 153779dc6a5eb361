use crate::grid::{Amount, EnergyWatcher, PowerSnapshot, WatcherHost};

/// Signals whether the pool holds at least `level`.
///
/// The grid only tells the emitter that the level may have been crossed; the
/// emitter re-evaluates against the snapshot itself.
#[derive(Debug, Clone)]
pub struct LevelEmitter {
    pub level: Amount,
    active: bool,
    toggles: u64,
    notifications: u64,
}

impl LevelEmitter {
    pub fn new(level: Amount) -> Self {
        Self {
            level,
            active: false,
            toggles: 0,
            notifications: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Number of times the output flipped.
    pub fn toggles(&self) -> u64 {
        self.toggles
    }

    /// Number of threshold notifications received.
    pub fn notifications(&self) -> u64 {
        self.notifications
    }
}

impl WatcherHost for LevelEmitter {
    fn update_watcher(&mut self, watcher: &mut EnergyWatcher) {
        watcher.add(self.level);
    }

    fn on_threshold_pass(&mut self, _threshold: Amount, snapshot: &PowerSnapshot) {
        self.notifications += 1;
        let active = snapshot.stored >= self.level;
        if active != self.active {
            self.active = active;
            self.toggles += 1;
        }
    }

    fn reset_watcher(&mut self) {
        self.active = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::NodeId;

    fn snapshot(stored: Amount) -> PowerSnapshot {
        PowerSnapshot {
            tick: 1,
            stored,
            max: 100.0,
            demand: 100.0 - stored,
            avg_usage: 0.0,
            avg_injection: 0.0,
            idle_usage: 0.0,
            powered: true,
        }
    }

    #[test]
    fn registers_its_level() {
        let mut emitter = LevelEmitter::new(40.0);
        let mut watcher = EnergyWatcher::new(NodeId(5));
        emitter.update_watcher(&mut watcher);
        assert_eq!(watcher.levels(), &[40.0]);
    }

    #[test]
    fn follows_the_snapshot() {
        let mut emitter = LevelEmitter::new(40.0);
        emitter.on_threshold_pass(40.0, &snapshot(45.0));
        assert!(emitter.is_active());
        // a pass that ends on the same side does not toggle
        emitter.on_threshold_pass(40.0, &snapshot(41.0));
        emitter.on_threshold_pass(40.0, &snapshot(10.0));
        assert!(!emitter.is_active());
        assert_eq!(emitter.toggles(), 2);
        assert_eq!(emitter.notifications(), 3);
    }
}
