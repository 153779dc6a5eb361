/// A tick clock over a fixed run length.
///
/// # Examples
///
/// ```
/// use energy_grid::sim::clock::TickClock;
///
/// let mut clock = TickClock::new(3);
/// let mut ticks = Vec::new();
///
/// clock.run(|t| ticks.push(t));
/// assert_eq!(ticks, vec![0, 1, 2]);
/// ```
#[derive(Debug, Clone)]
pub struct TickClock {
    current: u64,
    total: u64,
}

impl TickClock {
    pub fn new(total: u64) -> Self {
        Self { current: 0, total }
    }

    /// Returns the next tick index, or `None` once the run is over.
    pub fn tick(&mut self) -> Option<u64> {
        if self.current < self.total {
            let t = self.current;
            self.current += 1;
            Some(t)
        } else {
            None
        }
    }

    /// Ticks left in the run.
    pub fn remaining(&self) -> u64 {
        self.total - self.current
    }

    /// Calls `f` for every remaining tick.
    pub fn run(&mut self, mut f: impl FnMut(u64)) {
        while let Some(t) = self.tick() {
            f(t);
        }
    }
}
