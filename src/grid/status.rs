//! Debounced network-powered flag.

/// Default number of consecutive powered ticks that must be exceeded before
/// the network is reported as powered.
pub const DEFAULT_DWELL_TICKS: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerState {
    Unpowered,
    /// Probes succeed but the dwell has not elapsed yet.
    PoweredPending,
    PoweredPublic,
}

/// Hysteresis over the raw per-tick power probe.
///
/// Power loss is published at once; power gain only after the probe has held
/// for more than `dwell` ticks in a row.
#[derive(Debug, Clone)]
pub struct PowerStatus {
    state: PowerState,
    consecutive: u32,
    dwell: u32,
    raw: bool,
}

impl Default for PowerStatus {
    fn default() -> Self {
        Self::new(DEFAULT_DWELL_TICKS)
    }
}

impl PowerStatus {
    pub fn new(dwell: u32) -> Self {
        Self {
            state: PowerState::Unpowered,
            consecutive: 0,
            dwell,
            raw: false,
        }
    }

    /// Feeds one probe result. Returns the new published flag if it changed.
    pub fn observe(&mut self, raw: bool) -> Option<bool> {
        let was_public = self.is_powered();
        self.raw = raw;
        if raw {
            self.consecutive = self.consecutive.saturating_add(1);
            self.state = if self.consecutive > self.dwell {
                PowerState::PoweredPublic
            } else {
                PowerState::PoweredPending
            };
        } else {
            self.consecutive = 0;
            self.state = PowerState::Unpowered;
        }
        let now_public = self.is_powered();
        (was_public != now_public).then_some(now_public)
    }

    /// Published flag.
    pub fn is_powered(&self) -> bool {
        self.state == PowerState::PoweredPublic
    }

    /// Last probe result.
    pub fn raw(&self) -> bool {
        self.raw
    }

    pub fn state(&self) -> PowerState {
        self.state
    }

    pub fn consecutive(&self) -> u32 {
        self.consecutive
    }
}
