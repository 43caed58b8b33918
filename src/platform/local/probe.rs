//! # Constraint probes.
//!
//! The in-process host asks a [`ConstraintProbe`] whether a task's
//! [`Constraints`] currently hold. [`Satisfied`] always says yes;
//! [`DeviceProbe`] answers from a settable [`DeviceSnapshot`].

use parking_lot::RwLock;

use crate::request::{Constraints, NetworkType};

/// Answers whether device conditions allow a task to run now.
pub trait ConstraintProbe: Send + Sync + 'static {
    fn satisfied(&self, constraints: &Constraints) -> bool;
}

/// Probe that treats every constraint as met.
#[derive(Debug, Default, Clone, Copy)]
pub struct Satisfied;

impl ConstraintProbe for Satisfied {
    fn satisfied(&self, _: &Constraints) -> bool {
        true
    }
}

/// Observed device conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceSnapshot {
    pub connected: bool,
    pub metered: bool,
    pub roaming: bool,
    pub charging: bool,
    pub battery_low: bool,
    pub idle: bool,
    pub storage_low: bool,
}

impl Default for DeviceSnapshot {
    /// Connected, unmetered, charging, healthy, not idle.
    fn default() -> Self {
        Self {
            connected: true,
            metered: false,
            roaming: false,
            charging: true,
            battery_low: false,
            idle: false,
            storage_low: false,
        }
    }
}

impl DeviceSnapshot {
    pub fn satisfies(&self, c: &Constraints) -> bool {
        let network = match c.network_type {
            NetworkType::NotRequired => true,
            NetworkType::Connected => self.connected,
            NetworkType::Unmetered | NetworkType::TemporarilyUnmetered => {
                self.connected && !self.metered
            }
            NetworkType::Metered => self.connected && self.metered,
            NetworkType::NotRoaming => self.connected && !self.roaming,
        };
        network
            && (!c.requires_charging || self.charging)
            && (!c.requires_battery_not_low || !self.battery_low)
            && (!c.requires_device_idle || self.idle)
            && (!c.requires_storage_not_low || !self.storage_low)
    }
}

/// Probe backed by a snapshot the host updates.
#[derive(Debug, Default)]
pub struct DeviceProbe {
    state: RwLock<DeviceSnapshot>,
}

impl DeviceProbe {
    pub fn new(snapshot: DeviceSnapshot) -> Self {
        Self {
            state: RwLock::new(snapshot),
        }
    }

    pub fn set(&self, snapshot: DeviceSnapshot) {
        *self.state.write() = snapshot;
    }

    pub fn update(&self, f: impl FnOnce(&mut DeviceSnapshot)) {
        f(&mut self.state.write());
    }

    pub fn snapshot(&self) -> DeviceSnapshot {
        *self.state.read()
    }
}

impl ConstraintProbe for DeviceProbe {
    fn satisfied(&self, constraints: &Constraints) -> bool {
        self.state.read().satisfies(constraints)
    }
}
