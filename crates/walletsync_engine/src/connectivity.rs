//! Network reachability oracle.

use std::sync::atomic::{AtomicBool, Ordering};

/// Reports whether the device can currently reach the network.
pub trait Connectivity: Send + Sync {
    /// Returns true if the network is reachable.
    fn is_online(&self) -> bool;
}

/// Always reports the network as reachable.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysOnline;

impl Connectivity for AlwaysOnline {
    fn is_online(&self) -> bool {
        true
    }
}

/// A switchable connectivity state.
#[derive(Debug)]
pub struct ToggleConnectivity {
    online: AtomicBool,
}

impl ToggleConnectivity {
    /// Creates an oracle with the given initial state.
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
        }
    }

    /// Sets the connected state.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

impl Default for ToggleConnectivity {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Connectivity for ToggleConnectivity {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_connectivity() {
        let oracle = ToggleConnectivity::default();
        assert!(oracle.is_online());
        oracle.set_online(false);
        assert!(!oracle.is_online());
        assert!(AlwaysOnline.is_online());
    }
}
