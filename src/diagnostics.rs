use hashbrown::HashMap;

use crate::error::ErrorCode;
use crate::prelude::*;

/// Failure categories observed by the node. Each one has its own counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureEvent {
    ResetApplication,
    ResetCommunication,
    HeartbeatInit,
    SdoInit,
    CanReset,
    EmergencyInit,
    SyncInit,
    BootUp,
    NmtCommand,
    RpdoConfig,
    RpdoDecode,
    RpdoWrite,
}

pub type FailureHook = Box<dyn FnMut(FailureEvent, &ErrorCode)>;

#[derive(Debug, Default, Clone)]
pub struct FailureCounters {
    counts: HashMap<FailureEvent, u32>,
}

impl FailureCounters {
    pub fn new() -> Self {
        FailureCounters { counts: HashMap::new() }
    }

    pub fn record(&mut self, event: FailureEvent) {
        let count = self.counts.entry(event).or_insert(0);
        *count = count.saturating_add(1);
    }

    pub fn count(&self, event: FailureEvent) -> u32 {
        self.counts.get(&event).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u32 {
        self.counts.values().fold(0u32, |acc, n| acc.saturating_add(*n))
    }

    pub fn clear(&mut self) {
        self.counts.clear();
    }
}
