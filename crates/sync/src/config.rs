use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Slots in the client incoming buffer and the server outgoing queue.
    pub dejitter_buffer_length: usize,
    /// Tick stride between sent snapshots; the dejitter buffer's divisor.
    pub network_send_rate: u32,
    /// Gap in ticks before a remote entity freezes. `0` disables freezing.
    pub ticks_before_freeze: u32,
    /// Emit deltas even when no field is dirty.
    pub force_updates: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            dejitter_buffer_length: 64,
            network_send_rate: 3,
            ticks_before_freeze: 10,
            force_updates: true,
        }
    }
}
