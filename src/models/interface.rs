// Network interface and per-counter models

use serde::Serialize;

/// Counter files under `/sys/class/net/<iface>/statistics/`, see
/// https://www.kernel.org/doc/Documentation/ABI/testing/sysfs-class-net-statistics
pub const NET_STAT_NAMES: [&str; 22] = [
    "collisions",
    "multicast",
    "rx_bytes",
    "rx_compressed",
    "rx_crc_errors",
    "rx_dropped",
    "rx_fifo_errors",
    "rx_frame_errors",
    "rx_length_errors",
    "rx_missed_errors",
    "rx_over_errors",
    "rx_packets",
    "tx_aborted_errors",
    "tx_bytes",
    "tx_carrier_errors",
    "tx_compressed",
    "tx_dropped",
    "tx_errors",
    "tx_fifo_errors",
    "tx_heartbeat_errors",
    "tx_packets",
    "tx_window_errors",
];

/// One counter of one interface. `current_value` is the delta between the
/// last two samples; raw values are kept as read, no wraparound correction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkStat {
    pub name: String,
    pub value_read: i64,
    pub last_value_read: i64,
    pub current_value: i64,
    #[serde(skip)]
    sampled: bool,
    #[serde(skip)]
    baseline_pending: bool,
}

impl NetworkStat {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value_read: 0,
            last_value_read: 0,
            current_value: 0,
            sampled: false,
            baseline_pending: true,
        }
    }

    /// Stores a raw value read during the current tick.
    pub fn record(&mut self, value: i64) {
        self.value_read = value;
        self.sampled = true;
    }

    /// Delta step. Only counters recorded since the last call move; the first
    /// recorded sample after a baseline request sets the baseline and reports 0.
    pub fn apply_delta(&mut self) {
        if !self.sampled {
            return;
        }
        self.sampled = false;
        if self.baseline_pending {
            self.baseline_pending = false;
            self.current_value = 0;
        } else {
            self.current_value = self.value_read.wrapping_sub(self.last_value_read);
        }
        self.last_value_read = self.value_read;
    }

    pub fn request_baseline(&mut self) {
        self.baseline_pending = true;
    }

    pub fn is_baseline_pending(&self) -> bool {
        self.baseline_pending
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInterface {
    pub name: String,
    pub is_active: bool,
    pub stats: Vec<NetworkStat>,
}

impl NetworkInterface {
    /// Active interface with every well-known counter materialized at zero.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_active: true,
            stats: NET_STAT_NAMES.iter().map(|n| NetworkStat::new(*n)).collect(),
        }
    }

    pub fn stat(&self, name: &str) -> Option<&NetworkStat> {
        self.stats.iter().find(|s| s.name == name)
    }

    pub fn stat_mut(&mut self, name: &str) -> Option<&mut NetworkStat> {
        self.stats.iter_mut().find(|s| s.name == name)
    }

    pub fn request_baseline(&mut self) {
        for stat in &mut self.stats {
            stat.request_baseline();
        }
    }

    pub fn apply_deltas(&mut self) {
        for stat in &mut self.stats {
            stat.apply_delta();
        }
    }
}
