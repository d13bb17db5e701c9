// Tracked container and interface reconciliation

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::NetworkInterface;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    pub docker_id: String,
    /// Host PID of the container's init process; changes on every start, 0 when unknown.
    #[serde(skip)]
    pub pid: u32,
    pub name: String,
    pub node_name: String,
    pub is_active: bool,
    pub interfaces: Vec<NetworkInterface>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Container {
    pub fn new(
        docker_id: impl Into<String>,
        pid: u32,
        name: impl Into<String>,
        node_name: impl Into<String>,
        interfaces: Vec<NetworkInterface>,
    ) -> Self {
        let now = Utc::now();
        Self {
            docker_id: docker_id.into(),
            pid,
            name: name.into(),
            node_name: node_name.into(),
            is_active: true,
            interfaces,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn interface(&self, name: &str) -> Option<&NetworkInterface> {
        self.interfaces.iter().find(|i| i.name == name)
    }

    /// Merges a freshly discovered interface set into the known one. Known
    /// interfaces are never dropped: they go inactive unless rediscovered, and
    /// keep their counters when they are. Unknown candidates are appended as
    /// active. Returns the names of the appended interfaces.
    pub fn reconcile(&mut self, candidates: Vec<NetworkInterface>) -> Vec<String> {
        let was_active: Vec<bool> = self.interfaces.iter().map(|i| i.is_active).collect();
        for iface in &mut self.interfaces {
            iface.is_active = false;
        }

        let mut added = Vec::new();
        for mut candidate in candidates {
            match self
                .interfaces
                .iter()
                .position(|known| known.name == candidate.name)
            {
                Some(i) => {
                    let known = &mut self.interfaces[i];
                    // a link that vanished and came back restarts its counters
                    if !known.is_active && !was_active.get(i).copied().unwrap_or(false) {
                        known.request_baseline();
                    }
                    known.is_active = true;
                }
                None => {
                    candidate.is_active = true;
                    added.push(candidate.name.clone());
                    self.interfaces.push(candidate);
                }
            }
        }
        self.updated_at = Utc::now();
        added
    }

    /// Discards the next sample of every interface.
    pub fn request_baseline(&mut self) {
        for iface in &mut self.interfaces {
            iface.request_baseline();
        }
    }

    pub fn apply_deltas(&mut self) {
        for iface in &mut self.interfaces {
            iface.apply_deltas();
        }
    }
}
