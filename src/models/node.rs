// Host-level record owned by one agent instance

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::Container;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub containers: Vec<Container>,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            created_at: now,
            updated_at: now,
            containers: Vec::new(),
        }
    }

    /// Position of the container with this runtime ID. Linear scan.
    pub fn find_index(&self, docker_id: &str) -> Option<usize> {
        self.containers.iter().position(|c| c.docker_id == docker_id)
    }

    pub fn container(&self, docker_id: &str) -> Option<&Container> {
        self.find_index(docker_id).map(|i| &self.containers[i])
    }

    pub fn active_count(&self) -> usize {
        self.containers.iter().filter(|c| c.is_active).count()
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
