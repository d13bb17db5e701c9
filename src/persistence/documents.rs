// Flat documents shipped downstream, one per counter.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::Node;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct StatDocument<'a> {
    pub value: i64,
    pub name: &'a str,
    #[serde(rename = "ContainerDockerID")]
    pub container_docker_id: &'a str,
    /// Node name followed by the container display name.
    pub container_name: String,
    pub node_name: &'a str,
    pub network_interface_name: &'a str,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct NodeDocument<'a> {
    pub name: &'a str,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<'a> From<&'a Node> for NodeDocument<'a> {
    fn from(node: &'a Node) -> Self {
        Self {
            name: &node.name,
            created_at: node.created_at,
            updated_at: node.updated_at,
        }
    }
}

/// Documents for every counter of every active interface of every active container.
pub fn stat_documents(node: &Node) -> Vec<StatDocument<'_>> {
    let mut out = Vec::new();
    for container in node.containers.iter().filter(|c| c.is_active) {
        let container_name = format!("{}{}", container.node_name, container.name);
        for iface in container.interfaces.iter().filter(|i| i.is_active) {
            for stat in &iface.stats {
                out.push(StatDocument {
                    value: stat.current_value,
                    name: &stat.name,
                    container_docker_id: &container.docker_id,
                    container_name: container_name.clone(),
                    node_name: &container.node_name,
                    network_interface_name: &iface.name,
                    updated_at: node.updated_at,
                });
            }
        }
    }
    out
}
