// Interface discovery: list what the container sees and reconcile with what is known.

use tracing::{debug, info, warn};

use crate::gateway::{CounterSource, GatewayError};
use crate::models::{Container, NetworkInterface};

/// Candidate interfaces for `pid`, each with the full counter set at zero.
pub(crate) async fn discover(
    gateway: &dyn CounterSource,
    pid: u32,
) -> Result<Vec<NetworkInterface>, GatewayError> {
    let names = gateway.list_interfaces(pid).await?;
    Ok(names.into_iter().map(NetworkInterface::new).collect())
}

/// Re-runs discovery for a tracked container. A failed listing leaves the
/// known interface set untouched.
pub(crate) async fn refresh(gateway: &dyn CounterSource, container: &mut Container) {
    match discover(gateway, container.pid).await {
        Ok(candidates) => merge(container, candidates),
        Err(e) => warn!(
            container_id = %container.docker_id,
            pid = container.pid,
            error = %e,
            "interface discovery failed; keeping known interfaces"
        ),
    }
}

pub(crate) fn merge(container: &mut Container, candidates: Vec<NetworkInterface>) {
    for name in container.reconcile(candidates) {
        info!(container = %container.name, interface = %name, "interface added");
    }
    debug!(
        container_id = %container.docker_id,
        active = container.interfaces.iter().filter(|i| i.is_active).count(),
        known = container.interfaces.len(),
        "interfaces reconciled"
    );
}
