// Registry lifecycle: create, activate, deactivate, remove

mod common;

use common::{FakeGateway, FakeRuntime, harness};
use netcollector::registry::{Registry, RegistryError};
use std::sync::Arc;
use std::sync::atomic::Ordering;

fn registry() -> (Registry, Arc<FakeRuntime>, Arc<FakeGateway>) {
    let runtime = Arc::new(FakeRuntime::default());
    let gateway = Arc::new(FakeGateway::default());
    let registry = Registry::new("host1", runtime.clone(), gateway.clone());
    (registry, runtime, gateway)
}

fn ids(registry: &Registry) -> Vec<String> {
    registry
        .node()
        .containers
        .iter()
        .map(|c| c.docker_id.clone())
        .collect()
}

#[tokio::test]
async fn create_tracks_container_with_discovered_interfaces() {
    let (mut registry, runtime, gateway) = registry();
    runtime.add("c1", 100, "web");
    gateway.set_interfaces(100, &["eth0", "lo"]);

    registry.create("c1").await.unwrap();

    let c = registry.node().container("c1").unwrap();
    assert!(c.is_active);
    assert_eq!(c.pid, 100);
    assert_eq!(c.name, "web");
    assert_eq!(c.node_name, "host1");
    let names: Vec<&str> = c.interfaces.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, vec!["eth0", "lo"]);
    assert!(c.interfaces.iter().all(|i| i.is_active && i.stats.len() == 22));
}

#[tokio::test]
async fn create_leaves_nothing_behind_on_failure() {
    let (mut registry, runtime, _gateway) = registry();

    let err = registry.create("ghost").await.unwrap_err();
    assert!(matches!(err, RegistryError::Runtime { .. }));

    // known to the runtime but its network namespace cannot be listed
    runtime.add("c2", 200, "db");
    let err = registry.create("c2").await.unwrap_err();
    assert!(matches!(err, RegistryError::Discovery { .. }));

    assert!(registry.node().containers.is_empty());
}

#[tokio::test]
async fn create_twice_keeps_a_single_record() {
    let (mut registry, runtime, gateway) = registry();
    runtime.add("c1", 100, "web");
    gateway.set_interfaces(100, &["eth0"]);

    registry.create("c1").await.unwrap();
    registry.create("c1").await.unwrap();

    assert_eq!(ids(&registry), vec!["c1"]);
    assert_eq!(runtime.inspects.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn activate_of_unknown_id_behaves_like_create() {
    let (mut registry, runtime, gateway) = registry();
    runtime.add("c1", 100, "web");
    gateway.set_interfaces(100, &["eth0"]);

    registry.activate("c1", 100).await.unwrap();

    let c = registry.node().container("c1").unwrap();
    assert!(c.is_active);
    assert_eq!(c.pid, 100);
    assert_eq!(c.interfaces.len(), 1);
}

#[tokio::test]
async fn activate_stores_the_new_runtime_pid() {
    let (mut registry, runtime, gateway) = registry();
    runtime.add("c1", 100, "web");
    gateway.set_interfaces(100, &["eth0"]);
    gateway.set_interfaces(4242, &["eth0"]);
    registry.create("c1").await.unwrap();
    assert!(registry.deactivate("c1"));

    registry.activate("c1", 4242).await.unwrap();

    let c = registry.node().container("c1").unwrap();
    assert_eq!(c.pid, 4242);
    assert!(c.is_active);
}

#[tokio::test]
async fn activate_reconciles_without_dropping_interfaces() {
    let (mut registry, runtime, gateway) = registry();
    runtime.add("c1", 100, "web");
    gateway.set_interfaces(100, &["eth0", "eth1"]);
    gateway.set_interfaces(300, &["eth0", "eth2"]);
    registry.create("c1").await.unwrap();
    registry.deactivate("c1");

    registry.activate("c1", 300).await.unwrap();

    let c = registry.node().container("c1").unwrap();
    let state: Vec<(&str, bool)> = c
        .interfaces
        .iter()
        .map(|i| (i.name.as_str(), i.is_active))
        .collect();
    assert_eq!(
        state,
        vec![("eth0", true), ("eth1", false), ("eth2", true)]
    );
    // every interface restarts its counters with the new process
    assert!(
        c.interfaces
            .iter()
            .flat_map(|i| i.stats.iter())
            .all(|s| s.is_baseline_pending())
    );
}

#[tokio::test]
async fn activate_with_failed_discovery_leaves_container_unchanged() {
    let (mut registry, runtime, gateway) = registry();
    runtime.add("c1", 100, "web");
    gateway.set_interfaces(100, &["eth0"]);
    registry.create("c1").await.unwrap();
    registry.deactivate("c1");

    let err = registry.activate("c1", 999).await.unwrap_err();
    assert!(matches!(err, RegistryError::Discovery { .. }));

    let c = registry.node().container("c1").unwrap();
    assert!(!c.is_active);
    assert_eq!(c.pid, 100);
}

#[tokio::test]
async fn deactivate_reports_whether_anything_changed() {
    let (mut registry, runtime, gateway) = registry();
    runtime.add("c1", 100, "web");
    gateway.set_interfaces(100, &["eth0"]);
    registry.create("c1").await.unwrap();

    let before = registry.node().clone();
    assert!(!registry.deactivate("unknown"));
    let after = registry.node();
    assert_eq!(after.updated_at, before.updated_at);
    assert_eq!(after.containers.len(), before.containers.len());
    for (a, b) in after.containers.iter().zip(&before.containers) {
        assert_eq!(a.docker_id, b.docker_id);
        assert_eq!(a.is_active, b.is_active);
        assert_eq!(a.pid, b.pid);
        assert_eq!(a.updated_at, b.updated_at);
        assert_eq!(a.interfaces, b.interfaces);
    }

    assert!(registry.deactivate("c1"));
    assert!(!registry.deactivate("c1"));
    assert_eq!(registry.active_count(), 0);
    assert_eq!(registry.node().containers.len(), 1);
}

#[tokio::test]
async fn remove_preserves_order_of_remaining_containers() {
    let (mut registry, runtime, gateway) = registry();
    for (id, pid) in [("a", 1), ("b", 2), ("c", 3), ("d", 4)] {
        runtime.add(id, pid, id);
        gateway.set_interfaces(pid, &["eth0"]);
        registry.create(id).await.unwrap();
    }

    let removed = registry.remove(1).unwrap();
    assert_eq!(removed.docker_id, "b");
    assert_eq!(ids(&registry), vec!["a", "c", "d"]);

    assert!(registry.remove(3).is_none());
    assert_eq!(registry.find_index("d"), Some(2));
    assert_eq!(registry.find_index("b"), None);
}

#[tokio::test]
async fn concurrent_creates_never_duplicate_an_id() {
    let h = harness("");
    h.runtime.add("c1", 100, "web");
    h.gateway.set_interfaces(100, &["eth0"]);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let registry = h.registry.clone();
        handles.push(tokio::spawn(async move {
            registry.lock().await.create("c1").await.unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(h.registry.lock().await.node().containers.len(), 1);
}
