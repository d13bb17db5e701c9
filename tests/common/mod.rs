// Shared test fakes: scripted runtime, in-memory gateway, recording persister

#![allow(dead_code)]

use async_trait::async_trait;
use futures_util::stream;
use netcollector::events::{EventHandler, SkipFilter};
use netcollector::gateway::{self, CounterSource, GatewayError};
use netcollector::models::Node;
use netcollector::persistence::{self, Persister};
use netcollector::registry::{Registry, SharedRegistry};
use netcollector::runtime::{self, ContainerInfo, ContainerRuntime, ContainerSummary, EventStream};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
pub struct FakeRuntime {
    containers: Mutex<Vec<(String, ContainerInfo)>>,
    pub inspects: AtomicUsize,
}

impl FakeRuntime {
    pub fn add(&self, id: &str, pid: u32, name: &str) {
        let mut containers = self.containers.lock().unwrap();
        containers.retain(|(known, _)| known != id);
        containers.push((
            id.to_string(),
            ContainerInfo {
                pid,
                name: name.to_string(),
            },
        ));
    }

    pub fn forget(&self, id: &str) {
        self.containers.lock().unwrap().retain(|(known, _)| known != id);
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn ping(&self) -> runtime::Result<()> {
        Ok(())
    }

    async fn inspect(&self, container_id: &str) -> runtime::Result<ContainerInfo> {
        self.inspects.fetch_add(1, Ordering::SeqCst);
        self.containers
            .lock()
            .unwrap()
            .iter()
            .find(|(id, _)| id == container_id)
            .map(|(_, info)| info.clone())
            .ok_or_else(|| runtime::RuntimeError::NotFound(container_id.to_string()))
    }

    async fn list_running(&self) -> runtime::Result<Vec<ContainerSummary>> {
        Ok(self
            .containers
            .lock()
            .unwrap()
            .iter()
            .map(|(id, info)| ContainerSummary {
                id: id.clone(),
                names: vec![info.name.clone()],
            })
            .collect())
    }

    fn events(&self) -> EventStream {
        Box::pin(stream::empty())
    }
}

type CounterKey = (u32, String, String);

/// Interfaces per PID (missing PID = unsupported), raw values per counter
/// (unset = "0"), and scripted exec failures.
#[derive(Default)]
pub struct FakeGateway {
    interfaces: Mutex<HashMap<u32, Vec<String>>>,
    values: Mutex<HashMap<CounterKey, String>>,
    failures: Mutex<HashSet<CounterKey>>,
    reads: Mutex<Vec<CounterKey>>,
}

fn key(pid: u32, interface: &str, counter: &str) -> CounterKey {
    (pid, interface.to_string(), counter.to_string())
}

impl FakeGateway {
    pub fn set_interfaces(&self, pid: u32, names: &[&str]) {
        self.interfaces
            .lock()
            .unwrap()
            .insert(pid, names.iter().map(|n| n.to_string()).collect());
    }

    pub fn set_value(&self, pid: u32, interface: &str, counter: &str, value: &str) {
        self.values
            .lock()
            .unwrap()
            .insert(key(pid, interface, counter), value.to_string());
    }

    pub fn fail(&self, pid: u32, interface: &str, counter: &str) {
        self.failures
            .lock()
            .unwrap()
            .insert(key(pid, interface, counter));
    }

    pub fn reads_for(&self, pid: u32) -> usize {
        self.reads
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _, _)| *p == pid)
            .count()
    }

    pub fn clear_reads(&self) {
        self.reads.lock().unwrap().clear();
    }
}

#[async_trait]
impl CounterSource for FakeGateway {
    async fn list_interfaces(&self, pid: u32) -> gateway::Result<Vec<String>> {
        self.interfaces
            .lock()
            .unwrap()
            .get(&pid)
            .cloned()
            .ok_or(GatewayError::Unsupported { pid })
    }

    async fn read_counter(
        &self,
        pid: u32,
        interface: &str,
        counter: &str,
    ) -> gateway::Result<String> {
        let k = key(pid, interface, counter);
        self.reads.lock().unwrap().push(k.clone());
        if self.failures.lock().unwrap().contains(&k) {
            return Err(GatewayError::ExecFailed("No such exec".to_string()));
        }
        Ok(self
            .values
            .lock()
            .unwrap()
            .get(&k)
            .cloned()
            .unwrap_or_else(|| "0".to_string()))
    }
}

#[derive(Default)]
pub struct RecordingPersister {
    pub updates: Mutex<Vec<Node>>,
    pub calls: Mutex<Vec<&'static str>>,
}

impl RecordingPersister {
    pub fn update_count(&self) -> usize {
        self.updates.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Persister for RecordingPersister {
    async fn update_node(&self, node: &Node) -> persistence::Result<()> {
        self.calls.lock().unwrap().push("update_node");
        self.updates.lock().unwrap().push(node.clone());
        Ok(())
    }

    async fn create_node(&self, _node: &Node) -> persistence::Result<()> {
        self.calls.lock().unwrap().push("create_node");
        Ok(())
    }

    async fn create_cluster(&self) -> persistence::Result<()> {
        self.calls.lock().unwrap().push("create_cluster");
        Ok(())
    }

    async fn close(&self) {
        self.calls.lock().unwrap().push("close");
    }
}

pub struct Harness {
    pub registry: SharedRegistry,
    pub runtime: Arc<FakeRuntime>,
    pub gateway: Arc<FakeGateway>,
    pub persister: Arc<RecordingPersister>,
    pub handler: EventHandler,
}

pub fn harness(skip_pattern: &str) -> Harness {
    let runtime = Arc::new(FakeRuntime::default());
    let gateway = Arc::new(FakeGateway::default());
    let persister = Arc::new(RecordingPersister::default());
    let registry = Registry::new("host1", runtime.clone(), gateway.clone()).into_shared();
    let handler = EventHandler::new(
        registry.clone(),
        runtime.clone(),
        persister.clone(),
        SkipFilter::new(skip_pattern).unwrap(),
    );
    Harness {
        registry,
        runtime,
        gateway,
        persister,
        handler,
    }
}

/// Current delta of one counter, if the container and interface are tracked.
pub async fn current_value(
    registry: &SharedRegistry,
    id: &str,
    interface: &str,
    counter: &str,
) -> Option<i64> {
    let registry = registry.lock().await;
    registry
        .node()
        .container(id)?
        .interface(interface)?
        .stat(counter)
        .map(|s| s.current_value)
}
