// Domain models: one Node per agent, containers, interfaces and their counters

mod container;
mod interface;
mod node;

pub use container::Container;
pub use interface::{NET_STAT_NAMES, NetworkInterface, NetworkStat};
pub use node::Node;
