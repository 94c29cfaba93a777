use serde::{Deserialize, Serialize};
use std::fmt;

use super::base::{CpusSpec, HostSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AllocationStrategy {
    /// Discrete sets of vcpus pinned to host cpus, confined to a single NUMA
    /// node.
    #[default]
    Polite,
    /// Discrete sets of vcpus pinned to host cpus which may already have been
    /// allocated politely.
    Greedy,
    /// Pins vcpus without regard to other pins. No placement rule yet.
    Egregious,
    /// Floating (unpinned) cores. No placement rule yet.
    Sneaky,
}

impl AllocationStrategy {
    /// Whether the allocator knows how to place guests of this strategy.
    pub fn is_supported(self) -> bool {
        matches!(self, AllocationStrategy::Polite | AllocationStrategy::Greedy)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AllocationStrategy::Polite => "polite",
            AllocationStrategy::Greedy => "greedy",
            AllocationStrategy::Egregious => "egregious",
            AllocationStrategy::Sneaky => "sneaky",
        }
    }
}

impl fmt::Display for AllocationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_reserved_cores_per_node() -> usize {
    1
}

/// CPU pool of a hypervisor. The first `reserved_cores_per_node` ids listed
/// on each NUMA node stay with the hypervisor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HypervisorCpusSpec {
    #[serde(flatten)]
    pub base: CpusSpec,
    #[serde(default = "default_reserved_cores_per_node")]
    pub reserved_cores_per_node: usize,
}

impl HypervisorCpusSpec {
    pub fn new(base: CpusSpec, reserved_cores_per_node: usize) -> Self {
        Self {
            base,
            reserved_cores_per_node,
        }
    }
}

/// CPU pool requested by a guest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualCpusSpec {
    #[serde(flatten)]
    pub base: CpusSpec,
    #[serde(default)]
    pub allocation_strategy: AllocationStrategy,
}

impl VirtualCpusSpec {
    pub fn new(base: CpusSpec, allocation_strategy: AllocationStrategy) -> Self {
        Self {
            base,
            allocation_strategy,
        }
    }
}

pub type HypervisorSpec = HostSpec<HypervisorCpusSpec>;
pub type VirtualSpec = HostSpec<VirtualCpusSpec>;

impl VirtualSpec {
    pub fn strategy(&self) -> AllocationStrategy {
        self.cpus.allocation_strategy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_polite_and_greedy_are_supported() {
        assert!(AllocationStrategy::Polite.is_supported());
        assert!(AllocationStrategy::Greedy.is_supported());
        assert!(!AllocationStrategy::Egregious.is_supported());
        assert!(!AllocationStrategy::Sneaky.is_supported());
        assert_eq!(AllocationStrategy::default(), AllocationStrategy::Polite);
    }
}
