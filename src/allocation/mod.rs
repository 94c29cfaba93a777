//! CPU pinning engine.
//!
//! Guests are split by allocation strategy, each group is checked and placed
//! against its own copy of the hypervisor's free cores, and the results are
//! stitched back together in the caller's guest order. Because the groups
//! never see each other's placements, a polite and a greedy guest may end up
//! pinned to the same physical core. That overlap is reported with a warning,
//! or rejected outright when strict isolation is enabled.

pub mod context;
pub mod greedy;
pub mod polite;

use std::collections::BTreeSet;
use tracing::{info, warn};

use crate::config::AllocationSettings;
use crate::errors::AllocationError;
use crate::spec::{AllocationStrategy, CoreId, HypervisorSpec, VirtualSpec};

pub use context::{AllocationData, GuestRequest};
pub use greedy::GreedyAllocationData;
pub use polite::PoliteAllocationData;

/// Physical cores pinned for one guest, in assignment order.
pub type CoreAllocation = Vec<CoreId>;

/// A placement rule run over one strategy group.
pub trait AllocationPolicy: Sized {
    fn data(&self) -> &AllocationData;

    /// Validates the group against the free pools without touching them.
    fn check(&self) -> Result<(), AllocationError> {
        self.data().check()
    }

    /// Places every guest of the group, in group order.
    fn allocate(self) -> Result<Vec<CoreAllocation>, AllocationError>;

    fn run(self) -> Result<Vec<CoreAllocation>, AllocationError> {
        self.check()?;
        self.allocate()
    }
}

struct StrategyGroups<'a> {
    polite: Vec<&'a VirtualSpec>,
    greedy: Vec<&'a VirtualSpec>,
}

fn partition(g_specs: &[VirtualSpec]) -> Result<StrategyGroups<'_>, AllocationError> {
    let mut groups = StrategyGroups {
        polite: Vec::new(),
        greedy: Vec::new(),
    };
    for (index, spec) in g_specs.iter().enumerate() {
        let strategy = spec.strategy();
        if !strategy.is_supported() {
            return Err(AllocationError::UnsupportedStrategy { index, strategy });
        }
        if strategy == AllocationStrategy::Polite {
            groups.polite.push(spec);
        } else {
            groups.greedy.push(spec);
        }
    }
    Ok(groups)
}

/// Core ids present in both sets of allocations, ascending.
pub fn overlapping_cores(left: &[CoreAllocation], right: &[CoreAllocation]) -> Vec<CoreId> {
    let left: BTreeSet<CoreId> = left.iter().flatten().copied().collect();
    let right: BTreeSet<CoreId> = right.iter().flatten().copied().collect();
    left.intersection(&right).copied().collect()
}

#[derive(Debug, Clone, Default)]
pub struct Allocator {
    settings: AllocationSettings,
}

impl Allocator {
    pub fn new(settings: AllocationSettings) -> Self {
        Self { settings }
    }

    /// Returns one core allocation per guest, in `g_specs` order.
    pub fn assign(
        &self,
        h_spec: &HypervisorSpec,
        g_specs: &[VirtualSpec],
    ) -> Result<Vec<CoreAllocation>, AllocationError> {
        let groups = partition(g_specs)?;
        info!(
            guests = g_specs.len(),
            polite = groups.polite.len(),
            greedy = groups.greedy.len(),
            "assigning cpus"
        );

        let polite = PoliteAllocationData::new(h_spec, groups.polite)?.run()?;
        let greedy = GreedyAllocationData::new(h_spec, groups.greedy)?.run()?;

        self.merge(g_specs, polite, greedy)
    }

    /// Same result as [`Allocator::assign`], with the polite and greedy groups
    /// placed on separate blocking workers.
    pub async fn assign_concurrent(
        &self,
        h_spec: &HypervisorSpec,
        g_specs: &[VirtualSpec],
    ) -> Result<Vec<CoreAllocation>, AllocationError> {
        let groups = partition(g_specs)?;
        info!(
            guests = g_specs.len(),
            polite = groups.polite.len(),
            greedy = groups.greedy.len(),
            "assigning cpus concurrently"
        );

        let polite = PoliteAllocationData::new(h_spec, groups.polite)?;
        let greedy = GreedyAllocationData::new(h_spec, groups.greedy)?;

        let (polite, greedy) = tokio::join!(
            tokio::task::spawn_blocking(move || polite.run()),
            tokio::task::spawn_blocking(move || greedy.run()),
        );
        let polite = polite.map_err(|e| AllocationError::WorkerFailed(e.to_string()))??;
        let greedy = greedy.map_err(|e| AllocationError::WorkerFailed(e.to_string()))??;

        self.merge(g_specs, polite, greedy)
    }

    fn merge(
        &self,
        g_specs: &[VirtualSpec],
        polite: Vec<CoreAllocation>,
        greedy: Vec<CoreAllocation>,
    ) -> Result<Vec<CoreAllocation>, AllocationError> {
        let shared = overlapping_cores(&polite, &greedy);
        if !shared.is_empty() {
            if self.settings.strict_isolation {
                return Err(AllocationError::CrossGroupOverlap { cores: shared });
            }
            warn!(
                shared_cores = shared.len(),
                "polite and greedy guests share physical cores"
            );
        }

        let mut polite = polite.into_iter();
        let mut greedy = greedy.into_iter();
        Ok(g_specs
            .iter()
            .filter_map(|spec| match spec.strategy() {
                AllocationStrategy::Polite => polite.next(),
                AllocationStrategy::Greedy => greedy.next(),
                _ => None,
            })
            .collect())
    }
}

/// Assigns cores with the default [`AllocationSettings`].
pub fn assign_cpus(
    h_spec: &HypervisorSpec,
    g_specs: &[VirtualSpec],
) -> Result<Vec<CoreAllocation>, AllocationError> {
    Allocator::default().assign(h_spec, g_specs)
}
