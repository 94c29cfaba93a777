use tracing::debug;

use super::context::AllocationData;
use super::{AllocationPolicy, CoreAllocation};
use crate::errors::AllocationError;
use crate::spec::{AllocationStrategy, HypervisorSpec, VirtualSpec};

/// Fills NUMA nodes in order, spilling over node boundaries as needed.
#[derive(Debug, Clone)]
pub struct GreedyAllocationData {
    data: AllocationData,
}

impl GreedyAllocationData {
    pub fn new<'a, I>(h_spec: &HypervisorSpec, g_specs: I) -> Result<Self, AllocationError>
    where
        I: IntoIterator<Item = &'a VirtualSpec>,
    {
        Ok(Self {
            data: AllocationData::new(h_spec, g_specs, AllocationStrategy::Greedy)?,
        })
    }

    /// Takes `requested` cores from the front of the pools, node 0 first.
    fn assign(&mut self, mut requested: usize) -> Result<CoreAllocation, AllocationError> {
        let wanted = requested;
        let mut assigned = Vec::with_capacity(requested);
        let mut nodes_used = 0;

        for cores in self.data.available_by_node.iter_mut() {
            if cores.is_empty() {
                continue;
            }
            nodes_used += 1;
            // Fewer cores left on this node than needed: take them all and
            // keep going.
            if cores.len() < requested {
                requested -= cores.len();
                assigned.append(cores);
                continue;
            }
            assigned.extend(cores.drain(..requested));
            requested = 0;
            break;
        }

        if requested > 0 {
            return Err(AllocationError::InsufficientCapacity {
                strategy: AllocationStrategy::Greedy,
                requested: wanted,
                available: assigned.len(),
            });
        }

        debug!(requested = wanted, nodes_used, "greedy guest placed");
        Ok(assigned)
    }
}

impl AllocationPolicy for GreedyAllocationData {
    fn data(&self) -> &AllocationData {
        &self.data
    }

    fn allocate(mut self) -> Result<Vec<CoreAllocation>, AllocationError> {
        let requested_counts: Vec<usize> = self.data.requested_counts().collect();
        requested_counts
            .into_iter()
            .map(|requested| self.assign(requested))
            .collect()
    }
}
