use tracing::debug;

use super::context::AllocationData;
use super::{AllocationPolicy, CoreAllocation};
use crate::errors::{AllocationError, NodeShortfall};
use crate::spec::{AllocationStrategy, HypervisorSpec, VirtualSpec};

/// Confines each guest to one NUMA node, assigning nodes round-robin by the
/// guest's position in the group.
#[derive(Debug, Clone)]
pub struct PoliteAllocationData {
    data: AllocationData,
}

impl PoliteAllocationData {
    pub fn new<'a, I>(h_spec: &HypervisorSpec, g_specs: I) -> Result<Self, AllocationError>
    where
        I: IntoIterator<Item = &'a VirtualSpec>,
    {
        Ok(Self {
            data: AllocationData::new(h_spec, g_specs, AllocationStrategy::Polite)?,
        })
    }

    fn node_for(&self, index: usize) -> usize {
        index % self.data.numa_nodes_count()
    }

    fn check_requested_numa_placement(&self) -> Result<(), AllocationError> {
        let mut requested_by_node = vec![0usize; self.data.numa_nodes_count()];
        for (n, count) in self.data.requested_counts().enumerate() {
            requested_by_node[self.node_for(n)] += count;
        }

        let shortfalls: Vec<NodeShortfall> = requested_by_node
            .into_iter()
            .zip(self.data.available_by_node.iter())
            .enumerate()
            .filter(|(_, (requested, available))| *requested > available.len())
            .map(|(node, (requested, available))| NodeShortfall {
                node,
                requested,
                available: available.len(),
            })
            .collect();

        if !shortfalls.is_empty() {
            return Err(AllocationError::InsufficientNodeCapacity { shortfalls });
        }
        Ok(())
    }

    fn assign(&mut self, requested: usize, node: usize) -> Result<CoreAllocation, AllocationError> {
        let cores = &mut self.data.available_by_node[node];
        if cores.len() < requested {
            return Err(AllocationError::NodeExhausted {
                node,
                requested,
                available: cores.len(),
            });
        }
        debug!(requested, node, "polite guest placed");
        Ok(cores.drain(..requested).collect())
    }
}

impl AllocationPolicy for PoliteAllocationData {
    fn data(&self) -> &AllocationData {
        &self.data
    }

    fn check(&self) -> Result<(), AllocationError> {
        self.data.check()?;
        self.check_requested_numa_placement()
    }

    fn allocate(mut self) -> Result<Vec<CoreAllocation>, AllocationError> {
        let requests = self.data.requests.clone();
        requests
            .iter()
            .enumerate()
            .map(|(n, request)| {
                let node = self.node_for(n);
                // Polite guests are sized by cores per CPU times CPU count.
                match request.polite_size() {
                    Some(requested) => self.assign(requested, node),
                    None => Err(AllocationError::NodeExhausted {
                        node,
                        requested: usize::MAX,
                        available: self.data.available_by_node[node].len(),
                    }),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocation::context::tests::{guest, hypervisor};
    use crate::spec::AllocationStrategy::Polite;

    #[test]
    fn test_round_robin_across_nodes() {
        let h_spec = hypervisor(vec![(0..6).collect(), (6..12).collect(), (12..18).collect()], 1);
        let guests = [
            guest(1, 2, Polite),
            guest(1, 2, Polite),
            guest(1, 2, Polite),
            guest(1, 3, Polite),
        ];
        let allocations = PoliteAllocationData::new(&h_spec, &guests)
            .unwrap()
            .run()
            .unwrap();
        assert_eq!(
            allocations,
            vec![vec![1, 2], vec![7, 8], vec![13, 14], vec![3, 4, 5]]
        );
    }

    #[test]
    fn test_placement_check_reports_every_short_node() {
        let h_spec = hypervisor(vec![(0..4).collect(), (4..8).collect()], 1);
        let guests = [
            guest(1, 2, Polite),
            guest(1, 1, Polite),
            guest(1, 2, Polite),
            guest(1, 1, Polite),
        ];
        // 6 requested against 6 available overall, but node 0 gets 4 of them.
        let data = PoliteAllocationData::new(&h_spec, &guests).unwrap();
        assert_eq!(
            data.check(),
            Err(AllocationError::InsufficientNodeCapacity {
                shortfalls: vec![NodeShortfall {
                    node: 0,
                    requested: 4,
                    available: 3,
                }],
            })
        );
    }

    #[test]
    fn test_check_is_idempotent() {
        let h_spec = hypervisor(vec![(0..4).collect(), (4..8).collect()], 1);
        let guests = [guest(1, 3, Polite), guest(1, 3, Polite)];
        let data = PoliteAllocationData::new(&h_spec, &guests).unwrap();
        let before = data.data().available_by_node().to_vec();
        assert!(data.check().is_ok());
        assert!(data.check().is_ok());
        assert_eq!(data.data().available_by_node(), before.as_slice());
    }

    #[test]
    fn test_multi_core_cpu_scales_request() {
        let h_spec = hypervisor(vec![(0..8).collect(), (8..16).collect()], 0);
        let guests = [guest(2, 3, Polite)];
        let allocations = PoliteAllocationData::new(&h_spec, &guests)
            .unwrap()
            .run()
            .unwrap();
        assert_eq!(allocations, vec![vec![0, 1, 2, 3, 4, 5]]);
    }

    #[test]
    fn test_scaled_request_exceeding_node_fails_whole_group() {
        let h_spec = hypervisor(vec![(0..4).collect(), (4..8).collect()], 0);
        let guests = [guest(4, 2, Polite)];
        let data = PoliteAllocationData::new(&h_spec, &guests).unwrap();
        assert!(data.check().is_ok());
        assert_eq!(
            data.allocate(),
            Err(AllocationError::NodeExhausted {
                node: 0,
                requested: 8,
                available: 4,
            })
        );
    }

    #[test]
    fn test_overflowing_polite_size_is_an_error() {
        let h_spec = hypervisor(vec![(0..8).collect(), (8..16).collect()], 1);
        let guests = [guest(usize::MAX / 2, 3, Polite)];
        let data = PoliteAllocationData::new(&h_spec, &guests).unwrap();
        assert!(data.check().is_ok());
        assert_eq!(
            data.allocate(),
            Err(AllocationError::NodeExhausted {
                node: 0,
                requested: usize::MAX,
                available: 7,
            })
        );
    }
}
