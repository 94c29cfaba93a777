use crate::errors::AllocationError;
use crate::spec::{AllocationStrategy, CoreId, HypervisorSpec, VirtualSpec};

/// What the allocator needs to know about one guest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuestRequest {
    pub cpu_count: usize,
    pub cores: usize,
}

impl GuestRequest {
    /// Cores a politely placed guest occupies: cores per CPU times CPU count.
    /// `None` when the product does not fit in `usize`.
    pub fn polite_size(&self) -> Option<usize> {
        self.cores.checked_mul(self.cpu_count)
    }
}

impl From<&VirtualSpec> for GuestRequest {
    fn from(spec: &VirtualSpec) -> Self {
        Self {
            cpu_count: spec.cpus.base.cpu_count,
            cores: spec.cpus.base.cpu.cores,
        }
    }
}

/// Working state for one strategy group within a single allocation call.
///
/// Owns a private copy of the hypervisor's per-node pools with the reserved
/// cores already removed, so groups never observe each other's depletion.
#[derive(Debug, Clone)]
pub struct AllocationData {
    pub(crate) available_by_node: Vec<Vec<CoreId>>,
    pub(crate) requests: Vec<GuestRequest>,
    pub(crate) strategy: AllocationStrategy,
}

impl AllocationData {
    pub fn new<'a, I>(
        h_spec: &HypervisorSpec,
        g_specs: I,
        strategy: AllocationStrategy,
    ) -> Result<Self, AllocationError>
    where
        I: IntoIterator<Item = &'a VirtualSpec>,
    {
        Ok(Self {
            available_by_node: available_by_node(h_spec)?,
            requests: g_specs.into_iter().map(GuestRequest::from).collect(),
            strategy,
        })
    }

    pub fn available_by_node(&self) -> &[Vec<CoreId>] {
        &self.available_by_node
    }

    pub fn numa_nodes_count(&self) -> usize {
        self.available_by_node.len()
    }

    pub fn requested_counts(&self) -> impl Iterator<Item = usize> + '_ {
        self.requests.iter().map(|request| request.cpu_count)
    }

    /// Total of `requested_counts`, saturating at `usize::MAX`.
    pub fn requested_count(&self) -> usize {
        self.requested_counts().fold(0, usize::saturating_add)
    }

    pub fn available_count(&self) -> usize {
        self.available_by_node.iter().map(Vec::len).sum()
    }

    fn check_requested_cpu_count(&self) -> Result<(), AllocationError> {
        let requested = self.requested_count();
        let available = self.available_count();
        if requested > available {
            return Err(AllocationError::InsufficientCapacity {
                strategy: self.strategy,
                requested,
                available,
            });
        }
        Ok(())
    }

    /// Capacity check shared by every strategy. Never mutates the pools.
    pub fn check(&self) -> Result<(), AllocationError> {
        self.check_requested_cpu_count()
    }
}

/// Copy of the hypervisor's NUMA map minus the leading reserved ids of each
/// node.
fn available_by_node(h_spec: &HypervisorSpec) -> Result<Vec<Vec<CoreId>>, AllocationError> {
    let numa_map = match &h_spec.cpus.base.numa_map {
        Some(map) if !map.is_empty() => map,
        _ => return Err(AllocationError::MissingTopology),
    };
    let reserved = h_spec.cpus.reserved_cores_per_node;
    Ok(numa_map
        .iter()
        .map(|node| node.iter().skip(reserved).copied().collect())
        .collect())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::spec::{ConfigSpec, Cpu, CpusSpec, HostSpec, HypervisorCpusSpec, VirtualCpusSpec};

    pub(crate) fn hypervisor(numa_map: Vec<Vec<CoreId>>, reserved: usize) -> HypervisorSpec {
        HostSpec {
            config: ConfigSpec::new("hypervisor"),
            cpus: HypervisorCpusSpec::new(
                CpusSpec::new(Cpu::new("AMD1", 128), 2, false).with_numa_map(numa_map),
                reserved,
            ),
        }
    }

    pub(crate) fn guest(
        cores: usize,
        cpu_count: usize,
        strategy: AllocationStrategy,
    ) -> VirtualSpec {
        HostSpec {
            config: ConfigSpec::new("workstation"),
            cpus: VirtualCpusSpec::new(
                CpusSpec::new(Cpu::new("AMD1", cores), cpu_count, false),
                strategy,
            ),
        }
    }

    fn no_guests() -> &'static [VirtualSpec] {
        &[]
    }

    #[test]
    fn test_reserved_cores_dropped_by_position() {
        let h_spec = hypervisor(vec![vec![3, 1, 2], vec![9, 8]], 1);
        let data = AllocationData::new(&h_spec, no_guests(), AllocationStrategy::Greedy).unwrap();
        assert_eq!(data.available_by_node(), &[vec![1, 2], vec![8]]);
        assert_eq!(data.numa_nodes_count(), 2);
        assert_eq!(data.available_count(), 3);
    }

    #[test]
    fn test_over_reservation_empties_node() {
        let h_spec = hypervisor(vec![vec![0, 1], vec![2, 3, 4]], 2);
        let data = AllocationData::new(&h_spec, no_guests(), AllocationStrategy::Greedy).unwrap();
        assert_eq!(data.available_by_node(), &[vec![], vec![4]]);
    }

    #[test]
    fn test_missing_topology() {
        let mut h_spec = hypervisor(vec![], 1);
        let err = AllocationData::new(&h_spec, no_guests(), AllocationStrategy::Polite).unwrap_err();
        assert_eq!(err, AllocationError::MissingTopology);

        h_spec.cpus.base.numa_map = None;
        let err = AllocationData::new(&h_spec, no_guests(), AllocationStrategy::Polite).unwrap_err();
        assert_eq!(err, AllocationError::MissingTopology);
    }

    #[test]
    fn test_capacity_boundary() {
        let h_spec = hypervisor(vec![vec![0, 1, 2], vec![3, 4, 5]], 1);

        let exact = [guest(1, 4, AllocationStrategy::Greedy)];
        let data = AllocationData::new(&h_spec, &exact, AllocationStrategy::Greedy).unwrap();
        assert!(data.check().is_ok());

        let over = [guest(1, 5, AllocationStrategy::Greedy)];
        let data = AllocationData::new(&h_spec, &over, AllocationStrategy::Greedy).unwrap();
        assert_eq!(
            data.check(),
            Err(AllocationError::InsufficientCapacity {
                strategy: AllocationStrategy::Greedy,
                requested: 5,
                available: 4,
            })
        );
    }

    #[test]
    fn test_oversized_requests_fail_capacity_check() {
        let h_spec = hypervisor(vec![vec![0, 1, 2], vec![3, 4, 5]], 1);
        let guests = [
            guest(1, usize::MAX, AllocationStrategy::Greedy),
            guest(1, 2, AllocationStrategy::Greedy),
        ];
        let data = AllocationData::new(&h_spec, &guests, AllocationStrategy::Greedy).unwrap();
        assert_eq!(data.requested_count(), usize::MAX);
        assert_eq!(
            data.check(),
            Err(AllocationError::InsufficientCapacity {
                strategy: AllocationStrategy::Greedy,
                requested: usize::MAX,
                available: 4,
            })
        );
    }
}
