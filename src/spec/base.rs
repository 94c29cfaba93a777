use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::errors::SpecError;

/// Physical core id as listed in a host's NUMA map.
pub type CoreId = u32;

/// A CPU part as sold by the vendor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cpu {
    pub name: String,
    pub cores: usize,
}

impl Cpu {
    pub fn new(name: impl Into<String>, cores: usize) -> Self {
        Self {
            name: name.into(),
            cores,
        }
    }
}

/// A pool of identical CPUs, optionally with its NUMA layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpusSpec {
    pub cpu: Cpu,
    pub cpu_count: usize,
    pub threading_enabled: bool,
    /// `numa_map[n]` lists the core ids of node `n`. `None` when unknown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numa_map: Option<Vec<Vec<CoreId>>>,
}

impl CpusSpec {
    pub fn new(cpu: Cpu, cpu_count: usize, threading_enabled: bool) -> Self {
        Self {
            cpu,
            cpu_count,
            threading_enabled,
            numa_map: None,
        }
    }

    pub fn with_numa_map(mut self, numa_map: Vec<Vec<CoreId>>) -> Self {
        self.numa_map = Some(numa_map);
        self
    }

    pub fn numa_nodes_count(&self) -> Option<usize> {
        self.numa_map.as_ref().map(Vec::len)
    }

    /// Checks that the CPU has cores and that no core id is listed twice.
    pub fn validate(&self) -> Result<(), SpecError> {
        if self.cpu.cores == 0 {
            return Err(SpecError::ZeroCores {
                name: self.cpu.name.clone(),
            });
        }

        let Some(numa_map) = &self.numa_map else {
            return Ok(());
        };

        let mut seen: HashMap<CoreId, usize> = HashMap::new();
        for (node, cores) in numa_map.iter().enumerate() {
            for &core in cores {
                if let Some(first_node) = seen.insert(core, node) {
                    return Err(SpecError::DuplicateCoreId {
                        core,
                        first_node,
                        second_node: node,
                    });
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigSpec {
    pub role_name: String,
}

impl ConfigSpec {
    pub fn new(role_name: impl Into<String>) -> Self {
        Self {
            role_name: role_name.into(),
        }
    }
}

/// Top-level spec for a host. `C` is the flavour of CPU pool it carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostSpec<C = CpusSpec> {
    pub config: ConfigSpec,
    pub cpus: C,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instantiate_host_spec() {
        let cpu = Cpu::new("AMD awesome", 128);
        let cpus = CpusSpec::new(cpu, 2, true);
        let host = HostSpec {
            config: ConfigSpec::new("compute"),
            cpus,
        };
        assert_eq!(host.cpus.numa_nodes_count(), None);
        assert!(host.cpus.validate().is_ok());
    }

    #[test]
    fn test_duplicate_core_ids_rejected() {
        let cpus = CpusSpec::new(Cpu::new("AMD1", 4), 1, false)
            .with_numa_map(vec![vec![0, 1], vec![2, 1]]);
        assert_eq!(
            cpus.validate(),
            Err(SpecError::DuplicateCoreId {
                core: 1,
                first_node: 0,
                second_node: 1,
            })
        );
    }

    #[test]
    fn test_zero_core_cpu_rejected() {
        let cpus = CpusSpec::new(Cpu::new("empty", 0), 1, false);
        assert!(matches!(cpus.validate(), Err(SpecError::ZeroCores { .. })));
    }
}
