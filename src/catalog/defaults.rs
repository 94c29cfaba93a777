//! Built-in presets for the 2023 lab hardware.

use std::collections::BTreeMap;

use super::HostSpecEntry;
use crate::spec::{
    AllocationStrategy, ConfigSpec, CoreId, Cpu, CpusSpec, HostSpec, HypervisorCpusSpec,
    VirtualCpusSpec,
};

fn amd1() -> Cpu {
    Cpu::new("AMD1", 128)
}

pub fn cpus() -> BTreeMap<String, Cpu> {
    BTreeMap::from([("amd1".to_string(), amd1())])
}

fn hypervisor_config() -> ConfigSpec {
    ConfigSpec::new("hypervisor")
}

fn workstation_config() -> ConfigSpec {
    ConfigSpec::new("workstation")
}

fn compute_config() -> ConfigSpec {
    ConfigSpec::new("compute_node")
}

pub fn config_specs() -> BTreeMap<String, ConfigSpec> {
    BTreeMap::from([
        ("hypervisor".to_string(), hypervisor_config()),
        ("virtual_workstation".to_string(), workstation_config()),
        ("virtual_compute".to_string(), compute_config()),
    ])
}

/// Two 64-core NUMA nodes, ids listed ascending.
fn amd1_numa_map() -> Vec<Vec<CoreId>> {
    vec![(0..64).collect(), (64..128).collect()]
}

/// Standalone CPU pool presets, looked up independently of any host.
pub fn cpus_specs() -> BTreeMap<String, CpusSpec> {
    BTreeMap::from([(
        "amd1".to_string(),
        CpusSpec::new(amd1(), 2, true).with_numa_map(amd1_numa_map()),
    )])
}

pub fn host_specs() -> BTreeMap<String, HostSpecEntry> {
    let cpu = amd1();
    let single_core = Cpu::new(cpu.name.clone(), 1);

    BTreeMap::from([
        (
            "sm_2023_1_hypervisor".to_string(),
            HostSpecEntry::Hypervisor(HostSpec {
                config: hypervisor_config(),
                cpus: HypervisorCpusSpec::new(
                    CpusSpec::new(cpu, 2, false).with_numa_map(amd1_numa_map()),
                    1,
                ),
            }),
        ),
        (
            "g_2023_1".to_string(),
            HostSpecEntry::Virtual(HostSpec {
                config: workstation_config(),
                cpus: VirtualCpusSpec::new(
                    CpusSpec::new(single_core.clone(), 20, false),
                    AllocationStrategy::Polite,
                ),
            }),
        ),
        (
            "c_2023_1".to_string(),
            HostSpecEntry::Virtual(HostSpec {
                config: compute_config(),
                cpus: VirtualCpusSpec::new(
                    CpusSpec::new(single_core, 126, false),
                    AllocationStrategy::Greedy,
                ),
            }),
        ),
    ])
}
