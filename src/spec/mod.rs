//! Hardware descriptions consumed by the allocator.
//!
//! `base` holds the role-agnostic pieces (a CPU part, a NUMA-aware pool of
//! them, a host), `platform` layers the hypervisor and guest flavours on top.

pub mod base;
pub mod platform;

pub use base::{ConfigSpec, CoreId, Cpu, CpusSpec, HostSpec};
pub use platform::{
    AllocationStrategy, HypervisorCpusSpec, HypervisorSpec, VirtualCpusSpec, VirtualSpec,
};
