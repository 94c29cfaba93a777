pub mod allocation;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod errors;
pub mod spec;
pub mod utils;

// Re-exports
pub use allocation::{assign_cpus, Allocator, CoreAllocation};
pub use catalog::{Catalog, HostSpecEntry};
pub use errors::{AllocationError, HostSpecError, HostSpecResult};
pub use spec::{AllocationStrategy, HypervisorSpec, VirtualSpec};
