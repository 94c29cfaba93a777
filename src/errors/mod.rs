use std::fmt;
use thiserror::Error;

use crate::spec::{AllocationStrategy, CoreId};

#[derive(Error, Debug)]
pub enum HostSpecError {
    #[error("Allocation Error: {0}")]
    AllocationError(#[from] AllocationError),

    #[error("Catalog Error: {0}")]
    CatalogError(#[from] CatalogError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AllocationError {
    #[error("hypervisor spec has no NUMA map, cannot place guests")]
    MissingTopology,

    #[error("insufficient available cores for {strategy} allocation: {requested} > {available}")]
    InsufficientCapacity {
        strategy: AllocationStrategy,
        requested: usize,
        available: usize,
    },

    #[error("insufficient available cores to accommodate placement on NUMA nodes: {}", DisplayShortfalls(.shortfalls))]
    InsufficientNodeCapacity { shortfalls: Vec<NodeShortfall> },

    #[error("NUMA node {node} holds {available} cores, {requested} requested")]
    NodeExhausted {
        node: usize,
        requested: usize,
        available: usize,
    },

    #[error("guest #{index} requests unsupported allocation strategy '{strategy}'")]
    UnsupportedStrategy {
        index: usize,
        strategy: AllocationStrategy,
    },

    #[error("{} cores assigned to both polite and greedy guests", .cores.len())]
    CrossGroupOverlap { cores: Vec<CoreId> },

    #[error("allocation worker failed: {0}")]
    WorkerFailed(String),
}

/// Per-node deficit reported by the polite placement check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeShortfall {
    pub node: usize,
    pub requested: usize,
    pub available: usize,
}

impl NodeShortfall {
    pub fn shortfall(&self) -> usize {
        self.requested.saturating_sub(self.available)
    }
}

impl fmt::Display for NodeShortfall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "node {} ({} requested, {} available, short {})",
            self.node,
            self.requested,
            self.available,
            self.shortfall()
        )
    }
}

struct DisplayShortfalls<'a>(&'a [NodeShortfall]);

impl fmt::Display for DisplayShortfalls<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, shortfall) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", shortfall)?;
        }
        Ok(())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpecError {
    #[error("core id {core} appears on NUMA node {first_node} and again on node {second_node}")]
    DuplicateCoreId {
        core: CoreId,
        first_node: usize,
        second_node: usize,
    },

    #[error("CPU '{name}' declares zero cores")]
    ZeroCores { name: String },
}

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Not found: {name} in {table}")]
    NotFound { table: &'static str, name: String },

    #[error("host spec {name} is a {actual} spec, expected {expected}")]
    WrongRole {
        name: String,
        expected: HostRole,
        actual: HostRole,
    },

    #[error("invalid host spec {name}: {source}")]
    InvalidSpec {
        name: String,
        #[source]
        source: SpecError,
    },

    #[error("failed to read catalog file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse catalog: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize catalog: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostRole {
    Hypervisor,
    Virtual,
}

impl fmt::Display for HostRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostRole::Hypervisor => write!(f, "hypervisor"),
            HostRole::Virtual => write!(f, "virtual"),
        }
    }
}

// Error context for tracking error chain
#[derive(Debug)]
pub struct ErrorContext {
    pub source_location: &'static str,
    pub operation: String,
}

// Result type alias for convenience
pub type HostSpecResult<T> = Result<T, HostSpecError>;

// Helper macro for context addition
#[macro_export]
macro_rules! with_context {
    ($result:expr, $operation:expr) => {
        $result.map_err(|e| {
            let context = $crate::errors::ErrorContext {
                source_location: std::file!(),
                operation: $operation.to_string(),
            };
            tracing::error!(
                error = %e,
                context = ?context,
                "Operation failed"
            );
            e
        })
    };
}
