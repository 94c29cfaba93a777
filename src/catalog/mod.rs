//! Named host specs.
//!
//! The allocator only ever sees fully built specs. This catalog is where
//! those come from: a handful of built-in presets, optionally extended or
//! overridden by a TOML file.

pub mod defaults;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

use crate::allocation::{Allocator, CoreAllocation};
use crate::errors::{CatalogError, HostRole, HostSpecResult};
use crate::spec::{AllocationStrategy, ConfigSpec, Cpu, CpusSpec, HypervisorSpec, VirtualSpec};

/// A catalog entry, tagged by host role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HostSpecEntry {
    Hypervisor(HypervisorSpec),
    Virtual(VirtualSpec),
}

impl HostSpecEntry {
    pub fn role(&self) -> HostRole {
        match self {
            HostSpecEntry::Hypervisor(_) => HostRole::Hypervisor,
            HostSpecEntry::Virtual(_) => HostRole::Virtual,
        }
    }

    pub fn config(&self) -> &ConfigSpec {
        match self {
            HostSpecEntry::Hypervisor(spec) => &spec.config,
            HostSpecEntry::Virtual(spec) => &spec.config,
        }
    }

    pub fn cpus(&self) -> &CpusSpec {
        match self {
            HostSpecEntry::Hypervisor(spec) => &spec.cpus.base,
            HostSpecEntry::Virtual(spec) => &spec.cpus.base,
        }
    }

    /// `None` for hypervisors.
    pub fn strategy(&self) -> Option<AllocationStrategy> {
        match self {
            HostSpecEntry::Hypervisor(_) => None,
            HostSpecEntry::Virtual(spec) => Some(spec.strategy()),
        }
    }
}

/// On-disk layout of a catalog file. Every table is optional.
#[derive(Debug, Default, Serialize, Deserialize)]
struct CatalogFile {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    cpus: BTreeMap<String, Cpu>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    cpus_specs: BTreeMap<String, CpusSpec>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    configs: BTreeMap<String, ConfigSpec>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    hosts: BTreeMap<String, HostSpecEntry>,
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    cpus: BTreeMap<String, Cpu>,
    cpus_specs: BTreeMap<String, CpusSpec>,
    configs: BTreeMap<String, ConfigSpec>,
    hosts: BTreeMap<String, HostSpecEntry>,
}

impl Catalog {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn builtin() -> Self {
        Self {
            cpus: defaults::cpus(),
            cpus_specs: defaults::cpus_specs(),
            configs: defaults::config_specs(),
            hosts: defaults::host_specs(),
        }
    }

    /// Built-in presets overlaid with the host specs in `path`.
    pub fn builtin_with_file(path: &Path) -> Result<Self, CatalogError> {
        let mut catalog = Self::builtin();
        catalog.load_file(path)?;
        Ok(catalog)
    }

    pub fn load_file(&mut self, path: &Path) -> Result<usize, CatalogError> {
        info!("Loading host specs from {}", path.display());
        let contents = std::fs::read_to_string(path)?;
        self.merge_toml_str(&contents)
    }

    /// Merges every table of a TOML catalog document, replacing entries with
    /// the same name. Returns the number of host specs merged.
    pub fn merge_toml_str(&mut self, contents: &str) -> Result<usize, CatalogError> {
        let file: CatalogFile = toml::from_str(contents)?;
        self.cpus.extend(file.cpus);
        self.configs.extend(file.configs);
        for (name, spec) in file.cpus_specs {
            self.register_cpus_spec(name, spec)?;
        }

        let count = file.hosts.len();
        for (name, entry) in file.hosts {
            self.register(name, entry)?;
        }
        Ok(count)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, CatalogError> {
        let mut catalog = Self::empty();
        catalog.merge_toml_str(contents)?;
        Ok(catalog)
    }

    pub fn to_toml_string(&self) -> Result<String, CatalogError> {
        let file = CatalogFile {
            cpus: self.cpus.clone(),
            cpus_specs: self.cpus_specs.clone(),
            configs: self.configs.clone(),
            hosts: self.hosts.clone(),
        };
        Ok(toml::to_string_pretty(&file)?)
    }

    /// Adds or replaces a host spec after validating its CPU pool.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        entry: HostSpecEntry,
    ) -> Result<(), CatalogError> {
        let name = name.into();
        entry
            .cpus()
            .validate()
            .map_err(|source| CatalogError::InvalidSpec {
                name: name.clone(),
                source,
            })?;
        debug!(name = %name, role = %entry.role(), "registered host spec");
        self.hosts.insert(name, entry);
        Ok(())
    }

    /// Adds or replaces a standalone CPU pool after validating it.
    pub fn register_cpus_spec(
        &mut self,
        name: impl Into<String>,
        spec: CpusSpec,
    ) -> Result<(), CatalogError> {
        let name = name.into();
        spec.validate().map_err(|source| CatalogError::InvalidSpec {
            name: name.clone(),
            source,
        })?;
        self.cpus_specs.insert(name, spec);
        Ok(())
    }

    pub fn get_cpus_spec(&self, name: &str) -> Result<&CpusSpec, CatalogError> {
        self.cpus_specs.get(name).ok_or_else(|| CatalogError::NotFound {
            table: "cpus_specs",
            name: name.to_string(),
        })
    }

    pub fn get_cpu(&self, name: &str) -> Result<&Cpu, CatalogError> {
        self.cpus.get(name).ok_or_else(|| CatalogError::NotFound {
            table: "cpus",
            name: name.to_string(),
        })
    }

    pub fn get_config(&self, name: &str) -> Result<&ConfigSpec, CatalogError> {
        self.configs.get(name).ok_or_else(|| CatalogError::NotFound {
            table: "configs",
            name: name.to_string(),
        })
    }

    pub fn get_host_spec(&self, name: &str) -> Result<&HostSpecEntry, CatalogError> {
        self.hosts.get(name).ok_or_else(|| CatalogError::NotFound {
            table: "hosts",
            name: name.to_string(),
        })
    }

    pub fn hypervisor(&self, name: &str) -> Result<&HypervisorSpec, CatalogError> {
        match self.get_host_spec(name)? {
            HostSpecEntry::Hypervisor(spec) => Ok(spec),
            other => Err(CatalogError::WrongRole {
                name: name.to_string(),
                expected: HostRole::Hypervisor,
                actual: other.role(),
            }),
        }
    }

    pub fn guest(&self, name: &str) -> Result<&VirtualSpec, CatalogError> {
        match self.get_host_spec(name)? {
            HostSpecEntry::Virtual(spec) => Ok(spec),
            other => Err(CatalogError::WrongRole {
                name: name.to_string(),
                expected: HostRole::Virtual,
                actual: other.role(),
            }),
        }
    }

    /// Looks up every name in order, cloning the specs for the allocator.
    pub fn guests<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<VirtualSpec>, CatalogError> {
        names
            .iter()
            .map(|name| self.guest(name.as_ref()).cloned())
            .collect()
    }

    /// Resolves the named specs and pins the guests' cores.
    pub fn assign_cpus<S: AsRef<str>>(
        &self,
        allocator: &Allocator,
        hypervisor: &str,
        guests: &[S],
    ) -> HostSpecResult<Vec<CoreAllocation>> {
        let h_spec = self.hypervisor(hypervisor)?;
        let g_specs = self.guests(guests)?;
        Ok(allocator.assign(h_spec, &g_specs)?)
    }

    pub fn hosts(&self) -> impl Iterator<Item = (&str, &HostSpecEntry)> {
        self.hosts.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.hosts.keys().map(String::as_str)
    }
}
