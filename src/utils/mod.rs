pub mod cpulist;

pub use cpulist::{format_cpulist, parse_cpulist};
