//! Kernel/libvirt cpulist notation, e.g. `1-63,65-127`.

use anyhow::{bail, Context, Result};

use crate::spec::CoreId;

/// Upper bound on how many ids a single cpulist may expand to.
pub const MAX_CPULIST_IDS: usize = 1 << 16;

/// Formats ids as a cpulist, collapsing ascending runs into ranges. Order is
/// preserved, so an unsorted list produces one group per run.
pub fn format_cpulist(cores: &[CoreId]) -> String {
    let mut groups: Vec<String> = Vec::new();
    let mut iter = cores.iter().copied().peekable();

    while let Some(start) = iter.next() {
        let mut end = start;
        while let Some(&next) = iter.peek() {
            if end.checked_add(1) != Some(next) {
                break;
            }
            end = next;
            iter.next();
        }
        if start == end {
            groups.push(start.to_string());
        } else {
            groups.push(format!("{}-{}", start, end));
        }
    }

    groups.join(",")
}

pub fn parse_cpulist(cpulist: &str) -> Result<Vec<CoreId>> {
    let cpulist = cpulist.trim_end_matches('\0').trim();
    if cpulist.is_empty() {
        return Ok(Vec::new());
    }

    let mut core_ids = vec![];
    for group in cpulist.split(',') {
        let group = group.trim();
        let (min, max) = match group.split_once('-') {
            Some((min, max)) => (parse_id(min, group)?, parse_id(max, group)?),
            None => {
                let id = parse_id(group, group)?;
                (id, id)
            }
        };
        if min > max {
            bail!("Failed to parse cpulist {}: range is descending", group);
        }
        let span = u64::from(max - min) + 1;
        if span > (MAX_CPULIST_IDS - core_ids.len()) as u64 {
            bail!(
                "Failed to parse cpulist {}: more than {} cpu ids",
                group,
                MAX_CPULIST_IDS
            );
        }
        core_ids.extend(min..=max);
    }

    Ok(core_ids)
}

fn parse_id(value: &str, group: &str) -> Result<CoreId> {
    value
        .trim()
        .parse()
        .with_context(|| format!("Failed to parse cpulist {}", group))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_collapses_runs() {
        let cores: Vec<CoreId> = (1..64).chain(65..128).collect();
        assert_eq!(format_cpulist(&cores), "1-63,65-127");
        assert_eq!(format_cpulist(&[4, 2, 3, 9]), "4,2-3,9");
        assert_eq!(format_cpulist(&[]), "");
    }

    #[test]
    fn test_parse_ranges_and_singles() {
        assert_eq!(parse_cpulist("0-2,5,7-8\n").unwrap(), vec![0, 1, 2, 5, 7, 8]);
        assert_eq!(parse_cpulist("").unwrap(), Vec::<CoreId>::new());
        assert!(parse_cpulist("3-1").is_err());
        assert!(parse_cpulist("a-b").is_err());
    }

    #[test]
    fn test_parse_rejects_oversized_lists() {
        assert!(parse_cpulist("0-4294967295").is_err());
        assert!(parse_cpulist("0-40000,50000-90000").is_err());

        let max = (MAX_CPULIST_IDS - 1) as CoreId;
        assert_eq!(
            parse_cpulist(&format!("0-{}", max)).unwrap().len(),
            MAX_CPULIST_IDS
        );
    }
}
