//! Parsers for the textual output of `virsh`.
//!
//! `domstats --raw` prints one block per domain:
//!
//! ```text
//! Domain: 'debian12'
//!   state.state=1
//!   vcpu.maximum=4
//!   cpu.time=24977111376
//!   balloon.current=2097152
//!   ...
//! ```
//!
//! Key/value pairs that do not parse are skipped; a running domain with
//! a required field missing fails the whole call, since acting on a
//! partial record would feed garbage into the sampling cache.

use std::collections::HashMap;
use std::path::PathBuf;

use ballast_common::units::kib_to_bytes;

use crate::error::{Result, VirshError};
use crate::types::{
    DiskStat, DomainData, DomainInfo, DomainState, GuestMemStat, HostCpuInfo,
    MemStat,
};

const NS_PER_MS: u64 = 1_000_000;

/// Parses `virsh domstats --raw` output into per-domain records.
///
/// `sampled_at_ms` is the host wall-clock time the statistics were
/// captured, stamped onto every record for CPU-delta computation.
///
/// # Errors
///
/// Returns [`VirshError::Parse`] when a running domain is missing a
/// required field.
pub fn parse_domstats(
    input: &str,
    sampled_at_ms: u64,
) -> Result<HashMap<String, DomainData>> {
    let mut domains = HashMap::new();

    for block in split_blocks(input) {
        let data = build_domain(&block, sampled_at_ms)?;
        domains.insert(block.name, data);
    }

    Ok(domains)
}

/// Parses `virsh nodeinfo` output.
///
/// # Errors
///
/// Returns [`VirshError::Parse`] when a topology line is missing.
pub fn parse_nodeinfo(input: &str) -> Result<HostCpuInfo> {
    let mut model = None;
    let mut sockets = None;
    let mut cores = None;
    let mut threads = None;

    for line in input.lines() {
        let Some((label, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match label.trim() {
            "CPU model" => model = Some(value.to_string()),
            "CPU socket(s)" => sockets = value.parse().ok(),
            "Core(s) per socket" => cores = value.parse().ok(),
            "Thread(s) per core" => threads = value.parse().ok(),
            _ => {}
        }
    }

    let missing = |what: &str| VirshError::Parse(format!("nodeinfo: missing {what}"));
    Ok(HostCpuInfo {
        model: model.ok_or_else(|| missing("CPU model"))?,
        sockets: sockets.ok_or_else(|| missing("CPU socket(s)"))?,
        cores_per_socket: cores.ok_or_else(|| missing("Core(s) per socket"))?,
        threads_per_core: threads.ok_or_else(|| missing("Thread(s) per core"))?,
    })
}

/// One raw `Domain:` block: the domain name and its key/value pairs.
struct Block {
    name: String,
    fields: HashMap<String, String>,
}

impl Block {
    fn u64(&self, key: &str) -> Option<u64> {
        self.fields.get(key).and_then(|v| v.parse().ok())
    }

    fn kib(&self, key: &str) -> Option<u64> {
        self.u64(key).map(kib_to_bytes)
    }

    fn require(&self, key: &str) -> Result<u64> {
        self.u64(key).ok_or_else(|| {
            VirshError::Parse(format!(
                "domain '{}': missing or malformed {key}",
                self.name
            ))
        })
    }

    fn require_kib(&self, key: &str) -> Result<u64> {
        self.require(key).map(kib_to_bytes)
    }
}

fn split_blocks(input: &str) -> Vec<Block> {
    let mut blocks: Vec<Block> = Vec::new();

    for line in input.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("Domain:") {
            let name = rest.trim().trim_matches('\'').to_string();
            blocks.push(Block {
                name,
                fields: HashMap::new(),
            });
            continue;
        }
        let Some(current) = blocks.last_mut() else {
            continue;
        };
        // Anything that is not a key=value pair is skipped.
        if let Some((key, value)) = line.split_once('=') {
            current
                .fields
                .insert(key.trim().to_string(), value.trim().to_string());
        }
    }

    blocks
}

fn build_domain(block: &Block, sampled_at_ms: u64) -> Result<DomainData> {
    let state_code = block.require("state.state")?;
    let state = DomainState::from_code(state_code);

    if state == DomainState::Running {
        build_running(block, state, sampled_at_ms)
    } else {
        // Libvirt reports little more than the state once a domain is
        // down; take whatever is present.
        Ok(DomainData {
            info: DomainInfo {
                name: block.name.clone(),
                cpus: block.u64("vcpu.maximum").unwrap_or(0),
                max_memory: block.kib("balloon.maximum").unwrap_or(0),
            },
            state,
            sampled_at_ms,
            cpu_time_ms: block.u64("cpu.time").unwrap_or(0) / NS_PER_MS,
            mem_stat: None,
            disks: parse_disks(block),
        })
    }
}

fn build_running(
    block: &Block,
    state: DomainState,
    sampled_at_ms: u64,
) -> Result<DomainData> {
    let info = DomainInfo {
        name: block.name.clone(),
        cpus: block.require("vcpu.maximum")?,
        max_memory: block.require_kib("balloon.maximum")?,
    };
    let actual = block.require_kib("balloon.current")?;
    let cpu_time_ms = block.require("cpu.time")? / NS_PER_MS;

    // Balloon statistics count as present only when both the RSS and the
    // refresh timestamp arrived; one without the other is useless for
    // staleness tracking.
    let mem_stat = match (block.kib("balloon.rss"), block.u64("balloon.last-update")) {
        (Some(rss), Some(last_updated_sec)) => Some(MemStat {
            actual,
            rss,
            last_updated_sec,
            guest: parse_guest(block),
        }),
        _ => None,
    };

    Ok(DomainData {
        info,
        state,
        sampled_at_ms,
        cpu_time_ms,
        mem_stat,
        disks: parse_disks(block),
    })
}

fn parse_guest(block: &Block) -> Option<GuestMemStat> {
    Some(GuestMemStat {
        unused: block.kib("balloon.unused")?,
        available: block.kib("balloon.available")?,
        usable: block.kib("balloon.usable")?,
        disk_caches: block.kib("balloon.disk_caches")?,
    })
}

fn parse_disks(block: &Block) -> Vec<DiskStat> {
    let count = block.u64("block.count").unwrap_or(0);
    let mut disks = Vec::new();

    for i in 0..count {
        let name = match block.fields.get(&format!("block.{i}.name")) {
            Some(name) => name.clone(),
            None => continue,
        };
        // Block stats are reported in raw bytes, unlike balloon figures.
        let (Some(allocation), Some(capacity), Some(physical)) = (
            block.u64(&format!("block.{i}.allocation")),
            block.u64(&format!("block.{i}.capacity")),
            block.u64(&format!("block.{i}.physical")),
        ) else {
            continue;
        };
        disks.push(DiskStat {
            name,
            allocation,
            capacity,
            physical,
            path: block
                .fields
                .get(&format!("block.{i}.path"))
                .map(PathBuf::from),
        });
    }

    disks
}

#[cfg(test)]
mod tests {
    use super::*;
    use ballast_common::units::{GIB, KIB};

    const SAMPLE: &str = "\
Domain: 'debian12'
  state.state=1
  vcpu.maximum=4
  cpu.time=24977111376
  balloon.current=2097152
  balloon.maximum=16777216
  balloon.rss=2292968
  balloon.last-update=1690000100
  balloon.unused=524288
  balloon.available=2097152
  balloon.usable=1048576
  balloon.disk_caches=262144
  block.count=2
  block.0.name=vda
  block.0.allocation=21474836480
  block.0.capacity=21474836480
  block.0.physical=26843545600
  block.0.path=/var/lib/libvirt/images/debian12.qcow2
  block.1.name=vdb
  block.1.allocation=1073741824
  block.1.capacity=2147483648
  block.1.physical=536870912

Domain: 'win11'
  state.state=5
  block.count=0
";

    #[test]
    fn test_parse_sample_round_trip() {
        let domains = parse_domstats(SAMPLE, 1000).unwrap();
        assert_eq!(domains.len(), 2);

        let vm = &domains["debian12"];
        assert_eq!(vm.state, DomainState::Running);
        assert_eq!(vm.info.cpus, 4);
        assert_eq!(vm.info.max_memory, 16 * GIB);
        assert_eq!(vm.sampled_at_ms, 1000);
        assert_eq!(vm.cpu_time_ms, 24_977);

        let mem = vm.mem_stat.unwrap();
        assert_eq!(mem.actual, 2 * GIB);
        assert_eq!(mem.rss, 2_292_968 * KIB);
        assert_eq!(mem.last_updated_sec, 1_690_000_100);
        let guest = mem.guest.unwrap();
        assert_eq!(guest.available, 2 * GIB);
        assert_eq!(guest.usable, GIB);
    }

    #[test]
    fn test_parse_disks_with_and_without_path() {
        let domains = parse_domstats(SAMPLE, 0).unwrap();
        let disks = &domains["debian12"].disks;
        assert_eq!(disks.len(), 2);

        assert_eq!(disks[0].name, "vda");
        assert_eq!(
            disks[0].path.as_deref(),
            Some(std::path::Path::new(
                "/var/lib/libvirt/images/debian12.qcow2"
            ))
        );
        assert_eq!(disks[0].overhead_percent(), 25);

        assert_eq!(disks[1].name, "vdb");
        assert_eq!(disks[1].path, None);
    }

    #[test]
    fn test_shut_off_domain_has_no_mem_stat() {
        let domains = parse_domstats(SAMPLE, 0).unwrap();
        let vm = &domains["win11"];
        assert_eq!(vm.state, DomainState::ShutOff);
        assert!(vm.mem_stat.is_none());
        assert!(vm.disks.is_empty());
    }

    #[test]
    fn test_running_domain_without_guest_stats() {
        let input = "\
Domain: 'minimal'
  state.state=1
  vcpu.maximum=2
  cpu.time=1000000
  balloon.current=1048576
  balloon.maximum=2097152
  balloon.rss=1100000
  balloon.last-update=42
";
        let domains = parse_domstats(input, 0).unwrap();
        let mem = domains["minimal"].mem_stat.unwrap();
        assert!(mem.guest.is_none());
        assert!(mem.guest_mem().is_none());
    }

    #[test]
    fn test_running_domain_without_rss_has_no_mem_stat() {
        let input = "\
Domain: 'bare'
  state.state=1
  vcpu.maximum=2
  cpu.time=1000000
  balloon.current=1048576
  balloon.maximum=2097152
  balloon.last-update=42
";
        let domains = parse_domstats(input, 0).unwrap();
        assert!(domains["bare"].mem_stat.is_none());
    }

    #[test]
    fn test_missing_required_field_fails() {
        let input = "\
Domain: 'broken'
  state.state=1
  cpu.time=1000000
  balloon.current=1048576
  balloon.maximum=2097152
";
        let err = parse_domstats(input, 0).unwrap_err();
        assert!(err.to_string().contains("vcpu.maximum"));
    }

    #[test]
    fn test_malformed_pairs_are_skipped() {
        let input = "\
Domain: 'noise'
  state.state=1
  vcpu.maximum=2
  cpu.time=1000000
  balloon.current=1048576
  balloon.maximum=2097152
  this line has no equals sign
  block.count=not-a-number
";
        let domains = parse_domstats(input, 0).unwrap();
        assert!(domains["noise"].disks.is_empty());
    }

    #[test]
    fn test_incomplete_disk_entry_is_dropped() {
        let input = "\
Domain: 'vm'
  state.state=5
  block.count=2
  block.0.name=vda
  block.0.allocation=100
  block.0.capacity=100
  block.1.name=vdb
  block.1.allocation=100
  block.1.capacity=100
  block.1.physical=100
";
        let domains = parse_domstats(input, 0).unwrap();
        let disks = &domains["vm"].disks;
        assert_eq!(disks.len(), 1);
        assert_eq!(disks[0].name, "vdb");
    }

    #[test]
    fn test_parse_nodeinfo() {
        let input = "\
CPU model:           x86_64
CPU(s):              8
CPU frequency:       3600 MHz
CPU socket(s):       1
Core(s) per socket:  4
Thread(s) per core:  2
NUMA cell(s):        1
Memory size:         32795284 KiB
";
        let info = parse_nodeinfo(input).unwrap();
        assert_eq!(info.model, "x86_64");
        assert_eq!(info.sockets, 1);
        assert_eq!(info.cores_per_socket, 4);
        assert_eq!(info.threads_per_core, 2);
        assert_eq!(info.cpus(), 8);
    }

    #[test]
    fn test_parse_nodeinfo_missing_line_fails() {
        let err = parse_nodeinfo("CPU model: x86_64\n").unwrap_err();
        assert!(err.to_string().contains("CPU socket(s)"));
    }
}
