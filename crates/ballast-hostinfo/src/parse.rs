//! Pure parsers for kernel counter files and `df` output.
//!
//! Everything here works on `&str` so the parsers are exercised in
//! tests without touching `/proc`.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use ballast_common::units::kib_to_bytes;
use ballast_common::MemoryStat;

use crate::error::{HostInfoError, Result};
use crate::types::{CpuSample, DiskUsage, MemoryStats};

/// Parses `/proc/meminfo` content.
///
/// # Errors
///
/// Returns [`HostInfoError::Parse`] when one of `MemTotal`,
/// `MemAvailable`, `SwapTotal` or `SwapFree` is absent.
pub fn parse_meminfo(input: &str) -> Result<MemoryStats> {
    let mut values: HashMap<&str, u64> = HashMap::new();

    for line in input.lines() {
        let Some((label, rest)) = line.split_once(':') else {
            continue;
        };
        // "MemTotal:       32795284 kB" — the unit suffix is dropped.
        let Some(number) = rest.split_whitespace().next() else {
            continue;
        };
        if let Ok(kib) = number.parse::<u64>() {
            values.insert(label.trim(), kib_to_bytes(kib));
        }
    }

    let get = |label: &str| {
        values.get(label).copied().ok_or_else(|| {
            HostInfoError::Parse(format!("meminfo: missing {label}"))
        })
    };

    Ok(MemoryStats {
        ram: MemoryStat::new(get("MemTotal")?, get("MemAvailable")?),
        swap: MemoryStat::new(get("SwapTotal")?, get("SwapFree")?),
    })
}

/// Parses the aggregate `cpu ` line of `/proc/stat`.
///
/// Idle clocks are idle + iowait; total adds user, nice, system, irq,
/// softirq and steal on top. The guest fields are already contained in
/// user/nice and are not counted again.
///
/// # Errors
///
/// Returns [`HostInfoError::Parse`] when the line is absent or carries
/// fewer than ten fields.
pub fn parse_cpu_sample(input: &str) -> Result<CpuSample> {
    let line = input
        .lines()
        .find(|l| l.starts_with("cpu "))
        .ok_or_else(|| HostInfoError::Parse("stat: no aggregate cpu line".into()))?;

    let fields: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .map_while(|f| f.parse().ok())
        .collect();
    if fields.len() < 10 {
        return Err(HostInfoError::Parse(format!(
            "stat: expected 10 cpu fields, got {}",
            fields.len()
        )));
    }

    let [user, nice, system, idle, iowait, irq, softirq, steal, ..] = fields[..]
    else {
        unreachable!("length checked above");
    };

    let idle_clocks = idle + iowait;
    Ok(CpuSample {
        total_clocks: idle_clocks + user + nice + system + irq + softirq + steal,
        idle_clocks,
    })
}

/// Percent of non-idle time between two samples, rounded to two
/// decimals; 0 when the interval is empty or time went backwards.
#[must_use]
pub fn cpu_percent(prev: CpuSample, next: CpuSample) -> f64 {
    let total = next.total_clocks.saturating_sub(prev.total_clocks);
    if total == 0 {
        return 0.0;
    }
    let idle = next.idle_clocks.saturating_sub(prev.idle_clocks);
    let percent = 100.0 * (1.0 - idle as f64 / total as f64);
    (percent * 100.0).round() / 100.0
}

/// Union of CPU flags across all cores in `/proc/cpuinfo`.
#[must_use]
pub fn parse_cpu_flags(input: &str) -> HashSet<String> {
    let mut flags = HashSet::new();

    for line in input.lines() {
        let Some((label, rest)) = line.split_once(':') else {
            continue;
        };
        if label.trim() == "flags" {
            flags.extend(rest.split_whitespace().map(str::to_string));
        }
    }

    flags
}

/// Pairs `df -P -k` output rows with the operands they were produced
/// for, merging rows that resolve to the same device.
///
/// POSIX `df` prints exactly one row per operand after the header, so
/// row *i* belongs to path *i*.
///
/// # Errors
///
/// Returns [`HostInfoError::Parse`] when the row count does not match
/// the operand count or a row is malformed.
pub fn parse_df(
    input: &str,
    qcow2: &[(PathBuf, u64)],
) -> Result<HashMap<String, DiskUsage>> {
    let rows: Vec<&str> = input.lines().skip(1).collect();
    if rows.len() != qcow2.len() {
        return Err(HostInfoError::Parse(format!(
            "df: {} rows for {} operands",
            rows.len(),
            qcow2.len()
        )));
    }

    let mut devices: HashMap<String, DiskUsage> = HashMap::new();

    for (row, (path, physical)) in rows.iter().zip(qcow2) {
        let fields: Vec<&str> = row.split_whitespace().collect();
        // Filesystem 1024-blocks Used Available Capacity Mounted-on
        if fields.len() < 6 {
            return Err(HostInfoError::Parse(format!("df: short row `{row}`")));
        }
        let device = fields[0].to_string();
        let blocks: u64 = fields[1]
            .parse()
            .map_err(|_| HostInfoError::Parse(format!("df: bad blocks in `{row}`")))?;
        let available: u64 = fields[3]
            .parse()
            .map_err(|_| HostInfoError::Parse(format!("df: bad available in `{row}`")))?;

        let entry = devices.entry(device).or_insert_with(|| DiskUsage {
            usage: MemoryStat::new(kib_to_bytes(blocks), kib_to_bytes(available)),
            ..DiskUsage::default()
        });
        entry.vm_bytes += physical;
        entry.qcow2_paths.push(path.clone());
    }

    Ok(devices)
}
