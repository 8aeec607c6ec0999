//! Hypervisor adapter for libvirt.
//!
//! Translates between typed records and the `virsh` CLI: parses the
//! block-structured `domstats` output into [`DomainData`] records,
//! reads the host topology from `nodeinfo`, and issues lifecycle and
//! balloon commands. Memory arrives in KiB and CPU time in
//! nanoseconds; everything past this crate is bytes and milliseconds.

mod adapter;
mod error;
mod parse;
mod types;

pub use adapter::{Hypervisor, VirshAdapter, MIN_SET_MEMORY};
pub use error::{Result, VirshError};
pub use parse::{parse_domstats, parse_nodeinfo};
pub use types::{
    DiskStat, DomainData, DomainInfo, DomainState, GuestMemStat, HostCpuInfo,
    MemStat,
};
