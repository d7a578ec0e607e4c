//! Centralized runtime constants and the validated daemon configuration.
//!
//! All tunable constants are collected here so they can be found and
//! adjusted in a single place rather than scattered across modules.

/// Capture snap length (bytes).
pub const SNAP_LEN: i32 = 2048;

/// BPF filter applied at the capture handle. Matches ICMP
/// Fragmentation-Needed and ICMPv6 Packet-Too-Big, excluding frames already
/// addressed to the broadcast MAC so the daemon never re-captures its own
/// injected traffic.
pub const BPF_FILTER_TEMPLATE: &str = "((icmp and icmp[0] == 3 and icmp[1] == 4) \
or (icmp6 and ip6[40+0] == 2 and ip6[40+1] == 0)) \
and (ether dst not ff:ff:ff:ff:ff:ff)";

/// Default per-source token-bucket rate (packets/sec).
pub const DEFAULT_SRC_RATE: f64 = 1.0;

/// Default aggregate per-interface token-bucket rate (packets/sec).
pub const DEFAULT_IFACE_RATE: f64 = 10.0;

/// Burst multiplier applied to a configured rate to get a bucket's capacity.
pub const BURST_MULTIPLIER: f64 = 1.9;

/// Number of buckets in the per-source `HashLimit` table.
pub const SOURCE_TABLE_CAPACITY: usize = 4096;

/// Coarse multiplexer wait timeout.
pub const EVENT_LOOP_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(24 * 60 * 60);

/// Broadcast Ethernet address used both to detect feedback loops and to
/// rewrite the destination of an accepted frame.
pub const BROADCAST_MAC: [u8; 6] = [0xff, 0xff, 0xff, 0xff, 0xff, 0xff];

/// The single key used to address the interface-wide `HashLimit` bucket.
pub const IFACE_LIMITER_KEY: &[u8] = b"iface";

/// Validated, immutable runtime configuration built from [`crate::cli::Cli`].
#[derive(Debug, Clone)]
pub struct Config {
    pub iface: String,
    pub src_rate: f64,
    pub iface_rate: f64,
    pub verbosity: u8,
    pub dry_run: bool,
    pub cpu: Option<usize>,
    pub ports: Option<Vec<u16>>,
}
