//! Error taxonomy: fatal startup, fatal runtime, and per-packet reject reasons.
//!
//! `ConfigError` and `PipelineError` are the only types that ever escape a
//! component as an `Err`; both convert into `anyhow::Error` at the `main`
//! boundary. `RejectReason` is deliberately not an error type: no
//! per-packet failure is ever propagated above the packet handler, so it
//! is a plain enum consumed only by the logger.

/// Fatal configuration/startup failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("--iface is required")]
    MissingIface,

    #[error("--src-rate must be a positive number, got {0}")]
    InvalidSrcRate(f64),

    #[error("--iface-rate must be a positive number, got {0}")]
    InvalidIfaceRate(f64),

    #[error("--ports entry {0:?} is not a valid port number (expected 0..=65535)")]
    InvalidPort(String),
}

/// Fatal runtime failures.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("failed to open capture handle on {iface}: {source}")]
    CaptureOpen {
        iface: String,
        #[source]
        source: pcap::Error,
    },

    #[error("failed to compile or apply BPF filter: {0}")]
    BpfFilter(pcap::Error),

    #[error("capture handle has no selectable descriptor")]
    NoSelectableDescriptor,

    #[error("failed to open raw injection socket on {iface}: {source}")]
    InjectorOpen {
        iface: String,
        #[source]
        source: std::io::Error,
    },

    #[error("fatal send error: {0}")]
    SendFailed(std::io::Error),

    #[error("fatal capture error: {0}")]
    CaptureRead(pcap::Error),
}

/// Enumerated per-packet reject reasons.
///
/// `Display` renders exactly the reject strings used in the per-packet
/// log line, built as `format!("{src} {reason}")`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    FrameTooShort,
    AlreadyBroadcast,
    UnsupportedL3,
    Ipv4HeaderInvalidLength,
    Ipv4ProtocolNotIcmp,
    Ipv6NextHeaderNotIcmpv6,
    PayloadTooShort,
    InvalidInnerIpVersion,
    InnerL4TooShort,
    PortNotAllowed,
    SourceRateLimit,
    InterfaceRateLimit,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RejectReason::FrameTooShort => "frame too short",
            RejectReason::AlreadyBroadcast => "already broadcast",
            RejectReason::UnsupportedL3 => "unsupported L3",
            RejectReason::Ipv4HeaderInvalidLength => "IPv4 header invalid length",
            RejectReason::Ipv4ProtocolNotIcmp => "IPv4 protocol not ICMP",
            RejectReason::Ipv6NextHeaderNotIcmpv6 => "IPv6 next header not ICMPv6",
            RejectReason::PayloadTooShort => "payload too short",
            RejectReason::InvalidInnerIpVersion => "invalid inner IP version",
            RejectReason::InnerL4TooShort => "inner L4 too short",
            RejectReason::PortNotAllowed => "L4 source port not on allow-list",
            RejectReason::SourceRateLimit => "source rate limit",
            RejectReason::InterfaceRateLimit => "interface rate limit",
        };
        f.write_str(s)
    }
}
