//! Packet capture via libpcap.
//!
//! Grounded on this corpus's own capture-loop shape (open handle, apply a
//! narrow filter, drain non-blockingly, tolerate transient errors, surface
//! capture statistics at shutdown) — adapted here from a background-thread
//! `recv` loop to a non-blocking descriptor the event loop multiplexes
//! directly.

use std::os::unix::io::{AsRawFd, RawFd};

use crate::config;
use crate::error::PipelineError;

/// Capture statistics surfaced in the shutdown diagnostic.
#[derive(Debug, Default, Clone, Copy)]
pub struct CaptureStats {
    pub received: u32,
    pub dropped_by_library: u32,
    pub dropped_by_interface: u32,
}

/// A non-blocking libpcap capture handle bound to one interface.
pub struct CaptureHandle {
    inner: pcap::Capture<pcap::Active>,
}

impl CaptureHandle {
    /// Opens `iface` in promiscuous, immediate, non-blocking mode at the
    /// configured snap length, and applies the BPF filter.
    pub fn open(iface: &str) -> Result<Self, PipelineError> {
        let inner = pcap::Capture::from_device(iface)
            .map_err(|source| PipelineError::CaptureOpen {
                iface: iface.to_string(),
                source,
            })?
            .promisc(true)
            .immediate_mode(true)
            .snaplen(config::SNAP_LEN)
            .open()
            .map_err(|source| PipelineError::CaptureOpen {
                iface: iface.to_string(),
                source,
            })?;

        let mut inner = inner
            .setnonblock()
            .map_err(|source| PipelineError::CaptureOpen {
                iface: iface.to_string(),
                source,
            })?;

        inner
            .filter(config::BPF_FILTER_TEMPLATE, true)
            .map_err(PipelineError::BpfFilter)?;

        Ok(Self { inner })
    }

    /// Pulls the next full packet, skipping over any partial captures along
    /// the way. `Ok(None)` means the library is out of packets for now
    /// ("would block"/timeout) — not an error, and not the same as "one
    /// packet was discarded"; the caller should keep draining in both
    /// cases, so a discarded partial capture must not be mistaken for
    /// "no more packets available".
    ///
    /// Partial captures (`caplen < len`) are silently discarded.
    pub fn next_frame(&mut self) -> Result<Option<&[u8]>, PipelineError> {
        loop {
            match self.inner.next_packet() {
                Ok(packet) => {
                    if packet.header.caplen != packet.header.len {
                        continue;
                    }
                    return Ok(Some(packet.data));
                }
                Err(pcap::Error::TimeoutExpired) | Err(pcap::Error::NoMorePackets) => {
                    return Ok(None)
                }
                Err(e) => return Err(PipelineError::CaptureRead(e)),
            }
        }
    }

    pub fn stats(&mut self) -> CaptureStats {
        match self.inner.stats() {
            Ok(stat) => CaptureStats {
                received: stat.received,
                dropped_by_library: stat.dropped,
                dropped_by_interface: stat.if_dropped,
            },
            Err(e) => {
                tracing::warn!("failed to read capture statistics: {e}");
                CaptureStats::default()
            }
        }
    }
}

impl AsRawFd for CaptureHandle {
    fn as_raw_fd(&self) -> RawFd {
        self.inner.as_raw_fd()
    }
}
