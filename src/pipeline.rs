//! The single-threaded capture → classify → rate-limit → rewrite → inject
//! loop.
//!
//! `tokio`'s `current_thread` runtime plus `select!` is this daemon's
//! "single-threaded readiness multiplexer": the capture descriptor is
//! wrapped in `AsyncFd` and polled alongside the two termination signals,
//! so exactly one task ever touches the pipeline's state. Grounded on
//! `firezone-firezone/rust/headless-client/src/signals/linux.rs`'s
//! `Terminate` future for the signal side; the capture-drain shape follows
//! this corpus's own capture-loop style (see `capture::mod`).

use std::net::{Ipv4Addr, Ipv6Addr};

use tokio::io::unix::AsyncFd;

use crate::capture::{CaptureHandle, CaptureStats};
use crate::config;
use crate::core::bitmap::{port_allow_list, BitMap};
use crate::core::rate_limiter::HashLimit;
use crate::error::{PipelineError, RejectReason};
use crate::inject::Injector;
use crate::parser::{classify, Classification, L3Family};
use crate::signals::Terminate;
use crate::Config;

/// Owns every piece of mutable pipeline state: the capture handle, the
/// injector, both rate limiters, the optional port allow-list, and the
/// scratch buffer frames are copied into before rewrite (capture memory is
/// read-only, so an accepted frame is copied once on accept).
pub struct PipelineState {
    capture: AsyncFd<CaptureHandle>,
    injector: Option<Injector>,
    source_limiter: HashLimit,
    iface_limiter: HashLimit,
    allow_list: Option<BitMap>,
    scratch: Vec<u8>,
    config: Config,
}

impl PipelineState {
    pub fn new(config: Config) -> Result<Self, PipelineError> {
        let handle = CaptureHandle::open(&config.iface)?;
        let capture = AsyncFd::new(handle).map_err(|_| PipelineError::NoSelectableDescriptor)?;

        let injector = if config.dry_run {
            None
        } else {
            Some(Injector::open(&config.iface)?)
        };

        let source_limiter = HashLimit::alloc(
            config::SOURCE_TABLE_CAPACITY,
            config.src_rate,
            config.src_rate * config::BURST_MULTIPLIER,
        );
        let iface_limiter = HashLimit::alloc_single(
            config.iface_rate,
            config.iface_rate * config::BURST_MULTIPLIER,
        );
        let allow_list = config.ports.as_deref().map(port_allow_list);

        Ok(Self {
            capture,
            injector,
            source_limiter,
            iface_limiter,
            allow_list,
            scratch: Vec::with_capacity(config::SNAP_LEN as usize),
            config,
        })
    }

    /// Drains the capture descriptor and feeds each frame through the
    /// pipeline until SIGINT/SIGTERM arrives, then returns final capture
    /// statistics, logged at shutdown.
    pub async fn run_event_loop(&mut self) -> anyhow::Result<CaptureStats> {
        let mut terminate = Terminate::new()?;

        loop {
            tokio::select! {
                _ = terminate.recv() => {
                    tracing::info!("shutdown signal received");
                    break;
                }
                guard_result = self.capture.readable_mut() => {
                    let mut guard = guard_result?;
                    loop {
                        let frame = match guard.get_inner_mut().next_frame()? {
                            Some(frame) => frame,
                            None => {
                                guard.clear_ready();
                                break;
                            }
                        };
                        self.scratch.clear();
                        self.scratch.extend_from_slice(frame);
                        handle_frame(
                            &mut self.scratch,
                            self.allow_list.as_ref(),
                            &mut self.source_limiter,
                            &mut self.iface_limiter,
                            self.injector.as_ref(),
                            self.config.dry_run,
                            self.config.verbosity,
                        )?;
                    }
                }
                _ = tokio::time::sleep(config::EVENT_LOOP_TIMEOUT) => {
                    tracing::trace!("event loop heartbeat");
                }
            }
        }

        Ok(self.capture.get_mut().stats())
    }
}

/// Runs one captured frame through classify → rate-limit → rewrite →
/// inject, logging exactly one line per frame at the appropriate verbosity
/// (accepted frames log `"<source-ip> transmitting"`; rejects log
/// `"<source-ip> <reason>"` at verbosity >= 2).
fn handle_frame(
    frame: &mut [u8],
    allow_list: Option<&BitMap>,
    source_limiter: &mut HashLimit,
    iface_limiter: &mut HashLimit,
    injector: Option<&Injector>,
    dry_run: bool,
    verbosity: u8,
) -> Result<(), PipelineError> {
    let (source_key, l3_family) = match classify(frame, allow_list) {
        Classification::Accept { source_key, l3_family } => (source_key, l3_family),
        Classification::Reject { reason, l3_offset } => {
            log_reject(frame, l3_offset, verbosity, &reason);
            return Ok(());
        }
    };

    if !source_limiter.touch(&source_key) {
        log_rejection(&source_key, l3_family, frame, verbosity, RejectReason::SourceRateLimit);
        return Ok(());
    }
    if !iface_limiter.touch(config::IFACE_LIMITER_KEY) {
        log_rejection(&source_key, l3_family, frame, verbosity, RejectReason::InterfaceRateLimit);
        return Ok(());
    }

    crate::rewrite::rewrite_to_broadcast(frame);

    match injector {
        Some(injector) if !dry_run => injector.send(frame)?,
        _ => {}
    }

    log_line(
        &format_source(&source_key, l3_family),
        "transmitting",
        frame,
        verbosity,
        1,
    );
    Ok(())
}

/// Logs a reject when the source address could not yet be parsed out of the
/// frame (e.g. the frame is too short or the L3 family is unsupported).
///
/// `l3_offset` is whatever the classifier had resolved by the point of
/// rejection (past Ethernet and any VLAN tag), so the best-effort IPv4 read
/// below lands on the real header instead of a VLAN-blind fixed offset.
fn log_reject(frame: &[u8], l3_offset: usize, verbosity: u8, reason: &RejectReason) {
    // Best-effort source for the log line: an IPv4 source is readable for
    // most early rejects; fall back to the frame's source MAC otherwise.
    let source = if frame.len() >= l3_offset + 20 {
        Ipv4Addr::new(
            frame[l3_offset + 12],
            frame[l3_offset + 13],
            frame[l3_offset + 14],
            frame[l3_offset + 15],
        )
        .to_string()
    } else if frame.len() >= 12 {
        format!(
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            frame[6], frame[7], frame[8], frame[9], frame[10], frame[11]
        )
    } else {
        "unknown".to_string()
    };
    log_line(&source, &reason.to_string(), frame, verbosity, 2);
}

fn log_rejection(
    source_key: &[u8],
    l3_family: L3Family,
    frame: &[u8],
    verbosity: u8,
    reason: RejectReason,
) {
    log_line(
        &format_source(source_key, l3_family),
        &reason.to_string(),
        frame,
        verbosity,
        2,
    );
}

/// Emits one per-packet log line, gated on `--verbose`: silent below
/// `min_verbosity`, the hex dump of the full frame appended
/// (space-separated) only at verbosity >= 3.
fn log_line(source: &str, reason: &str, frame: &[u8], verbosity: u8, min_verbosity: u8) {
    if verbosity < min_verbosity {
        return;
    }
    if verbosity >= 3 && !frame.is_empty() {
        tracing::info!("{source} {reason} {}", hex_dump(frame));
    } else {
        tracing::info!("{source} {reason}");
    }
}

fn format_source(source_key: &[u8], l3_family: L3Family) -> String {
    match l3_family {
        L3Family::V4 => {
            Ipv4Addr::new(source_key[0], source_key[1], source_key[2], source_key[3]).to_string()
        }
        L3Family::V6 => {
            let mut octets = [0u8; 16];
            octets.copy_from_slice(source_key);
            Ipv6Addr::from(octets).to_string()
        }
    }
}

fn hex_dump(frame: &[u8]) -> String {
    frame.iter().map(|b| format!("{b:02x}")).collect::<Vec<_>>().join(" ")
}
