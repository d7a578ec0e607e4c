//! In-place layer-2 rewrite on accept.

use crate::config::BROADCAST_MAC;

/// Rewrites `frame[0..12)` in place: destination becomes the broadcast
/// address, source becomes the frame's original destination MAC.
///
/// Only these 12 bytes are touched; everything else in the captured
/// buffer is forwarded unchanged.
pub fn rewrite_to_broadcast(frame: &mut [u8]) {
    debug_assert!(frame.len() >= 12, "frame too short to rewrite");
    let mut original_dst = [0u8; 6];
    original_dst.copy_from_slice(&frame[0..6]);
    frame[0..6].copy_from_slice(&BROADCAST_MAC);
    frame[6..12].copy_from_slice(&original_dst);
}
