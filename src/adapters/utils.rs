//! Shared utilities for adapter-layer validation.
//!
//! Shared by the WiFi adapter and the NVS secrets store.

/// Returns `true` if every byte of `s` is in the printable ASCII range
/// `0x20..=0x7E` (space through tilde, inclusive).
///
/// Used to validate WiFi SSIDs before they are stored or applied.
pub(super) fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}
