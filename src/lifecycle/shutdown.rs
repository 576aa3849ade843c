//! Shutdown flush.

use crate::stream::registry;

/// Flush both streams of the published registry.
///
/// Best effort: failures are reported on stderr, and calling this before
/// startup (or twice) is harmless. Rotation jobs keep running.
pub fn sync() {
    if let Some(registry) = registry() {
        registry.sync();
    }
}
