//! Watch identifiers.

use core::fmt::{self, Write as _};
use core::sync::atomic::{AtomicU64, Ordering};

use super::ports::WatchIdSource;

/// Longest identifier a [`WatchIdSource`] may produce.
pub const WATCH_ID_CAP: usize = 40;

/// Opaque identifier returned by `watch_motion` and accepted by `clear_watch`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WatchId(heapless::String<WATCH_ID_CAP>);

impl WatchId {
    /// Wrap an externally generated identifier.  `None` if it exceeds
    /// [`WATCH_ID_CAP`] bytes.
    pub fn new(id: &str) -> Option<Self> {
        let mut s = heapless::String::new();
        s.push_str(id).ok()?;
        Some(Self(s))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for WatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Process-wide counter shared by every [`ProcessWatchIds`].
static NEXT_WATCH: AtomicU64 = AtomicU64::new(1);

/// Default id source: `dm-<pid>-<counter>`, unique for the process lifetime
/// even across several runtimes.
#[derive(Debug, Default)]
pub struct ProcessWatchIds;

impl WatchIdSource for ProcessWatchIds {
    fn next_id(&mut self) -> WatchId {
        let n = NEXT_WATCH.fetch_add(1, Ordering::Relaxed);
        let mut s = heapless::String::new();
        // "dm-" + 8 hex + "-" + 16 hex = 28 bytes, always fits.
        let _ = write!(s, "dm-{:08x}-{:016x}", std::process::id(), n);
        WatchId(s)
    }
}
