//! Connection identifier generation.

use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for one physical connection.
pub type ConnId = String;

/// Generates unique connection ids.
///
/// Format: `C` + 8 chars base36, e.g. `"CAAAAAAAB"`. Ids are never reused
/// within a process, so a stale id can never address a newer connection.
pub struct ConnIdGenerator {
    counter: AtomicU64,
}

impl ConnIdGenerator {
    pub fn new() -> Self {
        Self {
            counter: AtomicU64::new(0),
        }
    }

    /// Generate the next unique id.
    pub fn next(&self) -> ConnId {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("C{}", base36_encode_8(n))
    }
}

impl Default for ConnIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Encode a number as an 8-character base36 string.
fn base36_encode_8(mut n: u64) -> String {
    const CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    let mut result = [b'A'; 8];

    for slot in result.iter_mut().rev() {
        *slot = CHARS[(n % 36) as usize];
        n /= 36;
    }

    String::from_utf8_lossy(&result).into_owned()
}
