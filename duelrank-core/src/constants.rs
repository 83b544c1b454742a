/// Rating assigned to an item the first time its id is seen.
pub const INITIAL_RATING: f64 = 1000.0;

/// Default Elo K-factor: the maximum rating swing a single decided duel can cause.
pub const DEFAULT_K_FACTOR: f64 = 24.0;

/// Logistic scale of the Elo curve. A 400-point gap means the stronger item
/// is expected to win 10 times out of 11.
pub const ELO_SCALE: f64 = 400.0;

/// The only persisted schema tag this crate reads or writes.
/// Documents carrying any other value are rejected wholesale.
pub const SCHEMA_VERSION: u32 = 1;

/// Storage key for the persisted document. Must stay stable across sessions.
pub const STORAGE_KEY: &str = "duelrank.v1";

/// Recommended coalescing window for saves after a vote.
///
/// Rapid voting bursts produce one write per window instead of one per vote.
pub const PERSIST_DEBOUNCE_MS: u64 = 120;

/// Upper bound for loading a remote catalog before giving up with an error.
pub const LOAD_TIMEOUT_MS: u64 = 8000;

/// Suggested file name when exporting the persisted document.
pub const EXPORT_FILENAME: &str = "duelrank-export.json";
