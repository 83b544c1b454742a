/// duelrank-core: Elo ratings for "which of these two do you prefer?" duels.
///
/// Vote → Elo update → exposure-balanced next pair → versioned JSON document.
/// The rating engine and pair selector do no IO; persistence goes through a
/// pluggable string key/value backend.
///
/// Items are identified by caller-provided `i64` IDs. Everything else about
/// an item (name, image, series) is the caller's business.
///
/// # Quick start
///
/// ```rust
/// use duelrank_core::{MemoryStorage, PersistenceStore, SessionController, SessionOptions};
/// use rand::SeedableRng;
///
/// let store = PersistenceStore::new(MemoryStorage::new());
/// let rng = rand::rngs::StdRng::seed_from_u64(1);
/// let mut session =
///     SessionController::start(vec![10, 20, 30], store, rng, SessionOptions::default()).unwrap();
///
/// let (left, right) = session.current_pair().unwrap();
/// session.record_vote(left, right).unwrap();
/// session.flush();
///
/// for (rank, r) in session.leaderboard().iter().enumerate() {
///     println!("{}. item {}: {:.1} ({} games)", rank + 1, r.id, r.rating, r.games);
/// }
/// ```

pub mod constants;
pub mod elo;
pub mod engine;
pub mod error;
pub mod pairing;
pub mod session;
pub mod storage;
pub mod types;

// Re-export primary public API at crate root.
pub use engine::RatingEngine;
pub use error::{EngineError, PairingError, SessionError, StorageError};
pub use pairing::{candidate_set, pick_pair};
pub use session::{SaveDebounce, SessionController, SessionOptions};
pub use storage::{
    parse_document, FileStorage, MemoryStorage, PersistedRating, PersistedState, PersistenceStore,
    StorageBackend,
};
pub use types::{AppearanceMap, ItemId, Pair, RatingRecord, Snapshot};
