/// Session controller: catalog + rating engine + pair selector + store.
///
/// One vote runs to completion before the next pair is drawn: rating update,
/// appearance update, save scheduling, then a fresh pair from the post-update
/// counts. Saves are coalesced through a debounce window; call `flush` (or
/// `flush_if_due` from an event loop) to write them out.
use std::time::{Duration, Instant};

use rand::Rng;
use tracing::{debug, info, warn};

use crate::constants::{DEFAULT_K_FACTOR, PERSIST_DEBOUNCE_MS};
use crate::engine::RatingEngine;
use crate::error::{EngineError, SessionError};
use crate::pairing::pick_pair;
use crate::storage::{PersistedState, PersistenceStore, StorageBackend};
use crate::types::{ItemId, Pair, RatingRecord};

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub k_factor: f64,
    /// Zero saves synchronously after every vote.
    pub debounce: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        SessionOptions {
            k_factor: DEFAULT_K_FACTOR,
            debounce: Duration::from_millis(PERSIST_DEBOUNCE_MS),
        }
    }
}

/// Tracks the first unsaved change so bursts of votes share one write.
#[derive(Debug, Clone)]
pub struct SaveDebounce {
    window: Duration,
    pending_since: Option<Instant>,
}

impl SaveDebounce {
    pub fn new(window: Duration) -> Self {
        SaveDebounce { window, pending_since: None }
    }

    pub fn mark(&mut self, now: Instant) {
        self.pending_since.get_or_insert(now);
    }

    pub fn is_pending(&self) -> bool {
        self.pending_since.is_some()
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.pending_since
            .is_some_and(|since| now.saturating_duration_since(since) >= self.window)
    }

    pub fn clear(&mut self) {
        self.pending_since = None;
    }
}

pub struct SessionController<B, R> {
    catalog: Vec<ItemId>,
    engine: RatingEngine,
    store: PersistenceStore<B>,
    rng: R,
    options: SessionOptions,
    current_pair: Option<Pair>,
    debounce: SaveDebounce,
}

impl<B: StorageBackend, R: Rng> SessionController<B, R> {
    /// Load persisted state once, reconcile it against `catalog_ids`, write the
    /// reconciled state back and draw the first pair.
    ///
    /// Fails only when the catalog repeats an id.
    pub fn start(
        catalog_ids: Vec<ItemId>,
        store: PersistenceStore<B>,
        rng: R,
        options: SessionOptions,
    ) -> Result<Self, SessionError> {
        let persisted = store.load();
        let engine = RatingEngine::new(&catalog_ids, persisted.as_ref())?;
        info!(
            items = catalog_ids.len(),
            restored = persisted.is_some(),
            "Session started"
        );

        let debounce = SaveDebounce::new(options.debounce);
        let mut session = SessionController {
            catalog: catalog_ids,
            engine,
            store,
            rng,
            options,
            current_pair: None,
            debounce,
        };
        // Only after hydration, so defaults never overwrite a stored document.
        session.save_now();
        session.refresh_pair();
        Ok(session)
    }

    pub fn catalog(&self) -> &[ItemId] {
        &self.catalog
    }

    pub fn engine(&self) -> &RatingEngine {
        &self.engine
    }

    pub fn store(&self) -> &PersistenceStore<B> {
        &self.store
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// The pair currently on display, if the catalog has at least two items.
    pub fn current_pair(&self) -> Option<Pair> {
        self.current_pair
    }

    pub fn leaderboard(&self) -> Vec<RatingRecord> {
        self.engine.sorted_leaderboard()
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.debounce.is_pending()
    }

    /// Draw a new pair from the current appearance counts.
    pub fn request_new_pair(&mut self) -> Result<Pair, SessionError> {
        match pick_pair(&self.catalog, self.engine.appearances(), &mut self.rng) {
            Ok(pair) => {
                debug!(left = pair.0, right = pair.1, "Drew pair");
                self.current_pair = Some(pair);
                Ok(pair)
            }
            Err(e) => {
                self.current_pair = None;
                Err(e.into())
            }
        }
    }

    /// Skip the current pair. Ratings and appearance counts are untouched.
    pub fn record_skip(&mut self) -> Result<Pair, SessionError> {
        self.request_new_pair()
    }

    /// `winner_id` beat `loser_id`. Returns the next pair.
    pub fn record_vote(&mut self, winner_id: ItemId, loser_id: ItemId) -> Result<Pair, SessionError> {
        let k = self.options.k_factor;
        let result = self.engine.update(winner_id, loser_id, k);
        self.after_decided(result)
    }

    /// `id_a` and `id_b` drew. Returns the next pair.
    pub fn record_draw(&mut self, id_a: ItemId, id_b: ItemId) -> Result<Pair, SessionError> {
        let k = self.options.k_factor;
        let result = self.engine.draw(id_a, id_b, k);
        self.after_decided(result)
    }

    fn after_decided(&mut self, result: Result<(), EngineError>) -> Result<Pair, SessionError> {
        match result {
            Ok(()) => {}
            Err(e @ EngineError::InvalidId(_)) => {
                warn!("Vote referenced an item outside the catalog, re-syncing: {e}");
                self.resync();
                return Err(e.into());
            }
            Err(e) => return Err(e.into()),
        }

        self.schedule_save();
        self.request_new_pair()
    }

    /// Reconcile against the current catalog and redraw the pair.
    pub fn resync(&mut self) {
        // Cannot fail: the catalog was validated when it was installed.
        if let Err(e) = self.engine.initialize(&self.catalog, None) {
            warn!("Re-sync failed: {e}");
        }
        self.refresh_pair();
    }

    /// Switch to a new catalog, keeping state for ids that remain.
    pub fn set_catalog(&mut self, catalog_ids: Vec<ItemId>) -> Result<(), SessionError> {
        self.engine.initialize(&catalog_ids, None)?;
        self.catalog = catalog_ids;
        self.schedule_save();
        self.refresh_pair();
        Ok(())
    }

    /// Delete the stored document and start over from defaults.
    pub fn reset(&mut self) -> Result<(), SessionError> {
        self.store.reset();
        self.debounce.clear();
        self.engine.initialize(&self.catalog, Some(&PersistedState::empty()))?;
        info!("Session reset");
        self.refresh_pair();
        Ok(())
    }

    /// Replace stored state with `text`, then reload from it.
    ///
    /// Returns `false` and changes nothing when the document is rejected.
    pub fn import_text(&mut self, text: &str) -> bool {
        let Some(persisted) = self.store.import_document(text) else {
            return false;
        };

        if let Err(e) = self.engine.initialize(&self.catalog, Some(&persisted)) {
            warn!("Failed to apply imported state: {e}");
        }
        self.debounce.clear();
        self.save_now();
        info!(ratings = persisted.ratings.len(), "Imported state");
        self.refresh_pair();
        true
    }

    /// The persisted document text, including any not-yet-flushed changes.
    pub fn export_text(&mut self) -> String {
        self.flush();
        self.store.export_text()
    }

    /// Write pending changes now.
    pub fn flush(&mut self) {
        if self.debounce.is_pending() {
            self.save_now();
        }
    }

    /// Write pending changes if the debounce window has passed. Returns whether it wrote.
    pub fn flush_if_due(&mut self, now: Instant) -> bool {
        if self.debounce.is_due(now) {
            self.save_now();
            true
        } else {
            false
        }
    }

    fn schedule_save(&mut self) {
        self.debounce.mark(Instant::now());
        if self.options.debounce.is_zero() {
            self.flush();
        }
    }

    fn save_now(&mut self) {
        self.store.save(&self.engine.to_persisted());
        self.debounce.clear();
    }

    fn refresh_pair(&mut self) {
        if let Err(e) = self.request_new_pair() {
            debug!("No pair available: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::STORAGE_KEY;
    use crate::error::{PairingError, StorageError};
    use crate::storage::{parse_document, MemoryStorage, PersistedRating};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    type TestSession = SessionController<MemoryStorage, StdRng>;

    fn options(debounce_ms: u64) -> SessionOptions {
        SessionOptions { k_factor: 24.0, debounce: Duration::from_millis(debounce_ms) }
    }

    fn start_with(catalog: &[ItemId], store: PersistenceStore<MemoryStorage>, debounce_ms: u64) -> TestSession {
        SessionController::start(catalog.to_vec(), store, StdRng::seed_from_u64(5), options(debounce_ms)).unwrap()
    }

    fn start(catalog: &[ItemId]) -> TestSession {
        start_with(catalog, PersistenceStore::new(MemoryStorage::new()), 0)
    }

    #[test]
    fn test_start_restores_and_prunes_stored_state() {
        let mut store = PersistenceStore::new(MemoryStorage::new());
        let mut saved = PersistedState::empty();
        saved.ratings.insert(1, PersistedRating { rating: 1111.0, games: 3 });
        saved.ratings.insert(404, PersistedRating { rating: 900.0, games: 1 });
        saved.appear.insert(404, 1);
        store.save(&saved);

        let session = start_with(&[1, 2, 3], store, 120);
        assert_eq!(session.engine().record(1).unwrap().rating, 1111.0);

        // Reconciled state is written straight away
        let stored = session.store().load().unwrap();
        assert!(!stored.ratings.contains_key(&404));
        assert_eq!(stored.ratings.len(), 3);
        assert!(!session.has_unsaved_changes());
    }

    #[test]
    fn test_start_rejects_duplicate_catalog() {
        let result = SessionController::start(
            vec![1, 1],
            PersistenceStore::new(MemoryStorage::new()),
            StdRng::seed_from_u64(0),
            SessionOptions::default(),
        );
        assert!(matches!(result, Err(SessionError::Engine(EngineError::DuplicateId(1)))));
    }

    #[test]
    fn test_start_draws_a_pair() {
        let session = start(&[1, 2, 3, 4]);
        let (a, b) = session.current_pair().unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_single_item_catalog_has_no_pair() {
        let mut session = start(&[1]);
        assert_eq!(session.current_pair(), None);
        assert_eq!(
            session.request_new_pair(),
            Err(SessionError::Pairing(PairingError::InsufficientPool { available: 1 }))
        );
    }

    #[test]
    fn test_vote_updates_and_saves() {
        let mut session = start(&[1, 2]);
        let next = session.record_vote(2, 1).unwrap();
        assert_eq!(session.current_pair(), Some(next));

        let stored = session.store().load().unwrap();
        assert!((stored.ratings[&2].rating - 1012.0).abs() < 1e-9);
        assert!((stored.ratings[&1].rating - 988.0).abs() < 1e-9);
        assert_eq!(stored.ratings[&1].games, 1);
        assert_eq!(stored.appear[&2], 1);
    }

    #[test]
    fn test_next_pair_sees_post_vote_counts() {
        let mut session = start(&[1, 2, 3, 4]);
        let (a, b) = session.record_vote(3, 4).unwrap();
        // 1 and 2 are the only items still at zero appearances
        let mut drawn = [a, b];
        drawn.sort();
        assert_eq!(drawn, [1, 2]);
    }

    #[test]
    fn test_skip_changes_nothing() {
        let mut session = start(&[1, 2, 3]);
        let before = session.engine().to_persisted();
        session.record_skip().unwrap();
        session.record_skip().unwrap();
        assert_eq!(session.engine().to_persisted(), before);
        assert!(!session.has_unsaved_changes());
    }

    #[test]
    fn test_invalid_vote_is_rejected() {
        let mut session = start(&[1, 2, 3]);
        let before = session.engine().to_persisted();
        assert_eq!(
            session.record_vote(1, 99),
            Err(SessionError::Engine(EngineError::InvalidId(99)))
        );
        assert_eq!(session.engine().to_persisted(), before);
        assert!(session.current_pair().is_some());
    }

    #[test]
    fn test_draw_vote() {
        let mut session = start(&[1, 2]);
        session.record_draw(1, 2).unwrap();
        let r1 = session.engine().record(1).unwrap();
        assert_eq!((r1.rating, r1.games), (1000.0, 1));
    }

    #[test]
    fn test_debounced_saves() {
        let mut session = start_with(&[1, 2, 3], PersistenceStore::new(MemoryStorage::new()), 60_000);
        session.record_vote(1, 2).unwrap();
        session.record_vote(1, 3).unwrap();
        assert!(session.has_unsaved_changes());
        assert!(!session.flush_if_due(Instant::now()));
        assert_eq!(session.store().load().unwrap().ratings[&1].games, 0);

        assert!(session.flush_if_due(Instant::now() + Duration::from_secs(120)));
        assert_eq!(session.store().load().unwrap().ratings[&1].games, 2);
        assert!(!session.has_unsaved_changes());
    }

    #[test]
    fn test_export_includes_pending_changes() {
        let mut session = start_with(&[1, 2], PersistenceStore::new(MemoryStorage::new()), 60_000);
        session.record_vote(1, 2).unwrap();
        let exported = crate::storage::parse_document(&session.export_text()).unwrap();
        assert_eq!(exported.ratings[&1].games, 1);
    }

    #[test]
    fn test_reset_restores_defaults() {
        let mut session = start(&[1, 2]);
        session.record_vote(1, 2).unwrap();
        session.reset().unwrap();

        assert!(session.store().load().is_none());
        assert_eq!(session.engine().record(1), Some(&RatingRecord::new(1)));
        assert_eq!(session.engine().appearances().get(&1), Some(&0));
        assert!(session.current_pair().is_some());
    }

    #[test]
    fn test_import_replaces_state() {
        let mut session = start(&[1, 2, 3]);
        session.record_vote(1, 2).unwrap();

        let doc = r#"{"version":1,"ratings":{"3":{"rating":1500,"games":9},"8":{"rating":1,"games":1}},"appear":{"3":9}}"#;
        assert!(session.import_text(doc));

        assert_eq!(session.engine().record(3).unwrap().rating, 1500.0);
        assert_eq!(session.engine().record(1), Some(&RatingRecord::new(1)));
        assert!(!session.store().load().unwrap().ratings.contains_key(&8));
    }

    #[test]
    fn test_rejected_import_changes_nothing() {
        let mut session = start(&[1, 2]);
        session.record_vote(1, 2).unwrap();
        let before = session.export_text();

        assert!(!session.import_text(r#"{"version":2,"ratings":{},"appear":{}}"#));
        assert_eq!(session.export_text(), before);
        assert_eq!(session.engine().record(1).unwrap().games, 1);
    }

    #[test]
    fn test_set_catalog_saves_immediately_without_debounce() {
        let mut session = start(&[1, 2, 3]);
        session.set_catalog(vec![1, 4]).unwrap();

        assert!(!session.has_unsaved_changes());
        let stored = session.store().load().unwrap();
        assert!(stored.ratings.contains_key(&4));
        assert!(!stored.ratings.contains_key(&2));
    }

    #[test]
    fn test_set_catalog_keeps_surviving_items() {
        let mut session = start(&[1, 2, 3]);
        session.record_vote(1, 2).unwrap();
        session.set_catalog(vec![1, 3, 4]).unwrap();

        assert_eq!(session.catalog(), &[1, 3, 4]);
        assert_eq!(session.engine().record(1).unwrap().games, 1);
        assert!(session.engine().record(2).is_none());
        session.flush();
        assert!(!session.store().load().unwrap().ratings.contains_key(&2));
    }

    /// Accepts writes but fails every read.
    #[derive(Default)]
    struct WriteOnlyStorage {
        inner: MemoryStorage,
    }

    impl StorageBackend for WriteOnlyStorage {
        fn get_item(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::Io(std::io::Error::new(std::io::ErrorKind::Other, "read failed")))
        }

        fn set_item(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
            self.inner.set_item(key, value)
        }

        fn remove_item(&mut self, key: &str) -> Result<(), StorageError> {
            self.inner.remove_item(key)
        }
    }

    #[test]
    fn test_import_does_not_depend_on_reading_back() {
        let store = PersistenceStore::new(WriteOnlyStorage::default());
        let mut session =
            SessionController::start(vec![1, 2], store, StdRng::seed_from_u64(5), options(0)).unwrap();

        let doc = r#"{"version":1,"ratings":{"1":{"rating":1234,"games":4}},"appear":{"1":4}}"#;
        assert!(session.import_text(doc));
        assert_eq!(session.engine().record(1).unwrap().rating, 1234.0);

        let raw = session.store().backend().inner.get_item(STORAGE_KEY).unwrap().unwrap();
        let stored = parse_document(&raw).unwrap();
        assert_eq!(stored.ratings[&1], PersistedRating { rating: 1234.0, games: 4 });
        assert_eq!(stored.appear[&1], 4);
    }
}
