/// Rating engine: per-item Elo records and appearance counts for the current catalog.
///
/// No IO. The caller loads a `PersistedState`, hands it to `initialize`, and
/// writes `to_persisted()` back whenever it wants.
///
/// Items are identified by caller-provided `i64` IDs; records are kept in
/// catalog order so ties on the leaderboard resolve the same way every time.
use crate::elo::{rate, Outcome};
use crate::error::EngineError;
use crate::storage::{PersistedRating, PersistedState};
use crate::types::{AppearanceMap, IdMap, ItemId, RatingRecord, Snapshot};

#[derive(Debug, Clone, Default)]
pub struct RatingEngine {
    /// Maps between caller IDs and positions in `ratings`.
    id_map: IdMap,
    /// One record per catalog id, in catalog order.
    ratings: Vec<RatingRecord>,
    /// One count per catalog id.
    appear: AppearanceMap,
}

impl RatingEngine {
    /// Build an engine for `catalog_ids`, seeded from `persisted` when given.
    pub fn new(catalog_ids: &[ItemId], persisted: Option<&PersistedState>) -> Result<Self, EngineError> {
        let mut engine = RatingEngine::default();
        engine.initialize(catalog_ids, persisted)?;
        Ok(engine)
    }

    /// Reconcile state against the current catalog.
    ///
    /// Values come from `persisted` when given, otherwise from the engine's own
    /// current state. Catalog ids without a value get defaults; ids outside the
    /// catalog are dropped. Running it again with the same catalog and no new
    /// persisted data changes nothing.
    ///
    /// On error (duplicate catalog id) the engine is left as it was.
    pub fn initialize(
        &mut self,
        catalog_ids: &[ItemId],
        persisted: Option<&PersistedState>,
    ) -> Result<(), EngineError> {
        let id_map = IdMap::from_ids(catalog_ids)?;

        let ratings: Vec<RatingRecord> = catalog_ids
            .iter()
            .map(|&id| match persisted {
                Some(state) => state
                    .ratings
                    .get(&id)
                    .map(|r| RatingRecord { id, rating: r.rating, games: r.games })
                    .unwrap_or_else(|| RatingRecord::new(id)),
                None => self.record(id).copied().unwrap_or_else(|| RatingRecord::new(id)),
            })
            .collect();

        let appear: AppearanceMap = catalog_ids
            .iter()
            .map(|&id| {
                let count = match persisted {
                    Some(state) => state.appear.get(&id).copied(),
                    None => self.appear.get(&id).copied(),
                };
                (id, count.unwrap_or(0))
            })
            .collect();

        self.id_map = id_map;
        self.ratings = ratings;
        self.appear = appear;
        Ok(())
    }

    /// Number of items being rated.
    pub fn num_items(&self) -> usize {
        self.id_map.len()
    }

    /// Catalog ids in the order they were given to `initialize`.
    pub fn ids(&self) -> &[ItemId] {
        self.id_map.ids()
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.id_map.contains(id)
    }

    pub fn record(&self, id: ItemId) -> Option<&RatingRecord> {
        let idx = self.id_map.to_idx(id).ok()?;
        self.ratings.get(idx)
    }

    pub fn appearances(&self) -> &AppearanceMap {
        &self.appear
    }

    /// Apply a decided duel: `winner_id` beat `loser_id`.
    pub fn update(&mut self, winner_id: ItemId, loser_id: ItemId, k: f64) -> Result<(), EngineError> {
        self.apply(winner_id, loser_id, Outcome::Win, k)
    }

    /// Apply a drawn duel. Both items score 0.5.
    pub fn draw(&mut self, id_a: ItemId, id_b: ItemId, k: f64) -> Result<(), EngineError> {
        self.apply(id_a, id_b, Outcome::Draw, k)
    }

    fn apply(&mut self, id_a: ItemId, id_b: ItemId, outcome: Outcome, k: f64) -> Result<(), EngineError> {
        // Resolve everything up front so a bad id leaves no partial update behind.
        let idx_a = self.id_map.to_idx(id_a)?;
        let idx_b = self.id_map.to_idx(id_b)?;
        if idx_a == idx_b {
            return Err(EngineError::SameItem(id_a));
        }

        let (new_a, new_b) = rate(self.ratings[idx_a].rating, self.ratings[idx_b].rating, outcome, k);
        // Counters saturate at the type's maximum instead of wrapping.
        let games_a = self.ratings[idx_a].games.saturating_add(1);
        let games_b = self.ratings[idx_b].games.saturating_add(1);
        let appear_a = self.appear.get(&id_a).copied().unwrap_or(0).saturating_add(1);
        let appear_b = self.appear.get(&id_b).copied().unwrap_or(0).saturating_add(1);

        self.ratings[idx_a].rating = new_a;
        self.ratings[idx_a].games = games_a;
        self.ratings[idx_b].rating = new_b;
        self.ratings[idx_b].games = games_b;
        self.appear.insert(id_a, appear_a);
        self.appear.insert(id_b, appear_b);
        Ok(())
    }

    pub fn snapshot(&self) -> Snapshot<'_> {
        Snapshot { ratings: &self.ratings, appear: &self.appear }
    }

    /// Records sorted by rating, highest first. Equal ratings keep catalog order.
    pub fn sorted_leaderboard(&self) -> Vec<RatingRecord> {
        let mut sorted = self.ratings.clone();
        // `sort_by` is stable, which is what makes the tie-break deterministic.
        sorted.sort_by(|a, b| b.rating.total_cmp(&a.rating));
        sorted
    }

    /// Project the current state into the persisted document shape.
    pub fn to_persisted(&self) -> PersistedState {
        let mut state = PersistedState::empty();
        for r in &self.ratings {
            state.ratings.insert(r.id, PersistedRating { rating: r.rating, games: r.games });
        }
        for (&id, &count) in &self.appear {
            state.appear.insert(id, count);
        }
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DEFAULT_K_FACTOR;

    fn persisted(ratings: &[(ItemId, f64, u64)], appear: &[(ItemId, u64)]) -> PersistedState {
        let mut state = PersistedState::empty();
        for &(id, rating, games) in ratings {
            state.ratings.insert(id, PersistedRating { rating, games });
        }
        for &(id, count) in appear {
            state.appear.insert(id, count);
        }
        state
    }

    fn rating_of(engine: &RatingEngine, id: ItemId) -> f64 {
        engine.record(id).unwrap().rating
    }

    #[test]
    fn test_initialize_defaults() {
        let engine = RatingEngine::new(&[10, 20, 30], None).unwrap();
        assert_eq!(engine.num_items(), 3);
        for r in engine.snapshot().ratings {
            assert_eq!(r.rating, 1000.0);
            assert_eq!(r.games, 0);
        }
        assert_eq!(engine.appearances().get(&20), Some(&0));
    }

    #[test]
    fn test_initialize_restores_and_prunes() {
        let saved = persisted(&[(1, 1100.0, 4), (99, 900.0, 2)], &[(1, 5), (99, 3)]);
        let engine = RatingEngine::new(&[1, 2], Some(&saved)).unwrap();

        let r1 = engine.record(1).unwrap();
        assert_eq!((r1.rating, r1.games), (1100.0, 4));
        assert_eq!(engine.record(2), Some(&RatingRecord::new(2)));
        assert_eq!(engine.appearances().get(&1), Some(&5));
        assert_eq!(engine.appearances().get(&2), Some(&0));

        // 99 is no longer in the catalog
        assert!(engine.record(99).is_none());
        assert!(!engine.appearances().contains_key(&99));
        assert!(!engine.to_persisted().ratings.contains_key(&99));
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let saved = persisted(&[(1, 1050.0, 2)], &[(1, 2), (3, 7)]);
        let mut engine = RatingEngine::new(&[1, 2, 3], Some(&saved)).unwrap();
        let first = engine.to_persisted();
        let first_ratings = engine.snapshot().ratings.to_vec();

        engine.initialize(&[1, 2, 3], None).unwrap();
        assert_eq!(engine.to_persisted(), first);
        assert_eq!(engine.snapshot().ratings, first_ratings.as_slice());
    }

    #[test]
    fn test_initialize_keeps_in_memory_state_on_catalog_change() {
        let mut engine = RatingEngine::new(&[1, 2, 3], None).unwrap();
        engine.update(1, 2, DEFAULT_K_FACTOR).unwrap();

        engine.initialize(&[4, 1], None).unwrap();
        assert_eq!(engine.ids(), &[4, 1]);
        assert!((rating_of(&engine, 1) - 1012.0).abs() < 1e-9);
        assert_eq!(engine.record(4), Some(&RatingRecord::new(4)));
        assert!(!engine.contains(2));
        assert!(!engine.appearances().contains_key(&2));
    }

    #[test]
    fn test_initialize_duplicate_leaves_state_untouched() {
        let mut engine = RatingEngine::new(&[1, 2], None).unwrap();
        engine.update(1, 2, DEFAULT_K_FACTOR).unwrap();
        let before = engine.to_persisted();

        let err = engine.initialize(&[1, 3, 3], None).unwrap_err();
        assert_eq!(err, EngineError::DuplicateId(3));
        assert_eq!(engine.to_persisted(), before);
        assert_eq!(engine.ids(), &[1, 2]);
    }

    #[test]
    fn test_update_equal_ratings() {
        let mut engine = RatingEngine::new(&[1, 2], None).unwrap();
        engine.update(1, 2, 24.0).unwrap();

        let w = engine.record(1).unwrap();
        let l = engine.record(2).unwrap();
        assert!((w.rating - 1012.0).abs() < 1e-9);
        assert!((l.rating - 988.0).abs() < 1e-9);
        assert_eq!((w.games, l.games), (1, 1));
        assert_eq!(engine.appearances().get(&1), Some(&1));
        assert_eq!(engine.appearances().get(&2), Some(&1));
    }

    #[test]
    fn test_update_favourite_wins() {
        let saved = persisted(&[(1, 1200.0, 0), (2, 1000.0, 0)], &[]);
        let mut engine = RatingEngine::new(&[1, 2], Some(&saved)).unwrap();
        engine.update(1, 2, 24.0).unwrap();

        assert!((rating_of(&engine, 1) - 1205.77).abs() < 0.01);
        assert!((rating_of(&engine, 2) - 994.23).abs() < 0.01);
    }

    #[test]
    fn test_update_zero_sum_and_monotonic() {
        let saved = persisted(&[(1, 1337.0, 3), (2, 1012.5, 8)], &[]);
        let mut engine = RatingEngine::new(&[1, 2], Some(&saved)).unwrap();
        engine.update(1, 2, 32.0).unwrap();

        let ra = rating_of(&engine, 1);
        let rb = rating_of(&engine, 2);
        assert!(((ra - 1337.0) + (rb - 1012.5)).abs() < 1e-9);
        assert!(ra > 1337.0);
        assert!(rb < 1012.5);
    }

    #[test]
    fn test_update_unknown_id_is_rejected_without_mutation() {
        let mut engine = RatingEngine::new(&[1, 2], None).unwrap();
        let before = engine.to_persisted();

        assert_eq!(engine.update(1, 77, 24.0), Err(EngineError::InvalidId(77)));
        assert_eq!(engine.update(77, 1, 24.0), Err(EngineError::InvalidId(77)));
        assert_eq!(engine.draw(2, 77, 24.0), Err(EngineError::InvalidId(77)));
        assert_eq!(engine.to_persisted(), before);
    }

    #[test]
    fn test_update_same_item_rejected() {
        let mut engine = RatingEngine::new(&[1, 2], None).unwrap();
        assert_eq!(engine.update(1, 1, 24.0), Err(EngineError::SameItem(1)));
        assert_eq!(engine.record(1).unwrap().games, 0);
    }

    #[test]
    fn test_update_saturates_counters_at_max() {
        let saved = persisted(&[(1, 1000.0, u64::MAX)], &[(2, u64::MAX)]);
        let mut engine = RatingEngine::new(&[1, 2], Some(&saved)).unwrap();
        engine.update(1, 2, 24.0).unwrap();

        let w = engine.record(1).unwrap();
        let l = engine.record(2).unwrap();
        // Both sides of the duel are applied
        assert!((w.rating - 1012.0).abs() < 1e-9);
        assert!((l.rating - 988.0).abs() < 1e-9);
        assert_eq!((w.games, l.games), (u64::MAX, 1));
        assert_eq!(engine.appearances().get(&1), Some(&1));
        assert_eq!(engine.appearances().get(&2), Some(&u64::MAX));
    }

    #[test]
    fn test_draw_is_symmetric() {
        let saved = persisted(&[(1, 1100.0, 0), (2, 900.0, 0)], &[]);
        let mut engine = RatingEngine::new(&[1, 2], Some(&saved)).unwrap();
        engine.draw(1, 2, 24.0).unwrap();

        let ra = rating_of(&engine, 1);
        let rb = rating_of(&engine, 2);
        assert!(ra < 1100.0 && rb > 900.0);
        assert!(((ra - 1100.0) + (rb - 900.0)).abs() < 1e-9);
        assert_eq!(engine.record(1).unwrap().games, 1);
        assert_eq!(engine.appearances().get(&2), Some(&1));
    }

    #[test]
    fn test_leaderboard_order_and_ties() {
        let saved = persisted(&[(1, 1000.0, 0), (2, 1100.0, 0), (3, 1000.0, 0), (4, 1000.0, 0)], &[]);
        let engine = RatingEngine::new(&[4, 1, 2, 3], Some(&saved)).unwrap();

        let order: Vec<ItemId> = engine.sorted_leaderboard().iter().map(|r| r.id).collect();
        // Ties keep catalog order: 4, 1, 3
        assert_eq!(order, vec![2, 4, 1, 3]);
    }

    #[test]
    fn test_to_persisted_round_trips_through_initialize() {
        let mut engine = RatingEngine::new(&[5, 6, 7], None).unwrap();
        engine.update(5, 6, 24.0).unwrap();
        engine.update(7, 5, 24.0).unwrap();

        let saved = engine.to_persisted();
        let restored = RatingEngine::new(&[5, 6, 7], Some(&saved)).unwrap();
        assert_eq!(restored.snapshot().ratings, engine.snapshot().ratings);
        assert_eq!(restored.appearances(), engine.appearances());
    }
}
