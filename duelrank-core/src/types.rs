use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::constants::INITIAL_RATING;
use crate::error::EngineError;

/// Caller-provided item identifier. Only the id matters to the core;
/// names, images and the rest belong to whoever owns the catalog.
pub type ItemId = i64;

/// Appearance counts keyed by item id. Missing ids count as 0.
pub type AppearanceMap = HashMap<ItemId, u64>;

/// Two distinct item ids selected for one round. Not persisted.
pub type Pair = (ItemId, ItemId);

/// Rating state for one item.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingRecord {
    pub id: ItemId,
    /// Elo rating. Unbounded in both directions.
    pub rating: f64,
    /// Number of decided (non-skip) duels this item took part in.
    pub games: u64,
}

impl RatingRecord {
    pub fn new(id: ItemId) -> Self {
        RatingRecord { id, rating: INITIAL_RATING, games: 0 }
    }
}

/// Read-only view of the engine state, in catalog order.
#[derive(Debug, Clone, Copy)]
pub struct Snapshot<'a> {
    pub ratings: &'a [RatingRecord],
    pub appear: &'a AppearanceMap,
}

/// Maps between caller ids and positions in catalog order.
#[derive(Debug, Clone, Default)]
pub(crate) struct IdMap {
    ids: Vec<ItemId>,
    id_to_idx: HashMap<ItemId, usize>,
}

impl IdMap {
    pub fn from_ids(ids: &[ItemId]) -> Result<Self, EngineError> {
        let mut id_to_idx = HashMap::with_capacity(ids.len());
        for (idx, &id) in ids.iter().enumerate() {
            if id_to_idx.insert(id, idx).is_some() {
                return Err(EngineError::DuplicateId(id));
            }
        }
        Ok(IdMap { ids: ids.to_vec(), id_to_idx })
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn ids(&self) -> &[ItemId] {
        &self.ids
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.id_to_idx.contains_key(&id)
    }

    pub fn to_idx(&self, id: ItemId) -> Result<usize, EngineError> {
        self.id_to_idx.get(&id).copied().ok_or(EngineError::InvalidId(id))
    }
}
