/// Exposure-balanced pair selection.
///
/// Pure functions of `(pool, appearance counts, rng)`. The random source is
/// injected so a seeded RNG gives reproducible pairs.
use rand::Rng;

use crate::error::PairingError;
use crate::types::{AppearanceMap, ItemId, Pair};

fn appearance_count(appear: &AppearanceMap, id: ItemId) -> u64 {
    appear.get(&id).copied().unwrap_or(0)
}

/// Narrow `pool` to the least-shown items.
///
/// Members at the minimum count `m` first; if that is fewer than two, members
/// with count `<= m + 1`; if still fewer than two, the whole pool.
pub fn candidate_set(pool: &[ItemId], appear: &AppearanceMap) -> Vec<ItemId> {
    let Some(min) = pool.iter().map(|&id| appearance_count(appear, id)).min() else {
        return Vec::new();
    };

    let at_min: Vec<ItemId> = pool
        .iter()
        .copied()
        .filter(|&id| appearance_count(appear, id) == min)
        .collect();
    if at_min.len() >= 2 {
        return at_min;
    }

    let widened: Vec<ItemId> = pool
        .iter()
        .copied()
        .filter(|&id| appearance_count(appear, id) <= min.saturating_add(1))
        .collect();
    if widened.len() >= 2 {
        return widened;
    }

    pool.to_vec()
}

/// The single item whose count is at least two below every other pool member, if any.
///
/// This is exactly the case where `candidate_set` falls back to the full pool.
fn lone_least_shown(pool: &[ItemId], appear: &AppearanceMap) -> Option<ItemId> {
    let min = pool.iter().map(|&id| appearance_count(appear, id)).min()?;
    let mut within_one = pool
        .iter()
        .copied()
        .filter(|&id| appearance_count(appear, id) <= min.saturating_add(1));
    let first = within_one.next()?;
    within_one.next().is_none().then_some(first)
}

/// Draw two distinct pool members, favouring the least-shown ones.
///
/// When one item lags every other by two or more appearances it is always
/// part of the pair and its opponent is drawn uniformly from the rest of the
/// pool. Otherwise both items are drawn uniformly from `candidate_set`,
/// resampling the second index until it differs from the first.
///
/// The returned order carries no meaning.
pub fn pick_pair<R: Rng>(
    pool: &[ItemId],
    appear: &AppearanceMap,
    rng: &mut R,
) -> Result<Pair, PairingError> {
    if pool.len() < 2 {
        return Err(PairingError::InsufficientPool { available: pool.len() });
    }

    if let Some(anchor) = lone_least_shown(pool, appear) {
        let anchor_idx = pool.iter().position(|&id| id == anchor).unwrap_or(0);
        let mut other_idx = rng.random_range(0..pool.len());
        while other_idx == anchor_idx {
            other_idx = rng.random_range(0..pool.len());
        }
        let other = pool[other_idx];
        return Ok(if rng.random::<f64>() < 0.5 { (anchor, other) } else { (other, anchor) });
    }

    let candidates = candidate_set(pool, appear);
    let a = rng.random_range(0..candidates.len());
    let mut b = rng.random_range(0..candidates.len());
    while b == a {
        b = rng.random_range(0..candidates.len());
    }

    Ok((candidates[a], candidates[b]))
}
