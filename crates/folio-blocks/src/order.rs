//! Ordering rules shared by every writer of `sort_order`.
//!
//! Two rules keep a document's block order total:
//!
//! - Add appends at `max(existing) + 1` ([`next_sort_order`]).
//! - Reorder takes the complete desired sequence, checks it names exactly the
//!   current blocks ([`validate_reorder`]), and re-indexes them `0..n`.
//!
//! Adjacent moves are derived from the sorted list and expressed as a full
//! reorder ([`swap_adjacent`]), so reorder stays the single source of truth.

use std::collections::HashSet;

use folio_types::{BlockId, BlockInstance};

use crate::{BlockError, Result};

/// Direction for [`swap_adjacent`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Toward the start of the document.
    Up,
    /// Toward the end of the document.
    Down,
}

impl Direction {
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "up" | "before" => Some(Direction::Up),
            "down" | "after" => Some(Direction::Down),
            _ => None,
        }
    }
}

/// Sort order for a block appended to `blocks`.
pub fn next_sort_order<'a>(blocks: impl IntoIterator<Item = &'a BlockInstance>) -> i64 {
    blocks
        .into_iter()
        .map(|b| b.sort_order)
        .max()
        .unwrap_or(-1)
        + 1
}

/// Sort blocks ascending by `sort_order`. The block ID breaks ties so output is
/// deterministic even if a corrupt source produced duplicates.
pub fn sort_blocks(blocks: &mut [BlockInstance]) {
    blocks.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then(a.id.cmp(&b.id)));
}

/// Check that `ordered` is a permutation of `current`.
pub fn validate_reorder(current: &[BlockId], ordered: &[BlockId]) -> Result<()> {
    let current_set: HashSet<BlockId> = current.iter().copied().collect();

    let mut seen = HashSet::with_capacity(ordered.len());
    let mut duplicated = Vec::new();
    let mut unexpected = Vec::new();
    for id in ordered {
        if !seen.insert(*id) {
            if !duplicated.contains(id) {
                duplicated.push(*id);
            }
        } else if !current_set.contains(id) {
            unexpected.push(*id);
        }
    }
    let missing: Vec<BlockId> = current
        .iter()
        .filter(|id| !seen.contains(*id))
        .copied()
        .collect();

    if missing.is_empty() && unexpected.is_empty() && duplicated.is_empty() {
        Ok(())
    } else {
        Err(BlockError::ReorderMismatch {
            missing,
            unexpected,
            duplicated,
        })
    }
}

/// Full sequence after swapping `id` with its neighbor in `direction`.
///
/// `sorted` must already be in document order. Returns `Ok(None)` when the
/// block is already at that edge, so there is nothing to reorder.
pub fn swap_adjacent(
    sorted: &[BlockId],
    id: &BlockId,
    direction: Direction,
) -> Result<Option<Vec<BlockId>>> {
    let idx = sorted
        .iter()
        .position(|b| b == id)
        .ok_or(BlockError::BlockNotFound(*id))?;

    let neighbor = match direction {
        Direction::Up if idx > 0 => idx - 1,
        Direction::Down if idx + 1 < sorted.len() => idx + 1,
        _ => return Ok(None),
    };

    let mut sequence = sorted.to_vec();
    sequence.swap(idx, neighbor);
    Ok(Some(sequence))
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_types::{DividerFields, FieldData};

    fn ids(n: usize) -> Vec<BlockId> {
        (0..n).map(|_| BlockId::new()).collect()
    }

    #[test]
    fn test_next_sort_order() {
        assert_eq!(next_sort_order(&Vec::<BlockInstance>::new()), 0);
        let blocks = vec![
            BlockInstance::new(BlockId::new(), 4, FieldData::Divider(DividerFields::default())),
            BlockInstance::new(BlockId::new(), 1, FieldData::Divider(DividerFields::default())),
        ];
        assert_eq!(next_sort_order(&blocks), 5);
    }

    #[test]
    fn test_validate_permutation() {
        let current = ids(3);
        let reversed: Vec<_> = current.iter().rev().copied().collect();
        assert!(validate_reorder(&current, &reversed).is_ok());
        assert!(validate_reorder(&[], &[]).is_ok());
    }

    #[test]
    fn test_validate_reports_each_problem() {
        let current = ids(3);
        let stranger = BlockId::new();
        let ordered = vec![current[0], current[0], stranger];
        let Err(BlockError::ReorderMismatch {
            missing,
            unexpected,
            duplicated,
        }) = validate_reorder(&current, &ordered)
        else {
            panic!("expected mismatch");
        };
        assert_eq!(missing, vec![current[1], current[2]]);
        assert_eq!(unexpected, vec![stranger]);
        assert_eq!(duplicated, vec![current[0]]);
    }

    #[test]
    fn test_swap_adjacent() {
        let sorted = ids(3);
        let down = swap_adjacent(&sorted, &sorted[0], Direction::Down).unwrap().unwrap();
        assert_eq!(down, vec![sorted[1], sorted[0], sorted[2]]);
        let up = swap_adjacent(&sorted, &sorted[2], Direction::Up).unwrap().unwrap();
        assert_eq!(up, vec![sorted[0], sorted[2], sorted[1]]);
    }

    #[test]
    fn test_swap_at_edges_is_noop() {
        let sorted = ids(2);
        assert_eq!(swap_adjacent(&sorted, &sorted[0], Direction::Up).unwrap(), None);
        assert_eq!(swap_adjacent(&sorted, &sorted[1], Direction::Down).unwrap(), None);
    }

    #[test]
    fn test_swap_unknown_block() {
        let sorted = ids(2);
        let err = swap_adjacent(&sorted, &BlockId::new(), Direction::Up).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_direction_parse() {
        assert_eq!(Direction::from_str("UP"), Some(Direction::Up));
        assert_eq!(Direction::from_str("after"), Some(Direction::Down));
        assert_eq!(Direction::from_str("sideways"), None);
    }
}
