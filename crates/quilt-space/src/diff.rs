//! Byte-level difference and delta application.
//!
//! `difference(a, b)` returns a delta sequence whose left-fold over `a`
//! yields `b`. The search is the classical O(ND) shortest-edit-script
//! algorithm: per edit distance `d` it records the furthest-reaching
//! x per k-diagonal, then backtracks through the saved frontiers into
//! single-byte delete and insert operations. Those are compacted into
//! ranged deltas and finally rebased so every offset is relative to the
//! buffer as it exists when the delta applies.

use quilt_core::payload::Delta;

use crate::error::{Result, SpaceError};

/// Apply one delta to a buffer in place.
pub fn apply(buffer: &mut Vec<u8>, delta: &Delta) -> Result<()> {
    let offset = delta.offset as usize;
    let delete = delta.delete as usize;
    if offset > buffer.len() || offset + delete > buffer.len() {
        return Err(SpaceError::DeltaOutOfBounds {
            offset: delta.offset,
            delete: delta.delete,
            len: buffer.len(),
        });
    }
    buffer.splice(offset..offset + delete, delta.insert.iter().copied());
    Ok(())
}

/// Fold a delta sequence over the empty buffer.
pub fn replay<'a>(deltas: impl IntoIterator<Item = &'a Delta>) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    for delta in deltas {
        apply(&mut buffer, delta)?;
    }
    Ok(buffer)
}

/// Compute the delta sequence transforming `a` into `b`.
///
/// The search budget escalates through min(|a|,|b|), max(|a|,|b|),
/// |a|+|b|, |a|·|b| before giving up; the |a|+|b| step always suffices,
/// the earlier steps just keep pathological inputs from allocating the
/// widest frontier up front.
pub fn difference(a: &[u8], b: &[u8]) -> Result<Vec<Delta>> {
    if a == b {
        return Ok(Vec::new());
    }

    let budgets = [
        a.len().min(b.len()),
        a.len().max(b.len()),
        a.len() + b.len(),
        a.len().saturating_mul(b.len()),
    ];
    for budget in budgets {
        if let Some(trace) = shortest_edit(a, b, budget) {
            let ops = backtrack(a, b, &trace.frontiers, trace.offset);
            return Ok(rebase(compact(ops)));
        }
    }
    Err(SpaceError::DiffBudgetExhausted)
}

struct Trace {
    frontiers: Vec<Vec<isize>>,
    offset: isize,
}

/// Forward pass: furthest-reaching frontiers per edit distance.
///
/// Returns the saved frontiers on success, None when `budget` rounds are
/// not enough. Diagonals are banded to
/// `[-d + 2*max(0, d-|b|), d - 2*max(0, d-|a|)]`.
fn shortest_edit(a: &[u8], b: &[u8], budget: usize) -> Option<Trace> {
    let n = a.len() as isize;
    let m = b.len() as isize;
    let max = (budget as isize).min(n + m);
    // One slot of slack on each side so k±1 never indexes out of range.
    let offset = max + 1;
    let mut v = vec![0isize; (2 * max + 3) as usize];
    let mut frontiers = Vec::new();

    for d in 0..=max {
        frontiers.push(v.clone());

        let k_low = -d + 2 * 0.max(d - m);
        let k_high = d - 2 * 0.max(d - n);
        let mut k = k_low;
        while k <= k_high {
            let idx = (k + offset) as usize;
            let mut x = if k == -d || (k != d && v[idx - 1] < v[idx + 1]) {
                v[idx + 1]
            } else {
                v[idx - 1] + 1
            };
            let mut y = x - k;
            while x < n && y < m && a[x as usize] == b[y as usize] {
                x += 1;
                y += 1;
            }
            v[idx] = x;
            if x >= n && y >= m {
                return Some(Trace { frontiers, offset });
            }
            k += 2;
        }
    }
    None
}

/// Backward pass: recover single-byte edit operations in `a`-coordinates.
fn backtrack(a: &[u8], b: &[u8], frontiers: &[Vec<isize>], offset: isize) -> Vec<Delta> {
    let mut ops = Vec::new();
    let mut x = a.len() as isize;
    let mut y = b.len() as isize;

    for (d, v) in frontiers.iter().enumerate().rev() {
        let d = d as isize;
        let k = x - y;
        let idx = (k + offset) as usize;

        let down = k == -d || (k != d && v[idx - 1] < v[idx + 1]);
        let prev_k = if down { k + 1 } else { k - 1 };
        let prev_idx = (prev_k + offset) as usize;
        let prev_x = v[prev_idx];
        let prev_y = prev_x - prev_k;

        // Walk back along the snake; matching bytes emit nothing.
        while x > prev_x && y > prev_y {
            x -= 1;
            y -= 1;
        }

        if d > 0 {
            if x == prev_x {
                // Down move: insert b[prev_y] at a-position x.
                ops.push(Delta {
                    offset: x as u64,
                    delete: 0,
                    insert: vec![b[prev_y as usize]],
                });
            } else {
                // Right move: delete a[prev_x].
                ops.push(Delta {
                    offset: prev_x as u64,
                    delete: 1,
                    insert: Vec::new(),
                });
            }
        }

        x = prev_x;
        y = prev_y;
    }

    ops.reverse();
    ops
}

/// Merge adjacent operations into ranged deltas.
///
/// Two deltas merge when they share an offset, or when the next one
/// starts exactly where the previous one's deletion ends.
fn compact(ops: Vec<Delta>) -> Vec<Delta> {
    let mut out: Vec<Delta> = Vec::new();
    for op in ops {
        if let Some(last) = out.last_mut() {
            if op.offset == last.offset || op.offset == last.offset + last.delete {
                last.delete += op.delete;
                last.insert.extend_from_slice(&op.insert);
                continue;
            }
        }
        out.push(op);
    }
    out
}

/// Re-express offsets against the evolving buffer.
///
/// Compacted deltas carry offsets into the original `a`; each applied
/// delta shifts everything after it by its net size change.
fn rebase(deltas: Vec<Delta>) -> Vec<Delta> {
    let mut shift: i64 = 0;
    deltas
        .into_iter()
        .map(|delta| {
            let offset = (delta.offset as i64 + shift) as u64;
            shift += delta.insert.len() as i64 - delta.delete as i64;
            Delta {
                offset,
                delete: delta.delete,
                insert: delta.insert,
            }
        })
        .collect()
}

/// Split a delta so each piece's insert fits a payload budget.
///
/// The first piece carries the whole deletion; later pieces are pure
/// inserts at the positions the earlier pieces created.
pub fn chunk(delta: Delta, max_insert: usize) -> Vec<Delta> {
    if delta.insert.len() <= max_insert {
        return vec![delta];
    }
    let mut out = Vec::new();
    let mut offset = delta.offset;
    let mut first = true;
    for piece in delta.insert.chunks(max_insert) {
        out.push(Delta {
            offset,
            delete: if first { delta.delete } else { 0 },
            insert: piece.to_vec(),
        });
        offset += piece.len() as u64;
        first = false;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(a: &[u8], b: &[u8]) -> Vec<Delta> {
        let deltas = difference(a, b).unwrap();
        let mut buffer = a.to_vec();
        for delta in &deltas {
            apply(&mut buffer, delta).unwrap();
        }
        assert_eq!(buffer, b, "difference round trip failed");
        deltas
    }

    #[test]
    fn test_identity_is_empty() {
        assert!(difference(b"same", b"same").unwrap().is_empty());
        assert!(difference(b"", b"").unwrap().is_empty());
    }

    #[test]
    fn test_quick_fox_to_slow_dog() {
        let a = b"the quick brown fox";
        let b = b"the slow brown dog";
        let deltas = roundtrip(a, b);
        // A compact sequence, not per-byte edits.
        assert!(deltas.len() <= 4, "expected a compact script, got {deltas:?}");
    }

    #[test]
    fn test_insert_only() {
        let deltas = roundtrip(b"", b"hello");
        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[0].offset, 0);
        assert_eq!(deltas[0].delete, 0);
        assert_eq!(deltas[0].insert, b"hello");
    }

    #[test]
    fn test_delete_only() {
        let deltas = roundtrip(b"hello", b"");
        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[0].offset, 0);
        assert_eq!(deltas[0].delete, 5);
        assert!(deltas[0].insert.is_empty());
    }

    #[test]
    fn test_middle_replacement() {
        roundtrip(b"abcdef", b"abXYef");
    }

    #[test]
    fn test_separated_edits() {
        roundtrip(b"aXbYc", b"abc");
        roundtrip(b"abc", b"aXbYc");
        roundtrip(b"one two three", b"one 2 three four");
    }

    #[test]
    fn test_disjoint_buffers() {
        roundtrip(b"aaaa", b"bbbb");
    }

    #[test]
    fn test_apply_out_of_bounds() {
        let mut buffer = b"short".to_vec();
        let delta = Delta {
            offset: 3,
            delete: 10,
            insert: Vec::new(),
        };
        assert!(matches!(
            apply(&mut buffer, &delta),
            Err(SpaceError::DeltaOutOfBounds { .. })
        ));
    }

    #[test]
    fn test_replay_folds_from_empty() {
        let deltas = difference(b"", b"content").unwrap();
        assert_eq!(replay(deltas.iter()).unwrap(), b"content");
    }

    #[test]
    fn test_chunk_splits_large_inserts() {
        let delta = Delta {
            offset: 2,
            delete: 1,
            insert: (0..10u8).collect(),
        };
        let pieces = chunk(delta.clone(), 4);
        assert_eq!(pieces.len(), 3);
        assert_eq!(pieces[0].delete, 1);
        assert!(pieces[1..].iter().all(|p| p.delete == 0));

        // Applying the pieces equals applying the original.
        let mut direct = b"xx-yyyy".to_vec();
        apply(&mut direct, &delta).unwrap();
        let mut chunked = b"xx-yyyy".to_vec();
        for piece in &pieces {
            apply(&mut chunked, piece).unwrap();
        }
        assert_eq!(direct, chunked);
    }

    #[test]
    fn test_chunk_small_passthrough() {
        let delta = Delta {
            offset: 0,
            delete: 0,
            insert: b"ok".to_vec(),
        };
        assert_eq!(chunk(delta.clone(), 4), vec![delta]);
    }
}
