//! Reviewer selection strategies.
//!
//! The engine never calls a random generator directly; it asks an injected
//! [`ReviewerSelector`] for indices, so tests can script the picks.

use rand::Rng;

/// Source of candidate indices.
pub trait ReviewerSelector: Send + Sync {
    /// Return an index in `0..len`. Called only with `len > 0`.
    fn pick_index(&self, len: usize) -> usize;
}

/// Uniform selection backed by the thread-local RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomSelector;

impl ReviewerSelector for RandomSelector {
    fn pick_index(&self, len: usize) -> usize {
        rand::thread_rng().gen_range(0..len)
    }
}

impl<F> ReviewerSelector for F
where
    F: Fn(usize) -> usize + Send + Sync,
{
    fn pick_index(&self, len: usize) -> usize {
        self(len)
    }
}

/// Ask the selector for an index, reducing stray values into range.
fn bounded_pick(selector: &dyn ReviewerSelector, len: usize) -> usize {
    selector.pick_index(len) % len
}

/// Choose initial reviewers from the candidate pool.
///
/// Pools of two or fewer are taken whole. Larger pools yield two distinct
/// members: `i` from `[0, n)`, `j` from `[0, n - 1)` shifted past `i`.
pub fn pick_reviewers(selector: &dyn ReviewerSelector, pool: &[String]) -> Vec<String> {
    let n = pool.len();
    if n <= 2 {
        return pool.to_vec();
    }

    let i = bounded_pick(selector, n);
    let mut j = bounded_pick(selector, n - 1);
    if j >= i {
        j += 1;
    }
    vec![pool[i].clone(), pool[j].clone()]
}

/// Choose one replacement from a non-empty pool.
pub fn pick_one<'a>(selector: &dyn ReviewerSelector, pool: &'a [String]) -> Option<&'a str> {
    if pool.is_empty() {
        return None;
    }
    Some(pool[bounded_pick(selector, pool.len())].as_str())
}
