//! Score-proportional (roulette wheel) selection.

use rand::Rng;

use crate::load_balancer::types::{RankedCandidate, SelectionError, SelectionResult};

/// Draw one candidate with probability proportional to its score.
///
/// A ranking whose scores sum to zero or less returns the first candidate.
pub fn weighted_random_selection<'a, R: Rng>(
    ranked: &'a [RankedCandidate],
    rng: &mut R,
) -> SelectionResult<&'a RankedCandidate> {
    let first = ranked.first().ok_or(SelectionError::NoServicesAvailable)?;

    let total: f64 = ranked.iter().map(|c| c.score).sum();
    if !total.is_finite() || total <= 0.0 {
        return Ok(first);
    }

    let mut remainder = rng.gen_range(0.0..total);
    for candidate in ranked {
        remainder -= candidate.score;
        if remainder <= 0.0 {
            return Ok(candidate);
        }
    }

    // Float drift can leave a sliver past the last candidate.
    Ok(ranked.last().unwrap_or(first))
}
