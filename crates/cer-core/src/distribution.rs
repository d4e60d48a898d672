use std::collections::HashMap;
use std::hash::Hash;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::rng::SampleRng;

/// A weighted sampling container with a cross-entropy style update.
///
/// Entries keep insertion order, so iteration, tie-breaking, and sampling
/// are deterministic for a given seed. Weights are expected to be kept
/// normalized by callers between mutations; every mutating operation here
/// renormalizes before returning.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Distribution<T> {
    items: Vec<T>,
    weights: Vec<f64>,
}

impl<T: Clone + PartialEq> Distribution<T> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            weights: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, item: &T) -> bool {
        self.items.contains(item)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&T, f64)> {
        self.items.iter().zip(self.weights.iter().copied())
    }

    pub fn weight_of(&self, item: &T) -> Option<f64> {
        self.position(item).map(|i| self.weights[i])
    }

    fn position(&self, item: &T) -> Option<usize> {
        self.items.iter().position(|i| i == item)
    }

    /// Insert `item` with the given raw weight. Does not renormalize;
    /// callers batch additions and then call [`normalize`](Self::normalize).
    pub fn add(&mut self, item: T, weight: f64) {
        self.items.push(item);
        self.weights.push(weight.max(0.0));
    }

    /// Insert `item` at the mean of the current probabilities (1.0 when
    /// empty), then renormalize. This is how slots admit new rules without
    /// drowning out or being drowned by the incumbents.
    pub fn add_at_mean(&mut self, item: T) {
        let weight = if self.is_empty() {
            1.0
        } else {
            self.weights.iter().sum::<f64>() / self.len() as f64
        };
        self.add(item, weight);
        self.normalize();
    }

    /// Remove `item`, returning its weight, and renormalize the remainder.
    pub fn remove(&mut self, item: &T) -> Option<f64> {
        let index = self.position(item)?;
        self.items.remove(index);
        let weight = self.weights.remove(index);
        self.normalize();
        Some(weight)
    }

    /// Scale weights to sum to 1. A distribution whose weights sum to zero
    /// (all entries zeroed, e.g. after freezing) becomes uniform.
    pub fn normalize(&mut self) {
        if self.is_empty() {
            return;
        }
        let sum: f64 = self.weights.iter().sum();
        if sum <= 0.0 {
            let uniform = 1.0 / self.len() as f64;
            self.weights.iter_mut().for_each(|w| *w = uniform);
        } else {
            self.weights.iter_mut().for_each(|w| *w /= sum);
        }
    }

    /// Weighted random draw, assuming weights sum to 1.
    ///
    /// Returns `None` only on an empty distribution. If floating rounding
    /// leaves the cumulative walk short of the drawn value, the first item
    /// is returned rather than failing.
    pub fn sample<R: SampleRng>(&self, rng: &mut R) -> Option<&T> {
        if self.is_empty() {
            return None;
        }
        let draw = rng.next_f64_unit();
        let mut cumulative = 0.0;
        for (item, weight) in self.iter() {
            cumulative += weight;
            if draw < cumulative {
                return Some(item);
            }
        }
        self.items.first()
    }

    /// Sample, then delete the sampled item and renormalize.
    pub fn sample_with_removal<R: SampleRng>(&mut self, rng: &mut R) -> Option<T> {
        let sampled = self.sample(rng)?.clone();
        self.remove(&sampled);
        Some(sampled)
    }

    /// The highest-weighted item; insertion order breaks ties.
    pub fn most_likely(&self) -> Option<&T> {
        let mut best: Option<(usize, f64)> = None;
        for (index, weight) in self.weights.iter().copied().enumerate() {
            match best {
                Some((_, best_weight)) if weight <= best_weight => {}
                _ => best = Some((index, weight)),
            }
        }
        best.map(|(index, _)| &self.items[index])
    }

    /// Items in descending weight order; ties keep insertion order.
    pub fn ordered_by_weight(&self) -> Vec<(&T, f64)> {
        let mut indexed: Vec<usize> = (0..self.len()).collect();
        indexed.sort_by(|&a, &b| {
            self.weights[b]
                .partial_cmp(&self.weights[a])
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.cmp(&b))
        });
        indexed
            .into_iter()
            .map(|i| (&self.items[i], self.weights[i]))
            .collect()
    }

    /// Snapshot of the raw weight vector, aligned with insertion order.
    pub fn weights(&self) -> Vec<f64> {
        self.weights.clone()
    }

    /// Restore a weight snapshot taken by [`weights`](Self::weights).
    ///
    /// Ignored if the entry count changed since the snapshot; the caller
    /// (slot freezing) treats that as "the snapshot is stale, keep current".
    pub fn restore_weights(&mut self, snapshot: &[f64]) {
        if snapshot.len() == self.len() {
            self.weights.copy_from_slice(snapshot);
            self.normalize();
        }
    }

    /// Binarize for deterministic greedy evaluation: weights strictly below
    /// the mean drop to zero, the rest become equal shares.
    pub fn binarize_below_mean(&mut self) {
        if self.is_empty() {
            return;
        }
        let mean = self.weights.iter().sum::<f64>() / self.len() as f64;
        for w in self.weights.iter_mut() {
            *w = if *w < mean { 0.0 } else { 1.0 };
        }
        self.normalize();
    }
}

impl<T: Clone + Eq + Hash> Distribution<T> {
    /// Cross-entropy style incremental update toward observed elite
    /// frequencies:
    ///
    /// `new = step_size * count/total_samples + (1 - step_size) * old`
    ///
    /// followed by renormalization. Items absent from `counts` count as
    /// zero. Returns the total absolute weight change, for convergence
    /// checks.
    pub fn update_towards(
        &mut self,
        counts: &HashMap<T, f64>,
        total_samples: f64,
        step_size: f64,
    ) -> f64 {
        if self.is_empty() || total_samples <= 0.0 {
            return 0.0;
        }
        let before = self.weights.clone();
        for (item, weight) in self.items.iter().zip(self.weights.iter_mut()) {
            let observed = counts.get(item).copied().unwrap_or(0.0) / total_samples;
            *weight = step_size * observed + (1.0 - step_size) * *weight;
        }
        self.normalize();
        before
            .iter()
            .zip(self.weights.iter())
            .map(|(old, new)| (old - new).abs())
            .sum()
    }
}
