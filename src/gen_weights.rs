use std::hash::Hash;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rustc_hash::FxHashMap;

use crate::graph::Graph;

/// Reset every stored edge weight to one.
pub fn apply_unit_weights<T: Clone + Eq + Hash>(graph: &mut Graph<T>) {
    for weight in graph.graph_csr.data_mut() {
        *weight = 1.0;
    }
}

/// Assign each edge a random weight drawn uniformly from [min_weight, max_weight).
///
/// Weights are drawn per unordered vertex pair, so a symmetrically stored
/// undirected graph stays symmetric. Passing a seed makes the assignment
/// reproducible.
pub fn apply_random_weights<T: Clone + Eq + Hash>(
    graph: &mut Graph<T>,
    min_weight: f64,
    max_weight: f64,
    seed: Option<u64>,
) {
    if max_weight < min_weight {
        panic!("Max weight must be greater than min weight.");
    }
    if min_weight <= 0.0 {
        panic!("Max/min weight must be positive.");
    }

    let mut rng = match seed {
        Some(seed) => SmallRng::seed_from_u64(seed),
        None => SmallRng::from_entropy(),
    };

    // CSR iteration is sorted by (row, col), so the pair draws happen in a
    // stable order.
    let mut entries: Vec<(usize, usize)> = Vec::with_capacity(graph.graph_csr.nnz());
    for (from, row) in graph.graph_csr.outer_iterator().enumerate() {
        for (to, _weight) in row.iter() {
            entries.push((from, to));
        }
    }
    let mut pair_weights: FxHashMap<(usize, usize), f64> = FxHashMap::default();
    for &(from, to) in &entries {
        let key = (from.min(to), from.max(to));
        pair_weights
            .entry(key)
            .or_insert_with(|| rng.gen_range(min_weight..max_weight));
    }
    for (&(from, to), weight) in entries.iter().zip(graph.graph_csr.data_mut()) {
        *weight = pair_weights[&(from.min(to), from.max(to))];
    }
}
