use std::hash::Hash;

use num_traits::ToPrimitive;
use rustc_hash::FxHashMap;
use sprs::{CsMat, TriMat};

use crate::coloring::Coloring;
use crate::graph::Graph;

/// The compressed graph: color classes as vertices, aggregated original
/// edge weight between them.
///
/// Built fresh from a stabilized coloring and never mutated in place.
/// Downstream consumers run their algorithm on this graph and lift the
/// per-class results back through the originating [`Coloring`].
pub struct CompressedGraph {
    /// Aggregated adjacency in CSR format: entry (c, d) is the summed
    /// weight of original edges from members of class c to members of
    /// class d. Diagonal entries keep the within-class weight.
    pub adj: CsMat<f64>,

    /// Original member count per class.
    pub sizes: Vec<usize>,
}

impl CompressedGraph {
    /// The number of classes.
    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    /// Whether the compressed graph has no classes.
    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }

    /// The number of original vertices merged into `class`.
    pub fn class_size(&self, class: usize) -> usize {
        self.sizes[class]
    }

    /// An iterator over the out-neighbor classes of `class`, with the
    /// aggregated weights.
    pub fn neighbors(&self, class: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let (indices, data) = match self.adj.outer_view(class) {
            Some(row) => row.into_raw_storage(),
            None => (&[] as &[usize], &[] as &[f64]),
        };
        indices.iter().cloned().zip(data.iter().cloned())
    }

    /// The summed original edge weight from `from` to `to`.
    pub fn edge_weight(&self, from: usize, to: usize) -> Option<f64> {
        self.adj.get(from, to).cloned()
    }

    /// The summed weight averaged over the member pairs of the two
    /// classes: the "mean" aggregation policy, derived from the stored
    /// sums.
    pub fn mean_edge_weight(&self, from: usize, to: usize) -> Option<f64> {
        let total = self.edge_weight(from, to)?;
        let pairs = (self.sizes[from] * self.sizes[to]).to_f64().unwrap_or(0.0);
        if pairs == 0.0 {
            return None;
        }
        Some(total / pairs)
    }
}

/// Project a coloring of `graph` into its compressed graph.
///
/// Edge weights are aggregated per ordered class pair and assembled
/// through a triplet matrix; entries are added in sorted class order so
/// the CSR layout is reproducible.
pub fn build_compressed<T: Clone + Eq + Hash>(
    graph: &Graph<T>,
    coloring: &Coloring<T>,
) -> CompressedGraph {
    debug_assert_eq!(graph.len(), coloring.len());
    let num_colors = coloring.num_colors();

    let mut aggregated = FxHashMap::default();
    for (from, row) in graph.graph_csr.outer_iterator().enumerate() {
        for (to, &weight) in row.iter() {
            let key = (coloring.color_of_index(from), coloring.color_of_index(to));
            *aggregated.entry(key).or_insert(0.0) += weight;
        }
    }
    let mut entries: Vec<((usize, usize), f64)> = aggregated.into_iter().collect();
    entries.sort_unstable_by_key(|&(key, _weight)| key);

    let mut triplet_matrix = TriMat::with_capacity((num_colors, num_colors), entries.len());
    for ((from, to), weight) in entries {
        triplet_matrix.add_triplet(from, to, weight);
    }
    let sizes = (0..num_colors)
        .map(|class| coloring.members(class).len())
        .collect();

    CompressedGraph {
        adj: triplet_matrix.to_csr(),
        sizes,
    }
}
