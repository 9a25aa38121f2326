use std::hash::Hash;

use rayon::iter::{IndexedParallelIterator, IntoParallelRefIterator};
use rayon::iter::ParallelIterator as _;
use rustc_hash::FxHashMap;
use sprs::CsMat;

/// Which of the two declared sides of a bipartite graph a vertex is on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// Struct that represents a weighted graph over generic vertex labels.
///
/// Labels are mapped to dense vertex indices in insertion order; all
/// engine-facing methods speak indices, the label table maps back and forth.
pub struct Graph<T> {
    /// The CsMat (from sprs) is used to store adjacency and edge weights as
    /// a sparse matrix in CSR format. Row = source, column = target. An
    /// undirected graph is stored symmetrically.
    pub graph_csr: CsMat<f64>,

    labels: Vec<T>,
    index: FxHashMap<T, usize>,
}

impl<T: Clone + Eq + Hash> Graph<T> {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self {
            graph_csr: CsMat::empty(sprs::CSR, 0),
            labels: Vec::new(),
            index: FxHashMap::default(),
        }
    }

    /// Build an undirected graph with unit edge weights.
    pub fn from_edges<I>(edges: I) -> Self
    where
        I: IntoIterator<Item = (T, T)>,
    {
        let mut graph = Self::new();
        for (a, b) in edges {
            graph.insert_undirected(a, b, 1.0);
        }
        graph
    }

    /// Build an undirected graph with explicit edge weights.
    pub fn from_weighted_edges<I>(edges: I) -> Self
    where
        I: IntoIterator<Item = (T, T, f64)>,
    {
        let mut graph = Self::new();
        for (a, b, weight) in edges {
            graph.insert_undirected(a, b, weight);
        }
        graph
    }

    /// The number of vertices in the graph.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether the graph has no vertices.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Register a vertex and return its index. Registering the same label
    /// twice returns the existing index.
    pub fn add_vertex(&mut self, label: T) -> usize {
        if let Some(&i) = self.index.get(&label) {
            return i;
        }
        let i = self.labels.len();
        self.index.insert(label.clone(), i);
        self.labels.push(label);
        i
    }

    /// The index of a registered vertex label.
    pub fn vertex_index(&self, label: &T) -> Option<usize> {
        self.index.get(label).copied()
    }

    /// The label of the vertex at `index`.
    pub fn label(&self, index: usize) -> &T {
        &self.labels[index]
    }

    /// All vertex labels, in index order.
    pub fn labels(&self) -> &[T] {
        &self.labels
    }

    /// Insert a directed edge, registering both endpoints.
    pub fn insert(&mut self, from: T, to: T, weight: f64) {
        let i = self.add_vertex(from);
        let j = self.add_vertex(to);
        self.graph_csr.insert(i, j, weight);
    }

    /// Insert an edge in both directions.
    pub fn insert_undirected(&mut self, a: T, b: T, weight: f64) {
        let i = self.add_vertex(a);
        let j = self.add_vertex(b);
        self.graph_csr.insert(i, j, weight);
        if i != j {
            self.graph_csr.insert(j, i, weight);
        }
    }

    /// Get the stored weight of the edge between two vertex indices.
    pub fn get_edge_weight(&self, from: usize, to: usize) -> Option<f64> {
        self.graph_csr.get(from, to).cloned()
    }

    /// An iterator over the out-neighbors of the given vertex, with edge
    /// weights. Vertices without outgoing edges yield nothing.
    pub fn neighbors(&self, vertex: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let (indices, data) = match self.graph_csr.outer_view(vertex) {
            Some(row) => row.into_raw_storage(),
            None => (&[] as &[usize], &[] as &[f64]),
        };
        indices.iter().cloned().zip(data.iter().cloned())
    }

    /// In-neighbors of every vertex, with edge weights, ordered by source
    /// index. Built once per refinement run to drive incremental updates.
    pub fn reverse_adjacency(&self) -> Vec<Vec<(usize, f64)>> {
        let mut rev = vec![Vec::new(); self.len()];
        for (from, row) in self.graph_csr.outer_iterator().enumerate() {
            for (to, &weight) in row.iter() {
                rev[to].push((from, weight));
            }
        }
        rev
    }

    /// The crossing weight of a coloring.
    ///
    /// Given a coloring and a weighted graph, the crossing weight is the
    /// total weight of the stored (directed) edges that link vertices of
    /// different colors. For a symmetrically stored undirected graph every
    /// undirected edge therefore counts once per direction.
    pub fn crossing_weight(&self, colors: &[usize]) -> f64 {
        debug_assert_eq!(self.len(), colors.len());

        let indptr = self.graph_csr.indptr().into_raw_storage();
        let indices = self.graph_csr.indices();
        let data = self.graph_csr.data();
        indptr
            .par_iter()
            .zip(&indptr[1..])
            .enumerate()
            .map(|(vertex, (start, end))| {
                let neighbors = &indices[*start..*end];
                let edge_weights = &data[*start..*end];
                let vertex_color = colors[vertex];
                neighbors
                    .iter()
                    .zip(edge_weights)
                    .filter(|(neighbor, _edge_weight)| vertex_color != colors[**neighbor])
                    .map(|(_neighbor, edge_weight)| *edge_weight)
                    .sum::<f64>()
            })
            .sum()
    }
}

impl Graph<usize> {
    /// Wrap an adjacency matrix, labelling vertices `0..n`.
    pub fn from_csr(graph_csr: CsMat<f64>) -> Self {
        debug_assert_eq!(graph_csr.rows(), graph_csr.cols());
        let n = graph_csr.rows();
        let labels: Vec<usize> = (0..n).collect();
        let index = labels.iter().map(|&v| (v, v)).collect();
        Self {
            graph_csr,
            labels,
            index,
        }
    }
}
