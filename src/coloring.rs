use std::hash::Hash;

use rustc_hash::FxHashMap;

/// The full assignment of every vertex to exactly one color class.
///
/// Both directions of the mapping (vertex to color, color to sorted member
/// list) are derived together at construction time, so they cannot drift
/// apart. Color IDs are contiguous and start from zero.
#[derive(Debug)]
pub struct Coloring<T> {
    labels: Vec<T>,
    index: FxHashMap<T, usize>,
    colors: Vec<usize>,
    members: Vec<Vec<usize>>,
}

impl<T: Clone + Eq + Hash> Coloring<T> {
    pub(crate) fn new(labels: Vec<T>, colors: Vec<usize>) -> Self {
        debug_assert_eq!(labels.len(), colors.len());
        let num_colors = colors.iter().max().map_or(0, |&max| max + 1);
        let mut members = vec![Vec::new(); num_colors];
        for (vertex, &color) in colors.iter().enumerate() {
            members[color].push(vertex);
        }
        debug_assert!(members.iter().all(|class| !class.is_empty()));
        let index = labels
            .iter()
            .cloned()
            .enumerate()
            .map(|(i, label)| (label, i))
            .collect();
        Self {
            labels,
            index,
            colors,
            members,
        }
    }

    /// The number of vertices covered by the coloring.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether the coloring covers no vertices.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// The number of color classes.
    pub fn num_colors(&self) -> usize {
        self.members.len()
    }

    /// The color of a vertex label.
    pub fn color_of(&self, label: &T) -> Option<usize> {
        self.index.get(label).map(|&i| self.colors[i])
    }

    /// The color of the vertex at `index`.
    pub fn color_of_index(&self, index: usize) -> usize {
        self.colors[index]
    }

    /// The color of every vertex, in index order.
    pub fn colors(&self) -> &[usize] {
        &self.colors
    }

    /// The member vertex indices of a color class, ascending.
    pub fn members(&self, color: usize) -> &[usize] {
        &self.members[color]
    }

    /// An iterator over all classes, by color ID.
    pub fn classes(&self) -> impl Iterator<Item = &[usize]> {
        self.members.iter().map(|class| class.as_slice())
    }

    /// The label of the vertex at `index`.
    pub fn label(&self, index: usize) -> &T {
        &self.labels[index]
    }

    /// The member labels of a color class.
    pub fn member_labels(&self, color: usize) -> impl Iterator<Item = &T> {
        self.members[color].iter().map(|&v| &self.labels[v])
    }

    /// Lift one score per color class to one score per vertex.
    ///
    /// This is how downstream consumers map results computed on the
    /// compressed graph back onto original vertices: compute once per
    /// class, broadcast to every member.
    pub fn broadcast(&self, class_scores: &[f64]) -> Vec<f64> {
        debug_assert_eq!(class_scores.len(), self.num_colors());
        self.colors.iter().map(|&c| class_scores[c]).collect()
    }

    /// Whether every class of this coloring is contained in a single class
    /// of `coarser`. Refinement preserves this relation against its warm
    /// start.
    pub fn refines(&self, coarser: &Coloring<T>) -> bool {
        if self.len() != coarser.len() {
            return false;
        }
        self.members.iter().all(|class| {
            let target = coarser.colors[class[0]];
            class.iter().all(|&v| coarser.colors[v] == target)
        })
    }
}
