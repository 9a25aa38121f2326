use std::hash::Hash;
use std::time::Duration;

use crate::algorithms::{BipartiteRefiner, Error, FixpointRefiner, RefineStats, StableRefiner};
use crate::coloring::Coloring;
use crate::graph::{Graph, Side};
use crate::Refine;

/// Options recognized by [`refine_fixpoint`] and [`refine_bipartite`],
/// passed by value.
///
/// The default leaves everything unset; at least one of `eps` and
/// `early_stop` must be set or refinement fails with
/// [`Error::InvalidConfiguration`].
#[derive(Debug, Clone)]
pub struct RefineConfig<T> {
    /// Maximum tolerated per-class q-error. `Some(0.0)` explicitly
    /// requests exact refinement.
    pub eps: Option<f64>,

    /// Hard cap on the resulting number of colors; refinement halts once
    /// reached even if the error bound is not yet satisfied.
    pub early_stop: Option<usize>,

    /// Vertex labels pinned to singleton classes for the entire run.
    pub special: Vec<T>,

    /// Starting partition to refine instead of the trivial single class.
    /// Must cover every vertex exactly once; the result is always at
    /// least as fine-grained.
    pub warm_start: Vec<Vec<T>>,

    /// Wall-clock budget. On expiry the best coloring found so far is
    /// returned, marked non-final in the stats.
    pub time_limit: Option<Duration>,
}

impl<T> Default for RefineConfig<T> {
    fn default() -> Self {
        RefineConfig {
            eps: None,
            early_stop: None,
            special: Vec::new(),
            warm_start: Vec::new(),
            time_limit: None,
        }
    }
}

/// Compute a quasi-stable coloring for `graph`.
///
/// Splits color classes until every class's q-error is within
/// `config.eps`, the `config.early_stop` color budget is exhausted, or no
/// further split can reduce the error. Returns the coloring together with
/// the run diagnostics. Output is deterministic for fixed inputs.
///
/// The empty graph yields an empty coloring.
pub fn refine_fixpoint<T: Clone + Eq + Hash>(
    graph: &Graph<T>,
    config: RefineConfig<T>,
) -> Result<(Coloring<T>, RefineStats), Error> {
    let special = label_indices(graph, &config.special)?;
    let mut colors = starting_colors(graph, &config.warm_start)?;
    let stats = FixpointRefiner {
        eps: config.eps,
        early_stop: config.early_stop,
        special,
        time_limit: config.time_limit,
    }
    .refine(&mut colors, graph)?;
    Ok((Coloring::new(graph.labels().to_vec(), colors), stats))
}

/// Compute the stable coloring for `graph`: the coarsest partition in
/// which equivalent vertices send identical weight to every class.
/// Provided for comparison against the approximate engine.
pub fn refine_stable<T: Clone + Eq + Hash>(graph: &Graph<T>) -> Result<Coloring<T>, Error> {
    let mut colors = vec![0; graph.len()];
    StableRefiner.refine(&mut colors, graph)?;
    Ok(Coloring::new(graph.labels().to_vec(), colors))
}

/// Equivalent to [`refine_fixpoint`] but optimized for bipartite graphs
/// with the declared `sides`. Faster but less general: `special` and
/// `warm_start` are not supported and must be left empty.
pub fn refine_bipartite<T: Clone + Eq + Hash>(
    graph: &Graph<T>,
    sides: &[Side],
    config: RefineConfig<T>,
) -> Result<(Coloring<T>, RefineStats), Error> {
    if !config.special.is_empty() || !config.warm_start.is_empty() {
        return Err(Error::InvalidConfiguration);
    }
    if sides.len() != graph.len() {
        return Err(Error::InputLenMismatch {
            expected: graph.len(),
            actual: sides.len(),
        });
    }

    // One starting class per non-empty side.
    let right = if sides.contains(&Side::Left) { 1 } else { 0 };
    let mut colors: Vec<usize> = sides
        .iter()
        .map(|side| match side {
            Side::Left => 0,
            Side::Right => right,
        })
        .collect();
    let stats = BipartiteRefiner {
        eps: config.eps,
        early_stop: config.early_stop,
        time_limit: config.time_limit,
    }
    .refine(&mut colors, (graph, sides))?;
    Ok((Coloring::new(graph.labels().to_vec(), colors), stats))
}

fn label_indices<T: Clone + Eq + Hash>(
    graph: &Graph<T>,
    labels: &[T],
) -> Result<Vec<usize>, Error> {
    labels
        .iter()
        .map(|label| graph.vertex_index(label).ok_or(Error::InvalidConfiguration))
        .collect()
}

// Map a warm start onto the color slice the engines work on, checking it
// covers every vertex exactly once.
fn starting_colors<T: Clone + Eq + Hash>(
    graph: &Graph<T>,
    warm_start: &[Vec<T>],
) -> Result<Vec<usize>, Error> {
    if warm_start.is_empty() {
        return Ok(vec![0; graph.len()]);
    }
    let mut colors = vec![usize::MAX; graph.len()];
    for (color, class) in warm_start.iter().enumerate() {
        if class.is_empty() {
            return Err(Error::MalformedWarmStart);
        }
        for label in class {
            let vertex = graph
                .vertex_index(label)
                .ok_or(Error::MalformedWarmStart)?;
            if colors[vertex] != usize::MAX {
                return Err(Error::MalformedWarmStart);
            }
            colors[vertex] = color;
        }
    }
    if colors.contains(&usize::MAX) {
        return Err(Error::MalformedWarmStart);
    }
    Ok(colors)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_triangles() -> Graph<&'static str> {
        Graph::from_edges([
            ("a", "b"),
            ("b", "c"),
            ("c", "a"),
            ("d", "e"),
            ("e", "f"),
            ("f", "d"),
        ])
    }

    fn exact() -> RefineConfig<&'static str> {
        RefineConfig {
            eps: Some(0.0),
            ..Default::default()
        }
    }

    #[test]
    fn test_every_vertex_lands_in_exactly_one_class() {
        // Arrange
        let graph = two_triangles();

        // Act
        let (coloring, stats) = refine_fixpoint(&graph, exact()).unwrap();

        // Assert
        assert_eq!(stats.num_colors, coloring.num_colors());
        let total: usize = coloring.classes().map(|class| class.len()).sum();
        assert_eq!(total, graph.len());
        for color in 0..coloring.num_colors() {
            for &vertex in coloring.members(color) {
                assert_eq!(coloring.color_of_index(vertex), color);
            }
        }
    }

    #[test]
    fn test_special_vertex_isolates_its_triangle() {
        // Arrange
        let graph = two_triangles();
        let config = RefineConfig {
            special: vec!["a"],
            ..exact()
        };

        // Act
        let (coloring, _stats) = refine_fixpoint(&graph, config).unwrap();

        // Assert: {a}, {b, c} and {d, e, f}.
        assert_eq!(coloring.num_colors(), 3);
        let special_color = coloring.color_of(&"a").unwrap();
        assert_eq!(coloring.members(special_color).len(), 1);
        assert_eq!(coloring.color_of(&"b"), coloring.color_of(&"c"));
        assert_eq!(coloring.color_of(&"d"), coloring.color_of(&"e"));
        assert_eq!(coloring.color_of(&"e"), coloring.color_of(&"f"));
        assert_ne!(coloring.color_of(&"b"), coloring.color_of(&"d"));
    }

    #[test]
    fn test_result_refines_the_warm_start() {
        // Arrange
        let graph = two_triangles();
        let warm = vec![vec!["a", "b"], vec!["c", "d", "e", "f"]];
        let warm_coloring = Coloring::new(
            graph.labels().to_vec(),
            starting_colors(&graph, &warm).unwrap(),
        );
        let config = RefineConfig {
            warm_start: warm,
            ..exact()
        };

        // Act
        let (coloring, _stats) = refine_fixpoint(&graph, config).unwrap();

        // Assert
        assert!(coloring.refines(&warm_coloring));
        // "c" is cut away from the second triangle, the rest survives.
        assert_eq!(coloring.members(coloring.color_of(&"c").unwrap()).len(), 1);
        assert_eq!(coloring.color_of(&"d"), coloring.color_of(&"f"));
    }

    #[test]
    fn test_tighter_eps_refines_looser_eps() {
        // Arrange
        let graph = Graph::from_weighted_edges([
            ("c", "l1", 1.0),
            ("c", "l2", 1.1),
            ("c", "l3", 5.0),
        ]);

        // Act
        let (tight, _) = refine_fixpoint(
            &graph,
            RefineConfig {
                eps: Some(2.0),
                ..Default::default()
            },
        )
        .unwrap();
        let (loose, _) = refine_fixpoint(
            &graph,
            RefineConfig {
                eps: Some(2.2),
                ..Default::default()
            },
        )
        .unwrap();

        // Act and Assert
        assert!(tight.refines(&loose));
        assert!(tight.num_colors() >= loose.num_colors());
    }

    #[test]
    fn test_raising_the_color_budget_never_raises_the_error() {
        // Arrange: path 0-1-2-3-4.
        let graph = Graph::from_edges([(0, 1), (1, 2), (2, 3), (3, 4)]);

        // Act
        let budgets: Vec<f64> = (2..=4)
            .map(|budget| {
                let (_, stats) = refine_fixpoint(
                    &graph,
                    RefineConfig {
                        early_stop: Some(budget),
                        ..Default::default()
                    },
                )
                .unwrap();
                stats.max_q_error
            })
            .collect();

        // Assert
        assert!(budgets[0] >= budgets[1]);
        assert!(budgets[1] >= budgets[2]);
    }

    #[test]
    fn test_empty_graph_yields_empty_coloring() {
        // Arrange
        let graph: Graph<usize> = Graph::new();

        // Act
        let (coloring, stats) = refine_fixpoint(
            &graph,
            RefineConfig {
                eps: Some(0.0),
                ..Default::default()
            },
        )
        .unwrap();

        // Assert
        assert!(coloring.is_empty());
        assert_eq!(coloring.num_colors(), 0);
        assert_eq!(stats.num_colors, 0);
    }

    #[test]
    fn test_star_collapses_to_center_and_leaves() {
        // Arrange
        let graph = Graph::from_edges((1..=6).map(|leaf| (0, leaf)));

        // Act
        let coloring = refine_stable(&graph).unwrap();

        // Assert
        assert_eq!(coloring.num_colors(), 2);
        assert_eq!(coloring.members(coloring.color_of(&0).unwrap()).len(), 1);
        assert_eq!(coloring.members(coloring.color_of(&1).unwrap()).len(), 6);
    }

    #[test]
    fn test_warm_start_must_partition_the_vertices() {
        // Arrange
        let graph = two_triangles();
        let missing = vec![vec!["a", "b", "c"], vec!["d", "e"]];
        let duplicated = vec![vec!["a", "b", "c"], vec!["c", "d", "e", "f"]];
        let unknown = vec![vec!["a", "b", "c", "z"], vec!["d", "e", "f"]];

        // Act and Assert
        for warm_start in [missing, duplicated, unknown] {
            let result = refine_fixpoint(
                &graph,
                RefineConfig {
                    warm_start,
                    ..exact()
                },
            );
            assert_eq!(result.unwrap_err(), Error::MalformedWarmStart);
        }
    }

    #[test]
    fn test_bipartite_entry_builds_side_classes() {
        // Arrange: complete bipartite K2,3 with unequal side degrees.
        let mut graph = Graph::new();
        for vertex in 0..5 {
            graph.add_vertex(vertex);
        }
        for left in 0..2 {
            for right in 2..5 {
                graph.insert_undirected(left, right, 1.0);
            }
        }
        let sides = [Side::Left, Side::Left, Side::Right, Side::Right, Side::Right];
        let config = RefineConfig {
            eps: Some(0.0),
            ..Default::default()
        };

        // Act
        let (coloring, stats) = refine_bipartite(&graph, &sides, config).unwrap();

        // Assert: both sides are internally uniform already.
        assert_eq!(stats.num_colors, 2);
        assert_eq!(coloring.color_of(&0), coloring.color_of(&1));
        assert_eq!(coloring.color_of(&2), coloring.color_of(&4));
        assert_ne!(coloring.color_of(&0), coloring.color_of(&2));
    }

    #[test]
    fn test_bipartite_entry_rejects_pinning_and_warm_starts() {
        // Arrange
        let graph = Graph::from_edges([(0, 1)]);
        let sides = [Side::Left, Side::Right];
        let config = RefineConfig {
            eps: Some(0.0),
            special: vec![0],
            ..Default::default()
        };

        // Act
        let result = refine_bipartite(&graph, &sides, config);

        // Assert
        assert_eq!(result.unwrap_err(), Error::InvalidConfiguration);
    }
}
