// Greedy fixpoint refinement for quasi-stable colorings.
//
// Each round recomputes split proposals for the classes whose statistics
// changed, commits the single split buying the largest q-error reduction,
// and updates the per-vertex connectivity table incrementally from the
// reverse adjacency of the moved vertices.

use std::collections::BTreeSet;
use std::hash::Hash;
use std::time::{Duration, Instant};

use log::debug;
use rayon::iter::IntoParallelRefIterator;
use rayon::iter::ParallelIterator as _;

use crate::algorithms::{Error, RefineStats, StopReason};
use crate::graph::Graph;
use crate::qerror::{best_split, class_q_error, conn_table, Q_TOL};

/// A pending binary split of one class.
struct Proposal {
    // The class's current q-error.
    q_err: f64,

    // Worst residual spread along the witness dimension after the cut.
    residual: f64,

    // Members sorted by aggregate weight toward the witness class,
    // tie-broken by vertex index.
    order: Vec<usize>,

    // Position of the first mover in `order`.
    boundary: usize,
}

fn propose(conn: &[Vec<f64>], members: &[usize], threshold: f64) -> Option<Proposal> {
    let (q_err, witness) = class_q_error(conn, members);
    if q_err <= threshold {
        return None;
    }
    let mut order = members.to_vec();
    order.sort_unstable_by(|&a, &b| {
        conn[a][witness]
            .total_cmp(&conn[b][witness])
            .then(a.cmp(&b))
    });
    let values: Vec<f64> = order.iter().map(|&v| conn[v][witness]).collect();
    let split = best_split(&values)?;
    Some(Proposal {
        q_err,
        residual: split.residual,
        order,
        boundary: split.boundary,
    })
}

fn fixpoint_refine<T: Clone + Eq + Hash>(
    colors: &mut [usize],
    graph: &Graph<T>,
    eps: Option<f64>,
    early_stop: Option<usize>,
    special: &[usize],
    time_limit: Option<Duration>,
) -> Result<RefineStats, Error> {
    if eps.is_none() && early_stop.is_none() || early_stop == Some(0) {
        return Err(Error::InvalidConfiguration);
    }
    if graph.is_empty() {
        return Ok(RefineStats {
            rounds: 0,
            splits: 0,
            num_colors: 0,
            max_q_error: 0.0,
            stop: StopReason::Converged,
        });
    }
    for &weight in graph.graph_csr.data() {
        if !weight.is_finite() || weight < 0.0 {
            return Err(Error::InvalidWeights { weight });
        }
    }

    // The starting coloring must name every color in 0..num_colors.
    let num_colors = colors.iter().max().map_or(0, |&max| max + 1);
    if num_colors > colors.len() {
        return Err(Error::MalformedWarmStart);
    }
    let mut members = vec![Vec::new(); num_colors];
    for (vertex, &color) in colors.iter().enumerate() {
        members[color].push(vertex);
    }
    if members.iter().any(|class| class.is_empty()) {
        return Err(Error::MalformedWarmStart);
    }

    // Carve every special vertex out into its own singleton class.
    let mut pinned = special.to_vec();
    pinned.sort_unstable();
    pinned.dedup();
    if pinned.last().map_or(false, |&v| v >= colors.len()) {
        return Err(Error::InvalidConfiguration);
    }
    for &vertex in &pinned {
        let class = colors[vertex];
        if members[class].len() > 1 {
            members[class].retain(|&member| member != vertex);
            colors[vertex] = members.len();
            members.push(vec![vertex]);
        }
    }

    let mut conn = conn_table(graph, colors, members.len())?;
    let rev = graph.reverse_adjacency();

    let threshold = eps.unwrap_or(0.0) + Q_TOL;
    let budget = early_stop.unwrap_or(usize::MAX);
    let start = Instant::now();
    let mut rounds = 0u32;
    let mut splits = 0u32;
    let mut proposals: Vec<Option<Proposal>> = (0..members.len()).map(|_| None).collect();
    let mut dirty: BTreeSet<usize> = (0..members.len()).collect();

    let stop = loop {
        if time_limit.map_or(false, |limit| start.elapsed() >= limit) {
            break StopReason::TimeLimit;
        }
        if members.len() >= budget {
            break StopReason::ColorBudget;
        }
        rounds += 1;

        // Re-examine only the classes whose statistics changed; the merge
        // back into `proposals` is keyed by class ID, so worker order
        // cannot leak into the result.
        let dirty_list: Vec<usize> = dirty.iter().copied().collect();
        let updates: Vec<(usize, Option<Proposal>)> = dirty_list
            .par_iter()
            .map(|&class| (class, propose(&conn, &members[class], threshold)))
            .collect();
        for (class, proposal) in updates {
            proposals[class] = proposal;
        }
        dirty.clear();

        // Greedy choice: the split buying the largest error reduction for
        // its one new color, lowest class ID on ties.
        let mut best: Option<(f64, usize)> = None;
        for (class, proposal) in proposals.iter().enumerate() {
            if let Some(proposal) = proposal {
                let score = proposal.q_err - proposal.residual;
                if best.map_or(true, |(best_score, _)| score > best_score) {
                    best = Some((score, class));
                }
            }
        }
        let class = match best {
            Some((_score, class)) => class,
            None => break StopReason::Converged,
        };
        let proposal = match proposals[class].take() {
            Some(proposal) => proposal,
            None => break StopReason::Converged,
        };

        let new_color = members.len();
        let mut keepers = proposal.order[..proposal.boundary].to_vec();
        let mut movers = proposal.order[proposal.boundary..].to_vec();
        keepers.sort_unstable();
        movers.sort_unstable();
        debug!(
            "round {rounds}: splitting class {class} (q-error {:.6}) into {} + {} vertices",
            proposal.q_err,
            keepers.len(),
            movers.len(),
        );

        for &vertex in &movers {
            colors[vertex] = new_color;
        }
        for row in conn.iter_mut() {
            row.push(0.0);
        }
        for &mover in &movers {
            for &(source, weight) in &rev[mover] {
                conn[source][class] -= weight;
                conn[source][new_color] += weight;
                dirty.insert(colors[source]);
            }
        }
        dirty.insert(class);
        dirty.insert(new_color);
        members[class] = keepers;
        members.push(movers);
        proposals.push(None);
        splits += 1;
    };

    let max_q_error = members
        .iter()
        .map(|class| class_q_error(&conn, class).0)
        .fold(0.0, f64::max);
    debug!(
        "refinement stopped after {rounds} rounds: {} colors, max q-error {max_q_error:.6}",
        members.len(),
    );
    Ok(RefineStats {
        rounds,
        splits,
        num_colors: members.len(),
        max_q_error,
        stop,
    })
}

/// Quasi-Stable Fixpoint Refiner
///
/// Splits color classes until every class's q-error is within `eps`, the
/// color budget is exhausted, or no split can reduce the error any
/// further. Refinement only splits classes, so the result is always at
/// least as fine as the starting coloring.
#[derive(Debug, Clone, Default)]
pub struct FixpointRefiner {
    /// Maximum tolerated per-class q-error. `None` leaves the error bound
    /// unset; `Some(0.0)` explicitly requests exact refinement. At least
    /// one of `eps` and `early_stop` must be set.
    pub eps: Option<f64>,

    /// Hard cap on the number of colors. Refinement halts once reached,
    /// even if the error bound is not yet satisfied.
    pub early_stop: Option<usize>,

    /// Vertex indices pinned to singleton classes for the entire run.
    pub special: Vec<usize>,

    /// Wall-clock budget, checked between rounds. On expiry the best
    /// coloring found so far is returned, marked non-final in the stats.
    pub time_limit: Option<Duration>,
}

impl<'a, T: Clone + Eq + Hash> crate::Refine<&'a Graph<T>> for FixpointRefiner {
    type Metadata = RefineStats;
    type Error = Error;

    fn refine(
        &mut self,
        colors: &mut [usize],
        graph: &'a Graph<T>,
    ) -> Result<Self::Metadata, Self::Error> {
        if colors.len() != graph.len() {
            return Err(Error::InputLenMismatch {
                expected: graph.len(),
                actual: colors.len(),
            });
        }
        fixpoint_refine(
            colors,
            graph,
            self.eps,
            self.early_stop,
            &self.special,
            self.time_limit,
        )
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_ulps_eq;
    use itertools::assert_equal;

    use super::*;
    use crate::Refine;

    fn star(leaves: usize) -> Graph<usize> {
        Graph::from_edges((1..=leaves).map(|leaf| (0, leaf)))
    }

    #[test]
    fn test_star_splits_center_from_leaves() {
        // Arrange
        let graph = star(4);
        let mut colors = vec![0; 5];

        // Act
        let stats = FixpointRefiner {
            eps: Some(0.0),
            ..Default::default()
        }
        .refine(&mut colors, &graph)
        .unwrap();

        // Assert
        assert_equal(colors, [1, 0, 0, 0, 0]);
        assert_eq!(stats.num_colors, 2);
        assert_eq!(stats.splits, 1);
        assert_eq!(stats.stop, StopReason::Converged);
        assert_ulps_eq!(stats.max_q_error, 0.0);
    }

    #[test]
    fn test_eps_bounds_the_refinement() {
        // Arrange: a weighted star; leaf weights 1.0, 1.1 and 5.0.
        let graph = Graph::from_weighted_edges([
            ("c", "l1", 1.0),
            ("c", "l2", 1.1),
            ("c", "l3", 5.0),
        ]);
        let mut colors = vec![0; 4];

        // Act
        let stats = FixpointRefiner {
            eps: Some(2.0),
            ..Default::default()
        }
        .refine(&mut colors, &graph)
        .unwrap();

        // Assert: {l1, l2}, {l3} and {c} separate; residual spread is the
        // 0.1 between the two light leaves.
        assert_equal(colors, [2, 0, 0, 1]);
        assert_eq!(stats.num_colors, 3);
        assert!(stats.max_q_error <= 2.0);
        assert_ulps_eq!(stats.max_q_error, 0.1, max_ulps = 8);
    }

    #[test]
    fn test_looser_eps_stops_earlier() {
        // Arrange: same star, but 2.1 of spread is now tolerable.
        let graph = Graph::from_weighted_edges([
            ("c", "l1", 1.0),
            ("c", "l2", 1.1),
            ("c", "l3", 5.0),
        ]);
        let mut colors = vec![0; 4];

        // Act
        let stats = FixpointRefiner {
            eps: Some(2.2),
            ..Default::default()
        }
        .refine(&mut colors, &graph)
        .unwrap();

        // Assert: {l1, l2} and {l3, c}.
        assert_equal(colors, [1, 0, 0, 1]);
        assert_eq!(stats.num_colors, 2);
        assert!(stats.max_q_error <= 2.2);
    }

    #[test]
    fn test_early_stop_caps_the_color_count() {
        // Arrange: path 0-1-2-3-4 whose stable coloring needs 3 colors.
        let graph = Graph::from_edges([(0, 1), (1, 2), (2, 3), (3, 4)]);
        let mut colors = vec![0; 5];

        // Act
        let stats = FixpointRefiner {
            early_stop: Some(2),
            ..Default::default()
        }
        .refine(&mut colors, &graph)
        .unwrap();

        // Assert: endpoints against inner vertices, error still present.
        assert_equal(colors, [0, 1, 1, 1, 0]);
        assert_eq!(stats.stop, StopReason::ColorBudget);
        assert_eq!(stats.num_colors, 2);
        assert_ulps_eq!(stats.max_q_error, 1.0);
    }

    #[test]
    fn test_special_vertices_stay_singletons() {
        // Arrange: two disjoint triangles; vertex 0 is pinned.
        let graph = Graph::from_edges([(0, 1), (1, 2), (2, 0), (3, 4), (4, 5), (5, 3)]);
        let mut colors = vec![0; 6];

        // Act
        let stats = FixpointRefiner {
            eps: Some(0.0),
            special: vec![0],
            ..Default::default()
        }
        .refine(&mut colors, &graph)
        .unwrap();

        // Assert: {0}, its two triangle mates, and the untouched triangle.
        assert_eq!(stats.num_colors, 3);
        assert_eq!(colors[1], colors[2]);
        assert_eq!(colors[3], colors[4]);
        assert_eq!(colors[4], colors[5]);
        assert_ne!(colors[0], colors[1]);
        assert_ne!(colors[0], colors[3]);
        assert_ne!(colors[1], colors[3]);
    }

    #[test]
    fn test_warm_start_is_only_ever_split() {
        // Arrange: two triangles, warm-started with {0, 1} | {2..5}.
        let graph = Graph::from_edges([(0, 1), (1, 2), (2, 0), (3, 4), (4, 5), (5, 3)]);
        let warm = [0, 0, 1, 1, 1, 1];
        let mut colors = warm.to_vec();

        // Act
        FixpointRefiner {
            eps: Some(0.0),
            ..Default::default()
        }
        .refine(&mut colors, &graph)
        .unwrap();

        // Assert: vertex 2 is separated from the second triangle, the rest
        // of the warm classes survive intact.
        assert_equal(colors.iter().copied(), [0, 0, 2, 1, 1, 1]);
        for (vertex, &color) in colors.iter().enumerate() {
            for (other, &other_color) in colors.iter().enumerate() {
                if color == other_color {
                    assert_eq!(warm[vertex], warm[other]);
                }
            }
        }
    }

    #[test]
    fn test_time_limit_returns_non_final_coloring() {
        // Arrange
        let graph = star(8);
        let mut colors = vec![0; 9];

        // Act
        let stats = FixpointRefiner {
            eps: Some(0.0),
            time_limit: Some(Duration::ZERO),
            ..Default::default()
        }
        .refine(&mut colors, &graph)
        .unwrap();

        // Assert: the starting coloring comes back untouched, tagged.
        assert_eq!(stats.stop, StopReason::TimeLimit);
        assert!(!stats.is_final());
        assert_equal(colors, vec![0; 9]);
    }

    #[test]
    fn test_missing_stopping_criterion_is_rejected() {
        // Arrange
        let graph = star(2);
        let mut colors = vec![0; 3];

        // Act
        let result = FixpointRefiner::default().refine(&mut colors, &graph);

        // Assert
        assert_eq!(result.unwrap_err(), Error::InvalidConfiguration);
    }

    #[test]
    fn test_negative_weight_is_rejected() {
        // Arrange
        let mut graph = Graph::new();
        graph.insert(0, 1, -1.0);
        let mut colors = vec![0; 2];

        // Act
        let result = FixpointRefiner {
            eps: Some(0.0),
            ..Default::default()
        }
        .refine(&mut colors, &graph);

        // Assert
        assert_eq!(result.unwrap_err(), Error::InvalidWeights { weight: -1.0 });
    }

    #[test]
    fn test_gapped_color_ids_are_rejected() {
        // Arrange
        let graph = star(2);
        let mut colors = vec![0, 2, 2];

        // Act
        let result = FixpointRefiner {
            eps: Some(0.0),
            ..Default::default()
        }
        .refine(&mut colors, &graph);

        // Assert
        assert_eq!(result.unwrap_err(), Error::MalformedWarmStart);
    }

    #[test]
    fn test_coloring_length_mismatch_is_rejected() {
        // Arrange
        let graph = star(2);
        let mut colors = vec![0; 2];

        // Act
        let result = FixpointRefiner {
            eps: Some(0.0),
            ..Default::default()
        }
        .refine(&mut colors, &graph);

        // Assert
        assert_eq!(
            result.unwrap_err(),
            Error::InputLenMismatch {
                expected: 3,
                actual: 2,
            },
        );
    }
}
