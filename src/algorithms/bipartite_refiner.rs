// Bipartite specialization of the fixpoint engine.
//
// In a bipartite graph a vertex only ever sends weight to the opposite
// side, so the witness scan ranges over half the classes and a whole
// side can be split in one batch: same-side moves never change same-side
// statistics, which keeps every proposal of a half-pass exact. Splits are
// committed in class-ID order so the batch is deterministic.

use std::collections::BTreeSet;
use std::hash::Hash;
use std::time::{Duration, Instant};

use log::debug;
use rayon::iter::IntoParallelRefIterator;
use rayon::iter::ParallelIterator as _;

use crate::algorithms::{Error, RefineStats, StopReason};
use crate::graph::{Graph, Side};
use crate::qerror::{best_split, class_q_error, class_q_error_over, conn_table, Q_TOL};

struct Proposal {
    class: usize,

    // Members sorted by aggregate weight toward the witness class,
    // tie-broken by vertex index.
    order: Vec<usize>,

    // Position of the first mover in `order`.
    boundary: usize,
}

fn propose(
    conn: &[Vec<f64>],
    class: usize,
    members: &[usize],
    targets: &[usize],
    threshold: f64,
) -> Option<Proposal> {
    let (q_err, witness) = class_q_error_over(conn, members, targets.iter().copied());
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
        class,
        order,
        boundary: split.boundary,
    })
}

fn bipartite_refine<T: Clone + Eq + Hash>(
    colors: &mut [usize],
    graph: &Graph<T>,
    sides: &[Side],
    eps: Option<f64>,
    early_stop: Option<usize>,
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
    for vertex in 0..graph.len() {
        for (neighbor, _edge_weight) in graph.neighbors(vertex) {
            if sides[neighbor] == sides[vertex] {
                return Err(Error::NotBipartite {
                    from: vertex,
                    to: neighbor,
                });
            }
        }
    }

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
    // Classes must not straddle sides, otherwise side-local passes would
    // commit splits against stale statistics.
    let mut class_side = Vec::with_capacity(members.len());
    for class in &members {
        let side = sides[class[0]];
        if class.iter().any(|&vertex| sides[vertex] != side) {
            return Err(Error::MalformedWarmStart);
        }
        class_side.push(side);
    }

    let mut conn = conn_table(graph, colors, members.len())?;
    let rev = graph.reverse_adjacency();

    let threshold = eps.unwrap_or(0.0) + Q_TOL;
    let budget = early_stop.unwrap_or(usize::MAX);
    let start = Instant::now();
    let mut rounds = 0u32;
    let mut splits = 0u32;
    let mut dirty: BTreeSet<usize> = (0..members.len()).collect();

    let stop = 'outer: loop {
        rounds += 1;
        let mut any_split = false;

        for side in [Side::Left, Side::Right] {
            if time_limit.map_or(false, |limit| start.elapsed() >= limit) {
                break 'outer StopReason::TimeLimit;
            }
            if members.len() >= budget {
                break 'outer StopReason::ColorBudget;
            }

            let candidates: Vec<usize> = dirty
                .iter()
                .copied()
                .filter(|&class| class_side[class] == side)
                .collect();
            if candidates.is_empty() {
                continue;
            }
            let targets: Vec<usize> = (0..members.len())
                .filter(|&class| class_side[class] != side)
                .collect();

            let proposals: Vec<Proposal> = candidates
                .par_iter()
                .map(|&class| propose(&conn, class, &members[class], &targets, threshold))
                .collect::<Vec<Option<Proposal>>>()
                .into_iter()
                .flatten()
                .collect();
            for &class in &candidates {
                dirty.remove(&class);
            }

            // Commit the whole side in class-ID order; moves on this side
            // only perturb opposite-side statistics, so none of these
            // proposals can invalidate another.
            for proposal in proposals {
                if members.len() >= budget {
                    break 'outer StopReason::ColorBudget;
                }
                let class = proposal.class;
                let new_color = members.len();
                let mut keepers = proposal.order[..proposal.boundary].to_vec();
                let mut movers = proposal.order[proposal.boundary..].to_vec();
                keepers.sort_unstable();
                movers.sort_unstable();
                debug!(
                    "pass {rounds}: splitting class {class} into {} + {} vertices",
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
                class_side.push(side);
                splits += 1;
                any_split = true;
            }
        }

        if !any_split {
            break StopReason::Converged;
        }
    };

    let max_q_error = members
        .iter()
        .map(|class| class_q_error(&conn, class).0)
        .fold(0.0, f64::max);
    debug!(
        "bipartite refinement stopped after {rounds} passes: {} colors, max q-error {max_q_error:.6}",
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

/// Bipartite Fixpoint Refiner
///
/// Same semantics as [`FixpointRefiner`](crate::algorithms::FixpointRefiner)
/// restricted to graphs with two declared vertex sides and edges only
/// across sides. Refines the sides in interleaved side-local passes,
/// which is faster but less general: no pinned vertices, and starting
/// classes must not straddle sides.
#[derive(Debug, Clone, Default)]
pub struct BipartiteRefiner {
    /// Maximum tolerated per-class q-error. `None` leaves the error bound
    /// unset; `Some(0.0)` explicitly requests exact refinement. At least
    /// one of `eps` and `early_stop` must be set.
    pub eps: Option<f64>,

    /// Hard cap on the number of colors. Refinement halts once reached,
    /// even if the error bound is not yet satisfied.
    pub early_stop: Option<usize>,

    /// Wall-clock budget, checked between half-passes. On expiry the best
    /// coloring found so far is returned, marked non-final in the stats.
    pub time_limit: Option<Duration>,
}

impl<'a, T: Clone + Eq + Hash> crate::Refine<(&'a Graph<T>, &'a [Side])> for BipartiteRefiner {
    type Metadata = RefineStats;
    type Error = Error;

    fn refine(
        &mut self,
        colors: &mut [usize],
        (graph, sides): (&'a Graph<T>, &'a [Side]),
    ) -> Result<Self::Metadata, Self::Error> {
        if colors.len() != graph.len() {
            return Err(Error::InputLenMismatch {
                expected: graph.len(),
                actual: colors.len(),
            });
        }
        if sides.len() != graph.len() {
            return Err(Error::InputLenMismatch {
                expected: graph.len(),
                actual: sides.len(),
            });
        }
        bipartite_refine(colors, graph, sides, self.eps, self.early_stop, self.time_limit)
    }
}
