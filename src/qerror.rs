use std::hash::Hash;

use rayon::iter::IntoParallelIterator;
use rayon::iter::ParallelIterator as _;

use crate::algorithms::Error;
use crate::coloring::Coloring;
use crate::graph::Graph;

/// Absolute tolerance used for every spread and eps comparison.
///
/// Split decisions and termination checks use the same tolerance, so
/// floating-point noise below it can neither trigger a split nor keep the
/// fixpoint loop oscillating. Spreads within `Q_TOL` count as zero.
pub const Q_TOL: f64 = 1e-9;

/// The split statistic: for every vertex, the summed weight of its
/// out-edges into each color class.
///
/// Fails if an aggregate stops being finite (e.g. an overflowing sum), so
/// no refinement pass ever runs on poisoned statistics.
pub fn conn_table<T: Clone + Eq + Hash>(
    graph: &Graph<T>,
    colors: &[usize],
    num_colors: usize,
) -> Result<Vec<Vec<f64>>, Error> {
    debug_assert_eq!(graph.len(), colors.len());

    let mut conn = vec![vec![0.0; num_colors]; graph.len()];
    for vertex in 0..graph.len() {
        for (neighbor, weight) in graph.neighbors(vertex) {
            conn[vertex][colors[neighbor]] += weight;
        }
        for &aggregate in &conn[vertex] {
            if !aggregate.is_finite() {
                return Err(Error::InvalidWeights { weight: aggregate });
            }
        }
    }
    Ok(conn)
}

/// The q-error of one class and the target class realizing it.
///
/// The q-error is the largest spread (max minus min) of the members'
/// aggregate weight toward any single target class. Ties go to the lowest
/// target ID.
pub(crate) fn class_q_error(conn: &[Vec<f64>], members: &[usize]) -> (f64, usize) {
    let num_colors = members.first().map_or(0, |&v| conn[v].len());
    class_q_error_over(conn, members, 0..num_colors)
}

/// Same as [`class_q_error`], but ranging only over the given target
/// classes. The bipartite engine restricts the scan to opposite-side
/// classes, since same-side aggregates are identically zero.
pub(crate) fn class_q_error_over<I>(conn: &[Vec<f64>], members: &[usize], targets: I) -> (f64, usize)
where
    I: IntoIterator<Item = usize>,
{
    if members.len() < 2 {
        return (0.0, 0);
    }
    let mut q_err = 0.0;
    let mut witness = 0;
    for target in targets {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for &vertex in members {
            let weight = conn[vertex][target];
            min = min.min(weight);
            max = max.max(weight);
        }
        let spread = max - min;
        if spread > q_err {
            q_err = spread;
            witness = target;
        }
    }
    (q_err, witness)
}

/// The q-error of every class of a coloring, by color ID.
pub fn class_q_errors<T: Clone + Eq + Hash + Sync>(
    graph: &Graph<T>,
    coloring: &Coloring<T>,
) -> Result<Vec<f64>, Error> {
    let conn = conn_table(graph, coloring.colors(), coloring.num_colors())?;
    Ok((0..coloring.num_colors())
        .into_par_iter()
        .map(|color| class_q_error(&conn, coloring.members(color)).0)
        .collect())
}

/// The maximum per-class q-error of a coloring: the approximation error
/// bound carried by merging each class into a single compressed vertex.
pub fn max_q_error<T: Clone + Eq + Hash + Sync>(
    graph: &Graph<T>,
    coloring: &Coloring<T>,
) -> Result<f64, Error> {
    Ok(class_q_errors(graph, coloring)?
        .into_iter()
        .fold(0.0, f64::max))
}

/// A binary cut of a class along its witness dimension.
pub(crate) struct Split {
    /// The larger of the two residual spreads after the cut.
    pub residual: f64,

    /// Position of the first mover in the sorted member sequence.
    pub boundary: usize,
}

/// Choose the binary cut of `values` (ascending) minimizing the larger of
/// the two residual spreads. Ties prefer the larger gap, then the lower
/// boundary. Returns `None` when all values are equal.
pub(crate) fn best_split(values: &[f64]) -> Option<Split> {
    debug_assert!(values.windows(2).all(|pair| pair[0] <= pair[1]));
    if values.len() < 2 {
        return None;
    }
    let first = values[0];
    let last = values[values.len() - 1];
    let mut best: Option<(f64, f64, usize)> = None;
    for i in 0..values.len() - 1 {
        if values[i + 1] <= values[i] {
            continue;
        }
        let residual = (values[i] - first).max(last - values[i + 1]);
        let gap = values[i + 1] - values[i];
        let better = match best {
            None => true,
            Some((best_residual, best_gap, _)) => {
                residual < best_residual || (residual == best_residual && gap > best_gap)
            }
        };
        if better {
            best = Some((residual, gap, i + 1));
        }
    }
    best.map(|(residual, _gap, boundary)| Split { residual, boundary })
}
