use std::fmt;

mod bipartite_refiner;
mod fixpoint_refiner;
mod stable_refiner;

pub use bipartite_refiner::BipartiteRefiner;
pub use fixpoint_refiner::FixpointRefiner;
pub use stable_refiner::StableRefiner;

/// Common errors thrown by refinement algorithms.
#[derive(Clone, Copy, Debug, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// Neither `eps` nor `early_stop` constrains the refinement loop, or an
    /// option was supplied that the chosen algorithm does not accept.
    InvalidConfiguration,

    /// The starting coloring does not assign every vertex exactly one
    /// contiguous color.
    MalformedWarmStart,

    /// An edge weight is negative or non-finite, or an aggregate over edge
    /// weights stopped being finite.
    InvalidWeights { weight: f64 },

    /// An edge links two vertices on the same declared side.
    NotBipartite { from: usize, to: usize },

    /// Input sets don't have matching lengths.
    InputLenMismatch { expected: usize, actual: usize },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidConfiguration => {
                write!(f, "neither eps nor early_stop constrains the refinement loop")
            }
            Error::MalformedWarmStart => {
                write!(f, "warm-start coloring does not partition the vertex set")
            }
            Error::InvalidWeights { weight } => write!(
                f,
                "invalid edge weight {weight} (weights must be finite and non-negative)",
            ),
            Error::NotBipartite { from, to } => write!(
                f,
                "edge {from} -> {to} stays within one declared side",
            ),
            Error::InputLenMismatch { expected, actual } => write!(
                f,
                "input sets don't have the same length (expected {expected} items, got {actual})",
            ),
        }
    }
}

impl std::error::Error for Error {}

/// Why a refinement run stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// No class can be split any further under the error bound.
    Converged,

    /// The color budget was exhausted.
    ColorBudget,

    /// The time limit expired between rounds; the returned coloring is the
    /// best found so far, not a fixpoint.
    TimeLimit,
}

/// Diagnostic data describing one refinement run.
#[derive(Clone, Copy, Debug)]
pub struct RefineStats {
    /// Fixpoint rounds executed.
    pub rounds: u32,

    /// Classes split. Each split introduces exactly one new color.
    pub splits: u32,

    /// Colors in the final coloring.
    pub num_colors: usize,

    /// Maximum per-class q-error of the final coloring.
    pub max_q_error: f64,

    /// Why the run stopped.
    pub stop: StopReason,
}

impl RefineStats {
    /// Whether the returned coloring is final. A time-limit stop returns
    /// the best coloring found so far instead of a fixpoint.
    pub fn is_final(&self) -> bool {
        self.stop != StopReason::TimeLimit
    }
}
