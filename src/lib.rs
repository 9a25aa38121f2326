pub mod graph;
pub mod coloring;
pub mod qerror;
pub mod gen_weights;
pub mod io;
pub mod algorithms;
pub mod refine;
pub mod compressed;

pub use coloring::Coloring;
pub use graph::{Graph, Side};
pub use refine::{refine_bipartite, refine_fixpoint, refine_stable, RefineConfig};

// The `Refine` trait allows for refining vertex colorings.
// Refinement algorithms implement this trait.
// The generic argument `M` defines the input of the algorithms (e.g. a
// graph view, or a graph plus its declared bipartite sides).
// The input coloring must be of the correct size; it is the starting point
// of refinement and algorithms only ever split its classes, never merge
// them.
pub trait Refine<M> {
    // Diagnostic data returned for a specific run of the algorithm.
    type Metadata;

    // Error details, should the algorithm fail to run.
    type Error;

    // Refine the given coloring and output the color ID of each vertex in
    // `colors`.
    //
    // Color IDs must be contiguous and start from zero, meaning the number
    // of colors is one plus the maximum of `colors`, and every ID up to the
    // maximum names a non-empty class.
    fn refine(&mut self, colors: &mut [usize], data: M)
              -> Result<Self::Metadata, Self::Error>;
}
