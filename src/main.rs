use std::path::Path;
use std::time::{Duration, Instant};

use clap::Parser;
use QuasiColor::compressed::build_compressed;
use QuasiColor::gen_weights::{apply_random_weights, apply_unit_weights};
use QuasiColor::io::{read_matrix_market_as_graph, write_coloring_to_file};
use QuasiColor::{refine_fixpoint, RefineConfig};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path of the .mtx file
    mtx_filepath: String,

    /// Filename where the vertex to color mapping can be stored
    coloring_file: String,

    /// Maximum allowed q-error
    #[arg(short, long)]
    eps: Option<f64>,

    /// Maximum number of colors
    #[arg(short = 'k', long)]
    early_stop: Option<usize>,

    /// Vertices pinned to singleton colors (repeatable)
    #[arg(short, long)]
    special: Vec<usize>,

    /// Replace the stored edge weights with unit weights
    #[arg(long, default_value_t = false)]
    unit_weights: bool,

    /// Replace the stored edge weights with random weights in [MIN, MAX)
    #[arg(long, num_args = 2)]
    random_weights: Option<Vec<f64>>,

    /// Seed for the random weight generation
    #[arg(long)]
    seed: Option<u64>,

    /// Time limit in seconds; on expiry the best coloring found so far is kept
    #[arg(short, long)]
    time_limit: Option<f64>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let mut graph = read_matrix_market_as_graph(Path::new(&args.mtx_filepath))?;
    if args.unit_weights {
        apply_unit_weights(&mut graph);
    }
    if let Some(range) = &args.random_weights {
        apply_random_weights(&mut graph, range[0], range[1], args.seed);
    }

    let config = RefineConfig {
        eps: args.eps,
        early_stop: args.early_stop,
        special: args.special.clone(),
        warm_start: Vec::new(),
        time_limit: args.time_limit.map(Duration::from_secs_f64),
    };
    let start = Instant::now();
    let (coloring, stats) = refine_fixpoint(&graph, config)?;
    let elapsed_time = start.elapsed();
    log::info!(
        "refinement stopped with {:?} after {} rounds and {} splits",
        stats.stop,
        stats.rounds,
        stats.splits,
    );

    let compressed = build_compressed(&graph, &coloring);
    write_coloring_to_file(coloring.colors(), &args.coloring_file)?;
    println!("Vertices {:?}", graph.len());
    println!("Colors {:?}", coloring.num_colors());
    println!("Max q-error {:?}", stats.max_q_error);
    println!("Compressed edges {:?}", compressed.adj.nnz());
    println!("Crossing weight {:?}", graph.crossing_weight(coloring.colors()));
    println!("Execution time {:?}", elapsed_time);
    if !stats.is_final() {
        println!("Time limit reached: the coloring is the best found so far, not a fixpoint");
    }
    Ok(())
}
