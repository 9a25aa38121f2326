use std::fs::File;
use std::io::Write;
use std::path::Path;

use sprs::io::{read_matrix_market, IoError};

use crate::graph::Graph;

/// Read a matrix market file as a graph whose vertex labels are `0..n`.
pub fn read_matrix_market_as_graph(file_path: &Path) -> Result<Graph<usize>, IoError> {
    // Read the matrix market file as a TriMat with edge weights, then
    // convert to CSR.
    let tri_mat = read_matrix_market(file_path)?;
    Ok(Graph::from_csr(tri_mat.to_csr()))
}

/// Write the vertex to color mapping to a file.
pub fn write_coloring_to_file(colors: &[usize], file_name: &str) -> std::io::Result<()> {
    let mut file = File::create(file_name)?;
    for vertex_id in 0..colors.len() {
        writeln!(file, "vertex {} => color {}", vertex_id, colors[vertex_id])?;
    }
    Ok(())
}
