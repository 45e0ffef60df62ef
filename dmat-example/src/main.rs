use std::error::Error;
use std::path::PathBuf;

use dmat_core::{
    read_csv_file, write_csv_file, Dimension, DiskMatrix, HeapMatrix, Matrix,
    MatrixFactory, MatrixOps,
};
use dmat_lsolver::{
    algorithms::{lu_solver::split_augmented, LuSolve, SolveAlgorithm},
    condition_number, determinant, inverse, trace,
};

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Usage: dmat-example [augmented.csv] [solution.csv]
    let mut args = std::env::args().skip(1);
    let input = args.next().map(PathBuf::from);
    let output = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::temp_dir().join("dmat-solution.csv"));

    let augmented: HeapMatrix = match &input {
        Some(path) => {
            log::info!("Loading augmented system from {}", path.display());
            read_csv_file(path)?
        }
        None => {
            log::info!("No input given, using the built-in 3x3 system");
            HeapMatrix::from_rows(&[
                [1.0, 1.0, 2.0, -1.0],
                [-1.0, 0.0, 2.0, -3.0],
                [0.0, 1.0, 2.0, -2.0],
            ])?
        }
    };
    let (a, b) = split_augmented(&augmented)?;
    println!("A ({}):", a.dims());
    for row in a.to_rows()? {
        println!("  {:?}", row);
    }
    println!("b: {:?}", b);

    let start_time = std::time::Instant::now();
    let result = LuSolve::default().solve(&a, &b)?;
    println!("x: {:?}", result.x);
    println!(
        "Solved in {:.2?} ({} row exchanges, residual {:.3e})",
        start_time.elapsed(),
        result.metadata.exchange_count,
        result.metadata.residual_norm
    );

    let det = determinant(&a)?.get_or_zero(0, 0);
    println!("det(A) = {}", det);
    println!("trace(A) = {}", trace(&a)?);
    let inv = inverse(&a)?;
    println!("A^-1:");
    for row in inv.to_rows()? {
        println!("  {:?}", row);
    }
    println!("cond(A) = {}", condition_number(&a)?);

    // Same system again, this time memory-mapped through the factory.
    let factory = MatrixFactory::with_params(a.len(), std::env::temp_dir());
    let mut on_disk = factory.create::<f64>(a.dims())?;
    log::info!("Factory picked the {:?} backend for {}", on_disk.backend(), a.dims());
    for r in 0..a.rows() {
        on_disk.set_row(r, &a.row(r)?)?;
    }
    let disk_result = LuSolve::default().solve(&on_disk, &b)?;
    let agree = result
        .x
        .iter()
        .zip(&disk_result.x)
        .all(|(h, d)| (h - d).abs() < 1e-9);
    println!("Disk backend agrees with heap backend: {}", agree);
    on_disk.close()?;

    let mut solution = DiskMatrix::temporary(Dimension::new(0, 1))?;
    for value in &result.x {
        solution.push(*value)?;
    }
    let product = a.multiply(&solution)?;
    log::info!("A * x = {:?}", product.to_vec()?);
    solution.close()?;

    write_csv_file(&HeapMatrix::column_vector(&result.x), &output)?;
    println!("Solution written to {}", output.display());
    Ok(())
}
