use dmat_lsolver::{
    algorithms::{LuSolve, SolveAlgorithm},
    condition_number, AnyMatrix, Backend, Dimension, DmatCoreError, Matrix, MatrixFactory,
};
use std::time::Instant;

/// Fills a dense n x n pentadiagonal matrix.
/// Diagonals:
/// - Main: 4.0
/// - Adjacent (+1, -1): -1.0
/// - Outer (+2, -2): -0.5
fn fill_pentadiagonal(a: &mut AnyMatrix, n: usize) -> Result<(), DmatCoreError> {
    for i in 0..n {
        let mut row = vec![0.0; n];
        row[i] = 4.0;
        if i >= 1 {
            row[i - 1] = -1.0;
        }
        if i >= 2 {
            row[i - 2] = -0.5;
        }
        if i + 1 < n {
            row[i + 1] = -1.0;
        }
        if i + 2 < n {
            row[i + 2] = -0.5;
        }
        a.set_row(i, &row)?;
    }
    Ok(())
}

/// Creates a vector b of size n with b[i] = sin(i / n).
fn create_sin_vector(n: usize) -> Vec<f64> {
    (0..n).map(|i| (i as f64 / n as f64).sin()).collect()
}

fn main() -> Result<(), DmatCoreError> {
    // Initialize logging based on RUST_LOG environment variable
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let n = 200;
    let factory = MatrixFactory::new();

    for backend in [Backend::Heap, Backend::Disk] {
        log::info!("Setting up {}x{} pentadiagonal system on {:?}...", n, n, backend);
        let mut a: AnyMatrix = factory.create_with(backend, Dimension::new(n, n))?;
        fill_pentadiagonal(&mut a, n)?;
        let b = create_sin_vector(n);

        let start = Instant::now();
        let result = LuSolve::default().solve(&a, &b)?;
        log::info!(
            "{:?}: solved in {:.2?}, {} row exchanges, residual {:.3e}",
            backend,
            start.elapsed(),
            result.metadata.exchange_count,
            result.metadata.residual_norm
        );
        log::info!("x[0..5] = {:?}", &result.x[..5]);

        if backend == Backend::Heap {
            log::info!("Condition number: {:.4}", condition_number(&a)?);
        }
        a.close()?;
    }
    Ok(())
}
