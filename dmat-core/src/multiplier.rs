use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use log::{debug, info};
use parking_lot::Mutex;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::dimension::Dimension;
use crate::error::{DmatCoreError, Result};
use crate::traits::{Element, Matrix};

/// Tuning for matrix products.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MultiplierConfig {
    /// Upper bound on worker threads used by one product.
    pub max_workers: usize,
    /// Result cell count at or above which products run concurrently.
    pub parallel_threshold: usize,
}

impl Default for MultiplierConfig {
    fn default() -> Self {
        Self {
            max_workers: 50,
            parallel_threshold: 1000,
        }
    }
}

impl MultiplierConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(max_workers: usize, parallel_threshold: usize) -> Self {
        Self {
            max_workers,
            parallel_threshold,
        }
    }

    /// Whether a product with `result` shape should be dispatched concurrently.
    pub fn is_parallel(&self, result: Dimension) -> bool {
        result.len() >= self.parallel_threshold
    }
}

/// A strategy computing `C += A * B`.
///
/// Every strategy accumulates onto the values already in `dest`, so a
/// zero-filled destination yields the plain product.
pub trait Multiplier {
    fn multiply_into<A, B, D>(&self, a: &A, b: &B, dest: &mut D) -> Result<()>
    where
        A: Matrix + ?Sized,
        B: Matrix<Value = A::Value> + ?Sized,
        D: Matrix<Value = A::Value> + ?Sized;
}

/// Single-threaded triple loop.
#[derive(Debug, Clone, Copy, Default)]
pub struct NaiveMultiplier;

impl Multiplier for NaiveMultiplier {
    fn multiply_into<A, B, D>(&self, a: &A, b: &B, dest: &mut D) -> Result<()>
    where
        A: Matrix + ?Sized,
        B: Matrix<Value = A::Value> + ?Sized,
        D: Matrix<Value = A::Value> + ?Sized,
    {
        let shape = validate_product(a, b, dest)?;
        let lhs = a.to_vec()?;
        let rhs = b.to_vec()?;
        for i in 0..shape.m {
            let mut row = dest.row(i)?;
            for (j, cell) in row.iter_mut().enumerate() {
                *cell = *cell + dot(&lhs, &rhs, shape, i, j);
            }
            dest.set_row(i, &row)?;
        }
        Ok(())
    }
}

/// Column-partitioned product on a bounded worker pool.
///
/// Each output column is one task. Tasks compute their dot-product strip
/// without holding any lock, then take the destination lock once per cell
/// written.
///
/// Worker pools are built once per width and shared by every multiplier
/// asking for that many workers.
#[derive(Debug, Clone)]
pub struct ConcurrentMultiplier {
    config: MultiplierConfig,
    pool: Arc<ThreadPool>,
}

impl ConcurrentMultiplier {
    pub fn new(config: MultiplierConfig) -> Result<Self> {
        let pool = worker_pool(config.max_workers.max(1))?;
        Ok(Self { config, pool })
    }

    pub fn config(&self) -> &MultiplierConfig {
        &self.config
    }
}

impl Multiplier for ConcurrentMultiplier {
    fn multiply_into<A, B, D>(&self, a: &A, b: &B, dest: &mut D) -> Result<()>
    where
        A: Matrix + ?Sized,
        B: Matrix<Value = A::Value> + ?Sized,
        D: Matrix<Value = A::Value> + ?Sized,
    {
        let shape = validate_product(a, b, dest)?;
        let lhs = a.to_vec()?;
        let rhs = b.to_vec()?;
        debug!(
            "Multiplying {}x{} by {}x{} across {} workers",
            shape.m,
            shape.k,
            shape.k,
            shape.n,
            self.pool.current_num_threads()
        );

        let dest = Mutex::new(dest);
        self.pool.install(|| {
            (0..shape.n).into_par_iter().try_for_each(|j| -> Result<()> {
                let strip: Vec<A::Value> =
                    (0..shape.m).map(|i| dot(&lhs, &rhs, shape, i, j)).collect();
                for (i, value) in strip.into_iter().enumerate() {
                    let mut guard = dest.lock();
                    let existing = guard.get_or_zero(i, j);
                    guard.set(i, j, existing + value)?;
                }
                Ok(())
            })
        })?;
        debug!("Product of {} columns complete", shape.n);
        Ok(())
    }
}

/// Picks the naive or concurrent strategy from the result size and runs it.
pub fn multiply_into<A, B, D>(a: &A, b: &B, dest: &mut D, config: &MultiplierConfig) -> Result<()>
where
    A: Matrix + ?Sized,
    B: Matrix<Value = A::Value> + ?Sized,
    D: Matrix<Value = A::Value> + ?Sized,
{
    if config.is_parallel(dest.dims()) {
        ConcurrentMultiplier::new(*config)?.multiply_into(a, b, dest)
    } else {
        NaiveMultiplier.multiply_into(a, b, dest)
    }
}

static WORKER_POOLS: OnceLock<Mutex<HashMap<usize, Arc<ThreadPool>>>> = OnceLock::new();

/// Returns the shared pool with `workers` threads, starting it on first use.
fn worker_pool(workers: usize) -> Result<Arc<ThreadPool>> {
    let mut pools = WORKER_POOLS.get_or_init(Default::default).lock();
    if let Some(pool) = pools.get(&workers) {
        return Ok(Arc::clone(pool));
    }
    let pool = ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("dmat-multiply-{}", i))
        .build()
        .map_err(|e| DmatCoreError::ThreadPool(e.to_string()))?;
    info!("Started multiplier pool with {} workers", workers);
    let pool = Arc::new(pool);
    pools.insert(workers, Arc::clone(&pool));
    Ok(pool)
}

#[derive(Debug, Clone, Copy)]
struct ProductShape {
    m: usize,
    k: usize,
    n: usize,
}

fn validate_product<A, B, D>(a: &A, b: &B, dest: &D) -> Result<ProductShape>
where
    A: Matrix + ?Sized,
    B: Matrix + ?Sized,
    D: Matrix + ?Sized,
{
    let (ad, bd) = (a.dims(), b.dims());
    if ad.cols != bd.rows {
        return Err(DmatCoreError::mismatch(
            Dimension::new(ad.cols, bd.cols),
            bd,
        ));
    }
    let expected = Dimension::new(ad.rows, bd.cols);
    if dest.dims() != expected {
        return Err(DmatCoreError::mismatch(expected, dest.dims()));
    }
    Ok(ProductShape {
        m: ad.rows,
        k: ad.cols,
        n: bd.cols,
    })
}

fn dot<T: Element>(lhs: &[T], rhs: &[T], shape: ProductShape, i: usize, j: usize) -> T {
    (0..shape.k).fold(T::zero(), |acc, p| {
        acc + lhs[i * shape.k + p] * rhs[p * shape.n + j]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap_matrix::HeapMatrix;

    fn random_matrix(rng: &mut fastrand::Rng, rows: usize, cols: usize) -> HeapMatrix {
        let data = (0..rows * cols).map(|_| rng.f64() * 2.0 - 1.0).collect();
        HeapMatrix::from_vec(rows, cols, data).unwrap()
    }

    fn reference_product(a: &HeapMatrix, b: &HeapMatrix) -> Vec<f64> {
        let mut out = vec![0.0; a.rows() * b.cols()];
        for i in 0..a.rows() {
            for j in 0..b.cols() {
                for p in 0..a.cols() {
                    out[i * b.cols() + j] += a.get_or_zero(i, p) * b.get_or_zero(p, j);
                }
            }
        }
        out
    }

    fn assert_approx_eq_vec(a: &[f64], b: &[f64], tol: f64) {
        assert_eq!(a.len(), b.len(), "Vector lengths differ");
        for (i, (x, y)) in a.iter().zip(b).enumerate() {
            assert!((x - y).abs() < tol, "Mismatch at index {}: {} vs {}", i, x, y);
        }
    }

    #[test]
    fn test_concurrent_matches_reference_across_sizes() -> Result<()> {
        let mut rng = fastrand::Rng::with_seed(7);
        let _ = env_logger::builder().is_test(true).try_init();
        let multiplier = ConcurrentMultiplier::new(MultiplierConfig::with_params(4, 0))?;
        for &(m, k, n) in &[(1, 1, 1), (3, 4, 2), (17, 9, 23), (40, 30, 35)] {
            let a = random_matrix(&mut rng, m, k);
            let b = random_matrix(&mut rng, k, n);
            let mut c = HeapMatrix::zeros(m, n);
            multiplier.multiply_into(&a, &b, &mut c)?;
            assert_approx_eq_vec(&c.to_vec()?, &reference_product(&a, &b), 1e-9);
        }
        Ok(())
    }

    #[test]
    fn test_dispatch_below_and_above_threshold() -> Result<()> {
        let mut rng = fastrand::Rng::with_seed(11);
        let config = MultiplierConfig::default();
        // 20x20 stays naive, 40x40 (1600 cells) crosses the default threshold.
        for &n in &[20, 40] {
            let a = random_matrix(&mut rng, n, n);
            let b = random_matrix(&mut rng, n, n);
            let mut c = HeapMatrix::zeros(n, n);
            assert_eq!(config.is_parallel(c.dims()), n == 40);
            multiply_into(&a, &b, &mut c, &config)?;
            assert_approx_eq_vec(&c.to_vec()?, &reference_product(&a, &b), 1e-9);
        }
        Ok(())
    }

    #[test]
    fn test_products_accumulate_onto_destination() -> Result<()> {
        let a = HeapMatrix::from_rows(&[[1.0, 2.0], [3.0, 4.0]])?;
        let b = HeapMatrix::identity(2);
        let mut naive = HeapMatrix::ones(2, 2);
        let mut concurrent = HeapMatrix::ones(2, 2);
        NaiveMultiplier.multiply_into(&a, &b, &mut naive)?;
        ConcurrentMultiplier::new(MultiplierConfig::default())?
            .multiply_into(&a, &b, &mut concurrent)?;
        assert_eq!(naive.to_vec()?, vec![2.0, 3.0, 4.0, 5.0]);
        assert_eq!(concurrent.to_vec()?, naive.to_vec()?);
        Ok(())
    }

    #[test]
    fn test_mismatched_operands_are_rejected() {
        let a: HeapMatrix = HeapMatrix::zeros(2, 3);
        let b: HeapMatrix = HeapMatrix::zeros(2, 3);
        let mut c: HeapMatrix = HeapMatrix::zeros(2, 3);
        assert!(matches!(
            NaiveMultiplier.multiply_into(&a, &b, &mut c),
            Err(DmatCoreError::DimensionMismatch { .. })
        ));
        let b: HeapMatrix = HeapMatrix::zeros(3, 4);
        assert!(ConcurrentMultiplier::new(MultiplierConfig::default())
            .unwrap()
            .multiply_into(&a, &b, &mut c)
            .is_err());
    }

    #[test]
    fn test_pools_are_shared_across_multipliers() -> Result<()> {
        let config = MultiplierConfig::with_params(3, 0);
        let first = ConcurrentMultiplier::new(config)?;
        let second = ConcurrentMultiplier::new(config)?;
        assert!(Arc::ptr_eq(&first.pool, &second.pool));
        assert_eq!(first.pool.current_num_threads(), 3);

        let mut rng = fastrand::Rng::with_seed(3);
        let a = random_matrix(&mut rng, 6, 5);
        let b = random_matrix(&mut rng, 5, 4);
        let mut c = HeapMatrix::zeros(6, 4);
        let mut d = HeapMatrix::zeros(6, 4);
        first.multiply_into(&a, &b, &mut c)?;
        second.multiply_into(&a, &b, &mut d)?;
        assert_eq!(c, d);
        assert!(Arc::ptr_eq(&first.pool, &worker_pool(3)?));
        Ok(())
    }
}
