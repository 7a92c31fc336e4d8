//! Parallel processing utilities

use crate::error::{KolosalError, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Configuration for intra-step parallelism
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParallelConfig {
    /// Run chunk work on a thread pool
    pub enabled: bool,
    /// Number of threads (None = use all available)
    pub n_threads: Option<usize>,
    /// Below this many items work runs on the calling thread
    pub min_items: usize,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            n_threads: None,
            min_items: 2,
        }
    }
}

impl ParallelConfig {
    /// Create a new parallel configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Disable parallelism
    pub fn sequential() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Set number of threads
    pub fn with_threads(mut self, n: usize) -> Self {
        self.n_threads = Some(n);
        self
    }

    /// Set the minimum item count for parallel execution
    pub fn with_min_items(mut self, n: usize) -> Self {
        self.min_items = n;
        self
    }

    /// Get the number of threads to use
    pub fn num_threads(&self) -> usize {
        self.n_threads.unwrap_or_else(rayon::current_num_threads)
    }

    pub fn validate(&self) -> Result<()> {
        if self.n_threads == Some(0) {
            return Err(KolosalError::invalid_parameter("n_threads", 0, "must be at least 1"));
        }
        Ok(())
    }

    /// Build an executor; the thread pool is created once per run
    pub fn executor(&self) -> Result<ParallelExecutor> {
        self.validate()?;
        let pool = if self.enabled {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.num_threads())
                .build()
                .map_err(|e| KolosalError::ThreadPoolError(e.to_string()))?;
            Some(pool)
        } else {
            None
        };
        Ok(ParallelExecutor {
            pool,
            min_items: self.min_items.max(1),
        })
    }
}

/// Order-preserving executor over an optional thread pool
pub struct ParallelExecutor {
    pool: Option<rayon::ThreadPool>,
    min_items: usize,
}

impl std::fmt::Debug for ParallelExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParallelExecutor")
            .field("threads", &self.pool.as_ref().map(|p| p.current_num_threads()))
            .field("min_items", &self.min_items)
            .finish()
    }
}

impl ParallelExecutor {
    pub fn is_parallel(&self) -> bool {
        self.pool.is_some()
    }

    /// Map `f` over `0..len`, results in index order
    pub fn try_map_range<U, F>(&self, len: usize, f: F) -> Result<Vec<U>>
    where
        U: Send,
        F: Fn(usize) -> Result<U> + Send + Sync,
    {
        match &self.pool {
            Some(pool) if len >= self.min_items => pool.install(|| (0..len).into_par_iter().map(&f).collect()),
            _ => (0..len).map(f).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parallel_config() {
        let config = ParallelConfig::new().with_threads(4).with_min_items(8);

        assert_eq!(config.n_threads, Some(4));
        assert_eq!(config.min_items, 8);
        assert_eq!(config.num_threads(), 4);
    }

    #[test]
    fn test_zero_threads_rejected() {
        assert!(ParallelConfig::new().with_threads(0).executor().is_err());
    }

    #[test]
    fn test_try_map_range_preserves_order() {
        let par = ParallelConfig::new().with_threads(4).executor().unwrap();
        let seq = ParallelConfig::sequential().executor().unwrap();
        let a = par.try_map_range(100, |i| Ok(i * i)).unwrap();
        let b = seq.try_map_range(100, |i| Ok(i * i)).unwrap();
        assert_eq!(a, b);
        assert!(par.is_parallel());
        assert!(!seq.is_parallel());
    }

    #[test]
    fn test_try_map_range_propagates_errors() {
        let exec = ParallelConfig::new().with_threads(2).executor().unwrap();
        let result: Result<Vec<usize>> = exec.try_map_range(10, |i| {
            if i == 7 {
                Err(KolosalError::InvalidInput("bad".to_string()))
            } else {
                Ok(i)
            }
        });
        assert!(result.is_err());
    }
}
