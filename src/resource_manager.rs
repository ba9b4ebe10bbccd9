//! Resource management

use crate::error::StatCubeError;

use tokio::sync::{Semaphore, SemaphorePermit};

/// [crate::resource_manager::ResourceManager] limits the work done on behalf of requests.
/// Concurrent transformations are limited using a Tokio Semaphore, and the size of the cubes they
/// may work on is capped by a maximum number of cells.
#[derive(Debug)]
pub struct ResourceManager {
    /// Optional semaphore for tasks.
    tasks: Option<Semaphore>,

    /// Optional maximum number of cells of a cube.
    max_cells: Option<usize>,
}

impl ResourceManager {
    /// Returns a new ResourceManager object.
    pub fn new(task_limit: Option<usize>, max_cells: Option<usize>) -> Self {
        Self {
            tasks: task_limit.map(Semaphore::new),
            max_cells,
        }
    }

    /// Check that a cube of `count` cells may be transformed.
    pub fn cells(&self, count: usize) -> Result<(), StatCubeError> {
        match self.max_cells {
            Some(limit) if count > limit => Err(StatCubeError::TooManyCells {
                requested: count,
                limit,
            }),
            _ => Ok(()),
        }
    }

    /// Acquire a task resource.
    pub async fn task(&self) -> Result<Option<SemaphorePermit>, StatCubeError> {
        optional_acquire(&self.tasks, 1).await
    }
}

/// Acquire permits on an optional Semaphore, if present.
async fn optional_acquire(
    sem: &Option<Semaphore>,
    n: usize,
) -> Result<Option<SemaphorePermit>, StatCubeError> {
    let n = n.try_into()?;
    if let Some(sem) = sem {
        sem.acquire_many(n)
            .await
            .map(Some)
            .map_err(|err| err.into())
    } else {
        Ok(None)
    }
}
