mod pool;
mod task;

pub use pool::WorkerPool;
