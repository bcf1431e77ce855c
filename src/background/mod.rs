pub mod precache;
pub mod tasks;

pub use precache::PreCachingAlgorithmDecorator;
pub use tasks::{BackgroundTask, BackgroundTaskManager, TaskContext, TaskManagerConfig};
