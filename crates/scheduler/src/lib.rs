pub mod jobs;
pub mod scheduler;

pub use jobs::register_jobs;
pub use scheduler::CronScheduler;
