mod scheduler;
mod state;

pub use scheduler::ReviewScheduler;
pub use state::{DueCheck, ManualReview, ReviewSnapshot};
