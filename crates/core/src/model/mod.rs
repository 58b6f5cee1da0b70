mod feedback;
mod ids;
mod lesson;
mod problem;
mod review;
mod user;
mod validation;

pub use feedback::{Feedback, REVEALED_NOTE};
pub use ids::{LessonId, ProblemId, UserId};
pub use lesson::{
    FALLBACK_ESTIMATE_MINUTES, Lesson, MIN_ESTIMATE_MINUTES, clean_body, estimate_minutes,
};
pub use problem::Problem;
pub use review::{DueReview, REVIEW_STAGE};
pub use user::User;
pub use validation::{ValidationResult, Verdict, judge};
