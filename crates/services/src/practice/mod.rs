mod engine;
mod state;

pub use engine::PracticeEngine;
pub use state::PracticeSnapshot;
