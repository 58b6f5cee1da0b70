#![forbid(unsafe_code)]

pub mod mode;
pub mod model;
pub mod navigation;
pub mod time;

pub use mode::{UiMode, View};
pub use time::Clock;
