#![forbid(unsafe_code)]

pub mod app_services;
pub mod attempts;
pub mod auth;
pub mod config;
pub mod error;
pub mod lessons;
pub mod login;
pub mod practice;
pub mod problem_cache;
pub mod review;
pub mod shell;
pub mod timer;

pub use lesson_core::Clock;

pub use app_services::AppServices;
pub use auth::{AuthContext, MemoryUsernameStore, UsernameStore};
pub use config::SessionSettings;
pub use error::{ConfigError, LessonError, LoginError, PracticeError, ReviewError};
pub use lessons::{LessonContext, LessonSnapshot};
pub use login::LoginHandler;
pub use practice::{PracticeEngine, PracticeSnapshot};
pub use problem_cache::ProblemCache;
pub use review::{DueCheck, ManualReview, ReviewScheduler, ReviewSnapshot};
pub use shell::{Shell, ShellState};
pub use timer::{TimerSlot, TimerTicket};
