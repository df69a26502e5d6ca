pub mod core;
pub mod memorization;
pub mod progress;
pub mod quran;
pub mod setup;
pub mod students;
pub mod targets;
