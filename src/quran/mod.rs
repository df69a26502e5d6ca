mod data;
mod error;
mod index;
mod plan;
mod progress;

pub use error::QuranError;
pub use index::QuranStructureIndex;
pub use plan::{ChapterPlan, TargetExpander};
pub use progress::{
    summarize, target_completion, validate_verse_range, MemorizationRecord, ProgressReconciler,
    RecordType,
};
