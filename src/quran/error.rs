use serde_json::json;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuranError {
    #[error("juz {juz} is out of range (expected 1..=30)")]
    OutOfRange { juz: i64 },
    #[error("invalid verse range {verse_start}..={verse_end} for {chapter_name}")]
    InvalidRange {
        chapter_name: String,
        verse_start: i64,
        verse_end: i64,
    },
}

impl QuranError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::OutOfRange { .. } => "out_of_range",
            Self::InvalidRange { .. } => "invalid_range",
        }
    }

    pub fn details(&self) -> serde_json::Value {
        match self {
            Self::OutOfRange { juz } => json!({ "juz": juz, "min": 1, "max": 30 }),
            Self::InvalidRange {
                chapter_name,
                verse_start,
                verse_end,
            } => json!({
                "chapterName": chapter_name,
                "verseStart": verse_start,
                "verseEnd": verse_end
            }),
        }
    }
}
