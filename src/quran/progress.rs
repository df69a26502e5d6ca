use super::error::QuranError;
use super::index::{QuranStructureIndex, JUZ_COUNT};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordType {
    /// Ziyadah: newly memorized verses.
    #[serde(alias = "ziyadah")]
    New,
    /// Murojaah: revision of verses memorized earlier.
    #[serde(alias = "murojaah")]
    Review,
}

impl RecordType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "new" | "ziyadah" => Some(Self::New),
            "review" | "murojaah" => Some(Self::Review),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Review => "review",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemorizationRecord {
    pub student_id: String,
    pub chapter_name: String,
    pub verse_start: i64,
    pub verse_end: i64,
    pub record_type: RecordType,
    #[serde(default)]
    pub status: Option<String>,
}

impl MemorizationRecord {
    pub fn validate_range(&self) -> Result<(), QuranError> {
        validate_verse_range(&self.chapter_name, self.verse_start, self.verse_end)
    }
}

pub fn validate_verse_range(
    chapter_name: &str,
    verse_start: i64,
    verse_end: i64,
) -> Result<(), QuranError> {
    if verse_start < 1 || verse_start > verse_end {
        return Err(QuranError::InvalidRange {
            chapter_name: chapter_name.to_string(),
            verse_start,
            verse_end,
        });
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributingSegment {
    pub chapter_name: &'static str,
    pub verse_start: u32,
    pub verse_end: u32,
    pub verse_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JuzProgress {
    pub juz: u8,
    pub total_verse_count: u32,
    /// Raw sum of overlaps; duplicate records can push this past the total.
    pub memorized_verse_count: u32,
    pub completion_percent: u8,
    pub data_anomaly: bool,
    pub contributing_segments: Vec<ContributingSegment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSummary {
    pub total_verse_count: u32,
    pub memorized_verse_count: u32,
    pub completion_percent: u8,
    pub completed_juz: Vec<u8>,
    pub anomalous_juz: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetCompletion {
    pub target_juz: Vec<u8>,
    pub target_verse_count: u32,
    pub memorized_verse_count: u32,
    pub completion_percent: u8,
    pub completed_juz: Vec<u8>,
    pub remaining_juz: Vec<u8>,
}

/// Half-up integer rounding of `memorized / total * 100`, clamped to 100.
pub fn completion_percent(memorized: u32, total: u32) -> u8 {
    if total == 0 {
        return 0;
    }
    let (m, t) = (u64::from(memorized), u64::from(total));
    let pct = (200 * m + t) / (2 * t);
    pct.min(100) as u8
}

pub struct ProgressReconciler<'a> {
    index: &'a QuranStructureIndex,
}

impl<'a> ProgressReconciler<'a> {
    pub fn new(index: &'a QuranStructureIndex) -> Self {
        Self { index }
    }

    /// Juz-level progress for every juz 1..=30 from chapter-based records.
    ///
    /// Records naming an unknown chapter contribute nothing. Any record with an
    /// inverted or non-positive range fails the whole computation.
    pub fn reconcile(
        &self,
        records: &[MemorizationRecord],
    ) -> Result<BTreeMap<u8, JuzProgress>, QuranError> {
        let mut out: BTreeMap<u8, JuzProgress> = BTreeMap::new();
        for juz in 1..=JUZ_COUNT {
            out.insert(
                juz,
                JuzProgress {
                    juz,
                    total_verse_count: self.index.total_verse_count_for_juz(i64::from(juz))?,
                    memorized_verse_count: 0,
                    completion_percent: 0,
                    data_anomaly: false,
                    contributing_segments: Vec::new(),
                },
            );
        }

        for record in records {
            record.validate_range()?;
            let Some(chapter) = self.index.chapter(&record.chapter_name) else {
                tracing::debug!(chapter = %record.chapter_name, "no structural mapping for chapter");
                continue;
            };
            for span in self.index.spans_for(chapter) {
                let lo = record.verse_start.max(i64::from(span.verse_start));
                let hi = record.verse_end.min(i64::from(span.verse_end));
                if lo > hi {
                    continue;
                }
                // Both bounds lie inside the span, so they fit in u32.
                let (lo, hi) = (lo as u32, hi as u32);
                if let Some(entry) = out.get_mut(&span.juz) {
                    entry.memorized_verse_count += hi - lo + 1;
                    entry.contributing_segments.push(ContributingSegment {
                        chapter_name: chapter.name,
                        verse_start: lo,
                        verse_end: hi,
                        verse_count: hi - lo + 1,
                    });
                }
            }
        }

        for entry in out.values_mut() {
            entry.completion_percent =
                completion_percent(entry.memorized_verse_count, entry.total_verse_count);
            entry.data_anomaly = entry.memorized_verse_count > entry.total_verse_count;
        }
        Ok(out)
    }

    /// Distinct chapter names (as written) that match no chapter, first-seen order.
    pub fn unmatched_chapters(&self, records: &[MemorizationRecord]) -> Vec<String> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut out = Vec::new();
        for record in records {
            if self.index.chapter(&record.chapter_name).is_none()
                && seen.insert(record.chapter_name.as_str())
            {
                out.push(record.chapter_name.clone());
            }
        }
        out
    }
}

pub fn summarize(progress: &BTreeMap<u8, JuzProgress>) -> ProgressSummary {
    let mut total: u32 = 0;
    let mut memorized: u32 = 0;
    let mut completed_juz = Vec::new();
    let mut anomalous_juz = Vec::new();
    for entry in progress.values() {
        total += entry.total_verse_count;
        memorized += entry.memorized_verse_count.min(entry.total_verse_count);
        if entry.memorized_verse_count >= entry.total_verse_count {
            completed_juz.push(entry.juz);
        }
        if entry.data_anomaly {
            anomalous_juz.push(entry.juz);
        }
    }
    ProgressSummary {
        total_verse_count: total,
        memorized_verse_count: memorized,
        completion_percent: completion_percent(memorized, total),
        completed_juz,
        anomalous_juz,
    }
}

pub fn target_completion(
    progress: &BTreeMap<u8, JuzProgress>,
    target_juz: &BTreeSet<u8>,
) -> TargetCompletion {
    let mut target_verse_count: u32 = 0;
    let mut memorized: u32 = 0;
    let mut completed_juz = Vec::new();
    let mut remaining_juz = Vec::new();
    for juz in target_juz {
        let Some(entry) = progress.get(juz) else {
            continue;
        };
        target_verse_count += entry.total_verse_count;
        memorized += entry.memorized_verse_count.min(entry.total_verse_count);
        if entry.memorized_verse_count >= entry.total_verse_count {
            completed_juz.push(*juz);
        } else {
            remaining_juz.push(*juz);
        }
    }
    TargetCompletion {
        target_juz: target_juz.iter().copied().collect(),
        target_verse_count,
        memorized_verse_count: memorized,
        completion_percent: completion_percent(memorized, target_verse_count),
        completed_juz,
        remaining_juz,
    }
}
