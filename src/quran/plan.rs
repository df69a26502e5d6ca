use super::error::QuranError;
use super::index::{juz_slot, QuranStructureIndex};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanSegment {
    pub juz: u8,
    pub verse_start: u32,
    pub verse_end: u32,
    pub verse_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterPlanEntry {
    pub chapter_number: u16,
    pub chapter_name: &'static str,
    pub segments: Vec<PlanSegment>,
    pub total_target_verse_count: u32,
}

/// Per-chapter study plan in mushaf order. Serializes as an object keyed by chapter name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChapterPlan {
    juz: Vec<u8>,
    entries: Vec<ChapterPlanEntry>,
}

impl ChapterPlan {
    pub fn entries(&self) -> &[ChapterPlanEntry] {
        &self.entries
    }

    /// Requested juz, sorted and deduplicated.
    pub fn juz(&self) -> &[u8] {
        &self.juz
    }

    pub fn chapter_order(&self) -> Vec<&'static str> {
        self.entries.iter().map(|e| e.chapter_name).collect()
    }

    pub fn total_target_verse_count(&self) -> u32 {
        self.entries.iter().map(|e| e.total_target_verse_count).sum()
    }
}

impl Serialize for ChapterPlan {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for entry in &self.entries {
            map.serialize_entry(entry.chapter_name, entry)?;
        }
        map.end()
    }
}

pub struct TargetExpander<'a> {
    index: &'a QuranStructureIndex,
}

impl<'a> TargetExpander<'a> {
    pub fn new(index: &'a QuranStructureIndex) -> Self {
        Self { index }
    }

    /// Expand target juz into the chapter segments a student has to memorize.
    ///
    /// Every value is checked before anything is expanded. A chapter reached
    /// through two juz keeps one segment per juz; adjacent ranges are not merged.
    pub fn expand(&self, target_juz: &[i64]) -> Result<ChapterPlan, QuranError> {
        let mut juz_set: BTreeSet<u8> = BTreeSet::new();
        for &juz in target_juz {
            juz_slot(juz)?;
            juz_set.insert(juz as u8);
        }

        let mut by_chapter: BTreeMap<u16, ChapterPlanEntry> = BTreeMap::new();
        for &juz in &juz_set {
            for segment in self.index.segments_for_juz(i64::from(juz))? {
                let entry = by_chapter
                    .entry(segment.chapter_number)
                    .or_insert_with(|| ChapterPlanEntry {
                        chapter_number: segment.chapter_number,
                        chapter_name: segment.chapter_name,
                        segments: Vec::new(),
                        total_target_verse_count: 0,
                    });
                entry.segments.push(PlanSegment {
                    juz,
                    verse_start: segment.verse_start,
                    verse_end: segment.verse_end,
                    verse_count: segment.verse_count,
                });
                entry.total_target_verse_count += segment.verse_count;
            }
        }

        Ok(ChapterPlan {
            juz: juz_set.into_iter().collect(),
            entries: by_chapter.into_values().collect(),
        })
    }
}
