use super::data::{CHAPTERS, JUZ_STARTS};
use super::error::QuranError;
use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;

pub const JUZ_COUNT: u8 = 30;

static INDEX: Lazy<QuranStructureIndex> = Lazy::new(QuranStructureIndex::build);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Chapter {
    pub number: u16,
    pub name: &'static str,
    pub verse_count: u32,
}

/// One chapter's share of a juz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JuzSegment {
    pub juz: u8,
    pub chapter_number: u16,
    pub chapter_name: &'static str,
    pub verse_start: u32,
    pub verse_end: u32,
    pub verse_count: u32,
}

/// The part of a chapter that falls inside one juz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterSpan {
    pub juz: u8,
    pub verse_start: u32,
    pub verse_end: u32,
    pub verse_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JuzSummary {
    pub juz: u8,
    pub total_verse_count: u32,
    pub first_chapter: &'static str,
    pub last_chapter: &'static str,
    pub segment_count: usize,
}

/// Read-only catalog of how the 30 juz divide into chapters and verse ranges.
///
/// Built once per process from the embedded chapter table and juz start points;
/// use [`QuranStructureIndex::global`] to reach it.
#[derive(Debug)]
pub struct QuranStructureIndex {
    chapters: Vec<Chapter>,
    juz_segments: Vec<Vec<JuzSegment>>,
    chapter_spans: Vec<Vec<ChapterSpan>>,
    by_name: HashMap<String, usize>,
}

impl QuranStructureIndex {
    pub fn global() -> &'static QuranStructureIndex {
        Lazy::force(&INDEX)
    }

    fn build() -> Self {
        let chapters: Vec<Chapter> = CHAPTERS
            .iter()
            .enumerate()
            .map(|(i, &(name, verse_count))| Chapter {
                number: (i + 1) as u16,
                name,
                verse_count,
            })
            .collect();

        let mut juz_segments: Vec<Vec<JuzSegment>> = Vec::with_capacity(JUZ_STARTS.len());
        let mut chapter_spans: Vec<Vec<ChapterSpan>> = vec![Vec::new(); chapters.len()];

        for (i, &(start_chapter, start_verse)) in JUZ_STARTS.iter().enumerate() {
            let juz = (i + 1) as u8;
            let (end_chapter, end_verse) = match JUZ_STARTS.get(i + 1) {
                // Next juz opens a chapter: this one closes the previous chapter.
                Some(&(next_chapter, 1)) => {
                    let prev = chapters[usize::from(next_chapter) - 2];
                    (prev.number, prev.verse_count)
                }
                Some(&(next_chapter, next_verse)) => (next_chapter, next_verse - 1),
                None => {
                    let last = chapters[chapters.len() - 1];
                    (last.number, last.verse_count)
                }
            };

            let mut segments = Vec::new();
            for number in start_chapter..=end_chapter {
                let chapter = chapters[usize::from(number) - 1];
                let verse_start = if number == start_chapter { start_verse } else { 1 };
                let verse_end = if number == end_chapter {
                    end_verse
                } else {
                    chapter.verse_count
                };
                let verse_count = verse_end - verse_start + 1;
                segments.push(JuzSegment {
                    juz,
                    chapter_number: chapter.number,
                    chapter_name: chapter.name,
                    verse_start,
                    verse_end,
                    verse_count,
                });
                chapter_spans[usize::from(number) - 1].push(ChapterSpan {
                    juz,
                    verse_start,
                    verse_end,
                    verse_count,
                });
            }
            juz_segments.push(segments);
        }

        let by_name = chapters
            .iter()
            .enumerate()
            .map(|(i, c)| (normalize_chapter_name(c.name), i))
            .collect();

        Self {
            chapters,
            juz_segments,
            chapter_spans,
            by_name,
        }
    }

    pub fn segments_for_juz(&self, juz: i64) -> Result<&[JuzSegment], QuranError> {
        let slot = juz_slot(juz)?;
        Ok(&self.juz_segments[slot])
    }

    pub fn total_verse_count_for_juz(&self, juz: i64) -> Result<u32, QuranError> {
        Ok(self
            .segments_for_juz(juz)?
            .iter()
            .map(|s| s.verse_count)
            .sum())
    }

    /// Juz spans of a chapter, in juz order. Unknown names yield an empty slice.
    pub fn juzzes_containing_chapter(&self, chapter_name: &str) -> &[ChapterSpan] {
        match self.chapter(chapter_name) {
            Some(chapter) => self.spans_for(chapter),
            None => &[],
        }
    }

    pub fn spans_for(&self, chapter: &Chapter) -> &[ChapterSpan] {
        self.chapter_spans
            .get(usize::from(chapter.number).wrapping_sub(1))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn chapter(&self, chapter_name: &str) -> Option<&Chapter> {
        self.by_name
            .get(&normalize_chapter_name(chapter_name))
            .map(|&i| &self.chapters[i])
    }

    pub fn chapter_by_number(&self, number: i64) -> Option<&Chapter> {
        if number < 1 {
            return None;
        }
        self.chapters.get((number - 1) as usize)
    }

    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    pub fn juz_list(&self) -> Vec<JuzSummary> {
        self.juz_segments
            .iter()
            .enumerate()
            .map(|(i, segments)| JuzSummary {
                juz: (i + 1) as u8,
                total_verse_count: segments.iter().map(|s| s.verse_count).sum(),
                first_chapter: segments.first().map(|s| s.chapter_name).unwrap_or(""),
                last_chapter: segments.last().map(|s| s.chapter_name).unwrap_or(""),
                segment_count: segments.len(),
            })
            .collect()
    }

    pub fn total_verse_count(&self) -> u32 {
        self.chapters.iter().map(|c| c.verse_count).sum()
    }
}

pub fn juz_slot(juz: i64) -> Result<usize, QuranError> {
    if (1..=i64::from(JUZ_COUNT)).contains(&juz) {
        Ok((juz - 1) as usize)
    } else {
        Err(QuranError::OutOfRange { juz })
    }
}

/// Trim, collapse inner whitespace, lowercase, and fold typographic apostrophes
/// so that "al-baqarah", " Al-Baqarah " and "AL-BAQARAH" resolve to the same chapter.
pub fn normalize_chapter_name(raw: &str) -> String {
    raw.split_whitespace()
        .map(|word| {
            word.chars()
                .map(|ch| match ch {
                    '\u{2019}' | '\u{2018}' | '`' => '\'',
                    other => other,
                })
                .flat_map(char::to_lowercase)
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join(" ")
}
