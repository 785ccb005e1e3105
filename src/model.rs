use std::collections::BTreeMap;

use chrono::NaiveDate;

/// One imported book, as produced by CSV import or manual entry upstream.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct BookRecord {
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub pages: u32,
    /// 0.0..=5.0; 0.0 means unrated.
    #[serde(default)]
    pub rating: f32,
    #[serde(default)]
    pub date_started: Option<NaiveDate>,
    #[serde(default)]
    pub date_finished: Option<NaiveDate>,
    #[serde(default)]
    pub shelf: Option<String>,
}

impl BookRecord {
    pub fn is_finished(&self) -> bool {
        self.date_finished.is_some()
    }
}

/// Assumed reading speed for the hours estimate on the receipt.
pub const PAGES_PER_HOUR: f32 = 40.0;

/// Aggregates printed on the receipt.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize)]
pub struct ReadingStats {
    pub books_finished: usize,
    pub total_pages: u64,
    pub total_hours: f32,
    /// Mean over rated books only; `None` when nothing is rated.
    pub average_rating: Option<f32>,
    /// Author with the most finished books; ties break alphabetically.
    pub top_author: Option<String>,
    /// Longest run of consecutive days with at least one finish.
    pub longest_streak_days: u32,
}

impl ReadingStats {
    pub fn from_books(books: &[BookRecord]) -> Self {
        let finished: Vec<&BookRecord> = books.iter().filter(|b| b.is_finished()).collect();

        let total_pages: u64 = finished.iter().map(|b| u64::from(b.pages)).sum();

        let rated: Vec<f32> = finished
            .iter()
            .filter(|b| b.rating > 0.0)
            .map(|b| b.rating.clamp(0.0, 5.0))
            .collect();
        let average_rating = if rated.is_empty() {
            None
        } else {
            Some(rated.iter().sum::<f32>() / rated.len() as f32)
        };

        let mut by_author = BTreeMap::<&str, usize>::new();
        for book in &finished {
            if !book.author.is_empty() {
                *by_author.entry(book.author.as_str()).or_default() += 1;
            }
        }
        // BTreeMap iterates alphabetically, so with a stable max the first
        // author wins ties.
        let top_author = by_author
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0)))
            .map(|(author, _)| (*author).to_string());

        Self {
            books_finished: finished.len(),
            total_pages,
            total_hours: total_pages as f32 / PAGES_PER_HOUR,
            average_rating,
            top_author,
            longest_streak_days: longest_streak_days(&finished),
        }
    }
}

fn longest_streak_days(finished: &[&BookRecord]) -> u32 {
    let mut days: Vec<NaiveDate> = finished.iter().filter_map(|b| b.date_finished).collect();
    days.sort_unstable();
    days.dedup();

    let mut best = 0u32;
    let mut run = 0u32;
    let mut prev: Option<NaiveDate> = None;
    for day in days {
        run = match prev {
            Some(p) if (day - p).num_days() == 1 => run + 1,
            _ => 1,
        };
        best = best.max(run);
        prev = Some(day);
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book(author: &str, pages: u32, rating: f32, finished: Option<&str>) -> BookRecord {
        BookRecord {
            title: "t".to_string(),
            author: author.to_string(),
            pages,
            rating,
            date_started: None,
            date_finished: finished.map(|d| d.parse().unwrap()),
            shelf: None,
        }
    }

    #[test]
    fn unfinished_books_do_not_count() {
        let stats = ReadingStats::from_books(&[
            book("a", 100, 4.0, Some("2025-01-02")),
            book("b", 900, 5.0, None),
        ]);
        assert_eq!(stats.books_finished, 1);
        assert_eq!(stats.total_pages, 100);
        assert!((stats.total_hours - 2.5).abs() < 1e-6);
    }

    #[test]
    fn average_rating_skips_unrated() {
        let stats = ReadingStats::from_books(&[
            book("a", 10, 4.0, Some("2025-01-02")),
            book("a", 10, 0.0, Some("2025-01-03")),
            book("a", 10, 2.0, Some("2025-01-04")),
        ]);
        assert_eq!(stats.average_rating, Some(3.0));
    }

    #[test]
    fn no_rated_books_means_no_average() {
        let stats = ReadingStats::from_books(&[book("a", 10, 0.0, Some("2025-01-02"))]);
        assert_eq!(stats.average_rating, None);
    }

    #[test]
    fn top_author_is_most_finished_ties_alphabetical() {
        let stats = ReadingStats::from_books(&[
            book("zed", 1, 0.0, Some("2025-01-01")),
            book("ann", 1, 0.0, Some("2025-01-02")),
            book("zed", 1, 0.0, Some("2025-01-10")),
            book("ann", 1, 0.0, Some("2025-01-11")),
        ]);
        assert_eq!(stats.top_author.as_deref(), Some("ann"));
    }

    #[test]
    fn streak_counts_consecutive_finish_days() {
        let stats = ReadingStats::from_books(&[
            book("a", 1, 0.0, Some("2025-03-01")),
            book("a", 1, 0.0, Some("2025-03-02")),
            book("a", 1, 0.0, Some("2025-03-02")), // same day, dedup
            book("a", 1, 0.0, Some("2025-03-03")),
            book("a", 1, 0.0, Some("2025-03-07")),
        ]);
        assert_eq!(stats.longest_streak_days, 3);
    }

    #[test]
    fn empty_input_is_all_zeroes() {
        let stats = ReadingStats::from_books(&[]);
        assert_eq!(stats, ReadingStats::default());
    }
}
