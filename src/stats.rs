use crate::metadata::ItemMetadata;
use crate::utils;
use serde::Serialize;
use std::collections::BTreeSet;

/// Library-wide totals folded from every readable item
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LibraryStats {
    pub books: usize,
    pub authors: BTreeSet<String>,
    pub narrators: BTreeSet<String>,
    pub series: BTreeSet<String>,
    pub standalone_count: usize,
    /// Seconds
    pub total_duration: f64,
    /// Bytes
    pub total_size: u64,
}

impl LibraryStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one item in. Names match exactly, case included.
    pub fn add(&mut self, meta: &ItemMetadata) {
        self.books += 1;
        self.authors.extend(meta.authors.iter().cloned());
        self.narrators.extend(meta.narrators.iter().cloned());
        match &meta.series {
            Some(series) => {
                self.series.insert(series.name.clone());
            }
            None => self.standalone_count += 1,
        }
        self.total_duration += meta.duration;
        self.total_size += meta.size;
    }

    /// Combine two partial aggregates
    pub fn merge(mut self, other: LibraryStats) -> LibraryStats {
        self.books += other.books;
        self.authors.extend(other.authors);
        self.narrators.extend(other.narrators);
        self.series.extend(other.series);
        self.standalone_count += other.standalone_count;
        self.total_duration += other.total_duration;
        self.total_size += other.total_size;
        self
    }

    pub fn formatted_duration(&self) -> String {
        utils::format_total_duration(self.total_duration)
    }

    pub fn formatted_size(&self) -> String {
        utils::format_size(self.total_size)
    }

    pub fn print(&self) {
        use crate::logger;

        logger::plain("\nLibrary Statistics:");
        logger::plain(&format!("  Books: {}", self.books));
        logger::plain(&format!("  Authors: {}", self.authors.len()));
        logger::plain(&format!("  Narrators: {}", self.narrators.len()));
        logger::plain(&format!("  Series: {}", self.series.len()));
        logger::plain(&format!("  Standalone: {}", self.standalone_count));
        logger::plain(&format!("  Total duration: {}", self.formatted_duration()));
        logger::plain(&format!("  Total size: {}", self.formatted_size()));
    }
}

impl<'a> FromIterator<&'a ItemMetadata> for LibraryStats {
    fn from_iter<I: IntoIterator<Item = &'a ItemMetadata>>(iter: I) -> Self {
        let mut stats = LibraryStats::new();
        for meta in iter {
            stats.add(meta);
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::SeriesRef;

    fn item(author: &str, narrator: Option<&str>, series: Option<&str>, duration: f64, size: u64) -> ItemMetadata {
        ItemMetadata {
            title: "T".into(),
            authors: vec![author.into()],
            narrators: narrator.into_iter().map(String::from).collect(),
            series: series.map(|s| SeriesRef {
                name: s.into(),
                sequence: None,
            }),
            duration,
            size,
        }
    }

    #[test]
    fn test_add_counts_distinct_names() {
        let items = [
            item("A", Some("N1"), Some("S"), 60.0, 10),
            item("A", Some("N2"), Some("S"), 60.0, 10),
            item("a", None, None, 30.0, 5),
        ];
        let stats: LibraryStats = items.iter().collect();
        assert_eq!(stats.books, 3);
        assert_eq!(stats.authors.len(), 2);
        assert_eq!(stats.narrators.len(), 2);
        assert_eq!(stats.series.len(), 1);
        assert_eq!(stats.standalone_count, 1);
        assert_eq!(stats.total_duration, 150.0);
        assert_eq!(stats.total_size, 25);
    }

    #[test]
    fn test_merge_of_partitions_equals_whole() {
        let items = [
            item("A", Some("N1"), Some("S1"), 100.0, 1),
            item("B", None, None, 200.0, 2),
            item("C", Some("N1"), Some("S2"), 300.0, 3),
            item("A", Some("N3"), None, 400.0, 4),
        ];
        let whole: LibraryStats = items.iter().collect();
        for split in 0..=items.len() {
            let left: LibraryStats = items[..split].iter().collect();
            let right: LibraryStats = items[split..].iter().collect();
            assert_eq!(left.clone().merge(right.clone()), whole);
            assert_eq!(right.merge(left), whole);
        }
    }

    #[test]
    fn test_formatting() {
        let stats: LibraryStats = [item("A", None, None, 3600.0, 104_857_600)].iter().collect();
        assert_eq!(stats.formatted_duration(), "1h 0m");
        assert_eq!(stats.formatted_size(), "0.10 GB");
    }
}
