//! Aggregate view models returned by the digest queries.
//!
//! Keep these structs focused on the data returned by queries. Rendering lives
//! in `crate::digest`.

/// Same-day sentiment entries split by polarity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SentimentCounts {
    pub positive: i64,
    pub negative: i64,
    pub neutral: i64,
}

impl SentimentCounts {
    pub fn total(&self) -> i64 {
        self.positive + self.negative + self.neutral
    }
}

/// Same-day alerts split by severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeverityCounts {
    pub critical: i64,
    pub high: i64,
    pub medium: i64,
    pub low: i64,
}

impl SeverityCounts {
    pub fn total(&self) -> i64 {
        self.critical + self.high + self.medium + self.low
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrendingTopic {
    pub topic: String,
    pub volume: i64,
}
