use crate::aggregate::{Bucket, WrittenFile};
use crate::errors::PsxError;
use chrono::{DateTime, Utc};

pub const MAX_QUALITY: f64 = 95.0;
pub const PASSING_QUALITY: f64 = 80.0;

#[derive(Debug, Clone, PartialEq)]
pub struct GameFailure {
    pub name: String,
    pub url: String,
    pub error: PsxError,
}

/// Everything a finished run has to say about itself.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total_games: usize,
    /// Games scraped without error
    pub processed: usize,
    pub errors: usize,
    /// Links found over the whole run, duplicates included
    pub total_links: usize,
    /// Games that yielded at least one VikingFile link
    pub games_with_primary: usize,
    pub failures: Vec<GameFailure>,
    pub bucket_counts: Vec<(Bucket, usize)>,
    pub written: Vec<WrittenFile>,
}

/// Success percentage plus up to ten points for games with a primary
/// provider link, capped at 95. Zero when no game was processed.
pub fn quality_score(processed: usize, errors: usize, games_with_primary: usize) -> f64 {
    if processed == 0 {
        return 0.0;
    }
    let success_rate = processed as f64 * 100.0 / (processed + errors) as f64;
    let primary_ratio = games_with_primary as f64 / processed as f64;
    (success_rate + primary_ratio * 10.0).min(MAX_QUALITY)
}

impl RunReport {
    pub fn quality_score(&self) -> f64 {
        quality_score(self.processed, self.errors, self.games_with_primary)
    }

    pub fn is_success(&self) -> bool {
        self.quality_score() >= PASSING_QUALITY
    }

    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}
