use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use crate::Error;

pub const DEFAULT_RESULT_LIMIT: usize = 50;
pub const DEFAULT_CLUSTER_THRESHOLD: f64 = 0.6;

/// Freshness and pacing rules for one upstream source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourcePolicy {
    /// How old the last successful fetch may get before the source is stale.
    pub max_age: chrono::Duration,
    /// Minimum gap between two requests to the source.
    pub min_interval: Duration,
}

impl SourcePolicy {
    pub fn new(max_age: chrono::Duration, min_interval: Duration) -> Self {
        Self { max_age, min_interval }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Per source-tag max-age overrides; adapters' own defaults apply otherwise.
    pub max_age_overrides: HashMap<String, chrono::Duration>,
    pub default_limit: usize,
    pub cluster_threshold: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_age_overrides: HashMap::new(),
            default_limit: DEFAULT_RESULT_LIMIT,
            cluster_threshold: DEFAULT_CLUSTER_THRESHOLD,
        }
    }
}

impl PipelineConfig {
    /// Applies a `tag=duration` override such as `newsapi=45m`.
    pub fn apply_override(&mut self, entry: &str) -> Result<(), Error> {
        let (tag, duration) = entry
            .split_once('=')
            .ok_or_else(|| Error::Config(format!("expected tag=duration, got '{entry}'")))?;
        let duration: HumanDuration = duration.parse().map_err(Error::Config)?;
        let max_age = chrono::Duration::from_std(duration.0)
            .map_err(|e| Error::Config(format!("max-age out of range: {e}")))?;
        self.max_age_overrides.insert(tag.trim().to_string(), max_age);
        Ok(())
    }

    pub fn policy_for(&self, tag: &str, declared: SourcePolicy) -> SourcePolicy {
        match self.max_age_overrides.get(tag) {
            Some(max_age) => SourcePolicy { max_age: *max_age, ..declared },
            None => declared,
        }
    }
}

/// Durations written like `30m`, `2h`, `1h15m30s` or a bare number of seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HumanDuration(pub Duration);

impl FromStr for HumanDuration {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut total_seconds = 0u64;
        let mut current_number = String::new();
        let mut has_unit = false;

        for c in s.chars() {
            if c.is_ascii_digit() {
                current_number.push(c);
            } else if let Ok(num) = current_number.parse::<u64>() {
                match c {
                    's' => total_seconds += num,
                    'm' => total_seconds += num * 60,
                    'h' => total_seconds += num * 3600,
                    'd' => total_seconds += num * 86400,
                    _ => return Err(format!("Invalid duration unit: {}", c)),
                }
                current_number.clear();
                has_unit = true;
            } else if !c.is_whitespace() {
                return Err(format!("Invalid character in duration: {}", c));
            }
        }

        // trailing number without a unit counts as seconds
        if !current_number.is_empty() {
            let num = current_number
                .parse::<u64>()
                .map_err(|_| "Invalid number in duration".to_string())?;
            total_seconds += num;
            has_unit = true;
        }

        if !has_unit {
            return Err("Duration must include a number".to_string());
        }

        Ok(HumanDuration(Duration::from_secs(total_seconds)))
    }
}
