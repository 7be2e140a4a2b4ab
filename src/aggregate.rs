//! Dashboard figures computed from already-fetched records.

use serde::Serialize;
use std::collections::HashMap;

use crate::models::{Project, Skill};

pub const TOP_N: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LevelCount {
    pub level: u8,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenCount {
    pub name: String,
    pub count: usize,
    /// Share of the listed entries, one decimal.
    pub percent: f64,
}

/// Skills per level, always five buckets in ascending order.
pub fn level_distribution(skills: &[Skill]) -> [LevelCount; 5] {
    let mut buckets = [1u8, 2, 3, 4, 5].map(|level| LevelCount { level, count: 0 });
    for skill in skills {
        if let Some(bucket) = buckets.iter_mut().find(|b| b.level == skill.level) {
            bucket.count += 1;
        }
    }
    buckets
}

pub fn average_level(skills: &[Skill]) -> Option<f64> {
    if skills.is_empty() {
        return None;
    }
    let total: u32 = skills.iter().map(|s| u32::from(s.level)).sum();
    Some(round1(f64::from(total) / skills.len() as f64))
}

/// The `n` most frequent tokens across `sequences`.
///
/// Equal counts keep the order in which the tokens were first seen.
pub fn top_tokens<'a, I>(sequences: I, n: usize) -> Vec<TokenCount>
where
    I: IntoIterator<Item = &'a [String]>,
{
    let mut order: Vec<&str> = Vec::new();
    let mut counts: HashMap<&str, usize> = HashMap::new();

    for token in sequences.into_iter().flatten() {
        let count = counts.entry(token.as_str()).or_insert_with(|| {
            order.push(token.as_str());
            0
        });
        *count += 1;
    }

    let mut ranked: Vec<(&str, usize)> = order.into_iter().map(|t| (t, counts[t])).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked.truncate(n);

    let total: usize = ranked.iter().map(|(_, c)| c).sum();
    ranked
        .into_iter()
        .map(|(name, count)| TokenCount {
            name: name.to_string(),
            count,
            percent: round1(count as f64 * 100.0 / total as f64),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub total_skills: usize,
    pub total_projects: usize,
    pub average_level: Option<f64>,
    pub level_distribution: [LevelCount; 5],
    pub top_technologies: Vec<TokenCount>,
    pub top_tags: Vec<TokenCount>,
}

impl DashboardSummary {
    pub fn from_records(skills: &[Skill], projects: &[Project]) -> Self {
        Self {
            total_skills: skills.len(),
            total_projects: projects.len(),
            average_level: average_level(skills),
            level_distribution: level_distribution(skills),
            top_technologies: top_tokens(projects.iter().map(|p| p.tech_stack.as_slice()), TOP_N),
            top_tags: top_tokens(skills.iter().map(|s| s.tags.as_slice()), TOP_N),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total_skills == 0 && self.total_projects == 0
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
