//! Closer, setter and self-gen leaderboards over sales rows.
//!
//! Every board is rebuilt from scratch on each pass: [`aggregate`] folds the
//! rows into per-actor totals and [`rank`] orders them. Nothing is shared
//! between passes.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::models::{ActorStat, SaleRecord};

/// Parses a numeric spreadsheet cell. Commas are treated as thousands
/// separators and dropped, so `"1,200"` reads as 1200. Anything unparseable
/// counts as zero.
pub fn parse_measure(raw: &str) -> f64 {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    match cleaned.parse::<f64>() {
        Ok(value) if value.is_finite() => value,
        _ => 0.0,
    }
}

pub fn is_realized(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "y"
    )
}

/// Groups `records` by `key_fn`, counting those that pass `predicate` and
/// summing their `measure`. Records whose key is `None` or empty are skipped.
pub fn aggregate<R, K, P, M>(
    records: &[R],
    key_fn: K,
    predicate: P,
    measure: M,
) -> HashMap<String, ActorStat>
where
    K: Fn(&R) -> Option<&str>,
    P: Fn(&R) -> bool,
    M: Fn(&R) -> f64,
{
    let mut stats: HashMap<String, ActorStat> = HashMap::new();

    for record in records {
        let Some(key) = key_fn(record).map(str::trim).filter(|k| !k.is_empty()) else {
            continue;
        };
        if !predicate(record) {
            continue;
        }

        let entry = stats.entry(key.to_string()).or_insert_with(|| ActorStat {
            name: key.to_string(),
            count: 0,
            total: 0.0,
        });
        entry.count += 1;
        entry.total += measure(record);
    }

    stats
}

pub fn closer_stats(records: &[SaleRecord]) -> HashMap<String, ActorStat> {
    aggregate(
        records,
        |r| Some(r.closer.as_str()),
        |r| is_realized(&r.realization),
        |r| parse_measure(&r.kilowatts),
    )
}

/// Gross setter totals: every lead counts, sold or not.
pub fn setter_stats(records: &[SaleRecord]) -> HashMap<String, ActorStat> {
    aggregate(
        records,
        |r| Some(r.setter.as_str()),
        |_| true,
        |r| parse_measure(&r.kilowatts),
    )
}

/// Realized sales where the same person set and closed.
pub fn self_gen_stats(records: &[SaleRecord]) -> HashMap<String, ActorStat> {
    aggregate(
        records,
        |r| Some(r.closer.as_str()),
        |r| {
            let closer = r.closer.trim();
            !closer.is_empty() && closer == r.setter.trim() && is_realized(&r.realization)
        },
        |r| parse_measure(&r.kilowatts),
    )
}

/// Sorts descending by `metric`; equal metrics fall back to name order.
pub fn rank<F>(stats: HashMap<String, ActorStat>, metric: F) -> Vec<ActorStat>
where
    F: Fn(&ActorStat) -> f64,
{
    let mut values: Vec<ActorStat> = stats.into_values().collect();
    values.sort_by(|a, b| {
        metric(b)
            .partial_cmp(&metric(a))
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.name.cmp(&b.name))
    });
    values
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Metric {
    #[default]
    Kilowatts,
    Sales,
}

impl Metric {
    pub fn value(&self, stat: &ActorStat) -> f64 {
        match self {
            Metric::Kilowatts => stat.total,
            Metric::Sales => stat.count as f64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Board {
    Closers,
    Setters,
    SelfGen,
}

impl Board {
    pub fn title(&self) -> &'static str {
        match self {
            Board::Closers => "Top closers",
            Board::Setters => "Top setters",
            Board::SelfGen => "Top self-gen closers",
        }
    }
}

/// A fully ranked board. Truncation to the visible rows happens in
/// [`Leaderboard::top`] so the rest stays available.
#[derive(Debug, Clone)]
pub struct Leaderboard {
    pub board: Board,
    pub metric: Metric,
    pub entries: Vec<ActorStat>,
}

impl Leaderboard {
    pub fn build(board: Board, metric: Metric, records: &[SaleRecord]) -> Self {
        let stats = match board {
            Board::Closers => closer_stats(records),
            Board::Setters => setter_stats(records),
            Board::SelfGen => self_gen_stats(records),
        };
        Leaderboard {
            board,
            metric,
            entries: rank(stats, |s| metric.value(s)),
        }
    }

    pub fn top(&self, n: usize) -> &[ActorStat] {
        &self.entries[..n.min(self.entries.len())]
    }

    pub fn leader(&self) -> Option<&ActorStat> {
        self.entries.first()
    }
}
