//! Keyword question answering over the sales sheet.

use crate::leaderboard::{is_realized, parse_measure, Board, Leaderboard, Metric};
use crate::models::SaleRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    SelfGenLeader,
    TopSetter,
    TopCloser,
    TotalKilowatts,
    SalesCount,
    Help,
}

/// Order matters: "self gen closer" must not be read as a closer question.
const KEYWORDS: &[(&[&str], Intent)] = &[
    (&["self gen", "self-gen", "selfgen"], Intent::SelfGenLeader),
    (&["setter"], Intent::TopSetter),
    (&["closer", "leader", "top"], Intent::TopCloser),
    (&["kw", "kilowatt"], Intent::TotalKilowatts),
    (&["how many", "sales", "count"], Intent::SalesCount),
];

pub fn classify(question: &str) -> Intent {
    let question = question.to_lowercase();
    KEYWORDS
        .iter()
        .find(|(words, _)| words.iter().any(|word| question.contains(word)))
        .map(|(_, intent)| *intent)
        .unwrap_or(Intent::Help)
}

fn describe_leader(board: &Leaderboard, empty: &str) -> String {
    match board.leader() {
        Some(stat) => format!(
            "{}: {} with {} deals and {:.1} kW.",
            board.board.title().trim_end_matches('s'),
            stat.name,
            stat.count,
            stat.total
        ),
        None => empty.to_string(),
    }
}

pub fn answer(question: &str, records: &[SaleRecord]) -> String {
    match classify(question) {
        Intent::SelfGenLeader => describe_leader(
            &Leaderboard::build(Board::SelfGen, Metric::Kilowatts, records),
            "No self-generated sales yet.",
        ),
        Intent::TopSetter => describe_leader(
            &Leaderboard::build(Board::Setters, Metric::Sales, records),
            "No setter activity yet.",
        ),
        Intent::TopCloser => describe_leader(
            &Leaderboard::build(Board::Closers, Metric::Kilowatts, records),
            "No closed sales yet.",
        ),
        Intent::TotalKilowatts => {
            let total: f64 = records
                .iter()
                .filter(|r| is_realized(&r.realization))
                .map(|r| parse_measure(&r.kilowatts))
                .sum();
            format!("Total sold: {total:.1} kW.")
        }
        Intent::SalesCount => {
            let sold = records.iter().filter(|r| is_realized(&r.realization)).count();
            format!("{sold} sales out of {} leads.", records.len())
        }
        Intent::Help => "Try asking about the top closer, top setter, self gen, total kW, or sales count."
            .to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows() -> Vec<SaleRecord> {
        let sale = |closer: &str, setter: &str, kw: &str, realization: &str| SaleRecord {
            closer: closer.to_string(),
            setter: setter.to_string(),
            kilowatts: kw.to_string(),
            realization: realization.to_string(),
            ..SaleRecord::default()
        };
        vec![
            sale("Alice", "Sam", "5.5", "1"),
            sale("Alice", "Sam", "3.0", "0"),
            sale("Bob", "Bob", "2.0", "1"),
        ]
    }

    #[test]
    fn routes_by_keyword() {
        assert_eq!(classify("Who is the self gen closer?"), Intent::SelfGenLeader);
        assert_eq!(classify("best SETTER this month"), Intent::TopSetter);
        assert_eq!(classify("top closer"), Intent::TopCloser);
        assert_eq!(classify("total kW sold"), Intent::TotalKilowatts);
        assert_eq!(classify("how many deals"), Intent::SalesCount);
        assert_eq!(classify("hello"), Intent::Help);
    }

    #[test]
    fn answers_from_rows() {
        let rows = rows();
        assert_eq!(
            answer("top closer", &rows),
            "Top closer: Alice with 1 deals and 5.5 kW."
        );
        assert_eq!(
            answer("self gen", &rows),
            "Top self-gen closer: Bob with 1 deals and 2.0 kW."
        );
        assert_eq!(answer("total kw", &rows), "Total sold: 7.5 kW.");
        assert_eq!(answer("how many", &rows), "2 sales out of 3 leads.");
    }
}
