/// Output formatting: terminal table and JSON.
use duelrank_core::RatingRecord;
use serde::Serialize;

use crate::catalog::Catalog;

#[derive(Debug, Serialize, PartialEq)]
struct JsonRankedItem {
    rank: usize,
    id: i64,
    name: String,
    classification: Option<String>,
    series: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    wiki_url: Option<String>,
    rating: f64,
    games: u64,
}

#[derive(Serialize)]
struct JsonOutput {
    items: Vec<JsonRankedItem>,
    total_votes: u64,
}

/// Each decided duel adds one game to two items.
pub fn total_votes(leaderboard: &[RatingRecord]) -> u64 {
    leaderboard.iter().fold(0u64, |acc, r| acc.saturating_add(r.games)) / 2
}

fn ranked_items(leaderboard: &[RatingRecord], catalog: &Catalog, limit: Option<usize>) -> Vec<JsonRankedItem> {
    leaderboard
        .iter()
        .take(limit.unwrap_or(usize::MAX))
        .enumerate()
        .map(|(i, r)| {
            let item = catalog.get(r.id);
            JsonRankedItem {
                rank: i + 1,
                id: r.id,
                name: catalog.name_of(r.id),
                classification: item.and_then(|m| m.classification.clone()),
                series: item.and_then(|m| m.series.clone()),
                wiki_url: item.and_then(|m| m.wiki_url.clone()),
                rating: r.rating,
                games: r.games,
            }
        })
        .collect()
}

/// Render the leaderboard as a text table.
pub fn format_table(leaderboard: &[RatingRecord], catalog: &Catalog, limit: Option<usize>) -> String {
    let rows = ranked_items(leaderboard, catalog, limit);

    let name_width = rows.iter().map(|r| r.name.chars().count()).max().unwrap_or(4).max(4);
    let class_width = rows
        .iter()
        .map(|r| r.classification.as_deref().unwrap_or("-").chars().count())
        .max()
        .unwrap_or(5)
        .max(5);
    let series_width = rows
        .iter()
        .map(|r| r.series.as_deref().unwrap_or("-").chars().count())
        .max()
        .unwrap_or(6)
        .max(6);

    let mut out = String::new();
    out.push_str(&format!(
        "  # | {:<name_width$} | {:<class_width$} | {:<series_width$} |    Elo | Games\n",
        "Item", "Class", "Series"
    ));
    out.push_str(&format!(
        "----|-{}-|-{}-|-{}-|--------|------\n",
        "-".repeat(name_width),
        "-".repeat(class_width),
        "-".repeat(series_width),
    ));

    for r in &rows {
        out.push_str(&format!(
            "{:>3} | {:<name_width$} | {:<class_width$} | {:<series_width$} | {:>6.1} | {:>5}\n",
            r.rank,
            r.name,
            r.classification.as_deref().unwrap_or("-"),
            r.series.as_deref().unwrap_or("-"),
            r.rating,
            r.games,
        ));
    }

    out.push_str(&format!(
        "\n{} items ranked from {} votes\n",
        leaderboard.len(),
        total_votes(leaderboard),
    ));
    out
}

/// Print the leaderboard as a formatted terminal table.
pub fn print_table(leaderboard: &[RatingRecord], catalog: &Catalog, limit: Option<usize>) {
    print!("{}", format_table(leaderboard, catalog, limit));
}

/// Print the leaderboard as JSON.
pub fn print_json(leaderboard: &[RatingRecord], catalog: &Catalog, limit: Option<usize>) {
    let output = JsonOutput {
        items: ranked_items(leaderboard, catalog, limit),
        total_votes: total_votes(leaderboard),
    };

    match serde_json::to_string_pretty(&output) {
        Ok(text) => println!("{text}"),
        Err(e) => crate::bail(format!("Failed to encode leaderboard: {e}")),
    }
}
