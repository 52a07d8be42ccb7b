//! Aggregate reports over the tour collection.

use std::collections::BTreeMap;

use chrono::Datelike;
use serde::Serialize;

use crate::Tour;

/// Tours rated below this are left out of [`tour_stats`].
pub const STATS_MIN_RATING: f64 = 4.5;

pub const MAX_PLAN_ROWS: usize = 12;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DifficultyStats {
    /// Upper-cased difficulty, e.g. `EASY`.
    pub difficulty: String,
    pub num_tours: u64,
    pub num_ratings: u64,
    pub avg_rating: f64,
    pub avg_price: f64,
    pub min_price: f64,
    pub max_price: f64,
}

/// Well-rated tours grouped by difficulty, cheapest average first.
pub fn tour_stats(tours: &[Tour]) -> Vec<DifficultyStats> {
    let mut groups: BTreeMap<&'static str, Vec<&Tour>> = BTreeMap::new();
    for tour in tours.iter().filter(|t| t.ratings_average >= STATS_MIN_RATING) {
        groups.entry(tour.difficulty.as_str()).or_default().push(tour);
    }

    let mut stats: Vec<DifficultyStats> = groups
        .into_iter()
        .map(|(difficulty, group)| {
            let n = group.len() as f64;
            let prices = group.iter().map(|t| t.price);
            DifficultyStats {
                difficulty: difficulty.to_uppercase(),
                num_tours: group.len() as u64,
                num_ratings: group.iter().map(|t| u64::from(t.ratings_quantity)).sum(),
                avg_rating: group.iter().map(|t| t.ratings_average).sum::<f64>() / n,
                avg_price: prices.clone().sum::<f64>() / n,
                min_price: prices.clone().fold(f64::INFINITY, f64::min),
                max_price: prices.fold(f64::NEG_INFINITY, f64::max),
            }
        })
        .collect();

    stats.sort_by(|a, b| a.avg_price.total_cmp(&b.avg_price));
    stats
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyPlan {
    /// Calendar month, 1-12.
    pub month: u32,
    pub num_tour_starts: u64,
    pub tours: Vec<String>,
}

/// Tour starts within `year`, grouped by month, busiest month first.
pub fn monthly_plan(tours: &[Tour], year: i32) -> Vec<MonthlyPlan> {
    let mut months: BTreeMap<u32, Vec<String>> = BTreeMap::new();
    for tour in tours {
        for start in tour.start_dates.iter().filter(|d| d.year() == year) {
            months.entry(start.month()).or_default().push(tour.name.clone());
        }
    }

    let mut plan: Vec<MonthlyPlan> = months
        .into_iter()
        .map(|(month, tours)| MonthlyPlan {
            month,
            num_tour_starts: tours.len() as u64,
            tours,
        })
        .collect();

    plan.sort_by(|a, b| {
        b.num_tour_starts
            .cmp(&a.num_tour_starts)
            .then(a.month.cmp(&b.month))
    });
    plan.truncate(MAX_PLAN_ROWS);
    plan
}
