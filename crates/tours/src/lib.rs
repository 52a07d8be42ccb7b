//! Tours and reviews domain module.
//!
//! Records, validation, slugs, virtual fields and the aggregate reports
//! (tour statistics, monthly plan). Pure logic: no IO, no HTTP, no storage.

pub mod review;
pub mod slug;
pub mod stats;
pub mod tour;

pub use review::{NewReview, Review, ReviewView, TourRef, UserRef, MAX_REVIEW_LEN};
pub use slug::slugify;
pub use stats::{DifficultyStats, MonthlyPlan, monthly_plan, tour_stats, MAX_PLAN_ROWS, STATS_MIN_RATING};
pub use tour::{Difficulty, Tour, TourDraft, with_virtuals, HIDDEN_TOUR_FIELDS};
