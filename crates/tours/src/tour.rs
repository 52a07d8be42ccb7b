use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use natours_core::{DomainError, DomainResult, Entity, TourId};

use crate::slugify;

pub const NAME_MIN_LEN: usize = 10;
pub const NAME_MAX_LEN: usize = 40;
pub const DEFAULT_RATINGS_AVERAGE: f64 = 4.5;

/// Fields left out of every tour projection unless explicitly selected.
pub const HIDDEN_TOUR_FIELDS: [&str; 1] = ["createdAt"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Difficult,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Difficult => "difficult",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "easy" => Some(Difficulty::Easy),
            "medium" => Some(Difficulty::Medium),
            "difficult" => Some(Difficulty::Difficult),
            _ => None,
        }
    }
}

/// A validated, persisted tour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tour {
    pub id: TourId,
    pub name: String,
    pub slug: String,
    pub duration: u32,
    pub max_group_size: u32,
    pub difficulty: Difficulty,
    pub ratings_average: f64,
    pub ratings_quantity: u32,
    pub price: f64,
    #[serde(default)]
    pub discount: f64,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub image_cover: String,
    #[serde(default)]
    pub images: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub start_dates: Vec<DateTime<Utc>>,
}

impl Entity for Tour {
    type Id = TourId;

    fn id(&self) -> TourId {
        self.id
    }
}

impl Tour {
    pub fn duration_weeks(&self) -> f64 {
        f64::from(self.duration) / 7.0
    }

    /// Apply a partial update and rerun every validator on the result.
    ///
    /// The slug follows the (possibly new) name; id and creation time never change.
    pub fn patched(&self, patch: TourDraft) -> DomainResult<Tour> {
        let merged = TourDraft::from(self).merge(patch);
        merged.validate(self.id, self.created_at)
    }
}

/// Unvalidated tour input: a create body, or a partial update.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TourDraft {
    pub name: Option<String>,
    pub duration: Option<u32>,
    pub max_group_size: Option<u32>,
    pub difficulty: Option<String>,
    pub ratings_average: Option<f64>,
    pub ratings_quantity: Option<u32>,
    pub price: Option<f64>,
    pub discount: Option<f64>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub image_cover: Option<String>,
    pub images: Option<Vec<String>>,
    pub start_dates: Option<Vec<DateTime<Utc>>>,
}

impl TourDraft {
    /// Fields set in `patch` override the ones in `self`.
    pub fn merge(self, patch: TourDraft) -> TourDraft {
        TourDraft {
            name: patch.name.or(self.name),
            duration: patch.duration.or(self.duration),
            max_group_size: patch.max_group_size.or(self.max_group_size),
            difficulty: patch.difficulty.or(self.difficulty),
            ratings_average: patch.ratings_average.or(self.ratings_average),
            ratings_quantity: patch.ratings_quantity.or(self.ratings_quantity),
            price: patch.price.or(self.price),
            discount: patch.discount.or(self.discount),
            summary: patch.summary.or(self.summary),
            description: patch.description.or(self.description),
            image_cover: patch.image_cover.or(self.image_cover),
            images: patch.images.or(self.images),
            start_dates: patch.start_dates.or(self.start_dates),
        }
    }

    /// Validate into a tour. All failures are collected into one error.
    pub fn validate(self, id: TourId, created_at: DateTime<Utc>) -> DomainResult<Tour> {
        let mut errors = Vec::new();

        let name = self.name.as_deref().map(str::trim).unwrap_or_default().to_string();
        let name_len = name.chars().count();
        if name.is_empty() {
            errors.push("A tour must have a name.".to_string());
        } else if name_len > NAME_MAX_LEN {
            errors.push(format!("A tour name must have less or equal than {NAME_MAX_LEN} characters."));
        } else if name_len < NAME_MIN_LEN {
            errors.push(format!("A tour name must have more or equal than {NAME_MIN_LEN} characters."));
        }

        let duration = match self.duration {
            Some(0) => {
                errors.push("A tour duration must be positive.".to_string());
                0
            }
            Some(d) => d,
            None => {
                errors.push("A tour must have a duration.".to_string());
                0
            }
        };

        let max_group_size = match self.max_group_size {
            Some(0) => {
                errors.push("A tour group size must be positive.".to_string());
                0
            }
            Some(n) => n,
            None => {
                errors.push("A tour must have a max group size.".to_string());
                0
            }
        };

        let difficulty = match self.difficulty.as_deref() {
            None => {
                errors.push("A tour must have a difficulty.".to_string());
                None
            }
            Some(raw) => {
                let parsed = Difficulty::parse(raw);
                if parsed.is_none() {
                    errors.push("Difficulty is either: easy, medium, difficult".to_string());
                }
                parsed
            }
        };

        let ratings_average = self.ratings_average.unwrap_or(DEFAULT_RATINGS_AVERAGE);
        if !(1.0..=5.0).contains(&ratings_average) {
            errors.push("Rating must be between 1.0 and 5.0".to_string());
        }

        let price = match self.price {
            Some(p) if p > 0.0 && p.is_finite() => p,
            Some(_) => {
                errors.push("A tour price must be positive.".to_string());
                0.0
            }
            None => {
                errors.push("A tour must have a price.".to_string());
                0.0
            }
        };

        let discount = self.discount.unwrap_or(0.0);
        if discount < 0.0 || (price > 0.0 && discount >= price) {
            errors.push(format!("Discount price ({discount}) should be below regular price"));
        }

        let summary = self.summary.as_deref().map(str::trim).unwrap_or_default().to_string();
        if summary.is_empty() {
            errors.push("A tour must have a summary.".to_string());
        }

        let image_cover = self.image_cover.unwrap_or_default();
        if image_cover.trim().is_empty() {
            errors.push("A tour must have an image.".to_string());
        }

        let Some(difficulty) = difficulty.filter(|_| errors.is_empty()) else {
            return Err(DomainError::Validation(errors));
        };

        Ok(Tour {
            id,
            slug: slugify(&name),
            name,
            duration,
            max_group_size,
            difficulty,
            ratings_average,
            ratings_quantity: self.ratings_quantity.unwrap_or(0),
            price,
            discount,
            summary,
            description: self
                .description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
            image_cover,
            images: self.images.unwrap_or_default(),
            created_at,
            start_dates: self.start_dates.unwrap_or_default(),
        })
    }
}

impl From<&Tour> for TourDraft {
    fn from(tour: &Tour) -> Self {
        TourDraft {
            name: Some(tour.name.clone()),
            duration: Some(tour.duration),
            max_group_size: Some(tour.max_group_size),
            difficulty: Some(tour.difficulty.as_str().to_string()),
            ratings_average: Some(tour.ratings_average),
            ratings_quantity: Some(tour.ratings_quantity),
            price: Some(tour.price),
            discount: Some(tour.discount),
            summary: Some(tour.summary.clone()),
            description: tour.description.clone(),
            image_cover: Some(tour.image_cover.clone()),
            images: Some(tour.images.clone()),
            start_dates: Some(tour.start_dates.clone()),
        }
    }
}

/// Add computed fields to a rendered tour document.
///
/// `durationWeeks` is only added when `duration` survived the projection.
pub fn with_virtuals(doc: Value) -> Value {
    let Value::Object(mut map) = doc else {
        return doc;
    };
    if let Some(duration) = map.get("duration").and_then(Value::as_f64) {
        map.insert("durationWeeks".to_string(), Value::from(duration / 7.0));
    }
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn draft() -> TourDraft {
        serde_json::from_value(json!({
            "name": "The Forest Hiker",
            "duration": 5,
            "maxGroupSize": 25,
            "difficulty": "easy",
            "price": 397,
            "summary": "  Breathtaking hike through the Canadian Banff National Park  ",
            "imageCover": "tour-1-cover.jpg",
            "startDates": ["2021-04-25T09:00:00Z", "2021-07-20T09:00:00Z"]
        }))
        .unwrap()
    }

    #[test]
    fn valid_draft_gets_defaults_and_slug() {
        let tour = draft().validate(TourId::new(), Utc::now()).unwrap();

        assert_eq!(tour.slug, "the-forest-hiker");
        assert_eq!(tour.ratings_average, DEFAULT_RATINGS_AVERAGE);
        assert_eq!(tour.ratings_quantity, 0);
        assert_eq!(tour.discount, 0.0);
        assert_eq!(tour.summary, "Breathtaking hike through the Canadian Banff National Park");
        assert_eq!(tour.start_dates.len(), 2);
    }

    #[test]
    fn empty_draft_reports_every_required_field() {
        let err = TourDraft::default().validate(TourId::new(), Utc::now()).unwrap_err();
        let DomainError::Validation(msgs) = err else {
            panic!("expected validation error");
        };
        for expected in [
            "A tour must have a name.",
            "A tour must have a duration.",
            "A tour must have a max group size.",
            "A tour must have a difficulty.",
            "A tour must have a price.",
            "A tour must have a summary.",
            "A tour must have an image.",
        ] {
            assert!(msgs.iter().any(|m| m == expected), "missing {expected}");
        }
    }

    #[test]
    fn name_length_bounds() {
        let mut short = draft();
        short.name = Some("Short".into());
        assert!(short.validate(TourId::new(), Utc::now()).is_err());

        let mut long = draft();
        long.name = Some("x".repeat(NAME_MAX_LEN + 1));
        assert!(long.validate(TourId::new(), Utc::now()).is_err());
    }

    #[test]
    fn unknown_difficulty_is_rejected() {
        let mut d = draft();
        d.difficulty = Some("extreme".into());
        let err = d.validate(TourId::new(), Utc::now()).unwrap_err();
        assert_eq!(
            err,
            DomainError::validation("Difficulty is either: easy, medium, difficult")
        );
    }

    #[test]
    fn discount_must_stay_below_price() {
        let mut d = draft();
        d.discount = Some(397.0);
        assert!(d.validate(TourId::new(), Utc::now()).is_err());
    }

    #[test]
    fn patch_reruns_validators_on_merged_record() {
        let tour = draft().validate(TourId::new(), Utc::now()).unwrap();

        let renamed = tour
            .patched(TourDraft {
                name: Some("The Sea Explorer".into()),
                ..TourDraft::default()
            })
            .unwrap();
        assert_eq!(renamed.id, tour.id);
        assert_eq!(renamed.created_at, tour.created_at);
        assert_eq!(renamed.slug, "the-sea-explorer");
        assert_eq!(renamed.price, tour.price);

        let bad = tour.patched(TourDraft {
            discount: Some(1000.0),
            ..TourDraft::default()
        });
        assert!(bad.is_err());
    }

    #[test]
    fn duration_weeks_virtual() {
        let doc = with_virtuals(json!({"name": "x", "duration": 14}));
        assert_eq!(doc["durationWeeks"], json!(2.0));

        let projected = with_virtuals(json!({"name": "x"}));
        assert!(projected.get("durationWeeks").is_none());
    }
}
