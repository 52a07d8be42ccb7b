use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use natours_core::{DomainError, DomainResult, Entity, ReviewId, TourId, UserId};

pub const MAX_REVIEW_LEN: usize = 500;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: ReviewId,
    pub review: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub tour: TourId,
    pub user: UserId,
}

impl Entity for Review {
    type Id = ReviewId;

    fn id(&self) -> ReviewId {
        self.id
    }
}

/// Review input. `tour` and `user` may be filled in from the route and session.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewReview {
    pub review: Option<String>,
    pub rating: Option<f64>,
    pub tour: Option<TourId>,
    pub user: Option<UserId>,
}

impl NewReview {
    pub fn validate(self, now: DateTime<Utc>) -> DomainResult<Review> {
        let mut errors = Vec::new();

        let text = self.review.as_deref().map(str::trim).unwrap_or_default().to_string();
        if text.is_empty() {
            errors.push("Review cannot be empty.".to_string());
        } else if text.chars().count() > MAX_REVIEW_LEN {
            errors.push(format!("A review must have at most {MAX_REVIEW_LEN} characters."));
        }

        if let Some(rating) = self.rating {
            if !(1.0..=5.0).contains(&rating) {
                errors.push("Rating must be between 1 and 5.".to_string());
            }
        }
        if self.tour.is_none() {
            errors.push("Review must belong to a tour.".to_string());
        }
        if self.user.is_none() {
            errors.push("Review must belong to a user.".to_string());
        }

        match (self.tour, self.user) {
            (Some(tour), Some(user)) if errors.is_empty() => Ok(Review {
                id: ReviewId::new(),
                review: text,
                rating: self.rating,
                created_at: now,
                tour,
                user,
            }),
            _ => Err(DomainError::Validation(errors)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TourRef {
    pub id: TourId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserRef {
    pub id: UserId,
    pub name: String,
    pub photo: Option<String>,
}

/// A review rendered with its tour and author populated.
///
/// A reference whose target no longer exists renders as `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewView {
    pub id: ReviewId,
    pub review: String,
    pub rating: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub tour: Option<TourRef>,
    pub user: Option<UserRef>,
}

impl ReviewView {
    pub fn new(review: Review, tour: Option<TourRef>, user: Option<UserRef>) -> Self {
        Self {
            id: review.id,
            review: review.review,
            rating: review.rating,
            created_at: review.created_at,
            tour,
            user,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(text: &str, rating: Option<f64>) -> NewReview {
        NewReview {
            review: Some(text.to_string()),
            rating,
            tour: Some(TourId::new()),
            user: Some(UserId::new()),
        }
    }

    #[test]
    fn valid_review() {
        let review = input("  Amazing trip!  ", Some(5.0)).validate(Utc::now()).unwrap();
        assert_eq!(review.review, "Amazing trip!");
        assert_eq!(review.rating, Some(5.0));
    }

    #[test]
    fn rating_is_bounded() {
        assert!(input("ok", Some(0.5)).validate(Utc::now()).is_err());
        assert!(input("ok", Some(5.5)).validate(Utc::now()).is_err());
        assert!(input("ok", None).validate(Utc::now()).is_ok());
    }

    #[test]
    fn text_is_required_and_bounded() {
        assert!(input("   ", None).validate(Utc::now()).is_err());
        assert!(input(&"a".repeat(MAX_REVIEW_LEN + 1), None).validate(Utc::now()).is_err());
    }

    #[test]
    fn references_are_required() {
        let err = NewReview {
            review: Some("Great".into()),
            ..NewReview::default()
        }
        .validate(Utc::now())
        .unwrap_err();

        assert_eq!(
            err,
            DomainError::Validation(vec![
                "Review must belong to a tour.".to_string(),
                "Review must belong to a user.".to_string(),
            ])
        );
    }
}
