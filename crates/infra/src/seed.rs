//! Development data: load tours from a JSON file into the store.

use std::path::Path;

use chrono::Utc;
use thiserror::Error;

use natours_core::{DomainError, StoreError, TourId};
use natours_tours::TourDraft;

use crate::repositories::TourRepository;

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("failed to read seed file: {0}")]
    Io(#[from] std::io::Error),

    #[error("seed file is not a JSON array of tours: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("seed tour #{index} is invalid: {source}")]
    Invalid {
        index: usize,
        #[source]
        source: DomainError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub async fn load_tour_drafts(path: &Path) -> Result<Vec<TourDraft>, SeedError> {
    let raw = tokio::fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&raw)?)
}

/// Validate and insert every draft. Stops at the first invalid or conflicting tour.
pub async fn seed_tours(tours: &TourRepository, drafts: Vec<TourDraft>) -> Result<usize, SeedError> {
    let now = Utc::now();
    let mut inserted = 0;
    for (index, draft) in drafts.into_iter().enumerate() {
        let tour = draft
            .validate(TourId::new(), now)
            .map_err(|source| SeedError::Invalid { index, source })?;
        tours.insert(tour).await?;
        inserted += 1;
    }

    tracing::info!(inserted, "seeded tours");
    Ok(inserted)
}
