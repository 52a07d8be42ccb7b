use std::collections::HashMap;
use std::sync::Arc;

use natours_auth::User;
use natours_core::{DocumentQuery, ReviewId, StoreError, TourId, UserId};
use natours_tours::{Review, ReviewView, Tour, TourRef, UserRef};

use super::Documents;
use crate::document_store::{Collection, DocumentStore};

/// Reviews, read back with their tour and author populated.
#[derive(Clone)]
pub struct ReviewRepository {
    reviews: Documents<Review>,
    tours: Documents<Tour>,
    users: Documents<User>,
}

impl ReviewRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            reviews: Documents::new(store.clone(), Collection::Reviews),
            tours: Documents::new(store.clone(), Collection::Tours),
            users: Documents::new(store, Collection::Users),
        }
    }

    pub async fn insert(&self, review: Review) -> Result<ReviewView, StoreError> {
        let review = self.reviews.insert(review).await?;
        let mut views = self.populate(vec![review]).await?;
        views
            .pop()
            .ok_or_else(|| StoreError::backend("inserted review vanished"))
    }

    pub async fn get(&self, id: ReviewId) -> Result<Option<ReviewView>, StoreError> {
        match self.reviews.get(id).await? {
            Some(review) => Ok(self.populate(vec![review]).await?.pop()),
            None => Ok(None),
        }
    }

    pub async fn list(&self, query: DocumentQuery) -> Result<Vec<ReviewView>, StoreError> {
        let reviews = self.reviews.find(query).await?;
        self.populate(reviews).await
    }

    async fn populate(&self, reviews: Vec<Review>) -> Result<Vec<ReviewView>, StoreError> {
        let mut tours: HashMap<TourId, Option<TourRef>> = HashMap::new();
        let mut users: HashMap<UserId, Option<UserRef>> = HashMap::new();

        let mut views = Vec::with_capacity(reviews.len());
        for review in reviews {
            if !tours.contains_key(&review.tour) {
                let tour = self.tours.get(review.tour).await?.map(|t| TourRef {
                    id: t.id,
                    name: t.name,
                });
                tours.insert(review.tour, tour);
            }
            if !users.contains_key(&review.user) {
                let user = self.users.get(review.user).await?.map(|u| UserRef {
                    id: u.id,
                    name: u.name,
                    photo: u.photo,
                });
                users.insert(review.user, user);
            }

            let tour = tours.get(&review.tour).cloned().flatten();
            let user = users.get(&review.user).cloned().flatten();
            views.push(ReviewView::new(review, tour, user));
        }
        Ok(views)
    }
}
