//! `natours-core`: shared building blocks for the tours API.
//!
//! Pure types only: identifiers, the error taxonomy shared by every layer, and
//! the query-feature builder that turns request parameters into a store query.

pub mod entity;
pub mod error;
pub mod id;
pub mod params;
pub mod query;

pub use entity::Entity;
pub use error::{DomainError, DomainResult, StoreError};
pub use id::{ReviewId, TourId, UserId};
pub use params::{ParamValue, QueryParams};
pub use query::{
    ApiFeatures, ComparisonOp, Condition, Direction, DocumentQuery, FieldFilter, Projection,
    QueryError, SortKey, REVISION_FIELD,
};
