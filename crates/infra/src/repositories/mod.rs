//! Typed repositories over the document store.

pub mod documents;
pub mod reviews;
pub mod tours;
pub mod users;

pub use documents::Documents;
pub use reviews::ReviewRepository;
pub use tours::TourRepository;
pub use users::DocumentUserRepository;
