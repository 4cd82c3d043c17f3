use crate::database::models::NewRating;

use super::StoreError;

/// Transactional row sink driven by the batch coordinator.
///
/// Calls always arrive as `begin`, any number of `insert`s, `finalize`, then
/// exactly one of `commit` or `rollback` (a failed `commit` is followed by
/// `rollback`).
pub trait RatingStore {
    fn begin(&mut self) -> Result<(), StoreError>;

    /// Insert one row inside the open transaction, returning its row id
    fn insert(&mut self, rating: &NewRating) -> Result<i64, StoreError>;

    /// Close the prepared insert path
    fn finalize(&mut self) -> Result<(), StoreError>;

    fn commit(&mut self) -> Result<(), StoreError>;

    fn rollback(&mut self) -> Result<(), StoreError>;
}
