use chrono::{DateTime, Utc};
use rocket::http::Status;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::record::Listing;
use super::validate::{Checks, Validate};
use crate::resp::problem::Problem;
use crate::util::{self, date_time_millis};

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;
pub const MAX_COMMENT: usize = 2000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Review {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub user: Uuid,
    pub author_name: String,
    pub rating: u8,
    pub comment: String,
    #[serde(with = "date_time_millis")]
    pub created: DateTime<Utc>,
    #[serde(with = "date_time_millis")]
    pub updated: DateTime<Utc>,
}

/// Submitted review content.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ReviewData {
    pub rating: u8,
    #[serde(default)]
    pub comment: String,
}

impl Validate for ReviewData {
    fn validate(&self) -> Result<(), Problem> {
        Checks::new()
            .check(
                (MIN_RATING..=MAX_RATING).contains(&self.rating),
                "rating",
                format!("Rating must be between {} and {}.", MIN_RATING, MAX_RATING),
            )
            .check(
                self.comment.chars().count() <= MAX_COMMENT,
                "comment",
                format!("Comment can't be longer than {} characters.", MAX_COMMENT),
            )
            .finish()
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ReviewError {
    AlreadyReviewed,
    NotFound(Uuid),
    NotAuthor,
}

impl From<ReviewError> for Problem {
    fn from(e: ReviewError) -> Self {
        match e {
            ReviewError::AlreadyReviewed => Problem::new_untyped(
                Status::BadRequest,
                "You have already reviewed this listing.",
            ),
            ReviewError::NotFound(id) => {
                Problem::new_untyped(Status::NotFound, "Review doesn't exist.")
                    .insert_str("id", id)
            }
            ReviewError::NotAuthor => Problem::new_untyped(
                Status::Forbidden,
                "Only the author can change this review.",
            ),
        }
    }
}

/// Reviews embedded in a listing together with their aggregate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ReviewBook {
    #[serde(default)]
    pub items: Vec<Review>,
    #[serde(default)]
    pub average: f64,
    #[serde(default)]
    pub count: u32,
}

impl ReviewBook {
    pub fn by_user(&self, user: Uuid) -> Option<&Review> {
        self.items.iter().find(|r| r.user == user)
    }

    /// Adds a review from `user`. A user reviews a listing at most once.
    pub fn add(
        &mut self,
        user: Uuid,
        author_name: impl ToString,
        data: ReviewData,
    ) -> Result<Uuid, ReviewError> {
        if self.by_user(user).is_some() {
            return Err(ReviewError::AlreadyReviewed);
        }

        let now = util::now();
        let review = Review {
            id: Uuid::new_v4(),
            user,
            author_name: author_name.to_string(),
            rating: data.rating,
            comment: data.comment.trim().to_string(),
            created: now,
            updated: now,
        };
        let id = review.id;
        self.items.push(review);
        self.recompute();

        Ok(id)
    }

    pub fn edit(&mut self, id: Uuid, user: Uuid, data: ReviewData) -> Result<(), ReviewError> {
        let review = self
            .items
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(ReviewError::NotFound(id))?;

        if review.user != user {
            return Err(ReviewError::NotAuthor);
        }

        review.rating = data.rating;
        review.comment = data.comment.trim().to_string();
        review.updated = util::now();
        self.recompute();

        Ok(())
    }

    /// Removes a review; `moderator` may remove anyone's.
    pub fn remove(&mut self, id: Uuid, user: Uuid, moderator: bool) -> Result<Review, ReviewError> {
        let index = self
            .items
            .iter()
            .position(|r| r.id == id)
            .ok_or(ReviewError::NotFound(id))?;

        if self.items[index].user != user && !moderator {
            return Err(ReviewError::NotAuthor);
        }

        let removed = self.items.remove(index);
        self.recompute();

        Ok(removed)
    }

    /// Average rounded to one decimal; zero for no reviews.
    pub fn recompute(&mut self) {
        self.count = u32::try_from(self.items.len()).unwrap_or(u32::MAX);
        self.average = if self.items.is_empty() {
            0.0
        } else {
            let sum: u32 = self.items.iter().map(|r| u32::from(r.rating)).sum();
            let mean = f64::from(sum) / self.items.len() as f64;
            (mean * 10.0).round() / 10.0
        };
    }
}

/// Listings that carry reviews.
pub trait Reviewed: Listing {
    fn reviews(&self) -> &ReviewBook;
    fn reviews_mut(&mut self) -> &mut ReviewBook;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(rating: u8) -> ReviewData {
        ReviewData {
            rating,
            comment: " good ".to_string(),
        }
    }

    #[test]
    fn average_tracks_every_mutation() {
        let mut book = ReviewBook::default();
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        let first = book.add(a, "A", data(5)).unwrap();
        assert_eq!((book.count, book.average), (1, 5.0));

        book.add(b, "B", data(4)).unwrap();
        book.add(c, "C", data(4)).unwrap();
        assert_eq!((book.count, book.average), (3, 4.3));

        book.edit(first, a, data(1)).unwrap();
        assert_eq!(book.average, 3.0);

        book.remove(first, a, false).unwrap();
        assert_eq!((book.count, book.average), (2, 4.0));
        assert_eq!(book.items[0].comment, "good");
    }

    #[test]
    fn empty_book_has_zero_average() {
        let mut book = ReviewBook::default();
        let user = Uuid::new_v4();
        let id = book.add(user, "A", data(3)).unwrap();
        book.remove(id, user, false).unwrap();
        assert_eq!((book.count, book.average), (0, 0.0));
    }

    #[test]
    fn one_review_per_user() {
        let mut book = ReviewBook::default();
        let user = Uuid::new_v4();
        book.add(user, "A", data(3)).unwrap();
        assert_eq!(book.add(user, "A", data(5)), Err(ReviewError::AlreadyReviewed));
        assert_eq!(book.count, 1);
    }

    #[test]
    fn only_author_edits_and_moderator_removes() {
        let mut book = ReviewBook::default();
        let (author, other) = (Uuid::new_v4(), Uuid::new_v4());
        let id = book.add(author, "A", data(3)).unwrap();

        assert_eq!(book.edit(id, other, data(1)), Err(ReviewError::NotAuthor));
        assert_eq!(
            book.remove(id, other, false).unwrap_err(),
            ReviewError::NotAuthor
        );
        assert!(book.remove(id, other, true).is_ok());

        let missing = Uuid::new_v4();
        assert_eq!(
            book.edit(missing, author, data(2)),
            Err(ReviewError::NotFound(missing))
        );
    }

    #[test]
    fn rating_bounds_are_validated() {
        assert!(data(0).validate().is_err());
        assert!(data(6).validate().is_err());
        assert!(data(1).validate().is_ok());
        assert!(data(5).validate().is_ok());
    }
}
