use std::convert::Infallible;

use rocket::request::{FromRequest, Outcome, Request};
use serde::{Deserialize, Serialize};

use crate::config::Config;

pub const DEFAULT_PAGE_LENGTH: u32 = 20;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct PageState {
    pub page_length: u32,
    pub page: u32,
}

impl Default for PageState {
    fn default() -> Self {
        PageState {
            page_length: DEFAULT_PAGE_LENGTH,
            page: 0,
        }
    }
}

impl PageState {
    pub fn new(page: u32, page_length: u32, max_length: u32) -> PageState {
        PageState {
            page_length: page_length.clamp(1, max_length.max(1)),
            page,
        }
    }

    pub fn skip(&self) -> u64 {
        u64::from(self.page) * u64::from(self.page_length)
    }

    pub fn limit(&self) -> u64 {
        u64::from(self.page_length)
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for PageState {
    type Error = Infallible;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let length: Option<u32> = request
            .query_value("len")
            .and_then(|it| it.ok())
            .or_else(|| request.query_value("l").and_then(|it| it.ok()));

        let page: Option<u32> = request
            .query_value("page")
            .and_then(|it| it.ok())
            .or_else(|| request.query_value("p").and_then(|it| it.ok()));

        let max_length = request
            .rocket()
            .state::<Config>()
            .map(|c| c.max_page_length)
            .unwrap_or(100);

        Outcome::Success(PageState::new(
            page.unwrap_or(0),
            length.unwrap_or(DEFAULT_PAGE_LENGTH),
            max_length,
        ))
    }
}

/// One page of a listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub page_length: u32,
    pub total: u64,
    pub pages: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, state: PageState, total: u64) -> Page<T> {
        let length = u64::from(state.page_length.max(1));
        Page {
            items,
            page: state.page,
            page_length: state.page_length,
            total,
            pages: (total + length - 1) / length,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            page_length: self.page_length,
            total: self.total,
            pages: self.pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_is_clamped() {
        assert_eq!(PageState::new(0, 0, 50).page_length, 1);
        assert_eq!(PageState::new(0, 500, 50).page_length, 50);
        assert_eq!(PageState::new(3, 10, 50).skip(), 30);
    }

    #[test]
    fn page_count_rounds_up() {
        let state = PageState::new(0, 20, 100);
        assert_eq!(Page::<u8>::new(vec![], state, 0).pages, 0);
        assert_eq!(Page::<u8>::new(vec![], state, 20).pages, 1);
        assert_eq!(Page::<u8>::new(vec![], state, 21).pages, 2);
    }
}
