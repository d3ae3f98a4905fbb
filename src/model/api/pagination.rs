use rocket::{
    http::Status,
    request::{self, FromRequest, Request},
};
use serde::{Deserialize, Serialize};

/// The largest page a client may request.
pub const MAX_PAGE_SIZE: u32 = 200;

/// Page selection from the `page_num` (1-based) and `page_size` query parameters.
#[derive(Debug, Clone, Copy)]
pub struct Pagination {
    page_num: u32,
    page_size: u32,
}

impl Pagination {
    pub fn new(page_num: u32, page_size: u32) -> Option<Self> {
        (page_num >= 1 && (1..=MAX_PAGE_SIZE).contains(&page_size)).then_some(Self {
            page_num,
            page_size,
        })
    }

    pub fn page_num(&self) -> u32 {
        self.page_num
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn skip(&self) -> u64 {
        u64::from(self.page_num - 1) * u64::from(self.page_size)
    }

    pub fn result(self, total: u64) -> PaginationResult {
        PaginationResult {
            page_num: self.page_num,
            page_size: self.page_size,
            total,
        }
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Pagination {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let page_num = if let Ok(page_num) = req.query_value::<u32>("page_num").unwrap_or(Ok(1)) {
            page_num
        } else {
            return request::Outcome::Failure((Status::BadRequest, ()));
        };
        let page_size =
            if let Ok(page_size) = req.query_value::<u32>("page_size").unwrap_or(Ok(50)) {
                page_size
            } else {
                return request::Outcome::Failure((Status::BadRequest, ()));
            };
        match Self::new(page_num, page_size) {
            Some(pagination) => request::Outcome::Success(pagination),
            None => request::Outcome::Failure((Status::BadRequest, ())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationResult {
    pub page_num: u32,
    pub page_size: u32,
    pub total: u64,
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub pagination: PaginationResult,
}
