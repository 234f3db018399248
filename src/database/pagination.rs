use serde::Serialize;

use super::{error::ApiError, form::QueryParams};

pub const PAGE_PARAM: &str = "page";
pub const LIMIT_PARAM: &str = "limit";

/// Page number (1-based) and size requested through `?page=&limit=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub page_size: i64,
}

impl PageRequest {
    pub fn from_query(params: &QueryParams, default_size: i64) -> Result<Self, ApiError> {
        let page = match params.get(PAGE_PARAM) {
            None | Some("") => 1,
            Some(value) => match value.parse::<i64>() {
                Ok(page) if page >= 1 => page,
                _ => return Err(ApiError::InvalidPage),
            },
        };

        let page_size = params
            .get(LIMIT_PARAM)
            .and_then(|value| value.parse::<i64>().ok())
            .filter(|size| *size > 0)
            .unwrap_or(default_size);

        Ok(Self { page, page_size })
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.page_size
    }

    pub fn page_count(&self, total_rows: i64) -> i64 {
        if total_rows <= 0 {
            return 1;
        }
        (total_rows + self.page_size - 1) / self.page_size
    }

    /// Rejects pages past the end. The first page is always valid, even when empty.
    pub fn check(&self, total_rows: i64) -> Result<(), ApiError> {
        if self.page > self.page_count(total_rows) {
            return Err(ApiError::InvalidPage);
        }
        Ok(())
    }
}

/// Where `next`/`previous` links point to.
#[derive(Debug, Clone)]
pub struct PageLink {
    pub base: String,
    pub params: QueryParams,
}

impl PageLink {
    pub fn new(base: String, params: QueryParams) -> Self {
        Self { base, params }
    }

    fn to_page(&self, page: i64) -> String {
        let value = if page == 1 { None } else { Some(page.to_string()) };
        let query = self.params.with(PAGE_PARAM, value);

        if query.is_empty() {
            self.base.clone()
        } else {
            format!("{}?{}", self.base, query)
        }
    }
}

#[derive(Serialize, Debug)]
pub struct Page<T> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    pub fn from_rows(rows: Vec<T>, total_rows: i64, request: PageRequest, link: &PageLink) -> Self {
        let next = if request.page < request.page_count(total_rows) {
            Some(link.to_page(request.page + 1))
        } else {
            None
        };
        let previous = if request.page > 1 {
            Some(link.to_page(request.page - 1))
        } else {
            None
        };

        Self {
            count: total_rows,
            next,
            previous,
            results: rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> QueryParams {
        QueryParams::from_pairs(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    fn link(pairs: &[(&str, &str)]) -> PageLink {
        PageLink::new("http://testserver/api/recipes".to_owned(), params(pairs))
    }

    #[test]
    fn last_page_of_thirteen() {
        let query = params(&[("page", "3")]);
        let request = PageRequest::from_query(&query, 6).unwrap();
        assert_eq!(request.offset(), 12);
        request.check(13).unwrap();

        let page = Page::from_rows(vec![13], 13, request, &link(&[("page", "3")]));
        assert_eq!(page.count, 13);
        assert_eq!(page.results.len(), 1);
        assert!(page.next.is_none());
        assert_eq!(
            page.previous.as_deref(),
            Some("http://testserver/api/recipes?page=2")
        );
    }

    #[test]
    fn previous_of_second_page_drops_page_param() {
        let query = params(&[("tags", "lunch"), ("page", "2")]);
        let request = PageRequest::from_query(&query, 6).unwrap();
        let page = Page::from_rows(vec![7, 8, 9, 10, 11, 12], 13, request, &link(&[("tags", "lunch"), ("page", "2")]));

        assert_eq!(
            page.previous.as_deref(),
            Some("http://testserver/api/recipes?tags=lunch")
        );
        assert_eq!(
            page.next.as_deref(),
            Some("http://testserver/api/recipes?tags=lunch&page=3")
        );
    }

    #[test]
    fn limit_overrides_page_size() {
        let request = PageRequest::from_query(&params(&[("limit", "2")]), 6).unwrap();
        assert_eq!(request.page_size, 2);
        assert_eq!(request.page_count(5), 3);

        let fallback = PageRequest::from_query(&params(&[("limit", "zero")]), 6).unwrap();
        assert_eq!(fallback.page_size, 6);
    }

    #[test]
    fn out_of_range_pages_are_invalid() {
        let request = PageRequest::from_query(&params(&[("page", "4")]), 6).unwrap();
        assert!(matches!(request.check(13), Err(ApiError::InvalidPage)));
        assert!(matches!(
            PageRequest::from_query(&params(&[("page", "0")]), 6),
            Err(ApiError::InvalidPage)
        ));
        assert!(matches!(
            PageRequest::from_query(&params(&[("page", "x")]), 6),
            Err(ApiError::InvalidPage)
        ));
    }

    #[test]
    fn empty_first_page_is_valid() {
        let request = PageRequest::from_query(&params(&[]), 6).unwrap();
        request.check(0).unwrap();

        let page: Page<i32> = Page::from_rows(vec![], 0, request, &link(&[]));
        assert!(page.next.is_none());
        assert!(page.previous.is_none());
    }
}
