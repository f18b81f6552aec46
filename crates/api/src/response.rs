//! Listing response envelopes.
//!
//! Without pagination a listing is a plain JSON array. With pagination it
//! is wrapped in [`PageResponse`], whose `next` / `previous` links are the
//! request URL with the `page` parameter replaced.

use axum::http::{HeaderMap, Uri};
use muninn_core::pagination::{Page, PAGE_QUERY_PARAM};
use serde::Serialize;
use serde_json::Value;
use url::Url;

/// Standard `{count, next, previous, results}` page envelope.
#[derive(Debug, Serialize)]
pub struct PageResponse {
    pub count: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<Value>,
}

impl PageResponse {
    pub fn new(count: u64, page: &Page, request: &RequestUrl, results: Vec<Value>) -> Self {
        let next = page
            .has_next()
            .then(|| request.with_page(Some(page.number + 1)));
        // the first page is linked without a page parameter
        let previous = page.has_previous().then(|| {
            let number = page.number - 1;
            request.with_page((number > 1).then_some(number))
        });

        Self {
            count,
            next,
            previous,
            results,
        }
    }
}

/// Absolute URL of the current request, used to build page links.
#[derive(Debug, Clone)]
pub struct RequestUrl(Url);

impl RequestUrl {
    /// Rebuild the absolute URL from the `Host` header and the request URI.
    pub fn from_parts(headers: &HeaderMap, uri: &Uri) -> Option<Self> {
        let host = headers
            .get(axum::http::header::HOST)
            .and_then(|v| v.to_str().ok())
            .or_else(|| uri.authority().map(|a| a.as_str()))
            .unwrap_or("localhost");
        let scheme = uri.scheme_str().unwrap_or("http");
        let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
        Url::parse(&format!("{scheme}://{host}{path_and_query}"))
            .ok()
            .map(Self)
    }

    /// Absolute URL of `path` on the same host, without query.
    pub fn join(&self, path: &str) -> String {
        let mut url = self.0.clone();
        url.set_path(path);
        url.set_query(None);
        url.to_string()
    }

    /// The URL with `page` set to `number`, or removed when `None`.
    pub fn with_page(&self, number: Option<u64>) -> String {
        let mut url = self.0.clone();
        let kept: Vec<(String, String)> = self
            .0
            .query_pairs()
            .filter(|(k, _)| k != PAGE_QUERY_PARAM)
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        url.set_query(None);
        if !kept.is_empty() || number.is_some() {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in &kept {
                pairs.append_pair(k, v);
            }
            if let Some(n) = number {
                pairs.append_pair(PAGE_QUERY_PARAM, &n.to_string());
            }
        }
        url.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn request(uri: &str) -> RequestUrl {
        let mut headers = HeaderMap::new();
        headers.insert("host", HeaderValue::from_static("example.org"));
        RequestUrl::from_parts(&headers, &uri.parse().unwrap()).unwrap()
    }

    #[test]
    fn page_links() {
        let url = request("/demo/?product_type=T&page=2");
        let page = Page {
            number: 2,
            size: 10,
            pages: 3,
        };
        let response = PageResponse::new(25, &page, &url, Vec::new());
        assert_eq!(
            response.next.as_deref(),
            Some("http://example.org/demo/?product_type=T&page=3")
        );
        assert_eq!(
            response.previous.as_deref(),
            Some("http://example.org/demo/?product_type=T")
        );
    }

    #[test]
    fn single_page_has_no_links() {
        let page = Page {
            number: 1,
            size: 10,
            pages: 1,
        };
        let response = PageResponse::new(3, &page, &request("/demo"), Vec::new());
        assert!(response.next.is_none());
        assert!(response.previous.is_none());
    }

    #[test]
    fn join_replaces_path() {
        assert_eq!(request("/?format=json").join("/demo/"), "http://example.org/demo/");
    }

    #[test]
    fn first_page_link_drops_query() {
        assert_eq!(request("/demo?page=4").with_page(None), "http://example.org/demo");
    }
}
