//! Page-by-page traversal of listing endpoints.

use std::future::Future;

use anyhow::Result;
use futures_util::Stream;
use futures_util::stream;

/// Page numbers start at 1 on the GitHub API.
pub const FIRST_PAGE: u32 = 1;

/// One page of a listing, plus the number of the page after it if there is one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next: Option<u32>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, next: Option<u32>) -> Self {
        Self { items, next }
    }

    /// Build a page for a host that signals the end of a listing with a short page.
    pub fn sized(items: Vec<T>, page: u32, per_page: u32) -> Self {
        let next = (items.len() >= per_page as usize).then_some(page + 1);
        Self { items, next }
    }
}

/// Lazily fetch pages starting from [`FIRST_PAGE`] until the host reports no next page.
///
/// Each call starts a fresh traversal. An empty page also ends the listing so a host
/// that keeps advertising a next page cannot loop forever. The first error ends the
/// stream.
pub fn paginate<T, F, Fut>(mut fetch: F) -> impl Stream<Item = Result<Vec<T>>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    stream::try_unfold(Some(FIRST_PAGE), move |current| {
        let request = current.map(|page| (page, fetch(page)));
        async move {
            let Some((page, request)) = request else {
                return Ok::<_, anyhow::Error>(None);
            };
            let Page { items, next } = request.await?;
            if items.is_empty() {
                return Ok(None);
            }
            let next = next.filter(|&next| next > page);
            Ok::<_, anyhow::Error>(Some((items, next)))
        }
    })
}
