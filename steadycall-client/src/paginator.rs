//! Lazy traversal of paginated collections.
//!
//! A paginated endpoint returns one [`Page`] at a time together with an
//! opaque [`PageToken`] for the next one. [`Pages`] walks the pages and
//! [`Paginator`] flattens them into a single stream of items. Nothing is
//! fetched until the stream is polled, and the next page is requested only
//! once the current one is used up.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use futures::future::BoxFuture;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Deserializer, Serialize};
use steadycall_core::ErrorKind;

use crate::ClientError;
use crate::config::defaults;

/// Opaque continuation token.
///
/// Passed back to the server exactly as received.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageToken(String);

impl PageToken {
    pub fn new<S: Into<String>>(token: S) -> Self {
        PageToken(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One page of a collection.
///
/// Deserializes from `{"items": [...], "next_page_token": "..."}`. `data`
/// is accepted for `items`; `nextPageToken` and `next_cursor` for the
/// token. A missing, null or empty token marks the last page.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    #[serde(alias = "data")]
    pub items: Vec<T>,
    #[serde(
        default,
        alias = "nextPageToken",
        alias = "next_cursor",
        deserialize_with = "non_empty_token",
        skip_serializing_if = "Option::is_none"
    )]
    pub next_page_token: Option<PageToken>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, next_page_token: Option<PageToken>) -> Self {
        Self {
            items,
            next_page_token,
        }
    }

    /// A page with no successor.
    pub fn last(items: Vec<T>) -> Self {
        Self::new(items, None)
    }

    pub fn has_next(&self) -> bool {
        self.next_page_token.is_some()
    }
}

fn non_empty_token<'de, D>(deserializer: D) -> Result<Option<PageToken>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?
        .filter(|token| !token.is_empty())
        .map(PageToken))
}

type PageFuture<T> = BoxFuture<'static, Result<Page<T>, ClientError>>;
type FetchPage<T> = Box<dyn FnMut(Option<PageToken>) -> PageFuture<T> + Send>;

/// Stream of pages.
///
/// The first page is fetched with no token; each later page with the token
/// of the page before it. The stream ends after a page without a token. A
/// fetch error is yielded once and ends the stream.
pub struct Pages<T> {
    fetch: FetchPage<T>,
    in_flight: Option<PageFuture<T>>,
    next_token: Option<PageToken>,
    started: bool,
    finished: bool,
    pages_fetched: usize,
    max_pages: usize,
}

impl<T> Pages<T> {
    /// Create a page stream from a fetch function.
    pub fn new<F, Fut>(mut fetch: F) -> Self
    where
        F: FnMut(Option<PageToken>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Page<T>, ClientError>> + Send + 'static,
    {
        Self {
            fetch: Box::new(move |token| Box::pin(fetch(token))),
            in_flight: None,
            next_token: None,
            started: false,
            finished: false,
            pages_fetched: 0,
            max_pages: defaults::MAX_PAGES,
        }
    }

    /// Limit the number of pages fetched.
    ///
    /// A traversal that still has a token after `max_pages` pages ends with
    /// an error of kind [`ErrorKind::Unknown`]. The first page is always
    /// fetched, so a limit of 0 acts as a limit of 1 that reports
    /// "page limit of 0 exceeded"; [`ClientBuilder`](crate::ClientBuilder)
    /// rejects 0.
    pub fn max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Number of pages received so far.
    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    /// Flatten into a stream of items.
    pub fn items(self) -> Paginator<T> {
        Paginator {
            pages: self,
            buffer: VecDeque::new(),
        }
    }
}

impl<T> Stream for Pages<T> {
    type Item = Result<Page<T>, ClientError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        if this.finished {
            return Poll::Ready(None);
        }

        if this.in_flight.is_none() {
            if this.started {
                if this.next_token.is_none() {
                    this.finished = true;
                    return Poll::Ready(None);
                }
                if this.pages_fetched >= this.max_pages {
                    this.finished = true;
                    return Poll::Ready(Some(Err(ClientError::new(
                        ErrorKind::Unknown,
                        format!("page limit of {} exceeded", this.max_pages),
                    ))));
                }
            }

            #[cfg(feature = "tracing")]
            tracing::debug!(
                page = this.pages_fetched + 1,
                has_token = this.next_token.is_some(),
                "fetching page"
            );

            this.started = true;
            this.in_flight = Some((this.fetch)(this.next_token.take()));
        }

        let Some(in_flight) = this.in_flight.as_mut() else {
            return Poll::Ready(None);
        };
        let result = ready!(in_flight.as_mut().poll(cx));
        this.in_flight = None;

        match result {
            Ok(page) => {
                this.pages_fetched += 1;
                this.next_token = page.next_page_token.clone();
                Poll::Ready(Some(Ok(page)))
            }
            Err(err) => {
                this.finished = true;
                Poll::Ready(Some(Err(err)))
            }
        }
    }
}

impl<T> std::fmt::Debug for Pages<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pages")
            .field("next_token", &self.next_token)
            .field("pages_fetched", &self.pages_fetched)
            .field("max_pages", &self.max_pages)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

/// Stream of the items of every page, in order.
///
/// # Example
///
/// ```ignore
/// use futures::TryStreamExt;
///
/// let users: Vec<User> = client
///     .list::<User>(RequestSpec::get("/users").query("limit", 100))
///     .try_collect()
///     .await?;
/// ```
pub struct Paginator<T> {
    pages: Pages<T>,
    buffer: VecDeque<T>,
}

impl<T> Paginator<T> {
    /// Create a paginator from a fetch function.
    ///
    /// `fetch` receives `None` for the first page and the previous page's
    /// token afterwards.
    pub fn new<F, Fut>(fetch: F) -> Self
    where
        F: FnMut(Option<PageToken>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Page<T>, ClientError>> + Send + 'static,
    {
        Pages::new(fetch).items()
    }

    /// See [`Pages::max_pages`].
    pub fn max_pages(mut self, max_pages: usize) -> Self {
        self.pages = self.pages.max_pages(max_pages);
        self
    }

    /// Number of pages received so far.
    pub fn pages_fetched(&self) -> usize {
        self.pages.pages_fetched()
    }
}

// Items are only moved in and out of the buffer, never pinned.
impl<T> Unpin for Paginator<T> {}

impl<T> Stream for Paginator<T> {
    type Item = Result<T, ClientError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if let Some(item) = this.buffer.pop_front() {
                return Poll::Ready(Some(Ok(item)));
            }
            match ready!(this.pages.poll_next_unpin(cx)) {
                Some(Ok(page)) => this.buffer.extend(page.items),
                Some(Err(err)) => return Poll::Ready(Some(Err(err))),
                None => return Poll::Ready(None),
            }
        }
    }
}

impl<T> std::fmt::Debug for Paginator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Paginator")
            .field("pages", &self.pages)
            .field("buffered", &self.buffer.len())
            .finish()
    }
}
