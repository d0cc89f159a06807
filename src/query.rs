//! The shared query seam: a DOM scope that can be located against, plus
//! the polled locate/click/wait logic both [`Session`] and
//! [`crate::Element`] funnel through.

use std::time::Duration;

use async_trait::async_trait;

use crate::element::Element;
use crate::error::{DroverError, Result};
use crate::poll::{self, Tick};
use crate::session::Session;

/// A DOM scope queryable by path expression: the whole document (a
/// [`Session`]) or one node's subtree (an [`crate::Element`]).
#[async_trait]
pub trait Queryable {
    /// Single resolution attempt, no retry. Zero matches map to
    /// [`DroverError::NotFound`], a malformed path to
    /// [`DroverError::InvalidSelectorPath`]; anything else passes through.
    async fn raw_find(&self, xpath: &str) -> Result<Element>;

    /// Like [`raw_find`](Queryable::raw_find) for all matches. An empty
    /// match set is `NotFound`, never an empty success.
    async fn raw_find_all(&self, xpath: &str) -> Result<Vec<Element>>;

    /// The session this scope queries through.
    fn owner(&self) -> &Session;
}

pub(crate) async fn locate_one<S>(scope: &S, xpath: &str, timeout: Duration) -> Result<Element>
where
    S: Queryable + Sync,
{
    let outcome = poll::poll_until(
        move || async move {
            match scope.raw_find(xpath).await {
                Ok(element) => Ok(Tick::Ready(element)),
                Err(DroverError::NotFound) => Ok(Tick::Pending),
                Err(err) => Err(err),
            }
        },
        timeout,
    )
    .await;
    absent_on_timeout(outcome)
}

pub(crate) async fn locate_many<S>(
    scope: &S,
    xpath: &str,
    timeout: Duration,
) -> Result<Vec<Element>>
where
    S: Queryable + Sync,
{
    let outcome = poll::poll_until(
        move || async move {
            match scope.raw_find_all(xpath).await {
                Ok(elements) => Ok(Tick::Ready(elements)),
                Err(DroverError::NotFound) => Ok(Tick::Pending),
                Err(err) => Err(err),
            }
        },
        timeout,
    )
    .await;
    absent_on_timeout(outcome)
}

/// A locate that ran out of time failed because the element never showed
/// up; callers get that condition, not the raw deadline error.
fn absent_on_timeout<T>(outcome: Result<T>) -> Result<T> {
    match outcome {
        Err(DroverError::WaitTimeout { .. }) => Err(DroverError::NotFound),
        other => other,
    }
}

pub(crate) async fn click<S>(scope: &S, xpath: &str, timeout: Duration) -> Result<()>
where
    S: Queryable + Sync,
{
    poll::poll_until(
        move || async move {
            let element = match scope.raw_find(xpath).await {
                Ok(element) => element,
                Err(DroverError::NotFound) => return Ok(Tick::Pending),
                Err(err) => return Err(err),
            };
            element.scroll_into_view().await?;
            element.raw_click().await?;
            Ok(Tick::Ready(()))
        },
        timeout,
    )
    .await
}

pub(crate) async fn wait_for_any<S>(scope: &S, xpaths: &[&str], timeout: Duration) -> Result<usize>
where
    S: Queryable + Sync,
{
    poll::poll_until(
        move || async move {
            if !scope.owner().engine_ready().await? {
                return Ok(Tick::Pending);
            }
            // First match by list order wins, not discovery order.
            for (index, xpath) in xpaths.iter().enumerate() {
                match scope.raw_find(xpath).await {
                    Ok(_) => return Ok(Tick::Ready(index)),
                    Err(DroverError::NotFound) => continue,
                    Err(err) => return Err(err),
                }
            }
            Ok(Tick::Pending)
        },
        timeout,
    )
    .await
}
