//! A located DOM node: relative queries, interaction, and attribute/text
//! reads, all scoped to the node's subtree.

use async_trait::async_trait;
use serde_json::json;
use thirtyfour::prelude::*;

use crate::error::{self, DroverError, Result};
use crate::poll::{self, Tick};
use crate::query::{self, Queryable};
use crate::session::Session;

const SCROLL_INTO_VIEW: &str =
    r#"arguments[0].scrollIntoView({behavior: "auto", block: "center", inline: "center"});"#;
const SET_ATTRIBUTE: &str = "arguments[0].setAttribute(arguments[1], arguments[2]);";

/// A located DOM node, bound to the session that found it. Becomes stale
/// when the page mutates the node away; staleness shows up lazily as an
/// error from the remote side (see [`DroverError::is_stale`]).
#[derive(Clone)]
pub struct Element {
    session: Session,
    handle: WebElement,
}

impl std::fmt::Debug for Element {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Element")
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

impl Element {
    pub(crate) fn new(session: Session, handle: WebElement) -> Self {
        Element { session, handle }
    }

    /// Resolves exactly one element inside this node's subtree.
    pub async fn locate_one(&self, xpath: &str) -> Result<Element> {
        query::locate_one(self, xpath, self.session.timeout()).await
    }

    /// Resolves at least one element inside this node's subtree.
    pub async fn locate_many(&self, xpath: &str) -> Result<Vec<Element>> {
        query::locate_many(self, xpath, self.session.timeout()).await
    }

    /// Clicks a descendant, with the same retry envelope as
    /// [`Session::click`].
    pub async fn click(&self, xpath: &str) -> Result<()> {
        query::click(self, xpath, self.session.timeout()).await
    }

    /// Waits for any of `xpaths` to match inside this subtree.
    pub async fn wait_for_any(&self, xpaths: &[&str]) -> Result<usize> {
        query::wait_for_any(self, xpaths, self.session.timeout()).await
    }

    /// Direct attribute read, no retry. A missing attribute is `None`.
    pub async fn attribute(&self, name: &str) -> Result<Option<String>> {
        Ok(self.handle.attr(name).await?)
    }

    /// Sets an attribute on the remote node through a scripted mutation.
    pub async fn set_attribute(&self, name: &str, value: &str) -> Result<()> {
        self.session
            .execute(
                SET_ATTRIBUTE,
                vec![self.handle.to_json()?, json!(name), json!(value)],
            )
            .await
    }

    /// Trimmed text content. Deliberately lossy: any failure reads as an
    /// empty string.
    pub async fn text(&self) -> String {
        match self.handle.text().await {
            Ok(text) => text.trim().to_string(),
            Err(_) => String::new(),
        }
    }

    /// The immediate parent node.
    pub async fn parent(&self) -> Result<Element> {
        let handle = self.handle.find(By::XPath("..")).await?;
        Ok(Element::new(self.session.clone(), handle))
    }

    /// Issues a scripted scroll, then polls until the node reports itself
    /// visually displayed, bounded by the owning session's timeout.
    pub async fn scroll_into_view(&self) -> Result<()> {
        self.session
            .execute(SCROLL_INTO_VIEW, vec![self.handle.to_json()?])
            .await?;
        poll::poll_until(
            move || async move {
                if self.handle.is_displayed().await? {
                    Ok(Tick::Ready(()))
                } else {
                    Ok(Tick::Pending)
                }
            },
            self.session.timeout(),
        )
        .await
    }

    /// Serves a screenshot of the owning session's page.
    pub async fn capture_snapshot(&self) -> Result<()> {
        self.session.capture_snapshot().await
    }

    pub(crate) async fn raw_click(&self) -> Result<()> {
        self.handle.click().await?;
        Ok(())
    }
}

#[async_trait]
impl Queryable for Element {
    async fn raw_find(&self, xpath: &str) -> Result<Element> {
        match self.handle.find(By::XPath(xpath)).await {
            Ok(handle) => Ok(Element::new(self.session.clone(), handle)),
            Err(err) => Err(error::classify_find_error(err, xpath)),
        }
    }

    async fn raw_find_all(&self, xpath: &str) -> Result<Vec<Element>> {
        let handles = self
            .handle
            .find_all(By::XPath(xpath))
            .await
            .map_err(|err| error::classify_find_error(err, xpath))?;
        if handles.is_empty() {
            return Err(DroverError::NotFound);
        }
        Ok(handles
            .into_iter()
            .map(|handle| Element::new(self.session.clone(), handle))
            .collect())
    }

    fn owner(&self) -> &Session {
        &self.session
    }
}
