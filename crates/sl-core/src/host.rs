//! Browser tab seam
//!
//! The browser owns the tabs; the core only needs to know which tab is
//! active and to ask for a redirect.

use std::cell::RefCell;
use std::collections::HashSet;

use crate::error::HostError;
use crate::types::{TabId, TabSnapshot};

/// Tab operations the core needs from the browser.
pub trait TabHost {
    /// The active tab of the focused window, if any.
    fn active_tab(&self) -> Option<TabSnapshot>;

    /// Point `tab_id` at `url`.
    fn redirect(&self, tab_id: TabId, url: &str) -> Result<(), HostError>;
}

/// A redirect the core asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub tab_id: TabId,
    pub url: String,
}

/// Host backed by a snapshot of browser state taken before dispatching.
///
/// Redirects are recorded instead of performed; the caller applies them to
/// the real browser afterwards. Tabs marked closed fail with
/// [`HostError::TabGone`].
#[derive(Debug, Default)]
pub struct SnapshotHost {
    active: Option<TabSnapshot>,
    closed: HashSet<TabId>,
    redirects: RefCell<Vec<Redirect>>,
}

impl SnapshotHost {
    pub fn new(active: Option<TabSnapshot>) -> Self {
        Self {
            active,
            ..Self::default()
        }
    }

    /// Host whose active tab is `tab_id` showing `url`.
    pub fn with_active(tab_id: TabId, url: impl Into<String>) -> Self {
        Self::new(Some(TabSnapshot::new(tab_id, url)))
    }

    /// Mark a tab as closed.
    pub fn close_tab(&mut self, tab_id: TabId) {
        self.closed.insert(tab_id);
    }

    pub fn set_active(&mut self, active: Option<TabSnapshot>) {
        self.active = active;
    }

    /// Redirects recorded so far, oldest first.
    pub fn redirects(&self) -> Vec<Redirect> {
        self.redirects.borrow().clone()
    }

    /// Take the recorded redirects, leaving none behind.
    pub fn take_redirects(&self) -> Vec<Redirect> {
        self.redirects.take()
    }
}

impl TabHost for SnapshotHost {
    fn active_tab(&self) -> Option<TabSnapshot> {
        self.active.clone()
    }

    fn redirect(&self, tab_id: TabId, url: &str) -> Result<(), HostError> {
        if self.closed.contains(&tab_id) {
            return Err(HostError::TabGone(tab_id));
        }
        self.redirects.borrow_mut().push(Redirect {
            tab_id,
            url: url.to_string(),
        });
        Ok(())
    }
}
