//! Last-known value of one collection plus its load state.

use chrono::Utc;
use tether_core::Timestamp;

/// Load state of a cached collection.
///
/// `Empty -> Loading -> Populated`, then `Populated -> Loading -> Populated`
/// on every refresh. A failed refresh keeps the previous value; only a
/// failed first load returns to `Empty`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Empty,
    Loading,
    Populated,
}

#[derive(Debug, Clone)]
pub struct Cached<T> {
    value: Option<T>,
    state: LoadState,
    refreshed_at: Option<Timestamp>,
}

impl<T> Default for Cached<T> {
    fn default() -> Self {
        Self {
            value: None,
            state: LoadState::Empty,
            refreshed_at: None,
        }
    }
}

impl<T> Cached<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    pub fn is_loading(&self) -> bool {
        self.state == LoadState::Loading
    }

    /// Last successfully loaded value, possibly stale.
    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    /// When the current value was loaded.
    pub fn refreshed_at(&self) -> Option<Timestamp> {
        self.refreshed_at
    }

    /// Enter `Loading`. Returns `false` when a load is already outstanding.
    pub fn begin(&mut self) -> bool {
        if self.is_loading() {
            return false;
        }
        self.state = LoadState::Loading;
        true
    }

    /// Store a freshly loaded value.
    pub fn complete(&mut self, value: T) {
        self.value = Some(value);
        self.state = LoadState::Populated;
        self.refreshed_at = Some(Utc::now());
    }

    /// End a load that failed or was abandoned, keeping any previous value.
    pub fn settle(&mut self) {
        self.state = if self.value.is_some() {
            LoadState::Populated
        } else {
            LoadState::Empty
        };
    }
}
