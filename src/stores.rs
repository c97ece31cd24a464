//! Observable UI state shared between views.
//!
//! Each cell is a `tokio::sync::watch` channel: views `subscribe()` and are
//! woken on every `set`/`update`.

use tokio::sync::watch;

/// A mutable value with change notification.
#[derive(Debug)]
pub struct Writable<T> {
    tx: watch::Sender<T>,
}

impl<T: Clone> Writable<T> {
    pub fn new(initial: T) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    pub fn get(&self) -> T {
        self.tx.borrow().clone()
    }

    /// Replace the value and notify subscribers, even with no receivers alive.
    pub fn set(&self, value: T) {
        self.tx.send_replace(value);
    }

    pub fn update(&self, f: impl FnOnce(&mut T)) {
        self.tx.send_modify(f);
    }

    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.tx.subscribe()
    }
}

impl<T: Clone + Default> Default for Writable<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// State of the aggregate (all regions) page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TotalPageState {
    /// Which metric the map is coloured by
    pub map_type: String,
    /// Region code under the cursor
    pub active: Option<String>,
}

#[derive(Debug, Default)]
pub struct TotalPageModel {
    state: Writable<TotalPageState>,
}

impl TotalPageModel {
    pub fn subscribe(&self) -> watch::Receiver<TotalPageState> {
        self.state.subscribe()
    }

    pub fn get(&self) -> TotalPageState {
        self.state.get()
    }

    pub fn set_map_type(&self, map_type: &str) {
        self.state.update(|s| s.map_type = map_type.to_string());
    }

    pub fn set_active(&self, active: Option<String>) {
        self.state.update(|s| s.active = active);
    }
}

/// Every shared UI cell.
#[derive(Debug, Default)]
pub struct AppStores {
    pub cur_date: Writable<String>,
    pub page_title: Writable<String>,
    pub current_page: Writable<String>,
    pub current_state: Writable<String>,
    pub total_page: TotalPageModel,
}

impl AppStores {
    pub fn new() -> Self {
        Self::default()
    }
}
