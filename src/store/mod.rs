// Expense persistence - one trait, two interchangeable backends
//
// `LocalStore` keeps the whole list as one serialized blob.
// `RemoteStore` talks row by row to a shared, owner-scoped table and
// learns about other clients' writes through change notifications.

pub mod local;
pub mod remote;

pub use local::{LocalStore, STORAGE_KEY};
pub use remote::{ChangeEvent, ChangeFeed, ChangeKind, RemoteStore, RemoteTable};

use crate::auth::Session;
use crate::error::Result;
use crate::expense::Expense;

/// Durable side of the dashboard's expense list
///
/// Unknown ids are not errors: updating or deleting a row that is gone
/// leaves the store untouched and returns `Ok`.
pub trait ExpenseBackend: Send {
    /// Every visible expense, newest date first for remote tables
    fn fetch_all(&mut self) -> Result<Vec<Expense>>;

    fn insert(&mut self, expense: &Expense) -> Result<()>;

    fn set_paid(&mut self, id: &str, paid: bool) -> Result<()>;

    fn delete(&mut self, id: &str) -> Result<()>;

    /// Whether writes need an authenticated session
    fn requires_session(&self) -> bool {
        false
    }

    fn has_session(&self) -> bool {
        true
    }

    /// Hand over the session from the auth gate; ignored by local stores
    fn set_session(&mut self, _session: Option<Session>) {}

    /// True when someone changed the data since the last fetch
    fn poll_changes(&mut self) -> Result<bool> {
        Ok(false)
    }

    /// Short name for logs and the status bar
    fn label(&self) -> &'static str;
}
