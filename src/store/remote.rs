// Remote variant: an owner-scoped `expenses` table plus change notifications
//
// `RemoteTable` plays the server: it stamps and enforces `owner_id` from
// the caller's session. `RemoteStore` is the client the dashboard uses and
// never sees the ownership column.

use chrono::NaiveDate;
use rusqlite::{params, Connection, Row};
use std::path::Path;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::ExpenseBackend;
use crate::auth::Session;
use crate::db;
use crate::error::{Error, Result};
use crate::expense::{Category, Expense, PaymentMethod};
use crate::money::{cents_from_major, major_from_cents};

// ============================================================================
// CHANGE FEED
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub id: String,
}

/// Fan-out of row changes to every subscribed client in this process
#[derive(Debug, Clone, Default)]
pub struct ChangeFeed {
    subscribers: Arc<Mutex<Vec<Sender<ChangeEvent>>>>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Receiver<ChangeEvent> {
        let (tx, rx) = mpsc::channel();
        self.lock_subscribers().push(tx);
        rx
    }

    pub fn publish(&self, event: ChangeEvent) {
        self.lock_subscribers()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock_subscribers().len()
    }

    /// The sender list stays valid after a panicking holder, so keep using it
    fn lock_subscribers(&self) -> MutexGuard<'_, Vec<Sender<ChangeEvent>>> {
        self.subscribers.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("change feed lock was poisoned, recovering");
            PoisonError::into_inner(poisoned)
        })
    }
}

// ============================================================================
// TABLE (server side)
// ============================================================================

pub struct RemoteTable {
    conn: Connection,
    feed: ChangeFeed,
}

impl RemoteTable {
    pub fn open(path: &Path, feed: ChangeFeed) -> Result<Self> {
        Ok(Self::from_connection(db::open(path)?, feed))
    }

    pub fn in_memory(feed: ChangeFeed) -> Result<Self> {
        Ok(Self::from_connection(db::open_in_memory()?, feed))
    }

    pub fn from_connection(conn: Connection, feed: ChangeFeed) -> Self {
        Self { conn, feed }
    }

    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    /// Rows owned by the session's user, newest date first
    pub fn select_all(&self, session: &Session) -> Result<Vec<Expense>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, date, description, category, payment_method,
                    amount, paid, recurring, vendor, notes
             FROM expenses
             WHERE owner_id = ?1
             ORDER BY date DESC, created_at DESC",
        )?;

        let expenses = stmt
            .query_map(params![session.user_id], row_to_expense)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(expenses)
    }

    pub fn insert(&self, session: &Session, expense: &Expense) -> Result<()> {
        self.conn.execute(
            "INSERT INTO expenses (
                id, owner_id, date, description, category, payment_method,
                amount, paid, recurring, vendor, notes
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                expense.id,
                session.user_id,
                expense.date.format("%Y-%m-%d").to_string(),
                expense.description,
                expense.category.label(),
                expense.payment_method.label(),
                major_from_cents(expense.amount_cents),
                expense.paid,
                expense.is_recurring(),
                expense.vendor,
                expense.notes,
            ],
        )?;

        self.feed.publish(ChangeEvent {
            kind: ChangeKind::Insert,
            id: expense.id.clone(),
        });
        Ok(())
    }

    /// Number of rows changed (0 when the id is unknown or not owned)
    pub fn update_paid(&self, session: &Session, id: &str, paid: bool) -> Result<usize> {
        let changed = self.conn.execute(
            "UPDATE expenses SET paid = ?1 WHERE id = ?2 AND owner_id = ?3",
            params![paid, id, session.user_id],
        )?;

        if changed > 0 {
            self.feed.publish(ChangeEvent {
                kind: ChangeKind::Update,
                id: id.to_string(),
            });
        }
        Ok(changed)
    }

    pub fn delete(&self, session: &Session, id: &str) -> Result<usize> {
        let changed = self.conn.execute(
            "DELETE FROM expenses WHERE id = ?1 AND owner_id = ?2",
            params![id, session.user_id],
        )?;

        if changed > 0 {
            self.feed.publish(ChangeEvent {
                kind: ChangeKind::Delete,
                id: id.to_string(),
            });
        }
        Ok(changed)
    }

    /// Changes whenever another connection commits to the file
    pub fn data_version(&self) -> Result<i64> {
        let version = self
            .conn
            .query_row("PRAGMA data_version", [], |row| row.get(0))?;
        Ok(version)
    }
}

fn row_to_expense(row: &Row) -> rusqlite::Result<Expense> {
    let date: String = row.get(1)?;
    let category: String = row.get(3)?;
    let payment_method: String = row.get(4)?;
    let amount: f64 = row.get(5)?;

    Ok(Expense {
        id: row.get(0)?,
        date: NaiveDate::parse_from_str(&date, "%Y-%m-%d").map_err(|e| conversion_error(1, e))?,
        description: row.get(2)?,
        category: category
            .parse::<Category>()
            .map_err(|e| conversion_error(3, e))?,
        payment_method: payment_method
            .parse::<PaymentMethod>()
            .map_err(|e| conversion_error(4, e))?,
        amount_cents: cents_from_major(amount),
        paid: row.get(6)?,
        recurring: Some(row.get(7)?),
        vendor: row.get(8)?,
        notes: row.get(9)?,
    })
}

fn conversion_error<E>(column: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(err))
}

// ============================================================================
// CLIENT
// ============================================================================

pub struct RemoteStore {
    table: RemoteTable,
    session: Option<Session>,
    changes: Receiver<ChangeEvent>,
    seen_version: Option<i64>,
}

impl RemoteStore {
    pub fn new(table: RemoteTable, session: Option<Session>) -> Self {
        let changes = table.feed().subscribe();
        Self {
            table,
            session,
            changes,
            seen_version: None,
        }
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    fn require_session(&self) -> Result<&Session> {
        self.session.as_ref().ok_or(Error::NoSession)
    }

    fn remember_version(&mut self) {
        match self.table.data_version() {
            Ok(version) => self.seen_version = Some(version),
            Err(err) => tracing::debug!(error = %err, "data_version unavailable"),
        }
    }
}

impl ExpenseBackend for RemoteStore {
    fn fetch_all(&mut self) -> Result<Vec<Expense>> {
        // Without a session the ownership policy hides every row
        let expenses = match &self.session {
            Some(session) => self.table.select_all(session)?,
            None => Vec::new(),
        };
        self.remember_version();
        Ok(expenses)
    }

    fn insert(&mut self, expense: &Expense) -> Result<()> {
        let session = self.require_session()?;
        self.table.insert(session, expense)
    }

    fn set_paid(&mut self, id: &str, paid: bool) -> Result<()> {
        let session = self.require_session()?;
        self.table.update_paid(session, id, paid)?;
        Ok(())
    }

    fn delete(&mut self, id: &str) -> Result<()> {
        let session = self.require_session()?;
        self.table.delete(session, id)?;
        Ok(())
    }

    fn requires_session(&self) -> bool {
        true
    }

    fn has_session(&self) -> bool {
        self.session.is_some()
    }

    fn set_session(&mut self, session: Option<Session>) {
        self.session = session;
        self.seen_version = None;
    }

    fn poll_changes(&mut self) -> Result<bool> {
        let mut changed = false;
        while let Ok(event) = self.changes.try_recv() {
            tracing::debug!(kind = ?event.kind, id = %event.id, "change notification");
            changed = true;
        }

        let version = self.table.data_version()?;
        if self.seen_version.is_some_and(|seen| seen != version) {
            changed = true;
        }
        self.seen_version = Some(version);

        Ok(changed)
    }

    fn label(&self) -> &'static str {
        "remote"
    }
}
