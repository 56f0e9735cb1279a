// Local variant: the full list serialized under one fixed key

use chrono::NaiveDate;
use rusqlite::{Connection, TransactionBehavior};
use std::path::Path;

use super::ExpenseBackend;
use crate::db;
use crate::error::Result;
use crate::expense::{seed_expenses, Expense};

/// Fixed key of the serialized expense list
pub const STORAGE_KEY: &str = "expense_dashboard.expenses.v1";

/// Keeps no copy of the list: the TUI and the API server may share one file,
/// so every read and every mutation starts from the stored blob.
pub struct LocalStore {
    conn: Connection,
    today: Option<NaiveDate>,
}

impl LocalStore {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::from_connection(db::open(path)?))
    }

    pub fn in_memory() -> Result<Self> {
        Ok(Self::from_connection(db::open_in_memory()?))
    }

    /// `conn` must already carry the schema (see `db::setup_database`)
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn, today: None }
    }

    /// Pin the date given to first-run seed records
    pub fn with_seed_date(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    fn seed_date(&self) -> NaiveDate {
        self.today
            .unwrap_or_else(|| chrono::Local::now().date_naive())
    }

    /// Read, change and rewrite the blob under one write lock
    fn mutate(&mut self, change: impl FnOnce(&mut Vec<Expense>)) -> Result<()> {
        let today = self.seed_date();
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut list = read_blob(&tx, today)?;
        change(&mut list);
        write_blob(&tx, &list)?;

        tx.commit()?;
        Ok(())
    }
}

/// Absent or unparsable content becomes the seed list, which is written back
fn read_blob(conn: &Connection, today: NaiveDate) -> Result<Vec<Expense>> {
    let raw = db::kv_get(conn, STORAGE_KEY)?;

    let parsed = match raw {
        None => None,
        Some(raw) => match serde_json::from_str::<Vec<Expense>>(&raw) {
            Ok(list) => Some(list),
            Err(err) => {
                tracing::warn!(error = %err, "discarding unreadable expense blob");
                None
            }
        },
    };

    match parsed {
        Some(list) => Ok(list),
        None => {
            let seed = seed_expenses(today);
            write_blob(conn, &seed)?;
            tracing::info!(count = seed.len(), "seeded local expense list");
            Ok(seed)
        }
    }
}

fn write_blob(conn: &Connection, expenses: &[Expense]) -> Result<()> {
    let raw = serde_json::to_string(expenses)?;
    db::kv_set(conn, STORAGE_KEY, &raw)
}

impl ExpenseBackend for LocalStore {
    fn fetch_all(&mut self) -> Result<Vec<Expense>> {
        read_blob(&self.conn, self.seed_date())
    }

    fn insert(&mut self, expense: &Expense) -> Result<()> {
        let expense = expense.clone();
        self.mutate(|list| list.insert(0, expense))
    }

    fn set_paid(&mut self, id: &str, paid: bool) -> Result<()> {
        self.mutate(|list| {
            if let Some(expense) = list.iter_mut().find(|e| e.id == id) {
                expense.paid = paid;
            }
        })
    }

    fn delete(&mut self, id: &str) -> Result<()> {
        self.mutate(|list| list.retain(|e| e.id != id))
    }

    fn label(&self) -> &'static str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expense::{Category, ExpenseForm};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
    }

    fn store() -> LocalStore {
        LocalStore::in_memory().unwrap().with_seed_date(today())
    }

    fn new_expense(description: &str) -> Expense {
        let form = ExpenseForm {
            description: description.to_string(),
            amount: "10,00".to_string(),
            category: Category::Travel,
            ..ExpenseForm::for_date(today())
        };
        Expense::create(form.validate().unwrap())
    }

    #[test]
    fn test_absent_blob_yields_persisted_seed() {
        let mut store = store();
        let first = store.fetch_all().unwrap();
        assert_eq!(first.len(), 3);

        // Seed was written, so a second read returns the same ids
        let again = store.fetch_all().unwrap();
        assert_eq!(first, again);
    }

    #[test]
    fn test_garbage_blob_is_replaced_by_seed() {
        let mut store = store();
        db::kv_set(&store.conn, STORAGE_KEY, "{not json").unwrap();
        assert_eq!(store.fetch_all().unwrap().len(), 3);

        db::kv_set(&store.conn, STORAGE_KEY, r#"{"an":"object"}"#).unwrap();
        assert_eq!(store.fetch_all().unwrap().len(), 3);
    }

    #[test]
    fn test_empty_list_is_kept() {
        let mut store = store();
        db::kv_set(&store.conn, STORAGE_KEY, "[]").unwrap();
        assert!(store.fetch_all().unwrap().is_empty());
    }

    #[test]
    fn test_insert_prepends_and_persists() {
        let mut store = store();
        store.fetch_all().unwrap();

        let expense = new_expense("Flight");
        store.insert(&expense).unwrap();

        let raw = db::kv_get(&store.conn, STORAGE_KEY).unwrap().unwrap();
        let persisted: Vec<Expense> = serde_json::from_str(&raw).unwrap();
        assert_eq!(persisted.len(), 4);
        assert_eq!(persisted[0], expense);
    }

    #[test]
    fn test_set_paid_and_delete_rewrite_blob() {
        let mut store = store();
        let list = store.fetch_all().unwrap();
        let pending = list.iter().find(|e| !e.paid).unwrap().id.clone();

        store.set_paid(&pending, true).unwrap();
        store.delete(&list[0].id).unwrap();

        let reloaded = store.fetch_all().unwrap();
        assert_eq!(reloaded.len(), 2);
        assert!(reloaded.iter().all(|e| e.paid));
    }

    #[test]
    fn test_unknown_ids_are_noops() {
        let mut store = store();
        let before = store.fetch_all().unwrap();

        store.delete("missing").unwrap();
        store.set_paid("missing", false).unwrap();

        assert_eq!(store.fetch_all().unwrap(), before);
    }

    #[test]
    fn test_deleting_everything_persists_empty_list() {
        let mut store = store();
        for expense in store.fetch_all().unwrap() {
            store.delete(&expense.id).unwrap();
        }
        assert!(store.fetch_all().unwrap().is_empty());
    }

    #[test]
    fn test_reopen_file_keeps_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("local.sqlite");

        let expense = new_expense("Hotel");
        {
            let mut store = LocalStore::open(&path).unwrap().with_seed_date(today());
            store.fetch_all().unwrap();
            store.insert(&expense).unwrap();
        }

        let mut reopened = LocalStore::open(&path).unwrap();
        let list = reopened.fetch_all().unwrap();
        assert_eq!(list.len(), 4);
        assert_eq!(list[0].description, "Hotel");
    }

    #[test]
    fn test_two_handles_on_one_file_keep_each_others_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("local.sqlite");

        let mut server = LocalStore::open(&path).unwrap().with_seed_date(today());
        let mut tui = LocalStore::open(&path).unwrap().with_seed_date(today());
        let seeded = tui.fetch_all().unwrap();
        assert_eq!(server.fetch_all().unwrap(), seeded);

        let from_api = new_expense("From API");
        server.insert(&from_api).unwrap();

        let pending = seeded.iter().find(|e| !e.paid).unwrap().id.clone();
        tui.set_paid(&pending, true).unwrap();
        tui.delete(&seeded[0].id).unwrap();

        let list = server.fetch_all().unwrap();
        assert_eq!(list.len(), 3);
        assert_eq!(list[0], from_api);
        assert!(list.iter().all(|e| e.paid));
        assert!(list.iter().all(|e| e.id != seeded[0].id));
    }
}
