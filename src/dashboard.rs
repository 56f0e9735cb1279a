// 🧭 Dashboard - application state for one mounted dashboard
//
// Owns the raw expense list, the selected month, filters, the create form
// and the last user-facing notice. Paid toggles and deletes are applied
// locally first and reverted if the durable write fails.

use crate::aggregate::{month_index, DashboardView, ExpenseFilter};
use crate::auth::Session;
use crate::error::{Error, Result};
use crate::expense::{Expense, ExpenseForm};
use crate::month::YearMonth;
use crate::store::ExpenseBackend;

/// A mutation that is applied locally before the store confirms it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SetPaid { id: String, paid: bool },
    Remove { id: String },
}

/// What it takes to put local state back after a failed write
#[derive(Debug, Clone, PartialEq)]
enum Undo {
    RestorePaid { id: String, paid: bool },
    Reinsert { index: usize, expense: Expense },
}

pub struct Dashboard {
    backend: Box<dyn ExpenseBackend>,
    expenses: Vec<Expense>,
    month: YearMonth,
    current: YearMonth,
    pub filter: ExpenseFilter,
    pub form: ExpenseForm,
    notice: Option<String>,
}

impl Dashboard {
    pub fn new(backend: Box<dyn ExpenseBackend>) -> Self {
        let current = YearMonth::current();
        Self {
            backend,
            expenses: Vec::new(),
            month: current,
            current,
            filter: ExpenseFilter::default(),
            form: ExpenseForm::default(),
            notice: None,
        }
    }

    /// Pin "now" (month list window and initial selection)
    pub fn with_current_month(mut self, current: YearMonth) -> Self {
        self.current = current;
        self.month = current;
        self
    }

    pub fn backend_label(&self) -> &'static str {
        self.backend.label()
    }

    /// Swap the signed-in user and re-fetch what they can see
    pub fn set_session(&mut self, session: Option<Session>) -> Result<()> {
        self.backend.set_session(session);
        self.load()
    }

    // ========================================================================
    // LOADING
    // ========================================================================

    /// Replace the whole list with what the store holds
    pub fn load(&mut self) -> Result<()> {
        match self.backend.fetch_all() {
            Ok(expenses) => {
                tracing::info!(count = expenses.len(), backend = self.backend.label(), "expenses loaded");
                self.expenses = expenses;
                Ok(())
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to load expenses");
                self.notice = Some(format!("Could not load expenses: {}", err));
                Err(err)
            }
        }
    }

    /// Full re-fetch when the store reports outside changes
    pub fn sync(&mut self) -> Result<bool> {
        if self.backend.poll_changes()? {
            self.load()?;
            return Ok(true);
        }
        Ok(false)
    }

    // ========================================================================
    // READ SIDE
    // ========================================================================

    pub fn expenses(&self) -> &[Expense] {
        &self.expenses
    }

    pub fn month(&self) -> YearMonth {
        self.month
    }

    pub fn select_month(&mut self, month: YearMonth) {
        self.month = month;
    }

    pub fn months(&self) -> Vec<YearMonth> {
        month_index(&self.expenses, self.current)
    }

    pub fn view(&self) -> DashboardView {
        DashboardView::build(&self.expenses, self.month, self.current, &self.filter)
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn set_notice(&mut self, notice: impl Into<String>) {
        self.notice = Some(notice.into());
    }

    pub fn clear_notice(&mut self) {
        self.notice = None;
    }

    // ========================================================================
    // WRITES
    // ========================================================================

    /// Validate and persist the form, then show the new record's month
    pub fn add_expense(&mut self) -> Result<Expense> {
        let new = match self.form.validate() {
            Ok(new) => new,
            Err(err) => {
                self.notice = Some(err.to_string());
                return Err(err.into());
            }
        };

        if self.backend.requires_session() && !self.backend.has_session() {
            self.notice = Some(Error::NoSession.to_string());
            return Err(Error::NoSession);
        }

        let expense = Expense::create(new);
        if let Err(err) = self.backend.insert(&expense) {
            tracing::error!(error = %err, id = %expense.id, "insert failed");
            self.notice = Some(format!("Could not save expense: {}", err));
            return Err(err);
        }

        tracing::info!(id = %expense.id, month = %expense.year_month(), "expense added");
        self.expenses.insert(0, expense.clone());
        self.month = expense.year_month();
        self.form.reset();
        self.notice = None;
        Ok(expense)
    }

    /// Flip `paid`; unknown ids are ignored
    pub fn toggle_paid(&mut self, id: &str) -> Result<()> {
        let paid = match self.expenses.iter().find(|e| e.id == id) {
            Some(expense) => !expense.paid,
            None => return Ok(()),
        };
        self.execute(Command::SetPaid {
            id: id.to_string(),
            paid,
        })
    }

    /// Delete a record; unknown ids are ignored
    pub fn remove(&mut self, id: &str) -> Result<()> {
        self.execute(Command::Remove { id: id.to_string() })
    }

    /// Apply locally, write through, revert on failure
    pub fn execute(&mut self, command: Command) -> Result<()> {
        let undo = match self.apply_local(&command) {
            Some(undo) => undo,
            None => return Ok(()),
        };

        let outcome = match &command {
            Command::SetPaid { id, paid } => self.backend.set_paid(id, *paid),
            Command::Remove { id } => self.backend.delete(id),
        };

        if let Err(err) = outcome {
            tracing::error!(error = %err, ?command, "write failed, rolling back");
            self.revert(undo);
            self.notice = Some(format!("Could not save change: {}", err));
            return Err(err);
        }

        Ok(())
    }

    fn apply_local(&mut self, command: &Command) -> Option<Undo> {
        match command {
            Command::SetPaid { id, paid } => {
                let expense = self.expenses.iter_mut().find(|e| &e.id == id)?;
                let previous = expense.paid;
                expense.paid = *paid;
                Some(Undo::RestorePaid {
                    id: id.clone(),
                    paid: previous,
                })
            }
            Command::Remove { id } => {
                let index = self.expenses.iter().position(|e| &e.id == id)?;
                let expense = self.expenses.remove(index);
                Some(Undo::Reinsert { index, expense })
            }
        }
    }

    fn revert(&mut self, undo: Undo) {
        match undo {
            Undo::RestorePaid { id, paid } => {
                if let Some(expense) = self.expenses.iter_mut().find(|e| e.id == id) {
                    expense.paid = paid;
                }
            }
            Undo::Reinsert { index, expense } => {
                let index = index.min(self.expenses.len());
                self.expenses.insert(index, expense);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{Choice, PaidFilter};
    use crate::auth::Session;
    use crate::expense::{seed_expenses, Category};
    use crate::store::{ChangeFeed, LocalStore, RemoteStore, RemoteTable};
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    /// In-memory backend whose writes can be made to fail
    struct FlakyBackend {
        rows: Arc<Mutex<Vec<Expense>>>,
        failing: Arc<AtomicBool>,
        writes: Arc<Mutex<Vec<String>>>,
        session: bool,
    }

    impl ExpenseBackend for FlakyBackend {
        fn fetch_all(&mut self) -> Result<Vec<Expense>> {
            Ok(self.rows.lock().unwrap().clone())
        }

        fn insert(&mut self, expense: &Expense) -> Result<()> {
            self.write(format!("insert {}", expense.id))?;
            self.rows.lock().unwrap().insert(0, expense.clone());
            Ok(())
        }

        fn set_paid(&mut self, id: &str, paid: bool) -> Result<()> {
            self.write(format!("set_paid {} {}", id, paid))?;
            for row in self.rows.lock().unwrap().iter_mut().filter(|e| e.id == id) {
                row.paid = paid;
            }
            Ok(())
        }

        fn delete(&mut self, id: &str) -> Result<()> {
            self.write(format!("delete {}", id))?;
            self.rows.lock().unwrap().retain(|e| e.id != id);
            Ok(())
        }

        fn requires_session(&self) -> bool {
            true
        }

        fn has_session(&self) -> bool {
            self.session
        }

        fn label(&self) -> &'static str {
            "flaky"
        }
    }

    impl FlakyBackend {
        fn write(&self, call: String) -> Result<()> {
            self.writes.lock().unwrap().push(call);
            if self.failing.load(Ordering::SeqCst) {
                Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::ConnectionReset,
                    "connection reset",
                )))
            } else {
                Ok(())
            }
        }
    }

    struct Harness {
        dashboard: Dashboard,
        rows: Arc<Mutex<Vec<Expense>>>,
        failing: Arc<AtomicBool>,
        writes: Arc<Mutex<Vec<String>>>,
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
    }

    fn march() -> YearMonth {
        "2024-03".parse().unwrap()
    }

    fn harness(session: bool) -> Harness {
        let rows = Arc::new(Mutex::new(seed_expenses(today())));
        let failing = Arc::new(AtomicBool::new(false));
        let writes = Arc::new(Mutex::new(Vec::new()));
        let backend = FlakyBackend {
            rows: rows.clone(),
            failing: failing.clone(),
            writes: writes.clone(),
            session,
        };
        let mut dashboard = Dashboard::new(Box::new(backend)).with_current_month(march());
        dashboard.load().unwrap();
        Harness {
            dashboard,
            rows,
            failing,
            writes,
        }
    }

    fn fill_form(dashboard: &mut Dashboard, date: &str, amount: &str) {
        dashboard.form = ExpenseForm {
            date: date.to_string(),
            description: "Conference tickets".to_string(),
            amount: amount.to_string(),
            category: Category::Training,
            ..ExpenseForm::for_date(today())
        };
    }

    #[test]
    fn test_seed_kpis_through_dashboard() {
        let mut dashboard = Dashboard::new(Box::new(
            LocalStore::in_memory().unwrap().with_seed_date(today()),
        ))
        .with_current_month(march());
        dashboard.load().unwrap();

        let view = dashboard.view();
        assert_eq!(view.kpis.total, 84800);
        assert_eq!(view.kpis.pending_total, 45000);
        assert_eq!(view.kpis.recurring_total, 39800);
        assert_eq!(view.by_category[0].category, Category::Marketing);
    }

    #[test]
    fn test_add_expense_prepends_and_navigates() {
        let mut h = harness(true);
        fill_form(&mut h.dashboard, "2023-11-05", "1.500,00");

        let added = h.dashboard.add_expense().unwrap();
        assert_eq!(added.amount_cents, 150000);
        assert_eq!(h.dashboard.expenses()[0].id, added.id);
        assert_eq!(h.dashboard.month().to_string(), "2023-11");
        assert_eq!(h.rows.lock().unwrap().len(), 4);

        // Form cleared but date kept
        assert_eq!(h.dashboard.form.description, "");
        assert_eq!(h.dashboard.form.date, "2023-11-05");
    }

    #[test]
    fn test_invalid_form_writes_nothing() {
        let mut h = harness(true);
        fill_form(&mut h.dashboard, "2024-03-01", "abc");

        let err = h.dashboard.add_expense().unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(h.dashboard.notice().is_some());
        assert!(h.writes.lock().unwrap().is_empty());
        assert_eq!(h.dashboard.expenses().len(), 3);
    }

    #[test]
    fn test_add_without_session_is_rejected_client_side() {
        let mut h = harness(false);
        fill_form(&mut h.dashboard, "2024-03-01", "10");

        let err = h.dashboard.add_expense().unwrap_err();
        assert!(matches!(err, Error::NoSession));
        assert_eq!(h.dashboard.notice(), Some("Sign in to add expenses."));
        assert!(h.writes.lock().unwrap().is_empty());
    }

    #[test]
    fn test_failed_insert_keeps_list_and_form() {
        let mut h = harness(true);
        h.failing.store(true, Ordering::SeqCst);
        fill_form(&mut h.dashboard, "2024-03-01", "10");

        assert!(h.dashboard.add_expense().is_err());
        assert_eq!(h.dashboard.expenses().len(), 3);
        assert_eq!(h.dashboard.form.description, "Conference tickets");
    }

    #[test]
    fn test_toggle_twice_restores_paid_flag() {
        let mut h = harness(true);
        let id = h.dashboard.expenses()[2].id.clone();
        let before = h.dashboard.expenses()[2].paid;

        h.dashboard.toggle_paid(&id).unwrap();
        assert_eq!(h.dashboard.expenses()[2].paid, !before);
        h.dashboard.toggle_paid(&id).unwrap();
        assert_eq!(h.dashboard.expenses()[2].paid, before);

        let writes = h.writes.lock().unwrap();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0], format!("set_paid {} {}", id, !before));
    }

    #[test]
    fn test_failed_toggle_rolls_back() {
        let mut h = harness(true);
        let id = h.dashboard.expenses()[0].id.clone();
        let before = h.dashboard.expenses()[0].paid;
        h.failing.store(true, Ordering::SeqCst);

        assert!(h.dashboard.toggle_paid(&id).is_err());
        assert_eq!(h.dashboard.expenses()[0].paid, before);
        assert!(h.dashboard.notice().unwrap().contains("connection reset"));
    }

    #[test]
    fn test_failed_remove_reinserts_in_place() {
        let mut h = harness(true);
        let before: Vec<String> = h.dashboard.expenses().iter().map(|e| e.id.clone()).collect();
        h.failing.store(true, Ordering::SeqCst);

        assert!(h.dashboard.remove(&before[1]).is_err());
        let after: Vec<String> = h.dashboard.expenses().iter().map(|e| e.id.clone()).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_remove_unknown_id_is_noop() {
        let mut h = harness(true);
        let before = h.dashboard.expenses().to_vec();

        h.dashboard.remove("does-not-exist").unwrap();
        h.dashboard.toggle_paid("does-not-exist").unwrap();

        assert_eq!(h.dashboard.expenses(), before.as_slice());
        assert!(h.writes.lock().unwrap().is_empty());
    }

    #[test]
    fn test_remove_deletes_locally_and_durably() {
        let mut h = harness(true);
        let id = h.dashboard.expenses()[0].id.clone();

        h.dashboard.remove(&id).unwrap();
        assert_eq!(h.dashboard.expenses().len(), 2);
        assert_eq!(h.rows.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_view_applies_filters_to_selected_month() {
        let mut h = harness(true);
        h.dashboard.filter.status = PaidFilter::Pending;
        assert_eq!(h.dashboard.view().rows.len(), 1);

        h.dashboard.filter.category = Choice::Only(Category::Systems);
        assert!(h.dashboard.view().rows.is_empty());

        h.dashboard.select_month("2024-04".parse().unwrap());
        let view = h.dashboard.view();
        assert_eq!(view.month_count, 0);
        assert_eq!(view.kpis.total, 0);
        assert_eq!(view.kpis.average_6m, 84800);
    }

    #[test]
    fn test_signing_in_enables_remote_writes() {
        let table = RemoteTable::in_memory(ChangeFeed::new()).unwrap();
        let mut dashboard =
            Dashboard::new(Box::new(RemoteStore::new(table, None))).with_current_month(march());
        dashboard.load().unwrap();
        assert!(dashboard.expenses().is_empty());

        fill_form(&mut dashboard, "2024-03-02", "50");
        assert!(matches!(dashboard.add_expense(), Err(Error::NoSession)));

        let session = Session {
            access_token: "t".to_string(),
            user_id: "u1".to_string(),
            email: "u1@example.com".to_string(),
            issued_at: chrono::Utc::now(),
        };
        dashboard.set_session(Some(session)).unwrap();
        dashboard.add_expense().unwrap();
        assert_eq!(dashboard.view().kpis.total, 5000);
    }

    #[test]
    fn test_sync_refetches_after_remote_change() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("remote.sqlite");
        let feed = ChangeFeed::new();
        let session = Session {
            access_token: "t".to_string(),
            user_id: "u1".to_string(),
            email: "u1@example.com".to_string(),
            issued_at: chrono::Utc::now(),
        };

        let mut mine = Dashboard::new(Box::new(RemoteStore::new(
            RemoteTable::open(&path, feed.clone()).unwrap(),
            Some(session.clone()),
        )))
        .with_current_month(march());
        let mut theirs = Dashboard::new(Box::new(RemoteStore::new(
            RemoteTable::open(&path, feed.clone()).unwrap(),
            Some(session),
        )))
        .with_current_month(march());

        mine.load().unwrap();
        theirs.load().unwrap();
        assert!(!mine.sync().unwrap());

        fill_form(&mut theirs, "2024-03-02", "12,34");
        theirs.add_expense().unwrap();

        assert!(mine.sync().unwrap());
        assert_eq!(mine.expenses().len(), 1);
        assert_eq!(mine.view().kpis.total, 1234);
    }
}
