// Expense Dashboard - Core Library
// Exposes all modules for use in the TUI, the API server, and tests

pub mod error;
pub mod money;
pub mod month;
pub mod expense;
pub mod aggregate;
pub mod db;
pub mod store;
pub mod auth;
pub mod dashboard;
pub mod export;
pub mod config;
pub mod telemetry;

// Re-export commonly used types
pub use error::{Error, Result, ValidationError};
pub use money::{format_brl, format_compact, parse_amount, Cents};
pub use month::YearMonth;
pub use expense::{seed_expenses, Category, Expense, ExpenseForm, NewExpense, PaymentMethod};
pub use aggregate::{
    category_breakdown, compute_kpis, month_bucket, month_index, monthly_trend,
    CategoryTotal, Choice, DashboardView, ExpenseFilter, Kpis, PaidFilter, TrendPoint,
};
pub use store::{
    ChangeEvent, ChangeFeed, ChangeKind, ExpenseBackend, LocalStore, RemoteStore, RemoteTable,
};
pub use auth::{
    AuthEvent, AuthGate, AuthMode, AuthProvider, AuthState, CredentialsForm,
    LocalAuthProvider, Session,
};
pub use dashboard::{Command, Dashboard};
pub use export::write_month_csv;
pub use config::{Backend, Config};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
