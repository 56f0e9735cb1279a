// 🧾 Expense - the only domain entity
//
// Identity is the UUID assigned at creation. After that the only
// mutations are flipping `paid` and deleting the whole record.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;
use crate::money::{self, Cents};
use crate::month::YearMonth;

// ============================================================================
// CLOSED SETS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "Systems")]
    Systems,
    #[serde(rename = "AI/Subscriptions")]
    AiSubscriptions,
    #[serde(rename = "Training")]
    Training,
    #[serde(rename = "Mentoring")]
    Mentoring,
    #[serde(rename = "Travel")]
    Travel,
    #[serde(rename = "Salaries")]
    Salaries,
    #[serde(rename = "Commissions")]
    Commissions,
    #[serde(rename = "Taxes")]
    Taxes,
    #[serde(rename = "Marketing")]
    Marketing,
    #[serde(rename = "Other")]
    Other,
}

impl Category {
    pub const ALL: [Category; 10] = [
        Category::Systems,
        Category::AiSubscriptions,
        Category::Training,
        Category::Mentoring,
        Category::Travel,
        Category::Salaries,
        Category::Commissions,
        Category::Taxes,
        Category::Marketing,
        Category::Other,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Category::Systems => "Systems",
            Category::AiSubscriptions => "AI/Subscriptions",
            Category::Training => "Training",
            Category::Mentoring => "Mentoring",
            Category::Travel => "Travel",
            Category::Salaries => "Salaries",
            Category::Commissions => "Commissions",
            Category::Taxes => "Taxes",
            Category::Marketing => "Marketing",
            Category::Other => "Other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Category {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ValidationError::UnknownCategory(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentMethod {
    #[serde(rename = "PIX")]
    Pix,
    #[serde(rename = "Card")]
    Card,
    #[serde(rename = "Boleto")]
    Boleto,
    #[serde(rename = "Transfer")]
    Transfer,
    #[serde(rename = "Cash")]
    Cash,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 5] = [
        PaymentMethod::Pix,
        PaymentMethod::Card,
        PaymentMethod::Boleto,
        PaymentMethod::Transfer,
        PaymentMethod::Cash,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            PaymentMethod::Pix => "PIX",
            PaymentMethod::Card => "Card",
            PaymentMethod::Boleto => "Boleto",
            PaymentMethod::Transfer => "Transfer",
            PaymentMethod::Cash => "Cash",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for PaymentMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PaymentMethod::ALL
            .iter()
            .copied()
            .find(|m| m.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ValidationError::UnknownPaymentMethod(s.to_string()))
    }
}

// ============================================================================
// EXPENSE ENTITY
// ============================================================================

/// Persisted shape of one expense (camelCase in the local blob)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    pub id: String,
    pub date: NaiveDate,
    pub description: String,
    pub category: Category,
    pub amount_cents: Cents,
    pub paid: bool,
    pub payment_method: PaymentMethod,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    /// Informational only, nothing re-creates recurring expenses
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurring: Option<bool>,
}

/// Validated form contents, not yet given an identity
#[derive(Debug, Clone, PartialEq)]
pub struct NewExpense {
    pub date: NaiveDate,
    pub description: String,
    pub category: Category,
    pub amount_cents: Cents,
    pub paid: bool,
    pub payment_method: PaymentMethod,
    pub vendor: Option<String>,
    pub notes: Option<String>,
    pub recurring: bool,
}

impl Expense {
    /// Give a validated form a fresh identity
    pub fn create(new: NewExpense) -> Self {
        Expense {
            id: uuid::Uuid::new_v4().to_string(),
            date: new.date,
            description: new.description,
            category: new.category,
            amount_cents: new.amount_cents,
            paid: new.paid,
            payment_method: new.payment_method,
            vendor: new.vendor,
            notes: new.notes,
            recurring: Some(new.recurring),
        }
    }

    pub fn year_month(&self) -> YearMonth {
        YearMonth::from_date(self.date)
    }

    pub fn is_recurring(&self) -> bool {
        self.recurring.unwrap_or(false)
    }

    /// Lowercased text searched by the free-text filter
    pub fn search_haystack(&self) -> String {
        format!(
            "{} {} {}",
            self.description,
            self.vendor.as_deref().unwrap_or(""),
            self.notes.as_deref().unwrap_or("")
        )
        .to_lowercase()
    }
}

// ============================================================================
// CREATE FORM
// ============================================================================

/// Raw create-dialog fields, exactly as typed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExpenseForm {
    pub date: String,
    pub description: String,
    pub category: Category,
    pub amount: String,
    pub paid: bool,
    pub payment_method: PaymentMethod,
    pub vendor: String,
    pub notes: String,
    pub recurring: bool,
}

impl Default for ExpenseForm {
    fn default() -> Self {
        Self::for_date(chrono::Local::now().date_naive())
    }
}

impl ExpenseForm {
    pub fn for_date(date: NaiveDate) -> Self {
        ExpenseForm {
            date: date.format("%Y-%m-%d").to_string(),
            description: String::new(),
            category: Category::Systems,
            amount: String::new(),
            paid: true,
            payment_method: PaymentMethod::Pix,
            vendor: String::new(),
            notes: String::new(),
            recurring: false,
        }
    }

    pub fn validate(&self) -> Result<NewExpense, ValidationError> {
        let date_text = self.date.trim();
        if date_text.is_empty() {
            return Err(ValidationError::MissingDate);
        }
        let date = NaiveDate::parse_from_str(date_text, "%Y-%m-%d")
            .map_err(|_| ValidationError::InvalidDate(self.date.clone()))?;

        let description = self.description.trim();
        if description.is_empty() {
            return Err(ValidationError::MissingDescription);
        }

        let amount_cents = money::parse_amount(&self.amount)?;

        Ok(NewExpense {
            date,
            description: description.to_string(),
            category: self.category,
            amount_cents,
            paid: self.paid,
            payment_method: self.payment_method,
            vendor: non_blank(&self.vendor),
            notes: non_blank(&self.notes),
            recurring: self.recurring,
        })
    }

    /// Clear everything but the date after a successful save
    pub fn reset(&mut self) {
        let date = std::mem::take(&mut self.date);
        *self = ExpenseForm {
            date,
            ..ExpenseForm::for_date(NaiveDate::default())
        };
    }
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

// ============================================================================
// FIRST-RUN DATA
// ============================================================================

/// The three records shown on first run, all dated `today`
pub fn seed_expenses(today: NaiveDate) -> Vec<Expense> {
    let id = || uuid::Uuid::new_v4().to_string();

    vec![
        Expense {
            id: id(),
            date: today,
            description: "Booking platform subscription".to_string(),
            category: Category::Systems,
            amount_cents: 29900,
            paid: true,
            payment_method: PaymentMethod::Card,
            vendor: Some("Platform X".to_string()),
            notes: Some("Monthly plan".to_string()),
            recurring: Some(true),
        },
        Expense {
            id: id(),
            date: today,
            description: "Chat/AI workspace".to_string(),
            category: Category::AiSubscriptions,
            amount_cents: 9900,
            paid: true,
            payment_method: PaymentMethod::Card,
            vendor: Some("AI".to_string()),
            notes: None,
            recurring: Some(true),
        },
        Expense {
            id: id(),
            date: today,
            description: "Paid traffic campaign".to_string(),
            category: Category::Marketing,
            amount_cents: 45000,
            paid: false,
            payment_method: PaymentMethod::Pix,
            vendor: Some("Meta Ads".to_string()),
            notes: Some("Pending".to_string()),
            recurring: None,
        },
    ]
}
