// CSV export of one month's expenses

use csv::Writer;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use crate::aggregate::month_bucket;
use crate::error::Result;
use crate::expense::Expense;
use crate::money::Cents;
use crate::month::YearMonth;

const HEADER: [&str; 9] = [
    "date",
    "description",
    "category",
    "payment_method",
    "amount",
    "paid",
    "recurring",
    "vendor",
    "notes",
];

/// Write the month's rows (newest first) and return how many were written
pub fn write_month_csv<W: Write>(out: W, expenses: &[Expense], month: YearMonth) -> Result<usize> {
    let mut wtr = Writer::from_writer(out);
    wtr.write_record(HEADER)?;

    let rows = month_bucket(expenses, month);
    for expense in &rows {
        wtr.write_record([
            expense.date.format("%Y-%m-%d").to_string(),
            expense.description.clone(),
            expense.category.label().to_string(),
            expense.payment_method.label().to_string(),
            plain_amount(expense.amount_cents),
            expense.paid.to_string(),
            expense.is_recurring().to_string(),
            expense.vendor.clone().unwrap_or_default(),
            expense.notes.clone().unwrap_or_default(),
        ])?;
    }

    wtr.flush()?;
    Ok(rows.len())
}

pub fn export_month_to_path(path: &Path, expenses: &[Expense], month: YearMonth) -> Result<usize> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let file = File::create(path)?;
    let written = write_month_csv(file, expenses, month)?;
    tracing::info!(path = %path.display(), %month, rows = written, "month exported");
    Ok(written)
}

/// `123456` -> `1234.56`
fn plain_amount(cents: Cents) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expense::seed_expenses;
    use chrono::NaiveDate;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
    }

    fn export(expenses: &[Expense], month: &str) -> (usize, String) {
        let mut buf = Vec::new();
        let count = write_month_csv(&mut buf, expenses, month.parse().unwrap()).unwrap();
        (count, String::from_utf8(buf).unwrap())
    }

    #[test]
    fn test_plain_amount() {
        assert_eq!(plain_amount(123456), "1234.56");
        assert_eq!(plain_amount(5), "0.05");
        assert_eq!(plain_amount(-250), "-2.50");
    }

    #[test]
    fn test_export_seed_month() {
        let (count, text) = export(&seed_expenses(today()), "2024-03");
        assert_eq!(count, 3);

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "date,description,category,payment_method,amount,paid,recurring,vendor,notes"
        );
        assert!(text.contains("2024-03-15,Booking platform subscription,Systems,Card,299.00,true,true,Platform X,Monthly plan"));
        assert!(text.contains("Paid traffic campaign,Marketing,PIX,450.00,false,false,Meta Ads,Pending"));
    }

    #[test]
    fn test_export_other_month_has_header_only() {
        let (count, text) = export(&seed_expenses(today()), "2023-12");
        assert_eq!(count, 0);
        assert_eq!(text.lines().count(), 1);
    }

    #[test]
    fn test_fields_with_commas_are_quoted() {
        let mut expenses = seed_expenses(today());
        expenses[0].description = "Rent, office".to_string();
        let (_, text) = export(&expenses, "2024-03");
        assert!(text.contains("\"Rent, office\""));
    }

    #[test]
    fn test_export_to_path_creates_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exports").join("2024-03.csv");
        let written =
            export_month_to_path(&path, &seed_expenses(today()), "2024-03".parse().unwrap())
                .unwrap();
        assert_eq!(written, 3);
        assert!(fs::read_to_string(&path).unwrap().starts_with("date,"));
    }
}
