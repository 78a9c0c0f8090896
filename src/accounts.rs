//! Static financial fixtures
//!
//! In-memory user → accounts → expenses/deposits records consumed by the
//! local `analyze_user_account` tool handler.

use serde::{Deserialize, Serialize};
use std::fmt::Write;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expense {
    pub id: i64,
    pub amount: f64,
    pub category: String,
    pub date: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deposit {
    pub id: i64,
    pub amount: f64,
    pub category: String,
    pub date: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub name: String,
    pub balance: f64,
    pub expenses: Vec<Expense>,
    pub deposits: Vec<Deposit>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: i64,
    pub accounts: Vec<Account>,
}

fn expense(id: i64, amount: f64, category: &str, date: &str, description: &str) -> Expense {
    Expense {
        id,
        amount,
        category: category.to_string(),
        date: date.to_string(),
        description: description.to_string(),
    }
}

fn deposit(id: i64, amount: f64, category: &str, date: &str, description: &str) -> Deposit {
    Deposit {
        id,
        amount,
        category: category.to_string(),
        date: date.to_string(),
        description: description.to_string(),
    }
}

/// The fixed dataset. Loaded fresh per lookup; the records are small.
pub fn mock_users() -> Vec<UserRecord> {
    vec![
        UserRecord {
            id: 1,
            accounts: vec![
                Account {
                    id: 1,
                    name: "Checkings Account".to_string(),
                    balance: 3450.75,
                    expenses: vec![
                        expense(1, 1200.0, "rent", "2024-01-01", "Monthly rent payment"),
                        expense(2, 1200.0, "rent", "2024-02-01", "Monthly rent payment"),
                        expense(3, 89.50, "food", "2024-01-05", "Grocery shopping - Whole Foods"),
                        expense(4, 45.20, "food", "2024-01-12", "Lunch - Downtown Bistro"),
                        expense(5, 85.40, "utilities", "2024-01-15", "Electric bill"),
                        expense(6, 65.20, "utilities", "2024-01-20", "Internet bill"),
                        expense(7, 45.00, "transportation", "2024-01-08", "Gas station"),
                        expense(8, 15.99, "entertainment", "2024-01-01", "Netflix subscription"),
                        expense(9, 25.00, "healthcare", "2024-01-20", "Pharmacy copay"),
                    ],
                    deposits: vec![
                        deposit(1, 3200.0, "salary", "2024-01-01", "Monthly salary"),
                        deposit(2, 3200.0, "salary", "2024-02-01", "Monthly salary"),
                        deposit(3, 150.0, "refund", "2024-01-18", "Tax refund adjustment"),
                    ],
                },
                Account {
                    id: 2,
                    name: "Savings Account".to_string(),
                    balance: 12800.00,
                    expenses: vec![expense(
                        10,
                        500.0,
                        "transfer",
                        "2024-02-10",
                        "Transfer to checkings",
                    )],
                    deposits: vec![
                        deposit(4, 400.0, "savings", "2024-01-05", "Monthly savings transfer"),
                        deposit(5, 400.0, "savings", "2024-02-05", "Monthly savings transfer"),
                        deposit(6, 85.30, "interest", "2024-01-31", "Interest payment"),
                    ],
                },
            ],
        },
        UserRecord {
            id: 2,
            accounts: vec![Account {
                id: 3,
                name: "Checkings Account".to_string(),
                balance: 980.40,
                expenses: vec![
                    expense(11, 950.0, "rent", "2024-01-01", "Monthly rent payment"),
                    expense(12, 120.75, "food", "2024-01-09", "Weekly groceries"),
                    expense(13, 55.00, "transportation", "2024-01-14", "Gas station"),
                    expense(14, 39.99, "entertainment", "2024-01-03", "Streaming bundle"),
                ],
                deposits: vec![deposit(7, 2100.0, "salary", "2024-01-01", "Monthly salary")],
            }],
        },
    ]
}

pub fn find_user(user_id: i64) -> Option<UserRecord> {
    mock_users().into_iter().find(|u| u.id == user_id)
}

/// Render a user's accounts to markdown for the synthesis prompt.
pub fn format_user_to_markdown(user: &UserRecord) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "## User: {}\n", user.id);

    for (idx, account) in user.accounts.iter().enumerate() {
        let _ = writeln!(out, "## Account {}: {}\n", idx + 1, account.name);
        let _ = writeln!(out, "- **Balance:** ${:.2}", account.balance);
        let _ = writeln!(out, "- **Expenses:** {}", account.expenses.len());
        let _ = writeln!(out, "- **Deposits:** {}\n", account.deposits.len());

        let _ = writeln!(out, "**Expenses:**");
        for (i, e) in account.expenses.iter().enumerate() {
            let _ = writeln!(
                out,
                "- **Expense {}:** ${:.2} | {} | {} | {}",
                i + 1,
                e.amount,
                e.category,
                e.date,
                e.description
            );
        }

        let _ = writeln!(out, "\n**Deposits:**");
        for (i, d) in account.deposits.iter().enumerate() {
            let _ = writeln!(
                out,
                "- **Deposit {}:** ${:.2} | {} | {} | {}",
                i + 1,
                d.amount,
                d.category,
                d.date,
                d.description
            );
        }
        out.push('\n');
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_user() {
        assert!(find_user(1).is_some());
        assert!(find_user(2).is_some());
        assert!(find_user(99).is_none());
    }

    #[test]
    fn test_markdown_includes_every_account() {
        let user = find_user(1).unwrap();
        let md = format_user_to_markdown(&user);
        assert!(md.contains("## User: 1"));
        assert!(md.contains("Checkings Account"));
        assert!(md.contains("Savings Account"));
        assert!(md.contains("$1200.00"));
    }
}
