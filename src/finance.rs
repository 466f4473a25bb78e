use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::tools::FunctionTool;

pub const FINANCE_DETAILS_TOOL: &str = "get_user_personal_finance_details";

/// Monthly spend by category. Field order is the order the model sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expenses {
    #[serde(rename = "EMI_Expense")]
    pub emi:                 u64,
    #[serde(rename = "Essentials")]
    pub essentials:          u64,
    #[serde(rename = "Entertainment")]
    pub entertainment:       u64,
    #[serde(rename = "Shopping and Travel")]
    pub shopping_and_travel: u64,
}

impl Expenses {
    /// Category name and amount pairs, in display order.
    pub fn categories(&self) -> [(&'static str, u64); 4] {
        [
            ("EMI_Expense",         self.emi),
            ("Essentials",          self.essentials),
            ("Entertainment",       self.entertainment),
            ("Shopping and Travel", self.shopping_and_travel),
        ]
    }

    pub fn total(&self) -> u64 {
        self.categories().iter().map(|(_, amount)| amount).sum()
    }
}

/// A user's monthly finance profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinanceDetails {
    pub salary:  u64,
    pub expense: Expenses,
    pub savings: u64,
}

/// Gets the user's personal finance details: salary, expenses and savings capacity.
///
/// Sample data; every call returns the same fresh record.
pub fn get_user_personal_finance_details() -> FinanceDetails {
    FinanceDetails {
        salary: 50000,
        expense: Expenses {
            emi:                 25000,
            essentials:          5000,
            entertainment:       5000,
            shopping_and_travel: 5000,
        },
        savings: 10000,
    }
}

/// The finance profile exposed as a zero-argument function tool.
pub fn finance_details_tool() -> FunctionTool {
    FunctionTool::json(
        FINANCE_DETAILS_TOOL,
        "Gets users personal finance details like salary, expense and savings capacity.",
        json!({ "type": "object", "properties": {} }),
        |_| Ok(get_user_personal_finance_details()),
    )
}
