use serde::{Deserialize, Serialize};

/// Tracks token usage for a single model call, a turn, or a whole session.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens:  u32,
    pub output_tokens: u32,
    pub total_tokens:  u32,
}

impl TokenUsage {
    pub fn new(input: u32, output: u32) -> Self {
        Self {
            input_tokens:  input,
            output_tokens: output,
            total_tokens:  input.saturating_add(output),
        }
    }

    /// Accumulate usage from another call
    pub fn add(&mut self, other: TokenUsage) {
        self.input_tokens  = self.input_tokens.saturating_add(other.input_tokens);
        self.output_tokens = self.output_tokens.saturating_add(other.output_tokens);
        self.total_tokens  = self.total_tokens.saturating_add(other.total_tokens);
    }
}

/// Defines limits on token usage for one agent turn.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenBudget {
    pub max_total_tokens:  Option<u32>,
    pub max_input_tokens:  Option<u32>,
    pub max_output_tokens: Option<u32>,
}

impl TokenBudget {
    pub fn new(max_total: u32) -> Self {
        Self {
            max_total_tokens:  Some(max_total),
            max_input_tokens:  None,
            max_output_tokens: None,
        }
    }

    /// Returns true if any limit is exceeded.
    pub fn is_exceeded(&self, usage: TokenUsage) -> bool {
        if let Some(limit) = self.max_total_tokens {
            if usage.total_tokens > limit { return true; }
        }
        if let Some(limit) = self.max_input_tokens {
            if usage.input_tokens > limit { return true; }
        }
        if let Some(limit) = self.max_output_tokens {
            if usage.output_tokens > limit { return true; }
        }
        false
    }

    /// What is left of each limit once `spent` has been used.
    pub fn remaining(&self, spent: TokenUsage) -> Self {
        Self {
            max_total_tokens:  self.max_total_tokens.map(|l| l.saturating_sub(spent.total_tokens)),
            max_input_tokens:  self.max_input_tokens.map(|l| l.saturating_sub(spent.input_tokens)),
            max_output_tokens: self.max_output_tokens.map(|l| l.saturating_sub(spent.output_tokens)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_accumulates() {
        let mut total = TokenUsage::default();
        total.add(TokenUsage::new(10, 5));
        total.add(TokenUsage::new(3, 2));
        assert_eq!(total, TokenUsage { input_tokens: 13, output_tokens: 7, total_tokens: 20 });
    }

    #[test]
    fn budget_checks_each_limit() {
        let budget = TokenBudget { max_input_tokens: Some(10), ..TokenBudget::new(100) };
        assert!(!budget.is_exceeded(TokenUsage::new(10, 50)));
        assert!(budget.is_exceeded(TokenUsage::new(11, 0)));
        assert!(budget.is_exceeded(TokenUsage::new(5, 96)));
    }

    #[test]
    fn usage_saturates_instead_of_overflowing() {
        let mut total = TokenUsage::new(u32::MAX - 1, 5);
        assert_eq!(total.total_tokens, u32::MAX);
        total.add(TokenUsage::new(10, 10));
        assert_eq!(total.input_tokens, u32::MAX);
        assert_eq!(total.output_tokens, 15);
        assert_eq!(total.total_tokens, u32::MAX);
    }

    #[test]
    fn remaining_budget_shrinks_with_spend() {
        let budget = TokenBudget { max_input_tokens: Some(50), ..TokenBudget::new(100) };
        let left = budget.remaining(TokenUsage::new(40, 30));
        assert_eq!(left.max_total_tokens, Some(30));
        assert_eq!(left.max_input_tokens, Some(10));
        assert_eq!(left.max_output_tokens, None);
        assert_eq!(budget.remaining(TokenUsage::new(500, 0)).max_total_tokens, Some(0));
    }
}
