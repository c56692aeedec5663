//! The fixed set of portfolio resources and their remote tools.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One independently fetchable part of a portfolio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortfolioResource {
    NetWorth,
    CreditReport,
    EpfDetails,
    MutualFundTransactions,
    StockTransactions,
    BankTransactions,
}

impl PortfolioResource {
    /// Every resource, in record order.
    pub const ALL: [PortfolioResource; 6] = [
        Self::NetWorth,
        Self::CreditReport,
        Self::EpfDetails,
        Self::MutualFundTransactions,
        Self::StockTransactions,
        Self::BankTransactions,
    ];

    /// Key used in records and config files.
    pub fn key(self) -> &'static str {
        match self {
            Self::NetWorth => "net_worth",
            Self::CreditReport => "credit_report",
            Self::EpfDetails => "epf_details",
            Self::MutualFundTransactions => "mutual_fund_transactions",
            Self::StockTransactions => "stock_transactions",
            Self::BankTransactions => "bank_transactions",
        }
    }

    /// Bare name of the remote tool that returns this resource.
    pub fn tool_name(self) -> &'static str {
        match self {
            Self::NetWorth => "fetch_net_worth",
            Self::CreditReport => "fetch_credit_report",
            Self::EpfDetails => "fetch_epf_details",
            Self::MutualFundTransactions => "fetch_mf_transactions",
            Self::StockTransactions => "fetch_stock_transactions",
            Self::BankTransactions => "fetch_bank_transactions",
        }
    }

    /// Tool name with an optional `service:` prefix.
    pub fn qualified_tool_name(self, namespace: Option<&str>) -> String {
        match namespace {
            Some(ns) if !ns.is_empty() => format!("{ns}:{}", self.tool_name()),
            _ => self.tool_name().to_string(),
        }
    }

    /// Human-readable name.
    pub fn label(self) -> &'static str {
        match self {
            Self::NetWorth => "net worth",
            Self::CreditReport => "credit report",
            Self::EpfDetails => "EPF details",
            Self::MutualFundTransactions => "mutual fund transactions",
            Self::StockTransactions => "stock transactions",
            Self::BankTransactions => "bank transactions",
        }
    }

    fn aliases(self) -> &'static [&'static str] {
        match self {
            Self::NetWorth => &["net_worth", "networth", "worth", "assets"],
            Self::CreditReport => &["credit_report", "credit", "credit_score", "score"],
            Self::EpfDetails => &["epf_details", "epf", "provident_fund", "pf"],
            Self::MutualFundTransactions => &[
                "mutual_fund_transactions",
                "mf_transactions",
                "mutual_funds",
                "mutual_fund",
                "funds",
                "mf",
            ],
            Self::StockTransactions => &["stock_transactions", "stocks", "stock", "shares"],
            Self::BankTransactions => &["bank_transactions", "bank", "banking"],
        }
    }

    /// Find the first resource mentioned in free text ("what about my funds?").
    pub fn find_in(text: &str) -> Option<Self> {
        let normalized = normalize(text);
        let words: Vec<&str> = normalized
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();

        // Longest alias first: "credit_score" must win over "score".
        let mut candidates: Vec<(Self, &str)> = Self::ALL
            .iter()
            .flat_map(|r| r.aliases().iter().map(move |a| (*r, *a)))
            .collect();
        candidates.sort_by_key(|(_, a)| std::cmp::Reverse(a.len()));

        candidates.into_iter().find_map(|(resource, alias)| {
            let parts: Vec<&str> = alias.split('_').collect();
            words
                .windows(parts.len())
                .any(|w| w == parts.as_slice())
                .then_some(resource)
        })
    }
}

fn normalize(text: &str) -> String {
    text.trim()
        .to_ascii_lowercase()
        .replace([' ', '-'], "_")
}

impl fmt::Display for PortfolioResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Error returned when a name matches no resource.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown portfolio resource '{0}'")]
pub struct ParseResourceError(pub String);

impl FromStr for PortfolioResource {
    type Err = ParseResourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize(s);
        Self::ALL
            .iter()
            .copied()
            .find(|r| r.aliases().contains(&normalized.as_str()) || r.tool_name() == normalized)
            .ok_or_else(|| ParseResourceError(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_match_config() {
        let keys: Vec<&str> = PortfolioResource::ALL.iter().map(|r| r.key()).collect();
        assert_eq!(keys, folio_config::KNOWN_RESOURCES);
    }

    #[test]
    fn test_parse_keys_tools_and_aliases() {
        for resource in PortfolioResource::ALL {
            assert_eq!(resource.key().parse::<PortfolioResource>(), Ok(resource));
            assert_eq!(resource.tool_name().parse::<PortfolioResource>(), Ok(resource));
        }
        assert_eq!(
            "funds".parse::<PortfolioResource>(),
            Ok(PortfolioResource::MutualFundTransactions)
        );
        assert_eq!(
            "Net Worth".parse::<PortfolioResource>(),
            Ok(PortfolioResource::NetWorth)
        );
        assert!("lottery".parse::<PortfolioResource>().is_err());
    }

    #[test]
    fn test_qualified_tool_name() {
        assert_eq!(
            PortfolioResource::NetWorth.qualified_tool_name(Some("networth")),
            "networth:fetch_net_worth"
        );
        assert_eq!(
            PortfolioResource::BankTransactions.qualified_tool_name(None),
            "fetch_bank_transactions"
        );
    }

    #[test]
    fn test_find_in_free_text() {
        assert_eq!(
            PortfolioResource::find_in("what is my net worth?"),
            Some(PortfolioResource::NetWorth)
        );
        assert_eq!(
            PortfolioResource::find_in("and my funds"),
            Some(PortfolioResource::MutualFundTransactions)
        );
        assert_eq!(
            PortfolioResource::find_in("show my credit score"),
            Some(PortfolioResource::CreditReport)
        );
        assert_eq!(PortfolioResource::find_in("hello there"), None);
    }
}
