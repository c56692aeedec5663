//! One-line summaries of fetched resources.

use serde_json::Value;

use crate::decode::ToolResponse;
use crate::record::{PortfolioRecord, ResourceSlot};
use crate::resource::PortfolioResource;

const DEFAULT_CURRENCY: &str = "INR";

/// Summarize one resource, or `None` if the payload lacks the fields.
pub fn summarize(resource: PortfolioResource, response: &ToolResponse) -> Option<String> {
    let data = response.as_json()?;
    match resource {
        PortfolioResource::NetWorth => {
            let total = data.get("netWorthResponse")?.get("totalNetWorthValue")?;
            let currency = total
                .get("currencyCode")
                .and_then(Value::as_str)
                .unwrap_or(DEFAULT_CURRENCY);
            Some(format!("Total net worth: {:.2} {currency}", money(total)?))
        }
        PortfolioResource::CreditReport => {
            let score = data
                .get("creditReports")?
                .get(0)?
                .get("creditReportData")?
                .get("score")?
                .get("bureauScore")?;
            Some(format!("Credit score: {}", scalar(score)?))
        }
        PortfolioResource::EpfDetails => {
            let balance = data
                .get("uanAccounts")?
                .get(0)?
                .get("rawDetails")?
                .get("overall_pf_balance")?
                .get("current_pf_balance")?;
            Some(format!(
                "EPF balance: {:.2} {DEFAULT_CURRENCY}",
                number(balance)?
            ))
        }
        PortfolioResource::MutualFundTransactions
        | PortfolioResource::StockTransactions
        | PortfolioResource::BankTransactions => {
            let count = data.get("transactions")?.as_array()?.len();
            Some(format!("{count} {}", resource.label()))
        }
    }
}

/// Summaries for every fetched resource, plus a line per failure.
pub fn summarize_record(record: &PortfolioRecord) -> Vec<String> {
    record
        .iter()
        .map(|(resource, slot)| match slot {
            ResourceSlot::Fetched(response) => summarize(resource, response)
                .unwrap_or_else(|| format!("{}: fetched", capitalize(resource.label()))),
            ResourceSlot::Failed(_) => {
                format!("{}: unavailable", capitalize(resource.label()))
            }
        })
        .collect()
}

/// `units` (string or integer) plus `nanos / 1e9`.
fn money(value: &Value) -> Option<f64> {
    let units = number(value.get("units")?)?;
    let nanos = value.get("nanos").and_then(number).unwrap_or(0.0);
    Some(units + nanos / 1_000_000_000.0)
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResourceFetchError;
    use serde_json::json;

    fn data(value: Value) -> ToolResponse {
        ToolResponse::StructuredData(value)
    }

    #[test]
    fn test_net_worth() {
        let response = data(json!({
            "netWorthResponse": {
                "totalNetWorthValue": {"currencyCode": "INR", "units": "12345", "nanos": 670000000}
            }
        }));
        assert_eq!(
            summarize(PortfolioResource::NetWorth, &response).as_deref(),
            Some("Total net worth: 12345.67 INR")
        );
    }

    #[test]
    fn test_net_worth_without_nanos() {
        let response = data(json!({"netWorthResponse": {"totalNetWorthValue": {"units": 500}}}));
        assert_eq!(
            summarize(PortfolioResource::NetWorth, &response).as_deref(),
            Some("Total net worth: 500.00 INR")
        );
    }

    #[test]
    fn test_credit_score() {
        let response = data(json!({
            "creditReports": [{"creditReportData": {"score": {"bureauScore": "746"}}}]
        }));
        assert_eq!(
            summarize(PortfolioResource::CreditReport, &response).as_deref(),
            Some("Credit score: 746")
        );
    }

    #[test]
    fn test_epf_balance() {
        let response = data(json!({
            "uanAccounts": [{"rawDetails": {"overall_pf_balance": {"current_pf_balance": "211111"}}}]
        }));
        assert_eq!(
            summarize(PortfolioResource::EpfDetails, &response).as_deref(),
            Some("EPF balance: 211111.00 INR")
        );
    }

    #[test]
    fn test_transaction_counts() {
        let response = data(json!({"transactions": [{}, {}, {}]}));
        assert_eq!(
            summarize(PortfolioResource::MutualFundTransactions, &response).as_deref(),
            Some("3 mutual fund transactions")
        );
        assert_eq!(
            summarize(PortfolioResource::BankTransactions, &response).as_deref(),
            Some("3 bank transactions")
        );
    }

    #[test]
    fn test_missing_fields_give_none() {
        assert!(summarize(PortfolioResource::NetWorth, &data(json!({}))).is_none());
        assert!(summarize(PortfolioResource::CreditReport, &data(json!({"creditReports": []}))).is_none());
        assert!(
            summarize(
                PortfolioResource::StockTransactions,
                &ToolResponse::RawText("x".into())
            )
            .is_none()
        );
    }

    #[test]
    fn test_summarize_record() {
        let record = PortfolioRecord::from_slots([
            (
                PortfolioResource::NetWorth,
                ResourceSlot::Fetched(data(json!({
                    "netWorthResponse": {"totalNetWorthValue": {"units": "10"}}
                }))),
            ),
            (
                PortfolioResource::CreditReport,
                ResourceSlot::Fetched(data(json!({}))),
            ),
            (
                PortfolioResource::EpfDetails,
                ResourceSlot::Failed(ResourceFetchError::ToolFailed {
                    message: "x".into(),
                }),
            ),
        ]);
        assert_eq!(
            summarize_record(&record),
            vec![
                "Total net worth: 10.00 INR",
                "Credit report: fetched",
                "EPF details: unavailable",
            ]
        );
    }
}
