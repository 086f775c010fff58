use chrono::Utc;
use serde_json::Value;

use crate::model::{LeadRecord, MetricsSummary};

/// Coerce an untyped lead field to a number. Upstream sends these fields as
/// JSON numbers, numeric strings, or not at all depending on the tracking
/// profile; anything unusable counts as zero rather than failing the whole
/// aggregation.
pub fn coerce_number(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Fold a list of leads into a metrics summary. Single pass, total, and
/// deterministic for a given input (apart from the `last_updated` stamp).
///
/// Leads are counted as-is: duplicates in the input inflate every count and
/// sum. The upstream API is the system of record for dedup, not this layer.
pub fn aggregate(leads: &[LeadRecord]) -> MetricsSummary {
    let mut qualified_leads = 0;
    let mut closed_leads = 0;
    let mut sales_value = 0.0;
    let mut quote_value = 0.0;

    for lead in leads {
        let quotable = lead
            .quotable
            .as_deref()
            .map(|q| q.trim().eq_ignore_ascii_case("yes"))
            .unwrap_or(false);
        if quotable {
            qualified_leads += 1;
        }

        let sales = coerce_number(lead.sales_value.as_ref());
        if sales > 0.0 {
            closed_leads += 1;
            sales_value += sales;
        }

        // Quote totals accumulate independently of the closed determination.
        let quote = coerce_number(lead.quote_value.as_ref());
        if quote > 0.0 {
            quote_value += quote;
        }
    }

    MetricsSummary {
        qualified_leads,
        closed_leads,
        sales_value,
        quote_value,
        total_leads: leads.len() as u64,
        last_updated: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn lead(
        quotable: Option<&str>,
        sales_value: Option<Value>,
        quote_value: Option<Value>,
    ) -> LeadRecord {
        LeadRecord {
            quotable: quotable.map(str::to_owned),
            sales_value,
            quote_value,
        }
    }

    #[test]
    fn empty_input_yields_zeroes() {
        let summary = aggregate(&[]);
        assert_eq!(summary.qualified_leads, 0);
        assert_eq!(summary.closed_leads, 0);
        assert_eq!(summary.sales_value, 0.0);
        assert_eq!(summary.quote_value, 0.0);
        assert_eq!(summary.total_leads, 0);
    }

    #[test]
    fn quotable_comparison_ignores_case_and_whitespace() {
        let leads = vec![
            lead(Some("yes"), None, None),
            lead(Some("YES"), None, None),
            lead(Some(" Yes "), None, None),
            lead(Some("no"), None, None),
            lead(None, None, None),
        ];
        let summary = aggregate(&leads);
        assert_eq!(summary.qualified_leads, 3);
        assert_eq!(summary.total_leads, 5);
    }

    #[test]
    fn closed_leads_follow_positive_sales_values() {
        let leads = vec![
            lead(None, Some(json!(1200.50)), None),
            lead(None, Some(json!("800")), None),
            lead(None, Some(json!(0)), None),
            lead(None, Some(json!("not a number")), None),
            lead(None, None, None),
        ];
        let summary = aggregate(&leads);
        assert_eq!(summary.closed_leads, 2);
        assert_eq!(summary.sales_value, 2000.50);
    }

    #[test]
    fn quote_total_is_independent_of_closed_leads() {
        let leads = vec![
            // Quote but no sale: contributes to quote total only.
            lead(None, None, Some(json!(500))),
            // Sale but no quote.
            lead(None, Some(json!(300)), None),
        ];
        let summary = aggregate(&leads);
        assert_eq!(summary.closed_leads, 1);
        assert_eq!(summary.sales_value, 300.0);
        assert_eq!(summary.quote_value, 500.0);
    }

    #[test]
    fn duplicates_are_not_collapsed() {
        let template =
            lead(Some("Yes"), Some(json!(15000)), Some(json!("15000")));
        let leads = vec![template.clone(), template.clone(), template];
        let summary = aggregate(&leads);
        assert_eq!(summary.total_leads, 3);
        assert_eq!(summary.qualified_leads, 3);
        assert_eq!(summary.closed_leads, 3);
        assert_eq!(summary.sales_value, 45000.0);
        assert_eq!(summary.quote_value, 45000.0);
    }

    #[test]
    fn coercion_table() {
        assert_eq!(coerce_number(Some(&json!(12.5))), 12.5);
        assert_eq!(coerce_number(Some(&json!("12.5"))), 12.5);
        assert_eq!(coerce_number(Some(&json!(" 7 "))), 7.0);
        assert_eq!(coerce_number(Some(&json!("n/a"))), 0.0);
        assert_eq!(coerce_number(Some(&json!(null))), 0.0);
        assert_eq!(coerce_number(Some(&json!(true))), 0.0);
        assert_eq!(coerce_number(None), 0.0);
    }
}
