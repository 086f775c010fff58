use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;

/// One lead as returned by the upstream API. The fields we aggregate over
/// arrive untyped (string, number or absent depending on the tracking
/// profile), so they are kept as raw JSON values and coerced at the
/// aggregation boundary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeadRecord {
    #[serde(default)]
    pub quotable: Option<String>,
    #[serde(default)]
    pub sales_value: Option<Value>,
    #[serde(default)]
    pub quote_value: Option<Value>,
}

/// One page of the paginated `/leads` response.
#[derive(Debug, Clone, Deserialize)]
pub struct LeadsPage {
    #[serde(default)]
    pub leads: Vec<LeadRecord>,
    #[serde(default = "default_total_pages")]
    pub total_pages: u32,
}

fn default_total_pages() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricsSummary {
    pub qualified_leads: u64,
    pub closed_leads: u64,
    pub sales_value: f64,
    pub quote_value: f64,
    pub total_leads: u64,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricName {
    QualifiedLeads,
    ClosedLeads,
    SalesValue,
    QuoteValue,
    TotalLeads,
    LastUpdated,
}

impl MetricName {
    pub fn parse(name: &str) -> Result<MetricName, Error> {
        match name {
            "qualified_leads" => Ok(MetricName::QualifiedLeads),
            "closed_leads" => Ok(MetricName::ClosedLeads),
            "sales_value" => Ok(MetricName::SalesValue),
            "quote_value" => Ok(MetricName::QuoteValue),
            "total_leads" => Ok(MetricName::TotalLeads),
            "last_updated" => Ok(MetricName::LastUpdated),
            other => Err(Error::UnknownMetric(other.to_owned())),
        }
    }

    pub fn pick(&self, summary: &MetricsSummary) -> Value {
        match self {
            MetricName::QualifiedLeads => summary.qualified_leads.into(),
            MetricName::ClosedLeads => summary.closed_leads.into(),
            MetricName::SalesValue => summary.sales_value.into(),
            MetricName::QuoteValue => summary.quote_value.into(),
            MetricName::TotalLeads => summary.total_leads.into(),
            MetricName::LastUpdated => {
                Value::String(summary.last_updated.to_rfc3339())
            },
        }
    }
}

/// One `(account, window)` combination the prewarm task keeps fresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrewarmTarget {
    pub account: Option<String>,
    pub window: String,
}
