use crate::analysis::ContentAnalysis;
use crate::error::Result;
use crate::types::{EnrichedRecord, Qualification};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// One flat row of the final report, in the fixed column set handed to the
/// external tabular renderer. Absent numeric/optional values serialize as
/// null, never as a mixed type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportRecord {
    pub chat_id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub channel: String,
    pub referrer: String,
    pub start_url: String,
    pub country: String,
    pub region: String,
    pub country_code: String,
    pub created_at: String,
    pub started_on: String,
    pub messages_count: usize,
    pub response_time_seconds: Option<f64>,
    pub sla_qualification: Qualification,
    pub intent_summary: String,
    pub quality_review: String,
    pub improvement_actions: String,
    pub sales_opportunity: String,
    pub negative_sentiment: String,
    pub api_error: Option<String>,
}

impl ReportRecord {
    pub fn from_parts(record: &EnrichedRecord, analysis: &ContentAnalysis) -> Self {
        Self {
            chat_id: record.id.clone(),
            name: record.name.clone(),
            email: record.email.clone(),
            phone: record.phone.clone(),
            channel: record.channel.clone(),
            referrer: record.referrer.clone(),
            start_url: record.start_url.clone(),
            country: record.country.clone(),
            region: record.region.clone(),
            country_code: record.country_code.clone(),
            created_at: record.created_at.clone(),
            started_on: record.started_on.clone(),
            messages_count: record.messages_count,
            response_time_seconds: record.response_time_seconds,
            sla_qualification: record.sla_qualification,
            intent_summary: analysis.intent_summary.clone(),
            quality_review: analysis.quality_review.clone(),
            improvement_actions: analysis.improvement_actions.clone(),
            sales_opportunity: analysis.sales_opportunity.clone(),
            negative_sentiment: analysis.negative_sentiment.clone(),
            api_error: analysis.api_error.clone(),
        }
    }
}

/// Boundary to the external report renderer.
pub trait ReportSink: Send + Sync {
    fn render(&self, rows: &[ReportRecord]) -> Result<String>;
}

/// Default sink: pretty-printed JSON next to the other pipeline outputs.
pub struct JsonReportSink {
    output_path: String,
}

impl JsonReportSink {
    pub fn new(output_dir: &str, name: &str) -> Self {
        let output_path = Path::new(output_dir)
            .join(format!("{}_report.json", name))
            .to_string_lossy()
            .to_string();
        Self { output_path }
    }
}

impl ReportSink for JsonReportSink {
    fn render(&self, rows: &[ReportRecord]) -> Result<String> {
        let json_content = serde_json::to_string_pretty(rows)?;
        fs::write(&self.output_path, json_content)?;
        Ok(self.output_path.clone())
    }
}
