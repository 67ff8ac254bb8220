use crate::analysis::{format_transcript, ContentAnalysis, ContentAnalyzer};
use crate::channel::ChannelAttributor;
use crate::config::Config;
use crate::error::Result;
use crate::extractor;
use crate::report::{ReportRecord, ReportSink};
use crate::timefmt;
use crate::timing;
use crate::types::{CleanedConversation, EnrichedRecord, RawConversation};
use crate::validity::LeadValidator;
use metrics::{counter, histogram};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

/// Outcome of the cleaning stage.
#[derive(Debug)]
pub struct CleanOutcome {
    pub cleaned: Vec<CleanedConversation>,
    pub structural_skips: usize,
    pub validity_rejections: usize,
    pub degraded_fields: usize,
}

/// Result of a complete pipeline run.
#[derive(Debug)]
pub struct PipelineResult {
    pub run_id: Uuid,
    pub total_conversations: usize,
    pub retained: usize,
    pub structural_skips: usize,
    pub validity_rejections: usize,
    pub degraded_fields: usize,
    pub analyzed_ok: usize,
    pub analysis_failures: usize,
    pub cleaned_file: Option<String>,
    pub enriched_file: Option<String>,
    pub report_file: Option<String>,
    /// Output-side failures; input failures abort the run instead.
    pub errors: Vec<String>,
}

pub struct Pipeline {
    config: Config,
    validator: LeadValidator,
    attributor: ChannelAttributor,
    analyzer: Arc<dyn ContentAnalyzer>,
}

impl Pipeline {
    pub fn new(config: Config, analyzer: Arc<dyn ContentAnalyzer>) -> Self {
        let validator = LeadValidator::new(config.validity.clone());
        let attributor = ChannelAttributor::new(config.channel.first_party_domain.clone());
        Self {
            config,
            validator,
            attributor,
            analyzer,
        }
    }

    /// Whole-file read of the raw export. Missing file or invalid JSON is
    /// fatal for the batch.
    pub fn load_conversations(input_path: &str) -> Result<Vec<RawConversation>> {
        let content = fs::read_to_string(input_path).map_err(|e| {
            error!("FATAL: could not read input file '{}': {}", input_path, e);
            e
        })?;
        let conversations: Vec<RawConversation> =
            serde_json::from_str(&content).map_err(|e| {
                error!("FATAL: input file '{}' is not valid JSON: {}", input_path, e);
                e
            })?;
        info!(
            "Read {} raw conversations from {}",
            conversations.len(),
            input_path
        );
        Ok(conversations)
    }

    /// Per-record Extract -> Validate sweep. No record failure aborts the
    /// batch; ineligible records are counted and logged.
    pub fn clean(&self, raw_conversations: &[RawConversation]) -> CleanOutcome {
        let mut cleaned = Vec::new();
        let mut structural_skips = 0;
        let mut validity_rejections = 0;
        let mut degraded_fields = 0;

        for (i, raw) in raw_conversations.iter().enumerate() {
            match extractor::extract(raw) {
                Err(reason) => {
                    debug!(conversation_id = %raw.id, "Skipping conversation: {}", reason);
                    structural_skips += 1;
                }
                Ok(extraction) => {
                    degraded_fields += extraction.degraded_times;
                    let conversation = extraction.conversation;
                    let contact = &conversation.contact;
                    if self.validator.is_valid_lead(
                        &contact.name,
                        &contact.email,
                        &contact.phone,
                        &conversation.visit.referrer,
                    ) {
                        cleaned.push(conversation);
                    } else {
                        debug!(conversation_id = %conversation.id, "Rejected by validity classifier");
                        validity_rejections += 1;
                    }
                }
            }
            if (i + 1) % 100 == 0 {
                info!("Cleaned {}/{} conversations", i + 1, raw_conversations.len());
            }
        }

        counter!("leadpipe_conversations_total").increment(raw_conversations.len() as u64);
        counter!("leadpipe_leads_retained_total").increment(cleaned.len() as u64);
        counter!("leadpipe_structural_skips_total").increment(structural_skips as u64);
        counter!("leadpipe_validity_rejections_total").increment(validity_rejections as u64);

        CleanOutcome {
            cleaned,
            structural_skips,
            validity_rejections,
            degraded_fields,
        }
    }

    /// Derive timing metrics and channel labels, then aggregate into the
    /// enriched dataset ordered by creation time, descending. Ordering is a
    /// property of the output, independent of processing order.
    pub fn enrich(&self, cleaned: &[CleanedConversation]) -> Vec<EnrichedRecord> {
        let mut records: Vec<EnrichedRecord> = cleaned
            .iter()
            .map(|conversation| self.enrich_one(conversation))
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records
    }

    fn enrich_one(&self, conversation: &CleanedConversation) -> EnrichedRecord {
        let timing_result =
            timing::analyze(&conversation.messages, self.config.timing.sla_seconds);
        let label = self
            .attributor
            .attribute(&conversation.visit.referrer, &conversation.visit.start_url);

        let first_message = conversation.messages.first();
        let created_at = first_message
            .and_then(|message| message.timestamp)
            .map(timefmt::to_iso_utc)
            .unwrap_or_default();
        let started_on = first_message
            .map(|message| message.time.clone())
            .unwrap_or_default();

        let contact = &conversation.contact;
        let geo = &conversation.visit.geolocation;

        EnrichedRecord {
            id: conversation.id.clone(),
            name: contact.name.clone(),
            email: contact.email.clone(),
            phone: contact.phone.clone(),
            channel: label.label(),
            referrer: conversation.visit.referrer.clone(),
            start_url: conversation.visit.start_url.clone(),
            country: geo.country.clone(),
            region: geo.region.clone(),
            city: geo.region.clone(),
            country_code: geo.country_code.clone(),
            created_at,
            started_on,
            messages_count: conversation.messages.len(),
            has_email: !contact.email.is_empty(),
            has_phone: !contact.phone.is_empty(),
            response_time_seconds: timing_result.latency_seconds,
            sla_qualification: timing_result.qualification,
        }
    }

    /// Hand each retained conversation's transcript to the content-analysis
    /// collaborator. Failures become error markers, never batch aborts.
    pub async fn analyze_contents(
        &self,
        cleaned: &[CleanedConversation],
    ) -> HashMap<String, ContentAnalysis> {
        let mut results = HashMap::with_capacity(cleaned.len());
        let delay = Duration::from_secs_f64(self.config.analysis.call_delay_seconds);

        for (i, conversation) in cleaned.iter().enumerate() {
            info!(
                "Analyzing conversation [{}/{}] (id: {})",
                i + 1,
                cleaned.len(),
                conversation.id
            );
            let transcript = format_transcript(&conversation.messages);
            let analysis = self.analyzer.analyze(&conversation.id, &transcript).await;
            let succeeded = analysis.api_error.is_none();
            results.insert(conversation.id.clone(), analysis);

            // Respect the external service's rate limits between live calls
            if self.analyzer.is_live() && succeeded && i + 1 < cleaned.len() {
                tokio::time::sleep(delay).await;
            }
        }
        results
    }

    /// Run the complete pipeline: read, clean, enrich, analyze, report.
    #[instrument(skip(self, report_sink), fields(input = %input_path))]
    pub async fn run(
        &self,
        input_path: &str,
        output_dir: &str,
        name: &str,
        report_sink: &dyn ReportSink,
    ) -> Result<PipelineResult> {
        let run_id = Uuid::new_v4();
        info!(run_id = %run_id, "🚀 Starting pipeline run");
        println!("🚀 Starting pipeline run {}", run_id);
        counter!("leadpipe_runs_total").increment(1);
        let t_run = std::time::Instant::now();

        fs::create_dir_all(output_dir)?;

        // Step 1: read the raw export (fatal on failure)
        let raw_conversations = Self::load_conversations(input_path)?;
        println!("📥 Read {} raw conversations", raw_conversations.len());

        // Step 2: extract + classify
        let outcome = self.clean(&raw_conversations);
        info!(
            "✅ Retained {} leads ({} structural skips, {} validity rejections)",
            outcome.cleaned.len(),
            outcome.structural_skips,
            outcome.validity_rejections
        );
        println!(
            "✅ Retained {} leads ({} structural skips, {} validity rejections)",
            outcome.cleaned.len(),
            outcome.structural_skips,
            outcome.validity_rejections
        );

        let mut errors = Vec::new();

        let cleaned_file = self.write_json(
            output_dir,
            &format!("cleaned_chats_{}.json", name),
            &outcome.cleaned,
            &mut errors,
        );

        // Step 3: enrich and order the dataset
        let enriched = self.enrich(&outcome.cleaned);
        let enriched_file = self.write_json(
            output_dir,
            &format!("enhanced_conversations_{}.json", name),
            &enriched,
            &mut errors,
        );

        // Step 4: content analysis per retained conversation
        let analyses = self.analyze_contents(&outcome.cleaned).await;
        let analysis_failures = analyses
            .values()
            .filter(|analysis| analysis.api_error.is_some())
            .count();
        let analyzed_ok = analyses.len() - analysis_failures;

        // Step 5: report rows in enriched (descending) order
        let default_analysis = ContentAnalysis::default();
        let rows: Vec<ReportRecord> = enriched
            .iter()
            .map(|record| {
                let analysis = analyses.get(&record.id).unwrap_or(&default_analysis);
                ReportRecord::from_parts(record, analysis)
            })
            .collect();
        let report_file = match report_sink.render(&rows) {
            Ok(path) => {
                info!("💾 Report written to {}", path);
                println!("💾 Report written to {}", path);
                Some(path)
            }
            Err(e) => {
                // Output failure: reported distinctly, computed results kept
                error!("Failed to render report: {}", e);
                errors.push(format!("report write failed: {}", e));
                None
            }
        };

        let total_secs = t_run.elapsed().as_secs_f64();
        histogram!("leadpipe_run_duration_seconds").record(total_secs);

        let result = PipelineResult {
            run_id,
            total_conversations: raw_conversations.len(),
            retained: outcome.cleaned.len(),
            structural_skips: outcome.structural_skips,
            validity_rejections: outcome.validity_rejections,
            degraded_fields: outcome.degraded_fields,
            analyzed_ok,
            analysis_failures,
            cleaned_file,
            enriched_file,
            report_file,
            errors,
        };
        info!(
            run_id = %run_id,
            retained = result.retained,
            excluded = result.structural_skips + result.validity_rejections,
            degraded = result.degraded_fields,
            "Pipeline run finished in {:.2}s", total_secs
        );
        Ok(result)
    }

    /// Pretty-printed whole-file JSON write. Failures are collected, not
    /// fatal: the in-memory results still flow back to the caller.
    fn write_json<T: serde::Serialize>(
        &self,
        output_dir: &str,
        filename: &str,
        value: &T,
        errors: &mut Vec<String>,
    ) -> Option<String> {
        let filepath = Path::new(output_dir).join(filename);
        let result = serde_json::to_string_pretty(value)
            .map_err(crate::error::PipelineError::from)
            .and_then(|json_content| {
                fs::write(&filepath, json_content).map_err(crate::error::PipelineError::from)
            });
        match result {
            Ok(()) => {
                let path = filepath.to_string_lossy().to_string();
                info!("💾 Wrote {}", path);
                println!("💾 Wrote {}", path);
                Some(path)
            }
            Err(e) => {
                error!("Failed to write {}: {}", filepath.display(), e);
                errors.push(format!("write failed for {}: {}", filepath.display(), e));
                None
            }
        }
    }
}

impl PipelineResult {
    /// Human-readable run summary for the console.
    pub fn summary(&self) -> String {
        let mut lines = vec!["📊 Pipeline Summary".to_string()];
        lines.push(format!("   Run id:              {}", self.run_id));
        lines.push(format!("   Total conversations: {}", self.total_conversations));
        lines.push(format!("   Retained leads:      {}", self.retained));
        lines.push(format!("   Structural skips:    {}", self.structural_skips));
        lines.push(format!("   Validity rejections: {}", self.validity_rejections));
        lines.push(format!("   Degraded fields:     {}", self.degraded_fields));
        lines.push(format!("   Analyzed OK:         {}", self.analyzed_ok));
        lines.push(format!("   Analysis failures:   {}", self.analysis_failures));
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::NoopAnalyzer;
    use crate::types::{RawEvent, RawThread, RawUser};

    fn pipeline() -> Pipeline {
        Pipeline::new(Config::default(), Arc::new(NoopAnalyzer))
    }

    fn raw_lead(id: &str, email: &str, first_message_at: &str) -> RawConversation {
        RawConversation {
            id: id.to_string(),
            users: vec![RawUser {
                id: "c1".to_string(),
                kind: "customer".to_string(),
                name: "Ada".to_string(),
                email: email.to_string(),
                ..Default::default()
            }],
            thread: RawThread {
                events: vec![RawEvent {
                    kind: "message".to_string(),
                    created_at: first_message_at.to_string(),
                    author_id: "c1".to_string(),
                    text: "hello".to_string(),
                    ..Default::default()
                }],
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_clean_counts_structural_and_validity_exclusions() {
        let valid = raw_lead("chat-1", "ada@example.com", "2025-08-01T02:00:00Z");
        let test_account = raw_lead("chat-2", "tester@v-ycfz.com", "2025-08-01T03:00:00Z");
        let mut no_customer = raw_lead("chat-3", "x@example.com", "2025-08-01T04:00:00Z");
        no_customer.users.clear();

        let outcome = pipeline().clean(&[valid, test_account, no_customer]);
        assert_eq!(outcome.cleaned.len(), 1);
        assert_eq!(outcome.cleaned[0].id, "chat-1");
        assert_eq!(outcome.validity_rejections, 1);
        assert_eq!(outcome.structural_skips, 1);
    }

    #[test]
    fn test_enrich_orders_by_created_at_descending() {
        let older = raw_lead("chat-old", "a@example.com", "2025-08-01T02:00:00Z");
        let newer = raw_lead("chat-new", "b@example.com", "2025-08-02T02:00:00Z");

        let pipeline = pipeline();
        let outcome = pipeline.clean(&[older, newer]);
        let enriched = pipeline.enrich(&outcome.cleaned);
        assert_eq!(enriched[0].id, "chat-new");
        assert_eq!(enriched[1].id, "chat-old");
        assert_eq!(enriched[0].created_at, "2025-08-02T02:00:00.000Z");
        assert_eq!(enriched[0].started_on, "2025-08-02 10:00:00");
    }

    #[tokio::test]
    async fn test_analyze_contents_marks_noop_failures() {
        let pipeline = pipeline();
        let outcome = pipeline.clean(&[raw_lead("chat-1", "a@example.com", "2025-08-01T02:00:00Z")]);
        let analyses = pipeline.analyze_contents(&outcome.cleaned).await;
        assert_eq!(analyses.len(), 1);
        assert!(analyses["chat-1"].api_error.is_some());
    }
}
