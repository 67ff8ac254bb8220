use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::{error, info};

use lead_pipeline::analysis::{ContentAnalyzer, GeminiAnalyzer, NoopAnalyzer};
use lead_pipeline::config::Config;
use lead_pipeline::logging;
use lead_pipeline::pipeline::Pipeline;
use lead_pipeline::report::JsonReportSink;

#[derive(Parser)]
#[command(name = "lead_pipeline")]
#[command(about = "Chat export lead cleaning, timing and channel attribution pipeline")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to the TOML config file
    #[arg(long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract and classify leads, writing the cleaned dataset only
    Clean {
        /// Raw chat export (JSON array)
        input: String,
        /// Output directory
        #[arg(long, default_value = "output")]
        output_dir: String,
        /// Name suffix for the output files (e.g. a month tag)
        #[arg(long, default_value = "batch")]
        name: String,
    },
    /// Run the full pipeline: clean, enrich, analyze, report
    Run {
        /// Raw chat export (JSON array)
        input: String,
        /// Output directory
        #[arg(long, default_value = "output")]
        output_dir: String,
        /// Name suffix for the output files (e.g. a month tag)
        #[arg(long, default_value = "batch")]
        name: String,
        /// Skip the external content-analysis stage
        #[arg(long)]
        skip_analysis: bool,
    },
}

fn build_analyzer(config: &Config, skip_analysis: bool) -> Arc<dyn ContentAnalyzer> {
    if skip_analysis {
        info!("Content analysis disabled by flag");
        return Arc::new(NoopAnalyzer);
    }
    match GeminiAnalyzer::from_env(&config.analysis.model) {
        Some(analyzer) => Arc::new(analyzer),
        None => {
            info!("No analysis API key set, content analysis will be skipped");
            Arc::new(NoopAnalyzer)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    match cli.command {
        Commands::Clean {
            input,
            output_dir,
            name,
        } => {
            println!("🧹 Cleaning raw chat export...");
            let raw_conversations = Pipeline::load_conversations(&input)?;
            let pipeline = Pipeline::new(config, Arc::new(NoopAnalyzer));
            let outcome = pipeline.clean(&raw_conversations);

            std::fs::create_dir_all(&output_dir)?;
            let output_path =
                std::path::Path::new(&output_dir).join(format!("cleaned_chats_{}.json", name));
            let json_content = serde_json::to_string_pretty(&outcome.cleaned)?;
            std::fs::write(&output_path, json_content)?;

            println!(
                "✅ Retained {} of {} conversations ({} structural skips, {} validity rejections)",
                outcome.cleaned.len(),
                raw_conversations.len(),
                outcome.structural_skips,
                outcome.validity_rejections
            );
            println!("💾 Wrote {}", output_path.display());
        }
        Commands::Run {
            input,
            output_dir,
            name,
            skip_analysis,
        } => {
            let analyzer = build_analyzer(&config, skip_analysis);
            let pipeline = Pipeline::new(config, analyzer);
            let report_sink = JsonReportSink::new(&output_dir, &name);

            match pipeline.run(&input, &output_dir, &name, &report_sink).await {
                Ok(result) => {
                    println!("\n{}", result.summary());
                    if !result.errors.is_empty() {
                        println!("\n⚠️  Errors encountered:");
                        for err in &result.errors {
                            println!("   - {}", err);
                        }
                    }
                }
                Err(e) => {
                    error!("Pipeline run failed: {}", e);
                    println!("❌ Pipeline run failed: {}", e);
                    std::process::exit(1);
                }
            }
        }
    }
    Ok(())
}
