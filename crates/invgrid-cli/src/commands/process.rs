//! Process command - structure a single invoice image.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use invgrid_core::invoice::header_row;
use invgrid_core::{
    FieldKey, InvgridConfig, InvoicePipeline, InvoiceRecord, PureOcrEngine, StaticTextRecognizer,
    create_engine_from_dir, persist,
};

use crate::csv_sink::CsvSink;

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Input image (PNG, JPEG, TIFF, BMP, WebP)
    #[arg(required_unless_present = "text")]
    input: Option<PathBuf>,

    /// Skip OCR and extract fields from already recognized text
    #[arg(long, value_name = "FILE", conflicts_with = "input")]
    text: Option<PathBuf>,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Model directory (overrides models.model_dir)
    #[arg(short, long)]
    model_dir: Option<PathBuf>,

    /// Append the record to CSV collections in this directory
    #[arg(long)]
    sink_dir: Option<PathBuf>,

    /// Cross-check items against totals
    #[arg(long)]
    validate: bool,

    /// Show layout, cell count and timing
    #[arg(long)]
    show_stats: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV output
    Csv,
    /// Plain text summary
    Text,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
            OutputFormat::Text => "txt",
        }
    }
}

pub async fn run(args: ProcessArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = super::config::load(config_path)?;
    if let Some(model_dir) = &args.model_dir {
        config.models.model_dir = model_dir.clone();
    }
    let sink_config = config.sink.clone();

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);

    let record = match (&args.text, &args.input) {
        (Some(text_path), _) => {
            info!("Extracting from text: {}", text_path.display());
            pb.set_message("Extracting fields...");
            let text = fs::read_to_string(text_path)
                .with_context(|| format!("Failed to read {}", text_path.display()))?;

            let pipeline = InvoicePipeline::new(config, StaticTextRecognizer::new(text.clone()))?;
            pipeline.extract_from_text(&text)
        }
        (None, Some(input)) => {
            if !input.exists() {
                anyhow::bail!("Input file not found: {}", input.display());
            }
            info!("Processing file: {}", input.display());

            pb.set_message("Loading OCR models...");
            let engine = load_engine(&config)?;
            let pipeline = InvoicePipeline::new(config, engine)?;

            pb.set_message("Structuring invoice...");
            let bytes = fs::read(input)?;
            pipeline
                .structure_invoice(&bytes)
                .with_context(|| format!("Failed to process {}", input.display()))?
        }
        (None, None) => anyhow::bail!("Either an input image or --text is required"),
    };

    pb.finish_and_clear();

    if args.validate {
        let issues = record.validate();
        if !issues.is_empty() {
            eprintln!("{}", style("Validation issues:").yellow());
            for issue in &issues {
                eprintln!("  - {}", issue);
            }
        }
    }

    if let Some(sink_dir) = &args.sink_dir {
        let sink = CsvSink::create(sink_dir)?;
        let summary = persist(&record, &sink, &sink_config)?;
        eprintln!(
            "{} Appended {} header row(s) and {} item row(s) to {}",
            style("✓").green(),
            usize::from(summary.header_written),
            summary.items_written,
            sink.dir().display()
        );
    }

    let output = format_record(&record, args.format)?;

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        eprintln!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    if args.show_stats {
        let meta = &record.metadata;
        eprintln!();
        eprintln!("{} Layout: {}", style("ℹ").blue(), meta.layout);
        eprintln!(
            "{} Cells: {}, items: {} ({:?})",
            style("ℹ").blue(),
            meta.cell_count,
            record.items.len(),
            meta.item_source
        );
        if meta.partial {
            eprintln!("{} Deadline reached, table is partial", style("!").yellow());
        }
        if let Some(time_ms) = meta.processing_time_ms {
            eprintln!("{} Processing time: {}ms", style("ℹ").blue(), time_ms);
        }
    }

    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}

/// Load the OCR engine from the configured model directory.
pub fn load_engine(config: &InvgridConfig) -> anyhow::Result<PureOcrEngine> {
    let model_dir = &config.models.model_dir;
    let det_model = config.model_path(&config.models.detection_model);
    if !det_model.exists() {
        anyhow::bail!(
            "OCR models not found at {}.\n\n\
             Pass --model-dir or run 'invgrid config set models.model_dir <dir>'.",
            model_dir.display()
        );
    }

    debug!("Using models from {}", model_dir.display());
    create_engine_from_dir(model_dir, &config.models, &config.ocr)
        .map_err(|e| anyhow::anyhow!("Failed to load OCR models: {}", e))
}

pub fn format_record(record: &InvoiceRecord, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string(record)?),
        OutputFormat::Csv => format_csv(record),
        OutputFormat::Text => Ok(format_text(record)),
    }
}

fn format_csv(record: &InvoiceRecord) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    let mut header: Vec<&str> = FieldKey::ALL.iter().map(|k| k.label()).collect();
    header.push("Item_Count");
    wtr.write_record(&header)?;

    let mut values: Vec<String> = header_row(record).iter().map(|v| v.display()).collect();
    values.push(record.items.len().to_string());
    wtr.write_record(&values)?;

    let data = String::from_utf8(wtr.into_inner()?)?;
    Ok(data)
}

fn format_text(record: &InvoiceRecord) -> String {
    let mut output = String::new();
    let header = &record.header;
    let summary = &record.summary;

    output.push_str(&format!("Invoice: {}\n", header.invoice_number.display()));
    output.push_str(&format!("Date: {}\n", header.date.display()));
    output.push_str(&format!("Customer: {}\n", header.customer_name.display()));
    output.push('\n');

    output.push_str("Company:\n");
    output.push_str(&format!("  {}\n", header.company_name.display()));
    output.push_str(&format!("  {}\n", header.company_contact.display()));
    output.push_str(&format!("  Tax number: {}\n", header.tax_number.display()));
    output.push('\n');

    output.push_str("Summary:\n");
    output.push_str(&format!("  Net:      {}\n", summary.net_amount.display()));
    output.push_str(&format!("  Tax:      {}\n", summary.sales_tax.display()));
    output.push_str(&format!("  Discount: {}\n", summary.discount.display()));
    output.push_str(&format!("  Total:    {}\n", summary.total.display()));

    if !record.items.is_empty() {
        output.push_str("\nItems:\n");
        for item in &record.items {
            output.push_str(&format!(
                "  {:>3}. {} - {} {} x {} = {}\n",
                item.item_no, item.name, item.quantity, item.unit, item.unit_price, item.total_price
            ));
        }
    }

    if !header.note.is_missing() {
        output.push_str(&format!("\nNote: {}\n", header.note.display()));
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record() -> InvoiceRecord {
        let text = "Invoice No: 4021\nCustomer: Acme Co\nTotal: 7.00\n1 Cheese Burger 2 pcs 3.50 7.00\n";
        InvoicePipeline::new(InvgridConfig::default(), StaticTextRecognizer::new(text))
            .unwrap()
            .extract_from_text(text)
    }

    #[test]
    fn test_csv_has_one_row_per_record() {
        let csv = format_csv(&record()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("Sales_Invoice_No,Customer_Name,Date"));
        assert!(lines[0].ends_with("Note,Item_Count"));
        assert!(lines[1].starts_with("4021,Acme Co,N/A"));
        assert!(lines[1].ends_with(",1"));
    }

    #[test]
    fn test_text_lists_items() {
        let text = format_text(&record());
        assert!(text.starts_with("Invoice: 4021\n"));
        assert!(text.contains("Cheese Burger - 2 pcs x 3.50 = 7.00"));
        assert!(!text.contains("Note:"));
    }
}
