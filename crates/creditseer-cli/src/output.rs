//! Output formatting for the CLI.

use crate::config::OutputFormat;
use crate::error::Result;
use colored::*;
use creditseer_domain::{Anomaly, Chunk, Document};
use creditseer_pipeline::{PipelineRun, Stage1Output, Stage2Output};
use creditseer_schema::SchemaEntry;
use serde::Serialize;
use tabled::{
    builder::Builder,
    settings::{object::Rows, Alignment, Modify, Style},
};

/// Output formatter.
pub struct Formatter {
    format: OutputFormat,
    color_enabled: bool,
    max_cell_chars: usize,
}

impl Formatter {
    /// Create a new formatter.
    pub fn new(format: OutputFormat, color_enabled: bool) -> Self {
        Self {
            format,
            color_enabled,
            max_cell_chars: 80,
        }
    }

    /// Limit table cells to `max` characters.
    pub fn with_max_cell_chars(mut self, max: usize) -> Self {
        self.max_cell_chars = max.max(8);
        self
    }

    /// Whether output is JSON.
    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    /// Serialize any value as pretty JSON.
    pub fn json<T: Serialize + ?Sized>(&self, value: &T) -> Result<String> {
        Ok(serde_json::to_string_pretty(value)?)
    }

    /// Format a whole pipeline run.
    pub fn format_run(&self, run: &PipelineRun) -> Result<String> {
        if self.is_json() {
            return self.json(run);
        }

        let mut sections = vec![self.info(&format!(
            "Document {} ({}): {}",
            run.id,
            run.source.filename,
            run.stage()
        ))];
        if let Some(document) = &run.document {
            sections.push(self.format_document(document)?);
        }
        if let Some(chunks) = &run.chunks {
            sections.push(self.format_chunks(chunks)?);
        }
        if let Some(stage1) = &run.stage1 {
            sections.push(self.format_blocks(stage1)?);
        }
        if let Some(stage2) = &run.stage2 {
            sections.push(self.format_values(stage2)?);
        }
        let anomalies: Vec<Anomaly> = run
            .stage1
            .iter()
            .flat_map(|s| s.anomalies.iter())
            .chain(run.stage2.iter().flat_map(|s| s.anomalies.iter()))
            .cloned()
            .collect();
        if !anomalies.is_empty() {
            sections.push(self.format_anomalies(&anomalies)?);
        }
        Ok(sections.join("\n\n"))
    }

    /// Format document metadata.
    pub fn format_document(&self, document: &Document) -> Result<String> {
        if self.is_json() {
            return self.json(document);
        }
        let mut builder = Builder::default();
        builder.push_record(["File", "Method", "Pages", "Tables", "Chars"]);
        builder.push_record([
            document.filename.clone(),
            document.method.to_string(),
            document.page_count.to_string(),
            document.table_count.to_string(),
            document.char_count().to_string(),
        ]);
        Ok(self.render(builder))
    }

    /// Format chunks.
    pub fn format_chunks(&self, chunks: &[Chunk]) -> Result<String> {
        if self.is_json() {
            return self.json(chunks);
        }
        if chunks.is_empty() {
            return Ok(self.warning("No chunks found."));
        }

        let mut builder = Builder::default();
        builder.push_record(["#", "Type", "Title", "Pages", "Chars"]);
        for chunk in chunks {
            let pages = match (chunk.start_page, chunk.end_page) {
                (Some(start), Some(end)) if start != end => format!("{}-{}", start, end),
                (Some(start), _) => start.to_string(),
                _ => "-".to_string(),
            };
            builder.push_record([
                chunk.index.to_string(),
                chunk.chunk_type.to_string(),
                self.truncate(&chunk.title),
                pages,
                chunk.char_count().to_string(),
            ]);
        }
        Ok(self.render(builder))
    }

    /// Format Stage 1 blocks.
    pub fn format_blocks(&self, output: &Stage1Output) -> Result<String> {
        if self.is_json() {
            return self.json(output);
        }
        if output.block_count() == 0 {
            return Ok(self.warning("No blocks extracted."));
        }

        let mut builder = Builder::default();
        builder.push_record(["Block", "Block ID", "Value Type", "Text"]);
        for block in output.blocks() {
            builder.push_record([
                block.block_ref.to_string(),
                block.block_id.clone(),
                block.value_type.clone(),
                self.truncate(&block.text),
            ]);
        }
        Ok(self.render(builder))
    }

    /// Format Stage 2 values.
    pub fn format_values(&self, output: &Stage2Output) -> Result<String> {
        if self.is_json() {
            return self.json(output);
        }
        if output.value_count() == 0 {
            return Ok(self.warning("No values extracted."));
        }

        let mut builder = Builder::default();
        builder.push_record(["Block", "Field", "Value", "Confidence", "Assessed", "Reported"]);
        for value in output.values() {
            builder.push_record([
                value.block_ref.to_string(),
                value.field.clone(),
                self.truncate(&value.value.joined("; ")),
                self.confidence(value.confidence.as_str()),
                format!("{:.0}%", value.assessment.display_percentage),
                value.reported_confidence.to_string(),
            ]);
        }
        Ok(self.render(builder))
    }

    /// Format anomalies.
    pub fn format_anomalies(&self, anomalies: &[Anomaly]) -> Result<String> {
        if self.is_json() {
            return self.json(anomalies);
        }
        if anomalies.is_empty() {
            return Ok(self.success("No anomalies."));
        }

        let mut builder = Builder::default();
        builder.push_record(["Stage", "Chunk", "Block", "Kind", "Detail"]);
        for anomaly in anomalies {
            builder.push_record([
                anomaly.stage.to_string(),
                anomaly.chunk_index.to_string(),
                anomaly
                    .block_ref
                    .map(|b| b.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                self.colorize(anomaly.kind.as_str(), "yellow"),
                self.truncate(&anomaly.detail),
            ]);
        }
        Ok(self.render(builder))
    }

    /// Format loaded schemas.
    pub fn format_schemas(&self, entries: &[SchemaEntry]) -> Result<String> {
        if self.is_json() {
            return self.json(entries);
        }
        if entries.is_empty() {
            return Ok(self.warning("No schemas loaded."));
        }

        let mut builder = Builder::default();
        builder.push_record(["Chunk Type", "Stage", "Schema ID", "Version"]);
        for entry in entries {
            builder.push_record([
                entry.chunk_type.to_string(),
                entry.stage.to_string(),
                entry.schema_id.clone(),
                entry.version.clone(),
            ]);
        }
        Ok(self.render(builder))
    }

    /// Format a success message.
    pub fn success(&self, message: &str) -> String {
        self.colorize(&format!("✓ {}", message), "green")
    }

    /// Format an error message.
    pub fn error(&self, message: &str) -> String {
        self.colorize(&format!("✗ {}", message), "red")
    }

    /// Format an info message.
    pub fn info(&self, message: &str) -> String {
        self.colorize(&format!("ℹ {}", message), "blue")
    }

    /// Format a warning message.
    pub fn warning(&self, message: &str) -> String {
        self.colorize(&format!("⚠ {}", message), "yellow")
    }

    fn confidence(&self, label: &str) -> String {
        match label {
            "high" => self.colorize(label, "green"),
            "medium" => self.colorize(label, "yellow"),
            _ => self.colorize(label, "red"),
        }
    }

    fn render(&self, builder: Builder) -> String {
        let mut table = builder.build();
        table
            .with(Style::rounded())
            .with(Modify::new(Rows::first()).with(Alignment::center()));
        table.to_string()
    }

    /// Single-line text cut to the cell limit.
    fn truncate(&self, text: &str) -> String {
        let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if flat.chars().count() <= self.max_cell_chars {
            return flat;
        }
        let cut: String = flat.chars().take(self.max_cell_chars - 1).collect();
        format!("{}…", cut)
    }

    /// Colorize text if color is enabled.
    fn colorize(&self, text: &str, color: &str) -> String {
        if !self.color_enabled {
            return text.to_string();
        }

        match color {
            "red" => text.red().to_string(),
            "green" => text.green().to_string(),
            "blue" => text.blue().to_string(),
            "yellow" => text.yellow().to_string(),
            _ => text.to_string(),
        }
    }
}
