//! Output formatting module
//!
//! Handles formatting and display of the live progress feed, sourcing
//! reports and stored records using colored output.

use crate::client::session::LogEntry;
use crate::protocol::{SourcingReport, TaskResult};
use crate::store::SourcingRecord;
use console::Style;

/// Output formatter for CLI results
pub struct OutputFormatter {
    // Styles
    blue: Style,
    green: Style,
    yellow: Style,
    red: Style,
    dim: Style,
    bold: Style,
}

impl Default for OutputFormatter {
    fn default() -> Self {
        Self {
            blue: Style::new().blue(),
            green: Style::new().green(),
            yellow: Style::new().yellow(),
            red: Style::new().red(),
            dim: Style::new().dim(),
            bold: Style::new().bold(),
        }
    }
}

impl OutputFormatter {
    /// Create a new formatter
    pub fn new() -> Self {
        Self::default()
    }

    /// Print one progress line, timestamp dimmed like a terminal feed.
    pub fn print_log(&self, entry: &LogEntry) {
        println!(
            "{} {}",
            self.dim.apply_to(format!("[{}]", entry.at.format("%H:%M:%S"))),
            self.green.apply_to(&entry.line)
        );
    }

    /// Print a terminal result: a report card when the payload matched the
    /// sourcing schema, pretty JSON otherwise.
    pub fn print_result(&self, result: &TaskResult) {
        match result {
            TaskResult::Report(report) => self.print_report(report),
            TaskResult::Unstructured(value) => {
                println!();
                println!("{}", self.bold.apply_to("Result (unstructured):"));
                println!(
                    "{}",
                    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
                );
            }
        }
    }

    /// Print the sourcing report card.
    pub fn print_report(&self, report: &SourcingReport) {
        println!();
        println!("{}", self.bold.apply_to("Market Analysis:"));
        println!("{}", report.market_analysis);
        println!();
        println!(
            "{}",
            self.bold
                .apply_to(format!("Golden Keywords ({}):", report.golden_keywords.len()))
        );

        for (idx, item) in report.golden_keywords.iter().enumerate() {
            let risk_style = if item.risk.to_lowercase().contains("none")
                || item.risk.to_lowercase().contains("low")
            {
                &self.green
            } else {
                &self.red
            };
            println!();
            println!(
                "{}. {} {}",
                idx + 1,
                self.bold.apply_to(&item.keyword),
                risk_style.apply_to(format!("[risk: {}]", item.risk))
            );
            println!(
                "   Search volume: {}   Competition: {}",
                self.blue.apply_to(&item.search_volume),
                self.yellow.apply_to(&item.competition)
            );
            println!("   {}", self.dim.apply_to(&item.reason));
        }
        println!();
    }

    /// Print the stored completed-task records.
    pub fn print_records(&self, records: &[SourcingRecord]) {
        if records.is_empty() {
            println!("No completed tasks stored yet.");
            return;
        }

        println!();
        println!("{}", self.bold.apply_to("Completed sourcing tasks:"));
        for record in records {
            println!(
                "{} {} {} {}",
                self.dim
                    .apply_to(record.completed_at.format("%Y-%m-%d %H:%M:%S").to_string()),
                self.blue.apply_to(&record.task_id),
                self.bold.apply_to(&record.query),
                self.green.apply_to(&record.status)
            );
        }
        println!();
    }
}
