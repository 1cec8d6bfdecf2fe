//! Pretty terminal rendering.
//!
//! One row per listing with the fields people scan for first (date, price,
//! place), the link dimmed underneath, and the per-source status at the end
//! where the eye settles.

use crate::commands::Result;
use audiosearch_core::search::{AggregateResult, SourceReport, SourceStatus};
use audiosearch_core::settings::SearchSettings;
use audiosearch_core::{AdapterInfo, Listing};
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, ContentArrangement, Table};
use owo_colors::OwoColorize;

/// Terminal width for formatting (default fallback)
const DEFAULT_WIDTH: usize = 80;

/// Rules never get wider than this, even on huge terminals.
const MAX_RULE_WIDTH: usize = 100;

fn terminal_width() -> usize {
    terminal_size::terminal_size()
        .map(|(w, _)| w.0 as usize)
        .unwrap_or(DEFAULT_WIDTH)
}

fn rule() -> String {
    "═".repeat(terminal_width().min(MAX_RULE_WIDTH))
}

// ============================================================================
// Search results
// ============================================================================

pub fn print_search_result(result: &AggregateResult) {
    let days = result.date_window.map(|w| w.days);

    if result.listings.is_empty() {
        println!();
        println!(
            "{} {}",
            "No results found for".yellow(),
            format!("'{}'", result.query()).bold()
        );
        if let Some(days) = days {
            println!("   {}", format!("(filtered to the last {} days)", days).dimmed());
        }
        print_source_summary(&result.sources, &result.unknown_sources);
        println!();
        return;
    }

    println!();
    println!("{}", rule().cyan());
    let mut header = format!(
        "{} {}",
        "Search Results:".bold().cyan(),
        format!("'{}'", result.query()).yellow()
    );
    if let Some(days) = days {
        header.push_str(&format!(" {}", format!("(last {} days)", days).dimmed()));
    }
    println!("{}", header);
    println!("{}", rule().cyan());
    println!();

    for (i, listing) in result.listings.iter().enumerate() {
        println!(
            "{:>4}. {} {} {}",
            (i + 1).to_string().cyan().bold(),
            listing.title.bold(),
            "|".dimmed(),
            info_line(listing)
        );
        println!("      {}", listing.url.dimmed());
    }

    println!("{}", rule().cyan());
    print_source_summary(&result.sources, &result.unknown_sources);

    let total = result.total_count();
    let mut footer = format!(
        "Total: {} result{}",
        total.to_string().green().bold(),
        if total == 1 { "" } else { "s" }
    );
    if result.filtered_out > 0 {
        footer.push_str(&format!(
            " {}",
            format!("({} older listings hidden)", result.filtered_out).dimmed()
        ));
    }
    if let Some(ms) = result.duration_ms {
        footer.push_str(&format!(" {}", format!("in {}ms", ms).dimmed()));
    }
    println!("{}", footer);
    println!("{}", rule().cyan());
    println!();
}

/// `date | price | location | source`, skipping what the listing lacks.
fn info_line(listing: &Listing) -> String {
    let mut parts = Vec::new();

    let date = listing
        .posted_raw
        .clone()
        .or_else(|| listing.posted_at.map(|d| d.format("%Y-%m-%d").to_string()));
    if let Some(date) = date {
        parts.push(date.blue().to_string());
    }
    if let Some(price) = &listing.price {
        parts.push(
            format!("{} {}", group_thousands(price.amount), currency_label(&price.currency))
                .green()
                .to_string(),
        );
    }
    if let Some(location) = &listing.location {
        parts.push(location.clone());
    }
    parts.push(listing.source.magenta().to_string());

    parts.join(&format!(" {} ", "|".dimmed()))
}

fn currency_label(currency: &str) -> &str {
    if currency.eq_ignore_ascii_case("SEK") {
        "kr"
    } else {
        currency
    }
}

/// Whole amount with space-separated thousands: 12500.0 -> "12 500".
fn group_thousands(amount: f64) -> String {
    let whole = amount.round().abs() as u64;
    let digits = whole.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(' ');
        }
        out.push(c);
    }
    if amount < 0.0 {
        out.insert(0, '-');
    }
    out
}

fn print_source_summary(reports: &[SourceReport], unknown: &[String]) {
    let parts: Vec<String> = reports.iter().map(status_badge).collect();
    if !parts.is_empty() {
        println!("{} {}", "Sources:".dimmed(), parts.join("  "));
    }
    if !unknown.is_empty() {
        println!(
            "{} {}",
            "Unrecognized sites ignored:".yellow(),
            unknown.join(", ")
        );
    }
}

fn status_badge(report: &SourceReport) -> String {
    let reason = report
        .error
        .as_ref()
        .map(|e| e.message.as_str())
        .unwrap_or("unknown error");
    match report.status {
        SourceStatus::Success => format!("{} {} {}", "✓".green(), report.source, report.count),
        SourceStatus::PartialFailure => format!(
            "{} {} {} {}",
            "✓".yellow(),
            report.source,
            report.count,
            format!("(incomplete: {})", reason).dimmed()
        ),
        SourceStatus::TimedOut => format!(
            "{} {} {}",
            "⏱".yellow(),
            report.source,
            "timed out".dimmed()
        ),
        SourceStatus::Failed => format!(
            "{} {} {}",
            "✗".red(),
            report.source,
            format!("({})", reason).dimmed()
        ),
    }
}

// ============================================================================
// Sources and settings
// ============================================================================

pub fn print_source_table(sources: &[AdapterInfo]) {
    let term_width = terminal_width();

    println!("{}", "Available Sources".bold().cyan());
    println!();

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(term_width as u16)
        .set_header(vec!["Id", "Name", "Description"]);

    for source in sources {
        table.add_row(vec![
            source.id.clone(),
            source.name.clone(),
            source.description.clone(),
        ]);
    }

    println!("{}", table);
    println!();
    println!(
        "{} Names are matched case-insensitively by id or by any word of the name, e.g. {}",
        "Tip:".green().bold(),
        "audiosearch search -s hegel -i hifitorget".cyan()
    );
}

pub fn print_settings(path: &str, exists: bool, settings: &SearchSettings) -> Result<()> {
    println!("{}", "Settings".bold().cyan());
    println!();
    if exists {
        println!("{} {}", "File:".dimmed(), path);
    } else {
        println!(
            "{} {} {}",
            "File:".dimmed(),
            path,
            "(not found, showing defaults)".yellow()
        );
    }
    println!();
    print!("{}", serde_yaml::to_string(settings)?);
    Ok(())
}
