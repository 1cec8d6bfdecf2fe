use crate::cli::{Cli, OutputFormat, SearchArgs};
use crate::commands::{settings_store, CommandError, Result};
use crate::output::{format_output, print_search_result, OutputData};
use audiosearch_core::search::{SearchEngine, SearchRequest, SortDirection};
use audiosearch_core::settings::SearchSettings;
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use tracing::debug;

/// Run one search per `-s` term, in order.
///
/// A term whose search is rejected (bad request, no matching sources) is
/// reported and skipped; the command fails at the end if any term did.
pub async fn run(cli: &Cli, args: &SearchArgs) -> Result<()> {
    let mut settings = settings_store(cli).load();
    if let Some(secs) = args.timeout {
        if secs == 0 {
            return Err(CommandError::InvalidInput(
                "--timeout must be at least 1 second".to_string(),
            ));
        }
        settings.timeout_ms = secs.saturating_mul(1000);
    }
    if let Some(max) = args.max_concurrency {
        settings.max_concurrency = Some(max);
    }

    let registry = audiosearch_core::build_registry_enabled_only(&settings);
    if registry.is_empty() {
        return Err(CommandError::InvalidInput(
            "no sources compiled in; rebuild with --features default-adapters".to_string(),
        ));
    }
    let engine = SearchEngine::new(&registry).with_settings(settings.clone());
    let pretty = cli.output == OutputFormat::Pretty;

    let mut collected = Vec::new();
    let mut failed = 0usize;

    for term in &args.terms {
        let request = build_request(args, &settings, term);
        debug!(term = %term, sort = %request.sort, "running search");

        let spinner = pretty.then(|| start_spinner(term));
        let outcome = engine.execute(&request).await;
        if let Some(spinner) = spinner {
            spinner.finish_and_clear();
        }

        match outcome {
            Ok(result) if pretty => print_search_result(&result),
            Ok(result) => collected.push(result),
            Err(e) => {
                eprintln!(
                    "{}: search for '{}' failed: {}",
                    "Error".red().bold(),
                    term,
                    e
                );
                failed += 1;
            }
        }
    }

    if !collected.is_empty() {
        format_output(&OutputData::SearchResults(collected), &cli.output)?;
    }

    if failed > 0 {
        return Err(CommandError::SearchesFailed {
            failed,
            total: args.terms.len(),
        });
    }
    Ok(())
}

fn build_request(args: &SearchArgs, settings: &SearchSettings, term: &str) -> SearchRequest {
    let mut request =
        SearchRequest::new([term]).with_sort(args.sort.unwrap_or(settings.default_sort));

    if let Some(days) = args.days.or(settings.default_days) {
        request = request.with_days(days);
    }
    if !args.include.is_empty() {
        request = request.with_include(args.include.iter().map(String::as_str));
    }
    if !args.exclude.is_empty() {
        request = request.with_exclude(args.exclude.iter().map(String::as_str));
    }
    if args.desc {
        request = request.with_direction(SortDirection::Desc);
    } else if args.asc {
        request = request.with_direction(SortDirection::Asc);
    }
    if let Some(min) = args.min_price {
        request = request.with_param("min_price", min.to_string());
    }
    if let Some(max) = args.max_price {
        request = request.with_param("max_price", max.to_string());
    }
    for (key, value) in &args.params {
        request = request.with_param(key.as_str(), value.as_str());
    }
    request
}

fn start_spinner(term: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(format!("Searching for '{}'...", term));
    spinner.enable_steady_tick(std::time::Duration::from_millis(100));
    spinner
}
