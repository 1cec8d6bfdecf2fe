use crate::cli::OutputFormat;
use crate::commands::Result;
use audiosearch_core::search::AggregateResult;
use audiosearch_core::settings::SearchSettings;
use audiosearch_core::AdapterInfo;
use serde::Serialize;

mod pretty;
pub use pretty::print_search_result;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum OutputData {
    SearchResults(Vec<AggregateResult>),
    SourceList(Vec<AdapterInfo>),
    Settings {
        path: String,
        exists: bool,
        settings: SearchSettings,
    },
}

pub fn format_output(data: &OutputData, format: &OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(data)?);
        }
        OutputFormat::Yaml => {
            println!("{}", serde_yaml::to_string(data)?);
        }
        OutputFormat::Text => {
            format_text_output(data)?;
        }
        OutputFormat::Pretty => {
            format_pretty_output(data)?;
        }
    }
    Ok(())
}

fn format_text_output(data: &OutputData) -> Result<()> {
    match data {
        OutputData::SearchResults(results) => {
            for result in results {
                for listing in &result.listings {
                    println!(
                        "{}\t{}\t{}\t{}\t{}\t{}",
                        result.query(),
                        listing.source,
                        listing.title,
                        listing.price_amount().map(|p| p.to_string()).unwrap_or_default(),
                        listing
                            .posted_at
                            .map(|d| d.format("%Y-%m-%d").to_string())
                            .unwrap_or_default(),
                        listing.url
                    );
                }
            }
        }
        OutputData::SourceList(sources) => {
            for source in sources {
                println!("{}: {}", source.id, source.description);
            }
        }
        OutputData::Settings { path, settings, .. } => {
            println!("# {}", path);
            print!("{}", serde_yaml::to_string(settings)?);
        }
    }
    Ok(())
}

fn format_pretty_output(data: &OutputData) -> Result<()> {
    match data {
        OutputData::SearchResults(results) => {
            for result in results {
                print_search_result(result);
            }
        }
        OutputData::SourceList(sources) => pretty::print_source_table(sources),
        OutputData::Settings {
            path,
            exists,
            settings,
        } => pretty::print_settings(path, *exists, settings)?,
    }
    Ok(())
}
