use std::path::PathBuf;
use std::str::FromStr;

use audiosearch_core::search::SortKey;
use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "audiosearch")]
#[command(about = "Search Swedish hifi marketplaces for second-hand audio gear")]
#[command(version)]
#[command(after_help = "\x1b[1;36mQuick Start:\x1b[0m
  audiosearch search -s \"yamaha receiver\"         Search every source
  audiosearch search -s \"hegel h90\" -d 7          Only listings from the last week
  audiosearch search -s speakers -i HifiTorget    Only one site
  audiosearch sources                             List available sources

\x1b[1;36mSettings:\x1b[0m
  audiosearch config init                         Write a default settings file
  audiosearch config show                         Show effective settings")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Pretty)]
    pub output: OutputFormat,

    /// Verbose logging (-v: info, -vv: debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Settings file to use instead of ~/.config/audiosearch/settings.yaml
    #[arg(long, global = true, env = "AUDIOSEARCH_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Search all selected sources concurrently
    ///
    /// Each -s term runs as its own search; results are shown one search
    /// after another.
    #[command(after_help = "\x1b[1;33mExamples:\x1b[0m
  audiosearch search -s \"yamaha receiver\"
  audiosearch search -s speakers -s amplifier -d 3
  audiosearch search -s turntable -e Taktoton --sort price
  audiosearch search -s hegel --min-price 2000 --max-price 8000 --output json

\x1b[1;33mNotes:\x1b[0m
  Site names are case-insensitive and match the source id or any word of
  its display name. Listings without a date are kept by -d and sorted last.")]
    Search(SearchArgs),

    /// List the sources compiled into this binary
    #[command(alias = "ls", alias = "list")]
    Sources,

    /// Inspect or create the settings file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Args, Debug, Clone)]
pub struct SearchArgs {
    /// Search term (repeat for separate searches)
    #[arg(short = 's', long = "search", value_name = "TERM", required = true)]
    pub terms: Vec<String>,

    /// Only show listings from the last N days
    #[arg(short, long, value_name = "N")]
    pub days: Option<u32>,

    /// Only search these sites (repeatable)
    #[arg(short, long, value_name = "SITE")]
    pub include: Vec<String>,

    /// Skip these sites (repeatable)
    #[arg(short, long, value_name = "SITE")]
    pub exclude: Vec<String>,

    /// Sort key: relevance, price or date
    #[arg(long, value_name = "KEY", value_parser = SortKey::from_str)]
    pub sort: Option<SortKey>,

    /// Sort descending
    #[arg(long, conflicts_with = "asc")]
    pub desc: bool,

    /// Sort ascending
    #[arg(long)]
    pub asc: bool,

    /// Lowest price to include (listings without a price are kept)
    #[arg(long, value_name = "SEK")]
    pub min_price: Option<f64>,

    /// Highest price to include (listings without a price are kept)
    #[arg(long, value_name = "SEK")]
    pub max_price: Option<f64>,

    /// Extra adapter filter as key=value (repeatable)
    #[arg(long = "param", value_name = "KEY=VALUE", value_parser = parse_key_val)]
    pub params: Vec<(String, String)>,

    /// Per-source timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Maximum number of sources queried at once
    #[arg(long, value_name = "N")]
    pub max_concurrency: Option<usize>,
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", s))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{}'", s));
    }
    Ok((key.to_string(), value.trim().to_string()))
}

#[derive(Subcommand, Clone)]
pub enum ConfigAction {
    /// Show the effective settings
    Show,
    /// Print the settings file location
    Path,
    /// Write a settings file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable formatted output
    Pretty,
    /// JSON output
    Json,
    /// YAML output
    Yaml,
    /// Plain text output, one tab-separated line per listing
    Text,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_repeated_flags_collect() {
        let cli = Cli::try_parse_from([
            "audiosearch",
            "search",
            "-s",
            "speakers",
            "-s",
            "amplifier",
            "-i",
            "hifitorget",
            "-i",
            "Taktoton",
            "--sort",
            "price",
            "--param",
            "region=stockholm",
        ])
        .unwrap();

        let Commands::Search(args) = cli.command else {
            panic!("expected search command");
        };
        assert_eq!(args.terms, vec!["speakers", "amplifier"]);
        assert_eq!(args.include, vec!["hifitorget", "Taktoton"]);
        assert_eq!(args.sort, Some(SortKey::Price));
        assert_eq!(args.params, vec![("region".to_string(), "stockholm".to_string())]);
    }

    #[test]
    fn test_search_requires_a_term() {
        assert!(Cli::try_parse_from(["audiosearch", "search", "-d", "3"]).is_err());
    }

    #[test]
    fn test_rejects_unknown_sort_key() {
        assert!(Cli::try_parse_from(["audiosearch", "search", "-s", "x", "--sort", "popularity"]).is_err());
    }

    #[test]
    fn test_parse_key_val() {
        assert_eq!(
            parse_key_val("min_price = 500").unwrap(),
            ("min_price".to_string(), "500".to_string())
        );
        assert!(parse_key_val("novalue").is_err());
        assert!(parse_key_val("=x").is_err());
    }
}
