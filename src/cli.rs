//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use paperfetch_core::FetchConfig;

/// Fetch full-text PDFs for every DOI in a RIS bibliography.
///
/// Each DOI is tried against a prioritized chain of providers until one
/// yields a valid PDF. Results land in the output directory together with a
/// text summary and a JSON report.
#[derive(Parser, Debug)]
#[command(name = "paperfetch")]
#[command(author, version, about)]
pub struct Args {
    /// RIS file to read DOIs from
    #[arg(required_unless_present = "list_providers")]
    pub ris_file: Option<PathBuf>,

    /// Config file (default: $XDG_CONFIG_HOME/paperfetch/config.toml)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Directory to save PDFs and reports into
    #[arg(short = 'o', long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// DOIs processed concurrently (1-64)
    #[arg(short = 'w', long, value_parser = clap::value_parser!(u8).range(1..=64))]
    pub workers: Option<u8>,

    /// Extra passes over the provider chain (0-10)
    #[arg(short = 'r', long, value_parser = clap::value_parser!(u8).range(0..=10))]
    pub max_retries: Option<u8>,

    /// Provider chain to use instead of the configured priority (comma separated)
    #[arg(short = 'p', long, value_name = "NAMES", value_delimiter = ',')]
    pub providers: Option<Vec<String>>,

    /// Proxy URL for providers that are not routed direct
    #[arg(long, value_name = "URL", conflicts_with = "no_proxy")]
    pub proxy: Option<String>,

    /// Route every provider direct
    #[arg(long)]
    pub no_proxy: bool,

    /// Keep downloads without checking that they are real PDFs
    #[arg(long)]
    pub no_validate: bool,

    /// Print the available provider names and exit
    #[arg(long)]
    pub list_providers: bool,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Applies command-line overrides on top of the loaded configuration.
    pub fn apply_overrides(&self, config: &mut FetchConfig) {
        if let Some(dir) = &self.output_dir {
            config.output_dir.clone_from(dir);
        }
        if let Some(workers) = self.workers {
            config.max_workers = usize::from(workers);
        }
        if let Some(retries) = self.max_retries {
            config.max_retries = u32::from(retries);
        }
        if let Some(providers) = &self.providers {
            config.providers.priority = providers
                .iter()
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())
                .collect();
        }
        if let Some(proxy) = &self.proxy {
            config.routing.proxy_enabled = true;
            config.routing.proxy_url = Some(proxy.clone());
        }
        if self.no_proxy {
            config.routing.proxy_enabled = false;
        }
        if self.no_validate {
            config.validate_pdf = false;
        }
    }

    /// Default log filter when `RUST_LOG` is unset.
    ///
    /// Priority: quiet flag > verbose flag > config file > info.
    pub fn default_log_level<'a>(&self, configured: Option<&'a str>) -> &'a str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => configured.unwrap_or("info"),
            1 => "debug",
            _ => "trace",
        }
    }
}
