use anyhow::{Context, Result};
use axum::http::HeaderValue;
use clap::{ArgAction, Parser};
use std::{env, path::PathBuf};

use crate::{
    models::mount::Mount,
    services::{
        listing::ListingOptions, object_server::DEFAULT_CACHE_CONTROL,
        readme_cache::DEFAULT_README_CACHE_BYTES,
    },
    state::BrowseOptions,
};

const DEFAULT_PORT: u16 = 8080;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub socket: Option<PathBuf>,
    pub storage_dir: String,
    pub database_url: String,
    pub migrate: bool,
    pub verbose: bool,
    pub mounts: Vec<Mount>,
    pub json: bool,
    pub readme: bool,
    pub skip_readme: bool,
    pub version_sort: bool,
    pub readme_name: String,
    pub default_cache_control: String,
    pub readme_cache_bytes: usize,
    pub favicon_404: bool,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Browse object-storage buckets as one HTTP namespace")]
pub struct Args {
    /// Mounts as `virtualPath:bucket:backendPrefix`, e.g. `/docs/:site:public/`
    #[arg(value_name = "MOUNT", required_unless_present = "migrate")]
    pub mounts: Vec<Mount>,

    /// Host to bind to
    #[arg(long, env = "BUCKET_BROWSER_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to bind to (falls back to PORT)
    #[arg(long, env = "BUCKET_BROWSER_PORT")]
    pub port: Option<u16>,

    /// Listen on a Unix socket instead of TCP
    #[arg(long, env = "BUCKET_BROWSER_SOCKET")]
    pub socket: Option<PathBuf>,

    /// Directory where object payloads are stored
    #[arg(long, env = "BUCKET_BROWSER_STORAGE_DIR", default_value = "./data/objects")]
    pub storage_dir: String,

    /// Catalog database URL
    #[arg(
        long,
        env = "BUCKET_BROWSER_DATABASE_URL",
        default_value = "sqlite://./data/meta/object_store.db"
    )]
    pub database_url: String,

    /// Create the catalog schema and exit
    #[arg(long)]
    pub migrate: bool,

    /// Never answer directory requests with JSON
    #[arg(long, env = "BUCKET_BROWSER_NO_JSON")]
    pub no_json: bool,

    /// Do not render the directory README below listings
    #[arg(long, env = "BUCKET_BROWSER_NO_README")]
    pub no_readme: bool,

    /// Leave the README out of listing entries
    #[arg(long, env = "BUCKET_BROWSER_SKIP_README")]
    pub skip_readme: bool,

    /// Sort names that embed a version newest first
    #[arg(long, env = "BUCKET_BROWSER_VERSION_SORT")]
    pub version_sort: bool,

    /// File name treated as the directory README
    #[arg(long, env = "BUCKET_BROWSER_README_NAME", default_value = "README.md")]
    pub readme_name: String,

    /// Cache-Control for listings and objects without their own
    #[arg(long, env = "BUCKET_BROWSER_DEFAULT_CACHE_CONTROL", default_value = DEFAULT_CACHE_CONTROL)]
    pub default_cache_control: String,

    /// Byte budget of the README cache
    #[arg(long, env = "BUCKET_BROWSER_README_CACHE_BYTES", default_value_t = DEFAULT_README_CACHE_BYTES)]
    pub readme_cache_bytes: usize,

    /// Answer /favicon.ico with 404 without asking the backend
    #[arg(
        long = "favicon-404",
        env = "BUCKET_BROWSER_FAVICON_404",
        default_value_t = true,
        action = ArgAction::Set
    )]
    pub favicon_404: bool,

    /// Debug logging
    #[arg(short, long, env = "BUCKET_BROWSER_VERBOSE")]
    pub verbose: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        let port = match env::var("PORT") {
            Ok(value) => Some(
                value
                    .parse::<u16>()
                    .with_context(|| format!("parsing PORT value `{}`", value))?,
            ),
            Err(env::VarError::NotPresent) => None,
            Err(err) => return Err(err).context("reading PORT"),
        };
        Self::from_args(Args::parse(), port)
    }

    /// Merge parsed args with a port taken from the plain `PORT` variable.
    pub fn from_args(args: Args, env_port: Option<u16>) -> Result<Self> {
        HeaderValue::from_str(&args.default_cache_control).with_context(|| {
            format!(
                "invalid default cache control `{}`",
                args.default_cache_control
            )
        })?;

        Ok(Self {
            host: args.host,
            port: args.port.or(env_port).unwrap_or(DEFAULT_PORT),
            socket: args.socket,
            storage_dir: args.storage_dir,
            database_url: args.database_url,
            migrate: args.migrate,
            verbose: args.verbose,
            mounts: args.mounts,
            json: !args.no_json,
            readme: !args.no_readme,
            skip_readme: args.skip_readme,
            version_sort: args.version_sort,
            readme_name: args.readme_name,
            default_cache_control: args.default_cache_control,
            readme_cache_bytes: args.readme_cache_bytes,
            favicon_404: args.favicon_404,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn browse_options(&self) -> Result<BrowseOptions> {
        Ok(BrowseOptions {
            listing: ListingOptions {
                readme_name: self.readme_name.clone(),
                skip_readme: self.skip_readme,
                version_sort: self.version_sort,
            },
            json: self.json,
            readme: self.readme,
            favicon_not_found: self.favicon_404,
            default_cache_control: HeaderValue::from_str(&self.default_cache_control)
                .context("invalid default cache control")?,
            readme_cache_bytes: self.readme_cache_bytes,
        })
    }
}
