//! Command-line argument parsing
//!
//! Flags mirror the options surface; anything left unset falls back to
//! the config file, then to the built-in default.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::DownloadOptions;

/// Mirror illustrations from Pixiv into a local, indexed archive.
#[derive(Parser, Debug)]
#[command(name = "pixiv-mirror", version, about)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Log directive derived from the verbosity flags.
    pub fn log_level(&self) -> &'static str {
        if self.global.very_verbose {
            "trace"
        } else if self.global.verbose {
            "debug"
        } else {
            "info"
        }
    }
}

#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable trace logging
    #[arg(long, global = true)]
    pub very_verbose: bool,

    /// Configuration file path (default: ./pixiv.toml if present)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Session cookie, only the PHPSESSID pair is needed
    #[arg(long, global = true)]
    pub cookie: Option<String>,

    /// User-Agent header to send
    #[arg(long, global = true)]
    pub user_agent: Option<String>,

    /// Proxy URL (http, https or socks5)
    #[arg(long, global = true)]
    pub proxy: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the download pipeline over the configured scopes
    Download(DownloadArgs),

    /// Query illust or user information without downloading
    #[command(subcommand)]
    Info(InfoCommands),
}

#[derive(Args, Debug, Clone, Default)]
pub struct DownloadArgs {
    /// Keep scanning periodically instead of exiting after one round
    #[arg(long)]
    pub service_mode: bool,

    /// Seconds between scan rounds in service mode
    #[arg(long)]
    pub scan_interval_sec: Option<u64>,

    /// Directory downloaded files are stored under
    #[arg(long)]
    pub download_path: Option<PathBuf>,

    /// Filename pattern; tokens: {id} {title} {user_id} {user}
    #[arg(long)]
    pub filename_pattern: Option<String>,

    /// Worker count of the info stage
    #[arg(long)]
    pub parse_parallel: Option<usize>,

    /// Worker count of the download stage
    #[arg(long)]
    pub download_parallel: Option<usize>,

    /// Retry budget per unit of work
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Base backoff between retries, milliseconds
    #[arg(long)]
    pub retry_backoff_ms: Option<u64>,

    /// Request timeout of the discovery and info pools, milliseconds
    #[arg(long)]
    pub parse_timeout_ms: Option<u64>,

    /// Request timeout of the download pool, milliseconds
    #[arg(long)]
    pub download_timeout_ms: Option<u64>,

    /// Mirror the bookmark lists of these user ids
    #[arg(long, value_delimiter = ',')]
    pub download_bookmarks_uids: Vec<String>,

    /// Mirror the complete published catalogs of these user ids
    #[arg(long, value_delimiter = ',')]
    pub download_artist_uids: Vec<String>,

    /// Mirror these explicit illust ids
    #[arg(long, value_delimiter = ',')]
    pub download_illust_ids: Vec<String>,

    /// Only keep works owned by these user ids
    #[arg(long, value_delimiter = ',')]
    pub user_white_list: Vec<String>,

    /// Drop works owned by these user ids
    #[arg(long, value_delimiter = ',')]
    pub user_block_list: Vec<String>,

    /// Skip R-18 works
    #[arg(long)]
    pub no_r18: bool,

    /// Only download the first page of multi-page works
    #[arg(long)]
    pub only_p0: bool,

    /// Skip works with fewer bookmarks than this (0 = off)
    #[arg(long)]
    pub bookmark_gt: Option<u32>,

    /// Skip works with fewer likes than this (0 = off)
    #[arg(long)]
    pub like_gt: Option<u32>,

    /// Skip works smaller than this in both dimensions (0 = off)
    #[arg(long)]
    pub pixel_gt: Option<u32>,

    /// Catalog backend: NONE or SQLITE
    #[arg(long)]
    pub database_type: Option<String>,

    /// Directory the SQLite catalog lives in
    #[arg(long)]
    pub sqlite_path: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum InfoCommands {
    /// Print the full metadata of illust ids as JSON
    Illust(IllustInfoArgs),

    /// Print a user's published illust ids, or their following list
    User(UserInfoArgs),
}

#[derive(Args, Debug)]
pub struct IllustInfoArgs {
    /// Illust ids to look up
    #[arg(long, value_delimiter = ',', required = true)]
    pub ids: Vec<String>,
}

#[derive(Args, Debug)]
pub struct UserInfoArgs {
    /// User id to look up
    #[arg(long)]
    pub uid: String,

    /// List the users this uid follows instead of their works
    #[arg(long)]
    pub following: bool,
}

/// Overlay CLI flags onto loaded options; a set flag wins.
pub fn apply_cli_overrides(options: &mut DownloadOptions, cli: &Cli, args: &DownloadArgs) {
    if let Some(cookie) = &cli.global.cookie {
        options.cookie = cookie.clone();
    }
    if let Some(user_agent) = &cli.global.user_agent {
        options.user_agent = user_agent.clone();
    }
    if let Some(proxy) = &cli.global.proxy {
        options.proxy = Some(proxy.clone());
    }

    if args.service_mode {
        options.service_mode = true;
    }
    if args.no_r18 {
        options.no_r18 = true;
    }
    if args.only_p0 {
        options.only_p0 = true;
    }

    macro_rules! overlay {
        ($($field:ident),* $(,)?) => {
            $(if let Some(value) = &args.$field {
                options.$field = value.clone();
            })*
        };
    }
    overlay!(
        scan_interval_sec,
        download_path,
        filename_pattern,
        parse_parallel,
        download_parallel,
        max_retries,
        retry_backoff_ms,
        parse_timeout_ms,
        download_timeout_ms,
        bookmark_gt,
        like_gt,
        pixel_gt,
        database_type,
        sqlite_path,
    );

    macro_rules! overlay_list {
        ($($field:ident),* $(,)?) => {
            $(if !args.$field.is_empty() {
                options.$field = args.$field.clone();
            })*
        };
    }
    overlay_list!(
        download_bookmarks_uids,
        download_artist_uids,
        download_illust_ids,
        user_white_list,
        user_block_list,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn download_flags_parse() {
        let cli = Cli::parse_args_from([
            "pixiv-mirror",
            "--cookie",
            "PHPSESSID=x",
            "download",
            "--download-illust-ids",
            "100,200",
            "--no-r18",
            "--parse-parallel",
            "2",
        ]);
        let Commands::Download(args) = &cli.command else {
            panic!("expected download command");
        };
        assert_eq!(args.download_illust_ids, vec!["100", "200"]);
        assert!(args.no_r18);
        assert_eq!(args.parse_parallel, Some(2));
        assert_eq!(cli.global.cookie.as_deref(), Some("PHPSESSID=x"));
    }

    #[test]
    fn overrides_win_over_loaded_options() {
        let cli = Cli::parse_args_from([
            "pixiv-mirror",
            "download",
            "--download-path",
            "elsewhere",
            "--max-retries",
            "2",
        ]);
        let Commands::Download(args) = &cli.command else {
            panic!("expected download command");
        };

        let mut options = DownloadOptions::default();
        apply_cli_overrides(&mut options, &cli, args);

        assert_eq!(options.download_path, PathBuf::from("elsewhere"));
        assert_eq!(options.max_retries, 2);
        // untouched fields keep their previous values
        assert_eq!(options.parse_parallel, 5);
    }

    #[test]
    fn info_user_flags_parse() {
        let cli =
            Cli::parse_args_from(["pixiv-mirror", "info", "user", "--uid", "42", "--following"]);
        let Commands::Info(InfoCommands::User(args)) = &cli.command else {
            panic!("expected info user command");
        };
        assert_eq!(args.uid, "42");
        assert!(args.following);
    }

    impl Cli {
        fn parse_args_from<I, T>(iter: I) -> Self
        where
            I: IntoIterator<Item = T>,
            T: Into<std::ffi::OsString> + Clone,
        {
            <Self as clap::Parser>::parse_from(iter)
        }
    }
}
