//! Command handlers
//!
//! `download` wires options, catalog, and clients into one pipeline per
//! configured scope; `info` issues ad-hoc queries with the parse client.

use std::sync::Arc;

use tracing::{error, info};

use crate::app::catalog::{open_catalog, IllustCatalog};
use crate::app::client::{PageCursor, PixivClient, RemoteSource};
use crate::app::models::{IllustId, UserId};
use crate::app::pipeline::Pipeline;
use crate::cli::args::{
    apply_cli_overrides, Cli, DownloadArgs, IllustInfoArgs, InfoCommands, UserInfoArgs,
};
use crate::config::DownloadOptions;
use crate::constants::limits;
use crate::errors::Result;

/// Resolve the effective options for this invocation.
fn resolve_options(cli: &Cli, args: &DownloadArgs) -> Result<DownloadOptions> {
    let mut options = DownloadOptions::load(cli.global.config.as_deref())?;
    apply_cli_overrides(&mut options, cli, args);
    options.validate()?;
    Ok(options)
}

fn build_pipelines(
    options: &DownloadOptions,
    catalog: Arc<dyn IllustCatalog>,
    parse_remote: Arc<dyn RemoteSource>,
    download_remote: Arc<dyn RemoteSource>,
) -> Vec<Pipeline> {
    let mut pipelines = Vec::new();

    if !options.download_bookmarks_uids.is_empty() {
        let uids = options
            .download_bookmarks_uids
            .iter()
            .map(|uid| UserId::from(uid.as_str()))
            .collect();
        pipelines.push(Pipeline::bookmarks(
            options,
            Arc::clone(&catalog),
            Arc::clone(&parse_remote),
            Arc::clone(&download_remote),
            uids,
        ));
    }

    if !options.download_artist_uids.is_empty() {
        let uids = options
            .download_artist_uids
            .iter()
            .map(|uid| UserId::from(uid.as_str()))
            .collect();
        pipelines.push(Pipeline::artists(
            options,
            Arc::clone(&catalog),
            Arc::clone(&parse_remote),
            Arc::clone(&download_remote),
            uids,
        ));
    }

    if !options.download_illust_ids.is_empty() {
        let ids = options
            .download_illust_ids
            .iter()
            .map(|id| IllustId::from(id.as_str()))
            .collect();
        pipelines.push(Pipeline::illusts(
            options,
            Arc::clone(&catalog),
            Arc::clone(&parse_remote),
            Arc::clone(&download_remote),
            ids,
        ));
    }

    pipelines
}

/// Run the download pipelines once, or periodically in service mode.
pub async fn handle_download(cli: &Cli, args: &DownloadArgs) -> Result<()> {
    let options = resolve_options(cli, args)?;
    let catalog = open_catalog(&options).await?;
    let parse_remote: Arc<dyn RemoteSource> =
        Arc::new(PixivClient::new(&options.parse_client_config())?);
    let download_remote: Arc<dyn RemoteSource> =
        Arc::new(PixivClient::new(&options.download_client_config())?);

    let pipelines = build_pipelines(&options, catalog, parse_remote, download_remote);
    if pipelines.is_empty() {
        info!("nothing to download: no bookmarks uids, artist uids, or illust ids configured");
        return Ok(());
    }

    if options.service_mode {
        run_service(pipelines, &options).await
    } else {
        for pipeline in pipelines {
            pipeline.run_once().await?;
        }
        Ok(())
    }
}

/// Service mode: every pipeline scans on its own cadence until SIGINT or
/// SIGTERM arrives.
async fn run_service(pipelines: Vec<Pipeline>, options: &DownloadOptions) -> Result<()> {
    let interval = options.scan_interval();
    for mut pipeline in pipelines {
        tokio::spawn(async move {
            loop {
                pipeline.run_round().await;
                tokio::time::sleep(interval).await;
            }
        });
    }

    wait_for_shutdown_signal().await;
    info!("shutdown signal received, exiting");
    Ok(())
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut terminate =
            signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = terminate.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

/// Print full metadata of explicit illust ids as JSON.
pub async fn handle_info_illust(cli: &Cli, args: &IllustInfoArgs) -> Result<()> {
    let options = resolve_options(cli, &DownloadArgs::default())?;
    let client = PixivClient::new(&options.parse_client_config())?;

    for id in &args.ids {
        let id = IllustId::from(id.as_str());
        match client.illust_records(&id, false).await {
            Ok(records) => {
                for record in records {
                    println!("{}", serde_json::to_string_pretty(&record).unwrap_or_default());
                }
            }
            Err(err) => error!(illust = %id, %err, "lookup failed"),
        }
    }
    Ok(())
}

/// Print a user's published work ids, or the users they follow.
pub async fn handle_info_user(cli: &Cli, args: &UserInfoArgs) -> Result<()> {
    let options = resolve_options(cli, &DownloadArgs::default())?;
    let client = PixivClient::new(&options.parse_client_config())?;
    let uid = UserId::from(args.uid.as_str());

    if args.following {
        let mut cursor = PageCursor::new(limits::FOLLOWING_PAGE_LIMIT);
        while cursor.has_more() {
            let page = client
                .following_page(&uid, cursor.offset(), cursor.limit())
                .await?;
            cursor.record_total(page.total);
            for user in &page.users {
                println!("{}\t{}\t{}", user.user_id, user.user_name, user.user_account);
            }
            cursor.advance();
        }
    } else {
        let mut ids = client.user_illust_ids(&uid).await?;
        ids.sort();
        println!(
            "illusts: {}",
            ids.iter()
                .map(|id| id.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }
    Ok(())
}

/// Dispatch an `info` subcommand.
pub async fn handle_info(cli: &Cli, command: &InfoCommands) -> Result<()> {
    match command {
        InfoCommands::Illust(args) => handle_info_illust(cli, args).await,
        InfoCommands::User(args) => handle_info_user(cli, args).await,
    }
}
