use std::{path::PathBuf, sync::Arc};

use album_cache::{AlbumCacheStore, StoreOptions};
use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use client_core::{
    batch, hidden_album, new_album_cache, visible_album_options, AlbumApiClient, AlbumPager,
    AlbumRef, PaginationDriver,
};
use shared::{domain::ImageId, protocol::UserProfile};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;

use config::{load_settings, Settings};

#[derive(Parser, Debug)]
struct Cli {
    /// Settings file; defaults to ./album.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    api_base_url: Option<String>,
    #[arg(long)]
    token: Option<String>,
    #[arg(long)]
    viewport_width: Option<u32>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the albums reachable from the signed-in profile.
    Albums,
    /// Page through one album and print the cached result as JSON.
    Browse {
        /// Album display name or id. Defaults to the first album. The hidden
        /// album only opens with --hidden.
        album: Option<String>,
        #[arg(long)]
        hidden: bool,
        /// Stop after this many pages even if more remain.
        #[arg(long)]
        max_pages: Option<u32>,
        /// Fixed batch size instead of one derived from the viewport width.
        #[arg(long)]
        batch: Option<u32>,
    },
    /// Resolve signed links for images.
    Links {
        #[arg(long, value_enum, default_value_t = LinkKind::Thumbnail)]
        kind: LinkKind,
        image_ids: Vec<String>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LinkKind {
    Thumbnail,
    View,
    Download,
}

impl Cli {
    fn apply_overrides(&self, mut settings: Settings) -> Settings {
        if let Some(v) = &self.api_base_url {
            settings.api_base_url = v.clone();
        }
        if let Some(v) = &self.token {
            settings.token = Some(v.clone());
        }
        if let Some(v) = self.viewport_width {
            settings.viewport_width = v;
        }
        settings
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let cli = Cli::parse();
    let settings = cli.apply_overrides(load_settings(cli.config.as_deref())?);

    let mut api = AlbumApiClient::new(&settings.api_base_url)?
        .with_timeout(settings.http_timeout())?;
    if let Some(token) = &settings.token {
        api = api.with_token(token.clone());
    }
    info!(base_url = %api.base_url(), "using album service");

    match cli.command {
        Command::Albums => {
            let profile = api.fetch_profile().await.context("failed to fetch profile")?;
            for album in visible_album_options(&profile) {
                println!("{}\t{}", album.id, album.name);
            }
        }
        Command::Browse {
            album,
            hidden,
            max_pages,
            batch: fixed_batch,
        } => {
            let profile = api.fetch_profile().await.context("failed to fetch profile")?;
            let target = select_album(&profile, album.as_deref(), hidden)?;

            let store = AlbumCacheStore::with_options(StoreOptions {
                dedupe_images: settings.dedupe_images,
            });
            let driver = PaginationDriver::new(Arc::new(api), new_album_cache(store));
            driver.initialize_albums(&profile).await;

            let mut pager = AlbumPager::new(target);
            let mut batch_size = fixed_batch.unwrap_or(batch::INITIAL_BATCH);
            let mut pages = 0;
            while pager.has_more() && max_pages.map_or(true, |max| pages < max) {
                let Some(outcome) = pager.load_next(&driver, batch_size).await else {
                    break;
                };
                pages += 1;
                info!(
                    page = pages,
                    delta = outcome.delta(),
                    has_more = outcome.has_more(),
                    "page done"
                );
                batch_size = fixed_batch
                    .unwrap_or_else(|| batch::batch_for_width(settings.viewport_width));
            }

            let snapshot = driver.cache().read().await.snapshot();
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        Command::Links { kind, image_ids } => {
            let ids: Vec<ImageId> = image_ids.into_iter().map(ImageId::from).collect();
            let urls = match kind {
                LinkKind::Thumbnail => api.thumbnail_links(&ids).await?,
                LinkKind::View => api.view_links(&ids).await?,
                LinkKind::Download => api.download_links(&ids).await?,
            };
            for (id, url) in ids.iter().zip(urls) {
                println!("{id}\t{url}");
            }
        }
    }

    Ok(())
}

fn select_album(profile: &UserProfile, wanted: Option<&str>, hidden: bool) -> Result<AlbumRef> {
    if hidden {
        return hidden_album(profile).ok_or_else(|| anyhow!("profile has no hidden album"));
    }
    let options = visible_album_options(profile);
    match wanted {
        Some(wanted) => options
            .into_iter()
            .find(|album| album.name == wanted || album.id.as_str() == wanted)
            .ok_or_else(|| anyhow!("no album named or numbered '{wanted}'")),
        None => options
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("profile has no albums")),
    }
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
