//! CLI runner - executes commands

use crate::aggregate::collect_activity;
use crate::auth::Credential;
use crate::cli::commands::{Cli, Commands};
use crate::cli::server::{self, AppState};
use crate::config::Settings;
use crate::error::{Error, Result, ResultExt};
use crate::fetch::{HttpPageFetcher, PageFetcher, PageRequest};
use crate::http::HttpClient;
use crate::notify::{NotificationQueue, SystemClock};
use crate::pagination::{error_from_info, DrainEvent, PaginationController, ResourceKey};
use crate::resources::Resource;
use crate::types::parse_params;
use futures::StreamExt;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        let settings = Settings::resolve(self.cli.config.as_deref())?;

        match &self.cli.command {
            Commands::Page {
                resource,
                after,
                params,
            } => self.page(&settings, resource, after.clone(), params).await,
            Commands::Drain {
                resource,
                params,
                max_pages,
            } => self.drain(&settings, resource, params, *max_pages).await,
            Commands::Summary { user, top } => self.summary(&settings, user, *top).await,
            Commands::Serve { bind } => self.serve(&settings, *bind).await,
        }
    }

    /// Credential from `--token`, then the environment
    fn credential(&self) -> Result<Option<Credential>> {
        match &self.cli.token {
            Some(token) => Credential::bearer(token.as_str()).map(Some),
            None => Ok(Credential::from_env()),
        }
    }

    fn client(settings: &Settings) -> Result<Arc<HttpClient>> {
        HttpClient::with_config(settings.to_http_config()).map(Arc::new)
    }

    fn notifications(settings: &Settings) -> Arc<NotificationQueue> {
        Arc::new(NotificationQueue::with_clock(
            Arc::new(SystemClock),
            settings.notification_ttl(),
        ))
    }

    fn controller(
        settings: &Settings,
        client: Arc<HttpClient>,
        notifications: &Arc<NotificationQueue>,
    ) -> Arc<PaginationController<HttpPageFetcher>> {
        Arc::new(
            PaginationController::with_config(
                HttpPageFetcher::new(client),
                settings.to_controller_config(),
            )
            .with_sign_out(|| warn!("Token rejected upstream; sign in again to get a new one"))
            .with_notifications(Arc::clone(notifications)),
        )
    }

    /// Fetch a single page
    async fn page(
        &self,
        settings: &Settings,
        resource: &str,
        after: Option<String>,
        params: &[String],
    ) -> Result<()> {
        let resource: Resource = resource.parse()?;
        let request = PageRequest::new(resource.resource_id())
            .with_params(parse_params(params)?)
            .after(after)
            .limit(settings.api.page_size);

        let fetcher = HttpPageFetcher::new(Self::client(settings)?);
        let page = fetcher
            .fetch_page(&request, self.credential()?.as_ref())
            .await?;

        info!(items = page.items.len(), after = ?page.next_cursor, "Fetched page");
        print_json(&page)
    }

    /// Fetch every page of a listing, optionally stopping early
    async fn drain(
        &self,
        settings: &Settings,
        resource: &str,
        params: &[String],
        max_pages: Option<u32>,
    ) -> Result<()> {
        let resource: Resource = resource.parse()?;
        let key = ResourceKey::with_params(resource.resource_id(), parse_params(params)?);

        let notifications = Self::notifications(settings);
        let controller = Self::controller(settings, Self::client(settings)?, &notifications);

        let stream = controller.start_drain(key.clone(), self.credential()?);
        futures::pin_mut!(stream);

        let mut pages = 0u32;
        while let Some(event) = stream.next().await {
            match event {
                DrainEvent::Snapshot(snapshot) => {
                    pages += 1;
                    info!(pages, items = snapshot.len(), "Page merged");
                    if max_pages.is_some_and(|max| pages >= max) {
                        info!(pages, "Page limit reached, stopping");
                        return print_json(&snapshot);
                    }
                }
                DrainEvent::Exhausted(snapshot) => {
                    info!(items = snapshot.len(), "Listing exhausted");
                    return print_json(&snapshot);
                }
                DrainEvent::AuthExpired(info) | DrainEvent::Failed(info) => {
                    report_notifications(&notifications);
                    return Err(error_from_info(info));
                }
                DrainEvent::Busy(_) | DrainEvent::Cancelled => break,
            }
        }
        Err(Error::Other(format!("drain of '{key}' did not finish")))
    }

    /// Summarize a user's activity
    async fn summary(&self, settings: &Settings, user: &str, top: usize) -> Result<()> {
        let credential = self
            .credential()?
            .ok_or_else(|| Error::missing_credential(format!("summary of {user}")))?;

        let notifications = Self::notifications(settings);
        let controller = Self::controller(settings, Self::client(settings)?, &notifications);

        match collect_activity(&controller, user, &credential, top).await {
            Ok(report) => print_json(&report),
            Err(e) => {
                report_notifications(&notifications);
                Err(e)
            }
        }
    }

    /// Run the relay server until Ctrl-C
    async fn serve(&self, settings: &Settings, bind: Option<SocketAddr>) -> Result<()> {
        let state = AppState::new(
            Self::client(settings)?,
            settings.to_controller_config(),
            Self::notifications(settings),
        );

        let shutdown = CancellationToken::new();
        let on_signal = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutting down");
            }
            on_signal.cancel();
        });

        server::serve(state, bind.unwrap_or(settings.server.bind), shutdown).await
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("Failed to render output")?;
    println!("{rendered}");
    Ok(())
}

fn report_notifications(queue: &NotificationQueue) {
    for positioned in queue.list() {
        let n = positioned.notification;
        warn!(kind = ?n.kind, "{}: {}", n.title, n.description.unwrap_or_default());
    }
}
