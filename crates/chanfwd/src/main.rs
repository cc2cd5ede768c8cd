use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use chanfwd_core::{
    config::{Config, SourceKind},
    domain::{Channel, Keyword},
    last_seen::LastSeenStore,
    messaging::port::MessagingPort,
    poller::{Forwarder, PollOptions},
    refresh::ListRefresher,
    snapshot::Snapshot,
    source::MessageSource,
};
use chanfwd_mtproto::MtprotoSource;
use chanfwd_telegram::{web::WebPreviewSource, TelegramMessenger};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = Config::load().context("failed to load configuration")?;
    chanfwd_core::logging::init("chanfwd", cfg.log_file.as_deref())
        .context("failed to initialize logging")?;

    let creds = &cfg.credentials;
    info!(
        "chanfwd starting (api id {}, destination {})",
        creds.api_id, creds.destination.0
    );

    let messenger: Arc<dyn MessagingPort> =
        Arc::new(TelegramMessenger::from_token(creds.bot_token.clone()));
    if let Err(e) = messenger.check_chat(creds.destination).await {
        error!("Cannot find chat with ID {}: {e}", creds.destination.0);
        return Err(e).context("destination chat is unreachable");
    }

    let mut session = None;
    let source: Arc<dyn MessageSource> = match cfg.source {
        SourceKind::Mtproto => {
            let mtproto = Arc::new(
                MtprotoSource::connect(creds, &cfg.session_file)
                    .await
                    .context("failed to open the MTProto session")?,
            );
            session = Some(Arc::clone(&mtproto));
            mtproto
        }
        SourceKind::WebPreview => {
            info!("Reading public channels from {}", cfg.web_preview_url);
            Arc::new(WebPreviewSource::new(
                cfg.web_preview_url.clone(),
                cfg.http_timeout,
            )?)
        }
    };

    let keywords = Snapshot::<Keyword>::default();
    let channels = Snapshot::<Channel>::default();
    let keyword_refresher = ListRefresher::new(
        cfg.keywords_file.clone(),
        cfg.keyword_refresh_interval,
        keywords.clone(),
    );
    let channel_refresher = ListRefresher::new(
        cfg.channels_file.clone(),
        cfg.channel_refresh_interval,
        channels.clone(),
    );

    // Load both lists once so the first poll does not run empty.
    for (label, res) in [
        ("keywords", keyword_refresher.refresh_once()),
        ("channels", channel_refresher.refresh_once()),
    ] {
        match res {
            Ok(n) => info!("Loaded {n} {label}"),
            Err(e) => error!("Error loading {label}: {e}"),
        }
    }

    let cancel = CancellationToken::new();
    let keyword_task = tokio::spawn(keyword_refresher.run(cancel.clone()));
    let channel_task = tokio::spawn(channel_refresher.run(cancel.clone()));

    let forwarder = Forwarder::new(
        source,
        messenger,
        LastSeenStore::new(cfg.state_dir.clone()),
        channels,
        keywords,
        creds.destination,
        PollOptions::from_config(&cfg),
    );
    let poll_task = {
        let cancel = cancel.clone();
        tokio::spawn(async move { forwarder.run(cancel).await })
    };

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("Shutdown requested");
    cancel.cancel();

    for task in [poll_task, keyword_task, channel_task] {
        if let Err(e) = task.await {
            error!("background task failed: {e}");
        }
    }

    if let Some(mtproto) = session {
        if let Err(e) = mtproto.save_session() {
            error!("Error saving MTProto session: {e}");
        }
    }

    Ok(())
}
