//! Poll & forward loop.
//!
//! Each iteration takes one snapshot of the channel list and one of the keyword
//! list, fetches every channel (bounded fan-out), then walks the results in
//! channel-list order and forwards new matching posts to the destination chat.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use chrono::{DateTime, Utc};
use futures::{stream, StreamExt};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    config::Config,
    domain::{first_match, Channel, ChatId, Keyword, PostId, SourceMessage},
    errors::Error,
    formatting::forward_html,
    last_seen::LastSeenStore,
    messaging::port::MessagingPort,
    snapshot::Snapshot,
    source::MessageSource,
};

#[derive(Clone, Copy, Debug)]
pub struct PollOptions {
    /// How many of the most recent posts to fetch per channel.
    pub fetch_limit: usize,
    /// Pause between two iterations.
    pub poll_interval: Duration,
    pub max_concurrent_fetches: usize,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            fetch_limit: 3,
            poll_interval: Duration::from_secs(1),
            max_concurrent_fetches: 4,
        }
    }
}

impl PollOptions {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            fetch_limit: cfg.fetch_limit,
            poll_interval: cfg.poll_interval,
            max_concurrent_fetches: cfg.max_concurrent_fetches,
        }
    }
}

/// Counters for one iteration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PollStats {
    pub channels: usize,
    pub skipped_channels: usize,
    pub forwarded: usize,
    pub send_failures: usize,
    /// Posts the messenger refused outright; they are not retried.
    pub rejected: usize,
}

pub struct Forwarder {
    source: Arc<dyn MessageSource>,
    messenger: Arc<dyn MessagingPort>,
    tracker: LastSeenStore,
    channels: Snapshot<Channel>,
    keywords: Snapshot<Keyword>,
    destination: ChatId,
    opts: PollOptions,
    // last-seen id at which a possible gap was already reported, per channel
    gap_reported: Mutex<HashMap<Channel, PostId>>,
}

impl Forwarder {
    pub fn new(
        source: Arc<dyn MessageSource>,
        messenger: Arc<dyn MessagingPort>,
        tracker: LastSeenStore,
        channels: Snapshot<Channel>,
        keywords: Snapshot<Keyword>,
        destination: ChatId,
        opts: PollOptions,
    ) -> Self {
        Self {
            source,
            messenger,
            tracker,
            channels,
            keywords,
            destination,
            opts,
            gap_reported: Mutex::new(HashMap::new()),
        }
    }

    /// Poll until `cancel` fires. An iteration in progress always completes.
    pub async fn run(&self, cancel: CancellationToken) {
        info!("Poll loop started (destination {})", self.destination.0);
        while !cancel.is_cancelled() {
            let stats = self.poll_once().await;
            debug!(
                channels = stats.channels,
                skipped = stats.skipped_channels,
                forwarded = stats.forwarded,
                send_failures = stats.send_failures,
                rejected = stats.rejected,
                "poll iteration finished"
            );

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = sleep(self.opts.poll_interval) => {}
            }
        }
        info!("Poll loop stopped");
    }

    pub async fn poll_once(&self) -> PollStats {
        let channels = self.channels.load();
        let keywords = self.keywords.load();
        let limit = self.opts.fetch_limit;

        let fetched: Vec<_> = stream::iter(channels.iter().cloned())
            .map(|channel| {
                let source = Arc::clone(&self.source);
                async move {
                    let res = source.fetch_recent(&channel, limit).await;
                    (channel, res)
                }
            })
            .buffered(self.opts.max_concurrent_fetches.max(1))
            .collect()
            .await;

        let mut stats = PollStats {
            channels: channels.len(),
            ..PollStats::default()
        };

        for (channel, result) in fetched {
            match result {
                Ok(messages) => self.forward_new(&channel, messages, &keywords, &mut stats).await,
                Err(e @ Error::ChannelInaccessible { .. }) => {
                    error!("Error getting messages from channel {channel}: {e}");
                    stats.skipped_channels += 1;
                }
                Err(e) => {
                    error!("General error for channel {channel}: {e}");
                    stats.skipped_channels += 1;
                }
            }
        }

        stats
    }

    async fn forward_new(
        &self,
        channel: &Channel,
        messages: Vec<SourceMessage>,
        keywords: &[Keyword],
        stats: &mut PollStats,
    ) {
        let last_seen = match self.tracker.load(channel) {
            Ok(id) => id,
            Err(e) => {
                error!("Cannot read last message id for channel {channel}: {e}");
                stats.skipped_channels += 1;
                return;
            }
        };

        let fetched = messages.len();
        let mut candidates: Vec<SourceMessage> =
            messages.into_iter().filter(|m| !m.is_service).collect();
        let user_posts = candidates.len();
        candidates.retain(|m| m.id > last_seen);
        if last_seen.0 > 0
            && fetched >= self.opts.fetch_limit
            && user_posts > 0
            && candidates.len() == user_posts
        {
            let oldest = candidates.iter().filter_map(|m| m.posted_at).min();
            self.report_gap(channel, last_seen, oldest);
        }

        // Ascending ids keep the stored last-seen id monotonic.
        candidates.sort_by_key(|m| m.id);

        let max_len = self.messenger.capabilities().max_message_len;
        for msg in candidates {
            let lowered = msg.lowered_text();
            let Some(keyword) = first_match(keywords, &lowered) else {
                continue;
            };

            let html = forward_html(
                keyword,
                msg.text.as_deref().unwrap_or(""),
                channel,
                msg.id,
                max_len,
            );
            info!(
                "Forwarding message ID {} from channel {channel} with keyword {}",
                msg.id,
                keyword.as_str()
            );

            match self.messenger.send_html(self.destination, &html).await {
                Ok(_) => {
                    stats.forwarded += 1;
                    if let Err(e) = self.tracker.save(channel, msg.id) {
                        error!(
                            "Forwarded message ID {} from channel {channel} but could not save it: {e}",
                            msg.id
                        );
                    }
                }
                Err(e @ Error::Rejected(_)) => {
                    // Resending the same post cannot succeed; move past it.
                    stats.rejected += 1;
                    error!(
                        "Message ID {} from channel {channel} was rejected, skipping it: {e}",
                        msg.id
                    );
                    if let Err(e) = self.tracker.save(channel, msg.id) {
                        error!(
                            "Could not save last message id {} for channel {channel}: {e}",
                            msg.id
                        );
                    }
                }
                Err(e) => {
                    // Later posts wait, otherwise last-seen would move past this one.
                    stats.send_failures += 1;
                    error!(
                        "Error forwarding message ID {} from channel {channel}: {e}",
                        msg.id
                    );
                    break;
                }
            }
        }
    }

    fn report_gap(&self, channel: &Channel, last_seen: PostId, oldest: Option<DateTime<Utc>>) {
        let mut reported = self.gap_reported.lock().unwrap_or_else(|e| e.into_inner());
        if reported.get(channel) == Some(&last_seen) {
            return;
        }
        reported.insert(channel.clone(), last_seen);
        let age = oldest
            .map(|t| format!(" (oldest fetched post is {} min old)", (Utc::now() - t).num_minutes()))
            .unwrap_or_default();
        warn!(
            "All {} fetched posts of channel {channel} are newer than {last_seen}; older unseen posts are not fetched{age}",
            self.opts.fetch_limit
        );
    }
}
