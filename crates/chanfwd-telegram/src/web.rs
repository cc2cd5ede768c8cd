//! Public channel preview source (`https://t.me/s/<name>`).
//!
//! Telegram serves the latest posts of every public channel as static HTML.
//! Private channels, unknown handles and numeric ids have no preview: Telegram
//! redirects those to the plain `t.me/<name>` landing page.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use chanfwd_core::{
    domain::{Channel, PostId, SourceMessage},
    errors::Error,
    source::MessageSource,
    Result,
};

#[derive(Clone, Debug)]
pub struct WebPreviewSource {
    base_url: String,
    http: Client,
}

impl WebPreviewSource {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("chanfwd/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::External(format!("failed to build http client: {e}")))?;
        Ok(Self {
            base_url: base_url.into(),
            http,
        })
    }

    fn preview_url(&self, channel: &Channel) -> String {
        format!(
            "{}/s/{}",
            self.base_url.trim_end_matches('/'),
            channel.handle()
        )
    }
}

#[async_trait]
impl MessageSource for WebPreviewSource {
    async fn fetch_recent(&self, channel: &Channel, limit: usize) -> Result<Vec<SourceMessage>> {
        if channel.numeric_id().is_some() {
            return Err(Error::inaccessible(
                channel.as_str(),
                "numeric ids have no public preview",
            ));
        }

        let url = self.preview_url(channel);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::External(format!("preview request error: {e}")))?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(Error::inaccessible(channel.as_str(), "preview not found"));
        }
        if !status.is_success() {
            return Err(Error::External(format!(
                "preview fetch failed with status: {status}"
            )));
        }
        if !resp.url().path().starts_with("/s/") {
            return Err(Error::inaccessible(
                channel.as_str(),
                "channel is private or does not exist",
            ));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| Error::External(format!("failed to read preview body: {e}")))?;

        let Some(mut posts) = parse_preview(&body) else {
            return Err(Error::inaccessible(
                channel.as_str(),
                "page has no channel history",
            ));
        };
        debug!("preview of {channel}: {} posts on page", posts.len());

        // The page lists posts oldest first; keep the newest `limit`.
        let skip = posts.len().saturating_sub(limit);
        posts.drain(..skip);
        Ok(posts)
    }
}

/// Posts of a preview page in page order, or `None` if the page is not a channel history.
pub fn parse_preview(html: &str) -> Option<Vec<SourceMessage>> {
    let doc = Html::parse_document(html);
    let history = Selector::parse(".tgme_channel_history").expect("valid selector");
    let post_sel = Selector::parse("div.tgme_widget_message[data-post]").expect("valid selector");
    let text_sel =
        Selector::parse("div.tgme_widget_message_text.js-message_text").expect("valid selector");
    let time_sel = Selector::parse("time[datetime]").expect("valid selector");

    doc.select(&history).next()?;

    let posts = doc
        .select(&post_sel)
        .filter_map(|post| {
            let id = post
                .value()
                .attr("data-post")?
                .rsplit('/')
                .next()?
                .parse::<i64>()
                .ok()?;
            let is_service = post.value().classes().any(|c| c == "service_message");
            let text = post.select(&text_sel).next().map(element_text);
            let posted_at = post
                .select(&time_sel)
                .next()
                .and_then(|t| t.value().attr("datetime"))
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Utc));

            Some(SourceMessage {
                id: PostId(id),
                text,
                is_service,
                posted_at,
            })
        })
        .collect();

    Some(posts)
}

fn element_text(el: ElementRef<'_>) -> String {
    let mut out = String::new();
    for node in el.descendants() {
        if let Some(text) = node.value().as_text() {
            out.push_str(text);
        } else if node.value().as_element().map(|e| e.name()) == Some("br") {
            out.push('\n');
        }
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<!DOCTYPE html>
<html><body>
<section class="tgme_channel_history js-message_history">
  <div class="tgme_widget_message_wrap js-widget_message_wrap">
    <div class="tgme_widget_message text_not_supported_wrap js-widget_message" data-post="news/4">
      <div class="tgme_widget_message_bubble">
        <div class="tgme_widget_message_text js-message_text" dir="auto">old text</div>
        <a class="tgme_widget_message_date" href="https://t.me/news/4"><time datetime="2026-10-18T09:00:00+00:00" class="time">09:00</time></a>
      </div>
    </div>
  </div>
  <div class="tgme_widget_message_wrap js-widget_message_wrap">
    <div class="tgme_widget_message text_not_supported_wrap js-widget_message" data-post="news/6">
      <div class="tgme_widget_message_bubble">
        <div class="tgme_widget_message_reply">
          <div class="tgme_widget_message_text js-message_reply_text" dir="auto">quoted</div>
        </div>
        <div class="tgme_widget_message_text js-message_text" dir="auto">Breaking <b>alpha</b> event<br/>second line &amp; more</div>
        <a class="tgme_widget_message_date" href="https://t.me/news/6"><time datetime="2026-10-18T10:30:00+02:00" class="time">10:30</time></a>
      </div>
    </div>
  </div>
  <div class="tgme_widget_message_wrap js-widget_message_wrap">
    <div class="tgme_widget_message service_message js-widget_message" data-post="news/7">
      <div class="tgme_widget_message_bubble">
        <div class="tgme_widget_message_service_text">Channel photo updated</div>
      </div>
    </div>
  </div>
</section>
</body></html>"#;

    #[test]
    fn parses_posts_text_and_service_flag() {
        let posts = parse_preview(PAGE).unwrap();
        assert_eq!(posts.len(), 3);

        assert_eq!(posts[0].id, PostId(4));
        assert_eq!(posts[0].text.as_deref(), Some("old text"));
        assert!(!posts[0].is_service);

        assert_eq!(posts[1].id, PostId(6));
        assert_eq!(
            posts[1].text.as_deref(),
            Some("Breaking alpha event\nsecond line & more")
        );
        assert_eq!(
            posts[1].posted_at.map(|t| t.to_rfc3339()),
            Some("2026-10-18T08:30:00+00:00".to_string())
        );

        assert_eq!(posts[2].id, PostId(7));
        assert!(posts[2].is_service);
        assert_eq!(posts[2].text, None);
    }

    #[test]
    fn landing_page_is_not_a_history() {
        assert!(parse_preview("<html><body><div class=\"tgme_page\"></div></body></html>").is_none());
    }

    #[tokio::test]
    async fn fetch_keeps_only_the_newest_posts() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/s/news")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body(PAGE)
            .create_async()
            .await;

        let source = WebPreviewSource::new(server.url(), Duration::from_secs(5)).unwrap();
        let posts = source
            .fetch_recent(&Channel::new("@news"), 2)
            .await
            .unwrap();

        let ids: Vec<_> = posts.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![PostId(6), PostId(7)]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn redirect_to_landing_page_means_inaccessible() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/s/secret")
            .with_status(302)
            .with_header("location", "/secret")
            .create_async()
            .await;
        server
            .mock("GET", "/secret")
            .with_status(200)
            .with_body("<html><body><div class=\"tgme_page\"></div></body></html>")
            .create_async()
            .await;

        let source = WebPreviewSource::new(server.url(), Duration::from_secs(5)).unwrap();
        let err = source
            .fetch_recent(&Channel::new("@secret"), 3)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ChannelInaccessible { .. }));
    }

    #[tokio::test]
    async fn not_found_is_inaccessible_and_server_errors_are_generic() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/s/gone")
            .with_status(404)
            .create_async()
            .await;
        server
            .mock("GET", "/s/busy")
            .with_status(502)
            .create_async()
            .await;

        let source = WebPreviewSource::new(server.url(), Duration::from_secs(5)).unwrap();
        let gone = source.fetch_recent(&Channel::new("gone"), 3).await;
        assert!(matches!(gone, Err(Error::ChannelInaccessible { .. })));

        let busy = source.fetch_recent(&Channel::new("busy"), 3).await;
        assert!(matches!(busy, Err(Error::External(_))));
    }

    #[tokio::test]
    async fn numeric_ids_are_rejected_without_a_request() {
        let source = WebPreviewSource::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        let err = source
            .fetch_recent(&Channel::new("-1001234567890"), 3)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ChannelInaccessible { .. }));
    }
}
