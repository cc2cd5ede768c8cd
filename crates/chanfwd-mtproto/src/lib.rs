//! MTProto channel source.
//!
//! Reads channel history as a signed-in user account (grammers), so private
//! channels the account has joined and numeric `-100…` ids work. The session
//! file is created by the `chanfwd-login` binary.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Mutex,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use grammers_client::{types::Message, Client, Config, InitParams, InvocationError};
use grammers_session::{PackedChat, Session};
use tracing::{debug, info};

use chanfwd_core::{
    config::Credentials,
    domain::{Channel, PostId, SourceMessage},
    errors::Error,
    source::MessageSource,
    Result,
};

/// RPC errors that mean this account cannot read the channel at all.
const INACCESSIBLE_RPC: &[&str] = &[
    "CHANNEL_PRIVATE",
    "CHANNEL_INVALID",
    "CHANNEL_PUBLIC_GROUP_NA",
    "CHAT_FORBIDDEN",
    "USERNAME_INVALID",
    "USERNAME_NOT_OCCUPIED",
];

pub struct MtprotoSource {
    client: Client,
    session_file: PathBuf,
    resolved: Mutex<HashMap<Channel, PackedChat>>,
}

impl MtprotoSource {
    /// Connects with an existing session. An unauthorized session is a config
    /// error: the account has to be signed in with `chanfwd-login` first.
    pub async fn connect(creds: &Credentials, session_file: &Path) -> Result<Self> {
        let client = open_client(creds, session_file).await?;
        let authorized = client
            .is_authorized()
            .await
            .map_err(|e| Error::External(format!("mtproto error: {e}")))?;
        if !authorized {
            return Err(Error::Config(format!(
                "session {} is not signed in; run chanfwd-login first",
                session_file.display()
            )));
        }

        info!("MTProto session {} connected", session_file.display());
        Ok(Self {
            client,
            session_file: session_file.to_path_buf(),
            resolved: Mutex::new(HashMap::new()),
        })
    }

    /// Writes the session (auth key, datacenter) back to disk.
    pub fn save_session(&self) -> Result<()> {
        self.client.session().save_to_file(&self.session_file)?;
        Ok(())
    }

    async fn resolve(&self, channel: &Channel) -> Result<PackedChat> {
        if let Some(packed) = self.cached(channel) {
            return Ok(packed);
        }

        let packed = match channel.numeric_id() {
            Some(id) => self.find_dialog(bare_chat_id(id)).await,
            None => self
                .client
                .resolve_username(channel.handle())
                .await
                .map(|chat| chat.map(|c| c.pack())),
        }
        .map_err(|e| map_invocation(channel, e))?
        .ok_or_else(|| Error::inaccessible(channel.as_str(), "no such channel for this account"))?;

        debug!("resolved {channel} to chat {}", packed.id);
        self.resolved
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(channel.clone(), packed);
        Ok(packed)
    }

    fn cached(&self, channel: &Channel) -> Option<PackedChat> {
        self.resolved
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(channel)
            .copied()
    }

    /// Numeric ids carry no access hash; the account's dialog list does.
    async fn find_dialog(
        &self,
        bare_id: i64,
    ) -> std::result::Result<Option<PackedChat>, InvocationError> {
        let mut dialogs = self.client.iter_dialogs();
        while let Some(dialog) = dialogs.next().await? {
            let chat = dialog.chat();
            if chat.id() == bare_id {
                return Ok(Some(chat.pack()));
            }
        }
        Ok(None)
    }

    fn forget(&self, channel: &Channel) {
        self.resolved
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .remove(channel);
    }
}

#[async_trait]
impl MessageSource for MtprotoSource {
    async fn fetch_recent(&self, channel: &Channel, limit: usize) -> Result<Vec<SourceMessage>> {
        let packed = self.resolve(channel).await?;

        let mut iter = self.client.iter_messages(packed).limit(limit);
        let mut posts = Vec::with_capacity(limit);
        loop {
            match iter.next().await {
                Ok(Some(msg)) => posts.push(to_source_message(&msg)),
                Ok(None) => break,
                Err(e) => {
                    let err = map_invocation(channel, e);
                    if matches!(err, Error::ChannelInaccessible { .. }) {
                        // Access may come back later under a new hash.
                        self.forget(channel);
                    }
                    return Err(err);
                }
            }
        }
        Ok(posts)
    }
}

pub async fn open_client(creds: &Credentials, session_file: &Path) -> Result<Client> {
    let session = Session::load_file_or_create(session_file)?;
    Client::connect(Config {
        session,
        api_id: creds.api_id,
        api_hash: creds.api_hash.clone(),
        params: InitParams::default(),
    })
    .await
    .map_err(|e| Error::External(format!("mtproto connect error: {e}")))
}

fn to_source_message(msg: &Message) -> SourceMessage {
    source_message(msg.id(), msg.text(), msg.action().is_some(), msg.date())
}

fn source_message(id: i32, text: &str, is_service: bool, date: DateTime<Utc>) -> SourceMessage {
    SourceMessage {
        id: PostId(i64::from(id)),
        text: (!is_service && !text.is_empty()).then(|| text.to_string()),
        is_service,
        posted_at: Some(date),
    }
}

fn map_invocation(channel: &Channel, e: InvocationError) -> Error {
    match e {
        InvocationError::Rpc(rpc) if is_inaccessible_rpc(&rpc.name) => {
            Error::inaccessible(channel.as_str(), rpc.name)
        }
        other => Error::External(format!("mtproto error: {other}")),
    }
}

fn is_inaccessible_rpc(name: &str) -> bool {
    INACCESSIBLE_RPC.contains(&name)
}

/// Bot API style id (`-100…` channel, `-…` group) to the bare MTProto id.
fn bare_chat_id(id: i64) -> i64 {
    const CHANNEL_OFFSET: i64 = 1_000_000_000_000;
    if id <= -CHANNEL_OFFSET {
        -id - CHANNEL_OFFSET
    } else {
        id.abs()
    }
}
