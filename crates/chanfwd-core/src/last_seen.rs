//! Per-channel persistence of the highest forwarded post id.
//!
//! One file per channel, `<channel>_last_message_id.json`, holding the id as a
//! JSON string.

use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{
    domain::{Channel, PostId},
    errors::Error,
    Result,
};

#[derive(Clone, Debug)]
pub struct LastSeenStore {
    dir: PathBuf,
}

impl LastSeenStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, channel: &Channel) -> PathBuf {
        let safe: String = channel
            .as_str()
            .chars()
            .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
            .collect();
        self.dir.join(format!("{safe}_last_message_id.json"))
    }

    /// Last forwarded id, or `PostId(0)` when nothing was forwarded yet.
    pub fn load(&self, channel: &Channel) -> Result<PostId> {
        let path = self.path_for(channel);
        if !path.exists() {
            return Ok(PostId(0));
        }
        let txt = fs::read_to_string(&path)?;
        if txt.trim().is_empty() {
            return Ok(PostId(0));
        }
        parse_record(&txt, &path)
    }

    /// Overwrite the stored id. Written to a temp file first, then renamed.
    pub fn save(&self, channel: &Channel, id: PostId) -> Result<()> {
        let path = self.path_for(channel);
        let tmp = path.with_extension("json.tmp");
        let txt = serde_json::to_string(&id.0.to_string())?;
        fs::write(&tmp, txt)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

fn parse_record(txt: &str, path: &Path) -> Result<PostId> {
    let v: serde_json::Value = serde_json::from_str(txt)?;
    let id = match &v {
        serde_json::Value::String(s) => s.trim().parse::<i64>().ok(),
        serde_json::Value::Number(n) => n.as_i64(),
        _ => None,
    };
    id.map(PostId).ok_or_else(|| {
        Error::Config(format!("{} does not hold a message id: {v}", path.display()))
    })
}
