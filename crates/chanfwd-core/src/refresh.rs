//! Periodic reload of the keyword and channel files.

use std::{fs, path::PathBuf, time::Duration};

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::{
    domain::{Channel, Keyword},
    snapshot::Snapshot,
    Result,
};

/// One entry of a newline-delimited watch list.
pub trait ListEntry: Sized + Send + Sync + 'static {
    /// Plural name used in log lines.
    const LABEL: &'static str;

    fn parse_line(line: &str) -> Option<Self>;
}

impl ListEntry for Keyword {
    const LABEL: &'static str = "keywords";

    fn parse_line(line: &str) -> Option<Self> {
        Keyword::parse_line(line)
    }
}

impl ListEntry for Channel {
    const LABEL: &'static str = "channels";

    fn parse_line(line: &str) -> Option<Self> {
        Channel::parse_line(line)
    }
}

pub fn parse_list<T: ListEntry>(contents: &str) -> Vec<T> {
    contents.lines().filter_map(T::parse_line).collect()
}

/// Reloads one list file into a [`Snapshot`] on a fixed interval.
pub struct ListRefresher<T> {
    path: PathBuf,
    interval: Duration,
    target: Snapshot<T>,
}

impl<T: ListEntry> ListRefresher<T> {
    pub fn new(path: impl Into<PathBuf>, interval: Duration, target: Snapshot<T>) -> Self {
        Self {
            path: path.into(),
            interval,
            target,
        }
    }

    /// Read the file and publish it. On failure the previous list stays in place.
    pub fn refresh_once(&self) -> Result<usize> {
        let contents = fs::read_to_string(&self.path)?;
        let items = parse_list::<T>(&contents);
        let n = items.len();
        self.target.replace(items);
        Ok(n)
    }

    /// Reloads the file every `interval` until cancelled. The first reload
    /// happens one interval after start; callers load the list up front.
    pub async fn run(self, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = sleep(self.interval) => {}
            }

            match self.refresh_once() {
                Ok(n) => info!("{} updated ({n} entries)", T::LABEL),
                Err(e) => error!(
                    "Error updating {} from {}: {e}",
                    T::LABEL,
                    self.path.display()
                ),
            }
        }
    }
}
