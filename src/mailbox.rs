//! File-backed inbound mailbox for agent messages.
//!
//! Layout under the mailbox directory:
//! - incoming/  : posted, not yet claimed
//! - processing/: claimed by a listener, awaiting acknowledgement
//!
//! Every message is its own JSON file. Posting writes a hidden temp file and
//! renames it into `incoming/`, so readers never see partial writes. Claiming
//! renames into `processing/`; only one claimer can win a rename, and a
//! message is removed only when it is acknowledged.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const MAILBOX_INCOMING: &str = "incoming";
pub const MAILBOX_PROCESSING: &str = "processing";

/// A message relayed from the agent runtime.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InboundMessage {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
}

impl InboundMessage {
    pub fn new(content: impl Into<String>, agent_id: Option<String>) -> Self {
        Self {
            content: content.into(),
            agent_id,
        }
    }
}

/// Mailbox file wrapper.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct InboxEntry {
    /// Unique ID (ULID)
    pub id: String,

    /// Unix timestamp in milliseconds
    pub received_at: i64,

    pub message: InboundMessage,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct MailboxStats {
    pub incoming: usize,
    pub processing: usize,
}

impl std::fmt::Display for MailboxStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Mailbox:")?;
        writeln!(f, "  Incoming:   {}", self.incoming)?;
        write!(f, "  Processing: {}", self.processing)
    }
}

#[derive(Debug, Clone)]
pub struct Mailbox {
    root: PathBuf,
}

impl Mailbox {
    /// Open a mailbox, creating its directories.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let mailbox = Self {
            root: root.as_ref().to_path_buf(),
        };
        for dir in [mailbox.incoming_dir(), mailbox.processing_dir()] {
            if !dir.exists() {
                fs::create_dir_all(&dir)?;
                tracing::debug!("Created mailbox directory: {}", dir.display());
            }
        }
        Ok(mailbox)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn incoming_dir(&self) -> PathBuf {
        self.root.join(MAILBOX_INCOMING)
    }

    pub fn processing_dir(&self) -> PathBuf {
        self.root.join(MAILBOX_PROCESSING)
    }

    /// Post a message. Returns its id.
    pub fn post(&self, message: InboundMessage) -> Result<String> {
        let id = next_id()?;
        let entry = InboxEntry {
            id: id.to_string(),
            received_at: id.timestamp_ms() as i64,
            message,
        };

        let incoming = self.incoming_dir();
        let tmp = incoming.join(format!(".{}.tmp", entry.id));
        let dst = incoming.join(format!("{}.json", entry.id));
        fs::write(&tmp, serde_json::to_vec(&entry)?)?;
        fs::rename(&tmp, &dst)?;

        tracing::debug!("Posted message {} to mailbox", entry.id);
        Ok(entry.id)
    }

    /// Claim every incoming message, oldest first.
    ///
    /// Claimed messages stay in `processing/` until [`Mailbox::ack`].
    /// Unreadable files are moved aside with a `.bad` extension.
    pub fn claim(&self) -> Result<Vec<InboxEntry>> {
        let processing = self.processing_dir();
        let mut claimed = Vec::new();

        for path in list_json(&self.incoming_dir())? {
            let Some(name) = path.file_name() else {
                continue;
            };
            let dst = processing.join(name);
            if let Err(e) = fs::rename(&path, &dst) {
                // Another listener got it first.
                tracing::debug!("Skipping {}: {}", path.display(), e);
                continue;
            }

            match read_entry(&dst) {
                Ok(entry) => claimed.push(entry),
                Err(e) => {
                    tracing::warn!("Discarding unreadable mailbox file {}: {}", dst.display(), e);
                    set_aside(&dst);
                }
            }
        }

        claimed.sort_by(|a, b| {
            a.received_at
                .cmp(&b.received_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(claimed)
    }

    /// Acknowledge a processed message, removing it.
    pub fn ack(&self, id: &str) -> Result<()> {
        let path = self.processing_dir().join(format!("{}.json", id));
        if !path.exists() {
            return Err(Error::Mailbox(format!("Message {} is not being processed", id)));
        }
        fs::remove_file(&path)?;
        tracing::debug!("Acknowledged message {}", id);
        Ok(())
    }

    /// Move unacknowledged messages back to incoming (run on startup).
    pub fn recover_orphaned(&self) -> Result<usize> {
        let incoming = self.incoming_dir();
        let mut recovered = 0;

        for path in list_json(&self.processing_dir())? {
            let Some(name) = path.file_name() else {
                continue;
            };
            if fs::rename(&path, incoming.join(name)).is_ok() {
                tracing::info!("Recovered orphaned message: {}", path.display());
                recovered += 1;
            }
        }

        Ok(recovered)
    }

    pub fn stats(&self) -> Result<MailboxStats> {
        Ok(MailboxStats {
            incoming: list_json(&self.incoming_dir())?.len(),
            processing: list_json(&self.processing_dir())?.len(),
        })
    }
}

/// Monotonic ULIDs keep posts from one process in order within a millisecond.
fn next_id() -> Result<ulid::Ulid> {
    static GENERATOR: OnceLock<Mutex<ulid::Generator>> = OnceLock::new();
    let mut generator = GENERATOR
        .get_or_init(|| Mutex::new(ulid::Generator::new()))
        .lock()
        .map_err(|_| Error::Mailbox("id generator poisoned".to_string()))?;
    generator
        .generate()
        .map_err(|e| Error::Mailbox(e.to_string()))
}

/// Rename an unreadable claim to `.bad`, deleting it if that fails, so
/// `recover_orphaned` never returns it to `incoming/`.
fn set_aside(path: &Path) {
    let bad = path.with_extension("bad");
    if let Err(e) = fs::rename(path, &bad) {
        tracing::warn!("Failed to move {} aside: {}, removing it", path.display(), e);
        if let Err(e) = fs::remove_file(path) {
            tracing::error!("Failed to remove {}: {}", path.display(), e);
        }
    }
}

fn read_entry(path: &Path) -> Result<InboxEntry> {
    let content = fs::read(path)?;
    Ok(serde_json::from_slice(&content)?)
}

fn list_json(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().map_or(false, |ext| ext == "json") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
