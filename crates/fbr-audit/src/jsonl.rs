use anyhow::{Context, Result};
use async_trait::async_trait;
use fbr_schemas::DistributionLogEntry;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::warn;

use crate::sink::LogSink;

/// One line of the JSONL log: the entry plus its position in the chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub seq: u64,
    pub entry: DistributionLogEntry,
    pub hash_prev: Option<String>,
    pub hash_self: Option<String>,
}

#[derive(Debug)]
struct ChainState {
    last_hash: Option<String>,
    seq: u64,
}

/// Append-only JSONL sink. Optional hash chain: each record carries
/// `hash_prev` + `hash_self`.
///
/// Opening an existing file resumes the chain from its last line, so a
/// restarted process keeps extending the same chain.
#[derive(Debug)]
pub struct JsonlLogSink {
    path: PathBuf,
    hash_chain: bool,
    state: Mutex<ChainState>,
}

impl JsonlLogSink {
    /// Open (or create) the log and ensure parent dirs exist.
    pub fn open(path: impl AsRef<Path>, hash_chain: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("create_dir_all {:?}", parent))?;
            }
        }

        let state = resume_state(&path)?;

        Ok(Self {
            path,
            hash_chain,
            state: Mutex::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of records written so far, including ones found on open.
    pub async fn seq(&self) -> u64 {
        self.state.lock().await.seq
    }

    pub async fn last_hash(&self) -> Option<String> {
        self.state.lock().await.last_hash.clone()
    }
}

#[async_trait]
impl LogSink for JsonlLogSink {
    async fn append(&self, entry: &DistributionLogEntry) -> Result<()> {
        let mut st = self.state.lock().await;

        let mut rec = AuditRecord {
            seq: st.seq,
            entry: entry.clone(),
            hash_prev: None,
            hash_self: None,
        };

        if self.hash_chain {
            rec.hash_prev = st.last_hash.clone();
            rec.hash_self = Some(compute_record_hash(&rec)?);
        }

        let line = canonical_json_line(&rec)?;
        append_line(&self.path, &line)?;

        // Only advance the chain once the line is on disk.
        st.seq += 1;
        if self.hash_chain {
            st.last_hash = rec.hash_self;
        }
        Ok(())
    }
}

impl ChainState {
    fn empty() -> Self {
        Self {
            last_hash: None,
            seq: 0,
        }
    }

    fn after(rec: &AuditRecord) -> Self {
        Self {
            last_hash: rec.hash_self.clone(),
            seq: rec.seq + 1,
        }
    }
}

/// Resume from the last complete record.
///
/// A crash mid-append can leave an unparseable final line; it is cut off and
/// the chain continues from the record before it. A complete final record
/// missing its newline gets one, so the next append starts a fresh line.
/// Damage anywhere other than the final line is an error.
fn resume_state(path: &Path) -> Result<ChainState> {
    if !path.exists() {
        return Ok(ChainState::empty());
    }

    let bytes = fs::read(path).with_context(|| format!("read audit log {:?}", path))?;

    let mut lines: Vec<(usize, &[u8])> = Vec::new();
    let mut offset = 0usize;
    for raw in bytes.split_inclusive(|b| *b == b'\n') {
        if !raw.iter().all(u8::is_ascii_whitespace) {
            lines.push((offset, raw));
        }
        offset += raw.len();
    }

    let Some(&(start, last)) = lines.last() else {
        return Ok(ChainState::empty());
    };

    match serde_json::from_slice::<AuditRecord>(last) {
        Ok(rec) => {
            if !last.ends_with(b"\n") {
                append_bytes(path, b"\n")?;
            }
            Ok(ChainState::after(&rec))
        }
        Err(e) => {
            warn!(path = %path.display(), offset = start, error = %e, "torn audit log tail; truncating");
            OpenOptions::new()
                .write(true)
                .open(path)
                .and_then(|f| f.set_len(start as u64))
                .with_context(|| format!("truncate torn tail of audit log {:?}", path))?;

            match lines.len().checked_sub(2).map(|i| lines[i]) {
                None => Ok(ChainState::empty()),
                Some((_, prev)) => {
                    let rec: AuditRecord = serde_json::from_slice(prev)
                        .with_context(|| format!("parse last audit record in {:?}", path))?;
                    Ok(ChainState::after(&rec))
                }
            }
        }
    }
}

/// Write a single line to file (with trailing newline) in one write call.
fn append_line(path: &Path, line: &str) -> Result<()> {
    let mut buf = Vec::with_capacity(line.len() + 1);
    buf.extend_from_slice(line.as_bytes());
    buf.push(b'\n');
    append_bytes(path, &buf)
}

fn append_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut f = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open audit log {:?}", path))?;
    f.write_all(bytes).context("write audit line failed")?;
    Ok(())
}

/// Canonicalize by sorting keys recursively and emitting compact JSON.
fn canonical_json_line<T: Serialize>(v: &T) -> Result<String> {
    let raw = serde_json::to_value(v).context("serialize audit record failed")?;
    serde_json::to_string(&sort_keys(&raw)).context("json stringify failed")
}

fn sort_keys(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut keys: Vec<_> = map.keys().cloned().collect();
            keys.sort();
            let mut new = serde_json::Map::new();
            for k in keys {
                new.insert(k.clone(), sort_keys(&map[&k]));
            }
            Value::Object(new)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_keys).collect()),
        _ => v.clone(),
    }
}

/// Hash over the canonical JSON of the record WITHOUT `hash_self`.
pub fn compute_record_hash(rec: &AuditRecord) -> Result<String> {
    let mut clone = rec.clone();
    clone.hash_self = None;

    let canonical = canonical_json_line(&clone)?;
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyResult {
    Valid { lines: usize },
    Broken { line: usize, reason: String },
}

pub fn verify_hash_chain(path: impl AsRef<Path>) -> Result<VerifyResult> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("read audit log {:?}", path.as_ref()))?;
    verify_hash_chain_str(&content)
}

/// Same as [`verify_hash_chain`] over in-memory JSONL content.
///
/// Once any record carries `hash_self`, every later record must too;
/// a record linked by `hash_prev` without its own hash is also broken.
pub fn verify_hash_chain_str(content: &str) -> Result<VerifyResult> {
    let mut prev_hash: Option<String> = None;
    let mut expected_seq: Option<u64> = None;
    let mut chained = false;
    let mut line_count = 0usize;

    for (i, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let rec: AuditRecord = serde_json::from_str(trimmed)
            .with_context(|| format!("parse audit record at line {}", i + 1))?;
        line_count += 1;

        if let Some(want) = expected_seq {
            if rec.seq != want {
                return Ok(VerifyResult::Broken {
                    line: i + 1,
                    reason: format!("seq gap: expected {want}, got {}", rec.seq),
                });
            }
        }
        expected_seq = Some(rec.seq + 1);

        if rec.hash_prev != prev_hash {
            return Ok(VerifyResult::Broken {
                line: i + 1,
                reason: format!(
                    "hash_prev mismatch: expected {:?}, got {:?}",
                    prev_hash, rec.hash_prev
                ),
            });
        }

        match rec.hash_self {
            Some(ref claimed) => {
                let recomputed = compute_record_hash(&rec)?;
                if *claimed != recomputed {
                    return Ok(VerifyResult::Broken {
                        line: i + 1,
                        reason: format!("hash_self mismatch: claimed {claimed}, recomputed {recomputed}"),
                    });
                }
                chained = true;
            }
            None if chained || rec.hash_prev.is_some() => {
                return Ok(VerifyResult::Broken {
                    line: i + 1,
                    reason: "missing hash_self in a hash-chained log".to_string(),
                });
            }
            None => {}
        }

        prev_hash = rec.hash_self.clone();
    }

    Ok(VerifyResult::Valid { lines: line_count })
}
