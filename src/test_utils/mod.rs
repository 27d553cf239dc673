//! Deterministic in-memory coordination service for tests.
//!
//! [`MemoryEnsemble`] implements the [`Connector`]/[`Transport`] boundary
//! over a single shared node tree: sessions with ephemeral-node reclamation
//! on close, per-parent sequence counters for sequential creates, chroot
//! roots, and one-shot watches with exists/data scopes. Operations complete
//! their outcome slots synchronously under the tree lock, so test
//! interleavings are reproducible.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::Mutex;

use crate::config::SessionSettings;
use crate::constants::SEQUENCE_WIDTH;
use crate::errors::{ConnectivityError, Result};
use crate::future::{outcome_pair, ResultFuture, WatchSlot};
use crate::paths;
use crate::reply::{NodeKind, NodeStat, Outcome, ReplyCode, Version, WatchEvent, WatchEventKind};
use crate::transport::{Connector, Transport};

#[derive(Clone, Default)]
pub struct MemoryEnsemble {
    core: Arc<EnsembleCore>,
}

struct EnsembleCore {
    /// Full-path keyed node tree. The namespace root lives under `""`.
    tree: Mutex<BTreeMap<String, NodeRecord>>,
    watches: DashMap<String, Vec<WatchEntry>>,
    next_session: AtomicU64,
    refuse: AtomicBool,
}

impl Default for EnsembleCore {
    fn default() -> Self {
        let mut tree = BTreeMap::new();
        tree.insert(String::new(), NodeRecord::default());
        Self {
            tree: Mutex::new(tree),
            watches: DashMap::new(),
            next_session: AtomicU64::new(0),
            refuse: AtomicBool::new(false),
        }
    }
}

#[derive(Default)]
struct NodeRecord {
    data: Bytes,
    version: u32,
    ephemeral_owner: Option<u64>,
    next_sequence: u64,
}

impl NodeRecord {
    fn stat(&self) -> NodeStat {
        NodeStat {
            version: self.version,
            data_length: self.data.len(),
            ephemeral_owner: self.ephemeral_owner,
        }
    }
}

#[derive(PartialEq, Eq)]
enum WatchScope {
    Existence,
    Data,
}

struct WatchEntry {
    scope: WatchScope,
    /// Path as the arming session expressed it, echoed back in the event.
    rel_path: String,
    slot: WatchSlot,
}

impl MemoryEnsemble {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-create a persistent chain of nodes, firing creation watches the
    /// same way a session-driven create would. Used for chroots and for
    /// simulating external actors.
    pub fn install(&self, path: &str) {
        let mut acc = String::new();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            acc.push('/');
            acc.push_str(segment);
            let _ = self
                .core
                .create_node(&acc, Bytes::new(), NodeKind::Persistent, None);
        }
    }

    /// Raw payload at an absolute (chroot-included) path.
    pub fn read(&self, path: &str) -> Option<Bytes> {
        self.core.tree.lock().get(path).map(|r| r.data.clone())
    }

    pub fn node_exists(&self, path: &str) -> bool {
        self.core.tree.lock().contains_key(path)
    }

    /// Number of nodes, namespace root excluded.
    pub fn node_count(&self) -> usize {
        self.core.tree.lock().len() - 1
    }

    pub fn refuse_connections(&self, refuse: bool) {
        self.core.refuse.store(refuse, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connector for MemoryEnsemble {
    async fn open(&self, root: &str, _settings: &SessionSettings) -> Result<Arc<dyn Transport>> {
        if self.core.refuse.load(Ordering::SeqCst) {
            return Err(
                ConnectivityError::Unreachable("ensemble refusing connections".to_string()).into(),
            );
        }
        let id = self.core.next_session.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Arc::new(MemorySession {
            core: self.core.clone(),
            chroot: root.trim_end_matches('/').to_string(),
            id,
            alive: AtomicBool::new(true),
        }))
    }
}

impl EnsembleCore {
    fn create_node(
        &self,
        full: &str,
        data: Bytes,
        kind: NodeKind,
        owner: Option<u64>,
    ) -> Outcome<String> {
        let mut tree = self.tree.lock();
        if !kind.is_sequential() && tree.contains_key(full) {
            return Outcome::code(ReplyCode::AlreadyExists);
        }
        let parent = paths::parent_of(full);
        if !tree.contains_key(parent) {
            return Outcome::code(ReplyCode::NoParent);
        }
        let real = if kind.is_sequential() {
            let parent_rec = tree.get_mut(parent).expect("parent checked above");
            let seq = parent_rec.next_sequence;
            parent_rec.next_sequence += 1;
            format!("{full}{seq:0width$}", width = SEQUENCE_WIDTH)
        } else {
            full.to_string()
        };
        tree.insert(
            real.clone(),
            NodeRecord {
                data,
                version: 0,
                ephemeral_owner: owner.filter(|_| kind.is_ephemeral()),
                next_sequence: 0,
            },
        );
        drop(tree);
        self.fire(&real, WatchEventKind::Created);
        Outcome::ok(real)
    }

    fn delete_node(&self, full: &str, version: Version) -> Outcome<()> {
        let mut tree = self.tree.lock();
        let Some(record) = tree.get(full) else {
            return Outcome::code(ReplyCode::NoNode);
        };
        if !version.admits(record.version) {
            return Outcome::code(ReplyCode::BadVersion);
        }
        tree.remove(full);
        drop(tree);
        self.fire(full, WatchEventKind::Deleted);
        Outcome::ok(())
    }

    fn update_node(&self, full: &str, data: Bytes, version: Version) -> Outcome<()> {
        let mut tree = self.tree.lock();
        let Some(record) = tree.get_mut(full) else {
            return Outcome::code(ReplyCode::NoNode);
        };
        if !version.admits(record.version) {
            return Outcome::code(ReplyCode::BadVersion);
        }
        record.version += 1;
        record.data = data;
        let stat = record.stat();
        drop(tree);
        self.fire(full, WatchEventKind::DataChanged);
        Outcome::ok_with_stat((), stat)
    }

    /// Consume the one-shot watches matching this event; others stay armed.
    fn fire(&self, full: &str, kind: WatchEventKind) {
        let Some((_, entries)) = self.watches.remove(full) else {
            return;
        };
        let mut keep = Vec::new();
        for entry in entries {
            let fires = match entry.scope {
                WatchScope::Existence => true,
                WatchScope::Data => {
                    matches!(kind, WatchEventKind::Deleted | WatchEventKind::DataChanged)
                }
            };
            if fires {
                entry.slot.complete(Outcome::ok(WatchEvent {
                    path: entry.rel_path.clone(),
                    kind,
                }));
            } else {
                keep.push(entry);
            }
        }
        if !keep.is_empty() {
            self.watches.insert(full.to_string(), keep);
        }
    }
}

struct MemorySession {
    core: Arc<EnsembleCore>,
    chroot: String,
    id: u64,
    alive: AtomicBool,
}

impl MemorySession {
    fn full(&self, rel: &str) -> String {
        if rel == "/" {
            self.chroot.clone()
        } else {
            format!("{}{}", self.chroot, rel)
        }
    }

    fn rel(&self, full: &str) -> String {
        full.strip_prefix(self.chroot.as_str())
            .unwrap_or(full)
            .to_string()
    }

    fn dead(&self) -> bool {
        !self.alive.load(Ordering::SeqCst)
    }
}

impl Transport for MemorySession {
    fn create(&self, path: &str, data: Bytes, kind: NodeKind) -> ResultFuture<String> {
        let (slot, fut) = outcome_pair();
        if self.dead() {
            slot.complete(Outcome::code(ReplyCode::ConnectionLoss));
            return fut;
        }
        let full = self.full(path);
        let out = self.core.create_node(&full, data, kind, Some(self.id));
        let out = match out.value {
            Some(real) => Outcome::ok(self.rel(&real)),
            None => Outcome::code(out.code),
        };
        slot.complete(out);
        fut
    }

    fn exists(&self, path: &str, watch: Option<WatchSlot>) -> ResultFuture<()> {
        let (slot, fut) = outcome_pair();
        if self.dead() {
            slot.complete(Outcome::code(ReplyCode::ConnectionLoss));
            return fut;
        }
        let full = self.full(path);
        let tree = self.core.tree.lock();
        let present = tree.get(&full).map(NodeRecord::stat);
        // Armed under the tree lock: the check and the registration are one
        // atomic step, a change cannot slip between them.
        if let Some(wslot) = watch {
            self.core.watches.entry(full).or_default().push(WatchEntry {
                scope: WatchScope::Existence,
                rel_path: path.to_string(),
                slot: wslot,
            });
        }
        drop(tree);
        match present {
            Some(stat) => slot.complete(Outcome::ok_with_stat((), stat)),
            None => slot.complete(Outcome::code(ReplyCode::NoNode)),
        }
        fut
    }

    fn get_data(&self, path: &str, watch: Option<WatchSlot>) -> ResultFuture<Bytes> {
        let (slot, fut) = outcome_pair();
        if self.dead() {
            slot.complete(Outcome::code(ReplyCode::ConnectionLoss));
            return fut;
        }
        let full = self.full(path);
        let tree = self.core.tree.lock();
        match tree.get(&full) {
            Some(record) => {
                let stat = record.stat();
                let data = record.data.clone();
                if let Some(wslot) = watch {
                    self.core.watches.entry(full).or_default().push(WatchEntry {
                        scope: WatchScope::Data,
                        rel_path: path.to_string(),
                        slot: wslot,
                    });
                }
                drop(tree);
                slot.complete(Outcome::ok_with_stat(data, stat));
            }
            None => {
                // No node, no watch armed; the supplied slot is dropped.
                drop(tree);
                slot.complete(Outcome::code(ReplyCode::NoNode));
            }
        }
        fut
    }

    fn set_data(&self, path: &str, data: Bytes, version: Version) -> ResultFuture<()> {
        let (slot, fut) = outcome_pair();
        if self.dead() {
            slot.complete(Outcome::code(ReplyCode::ConnectionLoss));
            return fut;
        }
        let full = self.full(path);
        slot.complete(self.core.update_node(&full, data, version));
        fut
    }

    fn get_children(&self, path: &str) -> ResultFuture<Vec<String>> {
        let (slot, fut) = outcome_pair();
        if self.dead() {
            slot.complete(Outcome::code(ReplyCode::ConnectionLoss));
            return fut;
        }
        let full = self.full(path);
        let tree = self.core.tree.lock();
        if !tree.contains_key(&full) {
            drop(tree);
            slot.complete(Outcome::code(ReplyCode::NoNode));
            return fut;
        }
        let children = tree
            .keys()
            .filter(|k| paths::parent_of(k) == full)
            .map(|k| paths::leaf_of(k).to_string())
            .collect();
        drop(tree);
        slot.complete(Outcome::ok(children));
        fut
    }

    fn delete(&self, path: &str, version: Version) -> ResultFuture<()> {
        let (slot, fut) = outcome_pair();
        if self.dead() {
            slot.complete(Outcome::code(ReplyCode::ConnectionLoss));
            return fut;
        }
        let full = self.full(path);
        slot.complete(self.core.delete_node(&full, version));
        fut
    }

    fn is_alive(&self) -> bool {
        !self.dead()
    }

    fn close(&self) {
        if self.alive.swap(false, Ordering::SeqCst) {
            // The service reclaims this session's ephemeral nodes, firing
            // deletion watches for each.
            let owned: Vec<String> = self
                .core
                .tree
                .lock()
                .iter()
                .filter(|(_, r)| r.ephemeral_owner == Some(self.id))
                .map(|(k, _)| k.clone())
                .collect();
            for path in owned {
                let _ = self.core.delete_node(&path, Version::Any);
            }
        }
    }
}
