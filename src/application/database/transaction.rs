use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// Named fields stored under one hash key.
pub type RecordFields = std::collections::BTreeMap<String, String>;

/// A condition checked inside the commit, before any write is applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Guard {
    /// `member` must be present in the set at `key`.
    SetContains { key: String, member: String },

    /// `member` must not be present in the set at `key`.
    SetLacks { key: String, member: String },

    /// the set at `key` must have exactly `size` members.
    SetSize { key: String, size: usize },

    /// the counter at `key` must currently read `value`.
    CounterEquals { key: String, value: i64 },
}

impl fmt::Display for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SetContains { key, member } => write!(f, "`{member}` must be in `{key}`"),
            Self::SetLacks { key, member } => write!(f, "`{member}` must not be in `{key}`"),
            Self::SetSize { key, size } => write!(f, "`{key}` must have {size} members"),
            Self::CounterEquals { key, value } => write!(f, "`{key}` must equal {value}"),
        }
    }
}

impl Guard {
    /// The set member this guard is about, for membership guards.
    pub fn member(&self) -> Option<&str> {
        match self {
            Self::SetContains { member, .. } | Self::SetLacks { member, .. } => Some(member),
            Self::SetSize { .. } | Self::CounterEquals { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteOperation {
    /// set (or overwrite) the given fields of the hash at `key`.
    HashSet { key: String, fields: RecordFields },

    /// remove `key` whatever type it holds.
    Delete { key: String },

    SetAdd { key: String, member: String },

    SetRemove { key: String, member: String },

    /// add `delta` (may be negative) to the counter at `key`, starting from 0.
    IncrBy { key: String, delta: i64 },

    SetCounter { key: String, value: i64 },

    ListPush { key: String, value: String },
}

impl WriteOperation {
    /// The one key this operation writes.
    pub fn key(&self) -> &str {
        match self {
            Self::HashSet { key, .. }
            | Self::Delete { key }
            | Self::SetAdd { key, .. }
            | Self::SetRemove { key, .. }
            | Self::IncrBy { key, .. }
            | Self::SetCounter { key, .. }
            | Self::ListPush { key, .. } => key,
        }
    }
}

/// An all-or-nothing unit of work for [`KvStore::commit`](super::KvStore::commit).
///
/// Guards are evaluated first against the current state. If every guard holds,
/// all write operations are applied in order; otherwise none are.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transaction {
    guards: Vec<Guard>,
    write_ops: Vec<WriteOperation>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn require_member(&mut self, key: impl Into<String>, member: impl Into<String>) {
        self.guards.push(Guard::SetContains {
            key: key.into(),
            member: member.into(),
        });
    }

    pub fn require_absent(&mut self, key: impl Into<String>, member: impl Into<String>) {
        self.guards.push(Guard::SetLacks {
            key: key.into(),
            member: member.into(),
        });
    }

    pub fn require_set_size(&mut self, key: impl Into<String>, size: usize) {
        self.guards.push(Guard::SetSize {
            key: key.into(),
            size,
        });
    }

    pub fn require_counter(&mut self, key: impl Into<String>, value: i64) {
        self.guards.push(Guard::CounterEquals {
            key: key.into(),
            value,
        });
    }

    pub fn op_hash_set(&mut self, key: impl Into<String>, fields: RecordFields) {
        self.write_ops.push(WriteOperation::HashSet {
            key: key.into(),
            fields,
        });
    }

    pub fn op_delete(&mut self, key: impl Into<String>) {
        self.write_ops
            .push(WriteOperation::Delete { key: key.into() });
    }

    pub fn op_set_add(&mut self, key: impl Into<String>, member: impl Into<String>) {
        self.write_ops.push(WriteOperation::SetAdd {
            key: key.into(),
            member: member.into(),
        });
    }

    pub fn op_set_remove(&mut self, key: impl Into<String>, member: impl Into<String>) {
        self.write_ops.push(WriteOperation::SetRemove {
            key: key.into(),
            member: member.into(),
        });
    }

    pub fn op_incr_by(&mut self, key: impl Into<String>, delta: i64) {
        self.write_ops.push(WriteOperation::IncrBy {
            key: key.into(),
            delta,
        });
    }

    pub fn op_set_counter(&mut self, key: impl Into<String>, value: i64) {
        self.write_ops.push(WriteOperation::SetCounter {
            key: key.into(),
            value,
        });
    }

    pub fn op_list_push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.write_ops.push(WriteOperation::ListPush {
            key: key.into(),
            value: value.into(),
        });
    }

    pub fn guards(&self) -> &[Guard] {
        &self.guards
    }

    pub fn write_ops(&self) -> &[WriteOperation] {
        &self.write_ops
    }

    pub fn is_empty(&self) -> bool {
        self.guards.is_empty() && self.write_ops.is_empty()
    }
}
