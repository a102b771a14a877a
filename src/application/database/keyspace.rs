use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;

use super::transaction::Guard;
use super::transaction::RecordFields;
use super::transaction::Transaction;
use super::transaction::WriteOperation;
use super::StorageError;

/// A value held under one key of the [`Keyspace`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum StoredValue {
    Hash(RecordFields),

    /// members in insertion order, without duplicates.
    Set(Vec<String>),

    Counter(i64),

    List(Vec<String>),
}

impl StoredValue {
    fn type_name(&self) -> &'static str {
        match self {
            Self::Hash(_) => "hash",
            Self::Set(_) => "set",
            Self::Counter(_) => "counter",
            Self::List(_) => "list",
        }
    }
}

/// The complete contents of an in-process store.
///
/// `Keyspace` does no locking of its own. The stores wrap it in an
/// [`AtomicRw`](crate::application::locks::tokio::AtomicRw), [`stage`] each
/// [`Transaction`] into a [`ChangeSet`] and [`publish`] that only once every
/// guard and write succeeded.
///
/// [`stage`]: Keyspace::stage
/// [`publish`]: Keyspace::publish
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keyspace {
    entries: BTreeMap<String, StoredValue>,

    /// number of transactions published since the keyspace was created or loaded.
    commit_count: u64,
}

/// The new value of every key one transaction writes. `None` marks a key
/// the transaction removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    changes: BTreeMap<String, Option<StoredValue>>,
}

impl ChangeSet {
    pub fn get(&self, key: &str) -> Option<Option<&StoredValue>> {
        self.changes.get(key).map(Option::as_ref)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&StoredValue>)> {
        self.changes.iter().map(|(k, v)| (k.as_str(), v.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

fn mismatch(key: &str, expected: &'static str, found: &StoredValue) -> StorageError {
    StorageError::TypeMismatch {
        key: key.to_owned(),
        expected,
        found: found.type_name(),
    }
}

impl Keyspace {
    pub(crate) fn from_entries(entries: BTreeMap<String, StoredValue>) -> Self {
        Self {
            entries,
            commit_count: 0,
        }
    }

    pub fn commit_count(&self) -> u64 {
        self.commit_count
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hash_get_all(&self, key: &str) -> Result<Option<RecordFields>, StorageError> {
        match self.entries.get(key) {
            None => Ok(None),
            Some(StoredValue::Hash(fields)) => Ok(Some(fields.clone())),
            Some(other) => Err(mismatch(key, "hash", other)),
        }
    }

    pub fn hash_exists(&self, key: &str, field: &str) -> Result<bool, StorageError> {
        match self.entries.get(key) {
            None => Ok(false),
            Some(StoredValue::Hash(fields)) => Ok(fields.contains_key(field)),
            Some(other) => Err(mismatch(key, "hash", other)),
        }
    }

    pub fn set_members(&self, key: &str) -> Result<Vec<String>, StorageError> {
        match self.entries.get(key) {
            None => Ok(vec![]),
            Some(StoredValue::Set(members)) => Ok(members.clone()),
            Some(other) => Err(mismatch(key, "set", other)),
        }
    }

    pub fn set_contains(&self, key: &str, member: &str) -> Result<bool, StorageError> {
        match self.entries.get(key) {
            None => Ok(false),
            Some(StoredValue::Set(members)) => Ok(members.iter().any(|m| m == member)),
            Some(other) => Err(mismatch(key, "set", other)),
        }
    }

    pub fn counter_get(&self, key: &str) -> Result<i64, StorageError> {
        match self.entries.get(key) {
            None => Ok(0),
            Some(StoredValue::Counter(value)) => Ok(*value),
            Some(other) => Err(mismatch(key, "counter", other)),
        }
    }

    /// Inclusive range read with the usual negative-index convention: `-1` is
    /// the last element. Out-of-range bounds are clamped.
    pub fn list_range(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<String>, StorageError> {
        let list = match self.entries.get(key) {
            None => return Ok(vec![]),
            Some(StoredValue::List(list)) => list,
            Some(other) => return Err(mismatch(key, "list", other)),
        };

        let len = list.len() as isize;
        let resolve = |i: isize| if i < 0 { len + i } else { i };
        let start = resolve(start).max(0);
        let stop = resolve(stop).min(len - 1);
        if len == 0 || start > stop {
            return Ok(vec![]);
        }

        Ok(list[start as usize..=stop as usize].to_vec())
    }

    pub fn check(&self, guard: &Guard) -> Result<(), StorageError> {
        let holds = match guard {
            Guard::SetContains { key, member } => self.set_contains(key, member)?,
            Guard::SetLacks { key, member } => !self.set_contains(key, member)?,
            Guard::SetSize { key, size } => self.set_members(key)?.len() == *size,
            Guard::CounterEquals { key, value } => self.counter_get(key)? == *value,
        };

        if holds {
            Ok(())
        } else {
            Err(StorageError::GuardFailed(guard.clone()))
        }
    }

    pub fn apply(&mut self, op: &WriteOperation) -> Result<(), StorageError> {
        match op {
            WriteOperation::HashSet { key, fields } => {
                let entry = self
                    .entries
                    .entry(key.clone())
                    .or_insert_with(|| StoredValue::Hash(RecordFields::new()));
                match entry {
                    StoredValue::Hash(existing) => {
                        existing.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
                    }
                    other => return Err(mismatch(key, "hash", other)),
                }
            }
            WriteOperation::Delete { key } => {
                self.entries.remove(key);
            }
            WriteOperation::SetAdd { key, member } => {
                let entry = self
                    .entries
                    .entry(key.clone())
                    .or_insert_with(|| StoredValue::Set(vec![]));
                match entry {
                    StoredValue::Set(members) => {
                        if !members.contains(member) {
                            members.push(member.clone());
                        }
                    }
                    other => return Err(mismatch(key, "set", other)),
                }
            }
            WriteOperation::SetRemove { key, member } => match self.entries.get_mut(key) {
                None => {}
                Some(StoredValue::Set(members)) => {
                    members.retain(|m| m != member);
                    if members.is_empty() {
                        self.entries.remove(key);
                    }
                }
                Some(other) => return Err(mismatch(key, "set", other)),
            },
            WriteOperation::IncrBy { key, delta } => {
                let entry = self
                    .entries
                    .entry(key.clone())
                    .or_insert(StoredValue::Counter(0));
                match entry {
                    StoredValue::Counter(value) => *value += delta,
                    other => return Err(mismatch(key, "counter", other)),
                }
            }
            WriteOperation::SetCounter { key, value } => match self.entries.get(key) {
                None | Some(StoredValue::Counter(_)) => {
                    self.entries.insert(key.clone(), StoredValue::Counter(*value));
                }
                Some(other) => return Err(mismatch(key, "counter", other)),
            },
            WriteOperation::ListPush { key, value } => {
                let entry = self
                    .entries
                    .entry(key.clone())
                    .or_insert_with(|| StoredValue::List(vec![]));
                match entry {
                    StoredValue::List(list) => list.push(value.clone()),
                    other => return Err(mismatch(key, "list", other)),
                }
            }
        }
        Ok(())
    }

    /// Computes what `transaction` would write, leaving `self` untouched.
    /// Only the keys the transaction touches are copied. Fails without side
    /// effects if a guard does not hold or a write hits a value of the wrong
    /// type.
    pub fn stage(&self, transaction: &Transaction) -> Result<ChangeSet, StorageError> {
        for guard in transaction.guards() {
            self.check(guard)?;
        }

        let mut touched_keys = BTreeSet::new();
        let mut scratch = Keyspace::default();
        for op in transaction.write_ops() {
            let key = op.key();
            if touched_keys.insert(key.to_owned()) {
                if let Some(value) = self.entries.get(key) {
                    scratch.entries.insert(key.to_owned(), value.clone());
                }
            }
        }

        for op in transaction.write_ops() {
            scratch.apply(op)?;
        }

        let changes = touched_keys
            .into_iter()
            .map(|key| {
                let value = scratch.entries.remove(&key);
                (key, value)
            })
            .collect();
        Ok(ChangeSet { changes })
    }

    pub fn publish(&mut self, change_set: ChangeSet) {
        for (key, value) in change_set.changes {
            match value {
                Some(value) => {
                    self.entries.insert(key, value);
                }
                None => {
                    self.entries.remove(&key);
                }
            }
        }
        self.commit_count += 1;
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn commit(keyspace: &mut Keyspace, tx: &Transaction) -> Result<(), StorageError> {
        let change_set = keyspace.stage(tx)?;
        keyspace.publish(change_set);
        Ok(())
    }

    fn fields(pairs: &[(&str, &str)]) -> RecordFields {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn failed_write_leaves_keyspace_untouched() {
        let mut keyspace = Keyspace::default();
        keyspace
            .apply(&WriteOperation::IncrBy {
                key: "total".into(),
                delta: 3,
            })
            .unwrap();

        let mut tx = Transaction::new();
        tx.op_set_add("ids", "a");
        tx.op_incr_by("total", 1);
        // wrong type: "total" is a counter
        tx.op_set_add("total", "b");

        let before = keyspace.clone();
        assert!(matches!(
            commit(&mut keyspace, &tx),
            Err(StorageError::TypeMismatch { .. })
        ));
        assert_eq!(before, keyspace);
        assert_eq!(keyspace.counter_get("total").unwrap(), 3);
        assert!(keyspace.set_members("ids").unwrap().is_empty());
    }

    #[test]
    fn guards_are_checked_before_writes() {
        let keyspace = Keyspace::default();
        let mut tx = Transaction::new();
        tx.require_member("ids", "missing");
        tx.op_delete("wallet:missing");

        let err = keyspace.stage(&tx).unwrap_err();
        assert!(matches!(err, StorageError::GuardFailed(Guard::SetContains { .. })));
    }

    #[test]
    fn size_and_counter_guards() {
        let mut keyspace = Keyspace::default();
        let mut setup = Transaction::new();
        setup.op_set_add("ids", "a");
        setup.op_incr_by("total", 7);
        commit(&mut keyspace, &setup).unwrap();

        let mut ok = Transaction::new();
        ok.require_set_size("ids", 1);
        ok.require_counter("total", 7);
        ok.op_set_counter("total", 1);
        commit(&mut keyspace, &ok).unwrap();
        assert_eq!(keyspace.counter_get("total").unwrap(), 1);

        let mut stale = Transaction::new();
        stale.require_counter("total", 7);
        stale.op_set_counter("total", 0);
        assert!(matches!(
            commit(&mut keyspace, &stale),
            Err(StorageError::GuardFailed(Guard::CounterEquals { .. }))
        ));
    }

    #[test]
    fn set_keeps_insertion_order_without_duplicates() {
        let mut keyspace = Keyspace::default();
        for member in ["c", "a", "c", "b"] {
            keyspace
                .apply(&WriteOperation::SetAdd {
                    key: "s".into(),
                    member: member.into(),
                })
                .unwrap();
        }
        assert_eq!(keyspace.set_members("s").unwrap(), vec!["c", "a", "b"]);
    }

    #[test]
    fn hash_set_merges_fields() {
        let mut keyspace = Keyspace::default();
        let mut tx = Transaction::new();
        tx.op_hash_set("h", fields(&[("a", "1"), ("b", "2")]));
        tx.op_hash_set("h", fields(&[("b", "3")]));
        commit(&mut keyspace, &tx).unwrap();

        assert_eq!(
            keyspace.hash_get_all("h").unwrap(),
            Some(fields(&[("a", "1"), ("b", "3")]))
        );
        assert!(keyspace.hash_exists("h", "a").unwrap());
        assert!(!keyspace.hash_exists("h", "z").unwrap());
        assert_eq!(keyspace.commit_count(), 1);
    }

    #[test]
    fn list_range_follows_inclusive_negative_index_convention() {
        let mut keyspace = Keyspace::default();
        for v in ["0", "1", "2", "3"] {
            keyspace
                .apply(&WriteOperation::ListPush {
                    key: "l".into(),
                    value: v.into(),
                })
                .unwrap();
        }

        assert_eq!(keyspace.list_range("l", 0, -1).unwrap(), ["0", "1", "2", "3"]);
        assert_eq!(keyspace.list_range("l", -2, -1).unwrap(), ["2", "3"]);
        assert_eq!(keyspace.list_range("l", 1, 100).unwrap(), ["1", "2", "3"]);
        assert!(keyspace.list_range("l", 3, 1).unwrap().is_empty());
        assert!(keyspace.list_range("missing", 0, -1).unwrap().is_empty());
    }

    #[test]
    fn removing_last_set_member_drops_the_key() {
        let mut keyspace = Keyspace::default();
        let mut tx = Transaction::new();
        tx.op_set_add("s", "x");
        tx.op_set_remove("s", "x");
        let change_set = keyspace.stage(&tx).unwrap();
        assert_eq!(Some(None), change_set.get("s"));

        keyspace.publish(change_set);
        assert!(keyspace.is_empty());
    }

    #[test]
    fn change_set_holds_only_touched_keys() {
        let mut keyspace = Keyspace::default();
        let mut setup = Transaction::new();
        setup.op_incr_by("total", 2);
        setup.op_set_add("ids", "a");
        setup.op_list_push("batches", "b1");
        commit(&mut keyspace, &setup).unwrap();

        let mut tx = Transaction::new();
        tx.require_member("ids", "a");
        tx.op_set_remove("ids", "a");
        tx.op_incr_by("total", -1);
        let change_set = keyspace.stage(&tx).unwrap();

        assert_eq!(2, change_set.len());
        assert_eq!(Some(None), change_set.get("ids"));
        assert_eq!(Some(Some(&StoredValue::Counter(1))), change_set.get("total"));
        assert_eq!(None, change_set.get("batches"));

        // staging alone changes nothing
        assert_eq!(2, keyspace.counter_get("total").unwrap());
        assert_eq!(1, keyspace.commit_count());
    }
}
