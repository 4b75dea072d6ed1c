//! Account state store.
//!
//! [`StateTrie`] is the narrow interface the ledger consumes: point reads, point
//! writes and a root digest summarizing the whole key space. [`Trie`] is a
//! Patricia trie whose nodes live in the durable store under the Keccak-256 of
//! their encoding. A write stores only the nodes on the changed path, and nodes
//! are never overwritten, so every historical root stays readable.
//!
//! Opening a trie does not touch the store. A root whose nodes are not present
//! locally only surfaces as [`ChainError::MissingState`] when it is first read.

use crate::codec::{self, Value};
use crate::crypto::{keccak256, Hash};
use crate::error::{ChainError, Result};
use crate::persistence::{Database, SharedDatabase};
use std::fmt;

pub trait StateTrie {
    /// Value stored under `key`, `None` if absent.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;
    /// Store `value` under `key`. An empty value removes the key.
    fn update(&mut self, key: &[u8], value: &[u8]) -> Result<()>;
    /// Digest of the current contents; empty for an empty trie.
    fn root(&self) -> Vec<u8>;
}

/// Nibble path of a key, most significant half of each byte first.
fn to_nibbles(key: &[u8]) -> Vec<u8> {
    key.iter().flat_map(|b| [b >> 4, b & 0x0f]).collect()
}

/// Hex-prefix encoding: flag nibble (leaf bit, odd bit) followed by the path.
fn encode_path(path: &[u8], leaf: bool) -> Vec<u8> {
    let odd = path.len() % 2 == 1;
    let flag = (u8::from(leaf) << 1) | u8::from(odd);

    let mut out = Vec::with_capacity(path.len() / 2 + 1);
    let rest = if odd {
        out.push((flag << 4) | path[0]);
        &path[1..]
    } else {
        out.push(flag << 4);
        path
    };
    out.extend(rest.chunks(2).map(|pair| (pair[0] << 4) | pair[1]));
    out
}

fn decode_path(encoded: &[u8]) -> Result<(Vec<u8>, bool)> {
    let (first, rest) = encoded
        .split_first()
        .ok_or_else(|| ChainError::MalformedData("empty trie node path".to_string()))?;
    let flag = first >> 4;
    if flag > 3 {
        return Err(ChainError::MalformedData(format!(
            "invalid trie path flag {}",
            flag
        )));
    }

    let mut path = Vec::with_capacity(rest.len() * 2 + 1);
    if flag & 1 == 1 {
        path.push(first & 0x0f);
    }
    path.extend(to_nibbles(rest));
    Ok((path, flag >= 2))
}

fn to_hash(data: &[u8]) -> Result<Hash> {
    Hash::try_from(data).map_err(|_| {
        ChainError::MalformedData(format!("trie reference of {} bytes", data.len()))
    })
}

fn common_prefix(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    Leaf {
        path: Vec<u8>,
        value: Vec<u8>,
    },
    /// Shared path segment above a branch.
    Extension {
        path: Vec<u8>,
        child: Hash,
    },
    Branch {
        children: Box<[Option<Hash>; 16]>,
        value: Option<Vec<u8>>,
    },
}

impl Node {
    fn encode(&self) -> Vec<u8> {
        let value = match self {
            Node::Leaf { path, value } => Value::List(vec![
                Value::from(encode_path(path, true)),
                Value::from(value.clone()),
            ]),
            Node::Extension { path, child } => Value::List(vec![
                Value::from(encode_path(path, false)),
                Value::from(&child[..]),
            ]),
            Node::Branch { children, value } => {
                let mut items: Vec<Value> = children
                    .iter()
                    .map(|child| Value::from(child.map(|h| h.to_vec()).unwrap_or_default()))
                    .collect();
                items.push(Value::from(value.clone().unwrap_or_default()));
                Value::List(items)
            }
        };
        codec::encode(&value)
    }

    fn decode(data: &[u8]) -> Result<Self> {
        let decoded = codec::decode(data)?;
        let items = decoded.as_list()?;
        match items.len() {
            2 => {
                let (path, leaf) = decode_path(&items[0].as_bytes()?)?;
                let second = items[1].as_bytes()?;
                if leaf {
                    Ok(Node::Leaf {
                        path,
                        value: second,
                    })
                } else {
                    Ok(Node::Extension {
                        path,
                        child: to_hash(&second)?,
                    })
                }
            }
            17 => {
                let mut children = [None; 16];
                for (slot, item) in children.iter_mut().zip(items) {
                    let child = item.as_bytes()?;
                    if !child.is_empty() {
                        *slot = Some(to_hash(&child)?);
                    }
                }
                let value = items[16].as_bytes()?;
                Ok(Node::Branch {
                    children: Box::new(children),
                    value: (!value.is_empty()).then_some(value),
                })
            }
            n => Err(ChainError::MalformedData(format!(
                "trie node has {} items",
                n
            ))),
        }
    }
}

#[derive(Clone)]
pub struct Trie {
    db: SharedDatabase,
    root: Option<Hash>,
}

impl Trie {
    /// Open the state identified by `root`. The empty root is the empty trie.
    ///
    /// Only the shape of `root` is checked here; its nodes are read on demand.
    pub fn new(db: SharedDatabase, root: &[u8]) -> Result<Self> {
        let root = if root.is_empty() {
            None
        } else {
            Some(to_hash(root)?)
        };
        Ok(Trie { db, root })
    }

    pub fn empty(db: SharedDatabase) -> Self {
        Trie { db, root: None }
    }

    pub fn db(&self) -> &SharedDatabase {
        &self.db
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    fn load(&self, hash: &Hash) -> Result<Node> {
        let data = self
            .db
            .get(hash)?
            .ok_or_else(|| ChainError::MissingState(hex::encode(hash)))?;
        Node::decode(&data)
    }

    fn store(&self, node: Node) -> Result<Hash> {
        let encoded = node.encode();
        let hash = keccak256(&encoded);
        self.db.put(&hash, &encoded)?;
        Ok(hash)
    }

    fn lookup(&self, mut path: &[u8]) -> Result<Option<Vec<u8>>> {
        let mut current = match self.root {
            Some(root) => root,
            None => return Ok(None),
        };

        loop {
            match self.load(&current)? {
                Node::Leaf { path: leaf, value } => {
                    return Ok((leaf.as_slice() == path).then_some(value))
                }
                Node::Extension { path: prefix, child } => {
                    if !path.starts_with(&prefix) {
                        return Ok(None);
                    }
                    path = &path[prefix.len()..];
                    current = child;
                }
                Node::Branch { children, value } => match path.split_first() {
                    None => return Ok(value),
                    Some((nibble, rest)) => match children[usize::from(*nibble)] {
                        Some(child) => {
                            path = rest;
                            current = child;
                        }
                        None => return Ok(None),
                    },
                },
            }
        }
    }

    /// Put `prefix` in front of `child`, merging into a leaf or extension child.
    fn join(&self, prefix: &[u8], child: Hash) -> Result<Hash> {
        if prefix.is_empty() {
            return Ok(child);
        }
        match self.load(&child)? {
            Node::Leaf { path, value } => self.store(Node::Leaf {
                path: [prefix, &path[..]].concat(),
                value,
            }),
            Node::Extension { path, child } => self.store(Node::Extension {
                path: [prefix, &path[..]].concat(),
                child,
            }),
            Node::Branch { .. } => self.store(Node::Extension {
                path: prefix.to_vec(),
                child,
            }),
        }
    }

    /// Hang `value` below a branch slot at `rest`, or on the branch itself.
    fn attach(
        &self,
        children: &mut [Option<Hash>; 16],
        branch_value: &mut Option<Vec<u8>>,
        rest: &[u8],
        value: Vec<u8>,
    ) -> Result<()> {
        match rest.split_first() {
            None => *branch_value = Some(value),
            Some((nibble, tail)) => {
                children[usize::from(*nibble)] = Some(self.store(Node::Leaf {
                    path: tail.to_vec(),
                    value,
                })?)
            }
        }
        Ok(())
    }

    fn insert_at(&self, node: Option<Hash>, path: &[u8], value: &[u8]) -> Result<Hash> {
        let hash = match node {
            Some(hash) => hash,
            None => {
                return self.store(Node::Leaf {
                    path: path.to_vec(),
                    value: value.to_vec(),
                })
            }
        };

        match self.load(&hash)? {
            Node::Leaf {
                path: leaf,
                value: existing,
            } => {
                if leaf.as_slice() == path {
                    return self.store(Node::Leaf {
                        path: leaf,
                        value: value.to_vec(),
                    });
                }
                let common = common_prefix(&leaf, path);
                let mut children = [None; 16];
                let mut branch_value = None;
                self.attach(&mut children, &mut branch_value, &leaf[common..], existing)?;
                self.attach(&mut children, &mut branch_value, &path[common..], value.to_vec())?;
                let branch = self.store(Node::Branch {
                    children: Box::new(children),
                    value: branch_value,
                })?;
                self.join(&path[..common], branch)
            }
            Node::Extension {
                path: prefix,
                child,
            } => {
                let common = common_prefix(&prefix, path);
                if common == prefix.len() {
                    let child = self.insert_at(Some(child), &path[common..], value)?;
                    return self.store(Node::Extension {
                        path: prefix,
                        child,
                    });
                }

                let mut children = [None; 16];
                let mut branch_value = None;
                children[usize::from(prefix[common])] =
                    Some(self.join(&prefix[common + 1..], child)?);
                self.attach(&mut children, &mut branch_value, &path[common..], value.to_vec())?;
                let branch = self.store(Node::Branch {
                    children: Box::new(children),
                    value: branch_value,
                })?;
                self.join(&prefix[..common], branch)
            }
            Node::Branch {
                mut children,
                value: branch_value,
            } => match path.split_first() {
                None => self.store(Node::Branch {
                    children,
                    value: Some(value.to_vec()),
                }),
                Some((nibble, rest)) => {
                    let slot = usize::from(*nibble);
                    children[slot] = Some(self.insert_at(children[slot], rest, value)?);
                    self.store(Node::Branch {
                        children,
                        value: branch_value,
                    })
                }
            },
        }
    }

    /// Remove `path` below `hash`; `None` when the subtree ends up empty.
    fn remove_at(&self, hash: Hash, path: &[u8]) -> Result<Option<Hash>> {
        match self.load(&hash)? {
            Node::Leaf { path: leaf, .. } => {
                Ok(if leaf.as_slice() == path { None } else { Some(hash) })
            }
            Node::Extension {
                path: prefix,
                child,
            } => {
                if !path.starts_with(&prefix) {
                    return Ok(Some(hash));
                }
                match self.remove_at(child, &path[prefix.len()..])? {
                    Some(child) => self.join(&prefix, child).map(Some),
                    None => Ok(None),
                }
            }
            Node::Branch {
                mut children,
                value,
            } => {
                let value = match path.split_first() {
                    None => None,
                    Some((nibble, rest)) => {
                        let slot = usize::from(*nibble);
                        match children[slot] {
                            Some(child) => children[slot] = self.remove_at(child, rest)?,
                            None => return Ok(Some(hash)),
                        }
                        value
                    }
                };
                self.collapse(children, value)
            }
        }
    }

    /// Re-store a branch after a removal, folding it away when one entry is left.
    fn collapse(
        &self,
        children: Box<[Option<Hash>; 16]>,
        value: Option<Vec<u8>>,
    ) -> Result<Option<Hash>> {
        let (first, more) = {
            let mut occupied = children
                .iter()
                .enumerate()
                .filter_map(|(nibble, child)| child.map(|hash| (nibble, hash)));
            (occupied.next(), occupied.next().is_some())
        };

        match (first, more, value) {
            (None, _, None) => Ok(None),
            (None, _, Some(value)) => self
                .store(Node::Leaf {
                    path: Vec::new(),
                    value,
                })
                .map(Some),
            (Some((nibble, child)), false, None) => self.join(&[nibble as u8], child).map(Some),
            (_, _, value) => self.store(Node::Branch { children, value }).map(Some),
        }
    }
}

impl StateTrie for Trie {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.lookup(&to_nibbles(key))
    }

    fn update(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        let path = to_nibbles(key);
        self.root = if value.is_empty() {
            match self.root {
                Some(root) => self.remove_at(root, &path)?,
                None => None,
            }
        } else {
            Some(self.insert_at(self.root, &path, value)?)
        };
        Ok(())
    }

    fn root(&self) -> Vec<u8> {
        self.root.map(|root| root.to_vec()).unwrap_or_default()
    }
}

impl fmt::Debug for Trie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trie")
            .field("root", &hex::encode(self.root()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryDatabase;
    use std::sync::Arc;

    #[test]
    fn test_get_update_root() {
        let mut trie = Trie::empty(MemoryDatabase::shared());
        assert!(trie.root().is_empty());
        assert_eq!(trie.get(b"alice").unwrap(), None);

        trie.update(b"alice", b"100").unwrap();
        let root = trie.root();
        assert_eq!(root.len(), 32);
        assert_eq!(trie.get(b"alice").unwrap(), Some(b"100".to_vec()));

        trie.update(b"bob", b"5").unwrap();
        assert_ne!(trie.root(), root);
        assert_eq!(trie.get(b"alice").unwrap(), Some(b"100".to_vec()));
        assert_eq!(trie.get(b"bob").unwrap(), Some(b"5".to_vec()));
        assert_eq!(trie.get(b"carol").unwrap(), None);
    }

    #[test]
    fn test_keys_sharing_prefixes() {
        let mut trie = Trie::empty(MemoryDatabase::shared());
        let keys: [&[u8]; 6] = [b"a", b"ab", b"abc", b"abd", b"b", b""];
        for (i, key) in keys.iter().enumerate() {
            trie.update(key, &[b'0' + i as u8]).unwrap();
        }
        for (i, key) in keys.iter().enumerate() {
            assert_eq!(trie.get(key).unwrap(), Some(vec![b'0' + i as u8]));
        }
        assert_eq!(trie.get(b"abcd").unwrap(), None);
        assert_eq!(trie.get(b"ac").unwrap(), None);
    }

    #[test]
    fn test_root_is_order_independent() {
        let db = MemoryDatabase::shared();
        let mut a = Trie::empty(db.clone());
        let mut b = Trie::empty(db);
        let keys: Vec<Vec<u8>> = (0u8..40).map(|i| keccak256(&[i])[..20].to_vec()).collect();

        for key in &keys {
            a.update(key, b"1").unwrap();
        }
        for key in keys.iter().rev() {
            b.update(key, b"1").unwrap();
        }
        assert_eq!(a.root(), b.root());
    }

    #[test]
    fn test_removal_restores_previous_root() {
        let mut trie = Trie::empty(MemoryDatabase::shared());
        trie.update(b"x", b"1").unwrap();
        trie.update(b"xy", b"2").unwrap();
        let before = trie.root();

        let added: [&[u8]; 4] = [b"xyz", b"w", b"x\x00", b"xya"];
        for key in added {
            trie.update(key, b"3").unwrap();
        }
        for key in [added[3], added[1], added[0], added[2]] {
            trie.update(key, b"").unwrap();
        }
        assert_eq!(trie.root(), before);

        // removing an absent key changes nothing
        trie.update(b"nope", b"").unwrap();
        assert_eq!(trie.root(), before);
    }

    #[test]
    fn test_reopen_historical_root() {
        let db = MemoryDatabase::shared();
        let mut trie = Trie::empty(db.clone());
        trie.update(b"k", b"old").unwrap();
        let old_root = trie.root();
        trie.update(b"k", b"new").unwrap();

        let historical = Trie::new(db.clone(), &old_root).unwrap();
        assert_eq!(historical.get(b"k").unwrap(), Some(b"old".to_vec()));
        let current = Trie::new(db, &trie.root()).unwrap();
        assert_eq!(current.get(b"k").unwrap(), Some(b"new".to_vec()));
    }

    #[test]
    fn test_empty_value_removes_key() {
        let mut trie = Trie::empty(MemoryDatabase::shared());
        trie.update(b"k", b"v").unwrap();
        trie.update(b"k", b"").unwrap();
        assert_eq!(trie.get(b"k").unwrap(), None);
        assert!(trie.root().is_empty());
        assert!(trie.is_empty());
    }

    #[test]
    fn test_unknown_root_fails_on_first_read() {
        let trie = Trie::new(MemoryDatabase::shared(), &[7u8; 32]).unwrap();
        assert_eq!(trie.root(), vec![7u8; 32]);
        assert!(matches!(trie.get(b"k"), Err(ChainError::MissingState(_))));

        assert!(matches!(
            Trie::new(MemoryDatabase::shared(), &[7u8; 31]),
            Err(ChainError::MalformedData(_))
        ));
    }

    #[test]
    fn test_write_stores_only_changed_path() {
        let db = Arc::new(MemoryDatabase::new());
        let mut trie = Trie::empty(db.clone());
        for i in 0u16..300 {
            trie.update(&keccak256(&i.to_be_bytes())[..20], b"account").unwrap();
        }

        let before = db.len();
        trie.update(&keccak256(b"one more")[..20], b"account").unwrap();
        let written = db.len() - before;
        assert!(written >= 1);
        assert!(written <= 10, "one write stored {} nodes", written);
    }
}
