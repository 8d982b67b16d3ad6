//! Object graphs: long chains, cycles and user-defined objects

use crate::common::*;
use mvstm::prelude::*;

#[derive(Debug, Clone, PartialEq)]
struct Node {
    value: u64,
    next: Option<Handle<Node>>,
}

#[test]
fn test_long_chain_commits_and_reads_back() {
    const N: usize = 100_000;
    let stm = stm();

    let mut txn = stm.start_update_transaction("chain");
    let mut head = None;
    for value in (0..N as u64).rev() {
        let node = Node { value, next: head.take() };
        head = Some(txn.attach_new(Tranlocal::fresh(node)).unwrap());
    }
    let head = head.unwrap();
    let version = txn.commit().unwrap();

    let stats = stm.statistics();
    assert_eq!(stats.writes, N as u64);
    assert_eq!(stats.committed, 1);
    assert_eq!(stm.current_version(), version);

    let mut reader = stm.start_readonly_transaction("walk");
    let mut cursor = Some(head.clone());
    let mut count = 0u64;
    let mut sum = 0u64;
    while let Some(handle) = cursor {
        let node = reader.load(&handle).unwrap();
        assert_eq!(node.value, count);
        sum += node.value;
        count += 1;
        cursor = node.next.clone();
    }
    reader.commit().unwrap();
    drop(reader);

    assert_eq!(count, N as u64);
    assert_eq!(sum, (N as u64 - 1) * N as u64 / 2);

    head.release_chain(|node, pending| pending.extend(node.next));
}

#[test]
fn test_release_chain_after_updates() {
    const N: usize = 100_000;
    let stm = stm();

    let mut txn = stm.start_update_transaction("chain");
    let mut head = None;
    for value in 0..N as u64 {
        let node = Node { value, next: head.take() };
        head = Some(txn.attach_new(Tranlocal::fresh(node)).unwrap());
    }
    let head = head.unwrap();
    txn.commit().unwrap();

    // a few versions of the head, each pointing into the same chain
    for bump in 1..=3 {
        stm.atomic()
            .execute(|txn| txn.modify(&head, |node| node.value += bump))
            .unwrap();
    }
    assert_eq!(head.retained_versions(), 4);

    let mut released = 0usize;
    head.release_chain(|node, pending| {
        released += 1;
        pending.extend(node.next);
    });
    assert_eq!(released, N + 3);
}

#[test]
fn test_cycle_of_handles() {
    let stm = stm();
    let mut txn = stm.start_update_transaction("cycle");
    let a = txn.attach_new(Tranlocal::fresh(Node { value: 1, next: None })).unwrap();
    let b = txn
        .attach_new(Tranlocal::fresh(Node {
            value: 2,
            next: Some(a.clone()),
        }))
        .unwrap();
    txn.modify(&a, |node| node.next = Some(b.clone())).unwrap();
    txn.commit().unwrap();

    let mut reader = stm.start_readonly_transaction("walk");
    let mut cursor = a.clone();
    let mut seen = Vec::new();
    for _ in 0..4 {
        let node = reader.read(&cursor).unwrap();
        seen.push(node.value);
        cursor = node.next.expect("cycle has no end");
    }
    assert_eq!(seen, vec![1, 2, 1, 2]);
    assert!(cursor.same_object(&a));

    // strong cycles are never freed; back-edges that must not keep their
    // target alive use WeakHandle instead
    let weak = a.downgrade();
    drop(cursor);
    drop(a);
    drop(b);
    assert!(weak.upgrade().is_some());
}

#[derive(Debug, Clone, PartialEq)]
struct Parent {
    children: Vec<Handle<Child>>,
}

#[derive(Debug, Clone, PartialEq)]
struct Child {
    name: String,
    parent: WeakHandle<Parent>,
}

#[test]
fn test_weak_back_references() {
    let stm = stm();
    let mut txn = stm.start_update_transaction("tree");
    let parent = txn
        .attach_new(Tranlocal::fresh(Parent { children: vec![] }))
        .unwrap();
    for name in ["left", "right"] {
        let child = txn
            .attach_new(Tranlocal::fresh(Child {
                name: name.to_string(),
                parent: parent.downgrade(),
            }))
            .unwrap();
        txn.modify(&parent, |p| p.children.push(child)).unwrap();
    }
    txn.commit().unwrap();

    let mut reader = stm.start_readonly_transaction("walk");
    let children = reader.read(&parent).unwrap().children;
    assert_eq!(children.len(), 2);
    for child in &children {
        let child = reader.read(child).unwrap();
        let back = child.parent.upgrade().expect("parent alive");
        assert_eq!(back, parent);
    }
    reader.commit().unwrap();

    let weak = parent.downgrade();
    drop(children);
    drop(parent);
    assert!(weak.upgrade().is_none());
}

#[derive(Debug, Clone, PartialEq)]
struct AccountState {
    owner: String,
    balance: i64,
}

struct Account {
    owner: String,
    balance: i64,
}

impl TransactionalObject for Account {
    type State = AccountState;

    fn into_state(self) -> AccountState {
        AccountState {
            owner: self.owner,
            balance: self.balance,
        }
    }

    fn from_state(state: AccountState) -> Self {
        Account {
            owner: state.owner,
            balance: state.balance,
        }
    }
}

#[test]
fn test_transactional_object_round_trip() {
    let stm = stm();
    let mut txn = stm.start_update_transaction("open");
    let handle = txn
        .attach_object(Account {
            owner: "ada".to_string(),
            balance: 10,
        })
        .unwrap();
    txn.commit().unwrap();

    stm.atomic()
        .execute(|txn| txn.modify(&handle, |a| a.balance += 5))
        .unwrap();

    let mut txn = stm.start_readonly_transaction("read");
    let account: Account = txn.materialize(&handle).unwrap();
    assert_eq!(account.owner, "ada");
    assert_eq!(account.balance, 15);
}
