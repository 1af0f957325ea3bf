//! Tests for the command tree

use super::*;
use std::collections::BTreeSet;

fn set(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_chain_registration_flattens_transitively() {
    let mut tree = CommandTree::new();
    tree.add("a", None);
    tree.add("b", Some("a"));
    tree.add("c", Some("b"));

    assert_eq!(tree.get_parents("c"), set(&["a", "b"]));
    assert_eq!(tree.get_parents("b"), set(&["a"]));
    assert_eq!(tree.get_children("a"), set(&["b", "c"]));
    assert_eq!(tree.get_children("b"), set(&["c"]));
}

#[test]
fn test_removal_to_zero_purges_all_relations() {
    let mut tree = CommandTree::new();
    tree.add("a", None);
    tree.add("b", Some("a"));
    tree.add("c", Some("b"));

    tree.remove("b", Some("a"));

    assert_eq!(tree.registration_count("b"), 0);
    assert_eq!(tree.get_children("a"), set(&[]));
    assert_eq!(tree.get_parents("c"), set(&[]));
    // a and c are still registered, just unrelated now.
    assert_eq!(tree.registration_count("a"), 1);
    assert_eq!(tree.registration_count("c"), 1);
}

#[test]
fn test_multi_path_registration_counts_ancestors_per_path() {
    let mut tree = CommandTree::new();
    tree.add("root", None);
    tree.add("left", Some("root"));
    tree.add("right", Some("root"));
    // Same command registered under two different parents.
    tree.add("leaf", Some("left"));
    tree.add("leaf", Some("right"));

    assert_eq!(tree.registration_count("leaf"), 2);
    assert_eq!(tree.get_parents("leaf"), set(&["left", "right", "root"]));

    // Removing one path must not remove the ancestor relation introduced
    // by the other.
    tree.remove("leaf", Some("left"));
    assert_eq!(tree.registration_count("leaf"), 1);
    assert_eq!(tree.get_parents("leaf"), set(&["right", "root"]));
    assert_eq!(tree.get_children("root"), set(&["left", "right", "leaf"]));

    tree.remove("leaf", Some("right"));
    assert_eq!(tree.registration_count("leaf"), 0);
    assert_eq!(tree.get_parents("leaf"), set(&[]));
    assert_eq!(tree.get_children("root"), set(&["left", "right"]));
}

#[test]
fn test_reregistration_after_removal() {
    let mut tree = CommandTree::new();
    tree.add("a", None);
    tree.add("b", Some("a"));
    tree.remove("b", Some("a"));

    // Dynamic reload: register again under the same parent.
    tree.add("b", Some("a"));
    assert_eq!(tree.registration_count("b"), 1);
    assert_eq!(tree.get_parents("b"), set(&["a"]));
    assert_eq!(tree.get_children("a"), set(&["b"]));
}

#[test]
fn test_remove_unregistered_is_harmless() {
    let mut tree = CommandTree::new();
    tree.add("a", None);
    tree.remove("ghost", None);
    tree.remove("a", None);
    tree.remove("a", None); // count already zero, must not underflow
    assert_eq!(tree.registration_count("a"), 0);
}

#[test]
fn test_root_command_has_no_relations() {
    let mut tree = CommandTree::new();
    tree.add("solo", None);
    assert_eq!(tree.registration_count("solo"), 1);
    assert_eq!(tree.get_parents("solo"), set(&[]));
    assert_eq!(tree.get_children("solo"), set(&[]));
}
