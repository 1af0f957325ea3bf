//! Parent/child relationships between registered commands, tracked both
//! directly and as a reference-counted transitive closure so ancestor and
//! descendant queries are O(1) after registration.
//!
//! Relations are counted edges keyed by command name, not object
//! references: the same command registered under two parents counts its
//! shared ancestors twice, and removing one registration path leaves the
//! relations introduced by the other intact.

use std::collections::{BTreeSet, HashMap};
use tracing::{debug, warn};

const LOG_TARGET: &str = "melobot::commands::tree";

#[derive(Debug, Default)]
struct DirectRelations {
    children: HashMap<String, usize>,
    parents: HashMap<String, usize>,
}

#[derive(Debug, Default)]
struct FlatRelations {
    descendants: HashMap<String, usize>,
    ancestors: HashMap<String, usize>,
}

/// Decrements a counted edge, dropping the key once it reaches zero.
fn dec_edge(map: &mut HashMap<String, usize>, key: &str, by: usize) {
    if let Some(count) = map.get_mut(key) {
        *count = count.saturating_sub(by);
        if *count == 0 {
            map.remove(key);
        }
    }
}

fn inc_edge(map: &mut HashMap<String, usize>, key: &str, by: usize) {
    *map.entry(key.to_string()).or_insert(0) += by;
}

#[derive(Debug, Default)]
pub struct CommandTree {
    counts: HashMap<String, usize>,
    tree: HashMap<String, DirectRelations>,
    flat: HashMap<String, FlatRelations>,
}

impl CommandTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Times `command` has been registered (dynamic reloading can register
    /// the same command repeatedly).
    pub fn registration_count(&self, command: &str) -> usize {
        self.counts.get(command).copied().unwrap_or(0)
    }

    /// Registers `command`, optionally as a child of `parent`. The new
    /// relationship is fanned out through the parent's existing flattened
    /// ancestor set so the closure stays consistent under multi-path
    /// registration.
    pub fn add(&mut self, command: &str, parent: Option<&str>) {
        *self.counts.entry(command.to_string()).or_insert(0) += 1;
        self.tree.entry(command.to_string()).or_default();
        self.flat.entry(command.to_string()).or_default();

        let parent = match parent {
            Some(parent) => parent,
            None => return,
        };
        debug!(target: LOG_TARGET, "Registering '{}' under parent '{}'.", command, parent);

        inc_edge(
            &mut self.tree.entry(parent.to_string()).or_default().children,
            command,
            1,
        );
        inc_edge(
            &mut self
                .tree
                .get_mut(command)
                .expect("entry created above")
                .parents,
            parent,
            1,
        );

        // Fan out: the command gains the parent itself plus every ancestor
        // the parent already has, with the parent's edge counts.
        let mut gained: Vec<(String, usize)> = vec![(parent.to_string(), 1)];
        if let Some(parent_flat) = self.flat.get(parent) {
            for (ancestor, count) in &parent_flat.ancestors {
                gained.push((ancestor.clone(), *count));
            }
        }
        for (ancestor, count) in gained {
            inc_edge(
                &mut self
                    .flat
                    .get_mut(command)
                    .expect("entry created above")
                    .ancestors,
                &ancestor,
                count,
            );
            inc_edge(
                &mut self.flat.entry(ancestor.clone()).or_default().descendants,
                command,
                count,
            );
        }
    }

    /// Unregisters one registration of `command` (under `parent`, when it
    /// was registered with one). Only when the registration count reaches
    /// zero are the command's tree and closure entries purged entirely.
    pub fn remove(&mut self, command: &str, parent: Option<&str>) {
        let count = match self.counts.get_mut(command) {
            Some(count) if *count > 0 => count,
            _ => {
                warn!(target: LOG_TARGET, "Attempted to remove unregistered command '{}'.", command);
                return;
            }
        };
        *count -= 1;

        if *count == 0 {
            self.purge(command);
            return;
        }

        // Still registered elsewhere: undo exactly one path's worth of
        // relations, mirroring add().
        if let Some(parent) = parent {
            if let Some(rel) = self.tree.get_mut(parent) {
                dec_edge(&mut rel.children, command, 1);
            }
            if let Some(rel) = self.tree.get_mut(command) {
                dec_edge(&mut rel.parents, parent, 1);
            }

            let mut lost: Vec<(String, usize)> = vec![(parent.to_string(), 1)];
            if let Some(parent_flat) = self.flat.get(parent) {
                for (ancestor, count) in &parent_flat.ancestors {
                    lost.push((ancestor.clone(), *count));
                }
            }
            for (ancestor, count) in lost {
                if let Some(flat) = self.flat.get_mut(command) {
                    dec_edge(&mut flat.ancestors, &ancestor, count);
                }
                if let Some(flat) = self.flat.get_mut(&ancestor) {
                    dec_edge(&mut flat.descendants, command, count);
                }
            }
        }
    }

    /// Deletes every relation involving `command`, including the
    /// transitive ancestor/descendant links that routed through it.
    fn purge(&mut self, command: &str) {
        debug!(target: LOG_TARGET, "Purging command '{}' from the tree.", command);
        let flat = self.flat.remove(command).unwrap_or_default();

        for (ancestor, anc_count) in &flat.ancestors {
            if let Some(other) = self.flat.get_mut(ancestor) {
                other.descendants.remove(command);
            }
            for (descendant, desc_count) in &flat.descendants {
                let routed = anc_count * desc_count;
                if let Some(other) = self.flat.get_mut(descendant) {
                    dec_edge(&mut other.ancestors, ancestor, routed);
                }
                if let Some(other) = self.flat.get_mut(ancestor) {
                    dec_edge(&mut other.descendants, descendant, routed);
                }
            }
        }
        for (descendant, _) in &flat.descendants {
            if let Some(other) = self.flat.get_mut(descendant) {
                other.ancestors.remove(command);
            }
        }

        if let Some(direct) = self.tree.remove(command) {
            for parent in direct.parents.keys() {
                if let Some(rel) = self.tree.get_mut(parent) {
                    rel.children.remove(command);
                }
            }
            for child in direct.children.keys() {
                if let Some(rel) = self.tree.get_mut(child) {
                    rel.parents.remove(command);
                }
            }
        }
        self.counts.remove(command);
    }

    /// De-duplicated set of all transitive ancestors of `command`.
    pub fn get_parents(&self, command: &str) -> BTreeSet<String> {
        self.flat
            .get(command)
            .map(|f| f.ancestors.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// De-duplicated set of all transitive descendants of `command`.
    pub fn get_children(&self, command: &str) -> BTreeSet<String> {
        self.flat
            .get(command)
            .map(|f| f.descendants.keys().cloned().collect())
            .unwrap_or_default()
    }
}
