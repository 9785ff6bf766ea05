//! Weighted-union-by-rank, path-compressed disjoint-set union over opaque
//! string identifiers (document ids).

use std::collections::HashMap;

/// A disjoint-set union keyed by arbitrary string ids. Ids are registered
/// implicitly on first use in [`find`](Self::find) or [`union`](Self::union).
#[derive(Debug, Default, Clone)]
pub struct UnionFind {
    parent: HashMap<String, String>,
    rank: HashMap<String, u32>,
}

impl UnionFind {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensure `id` is registered as its own singleton set if not already
    /// present.
    fn ensure(&mut self, id: &str) {
        if !self.parent.contains_key(id) {
            self.parent.insert(id.to_string(), id.to_string());
            self.rank.insert(id.to_string(), 0);
        }
    }

    /// Find the representative (root) of `id`'s set, path-compressing along
    /// the way. Registers `id` as a new singleton set if unseen.
    pub fn find(&mut self, id: &str) -> String {
        self.ensure(id);
        let mut current = id.to_string();
        // Walk to the root.
        loop {
            let next = self.parent.get(&current).cloned().unwrap_or_else(|| current.clone());
            if next == current {
                break;
            }
            current = next;
        }
        let root = current;

        // Second pass: compress every node on the path directly to root.
        let mut node = id.to_string();
        while node != root {
            let next = self.parent.insert(node.clone(), root.clone()).unwrap();
            node = next;
        }

        root
    }

    /// Union the sets containing `a` and `b`. The smaller-rank root is
    /// attached under the larger-rank root; ties increment the surviving
    /// root's rank. No-op if `a` and `b` are already in the same set.
    pub fn union(&mut self, a: &str, b: &str) {
        let root_a = self.find(a);
        let root_b = self.find(b);
        if root_a == root_b {
            return;
        }

        let rank_a = *self.rank.get(&root_a).unwrap_or(&0);
        let rank_b = *self.rank.get(&root_b).unwrap_or(&0);

        if rank_a < rank_b {
            self.parent.insert(root_a, root_b);
        } else if rank_a > rank_b {
            self.parent.insert(root_b, root_a);
        } else {
            self.parent.insert(root_b, root_a.clone());
            self.rank.insert(root_a, rank_a + 1);
        }
    }

    /// Group every registered id by its root, returning a map from root id
    /// to the sorted member ids of its component.
    pub fn components(&mut self) -> HashMap<String, Vec<String>> {
        let ids: Vec<String> = self.parent.keys().cloned().collect();
        let mut groups: HashMap<String, Vec<String>> = HashMap::new();
        for id in ids {
            let root = self.find(&id);
            groups.entry(root).or_default().push(id);
        }
        for members in groups.values_mut() {
            members.sort();
        }
        groups
    }

    /// Number of distinct ids registered so far (across all components).
    pub fn len(&self) -> usize {
        self.parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }
}
