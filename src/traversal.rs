//! Lazy, splittable traversal of pointer-based trees.

use rayon::iter::plumbing::{Folder, UnindexedProducer};

use std::fmt::{self, Debug, Formatter};

/// A reference to a tree node that knows its item and its children.
pub trait Subtree<'a>: Copy {
    /// The type of items stored in the tree.
    type Item: 'a;

    /// Get the item stored at this node.
    fn item(self) -> &'a Self::Item;

    /// Push every child of this node onto a stack.
    fn push_children(self, stack: &mut Vec<Self>);
}

/// A depth-first traversal over a set of disjoint subtrees.
///
/// Splitting hands half of the pending subtrees to a new traversal, so the two halves never visit
/// the same node.
pub struct Traversal<'a, N: Subtree<'a>> {
    /// Items already detached from their nodes by a split.
    ready: Vec<&'a N::Item>,
    /// Subtrees still to visit.
    stack: Vec<N>,
}

impl<'a, N: Subtree<'a>> Traversal<'a, N> {
    /// Traverse the subtree rooted at `root`, if any.
    pub fn new(root: Option<N>) -> Self {
        Self {
            ready: Vec::new(),
            stack: root.into_iter().collect(),
        }
    }

    /// Split off roughly half of the remaining subtrees.
    ///
    /// Returns `None` if the rest of the traversal can't be divided.
    pub fn split_off(&mut self) -> Option<Self> {
        // A lone subtree can't be shared, but its children can
        while self.stack.len() == 1 {
            if let Some(node) = self.stack.pop() {
                self.ready.push(node.item());
                node.push_children(&mut self.stack);
            }
        }

        if self.stack.len() < 2 {
            return None;
        }

        let half = self.stack.len() / 2;
        Some(Self {
            ready: Vec::new(),
            stack: self.stack.split_off(half),
        })
    }
}

impl<'a, N> Debug for Traversal<'a, N>
where
    N: Subtree<'a> + Debug,
    N::Item: Debug,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Traversal")
            .field("ready", &self.ready)
            .field("stack", &self.stack)
            .finish()
    }
}

impl<'a, N: Subtree<'a>> Iterator for Traversal<'a, N> {
    type Item = &'a N::Item;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(item) = self.ready.pop() {
            return Some(item);
        }

        self.stack.pop().map(|node| {
            node.push_children(&mut self.stack);
            node.item()
        })
    }
}

impl<'a, N> UnindexedProducer for Traversal<'a, N>
where
    N: Subtree<'a> + Send,
    N::Item: Sync,
{
    type Item = &'a N::Item;

    fn split(mut self) -> (Self, Option<Self>) {
        let other = self.split_off();
        (self, other)
    }

    fn fold_with<F>(self, folder: F) -> F
    where
        F: Folder<Self::Item>,
    {
        folder.consume_iter(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A rose tree for testing.
    struct Rose {
        value: u32,
        children: Vec<Rose>,
    }

    impl<'a> Subtree<'a> for &'a Rose {
        type Item = u32;

        fn item(self) -> &'a u32 {
            &self.value
        }

        fn push_children(self, stack: &mut Vec<Self>) {
            stack.extend(self.children.iter());
        }
    }

    fn leaf(value: u32) -> Rose {
        Rose { value, children: Vec::new() }
    }

    fn sample() -> Rose {
        Rose {
            value: 0,
            children: vec![
                Rose { value: 1, children: vec![leaf(3), leaf(4)] },
                Rose { value: 2, children: vec![Rose { value: 5, children: vec![leaf(6)] }] },
            ],
        }
    }

    fn sorted(items: impl Iterator<Item = u32>) -> Vec<u32> {
        let mut items: Vec<_> = items.collect();
        items.sort_unstable();
        items
    }

    #[test]
    fn test_traversal() {
        let tree = sample();
        let items = Traversal::new(Some(&tree)).copied();
        assert_eq!(sorted(items), [0, 1, 2, 3, 4, 5, 6]);

        assert_eq!(Traversal::<&Rose>::new(None).count(), 0);
    }

    #[test]
    fn test_split_is_disjoint() {
        let tree = sample();
        let mut left = Traversal::new(Some(&tree));
        let mut right = left.split_off().unwrap();
        let far_left = left.split_off().unwrap();
        assert!(left.split_off().is_none());
        assert!(right.split_off().is_none());

        let items = left.chain(far_left).chain(right).copied();
        assert_eq!(sorted(items), [0, 1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_split_leaf() {
        let tree = leaf(7);
        let mut traversal = Traversal::new(Some(&tree));
        assert!(traversal.split_off().is_none());
        assert_eq!(traversal.copied().collect::<Vec<_>>(), [7]);
    }
}
