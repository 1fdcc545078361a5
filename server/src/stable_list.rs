//! Doubly linked list stored in an arena, with a cursor that can unlink the
//! element it sits on and keep walking.
//!
//! Two sentinel nodes bracket the payload nodes. They never hold a value and
//! are permanently linked to each other when the list is empty. Removing a
//! node relinks its neighbours and returns the node's slot to a free list, so
//! a scan in progress can prune arbitrary interior elements in O(1) without
//! invalidating its own position.

const FRONT: usize = 0;
const BACK: usize = 1;

/// Stable address of an element.
///
/// Slots are recycled after removal; the generation makes a handle to a
/// removed element resolve to nothing instead of to whatever reuses the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    index: usize,
    generation: u32,
}

/// Which neighbour a cursor moves to after removing its node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Forward,
    Backward,
}

#[derive(Debug)]
struct Node<T> {
    value: Option<T>,
    prev: usize,
    next: usize,
    generation: u32,
}

impl<T> Node<T> {
    fn sentinel(prev: usize, next: usize) -> Self {
        Self {
            value: None,
            prev,
            next,
            generation: 0,
        }
    }
}

#[derive(Debug)]
pub struct StableList<T> {
    nodes: Vec<Node<T>>,
    free: Vec<usize>,
    len: usize,
}

impl<T> Default for StableList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> StableList<T> {
    pub fn new() -> Self {
        // The front sentinel's prev and the back sentinel's next point at
        // themselves, so walking off either end stays on the sentinel.
        Self {
            nodes: vec![Node::sentinel(FRONT, BACK), Node::sentinel(FRONT, BACK)],
            free: Vec::new(),
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn push_front(&mut self, value: T) -> Handle {
        let next = self.nodes[FRONT].next;
        self.link(value, FRONT, next)
    }

    pub fn push_back(&mut self, value: T) -> Handle {
        let prev = self.nodes[BACK].prev;
        self.link(value, prev, BACK)
    }

    pub fn pop_front(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        let index = self.nodes[FRONT].next;
        self.unlink(index)
    }

    pub fn pop_back(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        let index = self.nodes[BACK].prev;
        self.unlink(index)
    }

    pub fn get(&self, handle: Handle) -> Option<&T> {
        self.node(handle).and_then(|node| node.value.as_ref())
    }

    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut T> {
        let index = self.node(handle).map(|_| handle.index)?;
        self.nodes[index].value.as_mut()
    }

    pub fn remove(&mut self, handle: Handle) -> Option<T> {
        self.node(handle)?;
        self.unlink(handle.index)
    }

    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            list: self,
            index: self.nodes[FRONT].next,
        }
    }

    /// Cursor parked on the front sentinel.
    pub fn cursor_mut(&mut self) -> CursorMut<'_, T> {
        CursorMut {
            list: self,
            index: FRONT,
        }
    }

    /// Cursor on the first element, or on the back sentinel when empty.
    pub fn cursor_front_mut(&mut self) -> CursorMut<'_, T> {
        let mut cursor = self.cursor_mut();
        cursor.to_front();
        cursor
    }

    fn node(&self, handle: Handle) -> Option<&Node<T>> {
        if handle.index == FRONT || handle.index == BACK {
            return None;
        }
        self.nodes
            .get(handle.index)
            .filter(|node| node.generation == handle.generation && node.value.is_some())
    }

    fn link(&mut self, value: T, prev: usize, next: usize) -> Handle {
        let index = match self.free.pop() {
            Some(index) => {
                let node = &mut self.nodes[index];
                node.value = Some(value);
                node.prev = prev;
                node.next = next;
                index
            }
            None => {
                self.nodes.push(Node {
                    value: Some(value),
                    prev,
                    next,
                    generation: 0,
                });
                self.nodes.len() - 1
            }
        };
        self.nodes[prev].next = index;
        self.nodes[next].prev = index;
        self.len += 1;
        Handle {
            index,
            generation: self.nodes[index].generation,
        }
    }

    fn unlink(&mut self, index: usize) -> Option<T> {
        let node = &mut self.nodes[index];
        let value = node.value.take()?;
        let (prev, next) = (node.prev, node.next);
        node.generation = node.generation.wrapping_add(1);
        self.nodes[prev].next = next;
        self.nodes[next].prev = prev;
        self.free.push(index);
        self.len -= 1;
        Some(value)
    }
}

pub struct Iter<'a, T> {
    list: &'a StableList<T>,
    index: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index == BACK {
            return None;
        }
        let node = &self.list.nodes[self.index];
        self.index = node.next;
        node.value.as_ref()
    }
}

impl<'a, T> IntoIterator for &'a StableList<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// External cursor over a [`StableList`].
///
/// The cursor may rest on either sentinel; `value` is `None` there.
pub struct CursorMut<'a, T> {
    list: &'a mut StableList<T>,
    index: usize,
}

impl<'a, T> CursorMut<'a, T> {
    pub fn at_front(&self) -> bool {
        self.index == FRONT
    }

    pub fn at_back(&self) -> bool {
        self.index == BACK
    }

    /// Moves to the first element (the back sentinel when empty).
    pub fn to_front(&mut self) {
        self.index = self.list.nodes[FRONT].next;
    }

    /// Moves to the last element (the front sentinel when empty).
    pub fn to_back(&mut self) {
        self.index = self.list.nodes[BACK].prev;
    }

    pub fn advance(&mut self) {
        self.index = self.list.nodes[self.index].next;
    }

    pub fn retreat(&mut self) {
        self.index = self.list.nodes[self.index].prev;
    }

    pub fn value(&self) -> Option<&T> {
        self.list.nodes[self.index].value.as_ref()
    }

    pub fn value_mut(&mut self) -> Option<&mut T> {
        self.list.nodes[self.index].value.as_mut()
    }

    pub fn handle(&self) -> Option<Handle> {
        let node = &self.list.nodes[self.index];
        node.value.as_ref().map(|_| Handle {
            index: self.index,
            generation: node.generation,
        })
    }

    /// Unlinks the current element and moves to its neighbour in `step`
    /// direction. Does nothing on a sentinel.
    pub fn remove(&mut self, step: Step) -> Option<T> {
        if self.at_front() || self.at_back() {
            return None;
        }
        let node = &self.list.nodes[self.index];
        let target = match step {
            Step::Forward => node.next,
            Step::Backward => node.prev,
        };
        let value = self.list.unlink(self.index)?;
        self.index = target;
        Some(value)
    }
}
