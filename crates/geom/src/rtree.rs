use crate::aabb::Aabb;

/// Capability required of everything stored in an [`RTree`].
///
/// Bounds are sampled once, at insertion or bulk load, and cached in the
/// tree; entries never see the tree again afterwards.
pub trait Bounded {
    fn bounds(&self) -> Aabb;
}

/// Node fan-out. A node holds at most `MAX_ENTRIES` children and, except for
/// the root, at least `MIN_ENTRIES` after a split.
const MIN_ENTRIES: usize = 2;
const MAX_ENTRIES: usize = 5;

struct Entry<T> {
    bounds: Aabb,
    item: T,
}

struct Child<T> {
    bounds: Aabb,
    node: Node<T>,
}

enum Node<T> {
    Leaf(Vec<Entry<T>>),
    Branch(Vec<Child<T>>),
}

/// A 3D R-tree supporting insertion, bulk loading, and predicate-guided
/// search.
///
/// The single query primitive is [`RTree::search_condition`]: traversal
/// descends only into subtrees whose bounding box satisfies the predicate.
/// Results come back in tree order, which is stable for a given build but
/// carries no front-to-back meaning; callers resolve nearest-hit by
/// distance.
pub struct RTree<T> {
    root: Option<Node<T>>,
    len: usize,
}

impl<T> Default for RTree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> RTree<T> {
    pub fn new() -> Self {
        Self { root: None, len: 0 }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Every entry whose cached bounds satisfy `pred`, reached through
    /// internal nodes whose bounds also satisfy it.
    pub fn search_condition<P: Fn(&Aabb) -> bool>(&self, pred: P) -> Vec<&T> {
        let mut out = Vec::new();
        if let Some(root) = &self.root {
            search_rec(root, &pred, &mut out);
        }
        out
    }

    /// Every entry in tree order.
    pub fn items(&self) -> Vec<&T> {
        self.search_condition(|_| true)
    }
}

impl<T: Bounded> RTree<T> {
    /// Inserts a single entry, splitting overflowing nodes on the way up.
    pub fn insert(&mut self, item: T) {
        let bounds = item.bounds();
        self.len += 1;
        match self.root.take() {
            None => {
                self.root = Some(Node::Leaf(vec![Entry { bounds, item }]));
            }
            Some(mut root) => {
                if let Some(sibling) = insert_rec(&mut root, bounds, item) {
                    let left = Child {
                        bounds: node_bounds(&root),
                        node: root,
                    };
                    let right = Child {
                        bounds: node_bounds(&sibling),
                        node: sibling,
                    };
                    self.root = Some(Node::Branch(vec![left, right]));
                } else {
                    self.root = Some(root);
                }
            }
        }
    }

    /// Builds a tree from a full entry set by sort-tile-recursive packing:
    /// entries are sorted into spatial slabs along x, then y, then z, chunked
    /// into full leaves, and the levels above packed in order.
    pub fn bulk_load(items: Vec<T>) -> Self {
        let len = items.len();
        if len == 0 {
            return Self::new();
        }

        let mut entries: Vec<Entry<T>> = items
            .into_iter()
            .map(|item| Entry {
                bounds: item.bounds(),
                item,
            })
            .collect();

        let leaf_count = len.div_ceil(MAX_ENTRIES);
        let slabs = (leaf_count as f64).cbrt().ceil() as usize;

        entries.sort_by(|a, b| a.bounds.centroid().x.total_cmp(&b.bounds.centroid().x));

        let mut leaves = Vec::with_capacity(leaf_count);
        for mut slab in chunk_even(entries, slabs) {
            slab.sort_by(|a, b| a.bounds.centroid().y.total_cmp(&b.bounds.centroid().y));
            for mut run in chunk_even(slab, slabs) {
                run.sort_by(|a, b| a.bounds.centroid().z.total_cmp(&b.bounds.centroid().z));
                for leaf in chunk_exact(run, MAX_ENTRIES) {
                    leaves.push(Node::Leaf(leaf));
                }
            }
        }

        let mut level: Vec<Child<T>> = leaves
            .into_iter()
            .map(|node| Child {
                bounds: node_bounds(&node),
                node,
            })
            .collect();
        while level.len() > MAX_ENTRIES {
            let mut chunks = chunk_exact(level, MAX_ENTRIES);
            // A trailing single-child chunk would violate the minimum
            // fan-out; rebalance it from its neighbour.
            if let [.., prev, last] = chunks.as_mut_slice() {
                if last.len() < MIN_ENTRIES {
                    while last.len() < MIN_ENTRIES {
                        last.insert(0, prev.pop().expect("previous chunk is full"));
                    }
                }
            }
            level = chunks
                .into_iter()
                .map(|children| {
                    let node = Node::Branch(children);
                    Child {
                        bounds: node_bounds(&node),
                        node,
                    }
                })
                .collect();
        }

        let root = if level.len() == 1 {
            level.pop().map(|c| c.node)
        } else {
            Some(Node::Branch(level))
        };

        Self { root, len }
    }
}

fn search_rec<'a, T, P: Fn(&Aabb) -> bool>(node: &'a Node<T>, pred: &P, out: &mut Vec<&'a T>) {
    match node {
        Node::Leaf(entries) => {
            for e in entries {
                if pred(&e.bounds) {
                    out.push(&e.item);
                }
            }
        }
        Node::Branch(children) => {
            for c in children {
                if pred(&c.bounds) {
                    search_rec(&c.node, pred, out);
                }
            }
        }
    }
}

fn node_bounds<T>(node: &Node<T>) -> Aabb {
    let mut iter: Box<dyn Iterator<Item = Aabb> + '_> = match node {
        Node::Leaf(entries) => Box::new(entries.iter().map(|e| e.bounds)),
        Node::Branch(children) => Box::new(children.iter().map(|c| c.bounds)),
    };
    let first = iter.next().expect("node must not be empty");
    iter.fold(first, Aabb::union)
}

/// Returns the split-off sibling when the insertion overflowed this node.
fn insert_rec<T: Bounded>(node: &mut Node<T>, bounds: Aabb, item: T) -> Option<Node<T>> {
    match node {
        Node::Leaf(entries) => {
            entries.push(Entry { bounds, item });
            if entries.len() > MAX_ENTRIES {
                let (keep, moved) = split(std::mem::take(entries), |e| e.bounds);
                *entries = keep;
                Some(Node::Leaf(moved))
            } else {
                None
            }
        }
        Node::Branch(children) => {
            let idx = choose_child(children, bounds);
            children[idx].bounds = children[idx].bounds.union(bounds);
            if let Some(sibling) = insert_rec(&mut children[idx].node, bounds, item) {
                // The child just shed entries; recompute its cached bounds.
                children[idx].bounds = node_bounds(&children[idx].node);
                let sibling_bounds = node_bounds(&sibling);
                children.push(Child {
                    bounds: sibling_bounds,
                    node: sibling,
                });
                if children.len() > MAX_ENTRIES {
                    let (keep, moved) = split(std::mem::take(children), |c| c.bounds);
                    *children = keep;
                    return Some(Node::Branch(moved));
                }
            }
            None
        }
    }
}

/// The child whose bounds need the least volume enlargement to absorb
/// `bounds`, ties broken by smaller volume.
fn choose_child<T>(children: &[Child<T>], bounds: Aabb) -> usize {
    let mut best = 0;
    let mut best_growth = f64::INFINITY;
    let mut best_volume = f64::INFINITY;
    for (i, c) in children.iter().enumerate() {
        let volume = c.bounds.volume();
        let growth = c.bounds.union(bounds).volume() - volume;
        if growth < best_growth || (growth == best_growth && volume < best_volume) {
            best = i;
            best_growth = growth;
            best_volume = volume;
        }
    }
    best
}

/// Splits an overflowing entry list in two. Seeds are the quadratic-split
/// pair wasting the most volume when joined; the rest go to whichever group
/// grows least, except when one group must take everything left to reach
/// `MIN_ENTRIES`.
fn split<E>(items: Vec<E>, bounds_of: impl Fn(&E) -> Aabb) -> (Vec<E>, Vec<E>) {
    let mut items: Vec<Option<E>> = items.into_iter().map(Some).collect();
    let n = items.len();

    let (mut seed_a, mut seed_b, mut worst) = (0, 1, f64::NEG_INFINITY);
    for i in 0..n {
        for j in (i + 1)..n {
            let (a, b) = (
                bounds_of(items[i].as_ref().unwrap()),
                bounds_of(items[j].as_ref().unwrap()),
            );
            let dead = a.union(b).volume() - a.volume() - b.volume();
            if dead > worst {
                (seed_a, seed_b, worst) = (i, j, dead);
            }
        }
    }

    let mut group_a = vec![items[seed_a].take().unwrap()];
    let mut group_b = vec![items[seed_b].take().unwrap()];
    let mut bounds_a = bounds_of(&group_a[0]);
    let mut bounds_b = bounds_of(&group_b[0]);

    let mut remaining: Vec<E> = items.into_iter().flatten().collect();
    while let Some(e) = remaining.pop() {
        let left = remaining.len() + 1;
        if group_a.len() + left <= MIN_ENTRIES {
            bounds_a = bounds_a.union(bounds_of(&e));
            group_a.push(e);
            continue;
        }
        if group_b.len() + left <= MIN_ENTRIES {
            bounds_b = bounds_b.union(bounds_of(&e));
            group_b.push(e);
            continue;
        }

        let eb = bounds_of(&e);
        let growth_a = bounds_a.union(eb).volume() - bounds_a.volume();
        let growth_b = bounds_b.union(eb).volume() - bounds_b.volume();
        if growth_a <= growth_b {
            bounds_a = bounds_a.union(eb);
            group_a.push(e);
        } else {
            bounds_b = bounds_b.union(eb);
            group_b.push(e);
        }
    }

    (group_a, group_b)
}

/// Splits `items` into at most `parts` contiguous runs of near-equal length.
fn chunk_even<E>(items: Vec<E>, parts: usize) -> Vec<Vec<E>> {
    let size = items.len().div_ceil(parts.max(1));
    chunk_exact(items, size.max(1))
}

/// Splits `items` into contiguous runs of `size` (the last may be shorter).
fn chunk_exact<E>(items: Vec<E>, size: usize) -> Vec<Vec<E>> {
    let mut out = Vec::with_capacity(items.len().div_ceil(size));
    let mut run = Vec::with_capacity(size);
    for item in items {
        run.push(item);
        if run.len() == size {
            out.push(std::mem::replace(&mut run, Vec::with_capacity(size)));
        }
    }
    if !run.is_empty() {
        out.push(run);
    }
    out
}
