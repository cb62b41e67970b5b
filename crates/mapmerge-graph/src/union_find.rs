/// A disjoint-set (union-find) data structure over the node indices of a graph.
#[derive(Debug, Clone)]
pub struct UnionFind {
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl UnionFind {
    /// Creates a structure where each of the `len` nodes is its own set.
    pub fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
            size: vec![1; len],
        }
    }

    /// Returns the representative of the set containing `id`, with path compression.
    pub fn find(&mut self, mut id: usize) -> usize {
        let mut root = id;
        while self.parent[root] != root {
            root = self.parent[root];
        }

        // collapse the path
        while self.parent[id] != root {
            let next = self.parent[id];
            self.parent[id] = root;
            id = next;
        }

        root
    }

    /// Unites the sets containing `a` and `b`.
    ///
    /// Returns `false` if they already were in the same set.
    pub fn union(&mut self, a: usize, b: usize) -> bool {
        let aroot = self.find(a);
        let broot = self.find(b);

        if aroot == broot {
            return false;
        }

        let (big, small) = if self.size[aroot] >= self.size[broot] {
            (aroot, broot)
        } else {
            (broot, aroot)
        };
        self.parent[small] = big;
        self.size[big] += self.size[small];
        true
    }

    /// Number of elements in the set containing `id`.
    pub fn set_size(&mut self, id: usize) -> usize {
        let root = self.find(id);
        self.size[root]
    }

    /// Returns the number of elements.
    pub fn len(&self) -> usize {
        self.parent.len()
    }

    /// Whether the structure holds no elements.
    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }
}
