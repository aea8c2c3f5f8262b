use std::fmt;
use std::mem;

use ndarray::{ArrayView1, ArrayView2, Axis};
use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::metric::distance;
use crate::{CoverTreeError, Point, Result, Scalar};

const DEFAULT_BASE: Scalar = 1.3;
const SEQUENTIAL_THRESHOLD: usize = 50_000;

const TABLE_SIZE: usize = 2048;
const TABLE_OFFSET: i32 = 1024;

/// A neighbour resulted from a nearest-neighbour or range search.
#[derive(Clone, Debug)]
pub struct Neighbour {
    dist: Scalar,
    point: Point,
}

impl Neighbour {
    pub(crate) fn new(dist: Scalar, point: Point) -> Self {
        Self { dist, point }
    }

    fn of(node: &Node) -> Self {
        Self::new(node.temp_dist, node.p.clone())
    }

    fn sentinel() -> Self {
        Self::new(Scalar::INFINITY, Point::sentinel())
    }

    /// Returns the identifier of the matched point.
    pub fn id(&self) -> usize {
        self.point.id()
    }

    /// Returns the distance from the query to the matched point.
    pub fn dist(&self) -> Scalar {
        self.dist
    }

    /// Returns the matched point.
    pub fn point(&self) -> &Point {
        &self.point
    }
}

/// Precomputed powers of the base, indexed by level plus a fixed offset so
/// that both deeply positive and deeply negative levels resolve without
/// calling ```pow``` on hot paths.
#[derive(Clone, Debug)]
pub(crate) struct PowerTable {
    powers: Vec<Scalar>,
}

impl PowerTable {
    pub(crate) fn new(base: Scalar) -> Self {
        let powers = (0..TABLE_SIZE)
            .map(|i| base.powi(i as i32 - TABLE_OFFSET))
            .collect();
        Self { powers }
    }

    /// ```base^level```: the covering radius of a node at ```level```.
    #[inline(always)]
    pub(crate) fn covdist(&self, level: i32) -> Scalar {
        self.powers[(level + TABLE_OFFSET) as usize]
    }

    /// ```base^(level - 1)```: the separation radius of a node at ```level```.
    #[inline(always)]
    pub(crate) fn sepdist(&self, level: i32) -> Scalar {
        self.powers[(level + TABLE_OFFSET - 1) as usize]
    }

    /// Whether both radii of ```level``` fall inside the table.
    #[inline(always)]
    pub(crate) fn admits(&self, level: i32) -> bool {
        level > -TABLE_OFFSET && level < TABLE_OFFSET
    }
}

#[derive(Clone, Debug)]
pub(crate) struct Node {
    pub(crate) p: Point,
    pub(crate) level: i32,
    pub(crate) maxdist_ub: Scalar,
    pub(crate) temp_dist: Scalar,
    pub(crate) children: Vec<Node>,
}

impl Node {
    fn leaf(p: Point, level: i32) -> Self {
        Self {
            p,
            level,
            maxdist_ub: 0.,
            temp_dist: 0.,
            children: Vec::with_capacity(8),
        }
    }
}

impl Drop for Node {
    // Children are drained through an explicit stack so that dropping a deep
    // tree never recurses.
    fn drop(&mut self) {
        let mut travel = mem::take(&mut self.children);
        while let Some(mut node) = travel.pop() {
            travel.append(&mut node.children);
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}:{}:{})", self.p.data(), self.level, self.maxdist_ub)
    }
}

/// A tree data structure for fast nearest-neighbour search in general n-point
/// metric spaces, requiring ```O(n)``` space.
///
/// Every stored point lives in exactly one node; a node owns its children and
/// the tree owns the root, so a tree is destroyed by walking it once. Queries
/// that cache per-node query state ([`nearest`](CoverTree::nearest),
/// [`near`](CoverTree::near), [`range`](CoverTree::range)) take ```&mut self```
/// and must be serialised by the caller; the ```*_multi``` variants recompute
/// distances locally, take ```&self``` and may run concurrently.
#[derive(Clone, Debug)]
pub struct CoverTree {
    root: Node,
    base: Scalar,
    dim: usize,
    min_scale: i32,
    max_scale: i32,
    powers: PowerTable,
}

impl CoverTree {
    /// Creates a tree holding the single point ```p```, which becomes the
    /// root at level 0.
    pub fn new(p: Point, base: Scalar) -> Result<Self> {
        if base <= 1. {
            return Err(CoverTreeError::InvalidBase(base));
        }
        if p.is_empty() {
            return Err(CoverTreeError::EmptyPoint);
        }

        let dim = p.len();
        Ok(Self {
            root: Node::leaf(p, 0),
            base,
            dim,
            min_scale: 0,
            max_scale: 0,
            powers: PowerTable::new(base),
        })
    }

    /// Builds a tree from a batch of points: the last point becomes the root,
    /// the rest are inserted in order, and the distance upper bounds are
    /// tightened with [`update`](CoverTree::update) at the end.
    pub fn from_batch(mut points: Vec<Point>, base: Scalar) -> Result<Self> {
        let root_point = points.pop().ok_or(CoverTreeError::EmptyBatch)?;
        let mut tree = Self::new(root_point, base)?;
        for p in points {
            tree.insert(p)?;
        }
        tree.update();
        Ok(tree)
    }

    /// Sequential build over a borrowed slice; bounds are left untightened so
    /// a parallel build can run a single update pass after merging.
    fn from_slice(points: &[Point], base: Scalar) -> Result<Self> {
        let (root_point, rest) = points.split_last().ok_or(CoverTreeError::EmptyBatch)?;
        let mut tree = Self::new(root_point.clone(), base)?;
        for p in rest {
            tree.insert(p.clone())?;
        }
        Ok(tree)
    }

    /// Inserts a new point into the tree.
    ///
    /// If ```p``` falls outside the root's covering radius, the root is
    /// raised first (peeling the deepest rightmost leaf into a new root)
    /// until a node holding ```p``` one level above the old root covers it.
    /// Otherwise the point descends into the first child that covers it and
    /// becomes a new leaf where no child does.
    ///
    /// Inserting leaves the distance upper bounds of the ancestors of the new
    /// leaf untightened; call [`update`](CoverTree::update) before relying on
    /// query pruning.
    pub fn insert(&mut self, p: Point) -> Result<()> {
        if p.len() != self.dim {
            return Err(CoverTreeError::DimensionMismatch {
                expected: self.dim,
                got: p.len(),
            });
        }

        let mut d = distance(self.root.p.view(), p.view());
        if d > self.powers.covdist(self.root.level) {
            while d > self.base * self.powers.covdist(self.root.level) {
                self.lift_root()?;
                d = distance(self.root.p.view(), p.view());
            }

            let level = self.root.level + 1;
            if !self.powers.admits(level) {
                return Err(CoverTreeError::ScaleOutOfRange(level));
            }

            let old_root = mem::replace(&mut self.root, Node::leaf(p, level));
            self.root.children.push(old_root);
            self.max_scale = level;
            Ok(())
        } else {
            self.root.temp_dist = d;
            Self::descend_insert(&mut self.root, p, &self.powers, &mut self.min_scale)
        }
    }

    /// Raises the root by one level: the deepest rightmost leaf is peeled off
    /// and becomes the new root with the old root as its only child. A root
    /// without descendants is raised in place.
    fn lift_root(&mut self) -> Result<()> {
        let level = self.root.level + 1;
        if !self.powers.admits(level) {
            return Err(CoverTreeError::ScaleOutOfRange(level));
        }

        let mut depth = 0;
        let mut current = &self.root;
        while let Some(last) = current.children.last() {
            current = last;
            depth += 1;
        }

        if depth == 0 {
            self.root.level = level;
        } else {
            let mut parent = &mut self.root;
            for _ in 1..depth {
                parent = parent.children.last_mut().unwrap();
            }
            let mut leaf = parent.children.pop().unwrap();
            leaf.level = level;
            let old_root = mem::replace(&mut self.root, leaf);
            self.root.children.push(old_root);
        }

        self.max_scale = level;
        Ok(())
    }

    fn descend_insert(
        current: &mut Node,
        p: Point,
        powers: &PowerTable,
        min_scale: &mut i32,
    ) -> Result<()> {
        debug_assert!(distance(current.p.view(), p.view()) <= powers.covdist(current.level));

        let mut covering = None;
        for idx in 0..current.children.len() {
            let child = &mut current.children[idx];
            child.temp_dist = distance(child.p.view(), p.view());
            if child.temp_dist <= powers.covdist(child.level) {
                covering = Some(idx);
                break;
            }
        }

        match covering {
            Some(idx) => Self::descend_insert(&mut current.children[idx], p, powers, min_scale),
            None => {
                let level = current.level - 1;
                if !powers.admits(level) {
                    return Err(CoverTreeError::ScaleOutOfRange(level));
                }
                current.children.push(Node::leaf(p, level));
                if *min_scale > level {
                    *min_scale = level;
                }
                Ok(())
            }
        }
    }

    /// Node-carrying variant of the insert descent used while merging:
    /// descends into the first covering child and attaches the whole subtree
    /// where no child covers its point.
    fn descend_insert_node(
        current: &mut Node,
        node: Node,
        powers: &PowerTable,
        min_scale: &mut i32,
    ) -> Result<()> {
        debug_assert!(distance(current.p.view(), node.p.view()) <= powers.covdist(current.level));

        let mut covering = None;
        for idx in 0..current.children.len() {
            let child = &mut current.children[idx];
            child.temp_dist = distance(child.p.view(), node.p.view());
            if child.temp_dist <= powers.covdist(child.level) {
                covering = Some(idx);
                break;
            }
        }

        match covering {
            Some(idx) => {
                Self::descend_insert_node(&mut current.children[idx], node, powers, min_scale)
            }
            None => Self::attach_child(current, node, powers, min_scale),
        }
    }

    /// Re-levels ```node``` to sit directly under ```parent``` and attaches
    /// it. The level rewrite walks the subtree with an explicit stack and
    /// runs before the subtree becomes visible to queries.
    fn attach_child(
        parent: &mut Node,
        mut node: Node,
        powers: &PowerTable,
        min_scale: &mut i32,
    ) -> Result<()> {
        let target = parent.level - 1;
        if node.level != target {
            let mut depth = 0;
            let mut travel = vec![(&node, 0)];
            while let Some((n, d)) = travel.pop() {
                if d > depth {
                    depth = d;
                }
                for child in &n.children {
                    travel.push((child, d + 1));
                }
            }

            let lowest = target - depth;
            if !powers.admits(lowest) {
                return Err(CoverTreeError::ScaleOutOfRange(lowest));
            }

            node.level = target;
            let mut travel = vec![&mut node];
            while let Some(n) = travel.pop() {
                let level = n.level;
                for child in n.children.iter_mut() {
                    child.level = level - 1;
                    travel.push(child);
                }
            }

            if lowest < *min_scale {
                *min_scale = lowest;
            }
        }

        parent.children.push(node);
        Ok(())
    }

    /// Returns the single nearest stored point to ```query```.
    ///
    /// # Panics
    ///
    /// Panics if the query dimension differs from the tree dimension.
    pub fn nearest(&mut self, query: ArrayView1<'_, Scalar>) -> Neighbour {
        self.root.temp_dist = distance(self.root.p.view(), query);
        let mut best = Neighbour::of(&self.root);
        Self::descend_nearest(&mut self.root, query, &mut best);
        best
    }

    fn descend_nearest(current: &mut Node, query: ArrayView1<'_, Scalar>, best: &mut Neighbour) {
        if current.temp_dist < best.dist {
            *best = Neighbour::of(current);
        }

        for child in current.children.iter_mut() {
            child.temp_dist = distance(child.p.view(), query);
        }
        current
            .children
            .sort_by(|a, b| a.temp_dist.partial_cmp(&b.temp_dist).unwrap());

        for idx in 0..current.children.len() {
            let child = &current.children[idx];
            if best.dist > child.temp_dist - child.maxdist_ub {
                Self::descend_nearest(&mut current.children[idx], query, best);
            }
        }
    }

    /// Returns the ```k``` nearest stored points to ```query``` in ascending
    /// order of distance. A tree holding fewer than ```k``` points yields
    /// fewer than ```k``` neighbours.
    ///
    /// # Panics
    ///
    /// Panics if the query dimension differs from the tree dimension.
    pub fn near(&mut self, query: ArrayView1<'_, Scalar>, k: usize) -> Result<Vec<Neighbour>> {
        if k == 0 {
            return Err(CoverTreeError::ZeroNeighbours);
        }

        self.root.temp_dist = distance(self.root.p.view(), query);
        let mut found: Vec<Neighbour> = (0..k).map(|_| Neighbour::sentinel()).collect();
        Self::descend_near(&mut self.root, query, &mut found);
        found.retain(|n| n.dist.is_finite());
        Ok(found)
    }

    fn descend_near(current: &mut Node, query: ArrayView1<'_, Scalar>, found: &mut Vec<Neighbour>) {
        if current.temp_dist < found.last().unwrap().dist {
            let at = found.partition_point(|n| n.dist <= current.temp_dist);
            found.insert(at, Neighbour::of(current));
            found.pop();
        }

        for child in current.children.iter_mut() {
            child.temp_dist = distance(child.p.view(), query);
        }
        current
            .children
            .sort_by(|a, b| a.temp_dist.partial_cmp(&b.temp_dist).unwrap());

        for idx in 0..current.children.len() {
            let child = &current.children[idx];
            if found.last().unwrap().dist > child.temp_dist - child.maxdist_ub {
                Self::descend_near(&mut current.children[idx], query, found);
            }
        }
    }

    /// Returns every stored point strictly closer to ```query``` than
    /// ```range```, in traversal order.
    ///
    /// # Panics
    ///
    /// Panics if the query dimension differs from the tree dimension.
    pub fn range(&mut self, query: ArrayView1<'_, Scalar>, range: Scalar) -> Result<Vec<Neighbour>> {
        if range <= 0. {
            return Err(CoverTreeError::InvalidRange(range));
        }

        self.root.temp_dist = distance(self.root.p.view(), query);
        let mut found = Vec::new();
        Self::descend_range(&mut self.root, query, range, &mut found);
        Ok(found)
    }

    fn descend_range(
        current: &mut Node,
        query: ArrayView1<'_, Scalar>,
        range: Scalar,
        found: &mut Vec<Neighbour>,
    ) {
        if current.temp_dist < range {
            found.push(Neighbour::of(current));
        }

        for child in current.children.iter_mut() {
            child.temp_dist = distance(child.p.view(), query);
        }
        current
            .children
            .sort_by(|a, b| a.temp_dist.partial_cmp(&b.temp_dist).unwrap());

        for idx in 0..current.children.len() {
            let child = &current.children[idx];
            if range > child.temp_dist - child.maxdist_ub {
                Self::descend_range(&mut current.children[idx], query, range, found);
            }
        }
    }

    /// Read-only variant of [`nearest`](CoverTree::nearest): distances are
    /// threaded through the recursion instead of cached on nodes, so several
    /// threads may query one tree concurrently.
    pub fn nearest_multi(&self, query: ArrayView1<'_, Scalar>) -> Neighbour {
        let d = distance(self.root.p.view(), query);
        let mut best = Neighbour::new(d, self.root.p.clone());
        Self::descend_nearest_multi(&self.root, query, d, &mut best);
        best
    }

    fn descend_nearest_multi(
        current: &Node,
        query: ArrayView1<'_, Scalar>,
        d_current: Scalar,
        best: &mut Neighbour,
    ) {
        if d_current < best.dist {
            *best = Neighbour::new(d_current, current.p.clone());
        }

        for child in &current.children {
            let d = distance(child.p.view(), query);
            if best.dist > d - child.maxdist_ub {
                Self::descend_nearest_multi(child, query, d, best);
            }
        }
    }

    /// Read-only variant of [`near`](CoverTree::near).
    pub fn near_multi(&self, query: ArrayView1<'_, Scalar>, k: usize) -> Result<Vec<Neighbour>> {
        if k == 0 {
            return Err(CoverTreeError::ZeroNeighbours);
        }
        Ok(self.collect_near_multi(query, k))
    }

    fn collect_near_multi(&self, query: ArrayView1<'_, Scalar>, k: usize) -> Vec<Neighbour> {
        let mut found: Vec<Neighbour> = (0..k).map(|_| Neighbour::sentinel()).collect();
        let d = distance(self.root.p.view(), query);
        Self::descend_near_multi(&self.root, query, d, &mut found);
        found.retain(|n| n.dist.is_finite());
        found
    }

    fn descend_near_multi(
        current: &Node,
        query: ArrayView1<'_, Scalar>,
        d_current: Scalar,
        found: &mut Vec<Neighbour>,
    ) {
        if d_current < found.last().unwrap().dist {
            let at = found.partition_point(|n| n.dist <= d_current);
            found.insert(at, Neighbour::new(d_current, current.p.clone()));
            found.pop();
        }

        for child in &current.children {
            let d = distance(child.p.view(), query);
            if found.last().unwrap().dist > d - child.maxdist_ub {
                Self::descend_near_multi(child, query, d, found);
            }
        }
    }

    /// Read-only variant of [`range`](CoverTree::range).
    pub fn range_multi(
        &self,
        query: ArrayView1<'_, Scalar>,
        range: Scalar,
    ) -> Result<Vec<Neighbour>> {
        if range <= 0. {
            return Err(CoverTreeError::InvalidRange(range));
        }

        let mut found = Vec::new();
        let d = distance(self.root.p.view(), query);
        Self::descend_range_multi(&self.root, query, d, range, &mut found);
        Ok(found)
    }

    fn descend_range_multi(
        current: &Node,
        query: ArrayView1<'_, Scalar>,
        d_current: Scalar,
        range: Scalar,
        found: &mut Vec<Neighbour>,
    ) {
        if d_current < range {
            found.push(Neighbour::new(d_current, current.p.clone()));
        }

        for child in &current.children {
            let d = distance(child.p.view(), query);
            if range > d - child.maxdist_ub {
                Self::descend_range_multi(child, query, d, range, found);
            }
        }
    }

    /// Performs the k-nearest-neighbour search for every row of ```queries```
    /// in parallel and returns one result list per row.
    pub fn near_batch(
        &self,
        queries: ArrayView2<'_, Scalar>,
        k: usize,
    ) -> Result<Vec<Vec<Neighbour>>> {
        if k == 0 {
            return Err(CoverTreeError::ZeroNeighbours);
        }

        Ok(queries
            .axis_iter(Axis(0))
            .into_par_iter()
            .map(|query| self.collect_near_multi(query, k))
            .collect())
    }

    /// Merges ```other``` into ```self```, consuming it.
    ///
    /// The receiver must be the tree with the higher root level. Both roots
    /// are first aligned (the receiver lifted until it covers the argument's
    /// root, the argument lifted until the levels match), then the argument's
    /// nodes are classified child by child: nodes the receiver cannot cover
    /// bubble up as leftovers and are re-inserted under the root, nodes
    /// covered but separated from every existing child attach directly, and
    /// the rest recurse into the covering child.
    ///
    /// Distance upper bounds are not retightened here; run
    /// [`update`](CoverTree::update) before querying a merged tree.
    pub fn merge(&mut self, other: CoverTree) -> Result<()> {
        if self.base != other.base {
            return Err(CoverTreeError::BaseMismatch(self.base, other.base));
        }
        if self.dim != other.dim {
            return Err(CoverTreeError::DimensionMismatch {
                expected: self.dim,
                got: other.dim,
            });
        }
        if self.root.level < other.root.level {
            return Err(CoverTreeError::MergeOrder {
                receiver: self.root.level,
                argument: other.root.level,
            });
        }

        let mut other = other;
        loop {
            if distance(self.root.p.view(), other.root.p.view())
                > self.powers.covdist(self.root.level)
            {
                self.lift_root()?;
            } else if self.root.level > other.root.level {
                other.lift_root()?;
            } else {
                break;
            }
        }

        let CoverTree {
            root: other_root,
            min_scale: other_min,
            ..
        } = other;

        let leftovers =
            Self::merge_helper(&mut self.root, other_root, &self.powers, &mut self.min_scale)?;
        for node in leftovers {
            while distance(self.root.p.view(), node.p.view())
                > self.powers.covdist(self.root.level)
            {
                self.lift_root()?;
            }
            Self::descend_insert_node(&mut self.root, node, &self.powers, &mut self.min_scale)?;
        }

        self.min_scale = self.min_scale.min(other_min);
        self.max_scale = self.max_scale.max(self.root.level);
        Ok(())
    }

    /// Fuses node ```q``` into node ```p```; both sit at the same level and
    /// ```p``` covers ```q```'s point. Returns the nodes of ```q```'s subtree
    /// that ```p``` cannot cover.
    fn merge_helper(
        p: &mut Node,
        mut q: Node,
        powers: &PowerTable,
        min_scale: &mut i32,
    ) -> Result<Vec<Node>> {
        debug_assert_eq!(p.level, q.level);

        let covdist = powers.covdist(p.level);
        let mut uncovered = Vec::with_capacity(8);
        let mut sepcov = Vec::with_capacity(8);
        let mut leftovers = Vec::with_capacity(8);

        for r in mem::take(&mut q.children) {
            if distance(p.p.view(), r.p.view()) < covdist {
                let matched = p
                    .children
                    .iter()
                    .position(|s| distance(s.p.view(), r.p.view()) <= powers.covdist(s.level));
                match matched {
                    Some(idx) => leftovers.append(&mut Self::merge_helper(
                        &mut p.children[idx],
                        r,
                        powers,
                        min_scale,
                    )?),
                    None => sepcov.push(r),
                }
            } else {
                uncovered.push(r);
            }
        }

        p.children.append(&mut sepcov);

        let q_point = mem::replace(&mut q.p, Point::sentinel());
        drop(q);
        Self::descend_insert(p, q_point, powers, min_scale)?;

        for r in leftovers {
            if distance(p.p.view(), r.p.view()) <= covdist {
                Self::descend_insert_node(p, r, powers, min_scale)?;
            } else {
                uncovered.push(r);
            }
        }

        Ok(uncovered)
    }

    /// Recomputes the exact maximum descendant distance of every node with an
    /// iterative post-order walk.
    ///
    /// The walk keeps a stack of open ancestors; every node, when first
    /// reached, folds its distance into each open ancestor's running maximum,
    /// and a node leaving the stack stores its accumulated bound. Calling
    /// this twice in a row yields identical bounds.
    pub fn update(&mut self) {
        struct Frame {
            cursor: usize,
            maxdist: Scalar,
        }

        let mut frames = vec![Frame {
            cursor: 0,
            maxdist: 0.,
        }];
        let mut anchors = vec![self.root.p.data().clone()];
        let mut path: Vec<usize> = Vec::new();

        while !frames.is_empty() {
            let mut current = &mut self.root;
            for &idx in &path {
                current = &mut current.children[idx];
            }

            let depth = frames.len() - 1;
            let cursor = frames[depth].cursor;
            if cursor < current.children.len() {
                frames[depth].cursor += 1;
                let child = &current.children[cursor];
                for (frame, anchor) in frames.iter_mut().zip(anchors.iter()) {
                    let d = distance(anchor.view(), child.p.view());
                    if d > frame.maxdist {
                        frame.maxdist = d;
                    }
                }
                anchors.push(child.p.data().clone());
                path.push(cursor);
                frames.push(Frame {
                    cursor: 0,
                    maxdist: 0.,
                });
            } else {
                current.maxdist_ub = frames[depth].maxdist;
                frames.pop();
                anchors.pop();
                path.pop();
            }
        }
    }

    /// Returns the level of the root, the maximum scale of the tree.
    pub fn level(&self) -> i32 {
        self.root.level
    }

    /// Returns the lowest level at which a node has been created.
    pub fn min_level(&self) -> i32 {
        self.min_scale
    }

    /// Returns the highest level the root has reached.
    pub fn max_level(&self) -> i32 {
        self.max_scale
    }

    /// Returns the covering base of the tree.
    pub fn base(&self) -> Scalar {
        self.base
    }

    /// Returns the dimension fixed by the first point of the tree.
    pub fn dimension(&self) -> usize {
        self.dim
    }

    /// Returns the number of points in the tree.
    pub fn size(&self) -> usize {
        self.iter().count()
    }

    /// Returns a depth-first iterator over the stored points.
    pub fn iter(&self) -> Points<'_> {
        Points {
            stack: vec![&self.root],
        }
    }

    /// Checks the nesting, covering and separation invariants on every edge.
    ///
    /// # Panics
    ///
    /// Panics on the first violated edge.
    pub fn verify(&self) {
        let mut travel = vec![&self.root];
        while let Some(node) = travel.pop() {
            let covdist = self.powers.covdist(node.level);
            let sepdist = self.powers.sepdist(node.level);

            for (idx, child) in node.children.iter().enumerate() {
                assert_eq!(child.level, node.level - 1);
                assert!(distance(node.p.view(), child.p.view()) <= covdist);

                for sibling in &node.children[idx + 1..] {
                    assert!(distance(child.p.view(), sibling.p.view()) > sepdist);
                }

                travel.push(child);
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn root(&self) -> &Node {
        &self.root
    }
}

impl fmt::Display for CoverTree {
    /// Prints every ```parent -> child``` edge in depth-first order.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut travel = vec![&self.root];
        while let Some(current) = travel.pop() {
            for child in &current.children {
                writeln!(f, "{} -> {}", current, child)?;
            }
            for child in current.children.iter().rev() {
                travel.push(child);
            }
        }
        Ok(())
    }
}

/// Depth-first iterator over the points stored in a [`CoverTree`].
#[derive(Debug)]
pub struct Points<'a> {
    stack: Vec<&'a Node>,
}

impl<'a> Iterator for Points<'a> {
    type Item = &'a Point;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter());
        Some(&node.p)
    }
}

/// A build struct for constructing a [`CoverTree`] from a large batch of
/// points in parallel.
///
/// Batches below the threshold build sequentially. Larger batches are split
/// in halves built on worker threads, and the resulting trees are fused
/// pairwise by merging the lower-rooted tree into the higher-rooted one. One
/// update pass at the end tightens the distance bounds of the final tree.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CoverTreeBuilder {
    base: Scalar,
    threshold: usize,
}

impl Default for CoverTreeBuilder {
    /// Creates a builder with ```base = 1.3``` and a sequential threshold of
    /// 50 000 points.
    fn default() -> Self {
        Self {
            base: DEFAULT_BASE,
            threshold: SEQUENTIAL_THRESHOLD,
        }
    }
}

impl CoverTreeBuilder {
    /// Creates a builder with default parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the ```base``` in exponentiation when calculating the covering
    /// distance of a level.
    pub fn base(mut self, base: Scalar) -> Self {
        self.base = base;
        self
    }

    /// Sets the batch size below which construction runs sequentially.
    pub fn threshold(mut self, threshold: usize) -> Self {
        self.threshold = threshold;
        self
    }

    /// Constructs a cover tree over the given points.
    pub fn build(self, points: Vec<Point>) -> Result<CoverTree> {
        if self.base <= 1. {
            return Err(CoverTreeError::InvalidBase(self.base));
        }
        if points.is_empty() {
            return Err(CoverTreeError::EmptyBatch);
        }

        let mut tree = Self::build_recursive(&points, self.base, self.threshold.max(2))?;
        tree.update();
        Ok(tree)
    }

    fn build_recursive(points: &[Point], base: Scalar, threshold: usize) -> Result<CoverTree> {
        if points.len() < threshold {
            return CoverTree::from_slice(points, base);
        }

        let (left, right) = points.split_at(points.len() / 2);
        let (one, two) = rayon::join(
            || Self::build_recursive(left, base, threshold),
            || Self::build_recursive(right, base, threshold),
        );
        let (one, two) = (one?, two?);

        // The higher-rooted tree receives the merge.
        if one.level() >= two.level() {
            let mut one = one;
            one.merge(two)?;
            Ok(one)
        } else {
            let mut two = two;
            two.merge(one)?;
            Ok(two)
        }
    }
}
