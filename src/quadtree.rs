use crate::{error::WorldError, star::Star};
use ultraviolet::DVec2;

/// Represents a square region in the quadtree.
/// Used to define the bounds of aggregate nodes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Quad {
    /// Geometric center, distinct from the center of mass.
    pub center: DVec2,
    pub size: f64,
}

impl Quad {
    /// Creates a new Quad that encompasses all the given stars.
    /// It is centered on the bounding box and as wide as its larger side, so cells stay square.
    pub fn new_containing(stars: &[Star]) -> Self {
        let mut min_x = f64::INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut max_y = f64::NEG_INFINITY;

        for star in stars {
            min_x = min_x.min(star.pos.x);
            min_y = min_y.min(star.pos.y);
            max_x = max_x.max(star.pos.x);
            max_y = max_y.max(star.pos.y);
        }

        let center = DVec2::new(min_x + max_x, min_y + max_y) * 0.5;
        let size = (max_x - min_x).max(max_y - min_y);

        Self { center, size }
    }

    /// Determines which quadrant a position falls into relative to the quad's center.
    /// Returns an index from 0 to 3:
    /// 0: Bottom-Left, 1: Bottom-Right, 2: Top-Left, 3: Top-Right
    pub fn find_quadrant(&self, pos: DVec2) -> usize {
        ((pos.y > self.center.y) as usize) << 1 | (pos.x > self.center.x) as usize
    }

    /// Transforms the current Quad into one of its sub-quadrants:
    /// half the size, center shifted by a quarter of the size toward the quadrant.
    pub fn into_quadrant(mut self, quadrant: usize) -> Self {
        self.size *= 0.5;
        self.center.x += ((quadrant & 1) as f64 - 0.5) * self.size;
        self.center.y += ((quadrant >> 1) as f64 - 0.5) * self.size;
        self
    }
}

/// Content of one quadrant slot of an aggregate node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Child {
    #[default]
    Empty,
    /// Leaf: index of the first star of a bucket (usually a bucket of one).
    Star(u32),
    /// Index of another aggregate in the node pool.
    Node(u32),
}

/// An aggregate node: the summed mass of everything below it.
#[derive(Clone, Debug)]
pub struct Node {
    /// Center of mass.
    pub pos: DVec2,
    /// Total mass.
    pub mass: f64,
    /// Spatial bounds.
    pub quad: Quad,
    pub children: [Child; 4],
}

impl Node {
    pub fn new(quad: Quad) -> Self {
        Self {
            pos: DVec2::zero(),
            mass: 0.0,
            quad,
            children: [Child::Empty; 4],
        }
    }

    /// Folds a point mass into the running center of mass.
    fn add(&mut self, pos: DVec2, mass: f64) {
        let sum = self.mass + mass;
        if sum != 0.0 {
            self.pos = (self.pos * self.mass + pos * mass) / sum;
        }
        self.mass = sum;
    }
}

/// Position and mass of a star, snapshotted when the tree is built.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point {
    pub pos: DVec2,
    pub mass: f64,
}

const NO_STAR: u32 = u32::MAX;

/// Iterator over the stars sharing one leaf slot.
pub struct Bucket<'a> {
    next: &'a [u32],
    current: u32,
}

impl Iterator for Bucket<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.current == NO_STAR {
            return None;
        }
        let star = self.current as usize;
        self.current = self.next[star];
        Some(star)
    }
}

fn bucket(next: &[u32], head: usize) -> Bucket<'_> {
    Bucket {
        next,
        current: head as u32,
    }
}

/// The Barnes-Hut quadtree.
///
/// Aggregates live in a node pool that is allocated once and reused every
/// frame; [`Quadtree::ROOT`] is always the first slot. Leaves are star indices.
/// Stars that share exact coordinates, or that still collide at
/// [`Quadtree::MAX_DEPTH`], are chained into one leaf bucket instead of being
/// split further.
#[derive(Debug)]
pub struct Quadtree {
    /// Opening-angle threshold.
    pub accuracy: f64,
    /// Softening term.
    pub epsilon: f64,
    /// The node pool. Only the first `len()` slots are in use.
    pub nodes: Vec<Node>,
    /// Star snapshots, indexed like the particle store.
    pub points: Vec<Point>,
    /// Next star in the same bucket, `NO_STAR` terminated.
    next: Vec<u32>,
    capacity: usize,
    limit: usize,
    bucketed: usize,
}

impl Quadtree {
    pub const ROOT: usize = 0;
    /// Deepest aggregate level; the root is level zero.
    pub const MAX_DEPTH: usize = 48;

    /// Pool size preallocated for `stars` stars: two aggregates per star plus
    /// one degenerate chain down to the depth limit.
    pub fn capacity_for(stars: usize) -> usize {
        2 * stars + Self::MAX_DEPTH
    }

    /// Most aggregates a tree over `stars` stars can use: the root plus at most
    /// one split per level for every insertion.
    pub fn max_nodes(stars: usize) -> usize {
        1 + stars * Self::MAX_DEPTH
    }

    /// Creates a tree for `stars` stars. The pool is preallocated with
    /// [`Quadtree::capacity_for`] slots and grows, up to [`Quadtree::max_nodes`],
    /// when close pairs need deep chains.
    pub fn new(stars: usize, accuracy: f64, epsilon: f64) -> Self {
        let mut tree = Self::with_capacity(Self::capacity_for(stars), accuracy, epsilon);
        tree.limit = Self::max_nodes(stars);
        tree
    }

    /// Creates a tree whose node pool holds exactly `capacity` aggregates and never grows.
    pub fn with_capacity(capacity: usize, accuracy: f64, epsilon: f64) -> Self {
        Self {
            accuracy,
            epsilon,
            nodes: Vec::with_capacity(capacity),
            points: Vec::new(),
            next: Vec::new(),
            capacity,
            limit: capacity,
            bucketed: 0,
        }
    }

    /// Slots currently reserved for the pool.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Hard ceiling on the pool size.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Number of aggregates in use.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn root(&self) -> Option<&Node> {
        self.nodes.get(Self::ROOT)
    }

    /// Stars that were chained into an existing leaf during the last build.
    pub fn bucketed(&self) -> usize {
        self.bucketed
    }

    /// Stars stored in the leaf slot whose first star is `head`.
    pub fn bucket(&self, head: usize) -> Bucket<'_> {
        bucket(&self.next, head)
    }

    /// Returns the node pool to its empty state. Allocations are kept.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.points.clear();
        self.next.clear();
        self.bucketed = 0;
    }

    /// Builds the tree over `stars`, inserting them in store order.
    pub fn build(&mut self, stars: &[Star]) -> Result<(), WorldError> {
        self.clear();
        if stars.is_empty() {
            return Ok(());
        }

        self.points.extend(stars.iter().map(|star| Point {
            pos: star.pos,
            mass: star.mass,
        }));
        self.next.resize(stars.len(), NO_STAR);
        self.alloc(Quad::new_containing(stars))?;

        for index in 0..stars.len() {
            self.insert(index)?;
        }

        if self.bucketed > 0 {
            log::warn!(
                "{} stars coincide with a neighbour and were bucketed",
                self.bucketed
            );
        }
        if self.nodes.len() > self.capacity {
            log::warn!(
                "node pool grew from {} to {} aggregates",
                self.capacity,
                self.nodes.len()
            );
            self.capacity = self.nodes.len();
        }
        Ok(())
    }

    fn alloc(&mut self, quad: Quad) -> Result<usize, WorldError> {
        if self.nodes.len() >= self.limit {
            return Err(WorldError::NodePoolExhausted {
                capacity: self.limit,
            });
        }
        self.nodes.push(Node::new(quad));
        Ok(self.nodes.len() - 1)
    }

    /// Inserts one star, folding its mass into every aggregate on the way down.
    fn insert(&mut self, index: usize) -> Result<(), WorldError> {
        let Point { pos, mass } = self.points[index];
        let mut node = Self::ROOT;
        let mut depth = 0;

        loop {
            self.nodes[node].add(pos, mass);
            let quadrant = self.nodes[node].quad.find_quadrant(pos);

            match self.nodes[node].children[quadrant] {
                Child::Empty => {
                    self.nodes[node].children[quadrant] = Child::Star(index as u32);
                    return Ok(());
                }
                Child::Node(child) => node = child as usize,
                Child::Star(leaf) => {
                    let leaf = leaf as usize;
                    if depth >= Self::MAX_DEPTH || self.points[leaf].pos == pos {
                        self.chain(leaf, index);
                        return Ok(());
                    }

                    // Split: the old leaf (with its whole bucket) moves one level down.
                    let quad = self.nodes[node].quad.into_quadrant(quadrant);
                    let split = self.alloc(quad)?;
                    for member in bucket(&self.next, leaf) {
                        let point = self.points[member];
                        self.nodes[split].add(point.pos, point.mass);
                    }
                    let leaf_quadrant = quad.find_quadrant(self.points[leaf].pos);
                    self.nodes[split].children[leaf_quadrant] = Child::Star(leaf as u32);
                    self.nodes[node].children[quadrant] = Child::Node(split as u32);
                    node = split;
                }
            }
            depth += 1;
        }
    }

    fn chain(&mut self, head: usize, index: usize) {
        self.next[index] = self.next[head];
        self.next[head] = index as u32;
        self.bucketed += 1;
    }

    /// Approximate, unscaled gravitational acceleration on star `index` at `pos`.
    /// The star's own leaf never contributes.
    pub fn acc(&self, index: usize, pos: DVec2) -> DVec2 {
        let mut acc = DVec2::zero();
        if !self.nodes.is_empty() {
            self.walk(Self::ROOT, index, pos, &mut acc);
        }
        acc
    }

    fn walk(&self, node: usize, index: usize, pos: DVec2, acc: &mut DVec2) {
        let n = &self.nodes[node];
        let d = n.pos - pos;
        let d_sq = d.mag_sq();

        // Far enough: treat the whole aggregate as one point mass
        if d_sq.sqrt() > n.quad.size * self.accuracy {
            *acc += self.pull(d, d_sq, n.mass);
            return;
        }

        for child in n.children {
            match child {
                Child::Empty => {}
                Child::Node(child) => self.walk(child as usize, index, pos, acc),
                Child::Star(head) => {
                    for member in bucket(&self.next, head as usize) {
                        if member == index {
                            continue;
                        }
                        let point = self.points[member];
                        let d = point.pos - pos;
                        let d_sq = d.mag_sq();
                        // zero distance: a star with the same coordinates
                        if d_sq > 0.0 {
                            *acc += self.pull(d, d_sq, point.mass);
                        }
                    }
                }
            }
        }
    }

    /// `mass / (d² + ε)` along the unit vector of `d`.
    #[inline(always)]
    fn pull(&self, d: DVec2, d_sq: f64, mass: f64) -> DVec2 {
        d * (mass / ((d_sq + self.epsilon) * d_sq.sqrt()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::Config, galaxy};

    fn star(x: f64, y: f64, mass: f64) -> Star {
        Star::new(DVec2::new(x, y), DVec2::zero(), mass)
    }

    fn tree_for(stars: &[Star]) -> Quadtree {
        let mut tree = Quadtree::new(stars.len(), 1.0, 0.01);
        tree.build(stars).unwrap();
        tree
    }

    /// Collects every star reachable from `node`, checking that each child sits
    /// in the quadrant its slot claims.
    fn collect(tree: &Quadtree, node: usize, found: &mut Vec<usize>) {
        let n = &tree.nodes[node];
        for (quadrant, child) in n.children.iter().enumerate() {
            match *child {
                Child::Empty => {}
                Child::Node(child) => {
                    let center = tree.nodes[child as usize].quad.center;
                    assert_eq!(n.quad.find_quadrant(center), quadrant);
                    collect(tree, child as usize, found);
                }
                Child::Star(head) => {
                    for member in tree.bucket(head as usize) {
                        assert_eq!(n.quad.find_quadrant(tree.points[member].pos), quadrant);
                        found.push(member);
                    }
                }
            }
        }
    }

    #[test]
    fn quadrant_numbering() {
        let quad = Quad {
            center: DVec2::zero(),
            size: 2.0,
        };
        assert_eq!(quad.find_quadrant(DVec2::new(-1.0, -1.0)), 0);
        assert_eq!(quad.find_quadrant(DVec2::new(1.0, -1.0)), 1);
        assert_eq!(quad.find_quadrant(DVec2::new(-1.0, 1.0)), 2);
        assert_eq!(quad.find_quadrant(DVec2::new(1.0, 1.0)), 3);
        // on the center line counts as the lower/left side
        assert_eq!(quad.find_quadrant(DVec2::zero()), 0);
    }

    #[test]
    fn sub_quadrants_are_offset_by_a_quarter() {
        let quad = Quad {
            center: DVec2::new(1.0, 1.0),
            size: 4.0,
        };
        let upper_right = quad.into_quadrant(3);
        assert_eq!(upper_right.size, 2.0);
        assert_eq!(upper_right.center, DVec2::new(2.0, 2.0));
        let lower_right = quad.into_quadrant(1);
        assert_eq!(lower_right.center, DVec2::new(2.0, 0.0));
    }

    #[test]
    fn root_is_square_around_bounding_box() {
        let stars = [star(-1.0, 0.0, 1.0), star(3.0, 1.0, 1.0)];
        let quad = Quad::new_containing(&stars);
        assert_eq!(quad.center, DVec2::new(1.0, 0.5));
        assert_eq!(quad.size, 4.0);
    }

    #[test]
    fn root_mass_is_running_sum() {
        let config = Config {
            stars: 2000,
            ..Config::default()
        };
        let stars = galaxy::uniform_disc(&config);
        let tree = tree_for(&stars);

        let root = tree.root().unwrap();
        let total = stars.iter().fold(0.0, |sum, star| sum + star.mass);
        assert_eq!(root.mass, total);

        let moment = stars
            .iter()
            .fold(DVec2::zero(), |sum, star| sum + star.pos * star.mass);
        let com = moment / total;
        assert!((root.pos - com).mag() < 1e-9 * (1.0 + com.mag()));
    }

    #[test]
    fn every_star_reachable_and_node_count_bounded() {
        let config = Config {
            stars: 1000,
            seed: 7,
            ..Config::default()
        };
        let stars = galaxy::uniform_disc(&config);
        let tree = tree_for(&stars);

        assert!(tree.len() <= 2 * stars.len() - 1);
        assert_eq!(tree.bucketed(), 0);

        let mut found = Vec::new();
        collect(&tree, Quadtree::ROOT, &mut found);
        found.sort_unstable();
        assert_eq!(found, (0..stars.len()).collect::<Vec<_>>());
    }

    #[test]
    fn split_moves_existing_leaf_down() {
        let stars = [star(0.0, 0.0, 1.0), star(1.5, 1.5, 1.0), star(4.0, 4.0, 1.0)];
        let tree = tree_for(&stars);

        // root center (2, 2): the first two share quadrant 0
        assert_eq!(tree.len(), 2);
        let root = tree.root().unwrap();
        assert_eq!(root.children[0], Child::Node(1));
        assert_eq!(root.children[3], Child::Star(2));

        let split = &tree.nodes[1];
        assert_eq!(split.quad.size, 2.0);
        assert_eq!(split.quad.center, DVec2::new(1.0, 1.0));
        assert_eq!(split.mass, 2.0);
        assert_eq!(split.pos, DVec2::new(0.75, 0.75));
        assert_eq!(split.children[0], Child::Star(0));
        assert_eq!(split.children[3], Child::Star(1));
        assert_eq!(split.children[1], Child::Empty);
    }

    #[test]
    fn coincident_stars_are_bucketed() {
        let stars = [star(1.0, 1.0, 1.0), star(1.0, 1.0, 2.0), star(-3.0, 1.0, 1.0)];
        let tree = tree_for(&stars);
        assert_eq!(tree.bucketed(), 1);
        assert_eq!(tree.root().unwrap().mass, 4.0);

        let mut found = Vec::new();
        collect(&tree, Quadtree::ROOT, &mut found);
        found.sort_unstable();
        assert_eq!(found, vec![0, 1, 2]);

        // the twin at zero distance exerts nothing, only the third star pulls
        let acc = tree.acc(0, stars[0].pos);
        assert!(acc.x < 0.0);
        assert_eq!(acc.y, 0.0);
        assert!(acc.x.is_finite());
    }

    #[test]
    fn bucket_moves_down_whole_when_split() {
        let stars = [
            star(1.0, 0.0, 1.0),
            star(1.0, 0.0, 1.0),
            star(0.5, -0.5, 2.0),
            star(-3.0, 1.0, 1.0),
        ];
        let tree = tree_for(&stars);
        assert_eq!(tree.bucketed(), 1);

        // root center (-1, 0.25): the twins and the third star share quadrant 1
        let root = tree.root().unwrap();
        assert_eq!(root.children[1], Child::Node(1));
        assert_eq!(root.children[2], Child::Star(3));

        // quadrant 1 needs two splits before the third star separates
        assert_eq!(tree.len(), 3);
        assert_eq!(tree.nodes[1].mass, 4.0);
        assert_eq!(tree.nodes[1].children[3], Child::Node(2));
        let split = &tree.nodes[2];
        assert_eq!(split.mass, 4.0);
        assert_eq!(split.children[3], Child::Star(0));
        assert_eq!(split.children[0], Child::Star(2));
        assert_eq!(tree.bucket(0).collect::<Vec<_>>(), vec![0, 1]);

        let mut found = Vec::new();
        collect(&tree, Quadtree::ROOT, &mut found);
        found.sort_unstable();
        assert_eq!(found, vec![0, 1, 2, 3]);
    }

    #[test]
    fn pool_grows_for_close_pairs() {
        let stars = [
            star(0.0, 0.0, 1.0),
            star(1e-12, 0.0, 1.0),
            star(1.0, 1.0, 1.0),
            star(1.0, 1.0 - 1e-12, 1.0),
        ];
        let mut tree = Quadtree::new(stars.len(), 1.0, 0.01);
        let preallocated = tree.capacity();
        tree.build(&stars).unwrap();

        assert!(tree.len() > preallocated);
        assert!(tree.len() <= Quadtree::max_nodes(stars.len()));
        assert_eq!(tree.capacity(), tree.len());
        assert_eq!(tree.bucketed(), 0);

        let mut found = Vec::new();
        collect(&tree, Quadtree::ROOT, &mut found);
        found.sort_unstable();
        assert_eq!(found, vec![0, 1, 2, 3]);
    }

    #[test]
    fn depth_is_limited_for_near_coincident_stars() {
        let stars = [
            star(0.0, 0.0, 1.0),
            star(1e-300, 0.0, 1.0),
            star(1.0, 1.0, 1.0),
        ];
        let tree = tree_for(&stars);
        assert!(tree.len() <= Quadtree::MAX_DEPTH + 1);
        assert_eq!(tree.bucketed(), 1);

        let acc = tree.acc(0, stars[0].pos);
        assert!(acc.x.is_finite() && acc.y.is_finite());
    }

    #[test]
    fn single_star_feels_nothing_from_itself() {
        let stars = [star(0.0, 0.0, 5.0), star(10.0, 0.0, 1e-300)];
        let tree = tree_for(&stars);
        let acc = tree.acc(0, stars[0].pos);
        assert!(acc.mag() < 1e-300);
    }

    #[test]
    fn pair_attracts_with_softened_inverse_square() {
        let stars = [star(-1.0, 0.0, 3.0), star(1.0, 0.0, 2.0)];
        let tree = tree_for(&stars);

        let acc = tree.acc(0, stars[0].pos);
        let expected = 2.0 / (4.0 + tree.epsilon);
        assert!((acc.x - expected).abs() < 1e-12);
        assert_eq!(acc.y, 0.0);

        let acc = tree.acc(1, stars[1].pos);
        let expected = 3.0 / (4.0 + tree.epsilon);
        assert!((acc.x + expected).abs() < 1e-12);
    }

    #[test]
    fn distant_cluster_is_summarized() {
        let stars = [
            star(100.0, 100.0, 1.0),
            star(101.0, 101.0, 1.0),
            star(101.0, 100.0, 1.0),
            star(100.0, 101.0, 1.0),
            star(-100.0, -100.0, 1.0),
        ];
        let mut tree = Quadtree::new(stars.len(), 1.5, 0.0);
        tree.build(&stars).unwrap();

        let acc = tree.acc(4, stars[4].pos);
        // the cluster is far away compared to its size: one point mass of 4 at its center
        let d = DVec2::new(200.5, 200.5);
        let expected = d * (4.0 / (d.mag_sq() * d.mag()));
        assert!((acc - expected).mag() < 1e-3 * expected.mag());
    }

    #[test]
    fn pool_exhaustion_is_reported() {
        let stars = [star(0.0, 0.0, 1.0), star(1.0, 1.0, 1.0), star(4.0, 4.0, 1.0)];
        let mut tree = Quadtree::with_capacity(1, 1.0, 0.01);
        assert!(matches!(
            tree.build(&stars),
            Err(WorldError::NodePoolExhausted { capacity: 1 })
        ));
    }

    #[test]
    fn clear_keeps_pool_allocation() {
        let stars = [star(0.0, 0.0, 1.0), star(1.0, 1.0, 1.0)];
        let mut tree = tree_for(&stars);
        let allocated = tree.nodes.capacity();
        tree.clear();
        assert!(tree.is_empty());
        assert!(tree.root().is_none());
        assert_eq!(tree.nodes.capacity(), allocated);
    }
}
