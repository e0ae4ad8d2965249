// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! A branching-tree fractal drawn by random walk.
//!
//! Each junction of the tree is a unit-wide trunk that splits into a
//! left and a right branch.  The walk drops one random point on the
//! current junction, then either climbs into one of its branches
//! (shrinking, turning and moving its frame of reference to match) or
//! stops and starts over from the root.  Over many steps the points
//! pile up with the density of the whole tree.
//!
//! Junctions live in an arena and refer to their children by index.
//! Trees whose subtrees are all alike (symmetric, balanced) store one
//! junction per layer and point both branches at it.

use num::Complex;
use rand::Rng;

use super::DynamicalSystem;
use crate::error::{RenderError, Result};

/// How much longer a branch is than it is wide, counting the turn.
pub const LENGTH_FACTOR: f64 = 1.5;

/// Index of a junction in its [`Tree`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// Where the walk goes after dropping a point.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Branch {
    /// Start over at the root.
    Stop,
    /// Climb into the left branch.
    Left(NodeId),
    /// Climb into the right branch.
    Right(NodeId),
}

/// One split of the tree.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Junction {
    /// Share of the width (and of the probability) that goes left.
    /// The right branch gets the rest.
    pub left_p: f64,
    /// Counter-clockwise turn of the left branch, in radians.
    /// Between 0 and pi/2 keeps branches from folding into themselves.
    pub left_angle: f64,
    /// Clockwise turn of the right branch, in radians.
    pub right_angle: f64,
    /// The left branch, if the tree continues that way.
    pub left: Option<NodeId>,
    /// The right branch, if the tree continues that way.
    pub right: Option<NodeId>,
}

impl Junction {
    /// A junction with no branches.
    pub fn leaf(left_p: f64, left_angle: f64, right_angle: f64) -> Self {
        Junction {
            left_p,
            left_angle,
            right_angle,
            left: None,
            right: None,
        }
    }

    /// Where the left branch's own frame starts, in this junction's frame.
    pub fn left_origin(&self) -> Complex<f64> {
        let length = LENGTH_FACTOR - 0.5 * self.left_angle * self.left_p;
        Complex::new(-length * self.left_angle.sin(), length * self.left_angle.cos())
    }

    /// Where the right branch's own frame starts, in this junction's
    /// frame.  Mirrors the left one around the split.
    pub fn right_origin(&self) -> Complex<f64> {
        let w = 1.0 - self.left_p;
        let length = LENGTH_FACTOR - 0.5 * self.right_angle * w;
        Complex::new(
            1.0 + length * self.right_angle.sin() - w * self.right_angle.cos(),
            length * self.right_angle.cos() + w * self.right_angle.sin(),
        )
    }

    /// Pick the next move from a uniform draw in [0, 1).  Left with
    /// probability `p^2`, right with `(1-p)^2`, otherwise stop.  A
    /// missing branch means stop.
    pub fn choose(&self, draw: f64) -> Branch {
        let p = self.left_p;
        let q = 1.0 - p;
        if draw < p * p {
            self.left.map_or(Branch::Stop, Branch::Left)
        } else if draw < p * p + q * q {
            self.right.map_or(Branch::Stop, Branch::Right)
        } else {
            Branch::Stop
        }
    }

    /// A random point on this junction, in its own frame, spread
    /// evenly over its area.  The junction's base spans (0, 0) to
    /// (1, 0) and it grows upward; the left branch leans left and the
    /// right branch is its mirror.
    pub fn random_point<R: Rng + ?Sized>(&self, rng: &mut R) -> Complex<f64> {
        let is_left = rng.gen::<f64>() < self.left_p;
        let (angle, width) = if is_left {
            (self.left_angle, self.left_p)
        } else {
            (self.right_angle, 1.0 - self.left_p)
        };

        // The turn is a slice of a circle: its area is half the angle
        // times the width squared, out of a total of LENGTH_FACTOR.
        let turn_p = 0.5 * angle * width / LENGTH_FACTOR;
        let is_turn = rng.gen::<f64>() < turn_p;

        let (mut across, mut along) = (rng.gen::<f64>(), rng.gen::<f64>());
        if is_turn {
            // Favour the outside of the turn, where there is more area.
            across = across.sqrt();
            along *= angle;
        } else {
            along *= LENGTH_FACTOR - 0.5 * angle * width;
        }
        across *= width;

        let (dx, dy) = if is_turn {
            (across * along.cos(), across * along.sin())
        } else {
            (
                across * angle.cos() - along * angle.sin(),
                across * angle.sin() + along * angle.cos(),
            )
        };

        if is_left {
            Complex::new(dx, dy)
        } else {
            Complex::new(1.0 - dx, dy)
        }
    }
}

/// An arena of junctions with a root.
#[derive(Clone, Debug, Default)]
pub struct Tree {
    nodes: Vec<Junction>,
    root: Option<NodeId>,
}

/// The branch angles of a balanced junction: the narrower branch turns
/// by `angle`, the wider one by just enough to keep the two parallel.
fn balanced_angles(angle: f64, left_p: f64) -> (f64, f64) {
    if left_p < 0.5 {
        (angle, ((left_p / (1.0 - left_p)) * angle.sin()).asin())
    } else {
        ((((1.0 - left_p) / left_p) * angle.sin()).asin(), angle)
    }
}

impl Tree {
    /// An empty tree.
    pub fn new() -> Self {
        Tree::default()
    }

    /// Store a junction and return its index.
    pub fn push(&mut self, junction: Junction) -> NodeId {
        self.nodes.push(junction);
        NodeId(self.nodes.len() - 1)
    }

    /// Look up a junction.  Ids are only meaningful for the tree that
    /// issued them.
    pub fn get(&self, id: NodeId) -> &Junction {
        &self.nodes[id.0]
    }

    /// The junction the walk starts from.
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Make `id` the root.
    pub fn set_root(&mut self, id: NodeId) {
        self.root = Some(id);
    }

    /// Number of stored junctions.  Shared subtrees are counted once.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree has no junctions.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Longest chain of junctions from the root.
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut frontier: Vec<NodeId> = self.root.into_iter().collect();
        while !frontier.is_empty() {
            depth += 1;
            let mut next: Vec<NodeId> = frontier
                .iter()
                .flat_map(|&id| {
                    let j = self.get(id);
                    j.left.into_iter().chain(j.right)
                })
                .collect();
            next.sort_by_key(|id| id.0);
            next.dedup();
            frontier = next;
        }
        depth
    }

    /// Build a tree from the leaves up, one shared junction per layer.
    fn layered<F>(layers: usize, mut junction: F) -> Self
    where
        F: FnMut() -> Junction,
    {
        let mut tree = Tree::new();
        let mut child = None;
        for _ in 0..layers {
            let id = tree.push(Junction {
                left: child,
                right: child,
                ..junction()
            });
            child = Some(id);
        }
        tree.root = child;
        tree
    }

    /// Every junction splits evenly and both branches turn by `angle`.
    pub fn symmetric(layers: usize, angle: f64) -> Self {
        Tree::layered(layers, || Junction::leaf(0.5, angle, angle))
    }

    /// Every junction splits `left_p` to the left.  The narrower
    /// branch turns by `angle` and the wider one by just enough to
    /// stay parallel to it.
    pub fn balanced_constant(layers: usize, angle: f64, left_p: f64) -> Self {
        let (left_angle, right_angle) = balanced_angles(angle, left_p);
        Tree::layered(layers, || Junction::leaf(left_p, left_angle, right_angle))
    }

    /// Every junction gets its own random split (between 0.2 and 0.8)
    /// and turn (between 0.2 and 0.8 of pi/3).  Nothing is shared, so
    /// this stores `2^layers - 1` junctions.
    pub fn random_balanced<R: Rng + ?Sized>(layers: usize, rng: &mut R) -> Self {
        fn grow<R: Rng + ?Sized>(tree: &mut Tree, layers: usize, rng: &mut R) -> Option<NodeId> {
            if layers == 0 {
                return None;
            }
            let left_p = rng.gen::<f64>() * 0.6 + 0.2;
            let angle = std::f64::consts::FRAC_PI_3 * (rng.gen::<f64>() * 0.6 + 0.2);
            let (left_angle, right_angle) = balanced_angles(angle, left_p);
            let left = grow(tree, layers - 1, rng);
            let right = grow(tree, layers - 1, rng);
            Some(tree.push(Junction {
                left,
                right,
                ..Junction::leaf(left_p, left_angle, right_angle)
            }))
        }

        let mut tree = Tree::new();
        let root = grow(&mut tree, layers, rng);
        tree.root = root;
        tree
    }

    /// Put a straight, full-width trunk under the current root.
    pub fn with_trunk(mut self) -> Self {
        let root = self.root;
        let trunk = self.push(Junction {
            left: root,
            ..Junction::leaf(1.0, 0.0, 0.0)
        });
        self.root = Some(trunk);
        self
    }
}

/// A junction's frame of reference: scale, then rotate, then move.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Frame {
    /// Size relative to the root.
    pub scale: f64,
    /// Counter-clockwise rotation relative to the root.
    pub angle: f64,
    /// Where the frame's origin sits in root coordinates.
    pub offset: Complex<f64>,
}

impl Frame {
    /// The root's frame.
    pub fn identity() -> Self {
        Frame {
            scale: 1.0,
            angle: 0.0,
            offset: Complex::new(0.0, 0.0),
        }
    }

    /// Map a point from this frame into root coordinates.
    pub fn apply(&self, point: Complex<f64>) -> Complex<f64> {
        point * Complex::from_polar(self.scale, self.angle) + self.offset
    }
}

/// The walk's position: which junction, in what frame, and the point
/// it just dropped.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct WalkState {
    /// Current junction.
    pub node: NodeId,
    /// The junction's frame.
    pub frame: Frame,
    /// Last point dropped, in root coordinates.
    pub point: Complex<f64>,
}

/// A random walk over a [`Tree`].  The walk never ends on its own;
/// orbit length is set by the sampler.
#[derive(Clone, Debug)]
pub struct TreeWalk {
    tree: Tree,
    root: NodeId,
}

impl TreeWalk {
    /// Fails when the tree has no root.
    pub fn new(tree: Tree) -> Result<Self> {
        match tree.root() {
            Some(root) => Ok(TreeWalk { tree, root }),
            None => Err(RenderError::InvalidConfig("the tree has no junctions".to_string())),
        }
    }

    /// The tree being walked.
    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    fn drop_point<R: Rng + ?Sized>(&self, node: NodeId, frame: Frame, rng: &mut R) -> WalkState {
        WalkState {
            node,
            frame,
            point: frame.apply(self.tree.get(node).random_point(rng)),
        }
    }
}

impl DynamicalSystem for TreeWalk {
    type State = WalkState;

    fn start<R: Rng + ?Sized>(&self, _point: Complex<f64>, rng: &mut R) -> WalkState {
        self.drop_point(self.root, Frame::identity(), rng)
    }

    fn next<R: Rng + ?Sized>(&self, state: WalkState, _step: usize, rng: &mut R) -> WalkState {
        let junction = self.tree.get(state.node);
        let frame = state.frame;
        let (node, frame) = match junction.choose(rng.gen()) {
            Branch::Stop => (self.root, Frame::identity()),
            Branch::Left(child) => (
                child,
                Frame {
                    scale: frame.scale * junction.left_p,
                    angle: frame.angle + junction.left_angle,
                    offset: frame.apply(junction.left_origin()),
                },
            ),
            Branch::Right(child) => (
                child,
                Frame {
                    scale: frame.scale * (1.0 - junction.left_p),
                    angle: frame.angle - junction.right_angle,
                    offset: frame.apply(junction.right_origin()),
                },
            ),
        };
        self.drop_point(node, frame, rng)
    }

    fn is_terminal(&self, state: &WalkState, _steps: usize) -> bool {
        !(state.point.re.is_finite() && state.point.im.is_finite())
    }

    fn position(&self, state: &WalkState) -> Complex<f64> {
        state.point
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn symmetric_trees_share_one_junction_per_layer() {
        let tree = Tree::symmetric(20, 0.6);
        assert_eq!(tree.len(), 20);
        assert_eq!(tree.depth(), 20);
        let root = tree.get(tree.root().unwrap());
        assert!(root.left.is_some());
        assert_eq!(root.left, root.right);
        assert_eq!(root.left_p, 0.5);
    }

    #[test]
    fn zero_layers_is_an_empty_tree() {
        let tree = Tree::symmetric(0, 0.6);
        assert!(tree.is_empty());
        assert_eq!(tree.root(), None);
        assert!(TreeWalk::new(tree).is_err());
    }

    #[test]
    fn balanced_trees_turn_the_narrow_branch_by_the_angle() {
        let tree = Tree::balanced_constant(3, 0.6, 0.6);
        let j = tree.get(tree.root().unwrap());
        assert_eq!(j.right_angle, 0.6);
        assert!((j.left_angle - ((0.4 / 0.6) * 0.6_f64.sin()).asin()).abs() < 1e-15);
        assert_eq!(tree.len(), 3);

        let tree = Tree::balanced_constant(3, 0.6, 0.3);
        let j = tree.get(tree.root().unwrap());
        assert_eq!(j.left_angle, 0.6);
        assert!(j.right_angle < 0.6);
    }

    #[test]
    fn random_trees_share_nothing() {
        let mut rng = StdRng::seed_from_u64(17);
        let tree = Tree::random_balanced(4, &mut rng);
        assert_eq!(tree.len(), 15);
        assert_eq!(tree.depth(), 4);
        let root = tree.get(tree.root().unwrap());
        assert_ne!(root.left, root.right);
        for i in 0..tree.len() {
            let p = tree.get(NodeId(i)).left_p;
            assert!(p >= 0.2 && p < 0.8);
        }
    }

    #[test]
    fn a_trunk_always_climbs() {
        let tree = Tree::symmetric(2, 0.6).with_trunk();
        assert_eq!(tree.depth(), 3);
        let trunk = tree.get(tree.root().unwrap());
        assert_eq!(trunk.right, None);
        for &draw in &[0.0, 0.5, 0.999_999] {
            assert!(matches!(trunk.choose(draw), Branch::Left(_)));
        }
    }

    #[test]
    fn choices_follow_squared_shares() {
        let j = Junction {
            left: Some(NodeId(1)),
            right: Some(NodeId(2)),
            ..Junction::leaf(0.6, 0.3, 0.3)
        };
        assert_eq!(j.choose(0.3), Branch::Left(NodeId(1)));
        assert_eq!(j.choose(0.4), Branch::Right(NodeId(2)));
        assert_eq!(j.choose(0.6), Branch::Stop);
        assert_eq!(Junction::leaf(0.6, 0.3, 0.3).choose(0.3), Branch::Stop);
    }

    #[test]
    fn straight_junctions_fill_their_box() {
        let j = Junction::leaf(0.5, 0.0, 0.0);
        let mut rng = StdRng::seed_from_u64(2);
        for _ in 0..1000 {
            let p = j.random_point(&mut rng);
            assert!(p.re >= 0.0 && p.re <= 1.0, "{}", p);
            assert!(p.im >= 0.0 && p.im <= LENGTH_FACTOR, "{}", p);
        }
    }

    #[test]
    fn frames_scale_then_rotate_then_move() {
        let frame = Frame {
            scale: 2.0,
            angle: std::f64::consts::FRAC_PI_2,
            offset: Complex::new(1.0, 1.0),
        };
        let p = frame.apply(Complex::new(1.0, 0.0));
        assert!((p - Complex::new(1.0, 3.0)).norm() < 1e-12);
    }

    #[test]
    fn leaves_send_the_walk_home() {
        let mut tree = Tree::new();
        let root = tree.push(Junction::leaf(0.5, 0.0, 0.0));
        tree.set_root(root);
        let walk = TreeWalk::new(tree).unwrap();
        let mut rng = StdRng::seed_from_u64(9);
        let mut state = walk.start(Complex::new(0.0, 0.0), &mut rng);
        for step in 0..100 {
            state = walk.next(state, step, &mut rng);
            assert_eq!(state.node, root);
            assert_eq!(state.frame, Frame::identity());
        }
    }

    #[test]
    fn long_walks_stay_finite_and_near_the_root() {
        let walk = TreeWalk::new(Tree::symmetric(20, 0.6).with_trunk()).unwrap();
        let mut rng = StdRng::seed_from_u64(4);
        let mut state = walk.start(Complex::new(0.0, 0.0), &mut rng);
        let mut climbed = false;
        for step in 0..10_000 {
            state = walk.next(state, step, &mut rng);
            assert!(!walk.is_terminal(&state, step + 1));
            assert!(state.point.norm() < 20.0, "{}", state.point);
            climbed |= state.frame.scale < 1.0;
        }
        assert!(climbed);
    }
}
