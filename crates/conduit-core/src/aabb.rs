//! Axis-aligned bounding boxes and a dynamic bounding-volume tree.
//!
//! [`AabbTree`] keeps one leaf per inserted box and groups leaves under
//! branches whose boxes enclose their children. Insertion descends toward the
//! sibling that grows the tree's surface area least; removal promotes the
//! removed leaf's sibling into its parent's slot. Overlap queries prune every
//! branch whose box misses the query.

use std::ops::{Add, Mul, Sub};

use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

use crate::id::ProxyId;

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// A point or direction in world space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3::new(0.0, 0.0, 0.0);

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub const fn splat(v: f64) -> Self {
        Self::new(v, v, v)
    }

    pub fn min(self, other: Vec3) -> Vec3 {
        Vec3::new(
            self.x.min(other.x),
            self.y.min(other.y),
            self.z.min(other.z),
        )
    }

    pub fn max(self, other: Vec3) -> Vec3 {
        Vec3::new(
            self.x.max(other.x),
            self.y.max(other.y),
            self.z.max(other.z),
        )
    }
}

impl Add for Vec3 {
    type Output = Vec3;
    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Vec3;
    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Vec3;
    fn mul(self, rhs: f64) -> Vec3 {
        Vec3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

/// A 3x3 linear part (row-major) plus a translation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Affine {
    pub matrix: [[f64; 3]; 3],
    pub translation: Vec3,
}

impl Default for Affine {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Affine {
    pub const IDENTITY: Affine = Affine {
        matrix: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        translation: Vec3::ZERO,
    };

    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }

    pub fn from_scale(scale: Vec3) -> Self {
        Self {
            matrix: [
                [scale.x, 0.0, 0.0],
                [0.0, scale.y, 0.0],
                [0.0, 0.0, scale.z],
            ],
            translation: Vec3::ZERO,
        }
    }

    /// Rotation of `radians` about the Z axis.
    pub fn from_rotation_z(radians: f64) -> Self {
        let (s, c) = radians.sin_cos();
        Self {
            matrix: [[c, -s, 0.0], [s, c, 0.0], [0.0, 0.0, 1.0]],
            translation: Vec3::ZERO,
        }
    }

    pub fn transform_vector(&self, v: Vec3) -> Vec3 {
        let m = &self.matrix;
        Vec3::new(
            m[0][0] * v.x + m[0][1] * v.y + m[0][2] * v.z,
            m[1][0] * v.x + m[1][1] * v.y + m[1][2] * v.z,
            m[2][0] * v.x + m[2][1] * v.y + m[2][2] * v.z,
        )
    }

    pub fn transform_point(&self, p: Vec3) -> Vec3 {
        self.transform_vector(p) + self.translation
    }

    /// `self * rhs`: apply `rhs` first, then `self`.
    pub fn then_apply(&self, rhs: &Affine) -> Affine {
        let a = &self.matrix;
        let b = &rhs.matrix;
        let mut matrix = [[0.0; 3]; 3];
        for (r, row) in matrix.iter_mut().enumerate() {
            for (c, cell) in row.iter_mut().enumerate() {
                *cell = (0..3).map(|k| a[r][k] * b[k][c]).sum();
            }
        }
        Affine {
            matrix,
            translation: self.transform_point(rhs.translation),
        }
    }
}

/// An axis-aligned box. `min <= max` on every axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(a: Vec3, b: Vec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    pub fn from_center(center: Vec3, half_extents: Vec3) -> Self {
        Self::new(center - half_extents, center + half_extents)
    }

    /// World-space bounds of the unit cube centered on the local origin of
    /// `transform`.
    pub fn unit_around(transform: &Affine) -> Self {
        let mut min = Vec3::splat(f64::INFINITY);
        let mut max = Vec3::splat(f64::NEG_INFINITY);
        for i in 0..8 {
            let corner = Vec3::new(
                if i & 1 == 0 { -0.5 } else { 0.5 },
                if i & 2 == 0 { -0.5 } else { 0.5 },
                if i & 4 == 0 { -0.5 } else { 0.5 },
            );
            let p = transform.transform_point(corner);
            min = min.min(p);
            max = max.max(p);
        }
        Self { min, max }
    }

    /// Touching boxes count as overlapping.
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    pub fn contains(&self, other: &Aabb) -> bool {
        self.min.x <= other.min.x
            && self.min.y <= other.min.y
            && self.min.z <= other.min.z
            && self.max.x >= other.max.x
            && self.max.y >= other.max.y
            && self.max.z >= other.max.z
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn surface_area(&self) -> f64 {
        let d = self.max - self.min;
        2.0 * (d.x * d.y + d.y * d.z + d.z * d.x)
    }
}

// ---------------------------------------------------------------------------
// Tree
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum TreeNodeKind<T> {
    Leaf(T),
    Branch { left: ProxyId, right: ProxyId },
}

#[derive(Debug, Clone)]
struct TreeNode<T> {
    aabb: Aabb,
    parent: Option<ProxyId>,
    kind: TreeNodeKind<T>,
}

/// Dynamic bounding-volume tree mapping boxes to values.
#[derive(Debug, Clone)]
pub struct AabbTree<T> {
    nodes: SlotMap<ProxyId, TreeNode<T>>,
    root: Option<ProxyId>,
    leaf_count: usize,
}

impl<T> Default for AabbTree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> AabbTree<T> {
    pub fn new() -> Self {
        Self {
            nodes: SlotMap::with_key(),
            root: None,
            leaf_count: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.leaf_count
    }

    pub fn is_empty(&self) -> bool {
        self.leaf_count == 0
    }

    pub fn get(&self, proxy: ProxyId) -> Option<&T> {
        match &self.nodes.get(proxy)?.kind {
            TreeNodeKind::Leaf(value) => Some(value),
            TreeNodeKind::Branch { .. } => None,
        }
    }

    pub fn aabb(&self, proxy: ProxyId) -> Option<Aabb> {
        let node = self.nodes.get(proxy)?;
        matches!(node.kind, TreeNodeKind::Leaf(_)).then_some(node.aabb)
    }

    /// Iterate over every leaf.
    pub fn iter(&self) -> impl Iterator<Item = (ProxyId, &Aabb, &T)> {
        self.nodes.iter().filter_map(|(id, node)| match &node.kind {
            TreeNodeKind::Leaf(value) => Some((id, &node.aabb, value)),
            TreeNodeKind::Branch { .. } => None,
        })
    }

    /// Insert a box and return the handle of its leaf.
    pub fn insert(&mut self, aabb: Aabb, value: T) -> ProxyId {
        let leaf = self.nodes.insert(TreeNode {
            aabb,
            parent: None,
            kind: TreeNodeKind::Leaf(value),
        });
        self.leaf_count += 1;

        let Some(root) = self.root else {
            self.root = Some(leaf);
            return leaf;
        };

        let sibling = self.pick_sibling(root, &aabb);
        let old_parent = self.nodes[sibling].parent;
        let enclosing = self.nodes[sibling].aabb.union(&aabb);
        let branch = self.nodes.insert(TreeNode {
            aabb: enclosing,
            parent: old_parent,
            kind: TreeNodeKind::Branch {
                left: sibling,
                right: leaf,
            },
        });
        self.nodes[sibling].parent = Some(branch);
        self.nodes[leaf].parent = Some(branch);

        match old_parent {
            Some(parent) => {
                self.replace_child(parent, sibling, branch);
                self.refit_from(parent);
            }
            None => self.root = Some(branch),
        }
        leaf
    }

    /// Remove a leaf and return its value. Branch handles and stale handles
    /// return `None`.
    pub fn remove(&mut self, proxy: ProxyId) -> Option<T> {
        if !matches!(self.nodes.get(proxy)?.kind, TreeNodeKind::Leaf(_)) {
            return None;
        }
        let node = self.nodes.remove(proxy)?;
        self.leaf_count -= 1;

        if let Some(parent) = node.parent
            && let TreeNodeKind::Branch { left, right } = self.nodes[parent].kind
        {
            let sibling = if left == proxy { right } else { left };
            let grandparent = self.nodes[parent].parent;
            self.nodes.remove(parent);
            self.nodes[sibling].parent = grandparent;
            match grandparent {
                Some(gp) => {
                    self.replace_child(gp, parent, sibling);
                    self.refit_from(gp);
                }
                None => self.root = Some(sibling),
            }
        } else {
            self.root = None;
        }

        match node.kind {
            TreeNodeKind::Leaf(value) => Some(value),
            TreeNodeKind::Branch { .. } => None,
        }
    }

    /// Every leaf whose box overlaps `aabb`.
    pub fn query(&self, aabb: &Aabb) -> Vec<ProxyId> {
        let mut hits = Vec::new();
        let mut stack: Vec<ProxyId> = self.root.into_iter().collect();
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id];
            if !node.aabb.overlaps(aabb) {
                continue;
            }
            match node.kind {
                TreeNodeKind::Leaf(_) => hits.push(id),
                TreeNodeKind::Branch { left, right } => {
                    stack.push(left);
                    stack.push(right);
                }
            }
        }
        hits
    }

    /// Height of the tree; 0 when empty, 1 for a single leaf.
    pub fn height(&self) -> usize {
        fn walk<T>(tree: &AabbTree<T>, id: ProxyId) -> usize {
            match tree.nodes[id].kind {
                TreeNodeKind::Leaf(_) => 1,
                TreeNodeKind::Branch { left, right } => 1 + walk(tree, left).max(walk(tree, right)),
            }
        }
        self.root.map_or(0, |root| walk(self, root))
    }

    /// Surface-area heuristic descent toward the cheapest sibling for `aabb`.
    fn pick_sibling(&self, root: ProxyId, aabb: &Aabb) -> ProxyId {
        let mut current = root;
        loop {
            let node = &self.nodes[current];
            let TreeNodeKind::Branch { left, right } = node.kind else {
                return current;
            };
            let area = node.aabb.surface_area();
            let combined = node.aabb.union(aabb).surface_area();
            let cost_here = 2.0 * combined;
            let inheritance = 2.0 * (combined - area);

            let child_cost = |child: ProxyId| {
                let child_node = &self.nodes[child];
                let merged = child_node.aabb.union(aabb).surface_area();
                match child_node.kind {
                    TreeNodeKind::Leaf(_) => merged + inheritance,
                    TreeNodeKind::Branch { .. } => {
                        merged - child_node.aabb.surface_area() + inheritance
                    }
                }
            };
            let cost_left = child_cost(left);
            let cost_right = child_cost(right);

            if cost_here < cost_left && cost_here < cost_right {
                return current;
            }
            current = if cost_left <= cost_right { left } else { right };
        }
    }

    fn replace_child(&mut self, parent: ProxyId, old: ProxyId, new: ProxyId) {
        if let TreeNodeKind::Branch { left, right } = &mut self.nodes[parent].kind {
            if *left == old {
                *left = new;
            } else if *right == old {
                *right = new;
            }
        }
    }

    fn refit_from(&mut self, start: ProxyId) {
        let mut current = Some(start);
        while let Some(id) = current {
            if let TreeNodeKind::Branch { left, right } = self.nodes[id].kind {
                let aabb = self.nodes[left].aabb.union(&self.nodes[right].aabb);
                self.nodes[id].aabb = aabb;
            }
            current = self.nodes[id].parent;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube(x: f64, y: f64, z: f64) -> Aabb {
        Aabb::from_center(Vec3::new(x, y, z), Vec3::splat(0.5))
    }

    #[test]
    fn overlap_is_inclusive() {
        let a = cube(0.0, 0.0, 0.0);
        let touching = cube(1.0, 0.0, 0.0);
        let apart = cube(1.5, 0.0, 0.0);
        assert!(a.overlaps(&touching));
        assert!(!a.overlaps(&apart));
    }

    #[test]
    fn unit_around_translation() {
        let t = Affine::from_translation(Vec3::new(10.0, 0.0, -2.0));
        let aabb = Aabb::unit_around(&t);
        assert_eq!(aabb.min, Vec3::new(9.5, -0.5, -2.5));
        assert_eq!(aabb.max, Vec3::new(10.5, 0.5, -1.5));
    }

    #[test]
    fn unit_around_rotation_grows_box() {
        let t = Affine::from_rotation_z(std::f64::consts::FRAC_PI_4);
        let aabb = Aabb::unit_around(&t);
        let half_diag = 0.5 * std::f64::consts::SQRT_2;
        assert!((aabb.max.x - half_diag).abs() < 1e-9);
        assert!((aabb.max.y - half_diag).abs() < 1e-9);
        assert!((aabb.max.z - 0.5).abs() < 1e-9);
    }

    #[test]
    fn affine_composition_order() {
        let scale = Affine::from_scale(Vec3::splat(2.0));
        let shift = Affine::from_translation(Vec3::new(1.0, 0.0, 0.0));
        // Scale first, then shift.
        let combined = shift.then_apply(&scale);
        assert_eq!(
            combined.transform_point(Vec3::new(1.0, 1.0, 1.0)),
            Vec3::new(3.0, 2.0, 2.0)
        );
    }

    #[test]
    fn surface_area_of_unit_cube() {
        assert_eq!(cube(0.0, 0.0, 0.0).surface_area(), 6.0);
    }

    #[test]
    fn insert_and_query() {
        let mut tree = AabbTree::new();
        let a = tree.insert(cube(0.0, 0.0, 0.0), "a");
        let _b = tree.insert(cube(5.0, 0.0, 0.0), "b");
        let c = tree.insert(cube(0.8, 0.0, 0.0), "c");

        let mut hits = tree.query(&cube(0.4, 0.0, 0.0));
        hits.sort();
        let mut expected = vec![a, c];
        expected.sort();
        assert_eq!(hits, expected);
        assert_eq!(tree.len(), 3);
        assert_eq!(tree.get(a), Some(&"a"));
    }

    #[test]
    fn remove_promotes_sibling() {
        let mut tree = AabbTree::new();
        let a = tree.insert(cube(0.0, 0.0, 0.0), 1);
        let b = tree.insert(cube(3.0, 0.0, 0.0), 2);
        assert_eq!(tree.height(), 2);

        assert_eq!(tree.remove(a), Some(1));
        assert_eq!(tree.height(), 1);
        assert_eq!(tree.query(&cube(3.0, 0.0, 0.0)), vec![b]);
        assert!(tree.query(&cube(0.0, 0.0, 0.0)).is_empty());

        assert_eq!(tree.remove(b), Some(2));
        assert!(tree.is_empty());
        assert_eq!(tree.height(), 0);
        assert_eq!(tree.remove(b), None);
    }

    #[test]
    fn query_matches_brute_force() {
        let mut tree = AabbTree::new();
        let mut boxes = Vec::new();
        for i in 0..64 {
            let x = (i % 8) as f64 * 0.9;
            let y = (i / 8) as f64 * 1.7;
            let aabb = cube(x, y, (i % 3) as f64);
            let id = tree.insert(aabb, i);
            boxes.push((id, aabb));
        }
        // Remove every third leaf.
        let mut live = Vec::new();
        for (n, (id, aabb)) in boxes.into_iter().enumerate() {
            if n % 3 == 0 {
                tree.remove(id);
            } else {
                live.push((id, aabb));
            }
        }
        assert_eq!(tree.len(), live.len());

        let window = Aabb::new(Vec3::new(1.0, 1.0, -1.0), Vec3::new(3.0, 5.0, 1.0));
        let mut hits = tree.query(&window);
        hits.sort();
        let mut expected: Vec<ProxyId> = live
            .iter()
            .filter(|(_, aabb)| aabb.overlaps(&window))
            .map(|(id, _)| *id)
            .collect();
        expected.sort();
        assert_eq!(hits, expected);
    }

    #[test]
    fn branches_enclose_children() {
        let mut tree = AabbTree::new();
        for i in 0..20 {
            tree.insert(cube(i as f64 * 2.0, (i % 4) as f64, 0.0), i);
        }
        for (_, node) in tree.nodes.iter() {
            if let TreeNodeKind::Branch { left, right } = node.kind {
                assert!(node.aabb.contains(&tree.nodes[left].aabb));
                assert!(node.aabb.contains(&tree.nodes[right].aabb));
            }
        }
    }
}
