use std::collections::VecDeque;

use crate::scene3d::polygon::DrawPolygon3D;

/// A node in the BSP tree. Front/back are relative to the normal of the plane
/// represented by `data`.
pub struct BspNode {
    pub data: Box<DrawPolygon3D>,
    pub coplanars_front: Vec<Box<DrawPolygon3D>>,
    pub coplanars_back: Vec<Box<DrawPolygon3D>>,
    pub front_child: Option<Box<BspNode>>,
    pub back_child: Option<Box<BspNode>>,
}

impl BspNode {
    fn new(data: Box<DrawPolygon3D>) -> Box<BspNode> {
        Box::new(BspNode {
            data,
            coplanars_front: Vec::new(),
            coplanars_back: Vec::new(),
            front_child: None,
            back_child: None,
        })
    }
}

/// Binary Space Partitioning over draw polygons: splits intersecting polygons along
/// plane intersections so back-to-front traversal yields a correct depth order.
pub struct BspTree {
    root: Option<Box<BspNode>>,
}

impl BspTree {
    /// Builds a tree from a list of polygons; the first becomes the root plane.
    ///
    /// Average O(n log n); degrades to O(n * 2^n) when every split cuts all remaining
    /// polygons.
    pub fn new(mut polygons: VecDeque<Box<DrawPolygon3D>>) -> BspTree {
        let Some(first) = polygons.pop_front() else {
            return BspTree { root: None };
        };
        let mut root = BspNode::new(first);
        Self::build_tree(&mut root, polygons);
        BspTree { root: Some(root) }
    }

    fn build_tree(node: &mut BspNode, mut polygons: VecDeque<Box<DrawPolygon3D>>) {
        let mut front_list = VecDeque::new();
        let mut back_list = VecDeque::new();
        while let Some(polygon) = polygons.pop_front() {
            let result = node.data.split_another(polygon);
            if result.is_coplanar {
                if let Some(front) = result.front {
                    node.coplanars_front.push(front);
                }
                if let Some(back) = result.back {
                    node.coplanars_back.push(back);
                }
            } else {
                if let Some(front) = result.front {
                    front_list.push_back(front);
                }
                if let Some(back) = result.back {
                    back_list.push_back(back);
                }
            }
        }
        if let Some(first) = back_list.pop_front() {
            let mut child = BspNode::new(first);
            Self::build_tree(&mut child, back_list);
            node.back_child = Some(child);
        }
        if let Some(first) = front_list.pop_front() {
            let mut child = BspNode::new(first);
            Self::build_tree(&mut child, front_list);
            node.front_child = Some(child);
        }
    }

    /// Visits every polygon back-to-front relative to a camera looking down +Z.
    pub fn traverse_back_to_front(&self, mut action: impl FnMut(&DrawPolygon3D)) {
        if let Some(root) = &self.root {
            Self::traverse_node(&mut action, root);
        }
    }

    fn traverse_node(action: &mut impl FnMut(&DrawPolygon3D), node: &BspNode) {
        // The child on the opposite side of the normal is farther from the camera.
        if node.data.is_facing_positive_z() {
            Self::visit_node(
                action,
                node,
                node.back_child.as_deref(),
                node.front_child.as_deref(),
                &node.coplanars_back,
                &node.coplanars_front,
            );
        } else {
            Self::visit_node(
                action,
                node,
                node.front_child.as_deref(),
                node.back_child.as_deref(),
                &node.coplanars_front,
                &node.coplanars_back,
            );
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn visit_node(
        action: &mut impl FnMut(&DrawPolygon3D), node: &BspNode, first_child: Option<&BspNode>,
        second_child: Option<&BspNode>, first_coplanars: &[Box<DrawPolygon3D>],
        second_coplanars: &[Box<DrawPolygon3D>],
    ) {
        if let Some(child) = first_child {
            Self::traverse_node(action, child);
        }
        for polygon in first_coplanars {
            action(polygon);
        }
        action(&node.data);
        for polygon in second_coplanars {
            action(polygon);
        }
        if let Some(child) = second_child {
            Self::traverse_node(action, child);
        }
    }

    #[cfg(test)]
    pub(crate) fn root(&self) -> Option<&BspNode> {
        self.root.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Matrix3D;
    use crate::scene3d::polygon::tests::test_image;

    fn flat_polygon(z: f32, sequence: i32) -> Box<DrawPolygon3D> {
        Box::new(DrawPolygon3D::new(
            test_image(10, 10),
            Matrix3D::make_translate(0.0, 0.0, z),
            0,
            sequence,
            1.0,
            true,
        ))
    }

    #[test]
    fn far_polygon_paints_first() {
        // Two parallel planes, camera at z = +inf: the far (smaller z) one comes out
        // first.
        let mut polygons = VecDeque::new();
        polygons.push_back(flat_polygon(1.0, 0));
        polygons.push_back(flat_polygon(0.0, 1));
        let tree = BspTree::new(polygons);
        let mut order = Vec::new();
        tree.traverse_back_to_front(|polygon| order.push(polygon.points()[0].z));
        assert_eq!(order, vec![0.0, 1.0]);
    }

    #[test]
    fn crossing_polygons_split_into_four_fragments() {
        // A polygon rotated about X crosses the flat one; the tree holds the root
        // plus two leaf fragments and no coplanar buckets.
        let mut polygons = VecDeque::new();
        let crossing = Matrix3D::concat(
            &Matrix3D::make_translate(0.0, 5.0, -5.0),
            &Matrix3D::make_rotate_x(90.0),
        );
        polygons.push_back(Box::new(DrawPolygon3D::new(
            test_image(10, 10),
            crossing,
            0,
            0,
            1.0,
            true,
        )));
        polygons.push_back(flat_polygon(0.0, 1));
        let tree = BspTree::new(polygons);
        let root = tree.root().unwrap();
        assert!(root.coplanars_front.is_empty() && root.coplanars_back.is_empty());
        let front = root.front_child.as_ref().unwrap();
        let back = root.back_child.as_ref().unwrap();
        assert!(front.data.is_split());
        assert!(back.data.is_split());
        assert!(front.front_child.is_none() && front.back_child.is_none());
        assert!(back.front_child.is_none() && back.back_child.is_none());

        let mut visited = 0;
        tree.traverse_back_to_front(|_| visited += 1);
        assert_eq!(visited, 3);
    }

    #[test]
    fn coplanar_polygons_emit_in_sequence_order() {
        let mut polygons = VecDeque::new();
        polygons.push_back(flat_polygon(0.0, 0));
        polygons.push_back(flat_polygon(0.0, 1));
        polygons.push_back(flat_polygon(0.0, 2));
        let tree = BspTree::new(polygons);
        let mut order = Vec::new();
        tree.traverse_back_to_front(|polygon| order.push(polygon.sequence_index()));
        assert_eq!(order, vec![0, 1, 2]);
    }
}
