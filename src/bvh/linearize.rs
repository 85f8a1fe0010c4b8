use super::{
    BuildNodeIdx,
    building::{BuildNode, BuildTree},
    linear_node::LinearBvhNode,
};

/// Flattens the tree into depth first order.
/// First child of each inner node is stored right after it, the second child offset gets
/// patched once the first subtree is done.
pub fn linearize(tree: &BuildTree) -> Vec<LinearBvhNode> {
    let mut nodes: Vec<LinearBvhNode> = Vec::with_capacity(tree.nodes.len());
    let mut stack: Vec<(BuildNodeIdx, Option<usize>)> = vec![(tree.root(), None)];

    while let Some((index, parent)) = stack.pop() {
        let position = nodes.len();
        if let Some(parent) = parent {
            nodes[parent].set_second_child(position as u32);
        }

        match &tree.nodes[index] {
            BuildNode::Leaf {
                bounds,
                first,
                count,
            } => nodes.push(LinearBvhNode::new_leaf(bounds, *first, *count)),
            BuildNode::Inner {
                bounds,
                axis,
                children,
            } => {
                nodes.push(LinearBvhNode::new_inner(bounds, *axis, 0));
                stack.push((children[1], Some(position)));
                stack.push((children[0], None));
            }
        }
    }

    nodes
}
