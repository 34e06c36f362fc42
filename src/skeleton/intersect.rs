use crate::skeleton::skeleton_model::{Fingerprint, SkeletonNode};

/// Position-aligned common structure of two fingerprints and its node count.
///
/// Two nodes are common when tag and resource id both match. Children are
/// paired by position, never by content, and unpaired extras are dropped.
pub fn intersect(a: &Fingerprint, b: &Fingerprint) -> (Fingerprint, usize) {
    let root = match (&a.root, &b.root) {
        (Some(x), Some(y)) => common(x, y),
        _ => None,
    };
    let common = Fingerprint { root };
    let size = common.size();
    (common, size)
}

fn common(a: &SkeletonNode, b: &SkeletonNode) -> Option<SkeletonNode> {
    if !a.same_shape(b) {
        return None;
    }
    Some(SkeletonNode {
        tag: a.tag.clone(),
        resource_id: a.resource_id.clone(),
        children: a
            .children
            .iter()
            .zip(&b.children)
            .filter_map(|(x, y)| common(x, y))
            .collect(),
    })
}
