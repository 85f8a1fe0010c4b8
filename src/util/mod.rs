mod summary;

pub use summary::Summary;

/// Reorders `items` so that slot `i` ends up holding what was at `order[i]`.
/// Works by following permutation cycles, `order` is used as scratch space and left as
/// the identity.
///
/// Panics if `order` is not a permutation of `0..items.len()`,
/// `items` are left in an unspecified order in that case.
pub fn permute_in_place<T>(items: &mut [T], order: &mut [usize]) {
    assert!(items.len() == order.len());

    for start in 0..order.len() {
        if order[start] == start {
            continue;
        }

        let mut current = start;
        loop {
            let source = std::mem::replace(&mut order[current], current);
            assert!(source < items.len() && source != current);
            if source == start {
                break;
            }
            items.swap(current, source);
            current = source;
        }
    }
}
