/// Move selection cursor one item up.
pub fn select_prev(selected: usize) -> usize {
    selected.saturating_sub(1)
}

/// Move selection cursor one item down if another item exists.
pub fn select_next(selected: usize, item_count: usize) -> usize {
    if selected + 1 < item_count {
        selected + 1
    } else {
        selected
    }
}

/// Apply a whole encoder delta to a cursor, clamped at both ends.
pub fn step(selected: usize, delta: i32, item_count: usize) -> usize {
    let mut cursor = selected;
    for _ in 0..delta.unsigned_abs().min(item_count as u32) {
        cursor = if delta > 0 {
            select_next(cursor, item_count)
        } else {
            select_prev(cursor)
        };
    }
    cursor
}
