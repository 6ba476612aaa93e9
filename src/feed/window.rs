use std::ops::Range;

/// Rows rendered beyond each edge of the viewport.
pub const OVERSCAN: usize = 1;

/// Rows to materialize for a viewport of `viewport_rows` starting at `offset`.
///
/// Only these rows are built into widgets, so long feeds cost the same to
/// draw as short ones.
pub fn visible_range(
    total_rows: usize,
    viewport_rows: usize,
    offset: usize,
    overscan: usize,
) -> Range<usize> {
    if total_rows == 0 || viewport_rows == 0 {
        return 0..0;
    }
    let offset = offset.min(total_rows - 1);
    let start = offset.saturating_sub(overscan);
    let end = offset
        .saturating_add(viewport_rows)
        .saturating_add(overscan)
        .min(total_rows);
    start..end
}

/// Adjust `offset` so that `selected` stays inside the viewport.
pub fn scroll_to_keep_visible(offset: usize, selected: usize, viewport_rows: usize) -> usize {
    if viewport_rows == 0 {
        return offset;
    }
    if selected < offset {
        selected
    } else if selected >= offset + viewport_rows {
        selected + 1 - viewport_rows
    } else {
        offset
    }
}
