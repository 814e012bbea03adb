//! Purpose: Plan which row groups a row-window read must touch, without performing any I/O.
//! Exports: `RowWindow`, `RowGroupPlan`, `plan_window`.
//! Role: Pure planning layer used by the read path before issuing the physical read.
//! Invariants: Output depends only on the window and the ordered row-group sizes.
//! Invariants: Row groups after the window end are never selected.
//! Invariants: An out-of-range start yields an empty plan, never an error.

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RowWindow {
    pub start: u64,
    pub count: u64,
}

impl RowWindow {
    pub fn new(start: u64, count: u64) -> Self {
        Self { start, count }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RowGroupPlan {
    /// Row-group indices to read, in file order.
    pub row_groups: Vec<usize>,
    /// Row offset of the window start inside the concatenated selected groups.
    pub offset: u64,
    /// Rows in the clamped window.
    pub len: u64,
    /// Total rows across all row groups of the file.
    pub total_rows: u64,
}

impl RowGroupPlan {
    fn empty(total_rows: u64) -> Self {
        Self {
            row_groups: Vec::new(),
            offset: 0,
            len: 0,
            total_rows,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// True when every row group of the file is selected.
    pub fn covers_all(&self, num_row_groups: usize) -> bool {
        num_row_groups > 0 && self.row_groups.len() == num_row_groups
    }
}

pub fn plan_window(window: RowWindow, row_group_sizes: &[u64]) -> RowGroupPlan {
    let total_rows: u64 = row_group_sizes.iter().sum();
    if window.count == 0 || window.start >= total_rows {
        return RowGroupPlan::empty(total_rows);
    }
    let start = window.start;
    let end = start.saturating_add(window.count).min(total_rows);

    let mut row_groups = Vec::new();
    let mut offset = None;
    let mut running = 0u64;
    for (index, &size) in row_group_sizes.iter().enumerate() {
        let group_end = running + size;
        if group_end > start && running < end {
            if offset.is_none() {
                offset = Some(start - running);
            }
            row_groups.push(index);
        }
        running = group_end;
        if running >= end {
            break;
        }
    }

    RowGroupPlan {
        row_groups,
        offset: offset.unwrap_or(0),
        len: end - start,
        total_rows,
    }
}
