//! Spatial conflict detection between a target rectangle and the objects
//! already occupying a sheet, and the insertion plan that clears the first
//! conflict found.

use gridlink_core::{Occupant, OccupantShape, Rect, SheetId};

use crate::host::GridHost;

/// First occupant overlapping `target`, in host-enumeration order.
///
/// Returns the intersection with that occupant's bounding rectangle. Ties are
/// not broken by size or proximity; the first hit wins. Occupants tagged
/// `exclude_tag` are skipped so an object being refreshed never collides with
/// itself.
///
/// Pivot tables only count as a conflict when all four of their zones
/// individually overlap the target; a page/filter area that merely abuts the
/// target does not block it.
pub fn find_first_intersection(
    target: &Rect,
    occupants: &[Occupant],
    exclude_tag: Option<&str>,
) -> Option<Rect> {
    for occupant in occupants {
        if exclude_tag.is_some_and(|tag| occupant.tag.eq_ignore_ascii_case(tag)) {
            continue;
        }
        let hit = match &occupant.shape {
            OccupantShape::Table(r) | OccupantShape::Chart(r) => target.intersect(r),
            OccupantShape::PivotTable(zones) => {
                let all_overlap =
                    zones.zones().iter().all(|zone| target.intersect(zone).is_some());
                if all_overlap {
                    target.intersect(&occupant.bounds())
                } else {
                    None
                }
            }
        };
        if hit.is_some() {
            return hit;
        }
    }
    None
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertAxis {
    Rows,
    Columns,
}

/// How to clear a conflict: insert whole rows or whole columns, never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertionPlan {
    pub axis: InsertAxis,
    pub count: usize,
    /// Bottom-right corner cell of the originally requested target; the
    /// insertion happens here, not at the intersection's own corner.
    pub row: usize,
    pub col: usize,
}

/// Decide how to clear `intersection` out of `target`'s way.
///
/// Columns are inserted when the intersection is taller than wide, rows
/// otherwise. The count is the intersection's extent along the inserted axis
/// plus one: over-clearing by one unit guarantees the post-insertion
/// footprint is free without a second probe. One resolution pass runs per
/// refresh; a second, different conflict after the insertion is left for the
/// next refresh.
pub fn resolve(target: &Rect, intersection: &Rect) -> InsertionPlan {
    let (axis, count) = if intersection.cols < intersection.rows {
        (InsertAxis::Columns, intersection.cols + 1)
    } else {
        (InsertAxis::Rows, intersection.rows + 1)
    };
    InsertionPlan { axis, count, row: target.bottom(), col: target.right() }
}

impl InsertionPlan {
    /// Apply the plan to the host. The caller must re-read its anchor and
    /// re-clamp afterwards: the insertion shifts everything at or past the
    /// insertion point.
    pub fn apply<H: GridHost + ?Sized>(&self, host: &mut H, sheet: SheetId) {
        match self.axis {
            InsertAxis::Rows => host.insert_rows(sheet, self.row, self.count),
            InsertAxis::Columns => host.insert_cols(sheet, self.col, self.count),
        }
    }
}
