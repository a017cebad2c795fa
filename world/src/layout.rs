//! Wall patterns drawn into a fresh grid.

use chronopath_core::{Layout, Position};

/// Cells walled off by the layout, in drawing order, excluding the permanently
/// open end of every bar.
pub(crate) fn dynamic_cells(layout: Layout, width: u32, height: u32) -> Vec<Position> {
    if layout == Layout::Open || width == 0 || height == 0 {
        return Vec::new();
    }

    let Ok(columns) = i32::try_from(width) else {
        return Vec::new();
    };
    let Ok(rows) = i32::try_from(height) else {
        return Vec::new();
    };

    let mut cells = Vec::new();
    for column in (1..columns).step_by(2) {
        let open_row = match layout {
            Layout::ZigZag if column % 4 == 1 => rows - 1,
            Layout::ZigZag | Layout::TopBars => 0,
            Layout::BottomBars => rows - 1,
            Layout::Open => continue,
        };

        cells.extend(
            (0..rows)
                .filter(|row| *row != open_row)
                .map(|row| Position::new(column, row)),
        );
    }
    cells
}
