/// Workers assigned per partition.
pub const REDUNDANCY: u32 = 2;

/// Tiles at or below the kernel size stop splitting regardless of how many
/// workers remain.
pub const WIDTH_KERNEL: u32 = 50;
pub const HEIGHT_KERNEL: u32 = 50;

/// A rectangular sub-area of the screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitAxis {
    /// A horizontal cut: top and bottom halves.
    Horizontal,
    /// A vertical cut: left and right halves.
    Vertical,
}

impl SplitAxis {
    fn other(self) -> SplitAxis {
        match self {
            SplitAxis::Horizontal => SplitAxis::Vertical,
            SplitAxis::Vertical => SplitAxis::Horizontal,
        }
    }
}

/// Recursively halves `area` while the worker budget allows `REDUNDANCY`
/// workers per tile, alternating the split axis so tiles tend toward
/// squares. Returns the tiles and the workers left unassigned.
///
/// The second half of each split absorbs the odd pixel, and receives the
/// first half's leftover workers on top of its own share.
pub fn partition(area: Region, workers: u32, axis: SplitAxis) -> (Vec<Region>, u32) {
    if workers / REDUNDANCY < 2 {
        let leftover = if workers <= REDUNDANCY {
            0
        } else {
            workers % REDUNDANCY
        };
        return (vec![area], leftover);
    }

    if area.width <= WIDTH_KERNEL && area.height <= HEIGHT_KERNEL {
        return (vec![area], workers - REDUNDANCY);
    }

    let axis = if area.width <= WIDTH_KERNEL {
        SplitAxis::Horizontal
    } else if area.height <= HEIGHT_KERNEL {
        SplitAxis::Vertical
    } else {
        axis
    };

    let (first, second) = match axis {
        SplitAxis::Horizontal => {
            let top = area.height / 2;
            (
                Region {
                    height: top,
                    ..area
                },
                Region {
                    y: area.y + top,
                    height: area.height - top,
                    ..area
                },
            )
        }
        SplitAxis::Vertical => {
            let left = area.width / 2;
            (
                Region { width: left, ..area },
                Region {
                    x: area.x + left,
                    width: area.width - left,
                    ..area
                },
            )
        }
    };

    let first_workers = workers.div_ceil(2);
    let (mut tiles, leftover) = partition(first, first_workers, axis.other());
    let (rest, leftover) = partition(second, workers / 2 + leftover, axis.other());
    tiles.extend(rest);
    (tiles, leftover)
}
