/// A regular partition of an image into `bs x bs` blocks.
///
/// Blocks tile the image in row-major order with no overlap; trailing blocks
/// at the right and bottom edges are clipped to the image bounds and flagged
/// incomplete. The union of all block areas equals the image area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockGrid {
    width: u32,
    height: u32,
    bs: u32,
    rows: u32,
    cols: u32,
    complete_rows: u32,
    complete_cols: u32,
}

/// One block of a [`BlockGrid`], clipped to the image bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRect {
    pub row: u32,
    pub col: u32,
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
    /// `true` when the block has the full `bs x bs` size.
    pub complete: bool,
}

impl BlockRect {
    pub fn pixel_area(&self) -> u64 {
        u64::from(self.w) * u64::from(self.h)
    }

    /// Whether this rectangle overlaps `other` by at least one pixel.
    pub fn intersects(&self, other: &BlockRect) -> bool {
        self.x < other.x + other.w
            && other.x < self.x + self.w
            && self.y < other.y + other.h
            && other.y < self.y + self.h
    }
}

impl BlockGrid {
    /// Builds the grid for an image of `width x height` and block size `bs`.
    ///
    /// `bs` larger than a dimension yields a single partial block in that
    /// direction; a `bs` of zero is clamped to one. There are no failure
    /// modes.
    pub fn new(width: u32, height: u32, bs: u32) -> Self {
        let bs = bs.max(1);
        let cols = width.div_ceil(bs);
        let rows = height.div_ceil(bs);
        Self {
            width,
            height,
            bs,
            rows,
            cols,
            complete_rows: height / bs,
            complete_cols: width / bs,
        }
    }

    pub fn block_size(&self) -> u32 {
        self.bs
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    /// Number of full `bs x bs` blocks that fit exactly.
    pub fn complete_block_count(&self) -> u32 {
        self.complete_rows * self.complete_cols
    }

    /// Number of blocks including partial trailing ones.
    pub fn total_block_count(&self) -> u32 {
        self.rows * self.cols
    }

    /// The clipped rectangle of block `(row, col)`.
    pub fn block(&self, row: u32, col: u32) -> BlockRect {
        let x = col * self.bs;
        let y = row * self.bs;
        let w = self.bs.min(self.width - x);
        let h = self.bs.min(self.height - y);
        BlockRect { row, col, x, y, w, h, complete: w == self.bs && h == self.bs }
    }

    /// Row-major iteration over all blocks.
    pub fn blocks(&self) -> impl Iterator<Item = BlockRect> + '_ {
        (0..self.rows).flat_map(move |row| (0..self.cols).map(move |col| self.block(row, col)))
    }
}
