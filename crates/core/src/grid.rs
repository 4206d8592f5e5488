//! 3x3 grid slicer.
//!
//! Splits a contact-sheet style image into nine tiles. Each tile is cut
//! inward by a fixed inset so the divider gutters between cells are
//! discarded, while the outer edges of the image are kept intact: the
//! first column/row starts at 0 and the last column/row runs to the full
//! image width/height (absorbing any remainder pixels).

use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageFormat};

use crate::error::CoreError;

/* --------------------------------------------------------------------------
Named constants
-------------------------------------------------------------------------- */

/// Number of rows and columns in the grid.
pub const GRID_SIZE: u32 = 3;

/// Total number of tiles produced per image.
pub const TILE_COUNT: usize = (GRID_SIZE * GRID_SIZE) as usize;

/// Default inward crop per interior tile edge, in pixels.
pub const DEFAULT_GUTTER: u32 = 4;

/* --------------------------------------------------------------------------
Types
-------------------------------------------------------------------------- */

/// Pixel rectangle of one tile. `right` and `bottom` are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRect {
    pub row: u32,
    pub col: u32,
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl TileRect {
    /// Row-major position of the tile (0..=8).
    pub fn index(&self) -> usize {
        (self.row * GRID_SIZE + self.col) as usize
    }

    pub fn width(&self) -> u32 {
        self.right - self.left
    }

    pub fn height(&self) -> u32 {
        self.bottom - self.top
    }

    /// Output file name, e.g. `tile_04.jpg`.
    pub fn file_name(&self) -> String {
        format!("tile_{:02}.jpg", self.index())
    }
}

/// A tile written to disk by [`slice_image`].
#[derive(Debug, Clone)]
pub struct SavedTile {
    pub rect: TileRect,
    pub path: PathBuf,
}

/* --------------------------------------------------------------------------
Geometry
-------------------------------------------------------------------------- */

/// Compute the nine tile rectangles for an image of `width` x `height`.
///
/// Base cell size is `floor(width / 3)` by `floor(height / 3)`. Every
/// interior edge is moved inward by `inset`; outer edges are clamped to the
/// image boundary. Returns the rectangles in row-major order.
///
/// Fails with [`CoreError::Validation`] when any tile would be empty, which
/// happens for images smaller than 3x3 or when `inset` eats a whole cell
/// (`floor(dim / 3) - 2 * inset <= 0` for the middle tile).
pub fn tile_rects(width: u32, height: u32, inset: u32) -> Result<Vec<TileRect>, CoreError> {
    let base_w = i64::from(width / GRID_SIZE);
    let base_h = i64::from(height / GRID_SIZE);
    let g = i64::from(inset);
    let last = i64::from(GRID_SIZE - 1);

    let mut rects = Vec::with_capacity(TILE_COUNT);
    for row in 0..i64::from(GRID_SIZE) {
        for col in 0..i64::from(GRID_SIZE) {
            let mut left = col * base_w + g;
            let mut top = row * base_h + g;
            let mut right = (col + 1) * base_w - g;
            let mut bottom = (row + 1) * base_h - g;

            if col == 0 {
                left = 0;
            }
            if col == last {
                right = i64::from(width);
            }
            if row == 0 {
                top = 0;
            }
            if row == last {
                bottom = i64::from(height);
            }

            if right <= left || bottom <= top {
                return Err(CoreError::Validation(format!(
                    "Tile {} (row {row}, column {col}) would be empty: inset of {inset}px \
                     is too large for a {width}x{height} image",
                    row * i64::from(GRID_SIZE) + col,
                )));
            }

            // All four values are within 0..=dimension at this point.
            rects.push(TileRect {
                row: row as u32,
                col: col as u32,
                left: left as u32,
                top: top as u32,
                right: right as u32,
                bottom: bottom as u32,
            });
        }
    }

    Ok(rects)
}

/* --------------------------------------------------------------------------
Slicing
-------------------------------------------------------------------------- */

/// Crop an in-memory image into its nine tiles.
pub fn slice(img: &DynamicImage, inset: u32) -> Result<Vec<(TileRect, DynamicImage)>, CoreError> {
    let rects = tile_rects(img.width(), img.height(), inset)?;
    Ok(rects
        .into_iter()
        .map(|rect| {
            let tile = img.crop_imm(rect.left, rect.top, rect.width(), rect.height());
            (rect, tile)
        })
        .collect())
}

/// Load `input`, slice it into a 3x3 grid and write `tile_00.jpg` ..
/// `tile_08.jpg` into `output_dir` (created with parents if missing).
///
/// Tiles are converted to RGB before encoding since JPEG has no alpha
/// channel. Existing tiles with the same names are overwritten.
pub fn slice_image(
    input: &Path,
    output_dir: &Path,
    inset: u32,
) -> Result<Vec<SavedTile>, CoreError> {
    let img = image::open(input)?;
    tracing::info!(
        input = %input.display(),
        width = img.width(),
        height = img.height(),
        base_width = img.width() / GRID_SIZE,
        base_height = img.height() / GRID_SIZE,
        inset,
        "Slicing image into {GRID_SIZE}x{GRID_SIZE} grid",
    );

    let tiles = slice(&img, inset)?;
    std::fs::create_dir_all(output_dir)?;

    let mut saved = Vec::with_capacity(TILE_COUNT);
    for (rect, tile) in tiles {
        let path = output_dir.join(rect.file_name());
        DynamicImage::ImageRgb8(tile.to_rgb8()).save_with_format(&path, ImageFormat::Jpeg)?;
        tracing::info!(
            path = %path.display(),
            width = rect.width(),
            height = rect.height(),
            "Saved tile",
        );
        saved.push(SavedTile { rect, path });
    }

    Ok(saved)
}

/* --------------------------------------------------------------------------
Tests
-------------------------------------------------------------------------- */

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};

    use super::*;

    fn widths_of_row(rects: &[TileRect], row: u32) -> u32 {
        rects.iter().filter(|r| r.row == row).map(TileRect::width).sum()
    }

    fn heights_of_col(rects: &[TileRect], col: u32) -> u32 {
        rects.iter().filter(|r| r.col == col).map(TileRect::height).sum()
    }

    fn write_png(dir: &Path, width: u32, height: u32) -> PathBuf {
        let img = RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        });
        let path = dir.join("grid.png");
        img.save(&path).expect("write source png");
        path
    }

    // -- tile_rects --

    #[test]
    fn produces_nine_tiles_in_row_major_order() {
        let rects = tile_rects(300, 300, 4).unwrap();
        assert_eq!(rects.len(), TILE_COUNT);
        for (i, rect) in rects.iter().enumerate() {
            assert_eq!(rect.index(), i);
            assert_eq!(rect.row, i as u32 / 3);
            assert_eq!(rect.col, i as u32 % 3);
        }
    }

    #[test]
    fn outer_edges_are_clamped_to_image_bounds() {
        let rects = tile_rects(300, 240, 4).unwrap();
        assert_eq!(rects[0].left, 0);
        assert_eq!(rects[0].top, 0);
        assert_eq!(rects[8].right, 300);
        assert_eq!(rects[8].bottom, 240);
        // Interior edges of the corner tile are inset.
        assert_eq!(rects[0].right, 96);
        assert_eq!(rects[0].bottom, 76);
    }

    #[test]
    fn middle_tile_loses_inset_on_both_sides() {
        let rects = tile_rects(100, 61, 4).unwrap();
        let middle = rects[4];
        assert_eq!(middle.width(), 100 / 3 - 8);
        assert_eq!(middle.height(), 61 / 3 - 8);
        assert_eq!(middle.left, 33 + 4);
        assert_eq!(middle.top, 20 + 4);
    }

    #[test]
    fn zero_inset_covers_every_pixel() {
        let rects = tile_rects(100, 61, 0).unwrap();
        for i in 0..GRID_SIZE {
            assert_eq!(widths_of_row(&rects, i), 100);
            assert_eq!(heights_of_col(&rects, i), 61);
        }
    }

    #[test]
    fn row_and_column_sums_drop_four_insets() {
        let rects = tile_rects(100, 61, 4).unwrap();
        for i in 0..GRID_SIZE {
            assert_eq!(widths_of_row(&rects, i), 100 - 16);
            assert_eq!(heights_of_col(&rects, i), 61 - 16);
        }
    }

    #[test]
    fn remainder_pixels_go_to_last_column_and_row() {
        let rects = tile_rects(101, 32, 0).unwrap();
        assert_eq!(rects[0].width(), 33);
        assert_eq!(rects[1].width(), 33);
        assert_eq!(rects[2].width(), 35);
        assert_eq!(rects[0].height(), 10);
        assert_eq!(rects[3].height(), 10);
        assert_eq!(rects[6].height(), 12);
    }

    #[test]
    fn inset_consuming_middle_cell_is_rejected() {
        // floor(30 / 3) - 2 * 5 == 0
        let result = tile_rects(30, 300, 5);
        assert_matches!(result, Err(CoreError::Validation(msg)) if msg.contains("Tile 1"));
    }

    #[test]
    fn largest_valid_inset_is_accepted() {
        let rects = tile_rects(30, 30, 4).unwrap();
        assert_eq!(rects[4].width(), 2);
        assert_eq!(rects[4].height(), 2);
    }

    #[test]
    fn image_smaller_than_grid_is_rejected() {
        assert_matches!(tile_rects(2, 100, 0), Err(CoreError::Validation(_)));
        assert_matches!(tile_rects(100, 0, 0), Err(CoreError::Validation(_)));
    }

    #[test]
    fn file_names_are_zero_padded() {
        let rects = tile_rects(90, 90, 0).unwrap();
        assert_eq!(rects[0].file_name(), "tile_00.jpg");
        assert_eq!(rects[8].file_name(), "tile_08.jpg");
    }

    // -- slice --

    #[test]
    fn slice_crops_expected_pixels() {
        let img = RgbImage::from_fn(90, 90, |x, y| Rgb([x as u8, y as u8, 0]));
        let tiles = slice(&DynamicImage::ImageRgb8(img), 2).unwrap();
        let (rect, tile) = &tiles[4];
        assert_eq!(tile.width(), rect.width());
        assert_eq!(tile.height(), rect.height());
        let px = tile.to_rgb8().get_pixel(0, 0).0;
        assert_eq!(px, [32, 32, 0]);
    }

    // -- slice_image --

    #[test]
    fn slice_image_writes_nine_jpegs() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_png(dir.path(), 100, 61);
        let out = dir.path().join("nested").join("tiles");

        let saved = slice_image(&input, &out, 4).unwrap();
        assert_eq!(saved.len(), TILE_COUNT);

        for tile in &saved {
            assert!(tile.path.starts_with(&out));
            let (w, h) = image::image_dimensions(&tile.path).unwrap();
            assert_eq!((w, h), (tile.rect.width(), tile.rect.height()));
        }
        assert!(out.join("tile_00.jpg").exists());
        assert!(out.join("tile_08.jpg").exists());
    }

    #[test]
    fn slice_image_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_png(dir.path(), 120, 90);
        let out = dir.path().join("tiles");

        slice_image(&input, &out, 4).unwrap();
        let first: Vec<Vec<u8>> = (0..TILE_COUNT)
            .map(|i| std::fs::read(out.join(format!("tile_{i:02}.jpg"))).unwrap())
            .collect();

        slice_image(&input, &out, 4).unwrap();
        let entries = std::fs::read_dir(&out).unwrap().count();
        assert_eq!(entries, TILE_COUNT);
        for (i, bytes) in first.iter().enumerate() {
            let again = std::fs::read(out.join(format!("tile_{i:02}.jpg"))).unwrap();
            assert_eq!(&again, bytes);
        }
    }

    #[test]
    fn slice_image_accepts_alpha_sources() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("alpha.png");
        RgbaImage::from_pixel(60, 60, Rgba([10, 20, 30, 128]))
            .save(&input)
            .unwrap();

        let saved = slice_image(&input, &dir.path().join("tiles"), 2).unwrap();
        assert_eq!(saved.len(), TILE_COUNT);
    }

    #[test]
    fn slice_image_missing_input_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = slice_image(&dir.path().join("nope.png"), dir.path(), 4);
        assert_matches!(result, Err(CoreError::Image(_)));
    }

    #[test]
    fn slice_image_corrupt_input_fails() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("broken.png");
        std::fs::write(&input, b"definitely not a png").unwrap();
        assert!(slice_image(&input, &dir.path().join("tiles"), 4).is_err());
    }
}
