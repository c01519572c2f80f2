//! Mapping between display space (canvas pixels) and image-relative boxes.
//!
//! Nothing here knows about the windowing toolkit: the GUI converts its
//! pointer positions into [`PointerEvent`]s relative to the canvas.

use serde::{Deserialize, Serialize};

/// Drags narrower or shorter than this (in image pixels) are treated as clicks.
pub const MIN_BOX_SIZE: i32 = 5;

/// A pointer position on the canvas.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointerEvent {
    pub x: f32,
    pub y: f32,
}

impl PointerEvent {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Where the displayed image sits on the canvas.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Placement {
    pub origin_x: f32,
    pub origin_y: f32,
    pub width: f32,
    pub height: f32,
}

impl Placement {
    pub fn new(origin_x: f32, origin_y: f32, width: f32, height: f32) -> Self {
        Self {
            origin_x,
            origin_y,
            width,
            height,
        }
    }

    /// Centers an `image_w`×`image_h` image inside an `area_w`×`area_h` canvas.
    /// The origin is floored, and goes negative if the image is larger.
    pub fn centered(area_w: u32, area_h: u32, image_w: u32, image_h: u32) -> Self {
        let origin_x = (i64::from(area_w) - i64::from(image_w)).div_euclid(2);
        let origin_y = (i64::from(area_h) - i64::from(image_h)).div_euclid(2);
        Self::new(
            origin_x as f32,
            origin_y as f32,
            image_w as f32,
            image_h as f32,
        )
    }

    pub fn right(&self) -> f32 {
        self.origin_x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.origin_y + self.height
    }

    pub fn contains(&self, p: PointerEvent) -> bool {
        p.x >= self.origin_x && p.x <= self.right() && p.y >= self.origin_y && p.y <= self.bottom()
    }

    /// Nearest point on or inside the image bounds.
    pub fn clamp(&self, p: PointerEvent) -> PointerEvent {
        PointerEvent::new(
            p.x.clamp(self.origin_x, self.right()),
            p.y.clamp(self.origin_y, self.bottom()),
        )
    }
}

/// A box in image-relative pixels with `x1 <= x2` and `y1 <= y2`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoxCoords {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BoxCoords {
    /// Builds a box from two arbitrary corners.
    pub fn from_corners(ax: i32, ay: i32, bx: i32, by: i32) -> Self {
        Self {
            x1: ax.min(bx),
            y1: ay.min(by),
            x2: ax.max(bx),
            y2: ay.max(by),
        }
    }

    pub fn normalized(self) -> Self {
        Self::from_corners(self.x1, self.y1, self.x2, self.y2)
    }

    pub fn width(&self) -> i32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> i32 {
        self.y2 - self.y1
    }

    /// Top-left and bottom-right corners on the canvas.
    pub fn to_display(&self, placement: &Placement) -> (PointerEvent, PointerEvent) {
        (
            PointerEvent::new(
                placement.origin_x + self.x1 as f32,
                placement.origin_y + self.y1 as f32,
            ),
            PointerEvent::new(
                placement.origin_x + self.x2 as f32,
                placement.origin_y + self.y2 as f32,
            ),
        )
    }
}

/// Turns a drag from `start` to `end` into an image-relative box.
///
/// Both endpoints are clamped to the image, shifted by its origin and
/// normalized. Returns `None` when no image is shown or the box is smaller
/// than `min_size` in either dimension.
pub fn map_drag(
    start: PointerEvent,
    end: PointerEvent,
    placement: Option<Placement>,
    min_size: i32,
) -> Option<BoxCoords> {
    let placement = placement?;
    let a = placement.clamp(start);
    let b = placement.clamp(end);
    let coords = BoxCoords::from_corners(
        (a.x - placement.origin_x).round() as i32,
        (a.y - placement.origin_y).round() as i32,
        (b.x - placement.origin_x).round() as i32,
        (b.y - placement.origin_y).round() as i32,
    );
    if coords.width() < min_size || coords.height() < min_size {
        return None;
    }
    Some(coords)
}
