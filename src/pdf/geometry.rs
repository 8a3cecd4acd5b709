//! Page geometry: visible (rotated, top-left origin) coordinates versus PDF
//! user space (unrotated, bottom-left origin).

// Standard PDF page sizes in points (1/72 inch).
pub const A4_WIDTH_PT: f32 = 595.0;
pub const A4_HEIGHT_PT: f32 = 842.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl Rect {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Rect { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> f32 {
        (self.x1 - self.x0).abs()
    }

    pub fn height(&self) -> f32 {
        (self.y1 - self.y0).abs()
    }

    pub fn normalized(&self) -> Rect {
        Rect {
            x0: self.x0.min(self.x1),
            y0: self.y0.min(self.y1),
            x1: self.x0.max(self.x1),
            y1: self.y0.max(self.y1),
        }
    }
}

/// Normalizes a `/Rotate` value to one of 0, 90, 180, 270.
pub fn normalize_rotation(degrees: i64) -> i32 {
    let quarter = ((degrees as f64) / 90.0).round() as i64;
    (quarter.rem_euclid(4) * 90) as i32
}

/// What a viewer shows of one page: the page box plus its `/Rotate`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageFrame {
    /// CropBox (or MediaBox) in user space.
    pub bbox: Rect,
    pub rotation: i32,
}

impl PageFrame {
    pub fn new(bbox: Rect, rotation: i64) -> Self {
        PageFrame {
            bbox: bbox.normalized(),
            rotation: normalize_rotation(rotation),
        }
    }

    fn is_sideways(&self) -> bool {
        self.rotation == 90 || self.rotation == 270
    }

    pub fn width(&self) -> f32 {
        if self.is_sideways() { self.bbox.height() } else { self.bbox.width() }
    }

    pub fn height(&self) -> f32 {
        if self.is_sideways() { self.bbox.width() } else { self.bbox.height() }
    }

    pub fn is_landscape(&self) -> bool {
        self.width() > self.height()
    }

    /// Visible height relative to an A4 portrait page.
    pub fn scale(&self) -> f32 {
        let h = self.height();
        if h > 0.0 { h / A4_HEIGHT_PT } else { 1.0 }
    }

    /// Maps a visible point (top-left origin, y down) into user space.
    pub fn to_user_point(&self, x: f32, y: f32) -> (f32, f32) {
        let b = self.bbox;
        match self.rotation {
            90 => (b.x0 + y, b.y0 + x),
            180 => (b.x1 - x, b.y0 + y),
            270 => (b.x1 - y, b.y1 - x),
            _ => (b.x0 + x, b.y1 - y),
        }
    }

    pub fn to_user_rect(&self, r: Rect) -> Rect {
        let (ax, ay) = self.to_user_point(r.x0, r.y0);
        let (bx, by) = self.to_user_point(r.x1, r.y1);
        Rect::new(ax, ay, bx, by).normalized()
    }

    /// Text matrix that draws upright text (as seen in a viewer) with its
    /// baseline origin at the visible point `(x, y)`.
    pub fn text_matrix(&self, x: f32, y: f32) -> [f32; 6] {
        let (e, f) = self.to_user_point(x, y);
        let [a, b, c, d] = match self.rotation {
            90 => [0.0, 1.0, -1.0, 0.0],
            180 => [-1.0, 0.0, 0.0, -1.0],
            270 => [0.0, -1.0, 1.0, 0.0],
            _ => [1.0, 0.0, 0.0, 1.0],
        };
        [a, b, c, d, e, f]
    }
}

/// New `/Rotate` value that turns a landscape page upright, `None` for
/// pages that already are portrait.
pub fn portrait_rotation(frame: &PageFrame) -> Option<i32> {
    if !frame.is_landscape() {
        return None;
    }
    Some(if frame.is_sideways() { 0 } else { 270 })
}
