use std::fmt;

/// One detected object, in pixel coordinates of the source frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub class_id: u32,
    pub label: String,
    pub confidence: f32,
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Detection {
    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    pub fn area(&self) -> f32 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    pub fn center(&self) -> (f32, f32) {
        ((self.left + self.right) / 2.0, (self.top + self.bottom) / 2.0)
    }
}

impl fmt::Display for Detection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (cx, cy) = self.center();
        write!(
            f,
            "<Detection class_id={} label={} confidence={:.4} left={:.1} top={:.1} right={:.1} bottom={:.1} width={:.1} height={:.1} area={:.1} center=({:.1}, {:.1})>",
            self.class_id,
            self.label,
            self.confidence,
            self.left,
            self.top,
            self.right,
            self.bottom,
            self.width(),
            self.height(),
            self.area(),
            cx,
            cy
        )
    }
}
