use serde::{Deserialize, Serialize};

/// Absolute frame in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    /// Largest difference over the four axes.
    pub fn max_axis_delta(&self, other: &Rect) -> f64 {
        (self.x - other.x)
            .abs()
            .max((self.y - other.y).abs())
            .max((self.w - other.w).abs())
            .max((self.h - other.h).abs())
    }

    /// City-block distance: sum of absolute coordinate and size differences.
    pub fn city_block(&self, other: &Rect) -> f64 {
        (self.x - other.x).abs()
            + (self.y - other.y).abs()
            + (self.w - other.w).abs()
            + (self.h - other.h).abs()
    }

    pub fn within(&self, other: &Rect, tolerance: f64) -> bool {
        self.max_axis_delta(other) <= tolerance
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    pub fn contains_point(&self, (px, py): (f64, f64)) -> bool {
        px >= self.x && px < self.x + self.w && py >= self.y && py < self.y + self.h
    }
}

impl std::fmt::Display for Rect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}@{},{}", self.w, self.h, self.x, self.y)
    }
}

/// Window frame as fractions (0..1) of the managed display's bounds.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct UnitFrame {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl UnitFrame {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DisplayInfo {
    pub name: String,
    pub frame: Rect,
}

impl DisplayInfo {
    pub fn new(name: &str, frame: Rect) -> Self {
        Self {
            name: name.to_string(),
            frame,
        }
    }

    pub fn normalize(&self, rect: &Rect) -> UnitFrame {
        let b = &self.frame;
        if b.w <= 0.0 || b.h <= 0.0 {
            return UnitFrame::default();
        }
        UnitFrame {
            x: (rect.x - b.x) / b.w,
            y: (rect.y - b.y) / b.h,
            w: rect.w / b.w,
            h: rect.h / b.h,
        }
    }

    /// Absolute frame for a normalized one, rounded to whole pixels.
    pub fn absolute(&self, unit: &UnitFrame) -> Rect {
        let b = &self.frame;
        Rect {
            x: (b.x + unit.x * b.w).round(),
            y: (b.y + unit.y * b.h).round(),
            w: (unit.w * b.w).round(),
            h: (unit.h * b.h).round(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_is_relative_to_display_origin() {
        let display = DisplayInfo::new("Side", Rect::new(1920.0, 0.0, 1000.0, 800.0));
        let unit = display.normalize(&Rect::new(2420.0, 200.0, 500.0, 400.0));
        assert_eq!(unit, UnitFrame::new(0.5, 0.25, 0.5, 0.5));
        assert_eq!(
            display.absolute(&unit),
            Rect::new(2420.0, 200.0, 500.0, 400.0)
        );
    }

    #[test]
    fn tolerance_is_per_axis() {
        let target = Rect::new(100.0, 100.0, 500.0, 500.0);
        assert!(Rect::new(149.0, 51.0, 549.0, 451.0).within(&target, 50.0));
        assert!(!Rect::new(100.0, 100.0, 551.0, 500.0).within(&target, 50.0));
        assert_eq!(Rect::new(110.0, 90.0, 500.0, 505.0).city_block(&target), 25.0);
    }

    #[test]
    fn degenerate_display_normalizes_to_zero() {
        let display = DisplayInfo::new("Broken", Rect::new(0.0, 0.0, 0.0, 0.0));
        assert_eq!(
            display.normalize(&Rect::new(10.0, 10.0, 10.0, 10.0)),
            UnitFrame::default()
        );
    }
}
