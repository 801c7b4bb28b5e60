/// A rectangle in absolute pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl PixelRect {
    /// Exclusive right edge.
    pub fn right(self) -> u32 {
        self.x + self.w
    }

    /// Exclusive bottom edge.
    pub fn bottom(self) -> u32 {
        self.y + self.h
    }

    pub fn is_empty(self) -> bool {
        self.w == 0 || self.h == 0
    }

    /// Whether the whole rect lies inside a `width` x `height` image.
    pub fn fits_within(self, width: u32, height: u32) -> bool {
        !self.is_empty()
            && (self.x as u64 + self.w as u64) <= width as u64
            && (self.y as u64 + self.h as u64) <= height as u64
    }

    /// Scale this rect from a reference resolution to a target resolution.
    pub fn scale_to(self, target_w: u32, target_h: u32, ref_w: u32, ref_h: u32) -> PixelRect {
        assert!(ref_w > 0 && ref_h > 0, "reference resolution must be > 0");
        assert!(target_w > 0 && target_h > 0, "target resolution must be > 0");
        PixelRect {
            x: (self.x as u64 * target_w as u64 / ref_w as u64) as u32,
            y: (self.y as u64 * target_h as u64 / ref_h as u64) as u32,
            w: (self.w as u64 * target_w as u64 / ref_w as u64) as u32,
            h: (self.h as u64 * target_h as u64 / ref_h as u64) as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_to_same_resolution() {
        let r = PixelRect { x: 100, y: 50, w: 200, h: 30 };
        let scaled = r.scale_to(1920, 1080, 1920, 1080);
        assert_eq!(scaled, r);
    }

    #[test]
    fn scale_to_double_resolution() {
        let r = PixelRect { x: 12, y: 8, w: 40, h: 10 };
        let scaled = r.scale_to(1920, 1080, 960, 540);
        assert_eq!(scaled, PixelRect { x: 24, y: 16, w: 80, h: 20 });
    }

    #[test]
    fn fits_within_checks_both_edges() {
        let r = PixelRect { x: 10, y: 10, w: 20, h: 5 };
        assert!(r.fits_within(30, 15));
        assert!(!r.fits_within(29, 15));
        assert!(!r.fits_within(30, 14));
    }

    #[test]
    fn empty_rect_never_fits() {
        let r = PixelRect { x: 0, y: 0, w: 0, h: 4 };
        assert!(r.is_empty());
        assert!(!r.fits_within(100, 100));
    }
}
