//! Pure dimension math. No I/O.

/// Output dimensions for a width-capped resize.
///
/// The width is `min(original width, max_width)`; the height follows the
/// original aspect ratio and never drops below 1px. Images are never
/// upscaled.
///
/// # Examples
/// ```
/// # use image_relay::imaging::calculate_target_dimensions;
/// assert_eq!(calculate_target_dimensions((4000, 3000), 1000), (1000, 750));
/// assert_eq!(calculate_target_dimensions((800, 600), 2500), (800, 600));
/// ```
pub fn calculate_target_dimensions(original: (u32, u32), max_width: u32) -> (u32, u32) {
    let (orig_w, orig_h) = original;
    if orig_w == 0 || orig_h == 0 {
        return (orig_w, orig_h);
    }
    let width = orig_w.min(max_width.max(1));
    if width == orig_w {
        return (orig_w, orig_h);
    }
    let height = (orig_h as f64 * width as f64 / orig_w as f64).round() as u32;
    (width, height.max(1))
}
