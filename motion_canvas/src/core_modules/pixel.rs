// THEORY (1D Pixel Heuristics):
// The `pixel` module holds the single-pixel color math the engine needs, with no
// knowledge of neighbors in space or time. Two directions of travel:
// - Inbound (sensor → analysis): RGB to Rec. 601 luma, so motion is judged on
//   perceived brightness rather than raw channel sums.
// - Outbound (pattern → output): HSV to RGB for hue-driven patterns, and channel
//   scaling for life-based fading and dimmed glow rings.
//
// Anything that needs more than one pixel (blur, morphology, contours) lives in
// higher-dimension modules like `morphology` and `contour`.

pub mod pixel {
    use image::{GrayImage, Luma, Rgb, RgbImage};

    pub type Channel = u8;
    pub type Luminance = f32;
    pub type Hue = f32;
    pub type Saturation = f32;
    pub type Value = f32;

    /// Luminance estimate (Rec. 601 luma) of a single RGB pixel.
    ///
    /// - Same weights as the common BGR→GRAY conversion used by capture stacks,
    ///   so thresholds tuned there carry over.
    #[inline]
    pub fn luminance(pixel: &Rgb<Channel>) -> Luminance {
        let [red, green, blue] = pixel.0;
        0.299 * red as f32 + 0.587 * green as f32 + 0.114 * blue as f32
    }

    /// Converts a color frame to an 8-bit luma frame.
    pub fn to_luma(frame: &RgbImage) -> GrayImage {
        let mut gray = GrayImage::new(frame.width(), frame.height());
        for (source, target) in frame.pixels().zip(gray.pixels_mut()) {
            *target = Luma([luminance(source).round().clamp(0.0, 255.0) as Channel]);
        }
        gray
    }

    /// HSV → RGB. Hue is normalized to [0, 1), saturation and value to [0, 1].
    pub fn hsv_to_rgb(hue: Hue, saturation: Saturation, value: Value) -> Rgb<Channel> {
        let to_byte = |c: f32| (c * 255.0).clamp(0.0, 255.0) as Channel;

        if saturation <= 0.0 {
            let v = to_byte(value);
            return Rgb([v, v, v]);
        }

        let scaled_hue = hue.rem_euclid(1.0) * 6.0;
        let sector = scaled_hue.floor() as u32 % 6;
        let fraction = scaled_hue - scaled_hue.floor();
        let p = value * (1.0 - saturation);
        let q = value * (1.0 - saturation * fraction);
        let t = value * (1.0 - saturation * (1.0 - fraction));

        let (red, green, blue) = match sector {
            0 => (value, t, p),
            1 => (q, value, p),
            2 => (p, value, t),
            3 => (p, q, value),
            4 => (t, p, value),
            _ => (value, p, q),
        };
        Rgb([to_byte(red), to_byte(green), to_byte(blue)])
    }

    /// Multiplies every channel by `factor`, truncating like an integer cast.
    #[inline]
    pub fn scale(color: Rgb<Channel>, factor: f32) -> Rgb<Channel> {
        let factor = factor.clamp(0.0, 1.0);
        Rgb(color.0.map(|c| (c as f32 * factor) as Channel))
    }
}
