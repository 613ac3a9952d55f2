//! The drawing surface the interpreter replays instructions onto.
//!
//! The trait mirrors the HTML canvas 2D context closely enough that a browser
//! backend is a thin forwarding layer. Gradients and loaded images are opaque
//! backend objects, referred to from the instruction stream by integer handle.

/// A 2D affine transform `[a c e; b d f; 0 0 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Matrix {
    pub const IDENTITY: Self = Self {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    /// `self * rhs`: `rhs` is applied first.
    pub fn multiply(&self, rhs: &Matrix) -> Matrix {
        Matrix {
            a: self.a * rhs.a + self.c * rhs.b,
            b: self.b * rhs.a + self.d * rhs.b,
            c: self.a * rhs.c + self.c * rhs.d,
            d: self.b * rhs.c + self.d * rhs.d,
            e: self.a * rhs.e + self.c * rhs.f + self.e,
            f: self.b * rhs.e + self.d * rhs.f + self.f,
        }
    }

    pub fn to_array(&self) -> [f64; 6] {
        [self.a, self.b, self.c, self.d, self.e, self.f]
    }
}

impl Default for Matrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Result of a text measurement, in the order it is written back to memory.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TextMetrics {
    pub actual_bounding_box_ascent: f64,
    pub actual_bounding_box_descent: f64,
    pub actual_bounding_box_left: f64,
    pub actual_bounding_box_right: f64,
    pub font_bounding_box_ascent: f64,
    pub font_bounding_box_descent: f64,
    pub width: f64,
}

impl TextMetrics {
    pub fn to_array(&self) -> [f64; 7] {
        [
            self.actual_bounding_box_ascent,
            self.actual_bounding_box_descent,
            self.actual_bounding_box_left,
            self.actual_bounding_box_right,
            self.font_bounding_box_ascent,
            self.font_bounding_box_descent,
            self.width,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirtyRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// RGBA8 pixels, row-major, `width * height * 4` bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

/// Where a `drawImage` lands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImagePlacement {
    /// Source rectangle `(sx, sy, sw, sh)`; `None` draws the whole image.
    pub source: Option<[f64; 4]>,
    pub dx: f64,
    pub dy: f64,
    /// Destination size; `None` keeps the natural (or source) size.
    pub dest_size: Option<[f64; 2]>,
}

/// Fill or stroke style.
#[derive(Debug)]
pub enum Paint<'a, G> {
    Css(&'a str),
    Gradient(&'a G),
}

impl<G> Clone for Paint<'_, G> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<G> Copy for Paint<'_, G> {}

pub trait Surface2d {
    type Gradient;
    type Image;

    /// Canvas size in pixels, `(width, height)`.
    fn size(&self) -> (u32, u32);

    fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64);
    fn stroke_rect(&mut self, x: f64, y: f64, w: f64, h: f64);
    fn clear_rect(&mut self, x: f64, y: f64, w: f64, h: f64);
    fn fill_text(&mut self, text: &str, x: f64, y: f64);
    fn stroke_text(&mut self, text: &str, x: f64, y: f64);
    fn measure_text(&mut self, text: &str) -> TextMetrics;

    fn set_line_width(&mut self, width: f64);
    fn set_line_cap(&mut self, cap: &str);
    fn set_line_join(&mut self, join: &str);
    fn set_line_dash(&mut self, segments: &[f64]);
    fn line_dash(&self) -> Vec<f64>;
    fn set_line_dash_offset(&mut self, offset: f64);
    fn set_font(&mut self, font: &str);
    fn set_fill_style(&mut self, paint: Paint<'_, Self::Gradient>);
    fn set_stroke_style(&mut self, paint: Paint<'_, Self::Gradient>);

    fn begin_path(&mut self);
    fn close_path(&mut self);
    fn move_to(&mut self, x: f64, y: f64);
    fn line_to(&mut self, x: f64, y: f64);
    fn bezier_curve_to(&mut self, cp1x: f64, cp1y: f64, cp2x: f64, cp2y: f64, x: f64, y: f64);
    fn quadratic_curve_to(&mut self, cpx: f64, cpy: f64, x: f64, y: f64);
    fn arc(&mut self, x: f64, y: f64, radius: f64, start: f64, end: f64, ccw: bool);
    fn arc_to(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, radius: f64);
    #[allow(clippy::too_many_arguments)]
    fn ellipse(
        &mut self,
        x: f64,
        y: f64,
        radius_x: f64,
        radius_y: f64,
        rotation: f64,
        start: f64,
        end: f64,
        ccw: bool,
    );
    fn rect(&mut self, x: f64, y: f64, w: f64, h: f64);
    fn round_rect(&mut self, x: f64, y: f64, w: f64, h: f64, radii: f64);
    fn fill(&mut self);
    fn stroke(&mut self);

    fn save(&mut self);
    fn restore(&mut self);
    /// Reset the whole context to its initial state.
    fn reset(&mut self);

    fn scale(&mut self, x: f64, y: f64);
    fn translate(&mut self, x: f64, y: f64);
    fn rotate(&mut self, angle: f64);
    fn transform(&mut self, m: Matrix);
    fn set_transform(&mut self, m: Matrix);
    fn reset_transform(&mut self);
    fn get_transform(&self) -> Matrix;

    #[allow(clippy::too_many_arguments)]
    fn create_radial_gradient(
        &mut self,
        x0: f64,
        y0: f64,
        r0: f64,
        x1: f64,
        y1: f64,
        r1: f64,
    ) -> Self::Gradient;
    fn create_linear_gradient(&mut self, x0: f64, y0: f64, x1: f64, y1: f64) -> Self::Gradient;
    fn add_color_stop(&mut self, gradient: &mut Self::Gradient, offset: f64, color: &str);

    /// `pixels` is RGBA8 with `width * height * 4` bytes.
    fn put_image_data(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
        dx: u32,
        dy: u32,
        dirty: Option<DirtyRect>,
    );
    fn get_image_data(&mut self, x: f64, y: f64, w: f64, h: f64) -> ImageData;
    fn draw_image(&mut self, image: &Self::Image, placement: ImagePlacement);
    /// Load an image by URL. `None` when loading failed.
    fn load_image(&mut self, url: &str) -> Option<Self::Image>;

    /// Numeric canvas context property, `None` if absent or not a number.
    fn canvas_prop_f64(&self, name: &str) -> Option<f64>;
    /// String canvas context property, `None` if absent or not a string.
    fn canvas_prop_string(&self, name: &str) -> Option<String>;
    fn set_canvas_prop_f64(&mut self, name: &str, value: f64);
    fn set_canvas_prop_string(&mut self, name: &str, value: &str);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiply_applies_rhs_first() {
        let translate = Matrix {
            e: 10.0,
            f: 20.0,
            ..Matrix::IDENTITY
        };
        let scale = Matrix {
            a: 2.0,
            d: 3.0,
            ..Matrix::IDENTITY
        };
        // translate then scale: the translation is scaled.
        let m = scale.multiply(&translate);
        assert_eq!(m.to_array(), [2.0, 0.0, 0.0, 3.0, 20.0, 60.0]);
        assert_eq!(Matrix::IDENTITY.multiply(&m), m);
    }
}
