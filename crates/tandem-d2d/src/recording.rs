//! A [`Surface2d`] that records calls instead of rendering.
//!
//! Besides the call log it keeps the state that draw instructions can read
//! back: the transform, the line dash, canvas properties and an RGBA pixel
//! store fed by `put_image_data`.

use crate::surface::{
    DirtyRect, ImageData, ImagePlacement, Matrix, Paint, Surface2d, TextMetrics,
};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub enum RecordedPaint {
    Css(String),
    /// Serial number of the gradient.
    Gradient(u32),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedGradient {
    pub serial: u32,
    pub stops: Vec<(f64, String)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedImage {
    pub url: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PropValue {
    Number(f64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceCall {
    FillRect { x: f64, y: f64, w: f64, h: f64 },
    StrokeRect { x: f64, y: f64, w: f64, h: f64 },
    ClearRect { x: f64, y: f64, w: f64, h: f64 },
    FillText { text: String, x: f64, y: f64 },
    StrokeText { text: String, x: f64, y: f64 },
    MeasureText(String),
    SetLineWidth(f64),
    SetLineCap(String),
    SetLineJoin(String),
    SetLineDash(Vec<f64>),
    SetLineDashOffset(f64),
    SetFont(String),
    SetFillStyle(RecordedPaint),
    SetStrokeStyle(RecordedPaint),
    BeginPath,
    ClosePath,
    MoveTo { x: f64, y: f64 },
    LineTo { x: f64, y: f64 },
    BezierCurveTo([f64; 6]),
    QuadraticCurveTo([f64; 4]),
    Arc {
        x: f64,
        y: f64,
        radius: f64,
        start: f64,
        end: f64,
        ccw: bool,
    },
    ArcTo([f64; 5]),
    Ellipse {
        params: [f64; 7],
        ccw: bool,
    },
    Rect { x: f64, y: f64, w: f64, h: f64 },
    RoundRect { x: f64, y: f64, w: f64, h: f64, radii: f64 },
    Fill,
    Stroke,
    Save,
    Restore,
    Reset,
    Scale { x: f64, y: f64 },
    Translate { x: f64, y: f64 },
    Rotate(f64),
    Transform(Matrix),
    SetTransform(Matrix),
    ResetTransform,
    CreateRadialGradient { serial: u32, params: [f64; 6] },
    CreateLinearGradient { serial: u32, params: [f64; 4] },
    AddColorStop { serial: u32, offset: f64, color: String },
    PutImageData {
        width: u32,
        height: u32,
        dx: u32,
        dy: u32,
        dirty: Option<DirtyRect>,
        pixels: Vec<u8>,
    },
    GetImageData { x: f64, y: f64, w: f64, h: f64 },
    DrawImage { url: String, placement: ImagePlacement },
    LoadImage(String),
    SetCanvasProp { name: String, value: PropValue },
}

#[derive(Debug, Clone)]
struct DrawState {
    transform: Matrix,
    line_dash: Vec<f64>,
    props: HashMap<String, PropValue>,
}

impl DrawState {
    fn initial() -> Self {
        let mut props = HashMap::new();
        props.insert("lineWidth".to_owned(), PropValue::Number(1.0));
        props.insert("lineDashOffset".to_owned(), PropValue::Number(0.0));
        props.insert("globalAlpha".to_owned(), PropValue::Number(1.0));
        props.insert("font".to_owned(), PropValue::Text("10px sans-serif".to_owned()));
        props.insert("lineCap".to_owned(), PropValue::Text("butt".to_owned()));
        props.insert("lineJoin".to_owned(), PropValue::Text("miter".to_owned()));
        props.insert("fillStyle".to_owned(), PropValue::Text("#000000".to_owned()));
        props.insert("strokeStyle".to_owned(), PropValue::Text("#000000".to_owned()));
        Self {
            transform: Matrix::IDENTITY,
            line_dash: Vec::new(),
            props,
        }
    }
}

#[derive(Debug)]
pub struct RecordingSurface {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    state: DrawState,
    stack: Vec<DrawState>,
    images: HashMap<String, (u32, u32)>,
    next_gradient: u32,
    calls: Vec<SurfaceCall>,
}

impl RecordingSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize * 4],
            state: DrawState::initial(),
            stack: Vec::new(),
            images: HashMap::new(),
            next_gradient: 1,
            calls: Vec::new(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Make `url` loadable with the given natural size.
    pub fn add_image(&mut self, url: &str, width: u32, height: u32) {
        self.images.insert(url.to_owned(), (width, height));
    }

    pub fn calls(&self) -> &[SurfaceCall] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<SurfaceCall> {
        std::mem::take(&mut self.calls)
    }

    /// RGBA of the pixel at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        Some([
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ])
    }

    fn set_prop(&mut self, name: &str, value: PropValue) {
        self.state.props.insert(name.to_owned(), value);
    }

    fn record_paint(paint: Paint<'_, RecordedGradient>) -> RecordedPaint {
        match paint {
            Paint::Css(css) => RecordedPaint::Css(css.to_owned()),
            Paint::Gradient(g) => RecordedPaint::Gradient(g.serial),
        }
    }

    fn new_gradient(&mut self) -> RecordedGradient {
        let serial = self.next_gradient;
        self.next_gradient += 1;
        RecordedGradient {
            serial,
            stops: Vec::new(),
        }
    }

    fn apply(&mut self, m: Matrix) {
        self.state.transform = self.state.transform.multiply(&m);
    }
}

impl Surface2d for RecordingSurface {
    type Gradient = RecordedGradient;
    type Image = RecordedImage;

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64) {
        self.calls.push(SurfaceCall::FillRect { x, y, w, h });
    }

    fn stroke_rect(&mut self, x: f64, y: f64, w: f64, h: f64) {
        self.calls.push(SurfaceCall::StrokeRect { x, y, w, h });
    }

    fn clear_rect(&mut self, x: f64, y: f64, w: f64, h: f64) {
        self.calls.push(SurfaceCall::ClearRect { x, y, w, h });
    }

    fn fill_text(&mut self, text: &str, x: f64, y: f64) {
        self.calls.push(SurfaceCall::FillText {
            text: text.to_owned(),
            x,
            y,
        });
    }

    fn stroke_text(&mut self, text: &str, x: f64, y: f64) {
        self.calls.push(SurfaceCall::StrokeText {
            text: text.to_owned(),
            x,
            y,
        });
    }

    /// Monospace model: every character is 8 units wide and 10 tall.
    fn measure_text(&mut self, text: &str) -> TextMetrics {
        self.calls.push(SurfaceCall::MeasureText(text.to_owned()));
        let width = text.chars().count() as f64 * 8.0;
        TextMetrics {
            actual_bounding_box_ascent: 8.0,
            actual_bounding_box_descent: 2.0,
            actual_bounding_box_left: 0.0,
            actual_bounding_box_right: width,
            font_bounding_box_ascent: 9.0,
            font_bounding_box_descent: 3.0,
            width,
        }
    }

    fn set_line_width(&mut self, width: f64) {
        self.calls.push(SurfaceCall::SetLineWidth(width));
        self.set_prop("lineWidth", PropValue::Number(width));
    }

    fn set_line_cap(&mut self, cap: &str) {
        self.calls.push(SurfaceCall::SetLineCap(cap.to_owned()));
        self.set_prop("lineCap", PropValue::Text(cap.to_owned()));
    }

    fn set_line_join(&mut self, join: &str) {
        self.calls.push(SurfaceCall::SetLineJoin(join.to_owned()));
        self.set_prop("lineJoin", PropValue::Text(join.to_owned()));
    }

    fn set_line_dash(&mut self, segments: &[f64]) {
        self.calls.push(SurfaceCall::SetLineDash(segments.to_vec()));
        self.state.line_dash = segments.to_vec();
    }

    fn line_dash(&self) -> Vec<f64> {
        self.state.line_dash.clone()
    }

    fn set_line_dash_offset(&mut self, offset: f64) {
        self.calls.push(SurfaceCall::SetLineDashOffset(offset));
        self.set_prop("lineDashOffset", PropValue::Number(offset));
    }

    fn set_font(&mut self, font: &str) {
        self.calls.push(SurfaceCall::SetFont(font.to_owned()));
        self.set_prop("font", PropValue::Text(font.to_owned()));
    }

    fn set_fill_style(&mut self, paint: Paint<'_, RecordedGradient>) {
        if let Paint::Css(css) = paint {
            self.set_prop("fillStyle", PropValue::Text(css.to_owned()));
        }
        self.calls
            .push(SurfaceCall::SetFillStyle(Self::record_paint(paint)));
    }

    fn set_stroke_style(&mut self, paint: Paint<'_, RecordedGradient>) {
        if let Paint::Css(css) = paint {
            self.set_prop("strokeStyle", PropValue::Text(css.to_owned()));
        }
        self.calls
            .push(SurfaceCall::SetStrokeStyle(Self::record_paint(paint)));
    }

    fn begin_path(&mut self) {
        self.calls.push(SurfaceCall::BeginPath);
    }

    fn close_path(&mut self) {
        self.calls.push(SurfaceCall::ClosePath);
    }

    fn move_to(&mut self, x: f64, y: f64) {
        self.calls.push(SurfaceCall::MoveTo { x, y });
    }

    fn line_to(&mut self, x: f64, y: f64) {
        self.calls.push(SurfaceCall::LineTo { x, y });
    }

    fn bezier_curve_to(&mut self, cp1x: f64, cp1y: f64, cp2x: f64, cp2y: f64, x: f64, y: f64) {
        self.calls
            .push(SurfaceCall::BezierCurveTo([cp1x, cp1y, cp2x, cp2y, x, y]));
    }

    fn quadratic_curve_to(&mut self, cpx: f64, cpy: f64, x: f64, y: f64) {
        self.calls
            .push(SurfaceCall::QuadraticCurveTo([cpx, cpy, x, y]));
    }

    fn arc(&mut self, x: f64, y: f64, radius: f64, start: f64, end: f64, ccw: bool) {
        self.calls.push(SurfaceCall::Arc {
            x,
            y,
            radius,
            start,
            end,
            ccw,
        });
    }

    fn arc_to(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, radius: f64) {
        self.calls.push(SurfaceCall::ArcTo([x1, y1, x2, y2, radius]));
    }

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
    ) {
        self.calls.push(SurfaceCall::Ellipse {
            params: [x, y, radius_x, radius_y, rotation, start, end],
            ccw,
        });
    }

    fn rect(&mut self, x: f64, y: f64, w: f64, h: f64) {
        self.calls.push(SurfaceCall::Rect { x, y, w, h });
    }

    fn round_rect(&mut self, x: f64, y: f64, w: f64, h: f64, radii: f64) {
        self.calls.push(SurfaceCall::RoundRect { x, y, w, h, radii });
    }

    fn fill(&mut self) {
        self.calls.push(SurfaceCall::Fill);
    }

    fn stroke(&mut self) {
        self.calls.push(SurfaceCall::Stroke);
    }

    fn save(&mut self) {
        self.calls.push(SurfaceCall::Save);
        self.stack.push(self.state.clone());
    }

    fn restore(&mut self) {
        self.calls.push(SurfaceCall::Restore);
        if let Some(state) = self.stack.pop() {
            self.state = state;
        }
    }

    fn reset(&mut self) {
        self.calls.push(SurfaceCall::Reset);
        self.state = DrawState::initial();
        self.stack.clear();
        self.pixels.fill(0);
    }

    fn scale(&mut self, x: f64, y: f64) {
        self.calls.push(SurfaceCall::Scale { x, y });
        self.apply(Matrix {
            a: x,
            d: y,
            ..Matrix::IDENTITY
        });
    }

    fn translate(&mut self, x: f64, y: f64) {
        self.calls.push(SurfaceCall::Translate { x, y });
        self.apply(Matrix {
            e: x,
            f: y,
            ..Matrix::IDENTITY
        });
    }

    fn rotate(&mut self, angle: f64) {
        self.calls.push(SurfaceCall::Rotate(angle));
        let (sin, cos) = angle.sin_cos();
        self.apply(Matrix {
            a: cos,
            b: sin,
            c: -sin,
            d: cos,
            e: 0.0,
            f: 0.0,
        });
    }

    fn transform(&mut self, m: Matrix) {
        self.calls.push(SurfaceCall::Transform(m));
        self.apply(m);
    }

    fn set_transform(&mut self, m: Matrix) {
        self.calls.push(SurfaceCall::SetTransform(m));
        self.state.transform = m;
    }

    fn reset_transform(&mut self) {
        self.calls.push(SurfaceCall::ResetTransform);
        self.state.transform = Matrix::IDENTITY;
    }

    fn get_transform(&self) -> Matrix {
        self.state.transform
    }

    fn create_radial_gradient(
        &mut self,
        x0: f64,
        y0: f64,
        r0: f64,
        x1: f64,
        y1: f64,
        r1: f64,
    ) -> RecordedGradient {
        let g = self.new_gradient();
        self.calls.push(SurfaceCall::CreateRadialGradient {
            serial: g.serial,
            params: [x0, y0, r0, x1, y1, r1],
        });
        g
    }

    fn create_linear_gradient(&mut self, x0: f64, y0: f64, x1: f64, y1: f64) -> RecordedGradient {
        let g = self.new_gradient();
        self.calls.push(SurfaceCall::CreateLinearGradient {
            serial: g.serial,
            params: [x0, y0, x1, y1],
        });
        g
    }

    fn add_color_stop(&mut self, gradient: &mut RecordedGradient, offset: f64, color: &str) {
        gradient.stops.push((offset, color.to_owned()));
        self.calls.push(SurfaceCall::AddColorStop {
            serial: gradient.serial,
            offset,
            color: color.to_owned(),
        });
    }

    fn put_image_data(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
        dx: u32,
        dy: u32,
        dirty: Option<DirtyRect>,
    ) {
        self.calls.push(SurfaceCall::PutImageData {
            width,
            height,
            dx,
            dy,
            dirty,
            pixels: pixels.to_vec(),
        });

        let region = dirty.unwrap_or(DirtyRect {
            x: 0,
            y: 0,
            width,
            height,
        });
        let x_end = region.x.saturating_add(region.width).min(width);
        let y_end = region.y.saturating_add(region.height).min(height);
        for sy in region.y..y_end {
            for sx in region.x..x_end {
                let (tx, ty) = (dx + sx, dy + sy);
                if tx >= self.width || ty >= self.height {
                    continue;
                }
                let src = (sy as usize * width as usize + sx as usize) * 4;
                let dst = (ty as usize * self.width as usize + tx as usize) * 4;
                self.pixels[dst..dst + 4].copy_from_slice(&pixels[src..src + 4]);
            }
        }
    }

    fn get_image_data(&mut self, x: f64, y: f64, w: f64, h: f64) -> ImageData {
        self.calls.push(SurfaceCall::GetImageData { x, y, w, h });
        let (x0, y0) = (x.max(0.0) as u32, y.max(0.0) as u32);
        let (width, height) = (w.max(0.0) as u32, h.max(0.0) as u32);
        let mut data = vec![0u8; width as usize * height as usize * 4];
        for row in 0..height {
            for col in 0..width {
                if let Some(px) = self.pixel(x0 + col, y0 + row) {
                    let i = (row as usize * width as usize + col as usize) * 4;
                    data[i..i + 4].copy_from_slice(&px);
                }
            }
        }
        ImageData {
            width,
            height,
            data,
        }
    }

    fn draw_image(&mut self, image: &RecordedImage, placement: ImagePlacement) {
        self.calls.push(SurfaceCall::DrawImage {
            url: image.url.clone(),
            placement,
        });
    }

    fn load_image(&mut self, url: &str) -> Option<RecordedImage> {
        self.calls.push(SurfaceCall::LoadImage(url.to_owned()));
        let &(width, height) = self.images.get(url)?;
        Some(RecordedImage {
            url: url.to_owned(),
            width,
            height,
        })
    }

    fn canvas_prop_f64(&self, name: &str) -> Option<f64> {
        match self.state.props.get(name)? {
            PropValue::Number(v) => Some(*v),
            PropValue::Text(_) => None,
        }
    }

    fn canvas_prop_string(&self, name: &str) -> Option<String> {
        match self.state.props.get(name)? {
            PropValue::Text(s) => Some(s.clone()),
            PropValue::Number(_) => None,
        }
    }

    fn set_canvas_prop_f64(&mut self, name: &str, value: f64) {
        self.calls.push(SurfaceCall::SetCanvasProp {
            name: name.to_owned(),
            value: PropValue::Number(value),
        });
        self.set_prop(name, PropValue::Number(value));
    }

    fn set_canvas_prop_string(&mut self, name: &str, value: &str) {
        self.calls.push(SurfaceCall::SetCanvasProp {
            name: name.to_owned(),
            value: PropValue::Text(value.to_owned()),
        });
        self.set_prop(name, PropValue::Text(value.to_owned()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_restore_covers_transform_dash_and_props() {
        let mut s = RecordingSurface::new(4, 4);
        s.translate(5.0, 6.0);
        s.set_line_dash(&[1.0, 2.0]);
        s.save();
        s.scale(2.0, 2.0);
        s.set_line_dash(&[]);
        s.set_line_width(3.0);
        assert_eq!(s.get_transform().to_array(), [2.0, 0.0, 0.0, 2.0, 5.0, 6.0]);
        s.restore();
        assert_eq!(s.get_transform().to_array(), [1.0, 0.0, 0.0, 1.0, 5.0, 6.0]);
        assert_eq!(s.line_dash(), vec![1.0, 2.0]);
        assert_eq!(s.canvas_prop_f64("lineWidth"), Some(1.0));
    }

    #[test]
    fn put_then_get_image_data_respects_dirty_rect() {
        let mut s = RecordingSurface::new(4, 4);
        let pixels: Vec<u8> = (0..16).collect(); // 2x2
        s.put_image_data(
            &pixels,
            2,
            2,
            1,
            1,
            Some(DirtyRect {
                x: 1,
                y: 0,
                width: 1,
                height: 2,
            }),
        );
        assert_eq!(s.pixel(1, 1), Some([0, 0, 0, 0]));
        assert_eq!(s.pixel(2, 1), Some([4, 5, 6, 7]));
        assert_eq!(s.pixel(2, 2), Some([12, 13, 14, 15]));

        let got = s.get_image_data(2.0, 1.0, 1.0, 2.0);
        assert_eq!(got.data, vec![4, 5, 6, 7, 12, 13, 14, 15]);
    }

    #[test]
    fn props_are_typed() {
        let s = RecordingSurface::new(1, 1);
        assert_eq!(s.canvas_prop_string("font").as_deref(), Some("10px sans-serif"));
        assert_eq!(s.canvas_prop_f64("font"), None);
        assert_eq!(s.canvas_prop_string("nope"), None);
    }
}
