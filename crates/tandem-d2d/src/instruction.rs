//! Decoded draw instructions.
//!
//! Parameter offsets are relative to the parameter block at
//! `record + RECORD_HEADER_LEN`. Instructions that return values (text
//! metrics, transforms, dash patterns, canvas properties) carry the address
//! the result is written to; a few write into their own record.

use crate::surface::{DirtyRect, ImagePlacement, Matrix};
use crate::wire::Opcode;
use tandem_mem::{Memory, MemoryError};

#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    FillRect { x: f64, y: f64, w: f64, h: f64 },
    FillCodepoint { x: f64, y: f64, codepoint: u32 },
    SetLineWidth(f64),
    SetFillStyleRgba(u32),
    SetFont(String),
    BeginPath,
    MoveTo { x: f64, y: f64 },
    LineTo { x: f64, y: f64 },
    Fill,
    Stroke,
    SetStrokeStyleRgba(u32),
    Arc {
        x: f64,
        y: f64,
        radius: f64,
        start: f64,
        end: f64,
        ccw: bool,
    },
    StrokeRect { x: f64, y: f64, w: f64, h: f64 },
    FillText {
        x: f64,
        y: f64,
        text: String,
        code_page: u32,
    },
    /// Registers `len` bytes of RGBA8 pixels at `addr` under `id`.
    ImageData {
        addr: u32,
        len: u32,
        width: u32,
        height: u32,
        id: i32,
    },
    PutImageData {
        id: i32,
        dx: u32,
        dy: u32,
        dirty: Option<DirtyRect>,
    },
    BezierTo {
        cp1x: f64,
        cp1y: f64,
        cp2x: f64,
        cp2y: f64,
        x: f64,
        y: f64,
    },
    MeasureText {
        text: String,
        out: u32,
        code_page: u32,
    },
    Save,
    Restore,
    CreateRadialGradient {
        x0: f64,
        y0: f64,
        r0: f64,
        x1: f64,
        y1: f64,
        r1: f64,
        id: i32,
    },
    SetColorStop {
        id: i32,
        position: i32,
        color: String,
    },
    SetFillStyleGradient { id: i32 },
    ReleaseId { id: i32 },
    CreateLinearGradient {
        x0: f64,
        y0: f64,
        x1: f64,
        y1: f64,
        id: i32,
    },
    SetFillStyle(String),
    SetStrokeStyle(String),
    ClosePath,
    Reset,
    ClearRect { x: f64, y: f64, w: f64, h: f64 },
    Scale { x: f64, y: f64 },
    Translate { x: f64, y: f64 },
    Rotate { angle: f64 },
    GetTransform { out: u32 },
    SetTransform(Matrix),
    ResetTransform,
    StrokeText {
        x: f64,
        y: f64,
        text: String,
        code_page: u32,
    },
    RoundRect {
        x: f64,
        y: f64,
        w: f64,
        h: f64,
        radii: f64,
    },
    Ellipse {
        x: f64,
        y: f64,
        radius_x: f64,
        radius_y: f64,
        rotation: f64,
        start: f64,
        end: f64,
        ccw: bool,
    },
    QuadraticCurveTo { cpx: f64, cpy: f64, x: f64, y: f64 },
    SetLineDash(Vec<f64>),
    /// Copies up to `buffer_len` segments to `buffer`; the segment count is
    /// written back into the record.
    GetLineDash { buffer_len: u32, buffer: u32 },
    ArcTo {
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
        radius: f64,
    },
    /// The segment count is written back into the record.
    GetLineDashLength,
    DrawImage { id: i32, placement: ImagePlacement },
    Rect { x: f64, y: f64, w: f64, h: f64 },
    Transform(Matrix),
    SetLineCap(String),
    SetLineJoin(String),
    SetLineDashOffset(f64),
    GetImageData {
        x: f64,
        y: f64,
        w: f64,
        h: f64,
        id: i32,
    },
    ImageDataToC { buffer: u32, buffer_len: u32, id: i32 },
    GetCanvasPropDouble { out: u32, name: String },
    GetCanvasPropString {
        out: u32,
        max_len: u32,
        name: String,
    },
    SetCanvasPropDouble { value: f64, name: String },
    SetCanvasPropString { value: String, name: String },
}

/// Offset of the count written back by `GETLINEDASH`.
pub const GET_LINE_DASH_COUNT_OFFSET: u32 = 8;
/// Offset of the count written back by `GETLINEDASHLENGTH`.
pub const GET_LINE_DASH_LENGTH_OFFSET: u32 = 0;

struct Params<'m> {
    mem: &'m dyn Memory,
    base: u32,
}

impl Params<'_> {
    fn addr(&self, offset: u32) -> Result<u32, MemoryError> {
        self.base
            .checked_add(offset)
            .ok_or(MemoryError::OutOfBounds {
                addr: self.base,
                len: offset as usize,
            })
    }

    fn f64(&self, offset: u32) -> Result<f64, MemoryError> {
        self.mem.read_f64(self.addr(offset)?)
    }

    fn u32(&self, offset: u32) -> Result<u32, MemoryError> {
        self.mem.read_u32(self.addr(offset)?)
    }

    fn i32(&self, offset: u32) -> Result<i32, MemoryError> {
        self.mem.read_i32(self.addr(offset)?)
    }

    fn bool(&self, offset: u32) -> Result<bool, MemoryError> {
        Ok(self.u32(offset)? != 0)
    }

    /// NUL-terminated string behind the pointer stored at `offset`.
    fn str(&self, offset: u32) -> Result<String, MemoryError> {
        let ptr = self.u32(offset)?;
        self.mem.read_cstr(ptr)
    }

    fn matrix(&self) -> Result<Matrix, MemoryError> {
        Ok(Matrix {
            a: self.f64(0)?,
            b: self.f64(8)?,
            c: self.f64(16)?,
            d: self.f64(24)?,
            e: self.f64(32)?,
            f: self.f64(40)?,
        })
    }

    fn f64_array(&self, addr: u32, count: u32) -> Result<Vec<f64>, MemoryError> {
        let len = count as usize * 8;
        if (addr as usize).saturating_add(len) > self.mem.size() {
            return Err(MemoryError::OutOfBounds { addr, len });
        }
        (0..count).map(|i| self.mem.read_f64(addr + i * 8)).collect()
    }
}

impl Instruction {
    /// Decode the parameters of an `op` record whose parameter block starts at
    /// `params`.
    pub fn decode(mem: &dyn Memory, op: Opcode, params: u32) -> Result<Self, MemoryError> {
        let p = Params { mem, base: params };
        Ok(match op {
            Opcode::FillRect => Self::FillRect {
                x: p.f64(0)?,
                y: p.f64(8)?,
                w: p.f64(16)?,
                h: p.f64(24)?,
            },
            Opcode::FillCodepoint => Self::FillCodepoint {
                x: p.f64(0)?,
                y: p.f64(8)?,
                codepoint: p.u32(16)?,
            },
            Opcode::SetLineWidth => Self::SetLineWidth(p.f64(0)?),
            Opcode::SetFillStyleRgba => Self::SetFillStyleRgba(p.u32(0)?),
            Opcode::SetFont => Self::SetFont(p.str(0)?),
            Opcode::BeginPath => Self::BeginPath,
            Opcode::MoveTo => Self::MoveTo {
                x: p.f64(0)?,
                y: p.f64(8)?,
            },
            Opcode::LineTo => Self::LineTo {
                x: p.f64(0)?,
                y: p.f64(8)?,
            },
            Opcode::Fill => Self::Fill,
            Opcode::Stroke => Self::Stroke,
            Opcode::SetStrokeStyleRgba => Self::SetStrokeStyleRgba(p.u32(0)?),
            Opcode::Arc => Self::Arc {
                x: p.f64(0)?,
                y: p.f64(8)?,
                radius: p.f64(16)?,
                start: p.f64(24)?,
                end: p.f64(32)?,
                ccw: p.bool(40)?,
            },
            Opcode::StrokeRect => Self::StrokeRect {
                x: p.f64(0)?,
                y: p.f64(8)?,
                w: p.f64(16)?,
                h: p.f64(24)?,
            },
            Opcode::FillText => Self::FillText {
                x: p.f64(0)?,
                y: p.f64(8)?,
                text: p.str(16)?,
                code_page: p.u32(20)?,
            },
            Opcode::ImageData => Self::ImageData {
                addr: p.u32(0)?,
                len: p.u32(4)?,
                width: p.u32(8)?,
                height: p.u32(12)?,
                id: p.i32(16)?,
            },
            Opcode::PutImageData => {
                let dirty = DirtyRect {
                    x: p.u32(12)?,
                    y: p.u32(16)?,
                    width: p.u32(20)?,
                    height: p.u32(24)?,
                };
                Self::PutImageData {
                    id: p.i32(0)?,
                    dx: p.u32(4)?,
                    dy: p.u32(8)?,
                    dirty: (dirty.width != 0 || dirty.height != 0).then_some(dirty),
                }
            }
            Opcode::BezierTo => Self::BezierTo {
                cp1x: p.f64(0)?,
                cp1y: p.f64(8)?,
                cp2x: p.f64(16)?,
                cp2y: p.f64(24)?,
                x: p.f64(32)?,
                y: p.f64(40)?,
            },
            Opcode::MeasureText => Self::MeasureText {
                text: p.str(0)?,
                out: p.u32(4)?,
                code_page: p.u32(8)?,
            },
            Opcode::Save => Self::Save,
            Opcode::Restore => Self::Restore,
            Opcode::CreateRadialGradient => Self::CreateRadialGradient {
                x0: p.f64(0)?,
                y0: p.f64(8)?,
                r0: p.f64(16)?,
                x1: p.f64(24)?,
                y1: p.f64(32)?,
                r1: p.f64(40)?,
                id: p.i32(48)?,
            },
            Opcode::SetColorStop => Self::SetColorStop {
                id: p.i32(0)?,
                position: p.i32(4)?,
                color: p.str(8)?,
            },
            Opcode::SetFillStyleGradient => Self::SetFillStyleGradient { id: p.i32(0)? },
            Opcode::ReleaseId => Self::ReleaseId { id: p.i32(0)? },
            Opcode::CreateLinearGradient => Self::CreateLinearGradient {
                x0: p.f64(0)?,
                y0: p.f64(8)?,
                x1: p.f64(16)?,
                y1: p.f64(24)?,
                id: p.i32(32)?,
            },
            Opcode::SetFillStyle => Self::SetFillStyle(p.str(0)?),
            Opcode::SetStrokeStyle => Self::SetStrokeStyle(p.str(0)?),
            Opcode::ClosePath => Self::ClosePath,
            Opcode::Reset => Self::Reset,
            Opcode::ClearRect => Self::ClearRect {
                x: p.f64(0)?,
                y: p.f64(8)?,
                w: p.f64(16)?,
                h: p.f64(24)?,
            },
            Opcode::Scale => Self::Scale {
                x: p.f64(0)?,
                y: p.f64(8)?,
            },
            Opcode::Translate => Self::Translate {
                x: p.f64(0)?,
                y: p.f64(8)?,
            },
            Opcode::Rotate => Self::Rotate { angle: p.f64(0)? },
            Opcode::GetTransform => Self::GetTransform { out: p.u32(0)? },
            Opcode::SetTransform => Self::SetTransform(p.matrix()?),
            Opcode::ResetTransform => Self::ResetTransform,
            Opcode::StrokeText => Self::StrokeText {
                x: p.f64(0)?,
                y: p.f64(8)?,
                text: p.str(16)?,
                code_page: p.u32(20)?,
            },
            Opcode::RoundRect => Self::RoundRect {
                x: p.f64(0)?,
                y: p.f64(8)?,
                w: p.f64(16)?,
                h: p.f64(24)?,
                radii: p.f64(32)?,
            },
            Opcode::Ellipse => Self::Ellipse {
                x: p.f64(0)?,
                y: p.f64(8)?,
                radius_x: p.f64(16)?,
                radius_y: p.f64(24)?,
                rotation: p.f64(32)?,
                start: p.f64(40)?,
                end: p.f64(48)?,
                ccw: p.bool(56)?,
            },
            Opcode::QuadraticCurveTo => Self::QuadraticCurveTo {
                cpx: p.f64(0)?,
                cpy: p.f64(8)?,
                x: p.f64(16)?,
                y: p.f64(24)?,
            },
            Opcode::SetLineDash => {
                let count = p.u32(0)?;
                let segments = p.u32(4)?;
                Self::SetLineDash(p.f64_array(segments, count)?)
            }
            Opcode::GetLineDash => Self::GetLineDash {
                buffer_len: p.u32(0)?,
                buffer: p.u32(4)?,
            },
            Opcode::ArcTo => Self::ArcTo {
                x1: p.f64(0)?,
                y1: p.f64(8)?,
                x2: p.f64(16)?,
                y2: p.f64(24)?,
                radius: p.f64(32)?,
            },
            Opcode::GetLineDashLength => Self::GetLineDashLength,
            Opcode::DrawImage => {
                let [sx, sy, sw, sh] = [p.f64(0)?, p.f64(8)?, p.f64(16)?, p.f64(24)?];
                let [dw, dh] = [p.f64(48)?, p.f64(56)?];
                Self::DrawImage {
                    id: p.i32(64)?,
                    placement: ImagePlacement {
                        source: (sw != 0.0 || sh != 0.0).then_some([sx, sy, sw, sh]),
                        dx: p.f64(32)?,
                        dy: p.f64(40)?,
                        dest_size: (dw != 0.0 || dh != 0.0).then_some([dw, dh]),
                    },
                }
            }
            Opcode::Rect => Self::Rect {
                x: p.f64(0)?,
                y: p.f64(8)?,
                w: p.f64(16)?,
                h: p.f64(24)?,
            },
            Opcode::Transform => Self::Transform(p.matrix()?),
            Opcode::SetLineCap => Self::SetLineCap(p.str(0)?),
            Opcode::SetLineJoin => Self::SetLineJoin(p.str(0)?),
            Opcode::SetLineDashOffset => Self::SetLineDashOffset(p.f64(0)?),
            Opcode::GetImageData => Self::GetImageData {
                x: p.f64(0)?,
                y: p.f64(8)?,
                w: p.f64(16)?,
                h: p.f64(24)?,
                id: p.i32(32)?,
            },
            Opcode::ImageDataToC => Self::ImageDataToC {
                buffer: p.u32(0)?,
                buffer_len: p.u32(4)?,
                id: p.i32(8)?,
            },
            Opcode::GetCanvasPropDouble => Self::GetCanvasPropDouble {
                out: p.u32(0)?,
                name: p.str(4)?,
            },
            Opcode::GetCanvasPropString => Self::GetCanvasPropString {
                out: p.u32(0)?,
                max_len: p.u32(4)?,
                name: p.str(8)?,
            },
            Opcode::SetCanvasPropDouble => Self::SetCanvasPropDouble {
                value: p.f64(0)?,
                name: p.str(8)?,
            },
            Opcode::SetCanvasPropString => Self::SetCanvasPropString {
                value: p.str(0)?,
                name: p.str(4)?,
            },
        })
    }

    pub fn opcode(&self) -> Opcode {
        match self {
            Self::FillRect { .. } => Opcode::FillRect,
            Self::FillCodepoint { .. } => Opcode::FillCodepoint,
            Self::SetLineWidth(_) => Opcode::SetLineWidth,
            Self::SetFillStyleRgba(_) => Opcode::SetFillStyleRgba,
            Self::SetFont(_) => Opcode::SetFont,
            Self::BeginPath => Opcode::BeginPath,
            Self::MoveTo { .. } => Opcode::MoveTo,
            Self::LineTo { .. } => Opcode::LineTo,
            Self::Fill => Opcode::Fill,
            Self::Stroke => Opcode::Stroke,
            Self::SetStrokeStyleRgba(_) => Opcode::SetStrokeStyleRgba,
            Self::Arc { .. } => Opcode::Arc,
            Self::StrokeRect { .. } => Opcode::StrokeRect,
            Self::FillText { .. } => Opcode::FillText,
            Self::ImageData { .. } => Opcode::ImageData,
            Self::PutImageData { .. } => Opcode::PutImageData,
            Self::BezierTo { .. } => Opcode::BezierTo,
            Self::MeasureText { .. } => Opcode::MeasureText,
            Self::Save => Opcode::Save,
            Self::Restore => Opcode::Restore,
            Self::CreateRadialGradient { .. } => Opcode::CreateRadialGradient,
            Self::SetColorStop { .. } => Opcode::SetColorStop,
            Self::SetFillStyleGradient { .. } => Opcode::SetFillStyleGradient,
            Self::ReleaseId { .. } => Opcode::ReleaseId,
            Self::CreateLinearGradient { .. } => Opcode::CreateLinearGradient,
            Self::SetFillStyle(_) => Opcode::SetFillStyle,
            Self::SetStrokeStyle(_) => Opcode::SetStrokeStyle,
            Self::ClosePath => Opcode::ClosePath,
            Self::Reset => Opcode::Reset,
            Self::ClearRect { .. } => Opcode::ClearRect,
            Self::Scale { .. } => Opcode::Scale,
            Self::Translate { .. } => Opcode::Translate,
            Self::Rotate { .. } => Opcode::Rotate,
            Self::GetTransform { .. } => Opcode::GetTransform,
            Self::SetTransform(_) => Opcode::SetTransform,
            Self::ResetTransform => Opcode::ResetTransform,
            Self::StrokeText { .. } => Opcode::StrokeText,
            Self::RoundRect { .. } => Opcode::RoundRect,
            Self::Ellipse { .. } => Opcode::Ellipse,
            Self::QuadraticCurveTo { .. } => Opcode::QuadraticCurveTo,
            Self::SetLineDash(_) => Opcode::SetLineDash,
            Self::GetLineDash { .. } => Opcode::GetLineDash,
            Self::ArcTo { .. } => Opcode::ArcTo,
            Self::GetLineDashLength => Opcode::GetLineDashLength,
            Self::DrawImage { .. } => Opcode::DrawImage,
            Self::Rect { .. } => Opcode::Rect,
            Self::Transform(_) => Opcode::Transform,
            Self::SetLineCap(_) => Opcode::SetLineCap,
            Self::SetLineJoin(_) => Opcode::SetLineJoin,
            Self::SetLineDashOffset(_) => Opcode::SetLineDashOffset,
            Self::GetImageData { .. } => Opcode::GetImageData,
            Self::ImageDataToC { .. } => Opcode::ImageDataToC,
            Self::GetCanvasPropDouble { .. } => Opcode::GetCanvasPropDouble,
            Self::GetCanvasPropString { .. } => Opcode::GetCanvasPropString,
            Self::SetCanvasPropDouble { .. } => Opcode::SetCanvasPropDouble,
            Self::SetCanvasPropString { .. } => Opcode::SetCanvasPropString,
        }
    }
}
