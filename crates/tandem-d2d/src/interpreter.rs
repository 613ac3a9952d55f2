//! Replays a draw sequence from linear memory onto a [`Surface2d`].

use crate::instruction::{Instruction, GET_LINE_DASH_COUNT_OFFSET, GET_LINE_DASH_LENGTH_OFFSET};
use crate::resources::{ImageBuffer, Resource, ResourceKind, ResourceTable};
use crate::surface::{Paint, Surface2d};
use crate::wire::{
    rgba_to_css, Opcode, RECORD_HEADER_LEN, RECORD_NEXT_OFFSET, RECORD_TYPE_OFFSET,
    SEQ_LAST_OFFSET, SEQ_START_OFFSET,
};
use serde::Deserialize;
use std::borrow::Cow;
use tandem_mem::{Memory, MemoryError};
use thiserror::Error;
use tracing::{debug, trace, warn};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DrawError {
    #[error(transparent)]
    Memory(#[from] MemoryError),
    #[error("unknown draw instruction tag {tag} in record at 0x{record:x}")]
    UnknownOpcode { tag: u32, record: u32 },
    #[error("record at 0x{record:x} ends the sequence but the header names 0x{last:x} as last")]
    LastMismatch { record: u32, last: u32 },
    #[error("last record at 0x{last:x} links to 0x{next:x}")]
    LastNotTerminal { last: u32, next: u32 },
    #[error("draw sequence at 0x{seq:x} did not terminate within {limit} records")]
    CycleDetected { seq: u32, limit: usize },
    #[error("{op}: unknown precomputed object id {id}")]
    UnknownHandle { op: Opcode, id: i32 },
    #[error("{op}: precomputed object id {id} is {found}, expected {expected}")]
    WrongResourceKind {
        op: Opcode,
        id: i32,
        expected: ResourceKind,
        found: ResourceKind,
    },
    #[error("image data {id}: {len} bytes cannot hold {width}x{height} RGBA pixels")]
    ImageDataTooShort {
        id: i32,
        len: usize,
        width: u32,
        height: u32,
    },
    #[error("image data {id} is {needed} bytes but the destination holds {available}")]
    BufferTooSmall {
        id: i32,
        needed: usize,
        available: u32,
    },
    #[error("canvas property {name:?} is not a {expected}")]
    CanvasProp { name: String, expected: &'static str },
    #[error("draw sequence arena exhausted: {requested} bytes requested, {remaining} left")]
    ArenaExhausted { requested: u32, remaining: u32 },
}

/// How pixel buffers registered with `IMAGEDATA` are read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageDataMode {
    /// Borrow the bytes in place. Requires memory that supports
    /// [`Memory::borrow_bytes`].
    ZeroCopy,
    /// Copy the bytes out of memory every time they are used.
    #[default]
    Copy,
}

/// Executes draw sequences for one canvas.
///
/// The resource table outlives individual sequences: gradients and pixel
/// buffers registered by one `run` may be used by later ones until released.
pub struct DrawInterpreter<S: Surface2d> {
    mode: ImageDataMode,
    resources: ResourceTable<S::Gradient, S::Image>,
}

impl<S: Surface2d> DrawInterpreter<S> {
    pub fn new(mode: ImageDataMode) -> Self {
        Self {
            mode,
            resources: ResourceTable::new(),
        }
    }

    pub fn mode(&self) -> ImageDataMode {
        self.mode
    }

    pub fn resources(&self) -> &ResourceTable<S::Gradient, S::Image> {
        &self.resources
    }

    pub fn resources_mut(&mut self) -> &mut ResourceTable<S::Gradient, S::Image> {
        &mut self.resources
    }

    /// Run the sequence whose header is at `seq`. Returns the number of
    /// instructions executed.
    ///
    /// Structural problems are detected before the offending record executes,
    /// but records ahead of it have already been applied to the surface.
    pub fn run(
        &mut self,
        mem: &mut dyn Memory,
        surface: &mut S,
        seq: u32,
    ) -> Result<usize, DrawError> {
        let start = mem.read_u32(offset(seq, SEQ_START_OFFSET)?)?;
        let last = mem.read_u32(offset(seq, SEQ_LAST_OFFSET)?)?;
        if start == 0 && last == 0 {
            return Ok(0);
        }
        if start == 0 || last == 0 {
            return Err(DrawError::LastMismatch {
                record: start,
                last,
            });
        }

        // A well-formed list cannot hold more headers than fit in memory.
        let limit = mem.size() / RECORD_HEADER_LEN as usize;
        let mut record = start;
        let mut executed = 0;
        loop {
            if executed >= limit {
                return Err(DrawError::CycleDetected { seq, limit });
            }
            let next = mem.read_u32(offset(record, RECORD_NEXT_OFFSET)?)?;
            if record == last && next != 0 {
                return Err(DrawError::LastNotTerminal { last, next });
            }
            if next == 0 && record != last {
                return Err(DrawError::LastMismatch { record, last });
            }

            let tag = mem.read_u32(offset(record, RECORD_TYPE_OFFSET)?)?;
            let op = Opcode::from_u32(tag).ok_or(DrawError::UnknownOpcode { tag, record })?;
            let params = offset(record, RECORD_HEADER_LEN)?;
            let ins = Instruction::decode(&*mem, op, params)?;
            trace!(record, %op, "draw instruction");
            self.execute(mem, surface, params, ins)?;
            executed += 1;

            if next == 0 {
                break;
            }
            record = next;
        }
        debug!(seq, executed, "draw sequence complete");
        Ok(executed)
    }

    fn image_buffer(&self, op: Opcode, id: i32) -> Result<&ImageBuffer, DrawError> {
        match self.resources.get(id) {
            Some(Resource::ImageData(buf)) => Ok(buf),
            Some(other) => Err(DrawError::WrongResourceKind {
                op,
                id,
                expected: ResourceKind::ImageData,
                found: other.kind(),
            }),
            None => Err(DrawError::UnknownHandle { op, id }),
        }
    }

    fn gradient_mut(&mut self, op: Opcode, id: i32) -> Result<&mut S::Gradient, DrawError> {
        match self.resources.get_mut(id) {
            Some(Resource::Gradient(g)) => Ok(g),
            Some(other) => Err(DrawError::WrongResourceKind {
                op,
                id,
                expected: ResourceKind::Gradient,
                found: other.kind(),
            }),
            None => Err(DrawError::UnknownHandle { op, id }),
        }
    }

    fn image(&self, op: Opcode, id: i32) -> Result<&S::Image, DrawError> {
        match self.resources.get(id) {
            Some(Resource::Image(img)) => Ok(img),
            Some(other) => Err(DrawError::WrongResourceKind {
                op,
                id,
                expected: ResourceKind::Image,
                found: other.kind(),
            }),
            None => Err(DrawError::UnknownHandle { op, id }),
        }
    }

    fn execute(
        &mut self,
        mem: &mut dyn Memory,
        surface: &mut S,
        params: u32,
        ins: Instruction,
    ) -> Result<(), DrawError> {
        let op = ins.opcode();
        match ins {
            Instruction::FillRect { x, y, w, h } => surface.fill_rect(x, y, w, h),
            Instruction::FillCodepoint { x, y, codepoint } => {
                let c = char::from_u32(codepoint).unwrap_or(char::REPLACEMENT_CHARACTER);
                surface.fill_text(c.encode_utf8(&mut [0; 4]), x, y);
            }
            Instruction::SetLineWidth(width) => surface.set_line_width(width),
            Instruction::SetFillStyleRgba(rgba) => {
                surface.set_fill_style(Paint::Css(&rgba_to_css(rgba)))
            }
            Instruction::SetFont(font) => surface.set_font(&font),
            Instruction::BeginPath => surface.begin_path(),
            Instruction::MoveTo { x, y } => surface.move_to(x, y),
            Instruction::LineTo { x, y } => surface.line_to(x, y),
            Instruction::Fill => surface.fill(),
            Instruction::Stroke => surface.stroke(),
            Instruction::SetStrokeStyleRgba(rgba) => {
                surface.set_stroke_style(Paint::Css(&rgba_to_css(rgba)))
            }
            Instruction::Arc {
                x,
                y,
                radius,
                start,
                end,
                ccw,
            } => surface.arc(x, y, radius, start, end, ccw),
            Instruction::StrokeRect { x, y, w, h } => surface.stroke_rect(x, y, w, h),
            // Code pages travel with the text; decoding is always UTF-8.
            Instruction::FillText { x, y, text, .. } => surface.fill_text(&text, x, y),
            Instruction::StrokeText { x, y, text, .. } => surface.stroke_text(&text, x, y),
            Instruction::ImageData {
                addr,
                len,
                width,
                height,
                id,
            } => self.resources.insert(
                id,
                Resource::ImageData(ImageBuffer::View {
                    addr,
                    len,
                    width,
                    height,
                }),
            ),
            Instruction::PutImageData { id, dx, dy, dirty } => {
                let buf = self.image_buffer(op, id)?;
                let (width, height) = (buf.width(), buf.height());
                let pixels = pixels(self.mode, &*mem, buf)?;
                let needed = width as usize * height as usize * 4;
                if pixels.len() < needed {
                    return Err(DrawError::ImageDataTooShort {
                        id,
                        len: pixels.len(),
                        width,
                        height,
                    });
                }
                surface.put_image_data(&pixels[..needed], width, height, dx, dy, dirty);
            }
            Instruction::BezierTo {
                cp1x,
                cp1y,
                cp2x,
                cp2y,
                x,
                y,
            } => surface.bezier_curve_to(cp1x, cp1y, cp2x, cp2y, x, y),
            Instruction::MeasureText { text, out, .. } => {
                let metrics = surface.measure_text(&text);
                write_f64s(mem, out, &metrics.to_array())?;
            }
            Instruction::Save => surface.save(),
            Instruction::Restore => surface.restore(),
            Instruction::CreateRadialGradient {
                x0,
                y0,
                r0,
                x1,
                y1,
                r1,
                id,
            } => {
                let g = surface.create_radial_gradient(x0, y0, r0, x1, y1, r1);
                self.resources.insert(id, Resource::Gradient(g));
            }
            Instruction::CreateLinearGradient { x0, y0, x1, y1, id } => {
                let g = surface.create_linear_gradient(x0, y0, x1, y1);
                self.resources.insert(id, Resource::Gradient(g));
            }
            Instruction::SetColorStop {
                id,
                position,
                color,
            } => {
                let g = self.gradient_mut(op, id)?;
                surface.add_color_stop(g, f64::from(position), &color);
            }
            Instruction::SetFillStyleGradient { id } => {
                let g = self.gradient_mut(op, id)?;
                surface.set_fill_style(Paint::Gradient(g));
            }
            Instruction::ReleaseId { id } => {
                self.resources.release(id);
            }
            Instruction::SetFillStyle(css) => surface.set_fill_style(Paint::Css(&css)),
            Instruction::SetStrokeStyle(css) => surface.set_stroke_style(Paint::Css(&css)),
            Instruction::ClosePath => surface.close_path(),
            Instruction::Reset => surface.reset(),
            Instruction::ClearRect { x, y, w, h } => surface.clear_rect(x, y, w, h),
            Instruction::Scale { x, y } => surface.scale(x, y),
            Instruction::Translate { x, y } => surface.translate(x, y),
            Instruction::Rotate { angle } => surface.rotate(angle),
            Instruction::GetTransform { out } => {
                let m = surface.get_transform();
                write_f64s(mem, out, &m.to_array())?;
            }
            Instruction::SetTransform(m) => surface.set_transform(m),
            Instruction::Transform(m) => surface.transform(m),
            Instruction::ResetTransform => surface.reset_transform(),
            Instruction::RoundRect { x, y, w, h, radii } => surface.round_rect(x, y, w, h, radii),
            Instruction::Ellipse {
                x,
                y,
                radius_x,
                radius_y,
                rotation,
                start,
                end,
                ccw,
            } => surface.ellipse(x, y, radius_x, radius_y, rotation, start, end, ccw),
            Instruction::QuadraticCurveTo { cpx, cpy, x, y } => {
                surface.quadratic_curve_to(cpx, cpy, x, y)
            }
            Instruction::SetLineDash(segments) => surface.set_line_dash(&segments),
            Instruction::GetLineDash { buffer_len, buffer } => {
                let segments = surface.line_dash();
                let count_addr = offset(params, GET_LINE_DASH_COUNT_OFFSET)?;
                mem.write_u32(count_addr, segments.len() as u32)?;
                let n = segments.len().min(buffer_len as usize);
                write_f64s(mem, buffer, &segments[..n])?;
                if segments.len() > n {
                    warn!(
                        segments = segments.len(),
                        buffer_len, "GETLINEDASH buffer too small, truncating"
                    );
                }
            }
            Instruction::GetLineDashLength => {
                let n = surface.line_dash().len() as u32;
                mem.write_u32(offset(params, GET_LINE_DASH_LENGTH_OFFSET)?, n)?;
            }
            Instruction::ArcTo {
                x1,
                y1,
                x2,
                y2,
                radius,
            } => surface.arc_to(x1, y1, x2, y2, radius),
            Instruction::DrawImage { id, placement } => {
                let img = self.image(op, id)?;
                surface.draw_image(img, placement);
            }
            Instruction::Rect { x, y, w, h } => surface.rect(x, y, w, h),
            Instruction::SetLineCap(cap) => surface.set_line_cap(&cap),
            Instruction::SetLineJoin(join) => surface.set_line_join(&join),
            Instruction::SetLineDashOffset(offset) => surface.set_line_dash_offset(offset),
            Instruction::GetImageData { x, y, w, h, id } => {
                let data = surface.get_image_data(x, y, w, h);
                self.resources.insert(
                    id,
                    Resource::ImageData(ImageBuffer::Owned {
                        width: data.width,
                        height: data.height,
                        data: data.data,
                    }),
                );
            }
            Instruction::ImageDataToC {
                buffer,
                buffer_len,
                id,
            } => {
                let buf = self.image_buffer(op, id)?;
                let bytes = pixels(self.mode, &*mem, buf)?.into_owned();
                if bytes.len() > buffer_len as usize {
                    return Err(DrawError::BufferTooSmall {
                        id,
                        needed: bytes.len(),
                        available: buffer_len,
                    });
                }
                mem.write_bytes(buffer, &bytes)?;
            }
            Instruction::GetCanvasPropDouble { out, name } => {
                let value = surface
                    .canvas_prop_f64(&name)
                    .ok_or(DrawError::CanvasProp {
                        name,
                        expected: "number",
                    })?;
                mem.write_f64(out, value)?;
            }
            Instruction::GetCanvasPropString { out, max_len, name } => {
                let value = surface
                    .canvas_prop_string(&name)
                    .ok_or_else(|| DrawError::CanvasProp {
                        name: name.clone(),
                        expected: "string",
                    })?;
                write_truncated_cstr(mem, out, max_len, &value, &name)?;
            }
            Instruction::SetCanvasPropDouble { value, name } => {
                surface.set_canvas_prop_f64(&name, value)
            }
            Instruction::SetCanvasPropString { value, name } => {
                surface.set_canvas_prop_string(&name, &value)
            }
        }
        Ok(())
    }
}

pub(crate) fn offset(addr: u32, by: u32) -> Result<u32, MemoryError> {
    addr.checked_add(by).ok_or(MemoryError::OutOfBounds {
        addr,
        len: by as usize,
    })
}

/// Pixel bytes of `buf` according to `mode`.
fn pixels<'a>(
    mode: ImageDataMode,
    mem: &'a dyn Memory,
    buf: &'a ImageBuffer,
) -> Result<Cow<'a, [u8]>, MemoryError> {
    match buf {
        ImageBuffer::Owned { data, .. } => Ok(Cow::Borrowed(data)),
        ImageBuffer::View { addr, len, .. } => match mode {
            ImageDataMode::ZeroCopy => mem.borrow_bytes(*addr, *len as usize).map(Cow::Borrowed),
            ImageDataMode::Copy => {
                let mut bytes = vec![0u8; *len as usize];
                mem.read_bytes(*addr, &mut bytes)?;
                Ok(Cow::Owned(bytes))
            }
        },
    }
}

fn write_f64s(mem: &mut dyn Memory, addr: u32, values: &[f64]) -> Result<(), MemoryError> {
    for (i, v) in values.iter().enumerate() {
        mem.write_f64(offset(addr, i as u32 * 8)?, *v)?;
    }
    Ok(())
}

/// Write `value` as a C string into a `max_len` byte buffer, truncating so the
/// terminator always fits.
fn write_truncated_cstr(
    mem: &mut dyn Memory,
    addr: u32,
    max_len: u32,
    value: &str,
    name: &str,
) -> Result<(), MemoryError> {
    if max_len == 0 {
        warn!(name, "canvas property string buffer has no room");
        return Ok(());
    }
    let room = max_len as usize - 1;
    let bytes = value.as_bytes();
    let bytes = if bytes.len() > room {
        warn!(name, len = bytes.len(), max_len, "canvas property string truncated");
        &bytes[..room]
    } else {
        bytes
    };
    let mut out = Vec::with_capacity(bytes.len() + 1);
    out.extend_from_slice(bytes);
    out.push(0);
    mem.write_bytes(addr, &out)
}
