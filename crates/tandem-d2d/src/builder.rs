//! Producer side of the draw wire format.
//!
//! Native code normally builds sequences itself; this builder does the same
//! from Rust so hosts, tests and tools can produce byte-identical streams.

use crate::instruction::Instruction;
use crate::interpreter::{offset, DrawError};
use crate::surface::Matrix;
use crate::wire::{
    RECORD_ALIGN, RECORD_HEADER_LEN, RECORD_NEXT_OFFSET, RECORD_TYPE_OFFSET, SEQ_HEADER_LEN,
    SEQ_LAST_OFFSET, SEQ_START_OFFSET,
};
use tandem_mem::{Arena, Memory, MemoryError};
use tracing::trace;

/// Builds a linked draw sequence inside an [`Arena`] of linear memory.
///
/// Consecutive fill/stroke RGBA colors and line widths equal to the last
/// queued value are dropped. The cache of last values is forgotten whenever
/// another instruction could have changed the real style (`SETFILLSTYLE`,
/// gradients, `RESTORE`, `RESET`) and when the builder is cleared.
#[derive(Debug)]
pub struct DrawSeqBuilder {
    arena: Arena,
    header: u32,
    last: u32,
    count: usize,
    flush_at_count: usize,
    fill_rgba: Option<u32>,
    stroke_rgba: Option<u32>,
    line_width: Option<f64>,
}

impl DrawSeqBuilder {
    pub fn new(
        mem: &mut dyn Memory,
        arena: Arena,
        flush_at_count: usize,
    ) -> Result<Self, DrawError> {
        let mut builder = Self {
            arena,
            header: 0,
            last: 0,
            count: 0,
            flush_at_count: flush_at_count.max(1),
            fill_rgba: None,
            stroke_rgba: None,
            line_width: None,
        };
        builder.clear(mem)?;
        Ok(builder)
    }

    /// Address of the sequence header, suitable for the interpreter.
    pub fn header(&self) -> u32 {
        self.header
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Whether enough instructions are queued that the sequence should be
    /// executed and cleared.
    pub fn should_flush(&self) -> bool {
        self.count >= self.flush_at_count
    }

    /// Discard every queued record and start an empty sequence.
    pub fn clear(&mut self, mem: &mut dyn Memory) -> Result<(), DrawError> {
        self.arena.reset();
        self.header = self.alloc(SEQ_HEADER_LEN, RECORD_ALIGN)?;
        mem.write_u32(self.header + SEQ_START_OFFSET, 0)?;
        mem.write_u32(self.header + SEQ_LAST_OFFSET, 0)?;
        self.last = 0;
        self.count = 0;
        self.invalidate_styles();
        Ok(())
    }

    fn invalidate_styles(&mut self) {
        self.fill_rgba = None;
        self.stroke_rgba = None;
        self.line_width = None;
    }

    fn alloc(&mut self, size: u32, align: u32) -> Result<u32, DrawError> {
        self.arena
            .alloc(size, align)
            .ok_or(DrawError::ArenaExhausted {
                requested: size,
                remaining: self.arena.remaining(),
            })
    }

    /// Returns `true` if `ins` repeats the style already in effect.
    fn elide(&mut self, ins: &Instruction) -> bool {
        match *ins {
            Instruction::SetFillStyleRgba(c) => self.fill_rgba.replace(c) == Some(c),
            Instruction::SetStrokeStyleRgba(c) => self.stroke_rgba.replace(c) == Some(c),
            Instruction::SetLineWidth(w) => self.line_width.replace(w) == Some(w),
            Instruction::SetFillStyle(_) | Instruction::SetFillStyleGradient { .. } => {
                self.fill_rgba = None;
                false
            }
            Instruction::SetStrokeStyle(_) => {
                self.stroke_rgba = None;
                false
            }
            Instruction::Restore | Instruction::Reset => {
                self.invalidate_styles();
                false
            }
            _ => false,
        }
    }

    /// Append `ins`. Returns the record address, or `None` if the instruction
    /// was elided.
    pub fn push(
        &mut self,
        mem: &mut dyn Memory,
        ins: &Instruction,
    ) -> Result<Option<u32>, DrawError> {
        if self.elide(ins) {
            trace!(op = %ins.opcode(), "elided redundant draw instruction");
            return Ok(None);
        }

        let op = ins.opcode();
        let record = self.alloc(RECORD_HEADER_LEN + op.params_len(), RECORD_ALIGN)?;
        mem.write_u32(record + RECORD_NEXT_OFFSET, 0)?;
        mem.write_u32(record + RECORD_TYPE_OFFSET, op as u32)?;
        mem.write_u32(record + 8, 0)?;
        mem.write_u32(record + 12, 0)?;
        self.encode(mem, record + RECORD_HEADER_LEN, ins)?;

        if self.last == 0 {
            mem.write_u32(self.header + SEQ_START_OFFSET, record)?;
        } else {
            mem.write_u32(self.last + RECORD_NEXT_OFFSET, record)?;
        }
        mem.write_u32(self.header + SEQ_LAST_OFFSET, record)?;
        self.last = record;
        self.count += 1;
        Ok(Some(record))
    }

    fn string(&mut self, mem: &mut dyn Memory, s: &str) -> Result<u32, DrawError> {
        let addr = self.alloc(s.len() as u32 + 1, 1)?;
        mem.write_cstr(addr, s)?;
        Ok(addr)
    }

    fn encode(
        &mut self,
        mem: &mut dyn Memory,
        base: u32,
        ins: &Instruction,
    ) -> Result<(), DrawError> {
        match ins {
            Instruction::BeginPath
            | Instruction::Fill
            | Instruction::Stroke
            | Instruction::Save
            | Instruction::Restore
            | Instruction::ClosePath
            | Instruction::Reset
            | Instruction::ResetTransform
            | Instruction::GetLineDashLength => {}

            Instruction::FillRect { x, y, w, h }
            | Instruction::StrokeRect { x, y, w, h }
            | Instruction::ClearRect { x, y, w, h }
            | Instruction::Rect { x, y, w, h } => f64s(mem, base, &[*x, *y, *w, *h])?,
            Instruction::FillCodepoint { x, y, codepoint } => {
                f64s(mem, base, &[*x, *y])?;
                mem.write_u32(base + 16, *codepoint)?;
            }
            Instruction::SetLineWidth(v)
            | Instruction::SetLineDashOffset(v)
            | Instruction::Rotate { angle: v } => mem.write_f64(base, *v)?,
            Instruction::SetFillStyleRgba(c) | Instruction::SetStrokeStyleRgba(c) => {
                mem.write_u32(base, *c)?
            }
            Instruction::SetFont(s)
            | Instruction::SetFillStyle(s)
            | Instruction::SetStrokeStyle(s)
            | Instruction::SetLineCap(s)
            | Instruction::SetLineJoin(s) => {
                let ptr = self.string(mem, s)?;
                mem.write_u32(base, ptr)?;
            }
            Instruction::MoveTo { x, y }
            | Instruction::LineTo { x, y }
            | Instruction::Scale { x, y }
            | Instruction::Translate { x, y } => f64s(mem, base, &[*x, *y])?,
            Instruction::Arc {
                x,
                y,
                radius,
                start,
                end,
                ccw,
            } => {
                f64s(mem, base, &[*x, *y, *radius, *start, *end])?;
                mem.write_u32(base + 40, u32::from(*ccw))?;
            }
            Instruction::FillText {
                x,
                y,
                text,
                code_page,
            }
            | Instruction::StrokeText {
                x,
                y,
                text,
                code_page,
            } => {
                f64s(mem, base, &[*x, *y])?;
                let ptr = self.string(mem, text)?;
                mem.write_u32(base + 16, ptr)?;
                mem.write_u32(base + 20, *code_page)?;
            }
            Instruction::ImageData {
                addr,
                len,
                width,
                height,
                id,
            } => {
                u32s(mem, base, &[*addr, *len, *width, *height])?;
                mem.write_i32(base + 16, *id)?;
            }
            Instruction::PutImageData { id, dx, dy, dirty } => {
                mem.write_i32(base, *id)?;
                let d = dirty.map_or([0; 4], |d| [d.x, d.y, d.width, d.height]);
                u32s(mem, base + 4, &[*dx, *dy, d[0], d[1], d[2], d[3]])?;
            }
            Instruction::BezierTo {
                cp1x,
                cp1y,
                cp2x,
                cp2y,
                x,
                y,
            } => f64s(mem, base, &[*cp1x, *cp1y, *cp2x, *cp2y, *x, *y])?,
            Instruction::MeasureText {
                text,
                out,
                code_page,
            } => {
                let ptr = self.string(mem, text)?;
                u32s(mem, base, &[ptr, *out, *code_page])?;
            }
            Instruction::CreateRadialGradient {
                x0,
                y0,
                r0,
                x1,
                y1,
                r1,
                id,
            } => {
                f64s(mem, base, &[*x0, *y0, *r0, *x1, *y1, *r1])?;
                mem.write_i32(base + 48, *id)?;
            }
            Instruction::CreateLinearGradient { x0, y0, x1, y1, id } => {
                f64s(mem, base, &[*x0, *y0, *x1, *y1])?;
                mem.write_i32(base + 32, *id)?;
            }
            Instruction::SetColorStop {
                id,
                position,
                color,
            } => {
                let ptr = self.string(mem, color)?;
                mem.write_i32(base, *id)?;
                mem.write_i32(base + 4, *position)?;
                mem.write_u32(base + 8, ptr)?;
            }
            Instruction::SetFillStyleGradient { id } | Instruction::ReleaseId { id } => {
                mem.write_i32(base, *id)?
            }
            Instruction::GetTransform { out } => mem.write_u32(base, *out)?,
            Instruction::SetTransform(m) | Instruction::Transform(m) => matrix(mem, base, m)?,
            Instruction::RoundRect { x, y, w, h, radii } => {
                f64s(mem, base, &[*x, *y, *w, *h, *radii])?
            }
            Instruction::Ellipse {
                x,
                y,
                radius_x,
                radius_y,
                rotation,
                start,
                end,
                ccw,
            } => {
                f64s(
                    mem,
                    base,
                    &[*x, *y, *radius_x, *radius_y, *rotation, *start, *end],
                )?;
                mem.write_u32(base + 56, u32::from(*ccw))?;
            }
            Instruction::QuadraticCurveTo { cpx, cpy, x, y } => {
                f64s(mem, base, &[*cpx, *cpy, *x, *y])?
            }
            Instruction::SetLineDash(segments) => {
                let ptr = self.alloc(segments.len() as u32 * 8, 8)?;
                f64s(mem, ptr, segments)?;
                u32s(mem, base, &[segments.len() as u32, ptr])?;
            }
            Instruction::GetLineDash { buffer_len, buffer } => {
                u32s(mem, base, &[*buffer_len, *buffer, 0])?
            }
            Instruction::ArcTo {
                x1,
                y1,
                x2,
                y2,
                radius,
            } => f64s(mem, base, &[*x1, *y1, *x2, *y2, *radius])?,
            Instruction::DrawImage { id, placement } => {
                let [sx, sy, sw, sh] = placement.source.unwrap_or([0.0; 4]);
                let [dw, dh] = placement.dest_size.unwrap_or([0.0; 2]);
                f64s(
                    mem,
                    base,
                    &[sx, sy, sw, sh, placement.dx, placement.dy, dw, dh],
                )?;
                mem.write_i32(base + 64, *id)?;
            }
            Instruction::GetImageData { x, y, w, h, id } => {
                f64s(mem, base, &[*x, *y, *w, *h])?;
                mem.write_i32(base + 32, *id)?;
            }
            Instruction::ImageDataToC {
                buffer,
                buffer_len,
                id,
            } => {
                u32s(mem, base, &[*buffer, *buffer_len])?;
                mem.write_i32(base + 8, *id)?;
            }
            Instruction::GetCanvasPropDouble { out, name } => {
                let ptr = self.string(mem, name)?;
                u32s(mem, base, &[*out, ptr])?;
            }
            Instruction::GetCanvasPropString { out, max_len, name } => {
                let ptr = self.string(mem, name)?;
                u32s(mem, base, &[*out, *max_len, ptr])?;
            }
            Instruction::SetCanvasPropDouble { value, name } => {
                let ptr = self.string(mem, name)?;
                mem.write_f64(base, *value)?;
                mem.write_u32(base + 8, ptr)?;
            }
            Instruction::SetCanvasPropString { value, name } => {
                let value = self.string(mem, value)?;
                let name = self.string(mem, name)?;
                u32s(mem, base, &[value, name])?;
            }
        }
        Ok(())
    }
}

/// Address of the parameter block of `record`.
pub fn params_addr(record: u32) -> Result<u32, MemoryError> {
    offset(record, RECORD_HEADER_LEN)
}

fn f64s(mem: &mut dyn Memory, base: u32, values: &[f64]) -> Result<(), MemoryError> {
    for (i, v) in values.iter().enumerate() {
        mem.write_f64(base + i as u32 * 8, *v)?;
    }
    Ok(())
}

fn u32s(mem: &mut dyn Memory, base: u32, values: &[u32]) -> Result<(), MemoryError> {
    for (i, v) in values.iter().enumerate() {
        mem.write_u32(base + i as u32 * 4, *v)?;
    }
    Ok(())
}

fn matrix(mem: &mut dyn Memory, base: u32, m: &Matrix) -> Result<(), MemoryError> {
    f64s(mem, base, &m.to_array())
}
