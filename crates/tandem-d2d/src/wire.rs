//! Draw-sequence wire format.
//!
//! A draw sequence lives entirely in linear memory:
//!
//! ```text
//! header:  +0 start: u32   address of the first record (0 if empty)
//!          +4 last:  u32   address of the last record (0 if empty)
//!
//! record:  +0  next:  u32  address of the next record, 0 for the last one
//!          +4  type:  u32  one of [`Opcode`]
//!          +8  owner: u32  producer heap bookkeeping, ignored
//!          +12 owner: u32  producer heap bookkeeping, ignored
//!          +16 parameters, laid out per opcode
//! ```
//!
//! All fields are little-endian. `f64` parameters are 8-byte aligned, which is
//! why records themselves are 8-byte aligned.

use std::fmt;

pub const SEQ_START_OFFSET: u32 = 0;
pub const SEQ_LAST_OFFSET: u32 = 4;
/// Bytes a producer must reserve for a sequence header.
pub const SEQ_HEADER_LEN: u32 = 8;

pub const RECORD_NEXT_OFFSET: u32 = 0;
pub const RECORD_TYPE_OFFSET: u32 = 4;
pub const RECORD_HEADER_LEN: u32 = 16;
pub const RECORD_ALIGN: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Opcode {
    FillRect = 1,
    FillCodepoint = 5,
    SetLineWidth = 10,
    SetFillStyleRgba = 11,
    SetFont = 12,
    BeginPath = 13,
    MoveTo = 14,
    LineTo = 15,
    Fill = 16,
    Stroke = 17,
    SetStrokeStyleRgba = 18,
    Arc = 19,
    StrokeRect = 20,
    FillText = 21,
    ImageData = 22,
    PutImageData = 23,
    BezierTo = 24,
    MeasureText = 25,
    Save = 26,
    Restore = 27,
    CreateRadialGradient = 28,
    SetColorStop = 29,
    SetFillStyleGradient = 30,
    ReleaseId = 31,
    CreateLinearGradient = 32,
    SetFillStyle = 33,
    SetStrokeStyle = 34,
    ClosePath = 35,
    Reset = 36,
    ClearRect = 37,
    Scale = 38,
    Translate = 39,
    Rotate = 40,
    GetTransform = 41,
    SetTransform = 42,
    ResetTransform = 43,
    StrokeText = 44,
    RoundRect = 45,
    Ellipse = 46,
    QuadraticCurveTo = 47,
    SetLineDash = 48,
    GetLineDash = 49,
    ArcTo = 50,
    GetLineDashLength = 51,
    DrawImage = 52,
    Rect = 53,
    Transform = 54,
    SetLineCap = 55,
    SetLineJoin = 56,
    SetLineDashOffset = 57,
    GetImageData = 58,
    ImageDataToC = 59,
    GetCanvasPropDouble = 60,
    GetCanvasPropString = 61,
    SetCanvasPropDouble = 62,
    SetCanvasPropString = 63,
}

impl Opcode {
    pub fn from_u32(value: u32) -> Option<Self> {
        Some(match value {
            1 => Self::FillRect,
            5 => Self::FillCodepoint,
            10 => Self::SetLineWidth,
            11 => Self::SetFillStyleRgba,
            12 => Self::SetFont,
            13 => Self::BeginPath,
            14 => Self::MoveTo,
            15 => Self::LineTo,
            16 => Self::Fill,
            17 => Self::Stroke,
            18 => Self::SetStrokeStyleRgba,
            19 => Self::Arc,
            20 => Self::StrokeRect,
            21 => Self::FillText,
            22 => Self::ImageData,
            23 => Self::PutImageData,
            24 => Self::BezierTo,
            25 => Self::MeasureText,
            26 => Self::Save,
            27 => Self::Restore,
            28 => Self::CreateRadialGradient,
            29 => Self::SetColorStop,
            30 => Self::SetFillStyleGradient,
            31 => Self::ReleaseId,
            32 => Self::CreateLinearGradient,
            33 => Self::SetFillStyle,
            34 => Self::SetStrokeStyle,
            35 => Self::ClosePath,
            36 => Self::Reset,
            37 => Self::ClearRect,
            38 => Self::Scale,
            39 => Self::Translate,
            40 => Self::Rotate,
            41 => Self::GetTransform,
            42 => Self::SetTransform,
            43 => Self::ResetTransform,
            44 => Self::StrokeText,
            45 => Self::RoundRect,
            46 => Self::Ellipse,
            47 => Self::QuadraticCurveTo,
            48 => Self::SetLineDash,
            49 => Self::GetLineDash,
            50 => Self::ArcTo,
            51 => Self::GetLineDashLength,
            52 => Self::DrawImage,
            53 => Self::Rect,
            54 => Self::Transform,
            55 => Self::SetLineCap,
            56 => Self::SetLineJoin,
            57 => Self::SetLineDashOffset,
            58 => Self::GetImageData,
            59 => Self::ImageDataToC,
            60 => Self::GetCanvasPropDouble,
            61 => Self::GetCanvasPropString,
            62 => Self::SetCanvasPropDouble,
            63 => Self::SetCanvasPropString,
            _ => return None,
        })
    }

    /// Size of the parameter block that follows the record header.
    pub fn params_len(self) -> u32 {
        match self {
            Self::BeginPath
            | Self::Fill
            | Self::Stroke
            | Self::Save
            | Self::Restore
            | Self::ClosePath
            | Self::Reset
            | Self::ResetTransform => 0,

            Self::SetFillStyleRgba
            | Self::SetFont
            | Self::SetStrokeStyleRgba
            | Self::SetFillStyleGradient
            | Self::ReleaseId
            | Self::SetFillStyle
            | Self::SetStrokeStyle
            | Self::GetTransform
            | Self::GetLineDashLength
            | Self::SetLineCap
            | Self::SetLineJoin => 4,

            Self::SetLineWidth
            | Self::Rotate
            | Self::SetLineDashOffset
            | Self::SetLineDash
            | Self::GetCanvasPropDouble
            | Self::SetCanvasPropString => 8,

            Self::MeasureText
            | Self::GetLineDash
            | Self::GetCanvasPropString
            | Self::SetColorStop
            | Self::ImageDataToC
            | Self::SetCanvasPropDouble => 12,
            Self::MoveTo | Self::LineTo | Self::Scale | Self::Translate => 16,
            Self::ImageData | Self::FillCodepoint => 20,
            Self::FillText | Self::StrokeText => 24,
            Self::PutImageData => 28,
            Self::FillRect
            | Self::StrokeRect
            | Self::ClearRect
            | Self::Rect
            | Self::QuadraticCurveTo => 32,
            Self::CreateLinearGradient | Self::GetImageData => 36,
            Self::RoundRect | Self::ArcTo => 40,
            Self::Arc => 44,
            Self::BezierTo | Self::SetTransform | Self::Transform => 48,
            Self::CreateRadialGradient => 52,
            Self::Ellipse => 60,
            Self::DrawImage => 68,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::FillRect => "FILLRECT",
            Self::FillCodepoint => "FILLCODEPOINT",
            Self::SetLineWidth => "SETLINEWIDTH",
            Self::SetFillStyleRgba => "SETFILLSTYLERGBA",
            Self::SetFont => "SETFONT",
            Self::BeginPath => "BEGINPATH",
            Self::MoveTo => "MOVETO",
            Self::LineTo => "LINETO",
            Self::Fill => "FILL",
            Self::Stroke => "STROKE",
            Self::SetStrokeStyleRgba => "SETSTROKESTYLERGBA",
            Self::Arc => "ARC",
            Self::StrokeRect => "STROKERECT",
            Self::FillText => "FILLTEXT",
            Self::ImageData => "IMAGEDATA",
            Self::PutImageData => "PUTIMAGEDATA",
            Self::BezierTo => "BEZIERTO",
            Self::MeasureText => "MEASURETEXT",
            Self::Save => "SAVE",
            Self::Restore => "RESTORE",
            Self::CreateRadialGradient => "CREATERADIALGRADIENT",
            Self::SetColorStop => "SETCOLORSTOP",
            Self::SetFillStyleGradient => "SETFILLSTYLEGRADIENT",
            Self::ReleaseId => "RELEASEID",
            Self::CreateLinearGradient => "CREATELINEARGRADIENT",
            Self::SetFillStyle => "SETFILLSTYLE",
            Self::SetStrokeStyle => "SETSTROKESTYLE",
            Self::ClosePath => "CLOSEPATH",
            Self::Reset => "RESET",
            Self::ClearRect => "CLEARRECT",
            Self::Scale => "SCALE",
            Self::Translate => "TRANSLATE",
            Self::Rotate => "ROTATE",
            Self::GetTransform => "GETTRANSFORM",
            Self::SetTransform => "SETTRANSFORM",
            Self::ResetTransform => "RESETTRANSFORM",
            Self::StrokeText => "STROKETEXT",
            Self::RoundRect => "ROUNDRECT",
            Self::Ellipse => "ELLIPSE",
            Self::QuadraticCurveTo => "QUADRATICCURVETO",
            Self::SetLineDash => "SETLINEDASH",
            Self::GetLineDash => "GETLINEDASH",
            Self::ArcTo => "ARCTO",
            Self::GetLineDashLength => "GETLINEDASHLENGTH",
            Self::DrawImage => "DRAWIMAGE",
            Self::Rect => "RECT",
            Self::Transform => "TRANSFORM",
            Self::SetLineCap => "SETLINECAP",
            Self::SetLineJoin => "SETLINEJOIN",
            Self::SetLineDashOffset => "SETLINEDASHOFFSET",
            Self::GetImageData => "GETIMAGEDATA",
            Self::ImageDataToC => "IMAGEDATATOC",
            Self::GetCanvasPropDouble => "GETCANVASPROPDOUBLE",
            Self::GetCanvasPropString => "GETCANVASPROPSTRING",
            Self::SetCanvasPropDouble => "SETCANVASPROPDOUBLE",
            Self::SetCanvasPropString => "SETCANVASPROPSTRING",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), *self as u32)
    }
}

/// Format a packed `0xRRGGBBAA` word as a CSS color string.
pub fn rgba_to_css(rgba: u32) -> String {
    format!("#{rgba:08x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_tag_round_trips_through_from_u32() {
        let mut known = 0;
        for tag in 0..=64u32 {
            if let Some(op) = Opcode::from_u32(tag) {
                assert_eq!(op as u32, tag);
                known += 1;
            }
        }
        assert_eq!(known, 56);
        assert_eq!(Opcode::from_u32(2), None);
        assert_eq!(Opcode::from_u32(64), None);
    }

    #[test]
    fn css_colors_are_eight_lowercase_hex_digits() {
        assert_eq!(rgba_to_css(0x1122_3344), "#11223344");
        assert_eq!(rgba_to_css(0xABCD_EF01), "#abcdef01");
        assert_eq!(rgba_to_css(0xFF), "#000000ff");
    }

    #[test]
    fn parameter_blocks_keep_records_aligned_for_f64() {
        // Records are allocated on RECORD_ALIGN, so only the header matters
        // for f64 alignment of the first parameter.
        assert_eq!(RECORD_HEADER_LEN % 8, 0);
        assert_eq!(Opcode::DrawImage.params_len(), 9 * 8 - 4);
        assert_eq!(Opcode::Ellipse.params_len(), 7 * 8 + 4);
    }
}
