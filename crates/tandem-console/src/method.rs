//! The closed set of console operations and the classes that implement them.

use crate::error::ConsoleError;
use std::fmt;
use std::str::FromStr;

#[repr(u32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ConsoleMethod {
    CharOut = 1,
    CharIn = 2,
    Inkey = 3,
    PutStr = 4,
    GetProp = 5,
    SetRange = 6,
    SetC32 = 7,
    SetReset = 8,
    SetCursor = 9,
    SetColors = 10,
    Cls = 11,
    Point = 12,
    DrawSeq = 13,
    LoadImage = 14,
    SetFocus = 15,
    GetConIdFromName = 16,
}

/// How a method travels between the worker and the foreground.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CallShape {
    /// One request frame, no reply.
    FireAndForget,
    /// Request frame, then block on the console's completion signal for the
    /// result word.
    Synchronous,
    /// Read from the console's key ring.
    KeyRing,
    /// Answered on the worker without crossing threads.
    Local,
}

impl ConsoleMethod {
    pub const ALL: [ConsoleMethod; 16] = [
        ConsoleMethod::CharOut,
        ConsoleMethod::CharIn,
        ConsoleMethod::Inkey,
        ConsoleMethod::PutStr,
        ConsoleMethod::GetProp,
        ConsoleMethod::SetRange,
        ConsoleMethod::SetC32,
        ConsoleMethod::SetReset,
        ConsoleMethod::SetCursor,
        ConsoleMethod::SetColors,
        ConsoleMethod::Cls,
        ConsoleMethod::Point,
        ConsoleMethod::DrawSeq,
        ConsoleMethod::LoadImage,
        ConsoleMethod::SetFocus,
        ConsoleMethod::GetConIdFromName,
    ];

    pub fn from_tag(tag: u32) -> Option<Self> {
        Self::ALL.get(tag.checked_sub(1)? as usize).copied()
    }

    pub fn tag(self) -> u32 {
        self as u32
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConsoleMethod::CharOut => "charOut",
            ConsoleMethod::CharIn => "charIn",
            ConsoleMethod::Inkey => "inkey",
            ConsoleMethod::PutStr => "putStr",
            ConsoleMethod::GetProp => "getProp",
            ConsoleMethod::SetRange => "setRange",
            ConsoleMethod::SetC32 => "setC32",
            ConsoleMethod::SetReset => "setReset",
            ConsoleMethod::SetCursor => "setCursor",
            ConsoleMethod::SetColors => "setColors",
            ConsoleMethod::Cls => "cls",
            ConsoleMethod::Point => "point",
            ConsoleMethod::DrawSeq => "drawSeq",
            ConsoleMethod::LoadImage => "loadImage",
            ConsoleMethod::SetFocus => "setFocus",
            ConsoleMethod::GetConIdFromName => "getConIdFromName",
        }
    }

    pub fn shape(self) -> CallShape {
        match self {
            ConsoleMethod::DrawSeq | ConsoleMethod::Point | ConsoleMethod::LoadImage => {
                CallShape::Synchronous
            }
            ConsoleMethod::CharIn | ConsoleMethod::Inkey => CallShape::KeyRing,
            ConsoleMethod::GetProp | ConsoleMethod::GetConIdFromName => CallShape::Local,
            _ => CallShape::FireAndForget,
        }
    }

    /// Number of argument words a native call passes, not counting the
    /// console id.
    pub fn arity(self) -> usize {
        match self {
            ConsoleMethod::CharIn
            | ConsoleMethod::Inkey
            | ConsoleMethod::Cls
            | ConsoleMethod::SetFocus => 0,
            ConsoleMethod::GetProp
            | ConsoleMethod::SetCursor
            | ConsoleMethod::DrawSeq
            | ConsoleMethod::GetConIdFromName => 1,
            ConsoleMethod::CharOut
            | ConsoleMethod::PutStr
            | ConsoleMethod::SetC32
            | ConsoleMethod::SetColors
            | ConsoleMethod::Point
            | ConsoleMethod::LoadImage => 2,
            ConsoleMethod::SetRange | ConsoleMethod::SetReset => 3,
        }
    }

    /// `getConIdFromName` is a module-level import rather than an operation
    /// on a console.
    pub fn is_device_method(self) -> bool {
        self != ConsoleMethod::GetConIdFromName
    }
}

impl FromStr for ConsoleMethod {
    type Err = ConsoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| ConsoleError::UnknownMethod(s.to_owned()))
    }
}

impl fmt::Display for ConsoleMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ConsoleClass {
    Debug,
    Terminal,
    Canvas,
}

impl ConsoleClass {
    pub fn name(self) -> &'static str {
        match self {
            ConsoleClass::Debug => "DebugConsole",
            ConsoleClass::Terminal => "TerminalConsole",
            ConsoleClass::Canvas => "CanvasConsole",
        }
    }

    pub fn supports(self, method: ConsoleMethod) -> bool {
        use ConsoleMethod::*;
        match self {
            ConsoleClass::Debug => matches!(method, CharOut | PutStr | GetProp),
            ConsoleClass::Terminal => matches!(
                method,
                CharOut
                    | CharIn
                    | Inkey
                    | PutStr
                    | GetProp
                    | SetRange
                    | SetC32
                    | SetReset
                    | Point
                    | SetCursor
                    | SetColors
                    | Cls
                    | SetFocus
            ),
            ConsoleClass::Canvas => {
                matches!(method, CharIn | Inkey | GetProp | DrawSeq | LoadImage | SetFocus)
            }
        }
    }

    /// Consoles that accept `charIn` get a key ring at setup.
    pub fn has_key_ring(self) -> bool {
        self.supports(ConsoleMethod::CharIn)
    }
}

impl FromStr for ConsoleClass {
    type Err = ConsoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [ConsoleClass::Debug, ConsoleClass::Terminal, ConsoleClass::Canvas]
            .into_iter()
            .find(|c| c.name() == s)
            .ok_or_else(|| ConsoleError::UnknownClass(s.to_owned()))
    }
}

impl fmt::Display for ConsoleClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_and_tags_are_bijective() {
        for m in ConsoleMethod::ALL {
            assert_eq!(m.as_str().parse::<ConsoleMethod>().unwrap(), m);
            assert_eq!(ConsoleMethod::from_tag(m.tag()), Some(m));
        }
        assert_eq!(ConsoleMethod::from_tag(0), None);
        assert_eq!(ConsoleMethod::from_tag(17), None);
        assert_eq!(
            "twrConCharOut".parse::<ConsoleMethod>(),
            Err(ConsoleError::UnknownMethod("twrConCharOut".into()))
        );
    }

    #[test]
    fn call_shapes() {
        assert_eq!(ConsoleMethod::DrawSeq.shape(), CallShape::Synchronous);
        assert_eq!(ConsoleMethod::Point.shape(), CallShape::Synchronous);
        assert_eq!(ConsoleMethod::CharOut.shape(), CallShape::FireAndForget);
        assert_eq!(ConsoleMethod::SetFocus.shape(), CallShape::FireAndForget);
        assert_eq!(ConsoleMethod::Inkey.shape(), CallShape::KeyRing);
        assert_eq!(ConsoleMethod::GetProp.shape(), CallShape::Local);
    }

    #[test]
    fn class_capabilities() {
        assert!(ConsoleClass::Debug.supports(ConsoleMethod::PutStr));
        assert!(!ConsoleClass::Debug.supports(ConsoleMethod::CharIn));
        assert!(!ConsoleClass::Debug.has_key_ring());
        assert!(ConsoleClass::Terminal.supports(ConsoleMethod::SetReset));
        assert!(!ConsoleClass::Terminal.supports(ConsoleMethod::DrawSeq));
        assert!(ConsoleClass::Canvas.supports(ConsoleMethod::LoadImage));
        assert!(!ConsoleClass::Canvas.supports(ConsoleMethod::CharOut));
        assert!(ConsoleClass::Canvas.has_key_ring());
        for class in [ConsoleClass::Debug, ConsoleClass::Terminal, ConsoleClass::Canvas] {
            assert!(!class.supports(ConsoleMethod::GetConIdFromName));
            assert_eq!(class.name().parse::<ConsoleClass>().unwrap(), class);
        }
    }
}
