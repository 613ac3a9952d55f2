use crate::config::TandemConfig;
use crate::console::Console;
use crate::error::ConsoleError;
use crate::frame::ConsoleCall;
use crate::method::ConsoleClass;
use crate::props::{ConsoleProps, IoTypes};
use std::any::Any;
use tandem_d2d::{DrawInterpreter, ImageDataMode, Resource, Surface2d};
use tandem_mem::Memory;
use tracing::{debug, warn};

/// A 2D canvas driven by draw sequences.
///
/// Handles registered by one sequence (gradients, pixel buffers, loaded
/// images) stay valid for later sequences on the same canvas until released.
pub struct CanvasConsole<S: Surface2d> {
    surface: S,
    interpreter: DrawInterpreter<S>,
    focused: bool,
}

impl<S: Surface2d> CanvasConsole<S> {
    pub fn new(surface: S, mode: ImageDataMode) -> Self {
        Self {
            surface,
            interpreter: DrawInterpreter::new(mode),
            focused: false,
        }
    }

    /// A canvas using the configured [`ImageDataMode`].
    pub fn from_config(surface: S, config: &TandemConfig) -> Self {
        Self::new(surface, config.image_data_mode)
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn interpreter(&self) -> &DrawInterpreter<S> {
        &self.interpreter
    }

    pub fn has_focus(&self) -> bool {
        self.focused
    }

    /// Run the draw sequence whose header is at `seq`.
    pub fn draw_seq(&mut self, mem: &mut dyn Memory, seq: u32) -> Result<usize, ConsoleError> {
        let executed = self.interpreter.run(mem, &mut self.surface, seq)?;
        debug!(seq, executed, "draw sequence complete");
        Ok(executed)
    }

    /// Load `url` and register it under image handle `id`. Returns whether the
    /// image loaded.
    pub fn load_image(&mut self, url: &str, id: i32) -> bool {
        match self.surface.load_image(url) {
            Some(image) => {
                self.interpreter
                    .resources_mut()
                    .insert(id, Resource::Image(image));
                true
            }
            None => {
                warn!(url, id, "image failed to load");
                false
            }
        }
    }
}

impl<S: Surface2d + 'static> Console for CanvasConsole<S> {
    fn class(&self) -> ConsoleClass {
        ConsoleClass::Canvas
    }

    fn props(&self) -> ConsoleProps {
        let (width, height) = self.surface.size();
        ConsoleProps::new(IoTypes::CANVAS2D)
            .with("canvasWidth", width as i32)
            .with("canvasHeight", height as i32)
    }

    fn handle(&mut self, call: ConsoleCall, mem: &mut dyn Memory) -> Result<u32, ConsoleError> {
        match call {
            ConsoleCall::DrawSeq { seq } => {
                self.draw_seq(mem, seq)?;
                Ok(0)
            }
            ConsoleCall::LoadImage { url, id } => Ok(self.load_image(&url, id) as u32),
            ConsoleCall::SetFocus => {
                self.focused = true;
                Ok(0)
            }
            other => Err(ConsoleError::NotHandled {
                class: self.class(),
                method: other.method(),
            }),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tandem_d2d::{RecordingSurface, ResourceKind, SurfaceCall};
    use tandem_mem::VecMemory;

    #[test]
    fn props_report_canvas_size() {
        let con = CanvasConsole::new(RecordingSurface::new(320, 200), ImageDataMode::Copy);
        let props = con.props();
        assert_eq!(props.io_types(), IoTypes::CANVAS2D);
        assert_eq!(props.get("canvasWidth"), Some(320));
        assert_eq!(props.get("canvasHeight"), Some(200));
    }

    #[test]
    fn load_image_registers_the_handle() {
        let mut surface = RecordingSurface::new(16, 16);
        surface.add_image("ball.png", 8, 8);
        let mut con = CanvasConsole::new(surface, ImageDataMode::Copy);
        let mut mem = VecMemory::new(0x100);

        let ok = con
            .handle(
                ConsoleCall::LoadImage {
                    url: "ball.png".into(),
                    id: 3,
                },
                &mut mem,
            )
            .unwrap();
        assert_eq!(ok, 1);
        assert_eq!(
            con.interpreter().resources().get(3).map(|r| r.kind()),
            Some(ResourceKind::Image)
        );

        let missing = con
            .handle(
                ConsoleCall::LoadImage {
                    url: "missing.png".into(),
                    id: 4,
                },
                &mut mem,
            )
            .unwrap();
        assert_eq!(missing, 0);
        assert!(!con.interpreter().resources().contains(4));
        assert_eq!(
            con.surface().calls(),
            &[
                SurfaceCall::LoadImage("ball.png".into()),
                SurfaceCall::LoadImage("missing.png".into())
            ]
        );
    }

    #[test]
    fn terminal_calls_are_rejected() {
        let mut con = CanvasConsole::new(RecordingSurface::new(4, 4), ImageDataMode::Copy);
        let mut mem = VecMemory::new(0x10);
        assert_eq!(
            con.handle(ConsoleCall::Cls, &mut mem),
            Err(ConsoleError::NotHandled {
                class: ConsoleClass::Canvas,
                method: crate::method::ConsoleMethod::Cls
            })
        );
    }
}
