use crate::error::ConsoleError;
use serde::Deserialize;
use tandem_d2d::{DrawSeqBuilder, ImageDataMode};
use tandem_ipc::MAX_CAPACITY;
use tandem_mem::{Arena, Memory};

/// Sizing and behaviour knobs shared by both sides.
///
/// Every field has a default, so an empty document deserializes to
/// [`TandemConfig::default`]. Ring sizes are in 32-bit words.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TandemConfig {
    /// Foreground to worker: events and allocation requests.
    pub event_queue_words: usize,
    /// Worker to foreground: console calls and allocation replies.
    pub request_ring_words: usize,
    /// Per-console key input ring.
    pub key_ring_words: usize,
    /// Pixel access mode of canvases built with
    /// [`CanvasConsole::from_config`](crate::CanvasConsole::from_config).
    pub image_data_mode: ImageDataMode,
    /// Instructions a draw-sequence builder queues before asking for a flush.
    pub flush_at_count: usize,
}

impl Default for TandemConfig {
    fn default() -> Self {
        Self {
            event_queue_words: 4096,
            request_ring_words: 4096,
            key_ring_words: 256,
            image_data_mode: ImageDataMode::Copy,
            flush_at_count: 1000,
        }
    }
}

fn check_ring(
    words: usize,
    zero: &'static str,
    too_big: &'static str,
) -> Result<(), ConsoleError> {
    if words == 0 {
        return Err(ConsoleError::InvalidConfig(zero));
    }
    if words > MAX_CAPACITY {
        return Err(ConsoleError::InvalidConfig(too_big));
    }
    Ok(())
}

impl TandemConfig {
    pub fn validate(&self) -> Result<(), ConsoleError> {
        check_ring(
            self.event_queue_words,
            "event_queue_words must be nonzero",
            "event_queue_words exceeds the largest ring size",
        )?;
        check_ring(
            self.request_ring_words,
            "request_ring_words must be nonzero",
            "request_ring_words exceeds the largest ring size",
        )?;
        check_ring(
            self.key_ring_words,
            "key_ring_words must be nonzero",
            "key_ring_words exceeds the largest ring size",
        )?;
        if self.flush_at_count == 0 {
            return Err(ConsoleError::InvalidConfig("flush_at_count must be nonzero"));
        }
        Ok(())
    }

    /// A draw-sequence builder in `arena` that asks for a flush every
    /// `flush_at_count` instructions.
    pub fn draw_seq_builder(
        &self,
        mem: &mut dyn Memory,
        arena: Arena,
    ) -> Result<DrawSeqBuilder, ConsoleError> {
        self.validate()?;
        Ok(DrawSeqBuilder::new(mem, arena, self.flush_at_count)?)
    }
}
