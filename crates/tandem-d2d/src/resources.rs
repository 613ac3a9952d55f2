use std::collections::HashMap;
use tracing::warn;

/// Pixel buffer registered under a handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageBuffer {
    /// `len` bytes of RGBA8 at `addr` in linear memory; read at use time.
    View {
        addr: u32,
        len: u32,
        width: u32,
        height: u32,
    },
    /// Pixels captured from the surface.
    Owned {
        width: u32,
        height: u32,
        data: Vec<u8>,
    },
}

impl ImageBuffer {
    pub fn width(&self) -> u32 {
        match self {
            Self::View { width, .. } | Self::Owned { width, .. } => *width,
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            Self::View { height, .. } | Self::Owned { height, .. } => *height,
        }
    }

    pub fn byte_len(&self) -> usize {
        match self {
            Self::View { len, .. } => *len as usize,
            Self::Owned { data, .. } => data.len(),
        }
    }
}

#[derive(Debug)]
pub enum Resource<G, I> {
    ImageData(ImageBuffer),
    Gradient(G),
    Image(I),
}

impl<G, I> Resource<G, I> {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::ImageData(_) => ResourceKind::ImageData,
            Self::Gradient(_) => ResourceKind::Gradient,
            Self::Image(_) => ResourceKind::Image,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    ImageData,
    Gradient,
    Image,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::ImageData => "image data",
            Self::Gradient => "gradient",
            Self::Image => "image",
        })
    }
}

/// Handle table for objects that cannot cross the memory boundary by value.
///
/// Handles are chosen by the producer. Re-registering a live handle and
/// releasing an unknown one are producer bugs that are tolerated with a
/// warning; the caller decides what an unknown handle on use means.
#[derive(Debug)]
pub struct ResourceTable<G, I> {
    entries: HashMap<i32, Resource<G, I>>,
}

impl<G, I> ResourceTable<G, I> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Register `resource` under `id`. Last writer wins.
    pub fn insert(&mut self, id: i32, resource: Resource<G, I>) {
        let kind = resource.kind();
        if let Some(old) = self.entries.insert(id, resource) {
            warn!(
                id,
                old = %old.kind(),
                new = %kind,
                "precomputed object id registered twice; replacing"
            );
        }
    }

    /// Drop the resource registered under `id`.
    pub fn release(&mut self, id: i32) -> Option<Resource<G, I>> {
        let removed = self.entries.remove(&id);
        if removed.is_none() {
            warn!(id, "release of unknown precomputed object id");
        }
        removed
    }

    pub fn get(&self, id: i32) -> Option<&Resource<G, I>> {
        self.entries.get(&id)
    }

    pub fn get_mut(&mut self, id: i32) -> Option<&mut Resource<G, I>> {
        self.entries.get_mut(&id)
    }

    pub fn contains(&self, id: i32) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<G, I> Default for ResourceTable<G, I> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_writer_wins_and_release_is_idempotent() {
        let mut table: ResourceTable<u8, ()> = ResourceTable::new();
        table.insert(7, Resource::Gradient(1));
        table.insert(7, Resource::Gradient(2));
        assert_eq!(table.len(), 1);
        assert!(matches!(table.get(7), Some(Resource::Gradient(2))));

        assert!(table.release(7).is_some());
        assert!(table.release(7).is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn image_buffer_dimensions() {
        let view = ImageBuffer::View {
            addr: 0x100,
            len: 16,
            width: 2,
            height: 2,
        };
        assert_eq!((view.width(), view.height(), view.byte_len()), (2, 2, 16));
        let owned = ImageBuffer::Owned {
            width: 1,
            height: 1,
            data: vec![1, 2, 3, 4],
        };
        assert_eq!(owned.byte_len(), 4);
    }
}
