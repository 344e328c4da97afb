use std::fmt;

use serde::{Deserialize, Serialize};

use crate::buffer::TypedBuffer;

/// How a resource is exposed to the shader.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    StorageReadOnly,
    #[default]
    StorageReadWrite,
    Uniform,
}

impl ResourceKind {
    pub(crate) fn binding_type(self) -> wgpu::BufferBindingType {
        match self {
            ResourceKind::StorageReadOnly => wgpu::BufferBindingType::Storage { read_only: true },
            ResourceKind::StorageReadWrite => {
                wgpu::BufferBindingType::Storage { read_only: false }
            }
            ResourceKind::Uniform => wgpu::BufferBindingType::Uniform,
        }
    }

    pub(crate) fn usage(self) -> wgpu::BufferUsages {
        let base = wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::COPY_SRC;
        match self {
            ResourceKind::StorageReadOnly | ResourceKind::StorageReadWrite => {
                base | wgpu::BufferUsages::STORAGE
            }
            ResourceKind::Uniform => base | wgpu::BufferUsages::UNIFORM,
        }
    }

    pub fn is_writable(self) -> bool {
        matches!(self, ResourceKind::StorageReadWrite)
    }
}

/// `(descriptor set, binding)` pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BindingCoords {
    pub set: u32,
    pub binding: u32,
}

impl BindingCoords {
    pub const fn new(set: u32, binding: u32) -> Self {
        Self { set, binding }
    }
}

impl fmt::Display for BindingCoords {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "set {} binding {}", self.set, self.binding)
    }
}

/// One shader-visible buffer: its contents (inputs) or expected contents (outputs), its kind,
/// and optionally explicit coordinates. Without coordinates the builder assigns set 0 and the
/// resource's position among all inputs followed by all outputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDescriptor {
    pub buffer: TypedBuffer,
    pub kind: ResourceKind,
    pub coords: Option<BindingCoords>,
}

impl ResourceDescriptor {
    pub fn new(buffer: TypedBuffer, kind: ResourceKind) -> Self {
        Self {
            buffer,
            kind,
            coords: None,
        }
    }

    pub fn storage(buffer: TypedBuffer) -> Self {
        Self::new(buffer, ResourceKind::StorageReadWrite)
    }

    pub fn read_only(buffer: TypedBuffer) -> Self {
        Self::new(buffer, ResourceKind::StorageReadOnly)
    }

    pub fn uniform(buffer: TypedBuffer) -> Self {
        Self::new(buffer, ResourceKind::Uniform)
    }

    pub fn at(mut self, set: u32, binding: u32) -> Self {
        self.coords = Some(BindingCoords::new(set, binding));
        self
    }

    /// Coordinates after build-time assignment. Built specifications always have them.
    pub fn binding(&self) -> BindingCoords {
        self.coords.unwrap_or_default()
    }
}

impl From<TypedBuffer> for ResourceDescriptor {
    fn from(buffer: TypedBuffer) -> Self {
        Self::storage(buffer)
    }
}
