// buffer.rs — Runtime buffer handles
//
// A `Buffer` is a shared descriptor for a multi-dimensional array: element
// type, per-dimension (min, extent, stride) in elements, and host bytes.
// Copies of a `Buffer` alias the same storage.
//
// Preconditions: extents and strides are non-negative.
// Postconditions: host storage covers every in-bounds coordinate.
// Failure modes: invalid or oversized shapes, out-of-bounds accesses, and element type
//   mismatches are user errors.
// Side effects: allocates host storage on construction.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde::Serialize;

use crate::diag::Diagnostic;
use crate::eval::Value;
use crate::naming;
use crate::types::{type_of, ScalarType, Type};
use crate::{user_assert, user_error};

/// Shape of one buffer dimension, in elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BufferDim {
    pub min: i32,
    pub extent: i32,
    pub stride: i32,
}

struct BufferContents {
    name: String,
    ty: Type,
    dims: Vec<BufferDim>,
    host: RefCell<Vec<u8>>,
}

#[derive(Clone)]
pub struct Buffer(Rc<BufferContents>);

/// Host allocations are limited to what a 32-bit byte offset can address.
pub const MAX_BUFFER_BYTES: u64 = i32::MAX as u64;

#[track_caller]
fn too_large(name: &str) -> Diagnostic {
    user_error!(
        "Buffer {} is larger than the maximum of {} bytes",
        name,
        MAX_BUFFER_BYTES
    )
}

impl Buffer {
    /// A dense, zero-initialised buffer with mins at zero and the first
    /// dimension innermost.
    #[track_caller]
    pub fn new(ty: Type, extents: &[i32]) -> Result<Self, Diagnostic> {
        Buffer::named(ty, extents, naming::unique_name('b'))
    }

    #[track_caller]
    pub fn named(ty: Type, extents: &[i32], name: impl Into<String>) -> Result<Self, Diagnostic> {
        let mut dims = Vec::with_capacity(extents.len());
        let mut stride = 1i32;
        for &extent in extents {
            dims.push(BufferDim {
                min: 0,
                extent,
                stride,
            });
            stride = stride.saturating_mul(extent.max(1));
        }
        Buffer::with_dims(ty, dims, name)
    }

    /// A zero-initialised buffer with an explicit layout.
    #[track_caller]
    pub fn with_dims(
        ty: Type,
        dims: Vec<BufferDim>,
        name: impl Into<String>,
    ) -> Result<Self, Diagnostic> {
        let name = name.into();
        let mut elements: u64 = 1;
        for (i, d) in dims.iter().enumerate() {
            user_assert!(
                d.extent >= 0 && d.stride >= 0,
                "Buffer {} has a negative extent or stride in dimension {}",
                name,
                i
            );
            if d.extent == 0 {
                elements = 0;
                break;
            }
            elements = (d.extent as u64 - 1)
                .checked_mul(d.stride as u64)
                .and_then(|span| elements.checked_add(span))
                .ok_or_else(|| too_large(&name))?;
        }
        let bytes = elements
            .checked_mul(ty.bytes() as u64)
            .filter(|&b| b <= MAX_BUFFER_BYTES)
            .ok_or_else(|| too_large(&name))? as usize;
        let mut host = Vec::new();
        host.try_reserve_exact(bytes).map_err(|e| {
            user_error!("Can't allocate {} bytes for Buffer {}: {}", bytes, name, e)
        })?;
        host.resize(bytes, 0);
        tracing::debug!(buffer = %name, %ty, bytes, "allocated buffer");
        Ok(Buffer(Rc::new(BufferContents {
            name,
            ty,
            dims,
            host: RefCell::new(host),
        })))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn ty(&self) -> Type {
        self.0.ty
    }

    pub fn dimensions(&self) -> usize {
        self.0.dims.len()
    }

    pub fn dims(&self) -> &[BufferDim] {
        &self.0.dims
    }

    pub fn dim(&self, d: usize) -> Option<BufferDim> {
        self.0.dims.get(d).copied()
    }

    /// Pointer identity.
    pub fn same_as(&self, other: &Buffer) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Byte offset of an element.
    #[track_caller]
    fn offset(&self, coords: &[i32]) -> Result<usize, Diagnostic> {
        user_assert!(
            coords.len() == self.dimensions(),
            "{}-coordinate access to Buffer {}, which has {} dimensions",
            coords.len(),
            self.name(),
            self.dimensions()
        );
        let mut index = 0usize;
        for (i, (&c, d)) in coords.iter().zip(&self.0.dims).enumerate() {
            let rel = c as i64 - d.min as i64;
            if rel < 0 || rel >= d.extent as i64 {
                return Err(user_error!(
                    "Access to Buffer {} at coordinate {} in dimension {} is outside [{}, {}]",
                    self.name(),
                    c,
                    i,
                    d.min,
                    d.min as i64 + d.extent as i64 - 1
                ));
            }
            index += rel as usize * d.stride as usize;
        }
        Ok(index * self.ty().bytes())
    }

    fn write_bits(&self, offset: usize, bits: u64) {
        let n = self.ty().bytes();
        let mut host = self.0.host.borrow_mut();
        host[offset..offset + n].copy_from_slice(&bits.to_le_bytes()[..n]);
    }

    fn read_bits(&self, offset: usize) -> u64 {
        let n = self.ty().bytes();
        let host = self.0.host.borrow();
        let mut raw = [0u8; 8];
        raw[..n].copy_from_slice(&host[offset..offset + n]);
        u64::from_le_bytes(raw)
    }

    #[track_caller]
    pub fn store<T: ScalarType>(&self, coords: &[i32], value: T) -> Result<(), Diagnostic> {
        user_assert!(
            type_of::<T>() == self.ty(),
            "Can't store a {} into Buffer {} of type {}",
            type_of::<T>(),
            self.name(),
            self.ty()
        );
        let offset = self.offset(coords)?;
        self.write_bits(offset, value.to_bits());
        Ok(())
    }

    #[track_caller]
    pub fn load<T: ScalarType>(&self, coords: &[i32]) -> Result<T, Diagnostic> {
        user_assert!(
            type_of::<T>() == self.ty(),
            "Can't load a {} from Buffer {} of type {}",
            type_of::<T>(),
            self.name(),
            self.ty()
        );
        let offset = self.offset(coords)?;
        Ok(T::from_bits(self.read_bits(offset)))
    }

    /// Load an element without knowing its Rust type.
    #[track_caller]
    pub fn load_value(&self, coords: &[i32]) -> Result<Value, Diagnostic> {
        let offset = self.offset(coords)?;
        Ok(Value::from_bits(self.ty(), self.read_bits(offset)))
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("name", &self.0.name)
            .field("ty", &self.0.ty)
            .field("dims", &self.0.dims)
            .finish()
    }
}
