//! Buffer descriptors and typed-uniform metadata.

use bitflags::bitflags;

bitflags! {
    /// What a buffer may be bound as. The backend selects its bind target
    /// from this set.
    #[derive(Default)]
    pub struct BufferUsage: u32 {
        const VERTEX   = 1 << 0;
        const INDEX    = 1 << 1;
        const UNIFORM  = 1 << 2;
        const STORAGE  = 1 << 3;
        const INDIRECT = 1 << 4;
        const COPY_SRC = 1 << 5;
        const COPY_DST = 1 << 6;
    }
}

/// Update-frequency hint, mapped to the backend's buffer usage hint.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum BufferHint {
    Static,
    Dynamic,
    Stream,
}

impl Default for BufferHint {
    fn default() -> Self {
        BufferHint::Static
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MapMode {
    Read,
    Write,
    ReadWrite,
}

impl MapMode {
    pub fn reads(self) -> bool {
        matches!(self, MapMode::Read | MapMode::ReadWrite)
    }

    pub fn writes(self) -> bool {
        matches!(self, MapMode::Write | MapMode::ReadWrite)
    }
}

/// Scalar, vector or matrix type of a uniform value.
///
/// Used by the binding fallback path when the backend has no native uniform
/// buffer support and buffer contents must be re-dispatched as typed uniform
/// calls.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum UniformType {
    F32,
    Vec2,
    Vec3,
    Vec4,
    I32,
    IVec2,
    IVec3,
    IVec4,
    Mat2,
    Mat3,
    Mat4,
}

impl UniformType {
    pub fn byte_size(self) -> usize {
        match self {
            UniformType::F32 | UniformType::I32 => 4,
            UniformType::Vec2 | UniformType::IVec2 => 8,
            UniformType::Vec3 | UniformType::IVec3 => 12,
            UniformType::Vec4 | UniformType::IVec4 | UniformType::Mat2 => 16,
            UniformType::Mat3 => 36,
            UniformType::Mat4 => 64,
        }
    }

    /// Guess a uniform type from a byte length.
    ///
    /// 16 bytes is ambiguous (Vec4 vs Mat2); the table resolves it to Vec4
    /// and callers that need Mat2 must attach explicit type info. Lengths
    /// outside the table return `None` rather than guessing.
    pub fn infer_from_len(len: usize) -> Option<UniformType> {
        match len {
            4 => Some(UniformType::F32),
            8 => Some(UniformType::Vec2),
            12 => Some(UniformType::Vec3),
            16 => Some(UniformType::Vec4),
            36 => Some(UniformType::Mat3),
            64 => Some(UniformType::Mat4),
            _ => None,
        }
    }

    /// Whether `infer_from_len` would have picked this type only by
    /// convention (another type shares the byte length).
    pub fn inference_is_ambiguous(len: usize) -> bool {
        len == 16
    }
}

/// One field of a struct-typed uniform buffer.
#[derive(Clone, Debug, PartialEq)]
pub struct BufferFieldInfo {
    pub uniform_name: String,
    pub ty: UniformType,
    /// Byte offset of the field inside the buffer.
    pub offset: usize,
}

/// Typed metadata attached to a uniform buffer so the scalar-fallback
/// binding path can emit correct typed uniform calls.
#[derive(Clone, Debug, PartialEq)]
pub enum BufferTypeInfo {
    /// The whole buffer backs one uniform value.
    Single {
        /// Shader-side uniform name the value binds to.
        uniform_name: String,
        ty: UniformType,
    },
    /// The buffer backs a struct; each field is dispatched as its own
    /// uniform.
    Struct { fields: Vec<BufferFieldInfo> },
}

impl BufferTypeInfo {
    pub fn single(uniform_name: impl Into<String>, ty: UniformType) -> BufferTypeInfo {
        BufferTypeInfo::Single {
            uniform_name: uniform_name.into(),
            ty,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct BufferDescriptor {
    pub label: Option<String>,
    pub size: usize,
    pub usage: BufferUsage,
    pub hint: BufferHint,
}

impl BufferDescriptor {
    pub fn label_or_unnamed(&self) -> &str {
        self.label.as_deref().unwrap_or("<unnamed buffer>")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inference_covers_the_documented_table() {
        assert_eq!(UniformType::infer_from_len(64), Some(UniformType::Mat4));
        assert_eq!(UniformType::infer_from_len(36), Some(UniformType::Mat3));
        assert_eq!(UniformType::infer_from_len(16), Some(UniformType::Vec4));
        assert_eq!(UniformType::infer_from_len(12), Some(UniformType::Vec3));
        assert_eq!(UniformType::infer_from_len(8), Some(UniformType::Vec2));
        assert_eq!(UniformType::infer_from_len(4), Some(UniformType::F32));
        assert_eq!(UniformType::infer_from_len(20), None);
    }

    #[test]
    fn sixteen_bytes_is_flagged_ambiguous() {
        assert!(UniformType::inference_is_ambiguous(16));
        assert!(!UniformType::inference_is_ambiguous(64));
    }

    #[test]
    fn map_mode_predicates() {
        assert!(MapMode::Read.reads());
        assert!(!MapMode::Read.writes());
        assert!(MapMode::ReadWrite.reads());
        assert!(MapMode::ReadWrite.writes());
    }
}
