//! Texture, vertex and index formats.

/// Pixel format of a texture.
///
/// Color formats are listed first, then depth/stencil, then the compressed
/// families. Compressed formats require the corresponding backend extension;
/// the backend may fall back to an uncompressed equivalent when it is absent.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum TextureFormat {
    // 8-bit
    R8Unorm,
    R8Snorm,
    R8Uint,
    R8Sint,
    // 16-bit
    R16Uint,
    R16Sint,
    R16Float,
    Rg8Unorm,
    Rg8Snorm,
    Rg8Uint,
    Rg8Sint,
    // 32-bit
    R32Uint,
    R32Sint,
    R32Float,
    Rg16Uint,
    Rg16Sint,
    Rg16Float,
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Rgba8Snorm,
    Rgba8Uint,
    Rgba8Sint,
    Bgra8Unorm,
    Bgra8UnormSrgb,
    Rgb10a2Unorm,
    Rg11b10Float,
    // 64-bit
    Rg32Uint,
    Rg32Sint,
    Rg32Float,
    Rgba16Uint,
    Rgba16Sint,
    Rgba16Float,
    // 128-bit
    Rgba32Uint,
    Rgba32Sint,
    Rgba32Float,
    // packed 16-bit legacy formats
    Rgba4Unorm,
    Rgb5a1Unorm,
    Rgb565Unorm,
    // depth / stencil
    Depth16Unorm,
    Depth24Plus,
    Depth24PlusStencil8,
    Depth32Float,
    Stencil8,
    // S3TC / BC
    Bc1RgbaUnorm,
    Bc1RgbaUnormSrgb,
    Bc2RgbaUnorm,
    Bc2RgbaUnormSrgb,
    Bc3RgbaUnorm,
    Bc3RgbaUnormSrgb,
    // ETC
    Etc1Rgb8Unorm,
    Etc2Rgb8Unorm,
    Etc2Rgb8UnormSrgb,
    Etc2Rgb8A1Unorm,
    Etc2Rgba8Unorm,
    // ASTC
    Astc4x4Unorm,
    Astc4x4UnormSrgb,
    Astc8x8Unorm,
    // PVRTC
    PvrtcRgb4bppUnorm,
    PvrtcRgb2bppUnorm,
    PvrtcRgba4bppUnorm,
    PvrtcRgba2bppUnorm,
}

impl TextureFormat {
    /// Bytes per pixel for uncompressed formats, bytes per block for
    /// compressed ones.
    pub fn block_size(self) -> u32 {
        use TextureFormat::*;
        match self {
            R8Unorm | R8Snorm | R8Uint | R8Sint | Stencil8 => 1,
            R16Uint | R16Sint | R16Float | Rg8Unorm | Rg8Snorm | Rg8Uint | Rg8Sint
            | Rgba4Unorm | Rgb5a1Unorm | Rgb565Unorm | Depth16Unorm => 2,
            R32Uint | R32Sint | R32Float | Rg16Uint | Rg16Sint | Rg16Float | Rgba8Unorm
            | Rgba8UnormSrgb | Rgba8Snorm | Rgba8Uint | Rgba8Sint | Bgra8Unorm
            | Bgra8UnormSrgb | Rgb10a2Unorm | Rg11b10Float | Depth24Plus | Depth32Float
            | Depth24PlusStencil8 => 4,
            Rg32Uint | Rg32Sint | Rg32Float | Rgba16Uint | Rgba16Sint | Rgba16Float => 8,
            Rgba32Uint | Rgba32Sint | Rgba32Float => 16,
            Bc1RgbaUnorm | Bc1RgbaUnormSrgb | Etc1Rgb8Unorm | Etc2Rgb8Unorm
            | Etc2Rgb8UnormSrgb | Etc2Rgb8A1Unorm | PvrtcRgb4bppUnorm | PvrtcRgba4bppUnorm => 8,
            Bc2RgbaUnorm | Bc2RgbaUnormSrgb | Bc3RgbaUnorm | Bc3RgbaUnormSrgb
            | Etc2Rgba8Unorm | Astc4x4Unorm | Astc4x4UnormSrgb | Astc8x8Unorm
            | PvrtcRgb2bppUnorm | PvrtcRgba2bppUnorm => 16,
        }
    }

    /// Edge length, in pixels, of one compressed block. 1 for uncompressed
    /// formats.
    pub fn block_dimension(self) -> u32 {
        use TextureFormat::*;
        match self {
            Bc1RgbaUnorm | Bc1RgbaUnormSrgb | Bc2RgbaUnorm | Bc2RgbaUnormSrgb | Bc3RgbaUnorm
            | Bc3RgbaUnormSrgb | Etc1Rgb8Unorm | Etc2Rgb8Unorm | Etc2Rgb8UnormSrgb
            | Etc2Rgb8A1Unorm | Etc2Rgba8Unorm | Astc4x4Unorm | Astc4x4UnormSrgb
            | PvrtcRgb4bppUnorm | PvrtcRgb2bppUnorm | PvrtcRgba4bppUnorm
            | PvrtcRgba2bppUnorm => 4,
            Astc8x8Unorm => 8,
            _ => 1,
        }
    }

    pub fn is_compressed(self) -> bool {
        self.block_dimension() > 1
    }

    pub fn is_depth_or_stencil(self) -> bool {
        use TextureFormat::*;
        matches!(
            self,
            Depth16Unorm | Depth24Plus | Depth24PlusStencil8 | Depth32Float | Stencil8
        )
    }

    pub fn has_stencil(self) -> bool {
        matches!(
            self,
            TextureFormat::Depth24PlusStencil8 | TextureFormat::Stencil8
        )
    }

    pub fn has_depth(self) -> bool {
        use TextureFormat::*;
        matches!(
            self,
            Depth16Unorm | Depth24Plus | Depth24PlusStencil8 | Depth32Float
        )
    }

    /// The uncompressed format used when a compressed format must fall back
    /// because the backend extension is missing.
    pub fn uncompressed_fallback(self) -> TextureFormat {
        if self.is_compressed() {
            TextureFormat::Rgba8Unorm
        } else {
            self
        }
    }
}

/// Format of a single vertex attribute.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum VertexFormat {
    Uint8x2,
    Uint8x4,
    Sint8x2,
    Sint8x4,
    Unorm8x2,
    Unorm8x4,
    Snorm8x2,
    Snorm8x4,
    Uint16x2,
    Uint16x4,
    Sint16x2,
    Sint16x4,
    Unorm16x2,
    Unorm16x4,
    Snorm16x2,
    Snorm16x4,
    Float32,
    Float32x2,
    Float32x3,
    Float32x4,
    Uint32,
    Uint32x2,
    Uint32x3,
    Uint32x4,
    Sint32,
    Sint32x2,
    Sint32x3,
    Sint32x4,
}

impl VertexFormat {
    /// Number of components the attribute carries.
    pub fn component_count(self) -> u32 {
        use VertexFormat::*;
        match self {
            Float32 | Uint32 | Sint32 => 1,
            Uint8x2 | Sint8x2 | Unorm8x2 | Snorm8x2 | Uint16x2 | Sint16x2 | Unorm16x2
            | Snorm16x2 | Float32x2 | Uint32x2 | Sint32x2 => 2,
            Float32x3 | Uint32x3 | Sint32x3 => 3,
            Uint8x4 | Sint8x4 | Unorm8x4 | Snorm8x4 | Uint16x4 | Sint16x4 | Unorm16x4
            | Snorm16x4 | Float32x4 | Uint32x4 | Sint32x4 => 4,
        }
    }

    /// Total byte size of the attribute.
    pub fn byte_size(self) -> u32 {
        use VertexFormat::*;
        match self {
            Uint8x2 | Sint8x2 | Unorm8x2 | Snorm8x2 => 2,
            Uint8x4 | Sint8x4 | Unorm8x4 | Snorm8x4 | Uint16x2 | Sint16x2 | Unorm16x2
            | Snorm16x2 | Float32 | Uint32 | Sint32 => 4,
            Uint16x4 | Sint16x4 | Unorm16x4 | Snorm16x4 | Float32x2 | Uint32x2 | Sint32x2 => 8,
            Float32x3 | Uint32x3 | Sint32x3 => 12,
            Float32x4 | Uint32x4 | Sint32x4 => 16,
        }
    }

    /// Whether integer source data is normalized into [0,1] / [-1,1] when
    /// fetched by the vertex stage.
    pub fn is_normalized(self) -> bool {
        use VertexFormat::*;
        matches!(
            self,
            Unorm8x2 | Unorm8x4 | Snorm8x2 | Snorm8x4 | Unorm16x2 | Unorm16x4 | Snorm16x2
                | Snorm16x4
        )
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum IndexFormat {
    Uint16,
    Uint32,
}

impl IndexFormat {
    pub fn byte_size(self) -> u32 {
        match self {
            IndexFormat::Uint16 => 2,
            IndexFormat::Uint32 => 4,
        }
    }
}
