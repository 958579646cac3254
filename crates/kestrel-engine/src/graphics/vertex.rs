use crate::error::{Error, Result};

/// Meaning of a vertex attribute.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum VertexSemantic {
    Position,
    Normal,
    Tangent,
    Binormal,
    Color,
    TexCoord(u8),
    BlendIndices,
    BlendWeight,
    PointSize,
}

/// Scalar type of one attribute component.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum DataType {
    Byte,
    UnsignedByte,
    Short,
    UnsignedShort,
    Int,
    UnsignedInt,
    Float,
}

impl DataType {
    #[inline]
    pub const fn size(self) -> u32 {
        match self {
            Self::Byte | Self::UnsignedByte => 1,
            Self::Short | Self::UnsignedShort => 2,
            Self::Int | Self::UnsignedInt | Self::Float => 4,
        }
    }
}

/// One entry of an interleaved vertex layout.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct VertexAttribute {
    pub semantic: VertexSemantic,
    /// Number of components, 1 to 4.
    pub components: u8,
    pub data_type: DataType,
}

impl VertexAttribute {
    #[inline]
    pub const fn new(semantic: VertexSemantic, components: u8, data_type: DataType) -> Self {
        Self { semantic, components, data_type }
    }

    #[inline]
    pub const fn size(&self) -> u32 {
        self.components as u32 * self.data_type.size()
    }
}

/// Sum of the attribute sizes, i.e. the byte distance between two vertices.
pub fn vertex_stride(attributes: &[VertexAttribute]) -> u32 {
    attributes.iter().map(VertexAttribute::size).sum()
}

/// Checks that a layout is usable: non-empty, every attribute 1 to 4 components.
pub fn validate_attributes(attributes: &[VertexAttribute]) -> Result<()> {
    if attributes.is_empty() {
        return Err(Error::EmptyVertexAttributes);
    }
    if let Some(bad) = attributes.iter().find(|a| !(1..=4).contains(&a.components)) {
        return Err(Error::InvalidComponentCount(bad.components));
    }
    Ok(())
}

/// Layout of [`Vertex`]: position, color, one texture coordinate set and a normal.
pub const DEFAULT_VERTEX_ATTRIBUTES: [VertexAttribute; 4] = [
    VertexAttribute::new(VertexSemantic::Position, 3, DataType::Float),
    VertexAttribute::new(VertexSemantic::Color, 4, DataType::UnsignedByte),
    VertexAttribute::new(VertexSemantic::TexCoord(0), 2, DataType::Float),
    VertexAttribute::new(VertexSemantic::Normal, 3, DataType::Float),
];

/// Plain vertex matching [`DEFAULT_VERTEX_ATTRIBUTES`].
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub color: [u8; 4],
    pub tex_coord: [f32; 2],
    pub normal: [f32; 3],
}

impl Vertex {
    pub fn new(position: [f32; 3], color: [u8; 4], tex_coord: [f32; 2]) -> Self {
        Self { position, color, tex_coord, normal: [0.0, 0.0, -1.0] }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stride_of_default_layout_matches_vertex_struct() {
        assert_eq!(vertex_stride(&DEFAULT_VERTEX_ATTRIBUTES) as usize, size_of::<Vertex>());
    }

    #[test]
    fn empty_layout_is_rejected() {
        assert!(matches!(validate_attributes(&[]), Err(Error::EmptyVertexAttributes)));
    }

    #[test]
    fn five_components_are_rejected() {
        let attrs = [VertexAttribute::new(VertexSemantic::Position, 5, DataType::Float)];
        assert!(matches!(validate_attributes(&attrs), Err(Error::InvalidComponentCount(5))));
    }
}
