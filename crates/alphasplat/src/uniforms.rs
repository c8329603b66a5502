//! Statically typed shader uniforms.
//!
//! A program's uniforms are declared once as `(name, kind)` pairs and resolved
//! into a [`UniformLayout`] (std140 offsets, texture units). Values are then
//! written through [`UniformBlock::set`], which checks the kind of every value
//! against the declaration instead of dispatching on it at draw time.

use std::collections::HashMap;

use bytemuck::{Pod, Zeroable};

use crate::design::Design;
use crate::error::{Result, SplatError};
use crate::lut::AlphaLookupTable;
use crate::MAX_POSITION;

/// Closed set of uniform types a point program can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformKind {
    Float,
    Vec2,
    Vec3,
    Vec4,
    Int,
    Mat2,
    Mat3,
    Mat4,
    Sampler2d,
}

impl UniformKind {
    /// std140 size in bytes. Matrix columns are padded to a vec4 each.
    pub const fn size(self) -> usize {
        match self {
            UniformKind::Float | UniformKind::Int | UniformKind::Sampler2d => 4,
            UniformKind::Vec2 => 8,
            UniformKind::Vec3 => 12,
            UniformKind::Vec4 => 16,
            UniformKind::Mat2 => 32,
            UniformKind::Mat3 => 48,
            UniformKind::Mat4 => 64,
        }
    }

    /// std140 base alignment in bytes.
    pub const fn align(self) -> usize {
        match self {
            UniformKind::Float | UniformKind::Int | UniformKind::Sampler2d => 4,
            UniformKind::Vec2 => 8,
            _ => 16,
        }
    }
}

/// A uniform value tagged with its kind. Matrices are column-major.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    Int(i32),
    Mat2([[f32; 2]; 2]),
    Mat3([[f32; 3]; 3]),
    Mat4([[f32; 4]; 4]),
    /// Texture handle to bind on the sampler's unit.
    Sampler2d(u32),
}

impl UniformValue {
    pub const fn kind(&self) -> UniformKind {
        match self {
            UniformValue::Float(_) => UniformKind::Float,
            UniformValue::Vec2(_) => UniformKind::Vec2,
            UniformValue::Vec3(_) => UniformKind::Vec3,
            UniformValue::Vec4(_) => UniformKind::Vec4,
            UniformValue::Int(_) => UniformKind::Int,
            UniformValue::Mat2(_) => UniformKind::Mat2,
            UniformValue::Mat3(_) => UniformKind::Mat3,
            UniformValue::Mat4(_) => UniformKind::Mat4,
            UniformValue::Sampler2d(_) => UniformKind::Sampler2d,
        }
    }
}

/// Where a resolved uniform lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotLocation {
    /// Byte offset inside the std140 block.
    Block { offset: usize },
    /// Samplers take a texture unit instead of block bytes.
    TextureUnit(u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformSlot {
    pub name: String,
    pub kind: UniformKind,
    pub location: SlotLocation,
}

/// `u_color` and `u_kernel[0]` are addressed as `color` and `kernel`.
fn canonical_name(raw: &str) -> &str {
    let name = raw.strip_suffix("[0]").unwrap_or(raw);
    name.strip_prefix("u_").unwrap_or(name)
}

#[inline(always)]
fn align_up(v: usize, align: usize) -> usize {
    (v + align - 1) / align * align
}

/// Uniforms of one program, resolved once at setup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformLayout {
    slots: Vec<UniformSlot>,
    index: HashMap<String, usize>,
    size: usize,
    texture_units: u32,
}

impl UniformLayout {
    /// Assign std140 offsets in declaration order and texture units to samplers.
    pub fn resolve(declarations: &[(&str, UniformKind)]) -> Result<Self> {
        let mut slots = Vec::with_capacity(declarations.len());
        let mut index = HashMap::with_capacity(declarations.len());
        let mut cursor = 0usize;
        let mut texture_units = 0u32;

        for &(raw, kind) in declarations {
            let name = canonical_name(raw);
            if name.is_empty() {
                return Err(SplatError::InvalidConfig(format!("empty uniform name {raw:?}")));
            }
            if index.contains_key(name) {
                return Err(SplatError::InvalidConfig(format!("duplicate uniform {name:?}")));
            }

            let location = if kind == UniformKind::Sampler2d {
                texture_units += 1;
                SlotLocation::TextureUnit(texture_units - 1)
            } else {
                let offset = align_up(cursor, kind.align());
                cursor = offset + kind.size();
                SlotLocation::Block { offset }
            };

            index.insert(name.to_owned(), slots.len());
            slots.push(UniformSlot {
                name: name.to_owned(),
                kind,
                location,
            });
        }

        Ok(Self {
            slots,
            index,
            size: align_up(cursor, 16),
            texture_units,
        })
    }

    pub fn slot(&self, name: &str) -> Option<&UniformSlot> {
        self.index.get(canonical_name(name)).map(|&i| &self.slots[i])
    }

    pub fn slots(&self) -> &[UniformSlot] {
        &self.slots
    }

    /// Block size in bytes, rounded up to a vec4.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn texture_units(&self) -> u32 {
        self.texture_units
    }
}

/// CPU copy of a program's uniform values, laid out per its [`UniformLayout`].
#[derive(Debug, Clone)]
pub struct UniformBlock {
    layout: UniformLayout,
    bytes: Vec<u8>,
    textures: Vec<Option<u32>>,
}

impl UniformBlock {
    pub fn new(layout: UniformLayout) -> Self {
        let bytes = vec![0u8; layout.size()];
        let textures = vec![None; layout.texture_units() as usize];

        Self {
            layout,
            bytes,
            textures,
        }
    }

    pub fn layout(&self) -> &UniformLayout {
        &self.layout
    }

    /// Write `value` to the uniform `name`; its kind must match the declaration.
    pub fn set(&mut self, name: &str, value: UniformValue) -> Result<()> {
        let slot = self
            .layout
            .slot(name)
            .ok_or_else(|| SplatError::Uniform(format!("no uniform named {name:?}")))?;

        if slot.kind != value.kind() {
            return Err(SplatError::Uniform(format!(
                "uniform {:?} is {:?}, got {:?}",
                slot.name,
                slot.kind,
                value.kind()
            )));
        }

        match (slot.location, value) {
            (SlotLocation::TextureUnit(unit), UniformValue::Sampler2d(texture)) => {
                self.textures[unit as usize] = Some(texture);
            }
            (SlotLocation::Block { offset }, value) if value.kind() != UniformKind::Sampler2d => {
                let dst = &mut self.bytes[offset..offset + slot.kind.size()];
                write_std140(dst, &value);
            }
            _ => {
                return Err(SplatError::Uniform(format!(
                    "uniform {:?} has no storage for {:?}",
                    slot.name,
                    value.kind()
                )));
            }
        }

        Ok(())
    }

    /// Block bytes for a uniform buffer upload.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// `(unit, texture)` for every sampler that has a texture bound.
    pub fn texture_bindings(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.textures
            .iter()
            .enumerate()
            .filter_map(|(unit, tex)| tex.map(|t| (unit as u32, t)))
    }
}

fn write_columns<const N: usize>(dst: &mut [u8], columns: &[[f32; N]; N]) {
    for (c, column) in columns.iter().enumerate() {
        let bytes: &[u8] = bytemuck::cast_slice(&column[..]);
        dst[c * 16..c * 16 + bytes.len()].copy_from_slice(bytes);
    }
}

fn write_std140(dst: &mut [u8], value: &UniformValue) {
    match value {
        UniformValue::Float(v) => dst.copy_from_slice(bytemuck::bytes_of(v)),
        UniformValue::Vec2(v) => dst.copy_from_slice(bytemuck::cast_slice(&v[..])),
        UniformValue::Vec3(v) => dst.copy_from_slice(bytemuck::cast_slice(&v[..])),
        UniformValue::Vec4(v) => dst.copy_from_slice(bytemuck::cast_slice(&v[..])),
        UniformValue::Int(v) => dst.copy_from_slice(bytemuck::bytes_of(v)),
        UniformValue::Mat2(m) => write_columns(dst, m),
        UniformValue::Mat3(m) => write_columns(dst, m),
        UniformValue::Mat4(m) => write_columns(dst, m),
        UniformValue::Sampler2d(_) => {}
    }
}

/// Uniform block of the point-sprite program, respecting std140 layout.
/// Field order matches [`SplatUniforms::DECLARATIONS`].
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SplatUniforms {
    /// Largest vertex coordinate (65535).
    pub max_position: f32,
    /// Sprite diameter in pixels.
    pub point_size: f32,
    /// Column count of the alpha lookup texture.
    pub lookup_tex_width: f32,
    pub alpha: f32,
    /// Canvas size in physical pixels.
    pub resolution: [f32; 2],
    pub _pad0: [f32; 2],
    pub color: [f32; 3],
    pub _pad1: f32,
}

impl SplatUniforms {
    /// Uniforms the point program declares, in block order.
    pub const DECLARATIONS: &'static [(&'static str, UniformKind)] = &[
        ("u_maxPosition", UniformKind::Float),
        ("u_pointSize", UniformKind::Float),
        ("u_lookupTexWidth", UniformKind::Float),
        ("u_alpha", UniformKind::Float),
        ("u_resolution", UniformKind::Vec2),
        ("u_color", UniformKind::Vec3),
        ("u_lookupTable", UniformKind::Sampler2d),
    ];

    pub fn new(design: &Design, table: &AlphaLookupTable) -> Self {
        let design = design.clamped();

        Self {
            max_position: MAX_POSITION as f32,
            point_size: design.point_size,
            lookup_tex_width: table.width() as f32,
            alpha: design.alpha,
            resolution: design.resolution(),
            _pad0: [0.0; 2],
            color: design.color,
            _pad1: 0.0,
        }
    }

    pub fn layout() -> Result<UniformLayout> {
        UniformLayout::resolve(Self::DECLARATIONS)
    }

    /// Push every field into `block` and bind `lookup_texture` to the table sampler.
    pub fn write_into(&self, block: &mut UniformBlock, lookup_texture: u32) -> Result<()> {
        block.set("maxPosition", UniformValue::Float(self.max_position))?;
        block.set("pointSize", UniformValue::Float(self.point_size))?;
        block.set("lookupTexWidth", UniformValue::Float(self.lookup_tex_width))?;
        block.set("alpha", UniformValue::Float(self.alpha))?;
        block.set("resolution", UniformValue::Vec2(self.resolution))?;
        block.set("color", UniformValue::Vec3(self.color))?;
        block.set("lookupTable", UniformValue::Sampler2d(lookup_texture))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lut::LookupConfig;

    #[test]
    fn std140_offsets() {
        let layout = UniformLayout::resolve(&[
            ("u_alpha", UniformKind::Float),
            ("u_color", UniformKind::Vec3),
            ("u_resolution", UniformKind::Vec2),
            ("u_proj", UniformKind::Mat3),
            ("u_table", UniformKind::Sampler2d),
            ("u_kernel[0]", UniformKind::Float),
        ])
        .unwrap();

        let offset = |name: &str| match layout.slot(name).unwrap().location {
            SlotLocation::Block { offset } => offset,
            SlotLocation::TextureUnit(_) => panic!("{name} is a sampler"),
        };

        assert_eq!(offset("alpha"), 0);
        assert_eq!(offset("color"), 16);
        assert_eq!(offset("resolution"), 32);
        assert_eq!(offset("proj"), 48);
        assert_eq!(offset("kernel"), 96);
        assert_eq!(layout.size(), 112);
        assert_eq!(
            layout.slot("u_table").unwrap().location,
            SlotLocation::TextureUnit(0)
        );
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let err = UniformLayout::resolve(&[
            ("u_alpha", UniformKind::Float),
            ("alpha", UniformKind::Float),
        ]);
        assert!(matches!(err, Err(SplatError::InvalidConfig(_))));
    }

    #[test]
    fn kind_mismatch_and_unknown_name() {
        let mut block = UniformBlock::new(SplatUniforms::layout().unwrap());

        assert!(matches!(
            block.set("alpha", UniformValue::Int(1)),
            Err(SplatError::Uniform(_))
        ));
        assert!(matches!(
            block.set("nope", UniformValue::Float(1.0)),
            Err(SplatError::Uniform(_))
        ));
    }

    #[test]
    fn matrix_columns_are_padded() {
        let layout = UniformLayout::resolve(&[("m", UniformKind::Mat2)]).unwrap();
        let mut block = UniformBlock::new(layout);
        block
            .set("m", UniformValue::Mat2([[1.0, 2.0], [3.0, 4.0]]))
            .unwrap();

        let floats: &[f32] = bytemuck::cast_slice(block.as_bytes());
        assert_eq!(floats, &[1.0, 2.0, 0.0, 0.0, 3.0, 4.0, 0.0, 0.0]);
    }

    #[test]
    fn block_matches_pod_struct() {
        let table = AlphaLookupTable::build(LookupConfig::new(4, 16).unwrap()).unwrap();
        let design = Design {
            color: [0.25, 0.5, 0.75],
            ..Design::default()
        };
        let uniforms = SplatUniforms::new(&design, &table);

        let mut block = UniformBlock::new(SplatUniforms::layout().unwrap());
        uniforms.write_into(&mut block, 7).unwrap();

        assert_eq!(block.as_bytes(), bytemuck::bytes_of(&uniforms));
        assert_eq!(block.texture_bindings().collect::<Vec<_>>(), vec![(0, 7)]);
    }
}
