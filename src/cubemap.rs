use crate::rgbe::{self, Rgbe};
use anyhow::{anyhow, bail, Result};
use glam::Vec3;

pub const FACE_COUNT: usize = 6;
/// Largest face side accepted from sources and configs.
pub const MAX_FACE_SIZE: u32 = 8192;

/// Cubemap faces in strip order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CubeFace {
    PositiveX,
    NegativeX,
    PositiveY,
    NegativeY,
    PositiveZ,
    NegativeZ,
}

/// Axes spanning one face: `direction = normalize(main_axis + s * s_axis + t * t_axis)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceBasis {
    pub s_axis: Vec3,
    pub t_axis: Vec3,
    pub main_axis: Vec3,
}

// OpenGL cubemap face selection (major axis direction table).
static FACE_BASES: [FaceBasis; FACE_COUNT] = [
    FaceBasis {
        s_axis: Vec3::new(0.0, 0.0, -1.0),
        t_axis: Vec3::new(0.0, -1.0, 0.0),
        main_axis: Vec3::new(1.0, 0.0, 0.0),
    },
    FaceBasis {
        s_axis: Vec3::new(0.0, 0.0, 1.0),
        t_axis: Vec3::new(0.0, -1.0, 0.0),
        main_axis: Vec3::new(-1.0, 0.0, 0.0),
    },
    FaceBasis {
        s_axis: Vec3::new(1.0, 0.0, 0.0),
        t_axis: Vec3::new(0.0, 0.0, 1.0),
        main_axis: Vec3::new(0.0, 1.0, 0.0),
    },
    FaceBasis {
        s_axis: Vec3::new(1.0, 0.0, 0.0),
        t_axis: Vec3::new(0.0, 0.0, -1.0),
        main_axis: Vec3::new(0.0, -1.0, 0.0),
    },
    FaceBasis {
        s_axis: Vec3::new(1.0, 0.0, 0.0),
        t_axis: Vec3::new(0.0, -1.0, 0.0),
        main_axis: Vec3::new(0.0, 0.0, 1.0),
    },
    FaceBasis {
        s_axis: Vec3::new(-1.0, 0.0, 0.0),
        t_axis: Vec3::new(0.0, -1.0, 0.0),
        main_axis: Vec3::new(0.0, 0.0, -1.0),
    },
];

impl CubeFace {
    pub const ALL: [CubeFace; FACE_COUNT] = [
        CubeFace::PositiveX,
        CubeFace::NegativeX,
        CubeFace::PositiveY,
        CubeFace::NegativeY,
        CubeFace::PositiveZ,
        CubeFace::NegativeZ,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn basis(self) -> &'static FaceBasis {
        &FACE_BASES[self.index()]
    }

    pub fn label(self) -> &'static str {
        match self {
            CubeFace::PositiveX => "+X",
            CubeFace::NegativeX => "-X",
            CubeFace::PositiveY => "+Y",
            CubeFace::NegativeY => "-Y",
            CubeFace::PositiveZ => "+Z",
            CubeFace::NegativeZ => "-Z",
        }
    }

    /// Face hit by `direction`. Ties resolve X before Y before Z.
    pub fn from_direction(direction: Vec3) -> Self {
        let a = direction.abs();
        if a.x >= a.y && a.x >= a.z {
            if direction.x >= 0.0 {
                CubeFace::PositiveX
            } else {
                CubeFace::NegativeX
            }
        } else if a.y >= a.z {
            if direction.y >= 0.0 {
                CubeFace::PositiveY
            } else {
                CubeFace::NegativeY
            }
        } else if direction.z >= 0.0 {
            CubeFace::PositiveZ
        } else {
            CubeFace::NegativeZ
        }
    }
}

/// World direction through the centre of texel `(x, row)` on `face` for a face of side `size`.
pub fn texel_direction(face: CubeFace, x: u32, row: u32, size: u32) -> Vec3 {
    let s = 2.0 * (x as f32 + 0.5) / size as f32 - 1.0;
    let t = 2.0 * (row as f32 + 0.5) / size as f32 - 1.0;
    let basis = face.basis();
    (basis.main_axis + s * basis.s_axis + t * basis.t_axis).normalize()
}

/// Six square faces of side `size` stored as a vertical strip, row `face * size + row`.
#[derive(Debug, Clone, PartialEq)]
pub struct Cubemap {
    size: u32,
    texels: Vec<Vec3>,
}

impl Cubemap {
    pub fn new(size: u32) -> Self {
        Self { size, texels: vec![Vec3::ZERO; strip_len(size)] }
    }

    pub fn uniform(size: u32, radiance: Vec3) -> Self {
        Self { size, texels: vec![radiance; strip_len(size)] }
    }

    pub fn from_texels(size: u32, texels: Vec<Vec3>) -> Result<Self> {
        check_face_size(size)?;
        if texels.len() != strip_len(size) {
            bail!(
                "Cubemap of face size {size} needs {} texels, got {}",
                strip_len(size),
                texels.len()
            );
        }
        Ok(Self { size, texels })
    }

    /// Builds a cubemap from a `width x height` strip of RGBE texels. Height must be `6 * width`.
    pub fn from_rgbe_strip(width: u32, height: u32, texels: &[Rgbe]) -> Result<Self> {
        let size = strip_face_size(width, height)?;
        Self::from_texels(size, rgbe::decode_slice(texels))
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn strip_dimensions(&self) -> Result<(u32, u32)> {
        let height = self
            .size
            .checked_mul(FACE_COUNT as u32)
            .ok_or_else(|| anyhow!("Cubemap strip of face size {} overflows", self.size))?;
        Ok((self.size, height))
    }

    pub fn texels(&self) -> &[Vec3] {
        &self.texels
    }

    pub fn texels_mut(&mut self) -> &mut [Vec3] {
        &mut self.texels
    }

    pub fn texel(&self, face: CubeFace, x: u32, row: u32) -> Vec3 {
        self.texels[self.index(face, x, row)]
    }

    pub fn set_texel(&mut self, face: CubeFace, x: u32, row: u32, value: Vec3) {
        let idx = self.index(face, x, row);
        self.texels[idx] = value;
    }

    fn index(&self, face: CubeFace, x: u32, row: u32) -> usize {
        let size = self.size as usize;
        (face.index() * size + row as usize) * size + x as usize
    }

    /// Nearest-texel radiance along `direction`. Hot path: no allocation, no normalisation needed.
    #[inline]
    pub fn lookup(&self, direction: Vec3) -> Vec3 {
        let face = CubeFace::from_direction(direction);
        let basis = face.basis();
        let ma = direction.dot(basis.main_axis);
        let sc = direction.dot(basis.s_axis);
        let tc = direction.dot(basis.t_axis);
        let x = self.texel_coord(sc / ma);
        let row = self.texel_coord(tc / ma);
        self.texel(face, x, row)
    }

    #[inline]
    fn texel_coord(&self, normalized: f32) -> u32 {
        let max = self.size.saturating_sub(1) as i64;
        // NaN casts to 0.
        let coord = (0.5 * (normalized + 1.0) * self.size as f32).floor() as i64;
        coord.clamp(0, max) as u32
    }

    pub fn to_rgbe(&self) -> Vec<Rgbe> {
        rgbe::encode_slice(&self.texels)
    }

    pub fn is_finite(&self) -> bool {
        self.texels.iter().all(|t| t.is_finite())
    }
}

pub fn strip_face_size(width: u32, height: u32) -> Result<u32> {
    if width == 0 {
        bail!("Cubemap strip is empty ({width}x{height})");
    }
    match width.checked_mul(FACE_COUNT as u32) {
        Some(expected) if expected == height => {}
        Some(expected) => {
            bail!("Cubemap strip must be {width}x{expected} (six stacked faces), got {width}x{height}")
        }
        None => bail!("Cubemap strip {width}x{height} cannot hold six stacked faces"),
    }
    check_face_size(width)?;
    Ok(width)
}

/// Rejects face sides of 0 or above [`MAX_FACE_SIZE`].
pub fn check_face_size(size: u32) -> Result<()> {
    if size == 0 {
        bail!("Cubemap face size must be non-zero");
    }
    if size > MAX_FACE_SIZE {
        bail!("Cubemap face size {size} exceeds the maximum of {MAX_FACE_SIZE}");
    }
    Ok(())
}

fn strip_len(size: u32) -> usize {
    size as usize * size as usize * FACE_COUNT
}
