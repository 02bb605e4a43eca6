use std::str::FromStr;

use image::Rgb;

use crate::error::{PipelineError, PipelineResult};

/// Largest colour table the GIF container can declare
pub const MAX_PALETTE_SIZE: usize = 256;

/// Fixed, ordered output palette shared read-only by every frame of a batch.
///
/// Order matters: nearest-colour ties resolve to the lowest index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    colors: Vec<Rgb<u8>>,
}

impl Palette {
    pub fn new(colors: Vec<Rgb<u8>>) -> PipelineResult<Self> {
        if colors.is_empty() {
            return Err(PipelineError::InvalidPalette(
                "palette must contain at least one color".to_string(),
            ));
        }
        if colors.len() > MAX_PALETTE_SIZE {
            return Err(PipelineError::InvalidPalette(format!(
                "palette has {} colors, maximum is {}",
                colors.len(),
                MAX_PALETTE_SIZE
            )));
        }
        Ok(Self { colors })
    }

    /// The eight corners of the RGB cube.
    pub fn rgb8() -> Self {
        Self::from_tuples(&[
            (0x00, 0x00, 0x00),
            (0x00, 0x00, 0xff),
            (0x00, 0xff, 0x00),
            (0x00, 0xff, 0xff),
            (0xff, 0x00, 0x00),
            (0xff, 0x00, 0xff),
            (0xff, 0xff, 0x00),
            (0xff, 0xff, 0xff),
        ])
    }

    pub fn black_white() -> Self {
        Self::from_tuples(&[(0, 0, 0), (255, 255, 255)])
    }

    pub fn gray4() -> Self {
        Self::from_tuples(&[(0, 0, 0), (85, 85, 85), (170, 170, 170), (255, 255, 255)])
    }

    /// 6x6x6 web-safe colour cube (216 entries)
    pub fn web216() -> Self {
        let steps = [0x00u8, 0x33, 0x66, 0x99, 0xcc, 0xff];
        let mut colors = Vec::with_capacity(216);
        for &r in &steps {
            for &g in &steps {
                for &b in &steps {
                    colors.push(Rgb([r, g, b]));
                }
            }
        }
        Self { colors }
    }

    fn from_tuples(colors: &[(u8, u8, u8)]) -> Self {
        Self {
            colors: colors.iter().map(|&(r, g, b)| Rgb([r, g, b])).collect(),
        }
    }

    /// Parse a comma-separated list of `#RRGGBB` (or `#RGB`) colours.
    pub fn from_hex_list(list: &str) -> PipelineResult<Self> {
        let colors = list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(parse_hex_color)
            .collect::<PipelineResult<Vec<_>>>()?;
        Self::new(colors)
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn colors(&self) -> &[Rgb<u8>] {
        &self.colors
    }

    pub fn get(&self, index: u8) -> Option<Rgb<u8>> {
        self.colors.get(index as usize).copied()
    }

    /// Index of the entry closest to `(r, g, b)` by squared RGB distance.
    ///
    /// Strict comparison keeps the first entry on ties.
    pub fn nearest_index(&self, r: f32, g: f32, b: f32) -> u8 {
        let mut best_index = 0usize;
        let mut best_distance = f32::MAX;

        for (i, color) in self.colors.iter().enumerate() {
            let dr = r - color[0] as f32;
            let dg = g - color[1] as f32;
            let db = b - color[2] as f32;
            let distance = dr * dr + dg * dg + db * db;

            if distance < best_distance {
                best_distance = distance;
                best_index = i;
            }
        }

        best_index as u8
    }

    /// Flat `[r, g, b, r, g, b, ...]` colour table for the encoder
    pub fn to_rgb_bytes(&self) -> Vec<u8> {
        self.colors.iter().flat_map(|c| c.0).collect()
    }

    /// Rebuild a palette from a flat RGB colour table.
    pub fn from_rgb_bytes(bytes: &[u8]) -> PipelineResult<Self> {
        if bytes.len() % 3 != 0 {
            return Err(PipelineError::InvalidPalette(format!(
                "color table length {} is not a multiple of 3",
                bytes.len()
            )));
        }
        Self::new(bytes.chunks_exact(3).map(|c| Rgb([c[0], c[1], c[2]])).collect())
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::rgb8()
    }
}

/// Named palette presets selectable from the command line or config file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PalettePreset {
    Rgb8,
    BlackWhite,
    Gray4,
    Web216,
}

impl PalettePreset {
    pub fn build(self) -> Palette {
        match self {
            PalettePreset::Rgb8 => Palette::rgb8(),
            PalettePreset::BlackWhite => Palette::black_white(),
            PalettePreset::Gray4 => Palette::gray4(),
            PalettePreset::Web216 => Palette::web216(),
        }
    }
}

impl FromStr for PalettePreset {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "rgb8" | "rgb" => Ok(PalettePreset::Rgb8),
            "bw" | "blackwhite" | "black-white" => Ok(PalettePreset::BlackWhite),
            "gray4" | "grey4" => Ok(PalettePreset::Gray4),
            "web216" | "websafe" => Ok(PalettePreset::Web216),
            other => Err(PipelineError::InvalidPalette(format!(
                "unknown palette preset '{}'. Valid presets: rgb8, bw, gray4, web216",
                other
            ))),
        }
    }
}

fn parse_hex_color(color: &str) -> PipelineResult<Rgb<u8>> {
    let invalid = || {
        PipelineError::InvalidPalette(format!(
            "invalid color '{}'. Expected hex format like #RRGGBB",
            color
        ))
    };

    let hex = color.strip_prefix('#').ok_or_else(invalid)?;
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }

    let channel = |s: &str| u8::from_str_radix(s, 16).map_err(|_| invalid());
    match hex.len() {
        6 => Ok(Rgb([
            channel(&hex[0..2])?,
            channel(&hex[2..4])?,
            channel(&hex[4..6])?,
        ])),
        3 => {
            // #RGB expands each nibble: #f80 == #ff8800
            let r = channel(&hex[0..1])?;
            let g = channel(&hex[1..2])?;
            let b = channel(&hex[2..3])?;
            Ok(Rgb([r * 17, g * 17, b * 17]))
        }
        _ => Err(invalid()),
    }
}
