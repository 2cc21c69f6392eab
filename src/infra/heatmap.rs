// ============================================================
// Layer 6 — Attention Heat Maps
// ============================================================
// Renders attention maps as grayscale PNGs: x = key position,
// y = query position, brighter = more weight. Each matrix cell
// becomes a `cell_size` square so a 32×32 map is readable.
//
// Intensities are scaled by the map's own maximum weight, so a
// head that spreads its attention thinly is still visible.

use anyhow::{Context, Result};
use image::{GrayImage, Luma};
use std::{
    fs,
    path::PathBuf,
};

use crate::domain::attention_map::AttentionMap;

const CELL_SIZE: u32 = 8;

pub struct HeatmapWriter {
    dir:       PathBuf,
}

impl HeatmapWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create heat-map directory '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    /// `attention_map_L{layer}_H{head}.png`, 1-based to match the log output.
    pub fn file_name(map: &AttentionMap) -> String {
        format!("attention_map_{}.png", map.label())
    }

    pub fn render(&self, map: &AttentionMap) -> GrayImage {
        let n = map.seq_len() as u32;
        let cell = CELL_SIZE;
        let peak = map.max_weight();
        let scale = if peak > 0.0 { 255.0 / peak } else { 0.0 };

        GrayImage::from_fn(n * cell, n * cell, |x, y| {
            let (key, query) = ((x / cell) as usize, (y / cell) as usize);
            let w = map.weights[query].get(key).copied().unwrap_or(0.0);
            Luma([(w * scale).round().clamp(0.0, 255.0) as u8])
        })
    }

    pub fn write(&self, map: &AttentionMap) -> Result<PathBuf> {
        let path = self.dir.join(Self::file_name(map));
        self.render(map)
            .save(&path)
            .with_context(|| format!("Cannot write heat map '{}'", path.display()))?;
        Ok(path)
    }

    pub fn write_all(&self, maps: &[AttentionMap]) -> Result<Vec<PathBuf>> {
        let paths = maps.iter().map(|m| self.write(m)).collect::<Result<Vec<_>>>()?;
        tracing::info!("Wrote {} attention heat maps to '{}'", paths.len(), self.dir.display());
        Ok(paths)
    }

    /// Dump every map to `attention_maps.json`.
    pub fn write_json(&self, maps: &[AttentionMap]) -> Result<PathBuf> {
        let path = self.dir.join("attention_maps.json");
        fs::write(&path, serde_json::to_string_pretty(maps)?)
            .with_context(|| format!("Cannot write '{}'", path.display()))?;
        Ok(path)
    }
}
