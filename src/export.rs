//! Map export for debugging and the CLI
//!
//! Renders a generated cache to a PNG (elevation-banded land, depth-shaded
//! water, river strokes, province boundaries) or to a small ASCII preview.
//! Both are diagnostic surfaces over the cache; real rendering lives with
//! the embedder.

use std::path::Path;

use image::{Rgb, RgbImage};

use crate::controls::{Result, MAX_ELEVATION};
use crate::geometry::Vec2;
use crate::pick::PickIndex;
use crate::pipeline::TerrainCache;

/// Convert HSV (hue 0-360, s/v 0-1) to an RGB pixel.
fn hsv_to_rgb(h: f64, s: f64, v: f64) -> Rgb<u8> {
    let c = v * s;
    let hp = (h % 360.0) / 60.0;
    let x = c * (1.0 - (hp % 2.0 - 1.0).abs());
    let (r, g, b) = match hp as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = v - c;
    Rgb([
        ((r + m) * 255.0) as u8,
        ((g + m) * 255.0) as u8,
        ((b + m) * 255.0) as u8,
    ])
}

/// Face color from its elevation band, tinted by the province color
/// class so neighboring provinces read apart at a glance.
fn elevation_color(elevation: i32, color_class: Option<u8>) -> Rgb<u8> {
    // A small hue rotation per class keeps the terrain palette intact
    let tint = color_class.map_or(0.0, |c| c as f64 * 9.0 - 18.0);
    if elevation <= 0 {
        // Water: deeper rings darker
        let depth = (-elevation).min(6) as f64 / 6.0;
        hsv_to_rgb(215.0, 0.65, 0.62 - depth * 0.38)
    } else {
        let t = (elevation - 1) as f64 / (MAX_ELEVATION - 1) as f64;
        if t < 0.35 {
            // Lowland greens
            hsv_to_rgb(105.0 - t * 60.0 + tint, 0.45, 0.55 + t * 0.2)
        } else if t < 0.7 {
            // Upland browns
            hsv_to_rgb(40.0 + tint, 0.5 - (t - 0.35) * 0.8, 0.5 + (t - 0.35) * 0.4)
        } else {
            // Peaks fade toward white
            let w = (t - 0.7) / 0.3;
            hsv_to_rgb(40.0 + tint, 0.15 * (1.0 - w), 0.7 + 0.3 * w)
        }
    }
}

const RIVER_COLOR: Rgb<u8> = Rgb([58, 110, 196]);
const BOUNDARY_COLOR: Rgb<u8> = Rgb([40, 32, 28]);

/// Bresenham line draw, clipped to the image.
fn draw_line(image: &mut RgbImage, a: Vec2, b: Vec2, color: Rgb<u8>) {
    let (w, h) = (image.width() as i64, image.height() as i64);
    let mut x0 = a.x.round() as i64;
    let mut y0 = a.y.round() as i64;
    let x1 = b.x.round() as i64;
    let y1 = b.y.round() as i64;

    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if (0..w).contains(&x0) && (0..h).contains(&y0) {
            image.put_pixel(x0 as u32, y0 as u32, color);
        }
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

/// Rasterize a cache into an RGB image, one pixel per world unit.
pub fn render_map_image(cache: &TerrainCache) -> RgbImage {
    let width = cache.config.width;
    let height = cache.config.height;
    let index = PickIndex::from_cache(cache);
    let color_classes = cache.provinces.color_classes();
    let mut image = RgbImage::new(width, height);

    for y in 0..height {
        for x in 0..width {
            let p = Vec2::new(x as f64 + 0.5, y as f64 + 0.5);
            let color = match index.pick_face(p) {
                Some(face) => {
                    let province = cache.provinces.province_by_face.get(face.idx());
                    let class = province
                        .filter(|p| !p.is_none())
                        .map(|p| color_classes[p.idx()]);
                    elevation_color(cache.elevation.face_elevation[face.idx()], class)
                }
                None => elevation_color(-6, None),
            };
            image.put_pixel(x, y, color);
        }
    }

    // River strokes along traced edges, trunks and branches alike
    for trace in &cache.rivers.traces {
        for &e in &trace.edges {
            let edge = cache.mesh.edge(e);
            let a = cache.mesh.vertex(edge.vertices[0]).point;
            let b = cache.mesh.vertex(edge.vertices[1]).point;
            draw_line(&mut image, a, edge.midpoint, RIVER_COLOR);
            draw_line(&mut image, edge.midpoint, b, RIVER_COLOR);
        }
    }

    // Province boundaries over everything else. Shore edges are skipped,
    // the coastline already reads from the water shading.
    for outer in &cache.provinces.outer_edges {
        if outer.provinces[0].is_none() || outer.provinces[1].is_none() {
            continue;
        }
        let edge = cache.mesh.edge(outer.edge);
        let a = cache.mesh.vertex(edge.vertices[0]).point;
        let b = cache.mesh.vertex(edge.vertices[1]).point;
        draw_line(&mut image, a, edge.midpoint, BOUNDARY_COLOR);
        draw_line(&mut image, edge.midpoint, b, BOUNDARY_COLOR);
    }

    image
}

/// Render and write a PNG.
pub fn render_map_png(cache: &TerrainCache, path: &Path) -> Result<()> {
    let image = render_map_image(cache);
    image.save(path)?;
    Ok(())
}

/// Rasterize the raw elevation field to grayscale, for tooling that
/// wants data rather than a picture. Land maps to 96..=255, water to
/// 0..=48, so sea level is an unambiguous step.
pub fn render_elevation_data(cache: &TerrainCache) -> RgbImage {
    let width = cache.config.width;
    let height = cache.config.height;
    let index = PickIndex::from_cache(cache);
    let mut image = RgbImage::new(width, height);

    for y in 0..height {
        for x in 0..width {
            let p = Vec2::new(x as f64 + 0.5, y as f64 + 0.5);
            let value = match index.pick_face(p) {
                Some(face) => {
                    let e = cache.elevation.face_elevation[face.idx()];
                    if e > 0 {
                        let t = (e - 1) as f64 / (MAX_ELEVATION - 1) as f64;
                        96 + (t * 159.0).round() as u8
                    } else {
                        let t = (-e).min(6) as f64 / 6.0;
                        48 - (t * 48.0).round() as u8
                    }
                }
                None => 0,
            };
            image.put_pixel(x, y, Rgb([value, value, value]));
        }
    }

    image
}

/// Render and write the grayscale data image.
pub fn render_elevation_data_png(cache: &TerrainCache, path: &Path) -> Result<()> {
    let image = render_elevation_data(cache);
    image.save(path)?;
    Ok(())
}

/// Character for one sampled elevation.
fn elevation_char(elevation: i32) -> char {
    match elevation {
        e if e <= -3 => '~',
        e if e <= 0 => '-',
        e if e <= 4 => '.',
        e if e <= 10 => ':',
        e if e <= 18 => '=',
        e if e <= 26 => '^',
        _ => 'A',
    }
}

/// Small terminal preview of the map, `columns` characters wide.
pub fn ascii_preview(cache: &TerrainCache, columns: usize) -> String {
    let columns = columns.max(8);
    let aspect = cache.config.height as f64 / cache.config.width as f64;
    // Terminal cells are roughly twice as tall as wide
    let rows = ((columns as f64 * aspect) / 2.0).round().max(4.0) as usize;
    let index = PickIndex::from_cache(cache);

    let mut out = String::with_capacity((columns + 1) * rows);
    for row in 0..rows {
        for col in 0..columns {
            let p = Vec2::new(
                (col as f64 + 0.5) / columns as f64 * cache.config.width as f64,
                (row as f64 + 0.5) / rows as f64 * cache.config.height as f64,
            );
            let c = match index.pick_face(p) {
                Some(face) => elevation_char(cache.elevation.face_elevation[face.idx()]),
                None => ' ',
            };
            out.push(c);
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controls::{Config, Controls};
    use crate::pipeline;

    #[test]
    fn test_render_produces_full_size_image() {
        let config = Config::new(256, 256).unwrap();
        let controls = Controls {
            seed: 1337,
            spacing: 32.0,
            ..Controls::default()
        };
        let cache = pipeline::build(config, &controls, None).unwrap();
        let image = render_map_image(&cache);
        assert_eq!(image.width(), 256);
        assert_eq!(image.height(), 256);
    }

    #[test]
    fn test_data_export_separates_land_and_water() {
        let config = Config::new(256, 256).unwrap();
        let controls = Controls {
            seed: 1337,
            spacing: 32.0,
            ..Controls::default()
        };
        let cache = pipeline::build(config, &controls, None).unwrap();
        let image = render_elevation_data(&cache);
        // Sample every face site: land must sit above the sea-level step
        for (idx, face) in cache.mesh.faces.iter().enumerate() {
            let px = image.get_pixel(
                (face.point.x as u32).min(255),
                (face.point.y as u32).min(255),
            );
            if cache.water.is_land[idx] {
                assert!(px[0] >= 96, "land face {idx} rendered below the step");
            }
        }
    }

    #[test]
    fn test_ascii_preview_shape() {
        let config = Config::new(256, 256).unwrap();
        let controls = Controls {
            seed: 1337,
            spacing: 32.0,
            ..Controls::default()
        };
        let cache = pipeline::build(config, &controls, None).unwrap();
        let preview = ascii_preview(&cache, 40);
        let lines: Vec<&str> = preview.lines().collect();
        assert!(!lines.is_empty());
        for line in &lines {
            assert_eq!(line.chars().count(), 40);
        }
    }
}
