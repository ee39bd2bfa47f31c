use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use ab_glyph::{point, Font, FontVec, Glyph, PxScale, ScaleFont};
use anyhow::{bail, Context, Result};
use log::debug;
use motormap_core::{Scene, TrialScene};
use motormap_timing::Timer;
use tiny_skia::{
    Color, FillRule, Paint, PathBuilder, Pixmap, PremultipliedColorU8, Rect, Transform,
};

pub const BLACK: [u8; 4] = [0, 0, 0, 255];
pub const WHITE: [u8; 4] = [255, 255, 255, 255];
pub const MIDGREY: [u8; 4] = [128, 128, 128, 255];
pub const TRANSLUCENT_RED: [u8; 4] = [255, 0, 0, 96];

fn color(c: [u8; 4]) -> Color {
    Color::from_rgba8(c[0], c[1], c[2], c[3])
}

pub fn load_font(path: &Path) -> Result<FontVec> {
    let bytes =
        std::fs::read(path).with_context(|| format!("reading font {}", path.display()))?;
    FontVec::try_from_vec(bytes).with_context(|| format!("parsing font {}", path.display()))
}

/// Rasterizes one line of text into a tight, transparent pixmap.
/// Returns `None` when nothing in the line has an outline.
pub fn render_text_pixmap<F: Font>(
    text: &str,
    font_size: f32,
    font: &F,
    color: Color,
) -> Option<Pixmap> {
    let scale = PxScale::from(font_size);
    let sf = font.as_scaled(scale);

    // baseline at ascent
    let mut pen_x = 0.0f32;
    let mut glyphs = Vec::<Glyph>::new();
    for ch in text.chars() {
        let id = font.glyph_id(ch);
        if let Some(prev) = glyphs.last() {
            pen_x += sf.kern(prev.id, id);
        }
        glyphs.push(Glyph {
            id,
            scale,
            position: point(pen_x, sf.ascent()),
        });
        pen_x += sf.h_advance(id);
    }

    let outlines: Vec<_> = glyphs
        .into_iter()
        .filter_map(|g| font.outline_glyph(g))
        .collect();
    let (mut min_x, mut min_y) = (f32::INFINITY, f32::INFINITY);
    let (mut max_x, mut max_y) = (f32::NEG_INFINITY, f32::NEG_INFINITY);
    for out in &outlines {
        let b = out.px_bounds();
        min_x = min_x.min(b.min.x);
        min_y = min_y.min(b.min.y);
        max_x = max_x.max(b.max.x);
        max_y = max_y.max(b.max.y);
    }
    if outlines.is_empty() {
        return None;
    }

    let w = (max_x.ceil() - min_x.floor()).max(1.0) as u32;
    let h = (max_y.ceil() - min_y.floor()).max(1.0) as u32;
    let mut pm = Pixmap::new(w, h)?;

    let stride = pm.width() as usize;
    let dst = pm.pixels_mut();
    let cu = [
        (color.red() * 255.0) as u8,
        (color.green() * 255.0) as u8,
        (color.blue() * 255.0) as u8,
        (color.alpha() * 255.0) as u8,
    ];

    for out in &outlines {
        let b = out.px_bounds();
        out.draw(|x, y, cov| {
            if cov <= f32::EPSILON {
                return;
            }
            let ix = (x as f32 + b.min.x - min_x).floor() as i32;
            let iy = (y as f32 + b.min.y - min_y).floor() as i32;
            if ix < 0 || iy < 0 || ix >= w as i32 || iy >= h as i32 {
                return;
            }
            let i = iy as usize * stride + ix as usize;

            let a = (cov * cu[3] as f32 / 255.0).clamp(0.0, 1.0);
            let sa = (a * 255.0) as u8;
            let src = [
                (cu[0] as f32 * a) as u8,
                (cu[1] as f32 * a) as u8,
                (cu[2] as f32 * a) as u8,
            ];
            // over, premultiplied: out = src + bg * (1 - src.a)
            let bg = dst[i];
            let inv = 1.0 - sa as f32 / 255.0;
            let blended = PremultipliedColorU8::from_rgba(
                src[0].saturating_add((bg.red() as f32 * inv) as u8),
                src[1].saturating_add((bg.green() as f32 * inv) as u8),
                src[2].saturating_add((bg.blue() as f32 * inv) as u8),
                sa.saturating_add((bg.alpha() as f32 * inv) as u8),
            );
            if let Some(px) = blended {
                dst[i] = px;
            }
        });
    }

    Some(pm)
}

/// A filled circle of `diameter` px, centred in its pixmap.
pub fn disc_pixmap(diameter: f32, fill: [u8; 4]) -> Option<Pixmap> {
    let size = diameter.ceil() as u32 + 2;
    let mut pm = Pixmap::new(size, size)?;
    let c = size as f32 / 2.0;
    let mut paint = Paint::default();
    paint.anti_alias = true;
    paint.set_color(color(fill));
    let path = PathBuilder::from_circle(c, c, diameter / 2.0)?;
    pm.fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
    Some(pm)
}

/// Fixation cross of `size` px arms and `thickness` px bars, rotated 45°.
pub fn fixation_pixmap(size: f32, thickness: f32) -> Option<Pixmap> {
    let extent = (size * std::f32::consts::SQRT_2).ceil() as u32 + 2;
    let mut pm = Pixmap::new(extent, extent)?;
    let c = extent as f32 / 2.0;
    let mut paint = Paint::default();
    paint.anti_alias = true;
    paint.set_color(color(WHITE));

    let rotate = Transform::from_rotate_at(45.0, c, c);
    let h = Rect::from_xywh(c - size / 2.0, c - thickness / 2.0, size, thickness)?;
    let v = Rect::from_xywh(c - thickness / 2.0, c - size / 2.0, thickness, size)?;
    pm.fill_rect(h, &paint, rotate, None);
    pm.fill_rect(v, &paint, rotate, None);
    Some(pm)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ShapeKey {
    Fixation { size: u32, thickness: u32 },
    Disc { diameter: u32, fill: [u8; 4] },
}

struct TextCache {
    font: FontVec,
    size_px: f32,
    line_height: f32,
    lines: HashMap<String, Option<Arc<Pixmap>>>,
}

impl TextCache {
    fn new(font: FontVec, size_px: f32) -> Self {
        let sf = font.as_scaled(PxScale::from(size_px));
        let line_height = sf.ascent() - sf.descent() + sf.line_gap();
        Self {
            font,
            size_px,
            line_height,
            lines: HashMap::new(),
        }
    }

    fn get_or_render(&mut self, line: &str) -> Option<Arc<Pixmap>> {
        if let Some(pm) = self.lines.get(line) {
            return pm.clone();
        }
        let pm = render_text_pixmap(line, self.size_px, &self.font, color(WHITE)).map(Arc::new);
        self.lines.insert(line.to_string(), pm.clone());
        pm
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FrameStats {
    pub clear: Duration,
    pub draw: Duration,
    pub copy: Duration,
    pub total: Duration,
}

/// Draws [`Scene`]s into an RGBA8 frame buffer with tiny-skia.
pub struct SkiaRenderer {
    canvas: Pixmap,
    text: Option<TextCache>,
    shapes: HashMap<ShapeKey, Arc<Pixmap>>,
}

impl SkiaRenderer {
    /// Without a font, message screens render as plain black frames.
    pub fn new(width: u32, height: u32, font: Option<FontVec>, text_size_px: f32) -> Result<Self> {
        let canvas = Pixmap::new(width, height)
            .with_context(|| format!("cannot allocate a {width}x{height} canvas"))?;
        if font.is_none() {
            debug!("no font configured, text will not be drawn");
        }
        Ok(Self {
            canvas,
            text: font.map(|f| TextCache::new(f, text_size_px)),
            shapes: HashMap::new(),
        })
    }

    /// Draws `scene` and copies it into `frame_buffer`, which must hold
    /// exactly one RGBA8 pixel per canvas pixel.
    pub fn render<T: Timer>(
        &mut self,
        scene: &Scene,
        frame_buffer: &mut [u8],
        timer: &mut T,
    ) -> Result<FrameStats> {
        if frame_buffer.len() != self.canvas.data().len() {
            bail!(
                "frame buffer holds {} bytes, canvas needs {}",
                frame_buffer.len(),
                self.canvas.data().len()
            );
        }

        let t = timer.now();
        let background = match scene {
            Scene::Trial(_) => MIDGREY,
            Scene::Blank | Scene::Message { .. } => BLACK,
        };
        self.canvas.fill(color(background));
        let clear = timer.elapsed(t);

        let t = timer.now();
        match scene {
            Scene::Blank => {}
            Scene::Trial(trial) => self.draw_trial(trial),
            Scene::Message {
                text,
                anchor,
                footer,
            } => {
                self.draw_text(text, *anchor);
                if let Some((footer, at)) = footer {
                    self.draw_text(footer, *at);
                }
            }
        }
        let draw = timer.elapsed(t);

        let t = timer.now();
        frame_buffer.copy_from_slice(self.canvas.data());
        let copy = timer.elapsed(t);

        let total = clear + draw + copy;
        timer.record_frame(total);
        Ok(FrameStats {
            clear,
            draw,
            copy,
            total,
        })
    }

    fn shape(&mut self, key: ShapeKey) -> Option<Arc<Pixmap>> {
        if let Some(pm) = self.shapes.get(&key) {
            return Some(Arc::clone(pm));
        }
        let pm = match key {
            ShapeKey::Fixation { size, thickness } => {
                fixation_pixmap(f32::from_bits(size), f32::from_bits(thickness))
            }
            ShapeKey::Disc { diameter, fill } => disc_pixmap(f32::from_bits(diameter), fill),
        };
        let pm = Arc::new(pm?);
        self.shapes.insert(key, Arc::clone(&pm));
        Some(pm)
    }

    fn draw_trial(&mut self, trial: &TrialScene) {
        let fixation = ShapeKey::Fixation {
            size: trial.fixation_size.to_bits(),
            thickness: trial.fixation_thickness.to_bits(),
        };
        if let Some(pm) = self.shape(fixation) {
            blit(&mut self.canvas, &pm, trial.center);
        }
        if let Some(at) = trial.target {
            let target = ShapeKey::Disc {
                diameter: trial.target_size.to_bits(),
                fill: WHITE,
            };
            if let Some(pm) = self.shape(target) {
                blit(&mut self.canvas, &pm, at);
            }
        }
        let cursor = ShapeKey::Disc {
            diameter: trial.cursor_size.to_bits(),
            fill: TRANSLUCENT_RED,
        };
        if let Some(pm) = self.shape(cursor) {
            blit(&mut self.canvas, &pm, trial.cursor);
        }
    }

    /// Lines are centred horizontally on `anchor`, the block vertically.
    fn draw_text(&mut self, text: &str, anchor: (f32, f32)) {
        let Some(cache) = self.text.as_mut() else {
            return;
        };
        let lines: Vec<&str> = text.lines().collect();
        let line_height = cache.line_height;
        let top = anchor.1 - line_height * lines.len() as f32 / 2.0;
        for (i, line) in lines.iter().enumerate() {
            if let Some(pm) = cache.get_or_render(line) {
                let y = top + line_height * (i as f32 + 0.5);
                blit(&mut self.canvas, &pm, (anchor.0, y));
            }
        }
    }
}

/// Composites `src` centred on `pos` over `canvas`, clipping at the edges.
pub fn blit(canvas: &mut Pixmap, src: &Pixmap, pos: (f32, f32)) {
    let (w, h) = (src.width() as i32, src.height() as i32);
    let (cw, ch) = (canvas.width() as i32, canvas.height() as i32);
    let x0 = (pos.0 - w as f32 * 0.5).round() as i32;
    let y0 = (pos.1 - h as f32 * 0.5).round() as i32;

    let (dx0, dy0) = (x0.max(0), y0.max(0));
    let (dx1, dy1) = ((x0 + w).min(cw), (y0 + h).min(ch));
    if dx1 <= dx0 || dy1 <= dy0 {
        return;
    }

    let src_px = src.pixels();
    let dst_px = canvas.pixels_mut();
    for y in dy0..dy1 {
        let src_row = ((y - y0) * w) as usize;
        let dst_row = (y * cw) as usize;
        for x in dx0..dx1 {
            let s = src_px[src_row + (x - x0) as usize];
            let sa = s.alpha() as u32;
            if sa == 0 {
                continue;
            }
            let d = &mut dst_px[dst_row + x as usize];
            if sa == 255 {
                *d = s;
                continue;
            }
            let inv = 255 - sa;
            let mix = |s: u8, d: u8| (s as u32 + (d as u32 * inv + 127) / 255).min(255) as u8;
            let a = mix(s.alpha(), d.alpha());
            let blended = PremultipliedColorU8::from_rgba(
                mix(s.red(), d.red()).min(a),
                mix(s.green(), d.green()).min(a),
                mix(s.blue(), d.blue()).min(a),
                a,
            );
            if let Some(px) = blended {
                *d = px;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use motormap_timing::ManualTimer;

    const W: u32 = 200;
    const H: u32 = 120;

    fn pixel(fb: &[u8], x: u32, y: u32) -> [u8; 4] {
        let i = ((y * W + x) * 4) as usize;
        [fb[i], fb[i + 1], fb[i + 2], fb[i + 3]]
    }

    fn trial(target: Option<(f32, f32)>, cursor: (f32, f32)) -> Scene {
        Scene::Trial(TrialScene {
            center: (100.0, 60.0),
            fixation_size: 20.0,
            fixation_thickness: 6.0,
            cursor,
            cursor_size: 30.0,
            target,
            target_size: 12.0,
        })
    }

    fn draw(scene: &Scene) -> Vec<u8> {
        let mut r = SkiaRenderer::new(W, H, None, 24.0).unwrap();
        let mut fb = vec![0u8; (W * H * 4) as usize];
        let mut timer = ManualTimer::new();
        r.render(scene, &mut fb, &mut timer).unwrap();
        fb
    }

    #[test]
    fn trial_background_is_mid_grey() {
        let fb = draw(&trial(None, (100.0, 60.0)));
        assert_eq!(pixel(&fb, 2, 2), MIDGREY);
        assert_eq!(pixel(&fb, W - 1, H - 1), MIDGREY);
    }

    #[test]
    fn fixation_cross_is_rotated() {
        // cursor parked away from the cross
        let fb = draw(&trial(None, (20.0, 20.0)));
        assert_eq!(pixel(&fb, 100, 60), WHITE);
        // on a diagonal arm
        assert_eq!(pixel(&fb, 104, 64), WHITE);
        // where an upright cross would have its horizontal arm
        assert_eq!(pixel(&fb, 109, 60), MIDGREY);
    }

    #[test]
    fn target_only_drawn_when_present() {
        let without = draw(&trial(None, (20.0, 20.0)));
        assert_eq!(pixel(&without, 160, 60), MIDGREY);
        let with = draw(&trial(Some((160.0, 60.0)), (20.0, 20.0)));
        assert_eq!(pixel(&with, 160, 60), WHITE);
    }

    #[test]
    fn cursor_tints_what_is_underneath() {
        let fb = draw(&trial(None, (40.0, 90.0)));
        let [r, g, b, a] = pixel(&fb, 40, 90);
        assert_eq!(a, 255);
        assert!((170..=182).contains(&r), "red {r}");
        assert!((74..=86).contains(&g), "green {g}");
        assert_eq!(g, b);
    }

    #[test]
    fn messages_without_a_font_are_black() {
        let scene = Scene::message("Too slow!", (100.0, 60.0)).with_footer("Press", (100.0, 90.0));
        let fb = draw(&scene);
        assert!(fb.chunks(4).all(|p| p == BLACK));
        assert!(draw(&Scene::Blank).chunks(4).all(|p| p == BLACK));
    }

    #[test]
    fn mismatched_frame_buffer_is_an_error() {
        let mut r = SkiaRenderer::new(W, H, None, 24.0).unwrap();
        let mut fb = vec![0u8; 16];
        assert!(r.render(&Scene::Blank, &mut fb, &mut ManualTimer::new()).is_err());
        let mut fb = vec![0u8; (W * H * 4) as usize];
        r.render(&Scene::Blank, &mut fb, &mut ManualTimer::new()).unwrap();
    }

    #[test]
    fn blit_clips_at_the_edges() {
        let mut canvas = Pixmap::new(10, 10).unwrap();
        canvas.fill(color(BLACK));
        let disc = disc_pixmap(8.0, WHITE).unwrap();
        blit(&mut canvas, &disc, (0.0, 0.0));
        blit(&mut canvas, &disc, (9.0, 9.0));
        blit(&mut canvas, &disc, (-50.0, 4.0));
        let px = canvas.pixel(0, 0).unwrap();
        assert_eq!(px.red(), 255);
        assert_eq!(canvas.pixel(5, 0).unwrap().red(), 0);
    }
}
