//! Procedural 2D concept renderer
//!
//! CPU-only fallback generator: parses the prompt for shape, color, size
//! and rarity cues and renders a centered object on a studio-style
//! background. Unrecognized prompts get a default blob shape, so the
//! renderer is total over non-empty prompts.

use super::{GeneratedImage, ImageGenerator, ProviderError};
use image::{DynamicImage, Rgba, RgbaImage};
use std::io::Cursor;
use uuid::Uuid;

const CANVAS: u32 = 512;

type Color = [u8; 3];

/// Object silhouettes the renderer knows how to draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Triangle,
    Star,
    Diamond,
    Hexagon,
    Box,
    Round,
    Ring,
    Cross,
    Sword,
    Bottle,
    Shield,
    Blob,
}

/// Canvas proportions of the object's bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aspect {
    Square,
    Tall,
    Wide,
}

/// Everything the rasterizer needs, extracted from the prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderPlan {
    pub shape: Shape,
    pub aspect: Aspect,
    pub primary: Color,
    pub secondary: Color,
    pub size_factor: f32,
    pub glow: bool,
}

const SHAPE_KEYWORDS: &[(&str, Shape, Aspect)] = &[
    ("triangle", Shape::Triangle, Aspect::Square),
    ("pyramid", Shape::Triangle, Aspect::Square),
    ("arrowhead", Shape::Triangle, Aspect::Square),
    ("star", Shape::Star, Aspect::Square),
    ("sparkle", Shape::Star, Aspect::Square),
    ("diamond", Shape::Diamond, Aspect::Square),
    ("rhombus", Shape::Diamond, Aspect::Square),
    ("crystal", Shape::Diamond, Aspect::Tall),
    ("gem", Shape::Diamond, Aspect::Square),
    ("jewel", Shape::Diamond, Aspect::Square),
    ("hexagon", Shape::Hexagon, Aspect::Square),
    ("honeycomb", Shape::Hexagon, Aspect::Square),
    ("sword", Shape::Sword, Aspect::Tall),
    ("blade", Shape::Sword, Aspect::Tall),
    ("knife", Shape::Sword, Aspect::Tall),
    ("dagger", Shape::Sword, Aspect::Tall),
    ("shield", Shape::Shield, Aspect::Tall),
    ("crate", Shape::Box, Aspect::Square),
    ("box", Shape::Box, Aspect::Square),
    ("cube", Shape::Box, Aspect::Square),
    ("chest", Shape::Box, Aspect::Square),
    ("block", Shape::Box, Aspect::Square),
    ("door", Shape::Box, Aspect::Tall),
    ("coin", Shape::Round, Aspect::Square),
    ("orb", Shape::Round, Aspect::Square),
    ("ball", Shape::Round, Aspect::Square),
    ("sphere", Shape::Round, Aspect::Square),
    ("pearl", Shape::Round, Aspect::Square),
    ("circle", Shape::Round, Aspect::Square),
    ("ring", Shape::Ring, Aspect::Square),
    ("cross", Shape::Cross, Aspect::Square),
    ("plus", Shape::Cross, Aspect::Square),
    ("potion", Shape::Bottle, Aspect::Tall),
    ("bottle", Shape::Bottle, Aspect::Tall),
    ("flask", Shape::Bottle, Aspect::Tall),
    ("vial", Shape::Bottle, Aspect::Tall),
    ("plate", Shape::Round, Aspect::Wide),
    ("table", Shape::Box, Aspect::Wide),
    ("platform", Shape::Box, Aspect::Wide),
];

const COLOR_KEYWORDS: &[(&str, Color)] = &[
    ("red", [220, 50, 50]),
    ("blue", [50, 100, 220]),
    ("green", [50, 180, 50]),
    ("yellow", [220, 180, 50]),
    ("purple", [150, 50, 220]),
    ("orange", [255, 140, 50]),
    ("pink", [255, 150, 200]),
    ("brown", [150, 100, 50]),
    ("black", [40, 40, 40]),
    ("white", [240, 240, 240]),
    ("gray", [150, 150, 150]),
    ("grey", [150, 150, 150]),
    ("silver", [190, 190, 200]),
    ("golden", [255, 200, 50]),
    ("gold", [255, 200, 50]),
    ("cyan", [50, 200, 200]),
    ("magenta", [220, 50, 150]),
];

const SIZE_KEYWORDS: &[(&str, f32)] = &[
    ("tiny", 0.4),
    ("small", 0.5),
    ("compact", 0.5),
    ("medium", 0.6),
    ("large", 0.7),
    ("big", 0.7),
    ("huge", 0.8),
    ("massive", 0.85),
    ("giant", 0.85),
];

// Rarity tiers override colors and may add a glow halo
const RARITY_KEYWORDS: &[(&str, Color, Color, bool)] = &[
    ("common", [150, 150, 150], [100, 100, 120], false),
    ("uncommon", [50, 150, 50], [30, 100, 30], false),
    ("rare", [50, 100, 220], [30, 70, 150], true),
    ("epic", [150, 50, 220], [100, 30, 150], true),
    ("legendary", [255, 200, 50], [200, 150, 30], true),
    ("mythic", [255, 100, 50], [200, 70, 30], true),
];

const GLOW_KEYWORDS: &[&str] = &["glowing", "glow", "shine", "shimmer", "radiant"];

/// Parse a free-text prompt into a render plan.
pub fn parse_prompt(prompt: &str) -> RenderPlan {
    let lower = prompt.to_lowercase();

    let mut plan = RenderPlan {
        shape: Shape::Blob,
        aspect: Aspect::Square,
        primary: [120, 120, 140],
        secondary: [80, 80, 100],
        size_factor: 0.6,
        glow: false,
    };

    for (keyword, shape, aspect) in SHAPE_KEYWORDS {
        if lower.contains(keyword) {
            plan.shape = *shape;
            plan.aspect = *aspect;
            break;
        }
    }

    let found: Vec<Color> = COLOR_KEYWORDS
        .iter()
        .filter(|(keyword, _)| lower.contains(keyword))
        .map(|(_, color)| *color)
        .collect();
    if let Some(first) = found.first() {
        plan.primary = *first;
        plan.secondary = match found.get(1) {
            Some(second) => *second,
            // Darker version of the primary
            None => first.map(|c| (c as f32 * 0.7) as u8),
        };
    }

    for (keyword, factor) in SIZE_KEYWORDS {
        if lower.contains(keyword) {
            plan.size_factor = *factor;
            break;
        }
    }

    for (keyword, primary, secondary, glow) in RARITY_KEYWORDS {
        if lower.contains(keyword) {
            plan.primary = *primary;
            plan.secondary = *secondary;
            plan.glow = *glow;
            break;
        }
    }

    if GLOW_KEYWORDS.iter().any(|w| lower.contains(w)) {
        plan.glow = true;
    }

    plan
}

/// Point-in-silhouette test over normalized coordinates in [-1, 1],
/// y growing downward (top of the object is ny = -1).
fn contains(shape: Shape, nx: f32, ny: f32) -> bool {
    if nx.abs() > 1.0 || ny.abs() > 1.0 {
        return false;
    }
    match shape {
        Shape::Round => nx * nx + ny * ny <= 1.0,
        Shape::Ring => {
            let r2 = nx * nx + ny * ny;
            r2 <= 1.0 && r2 >= 0.55 * 0.55
        }
        Shape::Box => true,
        Shape::Diamond => nx.abs() + ny.abs() <= 1.0,
        // Apex up, base down
        Shape::Triangle => nx.abs() <= (ny + 1.0) / 2.0,
        Shape::Cross => nx.abs() <= 0.33 || ny.abs() <= 0.33,
        Shape::Hexagon => {
            ny.abs() <= 0.866 && 0.866 * nx.abs() + 0.5 * ny.abs() <= 0.866
        }
        Shape::Star => {
            let r = (nx * nx + ny * ny).sqrt();
            if r > 1.0 {
                return false;
            }
            let theta = ny.atan2(nx) + std::f32::consts::FRAC_PI_2;
            let period = 2.0 * std::f32::consts::PI / 5.0;
            let phase = theta.rem_euclid(period) / period;
            // 1.0 at spikes, 0.0 at notches
            let t = (phase * 2.0 - 1.0).abs();
            r <= 0.45 + 0.55 * t
        }
        Shape::Shield => {
            if ny <= 0.0 {
                true
            } else {
                nx.abs() <= 1.0 - ny * ny
            }
        }
        Shape::Sword => {
            // Blade with tapered tip
            let blade = if ny <= 0.4 {
                let taper = if ny < -0.6 { (ny + 1.0) / 0.4 } else { 1.0 };
                nx.abs() <= 0.12 * taper.max(0.0)
            } else {
                false
            };
            // Crossguard, grip, pommel
            let guard = (ny - 0.45).abs() <= 0.06 && nx.abs() <= 0.45;
            let grip = nx.abs() <= 0.08 && (0.45..=0.85).contains(&ny);
            let dx = nx;
            let dy = ny - 0.92;
            let pommel = dx * dx + dy * dy <= 0.01;
            blade || guard || grip || pommel
        }
        Shape::Bottle => {
            let body = nx.abs() <= 0.55 && ny >= -0.2;
            let neck = nx.abs() <= 0.18 && (-0.75..-0.2).contains(&ny);
            let lip = nx.abs() <= 0.26 && (-0.9..-0.75).contains(&ny);
            let cork = nx.abs() <= 0.2 && ny < -0.9;
            body || neck || lip || cork
        }
        Shape::Blob => nx.abs().powf(2.5) + ny.abs().powf(2.5) <= 1.0,
    }
}

fn lerp_color(a: Color, b: Color, t: f32) -> Color {
    let t = t.clamp(0.0, 1.0);
    [
        (a[0] as f32 + (b[0] as f32 - a[0] as f32) * t) as u8,
        (a[1] as f32 + (b[1] as f32 - a[1] as f32) * t) as u8,
        (a[2] as f32 + (b[2] as f32 - a[2] as f32) * t) as u8,
    ]
}

/// Rasterize the plan onto a square canvas and return it as PNG bytes.
pub fn render_png(plan: &RenderPlan) -> Result<Vec<u8>, ProviderError> {
    let mut img = RgbaImage::new(CANVAS, CANVAS);
    let center = CANVAS as f32 / 2.0;

    let base = center * plan.size_factor.clamp(0.2, 0.95);
    let (half_w, half_h) = match plan.aspect {
        Aspect::Square => (base, base),
        Aspect::Tall => (base * 0.45, base),
        Aspect::Wide => (base, base * 0.5),
    };

    for y in 0..CANVAS {
        for x in 0..CANVAS {
            // Studio background: soft vertical gradient
            let bg_t = y as f32 / CANVAS as f32;
            let mut pixel = lerp_color([246, 246, 248], [224, 224, 230], bg_t);

            let dx = x as f32 - center;
            let dy = y as f32 - center;
            let nx = dx / half_w;
            let ny = dy / half_h;

            if contains(plan.shape, nx, ny) {
                // Edge band reads as a border, interior gets a vertical
                // primary-to-secondary gradient
                let inner = contains(plan.shape, nx / 0.93, ny / 0.93);
                pixel = if inner {
                    let t = (ny + 1.0) / 2.0;
                    lerp_color(plan.primary, plan.secondary, t * 0.85)
                } else {
                    plan.secondary.map(|c| (c as f32 * 0.6) as u8)
                };
            } else if plan.glow {
                let gd = ((dx / (half_w * 1.6)).powi(2) + (dy / (half_h * 1.6)).powi(2)).sqrt();
                if gd < 1.0 {
                    let alpha = (1.0 - gd) * 0.45;
                    pixel = lerp_color(pixel, plan.primary, alpha);
                }
            }

            img.put_pixel(x, y, Rgba([pixel[0], pixel[1], pixel[2], 255]));
        }
    }

    let mut buf = Vec::new();
    DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| ProviderError::Render(e.to_string()))?;
    Ok(buf)
}

/// Offline 2D generator used when no hosted provider is configured or the
/// hosted call fails. Never fails for a non-empty prompt.
pub struct ProceduralImageRenderer;

impl ProceduralImageRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ProceduralImageRenderer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ImageGenerator for ProceduralImageRenderer {
    fn name(&self) -> &'static str {
        "procedural"
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn generate(
        &self,
        prompt: &str,
        refinement_notes: Option<&str>,
    ) -> Result<GeneratedImage, ProviderError> {
        let combined = match refinement_notes {
            Some(notes) => format!("{prompt}. {notes}"),
            None => prompt.to_string(),
        };
        let plan = parse_prompt(&combined);

        // Rasterization is CPU-bound; keep it off the async workers
        let bytes = tokio::task::spawn_blocking(move || render_png(&plan))
            .await
            .map_err(|e| ProviderError::Render(e.to_string()))??;

        let filename = format!("concept_{}.png", Uuid::new_v4().simple());
        Ok(GeneratedImage { bytes, remote_url: None, filename })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn red_sword_parses_to_tall_sword() {
        let plan = parse_prompt("a red sword");
        assert_eq!(plan.shape, Shape::Sword);
        assert_eq!(plan.aspect, Aspect::Tall);
        assert_eq!(plan.primary, [220, 50, 50]);
        // Secondary is a darkened primary when only one color is named
        assert_eq!(plan.secondary, [154, 35, 35]);
    }

    #[test]
    fn unknown_prompt_falls_back_to_blob() {
        let plan = parse_prompt("zxqj wvut");
        assert_eq!(plan.shape, Shape::Blob);
        assert_eq!(plan.aspect, Aspect::Square);
        assert!(!plan.glow);
    }

    #[test]
    fn rarity_overrides_colors_and_glow() {
        let plan = parse_prompt("legendary shield");
        assert_eq!(plan.shape, Shape::Shield);
        assert_eq!(plan.primary, [255, 200, 50]);
        assert!(plan.glow);
    }

    #[test]
    fn glow_words_enable_glow() {
        assert!(parse_prompt("a glowing blue orb").glow);
        assert!(!parse_prompt("a blue orb").glow);
    }

    #[test]
    fn size_keywords_scale_the_object() {
        assert_eq!(parse_prompt("a tiny coin").size_factor, 0.4);
        assert_eq!(parse_prompt("a massive crate").size_factor, 0.85);
    }

    #[test]
    fn shape_membership_basics() {
        assert!(contains(Shape::Round, 0.0, 0.0));
        assert!(!contains(Shape::Round, 0.9, 0.9));
        // Ring has a hole in the middle
        assert!(!contains(Shape::Ring, 0.0, 0.0));
        assert!(contains(Shape::Ring, 0.8, 0.0));
        // Triangle apex is at the top center
        assert!(contains(Shape::Triangle, 0.0, 0.9));
        assert!(!contains(Shape::Triangle, 0.9, -0.9));
    }

    #[test]
    fn render_produces_png_bytes() {
        let plan = parse_prompt("a red sword");
        let bytes = render_png(&plan).unwrap();
        // PNG magic
        assert_eq!(&bytes[..8], &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]);
    }
}
