//! Procedural 3D prototype generator
//!
//! Offline image-to-3D stand-in: picks a primitive mesh from prompt cues
//! and emits a Wavefront OBJ plus a turntable-style GIF preview built from
//! the source concept image. Good enough to exercise the full tier
//! pipeline without a GPU or an external model service.

use super::{Artifact, GeneratedPrototype, ProviderError, PrototypeGenerator};
use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, Frame, RgbaImage};
use std::f32::consts::PI;
use uuid::Uuid;

const PREVIEW_SIZE: u32 = 256;
const PREVIEW_OBJECT: u32 = 220;
const PREVIEW_FRAMES: u32 = 12;
const FRAME_DELAY_MS: u32 = 80;

/// Primitive meshes the generator can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    Cube,
    Sphere,
    Cylinder,
    Pyramid,
}

/// Pick a primitive from prompt keywords; cube is the default.
pub fn pick_primitive(prompt: Option<&str>) -> Primitive {
    let Some(prompt) = prompt else {
        return Primitive::Cube;
    };
    let lower = prompt.to_lowercase();

    const SPHERES: &[&str] = &["round", "orb", "ball", "sphere", "coin", "pearl", "circle"];
    const CYLINDERS: &[&str] = &["bottle", "potion", "flask", "vial", "rod", "pole", "barrel", "tower"];
    const PYRAMIDS: &[&str] = &["pyramid", "triangle", "cone", "spike"];

    if SPHERES.iter().any(|w| lower.contains(w)) {
        Primitive::Sphere
    } else if CYLINDERS.iter().any(|w| lower.contains(w)) {
        Primitive::Cylinder
    } else if PYRAMIDS.iter().any(|w| lower.contains(w)) {
        Primitive::Pyramid
    } else {
        Primitive::Cube
    }
}

/// Emit a unit-scale OBJ mesh for the primitive.
pub fn primitive_obj(primitive: Primitive) -> String {
    match primitive {
        Primitive::Cube => cube_obj(),
        Primitive::Sphere => sphere_obj(12, 18),
        Primitive::Cylinder => cylinder_obj(24),
        Primitive::Pyramid => pyramid_obj(),
    }
}

fn cube_obj() -> String {
    let mut obj = String::from("# forge prototype: cube\n");
    for (x, y, z) in [
        (-0.5, -0.5, -0.5),
        (0.5, -0.5, -0.5),
        (0.5, 0.5, -0.5),
        (-0.5, 0.5, -0.5),
        (-0.5, -0.5, 0.5),
        (0.5, -0.5, 0.5),
        (0.5, 0.5, 0.5),
        (-0.5, 0.5, 0.5),
    ] {
        obj.push_str(&format!("v {x} {y} {z}\n"));
    }
    for face in [
        [1, 2, 3, 4],
        [5, 8, 7, 6],
        [1, 5, 6, 2],
        [2, 6, 7, 3],
        [3, 7, 8, 4],
        [4, 8, 5, 1],
    ] {
        obj.push_str(&format!("f {} {} {} {}\n", face[0], face[1], face[2], face[3]));
    }
    obj
}

fn sphere_obj(stacks: u32, sectors: u32) -> String {
    let mut obj = String::from("# forge prototype: sphere\n");
    for i in 0..=stacks {
        let phi = PI * i as f32 / stacks as f32;
        for j in 0..=sectors {
            let theta = 2.0 * PI * j as f32 / sectors as f32;
            let x = 0.5 * phi.sin() * theta.cos();
            let y = 0.5 * phi.cos();
            let z = 0.5 * phi.sin() * theta.sin();
            obj.push_str(&format!("v {x} {y} {z}\n"));
        }
    }
    let ring = sectors + 1;
    for i in 0..stacks {
        for j in 0..sectors {
            let a = i * ring + j + 1;
            let b = a + ring;
            obj.push_str(&format!("f {} {} {} {}\n", a, b, b + 1, a + 1));
        }
    }
    obj
}

fn cylinder_obj(segments: u32) -> String {
    let mut obj = String::from("# forge prototype: cylinder\n");
    // Bottom ring, then top ring
    for y in [-0.5f32, 0.5] {
        for j in 0..segments {
            let theta = 2.0 * PI * j as f32 / segments as f32;
            let x = 0.35 * theta.cos();
            let z = 0.35 * theta.sin();
            obj.push_str(&format!("v {x} {y} {z}\n"));
        }
    }
    // Cap centers
    obj.push_str("v 0 -0.5 0\n");
    obj.push_str("v 0 0.5 0\n");
    let bottom_center = 2 * segments + 1;
    let top_center = 2 * segments + 2;

    for j in 0..segments {
        let next = (j + 1) % segments;
        let b0 = j + 1;
        let b1 = next + 1;
        let t0 = segments + j + 1;
        let t1 = segments + next + 1;
        obj.push_str(&format!("f {b0} {b1} {t1} {t0}\n"));
        obj.push_str(&format!("f {bottom_center} {b1} {b0}\n"));
        obj.push_str(&format!("f {top_center} {t0} {t1}\n"));
    }
    obj
}

fn pyramid_obj() -> String {
    let mut obj = String::from("# forge prototype: pyramid\n");
    for (x, y, z) in [
        (-0.5, -0.5, -0.5),
        (0.5, -0.5, -0.5),
        (0.5, -0.5, 0.5),
        (-0.5, -0.5, 0.5),
        (0.0, 0.5, 0.0),
    ] {
        obj.push_str(&format!("v {x} {y} {z}\n"));
    }
    obj.push_str("f 1 4 3 2\n");
    for (a, b) in [(1, 2), (2, 3), (3, 4), (4, 1)] {
        obj.push_str(&format!("f {a} {b} 5\n"));
    }
    obj
}

/// Build a turntable-style preview GIF from the source concept image:
/// the object sprite is squeezed and mirrored across frames to fake a
/// rotation around the vertical axis.
pub fn turntable_gif(image_bytes: &[u8]) -> Result<Vec<u8>, ProviderError> {
    let source = image::load_from_memory(image_bytes)
        .map_err(|e| ProviderError::Render(format!("source image decode failed: {e}")))?;
    let sprite = source
        .resize_exact(PREVIEW_OBJECT, PREVIEW_OBJECT, image::imageops::FilterType::Triangle)
        .to_rgba8();

    let mut buf = Vec::new();
    {
        let mut encoder = GifEncoder::new(&mut buf);
        encoder
            .set_repeat(Repeat::Infinite)
            .map_err(|e| ProviderError::Render(e.to_string()))?;

        for i in 0..PREVIEW_FRAMES {
            let angle = 2.0 * PI * i as f32 / PREVIEW_FRAMES as f32;
            let squeeze = angle.cos();
            let width = ((PREVIEW_OBJECT as f32 * squeeze.abs()).max(8.0)) as u32;

            let mut scaled = image::imageops::resize(
                &sprite,
                width,
                PREVIEW_OBJECT,
                image::imageops::FilterType::Triangle,
            );
            if squeeze < 0.0 {
                scaled = image::imageops::flip_horizontal(&scaled);
            }

            let mut canvas = RgbaImage::from_pixel(
                PREVIEW_SIZE,
                PREVIEW_SIZE,
                image::Rgba([240, 240, 244, 255]),
            );
            let left = (PREVIEW_SIZE - width) as i64 / 2;
            let top = (PREVIEW_SIZE - PREVIEW_OBJECT) as i64 / 2;
            image::imageops::overlay(&mut canvas, &scaled, left, top);

            let frame = Frame::from_parts(
                canvas,
                0,
                0,
                Delay::from_numer_denom_ms(FRAME_DELAY_MS, 1),
            );
            encoder
                .encode_frame(frame)
                .map_err(|e| ProviderError::Render(e.to_string()))?;
        }
    }
    Ok(buf)
}

/// Offline tier-2 generator.
pub struct ProceduralPrototypeRenderer;

impl ProceduralPrototypeRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ProceduralPrototypeRenderer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl PrototypeGenerator for ProceduralPrototypeRenderer {
    fn name(&self) -> &'static str {
        "procedural-mesh"
    }

    async fn generate(
        &self,
        image_bytes: &[u8],
        prompt: Option<&str>,
    ) -> Result<GeneratedPrototype, ProviderError> {
        let primitive = pick_primitive(prompt);
        let obj_text = primitive_obj(primitive);

        let bytes = image_bytes.to_vec();
        let gif_bytes = tokio::task::spawn_blocking(move || turntable_gif(&bytes))
            .await
            .map_err(|e| ProviderError::Render(e.to_string()))??;

        let base = Uuid::new_v4().simple().to_string();
        Ok(GeneratedPrototype {
            obj: Artifact {
                filename: format!("proto_{base}.obj"),
                bytes: obj_text.into_bytes(),
            },
            gif: Artifact {
                filename: format!("proto_{base}.gif"),
                bytes: gif_bytes,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count_lines(obj: &str, prefix: &str) -> usize {
        obj.lines().filter(|l| l.starts_with(prefix)).count()
    }

    #[test]
    fn primitive_selection_from_prompt() {
        assert_eq!(pick_primitive(Some("a blue orb")), Primitive::Sphere);
        assert_eq!(pick_primitive(Some("health potion")), Primitive::Cylinder);
        assert_eq!(pick_primitive(Some("stone pyramid")), Primitive::Pyramid);
        assert_eq!(pick_primitive(Some("a red sword")), Primitive::Cube);
        assert_eq!(pick_primitive(None), Primitive::Cube);
    }

    #[test]
    fn cube_has_eight_vertices_six_faces() {
        let obj = primitive_obj(Primitive::Cube);
        assert_eq!(count_lines(&obj, "v "), 8);
        assert_eq!(count_lines(&obj, "f "), 6);
    }

    #[test]
    fn sphere_mesh_is_well_formed() {
        let obj = primitive_obj(Primitive::Sphere);
        // 13 stacks of 19 vertices, 12*18 quads
        assert_eq!(count_lines(&obj, "v "), 13 * 19);
        assert_eq!(count_lines(&obj, "f "), 12 * 18);
    }

    #[test]
    fn cylinder_mesh_is_well_formed() {
        let obj = primitive_obj(Primitive::Cylinder);
        assert_eq!(count_lines(&obj, "v "), 2 * 24 + 2);
        // One side quad and two cap triangles per segment
        assert_eq!(count_lines(&obj, "f "), 3 * 24);
    }

    #[test]
    fn face_indices_stay_in_bounds() {
        for primitive in [Primitive::Cube, Primitive::Sphere, Primitive::Cylinder, Primitive::Pyramid] {
            let obj = primitive_obj(primitive);
            let vertex_count = count_lines(&obj, "v ");
            for line in obj.lines().filter(|l| l.starts_with("f ")) {
                for index in line.split_whitespace().skip(1) {
                    let index: usize = index.parse().unwrap();
                    assert!(index >= 1 && index <= vertex_count, "{primitive:?}: f index {index} out of 1..={vertex_count}");
                }
            }
        }
    }

    #[test]
    fn turntable_gif_from_png() {
        // Render a small solid PNG as the source
        let img = RgbaImage::from_pixel(64, 64, image::Rgba([200, 40, 40, 255]));
        let mut png = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();

        let gif = turntable_gif(&png).unwrap();
        // GIF89a magic
        assert_eq!(&gif[..6], b"GIF89a");
    }

    #[test]
    fn garbage_bytes_are_a_render_error() {
        let result = turntable_gif(b"not an image");
        assert!(matches!(result, Err(ProviderError::Render(_))));
    }
}
