use crossrender_common::Image;
use std::path::Path;

use crate::manager::ArtifactError;

/// Clamp linear radiance to [0, 1] and apply the sRGB transfer curve.
fn encode_srgb(linear: f32) -> u8 {
    let v = if linear.is_finite() { linear.clamp(0.0, 1.0) } else { 0.0 };
    let encoded = if v <= 0.003_130_8 {
        12.92 * v
    } else {
        1.055 * v.powf(1.0 / 2.4) - 0.055
    };
    (encoded * 255.0).round() as u8
}

/// Convert an image to interleaved 8-bit sRGB.
///
/// Uses the `R`, `G`, `B` channels; a single-channel image is written as grey.
pub fn tonemap_srgb8(image: &Image) -> Result<Vec<u8>, ArtifactError> {
    let indices = match (
        image.channel_index("R"),
        image.channel_index("G"),
        image.channel_index("B"),
    ) {
        (Some(r), Some(g), Some(b)) => [r, g, b],
        _ if image.channels().len() == 1 => [0, 0, 0],
        _ => {
            return Err(ArtifactError::MissingColorChannels(
                image.channels().to_vec(),
            ));
        }
    };

    let stride = image.channels().len();
    let mut out = Vec::with_capacity(image.pixel_count() * 3);
    for pixel in image.data().chunks_exact(stride) {
        for &i in &indices {
            out.push(encode_srgb(pixel[i]));
        }
    }
    Ok(out)
}

/// Write a tone-mapped 8-bit PNG of `image`.
pub fn write_png(path: &Path, rendered: &Image) -> Result<(), ArtifactError> {
    let bytes = tonemap_srgb8(rendered)?;
    save_srgb8(path, &bytes, rendered.width(), rendered.height())
}

/// Write interleaved 8-bit sRGB samples from [`tonemap_srgb8`] as a PNG.
pub(crate) fn save_srgb8(
    path: &Path,
    bytes: &[u8],
    width: u32,
    height: u32,
) -> Result<(), ArtifactError> {
    image::save_buffer_with_format(
        path,
        bytes,
        width,
        height,
        image::ColorType::Rgb8,
        image::ImageFormat::Png,
    )
    .map_err(|source| ArtifactError::Png {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn srgb_curve_endpoints() {
        assert_eq!(encode_srgb(0.0), 0);
        assert_eq!(encode_srgb(1.0), 255);
        assert_eq!(encode_srgb(30.0), 255);
        assert_eq!(encode_srgb(-1.0), 0);
        assert_eq!(encode_srgb(f32::NAN), 0);
        // mid grey lands near 188 in sRGB
        assert_eq!(encode_srgb(0.5), 188);
    }

    #[test]
    fn tonemap_reorders_channels() {
        let image = Image::new(
            1,
            1,
            vec!["B".into(), "G".into(), "R".into()],
            vec![0.0, 0.0, 1.0],
        )
        .unwrap();
        assert_eq!(tonemap_srgb8(&image).unwrap(), vec![255, 0, 0]);
    }

    #[test]
    fn tonemap_rejects_unknown_layout() {
        let image = Image::new(1, 1, vec!["X".into(), "Y".into()], vec![0.0, 0.0]).unwrap();
        assert!(matches!(
            tonemap_srgb8(&image),
            Err(ArtifactError::MissingColorChannels(_))
        ));
    }

    #[test]
    fn png_is_written() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("out.png");
        write_png(&path, &Image::filled_rgb(3, 2, [0.5, 0.25, 1.0]).unwrap()).unwrap();
        let decoded = image::open(&path).unwrap().to_rgb8();
        assert_eq!(decoded.dimensions(), (3, 2));
        assert_eq!(decoded.get_pixel(0, 0).0, [188, 137, 255]);
    }
}
