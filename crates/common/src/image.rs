/// Errors from image construction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ImageError {
    #[error("image dimensions must be positive, got {width}x{height}")]
    EmptyDimensions { width: u32, height: u32 },
    #[error("image requires at least one channel")]
    NoChannels,
    #[error("expected {expected} samples for the image, got {actual}")]
    SampleCount { expected: usize, actual: usize },
}

/// A linear floating-point image with named channels.
///
/// Samples are interleaved per pixel, rows top to bottom.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    width: u32,
    height: u32,
    channels: Vec<String>,
    data: Vec<f32>,
}

impl Image {
    pub fn new(
        width: u32,
        height: u32,
        channels: Vec<String>,
        data: Vec<f32>,
    ) -> Result<Self, ImageError> {
        if width == 0 || height == 0 {
            return Err(ImageError::EmptyDimensions { width, height });
        }
        if channels.is_empty() {
            return Err(ImageError::NoChannels);
        }
        let expected = width as usize * height as usize * channels.len();
        if data.len() != expected {
            return Err(ImageError::SampleCount {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    /// An RGB image with every pixel set to `rgb`.
    pub fn filled_rgb(width: u32, height: u32, rgb: [f32; 3]) -> Result<Self, ImageError> {
        let pixels = width as usize * height as usize;
        let data = rgb.iter().copied().cycle().take(pixels * 3).collect();
        Self::new(width, height, vec!["R".into(), "G".into(), "B".into()], data)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Index of the channel called `name`, also matching layer-prefixed
    /// names such as `color.R`.
    pub fn channel_index(&self, name: &str) -> Option<usize> {
        self.channels.iter().position(|c| {
            c == name
                || c
                    .rsplit_once('.')
                    .is_some_and(|(_, suffix)| suffix == name)
        })
    }

    /// All samples of one channel, in pixel order.
    pub fn channel(&self, index: usize) -> Vec<f32> {
        self.data
            .iter()
            .skip(index)
            .step_by(self.channels.len())
            .copied()
            .collect()
    }

    /// Samples of the pixel at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> &[f32] {
        let stride = self.channels.len();
        let start = (y as usize * self.width as usize + x as usize) * stride;
        &self.data[start..start + stride]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_wrong_sample_count() {
        let err = Image::new(2, 2, vec!["Y".into()], vec![0.0; 3]).unwrap_err();
        assert_eq!(
            err,
            ImageError::SampleCount {
                expected: 4,
                actual: 3
            }
        );
    }

    #[test]
    fn filled_rgb_repeats_pixel() {
        let img = Image::filled_rgb(3, 2, [0.1, 0.2, 0.3]).unwrap();
        assert_eq!(img.pixel_count(), 6);
        assert_eq!(img.pixel(2, 1), &[0.1, 0.2, 0.3]);
        assert_eq!(img.channel(1), vec![0.2; 6]);
    }

    #[test]
    fn channel_lookup_handles_layer_prefix() {
        let img = Image::new(
            1,
            1,
            vec!["color.R".into(), "color.G".into(), "color.B".into()],
            vec![1.0, 2.0, 3.0],
        )
        .unwrap();
        assert_eq!(img.channel_index("G"), Some(1));
        assert_eq!(img.channel_index("A"), None);
    }
}
