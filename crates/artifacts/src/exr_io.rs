//! Lossless linear image IO through OpenEXR.

use crossrender_common::Image;
use std::path::Path;

use crate::manager::ArtifactError;

/// Write every channel of `image` as 32-bit float samples.
pub fn write_exr(path: &Path, image: &Image) -> Result<(), ArtifactError> {
    use exr::prelude::*;

    let mut list = SmallVec::<[AnyChannel<FlatSamples>; 4]>::new();
    for (index, name) in image.channels().iter().enumerate() {
        let text = Text::new_or_none(name.as_str())
            .ok_or_else(|| ArtifactError::InvalidChannelName(name.clone()))?;
        list.push(AnyChannel {
            name: text,
            sample_data: FlatSamples::F32(image.channel(index)),
            quantize_linearly: false,
            sampling: Vec2(1, 1),
        });
    }

    let encoded = exr::prelude::Image::from_channels(
        (image.width() as usize, image.height() as usize),
        AnyChannels::sort(list),
    );
    encoded
        .write()
        .to_file(path)
        .map_err(|source| ArtifactError::Exr {
            path: path.to_path_buf(),
            source,
        })
}

/// Read the first RGB(A) layer of an EXR file as an `R`, `G`, `B` image.
/// Alpha is discarded.
pub fn read_exr(path: &Path) -> Result<Image, ArtifactError> {
    use exr::prelude::*;

    if !path.is_file() {
        return Err(ArtifactError::MissingFile(path.to_path_buf()));
    }

    let decoded = read_first_rgba_layer_from_file(
        path,
        |resolution, _| {
            (
                resolution.width(),
                vec![0.0f32; resolution.width() * resolution.height() * 3],
            )
        },
        |(width, data): &mut (usize, Vec<f32>), position, (r, g, b, _a): (f32, f32, f32, f32)| {
            let offset = (position.y() * *width + position.x()) * 3;
            data[offset] = r;
            data[offset + 1] = g;
            data[offset + 2] = b;
        },
    )
    .map_err(|source| ArtifactError::Exr {
        path: path.to_path_buf(),
        source,
    })?;

    let size = decoded.layer_data.size;
    let (_, data) = decoded.layer_data.channel_data.pixels;
    Ok(crossrender_common::Image::new(
        size.width() as u32,
        size.height() as u32,
        vec!["R".into(), "G".into(), "B".into()],
        data,
    )?)
}
