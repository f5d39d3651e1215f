use std::path::Path;

use anyhow::{bail, Context, Result};
use image::imageops::flip_vertical_in_place;
use image::GenericImageView;
use wgpu::util::{DeviceExt, TextureDataOrder};

fn check_dimensions(width: u32, height: u32, max_dimension: u32) -> Result<()> {
    if width == 0 || height == 0 {
        bail!("screen texture is empty ({width}x{height})");
    }
    if width > max_dimension || height > max_dimension {
        bail!(
            "screen texture is {width}x{height} but the GPU allows at most {max_dimension}x{max_dimension}"
        );
    }
    Ok(())
}

/// The image sampled through `screenTexture`.
pub(crate) struct ScreenTexture {
    pub _texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
    pub size: (u32, u32),
}

impl ScreenTexture {
    /// Loads `path` when given, falling back to a white texel if it cannot be
    /// decoded.
    pub(crate) fn new(device: &wgpu::Device, queue: &wgpu::Queue, path: Option<&Path>) -> Self {
        match path {
            Some(path) => match Self::from_image(device, queue, path) {
                Ok(texture) => {
                    tracing::info!(
                        path = %path.display(),
                        width = texture.size.0,
                        height = texture.size.1,
                        "loaded screen texture"
                    );
                    texture
                }
                Err(err) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %format!("{err:#}"),
                        "failed to load screen texture; using placeholder"
                    );
                    Self::placeholder(device, queue)
                }
            },
            None => Self::placeholder(device, queue),
        }
    }

    pub(crate) fn placeholder(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        Self::from_rgba(device, queue, "placeholder screen texture", 1, 1, &[255, 255, 255, 255])
    }

    fn from_image(device: &wgpu::Device, queue: &wgpu::Queue, path: &Path) -> Result<Self> {
        let (width, height) = image::image_dimensions(path)
            .with_context(|| format!("failed to read screen texture at {}", path.display()))?;
        check_dimensions(width, height, device.limits().max_texture_dimension_2d)?;

        let image = image::open(path)
            .with_context(|| format!("failed to open screen texture at {}", path.display()))?;
        let (width, height) = image.dimensions();
        let mut rgba = image.to_rgba8();
        // uv (0, 0) is the bottom-left corner of the window.
        flip_vertical_in_place(&mut rgba);
        Ok(Self::from_rgba(device, queue, "screen texture", width, height, &rgba))
    }

    fn from_rgba(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        label: &str,
        width: u32,
        height: u32,
        data: &[u8],
    ) -> Self {
        let texture = device.create_texture_with_data(
            queue,
            &wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8Unorm,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            TextureDataOrder::LayerMajor,
            data,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("screen texture sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Self {
            _texture: texture,
            view,
            sampler,
            size: (width, height),
        }
    }

    pub(crate) fn layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
        device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("screen texture layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        })
    }

    pub(crate) fn bind_group(
        &self,
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("screen texture bind group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&self.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        })
    }
}
