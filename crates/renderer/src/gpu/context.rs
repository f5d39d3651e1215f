use anyhow::{anyhow, Context as AnyhowContext, Result};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use wgpu::TextureFormatFeatureFlags;
use winit::dpi::PhysicalSize;

use crate::types::{Antialiasing, SurfaceAlpha};

pub(crate) struct GpuContext {
    pub _instance: wgpu::Instance,
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub size: PhysicalSize<u32>,
    pub sample_count: u32,
    pub surface_format: wgpu::TextureFormat,
}

impl GpuContext {
    pub(crate) fn new<T>(
        target: &T,
        initial_size: PhysicalSize<u32>,
        antialiasing: Antialiasing,
        surface_alpha: SurfaceAlpha,
    ) -> Result<Self>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            flags: wgpu::InstanceFlags::default(),
            memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
            backend_options: wgpu::BackendOptions::default(),
        });

        let window_handle = target
            .window_handle()
            .map_err(|err| anyhow!("failed to acquire window handle: {err}"))?;
        let display_handle = target
            .display_handle()
            .map_err(|err| anyhow!("failed to acquire display handle: {err}"))?;

        // The window outlives the surface: both live in `WindowState` and the
        // GPU state is dropped first.
        let surface = unsafe {
            instance.create_surface_unsafe(wgpu::SurfaceTargetUnsafe::RawHandle {
                raw_display_handle: display_handle.as_raw(),
                raw_window_handle: window_handle.as_raw(),
            })
        }
        .context("failed to create rendering surface")?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .context("failed to find a suitable GPU adapter")?;

        let adapter_info = adapter.get_info();
        tracing::debug!(
            name = %adapter_info.name,
            backend = ?adapter_info.backend,
            device_type = ?adapter_info.device_type,
            "selected GPU adapter"
        );

        let limits = adapter.limits();
        let max_dimension = limits.max_texture_dimension_2d;
        let requested_width = initial_size.width.max(1);
        let requested_height = initial_size.height.max(1);
        if requested_width > max_dimension || requested_height > max_dimension {
            anyhow::bail!(
                "GPU max texture dimension is {max_dimension}, requested surface is {requested_width}x{requested_height}"
            );
        }

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|format| !format.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| anyhow!("surface reports no supported formats"))?;

        let format_features = adapter.get_texture_format_features(surface_format);
        let mut sample_count = resolve_sample_count(
            antialiasing,
            &format_features.flags.supported_sample_counts(),
        );
        if sample_count > 1
            && !format_features
                .flags
                .contains(TextureFormatFeatureFlags::MULTISAMPLE_RESOLVE)
        {
            tracing::warn!(
                ?surface_format,
                "surface format does not support MSAA resolve; disabling MSAA"
            );
            sample_count = 1;
        }

        let mut required_features = wgpu::Features::empty();
        if sample_count > 4 {
            required_features |= wgpu::Features::TEXTURE_ADAPTER_SPECIFIC_FORMAT_FEATURES;
        }

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("glasshader device"),
            required_features,
            required_limits: limits,
            memory_hints: wgpu::MemoryHints::MemoryUsage,
            trace: wgpu::Trace::default(),
        }))
        .context("failed to create GPU device")?;

        device.on_uncaptured_error(Box::new(|error| {
            tracing::error!(%error, "uncaptured GPU error");
        }));

        let present_mode = surface_caps
            .present_modes
            .iter()
            .copied()
            .find(|mode| *mode == wgpu::PresentMode::Fifo)
            .or_else(|| surface_caps.present_modes.first().copied())
            .unwrap_or(wgpu::PresentMode::Fifo);
        let alpha_mode = select_alpha_mode(&surface_caps.alpha_modes, surface_alpha);
        tracing::debug!(?present_mode, ?alpha_mode, sample_count, "configuring surface");

        let size = PhysicalSize::new(requested_width, requested_height);
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            present_mode,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        Ok(Self {
            _instance: instance,
            surface,
            device,
            queue,
            config,
            size,
            sample_count,
            surface_format,
        })
    }

    pub(crate) fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }

        self.size = new_size;
        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(&self.device, &self.config);
    }

    pub(crate) fn reconfigure(&self) {
        self.surface.configure(&self.device, &self.config);
    }
}

/// Picks the MSAA sample count for the requested policy from the counts the
/// surface format supports.
pub(crate) fn resolve_sample_count(antialiasing: Antialiasing, supported: &[u32]) -> u32 {
    let mut supported = supported.to_vec();
    if !supported.contains(&1) {
        supported.push(1);
    }
    supported.sort_unstable();
    supported.dedup();

    match antialiasing {
        Antialiasing::Auto => *supported.last().unwrap_or(&1),
        Antialiasing::Off => 1,
        Antialiasing::Samples(requested) if supported.contains(&requested) => requested,
        Antialiasing::Samples(requested) => {
            let fallback = supported
                .iter()
                .copied()
                .filter(|&count| count <= requested)
                .max()
                .unwrap_or(1);
            tracing::warn!(
                requested,
                fallback,
                ?supported,
                "requested MSAA sample count not supported; falling back"
            );
            fallback
        }
    }
}

/// Chooses how the compositor blends the window with what is behind it.
/// Shaders write premultiplied colour, so that mode is preferred.
pub(crate) fn select_alpha_mode(
    available: &[wgpu::CompositeAlphaMode],
    surface_alpha: SurfaceAlpha,
) -> wgpu::CompositeAlphaMode {
    use wgpu::CompositeAlphaMode as Mode;

    let first = available.first().copied().unwrap_or(Mode::Auto);
    match surface_alpha {
        SurfaceAlpha::Opaque => {
            if available.contains(&Mode::Opaque) {
                Mode::Opaque
            } else {
                first
            }
        }
        SurfaceAlpha::Transparent => {
            let preferred = [Mode::PreMultiplied, Mode::PostMultiplied, Mode::Inherit];
            match preferred.into_iter().find(|mode| available.contains(mode)) {
                Some(mode) => mode,
                None => {
                    tracing::warn!(
                        ?available,
                        fallback = ?first,
                        "surface does not support transparency; window will be opaque"
                    );
                    first
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wgpu::CompositeAlphaMode as Mode;

    #[test]
    fn auto_uses_highest_supported_count() {
        assert_eq!(resolve_sample_count(Antialiasing::Auto, &[1, 4, 2]), 4);
        assert_eq!(resolve_sample_count(Antialiasing::Auto, &[]), 1);
    }

    #[test]
    fn explicit_count_falls_back_to_lower_supported() {
        assert_eq!(resolve_sample_count(Antialiasing::Samples(4), &[1, 2, 4]), 4);
        assert_eq!(resolve_sample_count(Antialiasing::Samples(8), &[1, 2, 4]), 4);
        assert_eq!(resolve_sample_count(Antialiasing::Samples(2), &[4]), 1);
        assert_eq!(resolve_sample_count(Antialiasing::Off, &[1, 4]), 1);
    }

    #[test]
    fn transparent_prefers_premultiplied() {
        let modes = [Mode::Opaque, Mode::PostMultiplied, Mode::PreMultiplied];
        assert_eq!(
            select_alpha_mode(&modes, SurfaceAlpha::Transparent),
            Mode::PreMultiplied
        );
        assert_eq!(
            select_alpha_mode(&[Mode::Opaque, Mode::Inherit], SurfaceAlpha::Transparent),
            Mode::Inherit
        );
    }

    #[test]
    fn transparent_falls_back_to_first_mode() {
        assert_eq!(
            select_alpha_mode(&[Mode::Opaque], SurfaceAlpha::Transparent),
            Mode::Opaque
        );
    }

    #[test]
    fn opaque_request_uses_opaque_mode() {
        let modes = [Mode::PreMultiplied, Mode::Opaque];
        assert_eq!(select_alpha_mode(&modes, SurfaceAlpha::Opaque), Mode::Opaque);
    }
}
