use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use renderer::{
    wrap_fragment_source, Antialiasing, BuiltinShader, InputOptions, Renderer, RendererConfig,
    ShaderOrigin, SurfaceAlpha, WindowOptions,
};
use shaderconfig::{AntialiasSetting, BuiltinSetting, PreviewSettings};
use tracing_subscriber::EnvFilter;

use crate::cli::RunArgs;
use crate::paths::AppPaths;

pub fn run(args: RunArgs) -> Result<()> {
    let paths = AppPaths::discover()?;
    let settings = load_settings(args.config.as_deref(), &paths)?;
    let mut config = build_renderer_config(&args, settings)?;
    config.dialog_dir = Some(paths.shader_dir());

    let mut renderer = Renderer::new(config);
    let config = renderer.config();
    tracing::info!(
        shader = ?config.shader,
        size = ?config.window.size,
        antialias = ?config.antialiasing,
        transparent = config.window.surface_alpha == SurfaceAlpha::Transparent,
        menu = config.input.menu,
        "starting glasshader preview"
    );
    renderer.run()
}

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Prints the wrapped GLSL for `shader` to stdout.
pub fn print_wrapped(shader: &Path) -> Result<()> {
    let source = fs::read_to_string(shader)
        .with_context(|| format!("failed to read shader at {}", shader.display()))?;
    let wrapped = wrap_fragment_source(&source);
    tracing::debug!(dialect = ?wrapped.dialect, "wrapped shader");
    print!("{}", wrapped.source);
    Ok(())
}

pub fn print_paths() -> Result<()> {
    let paths = AppPaths::discover()?;
    println!("config:   {}", paths.config_dir().display());
    println!("data:     {}", paths.data_dir().display());
    println!("settings: {}", paths.settings_file().display());
    println!("shaders:  {}", paths.shader_dir().display());
    Ok(())
}

fn load_settings(explicit: Option<&Path>, paths: &AppPaths) -> Result<PreviewSettings> {
    if let Some(path) = explicit {
        return PreviewSettings::from_path(path)
            .with_context(|| format!("failed to load settings from {}", path.display()));
    }

    let default_path = paths.settings_file();
    if default_path.is_file() {
        tracing::debug!(path = %default_path.display(), "loading settings");
        return PreviewSettings::from_path(&default_path)
            .with_context(|| format!("failed to load settings from {}", default_path.display()));
    }

    tracing::debug!(path = %default_path.display(), "no settings file; using defaults");
    Ok(PreviewSettings::default())
}

/// Merges CLI flags over the settings file. Flags win; boolean switches can
/// only turn a setting on (or, for the `--no-*` flags, off).
pub fn build_renderer_config(args: &RunArgs, settings: PreviewSettings) -> Result<RendererConfig> {
    let shader = match (&args.shader, args.builtin, &settings.shader.path) {
        (Some(path), _, _) => ShaderOrigin::File(path.clone()),
        (None, Some(builtin), _) => ShaderOrigin::Builtin(builtin),
        (None, None, Some(path)) => ShaderOrigin::File(path.clone()),
        (None, None, None) => ShaderOrigin::Builtin(map_builtin(settings.shader.builtin)),
    };

    let blur_radius = args.blur_radius.unwrap_or(settings.render.blur_radius);
    if !blur_radius.is_finite() || blur_radius < 0.0 {
        bail!("blur radius must be a finite value >= 0 (got {blur_radius})");
    }

    let antialiasing = map_antialias(args.antialias.or(settings.render.antialias));
    let surface_alpha = if args.opaque || !settings.window.transparent {
        SurfaceAlpha::Opaque
    } else {
        SurfaceAlpha::Transparent
    };
    let watch = args.watch || settings.shader.watch;

    Ok(RendererConfig {
        window: WindowOptions {
            title: args.title.clone().unwrap_or(settings.window.title),
            size: args
                .size
                .unwrap_or((settings.window.width, settings.window.height)),
            surface_alpha,
            always_on_top: settings.window.always_on_top && !args.no_always_on_top,
            resizable: settings.window.resizable && !args.fixed_size,
        },
        shader,
        antialiasing,
        blur_radius,
        screen_texture: args.texture.clone().or(settings.render.texture),
        input: InputOptions {
            menu: settings.input.menu && !args.no_menu,
            quit_on_any_key: settings.input.quit_on_any_key || args.quit_on_any_key,
        },
        watch_interval: watch.then_some(settings.shader.watch_interval),
        dialog_dir: None,
    })
}

fn map_builtin(setting: BuiltinSetting) -> BuiltinShader {
    match setting {
        BuiltinSetting::Glass => BuiltinShader::Glass,
        BuiltinSetting::Ripple => BuiltinShader::Ripple,
    }
}

fn map_antialias(setting: Option<AntialiasSetting>) -> Antialiasing {
    match setting.and_then(AntialiasSetting::samples) {
        None => Antialiasing::Auto,
        Some(1) => Antialiasing::Off,
        Some(samples) => Antialiasing::Samples(samples),
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::Duration;

    use clap::Parser;
    use tempfile::TempDir;

    use super::*;
    use crate::cli::Cli;
    use crate::paths::tests::{env_lock, EnvGuard};
    use crate::paths::{ENV_CONFIG_DIR, ENV_DATA_DIR};

    fn args(extra: &[&str]) -> RunArgs {
        let argv = std::iter::once("glasshader").chain(extra.iter().copied());
        Cli::try_parse_from(argv).unwrap().run
    }

    #[test]
    fn defaults_match_glass_preview() {
        let config = build_renderer_config(&args(&[]), PreviewSettings::default()).unwrap();
        assert_eq!(config.shader, ShaderOrigin::Builtin(BuiltinShader::Glass));
        assert_eq!(config.window.size, (600, 600));
        assert_eq!(config.window.title, "Glass Shader");
        assert_eq!(config.window.surface_alpha, SurfaceAlpha::Transparent);
        assert!(config.window.always_on_top);
        assert!(config.window.resizable);
        assert_eq!(config.antialiasing, Antialiasing::Auto);
        assert_eq!(config.blur_radius, 2.0);
        assert!(config.input.menu);
        assert!(!config.input.quit_on_any_key);
        assert_eq!(config.watch_interval, None);
    }

    #[test]
    fn cli_flags_override_settings() {
        let settings = PreviewSettings::from_toml_str(
            r#"
            [window]
            title = "From file"
            width = 800
            height = 400

            [shader]
            path = "settings.frag"
            watch_interval = "2s"

            [render]
            antialias = 8
            blur_radius = 5.0
            "#,
        )
        .unwrap();

        let config = build_renderer_config(
            &args(&[
                "cli.frag",
                "--size",
                "320x200",
                "--antialias",
                "off",
                "--blur-radius",
                "0.5",
                "--watch",
                "--opaque",
                "--no-menu",
            ]),
            settings,
        )
        .unwrap();

        assert_eq!(config.shader, ShaderOrigin::File(PathBuf::from("cli.frag")));
        assert_eq!(config.window.title, "From file");
        assert_eq!(config.window.size, (320, 200));
        assert_eq!(config.antialiasing, Antialiasing::Off);
        assert_eq!(config.blur_radius, 0.5);
        assert_eq!(config.watch_interval, Some(Duration::from_secs(2)));
        assert_eq!(config.window.surface_alpha, SurfaceAlpha::Opaque);
        assert!(!config.input.menu);
    }

    #[test]
    fn settings_fill_in_missing_flags() {
        let settings = PreviewSettings::from_toml_str(
            r#"
            [shader]
            builtin = "ripple"

            [render]
            antialias = "4"

            [input]
            quit_on_any_key = true
            "#,
        )
        .unwrap();

        let config = build_renderer_config(&args(&[]), settings).unwrap();
        assert_eq!(config.shader, ShaderOrigin::Builtin(BuiltinShader::Ripple));
        assert_eq!(config.antialiasing, Antialiasing::Samples(4));
        assert!(config.input.quit_on_any_key);
    }

    #[test]
    fn builtin_flag_beats_settings_path() {
        let mut settings = PreviewSettings::default();
        settings.shader.path = Some(PathBuf::from("from-settings.frag"));
        let config = build_renderer_config(&args(&["--builtin", "ripple"]), settings).unwrap();
        assert_eq!(config.shader, ShaderOrigin::Builtin(BuiltinShader::Ripple));
    }

    #[test]
    fn rejects_negative_blur_radius() {
        let err = build_renderer_config(&args(&["--blur-radius=-1"]), PreviewSettings::default())
            .unwrap_err();
        assert!(err.to_string().contains("blur radius"));
    }

    #[test]
    fn settings_file_is_picked_up_from_config_dir() {
        let _guard = env_lock().lock().unwrap();
        let root = TempDir::new().unwrap();
        let config_dir = root.path().join("config");
        fs::create_dir_all(&config_dir).unwrap();
        fs::write(
            config_dir.join("glasshader.toml"),
            "[window]\ntitle = \"Configured\"\n",
        )
        .unwrap();

        let _config_guard = EnvGuard::set(ENV_CONFIG_DIR, &config_dir);
        let _data_guard = EnvGuard::set(ENV_DATA_DIR, &root.path().join("data"));
        let paths = AppPaths::discover().unwrap();

        let settings = load_settings(None, &paths).unwrap();
        assert_eq!(settings.window.title, "Configured");

        let missing = root.path().join("missing.toml");
        assert!(load_settings(Some(&missing), &paths).is_err());
    }
}
