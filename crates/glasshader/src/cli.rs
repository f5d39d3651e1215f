use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use renderer::BuiltinShader;
use shaderconfig::{parse_antialias, AntialiasSetting};

#[derive(Parser, Debug)]
#[command(
    name = "glasshader",
    author,
    version,
    about = "Preview a GLSL fragment shader in a transparent, always-on-top window",
    args_conflicts_with_subcommands = true
)]
pub struct Cli {
    #[command(flatten)]
    pub run: RunArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Fragment shader file to preview (Shadertoy `mainImage` or plain `main`).
    #[arg(value_name = "SHADER")]
    pub shader: Option<PathBuf>,

    /// Settings file; defaults to `glasshader.toml` in the config directory.
    #[arg(long, value_name = "FILE", env = "GLASSHADER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Built-in shader to show when no file is given: `glass` or `ripple`.
    #[arg(long, value_name = "NAME", value_parser = parse_builtin)]
    pub builtin: Option<BuiltinShader>,

    /// Initial window size (e.g. `600x600`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size)]
    pub size: Option<(u32, u32)>,

    /// Window title.
    #[arg(long, value_name = "TITLE")]
    pub title: Option<String>,

    /// Anti-aliasing policy: `auto`, `off`, or an explicit MSAA sample count (e.g. `4`).
    #[arg(long, value_name = "MODE", value_parser = parse_antialias)]
    pub antialias: Option<AntialiasSetting>,

    /// Value of the `blurRadius` uniform.
    #[arg(long, value_name = "RADIUS")]
    pub blur_radius: Option<f32>,

    /// Image bound to `screenTexture` (PNG, JPEG, BMP or GIF).
    #[arg(long, value_name = "PATH")]
    pub texture: Option<PathBuf>,

    /// Reload the shader automatically when its file changes.
    #[arg(long)]
    pub watch: bool,

    /// Close the window on any key press.
    #[arg(long)]
    pub quit_on_any_key: bool,

    /// Disable the load/save/reload shortcuts.
    #[arg(long)]
    pub no_menu: bool,

    /// Render into an opaque window.
    #[arg(long)]
    pub opaque: bool,

    /// Do not keep the window above other windows.
    #[arg(long)]
    pub no_always_on_top: bool,

    /// Prevent the window from being resized.
    #[arg(long)]
    pub fixed_size: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the GLSL that would be handed to the compiler for SHADER.
    Wrap {
        #[arg(value_name = "SHADER")]
        shader: PathBuf,
    },
    /// Print the resolved config and data directories.
    Paths,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_size(value: &str) -> Result<(u32, u32), String> {
    let (width, height) = value
        .trim()
        .split_once(['x', 'X', '×'])
        .ok_or_else(|| "expected WxH format, e.g. 600x600".to_string())?;

    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| format!("invalid width '{}' in size", width.trim()))?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| format!("invalid height '{}' in size", height.trim()))?;

    if width == 0 || height == 0 {
        return Err("window dimensions must be greater than zero".to_string());
    }
    Ok((width, height))
}

pub fn parse_builtin(value: &str) -> Result<BuiltinShader, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "glass" => Ok(BuiltinShader::Glass),
        "ripple" => Ok(BuiltinShader::Ripple),
        other => Err(format!("unknown built-in shader '{other}'; expected glass or ripple")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sizes() {
        assert_eq!(parse_size("600x600").unwrap(), (600, 600));
        assert_eq!(parse_size(" 1280 X 720 ").unwrap(), (1280, 720));
        assert_eq!(parse_size("800×600").unwrap(), (800, 600));
        assert!(parse_size("600").is_err());
        assert!(parse_size("0x600").is_err());
        assert!(parse_size("axb").is_err());
    }

    #[test]
    fn parses_builtins() {
        assert_eq!(parse_builtin("Ripple").unwrap(), BuiltinShader::Ripple);
        assert!(parse_builtin("plasma").is_err());
    }

    #[test]
    fn parses_run_flags() {
        let cli = Cli::try_parse_from([
            "glasshader",
            "demo.frag",
            "--size",
            "320x240",
            "--antialias",
            "4",
            "--watch",
            "--no-menu",
        ])
        .unwrap();

        assert!(cli.command.is_none());
        assert_eq!(cli.run.shader, Some(PathBuf::from("demo.frag")));
        assert_eq!(cli.run.size, Some((320, 240)));
        assert_eq!(cli.run.antialias, Some(AntialiasSetting::Samples4));
        assert!(cli.run.watch);
        assert!(cli.run.no_menu);
        assert!(!cli.run.opaque);
    }

    #[test]
    fn parses_subcommands() {
        let cli = Cli::try_parse_from(["glasshader", "wrap", "a.frag"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Command::Wrap { ref shader }) if shader == &PathBuf::from("a.frag")
        ));

        let cli = Cli::try_parse_from(["glasshader", "paths"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Paths)));
    }

    #[test]
    fn rejects_bad_antialias() {
        assert!(Cli::try_parse_from(["glasshader", "--antialias", "3"]).is_err());
    }
}
