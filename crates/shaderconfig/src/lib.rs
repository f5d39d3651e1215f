use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Settings file for the preview window (`glasshader.toml`).
///
/// Every section is optional; missing keys fall back to the values the
/// preview uses when started without any configuration at all.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PreviewSettings {
    pub window: WindowSettings,
    pub shader: ShaderSettings,
    pub render: RenderSettings,
    pub input: InputSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WindowSettings {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub transparent: bool,
    pub always_on_top: bool,
    pub resizable: bool,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            title: "Glass Shader".to_string(),
            width: 600,
            height: 600,
            transparent: true,
            always_on_top: true,
            resizable: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShaderSettings {
    pub builtin: BuiltinSetting,
    pub path: Option<PathBuf>,
    pub watch: bool,
    #[serde(
        default = "default_watch_interval",
        deserialize_with = "deserialize_duration"
    )]
    pub watch_interval: Duration,
}

impl Default for ShaderSettings {
    fn default() -> Self {
        Self {
            builtin: BuiltinSetting::default(),
            path: None,
            watch: false,
            watch_interval: default_watch_interval(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuiltinSetting {
    #[default]
    Glass,
    Ripple,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderSettings {
    #[serde(deserialize_with = "deserialize_antialias_opt")]
    pub antialias: Option<AntialiasSetting>,
    pub blur_radius: f32,
    pub texture: Option<PathBuf>,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            antialias: None,
            blur_radius: 2.0,
            texture: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InputSettings {
    pub menu: bool,
    pub quit_on_any_key: bool,
}

impl Default for InputSettings {
    fn default() -> Self {
        Self {
            menu: true,
            quit_on_any_key: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AntialiasSetting {
    Auto,
    Off,
    Samples2,
    Samples4,
    Samples8,
    Samples16,
}

impl AntialiasSetting {
    pub fn from_samples(samples: u32) -> Option<Self> {
        match samples {
            0 | 1 => Some(Self::Off),
            2 => Some(Self::Samples2),
            4 => Some(Self::Samples4),
            8 => Some(Self::Samples8),
            16 => Some(Self::Samples16),
            _ => None,
        }
    }

    /// MSAA sample count, or `None` for automatic selection.
    pub fn samples(self) -> Option<u32> {
        match self {
            Self::Auto => None,
            Self::Off => Some(1),
            Self::Samples2 => Some(2),
            Self::Samples4 => Some(4),
            Self::Samples8 => Some(8),
            Self::Samples16 => Some(16),
        }
    }
}

fn default_watch_interval() -> Duration {
    Duration::from_millis(500)
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Duration;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Duration::from_secs(v))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Duration::from_secs(v as u64))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v.is_nan() || v.is_sign_negative() {
                return Err(E::custom("duration must be non-negative"));
            }
            Duration::try_from_secs_f64(v)
                .map_err(|err| E::custom(format!("invalid duration {v}: {err}")))
        }
    }

    deserializer.deserialize_any(Visitor)
}

fn deserialize_antialias_opt<'de, D>(deserializer: D) -> Result<Option<AntialiasSetting>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Helper {
        Str(String),
        Num(i64),
    }

    let helper: Option<Helper> = Option::deserialize(deserializer)?;
    let result = match helper {
        None => None,
        Some(Helper::Str(raw)) => Some(parse_antialias(&raw).map_err(de::Error::custom)?),
        Some(Helper::Num(value)) => {
            if value < 0 {
                return Err(de::Error::custom("antialias value must be non-negative"));
            }
            let raw = value.to_string();
            Some(parse_antialias(&raw).map_err(de::Error::custom)?)
        }
    };
    Ok(result)
}

/// Parses `auto`, `off`, or an MSAA sample count (`2`, `4`, `8`, `16`).
pub fn parse_antialias(raw: &str) -> Result<AntialiasSetting, String> {
    let normalized = raw.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "auto" | "max" | "default" => Ok(AntialiasSetting::Auto),
        "off" | "none" | "disable" | "disabled" | "0" | "1" => Ok(AntialiasSetting::Off),
        "2" => Ok(AntialiasSetting::Samples2),
        "4" => Ok(AntialiasSetting::Samples4),
        "8" => Ok(AntialiasSetting::Samples8),
        "16" => Ok(AntialiasSetting::Samples16),
        other => Err(format!(
            "invalid antialias setting '{other}'; use auto/off or 2/4/8/16"
        )),
    }
}

impl PreviewSettings {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: PreviewSettings = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window.title.trim().is_empty() {
            return Err(ConfigError::Invalid("window.title must not be empty".into()));
        }

        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "window size must be greater than zero (got {}x{})",
                self.window.width, self.window.height
            )));
        }

        if !self.render.blur_radius.is_finite() || self.render.blur_radius < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "render.blur_radius must be a finite value >= 0 (got {})",
                self.render.blur_radius
            )));
        }

        if let Some(texture) = &self.render.texture {
            if texture.as_os_str().is_empty() {
                return Err(ConfigError::Invalid(
                    "render.texture must not be an empty path".into(),
                ));
            }
        }

        if let Some(path) = &self.shader.path {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::Invalid(
                    "shader.path must not be an empty path".into(),
                ));
            }
        }

        if self.shader.watch && self.shader.watch_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "shader.watch_interval must be greater than zero".into(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[window]
title = "Blur Preview"
width = 800
height = 600
always_on_top = false

[shader]
builtin = "ripple"
path = "shaders/blur.glsl"
watch = true
watch_interval = "250ms"

[render]
antialias = 4
blur_radius = 3.5
texture = "backdrop.png"

[input]
quit_on_any_key = true
"#;

    #[test]
    fn parses_sample_settings() {
        let settings = PreviewSettings::from_toml_str(SAMPLE).expect("parse settings");
        assert_eq!(settings.window.title, "Blur Preview");
        assert_eq!((settings.window.width, settings.window.height), (800, 600));
        assert!(!settings.window.always_on_top);
        assert!(settings.window.transparent);
        assert_eq!(settings.shader.builtin, BuiltinSetting::Ripple);
        assert_eq!(
            settings.shader.path.as_deref(),
            Some(Path::new("shaders/blur.glsl"))
        );
        assert_eq!(settings.shader.watch_interval, Duration::from_millis(250));
        assert_eq!(settings.render.antialias, Some(AntialiasSetting::Samples4));
        assert!((settings.render.blur_radius - 3.5).abs() < f32::EPSILON);
        assert!(settings.input.menu);
        assert!(settings.input.quit_on_any_key);
    }

    #[test]
    fn empty_document_yields_defaults() {
        let settings = PreviewSettings::from_toml_str("").unwrap();
        assert_eq!(settings.window.title, "Glass Shader");
        assert_eq!((settings.window.width, settings.window.height), (600, 600));
        assert!(settings.window.transparent && settings.window.resizable);
        assert_eq!(settings.shader.builtin, BuiltinSetting::Glass);
        assert!(settings.shader.path.is_none());
        assert_eq!(settings.render.antialias, None);
        assert!((settings.render.blur_radius - 2.0).abs() < f32::EPSILON);
        assert!(settings.input.menu);
        assert!(!settings.input.quit_on_any_key);
    }

    #[test]
    fn rejects_zero_sized_window() {
        let err = PreviewSettings::from_toml_str("[window]\nwidth = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_negative_blur_radius() {
        let err = PreviewSettings::from_toml_str("[render]\nblur_radius = -1.0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_unknown_keys() {
        let err = PreviewSettings::from_toml_str("[window]\nopacity = 0.5\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn watch_interval_accepts_plain_seconds() {
        let settings =
            PreviewSettings::from_toml_str("[shader]\nwatch = true\nwatch_interval = 2\n").unwrap();
        assert_eq!(settings.shader.watch_interval, Duration::from_secs(2));
    }

    #[test]
    fn watch_interval_rejects_unrepresentable_floats() {
        for raw in ["1e30", "inf", "-0.5"] {
            let input = format!("[shader]\nwatch_interval = {raw}\n");
            let err = PreviewSettings::from_toml_str(&input).unwrap_err();
            assert!(matches!(err, ConfigError::Parse(_)), "{raw}: {err}");
        }
        let settings = PreviewSettings::from_toml_str("[shader]\nwatch_interval = 0.25\n").unwrap();
        assert_eq!(settings.shader.watch_interval, Duration::from_millis(250));
    }

    #[test]
    fn antialias_strings_and_numbers_agree() {
        assert_eq!(parse_antialias("AUTO"), Ok(AntialiasSetting::Auto));
        assert_eq!(parse_antialias("off"), Ok(AntialiasSetting::Off));
        assert_eq!(parse_antialias("8"), Ok(AntialiasSetting::Samples8));
        assert!(parse_antialias("3").is_err());
        assert_eq!(AntialiasSetting::from_samples(16), Some(AntialiasSetting::Samples16));
        assert_eq!(AntialiasSetting::Samples2.samples(), Some(2));
        assert_eq!(AntialiasSetting::Auto.samples(), None);
    }

    #[test]
    fn missing_file_reports_io_error() {
        let err = PreviewSettings::from_path(Path::new("/nonexistent/glasshader.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
