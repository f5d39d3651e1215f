use std::borrow::Cow;

use wgpu::naga::ShaderStage;

/// Uniform names provided by the wrapper header. User declarations of these
/// are removed before compilation.
pub const RESERVED_UNIFORMS: [&str; 12] = [
    "iResolution",
    "iTime",
    "iTimeDelta",
    "iFrame",
    "iMouse",
    "iDate",
    "resolution",
    "u_resolution",
    "u_time",
    "u_mouse",
    "blurRadius",
    "screenTexture",
];

/// The two shader shapes the preview accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderDialect {
    /// Defines `mainImage(out vec4, in vec2)`; the wrapper supplies `main`.
    Shadertoy,
    /// Defines its own `main` and writes `gl_FragColor` or an `out vec4`.
    Plain,
}

impl ShaderDialect {
    /// Looks for a `mainImage` identifier outside of comments.
    pub fn detect(source: &str) -> Self {
        Self::detect_in_code(&strip_comments(source))
    }

    fn detect_in_code(code: &str) -> Self {
        if contains_identifier(code, "mainImage") {
            ShaderDialect::Shadertoy
        } else {
            ShaderDialect::Plain
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("fragment shader failed to compile ({dialect:?} dialect):\n{log}")]
    Fragment { dialect: ShaderDialect, log: String },
    #[error("render pipeline failed validation: {0}")]
    Pipeline(String),
}

/// User GLSL with the preview header and footer attached.
#[derive(Debug, Clone)]
pub struct WrappedShader {
    pub source: String,
    pub dialect: ShaderDialect,
    header_lines: u32,
    body_lines: u32,
}

impl WrappedShader {
    /// Maps a 1-based line of the wrapped source back onto the user's file.
    pub fn user_line(&self, wrapped_line: u32) -> Option<u32> {
        if wrapped_line > self.header_lines && wrapped_line <= self.header_lines + self.body_lines {
            Some(wrapped_line - self.header_lines)
        } else {
            None
        }
    }
}

/// Compiles the fixed quad vertex shader.
pub(crate) fn compile_vertex_shader(device: &wgpu::Device) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("fullscreen quad vertex"),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Borrowed(VERTEX_SHADER_GLSL),
            stage: ShaderStage::Vertex,
            defines: &[],
        },
    })
}

/// Wraps the user shader and compiles it, capturing validation failures
/// instead of letting them reach the device's uncaptured-error handler.
pub(crate) fn compile_fragment_shader(
    device: &wgpu::Device,
    source: &str,
) -> Result<wgpu::ShaderModule, CompileError> {
    let wrapped = wrap_fragment_source(source);

    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("preview fragment"),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Borrowed(wrapped.source.as_str()),
            stage: ShaderStage::Fragment,
            defines: &[],
        },
    });
    let Some(error) = pollster::block_on(device.pop_error_scope()) else {
        return Ok(module);
    };

    let info = pollster::block_on(module.get_compilation_info());
    let log = format_info_log(&wrapped, &info.messages, &error.to_string());
    Err(CompileError::Fragment {
        dialect: wrapped.dialect,
        log,
    })
}

fn format_info_log(
    wrapped: &WrappedShader,
    messages: &[wgpu::CompilationMessage],
    fallback: &str,
) -> String {
    if messages.is_empty() {
        return fallback.to_string();
    }

    messages
        .iter()
        .map(|message| match &message.location {
            Some(location) => match wrapped.user_line(location.line_number) {
                Some(line) => format!(
                    "line {line}:{col}: {kind:?}: {text}",
                    col = location.line_position,
                    kind = message.message_type,
                    text = message.message
                ),
                None => format!(
                    "wrapper line {line}: {kind:?}: {text}",
                    line = location.line_number,
                    kind = message.message_type,
                    text = message.message
                ),
            },
            None => format!("{:?}: {}", message.message_type, message.message),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Produces a self-contained Vulkan-flavoured GLSL fragment shader.
///
/// Lines are rewritten in place (never inserted or removed) so compiler
/// diagnostics map back onto the user's line numbers:
///
/// 1. `#version` and `precision` lines become blank, and reserved names are
///    dropped from `uniform` declarations since [`HEADER`] declares them.
/// 2. `in`/`varying vec2` inputs alias the quad UV, and an unqualified
///    `out vec4` is pinned to location 0.
/// 3. The dialect-specific footer remaps `gl_FragCoord` to a bottom-left
///    origin and calls `mainImage` or the renamed user `main`.
pub fn wrap_fragment_source(source: &str) -> WrappedShader {
    let code = strip_comments(source);
    let dialect = ShaderDialect::detect_in_code(&code);
    let mut body = String::with_capacity(source.len() + 128);
    let mut declares_output = false;
    let mut body_lines = 0u32;

    for (line, code_line) in source.lines().zip(code.lines()) {
        match rewrite_line(line, code_line) {
            LineRewrite::Keep => body.push_str(line),
            LineRewrite::Blank => {}
            LineRewrite::Replace(text) => body.push_str(&text),
            LineRewrite::Output(text) => {
                declares_output = true;
                body.push_str(&text);
            }
        }
        body.push('\n');
        body_lines += 1;
    }

    let mut header = String::from(HEADER);
    let footer = match dialect {
        ShaderDialect::Shadertoy => {
            header.push_str(SHADERTOY_OUTPUT);
            SHADERTOY_FOOTER
        }
        ShaderDialect::Plain => {
            if !declares_output {
                header.push_str(FRAG_COLOR_OUTPUT);
            }
            header.push_str("#define main preview_user_main\n");
            PLAIN_FOOTER
        }
    };
    let header_lines = header.lines().count() as u32;

    WrappedShader {
        source: format!("{header}{body}{footer}"),
        dialect,
        header_lines,
        body_lines,
    }
}

enum LineRewrite {
    Keep,
    Blank,
    Replace(String),
    Output(String),
}

fn rewrite_line(line: &str, code: &str) -> LineRewrite {
    let trimmed = code.trim();

    if trimmed.starts_with("#version") || trimmed.starts_with("precision ") {
        return LineRewrite::Blank;
    }

    if trimmed.contains("uniform ") {
        if let Some(text) = strip_reserved_uniforms(trimmed) {
            return if text.is_empty() {
                LineRewrite::Blank
            } else {
                LineRewrite::Replace(text)
            };
        }
        return LineRewrite::Keep;
    }

    let (has_layout, declaration) = strip_layout_qualifier(trimmed);
    if let Some(name) = single_declaration(declaration, &["in vec2 ", "varying vec2 "]) {
        return LineRewrite::Replace(format!("#define {name} preview_uv"));
    }
    if let Some(name) = single_declaration(declaration, &["out vec4 "]) {
        if has_layout {
            return LineRewrite::Output(line.to_string());
        }
        return LineRewrite::Output(format!("layout(location = 0) out vec4 {name};"));
    }

    LineRewrite::Keep
}

/// Rewrites every `uniform` statement on a line without its reserved names.
/// Returns `None` when nothing on the line is reserved.
fn strip_reserved_uniforms(code: &str) -> Option<String> {
    let mut pieces: Vec<&str> = code.split(';').collect();
    let tail = pieces.pop().unwrap_or_default().trim();

    let mut changed = false;
    let mut statements = Vec::with_capacity(pieces.len() + 1);
    for piece in pieces {
        let statement = piece.trim();
        match without_reserved(statement) {
            Some(rewritten) => {
                changed = true;
                if !rewritten.is_empty() {
                    statements.push(rewritten);
                }
            }
            None => statements.push(format!("{statement};")),
        }
    }
    if !changed {
        return None;
    }
    if !tail.is_empty() {
        statements.push(tail.to_string());
    }
    Some(statements.join(" "))
}

/// Drops reserved declarators from a single `uniform` statement given
/// without its `;`. `None` means the statement is left as written.
fn without_reserved(statement: &str) -> Option<String> {
    let (_, declaration) = strip_layout_qualifier(statement);
    let rest = declaration.strip_prefix("uniform ")?;
    let mut declarators = rest.split(',');
    let first = declarators.next()?.trim();
    let split = first.rfind(char::is_whitespace)?;
    let (ty, first_name) = (first[..split].trim_end(), first[split..].trim());

    let names: Vec<&str> = std::iter::once(first_name)
        .chain(declarators.map(str::trim))
        .collect();
    let kept: Vec<&str> = names
        .iter()
        .copied()
        .filter(|name| !is_reserved(name))
        .collect();
    if kept.len() == names.len() {
        return None;
    }
    if kept.is_empty() {
        return Some(String::new());
    }
    let qualifiers = &statement[..statement.len() - rest.len()];
    Some(format!("{qualifiers}{ty} {};", kept.join(", ")))
}

fn is_reserved(declarator: &str) -> bool {
    let base = declarator.split('[').next().unwrap_or(declarator).trim();
    RESERVED_UNIFORMS.contains(&base)
}

/// Blanks `//` and `/* */` comments while keeping every newline, so the
/// result lines up with the original source line by line.
fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    while let Some(c) = chars.next() {
        match (c, chars.peek()) {
            ('/', Some('/')) => {
                while let Some(&next) = chars.peek() {
                    if next == '\n' {
                        break;
                    }
                    chars.next();
                }
                out.push(' ');
            }
            ('/', Some('*')) => {
                chars.next();
                let mut previous = ' ';
                for next in chars.by_ref() {
                    if next == '\n' {
                        out.push('\n');
                    }
                    if previous == '*' && next == '/' {
                        break;
                    }
                    previous = next;
                }
                out.push(' ');
            }
            _ => out.push(c),
        }
    }
    out
}

fn strip_layout_qualifier(trimmed: &str) -> (bool, &str) {
    if trimmed.starts_with("layout") {
        if let Some(close) = trimmed.find(')') {
            return (true, trimmed[close + 1..].trim_start());
        }
    }
    (false, trimmed)
}

fn single_declaration<'a>(declaration: &'a str, prefixes: &[&str]) -> Option<&'a str> {
    let rest = prefixes
        .iter()
        .find_map(|prefix| declaration.strip_prefix(prefix))?;
    let name = rest.trim().strip_suffix(';')?.trim();
    let valid = !name.is_empty()
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name.chars().all(is_ident_char);
    valid.then_some(name)
}

fn contains_identifier(source: &str, ident: &str) -> bool {
    source.match_indices(ident).any(|(start, _)| {
        let before = source[..start].chars().next_back();
        let after = source[start + ident.len()..].chars().next();
        !before.is_some_and(is_ident_char) && !after.is_some_and(is_ident_char)
    })
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// GLSL prologue shared by both dialects.
///
/// The uniform block layout must match `PreviewUniforms` in `gpu/uniforms.rs`.
/// `screenTexture` is declared before `texture2D` is redefined, because the
/// Vulkan type of the same name is needed for the declaration itself.
const HEADER: &str = r"#version 450
layout(location = 0) in vec2 preview_uv;

layout(std140, set = 0, binding = 0) uniform PreviewParams {
    vec3 _iResolution;
    float _iTime;
    vec4 _iMouse;
    vec4 _iDate;
    vec2 _uMouse;
    float _iTimeDelta;
    int _iFrame;
    float _blurRadius;
    float _padding0;
    float _padding1;
    float _padding2;
} ubo;

layout(set = 1, binding = 0) uniform texture2D preview_screen_texture;
layout(set = 1, binding = 1) uniform sampler preview_screen_sampler;

#define iResolution ubo._iResolution
#define iTime ubo._iTime
#define iTimeDelta ubo._iTimeDelta
#define iFrame ubo._iFrame
#define iMouse ubo._iMouse
#define iDate ubo._iDate
#define resolution ubo._iResolution.xy
#define u_resolution ubo._iResolution.xy
#define u_time ubo._iTime
#define u_mouse ubo._uMouse
#define blurRadius ubo._blurRadius
#define screenTexture sampler2D(preview_screen_texture, preview_screen_sampler)
#define texture2D texture

vec4 preview_frag_coord;
#define gl_FragCoord preview_frag_coord
";

const SHADERTOY_OUTPUT: &str = "layout(location = 0) out vec4 preview_out_color;\n";

const FRAG_COLOR_OUTPUT: &str = "layout(location = 0) out vec4 preview_frag_color;
#define gl_FragColor preview_frag_color
";

const SHADERTOY_FOOTER: &str = r"void main() {
    #undef gl_FragCoord
    vec2 preview_builtin = gl_FragCoord.xy;
    #define gl_FragCoord preview_frag_coord

    vec2 fragCoord = vec2(preview_builtin.x, iResolution.y - preview_builtin.y);
    preview_frag_coord = vec4(fragCoord, 0.0, 1.0);

    vec4 color = vec4(0.0);
    mainImage(color, fragCoord);
    preview_out_color = color;
}
";

const PLAIN_FOOTER: &str = r"#undef main
void main() {
    #undef gl_FragCoord
    vec2 preview_builtin = gl_FragCoord.xy;
    #define gl_FragCoord preview_frag_coord

    preview_frag_coord = vec4(preview_builtin.x, iResolution.y - preview_builtin.y, 0.0, 1.0);
    preview_user_main();
}
";

/// Passthrough for the static quad: NDC position at location 0, UV at 1.
const VERTEX_SHADER_GLSL: &str = r"#version 450
layout(location = 0) in vec2 a_position;
layout(location = 1) in vec2 a_uv;
layout(location = 0) out vec2 v_uv;

void main() {
    v_uv = a_uv;
    gl_Position = vec4(a_position, 0.0, 1.0);
}
";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BuiltinShader;
    use wgpu::naga;

    fn validate(source: &str, stage: ShaderStage) {
        let module = naga::front::glsl::Frontend::default()
            .parse(&naga::front::glsl::Options::from(stage), source)
            .unwrap_or_else(|err| panic!("parse failed: {err:?}\n{source}"));
        naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::all(),
        )
        .validate(&module)
        .unwrap_or_else(|err| panic!("validation failed: {err:?}\n{source}"));
    }

    #[test]
    fn detects_dialect_from_main_image() {
        assert_eq!(
            ShaderDialect::detect("void mainImage(out vec4 c, in vec2 p) {}"),
            ShaderDialect::Shadertoy
        );
        assert_eq!(
            ShaderDialect::detect("void main() { gl_FragColor = vec4(1.0); }"),
            ShaderDialect::Plain
        );
        assert_eq!(
            ShaderDialect::detect("float mainImageScale = 1.0; void main() {}"),
            ShaderDialect::Plain
        );
    }

    #[test]
    fn wrap_strips_reserved_uniforms_only() {
        let source = "#version 300 es\n\
                      precision highp float;\n\
                      uniform float iTime;\n\
                      uniform vec2 u_resolution; // pixels\n\
                      uniform float customGain;\n\
                      void mainImage(out vec4 fragColor, in vec2 fragCoord) {\n\
                          fragColor = vec4(fragCoord * customGain, 0.0, 1.0);\n\
                      }\n";

        let wrapped = wrap_fragment_source(source);
        assert_eq!(wrapped.dialect, ShaderDialect::Shadertoy);
        assert!(!wrapped.source.contains("uniform float iTime"));
        assert!(!wrapped.source.contains("uniform vec2 u_resolution"));
        assert!(!wrapped.source.contains("#version 300 es"));
        assert!(!wrapped.source.contains("precision highp"));
        assert!(wrapped.source.contains("uniform float customGain;"));
        assert!(wrapped.source.contains("mainImage(color, fragCoord);"));
    }

    #[test]
    fn plain_dialect_pins_outputs_and_aliases_inputs() {
        let source = "in vec2 TexCoords;\n\
                      out vec4 FragColor;\n\
                      void main() { FragColor = vec4(TexCoords, 0.0, 1.0); }\n";

        let wrapped = wrap_fragment_source(source);
        assert_eq!(wrapped.dialect, ShaderDialect::Plain);
        assert!(wrapped.source.contains("#define TexCoords preview_uv"));
        assert!(wrapped.source.contains("layout(location = 0) out vec4 FragColor;"));
        assert!(!wrapped.source.contains("preview_frag_color;"));
        assert!(wrapped.source.contains("#define main preview_user_main"));
        assert!(wrapped.source.contains("preview_user_main();"));
    }

    #[test]
    fn plain_dialect_without_output_gets_frag_color() {
        let wrapped = wrap_fragment_source("void main() { gl_FragColor = vec4(1.0); }\n");
        assert!(wrapped.source.contains("#define gl_FragColor preview_frag_color"));
    }

    #[test]
    fn user_lines_survive_wrapping() {
        let source = "#version 330\nuniform float u_time;\nvoid main() {\n  gl_FragColor = vec4(u_time);\n}\n";
        let wrapped = wrap_fragment_source(source);

        let wrapped_lines: Vec<&str> = wrapped.source.lines().collect();
        let body_start = wrapped.header_lines as usize;
        assert_eq!(wrapped_lines[body_start], "");
        assert_eq!(wrapped_lines[body_start + 2], "void main() {");
        assert_eq!(wrapped.user_line(wrapped.header_lines + 1), Some(1));
        assert_eq!(wrapped.user_line(wrapped.header_lines + 3), Some(3));
        assert_eq!(wrapped.user_line(1), None);
        assert_eq!(wrapped.user_line(wrapped.header_lines + 6), None);
    }

    #[test]
    fn reserved_names_are_dropped_from_mixed_declarations() {
        assert_eq!(
            strip_reserved_uniforms("uniform vec2 resolution, u_mouse;").as_deref(),
            Some("")
        );
        assert_eq!(
            strip_reserved_uniforms("uniform vec2 resolution, offset;").as_deref(),
            Some("uniform vec2 offset;")
        );
        assert_eq!(
            strip_reserved_uniforms("uniform highp float iTime ;").as_deref(),
            Some("")
        );
        assert_eq!(
            strip_reserved_uniforms("uniform float iTime; uniform float gain;").as_deref(),
            Some("uniform float gain;")
        );
        assert_eq!(
            strip_reserved_uniforms("layout(binding = 0) uniform sampler2D screenTexture;")
                .as_deref(),
            Some("")
        );
        assert_eq!(strip_reserved_uniforms("uniform float gain;"), None);
    }

    #[test]
    fn layout_qualified_screen_texture_compiles() {
        let source = "#version 330 core\n\
                      layout(binding = 0) uniform sampler2D screenTexture;\n\
                      uniform float blurRadius; uniform vec2 resolution;\n\
                      out vec4 FragColor;\n\
                      void main() {\n\
                          FragColor = texture(screenTexture, gl_FragCoord.xy / resolution) * blurRadius;\n\
                      }\n";
        let wrapped = wrap_fragment_source(source);
        assert!(!wrapped.source.contains("uniform sampler2D screenTexture"));
        assert!(!wrapped.source.contains("uniform float blurRadius"));
        validate(&wrapped.source, ShaderStage::Fragment);
    }

    #[test]
    fn main_image_in_comments_does_not_pick_shadertoy() {
        let source = "// ported from a shadertoy mainImage\n\
                      /* mainImage(out vec4 c, in vec2 p)\n\
                         was the entry point */\n\
                      void main() { gl_FragColor = vec4(1.0); }\n";
        assert_eq!(ShaderDialect::detect(source), ShaderDialect::Plain);

        let wrapped = wrap_fragment_source(source);
        assert_eq!(wrapped.dialect, ShaderDialect::Plain);
        assert!(wrapped.source.contains("preview_user_main();"));
        validate(&wrapped.source, ShaderStage::Fragment);
    }

    #[test]
    fn stripping_comments_keeps_line_structure() {
        let source = "a // one\n/* two\nthree */ b\nc";
        let stripped = strip_comments(source);
        assert_eq!(stripped.lines().count(), source.lines().count());
        assert!(!stripped.contains("one") && !stripped.contains("three"));
        assert!(stripped.contains('b') && stripped.ends_with('c'));
    }

    #[test]
    fn builtin_shaders_pass_naga_validation() {
        for builtin in [BuiltinShader::Glass, BuiltinShader::Ripple] {
            let wrapped = wrap_fragment_source(builtin.source());
            validate(&wrapped.source, ShaderStage::Fragment);
        }
    }

    #[test]
    fn vertex_shader_passes_naga_validation() {
        validate(VERTEX_SHADER_GLSL, ShaderStage::Vertex);
    }
}
