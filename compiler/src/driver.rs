// driver.rs — Read, parse, resolve, and render an interface file
//
// Preconditions: none.
// Postconditions: on success, `Report::output` holds the requested rendering
//   and `Report::diagnostics` any warnings.
// Failure modes: unreadable input is `DriverError::Io`; any error diagnostic
//   (lex, parse, or resolution) is `DriverError::Failed`, carrying every
//   diagnostic collected.
// Side effects: reads the input file.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chumsky::span::Span as _;
use serde::Serialize;
use thiserror::Error;

use crate::argument::{Argument, ArgumentSignature};
use crate::diag::Diagnostic;
use crate::interface::{self, Binding, ResolvedInterface};
use crate::parser;
use crate::user_error;

// ── Errors ──────────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum DriverError {
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}: {} error(s)", .diagnostics.iter().filter(|d| d.is_error()).count())]
    Failed {
        path: String,
        diagnostics: Vec<Diagnostic>,
    },
}

impl DriverError {
    /// Process exit code for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            DriverError::Io { .. } => 2,
            DriverError::Failed { .. } => 1,
        }
    }
}

// ── Output selection ────────────────────────────────────────────────────────

/// What to print for a successfully resolved interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Emit {
    /// Argument list as JSON, with its fingerprint.
    Signature,
    /// C header declaring the entry point.
    Header,
    /// Declared ranges and per-dimension constraints.
    Constraints,
    /// The expressions of `show` items.
    Show,
}

/// A successful run.
#[derive(Debug)]
pub struct Report {
    pub output: String,
    pub diagnostics: Vec<Diagnostic>,
}

// ── Pipeline ────────────────────────────────────────────────────────────────

/// Parse and resolve `source`. Lex and parse errors are returned as located
/// user-error diagnostics, in which case nothing is resolved.
pub fn check(path: &str, source: &str) -> ResolvedInterface {
    let parsed = parser::parse(source);
    if !parsed.errors.is_empty() || parsed.interface.is_none() {
        let mut diagnostics: Vec<Diagnostic> = parsed
            .errors
            .iter()
            .map(|e| {
                let (line, col) = interface::line_col(source, e.span().start());
                user_error!("{}", e).with_location(format!("{}:{}:{}", path, line, col))
            })
            .collect();
        if diagnostics.is_empty() {
            diagnostics.push(user_error!("{}: parse failed with no output", path));
        }
        return ResolvedInterface {
            diagnostics,
            ..ResolvedInterface::default()
        };
    }
    match parsed.interface {
        Some(iface) => interface::resolve(path, source, &iface),
        None => ResolvedInterface::default(),
    }
}

/// Check `source` and render it. `function` is made a valid C identifier.
pub fn compile_source(
    path: &str,
    source: &str,
    emit: Emit,
    function: &str,
) -> Result<Report, DriverError> {
    let function = c_identifier(function);
    let resolved = check(path, source);
    if resolved.has_errors() {
        return Err(DriverError::Failed {
            path: path.to_string(),
            diagnostics: resolved.diagnostics,
        });
    }
    match render(&resolved, emit, &function) {
        Ok(output) => Ok(Report {
            output,
            diagnostics: resolved.diagnostics,
        }),
        Err(diag) => {
            let mut diagnostics = resolved.diagnostics;
            diagnostics.push(diag);
            Err(DriverError::Failed {
                path: path.to_string(),
                diagnostics,
            })
        }
    }
}

/// Read `path` and compile it. The entry point is named `function`, or after
/// the file stem.
pub fn compile_file(
    path: &Path,
    emit: Emit,
    function: Option<&str>,
) -> Result<Report, DriverError> {
    let source = std::fs::read_to_string(path).map_err(|source| DriverError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let function = match function {
        Some(f) => f.to_string(),
        None => default_function_name(path),
    };
    tracing::info!(path = %path.display(), ?emit, %function, "compiling");
    compile_source(&path.display().to_string(), &source, emit, &function)
}

/// A C identifier derived from the file stem.
pub fn default_function_name(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    c_identifier(&stem)
}

/// Replace every character that can't appear in a C identifier with `_`, and
/// prefix `_` when the result would be empty or start with a digit.
pub fn c_identifier(raw: &str) -> String {
    let mut name: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, '_');
    }
    name
}

// ── Renderers ───────────────────────────────────────────────────────────────

pub fn render(resolved: &ResolvedInterface, emit: Emit, function: &str) -> Result<String, Diagnostic> {
    match emit {
        Emit::Signature => render_signature(&resolved.signature()?, function),
        Emit::Header => Ok(render_header(&resolved.signature()?, function)),
        Emit::Constraints => Ok(render_constraints(resolved)),
        Emit::Show => Ok(render_show(resolved)),
    }
}

#[derive(Serialize)]
struct SignatureDoc<'a> {
    function: &'a str,
    arguments: &'a [Argument],
    fingerprint: String,
}

fn render_signature(sig: &ArgumentSignature, function: &str) -> Result<String, Diagnostic> {
    let doc = SignatureDoc {
        function,
        arguments: &sig.arguments,
        fingerprint: sig.fingerprint(),
    };
    let mut json = serde_json::to_string_pretty(&doc)
        .map_err(|e| crate::internal_error!("Can't serialize signature: {}", e))?;
    json.push('\n');
    Ok(json)
}

pub fn render_header(sig: &ArgumentSignature, function: &str) -> String {
    let guard = format!("PBIND_{}_H", function.to_ascii_uppercase());
    let mut out = String::new();
    let _ = writeln!(out, "// Generated by pbind. Do not edit.");
    let _ = writeln!(out, "#ifndef {}", guard);
    let _ = writeln!(out, "#define {}", guard);
    out.push('\n');
    out.push_str("#include <stdbool.h>\n#include <stdint.h>\n\n");
    out.push_str("struct pbind_buffer_t;\n\n");
    out.push_str("#ifdef __cplusplus\nextern \"C\" {\n#endif\n\n");
    let _ = writeln!(out, "{}", sig.c_prototype(function));
    out.push_str("\n#ifdef __cplusplus\n}\n#endif\n\n");
    let _ = writeln!(out, "#endif // {}", guard);
    out
}

pub fn render_constraints(resolved: &ResolvedInterface) -> String {
    let mut out = String::new();
    for entry in &resolved.entries {
        let p = entry.binding.parameter();
        match &entry.binding {
            Binding::Scalar(_) => {
                let _ = writeln!(out, "param {}: {}", entry.name, p.ty());
                if let Some(min) = p.min_value() {
                    let _ = writeln!(out, "  min_value = {}", min);
                }
                if let Some(max) = p.max_value() {
                    let _ = writeln!(out, "  max_value = {}", max);
                }
            }
            Binding::Image(_) | Binding::Output(_) => {
                let _ = writeln!(
                    out,
                    "{} {}: {}[{}]",
                    entry.binding.keyword(),
                    entry.name,
                    p.ty(),
                    p.dimensions()
                );
                for (d, c) in p.dim_constraints().iter().enumerate() {
                    let fields = [("min", &c.min), ("extent", &c.extent), ("stride", &c.stride)];
                    for (field, value) in fields {
                        if let Some(e) = value {
                            let _ = writeln!(out, "  {}.{} = {}", field, d, e);
                        }
                    }
                }
            }
        }
    }
    out
}

pub fn render_show(resolved: &ResolvedInterface) -> String {
    let mut out = String::new();
    for shown in &resolved.shown {
        match shown.value {
            Some(v) => {
                let _ = writeln!(out, "{} = {}", shown.expr, v);
            }
            None => {
                let _ = writeln!(out, "{}", shown.expr);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLUR: &str = "\
param gain: float32
image input: uint8[3]
output result: uint8[3]
input.set_stride(0, 1)
gain.set_range(0.5, 4.0)
show input(x, _) + 1
";

    #[test]
    fn function_name_from_stem() {
        assert_eq!(default_function_name(Path::new("dir/blur.pif")), "blur");
        assert_eq!(default_function_name(Path::new("my-blur.v2.pif")), "my_blur_v2");
        assert_eq!(default_function_name(Path::new("3x3.pif")), "_3x3");
    }

    #[test]
    fn explicit_function_name_is_sanitised() {
        let report = compile_source("blur.pif", BLUR, Emit::Header, "my fn").unwrap();
        assert!(report.output.contains("#ifndef PBIND_MY_FN_H"), "{}", report.output);
        assert!(report.output.contains("int my_fn(float gain"), "{}", report.output);
        assert_eq!(c_identifier("9lives"), "_9lives");
        assert_eq!(c_identifier(""), "_");
    }

    #[test]
    fn header_contains_prototype() {
        let report = compile_source("blur.pif", BLUR, Emit::Header, "blur").unwrap();
        assert!(report.output.contains("#ifndef PBIND_BLUR_H"));
        assert!(report.output.contains(
            "int blur(float gain, struct pbind_buffer_t *input, struct pbind_buffer_t *result);"
        ));
    }

    #[test]
    fn signature_json_is_pretty_and_fingerprinted() {
        let report = compile_source("blur.pif", BLUR, Emit::Signature, "blur").unwrap();
        let v: serde_json::Value = serde_json::from_str(&report.output).unwrap();
        assert_eq!(v["function"], "blur");
        assert_eq!(v["arguments"][0]["name"], "gain");
        assert_eq!(v["arguments"][1]["is_buffer"], true);
        assert_eq!(v["arguments"][2]["type"], "uint8");
        assert_eq!(v["fingerprint"].as_str().unwrap().len(), 64);
    }

    #[test]
    fn constraints_listing() {
        let report = compile_source("blur.pif", BLUR, Emit::Constraints, "blur").unwrap();
        assert_eq!(
            report.output,
            "param gain: float32\n  min_value = 0.5f\n  max_value = 4.0f\nimage input: uint8[3]\n  stride.0 = 1\noutput result: uint8[3]\n"
        );
    }

    #[test]
    fn show_listing() {
        let report = compile_source("blur.pif", BLUR, Emit::Show, "blur").unwrap();
        assert_eq!(report.output, "(input(x, _0, _1) + uint8(1))\n");
    }

    #[test]
    fn parse_error_is_located() {
        let err = compile_source("bad.pif", "param k int32\n", Emit::Show, "bad").unwrap_err();
        assert_eq!(err.exit_code(), 1);
        match err {
            DriverError::Failed { diagnostics, .. } => {
                assert_eq!(diagnostics.len(), 1);
                assert_eq!(diagnostics[0].source_location.as_deref(), Some("bad.pif:1:9"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn warnings_do_not_fail() {
        let src = "param k: int32\nk.set_range(5, 1)\n";
        let report = compile_source("w.pif", src, Emit::Constraints, "w").unwrap();
        assert_eq!(report.diagnostics.len(), 1);
        assert!(!report.diagnostics[0].is_error());
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = compile_file(Path::new("/nonexistent/never.pif"), Emit::Show, None).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(matches!(err, DriverError::Io { .. }));
    }
}
