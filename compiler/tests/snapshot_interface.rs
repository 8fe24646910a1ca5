// Snapshot tests: lock the rendered outputs of the driver.
//
// Uses the library API (check → render) and snapshots the emitted text with
// inline `insta` snapshots. Run `cargo insta review` after intentional output
// changes to update them.

use pbind::driver::{self, Emit};

const BLUR: &str = "\
# A 3-channel blur with a gain
param gain: float32
image input: uint8[3]
output result: uint8[3]
input.set_stride(0, 1)
input.set_extent(2, 3)
result.set_bounds(2, 0, input.channels())
gain.set_range(0.5, 4.0)
show input(x, _) + 1
show input.right() - input.left()
";

fn render(emit: Emit) -> String {
    let resolved = driver::check("blur.pif", BLUR);
    assert!(
        !resolved.has_errors(),
        "unexpected diagnostics: {:?}",
        resolved.diagnostics
    );
    driver::render(&resolved, emit, "blur").unwrap()
}

#[test]
fn signature() {
    let resolved = driver::check("blur.pif", BLUR);
    let fingerprint = resolved.signature().unwrap().fingerprint();
    let out = render(Emit::Signature).replace(&fingerprint, "[fingerprint]");
    insta::assert_snapshot!(out, @r#"
    {
      "function": "blur",
      "arguments": [
        {
          "name": "gain",
          "is_buffer": false,
          "type": "float32"
        },
        {
          "name": "input",
          "is_buffer": true,
          "type": "uint8"
        },
        {
          "name": "result",
          "is_buffer": true,
          "type": "uint8"
        }
      ],
      "fingerprint": "[fingerprint]"
    }
    "#);
}

#[test]
fn header() {
    insta::assert_snapshot!(render(Emit::Header), @r#"
    // Generated by pbind. Do not edit.
    #ifndef PBIND_BLUR_H
    #define PBIND_BLUR_H

    #include <stdbool.h>
    #include <stdint.h>

    struct pbind_buffer_t;

    #ifdef __cplusplus
    extern "C" {
    #endif

    int blur(float gain, struct pbind_buffer_t *input, struct pbind_buffer_t *result);

    #ifdef __cplusplus
    }
    #endif

    #endif // PBIND_BLUR_H
    "#);
}

#[test]
fn constraints() {
    insta::assert_snapshot!(render(Emit::Constraints), @r"
    param gain: float32
      min_value = 0.5f
      max_value = 4.0f
    image input: uint8[3]
      stride.0 = 1
      extent.2 = 3
    output result: uint8[3]
      min.2 = 0
      extent.2 = input.extent.2
    ");
}

#[test]
fn show() {
    insta::assert_snapshot!(render(Emit::Show), @r"
    (input(x, _0, _1) + uint8(1))
    ((input.min.0 + (input.extent.0 - 1)) - input.min.0)
    ");
}

#[test]
fn diagnostics() {
    let src = "\
param k: int32
image im: uint8[1]
k.set_range(9, 2)
show im(k, 0)
show im(1.5)
";
    let resolved = driver::check("diag.pif", src);
    let rendered: Vec<String> = resolved.diagnostics.iter().map(|d| d.to_string()).collect();
    insta::assert_snapshot!(rendered.join("\n"), @r"
    Warning at diag.pif:3:1:
    Param k has an empty range [9, 2]
    Error at diag.pif:4:1:
    2-argument access to ImageParam im, which has 1 dimensions.
    Error at diag.pif:5:1:
    Implicit cast from float32 to int in argument 1 in call to im is not allowed. Use an explicit cast.
    ");
}
