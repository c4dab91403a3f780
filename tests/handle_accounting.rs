use shadercross::{
    compile_to_ir, live_handles, transpile_from_ir, ShaderStage, SourceLanguage,
    SpecializationConstant, TargetLanguage, Transpiler,
};
use shadercross_spirv::test_utils::fixtures;

const FRAGMENT: &str = r#"#version 450
layout(set = 0, binding = 0) uniform texture2D t;
layout(set = 0, binding = 1) uniform sampler s;
layout(location = 0) in vec2 v_uv;
layout(location = 0) out vec4 o_color;
void main() {
    o_color = texture(sampler2D(t, s), v_uv);
}
"#;

fn words_to_bytes(words: &[u32]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_le_bytes()).collect()
}

#[test]
fn interleaved_calls_release_every_handle() {
    let baseline = live_handles();

    let ir = compile_to_ir(
        ShaderStage::Fragment,
        SourceLanguage::Glsl,
        FRAGMENT.as_bytes(),
        "main",
    );
    assert!(ir.is_success(), "{}", ir.error());
    assert_eq!(live_handles(), baseline);
    let ir = ir.into_bytes().expect("IR bytes");

    let spec_ir = words_to_bytes(&fixtures::fragment_with_spec_constants());
    let spec = [SpecializationConstant::f32(0, 0.5)];

    for round in 0..3 {
        // Front-end failure.
        let bad = compile_to_ir(
            ShaderStage::Fragment,
            SourceLanguage::Glsl,
            b"#version 450\nvoid main() { oops }",
            "main",
        );
        assert!(!bad.is_success());
        assert_eq!(live_handles(), baseline, "round {round}: front-end failure leaked");

        // Success on every target.
        for target in [TargetLanguage::Glsl, TargetLanguage::Essl, TargetLanguage::Hlsl] {
            let ok = transpile_from_ir(target, ShaderStage::Fragment, &ir, "main", None);
            assert!(ok.is_success(), "{}", ok.error());
            assert_eq!(live_handles(), baseline, "round {round}: {target} success leaked");
        }

        // IR parse failure.
        let truncated =
            transpile_from_ir(TargetLanguage::Glsl, ShaderStage::Fragment, &ir[..10], "main", None);
        assert!(!truncated.is_success());
        assert_eq!(live_handles(), baseline, "round {round}: parse failure leaked");

        // Failure after the module was parsed and partly rewritten.
        let missing =
            transpile_from_ir(TargetLanguage::Hlsl, ShaderStage::Fragment, &ir, "nope", None);
        assert!(!missing.is_success());
        assert_eq!(live_handles(), baseline, "round {round}: entry point failure leaked");

        // Failure after the code generator parsed the module.
        let too_old = Transpiler::new(shadercross::TranspileOptions {
            glsl_version: 100,
            ..Default::default()
        })
        .transpile(TargetLanguage::Glsl, ShaderStage::Fragment, &ir, "main", None);
        assert!(too_old.is_err());
        assert_eq!(live_handles(), baseline, "round {round}: generator failure leaked");

        let specialized = transpile_from_ir(
            TargetLanguage::Hlsl,
            ShaderStage::Fragment,
            &spec_ir,
            "main",
            Some(&spec),
        );
        assert!(specialized.is_success(), "{}", specialized.error());
        assert_eq!(live_handles(), baseline, "round {round}: specialization leaked");
    }
}
