use std::env;
use std::fs;
use std::path::PathBuf;
use std::process;

use anyhow::{bail, Context};
use shadercross::{
    SamplerSource, ShaderStage, SpecValue, SpecializationConstant, TargetLanguage, Transpiler,
};
use shadercross_spirv::{resource_bindings, spec_constant_slots, ScalarKind, SpirvModule};

fn usage() -> &'static str {
    "\
spv_dump: dump SPIR-V module structure and optionally transpile it

USAGE:
    cargo run -p shadercross --bin spv_dump -- <path.spv>
        [--target T --stage S [--entry NAME]] [--spec ID=TYPE:VALUE]...

FLAGS:
    --target T            Transpile to glsl, essl or hlsl and print the result
    --stage S             Stage of the entry point to transpile (vertex, fragment, compute)
    --entry NAME          Entry point name (default: the only entry point of the stage)
    --spec ID=TYPE:VALUE  Specialization override; TYPE is u32, i32, f32 or f64 (repeatable)
"
}

fn main() {
    if let Err(err) = real_main() {
        eprintln!("error: {err:#}");
        process::exit(1);
    }
}

fn parse_spec(arg: &str) -> anyhow::Result<SpecializationConstant> {
    let Some((id, typed)) = arg.split_once('=') else {
        bail!("--spec expects ID=TYPE:VALUE, got {arg:?}");
    };
    let Some((ty, value)) = typed.split_once(':') else {
        bail!("--spec expects ID=TYPE:VALUE, got {arg:?}");
    };
    let id = id
        .parse::<u32>()
        .with_context(|| format!("invalid specialization id {id:?}"))?;
    let value = match ty {
        "u32" => SpecValue::U32(value.parse().with_context(|| format!("invalid u32 {value:?}"))?),
        "i32" => SpecValue::I32(value.parse().with_context(|| format!("invalid i32 {value:?}"))?),
        "f32" => SpecValue::F32(value.parse().with_context(|| format!("invalid f32 {value:?}"))?),
        "f64" => SpecValue::F64(value.parse().with_context(|| format!("invalid f64 {value:?}"))?),
        _ => bail!("unknown specialization type {ty:?} (expected u32, i32, f32 or f64)"),
    };
    Ok(SpecializationConstant::new(id, value))
}

fn real_main() -> anyhow::Result<()> {
    let mut path: Option<PathBuf> = None;
    let mut target: Option<TargetLanguage> = None;
    let mut stage: Option<ShaderStage> = None;
    let mut entry: Option<String> = None;
    let mut specs = Vec::new();

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                print!("{}", usage());
                return Ok(());
            }
            "--target" | "--stage" | "--entry" | "--spec" => {
                let Some(v) = args.next() else {
                    bail!("{arg} requires a value");
                };
                match arg.as_str() {
                    "--target" => target = Some(v.parse()?),
                    "--stage" => stage = Some(v.parse()?),
                    "--entry" => entry = Some(v),
                    _ => specs.push(parse_spec(&v)?),
                }
            }
            _ if arg.starts_with('-') => {
                bail!("unknown option {arg:?}\n\n{}", usage());
            }
            _ => {
                if path.is_some() {
                    bail!("unexpected positional argument {arg:?}\n\n{}", usage());
                }
                path = Some(PathBuf::from(arg));
            }
        }
    }

    let Some(path) = path else {
        bail!("missing SPIR-V input path\n\n{}", usage());
    };

    let bytes = fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?;
    let module = SpirvModule::parse(&bytes)
        .with_context(|| format!("failed to parse {} as SPIR-V", path.display()))?;

    let header = module.header();
    let (major, minor) = header.version_major_minor();
    println!(
        "SPIR-V {major}.{minor} generator=0x{:08x} bound={} instructions={}",
        header.generator,
        header.bound,
        module.instructions().len()
    );

    let entry_points = module.entry_points();
    println!("entry points:");
    for ep in &entry_points {
        println!(
            "  {ep} function=%{} interface={:?}",
            ep.function, ep.interface
        );
    }

    let slots = spec_constant_slots(&module);
    if !slots.is_empty() {
        println!("specialization constants:");
        for slot in &slots {
            let default = match slot.kind {
                ScalarKind::Bool => format!("{:?}", slot.bool_default(&module).unwrap_or(false)),
                ScalarKind::Float { width: 32 } => {
                    format!("{}", f32::from_bits(slot.literal[0]))
                }
                ScalarKind::Float { width: 64 } => {
                    let bits = u64::from(slot.literal[0]) | (u64::from(slot.literal[1]) << 32);
                    format!("{}", f64::from_bits(bits))
                }
                _ => format!("{:?}", slot.literal),
            };
            println!(
                "  SpecId {:>3} %{} {:?} default={default}",
                slot.spec_id, slot.result_id, slot.kind
            );
        }
    }

    let resources = resource_bindings(&module);
    if !resources.is_empty() {
        println!("resources:");
        for r in &resources {
            println!(
                "  set={} binding={} {} {}",
                r.set,
                r.binding,
                r.kind,
                r.name.as_deref().unwrap_or("<unnamed>")
            );
        }
    }

    let Some(target) = target else {
        if stage.is_some() || entry.is_some() || !specs.is_empty() {
            bail!("--stage, --entry and --spec require --target\n\n{}", usage());
        }
        return Ok(());
    };
    let Some(stage) = stage else {
        bail!("--target requires --stage\n\n{}", usage());
    };
    let entry = match entry {
        Some(entry) => entry,
        None => {
            let mut matching = entry_points
                .iter()
                .filter(|ep| ep.model == stage.execution_model());
            match (matching.next(), matching.next()) {
                (Some(ep), None) => ep.name.clone(),
                (None, _) => bail!("module has no {stage} entry point"),
                (Some(_), Some(_)) => {
                    bail!("module has several {stage} entry points; pass --entry")
                }
            }
        }
    };

    let transpiled = Transpiler::default()
        .transpile(
            target,
            stage,
            &bytes,
            &entry,
            (!specs.is_empty()).then_some(specs.as_slice()),
        )
        .with_context(|| format!("failed to transpile {entry:?} to {target}"))?;

    let report = &transpiled.specialization;
    if !report.unmatched.is_empty() {
        println!("unmatched specialization ids: {:?}", report.unmatched);
    }
    for skipped in &report.skipped {
        println!(
            "skipped specialization SpecId {} (%{}): {:?}",
            skipped.spec_id, skipped.result_id, skipped.reason
        );
    }
    for c in &transpiled.combined_samplers {
        let sampler = match &c.sampler {
            SamplerSource::Declared(name) => name.as_str(),
            SamplerSource::Dummy => "<dummy>",
        };
        println!(
            "combined {} = {} + {} at slot {}",
            c.combined, c.image, sampler, c.slot
        );
    }
    for input in &transpiled.flattened_inputs {
        println!(
            "flattened {} -> locations {}..{}",
            input.name.as_deref().unwrap_or("<unnamed>"),
            input.first_location,
            input.first_location + input.columns.len() as u32
        );
    }
    println!();
    print!("{}", transpiled.text);
    Ok(())
}
