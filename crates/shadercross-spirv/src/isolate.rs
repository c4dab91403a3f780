use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::entry_point::{EntryPoint, ExecutionModel};
use crate::error::SpirvError;
use crate::module::SpirvModule;
use crate::opcode::op;

/// Result of [`isolate_entry_point`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsolatedEntryPoint {
    /// The entry point that was kept.
    pub entry_point: EntryPoint,
    pub removed_entry_points: Vec<EntryPoint>,
    /// Number of function bodies no longer reachable from the kept entry point.
    pub removed_functions: usize,
}

/// Reduces `module` to the single entry point `(model, name)`.
///
/// Other `OpEntryPoint`s and their execution modes are dropped, as is every function the kept
/// entry point cannot reach through `OpFunctionCall`. Debug names and decorations aimed at
/// removed functions go with them. Global variables are left alone.
pub fn isolate_entry_point(
    module: &mut SpirvModule,
    model: ExecutionModel,
    name: &str,
) -> Result<IsolatedEntryPoint, SpirvError> {
    let entry_points = module.entry_points();
    let Some(kept) = entry_points
        .iter()
        .find(|ep| ep.model == model && ep.name == name)
        .cloned()
    else {
        let available = entry_points
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        return Err(SpirvError::EntryPointNotFound {
            model,
            name: name.to_owned(),
            available,
        });
    };
    let removed_entry_points: Vec<EntryPoint> = entry_points
        .into_iter()
        .filter(|ep| !(ep.model == model && ep.name == name))
        .collect();

    let bodies = function_bodies(module)?;
    let reachable = reachable_functions(module, &bodies, kept.function);

    let mut dead_ids: HashSet<u32> = HashSet::new();
    let mut dead_ranges = Vec::new();
    for (function, range) in &bodies {
        if reachable.contains(function) {
            continue;
        }
        dead_ranges.push(range.clone());
        dead_ids.extend(
            module.instructions()[range.clone()]
                .iter()
                .filter_map(|inst| inst.result_id()),
        );
    }
    dead_ranges.sort_by_key(|range| range.start);

    let removed_functions = dead_ranges.len();
    let kept_function = kept.function;
    let mut index = 0usize;
    let mut ranges = dead_ranges.iter().peekable();
    module.instructions_mut().retain(|inst| {
        let current = index;
        index += 1;
        while ranges.peek().is_some_and(|range| range.end <= current) {
            ranges.next();
        }
        if ranges.peek().is_some_and(|range| range.contains(&current)) {
            return false;
        }
        match inst.opcode {
            op::ENTRY_POINT => {
                inst.operand(0) == Some(model.to_word())
                    && inst.operand(1) == Some(kept_function)
                    && EntryPoint::decode(inst, current).is_ok_and(|ep| ep.name == name)
            }
            op::EXECUTION_MODE | op::EXECUTION_MODE_ID => inst.operand(0) == Some(kept_function),
            op::NAME | op::DECORATE => inst
                .operand(0)
                .map_or(true, |target| !dead_ids.contains(&target)),
            _ => true,
        }
    });

    debug!(
        entry_point = %kept,
        removed_entry_points = removed_entry_points.len(),
        removed_functions,
        "isolated SPIR-V entry point"
    );

    Ok(IsolatedEntryPoint {
        entry_point: kept,
        removed_entry_points,
        removed_functions,
    })
}

/// Maps every function id to the instruction range of its body, `OpFunctionEnd` included.
fn function_bodies(
    module: &SpirvModule,
) -> Result<HashMap<u32, std::ops::Range<usize>>, SpirvError> {
    let mut bodies = HashMap::new();
    let mut open: Option<(u32, usize)> = None;
    for (index, inst) in module.instructions().iter().enumerate() {
        match inst.opcode {
            op::FUNCTION => {
                if open.is_some() {
                    return Err(SpirvError::malformed(
                        index,
                        inst.opcode,
                        "OpFunction inside another function",
                    ));
                }
                let id = inst.operand(1).ok_or_else(|| {
                    SpirvError::malformed(index, inst.opcode, "OpFunction without a result id")
                })?;
                open = Some((id, index));
            }
            op::FUNCTION_END => {
                let Some((id, start)) = open.take() else {
                    return Err(SpirvError::malformed(
                        index,
                        inst.opcode,
                        "OpFunctionEnd without OpFunction",
                    ));
                };
                bodies.insert(id, start..index + 1);
            }
            _ => {}
        }
    }
    if let Some((_, start)) = open {
        return Err(SpirvError::malformed(
            start,
            op::FUNCTION,
            "function is missing OpFunctionEnd",
        ));
    }
    Ok(bodies)
}

fn reachable_functions(
    module: &SpirvModule,
    bodies: &HashMap<u32, std::ops::Range<usize>>,
    root: u32,
) -> HashSet<u32> {
    let mut reachable = HashSet::from([root]);
    let mut stack = vec![root];
    while let Some(function) = stack.pop() {
        let Some(range) = bodies.get(&function) else {
            continue;
        };
        for inst in &module.instructions()[range.clone()] {
            if inst.opcode != op::FUNCTION_CALL {
                continue;
            }
            if let Some(callee) = inst.operand(2) {
                if reachable.insert(callee) {
                    stack.push(callee);
                }
            }
        }
    }
    reachable
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::fixtures;
    use pretty_assertions::assert_eq;

    fn two_entry_points() -> SpirvModule {
        SpirvModule::from_words(&fixtures::two_entry_points()).expect("fixture should parse")
    }

    #[test]
    fn keeps_only_the_requested_entry_point() {
        let mut module = two_entry_points();
        let isolated =
            isolate_entry_point(&mut module, ExecutionModel::Fragment, "PixelMain").unwrap();

        assert_eq!(isolated.entry_point.name, "PixelMain");
        assert_eq!(isolated.removed_entry_points.len(), 1);
        assert_eq!(isolated.removed_entry_points[0].name, "VertexMain");

        let names: Vec<String> = module.entry_points().into_iter().map(|ep| ep.name).collect();
        assert_eq!(names, vec!["PixelMain".to_owned()]);
    }

    #[test]
    fn drops_helpers_only_the_other_entry_point_calls() {
        let mut module = two_entry_points();
        let isolated =
            isolate_entry_point(&mut module, ExecutionModel::Fragment, "PixelMain").unwrap();
        // VertexMain and its helper.
        assert_eq!(isolated.removed_functions, 2);

        let functions = module
            .instructions()
            .iter()
            .filter(|inst| inst.opcode == op::FUNCTION)
            .count();
        assert_eq!(functions, 1);
        assert_eq!(module.debug_name(fixtures::TWO_EP_HELPER_ID), None);
    }

    #[test]
    fn keeps_helpers_the_entry_point_calls() {
        let mut module = two_entry_points();
        let isolated =
            isolate_entry_point(&mut module, ExecutionModel::Vertex, "VertexMain").unwrap();
        assert_eq!(isolated.removed_functions, 1);
        assert!(module.debug_name(fixtures::TWO_EP_HELPER_ID).is_some());

        let modes: Vec<u32> = module
            .instructions()
            .iter()
            .filter(|inst| inst.opcode == op::EXECUTION_MODE)
            .filter_map(|inst| inst.operand(0))
            .collect();
        assert!(modes.iter().all(|&target| target == isolated.entry_point.function));
    }

    #[test]
    fn model_must_match_as_well_as_name() {
        let mut module = two_entry_points();
        let err =
            isolate_entry_point(&mut module, ExecutionModel::Vertex, "PixelMain").unwrap_err();
        match err {
            SpirvError::EntryPointNotFound { available, .. } => {
                assert!(available.contains("Fragment \"PixelMain\""), "{available}");
                assert!(available.contains("Vertex \"VertexMain\""), "{available}");
            }
            other => panic!("unexpected error {other:?}"),
        }
        // A failed lookup leaves the module untouched.
        assert_eq!(module, two_entry_points());
    }
}
