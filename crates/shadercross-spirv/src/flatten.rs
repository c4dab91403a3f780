//! Splits matrix-typed vertex inputs into one vector input per column.
//!
//! HLSL vertex inputs are bound by semantic, one attribute slot per location. A `mat4` input at
//! location `L` really occupies locations `L..L+4`, but HLSL code generators emit it as a single
//! matrix semantic. Rewriting the module so each column is its own `vec4` input at `L + i`
//! keeps the attribute layout the vertex-buffer bindings expect.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::entry_point::{EntryPoint, ExecutionModel};
use crate::error::SpirvError;
use crate::module::{encode_string, Instruction, SpirvModule};
use crate::opcode::{decoration, op, storage_class};
use crate::types::{TypeInfo, TypeTable};

/// One matrix input that was split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlattenedInput {
    pub name: Option<String>,
    /// Id of the removed matrix variable.
    pub variable: u32,
    pub first_location: u32,
    /// Column variables in column order; column `i` sits at `first_location + i`.
    pub columns: Vec<u32>,
}

#[derive(Debug)]
struct Plan {
    name: Option<String>,
    location: u32,
    matrix_type: u32,
    column_type: u32,
    column_pointer: u32,
    columns: Vec<u32>,
}

/// Flattens every matrix-typed `Input` variable in a vertex entry point's interface.
///
/// A variable is only rewritten when each of its uses is a whole-matrix `OpLoad` or an access
/// chain whose first index is a constant column; anything else is reported with a warning and the
/// variable is left as it was.
pub fn flatten_matrix_vertex_inputs(
    module: &mut SpirvModule,
) -> Result<Vec<FlattenedInput>, SpirvError> {
    let types = TypeTable::build(module);
    let definitions = module.definitions();
    let first_function = module.first_function_index();

    let mut candidates = Vec::new();
    for ep in module.entry_points() {
        if ep.model != ExecutionModel::Vertex {
            continue;
        }
        for &var in &ep.interface {
            if candidates.iter().any(|(v, _, _)| *v == var) {
                continue;
            }
            let Some(&def) = definitions.get(&var) else {
                continue;
            };
            let inst = &module.instructions()[def];
            if inst.opcode != op::VARIABLE || def >= first_function {
                continue;
            }
            let Some((storage_class::INPUT, pointee)) =
                inst.operand(0).and_then(|ty| types.pointee(ty))
            else {
                continue;
            };
            let Some(TypeInfo::Matrix { column, columns }) = types.get(pointee) else {
                continue;
            };
            candidates.push((var, pointee, (column, columns)));
        }
    }

    let mut plans: HashMap<u32, Plan> = HashMap::new();
    let mut new_pointers: HashMap<u32, u32> = HashMap::new();
    for (var, matrix_type, (column_type, column_count)) in candidates {
        let name = module.debug_name(var);
        let Some(location) = module.decoration_literal(var, decoration::LOCATION) else {
            warn!(var, ?name, "matrix vertex input has no Location; leaving it unflattened");
            continue;
        };
        if let Err(reason) = check_uses(module, &definitions, &types, var, column_count) {
            warn!(var, ?name, reason, "matrix vertex input left unflattened");
            continue;
        }

        let column_pointer = match types.find_pointer(storage_class::INPUT, column_type) {
            Some(ptr) => ptr,
            None => match new_pointers.get(&column_type) {
                Some(&ptr) => ptr,
                None => {
                    let ptr = module.allocate_id()?;
                    new_pointers.insert(column_type, ptr);
                    ptr
                }
            },
        };
        let columns = (0..column_count)
            .map(|_| module.allocate_id())
            .collect::<Result<Vec<_>, _>>()?;
        plans.insert(
            var,
            Plan {
                name,
                location,
                matrix_type,
                column_type,
                column_pointer,
                columns,
            },
        );
    }

    if plans.is_empty() {
        return Ok(Vec::new());
    }

    // Ids for the per-column loads that replace each whole-matrix load, and the column variable
    // each access chain is rebased onto.
    let mut load_ids: HashMap<usize, Vec<u32>> = HashMap::new();
    let mut chain_columns: HashMap<usize, u32> = HashMap::new();
    let mut loads = Vec::new();
    for (index, inst) in module.instructions().iter().enumerate() {
        let Some(plan) = inst.operand(2).and_then(|ptr| plans.get(&ptr)) else {
            continue;
        };
        match inst.opcode {
            op::LOAD => loads.push((index, plan.columns.len())),
            op::ACCESS_CHAIN | op::IN_BOUNDS_ACCESS_CHAIN => {
                let column = constant_index(module, &definitions, &types, inst)
                    .and_then(|i| plan.columns.get(i as usize).copied())
                    .ok_or_else(|| {
                        let reason = "matrix column index is not constant";
                        SpirvError::malformed(index, inst.opcode, reason)
                    })?;
                chain_columns.insert(index, column);
            }
            _ => {}
        }
    }
    for (index, count) in loads {
        let ids = (0..count)
            .map(|_| module.allocate_id())
            .collect::<Result<Vec<_>, _>>()?;
        load_ids.insert(index, ids);
    }

    let old = std::mem::take(module.instructions_mut());
    let mut rewritten = Vec::with_capacity(old.len() + plans.len() * 8);
    let mut emitted_pointers: Vec<u32> = Vec::new();
    for (index, inst) in old.into_iter().enumerate() {
        match inst.opcode {
            op::ENTRY_POINT => {
                let mut ep = EntryPoint::decode(&inst, index)?;
                ep.interface = ep
                    .interface
                    .iter()
                    .flat_map(|id| match plans.get(id) {
                        Some(plan) => plan.columns.clone(),
                        None => vec![*id],
                    })
                    .collect();
                rewritten.push(ep.encode());
            }
            op::NAME if inst.operand(0).is_some_and(|id| plans.contains_key(&id)) => {
                let plan = &plans[&inst.operands[0]];
                let base = plan.name.clone().unwrap_or_default();
                for (i, &column) in plan.columns.iter().enumerate() {
                    let mut operands = vec![column];
                    operands.extend(encode_string(&format!("{base}_{i}")));
                    rewritten.push(Instruction::new(op::NAME, operands));
                }
            }
            op::DECORATE if inst.operand(0).is_some_and(|id| plans.contains_key(&id)) => {
                let plan = &plans[&inst.operands[0]];
                let is_location = inst.operand(1) == Some(decoration::LOCATION);
                for (i, &column) in plan.columns.iter().enumerate() {
                    let mut operands = inst.operands.clone();
                    operands[0] = column;
                    if is_location {
                        operands.truncate(2);
                        operands.push(plan.location + i as u32);
                    }
                    rewritten.push(Instruction::new(op::DECORATE, operands));
                }
            }
            op::VARIABLE if inst.operand(1).is_some_and(|id| plans.contains_key(&id)) => {
                let plan = &plans[&inst.operands[1]];
                if new_pointers.get(&plan.column_type) == Some(&plan.column_pointer)
                    && !emitted_pointers.contains(&plan.column_pointer)
                {
                    emitted_pointers.push(plan.column_pointer);
                    rewritten.push(Instruction::new(
                        op::TYPE_POINTER,
                        vec![plan.column_pointer, storage_class::INPUT, plan.column_type],
                    ));
                }
                for &column in &plan.columns {
                    rewritten.push(Instruction::new(
                        op::VARIABLE,
                        vec![plan.column_pointer, column, storage_class::INPUT],
                    ));
                }
            }
            op::LOAD if load_ids.contains_key(&index) => {
                let plan = &plans[&inst.operands[2]];
                let ids = &load_ids[&index];
                for (&load, &column) in ids.iter().zip(&plan.columns) {
                    rewritten.push(Instruction::new(
                        op::LOAD,
                        vec![plan.column_type, load, column],
                    ));
                }
                let mut operands = vec![plan.matrix_type, inst.operands[1]];
                operands.extend_from_slice(ids);
                rewritten.push(Instruction::new(op::COMPOSITE_CONSTRUCT, operands));
            }
            op::ACCESS_CHAIN | op::IN_BOUNDS_ACCESS_CHAIN
                if chain_columns.contains_key(&index) =>
            {
                // The column index is consumed by choosing the column variable.
                let mut operands = vec![inst.operands[0], inst.operands[1], chain_columns[&index]];
                operands.extend_from_slice(&inst.operands[4..]);
                rewritten.push(Instruction::new(inst.opcode, operands));
            }
            _ => rewritten.push(inst),
        }
    }
    *module.instructions_mut() = rewritten;

    let mut flattened: Vec<FlattenedInput> = plans
        .into_iter()
        .map(|(variable, plan)| FlattenedInput {
            name: plan.name,
            variable,
            first_location: plan.location,
            columns: plan.columns,
        })
        .collect();
    flattened.sort_by_key(|input| input.first_location);
    for input in &flattened {
        debug!(
            name = ?input.name,
            location = input.first_location,
            columns = input.columns.len(),
            "flattened matrix vertex input"
        );
    }
    Ok(flattened)
}

/// Checks that every use of `var` inside function bodies can be rewritten.
fn check_uses(
    module: &SpirvModule,
    definitions: &HashMap<u32, usize>,
    types: &TypeTable,
    var: u32,
    column_count: u32,
) -> Result<(), &'static str> {
    let first_function = module.first_function_index();
    for inst in &module.instructions()[first_function..] {
        // Operands are compared by value, so a literal that happens to equal the id is treated
        // as a use. That only ever makes the check stricter.
        if !inst.operands.contains(&var) || matches!(inst.opcode, op::LINE | op::NO_LINE) {
            continue;
        }
        match inst.opcode {
            op::LOAD if inst.operand(2) == Some(var) && !inst.operands[..2].contains(&var) => {}
            op::ACCESS_CHAIN | op::IN_BOUNDS_ACCESS_CHAIN
                if inst.operand(2) == Some(var) && !inst.operands[..2].contains(&var) =>
            {
                match constant_index(module, definitions, types, inst) {
                    Some(i) if i < column_count => {}
                    Some(_) => return Err("access chain column index is out of range"),
                    None => return Err("access chain uses a dynamic column index"),
                }
            }
            _ => return Err("variable is used by an instruction other than a load or access chain"),
        }
    }
    Ok(())
}

/// Value of an access chain's first index when it is an integer `OpConstant`.
fn constant_index(
    module: &SpirvModule,
    definitions: &HashMap<u32, usize>,
    types: &TypeTable,
    chain: &Instruction,
) -> Option<u32> {
    let index_id = chain.operand(3)?;
    let constant = module.instructions().get(*definitions.get(&index_id)?)?;
    if constant.opcode != op::CONSTANT {
        return None;
    }
    match (types.get(constant.operand(0)?)?, constant.operands.as_slice()) {
        (TypeInfo::Int { width: 32, .. }, [_, _, value]) => Some(*value),
        _ => None,
    }
}
