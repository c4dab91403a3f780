use crate::entry_point::ExecutionModel;
use crate::module::{encode_string, SPIRV_MAGIC};
use crate::opcode::{decoration, op};

/// Hand-assembles SPIR-V word streams for tests.
///
/// Instructions are emitted in call order, so callers are responsible for the logical layout
/// (capabilities, memory model, entry points, execution modes, debug, annotations, types and
/// globals, functions). Ids start at 1 and the header bound is derived in
/// [`ModuleBuilder::finish`].
#[derive(Debug, Default)]
pub struct ModuleBuilder {
    next_id: u32,
    body: Vec<u32>,
}

impl ModuleBuilder {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            body: Vec::new(),
        }
    }

    pub fn id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn inst(&mut self, opcode: u16, operands: &[u32]) {
        let word_count = u32::try_from(operands.len() + 1).expect("instruction too long");
        self.body.push((word_count << 16) | u32::from(opcode));
        self.body.extend_from_slice(operands);
    }

    pub fn capability(&mut self, capability: u32) {
        self.inst(op::CAPABILITY, &[capability]);
    }

    /// `OpMemoryModel Logical GLSL450`.
    pub fn memory_model(&mut self) {
        self.inst(op::MEMORY_MODEL, &[0, 1]);
    }

    pub fn entry_point(
        &mut self,
        model: ExecutionModel,
        function: u32,
        name: &str,
        interface: &[u32],
    ) {
        let mut operands = vec![model.to_word(), function];
        operands.extend(encode_string(name));
        operands.extend_from_slice(interface);
        self.inst(op::ENTRY_POINT, &operands);
    }

    pub fn execution_mode(&mut self, function: u32, mode: u32, literals: &[u32]) {
        let mut operands = vec![function, mode];
        operands.extend_from_slice(literals);
        self.inst(op::EXECUTION_MODE, &operands);
    }

    pub fn name(&mut self, target: u32, name: &str) {
        let mut operands = vec![target];
        operands.extend(encode_string(name));
        self.inst(op::NAME, &operands);
    }

    pub fn decorate(&mut self, target: u32, decoration: u32, literals: &[u32]) {
        let mut operands = vec![target, decoration];
        operands.extend_from_slice(literals);
        self.inst(op::DECORATE, &operands);
    }

    pub fn constant_f32(&mut self, ty: u32, id: u32, value: f32) {
        self.inst(op::CONSTANT, &[ty, id, value.to_bits()]);
    }

    /// SPIR-V 1.0 header followed by the emitted instructions.
    pub fn finish(self) -> Vec<u32> {
        let mut words = vec![SPIRV_MAGIC, 0x0001_0000, 0, self.next_id, 0];
        words.extend(self.body);
        words
    }

    pub fn finish_bytes(self) -> Vec<u8> {
        self.finish().into_iter().flat_map(u32::to_le_bytes).collect()
    }
}

/// Small, valid shader modules used across the test suites.
pub mod fixtures {
    use super::*;
    use crate::opcode::storage_class;

    const SHADER: u32 = 1;
    const ORIGIN_UPPER_LEFT: u32 = 7;
    const POSITION: u32 = 0;

    /// Id of `helper` in [`two_entry_points`]; it is the first id the fixture allocates.
    pub const TWO_EP_HELPER_ID: u32 = 1;

    /// Fragment shader writing `vec4(r, g, 0, 1)` where `r` (SpecId 0, default 0.25) and `g`
    /// (SpecId 1, default 0.5) are float specialization constants.
    pub fn fragment_with_spec_constants() -> Vec<u32> {
        fragment_writing_spec_constants([0, 1])
    }

    /// [`fragment_with_spec_constants`] with both constants declared as SpecId 0.
    pub fn fragment_with_shared_spec_id() -> Vec<u32> {
        fragment_writing_spec_constants([0, 0])
    }

    fn fragment_writing_spec_constants(spec_ids: [u32; 2]) -> Vec<u32> {
        let mut b = ModuleBuilder::new();
        let void = b.id();
        let fn_void = b.id();
        let f32_ty = b.id();
        let v4 = b.id();
        let ptr_out_v4 = b.id();
        let out_color = b.id();
        let sc_r = b.id();
        let sc_g = b.id();
        let zero = b.id();
        let one = b.id();
        let main = b.id();
        let label = b.id();
        let color = b.id();

        b.capability(SHADER);
        b.memory_model();
        b.entry_point(ExecutionModel::Fragment, main, "main", &[out_color]);
        b.execution_mode(main, ORIGIN_UPPER_LEFT, &[]);
        b.name(main, "main");
        b.name(out_color, "out_color");
        b.decorate(out_color, decoration::LOCATION, &[0]);
        b.decorate(sc_r, decoration::SPEC_ID, &[spec_ids[0]]);
        b.decorate(sc_g, decoration::SPEC_ID, &[spec_ids[1]]);
        b.inst(op::TYPE_VOID, &[void]);
        b.inst(op::TYPE_FUNCTION, &[fn_void, void]);
        b.inst(op::TYPE_FLOAT, &[f32_ty, 32]);
        b.inst(op::TYPE_VECTOR, &[v4, f32_ty, 4]);
        b.inst(op::TYPE_POINTER, &[ptr_out_v4, storage_class::OUTPUT, v4]);
        b.inst(op::VARIABLE, &[ptr_out_v4, out_color, storage_class::OUTPUT]);
        b.inst(op::SPEC_CONSTANT, &[f32_ty, sc_r, 0.25f32.to_bits()]);
        b.inst(op::SPEC_CONSTANT, &[f32_ty, sc_g, 0.5f32.to_bits()]);
        b.constant_f32(f32_ty, zero, 0.0);
        b.constant_f32(f32_ty, one, 1.0);
        b.inst(op::FUNCTION, &[void, main, 0, fn_void]);
        b.inst(op::LABEL, &[label]);
        b.inst(op::COMPOSITE_CONSTRUCT, &[v4, color, sc_r, sc_g, zero, one]);
        b.inst(op::STORE, &[out_color, color]);
        b.inst(op::RETURN, &[]);
        b.inst(op::FUNCTION_END, &[]);
        b.finish()
    }

    /// `VertexMain` (which calls `helper`, returning 123.5) and `PixelMain` in one module.
    pub fn two_entry_points() -> Vec<u32> {
        let mut b = ModuleBuilder::new();
        let helper = b.id();
        debug_assert_eq!(helper, TWO_EP_HELPER_ID);
        let void = b.id();
        let fn_void = b.id();
        let f32_ty = b.id();
        let fn_f32 = b.id();
        let v4 = b.id();
        let ptr_out_v4 = b.id();
        let pos_out = b.id();
        let color_out = b.id();
        let c_helper = b.id();
        let c_0 = b.id();
        let c_1 = b.id();
        let c_quarter = b.id();
        let c_half = b.id();
        let c_three_quarters = b.id();
        let vmain = b.id();
        let pmain = b.id();
        let (l_helper, l_vmain, l_pmain) = (b.id(), b.id(), b.id());
        let (h, pos, color) = (b.id(), b.id(), b.id());

        b.capability(SHADER);
        b.memory_model();
        b.entry_point(ExecutionModel::Vertex, vmain, "VertexMain", &[pos_out]);
        b.entry_point(ExecutionModel::Fragment, pmain, "PixelMain", &[color_out]);
        b.execution_mode(pmain, ORIGIN_UPPER_LEFT, &[]);
        b.name(helper, "helper");
        b.name(vmain, "VertexMain");
        b.name(pmain, "PixelMain");
        b.decorate(pos_out, decoration::BUILT_IN, &[POSITION]);
        b.decorate(color_out, decoration::LOCATION, &[0]);
        b.inst(op::TYPE_VOID, &[void]);
        b.inst(op::TYPE_FUNCTION, &[fn_void, void]);
        b.inst(op::TYPE_FLOAT, &[f32_ty, 32]);
        b.inst(op::TYPE_FUNCTION, &[fn_f32, f32_ty]);
        b.inst(op::TYPE_VECTOR, &[v4, f32_ty, 4]);
        b.inst(op::TYPE_POINTER, &[ptr_out_v4, storage_class::OUTPUT, v4]);
        b.inst(op::VARIABLE, &[ptr_out_v4, pos_out, storage_class::OUTPUT]);
        b.inst(op::VARIABLE, &[ptr_out_v4, color_out, storage_class::OUTPUT]);
        b.constant_f32(f32_ty, c_helper, 123.5);
        b.constant_f32(f32_ty, c_0, 0.0);
        b.constant_f32(f32_ty, c_1, 1.0);
        b.constant_f32(f32_ty, c_quarter, 0.25);
        b.constant_f32(f32_ty, c_half, 0.5);
        b.constant_f32(f32_ty, c_three_quarters, 0.75);

        b.inst(op::FUNCTION, &[f32_ty, helper, 0, fn_f32]);
        b.inst(op::LABEL, &[l_helper]);
        b.inst(op::RETURN_VALUE, &[c_helper]);
        b.inst(op::FUNCTION_END, &[]);

        b.inst(op::FUNCTION, &[void, vmain, 0, fn_void]);
        b.inst(op::LABEL, &[l_vmain]);
        b.inst(op::FUNCTION_CALL, &[f32_ty, h, helper]);
        b.inst(op::COMPOSITE_CONSTRUCT, &[v4, pos, h, c_0, c_0, c_1]);
        b.inst(op::STORE, &[pos_out, pos]);
        b.inst(op::RETURN, &[]);
        b.inst(op::FUNCTION_END, &[]);

        b.inst(op::FUNCTION, &[void, pmain, 0, fn_void]);
        b.inst(op::LABEL, &[l_pmain]);
        b.inst(
            op::COMPOSITE_CONSTRUCT,
            &[v4, color, c_quarter, c_half, c_three_quarters, c_1],
        );
        b.inst(op::STORE, &[color_out, color]);
        b.inst(op::RETURN, &[]);
        b.inst(op::FUNCTION_END, &[]);
        b.finish()
    }

    /// Ids of interest in [`vertex_with_matrix_input`].
    #[derive(Debug, Clone, Copy)]
    pub struct MatrixInputIds {
        pub position: u32,
        pub model: u32,
        pub column_pointer: u32,
    }

    /// Vertex shader with `vec4 position` at location 0 and `mat4 model` at location 1.
    ///
    /// `model` is used once as a whole matrix and once through an access chain selecting
    /// column 3.
    pub fn vertex_with_matrix_input() -> (Vec<u32>, MatrixInputIds) {
        let mut b = ModuleBuilder::new();
        let void = b.id();
        let fn_void = b.id();
        let f32_ty = b.id();
        let i32_ty = b.id();
        let v4 = b.id();
        let m4 = b.id();
        let ptr_in_v4 = b.id();
        let ptr_in_m4 = b.id();
        let ptr_out_v4 = b.id();
        let in_pos = b.id();
        let in_model = b.id();
        let out_pos = b.id();
        let c_3 = b.id();
        let main = b.id();
        let label = b.id();
        let (m, p, r, t_ptr, t) = (b.id(), b.id(), b.id(), b.id(), b.id());

        b.capability(SHADER);
        b.memory_model();
        b.entry_point(
            ExecutionModel::Vertex,
            main,
            "main",
            &[in_pos, in_model, out_pos],
        );
        b.name(in_pos, "position");
        b.name(in_model, "model");
        b.decorate(in_pos, decoration::LOCATION, &[0]);
        b.decorate(in_model, decoration::LOCATION, &[1]);
        b.decorate(out_pos, decoration::BUILT_IN, &[POSITION]);
        b.inst(op::TYPE_VOID, &[void]);
        b.inst(op::TYPE_FUNCTION, &[fn_void, void]);
        b.inst(op::TYPE_FLOAT, &[f32_ty, 32]);
        b.inst(op::TYPE_INT, &[i32_ty, 32, 1]);
        b.inst(op::TYPE_VECTOR, &[v4, f32_ty, 4]);
        b.inst(op::TYPE_MATRIX, &[m4, v4, 4]);
        b.inst(op::TYPE_POINTER, &[ptr_in_v4, storage_class::INPUT, v4]);
        b.inst(op::TYPE_POINTER, &[ptr_in_m4, storage_class::INPUT, m4]);
        b.inst(op::TYPE_POINTER, &[ptr_out_v4, storage_class::OUTPUT, v4]);
        b.inst(op::VARIABLE, &[ptr_in_v4, in_pos, storage_class::INPUT]);
        b.inst(op::VARIABLE, &[ptr_in_m4, in_model, storage_class::INPUT]);
        b.inst(op::VARIABLE, &[ptr_out_v4, out_pos, storage_class::OUTPUT]);
        b.inst(op::CONSTANT, &[i32_ty, c_3, 3]);

        b.inst(op::FUNCTION, &[void, main, 0, fn_void]);
        b.inst(op::LABEL, &[label]);
        b.inst(op::LOAD, &[m4, m, in_model]);
        b.inst(op::LOAD, &[v4, p, in_pos]);
        b.inst(op::MATRIX_TIMES_VECTOR, &[v4, r, m, p]);
        b.inst(op::ACCESS_CHAIN, &[ptr_in_v4, t_ptr, in_model, c_3]);
        b.inst(op::LOAD, &[v4, t, t_ptr]);
        b.inst(op::STORE, &[out_pos, r]);
        b.inst(op::RETURN, &[]);
        b.inst(op::FUNCTION_END, &[]);

        (
            b.finish(),
            MatrixInputIds {
                position: in_pos,
                model: in_model,
                column_pointer: ptr_in_v4,
            },
        )
    }

    /// Fragment shader sampling `texture2D` at binding 3 through a `sampler` at binding 4.
    pub fn separate_texture_and_sampler() -> Vec<u32> {
        texture_reads(true, false)
    }

    /// Fragment shader reading `texture2D` at binding 3 only through `texelFetch` and
    /// `textureSize`, with no sampler declared anywhere.
    pub fn texel_fetch_without_sampler() -> Vec<u32> {
        texture_reads(false, true)
    }

    /// [`separate_texture_and_sampler`] that also fetches and size-queries the same texture.
    pub fn sampled_and_fetched_texture() -> Vec<u32> {
        texture_reads(true, true)
    }

    fn texture_reads(sample: bool, fetch: bool) -> Vec<u32> {
        const IMAGE_QUERY: u32 = 50;
        const LOD_OPERAND: u32 = 0x2;

        let mut b = ModuleBuilder::new();
        let void = b.id();
        let fn_void = b.id();
        let f32_ty = b.id();
        let i32_ty = b.id();
        let v2 = b.id();
        let v2i = b.id();
        let v4 = b.id();
        let image = b.id();
        let sampler = b.id();
        let sampled_image = b.id();
        let ptr_image = b.id();
        let ptr_sampler = b.id();
        let ptr_out_v4 = b.id();
        let tex = b.id();
        let smp = b.id();
        let out_color = b.id();
        let c_half = b.id();
        let uv = b.id();
        let c_0 = b.id();
        let texel = b.id();
        let main = b.id();
        let label = b.id();
        let (ti, si, combined, sampled, fetched, size) =
            (b.id(), b.id(), b.id(), b.id(), b.id(), b.id());

        b.capability(SHADER);
        if fetch {
            b.capability(IMAGE_QUERY);
        }
        b.memory_model();
        b.entry_point(ExecutionModel::Fragment, main, "main", &[out_color]);
        b.execution_mode(main, ORIGIN_UPPER_LEFT, &[]);
        b.name(tex, "albedo");
        if sample {
            b.name(smp, "albedo_sampler");
        }
        b.decorate(tex, decoration::DESCRIPTOR_SET, &[0]);
        b.decorate(tex, decoration::BINDING, &[3]);
        if sample {
            b.decorate(smp, decoration::DESCRIPTOR_SET, &[0]);
            b.decorate(smp, decoration::BINDING, &[4]);
        }
        b.decorate(out_color, decoration::LOCATION, &[0]);
        b.inst(op::TYPE_VOID, &[void]);
        b.inst(op::TYPE_FUNCTION, &[fn_void, void]);
        b.inst(op::TYPE_FLOAT, &[f32_ty, 32]);
        b.inst(op::TYPE_INT, &[i32_ty, 32, 1]);
        b.inst(op::TYPE_VECTOR, &[v2, f32_ty, 2]);
        b.inst(op::TYPE_VECTOR, &[v2i, i32_ty, 2]);
        b.inst(op::TYPE_VECTOR, &[v4, f32_ty, 4]);
        // 2D, not depth, not arrayed, single-sampled, sampled, unknown format.
        b.inst(op::TYPE_IMAGE, &[image, f32_ty, 1, 0, 0, 0, 1, 0]);
        if sample {
            b.inst(op::TYPE_SAMPLER, &[sampler]);
            b.inst(op::TYPE_SAMPLED_IMAGE, &[sampled_image, image]);
        }
        b.inst(
            op::TYPE_POINTER,
            &[ptr_image, storage_class::UNIFORM_CONSTANT, image],
        );
        if sample {
            b.inst(
                op::TYPE_POINTER,
                &[ptr_sampler, storage_class::UNIFORM_CONSTANT, sampler],
            );
        }
        b.inst(op::TYPE_POINTER, &[ptr_out_v4, storage_class::OUTPUT, v4]);
        b.inst(op::VARIABLE, &[ptr_image, tex, storage_class::UNIFORM_CONSTANT]);
        if sample {
            b.inst(op::VARIABLE, &[ptr_sampler, smp, storage_class::UNIFORM_CONSTANT]);
        }
        b.inst(op::VARIABLE, &[ptr_out_v4, out_color, storage_class::OUTPUT]);
        b.constant_f32(f32_ty, c_half, 0.5);
        b.inst(op::CONSTANT_COMPOSITE, &[v2, uv, c_half, c_half]);
        b.inst(op::CONSTANT, &[i32_ty, c_0, 0]);
        b.inst(op::CONSTANT_COMPOSITE, &[v2i, texel, c_0, c_0]);

        b.inst(op::FUNCTION, &[void, main, 0, fn_void]);
        b.inst(op::LABEL, &[label]);
        b.inst(op::LOAD, &[image, ti, tex]);
        if sample {
            b.inst(op::LOAD, &[sampler, si, smp]);
            b.inst(op::SAMPLED_IMAGE, &[sampled_image, combined, ti, si]);
            b.inst(op::IMAGE_SAMPLE_IMPLICIT_LOD, &[v4, sampled, combined, uv]);
            b.inst(op::STORE, &[out_color, sampled]);
        }
        if fetch {
            b.inst(op::IMAGE_FETCH, &[v4, fetched, ti, texel, LOD_OPERAND, c_0]);
            b.inst(op::IMAGE_QUERY_SIZE_LOD, &[v2i, size, ti, c_0]);
            b.inst(op::STORE, &[out_color, fetched]);
        }
        b.inst(op::RETURN, &[]);
        b.inst(op::FUNCTION_END, &[]);
        b.finish()
    }
}
