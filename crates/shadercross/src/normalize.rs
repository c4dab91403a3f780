//! Combined image-sampler normalization.
//!
//! The IR keeps textures and samplers as separate resources. GLSL-family targets can only
//! sample through combined `sampler*` objects, which the code generator synthesizes: one per
//! (texture, sampler) pair, without a binding of its own. This module works out which pairs
//! exist, carries the application's binding slot onto each combined object, and reports what
//! was synthesized.

use shadercross_spirv::opcode::decoration;
use shadercross_spirv::{pair_samplerless_reads, sampler_pairs, SpirvModule};
use spirv_cross::{glsl, spirv};
use tracing::{debug, warn};

use crate::error::{codegen_error, PipelineError};

/// Where a combined object's sampling state comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SamplerSource {
    Declared(String),
    /// Synthesized for texel fetches and size queries, which never name a sampler.
    Dummy,
}

/// One combined texture+sampler object in generated GLSL-family text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombinedImageSampler {
    /// Name of the combined object in the generated text.
    pub combined: String,
    pub image: String,
    pub sampler: SamplerSource,
    pub slot: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PlannedPair {
    /// Variable ids in the IR handed to the code generator.
    pub image: u32,
    pub sampler: u32,
    pub image_name: String,
    pub source: SamplerSource,
    /// The texture's binding, or the sampler's when the texture has none.
    pub slot: Option<u32>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct NormalizationPlan {
    pub pairs: Vec<PlannedPair>,
    /// Texel fetches and queries routed through a sampler.
    pub rewritten_reads: usize,
}

/// Family-specific combined-sampler handling.
pub(crate) trait CombinedSamplerNormalizer {
    /// Code generator the combined objects are synthesized in.
    type Generator;

    /// Rewrites the IR so every texture access names a sampler, and lists the pairs.
    fn plan(&self, module: &mut SpirvModule) -> Result<NormalizationPlan, PipelineError>;

    /// Has the generator build the combined objects and binds each one to its pair's slot.
    fn synthesize(
        &self,
        plan: &NormalizationPlan,
        generator: &mut Self::Generator,
    ) -> Result<Vec<CombinedImageSampler>, PipelineError>;
}

pub(crate) struct GlslCombinedSamplers;

impl CombinedSamplerNormalizer for GlslCombinedSamplers {
    type Generator = spirv::Ast<glsl::Target>;

    fn plan(&self, module: &mut SpirvModule) -> Result<NormalizationPlan, PipelineError> {
        let reads = pair_samplerless_reads(module)?;

        let mut plan = NormalizationPlan {
            pairs: Vec::new(),
            rewritten_reads: reads.rewritten,
        };
        for pair in sampler_pairs(module) {
            let image_name = variable_name(module, pair.image);
            let source = if reads.dummy_sampler == Some(pair.sampler) {
                SamplerSource::Dummy
            } else {
                SamplerSource::Declared(variable_name(module, pair.sampler))
            };
            let slot = module
                .decoration_literal(pair.image, decoration::BINDING)
                .or_else(|| module.decoration_literal(pair.sampler, decoration::BINDING));
            match slot {
                None => warn!(
                    image = %image_name,
                    "texture has no binding; its combined sampler keeps no slot"
                ),
                Some(slot) => {
                    if let Some(other) = plan.pairs.iter().find(|p| p.slot == Some(slot)) {
                        warn!(
                            slot,
                            first = %other.image_name,
                            second = %image_name,
                            "two combined image-samplers share a binding slot"
                        );
                    }
                }
            }
            plan.pairs.push(PlannedPair {
                image: pair.image,
                sampler: pair.sampler,
                image_name,
                source,
                slot,
            });
        }

        debug!(
            pairs = plan.pairs.len(),
            rewritten_reads = plan.rewritten_reads,
            "planned combined image-samplers"
        );
        Ok(plan)
    }

    fn synthesize(
        &self,
        plan: &NormalizationPlan,
        ast: &mut spirv::Ast<glsl::Target>,
    ) -> Result<Vec<CombinedImageSampler>, PipelineError> {
        ast.build_combined_image_samplers()
            .map_err(|err| codegen_error("building combined image-samplers failed", err))?;
        let built = ast
            .get_combined_image_samplers()
            .map_err(|err| codegen_error("listing combined image-samplers failed", err))?;

        let mut combined = Vec::with_capacity(built.len());
        for entry in built {
            let planned = plan
                .pairs
                .iter()
                .find(|p| p.image == entry.image_id && p.sampler == entry.sampler_id)
                .or_else(|| plan.pairs.iter().find(|p| p.image == entry.image_id));
            let Some((planned, slot)) = planned.and_then(|p| p.slot.map(|slot| (p, slot))) else {
                warn!(
                    combined = entry.combined_id,
                    "combined image-sampler was emitted without a slot"
                );
                continue;
            };
            ast.set_decoration(entry.combined_id, spirv::Decoration::Binding, slot)
                .map_err(|err| codegen_error("binding a combined image-sampler failed", err))?;
            let name = ast
                .get_name(entry.combined_id)
                .map_err(|err| codegen_error("naming a combined image-sampler failed", err))?;
            combined.push(CombinedImageSampler {
                combined: if name.is_empty() {
                    format!("_{}", entry.combined_id)
                } else {
                    name
                },
                image: planned.image_name.clone(),
                sampler: planned.source.clone(),
                slot,
            });
        }
        combined.sort_by(|a, b| a.slot.cmp(&b.slot).then_with(|| a.combined.cmp(&b.combined)));
        debug!(combined = combined.len(), "synthesized combined image-samplers");
        Ok(combined)
    }
}

/// Debug name of a variable, or the `_<id>` the code generator falls back to.
fn variable_name(module: &SpirvModule, id: u32) -> String {
    module
        .debug_name(id)
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| format!("_{id}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use shadercross_spirv::test_utils::fixtures;

    fn parse(words: &[u32]) -> SpirvModule {
        SpirvModule::from_words(words).unwrap()
    }

    fn planned(plan: &NormalizationPlan) -> Vec<(String, SamplerSource, Option<u32>)> {
        plan.pairs
            .iter()
            .map(|p| (p.image_name.clone(), p.source.clone(), p.slot))
            .collect()
    }

    #[test]
    fn pairs_take_the_texture_slot() {
        let mut module = parse(&fixtures::separate_texture_and_sampler());
        let plan = GlslCombinedSamplers.plan(&mut module).unwrap();

        // The sampler's own binding (4) is not used.
        assert_eq!(
            planned(&plan),
            vec![(
                "albedo".to_owned(),
                SamplerSource::Declared("albedo_sampler".to_owned()),
                Some(3)
            )]
        );
        assert_eq!(plan.rewritten_reads, 0);
    }

    #[test]
    fn fetch_only_texture_pairs_with_the_dummy_sampler() {
        let mut module = parse(&fixtures::texel_fetch_without_sampler());
        let plan = GlslCombinedSamplers.plan(&mut module).unwrap();

        assert_eq!(
            planned(&plan),
            vec![("albedo".to_owned(), SamplerSource::Dummy, Some(3))]
        );
        assert_eq!(plan.rewritten_reads, 2);
    }

    #[test]
    fn fetch_of_a_sampled_texture_reuses_its_sampler() {
        let mut module = parse(&fixtures::sampled_and_fetched_texture());
        let plan = GlslCombinedSamplers.plan(&mut module).unwrap();

        assert_eq!(plan.pairs.len(), 1);
        assert_eq!(
            plan.pairs[0].source,
            SamplerSource::Declared("albedo_sampler".to_owned())
        );
        assert_eq!(plan.rewritten_reads, 2);
    }

    #[test]
    fn synthesized_object_is_bound_to_the_texture_slot() {
        let mut module = parse(&fixtures::separate_texture_and_sampler());
        let plan = GlslCombinedSamplers.plan(&mut module).unwrap();

        let words = module.to_words();
        let module = spirv::Module::from_words(&words);
        let mut ast = spirv::Ast::<glsl::Target>::parse(&module).unwrap();
        let mut options = glsl::CompilerOptions::default();
        options.version = glsl::Version::V4_30;
        ast.set_compiler_options(&options).unwrap();
        let combined = GlslCombinedSamplers.synthesize(&plan, &mut ast).unwrap();
        let text = ast.compile().unwrap();

        assert_eq!(combined.len(), 1);
        assert_eq!(combined[0].image, "albedo");
        assert_eq!(combined[0].slot, 3);
        assert!(text.contains(&combined[0].combined), "{text}");
        assert_eq!(text.matches("binding = 3").count(), 1, "{text}");
        assert!(!text.contains("binding = 4"), "{text}");
    }
}
