//! Render passes, descriptor set layouts and graphics pipelines

use std::ffi::CStr;

use ash::{vk, Device};

use super::{vk_format, vk_vertex_format, VulkanError, VulkanResult};
use crate::render::api::{
    BindGroupLayoutEntry, BindingType, BlendMode, CullMode, PipelineDesc, ShaderStages, TextureFormat,
};

const ENTRY_POINT: &[u8] = b"main\0";

/// Single-subpass pass that clears its attachments
///
/// The color attachment ends in `TRANSFER_SRC_OPTIMAL` so any target can be
/// copied out after the pass.
pub(crate) fn create_render_pass(
    device: &Device,
    color: TextureFormat,
    depth: Option<TextureFormat>,
) -> VulkanResult<vk::RenderPass> {
    let mut attachments = vec![vk::AttachmentDescription::builder()
        .format(vk_format(color))
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::STORE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(vk::ImageLayout::TRANSFER_SRC_OPTIMAL)
        .build()];
    if let Some(depth) = depth {
        attachments.push(
            vk::AttachmentDescription::builder()
                .format(vk_format(depth))
                .samples(vk::SampleCountFlags::TYPE_1)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::DONT_CARE)
                .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                .initial_layout(vk::ImageLayout::UNDEFINED)
                .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
                .build(),
        );
    }

    let color_refs = [vk::AttachmentReference { attachment: 0, layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL }];
    let depth_ref = vk::AttachmentReference { attachment: 1, layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL };
    let mut subpass = vk::SubpassDescription::builder()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(&color_refs);
    if depth.is_some() {
        subpass = subpass.depth_stencil_attachment(&depth_ref);
    }
    let subpasses = [subpass.build()];

    let attachment_stages =
        vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS;
    let dependencies = [
        vk::SubpassDependency {
            src_subpass: vk::SUBPASS_EXTERNAL,
            dst_subpass: 0,
            src_stage_mask: vk::PipelineStageFlags::TRANSFER | attachment_stages,
            dst_stage_mask: attachment_stages,
            src_access_mask: vk::AccessFlags::TRANSFER_READ,
            dst_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_WRITE | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            dependency_flags: vk::DependencyFlags::empty(),
        },
        vk::SubpassDependency {
            src_subpass: 0,
            dst_subpass: vk::SUBPASS_EXTERNAL,
            src_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            dst_stage_mask: vk::PipelineStageFlags::TRANSFER,
            src_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
            dst_access_mask: vk::AccessFlags::TRANSFER_READ,
            dependency_flags: vk::DependencyFlags::empty(),
        },
    ];

    let info = vk::RenderPassCreateInfo::builder()
        .attachments(&attachments)
        .subpasses(&subpasses)
        .dependencies(&dependencies);
    Ok(unsafe { device.create_render_pass(&info, None)? })
}

pub(crate) fn descriptor_type(ty: BindingType) -> vk::DescriptorType {
    match ty {
        BindingType::UniformBuffer { dynamic: true } => vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
        BindingType::UniformBuffer { dynamic: false } => vk::DescriptorType::UNIFORM_BUFFER,
        BindingType::TextureSampler => vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
    }
}

fn shader_stages(stages: ShaderStages) -> vk::ShaderStageFlags {
    let mut flags = vk::ShaderStageFlags::empty();
    if stages.contains(ShaderStages::VERTEX) {
        flags |= vk::ShaderStageFlags::VERTEX;
    }
    if stages.contains(ShaderStages::FRAGMENT) {
        flags |= vk::ShaderStageFlags::FRAGMENT;
    }
    flags
}

/// Graphics pipeline with the layouts needed to allocate its bind groups
pub(crate) struct VulkanPipeline {
    pub pipeline: vk::Pipeline,
    pub layout: vk::PipelineLayout,
    pub set_layouts: Vec<vk::DescriptorSetLayout>,
    pub desc: PipelineDesc,
}

impl VulkanPipeline {
    pub fn new(
        device: &Device,
        desc: &PipelineDesc,
        vertex: vk::ShaderModule,
        fragment: vk::ShaderModule,
        render_pass: vk::RenderPass,
    ) -> VulkanResult<Self> {
        let mut set_layouts = Vec::with_capacity(desc.bind_group_layouts.len());
        for group in &desc.bind_group_layouts {
            match create_set_layout(device, group) {
                Ok(layout) => set_layouts.push(layout),
                Err(e) => {
                    destroy_set_layouts(device, &set_layouts);
                    return Err(e);
                }
            }
        }

        let layout_info = vk::PipelineLayoutCreateInfo::builder().set_layouts(&set_layouts);
        let layout = match unsafe { device.create_pipeline_layout(&layout_info, None) } {
            Ok(layout) => layout,
            Err(e) => {
                destroy_set_layouts(device, &set_layouts);
                return Err(e.into());
            }
        };

        match create_graphics_pipeline(device, desc, vertex, fragment, render_pass, layout) {
            Ok(pipeline) => {
                log::debug!("Created Vulkan pipeline '{}'", desc.label);
                Ok(Self { pipeline, layout, set_layouts, desc: desc.clone() })
            }
            Err(e) => {
                unsafe { device.destroy_pipeline_layout(layout, None) };
                destroy_set_layouts(device, &set_layouts);
                Err(e)
            }
        }
    }

    pub fn destroy(&self, device: &Device) {
        unsafe {
            device.destroy_pipeline(self.pipeline, None);
            device.destroy_pipeline_layout(self.layout, None);
        }
        destroy_set_layouts(device, &self.set_layouts);
    }
}

fn create_set_layout(device: &Device, entries: &[BindGroupLayoutEntry]) -> VulkanResult<vk::DescriptorSetLayout> {
    let bindings: Vec<vk::DescriptorSetLayoutBinding> = entries
        .iter()
        .map(|entry| {
            vk::DescriptorSetLayoutBinding::builder()
                .binding(entry.binding)
                .descriptor_type(descriptor_type(entry.ty))
                .descriptor_count(1)
                .stage_flags(shader_stages(entry.visibility))
                .build()
        })
        .collect();
    let info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(&bindings);
    Ok(unsafe { device.create_descriptor_set_layout(&info, None)? })
}

fn destroy_set_layouts(device: &Device, layouts: &[vk::DescriptorSetLayout]) {
    for layout in layouts {
        unsafe { device.destroy_descriptor_set_layout(*layout, None) };
    }
}

fn create_graphics_pipeline(
    device: &Device,
    desc: &PipelineDesc,
    vertex: vk::ShaderModule,
    fragment: vk::ShaderModule,
    render_pass: vk::RenderPass,
    layout: vk::PipelineLayout,
) -> VulkanResult<vk::Pipeline> {
    let entry = CStr::from_bytes_with_nul(ENTRY_POINT).map_err(|e| VulkanError::InitializationFailed(e.to_string()))?;
    let stages = [
        vk::PipelineShaderStageCreateInfo::builder()
            .stage(vk::ShaderStageFlags::VERTEX)
            .module(vertex)
            .name(entry)
            .build(),
        vk::PipelineShaderStageCreateInfo::builder()
            .stage(vk::ShaderStageFlags::FRAGMENT)
            .module(fragment)
            .name(entry)
            .build(),
    ];

    let bindings = [vk::VertexInputBindingDescription {
        binding: 0,
        stride: desc.vertex_layout.stride,
        input_rate: vk::VertexInputRate::VERTEX,
    }];
    let attributes: Vec<vk::VertexInputAttributeDescription> = desc
        .vertex_layout
        .attributes
        .iter()
        .map(|attribute| vk::VertexInputAttributeDescription {
            location: attribute.location,
            binding: 0,
            format: vk_vertex_format(attribute.format),
            offset: attribute.offset,
        })
        .collect();
    let vertex_input = vk::PipelineVertexInputStateCreateInfo::builder()
        .vertex_binding_descriptions(&bindings)
        .vertex_attribute_descriptions(&attributes);

    let input_assembly =
        vk::PipelineInputAssemblyStateCreateInfo::builder().topology(vk::PrimitiveTopology::TRIANGLE_LIST);

    // Viewport and scissor are set per pass
    let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
        .viewport_count(1)
        .scissor_count(1);
    let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
    let dynamic_state = vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(&dynamic_states);

    let cull_mode = match desc.cull_mode {
        CullMode::None => vk::CullModeFlags::NONE,
        CullMode::Back => vk::CullModeFlags::BACK,
    };
    let rasterization = vk::PipelineRasterizationStateCreateInfo::builder()
        .polygon_mode(vk::PolygonMode::FILL)
        .cull_mode(cull_mode)
        .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
        .line_width(1.0);

    let multisample =
        vk::PipelineMultisampleStateCreateInfo::builder().rasterization_samples(vk::SampleCountFlags::TYPE_1);

    let depth_enabled = desc.depth_format.is_some();
    let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::builder()
        .depth_test_enable(depth_enabled)
        .depth_write_enable(depth_enabled)
        .depth_compare_op(vk::CompareOp::LESS);

    let blend_attachment = match desc.blend {
        BlendMode::Replace => vk::PipelineColorBlendAttachmentState::builder()
            .blend_enable(false)
            .color_write_mask(vk::ColorComponentFlags::RGBA),
        BlendMode::AlphaBlend => vk::PipelineColorBlendAttachmentState::builder()
            .blend_enable(true)
            .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
            .dst_color_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
            .color_blend_op(vk::BlendOp::ADD)
            .src_alpha_blend_factor(vk::BlendFactor::ONE)
            .dst_alpha_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
            .alpha_blend_op(vk::BlendOp::ADD)
            .color_write_mask(vk::ColorComponentFlags::RGBA),
    };
    let blend_attachments = [blend_attachment.build()];
    let color_blend = vk::PipelineColorBlendStateCreateInfo::builder().attachments(&blend_attachments);

    let info = vk::GraphicsPipelineCreateInfo::builder()
        .stages(&stages)
        .vertex_input_state(&vertex_input)
        .input_assembly_state(&input_assembly)
        .viewport_state(&viewport_state)
        .rasterization_state(&rasterization)
        .multisample_state(&multisample)
        .depth_stencil_state(&depth_stencil)
        .color_blend_state(&color_blend)
        .dynamic_state(&dynamic_state)
        .layout(layout)
        .render_pass(render_pass)
        .subpass(0);

    let pipelines = unsafe {
        device
            .create_graphics_pipelines(vk::PipelineCache::null(), &[info.build()], None)
            .map_err(|(_, e)| VulkanError::Api(e))?
    };
    pipelines
        .into_iter()
        .next()
        .ok_or_else(|| VulkanError::InitializationFailed(format!("no pipeline returned for '{}'", desc.label)))
}
