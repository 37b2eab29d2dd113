use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

/// Interleaved position + texcoord, matching the `quad.vert` attribute
/// layout (location 0 = vec3 position, location 1 = vec2 texcoord).
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub(crate) struct QuadVertex {
    pub position: [f32; 3],
    pub tex_coord: [f32; 2],
}

/// Unit quad spanning NDC; texcoords put (0,0) at the top left so stream
/// images land upright.
pub(crate) const QUAD_VERTICES: [QuadVertex; 4] = [
    QuadVertex {
        position: [-1.0, 1.0, 0.0],
        tex_coord: [0.0, 0.0],
    },
    QuadVertex {
        position: [-1.0, -1.0, 0.0],
        tex_coord: [0.0, 1.0],
    },
    QuadVertex {
        position: [1.0, -1.0, 0.0],
        tex_coord: [1.0, 1.0],
    },
    QuadVertex {
        position: [1.0, 1.0, 0.0],
        tex_coord: [1.0, 0.0],
    },
];

pub(crate) const QUAD_INDICES: [u16; 6] = [0, 1, 2, 0, 2, 3];

/// One static full-screen quad reused for every textured draw; placement is
/// handled by the per-step transform uniform, not by the geometry.
pub(crate) struct QuadRenderer {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
}

impl QuadRenderer {
    pub(crate) fn new(device: &wgpu::Device) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("quad vertices"),
            contents: bytemuck::cast_slice(&QUAD_VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("quad indices"),
            contents: bytemuck::cast_slice(&QUAD_INDICES),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            vertex_buffer,
            index_buffer,
        }
    }

    pub(crate) fn vertex_layout() -> wgpu::VertexBufferLayout<'static> {
        const ATTRIBUTES: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![
            0 => Float32x3,
            1 => Float32x2,
        ];
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<QuadVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &ATTRIBUTES,
        }
    }

    pub(crate) fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint16);
        pass.draw_indexed(0..QUAD_INDICES.len() as u32, 0, 0..1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_ccw_triangles() {
        assert_eq!(QUAD_VERTICES.len(), 4);
        assert_eq!(QUAD_INDICES.len(), 6);
        for triangle in QUAD_INDICES.chunks_exact(3) {
            let [a, b, c] = [
                QUAD_VERTICES[triangle[0] as usize].position,
                QUAD_VERTICES[triangle[1] as usize].position,
                QUAD_VERTICES[triangle[2] as usize].position,
            ];
            let cross = (b[0] - a[0]) * (c[1] - a[1]) - (b[1] - a[1]) * (c[0] - a[0]);
            assert!(cross > 0.0, "triangle {triangle:?} is not counter-clockwise");
        }
    }

    #[test]
    fn texcoords_cover_the_unit_square_top_down() {
        // NDC top-left maps to uv (0,0), bottom-right to (1,1).
        let top_left = QUAD_VERTICES
            .iter()
            .find(|v| v.position[0] < 0.0 && v.position[1] > 0.0)
            .unwrap();
        assert_eq!(top_left.tex_coord, [0.0, 0.0]);
        let bottom_right = QUAD_VERTICES
            .iter()
            .find(|v| v.position[0] > 0.0 && v.position[1] < 0.0)
            .unwrap();
        assert_eq!(bottom_right.tex_coord, [1.0, 1.0]);
    }

    #[test]
    fn vertex_layout_matches_interleaving() {
        let layout = QuadRenderer::vertex_layout();
        assert_eq!(layout.array_stride, 20);
        assert_eq!(layout.attributes.len(), 2);
        assert_eq!(layout.attributes[1].offset, 12);
    }
}
