use std::f32::consts::{FRAC_PI_4, TAU};

use super::{to_clip, BatchList, Blend, DrawBatch, OverlayVertex, Primitive};
use crate::expr::{CompiledProgram, ExprContext, ShapeVar};
use crate::preset::ShapeDescription;
use crate::render::TextureId;
use crate::state::PresetState;
use crate::LoadError;

const SHAPE_SEED: u64 = 0x5eed_5a00;

/// Values one instance needs to emit its geometry.
struct ShapeInstance {
    x: f32,
    y: f32,
    radius: f32,
    angle: f32,
    sides: usize,
    center: [f32; 4],
    rim: [f32; 4],
    border: [f32; 4],
    blend: Blend,
    thick: bool,
    textured: bool,
    tex_zoom: f32,
    tex_angle: f32,
}

/// A preset-defined polygon, drawn `num_inst` times per frame.
#[derive(Debug)]
pub struct CustomShape {
    index: usize,
    enabled: bool,
    context: ExprContext,
    program: CompiledProgram,
    baseline: Vec<f64>,
    batches: BatchList,
}

impl CustomShape {
    /// Compiles the shape's code and runs its `init` program with the `q`
    /// channels the preset's own `init` left behind.
    pub fn load(
        index: usize,
        description: &ShapeDescription,
        state: &mut PresetState,
        mesh: (u32, u32),
    ) -> Result<Self, LoadError> {
        let mut context = ExprContext::new(ShapeVar::TABLE, SHAPE_SEED + index as u64);
        for (name, value) in &description.values {
            context.assign(name, *value, &mut state.globals);
        }
        context.set_q(&state.q);

        let init = context
            .compile(&description.init_code)
            .map_err(LoadError::InitCode)?;
        let program = context
            .compile(&description.per_frame_code)
            .map_err(|source| LoadError::Expression {
                program: "custom shape",
                source,
            })?;

        context.bind_common_inputs(state, mesh);
        context.execute(&init, &mut state.globals);
        let baseline = context.fixed_slots().to_vec();

        Ok(Self {
            index,
            enabled: description.enabled,
            context,
            program,
            baseline,
            batches: BatchList::new(),
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Instance count fixed at load time.
    pub fn instances(&self) -> usize {
        ShapeVar::NumInst
            .builtin()
            .clamp(self.baseline[ShapeVar::NumInst.index()])
            .floor() as usize
    }

    /// Runs the per-frame code once per instance and builds its geometry.
    pub fn draw(
        &mut self,
        state: &mut PresetState,
        mesh: (u32, u32),
        texture: Option<TextureId>,
    ) -> &[DrawBatch] {
        self.batches.clear();
        if !self.enabled {
            return self.batches.as_slice();
        }

        let aspect_y = state.context.aspect_y;
        for instance in 0..self.instances() {
            self.context.restore_fixed(&self.baseline);
            self.context.bind_common_inputs(state, mesh);
            self.context.set_q(&state.q);
            self.context
                .set(ShapeVar::Instance.index(), instance as f64);
            self.context.execute(&self.program, &mut state.globals);

            if self.context.get(ShapeVar::Enabled.index()) == 0.0 {
                continue;
            }
            let shape = self.read_instance();
            self.emit(&shape, aspect_y, texture);
        }
        self.batches.as_slice()
    }

    fn value(&self, var: ShapeVar) -> f32 {
        self.context.clamped(var.index()) as f32
    }

    fn color(&self, vars: [ShapeVar; 4]) -> [f32; 4] {
        vars.map(|var| self.value(var))
    }

    fn read_instance(&self) -> ShapeInstance {
        ShapeInstance {
            x: self.value(ShapeVar::X),
            y: self.value(ShapeVar::Y),
            radius: self.value(ShapeVar::Rad),
            angle: self.value(ShapeVar::Ang),
            sides: self.value(ShapeVar::Sides).floor() as usize,
            center: self.color([ShapeVar::R, ShapeVar::G, ShapeVar::B, ShapeVar::A]),
            rim: self.color([ShapeVar::R2, ShapeVar::G2, ShapeVar::B2, ShapeVar::A2]),
            border: self.color([
                ShapeVar::BorderR,
                ShapeVar::BorderG,
                ShapeVar::BorderB,
                ShapeVar::BorderA,
            ]),
            blend: Blend::from_flag(self.context.get(ShapeVar::Additive.index())),
            thick: self.context.get(ShapeVar::ThickOutline.index()) > 0.0,
            textured: self.context.get(ShapeVar::Textured.index()) > 0.0,
            tex_zoom: self.value(ShapeVar::TexZoom),
            tex_angle: self.value(ShapeVar::TexAng),
        }
    }

    fn emit(&mut self, shape: &ShapeInstance, aspect_y: f32, texture: Option<TextureId>) {
        let rim_point = |i: usize| {
            let angle = i as f32 / shape.sides as f32 * TAU + shape.angle + FRAC_PI_4;
            let (sin, cos) = angle.sin_cos();
            let position = to_clip(
                shape.x + shape.radius * cos * aspect_y,
                shape.y + shape.radius * sin,
            );
            (angle, position)
        };
        let tex_zoom = if shape.tex_zoom == 0.0 { 1.0 } else { shape.tex_zoom };

        let fan = self.batches.push(Primitive::TriangleFan, shape.blend);
        if shape.textured {
            fan.texture = texture;
        }
        let (cx, cy) = to_clip(shape.x, shape.y);
        fan.vertices
            .push(OverlayVertex::new(cx, cy, shape.center).with_uv(0.5, 0.5));
        for i in 0..=shape.sides {
            let (angle, (px, py)) = rim_point(i);
            let (sin, cos) = (angle + shape.tex_angle).sin_cos();
            fan.vertices.push(
                OverlayVertex::new(px, py, shape.rim).with_uv(
                    0.5 + 0.5 * cos / tex_zoom * aspect_y,
                    0.5 + 0.5 * sin / tex_zoom,
                ),
            );
        }

        if shape.border[3] > 0.0 {
            let outline = self.batches.push(Primitive::LineLoop, shape.blend);
            outline.thick = shape.thick;
            for i in 0..shape.sides {
                let (_, (px, py)) = rim_point(i);
                outline
                    .vertices
                    .push(OverlayVertex::new(px, py, shape.border));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape(per_frame: &str, values: &[(&str, f64)]) -> (CustomShape, PresetState) {
        let mut state = PresetState::default();
        let description = ShapeDescription {
            enabled: true,
            values: values.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            per_frame_code: per_frame.into(),
            ..Default::default()
        };
        let shape = CustomShape::load(0, &description, &mut state, (8, 6)).unwrap();
        (shape, state)
    }

    #[test]
    fn fan_has_centre_plus_closed_rim() {
        let (mut shape, mut state) = shape("sides = 6", &[("border_a", 0.0)]);
        let batches = shape.draw(&mut state, (8, 6), None);

        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].primitive, Primitive::TriangleFan);
        assert_eq!(batches[0].vertices.len(), 1 + 7);
        let (first, last) = (batches[0].vertices[1], batches[0].vertices[7]);
        assert!((first.position[0] - last.position[0]).abs() < 1e-5);
        assert!((first.position[1] - last.position[1]).abs() < 1e-5);
    }

    #[test]
    fn sides_and_instances_are_clamped() {
        let (mut shape, mut state) = shape("sides = 500", &[("num_inst", 5000.0)]);
        assert_eq!(shape.instances(), 1024);

        let batches = shape.draw(&mut state, (8, 6), None);
        // fan and outline per instance
        assert_eq!(batches.len(), 2 * 1024);
        assert_eq!(batches[0].vertices.len(), 1 + 101);
        assert_eq!(batches[1].vertices.len(), 100);
    }

    #[test]
    fn instance_variable_drives_each_copy() {
        let (mut shape, mut state) = shape(
            "x = 0.1 + instance * 0.2; enabled = instance != 1",
            &[("num_inst", 3.0), ("border_a", 0.0)],
        );
        let batches = shape.draw(&mut state, (8, 6), None);

        assert_eq!(batches.len(), 2);
        let centres: Vec<f32> = batches.iter().map(|b| b.vertices[0].position[0]).collect();
        assert!((centres[0] - (0.1 * 2.0 - 1.0)).abs() < 1e-6);
        assert!((centres[1] - (0.5 * 2.0 - 1.0)).abs() < 1e-6);
    }

    #[test]
    fn textured_shapes_carry_the_texture() {
        let (mut shape, mut state) = shape("textured = 1", &[]);
        let batches = shape.draw(&mut state, (8, 6), Some(TextureId(9)));
        assert_eq!(batches[0].texture, Some(TextureId(9)));
    }

    #[test]
    fn disabled_shape_draws_nothing() {
        let mut state = PresetState::default();
        let description = ShapeDescription::default();
        let mut shape = CustomShape::load(2, &description, &mut state, (8, 6)).unwrap();
        assert!(shape.draw(&mut state, (8, 6), None).is_empty());
    }
}
