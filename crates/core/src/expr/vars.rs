//! Builtin variable tables for each kind of preset program.
//!
//! Every table begins with the same block of read-only inputs (time, audio
//! levels, mesh and viewport size) so they can be bound by one routine.

/// How a builtin may be used by preset code.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Access {
    /// Rebound by the engine before every execution.
    Input,
    /// Read-write. Consumers apply the declared range when they read it.
    Output { min: f64, max: f64 },
}

const FREE: Access = Access::Output {
    min: f64::NEG_INFINITY,
    max: f64::INFINITY,
};

const fn range(min: f64, max: f64) -> Access {
    Access::Output { min, max }
}

const IN: Access = Access::Input;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Builtin {
    pub name: &'static str,
    pub access: Access,
    pub default: f64,
}

impl Builtin {
    /// Applies the declared range, if any. NaN reads as the lower bound.
    pub fn clamp(&self, value: f64) -> f64 {
        match self.access {
            Access::Input => value,
            Access::Output { min, max } => {
                if value.is_nan() {
                    if min.is_finite() {
                        min
                    } else {
                        value
                    }
                } else {
                    value.clamp(min, max)
                }
            }
        }
    }
}

/// Number of entries in the shared input block.
pub const COMMON_INPUTS: usize = 17;

macro_rules! builtin_vars {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($variant:ident => ($text:literal, $access:expr, $default:expr)),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(usize)]
        pub enum $name {
            Time,
            Fps,
            Frame,
            Progress,
            Bass,
            Mid,
            Treb,
            BassAtt,
            MidAtt,
            TrebAtt,
            Vol,
            MeshX,
            MeshY,
            PixelsX,
            PixelsY,
            AspectX,
            AspectY,
            $($variant),*
        }

        impl $name {
            pub const TABLE: &'static [Builtin] = &[
                Builtin { name: "time", access: IN, default: 0.0 },
                Builtin { name: "fps", access: IN, default: 60.0 },
                Builtin { name: "frame", access: IN, default: 0.0 },
                Builtin { name: "progress", access: IN, default: 0.0 },
                Builtin { name: "bass", access: IN, default: 1.0 },
                Builtin { name: "mid", access: IN, default: 1.0 },
                Builtin { name: "treb", access: IN, default: 1.0 },
                Builtin { name: "bass_att", access: IN, default: 1.0 },
                Builtin { name: "mid_att", access: IN, default: 1.0 },
                Builtin { name: "treb_att", access: IN, default: 1.0 },
                Builtin { name: "vol", access: IN, default: 1.0 },
                Builtin { name: "meshx", access: IN, default: 0.0 },
                Builtin { name: "meshy", access: IN, default: 0.0 },
                Builtin { name: "pixelsx", access: IN, default: 0.0 },
                Builtin { name: "pixelsy", access: IN, default: 0.0 },
                Builtin { name: "aspectx", access: IN, default: 1.0 },
                Builtin { name: "aspecty", access: IN, default: 1.0 },
                $(Builtin { name: $text, access: $access, default: $default }),*
            ];

            pub const COUNT: usize = Self::TABLE.len();

            pub const fn index(self) -> usize {
                self as usize
            }

            pub fn builtin(self) -> &'static Builtin {
                &Self::TABLE[self as usize]
            }
        }
    };
}

builtin_vars! {
    /// Variables of the per-frame program.
    pub enum FrameVar {
        Zoom => ("zoom", FREE, 1.0),
        ZoomExp => ("zoomexp", FREE, 1.0),
        Rot => ("rot", FREE, 0.0),
        Warp => ("warp", FREE, 1.0),
        Cx => ("cx", FREE, 0.5),
        Cy => ("cy", FREE, 0.5),
        Dx => ("dx", FREE, 0.0),
        Dy => ("dy", FREE, 0.0),
        Sx => ("sx", FREE, 1.0),
        Sy => ("sy", FREE, 1.0),
        Decay => ("decay", range(0.0, 1.0), 0.98),
        Gamma => ("gamma", range(0.0, 8.0), 2.0),
        EchoZoom => ("echo_zoom", range(0.001, 1000.0), 2.0),
        EchoAlpha => ("echo_alpha", range(0.0, 1.0), 0.0),
        EchoOrient => ("echo_orient", range(0.0, 3.0), 0.0),
        WaveMode => ("wave_mode", range(0.0, 7.0), 0.0),
        WaveA => ("wave_a", range(0.0, 1.0), 0.8),
        WaveR => ("wave_r", range(0.0, 1.0), 1.0),
        WaveG => ("wave_g", range(0.0, 1.0), 1.0),
        WaveB => ("wave_b", range(0.0, 1.0), 1.0),
        WaveX => ("wave_x", range(0.0, 1.0), 0.5),
        WaveY => ("wave_y", range(0.0, 1.0), 0.5),
        WaveMystery => ("wave_mystery", range(-1.0, 1.0), 0.0),
        WaveUseDots => ("wave_usedots", FREE, 0.0),
        WaveThick => ("wave_thick", FREE, 0.0),
        WaveAdditive => ("wave_additive", FREE, 0.0),
        WaveBrighten => ("wave_brighten", FREE, 1.0),
        ObSize => ("ob_size", range(0.0, 0.5), 0.01),
        ObR => ("ob_r", range(0.0, 1.0), 0.0),
        ObG => ("ob_g", range(0.0, 1.0), 0.0),
        ObB => ("ob_b", range(0.0, 1.0), 0.0),
        ObA => ("ob_a", range(0.0, 1.0), 0.0),
        IbSize => ("ib_size", range(0.0, 0.5), 0.01),
        IbR => ("ib_r", range(0.0, 1.0), 0.25),
        IbG => ("ib_g", range(0.0, 1.0), 0.25),
        IbB => ("ib_b", range(0.0, 1.0), 0.25),
        IbA => ("ib_a", range(0.0, 1.0), 0.0),
        MvX => ("mv_x", range(0.0, 64.0), 12.0),
        MvY => ("mv_y", range(0.0, 48.0), 9.0),
        MvDx => ("mv_dx", FREE, 0.0),
        MvDy => ("mv_dy", FREE, 0.0),
        MvL => ("mv_l", range(0.0, 5.0), 0.9),
        MvR => ("mv_r", range(0.0, 1.0), 1.0),
        MvG => ("mv_g", range(0.0, 1.0), 1.0),
        MvB => ("mv_b", range(0.0, 1.0), 1.0),
        MvA => ("mv_a", range(0.0, 1.0), 0.0),
        DarkenCenter => ("darken_center", FREE, 0.0),
        Darken => ("darken", FREE, 0.0),
        Invert => ("invert", FREE, 0.0),
        Brighten => ("brighten", FREE, 0.0),
        Solarize => ("solarize", FREE, 0.0),
        WarpAnimSpeed => ("warpanimspeed", FREE, 1.0),
        WarpScale => ("warpscale", FREE, 1.0),
        Blur1Min => ("blur1_min", range(0.0, 1.0), 0.0),
        Blur1Max => ("blur1_max", range(0.0, 1.0), 1.0),
        Blur2Min => ("blur2_min", range(0.0, 1.0), 0.0),
        Blur2Max => ("blur2_max", range(0.0, 1.0), 1.0),
        Blur3Min => ("blur3_min", range(0.0, 1.0), 0.0),
        Blur3Max => ("blur3_max", range(0.0, 1.0), 1.0),
        Blur1EdgeDarken => ("b1ed", range(0.0, 1.0), 0.25),
        Monitor => ("monitor", FREE, 0.0),
    }
}

builtin_vars! {
    /// Variables of the per-pixel (per-vertex) program.
    pub enum PixelVar {
        X => ("x", IN, 0.0),
        Y => ("y", IN, 0.0),
        Rad => ("rad", IN, 0.0),
        Ang => ("ang", IN, 0.0),
        Zoom => ("zoom", FREE, 1.0),
        ZoomExp => ("zoomexp", FREE, 1.0),
        Rot => ("rot", FREE, 0.0),
        Warp => ("warp", FREE, 1.0),
        Cx => ("cx", FREE, 0.5),
        Cy => ("cy", FREE, 0.5),
        Dx => ("dx", FREE, 0.0),
        Dy => ("dy", FREE, 0.0),
        Sx => ("sx", FREE, 1.0),
        Sy => ("sy", FREE, 1.0),
    }
}

builtin_vars! {
    /// Variables of a custom shape's per-frame program.
    pub enum ShapeVar {
        X => ("x", FREE, 0.5),
        Y => ("y", FREE, 0.5),
        Rad => ("rad", FREE, 0.1),
        Ang => ("ang", FREE, 0.0),
        Sides => ("sides", range(3.0, 100.0), 4.0),
        R => ("r", range(0.0, 1.0), 1.0),
        G => ("g", range(0.0, 1.0), 0.0),
        B => ("b", range(0.0, 1.0), 0.0),
        A => ("a", range(0.0, 1.0), 1.0),
        R2 => ("r2", range(0.0, 1.0), 0.0),
        G2 => ("g2", range(0.0, 1.0), 1.0),
        B2 => ("b2", range(0.0, 1.0), 0.0),
        A2 => ("a2", range(0.0, 1.0), 0.0),
        BorderR => ("border_r", range(0.0, 1.0), 1.0),
        BorderG => ("border_g", range(0.0, 1.0), 1.0),
        BorderB => ("border_b", range(0.0, 1.0), 1.0),
        BorderA => ("border_a", range(0.0, 1.0), 0.1),
        Additive => ("additive", FREE, 0.0),
        ThickOutline => ("thickoutline", FREE, 0.0),
        Textured => ("textured", FREE, 0.0),
        TexZoom => ("tex_zoom", FREE, 1.0),
        TexAng => ("tex_ang", FREE, 0.0),
        NumInst => ("num_inst", range(1.0, 1024.0), 1.0),
        Instance => ("instance", IN, 0.0),
        Enabled => ("enabled", FREE, 1.0),
    }
}

builtin_vars! {
    /// Variables shared by a custom wave's per-frame and per-point programs.
    pub enum WaveVar {
        R => ("r", range(0.0, 1.0), 1.0),
        G => ("g", range(0.0, 1.0), 1.0),
        B => ("b", range(0.0, 1.0), 1.0),
        A => ("a", range(0.0, 1.0), 1.0),
        Samples => ("samples", range(2.0, 512.0), 512.0),
        Sep => ("sep", range(0.0, 256.0), 0.0),
        Scaling => ("scaling", FREE, 1.0),
        Smoothing => ("smoothing", range(0.0, 0.9), 0.5),
        Spectrum => ("spectrum", FREE, 0.0),
        UseDots => ("usedots", FREE, 0.0),
        Thick => ("thick", FREE, 0.0),
        Additive => ("additive", FREE, 0.0),
        Enabled => ("enabled", FREE, 1.0),
        Sample => ("sample", IN, 0.0),
        Value1 => ("value1", IN, 0.0),
        Value2 => ("value2", IN, 0.0),
        X => ("x", FREE, 0.5),
        Y => ("y", FREE, 0.5),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tables_share_the_input_block() {
        for table in [
            FrameVar::TABLE,
            PixelVar::TABLE,
            ShapeVar::TABLE,
            WaveVar::TABLE,
        ] {
            for (index, builtin) in table.iter().take(COMMON_INPUTS).enumerate() {
                assert_eq!(builtin.name, FrameVar::TABLE[index].name);
                assert_eq!(builtin.access, Access::Input);
            }
        }
        assert_eq!(FrameVar::AspectY.index(), COMMON_INPUTS - 1);
        assert_eq!(FrameVar::Zoom.index(), COMMON_INPUTS);
    }

    #[test]
    fn enum_order_matches_table_names() {
        assert_eq!(FrameVar::Gamma.builtin().name, "gamma");
        assert_eq!(FrameVar::Monitor.builtin().name, "monitor");
        assert_eq!(PixelVar::Sy.builtin().name, "sy");
        assert_eq!(ShapeVar::Enabled.builtin().name, "enabled");
        assert_eq!(WaveVar::Y.builtin().name, "y");
    }

    #[test]
    fn ranges_clamp_outputs_only() {
        assert_eq!(FrameVar::Decay.builtin().clamp(1.5), 1.0);
        assert_eq!(FrameVar::Zoom.builtin().clamp(123.0), 123.0);
        assert_eq!(FrameVar::Time.builtin().clamp(-4.0), -4.0);
        assert_eq!(FrameVar::EchoZoom.builtin().clamp(f64::NAN), 0.001);
    }
}
