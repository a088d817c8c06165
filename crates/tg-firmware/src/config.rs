//! INI configuration loader for the six-axis machine and the runtime's
//! segment timing, grounded on the teacher's `PrinterConfig::load`: one
//! `[section]` per concern, `configparser::ini::Ini` doing the parsing,
//! `anyhow::Context` turning a missing required key into a file-and-key
//! error message. Optional per-axis keys fall back to
//! [`AxisConfig::default`]'s values rather than erroring.

use std::path::Path;

use anyhow::{Context, Result};
use configparser::ini::Ini;

use tg_core::axes::{
    AxesConfig, AxisConfig, AxisMode, HomingDirection, AXIS_COUNT, A, B, C, X, Y, Z,
};

const AXIS_SECTIONS: [(&str, usize); AXIS_COUNT] = [
    ("axis_x", X),
    ("axis_y", Y),
    ("axis_z", Z),
    ("axis_a", A),
    ("axis_b", B),
    ("axis_c", C),
];

/// The `[mcu]` section: timer tick rate and per-axis step scaling.
#[derive(Debug, Clone)]
pub struct McuConfig {
    pub timer_tick_hz: u32,
    pub steps_per_mm: [f64; AXIS_COUNT],
    /// Switch index the G38.2 probe cycle watches (spec §4.1).
    pub probe_input: usize,
}

/// The `[planner]` section: nominal segment duration and cornering knob.
#[derive(Debug, Clone, Copy)]
pub struct PlannerConfig {
    pub segment_time_s: f64,
}

/// The fully parsed machine configuration: axes, MCU timing, planner.
#[derive(Debug, Clone)]
pub struct MachineConfig {
    pub axes: AxesConfig,
    pub mcu: McuConfig,
    pub planner: PlannerConfig,
}

impl MachineConfig {
    /// Loads and parses the configuration file at `path`. An axis section
    /// absent from the file keeps [`AxisConfig::default`]'s values.
    pub fn load(path: &Path) -> Result<Self> {
        let mut ini = Ini::new();
        ini.load(path)
            .map_err(anyhow::Error::msg)
            .with_context(|| format!("failed to load configuration file: {:?}", path))?;

        let mut axes = AxesConfig::default();
        for (section, idx) in AXIS_SECTIONS {
            axes.axes[idx] = Self::load_axis(&ini, section, axes.axes[idx]);
        }
        if let Ok(aggression) = ini.getfloat("planner", "junction_aggression") {
            axes.junction_aggression = aggression;
        }

        let mcu = McuConfig {
            timer_tick_hz: ini
                .getuint("mcu", "timer_tick_hz")
                .context("[mcu] timer_tick_hz not found")? as u32,
            steps_per_mm: Self::load_steps_per_mm(&ini),
            probe_input: ini.getuint("mcu", "probe_input").unwrap_or(1) as usize,
        };

        let planner = PlannerConfig {
            segment_time_s: ini
                .getfloat("planner", "segment_time_s")
                .unwrap_or(tg_core::runtime::DEFAULT_SEGMENT_TIME_S),
        };

        Ok(Self { axes, mcu, planner })
    }

    fn load_steps_per_mm(ini: &Ini) -> [f64; AXIS_COUNT] {
        let mut out = [1.0_f64; AXIS_COUNT];
        for (section, idx) in AXIS_SECTIONS {
            if let Ok(v) = ini.getfloat(section, "steps_per_mm") {
                out[idx] = v;
            }
        }
        out
    }

    /// Overlays present keys of `[section]` onto `base`, leaving absent
    /// keys untouched.
    fn load_axis(ini: &Ini, section: &str, mut base: AxisConfig) -> AxisConfig {
        if let Some(mode) = ini.get(section, "mode") {
            base.axis_mode = match mode.to_ascii_lowercase().as_str() {
                "standard" => AxisMode::Standard,
                "inhibited" => AxisMode::Inhibited,
                "radius" => AxisMode::Radius,
                _ => AxisMode::Disabled,
            };
        }
        if let Ok(v) = ini.getfloat(section, "velocity_max") {
            base.velocity_max = v;
        }
        if let Ok(v) = ini.getfloat(section, "feedrate_max") {
            base.feedrate_max = v;
        }
        if let Ok(v) = ini.getfloat(section, "travel_min") {
            base.travel_min = v;
        }
        if let Ok(v) = ini.getfloat(section, "travel_max") {
            base.travel_max = v;
        }
        if let Ok(v) = ini.getfloat(section, "jerk_max") {
            base.jerk_max = v;
            base.recip_jerk = 1.0 / v;
            base.jerk_high = ini.getfloat(section, "jerk_high").unwrap_or(v * 2.0);
        }
        if let Ok(v) = ini.getfloat(section, "junction_dev") {
            base.junction_dev = v;
        }
        if let Ok(v) = ini.getfloat(section, "radius_mm") {
            base.radius_mm = v;
        }
        if let Ok(v) = ini.getuint(section, "homing_input") {
            base.homing_input = v as usize;
        }
        if let Some(dir) = ini.get(section, "homing_dir") {
            base.homing_dir = match dir.to_ascii_lowercase().as_str() {
                "positive" => HomingDirection::Positive,
                _ => HomingDirection::Negative,
            };
        }
        if let Ok(v) = ini.getfloat(section, "search_velocity") {
            base.search_velocity = v;
        }
        if let Ok(v) = ini.getfloat(section, "latch_velocity") {
            base.latch_velocity = v;
        }
        if let Ok(v) = ini.getfloat(section, "latch_backoff") {
            base.latch_backoff = v;
        }
        if let Ok(v) = ini.getfloat(section, "zero_backoff") {
            base.zero_backoff = v;
        }
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    struct TempIni(PathBuf);

    impl TempIni {
        fn new(contents: &str) -> Self {
            let mut path = std::env::temp_dir();
            path.push(format!(
                "tg-firmware-test-{}-{}.cfg",
                std::process::id(),
                contents.len()
            ));
            std::fs::write(&path, contents).unwrap();
            Self(path)
        }
    }

    impl Drop for TempIni {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.0);
        }
    }

    #[test]
    fn missing_axis_sections_keep_defaults() {
        let tmp = TempIni::new("[mcu]\ntimer_tick_hz = 1000000\n");
        let cfg = MachineConfig::load(&tmp.0).unwrap();
        assert_eq!(cfg.mcu.timer_tick_hz, 1_000_000);
        assert_eq!(
            cfg.axes.axes[X].velocity_max,
            AxisConfig::default().velocity_max
        );
    }

    #[test]
    fn axis_section_overrides_are_applied() {
        let tmp = TempIni::new(
            "[mcu]\ntimer_tick_hz = 1000000\n\
             [axis_x]\nvelocity_max = 5000\nfeedrate_max = 4000\njerk_max = 50000000\nsteps_per_mm = 80\n",
        );
        let cfg = MachineConfig::load(&tmp.0).unwrap();
        assert_eq!(cfg.axes.axes[X].velocity_max, 5000.0);
        assert_eq!(cfg.axes.axes[X].feedrate_max, 4000.0);
        assert_eq!(cfg.mcu.steps_per_mm[X], 80.0);
    }

    #[test]
    fn missing_mcu_section_is_an_error() {
        let tmp = TempIni::new("[axis_x]\nvelocity_max = 100\n");
        let err = MachineConfig::load(&tmp.0).unwrap_err();
        assert!(format!("{err:#}").contains("timer_tick_hz"));
    }
}
