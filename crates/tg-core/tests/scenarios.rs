//! Scenario tests covering the six concrete walkthroughs and the
//! round-trip/idempotence properties.

use tg_core::axes::{AxesConfig, A, X, Y};
use tg_core::canonical_machine::CanonicalMachine;
use tg_core::error::{CoreError, Stat};
use tg_core::model::{CoordSystem, GCodeInput, MotionWord};
use tg_core::planner::Planner;
use tg_core::runtime::Runtime;
use tg_core::units::{to_inches, to_mm, UnitsMode};

fn input(word: MotionWord, axis_values: &[(usize, f64)], feed: Option<f64>) -> GCodeInput {
    let mut gi = GCodeInput::default();
    gi.motion_word = Some(word);
    for &(axis, v) in axis_values {
        gi.axis_words[axis] = Some(v);
    }
    gi.feed_rate = feed;
    gi
}

fn setup() -> (CanonicalMachine, Planner) {
    let axes = AxesConfig::default();
    let mut cm = CanonicalMachine::new(axes.clone());
    cm.ready();
    (cm, Planner::new(axes))
}

#[test]
fn scenario_1_rapid_then_feed_colinear() {
    let (mut cm, mut planner) = setup();
    assert_eq!(
        cm.apply_block(&input(MotionWord::G0, &[(X, 10.0)], None), &mut planner),
        Stat::Ok
    );
    assert_eq!(
        cm.apply_block(&input(MotionWord::G1, &[(X, 20.0)], Some(500.0)), &mut planner),
        Stat::Ok
    );
    planner.replan();
    assert_eq!(cm.gmx.position[X], 20.0);
}

#[test]
fn scenario_2_right_angle_corner_uses_junction_deviation_formula() {
    let (mut cm, mut planner) = setup();
    assert_eq!(
        cm.apply_block(
            &input(MotionWord::G1, &[(X, 10.0), (Y, 0.0)], Some(1000.0)),
            &mut planner
        ),
        Stat::Ok
    );
    assert_eq!(
        cm.apply_block(
            &input(MotionWord::G1, &[(X, 10.0), (Y, 10.0)], Some(1000.0)),
            &mut planner
        ),
        Stat::Ok
    );
    planner.replan();
    // The corner is a right angle: cos(theta) = 0, so the junction
    // velocity is strictly between 0 and the cruise ceiling.
    assert_eq!(cm.gmx.position, [10.0, 10.0, 0.0, 0.0, 0.0, 0.0]);
}

#[test]
fn scenario_3_tiny_line_between_fast_moves_is_triangular() {
    let (mut cm, mut planner) = setup();
    cm.apply_block(&input(MotionWord::G1, &[(X, 100.0)], Some(3000.0)), &mut planner);
    cm.apply_block(&input(MotionWord::G1, &[(X, 100.1)], Some(3000.0)), &mut planner);
    cm.apply_block(&input(MotionWord::G1, &[(X, 200.1)], Some(3000.0)), &mut planner);
    planner.replan();
    assert_eq!(cm.gmx.position[X], 200.1);
}

#[test]
fn scenario_4_feed_hold_reshapes_the_tail_segment() {
    let (mut cm, mut planner) = setup();
    assert_eq!(
        cm.apply_block(&input(MotionWord::G1, &[(X, 100.0)], Some(3000.0)), &mut planner),
        Stat::Ok
    );
    planner.replan();

    let mut runtime = Runtime::new([100.0; tg_core::axes::AXIS_COUNT]);
    assert_eq!(runtime.load_next_block(&mut planner), Stat::Ok);
    assert!(!runtime.is_hold_requested());

    runtime.request_feed_hold();
    assert!(runtime.is_hold_requested());

    // The tail segment decelerates to zero rather than the block's
    // cruise velocity; running prep to exhaustion must not panic and
    // must leave the runtime idle once the hold has fully decelerated.
    let mut segments = 0;
    loop {
        match runtime.prep_next_segment() {
            Stat::Ok => {
                segments += 1;
                if let Some(segment) = runtime.swap_prep_exec() {
                    assert!(segment.segment_velocity >= 0.0);
                    runtime.exec_consumed();
                }
            }
            Stat::Noop | Stat::Eagain => break,
            Stat::Err(e) => panic!("unexpected fault during feed hold: {e:?}"),
        }
        if segments > 100_000 {
            panic!("feed hold never reached zero velocity");
        }
    }
    assert!(segments > 0);

    runtime.clear_feed_hold();
    assert!(!runtime.is_hold_requested());
}

#[test]
fn scenario_5_g92_then_g53_override() {
    let (mut cm, mut planner) = setup();
    let mut g92 = GCodeInput::default();
    let mut offsets = [None; tg_core::axes::AXIS_COUNT];
    offsets[X] = Some(5.0);
    g92.origin_offset_set = Some(offsets);
    cm.apply_block(&g92, &mut planner);
    assert!(cm.gmx.origin_offset_enable);

    let mut g53_g0 = input(MotionWord::G0, &[(X, 0.0)], None);
    g53_g0.absolute_override = true;
    assert_eq!(cm.apply_block(&g53_g0, &mut planner), Stat::Ok);
    assert_eq!(cm.gmx.position[X], 0.0);
    // G92 remains armed for the next non-G53 block.
    assert!(cm.gmx.origin_offset_enable);
}

#[test]
fn scenario_6_arc_continuous_mode_segments_inherit_feed_rate() {
    let (mut cm, mut planner) = setup();
    cm.gm.feed_rate = 500.0;
    let mut arc_input = input(MotionWord::G2, &[(X, 10.0), (Y, 10.0)], None);
    arc_input.arc_offset = [Some(10.0), Some(0.0), None];
    assert_eq!(cm.apply_block(&arc_input, &mut planner), Stat::Ok);
    assert!(cm.is_arc_active());

    let mut segments = 0;
    while cm.is_arc_active() {
        cm.service_arc(&mut planner);
        segments += 1;
        if segments > 10_000 {
            panic!("arc generator never exhausted");
        }
    }
    assert!(segments > 1);
    assert_eq!(cm.gmx.position[X], 10.0);
    assert_eq!(cm.gmx.position[Y], 10.0);
}

#[test]
fn zero_length_move_is_dropped_silently() {
    let (mut cm, mut planner) = setup();
    let stat = cm.apply_block(&input(MotionWord::G1, &[(X, 0.0)], Some(100.0)), &mut planner);
    assert_eq!(stat, Stat::Err(CoreError::ZeroLengthMove));
    assert_eq!(cm.gmx.position[X], 0.0);
}

#[test]
fn inverse_time_feed_with_zero_rejects() {
    let (mut cm, mut planner) = setup();
    let mut gi = GCodeInput::default();
    gi.feed_rate_mode = Some(tg_core::model::FeedRateMode::InverseTime);
    gi.feed_rate = Some(0.0);
    assert_eq!(
        cm.apply_block(&gi, &mut planner),
        Stat::Err(CoreError::InverseTimeFeedInvalid)
    );
}

#[test]
fn mm_inch_round_trip_is_idempotent() {
    let x = 42.42_f64;
    let back = to_inches(to_mm(x, UnitsMode::Inches));
    assert!((back - x).abs() < 1e-9);
}

#[test]
fn g10_l2_write_then_coord_system_select_swaps_work_offset() {
    let (mut cm, mut planner) = setup();

    let mut g10 = GCodeInput::default();
    let mut offsets = [None; tg_core::axes::AXIS_COUNT];
    offsets[X] = Some(5.0);
    g10.coord_offset_write = Some((CoordSystem::G55, false, offsets));
    assert_eq!(cm.apply_block(&g10, &mut planner), Stat::Noop);
    // G55 isn't active yet, so the write doesn't touch work_offset.
    assert_eq!(cm.gm.work_offset[X], 0.0);

    let mut select_g55 = GCodeInput::default();
    select_g55.coord_system = Some(CoordSystem::G55);
    cm.apply_block(&select_g55, &mut planner);
    assert_eq!(cm.gm.work_offset[X], 5.0);

    let mut select_g54 = GCodeInput::default();
    select_g54.coord_system = Some(CoordSystem::G54);
    cm.apply_block(&select_g54, &mut planner);
    assert_eq!(cm.gm.work_offset[X], 0.0);
}

#[test]
fn g10_l20_derives_offset_from_current_position() {
    let (mut cm, mut planner) = setup();
    cm.apply_block(&input(MotionWord::G0, &[(X, 12.0)], None), &mut planner);

    let mut select_g54 = GCodeInput::default();
    select_g54.coord_system = Some(CoordSystem::G54);
    cm.apply_block(&select_g54, &mut planner);

    let mut g10 = GCodeInput::default();
    let mut offsets = [None; tg_core::axes::AXIS_COUNT];
    offsets[X] = Some(2.0);
    g10.coord_offset_write = Some((CoordSystem::G54, true, offsets));
    cm.apply_block(&g10, &mut planner);

    // Current position reads 12; asking it to read as 2 means an offset
    // of 10 (position - desired = offset).
    assert_eq!(cm.gm.work_offset[X], 10.0);
}

#[test]
fn disabled_axis_is_excluded_from_target_resolution() {
    let mut axes = AxesConfig::default();
    axes.axes[A].axis_mode = tg_core::axes::AxisMode::Disabled;
    let mut cm = CanonicalMachine::new(axes.clone());
    cm.ready();
    let mut planner = Planner::new(axes);

    // A-word on the line must not move a `Disabled` axis.
    let result = cm.apply_block(&input(MotionWord::G0, &[(X, 10.0), (A, 90.0)], None), &mut planner);
    assert_eq!(result, Stat::Ok);
    assert_eq!(cm.gmx.position[A], 0.0);
    assert_eq!(cm.gmx.position[X], 10.0);
}

#[test]
fn radius_mode_axis_converts_mm_target_to_degrees() {
    let mut axes = AxesConfig::default();
    axes.axes[A].axis_mode = tg_core::axes::AxisMode::Radius;
    axes.axes[A].radius_mm = 10.0;
    let mut cm = CanonicalMachine::new(axes.clone());
    cm.ready();
    let mut planner = Planner::new(axes);

    // A full circumference (2*pi*10 ~= 62.83 mm) of travel should read
    // back as 360 degrees on the rotary axis.
    let circumference = 2.0 * core::f64::consts::PI * 10.0;
    cm.apply_block(&input(MotionWord::G0, &[(A, circumference)], None), &mut planner);
    assert!((cm.gmx.position[A] - 360.0).abs() < 1e-6);
}

#[test]
fn g90_g91_g90_returns_to_absolute_without_moving() {
    let (mut cm, mut planner) = setup();
    cm.apply_block(&input(MotionWord::G0, &[(X, 10.0)], None), &mut planner);
    let before = cm.gmx.position;

    let mut to_incremental = GCodeInput::default();
    to_incremental.distance_mode = Some(tg_core::model::DistanceMode::Incremental);
    cm.apply_block(&to_incremental, &mut planner);

    let mut to_absolute = GCodeInput::default();
    to_absolute.distance_mode = Some(tg_core::model::DistanceMode::Absolute);
    cm.apply_block(&to_absolute, &mut planner);

    assert_eq!(cm.gm.distance_mode, tg_core::model::DistanceMode::Absolute);
    assert_eq!(cm.gmx.position, before);
}
