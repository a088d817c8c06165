//! ASCII line tokenizer: turns one line of text into a
//! [`tg_core::model::GCodeInput`].
//!
//! Grounded on the teacher's `parse_gcode` (split into whitespace-separated
//! `letter value` words, strip comments, uppercase the command) but
//! reworked from a single `(String, Vec<(char, f32)>)` pair into the full
//! `GCodeInput` record tg-core's canonical machine expects, using `nom` to
//! do the actual byte-level scanning rather than `str::split_whitespace` +
//! manual char-pair slicing, since the grammar (optional leading `/`,
//! `;`/`()` comments anywhere, signed decimals, dotted G/M words like
//! `G38.2`) is a step past what whitespace-splitting handles cleanly.

use nom::{
    branch::alt,
    bytes::complete::take_until,
    character::complete::{char, digit0, digit1, one_of, space0},
    combinator::{map, opt, recognize},
    sequence::{pair, preceded, tuple},
    IResult,
};

use tg_core::axes::AXIS_COUNT;
use tg_core::model::{
    CoordSystem, DistanceMode, FeedRateMode, GCodeInput, MotionWord, Plane, ProgramFlow,
};
use tg_core::units::UnitsMode;
use tg_proto::words::GCODE_WORD_LETTERS;

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("unrecognised word letter {0:?}")]
    UnrecognisedWordLetter(char),
    #[error("unrecognised G word G{0}")]
    UnrecognisedGWord(f64),
    #[error("unrecognised M word M{0}")]
    UnrecognisedMWord(f64),
}

/// One `letter value` word as scanned off the line, before semantic
/// interpretation.
#[derive(Debug, Clone, Copy, PartialEq)]
struct RawWord {
    letter: u8,
    value: f64,
}

fn signed_float(input: &str) -> IResult<&str, f64> {
    map(
        recognize(tuple((
            opt(alt((char('-'), char('+')))),
            digit0,
            opt(pair(char('.'), digit1)),
        ))),
        |s: &str| s.parse::<f64>().unwrap_or(0.0),
    )(input)
}

/// A parenthesised comment. Semicolon comments run to end-of-line and are
/// handled by `scan_words` breaking out of its loop instead, since there's
/// nothing left to scan after one is found.
fn comment(input: &str) -> IResult<&str, &str> {
    recognize(tuple((char('('), take_until(")"), char(')'))))(input)
}

fn word(input: &str) -> IResult<&str, RawWord> {
    let letters = core::str::from_utf8(GCODE_WORD_LETTERS).unwrap();
    map(
        preceded(space0, pair(one_of(letters), signed_float)),
        |(letter, value)| RawWord {
            letter: letter as u8,
            value,
        },
    )(input)
}

/// Scans a line into its raw `letter value` words, stopping at the first
/// `;` comment and skipping any `(...)` comments inline. The leading `/`
/// block-delete marker, if present, is reported separately since whether
/// it takes effect depends on machine state the tokenizer doesn't own.
/// Case-insensitive: the whole line is upper-cased before scanning, since
/// the word grammar only recognises upper-case letters.
fn scan_words(line: &str) -> (bool, Vec<RawWord>) {
    let upper = line.to_ascii_uppercase();
    let mut rest: &str = upper.trim_start();
    let block_delete = rest.starts_with(tg_proto::words::BLOCK_DELETE_CHAR as char);
    if block_delete {
        rest = rest.trim_start_matches(tg_proto::words::BLOCK_DELETE_CHAR as char);
    }
    let mut words = Vec::new();
    loop {
        let trimmed = rest.trim_start();
        if trimmed.is_empty() || trimmed.starts_with(';') {
            break;
        }
        if let Ok((remainder, _)) = comment(trimmed) {
            rest = remainder;
            continue;
        }
        match word(trimmed) {
            Ok((remainder, raw)) => {
                words.push(raw);
                rest = remainder;
            }
            Err(_) => break,
        }
    }
    (block_delete, words)
}

/// Tokenizes one line of G-code text into a [`GCodeInput`].
///
/// Returns `Ok(None)` for a blank-after-comments line (nothing to apply)
/// and `Ok(Some((block_delete, input)))` otherwise.
pub fn parse_line(line: &str) -> Result<Option<(bool, GCodeInput)>, ParseError> {
    let (block_delete, words) = scan_words(line);
    if words.is_empty() {
        return Ok(None);
    }

    let mut input = GCodeInput::default();
    let mut axis_vals: [Option<f64>; AXIS_COUNT] = [None; AXIS_COUNT];
    let mut g92_family = false;
    let mut g4_present = false;
    let mut g10_present = false;
    let mut p_value: Option<f64> = None;
    let mut l_value: Option<f64> = None;

    for raw in &words {
        match raw.letter {
            b'N' => input.line_number = Some(raw.value as u32),
            b'F' => input.feed_rate = Some(raw.value),
            b'S' => input.spindle_speed = Some(raw.value),
            b'T' => input.tool_select = Some(raw.value as u8),
            // P and L are contextual: P means dwell seconds under G4 but a
            // coordinate-system index under G10, and L only means anything
            // under G10 (L2 vs L20). Resolved once the whole line is scanned.
            b'P' => p_value = Some(raw.value),
            b'L' => l_value = Some(raw.value),
            b'R' => input.arc_radius = Some(raw.value),
            b'I' => input.arc_offset[0] = Some(raw.value),
            b'J' => input.arc_offset[1] = Some(raw.value),
            b'K' => input.arc_offset[2] = Some(raw.value),
            b'X' => axis_vals[tg_core::axes::X] = Some(raw.value),
            b'Y' => axis_vals[tg_core::axes::Y] = Some(raw.value),
            b'Z' => axis_vals[tg_core::axes::Z] = Some(raw.value),
            b'A' => axis_vals[tg_core::axes::A] = Some(raw.value),
            b'B' => axis_vals[tg_core::axes::B] = Some(raw.value),
            b'C' => axis_vals[tg_core::axes::C] = Some(raw.value),
            b'G' => apply_g_word(raw.value, &mut input, &mut g92_family, &mut g4_present, &mut g10_present)?,
            b'M' => apply_m_word(raw.value, &mut input)?,
            other => return Err(ParseError::UnrecognisedWordLetter(other as char)),
        }
    }

    if g10_present {
        let cs = coord_system_from_p(p_value);
        let from_current = matches!(l_value, Some(l) if (l - 20.0).abs() < 1e-9);
        input.coord_offset_write = Some((cs, from_current, axis_vals));
    } else if g4_present {
        input.dwell_seconds = Some(p_value.unwrap_or(0.0));
    } else if g92_family {
        input.origin_offset_set = Some(axis_vals);
    } else {
        input.axis_words = axis_vals;
    }

    Ok(Some((block_delete, input)))
}

/// G10 L2/L20's `P` word selects the target coordinate system (`P1`..`P6`
/// for `G54`..`G59`); absent or `P0` defaults to `G54`.
fn coord_system_from_p(p: Option<f64>) -> CoordSystem {
    match p.map(|v| v.round() as i64) {
        Some(1) => CoordSystem::G54,
        Some(2) => CoordSystem::G55,
        Some(3) => CoordSystem::G56,
        Some(4) => CoordSystem::G57,
        Some(5) => CoordSystem::G58,
        Some(6) => CoordSystem::G59,
        _ => CoordSystem::G54,
    }
}

fn apply_g_word(
    value: f64,
    input: &mut GCodeInput,
    g92_family: &mut bool,
    g4_present: &mut bool,
    g10_present: &mut bool,
) -> Result<(), ParseError> {
    let code = (value * 10.0).round() / 10.0;
    match code {
        c if c == 0.0 => input.motion_word = Some(MotionWord::G0),
        c if c == 1.0 => input.motion_word = Some(MotionWord::G1),
        c if c == 2.0 => input.motion_word = Some(MotionWord::G2),
        c if c == 3.0 => input.motion_word = Some(MotionWord::G3),
        c if c == 4.0 => *g4_present = true,
        c if c == 10.0 => *g10_present = true,
        c if c == 17.0 => input.select_plane = Some(Plane::Xy),
        c if c == 18.0 => input.select_plane = Some(Plane::Xz),
        c if c == 19.0 => input.select_plane = Some(Plane::Yz),
        c if c == 20.0 => input.units_mode = Some(UnitsMode::Inches),
        c if c == 21.0 => input.units_mode = Some(UnitsMode::Millimeters),
        c if c == 28.0 => input.go_to_g28 = true,
        c if (c - 28.1).abs() < 1e-9 => input.store_g28 = true,
        c if c == 30.0 => input.go_to_g30 = true,
        c if (c - 30.1).abs() < 1e-9 => input.store_g30 = true,
        c if c == 38.2 => input.motion_word = Some(MotionWord::G38_2),
        c if c == 53.0 => input.absolute_override = true,
        c if c == 54.0 => input.coord_system = Some(CoordSystem::G54),
        c if c == 55.0 => input.coord_system = Some(CoordSystem::G55),
        c if c == 56.0 => input.coord_system = Some(CoordSystem::G56),
        c if c == 57.0 => input.coord_system = Some(CoordSystem::G57),
        c if c == 58.0 => input.coord_system = Some(CoordSystem::G58),
        c if c == 59.0 => input.coord_system = Some(CoordSystem::G59),
        c if c == 61.0 => input.path_control = Some(tg_core::model::PathControl::ExactStop),
        c if (c - 61.1).abs() < 1e-9 => {
            input.path_control = Some(tg_core::model::PathControl::ExactPath)
        }
        c if c == 64.0 => input.path_control = Some(tg_core::model::PathControl::Continuous),
        c if c == 90.0 => input.distance_mode = Some(DistanceMode::Absolute),
        c if c == 91.0 => input.distance_mode = Some(DistanceMode::Incremental),
        c if (c - 90.1).abs() < 1e-9 => input.arc_distance_mode = Some(DistanceMode::Absolute),
        c if (c - 91.1).abs() < 1e-9 => input.arc_distance_mode = Some(DistanceMode::Incremental),
        c if c == 92.0 => *g92_family = true,
        c if (c - 92.1).abs() < 1e-9 => input.origin_offset_reset = true,
        c if (c - 92.2).abs() < 1e-9 => input.origin_offset_suspend = true,
        c if (c - 92.3).abs() < 1e-9 => input.origin_offset_resume = true,
        c if c == 93.0 => input.feed_rate_mode = Some(FeedRateMode::InverseTime),
        c if c == 94.0 => input.feed_rate_mode = Some(FeedRateMode::UnitsPerMinute),
        _ => return Err(ParseError::UnrecognisedGWord(code)),
    }
    Ok(())
}

fn apply_m_word(value: f64, input: &mut GCodeInput) -> Result<(), ParseError> {
    let code = value.round() as i64;
    match code {
        0 => input.program_flow = Some(ProgramFlow::Stop),
        1 => input.program_flow = Some(ProgramFlow::OptionalStop),
        2 => input.program_flow = Some(ProgramFlow::End),
        3 => input.spindle_mode = Some(tg_core::model::SpindleMode::Cw),
        4 => input.spindle_mode = Some(tg_core::model::SpindleMode::Ccw),
        5 => input.spindle_mode = Some(tg_core::model::SpindleMode::Off),
        6 => input.tool_change = true,
        7 => input.mist_coolant = Some(true),
        8 => input.flood_coolant = Some(true),
        9 => {
            input.mist_coolant = Some(false);
            input.flood_coolant = Some(false);
        }
        30 => input.program_flow = Some(ProgramFlow::RewindStop),
        _ => return Err(ParseError::UnrecognisedMWord(value)),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tg_core::axes::X;

    #[test]
    fn a_simple_feed_move_sets_motion_and_axis_words() {
        let (_, input) = parse_line("G1 X10.5 F600").unwrap().unwrap();
        assert_eq!(input.motion_word, Some(MotionWord::G1));
        assert_eq!(input.axis_words[X], Some(10.5));
        assert_eq!(input.feed_rate, Some(600.0));
    }

    #[test]
    fn semicolon_comment_is_stripped() {
        let (_, input) = parse_line("G0 X1 ; rapid to start").unwrap().unwrap();
        assert_eq!(input.motion_word, Some(MotionWord::G0));
        assert_eq!(input.axis_words[X], Some(1.0));
    }

    #[test]
    fn parenthesised_comment_mid_line_is_skipped() {
        let (_, input) = parse_line("G1 X5 (feed in) Y5").unwrap().unwrap();
        assert_eq!(input.axis_words[X], Some(5.0));
        assert_eq!(input.axis_words[tg_core::axes::Y], Some(5.0));
    }

    #[test]
    fn block_delete_marker_is_reported() {
        let (block_delete, input) = parse_line("/G1 X1").unwrap().unwrap();
        assert!(block_delete);
        assert_eq!(input.axis_words[X], Some(1.0));
    }

    #[test]
    fn blank_comment_only_line_yields_none() {
        assert_eq!(parse_line("; just a comment").unwrap(), None);
    }

    #[test]
    fn g92_routes_axis_words_to_origin_offset() {
        let (_, input) = parse_line("G92 X0 Y0").unwrap().unwrap();
        assert_eq!(input.origin_offset_set.unwrap()[X], Some(0.0));
        assert_eq!(input.axis_words[X], None);
    }

    #[test]
    fn dotted_probe_word_is_recognised() {
        let (_, input) = parse_line("G38.2 Z-10 F50").unwrap().unwrap();
        assert_eq!(input.motion_word, Some(MotionWord::G38_2));
    }

    #[test]
    fn unknown_g_word_is_an_error() {
        assert!(parse_line("G200 X1").is_err());
    }

    #[test]
    fn g10_l2_writes_direct_offset_for_selected_system() {
        let (_, input) = parse_line("G10 L2 P2 X10 Y-5").unwrap().unwrap();
        let (cs, from_current, offsets) = input.coord_offset_write.unwrap();
        assert_eq!(cs, CoordSystem::G55);
        assert!(!from_current);
        assert_eq!(offsets[X], Some(10.0));
    }

    #[test]
    fn g10_l20_marks_offset_as_derived_from_current_position() {
        let (_, input) = parse_line("G10 L20 P1 X0 Y0").unwrap().unwrap();
        let (cs, from_current, _) = input.coord_offset_write.unwrap();
        assert_eq!(cs, CoordSystem::G54);
        assert!(from_current);
    }

    #[test]
    fn g4_p_word_is_dwell_seconds_not_coordinate_index() {
        let (_, input) = parse_line("G4 P2.5").unwrap().unwrap();
        assert_eq!(input.dwell_seconds, Some(2.5));
        assert_eq!(input.coord_offset_write, None);
    }
}
