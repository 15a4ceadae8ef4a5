//! Precomputed note plans for game events (win, loss, battles, books)

use crate::card::{Rank, Suit};
use crate::pitch::{go_fish_step, ScaleStep, EDO, JOKER_STEP};
use crate::settings::Waveform;

/// One tone of a cue, relative to the cue start
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledTone {
    pub offset_s: f64,
    pub step: ScaleStep,
    pub duration_s: f64,
    pub gain: f32,
    pub waveform: Waveform,
}

/// Named cues a host can trigger
#[derive(Debug, Clone, PartialEq)]
pub enum Cue {
    Victory,
    Defeat,
    Morse(String),
    WarBattle { player: ScaleStep, computer: ScaleStep },
    WarWin(ScaleStep),
    WarTie,
    GoFishBook(Rank),
}

impl Cue {
    pub fn tones(&self, waveform: Waveform) -> Vec<ScheduledTone> {
        match self {
            Self::Victory => victory_fanfare(waveform),
            Self::Defeat => defeat(waveform),
            Self::Morse(text) => morse(text),
            Self::WarBattle { player, computer } => war_battle(*player, *computer, waveform),
            Self::WarWin(step) => war_win(*step, waveform),
            Self::WarTie => war_tie(waveform),
            Self::GoFishBook(rank) => go_fish_book(*rank, waveform),
        }
    }
}

/// Tempo of the fanfares
const CUE_BPM: f64 = 120.0;

fn sixteenth() -> f64 {
    60.0 / CUE_BPM / 4.0
}

fn eighth() -> f64 {
    60.0 / CUE_BPM / 2.0
}

fn tone(offset_s: f64, step: u16, duration_s: f64, gain: f32, waveform: Waveform) -> ScheduledTone {
    ScheduledTone {
        offset_s,
        step: ScaleStep::new(step).unwrap_or(JOKER_STEP),
        duration_s,
        gain,
        waveform,
    }
}

fn sweep(t: &mut f64, tones: &mut Vec<ScheduledTone>, waveform: Waveform) {
    let len = sixteenth();
    for step in 0..=EDO {
        let accented = ScaleStep::new(step).is_ok_and(|s| s.is_accented());
        let (gain, dur) = if accented { (0.3, len * 1.05) } else { (0.15, len) };
        tones.push(tone(*t, step, dur, gain, waveform));
        *t += len;
    }
}

fn octave_alternation(t: &mut f64, tones: &mut Vec<ScheduledTone>, reps: usize, waveform: Waveform) {
    let len = eighth();
    for _ in 0..reps {
        for step in [0, EDO] {
            tones.push(tone(*t, step, len, 0.3, waveform));
            *t += len;
        }
    }
}

/// Full scale sweep, 15 octave alternations, second sweep, 5 more alternations
pub fn victory_fanfare(waveform: Waveform) -> Vec<ScheduledTone> {
    let mut tones = Vec::with_capacity(2 * 54 + 40);
    let mut t = 0.0;
    sweep(&mut t, &mut tones, waveform);
    octave_alternation(&mut t, &mut tones, 15, waveform);
    sweep(&mut t, &mut tones, waveform);
    octave_alternation(&mut t, &mut tones, 5, waveform);
    tones
}

/// Descending fifths of the top step down to the fundamental
pub fn defeat(waveform: Waveform) -> Vec<ScheduledTone> {
    let len = sixteenth();
    [52, 39, 26, 13, 0]
        .into_iter()
        .enumerate()
        .map(|(i, step)| tone(i as f64 * len, step, len, 0.2, waveform))
        .collect()
}

pub const MORSE_DOT_S: f64 = 0.033;
pub const MORSE_DASH_S: f64 = 0.1;
pub const MORSE_GAP_S: f64 = 0.033;
pub const MORSE_LETTER_GAP_S: f64 = 0.1;
const MORSE_GAIN: f32 = 0.15;

/// Code table for the letters the end screens spell
pub fn morse_code(letter: char) -> Option<&'static str> {
    let code = match letter.to_ascii_uppercase() {
        'W' => ".--.",
        'I' => "..",
        'N' => "-.",
        'E' => ".",
        'R' => ".-.",
        'G' => "--.",
        'A' => ".-",
        'M' => "--",
        'O' => "---",
        'V' => "...-",
        _ => return None,
    };
    Some(code)
}

/// Square-wave beeps at the top step; unknown characters are skipped
pub fn morse(text: &str) -> Vec<ScheduledTone> {
    let mut tones = Vec::new();
    let mut t = 0.0;
    for code in text.chars().filter_map(morse_code) {
        for symbol in code.chars() {
            let dur = if symbol == '.' { MORSE_DOT_S } else { MORSE_DASH_S };
            tones.push(ScheduledTone {
                offset_s: t,
                step: JOKER_STEP,
                duration_s: dur,
                gain: MORSE_GAIN,
                waveform: Waveform::Square,
            });
            t += dur + MORSE_GAP_S;
        }
        t += MORSE_LETTER_GAP_S;
    }
    tones
}

pub const WAR_NOTE_S: f64 = 0.5;
pub const WAR_REPLY_OFFSET_S: f64 = 0.2;

/// Player card, then the computer's answer 200 ms later
pub fn war_battle(player: ScaleStep, computer: ScaleStep, waveform: Waveform) -> Vec<ScheduledTone> {
    vec![
        ScheduledTone {
            offset_s: 0.0,
            step: player,
            duration_s: WAR_NOTE_S,
            gain: 0.2,
            waveform,
        },
        ScheduledTone {
            offset_s: WAR_REPLY_OFFSET_S,
            step: computer,
            duration_s: WAR_NOTE_S,
            gain: 0.2,
            waveform,
        },
    ]
}

pub fn war_win(step: ScaleStep, waveform: Waveform) -> Vec<ScheduledTone> {
    vec![ScheduledTone {
        offset_s: 0.0,
        step,
        duration_s: 1.0,
        gain: 0.2,
        waveform,
    }]
}

pub fn war_tie(waveform: Waveform) -> Vec<ScheduledTone> {
    [26, 39].into_iter().map(|step| tone(0.0, step, 0.8, 0.2, waveform)).collect()
}

/// The four suit steps of a completed book, rolled 50 ms apart
pub fn go_fish_book(rank: Rank, waveform: Waveform) -> Vec<ScheduledTone> {
    Suit::RANKED
        .into_iter()
        .enumerate()
        .map(|(i, suit)| ScheduledTone {
            offset_s: i as f64 * 0.05,
            step: go_fish_step(suit, rank),
            duration_s: 0.5,
            gain: 0.2,
            waveform,
        })
        .collect()
}

/// Time until the last tone of a plan has finished
pub fn plan_length(tones: &[ScheduledTone]) -> f64 {
    tones.iter().map(|t| t.offset_s + t.duration_s).fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_victory_shape() {
        let tones = victory_fanfare(Waveform::Sine);
        assert_eq!(tones.len(), 54 + 30 + 54 + 10);
        assert_eq!(tones[0].step.value(), 0);
        assert_eq!(tones[53].step.value(), 53);
        // accented steps are louder and slightly longer
        assert_eq!(tones[17].gain, 0.3);
        assert_relative_eq!(tones[17].duration_s, 0.125 * 1.05);
        assert_eq!(tones[18].gain, 0.15);
        // alternation starts right after the sweep, in eighths
        assert_relative_eq!(tones[54].offset_s, 54.0 * 0.125, epsilon = 1e-9);
        assert_relative_eq!(tones[55].offset_s - tones[54].offset_s, 0.25, epsilon = 1e-9);
        assert_eq!(tones[55].step, ScaleStep::OCTAVE);
    }

    #[test]
    fn test_defeat_descends() {
        let steps: Vec<u16> = defeat(Waveform::Sine).iter().map(|t| t.step.value()).collect();
        assert_eq!(steps, vec![52, 39, 26, 13, 0]);
    }

    #[test]
    fn test_morse_timing() {
        // E = ".", then A = ".-"
        let tones = morse("ea");
        assert_eq!(tones.len(), 3);
        assert_relative_eq!(tones[1].offset_s, MORSE_DOT_S + MORSE_GAP_S + MORSE_LETTER_GAP_S);
        assert_relative_eq!(tones[2].duration_s, MORSE_DASH_S);
        assert!(tones.iter().all(|t| t.waveform == Waveform::Square && t.step == JOKER_STEP));
        assert!(morse("xyz").is_empty());
        // space is skipped
        assert_eq!(morse("GAME OVER").len(), morse("GAMEOVER").len());
    }

    #[test]
    fn test_war_cues() {
        let a = ScaleStep::new(3).unwrap();
        let b = ScaleStep::new(40).unwrap();
        let battle = war_battle(a, b, Waveform::Triangle);
        assert_relative_eq!(battle[1].offset_s, 0.2);
        assert_relative_eq!(plan_length(&battle), 0.7, epsilon = 1e-9);
        let tie: Vec<u16> = war_tie(Waveform::Sine).iter().map(|t| t.step.value()).collect();
        assert_eq!(tie, vec![26, 39]);
    }

    #[test]
    fn test_book_rolls_four_adjacent_steps() {
        let tones = Cue::GoFishBook(Rank::KING).tones(Waveform::Sine);
        let steps: Vec<u16> = tones.iter().map(|t| t.step.value()).collect();
        assert_eq!(steps, vec![48, 49, 50, 51]);
        assert_relative_eq!(tones[3].offset_s, 0.15, epsilon = 1e-9);
    }
}
