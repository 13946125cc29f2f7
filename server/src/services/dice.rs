use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::models::game_record::Roll;

/// Source of die faces in `1..=6`.
pub trait Dice: Send {
    fn roll_die(&mut self) -> u8;
}

pub struct RandomDice {
    rng: StdRng,
}

impl RandomDice {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }
}

impl Default for RandomDice {
    fn default() -> Self {
        Self::new()
    }
}

impl Dice for RandomDice {
    fn roll_die(&mut self) -> u8 {
        self.rng.gen_range(1..=6)
    }
}

/// Replays a fixed sequence of faces, wrapping around at the end.
#[derive(Debug, Clone)]
pub struct ScriptedDice {
    faces: Vec<u8>,
    cursor: usize,
}

impl ScriptedDice {
    pub fn new(faces: impl Into<Vec<u8>>) -> Self {
        Self {
            faces: faces.into(),
            cursor: 0,
        }
    }
}

impl Dice for ScriptedDice {
    fn roll_die(&mut self) -> u8 {
        if self.faces.is_empty() {
            return 1;
        }
        let face = self.faces[self.cursor % self.faces.len()];
        self.cursor += 1;
        face.clamp(1, 6)
    }
}

pub fn is_double(roll: &[u8]) -> bool {
    matches!(roll, [a, b, ..] if a == b)
}

/// Two dice, plus a bonus third die when the first two match.
pub fn roll_turn<D: Dice + ?Sized>(dice: &mut D) -> Roll {
    let mut roll = vec![dice.roll_die(), dice.roll_die()];
    if is_double(&roll) {
        roll.push(dice.roll_die());
    }
    roll
}

pub fn roll_tiebreaker<D: Dice + ?Sized>(dice: &mut D) -> Roll {
    vec![dice.roll_die()]
}

/// Points for one turn: the sum of every die, +10 when the first two dice sum
/// to an even number and -5 otherwise, never below zero.
pub fn score_roll(roll: &[u8]) -> u32 {
    let total: i64 = roll.iter().map(|&d| i64::from(d)).sum();
    let head: i64 = roll.iter().take(2).map(|&d| i64::from(d)).sum();
    let adjusted = if head % 2 == 0 { total + 10 } else { total - 5 };
    adjusted.max(0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_earn_a_bonus_die() {
        let mut dice = ScriptedDice::new([4, 4, 2]);
        assert_eq!(roll_turn(&mut dice), vec![4, 4, 2]);

        let mut dice = ScriptedDice::new([4, 5]);
        assert_eq!(roll_turn(&mut dice), vec![4, 5]);
    }

    #[test]
    fn scoring_rules() {
        // double: 3 + 3 + 6 + 10
        assert_eq!(score_roll(&[3, 3, 6]), 22);
        // odd: 2 + 5 - 5
        assert_eq!(score_roll(&[2, 5]), 2);
        // even but not a double: 1 + 3 + 10
        assert_eq!(score_roll(&[1, 3]), 14);
        // clamped at zero: 1 + 2 - 5
        assert_eq!(score_roll(&[1, 2]), 0);
    }

    #[test]
    fn every_double_scores_above_the_raw_sum() {
        for face in 1..=6u8 {
            for bonus in 1..=6u8 {
                let roll = [face, face, bonus];
                let raw: u32 = roll.iter().map(|&d| u32::from(d)).sum();
                assert_eq!(score_roll(&roll), raw + 10);
            }
        }
    }

    #[test]
    fn random_faces_stay_in_range() {
        let mut dice = RandomDice::new();
        for _ in 0..1000 {
            assert!((1..=6).contains(&dice.roll_die()));
        }
    }

    #[test]
    fn scripted_dice_wrap_around() {
        let mut dice = ScriptedDice::new([1, 2]);
        let faces: Vec<u8> = (0..5).map(|_| dice.roll_die()).collect();
        assert_eq!(faces, vec![1, 2, 1, 2, 1]);
        assert_eq!(roll_tiebreaker(&mut dice), vec![2]);
    }
}
