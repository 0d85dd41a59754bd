//! Player and vehicle identifiers.
//!
//! Both are 1-based numbers in `1..=8`.  On the serial wire a player is a bit
//! position (`player - 1`) and a vehicle is a 0-based byte (`car - 1`, with
//! [`NO_SELECTION`] meaning "none").

use std::fmt;

/// Number of controller channels on the hub.
pub const PLAYER_COUNT: usize = 8;

/// Serial-wire byte for "no vehicle selected".
pub const NO_SELECTION: u8 = 0xFF;

/// A controller channel, numbered 1 to 8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Player(u8);

impl Player {
    /// Returns `None` unless `number` is in `1..=8`.
    pub fn new(number: u8) -> Option<Self> {
        (1..=PLAYER_COUNT as u8).contains(&number).then_some(Self(number))
    }

    /// Builds a player from a 0-based array index.
    pub fn from_index(index: usize) -> Option<Self> {
        u8::try_from(index + 1).ok().and_then(Self::new)
    }

    /// All eight players in ascending order.
    pub fn all() -> impl DoubleEndedIterator<Item = Player> {
        (1..=PLAYER_COUNT as u8).map(Player)
    }

    pub fn number(self) -> u8 {
        self.0
    }

    pub fn index(self) -> usize {
        usize::from(self.0 - 1)
    }

    /// The bit this player occupies in every button mask.
    pub fn mask(self) -> u8 {
        1 << (self.0 - 1)
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "player {}", self.0)
    }
}

/// A vehicle on the hub, numbered 1 to 8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Car(u8);

impl Car {
    /// Returns `None` unless `number` is in `1..=8`.
    pub fn new(number: u8) -> Option<Self> {
        (1..=PLAYER_COUNT as u8).contains(&number).then_some(Self(number))
    }

    pub fn number(self) -> u8 {
        self.0
    }

    /// The 0-based byte sent to the hub.
    pub fn wire_byte(self) -> u8 {
        self.0 - 1
    }

    /// Parses a serial-wire selection byte; anything outside `0..=7` is "none".
    pub fn from_wire_byte(byte: u8) -> Option<Self> {
        byte.checked_add(1).and_then(Self::new)
    }
}

impl fmt::Display for Car {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "car {}", self.0)
    }
}

/// Serial-wire byte for an optional selection.
pub fn selection_wire_byte(selection: Option<Car>) -> u8 {
    selection.map_or(NO_SELECTION, Car::wire_byte)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_new_rejects_zero_and_nine() {
        assert!(Player::new(0).is_none());
        assert!(Player::new(9).is_none());
        assert_eq!(Player::new(8).map(Player::index), Some(7));
    }

    #[test]
    fn test_player_mask_is_bit_for_zero_based_index() {
        assert_eq!(Player::new(1).unwrap().mask(), 0b0000_0001);
        assert_eq!(Player::new(8).unwrap().mask(), 0b1000_0000);
    }

    #[test]
    fn test_player_all_yields_one_through_eight() {
        let numbers: Vec<u8> = Player::all().map(Player::number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_car_wire_byte_round_trip() {
        let car = Car::new(3).unwrap();
        assert_eq!(car.wire_byte(), 2);
        assert_eq!(Car::from_wire_byte(2), Some(car));
        assert_eq!(Car::from_wire_byte(NO_SELECTION), None);
    }

    #[test]
    fn test_selection_wire_byte_none_is_ff() {
        assert_eq!(selection_wire_byte(None), 0xFF);
        assert_eq!(selection_wire_byte(Car::new(1)), 0);
    }
}
