use crate::board::{Board, MAX_SIZE, Position};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Zobrist hash for board configurations.
///
/// A configuration hashes its box cells plus the canonical cell of the
/// player's reachable region, so boards that differ only in where the player
/// stands inside the same region collide on purpose.
pub struct Zobrist {
    box_hashes: [[u64; MAX_SIZE]; MAX_SIZE],
    player_hashes: [[u64; MAX_SIZE]; MAX_SIZE],
}

impl Zobrist {
    pub fn new() -> Self {
        // Use a seeded PRNG for reproducible Zobrist hashes
        let mut rng = ChaCha8Rng::seed_from_u64(0x123456789abcdef0);

        let mut box_hashes = [[0u64; MAX_SIZE]; MAX_SIZE];
        for row in box_hashes.iter_mut() {
            for cell in row.iter_mut() {
                *cell = rng.next_u64();
            }
        }

        let mut player_hashes = [[0u64; MAX_SIZE]; MAX_SIZE];
        for row in player_hashes.iter_mut() {
            for cell in row.iter_mut() {
                *cell = rng.next_u64();
            }
        }

        Zobrist {
            box_hashes,
            player_hashes,
        }
    }

    /// Get hash value for a box at a specific position
    pub fn box_hash(&self, pos: Position) -> u64 {
        self.box_hashes[pos.y][pos.x]
    }

    /// Get hash value for the player's canonical position
    pub fn player_hash(&self, pos: Position) -> u64 {
        self.player_hashes[pos.y][pos.x]
    }

    /// Compute hash for all boxes on a board
    pub fn compute_boxes_hash(&self, board: &Board) -> u64 {
        board
            .box_positions()
            .into_iter()
            .fold(0u64, |hash, pos| hash ^ self.box_hash(pos))
    }

    /// Compute the hash for a flood-filled board (boxes hash XOR canonical
    /// player position hash)
    pub fn compute_hash(&self, board: &Board) -> u64 {
        self.compute_boxes_hash(board) ^ self.player_hash(board.canonical_player_pos())
    }
}

impl Default for Zobrist {
    fn default() -> Self {
        Self::new()
    }
}
