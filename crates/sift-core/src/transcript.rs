//! The conversation transcript — an append-only log of turns.
//!
//! Insertion order is display order, and the whole log is resent as context on
//! every remote call. Indices handed out by [`Transcript::iter`] stay valid for
//! the lifetime of the transcript; the only way to shrink it is a full session
//! reset.

use serde::{Deserialize, Serialize};

use crate::message::Turn;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transcript {
  turns: Vec<Turn>,
}

impl Transcript {
  pub fn new() -> Self { Self::default() }

  /// Append a turn and return its index.
  pub fn append(&mut self, turn: Turn) -> usize {
    self.turns.push(turn);
    self.turns.len() - 1
  }

  /// Lazily yield `(index, turn)` pairs in display order.
  pub fn iter(&self) -> impl Iterator<Item = (usize, &Turn)> + '_ {
    self.turns.iter().enumerate()
  }

  pub fn get(&self, index: usize) -> Option<&Turn> { self.turns.get(index) }

  pub fn last(&self) -> Option<&Turn> { self.turns.last() }

  pub fn len(&self) -> usize { self.turns.len() }

  pub fn is_empty(&self) -> bool { self.turns.is_empty() }

  pub fn as_slice(&self) -> &[Turn] { &self.turns }

  /// Only reachable through [`Session::reset`](crate::session::Session::reset).
  pub(crate) fn clear(&mut self) { self.turns.clear(); }
}
