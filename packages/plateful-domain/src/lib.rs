pub mod command;
pub mod constraint;
pub mod conversation;
pub mod intent;
pub mod strategy;

use serde::{Deserialize, Serialize};

/// The two retrieval corpora. Same pipeline shape, different collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Corpus {
	Food,
	Manual,
}
impl Corpus {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Food => "food",
			Self::Manual => "manual",
		}
	}
}
