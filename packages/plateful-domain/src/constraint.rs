//! Hard-attribute constraints and their compiled predicate form.
//!
//! Constraints arrive as a mapping of named filters (macro ranges, meal-slot
//! flags, dietary exclusions). `compile` turns them into an AND-list of
//! typed clauses, rejecting unknown attributes and inverted ranges before
//! anything touches the network. The compiled predicate doubles as an
//! in-process matcher over attribute snapshots, which keeps the store-side
//! filter and the test-side evaluation in one grammar.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NumericRange {
	pub min: Option<f64>,
	pub max: Option<f64>,
}

/// Caller-facing constraint set. `ranges` is keyed by attribute name so an
/// unknown name is representable and can be rejected with a precise error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchConstraints {
	#[serde(default)]
	pub ranges: BTreeMap<String, NumericRange>,
	#[serde(default)]
	pub meal_slots: Vec<String>,
	#[serde(default)]
	pub exclude_tags: Vec<String>,
}
impl SearchConstraints {
	pub fn is_empty(&self) -> bool {
		self.ranges.is_empty() && self.meal_slots.is_empty() && self.exclude_tags.is_empty()
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericField {
	Calories,
	ProteinG,
	CarbsG,
	FatG,
	FiberG,
	TotalTimeMinutes,
}
impl NumericField {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Calories => "calories",
			Self::ProteinG => "protein_g",
			Self::CarbsG => "carbs_g",
			Self::FatG => "fat_g",
			Self::FiberG => "fiber_g",
			Self::TotalTimeMinutes => "total_time_minutes",
		}
	}

	fn parse(name: &str) -> Option<Self> {
		match name {
			"calories" => Some(Self::Calories),
			"protein_g" => Some(Self::ProteinG),
			"carbs_g" => Some(Self::CarbsG),
			"fat_g" => Some(Self::FatG),
			"fiber_g" => Some(Self::FiberG),
			"total_time_minutes" => Some(Self::TotalTimeMinutes),
			_ => None,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotField {
	Breakfast,
	Lunch,
	Dinner,
	Snack,
}
impl SlotField {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Breakfast => "is_breakfast",
			Self::Lunch => "is_lunch",
			Self::Dinner => "is_dinner",
			Self::Snack => "is_snack",
		}
	}

	fn parse(name: &str) -> Option<Self> {
		match name {
			"breakfast" => Some(Self::Breakfast),
			"lunch" => Some(Self::Lunch),
			"dinner" => Some(Self::Dinner),
			"snack" => Some(Self::Snack),
			_ => None,
		}
	}
}

#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
	Range { field: NumericField, min: Option<f64>, max: Option<f64> },
	Slot { field: SlotField },
	ExcludeTag { tag: String },
}

/// AND of all clauses. Clause order is deterministic because the source map
/// is a `BTreeMap` and slot/tag lists are compiled in input order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate {
	pub clauses: Vec<Clause>,
}
impl Predicate {
	pub fn is_empty(&self) -> bool {
		self.clauses.is_empty()
	}

	pub fn matches(&self, attrs: &ItemAttributes) -> bool {
		self.clauses.iter().all(|clause| match clause {
			Clause::Range { field, min, max } => {
				let value = attrs.numeric(*field);

				min.map(|bound| value >= bound).unwrap_or(true)
					&& max.map(|bound| value <= bound).unwrap_or(true)
			},
			Clause::Slot { field } => attrs.slot(*field),
			Clause::ExcludeTag { tag } =>
				!attrs.tags.iter().any(|item_tag| item_tag.eq_ignore_ascii_case(tag)),
		})
	}
}

pub type ConstraintResult<T> = Result<T, ConstraintError>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConstraintError {
	#[error("Unknown filter attribute '{name}'.")]
	UnknownAttribute { name: String },
	#[error("Inverted range on '{name}': min {min} is greater than max {max}.")]
	InvertedRange { name: String, min: f64, max: f64 },
	#[error("Range on '{name}' sets neither min nor max.")]
	EmptyRange { name: String },
}

pub fn compile(constraints: &SearchConstraints) -> ConstraintResult<Predicate> {
	let mut clauses = Vec::new();

	for (name, range) in &constraints.ranges {
		let field = NumericField::parse(name)
			.ok_or_else(|| ConstraintError::UnknownAttribute { name: name.clone() })?;

		match (range.min, range.max) {
			(None, None) => return Err(ConstraintError::EmptyRange { name: name.clone() }),
			(Some(min), Some(max)) if min > max =>
				return Err(ConstraintError::InvertedRange { name: name.clone(), min, max }),
			_ => {},
		}

		clauses.push(Clause::Range { field, min: range.min, max: range.max });
	}
	for slot in &constraints.meal_slots {
		let field = SlotField::parse(slot.to_ascii_lowercase().as_str())
			.ok_or_else(|| ConstraintError::UnknownAttribute { name: slot.clone() })?;

		clauses.push(Clause::Slot { field });
	}
	for tag in &constraints.exclude_tags {
		let trimmed = tag.trim();

		if trimmed.is_empty() {
			continue;
		}

		clauses.push(Clause::ExcludeTag { tag: trimmed.to_string() });
	}

	Ok(Predicate { clauses })
}

/// Attribute snapshot carried with every candidate, sufficient for both
/// predicate evaluation and grounding-context display.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemAttributes {
	pub name: String,
	#[serde(default)]
	pub calories: f64,
	#[serde(default)]
	pub protein_g: f64,
	#[serde(default)]
	pub carbs_g: f64,
	#[serde(default)]
	pub fat_g: f64,
	#[serde(default)]
	pub fiber_g: f64,
	#[serde(default)]
	pub total_time_minutes: f64,
	#[serde(default)]
	pub is_breakfast: bool,
	#[serde(default)]
	pub is_lunch: bool,
	#[serde(default)]
	pub is_dinner: bool,
	#[serde(default)]
	pub is_snack: bool,
	#[serde(default)]
	pub tags: Vec<String>,
}
impl ItemAttributes {
	fn numeric(&self, field: NumericField) -> f64 {
		match field {
			NumericField::Calories => self.calories,
			NumericField::ProteinG => self.protein_g,
			NumericField::CarbsG => self.carbs_g,
			NumericField::FatG => self.fat_g,
			NumericField::FiberG => self.fiber_g,
			NumericField::TotalTimeMinutes => self.total_time_minutes,
		}
	}

	fn slot(&self, field: SlotField) -> bool {
		match field {
			SlotField::Breakfast => self.is_breakfast,
			SlotField::Lunch => self.is_lunch,
			SlotField::Dinner => self.is_dinner,
			SlotField::Snack => self.is_snack,
		}
	}

	/// Human-readable block injected into the grounding context.
	pub fn summary(&self) -> String {
		let mut slots = Vec::new();

		if self.is_breakfast {
			slots.push("breakfast");
		}
		if self.is_lunch {
			slots.push("lunch");
		}
		if self.is_dinner {
			slots.push("dinner");
		}
		if self.is_snack {
			slots.push("snack");
		}

		let slots = if slots.is_empty() { "unspecified".to_string() } else { slots.join(", ") };
		let tags = if self.tags.is_empty() { "none".to_string() } else { self.tags.join(", ") };

		format!(
			"{name}\nCalories: {calories:.0} kcal | Protein: {protein:.1} g | Carbs: {carbs:.1} g | Fat: {fat:.1} g | Fiber: {fiber:.1} g\nMeal slots: {slots}\nTags: {tags}",
			name = self.name,
			calories = self.calories,
			protein = self.protein_g,
			carbs = self.carbs_g,
			fat = self.fat_g,
			fiber = self.fiber_g,
		)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn range(min: Option<f64>, max: Option<f64>) -> NumericRange {
		NumericRange { min, max }
	}

	#[test]
	fn compiles_ranges_in_deterministic_order() {
		let mut constraints = SearchConstraints::default();

		constraints.ranges.insert("protein_g".to_string(), range(Some(20.0), None));
		constraints.ranges.insert("calories".to_string(), range(None, Some(500.0)));

		let predicate = compile(&constraints).expect("valid constraints");

		assert_eq!(predicate.clauses.len(), 2);
		assert!(matches!(
			predicate.clauses[0],
			Clause::Range { field: NumericField::Calories, .. }
		));
		assert!(matches!(
			predicate.clauses[1],
			Clause::Range { field: NumericField::ProteinG, .. }
		));
	}

	#[test]
	fn rejects_unknown_attribute() {
		let mut constraints = SearchConstraints::default();

		constraints.ranges.insert("sodium_mg".to_string(), range(None, Some(100.0)));

		assert_eq!(
			compile(&constraints),
			Err(ConstraintError::UnknownAttribute { name: "sodium_mg".to_string() })
		);
	}

	#[test]
	fn rejects_inverted_range() {
		let mut constraints = SearchConstraints::default();

		constraints.ranges.insert("calories".to_string(), range(Some(800.0), Some(200.0)));

		assert_eq!(
			compile(&constraints),
			Err(ConstraintError::InvertedRange {
				name: "calories".to_string(),
				min: 800.0,
				max: 200.0
			})
		);
	}

	#[test]
	fn rejects_unbounded_range() {
		let mut constraints = SearchConstraints::default();

		constraints.ranges.insert("fat_g".to_string(), range(None, None));

		assert!(matches!(compile(&constraints), Err(ConstraintError::EmptyRange { .. })));
	}

	#[test]
	fn rejects_unknown_meal_slot() {
		let constraints = SearchConstraints {
			meal_slots: vec!["brunch".to_string()],
			..SearchConstraints::default()
		};

		assert!(matches!(compile(&constraints), Err(ConstraintError::UnknownAttribute { .. })));
	}

	#[test]
	fn predicate_matches_attribute_snapshot() {
		let mut constraints = SearchConstraints::default();

		constraints.ranges.insert("carbs_g".to_string(), range(None, Some(20.0)));
		constraints.meal_slots.push("dinner".to_string());
		constraints.exclude_tags.push("gluten".to_string());

		let predicate = compile(&constraints).expect("valid constraints");
		let mut attrs = ItemAttributes {
			name: "Zucchini noodles".to_string(),
			carbs_g: 9.0,
			is_dinner: true,
			tags: vec!["vegetarian".to_string()],
			..ItemAttributes::default()
		};

		assert!(predicate.matches(&attrs));

		attrs.tags.push("Gluten".to_string());

		assert!(!predicate.matches(&attrs), "tag exclusion is case-insensitive");
	}

	#[test]
	fn empty_constraints_compile_to_empty_predicate() {
		let predicate = compile(&SearchConstraints::default()).expect("empty is valid");

		assert!(predicate.is_empty());
		assert!(predicate.matches(&ItemAttributes::default()));
	}
}
