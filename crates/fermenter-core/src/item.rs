use crate::id::{ItemKindId, ThingId};
use crate::quality::QualityCategory;
use serde::{Deserialize, Serialize};

/// A host-side item stack handed to (or held by) a fermenter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thing {
    pub id: ThingId,
    pub kind: ItemKindId,
    pub stack_count: u32,
    /// Ingredient provenance carried by the stack (e.g. the fruits that went
    /// into a must). Empty when the stack is a raw ingredient.
    #[serde(default)]
    pub ingredients: Vec<ItemKindId>,
}

impl Thing {
    pub fn new(id: ThingId, kind: ItemKindId, stack_count: u32) -> Self {
        Self {
            id,
            kind,
            stack_count,
            ingredients: Vec::new(),
        }
    }

    pub fn with_ingredients(mut self, ingredients: Vec<ItemKindId>) -> Self {
        self.ingredients = ingredients;
        self
    }

    /// Split `count` units off into a new stack that keeps this stack's id;
    /// `self` keeps the rest. The caller re-identifies whichever half it
    /// hands back to the host.
    pub fn split_off(&mut self, count: u32) -> Thing {
        let taken = count.min(self.stack_count);
        self.stack_count -= taken;
        Thing {
            id: self.id,
            kind: self.kind,
            stack_count: taken,
            ingredients: self.ingredients.clone(),
        }
    }

    /// Kinds this stack contributes as ingredients: its provenance if it has
    /// any, else its own kind.
    pub fn ingredient_kinds(&self) -> impl Iterator<Item = ItemKindId> + '_ {
        let own = self.ingredients.is_empty().then_some(self.kind);
        self.ingredients.iter().copied().chain(own)
    }
}

/// An output stack synthesized when a batch is taken out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductStack {
    pub kind: ItemKindId,
    pub count: u32,
    pub quality: Option<QualityCategory>,
    pub ingredients: Vec<ItemKindId>,
    pub label: Option<String>,
}

/// Items held by one batch, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeldItems {
    things: Vec<Thing>,
}

impl HeldItems {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, thing: Thing) {
        self.things.push(thing);
    }

    /// Total units across all held stacks.
    pub fn total(&self) -> u32 {
        self.things.iter().map(|t| t.stack_count).sum()
    }

    pub fn contains(&self, id: ThingId) -> bool {
        self.things.iter().any(|t| t.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.things.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Thing> {
        self.things.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = ThingId> + '_ {
        self.things.iter().map(|t| t.id)
    }

    /// De-duplicated ingredient kinds in first-seen order.
    pub fn ingredient_kinds(&self) -> Vec<ItemKindId> {
        let mut out = Vec::new();
        for kind in self.things.iter().flat_map(Thing::ingredient_kinds) {
            if !out.contains(&kind) {
                out.push(kind);
            }
        }
        out
    }

    /// Remove every held stack, returning them in insertion order.
    pub fn drain(&mut self) -> Vec<Thing> {
        std::mem::take(&mut self.things)
    }

    pub fn into_vec(self) -> Vec<Thing> {
        self.things
    }
}

impl From<Vec<Thing>> for HeldItems {
    fn from(things: Vec<Thing>) -> Self {
        Self { things }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hops() -> ItemKindId {
        ItemKindId(0)
    }
    fn berries() -> ItemKindId {
        ItemKindId(1)
    }

    #[test]
    fn held_items_total() {
        let mut held = HeldItems::new();
        held.push(Thing::new(ThingId(1), hops(), 10));
        held.push(Thing::new(ThingId(2), hops(), 15));
        assert_eq!(held.total(), 25);
        assert!(held.contains(ThingId(2)));
        assert!(!held.contains(ThingId(3)));
    }

    #[test]
    fn split_off_caps_at_stack_size() {
        let mut t = Thing::new(ThingId(1), hops(), 10);
        let taken = t.split_off(4);
        assert_eq!(taken.stack_count, 4);
        assert_eq!(t.stack_count, 6);

        let rest = t.split_off(100);
        assert_eq!(rest.stack_count, 6);
        assert_eq!(t.stack_count, 0);
    }

    #[test]
    fn ingredient_kinds_prefer_provenance() {
        let mut held = HeldItems::new();
        held.push(Thing::new(ThingId(1), hops(), 5));
        held.push(Thing::new(ThingId(2), ItemKindId(9), 5).with_ingredients(vec![berries(), hops()]));
        assert_eq!(held.ingredient_kinds(), vec![hops(), berries()]);
    }

    #[test]
    fn drain_empties() {
        let mut held = HeldItems::from(vec![Thing::new(ThingId(1), hops(), 5)]);
        let out = held.drain();
        assert_eq!(out.len(), 1);
        assert!(held.is_empty());
        assert_eq!(held.total(), 0);
    }
}
