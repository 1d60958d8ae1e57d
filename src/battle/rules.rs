use std::str::FromStr;

use crate::error::BattleError;

pub const DEBUFF_FACTOR: f64 = 0.8;
pub const STAT_FLOOR: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stat {
    Atk,
    Def,
}

impl Stat {
    pub fn label(self) -> &'static str {
        match self {
            Stat::Atk => "ATK",
            Stat::Def => "DEF",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MoveEffect {
    Damage { base: f64 },
    Debuff(Stat),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveKey {
    Chop,
    Blast,
    Rug,
    Beef,
}

impl MoveKey {
    pub const ALL: [MoveKey; 4] = [MoveKey::Chop, MoveKey::Blast, MoveKey::Rug, MoveKey::Beef];

    pub fn key(self) -> &'static str {
        match self {
            MoveKey::Chop => "chop",
            MoveKey::Blast => "blast",
            MoveKey::Rug => "rug",
            MoveKey::Beef => "beef",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            MoveKey::Chop => "Chop It Off",
            MoveKey::Blast => "Banana Blast",
            MoveKey::Rug => "Rug",
            MoveKey::Beef => "Beef with people who actually do stuff for the community",
        }
    }

    pub fn effect(self) -> MoveEffect {
        match self {
            MoveKey::Chop => MoveEffect::Debuff(Stat::Atk),
            MoveKey::Blast => MoveEffect::Damage { base: 25.0 },
            MoveKey::Rug => MoveEffect::Damage { base: 15.0 },
            MoveKey::Beef => MoveEffect::Debuff(Stat::Def),
        }
    }
}

impl FromStr for MoveKey {
    type Err = BattleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MoveKey::ALL
            .into_iter()
            .find(|m| m.key() == s)
            .ok_or_else(|| BattleError::UnknownAction(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    SuperPotion,
    Potion,
}

impl ItemKind {
    pub const ALL: [ItemKind; 2] = [ItemKind::SuperPotion, ItemKind::Potion];

    pub fn key(self) -> &'static str {
        match self {
            ItemKind::SuperPotion => "super-potion",
            ItemKind::Potion => "potion",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ItemKind::SuperPotion => "Super Potion",
            ItemKind::Potion => "Potion",
        }
    }

    pub fn heal(self) -> u32 {
        match self {
            ItemKind::SuperPotion => 50,
            ItemKind::Potion => 10,
        }
    }
}

impl FromStr for ItemKind {
    type Err = BattleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ItemKind::ALL
            .into_iter()
            .find(|i| i.key() == s)
            .ok_or_else(|| BattleError::UnknownAction(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inventory {
    pub super_potion: u32,
    pub potion: u32,
}

impl Inventory {
    pub fn starting() -> Self {
        Inventory {
            super_potion: 1,
            potion: 1,
        }
    }

    pub fn count(&self, kind: ItemKind) -> u32 {
        match kind {
            ItemKind::SuperPotion => self.super_potion,
            ItemKind::Potion => self.potion,
        }
    }

    /// Consumes one unit; `false` when none are left.
    fn take(&mut self, kind: ItemKind) -> bool {
        let slot = match kind {
            ItemKind::SuperPotion => &mut self.super_potion,
            ItemKind::Potion => &mut self.potion,
        };
        if *slot == 0 {
            return false;
        }
        *slot -= 1;
        true
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Fighter {
    pub name: &'static str,
    pub max_hp: u32,
    pub hp: u32,
    pub base_atk: f64,
    pub atk: f64,
    pub base_def: f64,
    pub def: f64,
    pub items: Inventory,
}

impl Fighter {
    fn new(name: &'static str, max_hp: u32, atk: f64, def: f64) -> Self {
        Fighter {
            name,
            max_hp,
            hp: max_hp,
            base_atk: atk,
            atk,
            base_def: def,
            def,
            items: Inventory::starting(),
        }
    }

    pub fn player() -> Self {
        Fighter::new("Justino Il’ Banino", 80, 20.0, 15.0)
    }

    pub fn enemy() -> Self {
        Fighter::new("Brandogno Il’ Rugonononono", 50, 15.0, 10.0)
    }

    pub fn reset(&mut self) {
        self.hp = self.max_hp;
        self.atk = self.base_atk;
        self.def = self.base_def;
        self.items = Inventory::starting();
    }

    pub fn base(&self, stat: Stat) -> f64 {
        match stat {
            Stat::Atk => self.base_atk,
            Stat::Def => self.base_def,
        }
    }

    /// Multiplies the stat by 0.8, never dropping below 20% of its base.
    pub fn debuff(&mut self, stat: Stat) {
        let floor = self.base(stat) * STAT_FLOOR;
        let value = match stat {
            Stat::Atk => &mut self.atk,
            Stat::Def => &mut self.def,
        };
        *value = (*value * DEBUFF_FACTOR).max(floor);
    }

    pub fn take_damage(&mut self, amount: u32) {
        self.hp = self.hp.saturating_sub(amount);
    }

    /// Returns how much health was actually restored.
    pub fn heal(&mut self, amount: u32) -> u32 {
        let before = self.hp;
        self.hp = self.max_hp.min(self.hp.saturating_add(amount));
        self.hp - before
    }

    pub fn use_item(&mut self, kind: ItemKind) -> Option<u32> {
        if !self.items.take(kind) {
            return None;
        }
        Some(self.heal(kind.heal()))
    }

    pub fn is_down(&self) -> bool {
        self.hp == 0
    }

    pub fn status_text(&self) -> String {
        let mut status = Vec::new();
        if self.atk < self.base_atk {
            status.push("ATK ↓");
        }
        if self.def < self.base_def {
            status.push("DEF ↓");
        }
        status.join(" ")
    }
}

pub fn damage(base: f64, attacker: &Fighter, defender: &Fighter) -> u32 {
    (base * attacker.atk / defender.def).round().max(1.0) as u32
}
