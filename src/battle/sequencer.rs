use rand::Rng;
use std::str::FromStr;
use std::time::Duration;

use crate::battle::rules::{damage, Fighter, ItemKind, MoveEffect, MoveKey, Stat};
use crate::error::BattleError;
use crate::gate::Gate;

pub const ENEMY_TURN_DELAY: Duration = Duration::from_millis(400);
pub const INTRO: &str = "A wild battle begins!";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Title,
    Arena,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Menu {
    Main,
    Fight,
    Bag,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BattleInput {
    Play,
    Fight,
    Bag,
    Back,
    Move(MoveKey),
    Item(ItemKind),
    /// The stage finished playing the last script.
    ScriptFinished,
    Restart,
}

impl FromStr for BattleInput {
    type Err = BattleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        match s.as_str() {
            "play" => Ok(BattleInput::Play),
            "fight" => Ok(BattleInput::Fight),
            "bag" => Ok(BattleInput::Bag),
            "back" => Ok(BattleInput::Back),
            "restart" => Ok(BattleInput::Restart),
            other => other
                .parse::<MoveKey>()
                .map(BattleInput::Move)
                .or_else(|_| other.parse::<ItemKind>().map(BattleInput::Item)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FighterView {
    pub name: &'static str,
    pub hp: u32,
    pub max_hp: u32,
    pub status: String,
}

impl From<&Fighter> for FighterView {
    fn from(fighter: &Fighter) -> Self {
        FighterView {
            name: fighter.name,
            hp: fighter.hp,
            max_hp: fighter.max_hp,
            status: fighter.status_text(),
        }
    }
}

/// Snapshot of everything the health bars and bag menu show.
#[derive(Debug, Clone, PartialEq)]
pub struct Hud {
    pub player: FighterView,
    pub enemy: FighterView,
    pub super_potions: u32,
    pub potions: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Show(Screen),
    Menu(Menu),
    Render(Hud),
    Say(Vec<String>),
    Pause(Duration),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Won,
    Lost,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnemyAction {
    Heal(ItemKind),
    DebuffDefense,
    Attack,
}

/// Opponent decision thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnemyPolicy {
    pub strong_heal_at: u32,
    pub weak_heal_at: u32,
    pub debuff_chance: f64,
    /// Fraction of the player's base DEF above which debuffing is considered.
    pub debuff_while_above: f64,
}

impl Default for EnemyPolicy {
    fn default() -> Self {
        EnemyPolicy {
            strong_heal_at: 20,
            weak_heal_at: 10,
            debuff_chance: 0.3,
            debuff_while_above: 0.5,
        }
    }
}

impl EnemyPolicy {
    pub fn choose<R: Rng>(&self, enemy: &Fighter, player: &Fighter, rng: &mut R) -> EnemyAction {
        if enemy.hp <= self.strong_heal_at && enemy.items.count(ItemKind::SuperPotion) > 0 {
            return EnemyAction::Heal(ItemKind::SuperPotion);
        }
        if enemy.hp <= self.weak_heal_at && enemy.items.count(ItemKind::Potion) > 0 {
            return EnemyAction::Heal(ItemKind::Potion);
        }
        if player.def > player.base_def * self.debuff_while_above && rng.random::<f64>() < self.debuff_chance {
            return EnemyAction::DebuffDefense;
        }
        EnemyAction::Attack
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Script {
    Intro,
    Turn,
}

/// Turn-based battle state. Every input yields the effects the stage must
/// play; while a script is playing only `ScriptFinished` is accepted.
#[derive(Debug)]
pub struct Battle {
    screen: Screen,
    menu: Menu,
    player: Fighter,
    enemy: Fighter,
    policy: EnemyPolicy,
    script: Gate<Script>,
    outcome: Option<Outcome>,
}

impl Default for Battle {
    fn default() -> Self {
        Battle::new(EnemyPolicy::default())
    }
}

impl Battle {
    pub fn new(policy: EnemyPolicy) -> Self {
        Battle {
            screen: Screen::Title,
            menu: Menu::Main,
            player: Fighter::player(),
            enemy: Fighter::enemy(),
            policy,
            script: Gate::default(),
            outcome: None,
        }
    }

    pub fn menu(&self) -> Menu {
        self.menu
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    pub fn is_busy(&self) -> bool {
        !self.script.is_idle()
    }

    pub fn player(&self) -> &Fighter {
        &self.player
    }

    pub fn enemy(&self) -> &Fighter {
        &self.enemy
    }

    pub fn hud(&self) -> Hud {
        Hud {
            player: FighterView::from(&self.player),
            enemy: FighterView::from(&self.enemy),
            super_potions: self.player.items.count(ItemKind::SuperPotion),
            potions: self.player.items.count(ItemKind::Potion),
        }
    }

    pub fn handle<R: Rng>(&mut self, input: BattleInput, rng: &mut R) -> Result<Vec<Effect>, BattleError> {
        if input == BattleInput::ScriptFinished {
            return Ok(self.finish_script());
        }
        if self.is_busy() {
            return Err(BattleError::Busy);
        }

        match (self.screen, input) {
            (Screen::Title, BattleInput::Play) => Ok(self.start()),
            (Screen::Title, _) => Err(BattleError::NotStarted),
            (Screen::Arena, BattleInput::Restart) => Ok(self.start()),
            (Screen::Arena, _) if self.outcome.is_some() => Err(BattleError::Finished),
            (Screen::Arena, input) => self.act(input, rng),
        }
    }

    fn start(&mut self) -> Vec<Effect> {
        self.player.reset();
        self.enemy.reset();
        self.outcome = None;
        self.menu = Menu::Main;
        self.screen = Screen::Arena;
        self.script.try_begin(Script::Intro);
        tracing::debug!("Battle started");
        vec![
            Effect::Show(Screen::Arena),
            Effect::Menu(Menu::Main),
            Effect::Render(self.hud()),
            Effect::Say(vec![INTRO.to_string()]),
        ]
    }

    fn finish_script(&mut self) -> Vec<Effect> {
        match self.script.finish() {
            Some(_) if self.outcome.is_none() => {
                self.menu = Menu::Main;
                vec![Effect::Menu(Menu::Main), Effect::Render(self.hud())]
            }
            _ => Vec::new(),
        }
    }

    fn switch_menu(&mut self, from: &[Menu], to: Menu) -> Result<Vec<Effect>, BattleError> {
        if !from.contains(&self.menu) {
            return Err(BattleError::WrongMenu);
        }
        self.menu = to;
        Ok(vec![Effect::Menu(to), Effect::Render(self.hud())])
    }

    fn act<R: Rng>(&mut self, input: BattleInput, rng: &mut R) -> Result<Vec<Effect>, BattleError> {
        match input {
            BattleInput::Fight => self.switch_menu(&[Menu::Main], Menu::Fight),
            BattleInput::Bag => self.switch_menu(&[Menu::Main], Menu::Bag),
            BattleInput::Back => self.switch_menu(&[Menu::Fight, Menu::Bag], Menu::Main),
            BattleInput::Move(key) => {
                if self.menu != Menu::Fight {
                    return Err(BattleError::WrongMenu);
                }
                let lines = self.player_move(key);
                Ok(self.play_turn(lines, rng))
            }
            BattleInput::Item(kind) => {
                if self.menu != Menu::Bag {
                    return Err(BattleError::WrongMenu);
                }
                let Some(healed) = self.player.use_item(kind) else {
                    return Err(BattleError::OutOfItem(kind.label()));
                };
                let lines = vec![
                    format!("{} used {}!", self.player.name, kind.label()),
                    format!("{} recovered {} HP!", self.player.name, healed),
                ];
                Ok(self.play_turn(lines, rng))
            }
            BattleInput::Play => Err(BattleError::WrongMenu),
            BattleInput::ScriptFinished | BattleInput::Restart => Ok(Vec::new()),
        }
    }

    fn player_move(&mut self, key: MoveKey) -> Vec<String> {
        let used = format!("{} used {}!", self.player.name, key.name());
        match key.effect() {
            MoveEffect::Damage { base } => {
                let dealt = damage(base, &self.player, &self.enemy);
                self.enemy.take_damage(dealt);
                vec![used, format!("It dealt {} damage!", dealt)]
            }
            MoveEffect::Debuff(stat) => {
                self.enemy.debuff(stat);
                vec![used, format!("{}'s {} fell!", self.enemy.name, stat.label())]
            }
        }
    }

    fn enemy_turn<R: Rng>(&mut self, rng: &mut R) -> Vec<String> {
        match self.policy.choose(&self.enemy, &self.player, rng) {
            EnemyAction::Heal(kind) => {
                let healed = self.enemy.use_item(kind).unwrap_or(0);
                vec![
                    format!("{} used {}!", self.enemy.name, kind.label()),
                    format!("{} recovered {} HP!", self.enemy.name, healed),
                ]
            }
            EnemyAction::DebuffDefense => {
                self.player.debuff(Stat::Def);
                vec![
                    format!("{} used {}!", self.enemy.name, MoveKey::Beef.name()),
                    format!("{}'s DEF fell!", self.player.name),
                ]
            }
            EnemyAction::Attack => {
                let base = match MoveKey::Rug.effect() {
                    MoveEffect::Damage { base } => base,
                    MoveEffect::Debuff(_) => 0.0,
                };
                let dealt = damage(base, &self.enemy, &self.player);
                self.player.take_damage(dealt);
                vec![
                    format!("{} used {}!", self.enemy.name, MoveKey::Rug.name()),
                    format!("It dealt {} damage!", dealt),
                ]
            }
        }
    }

    /// Player lines, end check, then the opponent's reply unless the battle is over.
    fn play_turn<R: Rng>(&mut self, player_lines: Vec<String>, rng: &mut R) -> Vec<Effect> {
        self.script.try_begin(Script::Turn);

        let mut effects = vec![Effect::Say(player_lines), Effect::Render(self.hud())];
        if self.check_end(&mut effects) {
            return effects;
        }

        effects.push(Effect::Pause(ENEMY_TURN_DELAY));
        let enemy_lines = self.enemy_turn(rng);
        effects.push(Effect::Say(enemy_lines));
        effects.push(Effect::Render(self.hud()));
        self.check_end(&mut effects);
        effects
    }

    fn check_end(&mut self, effects: &mut Vec<Effect>) -> bool {
        let (outcome, fallen, verdict) = if self.enemy.is_down() {
            (Outcome::Won, self.enemy.name, "You win! 🎉")
        } else if self.player.is_down() {
            (Outcome::Lost, self.player.name, "You were defeated...")
        } else {
            return false;
        };

        tracing::debug!("Battle ended: {:?}", outcome);
        self.outcome = Some(outcome);
        self.menu = Menu::End;
        effects.push(Effect::Say(vec![format!("{} fainted!", fallen), verdict.to_string()]));
        effects.push(Effect::Menu(Menu::End));
        true
    }
}
