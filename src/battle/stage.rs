use rand::Rng;
use std::time::Duration;
use tokio::time::sleep;

use crate::battle::sequencer::{Battle, BattleInput, Effect, Hud, Menu, Screen};
use crate::error::BattleError;

/// Message reveal timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    pub per_char: Duration,
    pub per_line: Duration,
    /// Multiplier applied to explicit pauses; zero skips them.
    pub pauses: u32,
}

impl Default for Pacing {
    fn default() -> Self {
        Pacing {
            per_char: Duration::from_millis(20),
            per_line: Duration::from_millis(500),
            pauses: 1,
        }
    }
}

impl Pacing {
    pub fn instant() -> Self {
        Pacing {
            per_char: Duration::ZERO,
            per_line: Duration::ZERO,
            pauses: 0,
        }
    }
}

/// Output surface for a battle.
pub trait Canvas {
    fn show(&mut self, screen: Screen);
    fn menu(&mut self, menu: Menu, hud: &Hud);
    fn hud(&mut self, hud: &Hud);
    fn begin_line(&mut self);
    fn type_char(&mut self, ch: char);
    fn end_line(&mut self);
}

/// Plays the effects of each input to completion before taking the next one,
/// then reports `ScriptFinished` back to the battle.
pub struct Stage<C, R> {
    battle: Battle,
    canvas: C,
    rng: R,
    pacing: Pacing,
    hud: Hud,
}

impl<C: Canvas, R: Rng> Stage<C, R> {
    pub fn new(battle: Battle, canvas: C, rng: R, pacing: Pacing) -> Self {
        let hud = battle.hud();
        Stage {
            battle,
            canvas,
            rng,
            pacing,
            hud,
        }
    }

    pub fn battle(&self) -> &Battle {
        &self.battle
    }

    pub fn canvas(&self) -> &C {
        &self.canvas
    }

    pub async fn press(&mut self, input: BattleInput) -> Result<(), BattleError> {
        let effects = self.battle.handle(input, &mut self.rng)?;
        let scripted = self.battle.is_busy();
        self.play(effects).await;

        if scripted {
            let tail = self.battle.handle(BattleInput::ScriptFinished, &mut self.rng)?;
            self.play(tail).await;
        }
        Ok(())
    }

    async fn play(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Show(screen) => self.canvas.show(screen),
                Effect::Menu(menu) => self.canvas.menu(menu, &self.hud),
                Effect::Render(hud) => {
                    self.canvas.hud(&hud);
                    self.hud = hud;
                }
                Effect::Say(lines) => {
                    for line in lines {
                        self.type_line(&line).await;
                    }
                }
                Effect::Pause(duration) => {
                    if self.pacing.pauses > 0 {
                        sleep(duration * self.pacing.pauses).await;
                    }
                }
            }
        }
    }

    async fn type_line(&mut self, line: &str) {
        self.canvas.begin_line();
        for ch in line.chars() {
            self.canvas.type_char(ch);
            if !self.pacing.per_char.is_zero() {
                sleep(self.pacing.per_char).await;
            }
        }
        self.canvas.end_line();
        if !self.pacing.per_line.is_zero() {
            sleep(self.pacing.per_line).await;
        }
    }
}
