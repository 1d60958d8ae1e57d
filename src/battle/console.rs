use eyre::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::io::{self, Write};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::battle::rules::{ItemKind, MoveKey};
use crate::battle::sequencer::{Battle, BattleInput, FighterView, Hud, Menu, Screen};
use crate::battle::stage::{Canvas, Pacing, Stage};
use crate::error::BattleError;

/// Draws the battle on stdout, one character at a time.
pub struct TerminalCanvas<W: Write> {
    out: W,
}

impl<W: Write> TerminalCanvas<W> {
    pub fn new(out: W) -> Self {
        TerminalCanvas { out }
    }

    fn emit(&mut self, text: &str) {
        if let Err(err) = self.out.write_all(text.as_bytes()).and_then(|_| self.out.flush()) {
            tracing::warn!("Could not draw battle output: {}", err);
        }
    }
}

fn hp_bar(view: &FighterView) -> String {
    const WIDTH: u32 = 20;
    let filled = if view.max_hp == 0 {
        0
    } else {
        (view.hp * WIDTH + view.max_hp / 2) / view.max_hp
    };
    format!(
        "{:<28} [{}{}] {}/{} {}",
        view.name,
        "#".repeat(filled as usize),
        "-".repeat((WIDTH - filled) as usize),
        view.hp,
        view.max_hp,
        view.status
    )
}

pub fn menu_text(menu: Menu, hud: &Hud) -> String {
    match menu {
        Menu::Main => "> fight | bag".to_string(),
        Menu::Fight => {
            let moves: Vec<String> = MoveKey::ALL
                .iter()
                .map(|m| format!("{} ({})", m.key(), m.name()))
                .collect();
            format!("> {} | back", moves.join(" | "))
        }
        Menu::Bag => format!(
            "> {} ({}) +{} | {} ({}) +{} | back",
            ItemKind::SuperPotion.key(),
            hud.super_potions,
            ItemKind::SuperPotion.heal(),
            ItemKind::Potion.key(),
            hud.potions,
            ItemKind::Potion.heal()
        ),
        Menu::End => "> restart".to_string(),
    }
}

impl<W: Write> Canvas for TerminalCanvas<W> {
    fn show(&mut self, screen: Screen) {
        match screen {
            Screen::Title => self.emit("=== Banana Battle ===\n> play\n"),
            Screen::Arena => self.emit("\n=== Battle ===\n"),
        }
    }

    fn menu(&mut self, menu: Menu, hud: &Hud) {
        let text = menu_text(menu, hud);
        self.emit(&format!("{}\n", text));
    }

    fn hud(&mut self, hud: &Hud) {
        let text = format!("{}\n{}\n", hp_bar(&hud.enemy), hp_bar(&hud.player));
        self.emit(&text);
    }

    fn begin_line(&mut self) {}

    fn type_char(&mut self, ch: char) {
        let mut buf = [0u8; 4];
        self.emit(ch.encode_utf8(&mut buf));
    }

    fn end_line(&mut self) {
        self.emit("\n");
    }
}

/// Feeds typed lines to the stage until the channel closes or `quit`.
/// Lines that arrive while a script is still playing are refused.
pub async fn drive<C, R, F>(stage: &mut Stage<C, R>, lines: &mut UnboundedReceiver<String>, mut report: F)
where
    C: Canvas,
    R: Rng,
    F: FnMut(BattleError),
{
    while let Some(line) = lines.recv().await {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("quit") {
            break;
        }

        let input = match line.parse::<BattleInput>() {
            Ok(input) => input,
            Err(err) => {
                report(err);
                continue;
            }
        };

        let press = stage.press(input);
        tokio::pin!(press);
        let result = loop {
            tokio::select! {
                biased;
                result = &mut press => break result,
                Some(early) = lines.recv() => {
                    tracing::debug!("Ignoring {:?} typed during a script", early);
                    report(BattleError::Busy);
                }
            }
        };
        if let Err(err) = result {
            report(err);
        }
    }
}

pub async fn run_battle(pacing: Pacing, mut lines: UnboundedReceiver<String>) -> Result<()> {
    let mut canvas = TerminalCanvas::new(io::stdout());
    canvas.show(Screen::Title);
    let mut stage = Stage::new(Battle::default(), canvas, StdRng::from_os_rng(), pacing);

    drive(&mut stage, &mut lines, |err| println!("{}", err)).await;
    Ok(())
}
