//! 终端渲染器
//!
//! Draws the current mode on every Tick. Reads the world and the mode stack,
//! never writes them.

use dungeon::{Character, EntityKind, GameLevel};
use hero::{Ability, Upgrade, UpgradeState};
use ratatui::{
    Frame, Terminal,
    backend::Backend,
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Widget, Wrap},
};
use std::cell::RefCell;
use std::rc::Rc;

use crate::event_bus::{EventHandler, GameEvent, Outbox};
use crate::model::World;
use crate::states::{Mode, ModeStack};

const HELP_LINES: &[&str] = &[
    "arrows / h j k l   move, bump to use or attack",
    "W A S D            scroll the view",
    "1 - 9              activate an upgrade",
    ".                  wait a turn",
    "Esc                back to the menu",
];

/// Ratatui view over any backend
pub struct TerminalView<B: Backend> {
    terminal: Terminal<B>,
    world: Rc<RefCell<World>>,
    modes: Rc<RefCell<ModeStack>>,
    /// Map coordinate drawn in the top-left cell
    viewport: (i32, i32),
}

impl<B: Backend> TerminalView<B> {
    pub fn new(terminal: Terminal<B>, world: Rc<RefCell<World>>, modes: Rc<RefCell<ModeStack>>) -> Self {
        Self {
            terminal,
            world,
            modes,
            viewport: (0, 0),
        }
    }

    pub fn viewport(&self) -> (i32, i32) {
        self.viewport
    }

    pub fn terminal(&self) -> &Terminal<B> {
        &self.terminal
    }

    fn shift(&mut self, dx: i32, dy: i32) {
        let world = self.world.borrow();
        let (w, h) = world
            .level
            .as_ref()
            .map(|l| (l.map().width(), l.map().height()))
            .unwrap_or((1, 1));
        self.viewport.0 = (self.viewport.0 + dx).clamp(0, (w - 1).max(0));
        self.viewport.1 = (self.viewport.1 + dy).clamp(0, (h - 1).max(0));
    }

    pub fn draw(&mut self) -> anyhow::Result<()> {
        let world = self.world.borrow();
        let mode = self.modes.borrow().peek();
        let viewport = self.viewport;
        self.terminal.draw(|frame| render(frame, mode, &world, viewport))?;
        Ok(())
    }
}

impl<B: Backend + 'static> EventHandler for TerminalView<B> {
    fn handle(&mut self, event: &GameEvent, _outbox: &mut Outbox) -> anyhow::Result<()> {
        match event {
            GameEvent::Initialize => self.terminal.clear()?,
            GameEvent::NextLevel { .. } => self.viewport = (0, 0),
            GameEvent::ShiftViewport { dx, dy } => self.shift(*dx, *dy),
            GameEvent::Tick => self.draw()?,
            _ => {}
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "view"
    }
}

fn render(frame: &mut Frame, mode: Option<Mode>, world: &World, viewport: (i32, i32)) {
    let area = frame.area();
    match mode {
        Some(Mode::Intro) => render_text_screen(
            frame,
            area,
            "TILE ROGUE",
            &[
                "A maintenance unit wakes up on the factory floor.",
                "Every door is locked. Find the exits.",
                "",
                "press any key",
            ],
        ),
        Some(Mode::Menu) => render_text_screen(
            frame,
            area,
            "Menu",
            &["Space / Enter   play", "h               help", "a               about", "Esc / q         quit"],
        ),
        Some(Mode::Help) => render_text_screen(frame, area, "Help", HELP_LINES),
        Some(Mode::About) => render_text_screen(
            frame,
            area,
            "About",
            &["tile_rogue", "a small terminal roguelike of switches and doors", "", "press any key"],
        ),
        Some(Mode::Play) => render_play(frame, area, world, viewport),
        Some(Mode::Dialog) => {
            render_play(frame, area, world, viewport);
            let text = world.messages.back().map(String::as_str).unwrap_or("");
            render_dialog(frame, area, text);
        }
        None => {}
    }
}

fn render_text_screen(frame: &mut Frame, area: Rect, title: &str, lines: &[&str]) {
    let text: Vec<Line> = lines.iter().map(|l| Line::from(*l)).collect();
    let screen = Paragraph::new(text)
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .title(title.to_string())
                .title_alignment(Alignment::Center)
                .borders(Borders::ALL)
                .style(Style::default().fg(Color::Yellow)),
        );
    frame.render_widget(screen, centered_rect(area, 70, 60));
}

fn render_play(frame: &mut Frame, area: Rect, world: &World, viewport: (i32, i32)) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(5), Constraint::Length(3), Constraint::Length(7)])
        .split(area);

    let block = Block::default()
        .title(format!("Level {}", world.level_number))
        .borders(Borders::ALL);
    let inner = block.inner(chunks[0]);
    frame.render_widget(block, chunks[0]);
    if let Some(level) = world.level.as_ref() {
        frame.render_widget(MapWidget { level, viewport }, inner);
    }

    frame.render_widget(hud(world), chunks[1]);

    let log: Vec<Line> = world
        .messages
        .iter()
        .rev()
        .take(chunks[2].height.saturating_sub(2) as usize)
        .rev()
        .map(|m| Line::from(m.as_str()))
        .collect();
    let messages = Paragraph::new(log)
        .wrap(Wrap { trim: true })
        .block(Block::default().title("Log").borders(Borders::ALL));
    frame.render_widget(messages, chunks[2]);
}

fn hud(world: &World) -> Paragraph<'_> {
    let mut spans = Vec::new();
    if let Some(player) = world.level.as_ref().and_then(|l| l.player()) {
        let s = &player.stats;
        spans.push(Span::styled(
            format!("HP {:.0}/{:.0}", s.health.max(0.0), s.max_health),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ));
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            format!("MP {:.0}/{:.0}", s.mana, s.max_mana),
            Style::default().fg(Color::Blue),
        ));
        spans.push(Span::raw(format!("  turn {}", world.turns)));
    }
    for (slot, upgrade) in world.upgrades.iter().enumerate() {
        spans.push(Span::raw(format!("  {}:{}", slot + 1, upgrade_label(upgrade))));
    }
    Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::ALL))
}

fn upgrade_label(upgrade: &Upgrade) -> String {
    let state = match upgrade.state() {
        UpgradeState::Ready => "ready".to_string(),
        UpgradeState::Active => format!("on {}", upgrade.busy_remaining()),
        UpgradeState::Cooling => format!("wait {}", upgrade.cooldown_remaining()),
        UpgradeState::Unavailable if upgrade.is_passive() => "passive".to_string(),
        UpgradeState::Unavailable => "off".to_string(),
    };
    format!("{} v{} [{}]", upgrade.name(), upgrade.version(), state)
}

fn render_dialog(frame: &mut Frame, area: Rect, text: &str) {
    let popup = centered_rect(area, 50, 25);
    frame.render_widget(Clear, popup);
    let dialog = Paragraph::new(vec![Line::from(text), Line::from(""), Line::from("press any key")])
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Red)),
        );
    frame.render_widget(dialog, popup);
}

fn centered_rect(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}

/// Tile grid plus visible entities, offset by the viewport
struct MapWidget<'a> {
    level: &'a GameLevel,
    viewport: (i32, i32),
}

impl Widget for MapWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let map = self.level.map();
        let (vx, vy) = self.viewport;

        for sy in 0..area.height {
            for sx in 0..area.width {
                let (x, y) = (vx + sx as i32, vy + sy as i32);
                let Some(tile) = map.tile(x, y) else {
                    continue;
                };
                let glyph = tile
                    .properties
                    .and_then(|p| p.get("glyph"))
                    .and_then(|g| g.chars().next())
                    .unwrap_or(if tile.blocks() { '#' } else { '.' });
                let color = if tile.blocks() { Color::Gray } else { Color::DarkGray };
                buf[(area.x + sx, area.y + sy)]
                    .set_char(glyph)
                    .set_style(Style::default().fg(color));
            }
        }

        for entity in self.level.entities().iter().filter(|e| e.visible) {
            let (sx, sy) = (entity.x - vx, entity.y - vy);
            if sx < 0 || sy < 0 || sx >= area.width as i32 || sy >= area.height as i32 {
                continue;
            }
            let (glyph, color) = entity_glyph(self.level, entity);
            buf[(area.x + sx as u16, area.y + sy as u16)]
                .set_char(glyph)
                .set_style(Style::default().fg(color).add_modifier(Modifier::BOLD));
        }
    }
}

fn entity_glyph(level: &GameLevel, entity: &Character) -> (char, Color) {
    if let Some(glyph) = entity.properties.get("glyph").and_then(|g| g.chars().next()) {
        return (glyph, Color::Cyan);
    }
    let blocks = level.map().blocks(entity.tile_id);
    match &entity.kind {
        EntityKind::Player => ('@', Color::Yellow),
        EntityKind::Ai => ('S', Color::Red),
        EntityKind::Door if blocks => ('+', Color::Magenta),
        EntityKind::Door => ('/', Color::Magenta),
        EntityKind::Switch => ('!', Color::Green),
        EntityKind::Terminal => ('&', Color::Green),
        EntityKind::Exit => ('>', Color::White),
        EntityKind::Scenery(_) => ('*', Color::Cyan),
    }
}
