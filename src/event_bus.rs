//! 事件总线系统，用于解耦模块间通信
//!
//! Listeners are delivered every posted event synchronously, in registration
//! order. Events a listener raises while handling go into an [`Outbox`] and are
//! delivered after the current event reached every listener, so no listener is
//! ever re-entered for the event it is handling.
//!
//! The bus only holds weak references. Owners keep their listeners alive and
//! call [`EventBus::unregister`] when tearing down; a listener dropped without
//! unregistering is pruned on the next post and reported as a warning.

use dungeon::Diagnostics;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use crate::input::InputKey;
use crate::states::Mode;

/// 游戏事件定义
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    /// Stop the driver at the top of the next loop iteration
    Quit,
    /// Per-frame heartbeat
    Tick,
    /// Posted once before the first Tick so listeners can acquire resources
    Initialize,
    Input { key: InputKey },
    PlayerMoveRequest { dx: i32, dy: i32 },
    PlayerMoved { x: i32, y: i32 },
    NextLevel { level: u32 },
    /// `Some` pushes a mode, `None` pops the top one
    StateChange { mode: Option<Mode> },
    ShiftViewport { dx: i32, dy: i32 },
    Combat { lines: Vec<String> },
    Message { text: String },
    /// The player reached an exit
    LevelComplete,
}

impl GameEvent {
    pub fn push_mode(mode: Mode) -> Self {
        GameEvent::StateChange { mode: Some(mode) }
    }

    pub fn pop_mode() -> Self {
        GameEvent::StateChange { mode: None }
    }

    pub fn message(text: impl Into<String>) -> Self {
        GameEvent::Message { text: text.into() }
    }

    /// 获取事件类型的字符串表示
    pub fn event_type(&self) -> &'static str {
        match self {
            GameEvent::Quit => "Quit",
            GameEvent::Tick => "Tick",
            GameEvent::Initialize => "Initialize",
            GameEvent::Input { .. } => "Input",
            GameEvent::PlayerMoveRequest { .. } => "PlayerMoveRequest",
            GameEvent::PlayerMoved { .. } => "PlayerMoved",
            GameEvent::NextLevel { .. } => "NextLevel",
            GameEvent::StateChange { .. } => "StateChange",
            GameEvent::ShiftViewport { .. } => "ShiftViewport",
            GameEvent::Combat { .. } => "Combat",
            GameEvent::Message { .. } => "Message",
            GameEvent::LevelComplete => "LevelComplete",
        }
    }

    pub fn is_tick(&self) -> bool {
        matches!(self, GameEvent::Tick)
    }
}

/// Follow-up events raised by a handler
#[derive(Debug, Default)]
pub struct Outbox {
    events: Vec<GameEvent>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn post(&mut self, event: GameEvent) {
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[GameEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<GameEvent> {
        self.events
    }
}

/// 事件处理器 trait
pub trait EventHandler {
    /// 处理事件
    fn handle(&mut self, event: &GameEvent, outbox: &mut Outbox) -> anyhow::Result<()>;

    /// 事件处理器的名称（用于调试）
    fn name(&self) -> &str;
}

pub type SharedHandler = Rc<RefCell<dyn EventHandler>>;

/// Handle returned by [`EventBus::register`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct ListenerEntry {
    id: ListenerId,
    name: String,
    handler: Weak<RefCell<dyn EventHandler>>,
}

/// 事件总线
pub struct EventBus {
    listeners: Vec<ListenerEntry>,
    next_id: u64,
    queue: VecDeque<GameEvent>,
    /// 事件历史（用于调试）
    history: VecDeque<GameEvent>,
    max_history: usize,
    /// Deliveries allowed per outer `post` before the cascade is dropped
    max_cascade: usize,
    diagnostics: Rc<dyn Diagnostics>,
}

impl EventBus {
    pub const DEFAULT_HISTORY: usize = 100;
    pub const DEFAULT_CASCADE_LIMIT: usize = 1024;

    pub fn new(diagnostics: Rc<dyn Diagnostics>) -> Self {
        Self::with_limits(diagnostics, Self::DEFAULT_HISTORY, Self::DEFAULT_CASCADE_LIMIT)
    }

    pub fn with_limits(diagnostics: Rc<dyn Diagnostics>, max_history: usize, max_cascade: usize) -> Self {
        Self {
            listeners: Vec::new(),
            next_id: 0,
            queue: VecDeque::new(),
            history: VecDeque::new(),
            max_history,
            max_cascade,
            diagnostics,
        }
    }

    /// Add a listener. Registering the same listener again returns its
    /// existing id and does not add a second delivery.
    pub fn register<H: EventHandler + 'static>(&mut self, handler: &Rc<RefCell<H>>) -> ListenerId {
        let shared: SharedHandler = handler.clone();
        let weak = Rc::downgrade(&shared);
        if let Some(entry) = self.listeners.iter().find(|e| Weak::ptr_eq(&e.handler, &weak)) {
            return entry.id;
        }

        let id = ListenerId(self.next_id);
        self.next_id += 1;
        let name = shared.borrow().name().to_string();
        tracing::debug!(listener = %name, "registered listener");
        self.listeners.push(ListenerEntry {
            id,
            name,
            handler: weak,
        });
        id
    }

    /// Remove a listener; unknown ids are ignored
    pub fn unregister(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|e| e.id != id);
        self.listeners.len() != before
    }

    pub fn unregister_handler<H: EventHandler + 'static>(&mut self, handler: &Rc<RefCell<H>>) -> bool {
        let shared: SharedHandler = handler.clone();
        let weak = Rc::downgrade(&shared);
        let before = self.listeners.len();
        self.listeners.retain(|e| !Weak::ptr_eq(&e.handler, &weak));
        self.listeners.len() != before
    }

    pub fn is_registered(&self, id: ListenerId) -> bool {
        self.listeners.iter().any(|e| e.id == id)
    }

    /// Number of registered listeners that are still alive
    pub fn listener_count(&self) -> usize {
        self.listeners
            .iter()
            .filter(|e| e.handler.strong_count() > 0)
            .count()
    }

    /// Deliver `event` and everything it causes
    pub fn post(&mut self, event: GameEvent) {
        self.queue.push_back(event);
        let mut delivered = 0;

        while let Some(event) = self.queue.pop_front() {
            if delivered >= self.max_cascade {
                let dropped = self.queue.len() + 1;
                self.queue.clear();
                let line = format!(
                    "event cascade exceeded {} deliveries, dropped {} pending events starting with {}",
                    self.max_cascade,
                    dropped,
                    event.event_type()
                );
                tracing::error!("{}", line);
                self.diagnostics.error(&line);
                return;
            }
            delivered += 1;

            let follow_ups = self.deliver(&event);
            self.queue.extend(follow_ups);
        }
    }

    fn deliver(&mut self, event: &GameEvent) -> Vec<GameEvent> {
        if !event.is_tick() {
            if self.diagnostics.enabled() {
                self.diagnostics.write(&format!("event {:?}", event));
            }
            self.add_to_history(event.clone());
        }
        self.prune_dead();

        let targets: Vec<(String, SharedHandler)> = self
            .listeners
            .iter()
            .filter_map(|e| e.handler.upgrade().map(|h| (e.name.clone(), h)))
            .collect();

        let mut outbox = Outbox::new();
        for (name, handler) in targets {
            let Ok(mut handler) = handler.try_borrow_mut() else {
                let line = format!("listener {} is busy, skipped {}", name, event.event_type());
                tracing::error!("{}", line);
                self.diagnostics.error(&line);
                continue;
            };
            if let Err(err) = handler.handle(event, &mut outbox) {
                let line = format!("listener {} failed on {}: {:#}", name, event.event_type(), err);
                tracing::error!("{}", line);
                self.diagnostics.error(&line);
            }
        }
        outbox.into_events()
    }

    fn prune_dead(&mut self) {
        self.listeners.retain(|e| {
            let alive = e.handler.strong_count() > 0;
            if !alive {
                tracing::warn!(listener = %e.name, "listener dropped without unregistering");
            }
            alive
        });
    }

    fn add_to_history(&mut self, event: GameEvent) {
        if self.max_history == 0 {
            return;
        }
        if self.history.len() == self.max_history {
            self.history.pop_front();
        }
        self.history.push_back(event);
    }

    /// Recent non-Tick events, oldest first
    pub fn history(&self) -> impl Iterator<Item = &GameEvent> {
        self.history.iter()
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use dungeon::MemoryDiagnostics;
    use pretty_assertions::assert_eq;

    struct Recorder {
        name: String,
        seen: Rc<RefCell<Vec<String>>>,
    }

    impl Recorder {
        fn shared(name: &str, seen: &Rc<RefCell<Vec<String>>>) -> Rc<RefCell<Self>> {
            Rc::new(RefCell::new(Self {
                name: name.to_string(),
                seen: Rc::clone(seen),
            }))
        }
    }

    impl EventHandler for Recorder {
        fn handle(&mut self, event: &GameEvent, _outbox: &mut Outbox) -> anyhow::Result<()> {
            self.seen
                .borrow_mut()
                .push(format!("{}:{}", self.name, event.event_type()));
            Ok(())
        }

        fn name(&self) -> &str {
            &self.name
        }
    }

    struct Failing;

    impl EventHandler for Failing {
        fn handle(&mut self, _event: &GameEvent, _outbox: &mut Outbox) -> anyhow::Result<()> {
            bail!("broken switch")
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    /// Answers Quit with a Message, and every Message with another Message
    struct Echo {
        forever: bool,
    }

    impl EventHandler for Echo {
        fn handle(&mut self, event: &GameEvent, outbox: &mut Outbox) -> anyhow::Result<()> {
            match event {
                GameEvent::Quit => outbox.post(GameEvent::message("bye")),
                GameEvent::Message { .. } if self.forever => outbox.post(GameEvent::message("again")),
                _ => {}
            }
            Ok(())
        }

        fn name(&self) -> &str {
            "echo"
        }
    }

    fn bus() -> (EventBus, MemoryDiagnostics) {
        let diag = MemoryDiagnostics::default();
        (EventBus::new(Rc::new(diag.clone())), diag)
    }

    #[test]
    fn test_post_without_listeners_is_noop() {
        let (mut bus, diag) = bus();
        bus.post(GameEvent::Initialize);
        assert!(diag.errors().is_empty());
    }

    #[test]
    fn test_registration_order() {
        let (mut bus, _) = bus();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let a = Recorder::shared("a", &seen);
        let b = Recorder::shared("b", &seen);
        bus.register(&a);
        bus.register(&b);

        bus.post(GameEvent::Tick);
        assert_eq!(*seen.borrow(), vec!["a:Tick", "b:Tick"]);
    }

    #[test]
    fn test_double_register_single_delivery() {
        let (mut bus, _) = bus();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let a = Recorder::shared("a", &seen);
        let first = bus.register(&a);
        let second = bus.register(&a);

        assert_eq!(first, second);
        bus.post(GameEvent::Quit);
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn test_unregister() {
        let (mut bus, _) = bus();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let a = Recorder::shared("a", &seen);
        let id = bus.register(&a);

        assert!(bus.unregister(id));
        assert!(!bus.unregister(id));
        bus.post(GameEvent::Quit);
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn test_bus_does_not_keep_listener_alive() {
        let (mut bus, _) = bus();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let a = Recorder::shared("a", &seen);
        bus.register(&a);
        assert_eq!(Rc::strong_count(&a), 1);

        drop(a);
        bus.post(GameEvent::Quit);
        assert_eq!(bus.listener_count(), 0);
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn test_failing_listener_is_isolated() {
        let (mut bus, diag) = bus();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let failing = Rc::new(RefCell::new(Failing));
        let after = Recorder::shared("after", &seen);
        bus.register(&failing);
        bus.register(&after);

        bus.post(GameEvent::LevelComplete);
        assert_eq!(*seen.borrow(), vec!["after:LevelComplete"]);
        assert_eq!(diag.errors().len(), 1);
        assert!(diag.errors()[0].contains("failing"));
        assert!(diag.errors()[0].contains("broken switch"));
    }

    #[test]
    fn test_follow_ups_delivered_after_current_event() {
        let (mut bus, _) = bus();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let echo = Rc::new(RefCell::new(Echo { forever: false }));
        let rec = Recorder::shared("rec", &seen);
        bus.register(&echo);
        bus.register(&rec);

        bus.post(GameEvent::Quit);
        assert_eq!(*seen.borrow(), vec!["rec:Quit", "rec:Message"]);
    }

    #[test]
    fn test_ticks_not_traced() {
        let (mut bus, diag) = bus();
        bus.post(GameEvent::Tick);
        bus.post(GameEvent::PlayerMoved { x: 1, y: 2 });

        assert_eq!(diag.lines().len(), 1);
        assert!(diag.lines()[0].contains("PlayerMoved"));
        assert_eq!(bus.history().count(), 1);
    }

    #[test]
    fn test_runaway_cascade_is_cut() {
        let diag = MemoryDiagnostics::default();
        let mut bus = EventBus::with_limits(Rc::new(diag.clone()), 10, 16);
        let echo = Rc::new(RefCell::new(Echo { forever: true }));
        bus.register(&echo);

        bus.post(GameEvent::message("start"));
        assert_eq!(diag.errors().len(), 1);
        assert!(diag.errors()[0].contains("cascade"));
        assert_eq!(bus.history().count(), 10);
    }
}
