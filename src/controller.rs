use crossbeam_channel::{Receiver, TryRecvError};
use std::time::Duration;
use tracing::{trace, warn};

use crate::backend::BackendEvent;
use crate::domain::{AppConfig, DirError, Message};
use crate::model::{KeyContext, Model};
use ratatui::crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};

pub struct Controller {
    event_poll_time: u64,
    events: Receiver<BackendEvent>,
    backend_alive: bool,
}

impl Controller {
    pub fn new(cfg: &AppConfig, events: Receiver<BackendEvent>) -> Self {
        Self {
            event_poll_time: cfg.event_poll_time,
            events,
            backend_alive: true,
        }
    }

    /// Backend events take precedence over terminal input so completions
    /// are applied as soon as the loop comes around.
    pub fn handle_event(&mut self, model: &Model) -> Result<Option<Message>, DirError> {
        if let Some(event) = self.next_backend_event() {
            return Ok(Some(Message::Backend(event)));
        }

        if event::poll(Duration::from_millis(self.event_poll_time))? {
            match event::read()? {
                Event::Key(key) if key.kind == event::KeyEventKind::Press => {
                    if key.code == KeyCode::Char('c') && key.modifiers == KeyModifiers::CONTROL {
                        return Ok(Some(Message::Quit));
                    }
                    let message = if model.raw_keyevents() {
                        Some(Message::RawKey(key))
                    } else {
                        map_key(model.key_context(), key)
                    };
                    trace!("Mapped: {key:?} => {message:?}");
                    return Ok(message);
                }
                Event::Resize(width, height) => {
                    return Ok(Some(Message::Resize(width as usize, height as usize)));
                }
                _ => {}
            }
        }
        Ok(None)
    }

    fn next_backend_event(&mut self) -> Option<BackendEvent> {
        if !self.backend_alive {
            return None;
        }
        match self.events.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                warn!("Backend event channel disconnected");
                self.backend_alive = false;
                None
            }
        }
    }
}

/// Key map for everything except free text entry.
pub fn map_key(context: KeyContext, key: KeyEvent) -> Option<Message> {
    match context {
        KeyContext::Loading => match key.code {
            KeyCode::Char('q') => Some(Message::Quit),
            _ => None,
        },
        KeyContext::Failed => match key.code {
            KeyCode::Char('q') => Some(Message::Quit),
            KeyCode::Char('r') => Some(Message::Retry),
            _ => None,
        },
        KeyContext::Table => match key.code {
            KeyCode::Char('q') => Some(Message::Quit),
            KeyCode::Char('k') | KeyCode::Up => Some(Message::MoveUp),
            KeyCode::Char('j') | KeyCode::Down => Some(Message::MoveDown),
            KeyCode::Char('h') | KeyCode::Left => Some(Message::MoveLeft),
            KeyCode::Char('l') | KeyCode::Right => Some(Message::MoveRight),
            KeyCode::Char('n') | KeyCode::PageDown => Some(Message::NextPage),
            KeyCode::Char('p') | KeyCode::PageUp => Some(Message::PrevPage),
            KeyCode::Home => Some(Message::FirstPage),
            KeyCode::End => Some(Message::LastPage),
            KeyCode::Char('s') => Some(Message::Sort),
            KeyCode::Char('f') => Some(Message::Filter),
            KeyCode::Char('/') => Some(Message::Search),
            KeyCode::Char('a') => Some(Message::Add),
            KeyCode::Char('e') => Some(Message::Edit),
            KeyCode::Char('d') => Some(Message::Delete),
            KeyCode::Char('x') => Some(Message::Export),
            KeyCode::Char('r') => Some(Message::Reset),
            KeyCode::Char('z') => Some(Message::CyclePageSize),
            KeyCode::Char('c') => Some(Message::CopyCell),
            KeyCode::Char('y') => Some(Message::CopyRow),
            KeyCode::Char('?') => Some(Message::Help),
            _ => None,
        },
        KeyContext::Filter => match key.code {
            KeyCode::Char('k') | KeyCode::Up => Some(Message::MoveUp),
            KeyCode::Char('j') | KeyCode::Down => Some(Message::MoveDown),
            KeyCode::Char(' ') => Some(Message::Toggle),
            KeyCode::Enter => Some(Message::Enter),
            KeyCode::Char('c') => Some(Message::Clear),
            KeyCode::Esc => Some(Message::Exit),
            _ => None,
        },
        KeyContext::Confirm => match key.code {
            KeyCode::Char('y') | KeyCode::Enter => Some(Message::Confirm),
            KeyCode::Char('n') | KeyCode::Esc => Some(Message::Cancel),
            _ => None,
        },
        KeyContext::Popup => match key.code {
            KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q') => Some(Message::Exit),
            _ => None,
        },
        KeyContext::Text => Some(Message::RawKey(key)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn same_key_means_different_things_per_context() {
        let y = press(KeyCode::Char('y'));
        assert_eq!(map_key(KeyContext::Table, y), Some(Message::CopyRow));
        assert_eq!(map_key(KeyContext::Confirm, y), Some(Message::Confirm));

        let r = press(KeyCode::Char('r'));
        assert_eq!(map_key(KeyContext::Table, r), Some(Message::Reset));
        assert_eq!(map_key(KeyContext::Failed, r), Some(Message::Retry));
        assert_eq!(map_key(KeyContext::Loading, r), None);
    }

    #[test]
    fn escape_leaves_overlays() {
        let esc = press(KeyCode::Esc);
        assert_eq!(map_key(KeyContext::Filter, esc), Some(Message::Exit));
        assert_eq!(map_key(KeyContext::Confirm, esc), Some(Message::Cancel));
        assert_eq!(map_key(KeyContext::Popup, esc), Some(Message::Exit));
        assert_eq!(map_key(KeyContext::Table, esc), None);
    }

    #[test]
    fn backend_events_are_drained_first() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let (cmd_tx, _cmd_rx) = crossbeam_channel::unbounded();
        let cfg = AppConfig::default();
        let model = Model::init(&cfg, cmd_tx);
        let mut controller = Controller::new(&cfg, rx);
        tx.send(BackendEvent::Deleted(3)).unwrap();
        let message = controller.handle_event(&model).unwrap();
        assert_eq!(message, Some(Message::Backend(BackendEvent::Deleted(3))));
    }
}
