use super::block_exit::exit_container;
use super::document::Document;
use super::markup::{parse, serialize};
use super::palette::{detect_trigger, Command, PaletteEvent, PaletteState};
use super::selection::{Selection, SelectionTracker};
use super::splice;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Key {
    Enter,
    ArrowDown,
    ArrowUp,
    Escape,
    Other,
}

impl Key {
    /// Map a `KeyboardEvent.key` value.
    pub fn from_name(name: &str) -> Self {
        match name {
            "Enter" => Key::Enter,
            "ArrowDown" => Key::ArrowDown,
            "ArrowUp" => Key::ArrowUp,
            "Escape" => Key::Escape,
            _ => Key::Other,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct KeyInput {
    pub key: Key,
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl KeyInput {
    #[cfg(test)]
    pub fn plain(key: Key) -> Self {
        Self {
            key,
            shift: false,
            ctrl: false,
            alt: false,
            meta: false,
        }
    }

    pub fn is_unmodified(&self) -> bool {
        !(self.shift || self.ctrl || self.alt || self.meta)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum EditOutcome {
    /// Let the browser handle the event.
    Ignored,
    /// Prevent the default action; the document is unchanged.
    Consumed,
    /// Prevent the default action, re-render the document and put the caret at `cursor`.
    Mutated { cursor: Selection },
}

/// Editing state for one open record.
#[derive(Clone, Debug)]
pub(crate) struct EditorSession {
    record_id: String,
    title: String,
    doc: Document,
    palette: PaletteState,
    tracker: SelectionTracker,
    touched: bool,
}

impl EditorSession {
    pub fn open(record_id: impl Into<String>, title: impl Into<String>, content: &str) -> Self {
        Self {
            record_id: record_id.into(),
            title: title.into(),
            doc: parse(content),
            palette: PaletteState::Closed,
            tracker: SelectionTracker::default(),
            touched: false,
        }
    }

    pub fn record_id(&self) -> &str {
        &self.record_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn palette(&self) -> &PaletteState {
        &self.palette
    }

    /// `true` once anything was edited since the record was opened. Saving does not reset
    /// it; unsaved state lives in the autosave scheduler.
    pub fn is_touched(&self) -> bool {
        self.touched
    }

    pub fn markup(&self) -> String {
        serialize(&self.doc)
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        let title = title.into();
        if title != self.title {
            self.title = title;
            self.touched = true;
        }
    }

    /// The editable surface changed under the user's typing.
    ///
    /// `doc` is the surface as it now stands and `live` the caret inside it.
    pub fn on_surface_changed(&mut self, doc: Document, live: Option<Selection>) {
        self.doc = doc;
        self.touched = true;

        let filter = live
            .filter(Selection::is_collapsed)
            .and_then(|sel| {
                let text = self.doc.text(sel.start.node)?;
                detect_trigger(text, sel.start.offset)
            })
            .map(|t| t.filter);
        self.transition(PaletteEvent::TextInput(filter));

        if self.palette.is_open() {
            self.tracker.capture(&self.doc, live);
        } else {
            self.tracker.clear();
        }
    }

    pub fn on_key(&mut self, input: KeyInput, live: Option<Selection>) -> EditOutcome {
        if self.palette.is_open() {
            let event = match input.key {
                Key::ArrowDown => PaletteEvent::ArrowDown,
                Key::ArrowUp => PaletteEvent::ArrowUp,
                Key::Enter => PaletteEvent::Enter,
                Key::Escape => PaletteEvent::Escape,
                Key::Other => return EditOutcome::Ignored,
            };
            return match self.transition(event) {
                Some(command) => self.splice(command),
                None => EditOutcome::Consumed,
            };
        }

        if input.key != Key::Enter || !input.is_unmodified() {
            return EditOutcome::Ignored;
        }
        let Some(sel) = live.filter(|s| s.is_collapsed() && s.is_valid_in(&self.doc)) else {
            return EditOutcome::Ignored;
        };
        match exit_container(&mut self.doc, sel.start) {
            Some(caret) => {
                self.touched = true;
                EditOutcome::Mutated {
                    cursor: Selection::collapsed(caret),
                }
            }
            None => EditOutcome::Ignored,
        }
    }

    /// A palette entry was picked with the pointer.
    pub fn apply_command(&mut self, command: &Command) -> EditOutcome {
        self.palette = PaletteState::Closed;
        self.splice(command)
    }

    pub fn on_pointer_outside(&mut self) {
        self.transition(PaletteEvent::PointerOutside);
        self.tracker.clear();
    }

    pub fn on_cursor_left_text(&mut self) {
        self.transition(PaletteEvent::CursorLeftText);
        self.tracker.clear();
    }

    fn transition(&mut self, event: PaletteEvent) -> Option<&'static Command> {
        let t = self.palette.next(event);
        if t.next != self.palette {
            tracing::debug!(from = ?self.palette, to = ?t.next, "palette transition");
        }
        self.palette = t.next;
        t.apply
    }

    fn splice(&mut self, command: &Command) -> EditOutcome {
        let Some(sel) = self.tracker.take(&self.doc) else {
            tracing::debug!(command = command.label, "no usable selection for command");
            return EditOutcome::Consumed;
        };
        match splice::apply_command(&mut self.doc, command, sel.start) {
            Ok(spliced) => {
                tracing::debug!(command = command.label, node = ?spliced.inserted, "command applied");
                self.touched = true;
                EditOutcome::Mutated {
                    cursor: spliced.cursor,
                }
            }
            Err(e) => {
                tracing::debug!(command = command.label, error = %e, "command not applied");
                EditOutcome::Consumed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::palette::command_by_label;
    use crate::editor::selection::Position;

    /// Re-parse `markup` as the live surface with the caret at the end of the last text node.
    fn type_into(session: &mut EditorSession, markup: &str) -> Selection {
        let doc = parse(markup);
        let t = *doc.text_nodes(doc.root()).last().expect("text node");
        let len = crate::util::utf16_len(doc.text(t).unwrap_or_default());
        let sel = Selection::collapsed(Position::new(t, len));
        session.on_surface_changed(doc, Some(sel));
        sel
    }

    #[test]
    fn test_typing_trigger_opens_palette() {
        let mut s = EditorSession::open("p1", "Note", "");
        type_into(&mut s, "<div>hello /he</div>");
        assert_eq!(s.palette().filter(), Some("he"));
        assert!(s.is_touched());

        type_into(&mut s, "<div>hello /he x</div>");
        assert!(!s.palette().is_open());
    }

    #[test]
    fn test_enter_applies_selected_command() {
        let mut s = EditorSession::open("p1", "Note", "");
        let sel = type_into(&mut s, "<div>intro</div><div>/quo</div>");

        let out = s.on_key(KeyInput::plain(Key::Enter), Some(sel));
        assert!(matches!(out, EditOutcome::Mutated { .. }));
        assert_eq!(s.markup(), "<div>intro</div><blockquote><br></blockquote>");
        assert!(!s.palette().is_open());
    }

    #[test]
    fn test_arrow_keys_move_selection() {
        let mut s = EditorSession::open("p1", "Note", "");
        let sel = type_into(&mut s, "/head");
        assert_eq!(s.on_key(KeyInput::plain(Key::ArrowDown), Some(sel)), EditOutcome::Consumed);
        assert_eq!(s.palette().selected(), Some(1));

        s.on_key(KeyInput::plain(Key::Enter), Some(sel));
        assert_eq!(s.markup(), "<h2><br></h2>");
    }

    #[test]
    fn test_escape_closes_without_change() {
        let mut s = EditorSession::open("p1", "Note", "");
        let sel = type_into(&mut s, "<div>/b</div>");
        assert_eq!(s.on_key(KeyInput::plain(Key::Escape), Some(sel)), EditOutcome::Consumed);
        assert!(!s.palette().is_open());
        assert_eq!(s.markup(), "<div>/b</div>");
    }

    #[test]
    fn test_other_keys_pass_through_while_open() {
        let mut s = EditorSession::open("p1", "Note", "");
        let sel = type_into(&mut s, "<div>/b</div>");
        assert_eq!(s.on_key(KeyInput::plain(Key::Other), Some(sel)), EditOutcome::Ignored);
        assert!(s.palette().is_open());
    }

    #[test]
    fn test_pointer_pick_after_focus_loss() {
        let mut s = EditorSession::open("p1", "Note", "");
        type_into(&mut s, "<div>say /it</div>");
        let italic = command_by_label("Italic").expect("command");

        let out = s.apply_command(italic);
        assert!(matches!(out, EditOutcome::Mutated { .. }));
        assert_eq!(s.markup(), "<div>say <em><br></em></div>");
    }

    #[test]
    fn test_pointer_outside_drops_snapshot() {
        let mut s = EditorSession::open("p1", "Note", "");
        type_into(&mut s, "<div>/h</div>");
        s.on_pointer_outside();
        assert!(!s.palette().is_open());

        let before = s.markup();
        let out = s.apply_command(command_by_label("Heading 1").expect("command"));
        assert_eq!(out, EditOutcome::Consumed);
        assert_eq!(s.markup(), before);
    }

    #[test]
    fn test_stale_trigger_is_silent_noop() {
        let mut s = EditorSession::open("p1", "Note", "");
        type_into(&mut s, "<div>/q</div>");
        // The trigger text vanished and the surface changed without reopening the palette.
        let doc = parse("<div>gone</div>");
        s.on_surface_changed(doc, None);

        let out = s.apply_command(command_by_label("Quote").expect("command"));
        assert_eq!(out, EditOutcome::Consumed);
        assert_eq!(s.markup(), "<div>gone</div>");
    }

    #[test]
    fn test_double_enter_leaves_quote() {
        let mut s = EditorSession::open("p1", "Note", "<blockquote>text\n</blockquote>");
        let t = s.document().text_nodes(s.document().root())[0];
        let sel = Selection::collapsed(Position::new(t, 5));

        let out = s.on_key(KeyInput::plain(Key::Enter), Some(sel));
        assert!(matches!(out, EditOutcome::Mutated { .. }));
        assert_eq!(s.markup(), "<blockquote>text</blockquote><div><br></div>");
        assert!(s.is_touched());
    }

    #[test]
    fn test_shift_enter_is_not_block_exit() {
        let mut s = EditorSession::open("p1", "Note", "<blockquote>text\n</blockquote>");
        let t = s.document().text_nodes(s.document().root())[0];
        let sel = Selection::collapsed(Position::new(t, 5));
        let input = KeyInput {
            shift: true,
            ..KeyInput::plain(Key::Enter)
        };
        assert_eq!(s.on_key(input, Some(sel)), EditOutcome::Ignored);
        assert!(!s.is_touched());
    }

    #[test]
    fn test_set_title_touches_only_on_change() {
        let mut s = EditorSession::open("p1", "Note", "");
        s.set_title("Note");
        assert!(!s.is_touched());
        s.set_title("Renamed");
        assert!(s.is_touched());
        assert_eq!(s.title(), "Renamed");
        assert_eq!(s.record_id(), "p1");
    }
}
