use crate::util::{byte_idx_to_utf16, utf16_to_byte_idx};

/// A slash command: the empty block it inserts is `prefix + suffix`.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct Command {
    pub label: &'static str,
    pub description: &'static str,
    /// Aliases that also match the palette filter.
    pub keywords: &'static [&'static str],
    pub prefix: &'static str,
    pub suffix: &'static str,
}

impl Command {
    pub fn markup(&self) -> String {
        format!("{}{}", self.prefix, self.suffix)
    }

    fn matches(&self, filter_lower: &str) -> bool {
        self.label.to_lowercase().contains(filter_lower)
            || self.keywords.iter().any(|k| k.contains(filter_lower))
    }
}

pub(crate) const COMMANDS: &[Command] = &[
    Command {
        label: "Heading 1",
        description: "Large heading",
        keywords: &["h1", "title"],
        prefix: "<h1>",
        suffix: "</h1>",
    },
    Command {
        label: "Heading 2",
        description: "Medium heading",
        keywords: &["h2", "subtitle"],
        prefix: "<h2>",
        suffix: "</h2>",
    },
    Command {
        label: "Heading 3",
        description: "Small heading",
        keywords: &["h3"],
        prefix: "<h3>",
        suffix: "</h3>",
    },
    Command {
        label: "Bullet List",
        description: "Create a bullet list",
        keywords: &["ul", "unordered"],
        prefix: "<ul><li>",
        suffix: "</li></ul>",
    },
    Command {
        label: "Numbered List",
        description: "Create a numbered list",
        keywords: &["ol", "ordered"],
        prefix: "<ol><li>",
        suffix: "</li></ol>",
    },
    Command {
        label: "Quote",
        description: "Insert a quote",
        keywords: &["blockquote", "citation"],
        prefix: "<blockquote>",
        suffix: "</blockquote>",
    },
    Command {
        label: "Code Block",
        description: "Insert a code block",
        keywords: &["pre", "snippet"],
        prefix: "<pre><code>",
        suffix: "</code></pre>",
    },
    Command {
        label: "Bold",
        description: "Bold text",
        keywords: &["strong"],
        prefix: "<strong>",
        suffix: "</strong>",
    },
    Command {
        label: "Italic",
        description: "Italic text",
        keywords: &["em", "emphasis"],
        prefix: "<em>",
        suffix: "</em>",
    },
];

#[cfg(test)]
pub(crate) fn command_by_label(label: &str) -> Option<&'static Command> {
    COMMANDS.iter().find(|c| c.label == label)
}

/// Commands visible for `filter`, in declaration order.
pub(crate) fn filtered_commands(filter: &str) -> Vec<&'static Command> {
    let filter_lower = filter.to_lowercase();
    COMMANDS.iter().filter(|c| c.matches(&filter_lower)).collect()
}

/// A `/filter` segment ending at the caret.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Trigger {
    /// UTF-16 offset of the `/` within the text run.
    pub slash_utf16: usize,
    pub filter: String,
}

/// Look for the trigger segment that ends at `cursor_utf16` within a single text run.
///
/// The nearest `/` before the caret counts only when it starts the run or follows
/// whitespace, and the filter after it may not contain whitespace.
pub(crate) fn detect_trigger(text: &str, cursor_utf16: usize) -> Option<Trigger> {
    let cursor = utf16_to_byte_idx(text, cursor_utf16);
    let before_cursor = &text[..cursor];
    let slash = before_cursor.rfind('/')?;

    let before_slash = &before_cursor[..slash];
    let at_boundary = before_slash
        .chars()
        .next_back()
        .map(char::is_whitespace)
        .unwrap_or(true);
    if !at_boundary {
        return None;
    }

    let filter = &before_cursor[slash + 1..];
    if filter.chars().any(char::is_whitespace) {
        return None;
    }

    Some(Trigger {
        slash_utf16: byte_idx_to_utf16(text, slash),
        filter: filter.to_string(),
    })
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) enum PaletteState {
    #[default]
    Closed,
    Open {
        filter: String,
        selected: usize,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum PaletteEvent {
    /// Text changed; carries the filter if a trigger ends at the caret.
    TextInput(Option<String>),
    ArrowDown,
    ArrowUp,
    Enter,
    Escape,
    PointerOutside,
    CursorLeftText,
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) struct Transition {
    pub next: PaletteState,
    /// Command chosen by this transition, to be spliced into the document.
    pub apply: Option<&'static Command>,
}

impl Transition {
    fn to(next: PaletteState) -> Self {
        Self { next, apply: None }
    }
}

impl PaletteState {
    pub fn is_open(&self) -> bool {
        matches!(self, PaletteState::Open { .. })
    }

    pub fn filter(&self) -> Option<&str> {
        match self {
            PaletteState::Open { filter, .. } => Some(filter),
            PaletteState::Closed => None,
        }
    }

    pub fn selected(&self) -> Option<usize> {
        match self {
            PaletteState::Open { selected, .. } => Some(*selected),
            PaletteState::Closed => None,
        }
    }

    /// Recomputed from the filter on every call; never cached.
    pub fn visible_commands(&self) -> Vec<&'static Command> {
        self.filter().map(filtered_commands).unwrap_or_default()
    }

    pub fn next(&self, event: PaletteEvent) -> Transition {
        match (self, event) {
            (_, PaletteEvent::TextInput(Some(filter))) => Transition::to(PaletteState::Open {
                filter,
                selected: 0,
            }),
            (_, PaletteEvent::TextInput(None)) => Transition::to(PaletteState::Closed),
            (PaletteState::Closed, _) => Transition::to(PaletteState::Closed),
            (
                PaletteState::Open { filter, selected },
                ev @ (PaletteEvent::ArrowDown | PaletteEvent::ArrowUp),
            ) => {
                let len = filtered_commands(filter).len();
                let selected = match (len, ev) {
                    (0, _) => 0,
                    (_, PaletteEvent::ArrowDown) if *selected + 1 >= len => 0,
                    (_, PaletteEvent::ArrowDown) => selected + 1,
                    (_, _) if *selected == 0 => len - 1,
                    (_, _) => (selected - 1).min(len - 1),
                };
                Transition::to(PaletteState::Open {
                    filter: filter.clone(),
                    selected,
                })
            }
            (PaletteState::Open { filter, selected }, PaletteEvent::Enter) => {
                match filtered_commands(filter).get(*selected).copied() {
                    Some(cmd) => Transition {
                        next: PaletteState::Closed,
                        apply: Some(cmd),
                    },
                    // Nothing to apply: the menu keeps showing "No commands found".
                    None => Transition::to(self.clone()),
                }
            }
            (
                PaletteState::Open { .. },
                PaletteEvent::Escape | PaletteEvent::PointerOutside | PaletteEvent::CursorLeftText,
            ) => Transition::to(PaletteState::Closed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(filter: &str, selected: usize) -> PaletteState {
        PaletteState::Open {
            filter: filter.to_string(),
            selected,
        }
    }

    #[test]
    fn test_detect_trigger_at_start_of_run() {
        let t = detect_trigger("/head", 5).expect("trigger");
        assert_eq!(t.slash_utf16, 0);
        assert_eq!(t.filter, "head");
    }

    #[test]
    fn test_detect_trigger_after_whitespace() {
        let t = detect_trigger("notes /qu", 9).expect("trigger");
        assert_eq!(t.slash_utf16, 6);
        assert_eq!(t.filter, "qu");

        let t = detect_trigger("line\n/", 6).expect("trigger");
        assert_eq!(t.filter, "");
    }

    #[test]
    fn test_detect_trigger_rejects_mid_word_slash() {
        assert_eq!(detect_trigger("and/or", 6), None);
        assert_eq!(detect_trigger("http://x", 8), None);
    }

    #[test]
    fn test_detect_trigger_rejects_space_in_filter() {
        assert_eq!(detect_trigger("/bullet list", 12), None);
        assert_eq!(detect_trigger("/bold\u{00A0}", 6), None);
    }

    #[test]
    fn test_detect_trigger_only_looks_before_cursor() {
        // Caret sits right after "/b"; the rest of the run is ignored.
        let t = detect_trigger("/b tail text", 2).expect("trigger");
        assert_eq!(t.filter, "b");
        assert_eq!(detect_trigger("abc /x", 3), None);
    }

    #[test]
    fn test_detect_trigger_utf16_offsets() {
        // "😀" is two UTF-16 units.
        let t = detect_trigger("😀 /co", 6).expect("trigger");
        assert_eq!(t.slash_utf16, 3);
        assert_eq!(t.filter, "co");
    }

    #[test]
    fn test_filtered_commands_case_insensitive() {
        let labels: Vec<_> = filtered_commands("HEAD").iter().map(|c| c.label).collect();
        assert_eq!(labels, vec!["Heading 1", "Heading 2", "Heading 3"]);
        assert_eq!(filtered_commands("").len(), COMMANDS.len());
        assert!(filtered_commands("zzz").is_empty());
        assert_eq!(filtered_commands("pre")[0].label, "Code Block");
    }

    #[test]
    fn test_text_input_opens_and_closes() {
        let s = PaletteState::Closed.next(PaletteEvent::TextInput(Some("h".into())));
        assert_eq!(s.next, open("h", 0));
        let s = s.next.next(PaletteEvent::TextInput(None));
        assert_eq!(s.next, PaletteState::Closed);
    }

    #[test]
    fn test_text_input_resets_selection() {
        let s = open("h", 2).next(PaletteEvent::TextInput(Some("he".into())));
        assert_eq!(s.next, open("he", 0));
    }

    #[test]
    fn test_arrows_wrap() {
        // "head" matches three commands.
        let down = open("head", 2).next(PaletteEvent::ArrowDown);
        assert_eq!(down.next, open("head", 0));
        let up = open("head", 0).next(PaletteEvent::ArrowUp);
        assert_eq!(up.next, open("head", 2));
        let up = open("head", 2).next(PaletteEvent::ArrowUp);
        assert_eq!(up.next, open("head", 1));
    }

    #[test]
    fn test_arrows_with_no_matches_stay_at_zero() {
        let s = open("zzz", 0).next(PaletteEvent::ArrowDown);
        assert_eq!(s.next, open("zzz", 0));
    }

    #[test]
    fn test_enter_applies_selected_and_closes() {
        let t = open("head", 1).next(PaletteEvent::Enter);
        assert_eq!(t.next, PaletteState::Closed);
        assert_eq!(t.apply.map(|c| c.label), Some("Heading 2"));
    }

    #[test]
    fn test_enter_without_matches_keeps_menu() {
        let t = open("zzz", 0).next(PaletteEvent::Enter);
        assert_eq!(t.next, open("zzz", 0));
        assert!(t.apply.is_none());
    }

    #[test]
    fn test_escape_pointer_and_cursor_close() {
        for ev in [
            PaletteEvent::Escape,
            PaletteEvent::PointerOutside,
            PaletteEvent::CursorLeftText,
        ] {
            assert_eq!(open("q", 0).next(ev).next, PaletteState::Closed);
        }
    }

    #[test]
    fn test_closed_ignores_navigation() {
        let t = PaletteState::Closed.next(PaletteEvent::Enter);
        assert_eq!(t.next, PaletteState::Closed);
        assert!(t.apply.is_none());
    }

    #[test]
    fn test_command_lookup_and_markup() {
        let cmd = command_by_label("Code Block").expect("command");
        assert_eq!(cmd.markup(), "<pre><code></code></pre>");
        assert!(command_by_label("Table").is_none());
    }
}
