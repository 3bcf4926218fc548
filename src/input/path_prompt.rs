//! Line prompt with filesystem tab completion.
//!
//! Tab completes the last path component against the directory it names:
//! a single candidate is filled in (directories get a trailing `/`), several
//! candidates are extended to their common prefix, and a second Tab lists
//! them.

use std::fs;
use std::io::{self, IsTerminal, Write};
use std::path::Path;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{self, Clear, ClearType};
use crossterm::{cursor, queue};

/// Paths under `base` that complete `partial`, sorted.
///
/// The directory part of `partial` is kept as typed, so candidates can be
/// substituted for the input directly.
pub fn complete_path(base: &Path, partial: &str) -> Vec<String> {
    let (dir, stem) = match partial.rfind('/') {
        Some(i) => partial.split_at(i + 1),
        None => ("", partial),
    };
    let Ok(entries) = fs::read_dir(base.join(if dir.is_empty() { "." } else { dir })) else {
        return Vec::new();
    };

    let mut candidates: Vec<String> = entries
        .filter_map(Result::ok)
        .filter_map(|entry| {
            let name = entry.file_name().into_string().ok()?;
            if !name.starts_with(stem) || (stem.is_empty() && name.starts_with('.')) {
                return None;
            }
            let is_dir = entry.file_type().is_ok_and(|t| t.is_dir());
            Some(format!("{dir}{name}{}", if is_dir { "/" } else { "" }))
        })
        .collect();
    candidates.sort();
    candidates
}

fn common_prefix(candidates: &[String]) -> &str {
    let Some(first) = candidates.first() else {
        return "";
    };
    let mut len = first.len();
    for other in &candidates[1..] {
        len = first
            .char_indices()
            .zip(other.chars())
            .take_while(|((_, a), b)| a == b)
            .last()
            .map_or(0, |((i, a), _)| i + a.len_utf8())
            .min(len);
    }
    &first[..len]
}

/// What the prompt should do after a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum EditAction {
    Redraw,
    List(Vec<String>),
    Submit(String),
    Cancel,
    Ignore,
}

/// Line buffer of the prompt.
#[derive(Debug)]
pub(crate) struct PathLine<'a> {
    base: &'a Path,
    line: String,
    listed: bool,
}

impl<'a> PathLine<'a> {
    pub(crate) fn new(base: &'a Path) -> Self {
        Self {
            base,
            line: String::new(),
            listed: false,
        }
    }

    pub(crate) fn line(&self) -> &str {
        &self.line
    }

    pub(crate) fn handle(&mut self, key: KeyEvent) -> EditAction {
        if key.kind != KeyEventKind::Press {
            return EditAction::Ignore;
        }
        let was_listed = std::mem::take(&mut self.listed);

        match key.code {
            KeyCode::Enter => EditAction::Submit(std::mem::take(&mut self.line)),
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                EditAction::Cancel
            }
            KeyCode::Esc => EditAction::Cancel,
            KeyCode::Backspace => {
                self.line.pop();
                EditAction::Redraw
            }
            KeyCode::Tab => self.complete(was_listed),
            KeyCode::Char(c) => {
                self.line.push(c);
                EditAction::Redraw
            }
            _ => EditAction::Ignore,
        }
    }

    fn complete(&mut self, was_listed: bool) -> EditAction {
        let mut candidates = complete_path(self.base, &self.line);
        if candidates.len() <= 1 {
            return match candidates.pop() {
                Some(only) => {
                    self.line = only;
                    EditAction::Redraw
                }
                None => EditAction::Ignore,
            };
        }

        let prefix = common_prefix(&candidates);
        if prefix.len() > self.line.len() {
            self.line = prefix.to_string();
            EditAction::Redraw
        } else if was_listed {
            EditAction::Ignore
        } else {
            self.listed = true;
            EditAction::List(candidates)
        }
    }
}

/// Prompts for a file path with tab completion relative to the working
/// directory.
///
/// Falls back to a plain line read when stdin is not a terminal.
///
/// # Errors
///
/// Returns `Interrupted` if the user cancels with Esc or Ctrl-C, or any
/// terminal I/O error.
pub fn read_path(prompt: &str) -> io::Result<String> {
    let mut stdout = io::stdout();
    write!(stdout, "{prompt}")?;
    stdout.flush()?;

    if !io::stdin().is_terminal() {
        let mut line = String::new();
        io::stdin().read_line(&mut line)?;
        return Ok(line.trim().to_string());
    }

    terminal::enable_raw_mode()?;
    let result = edit(prompt, &mut stdout);
    terminal::disable_raw_mode()?;
    write!(stdout, "\r\n")?;
    stdout.flush()?;
    result
}

fn edit(prompt: &str, stdout: &mut io::Stdout) -> io::Result<String> {
    let mut line = PathLine::new(Path::new("."));
    loop {
        let Event::Key(key) = event::read()? else {
            continue;
        };
        match line.handle(key) {
            EditAction::Submit(path) => return Ok(path.trim().to_string()),
            EditAction::Cancel => {
                return Err(io::Error::new(io::ErrorKind::Interrupted, "prompt cancelled"))
            }
            EditAction::List(candidates) => {
                write!(stdout, "\r\n{}\r\n", candidates.join("  "))?;
                redraw(stdout, prompt, line.line())?;
            }
            EditAction::Redraw => redraw(stdout, prompt, line.line())?,
            EditAction::Ignore => {}
        }
    }
}

fn redraw(stdout: &mut io::Stdout, prompt: &str, line: &str) -> io::Result<()> {
    queue!(stdout, cursor::MoveToColumn(0), Clear(ClearType::CurrentLine))?;
    write!(stdout, "{prompt}{line}")?;
    stdout.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_str(line: &mut PathLine<'_>, text: &str) {
        for c in text.chars() {
            line.handle(press(KeyCode::Char(c)));
        }
    }

    fn music_dir() -> tempfile::TempDir {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("albums")).unwrap();
        fs::write(dir.path().join("albums/intro.wav"), b"").unwrap();
        fs::write(dir.path().join("track01.wav"), b"").unwrap();
        fs::write(dir.path().join("track02.wav"), b"").unwrap();
        fs::write(dir.path().join(".hidden.wav"), b"").unwrap();
        dir
    }

    #[test]
    fn test_complete_lists_matching_entries() {
        let dir = music_dir();
        assert_eq!(
            complete_path(dir.path(), "tr"),
            vec!["track01.wav", "track02.wav"]
        );
        assert_eq!(
            complete_path(dir.path(), ""),
            vec!["albums/", "track01.wav", "track02.wav"]
        );
    }

    #[test]
    fn test_complete_inside_subdirectory() {
        let dir = music_dir();
        assert_eq!(complete_path(dir.path(), "albums/i"), vec!["albums/intro.wav"]);
    }

    #[test]
    fn test_complete_missing_directory_is_empty() {
        let dir = music_dir();
        assert!(complete_path(dir.path(), "nowhere/x").is_empty());
    }

    #[test]
    fn test_hidden_entries_need_a_dot() {
        let dir = music_dir();
        assert_eq!(complete_path(dir.path(), "."), vec![".hidden.wav"]);
    }

    #[test]
    fn test_common_prefix() {
        let names = vec!["track01.wav".to_string(), "track02.wav".to_string()];
        assert_eq!(common_prefix(&names), "track0");
        assert_eq!(common_prefix(&[]), "");
    }

    #[test]
    fn test_tab_fills_single_candidate() {
        let dir = music_dir();
        let mut line = PathLine::new(dir.path());
        type_str(&mut line, "al");
        assert_eq!(line.handle(press(KeyCode::Tab)), EditAction::Redraw);
        assert_eq!(line.line(), "albums/");

        line.handle(press(KeyCode::Tab));
        assert_eq!(line.line(), "albums/intro.wav");
    }

    #[test]
    fn test_tab_extends_then_lists() {
        let dir = music_dir();
        let mut line = PathLine::new(dir.path());
        type_str(&mut line, "t");

        assert_eq!(line.handle(press(KeyCode::Tab)), EditAction::Redraw);
        assert_eq!(line.line(), "track0");
        assert_eq!(
            line.handle(press(KeyCode::Tab)),
            EditAction::List(vec!["track01.wav".into(), "track02.wav".into()])
        );
        assert_eq!(line.handle(press(KeyCode::Tab)), EditAction::Ignore);
    }

    #[test]
    fn test_enter_submits_and_backspace_edits() {
        let dir = music_dir();
        let mut line = PathLine::new(dir.path());
        type_str(&mut line, "song.wavv");
        line.handle(press(KeyCode::Backspace));
        assert_eq!(
            line.handle(press(KeyCode::Enter)),
            EditAction::Submit("song.wav".into())
        );
    }

    #[test]
    fn test_ctrl_c_and_esc_cancel() {
        let dir = music_dir();
        let mut line = PathLine::new(dir.path());
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(line.handle(ctrl_c), EditAction::Cancel);
        assert_eq!(line.handle(press(KeyCode::Esc)), EditAction::Cancel);
    }
}
