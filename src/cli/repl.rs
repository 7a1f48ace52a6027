//! # REPL
//!
//! Reads one statement per line, executes it, prints the result rows.
//! Errors go to stderr and the loop continues; the eventual exit code is 0
//! after a clean EOF and 1 if any statement failed along the way.

use eyre::{Result, WrapErr};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::cli::table::format_row_set;
use crate::database::Database;

const PROMPT: &str = "shale> ";

pub struct Repl {
    db: Database,
    editor: DefaultEditor,
    had_error: bool,
}

impl Repl {
    pub fn new(db: Database) -> Result<Self> {
        let editor = DefaultEditor::new().wrap_err("failed to initialize line editor")?;
        Ok(Self {
            db,
            editor,
            had_error: false,
        })
    }

    /// Runs until EOF. Returns the process exit code.
    pub fn run(&mut self) -> i32 {
        loop {
            match self.editor.readline(PROMPT) {
                Ok(line) => self.handle_line(&line),
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => break,
                Err(err) => {
                    eprintln!("error reading input: {err}");
                    self.had_error = true;
                    break;
                }
            }
        }

        if self.had_error {
            1
        } else {
            0
        }
    }

    fn handle_line(&mut self, line: &str) {
        let statement = line.trim();
        if statement.is_empty() {
            return;
        }
        self.editor.add_history_entry(statement).ok();

        match self.db.execute(statement) {
            Ok(result) => {
                let text = format_row_set(&result);
                if !text.is_empty() {
                    print!("{text}");
                }
            }
            Err(err) => {
                eprintln!("{err}");
                self.had_error = true;
            }
        }
    }
}
