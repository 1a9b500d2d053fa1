//! Interactive prompt
//!
//! Evaluates each line in the global module and prints the result's
//! `inspect`. Uncaught errors print a diagnostic and return to the
//! prompt.

use rime_runtime::{dispatch, eval};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

const PROMPT: &str = "rime> ";

pub fn interactive_prompt() {
    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(e) => {
            eprintln!("rime: cannot start interactive prompt: {e}");
            return;
        }
    };

    loop {
        match editor.readline(PROMPT) {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(&line);
                match eval(&line) {
                    Ok(result) => match dispatch::inspect_to_string(result) {
                        Ok(text) => println!("=> {text}"),
                        Err(_) => println!("=> {result:?}"),
                    },
                    Err(e) => eprintln!("rime: {e}"),
                }
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("rime: readline error: {e}");
                break;
            }
        }
    }
}
