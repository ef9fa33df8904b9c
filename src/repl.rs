// File: src/repl.rs
//
// Interactive REPL (Read-Eval-Print Loop) for the qry language.
// Provides an interactive shell for executing qry code with features like:
// - Multi-line input while braces or parentheses are unbalanced
// - Command history with up/down arrow navigation
// - Special commands (:help, :clear, :quit, :vars, :reset)
// - Persistent bindings across inputs

use crate::errors::QryError;
use crate::interpreter::{Interpreter, Value};
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

/// REPL session that maintains interpreter state and handles user interaction
pub struct Repl {
    interpreter: Interpreter,
    editor: DefaultEditor,
}

impl Repl {
    /// Creates a new REPL session with a fresh interpreter
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let editor = DefaultEditor::new()?;
        Ok(Repl { interpreter: Interpreter::new()?, editor })
    }

    fn show_banner(&self) {
        println!("{}", format!("qry {} - interactive shell", env!("CARGO_PKG_VERSION")).bright_cyan().bold());
        println!(
            "  {} {} for commands, {} to exit",
            "Welcome!".bright_green(),
            ":help".bright_yellow(),
            ":quit".bright_yellow()
        );
        println!("  {} leave a brace or parenthesis open to continue on the next line", "Tip:".bright_magenta());
        println!();
    }

    /// Starts the REPL loop
    pub fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.show_banner();

        let mut buffer = String::new();

        loop {
            let prompt = if buffer.is_empty() {
                "qry> ".bright_green().to_string()
            } else {
                "...> ".bright_blue().to_string()
            };

            match self.editor.readline(&prompt) {
                Ok(line) => {
                    let _ = self.editor.add_history_entry(line.as_str());

                    // Commands are only recognised outside multi-line input
                    if buffer.is_empty() && line.trim().starts_with(':') {
                        if self.handle_command(line.trim()) {
                            continue;
                        } else {
                            break;
                        }
                    }

                    buffer.push_str(&line);
                    buffer.push('\n');

                    if is_input_complete(&buffer) {
                        self.eval_input(&buffer);
                        buffer.clear();
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("{}", "^C (Ctrl+D or :quit to exit)".bright_yellow());
                    buffer.clear();
                }
                Err(ReadlineError::Eof) => {
                    println!("{}", "Goodbye!".bright_cyan());
                    break;
                }
                Err(err) => {
                    eprintln!("{} {}", "Error:".bright_red(), err);
                    break;
                }
            }
        }

        Ok(())
    }

    /// Handles special REPL commands starting with ':'
    /// Returns true to continue REPL, false to quit
    fn handle_command(&mut self, cmd: &str) -> bool {
        match cmd {
            ":help" | ":h" => {
                self.show_help();
                true
            }
            ":quit" | ":q" | ":exit" => {
                println!("{}", "Goodbye!".bright_cyan());
                false
            }
            ":clear" | ":c" => {
                print!("\x1B[2J\x1B[1;1H");
                self.show_banner();
                true
            }
            ":vars" | ":v" => {
                self.show_variables();
                true
            }
            ":reset" | ":r" => {
                match Interpreter::new() {
                    Ok(interpreter) => {
                        self.interpreter = interpreter;
                        println!("{}", "Environment reset".bright_green());
                    }
                    Err(err) => self.print_error(&err),
                }
                true
            }
            _ => {
                println!(
                    "{} Unknown command: {}. Type {} for available commands.",
                    "Error:".bright_red(),
                    cmd.bright_yellow(),
                    ":help".bright_yellow()
                );
                true
            }
        }
    }

    fn show_help(&self) {
        println!();
        println!("{}", "REPL Commands:".bright_cyan().bold());
        println!("  {}{}  Display this help message", ":help".bright_yellow(), " or :h ".dimmed());
        println!("  {}{}  Exit the REPL", ":quit".bright_yellow(), " or :q ".dimmed());
        println!("  {}{} Clear the screen", ":clear".bright_yellow(), " or :c ".dimmed());
        println!("  {}{}  Show variables bound in this session", ":vars".bright_yellow(), " or :v ".dimmed());
        println!("  {}{} Start over with a fresh interpreter", ":reset".bright_yellow(), " or :r ".dimmed());
        println!();
        println!("{}", "Examples:".bright_cyan().bold());
        println!("  {}", "qry> add <- fn(x: Int, y: Int) -> Int { x + y }".dimmed());
        println!("  {}", "qry> add(1, 2)".dimmed());
        println!("  {}", "qry> use data::*".dimmed());
        println!("  {}", "qry> intvec(1, 2, 3) |> sum()".dimmed());
        println!();
    }

    /// Lists user bindings: functions and values, not library members
    fn show_variables(&self) {
        let env = self.interpreter.global_env();
        let mut shown = 0;
        println!();
        println!("{}", "Defined Variables:".bright_cyan().bold());
        for name in env.names() {
            let Some(value) = env.get(name) else { continue };
            if matches!(value, Value::Library(_) | Value::Builtin(_) | Value::Method(_) | Value::Type(_)) {
                continue;
            }
            println!(
                "  {}: {} = {}",
                name.bright_yellow(),
                value.type_name().dimmed(),
                self.interpreter.stringify(value)
            );
            shown += 1;
        }
        if shown == 0 {
            println!("  {}", "(none)".dimmed());
        }
        println!();
    }

    fn eval_input(&mut self, input: &str) {
        if input.trim().is_empty() {
            return;
        }
        match self.interpreter.eval_source(input) {
            Ok(values) => {
                for value in values.iter().filter(|v| !matches!(v, Value::Null)) {
                    println!(
                        "{} {} {}",
                        "=>".bright_blue(),
                        format!("({})", value.type_name()).dimmed(),
                        self.interpreter.stringify(value).bright_white()
                    );
                }
            }
            Err(err) => self.print_error(&err),
        }
    }

    fn print_error(&self, err: &QryError) {
        eprint!("{}", err.render());
    }
}

/// True when every brace and parenthesis outside strings and comments is
/// closed
pub fn is_input_complete(input: &str) -> bool {
    let mut depth: i32 = 0;
    let mut in_string = false;
    let mut escape_next = false;
    let mut in_comment = false;

    for ch in input.trim().chars() {
        if in_comment {
            if ch == '\n' {
                in_comment = false;
            }
            continue;
        }
        if escape_next {
            escape_next = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '#' if !in_string => in_comment = true,
            '{' | '(' if !in_string => depth += 1,
            '}' | ')' if !in_string => depth -= 1,
            _ => {}
        }
    }

    !in_string && depth <= 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balanced_input_is_complete() {
        assert!(is_input_complete("x <- 1\n"));
        assert!(is_input_complete("f <- fn(x) { x }\n"));
        assert!(is_input_complete(""));
    }

    #[test]
    fn test_open_brace_continues() {
        assert!(!is_input_complete("f <- fn(x) {\n"));
        assert!(!is_input_complete("get_table(conn,\n"));
    }

    #[test]
    fn test_delimiters_in_strings_and_comments_are_ignored() {
        assert!(is_input_complete("print(\"{ (\")\n"));
        assert!(is_input_complete("x <- 1 # {\n"));
    }
}
