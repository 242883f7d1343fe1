//! Interactive shell around the trielog engine.
//!
//! Reads one command per line from standard input. Run with a program path
//! as the first argument to load and build it at start-up. Set `RUST_LOG`
//! to see engine logs.

use std::io::{self, BufRead, Write};
use std::time::Instant;

use anyhow::{Context, Result};
use trielog::{load_program, parse_program, parse_query, Engine, Program};

const INTRO: &str = "trielog interactive shell\n\
                     Type 'help' for an overview of commands. Ctrl-D exits.";

const HELP: &str = "\
load <file>        load the program in <file>
build              infer every fact the loaded program entails
show loaded        print the loaded program
show inferences    print every inferred fact
add <rule>         add a rule or fact, e.g. 'add p(?x, ?y) :- q(?y, ?x).'
query <atom>       print the inferred facts matching <atom>, e.g. 'query f(?x, b).'
help               print this message
quit               leave the shell";

/// What the loop should do after a command
enum Flow {
    Continue,
    Quit,
}

#[derive(Default)]
struct Shell {
    program: Option<Program>,
    engine: Option<Engine>,
}

impl Shell {
    fn run_line(&mut self, line: &str, out: &mut impl Write) -> Result<Flow> {
        let line = line.trim();
        let (command, argument) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(command, rest)| (command, rest.trim()));

        match command {
            "" => {}
            "load" => self.load(argument, out)?,
            "build" => self.build(out)?,
            "show" => self.show(argument, out)?,
            "add" => self.add(argument, out)?,
            "query" => self.query(argument, out)?,
            "help" => writeln!(out, "{HELP}")?,
            "quit" | "exit" => return Ok(Flow::Quit),
            other => writeln!(out, "Unknown command '{other}'. Type 'help' for a list.")?,
        }
        Ok(Flow::Continue)
    }

    fn load(&mut self, filename: &str, out: &mut impl Write) -> Result<()> {
        if filename.is_empty() {
            writeln!(out, "What file should I load?")?;
            return Ok(());
        }

        match load_program(filename) {
            Ok(Some(program)) => {
                self.program = Some(program);
                self.engine = None;
                writeln!(out, "==> program loaded.")?;
            }
            Ok(None) => writeln!(out, "{filename} does not seem to exist.")?,
            Err(err) => writeln!(out, "Cannot load {filename}: {err}")?,
        }
        Ok(())
    }

    fn build(&mut self, out: &mut impl Write) -> Result<()> {
        let Some(program) = &self.program else {
            writeln!(out, "No program was loaded. Try 'load' first.")?;
            return Ok(());
        };

        writeln!(out, "Building model...")?;
        self.engine = Some(Engine::new(program.clone()));
        writeln!(
            out,
            "==> Model built (do 'show inferences' to see all known facts)"
        )?;
        Ok(())
    }

    fn show(&self, what: &str, out: &mut impl Write) -> Result<()> {
        match what {
            "loaded" => match &self.program {
                Some(program) => writeln!(out, "{program}")?,
                None => writeln!(out, "No program was loaded.")?,
            },
            "inferences" => match &self.engine {
                Some(engine) => {
                    let facts = engine.get_facts();
                    for fact in &facts {
                        writeln!(out, "{fact}")?;
                    }
                    writeln!(out, "==> {} facts currently known.", facts.len())?;
                }
                None => writeln!(
                    out,
                    "You did not ask to deduce what I know. Try 'build'."
                )?,
            },
            "" => writeln!(out, "Show what? Options: loaded, inferences.")?,
            _ => writeln!(out, "I don't know what to show. Options: loaded, inferences.")?,
        }
        Ok(())
    }

    fn add(&mut self, text: &str, out: &mut impl Write) -> Result<()> {
        if text.is_empty() {
            writeln!(out, "I don't know what to add. Add a rule or fact.")?;
            return Ok(());
        }

        let addition = match parse_program(text) {
            Ok(addition) if !addition.is_empty() => addition,
            Ok(_) => {
                writeln!(out, "Nothing to add in '{text}'.")?;
                return Ok(());
            }
            Err(err) => {
                writeln!(
                    out,
                    "I'm not able to add '{text}'. Is it a well-formed fact or rule?\nDetails: {err}"
                )?;
                return Ok(());
            }
        };

        self.program
            .get_or_insert_with(Program::new)
            .merge(&addition);
        if let Some(engine) = &mut self.engine {
            engine.push_program(&addition);
        }
        writeln!(out, "==> added {addition} and updated known inferences.")?;
        Ok(())
    }

    fn query(&self, text: &str, out: &mut impl Write) -> Result<()> {
        if text.is_empty() {
            writeln!(out, "I don't know what to query.")?;
            return Ok(());
        }
        let Some(engine) = &self.engine else {
            writeln!(out, "Do a build first.")?;
            return Ok(());
        };

        match parse_query(text) {
            Ok(atom) => {
                let facts = engine.get_matching_facts(&atom);
                for fact in &facts {
                    writeln!(out, "{fact}")?;
                }
                writeln!(out, "==> {} facts match query {atom}", facts.len())?;
            }
            Err(err) => writeln!(out, "I'm not able to query '{text}'. Is it well-formed? {err}")?,
        }
        Ok(())
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let stdin = io::stdin();
    let mut stdout = io::stdout().lock();
    let mut shell = Shell::default();

    writeln!(stdout, "{INTRO}")?;

    if let Some(path) = std::env::args().nth(1) {
        shell.run_line(&format!("load {path}"), &mut stdout)?;
        shell.run_line("build", &mut stdout)?;
    }

    let mut lines = stdin.lock().lines();
    loop {
        write!(stdout, "(trielog) ")?;
        stdout.flush()?;

        let Some(line) = lines.next() else {
            writeln!(stdout)?;
            break;
        };
        let line = line.context("failed to read from standard input")?;

        let started = Instant::now();
        let flow = shell.run_line(&line, &mut stdout)?;
        if !line.trim().is_empty() {
            writeln!(
                stdout,
                "\n:: (command executed in {:.3} ms)",
                started.elapsed().as_secs_f64() * 1000.0
            )?;
        }
        if let Flow::Quit = flow {
            break;
        }
    }
    Ok(())
}
