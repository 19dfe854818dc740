//! Command Interpreter
//!
//! Line-oriented dispatcher translating text commands into engine calls.
//! Engine failures are reported per command and never end the session;
//! only an unopenable script file is fatal to the run.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::engine::Database;
use crate::error::Result;
use crate::keygen;

/// Interprets text commands against one open database
pub struct Interpreter {
    db: Database,
}

impl Interpreter {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Close the underlying database gracefully.
    pub fn close(self) -> Result<()> {
        self.db.close()
    }

    /// Prompt-driven loop over stdin until `exit`/`quit` or EOF.
    pub fn run_interactive(&mut self) -> Result<()> {
        let stdin = io::stdin();
        let mut out = io::stdout();

        let mut line = String::new();
        loop {
            write!(out, "> ")?;
            out.flush()?;

            line.clear();
            if stdin.read_line(&mut line)? == 0 {
                break;
            }
            let trimmed = line.trim();
            if trimmed == "exit" || trimmed == "quit" {
                break;
            }
            self.process_line(trimmed, &mut out)?;
        }
        Ok(())
    }

    /// Run every line of a command script against the database.
    pub fn run_script(&mut self, path: &Path) -> Result<()> {
        let file = File::open(path)?;
        let mut out = io::stdout();

        for line in BufReader::new(file).lines() {
            self.process_line(line?.trim(), &mut out)?;
        }
        Ok(())
    }

    /// Execute a single command line, reporting the outcome to `out`.
    pub fn process_line(&mut self, line: &str, out: &mut dyn Write) -> Result<()> {
        let mut parts = line.split_whitespace();
        let Some(command) = parts.next() else {
            return Ok(());
        };

        match command {
            "insert" => {
                let Some((key, value)) = parse_pair(&mut parts) else {
                    writeln!(out, "Usage: insert <key> <value>")?;
                    return Ok(());
                };
                match self.db.insert(key, value) {
                    Ok(()) => writeln!(out, "Inserted: {} -> {}", key, value)?,
                    Err(e) => writeln!(out, "Error: {}", e)?,
                }
            }
            "search" => {
                let Some(key) = parse_key(&mut parts) else {
                    writeln!(out, "Usage: search <key>")?;
                    return Ok(());
                };
                match self.db.search(key) {
                    Ok(Some(value)) => writeln!(out, "Found: {} -> {}", key, value)?,
                    Ok(None) => writeln!(out, "Not found: {}", key)?,
                    Err(e) => writeln!(out, "Error: {}", e)?,
                }
            }
            "update" => {
                let Some((key, value)) = parse_pair(&mut parts) else {
                    writeln!(out, "Usage: update <key> <value>")?;
                    return Ok(());
                };
                match self.db.search(key) {
                    Ok(None) => writeln!(out, "Not found: {}", key)?,
                    Ok(Some(_)) => match self.db.update(key, value) {
                        Ok(()) => writeln!(out, "Updated: {} -> {}", key, value)?,
                        Err(e) => writeln!(out, "Error: {}", e)?,
                    },
                    Err(e) => writeln!(out, "Error: {}", e)?,
                }
            }
            "remove" => {
                let Some(key) = parse_key(&mut parts) else {
                    writeln!(out, "Usage: remove <key>")?;
                    return Ok(());
                };
                match self.db.search(key) {
                    Ok(None) => writeln!(out, "Not found: {}", key)?,
                    Ok(Some(_)) => match self.db.remove(key) {
                        Ok(()) => writeln!(out, "Removed: {}", key)?,
                        Err(e) => writeln!(out, "Error: {}", e)?,
                    },
                    Err(e) => writeln!(out, "Error: {}", e)?,
                }
            }
            "generate" => {
                let Some(count) = parse_key(&mut parts) else {
                    writeln!(out, "Usage: generate <count>")?;
                    return Ok(());
                };
                self.generate(count as usize, out)?;
            }
            "reorganise" | "reorganize" => match self.db.reorganise() {
                Ok(()) => writeln!(out, "Reorganised")?,
                Err(e) => writeln!(out, "Error: {}", e)?,
            },
            "print" => {
                if let Err(e) = self.db.dump(out) {
                    writeln!(out, "Error: {}", e)?;
                }
            }
            "stats" => writeln!(out, "{}", self.db.stats())?,
            "flush" => match self.db.flush() {
                Ok(()) => writeln!(out, "Flushed")?,
                Err(e) => writeln!(out, "Error: {}", e)?,
            },
            "help" => {
                writeln!(out, "Available commands:")?;
                writeln!(out, "  insert <key> <value>")?;
                writeln!(out, "  search <key>")?;
                writeln!(out, "  update <key> <value>")?;
                writeln!(out, "  remove <key>")?;
                writeln!(out, "  generate <count>")?;
                writeln!(out, "  reorganise")?;
                writeln!(out, "  print")?;
                writeln!(out, "  stats")?;
                writeln!(out, "  flush")?;
                writeln!(out, "  help")?;
                writeln!(out, "  exit/quit")?;
            }
            _ => writeln!(out, "Unknown command. Type 'help' for available commands.")?,
        }
        Ok(())
    }

    /// Bulk-insert randomly generated unique pairs.
    fn generate(&mut self, count: usize, out: &mut dyn Write) -> Result<()> {
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);

        let mut inserted = 0usize;
        let mut skipped = 0usize;
        for (key, value) in keygen::generate_pairs(count, seed) {
            match self.db.insert(key, value) {
                Ok(()) => inserted += 1,
                Err(e) => {
                    skipped += 1;
                    writeln!(out, "Error: {}", e)?;
                }
            }
        }
        writeln!(out, "Generated: {} inserted, {} skipped", inserted, skipped)?;
        Ok(())
    }
}

fn parse_key(parts: &mut dyn Iterator<Item = &str>) -> Option<u64> {
    parts.next()?.parse().ok()
}

fn parse_pair(parts: &mut dyn Iterator<Item = &str>) -> Option<(u64, u64)> {
    let key = parse_key(parts)?;
    let value = parse_key(parts)?;
    Some((key, value))
}
