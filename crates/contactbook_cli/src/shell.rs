//! Interactive command loop.
//!
//! # Responsibility
//! - Map each command line to exactly one Person Store operation.
//! - Print results and recoverable errors, then keep the session going.
//! - Ask for save confirmation on exit when the store is dirty.
//!
//! # Invariants
//! - No store error terminates the loop; only `exit` or end of input does.
//! - Field buffers for `+` live only for the duration of that command.

use contactbook_core::{PersonDraft, PersonRepository, PersonStore, RecordSchema, StoreError};
use log::{info, warn};
use std::io::{self, BufRead, Write};

pub const COMMAND_PALETTE: &str = "
================================
Available commands:
--------------------------------
list, l: show list of all persons
+: add a person
-: delete a person
find: find a person
order: show persons ordered by a column
age: get a person's age
stats: get the age average
info: show this help
exit: exit this program
================================";

pub const GREETING: &str = "
==================================================================
Hi... for info type the word info, or if you know the commands just
enter your command
==================================================================";

/// One line of user input, parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    List,
    Add,
    Delete,
    Find,
    Order,
    Age,
    Stats,
    Info,
    Exit,
}

impl Command {
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim() {
            "list" | "l" => Some(Self::List),
            "+" => Some(Self::Add),
            "-" => Some(Self::Delete),
            "find" => Some(Self::Find),
            "order" => Some(Self::Order),
            "age" => Some(Self::Age),
            "stats" => Some(Self::Stats),
            "info" => Some(Self::Info),
            "exit" => Some(Self::Exit),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Add => "add",
            Self::Delete => "delete",
            Self::Find => "find",
            Self::Order => "order",
            Self::Age => "age",
            Self::Stats => "stats",
            Self::Info => "info",
            Self::Exit => "exit",
        }
    }
}

/// Prompt-driven session over any line source and sink.
pub struct Shell<'s, R: PersonRepository, I: BufRead, O: Write> {
    store: &'s mut PersonStore<R>,
    input: I,
    output: O,
}

impl<'s, R, I, O> Shell<'s, R, I, O>
where
    R: PersonRepository,
    I: BufRead,
    O: Write,
{
    pub fn new(store: &'s mut PersonStore<R>, input: I, output: O) -> Self {
        Self {
            store,
            input,
            output,
        }
    }

    /// Runs commands until `exit` or end of input.
    ///
    /// Only I/O failures on the terminal itself are returned as errors.
    pub fn run(&mut self) -> io::Result<()> {
        writeln!(self.output, "{GREETING}")?;

        loop {
            let Some(line) = self.ask("Enter your command: ")? else {
                info!("event=session_end module=cli status=ok reason=eof");
                return Ok(());
            };

            let Some(command) = Command::parse(&line) else {
                writeln!(self.output, "Command not valid")?;
                continue;
            };
            info!("event=command module=cli name={}", command.name());

            let finished = match command {
                Command::List => self.list().map(|()| false),
                Command::Add => self.add().map(|()| false),
                Command::Delete => self.delete().map(|()| false),
                Command::Find => self.find().map(|()| false),
                Command::Order => self.order().map(|()| false),
                Command::Age => self.age().map(|()| false),
                Command::Stats => self.stats().map(|()| false),
                Command::Info => writeln!(self.output, "{COMMAND_PALETTE}").map(|()| false),
                Command::Exit => self.exit(),
            }?;

            if finished {
                info!("event=session_end module=cli status=ok reason=exit");
                return Ok(());
            }
        }
    }

    /// Prints `prompt` and reads one trimmed line; `None` at end of input.
    fn ask(&mut self, prompt: &str) -> io::Result<Option<String>> {
        write!(self.output, "{prompt}")?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            writeln!(self.output)?;
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    fn report(&mut self, err: &StoreError) -> io::Result<()> {
        warn!("event=command module=cli status=error error={}", error_code(err));
        writeln!(self.output, "{err}")
    }

    fn list(&mut self) -> io::Result<()> {
        for person in self.store.list() {
            writeln!(self.output, "{person}")?;
        }
        writeln!(self.output, "{} persons in the list", self.store.len())
    }

    fn add(&mut self) -> io::Result<()> {
        let Some(first_name) = self.ask("Enter first_name: ")? else {
            return Ok(());
        };
        let Some(last_name) = self.ask("Enter last_name: ")? else {
            return Ok(());
        };
        let mut draft = PersonDraft::new(first_name, last_name);

        match self.store.schema() {
            RecordSchema::Birthday => {
                let Some(date) =
                    self.ask("Enter date of birth [dd/mm/yyyy] (empty if unknown): ")?
                else {
                    return Ok(());
                };
                draft = draft.with_date_of_birth(date);
            }
            RecordSchema::Contact => {
                let Some(email) = self.ask("Enter email: ")? else {
                    return Ok(());
                };
                let Some(phone) = self.ask("Enter phone (empty if unknown): ")? else {
                    return Ok(());
                };
                draft = draft.with_email(email).with_phone(phone);
            }
        }

        let schema = self.store.schema();
        let result = draft
            .build(schema)
            .map_err(StoreError::from)
            .and_then(|person| self.store.add(person).map(ToString::to_string));
        match result {
            Ok(person) => writeln!(self.output, "Person: {person} has been added to the list"),
            Err(err) => self.report(&err),
        }
    }

    fn delete(&mut self) -> io::Result<()> {
        let Some((first_name, last_name)) = self.ask_name("of the person to delete")? else {
            return Ok(());
        };
        match self.store.delete(&first_name, &last_name) {
            Ok(count) => writeln!(self.output, "{count} person(s) deleted"),
            Err(err) => self.report(&err),
        }
    }

    fn find(&mut self) -> io::Result<()> {
        let Some(term) = self.ask("Enter the name or last name to find person: ")? else {
            return Ok(());
        };
        let found: Vec<String> = self
            .store
            .find(&term)
            .into_iter()
            .map(ToString::to_string)
            .collect();

        if found.is_empty() {
            return writeln!(self.output, "No persons found");
        }
        for person in &found {
            writeln!(self.output, "{person}")?;
        }
        Ok(())
    }

    fn order(&mut self) -> io::Result<()> {
        let Some(direction) = self.ask("Type asc to order ascending or dsc to order descending: ")?
        else {
            return Ok(());
        };
        let ascending = match direction.to_ascii_lowercase().as_str() {
            "asc" => true,
            "dsc" | "desc" => false,
            _ => return writeln!(self.output, "Ordering not valid, expected asc or dsc"),
        };

        let columns = self.store.schema().columns().join(", ");
        let Some(column) = self.ask(&format!("Order by column ({columns}): "))? else {
            return Ok(());
        };

        let sorted = self
            .store
            .sort(ascending, &column)
            .map(|persons| persons.into_iter().map(ToString::to_string).collect::<Vec<_>>());
        match sorted {
            Ok(lines) => {
                for line in lines {
                    writeln!(self.output, "{line}")?;
                }
                Ok(())
            }
            Err(err) => self.report(&err),
        }
    }

    fn age(&mut self) -> io::Result<()> {
        let Some((first_name, last_name)) = self.ask_name("of the person")? else {
            return Ok(());
        };
        let ages = match self.store.age_of(&first_name, &last_name) {
            Ok(ages) => ages,
            Err(err) => return self.report(&err),
        };

        for age in ages {
            let (first, last) = (age.person.first_name(), age.person.last_name());
            match age.years {
                Some(years) => writeln!(self.output, "{first} {last} is {years} years old")?,
                None => writeln!(self.output, "{first} {last} has no date of birth")?,
            }
        }
        Ok(())
    }

    fn stats(&mut self) -> io::Result<()> {
        match self.store.average_age() {
            Ok(average) => writeln!(
                self.output,
                "The age average of the persons is {average:.2}"
            ),
            Err(err) => self.report(&err),
        }
    }

    /// Returns `true` when the session should end.
    fn exit(&mut self) -> io::Result<bool> {
        if self.store.is_dirty() {
            writeln!(
                self.output,
                "Before exiting the program, would you like to save your changes?"
            )?;
            let answer = self.ask("Yes/No: ")?.unwrap_or_default();

            if answer.to_ascii_lowercase().contains("yes") {
                match self.store.save() {
                    Ok(report) => writeln!(
                        self.output,
                        "Changes saved ({} added, {} removed)",
                        report.inserted, report.deleted
                    )?,
                    Err(err) => {
                        self.report(&err)?;
                        writeln!(self.output, "Changes were not saved")?;
                        return Ok(false);
                    }
                }
            } else {
                let pending = self.store.pending_changes();
                info!(
                    "event=session_discard module=cli status=ok added={} deleted={}",
                    pending.added, pending.deleted
                );
            }
        }

        writeln!(self.output, "Exiting the program")?;
        Ok(true)
    }

    fn ask_name(&mut self, subject: &str) -> io::Result<Option<(String, String)>> {
        let Some(first_name) = self.ask(&format!("Enter the first name {subject}: "))? else {
            return Ok(None);
        };
        let Some(last_name) = self.ask(&format!("Enter the last name {subject}: "))? else {
            return Ok(None);
        };
        Ok(Some((first_name, last_name)))
    }
}

fn error_code(err: &StoreError) -> &'static str {
    match err {
        StoreError::Validation(_) => "validation",
        StoreError::DuplicateKey { .. } => "duplicate_key",
        StoreError::NotFound { .. } => "not_found",
        StoreError::UnknownColumn(_) => "unknown_column",
        StoreError::NoRecords => "no_records",
        StoreError::StoreUnavailable(_) => "store_unavailable",
    }
}
