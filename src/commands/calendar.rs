use chrono::{Datelike, Local, NaiveDate};
use clap::{Args, Subcommand};
use pikaworld_core::{date_key, CalendarStore, ExerciseEntry, KeyValueStore};
use std::path::PathBuf;

use super::{confirm, format_bytes, parse_date_or_today, truncate, OutputFormat};

#[derive(Args)]
pub struct CalendarCommand {
    #[command(subcommand)]
    pub command: CalendarSubcommand,
}

/// Exercise fields shared by `add` and `update`.
#[derive(Args, Default, Clone)]
pub struct ExerciseFields {
    /// Repetitions (e.g., "10")
    #[arg(long)]
    pub reps: Option<String>,

    /// Sets (e.g., "3")
    #[arg(long)]
    pub sets: Option<String>,

    /// Weight (e.g., "40 kg")
    #[arg(long)]
    pub weight: Option<String>,

    /// Duration (e.g., "20 min")
    #[arg(long)]
    pub duration: Option<String>,
}

#[derive(Subcommand)]
pub enum CalendarSubcommand {
    /// Show the exercises and notes for a day
    Show {
        /// Date (YYYY-MM-DD), defaults to today
        #[arg(long, short)]
        date: Option<String>,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show every logged day of a month
    Month {
        /// Year, defaults to the current year
        #[arg(long, short)]
        year: Option<i32>,

        /// Month (1-12), defaults to the current month
        #[arg(long, short)]
        month: Option<u32>,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Log an exercise
    Add {
        /// Exercise name
        name: String,

        /// Date (YYYY-MM-DD), defaults to today
        #[arg(long, short)]
        date: Option<String>,

        #[command(flatten)]
        fields: ExerciseFields,

        /// Mark as already completed
        #[arg(long)]
        completed: bool,
    },

    /// Update an exercise by its position in the day's list
    Update {
        /// Position shown by `calendar show`
        index: usize,

        /// Date (YYYY-MM-DD), defaults to today
        #[arg(long, short)]
        date: Option<String>,

        /// New exercise name
        #[arg(long, short)]
        name: Option<String>,

        #[command(flatten)]
        fields: ExerciseFields,
    },

    /// Remove an exercise by its position in the day's list
    Remove {
        /// Position shown by `calendar show`
        index: usize,

        /// Date (YYYY-MM-DD), defaults to today
        #[arg(long, short)]
        date: Option<String>,
    },

    /// Mark an exercise as completed
    Complete {
        /// Position shown by `calendar show`
        index: usize,

        /// Date (YYYY-MM-DD), defaults to today
        #[arg(long, short)]
        date: Option<String>,

        /// Mark as not completed instead
        #[arg(long)]
        undo: bool,
    },

    /// Set or clear the notes for a day
    Notes {
        /// Notes text; omit with --clear to remove notes
        text: Option<String>,

        /// Date (YYYY-MM-DD), defaults to today
        #[arg(long, short)]
        date: Option<String>,

        /// Remove the notes
        #[arg(long, conflicts_with = "text")]
        clear: bool,
    },

    /// Export the whole calendar as JSON
    Export {
        /// Write to a file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Replace the calendar with an exported JSON file
    Import {
        /// Path to the exported file
        file: PathBuf,
    },

    /// Restore the calendar from the backup of the last good save
    Restore,

    /// Delete all calendar data and its backup
    Clear {
        /// Skip confirmation
        #[arg(long, short)]
        force: bool,
    },

    /// Show how much storage the calendar uses
    Usage,
}

impl CalendarCommand {
    pub fn run<S: KeyValueStore>(
        &self,
        calendar: &CalendarStore<S>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            CalendarSubcommand::Show { date, format } => {
                let date = parse_date_or_today(date.as_deref())?;
                let record = calendar.get_date_data(date);

                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&record)?);
                    }
                    OutputFormat::Text => {
                        println!("{}", date.format("%A, %B %-d, %Y"));
                        println!();
                        print!("{}", record);
                    }
                }
                Ok(())
            }

            CalendarSubcommand::Month {
                year,
                month,
                format,
            } => {
                let today = Local::now().date_naive();
                let year = year.unwrap_or(today.year());
                let month0 = month_to_index(month.unwrap_or(today.month()))?;
                let days = calendar.get_month_data(year, month0);

                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&days)?);
                    }
                    OutputFormat::Text => {
                        if days.is_empty() {
                            println!("Nothing logged in {}-{:02}.", year, month0 + 1);
                            return Ok(());
                        }

                        println!("{:<10}  {:>9}  {:>9}  Notes", "Date", "Exercises", "Completed");
                        println!("{}", "-".repeat(50));
                        for (day, record) in &days {
                            let notes = record.notes.as_deref().unwrap_or("");
                            println!(
                                "{}-{:02}-{:02}  {:>9}  {:>9}  {}",
                                year,
                                month0 + 1,
                                day,
                                record.exercises.len(),
                                record.completed_count(),
                                truncate(notes, 30)
                            );
                        }
                        println!();
                        println!("Total: {} day(s)", days.len());
                    }
                }
                Ok(())
            }

            CalendarSubcommand::Add {
                name,
                date,
                fields,
                completed,
            } => {
                let date = parse_date_or_today(date.as_deref())?;
                let entry = fields
                    .apply(ExerciseEntry::new(name.as_str()))
                    .with_completed(*completed);

                let record = calendar.add_exercise(date, entry)?;
                println!(
                    "Logged '{}' on {} ({} exercise(s) that day)",
                    name,
                    date_key(date),
                    record.exercises.len()
                );
                Ok(())
            }

            CalendarSubcommand::Update {
                index,
                date,
                name,
                fields,
            } => {
                if name.is_none() && fields.is_empty() {
                    println!("Nothing to update. Use --help to see available options.");
                    return Ok(());
                }

                let date = parse_date_or_today(date.as_deref())?;
                let existing = exercise_at(calendar, date, *index)?;

                let mut entry = fields.apply(existing);
                if let Some(name) = name {
                    entry.name = name.clone();
                }

                calendar.update_exercise(date, *index, entry.clone())?;
                println!("Updated exercise {}:", index);
                println!("  {}", entry);
                Ok(())
            }

            CalendarSubcommand::Remove { index, date } => {
                let date = parse_date_or_today(date.as_deref())?;
                let existing = exercise_at(calendar, date, *index)?;

                calendar.remove_exercise(date, *index)?;
                println!("Removed '{}' from {}", existing.name, date_key(date));
                Ok(())
            }

            CalendarSubcommand::Complete { index, date, undo } => {
                let date = parse_date_or_today(date.as_deref())?;
                let existing = exercise_at(calendar, date, *index)?;

                calendar.set_exercise_completed(date, *index, !undo)?;
                if *undo {
                    println!("Marked '{}' as not completed", existing.name);
                } else {
                    println!("Marked '{}' as completed", existing.name);
                }
                Ok(())
            }

            CalendarSubcommand::Notes { text, date, clear } => {
                let date = parse_date_or_today(date.as_deref())?;
                let notes = if *clear { None } else { text.clone() };
                if notes.is_none() && !clear {
                    let record = calendar.get_date_data(date);
                    match record.notes {
                        Some(notes) => println!("{}", notes),
                        None => println!("No notes for {}.", date_key(date)),
                    }
                    return Ok(());
                }

                calendar.set_notes(date, notes)?;
                if *clear {
                    println!("Cleared notes for {}", date_key(date));
                } else {
                    println!("Saved notes for {}", date_key(date));
                }
                Ok(())
            }

            CalendarSubcommand::Export { output } => {
                let serialized = calendar.export_data()?;
                match output {
                    Some(path) => {
                        std::fs::write(path, serialized)?;
                        println!("Exported calendar to {}", path.display());
                    }
                    None => println!("{}", serialized),
                }
                Ok(())
            }

            CalendarSubcommand::Import { file } => {
                let contents = std::fs::read_to_string(file)
                    .map_err(|e| format!("Failed to read {}: {}", file.display(), e))?;
                let count = calendar.import_data(&contents)?;
                println!("Imported {} day(s) from {}", count, file.display());
                Ok(())
            }

            CalendarSubcommand::Restore => {
                let count = calendar.restore_from_backup()?;
                println!("Restored {} day(s) from backup", count);
                Ok(())
            }

            CalendarSubcommand::Clear { force } => {
                if !force && !confirm("Delete all calendar data, including the backup?")? {
                    println!("Cancelled.");
                    return Ok(());
                }

                calendar.clear_all_data()?;
                println!("Calendar cleared.");
                Ok(())
            }

            CalendarSubcommand::Usage => {
                let info = calendar.get_storage_info();
                println!("Calendar storage");
                println!("  Used:      {}", format_bytes(info.used));
                println!("  Available: {}", format_bytes(info.available));
                println!("  Usage:     {:.2}%", info.percentage);
                Ok(())
            }
        }
    }
}

impl ExerciseFields {
    fn is_empty(&self) -> bool {
        self.reps.is_none() && self.sets.is_none() && self.weight.is_none() && self.duration.is_none()
    }

    /// Overwrites the fields that were given, keeping the rest of `entry`.
    fn apply(&self, mut entry: ExerciseEntry) -> ExerciseEntry {
        if let Some(reps) = &self.reps {
            entry.reps = reps.clone();
        }
        if let Some(sets) = &self.sets {
            entry.sets = sets.clone();
        }
        if let Some(weight) = &self.weight {
            entry.weight = weight.clone();
        }
        if let Some(duration) = &self.duration {
            entry.duration = duration.clone();
        }
        entry
    }
}

/// Converts a calendar month (1-12) to the zero-based month the store takes.
fn month_to_index(month: u32) -> Result<i32, String> {
    match month {
        1..=12 => Ok(month as i32 - 1),
        _ => Err(format!("Invalid month {}. Use 1-12.", month)),
    }
}

fn exercise_at<S: KeyValueStore>(
    calendar: &CalendarStore<S>,
    date: NaiveDate,
    index: usize,
) -> Result<ExerciseEntry, String> {
    calendar
        .get_date_data(date)
        .exercises
        .into_iter()
        .nth(index)
        .ok_or_else(|| format!("No exercise at position {} on {}", index, date_key(date)))
}
