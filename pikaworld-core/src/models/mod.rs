mod date_record;
mod exercise;
mod workspace;

pub use date_record::{date_key, days_in_month, normalize_date, parse_date_key, DateRecord};
pub use exercise::ExerciseEntry;
pub use workspace::{generate_workspace_id, Workspace, WorkspacePatch};
