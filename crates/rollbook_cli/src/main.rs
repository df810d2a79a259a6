//! CLI smoke entry point.
//!
//! Opens the configured database and prints core health. With a class id,
//! also prints the free slots of the given date (default: today):
//!
//! `rollbook_cli [<institutional-class-uuid> [<YYYY-MM-DD>]]`

use rollbook_core::{
    ClassRef, CoreConfig, SessionDate, SessionService, SqliteRosterRepository,
    SqliteSessionRepository,
};
use std::error::Error;
use std::process::ExitCode;
use uuid::Uuid;

fn main() -> ExitCode {
    match run(std::env::args().skip(1).collect()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("rollbook_cli error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Vec<String>) -> Result<(), Box<dyn Error>> {
    println!("rollbook_core ping={}", rollbook_core::ping());
    println!("rollbook_core version={}", rollbook_core::core_version());

    let config = CoreConfig::from_env();
    let conn = config.bootstrap()?;
    println!("rollbook_core db={}", config.db_path.display());

    if let Some(class_id) = args.first() {
        let class_ref = ClassRef::institutional(Uuid::parse_str(class_id)?);
        let date = match args.get(1) {
            Some(value) => SessionDate::parse(value)?,
            None => SessionDate::today(),
        };
        let service = SessionService::new(
            SqliteSessionRepository::try_new(&conn)?,
            SqliteRosterRepository::try_new(&conn)?,
        );
        let slots = service
            .available_slots(&class_ref, date, None)?
            .iter()
            .map(|slot| slot.to_string())
            .collect::<Vec<_>>();
        if slots.is_empty() {
            println!("free_slots date={date} none");
        } else {
            println!("free_slots date={date} slots={}", slots.join(","));
        }
    }
    Ok(())
}
