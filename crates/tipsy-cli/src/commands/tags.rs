use tipsy_core::editor::EntryEditor;
use tipsy_core::models::PRESET_TAGS;

use crate::cli::TagCommands;
use crate::commands::common::Session;
use crate::error::CliError;

pub fn run_tags(session: &Session, command: TagCommands) -> Result<(), CliError> {
    match command {
        TagCommands::List => {
            println!("preset  {}", PRESET_TAGS.join(", "));
            let custom = session.store.list_tags();
            if custom.is_empty() {
                println!("custom  (none)");
            } else {
                println!("custom  {}", custom.join(", "));
            }
        }
        TagCommands::Add { tag } => {
            let tag = EntryEditor::new(&session.store).add_custom_tag(&tag)?;
            println!("{tag}");
        }
    }
    Ok(())
}
