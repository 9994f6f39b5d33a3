use std::fs;
use std::path::Path;

use chrono::Local;
use tipsy_core::editor::{EntryDraft, EntryEditor};
use tipsy_core::models::is_preset_tag;
use tipsy_core::timeline::{group_by_day, JournalStats};
use tipsy_core::util::greeting;

use crate::cli::{AddArgs, EditArgs};
use crate::commands::common::{
    format_entry_details, format_entry_line, is_image_file, resolve_entry, Session,
};
use crate::error::CliError;

pub fn run_add(session: &Session, args: AddArgs) -> Result<(), CliError> {
    let editor = EntryEditor::new(&session.store);
    let mut draft = EntryDraft {
        id: None,
        name: args.name,
        rating: args.rating,
        image_path: Some(args.image),
        location: args.location,
        notes: args.notes,
        price: args.price,
        tags: Vec::new(),
    };
    for tag in &args.tags {
        let tag = register_tag(&editor, tag)?;
        if !draft.tags.contains(&tag) {
            draft.tags.push(tag);
        }
    }

    let saved = save_with_image(session, &editor, draft)?;
    println!("{}", saved.id);
    Ok(())
}

pub fn run_edit(session: &Session, args: EditArgs) -> Result<(), CliError> {
    let editor = EntryEditor::new(&session.store);
    let entry = resolve_entry(&session.store, &args.id)?;
    let mut draft = EntryDraft::from_entry(&entry);

    if let Some(name) = args.name {
        draft.name = name;
    }
    if let Some(rating) = args.rating {
        draft.rating = rating;
    }
    if let Some(image) = args.image {
        draft.image_path = Some(image);
    }
    if let Some(location) = args.location {
        draft.location = Some(location);
    }
    if let Some(notes) = args.notes {
        draft.notes = Some(notes);
    }
    if let Some(price) = args.price {
        draft.price = Some(price);
    }
    for tag in &args.toggle_tags {
        let tag = tag.trim();
        if draft.tags.iter().any(|existing| existing == tag) {
            draft.toggle_tag(tag);
        } else {
            let tag = register_tag(&editor, tag)?;
            draft.toggle_tag(&tag);
        }
    }

    let unchanged_image = draft.image_path.as_deref() == entry.image_ref();
    let saved = if unchanged_image {
        editor.save(draft)?
    } else {
        save_with_image(session, &editor, draft)?
    };
    println!("{}", saved.id);
    Ok(())
}

/// Validate, bring a picked image file into storage, then save.
///
/// The attached copy is removed again if the save fails.
fn save_with_image(
    session: &Session,
    editor: &EntryEditor<'_>,
    mut draft: EntryDraft,
) -> Result<tipsy_core::DiaryEntry, CliError> {
    draft.validate()?;

    let raw = draft.image_path.take().unwrap_or_default();
    let raw = raw.trim();
    let attached = if is_image_file(raw) {
        let path = Path::new(raw);
        let size = fs::metadata(path)?.len();
        Some(editor.attach_image(path, size)?)
    } else {
        None
    };
    draft.image_path = Some(attached.clone().unwrap_or_else(|| raw.to_string()));

    editor.save(draft).map_err(|error| {
        if let Some(path) = &attached {
            session.store.assets().delete(path);
        }
        CliError::from(error)
    })
}

fn register_tag(editor: &EntryEditor<'_>, tag: &str) -> Result<String, CliError> {
    let tag = tag.trim();
    if is_preset_tag(tag) {
        Ok(tag.to_string())
    } else {
        Ok(editor.add_custom_tag(tag)?)
    }
}

pub fn run_show(session: &Session, id: &str) -> Result<(), CliError> {
    let entry = resolve_entry(&session.store, id)?;
    for line in format_entry_details(&entry) {
        println!("{line}");
    }
    Ok(())
}

pub fn run_list(
    session: &Session,
    limit: Option<usize>,
    tag: Option<&str>,
    as_json: bool,
) -> Result<(), CliError> {
    let mut entries = session.store.list();
    if let Some(tag) = tag.map(str::trim) {
        entries.retain(|entry| entry.has_tag(tag));
    }
    if let Some(limit) = limit {
        entries.truncate(limit);
    }

    if as_json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }
    if entries.is_empty() {
        println!("No entries yet.");
        return Ok(());
    }

    for group in group_by_day(&entries) {
        println!("{}", group.label);
        for entry in &group.entries {
            println!("  {}", format_entry_line(entry));
        }
    }
    Ok(())
}

pub fn run_delete(session: &Session, id: &str) -> Result<(), CliError> {
    let entry = resolve_entry(&session.store, id)?;
    session.store.delete(entry.id.as_str())?;
    println!("{}", entry.id);
    Ok(())
}

pub fn run_stats(session: &Session, as_json: bool) -> Result<(), CliError> {
    let now = Local::now();
    let stats = JournalStats::from_entries(&session.store.list(), &now);

    if as_json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    let greeting = greeting(&now);
    match session.cache.load() {
        Some(identity) if !identity.nickname.is_empty() => {
            println!("{} {}", greeting.line1, identity.nickname);
        }
        _ => println!("{}", greeting.line1),
    }
    println!("{}", greeting.line2);
    println!();
    println!("entries          {}", stats.total_notes);
    println!("spent            {:.2}", stats.total_spent);
    println!("days this month  {}", stats.month_days);
    Ok(())
}
