use super::{load_config, path_manager};
use crate::output::Output;
use color_eyre::Result;
use comfy_table::{Cell, Table};
use lecture_config::storage_locations;
use lecture_core::load_topics;
use serde_json::json;

fn table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS);
    table.set_header(
        header
            .into_iter()
            .map(|h| Cell::new(h).add_attribute(comfy_table::Attribute::Bold))
            .collect::<Vec<_>>(),
    );
    table
}

pub fn run_topics(output: &Output) -> Result<()> {
    let config = load_config(&path_manager())?;
    let topics_file = &config.topics.file;
    let catalog = load_topics(topics_file)
        .map_err(|e| color_eyre::eyre::eyre!("Failed to read topics from {}: {}", topics_file.display(), e))?;

    let Some(catalog) = catalog else {
        output.warn(format!("Topic catalog not found at {}", topics_file.display()));
        return Ok(());
    };

    if !output.is_human() {
        output.json(&json!({ "type": "topics", "categories": catalog }));
        return Ok(());
    }
    if output.is_quiet() {
        return Ok(());
    }

    let mut listing = table(vec!["Category", "Topic", "Link"]);
    for category in catalog.category_names() {
        for topic in catalog.topics(category) {
            listing.add_row(vec![category, topic.name.as_str(), topic.href.as_str()]);
        }
    }
    println!("{}", listing);
    Ok(())
}

pub fn run_locations(output: &Output) -> Result<()> {
    let locations = storage_locations();
    let current = load_config(&path_manager())?.downloads.destination_root;

    if !output.is_human() {
        output.json(&json!({ "type": "locations", "locations": locations, "current": current }));
        return Ok(());
    }
    if output.is_quiet() {
        return Ok(());
    }

    let mut listing = table(vec!["", "Location", "Path"]);
    for location in &locations {
        let marker = if location.path == current { "*" } else { "" };
        listing.add_row(vec![
            marker.to_string(),
            location.label.clone(),
            location.path.display().to_string(),
        ]);
    }
    println!("{}", listing);
    Ok(())
}
