//! Seed the menu from a YAML file.
//!
//! The file is a list of menu items:
//!
//! ```yaml
//! - title: Veggie
//!   description: A garden of delight
//!   image: pizza1.png
//!   price: 0.0038
//! ```
//!
//! Items whose title is already on the menu are skipped, so seeding twice
//! is harmless.

use std::collections::HashSet;
use std::path::Path;

use tracing::info;

use pizza_service::db::MenuCatalog;
use pizza_service::models::NewMenuItem;

use super::connect;

/// Add the menu items in `file_path` that are not on the menu yet.
///
/// # Errors
///
/// Returns an error if the file is missing or invalid, or the database
/// operation fails.
pub async fn menu(file_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    info!(path = %file_path, "Loading menu from file");

    // Parse before connecting so a bad file fails fast
    let content = tokio::fs::read_to_string(path).await?;
    let items = parse_menu(&content)?;
    info!(items = items.len(), "Parsed menu");

    let db = connect().await?;

    let mut existing: HashSet<String> = db
        .list_menu()
        .await?
        .into_iter()
        .map(|item| item.title)
        .collect();

    let mut inserted = 0_usize;
    let mut skipped = 0_usize;
    for item in items {
        if !existing.insert(item.title.clone()) {
            skipped += 1;
            continue;
        }
        let added = db.add_menu_item(item).await?;
        info!(id = %added.id, title = %added.title, "Added menu item");
        inserted += 1;
    }

    info!("Seeding complete!");
    info!("  Items inserted: {inserted}");
    info!("  Items skipped (already on menu): {skipped}");
    Ok(())
}

fn parse_menu(content: &str) -> Result<Vec<NewMenuItem>, Box<dyn std::error::Error>> {
    let items: Vec<NewMenuItem> = serde_yaml::from_str(content)?;
    if let Some(blank) = items.iter().position(|item| item.title.trim().is_empty()) {
        return Err(format!("menu item {blank} has no title").into());
    }
    Ok(items)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_menu() {
        let items = parse_menu(
            "- title: Veggie\n  description: A garden of delight\n  image: pizza1.png\n  price: 0.0038\n\
             - title: Pepperoni\n  price: \"0.0042\"\n",
        )
        .unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "Veggie");
        assert_eq!(items[1].price.to_string(), "0.0042");
        assert!(items[1].description.is_empty());
    }

    #[test]
    fn test_parse_menu_rejects_negative_price() {
        assert!(parse_menu("- title: Free\n  price: -1\n").is_err());
    }

    #[test]
    fn test_parse_menu_rejects_blank_title() {
        assert!(parse_menu("- title: \"  \"\n  price: 1\n").is_err());
    }
}
