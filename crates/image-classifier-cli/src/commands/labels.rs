//! Labels listing command

use anyhow::Result;
use image_classifier::{ClassificationModel, ShotTypeModel};

pub fn list_labels() -> Result<()> {
    let model = ShotTypeModel::new();

    for (index, head) in model.heads().iter().enumerate() {
        println!("Head {}: {}", index, head.name.as_deref().unwrap_or("<unnamed>"));
        let display_names = head.display_names.get("en");
        for (label_index, label) in head.labels.iter().enumerate() {
            match display_names.and_then(|names| names.get(label_index)) {
                Some(display) => println!("  {label_index:>2}  {label} ({display})"),
                None => println!("  {label_index:>2}  {label}"),
            }
        }
    }

    Ok(())
}
