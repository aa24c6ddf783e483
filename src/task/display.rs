//! Human-facing renderings of task data.

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::{QuantityUnit, Task, TaskKind};

/// Placeholder for values a legacy record could not supply.
pub const PLACEHOLDER: &str = "???";

/// Language of generated text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    Sk,
    En,
}

impl Locale {
    /// Label preceding the quantity phrase in the legacy text.
    pub fn quantity_label(self) -> &'static str {
        match self {
            Locale::Sk => "Počet",
            Locale::En => "Qty",
        }
    }
}

/// Slavic count bucket: 1, 2-4, everything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluralBucket {
    One,
    Few,
    Many,
}

impl PluralBucket {
    pub fn of(n: u32) -> Self {
        match n {
            1 => PluralBucket::One,
            2..=4 => PluralBucket::Few,
            _ => PluralBucket::Many,
        }
    }
}

/// Quantity phrase, e.g. `3 boxy` or `Celá paleta`.
pub fn quantity_phrase(quantity: u32, unit: QuantityUnit, locale: Locale) -> String {
    let bucket = PluralBucket::of(quantity);
    match (unit, locale) {
        (QuantityUnit::Pieces, _) => quantity.to_string(),
        (QuantityUnit::Boxes, Locale::Sk) => match bucket {
            PluralBucket::One => "1 box".to_string(),
            PluralBucket::Few => format!("{quantity} boxy"),
            PluralBucket::Many => format!("{quantity} boxov"),
        },
        (QuantityUnit::Pallet, Locale::Sk) => match bucket {
            PluralBucket::One => "Celá paleta".to_string(),
            PluralBucket::Few => format!("{quantity} palety"),
            PluralBucket::Many => format!("{quantity} paliet"),
        },
        (QuantityUnit::Boxes, Locale::En) => match bucket {
            PluralBucket::One => "1 box".to_string(),
            _ => format!("{quantity} boxes"),
        },
        (QuantityUnit::Pallet, Locale::En) => match bucket {
            PluralBucket::One => "Whole pallet".to_string(),
            _ => format!("{quantity} pallets"),
        },
    }
}

/// Parse a quantity phrase back into `(quantity, unit)`.
pub fn parse_quantity_phrase(phrase: &str) -> Option<(u32, QuantityUnit)> {
    let phrase = phrase.trim();
    if phrase.eq_ignore_ascii_case("Celá paleta") || phrase.eq_ignore_ascii_case("Whole pallet")
    {
        return Some((1, QuantityUnit::Pallet));
    }

    let mut words = phrase.split_whitespace();
    let quantity: u32 = words.next()?.parse().ok()?;
    let unit = match words.next() {
        None => QuantityUnit::Pieces,
        Some(word) => match word.to_lowercase().as_str() {
            "box" | "boxy" | "boxov" | "boxes" => QuantityUnit::Boxes,
            "palety" | "paliet" | "pallet" | "pallets" => QuantityUnit::Pallet,
            _ => return None,
        },
    };
    if words.next().is_some() {
        return None;
    }
    Some((quantity, unit))
}

/// Display text stored with new tasks:
/// `DD/MM/YY HH:MM:SS / part / workplace / Počet: phrase`.
pub fn legacy_text(
    created_local: NaiveDateTime,
    part_number: &str,
    workplace: &str,
    quantity: u32,
    unit: QuantityUnit,
    locale: Locale,
) -> String {
    format!(
        "{} / {} / {} / {}: {}",
        created_local.format("%d/%m/%y %H:%M:%S"),
        part_number,
        workplace,
        locale.quantity_label(),
        quantity_phrase(quantity, unit, locale)
    )
}

/// Completion time shown on the card, `H:MM:SS`.
pub fn completion_display(local: NaiveDateTime) -> String {
    local.format("%-H:%M:%S").to_string()
}

/// Render a duration the way the analytics tables show it.
pub fn format_duration(duration: Duration) -> String {
    let ms = duration.num_milliseconds();
    if ms <= 0 {
        return "-".to_string();
    }
    let minutes = (ms as f64 / 60_000.0).round() as i64;
    if minutes < 1 {
        return "< 1 min".to_string();
    }
    if minutes > 60 {
        return format!("{}h {}m", minutes / 60, minutes % 60);
    }
    format!("{minutes} min")
}

/// The list-view summary of a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Descriptor {
    pub part: String,
    pub workplace: String,
    pub quantity: String,
}

impl Descriptor {
    pub fn of(task: &Task, locale: Locale) -> Self {
        match &task.kind {
            TaskKind::AdHoc => Descriptor {
                part: task.text.clone(),
                workplace: "-".to_string(),
                quantity: "-".to_string(),
            },
            TaskKind::Movement {
                part_number,
                workplace,
                quantity,
                unit,
            } => Descriptor {
                part: part_number.clone().unwrap_or_else(|| PLACEHOLDER.to_string()),
                workplace: workplace.clone().unwrap_or_else(|| PLACEHOLDER.to_string()),
                quantity: quantity
                    .map(|q| quantity_phrase(q, *unit, locale))
                    .unwrap_or_else(|| PLACEHOLDER.to_string()),
            },
        }
    }
}
