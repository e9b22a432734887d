//! Booking page HTML parser.

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

use crate::config::Venue;
use crate::error::FetchError;
use crate::slot::SlotRecord;

/// Date label used for rows that appear before any date header.
pub const UNKNOWN_DATE: &str = "Unknown Date";

/// Parser for the fitness-centre booking page.
///
/// Each venue is a `div` whose direct children are either date headers
/// (classes `py-2` and `grey`) or slot rows (class `border-top`). A slot row
/// holds a `div.row` with at least two `div.col`: time label, then status.
pub struct SchedulePageParser;

impl SchedulePageParser {
    /// Extract slot records for the given venues, in page order.
    pub fn parse(html: &str, venues: &[Venue]) -> Result<Vec<SlotRecord>, FetchError> {
        let document = Html::parse_document(html);
        let row_selector = selector("div.row")?;
        let col_selector = selector("div.col")?;

        let mut records = Vec::new();

        for venue in venues {
            let section_selector = selector(&format!("div[id=\"{}\"]", venue.section_id))?;
            let Some(section) = document.select(&section_selector).next() else {
                debug!(venue = %venue.name, section = %venue.section_id, "Venue section not found");
                continue;
            };

            let mut current_date = UNKNOWN_DATE.to_string();
            let before = records.len();

            for child in section.children().filter_map(ElementRef::wrap) {
                if has_class(&child, "py-2") && has_class(&child, "grey") {
                    current_date = text_of(&child);
                } else if has_class(&child, "border-top") {
                    let Some(row) = child.select(&row_selector).next() else {
                        continue;
                    };
                    let cols: Vec<ElementRef<'_>> = row.select(&col_selector).collect();
                    if cols.len() < 2 {
                        debug!(venue = %venue.name, date = %current_date, "Slot row without time and status, skipping");
                        continue;
                    }

                    records.push(SlotRecord::new(
                        &venue.name,
                        &current_date,
                        &text_of(&cols[0]),
                        &text_of(&cols[1]),
                    ));
                }
            }

            debug!(venue = %venue.name, slots = records.len() - before, "Parsed venue");
        }

        if records.is_empty() {
            warn!("No slot rows found in HTML. The page may have changed layout.");
            return Err(FetchError::EmptySchedule);
        }

        Ok(records)
    }
}

fn selector(css: &str) -> Result<Selector, FetchError> {
    Selector::parse(css).map_err(|e| FetchError::Selector {
        selector: css.to_string(),
        reason: e.to_string(),
    })
}

fn has_class(el: &ElementRef<'_>, class: &str) -> bool {
    el.value().classes().any(|c| c == class)
}

/// Text content with each text node trimmed, like a "strip" text getter.
fn text_of(el: &ElementRef<'_>) -> String {
    el.text().map(str::trim).collect()
}
