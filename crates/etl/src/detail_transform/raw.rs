//! Anchored extraction over the job-detail page.
//!
//! The page carries no stable ids, so each getter orients on something
//! that survives redeploys: the SVG icon path data in the at-a-glance
//! rows, the apply button's aria-label, the position heading's anchor
//! shape. Every getter is total over its anchor: any traversal miss
//! yields `None`.

use crate::html::{Document, ElementRef};

/// First bytes of the `d` attribute of the money icon's path.
const MONEY_SVG_D: &str = "M2.5 8C2.22386";
/// First bytes of the `d` attribute of the location icon's path.
const LOCATION_SVG_D: &str = "M12 2C15.866";
/// First bytes of the `d` attribute of the job-type icon's path.
const JOB_SVG_D: &str = "M11.5527 2.72314";

pub struct RawJobPage {
    doc: Document,
}

impl RawJobPage {
    pub fn parse(html: &str) -> Self {
        Self {
            doc: Document::parse(html),
        }
    }

    fn icon_path(&self, d_prefix: &str) -> Option<ElementRef<'_>> {
        self.doc.find(|el| {
            el.tag() == "path" && el.attr("d").is_some_and(|d| d.starts_with(d_prefix))
        })
    }

    /// The glance row text next to an icon: the icon's parent, its next
    /// sibling div, that sibling's first inner div.
    fn glance_row(&self, d_prefix: &str) -> Option<String> {
        let row = self
            .icon_path(d_prefix)?
            .parent()?
            .next_sibling_with_tag("div")?
            .first_descendant_tag("div")?;
        Some(row.text())
    }

    pub fn wage(&self) -> Option<String> {
        self.glance_row(MONEY_SVG_D)
    }

    pub fn location(&self) -> Option<String> {
        self.glance_row(LOCATION_SVG_D)
    }

    fn job_glance_cell(&self, index: usize) -> Option<String> {
        let block = self
            .icon_path(JOB_SVG_D)?
            .parent()?
            .next_sibling_with_tag("div")?;
        let cells = block.descendants_with_tag("div");
        Some(cells.get(index)?.text())
    }

    pub fn job_type(&self) -> Option<String> {
        self.job_glance_cell(0)
    }

    pub fn employment_type(&self) -> Option<String> {
        self.job_glance_cell(1)
    }

    /// Inner HTML of the description block that follows the at-a-glance
    /// section.
    pub fn about(&self) -> Option<String> {
        let heading = self
            .doc
            .find(|el| el.tag() == "h3" && el.text().trim() == "At a glance")?;
        let section = heading
            .parent()?
            .parent()?
            .next_sibling_with_tag("div")?
            .first_descendant_tag("div")?
            .first_descendant_tag("div")?;
        Some(section.inner_html())
    }

    /// Text of the `Apply` / `Apply externally` button.
    pub fn apply_type(&self) -> Option<String> {
        let button = self.doc.find(|el| {
            el.tag() == "button" && el.attr("aria-label").is_some_and(|l| l.contains("Apply"))
        })?;
        Some(button.text())
    }

    fn position_heading(&self) -> Option<ElementRef<'_>> {
        let anchor = self.doc.find(|el| {
            el.tag() == "a"
                && el
                    .attr("href")
                    .is_some_and(|href| href.starts_with("/jobs/") && href.contains("?searchId="))
        })?;
        anchor.first_descendant_tag("h1")
    }

    pub fn position(&self) -> Option<String> {
        Some(self.position_heading()?.text())
    }

    /// The posted / apply-by line under the position heading.
    pub fn times(&self) -> Option<String> {
        let line = self
            .position_heading()?
            .parent()?
            .next_sibling_with_tag("div")?;
        Some(line.text())
    }

    fn company_anchor(&self, index: usize) -> Option<String> {
        let block = self
            .position_heading()?
            .parent()?
            .prev_sibling_with_tag("div")?
            .first_descendant_tag("div")?;
        let anchors = block.descendants_with_tag("a");
        let label = anchors.get(index)?.first_descendant_tag("div")?;
        Some(label.text())
    }

    pub fn company(&self) -> Option<String> {
        self.company_anchor(0)
    }

    pub fn industry(&self) -> Option<String> {
        self.company_anchor(1)
    }

    /// Placeholder values of every `search your …` upload input.
    pub fn documents(&self) -> Vec<String> {
        self.doc
            .find_all(|el| {
                el.tag() == "input"
                    && el
                        .attr("placeholder")
                        .is_some_and(|p| p.to_lowercase().contains("search your"))
            })
            .into_iter()
            .filter_map(|el| el.attr("placeholder").map(str::to_string))
            .collect()
    }
}
